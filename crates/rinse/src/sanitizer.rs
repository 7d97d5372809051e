//! Sanitizer facade

use std::borrow::Cow;

use rinse_dom::{DomTree, NodeData, PathExpr};
use rinse_html::{Document, Fragment, HtmlSerializer};

use crate::css::CssPolicy;
use crate::policy::{AllowlistPolicy, PolicyOverrides};
use crate::scrubber::{scrub_tree, Scrubber, ScrubberRegistry};
use crate::{Result, SanitizeError};

/// Input a sanitizer accepts.
///
/// Text in gives text out, a parsed [`Fragment`] or [`Document`] is edited in
/// place and handed back, and `None` stays `None`.
pub trait Markup {
    type Output;

    /// Run `edit` over the parsed tree and return the result in the input's form
    fn edit_tree<F>(self, edit: F) -> Result<Self::Output>
    where
        F: FnOnce(&mut DomTree) -> Result<()>;
}

impl Markup for &str {
    type Output = String;

    fn edit_tree<F>(self, edit: F) -> Result<String>
    where
        F: FnOnce(&mut DomTree) -> Result<()>,
    {
        if self.is_empty() {
            return Ok(String::new());
        }
        Fragment::parse(self).edit_tree(edit).map(|f| f.to_html())
    }
}

impl Markup for &String {
    type Output = String;

    fn edit_tree<F>(self, edit: F) -> Result<String>
    where
        F: FnOnce(&mut DomTree) -> Result<()>,
    {
        self.as_str().edit_tree(edit)
    }
}

impl Markup for String {
    type Output = String;

    fn edit_tree<F>(self, edit: F) -> Result<String>
    where
        F: FnOnce(&mut DomTree) -> Result<()>,
    {
        if self.is_empty() {
            return Ok(self);
        }
        self.as_str().edit_tree(edit)
    }
}

impl Markup for Fragment {
    type Output = Fragment;

    fn edit_tree<F>(mut self, edit: F) -> Result<Fragment>
    where
        F: FnOnce(&mut DomTree) -> Result<()>,
    {
        edit(self.tree_mut())?;
        Ok(self)
    }
}

impl Markup for Document {
    type Output = Document;

    fn edit_tree<F>(mut self, edit: F) -> Result<Document>
    where
        F: FnOnce(&mut DomTree) -> Result<()>,
    {
        edit(self.tree_mut())?;
        Ok(self)
    }
}

impl<T: Markup> Markup for Option<T> {
    type Output = Option<T::Output>;

    fn edit_tree<F>(self, edit: F) -> Result<Self::Output>
    where
        F: FnOnce(&mut DomTree) -> Result<()>,
    {
        self.map(|markup| markup.edit_tree(edit)).transpose()
    }
}

/// One or more path expressions
pub trait PathList {
    fn compile(&self) -> Result<Vec<PathExpr>>;
}

impl PathList for str {
    fn compile(&self) -> Result<Vec<PathExpr>> {
        Ok(vec![PathExpr::parse(self)?])
    }
}

impl PathList for String {
    fn compile(&self) -> Result<Vec<PathExpr>> {
        self.as_str().compile()
    }
}

impl PathList for PathExpr {
    fn compile(&self) -> Result<Vec<PathExpr>> {
        Ok(vec![self.clone()])
    }
}

impl<P: PathList + ?Sized> PathList for &P {
    fn compile(&self) -> Result<Vec<PathExpr>> {
        (**self).compile()
    }
}

impl<P: PathList> PathList for [P] {
    fn compile(&self) -> Result<Vec<PathExpr>> {
        let mut paths = Vec::with_capacity(self.len());
        for item in self {
            paths.extend(item.compile()?);
        }
        Ok(paths)
    }
}

impl<P: PathList, const N: usize> PathList for [P; N] {
    fn compile(&self) -> Result<Vec<PathExpr>> {
        self.as_slice().compile()
    }
}

impl<P: PathList> PathList for Vec<P> {
    fn compile(&self) -> Result<Vec<PathExpr>> {
        self.as_slice().compile()
    }
}

/// Sanitizer facade.
///
/// Wires a [`Scrubber`] between parsing and serialization. A sanitizer built
/// with [`Sanitizer::new`] has no strategy: it can still remove nodes by path
/// but [`sanitize`](Self::sanitize) fails with
/// [`SanitizeError::NotImplemented`].
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    scrubber: Option<Scrubber>,
    registry: ScrubberRegistry,
}

impl Sanitizer {
    /// Base sanitizer without a scrubbing strategy
    pub fn new() -> Self {
        Self::default()
    }

    /// Allowlist sanitizer with the default policy
    pub fn allowlist() -> Self {
        Self::with_scrubber(Scrubber::allowlist())
    }

    /// Strips every tag, keeping text
    pub fn full() -> Self {
        Self::with_scrubber(Scrubber::StripTags)
    }

    /// Strips links, keeping their text and all other markup
    pub fn links() -> Self {
        Self::with_scrubber(Scrubber::StripLinks)
    }

    /// Allowlist sanitizer with a custom policy
    pub fn with_policy(policy: AllowlistPolicy) -> Self {
        Self::with_scrubber(Scrubber::with_policy(policy))
    }

    pub fn with_scrubber(scrubber: Scrubber) -> Self {
        Self {
            scrubber: Some(scrubber),
            registry: ScrubberRegistry::new(),
        }
    }

    /// Use `registry` to resolve scrubber names in overrides
    pub fn with_registry(mut self, registry: ScrubberRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn scrubber(&self) -> Option<&Scrubber> {
        self.scrubber.as_ref()
    }

    pub fn registry(&self) -> &ScrubberRegistry {
        &self.registry
    }

    /// Sanitize with this sanitizer's strategy
    pub fn sanitize<M: Markup>(&self, input: M) -> Result<M::Output> {
        self.sanitize_with(input, &PolicyOverrides::default())
    }

    /// Sanitize with per-call overrides.
    ///
    /// A named scrubber takes precedence over tag and attribute overrides.
    pub fn sanitize_with<M: Markup>(
        &self,
        input: M,
        overrides: &PolicyOverrides,
    ) -> Result<M::Output> {
        let scrubber = self.resolve(overrides)?;
        input.edit_tree(|tree| {
            scrub_settled(tree, &scrubber);
            Ok(())
        })
    }

    /// Sanitize with an explicit scrubber, ignoring the configured strategy.
    ///
    /// Works on a base sanitizer too, since the caller supplies the strategy.
    pub fn sanitize_with_scrubber<M: Markup>(
        &self,
        input: M,
        scrubber: &Scrubber,
    ) -> Result<M::Output> {
        input.edit_tree(|tree| {
            scrub_settled(tree, scrubber);
            Ok(())
        })
    }

    /// Filter a style attribute value with the active CSS policy
    pub fn sanitize_css(&self, style: &str) -> String {
        match &self.scrubber {
            Some(Scrubber::Allowlist(policy)) => policy.css().filter(style),
            _ => CssPolicy::default().filter(style),
        }
    }

    /// Remove every node matching any of `paths`.
    ///
    /// All expressions are compiled before the input is touched, so a
    /// malformed one fails with [`SanitizeError::PathSyntax`] and nothing is
    /// removed.
    pub fn remove_by_path<M, P>(&self, input: M, paths: &P) -> Result<M::Output>
    where
        M: Markup,
        P: PathList + ?Sized,
    {
        let paths = paths.compile()?;
        input.edit_tree(|tree| {
            let root = tree.root();
            for path in &paths {
                let matched = path.select(tree, root);
                tracing::debug!(
                    expression = %path,
                    matched = matched.len(),
                    "removing nodes by path"
                );
                for id in matched {
                    tree.detach(id);
                }
            }
            Ok(())
        })
    }

    fn resolve(&self, overrides: &PolicyOverrides) -> Result<Cow<'_, Scrubber>> {
        let Some(base) = &self.scrubber else {
            return Err(not_implemented());
        };
        if let Some(name) = &overrides.scrubber {
            return self.registry.resolve(name).map(Cow::Borrowed);
        }
        if overrides.tags.is_none() && overrides.attributes.is_none() {
            return Ok(Cow::Borrowed(base));
        }
        match base {
            Scrubber::Allowlist(policy) => {
                let derived = policy.apply(overrides)?;
                Ok(Cow::Owned(Scrubber::with_policy(derived)))
            }
            _ => {
                // Still reject malformed overrides.
                AllowlistPolicy::build(overrides)?;
                tracing::debug!(scrubber = ?base, "tag and attribute overrides ignored");
                Ok(Cow::Borrowed(base))
            }
        }
    }
}

/// Upper bound on re-parse passes after the first scrub
const MAX_SETTLE_PASSES: usize = 4;

/// Scrub `tree`, then re-parse and re-scrub its markup until the output
/// stops changing.
///
/// Unwrapping can leave nesting the HTML5 tree builder never produces (a
/// `<p>` in a `<p>` once a table cell between them is gone), and such markup
/// parses into a different tree. The settled tree is the one a second
/// sanitize call would see, so sanitizing is idempotent.
fn scrub_settled(tree: &mut DomTree, scrubber: &Scrubber) {
    let root = tree.root();
    let stats = scrub_tree(tree, root, scrubber);
    if stats.unwrapped == 0 && !matches!(scrubber, Scrubber::Custom(_)) {
        return;
    }

    let as_document = matches!(tree.get(root).map(|n| &n.data), Some(NodeData::Document));
    let serializer = HtmlSerializer::new();
    let mut html = serializer.serialize_inner(tree, root);
    let mut settled: Option<DomTree> = None;

    for pass in 1..=MAX_SETTLE_PASSES {
        let mut next = if as_document {
            Document::parse(&html).into_tree()
        } else {
            Fragment::parse(&html).into_tree()
        };
        let next_root = next.root();
        scrub_tree(&mut next, next_root, scrubber);
        let next_html = serializer.serialize_inner(&next, next_root);
        if next_html == html {
            break;
        }
        tracing::debug!(pass, "re-parsed markup changed shape");
        if pass == MAX_SETTLE_PASSES {
            tracing::warn!(passes = pass, "sanitized markup did not settle");
        }
        html = next_html;
        settled = Some(next);
    }

    if let Some(next) = settled {
        tree.clear_children(root);
        tree.append_copies(root, &next, next.root());
    }
}

fn not_implemented() -> SanitizeError {
    SanitizeError::NotImplemented("the base sanitizer has no scrubbing strategy")
}
