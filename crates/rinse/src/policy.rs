//! Allowlist policy
//!
//! Default tag and attribute tables, the set of attributes whose values are
//! URIs, and validation of caller overrides.

use std::collections::BTreeSet;

use serde::Deserialize;

use crate::css::CssPolicy;
use crate::uri::SchemeAllowlist;
use crate::{Result, SanitizeError};

/// Tags kept by default
pub const DEFAULT_ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "acronym", "address", "b", "big", "blockquote", "br", "cite", "code", "dd",
    "del", "dfn", "div", "dl", "dt", "em", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "i", "img",
    "ins", "kbd", "li", "ol", "p", "pre", "samp", "small", "span", "strong", "sub", "sup", "tt",
    "ul", "var", "video",
];

/// Attributes kept by default
pub const DEFAULT_ALLOWED_ATTRIBUTES: &[&str] = &[
    "abbr", "alt", "cite", "class", "datetime", "height", "href", "name", "poster", "src",
    "style", "title", "width", "xml:lang",
];

/// Attributes whose value is followed as a URI
pub const URI_ATTRIBUTES: &[&str] = &[
    "action", "background", "cite", "data", "dynsrc", "formaction", "href", "longdesc",
    "lowsrc", "poster", "src", "xlink:href",
];

/// Tags removed together with their content whatever the allowlist says
pub const ALWAYS_REMOVED_TAGS: &[&str] = &["script", "style"];

/// Tags removed together with their content unless allowlisted
pub const DEFAULT_REMOVED_SUBTREES: &[&str] = &[
    "applet", "embed", "form", "frame", "frameset", "iframe", "marquee", "noembed", "noframes",
    "noscript", "object", "template",
];

/// A caller-supplied list of names.
///
/// Deserializes from either a single string or a list so that a single string
/// can be reported as a configuration error instead of being coerced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum NameList {
    One(String),
    Many(Vec<String>),
}

impl<S: Into<String>> FromIterator<S> for NameList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::Many(iter.into_iter().map(Into::into).collect())
    }
}

impl From<&str> for NameList {
    fn from(name: &str) -> Self {
        Self::One(name.to_string())
    }
}

impl<const N: usize> From<[&str; N]> for NameList {
    fn from(names: [&str; N]) -> Self {
        names.into_iter().collect()
    }
}

impl From<Vec<String>> for NameList {
    fn from(names: Vec<String>) -> Self {
        Self::Many(names)
    }
}

/// Per-call or configured overrides of the default policy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PolicyOverrides {
    /// Replaces the allowed tags
    pub tags: Option<NameList>,
    /// Replaces the allowed attributes
    pub attributes: Option<NameList>,
    /// Name of a registered scrubber; takes precedence over `tags` and
    /// `attributes`
    pub scrubber: Option<String>,
}

impl PolicyOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(mut self, tags: impl Into<NameList>) -> Self {
        self.tags = Some(tags.into());
        self
    }

    pub fn attributes(mut self, attributes: impl Into<NameList>) -> Self {
        self.attributes = Some(attributes.into());
        self
    }

    pub fn scrubber(mut self, name: &str) -> Self {
        self.scrubber = Some(name.to_string());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_none() && self.attributes.is_none() && self.scrubber.is_none()
    }
}

/// Tag/attribute allowlist with its URI and CSS sub-policies.
///
/// Immutable once built; share it freely between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistPolicy {
    allowed_tags: BTreeSet<String>,
    allowed_attributes: BTreeSet<String>,
    uri_attributes: BTreeSet<String>,
    removed_subtrees: BTreeSet<String>,
    uri_schemes: SchemeAllowlist,
    css: CssPolicy,
}

impl AllowlistPolicy {
    /// Default policy with `overrides` applied.
    ///
    /// An override replaces the whole default list for its field. A single
    /// string where a list is expected fails with [`SanitizeError::Config`].
    pub fn build(overrides: &PolicyOverrides) -> Result<Self> {
        Self::default().apply(overrides)
    }

    /// Copy of this policy with `overrides` applied
    pub fn apply(&self, overrides: &PolicyOverrides) -> Result<Self> {
        let mut policy = self.clone();
        if let Some(tags) = &overrides.tags {
            policy.allowed_tags = name_set("tags", tags)?;
        }
        if let Some(attributes) = &overrides.attributes {
            policy.allowed_attributes = name_set("attributes", attributes)?;
        }
        Ok(policy)
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_tags = lowercase_set(tags);
        self
    }

    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.allowed_attributes = lowercase_set(attributes);
        self
    }

    pub fn with_removed_subtrees<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.removed_subtrees = lowercase_set(tags);
        self
    }

    pub fn with_uri_schemes(mut self, schemes: SchemeAllowlist) -> Self {
        self.uri_schemes = schemes;
        self
    }

    pub fn with_css(mut self, css: CssPolicy) -> Self {
        self.css = css;
        self
    }

    pub fn allows_tag(&self, tag: &str) -> bool {
        self.allowed_tags.contains(tag)
    }

    pub fn allows_attribute(&self, name: &str) -> bool {
        self.allowed_attributes.contains(name)
    }

    pub fn is_uri_attribute(&self, name: &str) -> bool {
        self.uri_attributes.contains(name)
    }

    /// Whether a non-allowlisted `tag` goes with its content
    pub fn removes_subtree(&self, tag: &str) -> bool {
        self.removed_subtrees.contains(tag)
    }

    pub fn allowed_tags(&self) -> impl Iterator<Item = &str> {
        self.allowed_tags.iter().map(String::as_str)
    }

    pub fn allowed_attributes(&self) -> impl Iterator<Item = &str> {
        self.allowed_attributes.iter().map(String::as_str)
    }

    pub fn uri_schemes(&self) -> &SchemeAllowlist {
        &self.uri_schemes
    }

    pub fn css(&self) -> &CssPolicy {
        &self.css
    }
}

impl Default for AllowlistPolicy {
    fn default() -> Self {
        Self {
            allowed_tags: lowercase_set(DEFAULT_ALLOWED_TAGS),
            allowed_attributes: lowercase_set(DEFAULT_ALLOWED_ATTRIBUTES),
            uri_attributes: lowercase_set(URI_ATTRIBUTES),
            removed_subtrees: lowercase_set(DEFAULT_REMOVED_SUBTREES),
            uri_schemes: SchemeAllowlist::html_default(),
            css: CssPolicy::new(),
        }
    }
}

fn lowercase_set<I, S>(names: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .map(|name| name.as_ref().to_ascii_lowercase())
        .collect()
}

fn name_set(field: &str, names: &NameList) -> Result<BTreeSet<String>> {
    match names {
        NameList::Many(names) => Ok(lowercase_set(names)),
        NameList::One(name) => {
            tracing::warn!(field, value = %name, "policy override is a single string, not a list");
            Err(SanitizeError::Config(format!(
                "`{field}` must be a list of names, got the string {name:?}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tables() {
        let policy = AllowlistPolicy::default();
        assert!(policy.allows_tag("a"));
        assert!(policy.allows_tag("video"));
        assert!(!policy.allows_tag("script"));
        assert!(!policy.allows_tag("u"));
        assert!(policy.allows_attribute("href"));
        assert!(policy.allows_attribute("xml:lang"));
        assert!(!policy.allows_attribute("onclick"));
        assert!(policy.is_uri_attribute("poster"));
        assert!(policy.is_uri_attribute("lowsrc"));
        assert!(policy.removes_subtree("form"));
        assert!(!policy.removes_subtree("bad"));
    }

    #[test]
    fn test_override_replaces_only_its_field() {
        let overrides = PolicyOverrides::new().tags(["U", "b"]);
        let policy = AllowlistPolicy::build(&overrides).unwrap();
        assert_eq!(policy.allowed_tags().collect::<Vec<_>>(), ["b", "u"]);
        assert!(policy.allows_attribute("href"));
    }

    #[test]
    fn test_single_string_override_is_a_config_error() {
        let err = AllowlistPolicy::build(&PolicyOverrides::new().tags("foo")).unwrap_err();
        assert!(matches!(err, SanitizeError::Config(_)));

        let err = AllowlistPolicy::build(&PolicyOverrides::new().attributes("foo")).unwrap_err();
        assert!(err.to_string().contains("attributes"));
    }

    #[test]
    fn test_empty_list_override_is_allowed() {
        let policy = AllowlistPolicy::build(&PolicyOverrides::new().tags(Vec::<String>::new())).unwrap();
        assert_eq!(policy.allowed_tags().count(), 0);
    }
}
