//! rinse
//!
//! HTML sanitization for untrusted markup.
//!
//! Markup is parsed with `rinse-html`, every node is run past a scrubbing
//! strategy, and the cleaned tree is serialized again. Three strategies come
//! built in:
//! - allowlist: keep known-safe tags and attributes, check URIs and styles
//! - strip tags: keep text only
//! - strip links: unwrap `<a>` and drop `href`
//!
//! ```
//! use rinse::Sanitizer;
//!
//! let clean = Sanitizer::allowlist()
//!     .sanitize(r#"<a href="javascript:alert(1)" title="t">hi</a><script>x</script>"#)
//!     .unwrap();
//! assert_eq!(clean, r#"<a title="t">hi</a>"#);
//! ```

pub mod css;
pub mod policy;
mod sanitizer;
pub mod scrubber;
pub mod uri;

pub use css::{filter_css, CssPolicy, PropertySet};
pub use policy::{AllowlistPolicy, NameList, PolicyOverrides};
pub use rinse_dom::{PathError, PathExpr};
pub use rinse_html::{Document, Fragment};
pub use sanitizer::{Markup, PathList, Sanitizer};
pub use scrubber::{
    scrub_tree, CustomScrub, ScrubDecision, ScrubNode, ScrubStats, Scrubber, ScrubberRegistry,
};
pub use uri::{is_safe_uri, SchemeAllowlist};

/// Sanitizer error
#[derive(Debug, thiserror::Error)]
pub enum SanitizeError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Scrubber not found: {0}")]
    ScrubberNotFound(String),

    #[error(transparent)]
    PathSyntax(#[from] PathError),

    #[error("Not implemented: {0}")]
    NotImplemented(&'static str),
}

pub type Result<T> = std::result::Result<T, SanitizeError>;
