//! Inline style filtering
//!
//! A `style` attribute is split into declarations and each one either
//! survives whole or is dropped. Checks run against a normalized copy of the
//! value (comments removed, CSS escapes decoded, whitespace removed,
//! lowercased) so obfuscated spellings of banned constructs are caught; the
//! emitted value is the original text with whitespace collapsed.

use std::collections::BTreeSet;

use crate::uri::{is_safe_uri, SchemeAllowlist};

/// Properties allowed by default
pub const DEFAULT_CSS_PROPERTIES: &[&str] = &[
    "azimuth",
    "background-color",
    "border-bottom-color",
    "border-collapse",
    "border-color",
    "border-left-color",
    "border-right-color",
    "border-top-color",
    "clear",
    "color",
    "cursor",
    "direction",
    "display",
    "elevation",
    "float",
    "font",
    "font-family",
    "font-size",
    "font-style",
    "font-variant",
    "font-weight",
    "height",
    "letter-spacing",
    "line-height",
    "list-style-type",
    "overflow",
    "pause",
    "pause-after",
    "pause-before",
    "pitch",
    "pitch-range",
    "richness",
    "speak",
    "speak-header",
    "speak-numeral",
    "speak-punctuation",
    "speech-rate",
    "stress",
    "text-align",
    "text-decoration",
    "text-indent",
    "unicode-bidi",
    "vertical-align",
    "voice-family",
    "volume",
    "white-space",
    "width",
];

/// Shorthand families whose values are checked keyword by keyword
pub const SHORTHAND_PROPERTIES: &[&str] = &["background", "border", "margin", "padding"];

/// Keywords allowed in shorthand values
pub const DEFAULT_CSS_KEYWORDS: &[&str] = &[
    "!important",
    "aqua",
    "auto",
    "black",
    "block",
    "blue",
    "bold",
    "both",
    "bottom",
    "brown",
    "center",
    "collapse",
    "dashed",
    "dotted",
    "fuchsia",
    "gray",
    "green",
    "italic",
    "left",
    "lime",
    "maroon",
    "medium",
    "navy",
    "none",
    "normal",
    "nowrap",
    "olive",
    "pointer",
    "purple",
    "red",
    "right",
    "silver",
    "solid",
    "teal",
    "top",
    "transparent",
    "underline",
    "white",
    "yellow",
];

/// Functions allowed in values besides `url()`
pub const DEFAULT_CSS_FUNCTIONS: &[&str] = &["hsl", "hsla", "rgb", "rgba"];

const BANNED_PROPERTIES: &[&str] = &["behavior", "-moz-binding"];
const BANNED_VALUE_TOKENS: &[&str] = &["expression(", "-moz-binding"];
const LENGTH_UNITS: &[&str] = &["cm", "em", "ex", "in", "mm", "pc", "pt", "px", "%", ",", ")"];

/// Which properties a [`CssPolicy`] lets through
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertySet {
    /// Every property that passes the structural checks
    Any,
    /// Only the listed (lowercase) properties
    Only(BTreeSet<String>),
}

impl PropertySet {
    pub fn only<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::Only(
            properties
                .into_iter()
                .map(|p| p.as_ref().to_ascii_lowercase())
                .collect(),
        )
    }

    pub fn contains(&self, property: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Only(set) => set.contains(property),
        }
    }
}

/// Rules for filtering inline style declarations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssPolicy {
    properties: PropertySet,
    shorthand: BTreeSet<String>,
    keywords: BTreeSet<String>,
    functions: BTreeSet<String>,
    url_schemes: SchemeAllowlist,
}

impl CssPolicy {
    /// Policy with the default tables
    pub fn new() -> Self {
        Self {
            properties: PropertySet::only(DEFAULT_CSS_PROPERTIES),
            shorthand: to_set(SHORTHAND_PROPERTIES),
            keywords: to_set(DEFAULT_CSS_KEYWORDS),
            functions: to_set(DEFAULT_CSS_FUNCTIONS),
            url_schemes: SchemeAllowlist::css_default(),
        }
    }

    /// Replace the allowed properties.
    ///
    /// Shorthand families are cleared too, so only the listed properties
    /// pass. Use [`with_shorthand`](Self::with_shorthand) to bring them back.
    pub fn with_properties<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.properties = PropertySet::only(properties);
        self.shorthand.clear();
        self
    }

    /// Replace the shorthand families whose values are checked keyword by
    /// keyword (`margin` covers `margin-left` and friends)
    pub fn with_shorthand<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.shorthand = families
            .into_iter()
            .map(|f| f.as_ref().to_ascii_lowercase())
            .collect();
        self
    }

    /// Let any property through, subject to the structural checks
    pub fn allow_any_property(mut self) -> Self {
        self.properties = PropertySet::Any;
        self
    }

    pub fn with_keyword(mut self, keyword: &str) -> Self {
        self.keywords.insert(keyword.to_ascii_lowercase());
        self
    }

    pub fn with_function(mut self, function: &str) -> Self {
        self.functions.insert(function.to_ascii_lowercase());
        self
    }

    /// Schemes accepted inside `url(...)`
    pub fn with_url_schemes(mut self, schemes: SchemeAllowlist) -> Self {
        self.url_schemes = schemes;
        self
    }

    pub fn properties(&self) -> &PropertySet {
        &self.properties
    }

    pub fn url_schemes(&self) -> &SchemeAllowlist {
        &self.url_schemes
    }

    /// Filter a style attribute value
    pub fn filter(&self, raw_style: &str) -> String {
        let mut kept = Vec::new();
        for declaration in split_declarations(raw_style) {
            match self.check_declaration(declaration) {
                Some(clean) => kept.push(clean),
                None => {
                    if !declaration.trim().is_empty() {
                        tracing::trace!(declaration = declaration.trim(), "dropped CSS declaration");
                    }
                }
            }
        }
        kept.join(" ")
    }

    fn check_declaration(&self, declaration: &str) -> Option<String> {
        let (property, value) = declaration.split_once(':')?;
        let property = decode_escapes(&strip_comments(property))
            .trim()
            .to_ascii_lowercase();
        let value = value.trim();
        if property.is_empty()
            || value.is_empty()
            || !property.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
            || BANNED_PROPERTIES.contains(&property.as_str())
            || !is_balanced(value)
        {
            return None;
        }

        let decoded = decode_escapes(&strip_comments(value)).to_ascii_lowercase();
        let compact: String = decoded.chars().filter(|c| !c.is_whitespace()).collect();
        if BANNED_VALUE_TOKENS.iter().any(|token| compact.contains(token)) {
            return None;
        }
        if !self.functions_allowed(&decoded) {
            return None;
        }

        let allowed = if self.properties.contains(&property) {
            true
        } else {
            let family = property.split('-').next().unwrap_or_default();
            self.shorthand.contains(family)
                && decoded
                    .split_whitespace()
                    .all(|token| self.keywords.contains(token) || is_keywordish(token))
        };
        if !allowed {
            return None;
        }

        let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
        Some(format!("{property}: {value};"))
    }

    /// Every `name(` must be an allowed function or a `url()` with a safe target
    fn functions_allowed(&self, value: &str) -> bool {
        value.match_indices('(').all(|(open, _)| {
            let head = value[..open].trim_end();
            let start = head
                .char_indices()
                .rev()
                .find(|&(_, c)| !is_ident_char(c))
                .map_or(0, |(i, c)| i + c.len_utf8());
            let name = &head[start..];
            match name {
                "" => true,
                "url" => {
                    let rest = &value[open + 1..];
                    let target = rest.split(')').next().unwrap_or_default();
                    let target = target.trim().trim_matches(|c| c == '"' || c == '\'');
                    is_safe_uri(target, &self.url_schemes)
                }
                _ => self.functions.contains(name),
            }
        })
    }
}

impl Default for CssPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Filter `raw_style` with `policy`
pub fn filter_css(raw_style: &str, policy: &CssPolicy) -> String {
    policy.filter(raw_style)
}

/// Name characters of a CSS identifier; non-ASCII counts as a name character
fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn to_set(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Split on `;` outside quotes and parentheses
fn split_declarations(style: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in style.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ';') if depth == 0 => {
                parts.push(&style[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&style[start..]);
    parts
}

/// Quotes closed and parentheses matched
fn is_balanced(value: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in value.chars() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, c) {
            (_, '\\') => escaped = true,
            (Some(q), _) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && quote.is_none() && !escaped
}

fn strip_comments(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Decode CSS escapes: `\` + 1-6 hex digits (+ one optional whitespace),
/// `\` + newline (dropped) or `\` + any other char (that char)
pub(crate) fn decode_escapes(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let mut hex = String::new();
        while hex.len() < 6 {
            match chars.peek() {
                Some(&h) if h.is_ascii_hexdigit() => {
                    hex.push(h);
                    chars.next();
                }
                _ => break,
            }
        }
        if hex.is_empty() {
            match chars.next() {
                Some('\n') | None => {}
                Some(other) => out.push(other),
            }
            continue;
        }
        let decoded = u32::from_str_radix(&hex, 16)
            .ok()
            .and_then(char::from_u32)
            .filter(|&c| c != '\0')
            .unwrap_or('\u{FFFD}');
        out.push(decoded);
        if chars.peek().is_some_and(|c| c.is_whitespace()) {
            chars.next();
        }
    }
    out
}

/// Colour and length tokens: `#hex`, `rgb(...)`, short numbers with a unit
fn is_keywordish(token: &str) -> bool {
    if let Some(hex) = token.strip_prefix('#') {
        return !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit());
    }
    if let Some(args) = token.strip_prefix("rgb(") {
        let args = args.strip_suffix(')').unwrap_or(args);
        return args.starts_with(|c: char| c.is_ascii_digit())
            && args.matches(',').count() <= 2
            && args.bytes().all(|b| b.is_ascii_digit() || b == b'%' || b == b',');
    }
    let number = LENGTH_UNITS
        .iter()
        .find_map(|unit| token.strip_suffix(unit))
        .unwrap_or(token);
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    match number.split_once('.') {
        Some((int, frac)) => int.len() <= 2 && frac.len() <= 2 && all_digits(int) && all_digits(frac),
        None => number.len() <= 4 && all_digits(number),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_allowed_properties_survive() {
        let policy = CssPolicy::new().with_properties(["display"]);
        assert_eq!(policy.filter("display:block; position:absolute;"), "display: block;");
        assert_eq!(policy.filter("DISPLAY : none"), "display: none;");
    }

    #[test]
    fn test_default_properties() {
        let policy = CssPolicy::new();
        assert_eq!(
            policy.filter("color: red; text-align:center;  width : 10px"),
            "color: red; text-align: center; width: 10px;"
        );
        assert_eq!(policy.filter("position: fixed"), "");
    }

    #[test]
    fn test_empty_and_trailing_whitespace() {
        let policy = CssPolicy::new();
        assert_eq!(policy.filter(""), "");
        assert_eq!(policy.filter("   "), "");
        assert_eq!(policy.filter("color: red;   "), "color: red;");
        assert_eq!(policy.filter("color:"), "");
        assert_eq!(policy.filter(":red"), "");
    }

    #[test]
    fn test_expression_is_rejected() {
        let policy = CssPolicy::new();
        assert_eq!(policy.filter("width: expression(alert(1));"), "");
        assert_eq!(policy.filter("width: EXPRESSION (alert(1));"), "");
        assert_eq!(policy.filter("width: exp/**/ression(alert(1));"), "");
        assert_eq!(policy.filter("width: e\\xpression(alert(1));"), "");
        assert_eq!(policy.filter("width: \\65 xpression(alert(1));"), "");
        assert_eq!(policy.filter("width: expr\nession(alert(1));"), "");
    }

    #[test]
    fn test_moz_binding_is_rejected_with_any_property() {
        let policy = CssPolicy::new().allow_any_property();
        assert_eq!(policy.filter("-moz-binding:url(evil.xml#x)"), "");
        assert_eq!(policy.filter("\\2d moz-binding:url(evil.xml#x)"), "");
        assert_eq!(policy.filter("behavior: url(x.htc)"), "");
        assert_eq!(policy.filter("foo: -moz-binding"), "");
    }

    #[test]
    fn test_url_scheme_guard() {
        let policy = CssPolicy::new().allow_any_property();
        assert_eq!(
            policy.filter("background-image: url(http://example.com/a.png)"),
            "background-image: url(http://example.com/a.png);"
        );
        assert_eq!(policy.filter("background-image: url(javascript:alert(1))"), "");
        assert_eq!(policy.filter("background-image: url('j\\61vascript:alert(1)')"), "");
        assert_eq!(
            policy.filter("background-image: url(\"data:image/png;base64,AAAA\")"),
            ""
        );
    }

    #[test]
    fn test_unknown_functions_are_rejected() {
        let policy = CssPolicy::new();
        assert_eq!(policy.filter("color: rgb(0, 0, 255)"), "color: rgb(0, 0, 255);");
        assert_eq!(policy.filter("width: calc(100% - 2px)"), "");
        let policy = policy.with_function("calc");
        assert_eq!(policy.filter("width: calc(100% - 2px)"), "width: calc(100% - 2px);");
        assert_eq!(
            policy.filter("border: 1px solid rgb(1,2,3)"),
            "border: 1px solid rgb(1,2,3);"
        );
        assert_eq!(policy.filter("color: foo (1)"), "");
    }

    #[test]
    fn test_shorthand_keywords() {
        let policy = CssPolicy::new();
        assert_eq!(policy.filter("border: 1px solid red"), "border: 1px solid red;");
        assert_eq!(policy.filter("margin: 0 auto"), "margin: 0 auto;");
        assert_eq!(policy.filter("margin-left: 2em"), "margin-left: 2em;");
        assert_eq!(policy.filter("background: #fff url(a.png)"), "");
        assert_eq!(policy.filter("padding: 12345px"), "");
        assert_eq!(policy.filter("border-style: groovy"), "");
    }

    #[test]
    fn test_property_list_disables_shorthand() {
        let policy = CssPolicy::new().with_properties(["display"]);
        assert_eq!(
            policy.filter(
                "display:block; margin: 0 auto; border-left: 1px solid red; background-color: red"
            ),
            "display: block;"
        );
        let policy = policy.with_shorthand(["margin"]);
        assert_eq!(
            policy.filter("display:block; margin: 0 auto; border-left: 1px solid red"),
            "display: block; margin: 0 auto;"
        );
    }

    #[test]
    fn test_non_ascii_function_names() {
        let policy = CssPolicy::new();
        assert_eq!(policy.filter("color: é()"), "");
        assert_eq!(policy.filter("font-family: ünicode(x)"), "");
        assert_eq!(policy.filter("color: rgbé(1,2,3)"), "");
        assert_eq!(policy.filter("font-family: \"Café\""), "font-family: \"Café\";");
        assert_eq!(policy.filter("color: é rgb(0,0,0)"), "color: é rgb(0,0,0);");
    }

    #[test]
    fn test_unbalanced_values_are_dropped() {
        let policy = CssPolicy::new();
        assert_eq!(policy.filter("font-family: 'Arial; color: red"), "");
        assert_eq!(policy.filter("color: rgb(1,2,3; width: 1px"), "");
        assert_eq!(
            policy.filter("font-family: \"a;b\"; color: red"),
            "font-family: \"a;b\"; color: red;"
        );
    }

    #[test]
    fn test_decode_escapes() {
        assert_eq!(decode_escapes("\\65 x"), "ex");
        assert_eq!(decode_escapes("\\000065x"), "ex");
        assert_eq!(decode_escapes("e\\x"), "ex");
        assert_eq!(decode_escapes("\\0"), "\u{FFFD}");
        assert_eq!(decode_escapes("a\\\nb"), "ab");
    }

    #[test]
    fn test_keywordish_tokens() {
        for token in ["#fff", "#A0b1C2", "rgb(1,2,3)", "10px", "1.5em", "100%", "0", "12.25pt"] {
            assert!(is_keywordish(&token.to_ascii_lowercase()), "{token}");
        }
        for token in ["#", "#xyz", "12345", "1.234em", "url(x)", "solidish"] {
            assert!(!is_keywordish(token), "{token}");
        }
    }
}
