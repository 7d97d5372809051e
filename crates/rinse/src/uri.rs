//! URI scheme guard
//!
//! Decides whether a URI-bearing attribute value resolves to an allowed
//! scheme. The value is normalized the way a renderer would read it before
//! the scheme is extracted: control characters and whitespace anywhere in the
//! value are ignored, numeric character references are decoded (repeatedly,
//! so double-encoded values do not slip through) and case is folded.
//!
//! Normalization only feeds the decision; attribute values are never
//! rewritten.

use std::collections::BTreeSet;

/// Default schemes for URI attributes in markup
pub const DEFAULT_URI_SCHEMES: &[&str] = &[
    "afs", "aim", "callto", "ed2k", "feed", "ftp", "gopher", "http", "https", "irc", "mailto",
    "news", "nntp", "rsync", "rtsp", "sftp", "ssh", "tag", "tel", "telnet", "urn", "webcal",
    "xmpp",
];

/// Default schemes for `url(...)` in style declarations
pub const CSS_URI_SCHEMES: &[&str] = &["http", "https"];

/// Schemes that execute or embed content when followed
const DANGEROUS_SCHEMES: &[&str] = &["javascript", "vbscript", "livescript", "mocha", "data"];

/// Named references that show up in scheme obfuscation
const NAMED_REFS: &[(&str, char)] = &[
    ("colon;", ':'),
    ("tab;", '\t'),
    ("newline;", '\n'),
    ("amp;", '&'),
];

const MAX_DECODE_PASSES: usize = 4;

/// Set of permitted URI schemes plus the relative-URI rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemeAllowlist {
    schemes: BTreeSet<String>,
    allow_relative: bool,
}

impl SchemeAllowlist {
    /// Allow exactly `schemes` (case-insensitive) and relative URIs
    pub fn new<I, S>(schemes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            schemes: schemes
                .into_iter()
                .map(|s| s.as_ref().to_ascii_lowercase())
                .collect(),
            allow_relative: true,
        }
    }

    /// Schemes allowed in `href`, `src` and friends by default
    pub fn html_default() -> Self {
        Self::new(DEFAULT_URI_SCHEMES)
    }

    /// Schemes allowed in CSS `url(...)` by default
    pub fn css_default() -> Self {
        Self::new(CSS_URI_SCHEMES)
    }

    /// Whether scheme-less (relative) URIs pass
    pub fn allow_relative(mut self, allow: bool) -> Self {
        self.allow_relative = allow;
        self
    }

    /// Add a scheme
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.schemes.insert(scheme.to_ascii_lowercase());
        self
    }

    pub fn contains(&self, scheme: &str) -> bool {
        self.schemes.contains(&scheme.to_ascii_lowercase())
    }

    pub fn allows_relative(&self) -> bool {
        self.allow_relative
    }

    pub fn schemes(&self) -> impl Iterator<Item = &str> {
        self.schemes.iter().map(String::as_str)
    }
}

impl Default for SchemeAllowlist {
    fn default() -> Self {
        Self::html_default()
    }
}

/// Check a URI value against the allowed schemes.
///
/// A value with no `:` before its first `/`, `?` or `#` is relative and
/// passes when relative URIs are allowed, unless its leading segment is a
/// dangerous scheme spelled with a percent-encoded colon. Anything else must
/// name an allowed scheme.
pub fn is_safe_uri(raw: &str, allowed: &SchemeAllowlist) -> bool {
    let normalized = normalize(raw);
    match scheme_of(&normalized) {
        Some(scheme) => allowed.contains(scheme),
        None => allowed.allows_relative() && !hides_dangerous_scheme(&normalized),
    }
}

/// Normalized form used for scheme decisions
pub(crate) fn normalize(raw: &str) -> String {
    let mut current = strip_ignorable(raw);
    for _ in 0..MAX_DECODE_PASSES {
        let next = strip_ignorable(&decode_char_refs(&current));
        if next == current {
            break;
        }
        current = next;
    }
    current.to_ascii_lowercase()
}

fn scheme_of(normalized: &str) -> Option<&str> {
    let end = normalized.find([':', '/', '?', '#'])?;
    (normalized.as_bytes()[end] == b':').then(|| &normalized[..end])
}

fn hides_dangerous_scheme(normalized: &str) -> bool {
    let end = normalized.find(['/', '?', '#']).unwrap_or(normalized.len());
    let head = &normalized[..end];
    match head.find("%3a") {
        Some(i) => {
            let candidate = percent_decode(&head[..i]);
            DANGEROUS_SCHEMES.contains(&candidate.as_str())
        }
        None => false,
    }
}

fn is_ignorable(c: char) -> bool {
    c.is_control()
        || c.is_whitespace()
        || c == '`'
        || matches!(
            c,
            '\u{00AD}' | '\u{200B}'..='\u{200F}' | '\u{2060}' | '\u{FEFF}'
        )
}

fn strip_ignorable(s: &str) -> String {
    s.chars().filter(|&c| !is_ignorable(c)).collect()
}

/// Decode numeric and a few named character references
pub(crate) fn decode_char_refs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(i) = rest.find('&') {
        out.push_str(&rest[..i]);
        let after = &rest[i + 1..];
        match decode_reference(after) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode the reference following a `&`; returns the char and bytes consumed
fn decode_reference(after: &str) -> Option<(char, usize)> {
    if let Some(num) = after.strip_prefix('#') {
        let (radix, prefix_len) = if num.starts_with(['x', 'X']) { (16, 2) } else { (10, 1) };
        let body = &after[prefix_len..];
        let len = body
            .bytes()
            .take_while(|b| if radix == 16 { b.is_ascii_hexdigit() } else { b.is_ascii_digit() })
            .count();
        if len == 0 {
            return None;
        }
        let ch = u32::from_str_radix(&body[..len], radix)
            .ok()
            .and_then(char::from_u32)
            .filter(|&c| c != '\0')
            .unwrap_or('\u{FFFD}');
        let semicolon = usize::from(body[len..].starts_with(';'));
        return Some((ch, prefix_len + len + semicolon));
    }

    NAMED_REFS.iter().find_map(|&(name, ch)| {
        after
            .get(..name.len())
            .filter(|head| head.eq_ignore_ascii_case(name))
            .map(|_| (ch, name.len()))
    })
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).to_ascii_lowercase()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
