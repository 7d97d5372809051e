//! Parse/serialize tests for rinse-html
//!
//! The sanitizer relies on serialization being stable under re-parsing.

use rinse_html::{Fragment, HtmlParser};

fn roundtrip(html: &str) -> String {
    HtmlParser::new().parse_fragment(html).to_html()
}

// ============================================================================
// ROUND TRIPS
// ============================================================================

#[test]
fn test_simple_markup_is_unchanged() {
    for html in [
        "<p>Hello <b>world</b></p>",
        "Dont touch me",
        "<a href=\"http://www.domain.com?var1=1&amp;var2=2\">my link</a>",
        "<!-- note -->text",
        "<ul><li>one</li><li>two</li></ul>",
    ] {
        assert_eq!(roundtrip(html), html);
    }
}

#[test]
fn test_names_are_lowercased() {
    assert_eq!(roundtrip("<SPAN TITLE=\"x\">blah</SPAN>"), "<span title=\"x\">blah</span>");
}

#[test]
fn test_void_elements_self_close() {
    assert_eq!(roundtrip("<img src=\"a.png\"><br>"), "<img src=\"a.png\" /><br />");
}

#[test]
fn test_attribute_values_are_escaped() {
    assert_eq!(
        roundtrip("<span title=\"'><script>alert()</script>\">blah</span>"),
        "<span title=\"'&gt;&lt;script&gt;alert()&lt;/script&gt;\">blah</span>"
    );
}

#[test]
fn test_script_content_is_raw() {
    assert_eq!(roundtrip("<script>a < b</script>"), "<script>a < b</script>");
}

#[test]
fn test_pre_leading_newline_survives() {
    let once = roundtrip("<pre>\n\nx</pre>");
    assert_eq!(once, "<pre>\n\nx</pre>");
    assert_eq!(roundtrip(&once), once);
}

// ============================================================================
// MALFORMED INPUT
// ============================================================================

#[test]
fn test_cdata_in_html_becomes_comment() {
    assert_eq!(roundtrip("a<![CDATA[x]]>b"), "a<!--[CDATA[x]]-->b");
}

#[test]
fn test_eof_inside_tag_drops_the_tag() {
    assert_eq!(roundtrip("<span class=\"\\"), "");
}

#[test]
fn test_unclosed_tags_are_closed() {
    assert_eq!(roundtrip("<div><p><span>text"), "<div><p><span>text</span></p></div>");
}

#[test]
fn test_empty_input() {
    let fragment = Fragment::parse("");
    assert!(fragment.tree().is_empty());
    assert_eq!(fragment.to_string(), "");
}

#[test]
fn test_document_serialization() {
    let doc = HtmlParser::new().parse_document("<!DOCTYPE html><title>T</title><p>x</p>");
    assert_eq!(
        doc.to_html(),
        "<!DOCTYPE html><html><head><title>T</title></head><body><p>x</p></body></html>"
    );
}

#[test]
fn test_escaped_script_text_is_kept_verbatim() {
    let html = "<script><!--<script>a</script>b</script><p>c</p>";
    assert_eq!(roundtrip(html), html);
}
