//! Attribute parsing and markup escaping.

use regex::Regex;
use std::sync::LazyLock;

use crate::element::Attributes;

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([A-Za-z_][\w:.-]*)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("invalid regex")
});

/// Parse the attribute text of an open tag (everything between the tag name
/// and `>`, with any self-closing `/` already stripped).
///
/// Accepts `name="v"`, `name='v'`, `name=v` and bare `name` (empty value).
/// Values are entity-decoded. Anything unparseable is skipped.
#[must_use]
pub fn parse_attributes(text: &str) -> Attributes {
    let mut attrs = Attributes::new();
    for caps in ATTRIBUTE.captures_iter(text) {
        let Some(name) = caps.get(1) else {
            continue;
        };
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map_or("", |m| m.as_str());
        attrs.insert(name.as_str().to_ascii_lowercase(), unescape(value));
    }
    attrs
}

/// Escape text for use inside a double-quoted attribute value.
#[must_use]
pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

/// Escape text for use as element content, so it can never open or close a
/// tag.
#[must_use]
pub fn escape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    if !value.contains('&') {
        return value.to_string();
    }
    value
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attribute_forms() {
        let attrs = parse_attributes(r#" id="a1" type='radio' default=deny required"#);
        let pairs: Vec<_> = attrs.iter().collect();
        assert_eq!(
            pairs,
            vec![
                ("id", "a1"),
                ("type", "radio"),
                ("default", "deny"),
                ("required", "")
            ]
        );
    }

    #[test]
    fn test_attribute_names_are_lowercased() {
        let attrs = parse_attributes(r#"HREF="https://example.com""#);
        assert_eq!(attrs.get("href"), Some("https://example.com"));
    }

    #[test]
    fn test_escape_then_parse_preserves_value() {
        let raw = r#"say "hi" & <leave>"#;
        let attrs = parse_attributes(&format!(r#"title="{}""#, escape_attr(raw)));
        assert_eq!(attrs.get("title"), Some(raw));
    }

    #[test]
    fn test_escape_text_neutralizes_tags() {
        assert_eq!(escape_text("<bash>rm</bash>"), "&lt;bash&gt;rm&lt;/bash&gt;");
    }
}
