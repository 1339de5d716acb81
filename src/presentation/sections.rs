//! Named sections inside rendered fragments.
//!
//! A section is the text between two identical `<!-- name -->` markers.
//! Cached fragments keep their markers so per-request parts, like the CSRF
//! field, can be swapped before the fragment is served.

/// Section holding the CSRF field of the product list body.
pub const CSRF_SECTION: &str = "catalog.lists.items.csrf";

/// Form field name carrying the CSRF token.
pub const CSRF_FIELD_NAME: &str = "_token";

fn marker(name: &str) -> String {
    format!("<!-- {name} -->")
}

/// Replace the content of every `name` section with `replacement`.
///
/// Content without a complete marker pair is returned unchanged.
pub fn replace_section(content: &str, replacement: &str, name: &str) -> String {
    let marker = marker(name);
    let mut output = String::with_capacity(content.len() + replacement.len());
    let mut rest = content;

    while let Some(start) = rest.find(&marker) {
        let inner_start = start + marker.len();
        let Some(inner_len) = rest[inner_start..].find(&marker) else {
            break;
        };
        let end = inner_start + inner_len;

        output.push_str(&rest[..inner_start]);
        output.push_str(replacement);
        output.push_str(&marker);
        rest = &rest[end + marker.len()..];
    }

    output.push_str(rest);
    output
}

/// Hidden form field carrying `token`.
pub fn csrf_field(token: &str) -> String {
    format!(
        "<input class=\"csrf-token\" type=\"hidden\" name=\"{CSRF_FIELD_NAME}\" value=\"{}\" />",
        escape_attribute(token)
    )
}

fn escape_attribute(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_content_between_markers() {
        let content = "<form><!-- s -->old<!-- s --></form>";
        assert_eq!(
            replace_section(content, "new", "s"),
            "<form><!-- s -->new<!-- s --></form>"
        );
    }

    #[test]
    fn replaces_every_section_occurrence() {
        let content = "<!-- s -->a<!-- s -->|<!-- s -->b<!-- s -->";
        assert_eq!(
            replace_section(content, "x", "s"),
            "<!-- s -->x<!-- s -->|<!-- s -->x<!-- s -->"
        );
    }

    #[test]
    fn unmatched_marker_leaves_content_unchanged() {
        let content = "<!-- s -->dangling";
        assert_eq!(replace_section(content, "x", "s"), content);
        assert_eq!(replace_section("plain", "x", "s"), "plain");
    }

    #[test]
    fn csrf_field_escapes_token() {
        let field = csrf_field("a\"b");
        assert!(field.contains("value=\"a&quot;b\""));
        assert!(field.contains("name=\"_token\""));
    }
}
