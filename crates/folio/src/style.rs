//! Custom CSS injection into exported HTML
//!
//! Works on the raw string: exported HTML may be a bare fragment and is never
//! parsed.

/// Insert `css` as a `<style>` block into `html`
///
/// - after the first `<head>` opening tag, when there is one;
/// - else inside a new `<head>` right after the `<html>` opening tag;
/// - else before the whole document.
///
/// Blank `css` returns `html` unchanged.
pub fn inject_css(html: &str, css: &str) -> String {
    if css.trim().is_empty() {
        return html.to_string();
    }
    let style = format!("<style>{}</style>", css);

    // ASCII lowercasing keeps byte offsets identical to `html`
    let lower = html.to_ascii_lowercase();

    if let Some(end) = opening_tag_end(&lower, "head") {
        return splice(html, end, &style);
    }
    if let Some(end) = opening_tag_end(&lower, "html") {
        return splice(html, end, &format!("<head>{}</head>", style));
    }
    format!("{}{}", style, html)
}

/// Byte offset just past the `>` of the first `<name ...>` tag in `lower`
fn opening_tag_end(lower: &str, name: &str) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let start = from + pos;
        let after = start + needle.len();
        // `<header` or `<htmlish` are other tags
        match lower[after..].chars().next() {
            Some('>') => return Some(after + 1),
            Some(c) if c.is_ascii_whitespace() || c == '/' => {
                return lower[after..].find('>').map(|close| after + close + 1);
            }
            Some(_) => from = after,
            None => return None,
        }
    }
    None
}

fn splice(html: &str, at: usize, insert: &str) -> String {
    let mut out = String::with_capacity(html.len() + insert.len());
    out.push_str(&html[..at]);
    out.push_str(insert);
    out.push_str(&html[at..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSS: &str = "body{color:red}";

    #[test]
    fn style_becomes_first_child_of_head() {
        let out = inject_css("<html><head></head><body></body></html>", CSS);
        assert_eq!(
            out,
            "<html><head><style>body{color:red}</style></head><body></body></html>"
        );
    }

    #[test]
    fn head_search_ignores_case_and_attributes() {
        let out = inject_css("<HTML><HEAD lang=\"en\"><title>x</title></HEAD></HTML>", CSS);
        assert_eq!(
            out,
            "<HTML><HEAD lang=\"en\"><style>body{color:red}</style><title>x</title></HEAD></HTML>"
        );
    }

    #[test]
    fn head_is_synthesized_after_html_tag() {
        let out = inject_css("<!DOCTYPE html><html lang=\"en\"><body>x</body></html>", CSS);
        assert_eq!(
            out,
            "<!DOCTYPE html><html lang=\"en\"><head><style>body{color:red}</style></head><body>x</body></html>"
        );
    }

    #[test]
    fn fragment_gets_style_prepended() {
        let out = inject_css("<div class=\"cell\">x</div>", CSS);
        assert_eq!(out, "<style>body{color:red}</style><div class=\"cell\">x</div>");
    }

    #[test]
    fn header_element_is_not_a_head() {
        let out = inject_css("<html><body><header>t</header></body></html>", CSS);
        assert_eq!(
            out,
            "<html><head><style>body{color:red}</style></head><body><header>t</header></body></html>"
        );
    }

    #[test]
    fn blank_css_is_a_no_op() {
        let html = "<html><head></head></html>";
        assert_eq!(inject_css(html, "  \n"), html);
    }

    #[test]
    fn unterminated_tag_falls_through_to_prepend() {
        let out = inject_css("<div><head", CSS);
        assert_eq!(out, "<style>body{color:red}</style><div><head");
    }
}
