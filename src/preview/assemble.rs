use super::extract::CodeBlocks;
use serde::{Deserialize, Serialize};

/// Which html block wins when a response carries more than one complete
/// document. Older chat clients disagreed on this, so it is a caller choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HtmlBlockPolicy {
    #[default]
    FirstMatch,
    LastMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewOrigin {
    /// The model wrote a whole document; css/js were spliced into it.
    Complete,
    /// Built from fragments around the boilerplate head.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Preview {
    pub html: String,
    pub origin: PreviewOrigin,
}

const BOILERPLATE_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Generated App</title>
  <style>
    *, *::before, *::after { box-sizing: border-box; }
    body { margin: 0; padding: 2rem; font-family: system-ui, -apple-system, sans-serif; }
"#;

/// Plain substring check, no attempt at balancing tags.
pub fn is_complete_document(code: &str) -> bool {
    let lower = code.to_ascii_lowercase();
    lower.contains("<!doctype") || lower.contains("<html")
}

pub fn assemble(blocks: &CodeBlocks, policy: HtmlBlockPolicy) -> Option<Preview> {
    let mut complete = blocks.html.iter().filter(|code| is_complete_document(code));
    let document = match policy {
        HtmlBlockPolicy::FirstMatch => complete.next(),
        HtmlBlockPolicy::LastMatch => complete.last(),
    };

    if let Some(document) = document {
        return Some(Preview {
            html: inject(document.trim(), blocks.first_css(), blocks.first_js()),
            origin: PreviewOrigin::Complete,
        });
    }

    if blocks.is_empty() {
        return None;
    }

    Some(Preview {
        html: synthesize(
            blocks.html.first().map(String::as_str),
            blocks.first_css(),
            blocks.first_js(),
        ),
        origin: PreviewOrigin::Synthesized,
    })
}

fn inject(document: &str, css: Option<&str>, js: Option<&str>) -> String {
    let mut html = document.to_string();

    if let Some(css) = css {
        let style = format!("<style>\n{}\n</style>", css);
        let lower = html.to_ascii_lowercase();
        let at = lower
            .find("</head>")
            .or_else(|| open_tag_end(&lower, "head"))
            .or_else(|| open_tag_end(&lower, "html"))
            .unwrap_or(0);
        html.insert_str(at, &style);
    }

    if let Some(js) = js {
        let script = format!("<script>\n{}\n</script>", js);
        let lower = html.to_ascii_lowercase();
        let at = lower
            .rfind("</body>")
            .or_else(|| lower.rfind("</html>"))
            .unwrap_or(html.len());
        html.insert_str(at, &script);
    }

    html
}

/// Byte offset just past the `>` of the first `<name ...>` tag. `lower` must
/// already be ASCII-lowercased. `<head` does not match `<header`.
fn open_tag_end(lower: &str, name: &str) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut from = 0;
    while let Some(pos) = lower[from..].find(&needle) {
        let start = from + pos;
        let after = start + needle.len();
        match lower[after..].chars().next() {
            Some(c) if c == '>' || c == '/' || c.is_ascii_whitespace() => {
                return lower[after..].find('>').map(|end| after + end + 1);
            }
            _ => from = after,
        }
    }
    None
}

fn synthesize(html: Option<&str>, css: Option<&str>, js: Option<&str>) -> String {
    let mut out = String::from(BOILERPLATE_HEAD);
    if let Some(css) = css {
        out.push_str(css);
        out.push('\n');
    }
    out.push_str("  </style>\n</head>\n<body>\n");
    if let Some(html) = html {
        out.push_str(html);
        out.push('\n');
    }
    if let Some(js) = js {
        out.push_str("<script>\n");
        out.push_str(js);
        out.push_str("\n</script>\n");
    }
    out.push_str("</body>\n</html>");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks(html: &[&str], css: &[&str], js: &[&str]) -> CodeBlocks {
        CodeBlocks {
            html: html.iter().map(|s| s.to_string()).collect(),
            css: css.iter().map(|s| s.to_string()).collect(),
            js: js.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_complete_document_detection() {
        assert!(is_complete_document("<!DOCTYPE html><p>x</p>"));
        assert!(is_complete_document("<HTML lang=\"en\"></HTML>"));
        assert!(!is_complete_document("<div>fragment</div>"));
    }

    #[test]
    fn test_complete_document_without_siblings_is_unchanged() {
        let doc = "<!DOCTYPE html>\n<html><body>Hi</body></html>";
        let preview = assemble(&blocks(&[doc], &[], &[]), HtmlBlockPolicy::default()).unwrap();
        assert_eq!(preview.html, doc);
        assert_eq!(preview.origin, PreviewOrigin::Complete);
    }

    #[test]
    fn test_css_goes_before_closing_head() {
        let doc = "<!DOCTYPE html><html><head><title>t</title></head><body>Hi</body></html>";
        let preview = assemble(&blocks(&[doc], &["body{color:red}"], &[]), HtmlBlockPolicy::default()).unwrap();
        assert_eq!(
            preview.html,
            "<!DOCTYPE html><html><head><title>t</title><style>\nbody{color:red}\n</style></head><body>Hi</body></html>"
        );
    }

    #[test]
    fn test_css_after_open_head_when_unclosed() {
        let doc = "<html><head lang=\"x\"><body>Hi</body></html>";
        let preview = assemble(&blocks(&[doc], &["a{}"], &[]), HtmlBlockPolicy::default()).unwrap();
        assert!(preview.html.starts_with("<html><head lang=\"x\"><style>\na{}\n</style><body>"));
    }

    #[test]
    fn test_header_element_is_not_head() {
        let doc = "<html><header>nav</header><body>Hi</body></html>";
        let preview = assemble(&blocks(&[doc], &["a{}"], &[]), HtmlBlockPolicy::default()).unwrap();
        assert!(preview.html.starts_with("<html><style>\na{}\n</style><header>"));
    }

    #[test]
    fn test_js_before_closing_body_or_html() {
        let doc = "<!DOCTYPE html><html><body>Hi</body></html>";
        let preview = assemble(&blocks(&[doc], &[], &["go()"]), HtmlBlockPolicy::default()).unwrap();
        assert!(preview.html.ends_with("Hi<script>\ngo()\n</script></body></html>"));

        let doc = "<!DOCTYPE html><html>Hi</html>";
        let preview = assemble(&blocks(&[doc], &[], &["go()"]), HtmlBlockPolicy::default()).unwrap();
        assert!(preview.html.ends_with("Hi<script>\ngo()\n</script></html>"));
    }

    #[test]
    fn test_policy_picks_first_or_last_document() {
        let first = "<!DOCTYPE html><html><body>one</body></html>";
        let second = "<!DOCTYPE html><html><body>two</body></html>";
        let b = blocks(&["<p>frag</p>", first, second], &[], &[]);
        assert_eq!(assemble(&b, HtmlBlockPolicy::FirstMatch).unwrap().html, first);
        assert_eq!(assemble(&b, HtmlBlockPolicy::LastMatch).unwrap().html, second);
    }

    #[test]
    fn test_fragments_are_synthesized_in_order() {
        let b = blocks(&["<h1>Hello</h1>"], &["h1 { color: blue; }"], &["console.log('hi');"]);
        let preview = assemble(&b, HtmlBlockPolicy::default()).unwrap();
        let html = preview.html;
        assert_eq!(preview.origin, PreviewOrigin::Synthesized);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert_eq!(html.matches("<style>").count(), 1);
        assert_eq!(html.matches("<script>").count(), 1);

        let style = html.find("h1 { color: blue; }").unwrap();
        let body = html.find("<h1>Hello</h1>").unwrap();
        let script = html.find("console.log('hi');").unwrap();
        assert!(style < html.find("</style>").unwrap());
        assert!(style < body && body < script);
        assert!(script < html.find("</body>").unwrap());
    }

    #[test]
    fn test_css_only_still_gives_full_document() {
        let preview = assemble(&blocks(&[], &["p{}"], &[]), HtmlBlockPolicy::default()).unwrap();
        assert!(preview.html.starts_with("<!DOCTYPE html>"));
        assert!(preview.html.ends_with("</html>"));
        assert!(!preview.html.contains("<script>"));
    }

    #[test]
    fn test_nothing_to_assemble() {
        assert_eq!(assemble(&CodeBlocks::default(), HtmlBlockPolicy::default()), None);
    }
}
