//! Turning assistant output into something the browser can preview.
//!
//! [`extract`] finds the fenced html/css/js blocks, [`assemble`] glues them
//! into one document, and the helpers here wrap that document in the
//! sandbox the preview pane uses.

pub mod assemble;
pub mod extract;

pub use assemble::{assemble, is_complete_document, HtmlBlockPolicy, Preview, PreviewOrigin};
pub use extract::{scan_blocks, CodeBlocks};

/// Scripts may run; same-origin access, top-level navigation, forms and
/// popups stay blocked.
pub const SANDBOX_POLICY: &str = "allow-scripts";

/// Value for the `Content-Security-Policy` header on raw documents, so a
/// document opened directly gets the same restrictions as the iframe.
pub fn sandbox_csp() -> String {
    format!("sandbox {}", SANDBOX_POLICY)
}

/// Pull a previewable document out of a chat response.
pub fn extract_preview(text: &str) -> Option<String> {
    extract_preview_with(text, HtmlBlockPolicy::default()).map(|p| p.html)
}

pub fn extract_preview_with(text: &str, policy: HtmlBlockPolicy) -> Option<Preview> {
    let blocks = scan_blocks(text);
    let preview = assemble(&blocks, policy);
    if let Some(preview) = &preview {
        tracing::debug!(
            origin = ?preview.origin,
            html_blocks = blocks.html.len(),
            css_blocks = blocks.css.len(),
            js_blocks = blocks.js.len(),
            "assembled preview"
        );
    }
    preview
}

pub fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn sandboxed_iframe(html: &str, title: &str) -> String {
    format!(
        r#"<iframe class="preview" sandbox="{}" title="{}" srcdoc="{}"></iframe>"#,
        SANDBOX_POLICY,
        escape_attr(title),
        escape_attr(html)
    )
}

/// Read-only page for a published snippet: a title bar over the sandboxed
/// document.
pub fn viewer_page(title: &str, html: &str) -> String {
    let title = escape_attr(title);
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  <style>
    html, body {{ height: 100%; margin: 0; }}
    body {{ display: flex; flex-direction: column; font-family: system-ui, -apple-system, sans-serif; }}
    header {{ height: 3rem; display: flex; align-items: center; gap: 1rem; padding: 0 1rem; border-bottom: 1px solid #e5e7eb; }}
    .preview {{ flex: 1; width: 100%; border: 0; background: #fff; }}
  </style>
</head>
<body>
  <header><a href="/">&larr; Back</a><span>{title}</span></header>
  {iframe}
</body>
</html>"#,
        title = title,
        iframe = sandboxed_iframe(html, "Preview"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_end_to_end_css_injection() {
        let text = "```html\n<!DOCTYPE html><html><head></head><body>Hi</body></html>\n```\n```css\nbody{color:red}\n```";
        let html = extract_preview(text).unwrap();
        assert!(html.contains("<style>\nbody{color:red}\n</style></head>"));
        assert!(html.contains("<body>Hi</body>"));
    }

    #[test]
    fn test_single_complete_block_is_returned_trimmed() {
        let doc = "<!DOCTYPE html>\n<html><body><p>x</p></body></html>";
        let text = format!("Sure!\n```html\n\n{}\n\n```\nEnjoy.", doc);
        assert_eq!(extract_preview(&text).as_deref(), Some(doc));
    }

    #[test]
    fn test_no_blocks_no_preview() {
        assert_eq!(extract_preview("The derivative of x^2 is 2x."), None);
    }

    #[test]
    fn test_extraction_has_no_state_between_calls() {
        let text = "```html\n<div>a</div>\n```\n```js\nrun()\n```";
        let first = extract_preview(text);
        let _ = extract_preview("```css\nx{}\n```");
        let second = extract_preview(text);
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_iframe_escapes_document() {
        let frame = sandboxed_iframe(r#"<p class="a">&</p>"#, "Demo");
        assert!(frame.contains(r#"sandbox="allow-scripts""#));
        assert!(frame.contains("srcdoc=\"&lt;p class=&quot;a&quot;&gt;&amp;&lt;/p&gt;\""));
    }

    #[test]
    fn test_viewer_page_embeds_title() {
        let page = viewer_page("My <App>", "<p>x</p>");
        assert!(page.contains("<title>My &lt;App&gt;</title>"));
        assert!(page.contains("sandbox=\"allow-scripts\""));
        assert_eq!(sandbox_csp(), "sandbox allow-scripts");
    }
}
