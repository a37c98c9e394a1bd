//! Minimal markdown-to-HTML for chat bubbles.
//!
//! Only headings, bullets and paragraphs are converted. Math delimiters are
//! left alone so the browser can typeset them.

use regex::Regex;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,3}\s+(.+)$").unwrap());
static BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[*-]\s+(.+)$").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn inline(text: &str) -> String {
    BOLD.replace_all(&escape_html(text), "<strong>$1</strong>")
        .into_owned()
}

pub fn render_markdown(text: &str) -> String {
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        if let Some(caps) = HEADING.captures(line) {
            out.push(format!("<h2>{}</h2>", inline(&caps[1])));
        } else if let Some(caps) = BULLET.captures(line) {
            out.push(format!("<p class=\"bullet\">• {}</p>", inline(&caps[1])));
        } else {
            out.push(format!("<p>{}</p>", inline(line)));
        }
    }
    out.join("\n")
}
