use serde::Serialize;

const FENCE: &str = "```";

/// Languages the preview cares about. Everything else is skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockLang {
    Html,
    Css,
    Js,
}

impl BlockLang {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "html" | "htm" => Some(BlockLang::Html),
            "css" => Some(BlockLang::Css),
            "javascript" | "js" => Some(BlockLang::Js),
            _ => None,
        }
    }
}

/// Fenced blocks found in one response, grouped by language in the order
/// they appeared.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodeBlocks {
    pub html: Vec<String>,
    pub css: Vec<String>,
    pub js: Vec<String>,
}

impl CodeBlocks {
    pub fn is_empty(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.js.is_empty()
    }

    pub fn first_css(&self) -> Option<&str> {
        self.css.first().map(String::as_str)
    }

    pub fn first_js(&self) -> Option<&str> {
        self.js.first().map(String::as_str)
    }

    fn push(&mut self, lang: BlockLang, code: String) {
        match lang {
            BlockLang::Html => self.html.push(code),
            BlockLang::Css => self.css.push(code),
            BlockLang::Js => self.js.push(code),
        }
    }
}

struct OpenBlock {
    lang: Option<BlockLang>,
    lines: Vec<String>,
}

impl OpenBlock {
    fn close(self, blocks: &mut CodeBlocks) {
        if let Some(lang) = self.lang {
            blocks.push(lang, self.lines.join("\n").trim().to_string());
        }
    }
}

/// Scan model output for fenced code blocks.
///
/// Fences are recognised at the start of a line. Blocks in other languages
/// are consumed so their closing fence is never read as an opening one, and
/// a block still open at the end of the text is dropped.
pub fn scan_blocks(text: &str) -> CodeBlocks {
    let mut blocks = CodeBlocks::default();
    let mut open: Option<OpenBlock> = None;

    for line in text.lines() {
        let trimmed = line.trim();
        match open.take() {
            None => {
                if let Some(rest) = trimmed.strip_prefix(FENCE) {
                    let tag = rest.split_whitespace().next().unwrap_or("");
                    open = Some(OpenBlock {
                        lang: BlockLang::from_tag(tag),
                        lines: Vec::new(),
                    });
                }
            }
            Some(mut block) => {
                if trimmed.starts_with(FENCE) {
                    block.close(&mut blocks);
                } else if let Some(before) = line.trim_end().strip_suffix(FENCE) {
                    // Closing fence glued to the last line of code. Any line
                    // ending in a fence closes the block, including one where
                    // the backticks sit inside a comment or string.
                    block.lines.push(before.to_string());
                    block.close(&mut blocks);
                } else {
                    block.lines.push(line.to_string());
                    open = Some(block);
                }
            }
        }
    }

    blocks
}
