//! Markdown to markup for the answer panel.
//!
//! Rendering goes through a chain: the full CommonMark renderer first, a
//! simple line-oriented renderer if that fails, and finally the escaped raw
//! text with literal line breaks. The panel is never left blank.

use crate::error::ClientResult;
use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use tracing::warn;

pub trait MarkdownRenderer: Send + Sync {
    fn name(&self) -> &'static str;

    fn render(&self, markdown: &str) -> ClientResult<String>;
}

/// CommonMark via pulldown-cmark. Soft line breaks are kept as `<br />`
/// since the model's output relies on single newlines being visible.
pub struct PulldownRenderer {
    options: Options,
}

impl Default for PulldownRenderer {
    fn default() -> Self {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);
        options.insert(Options::ENABLE_TASKLISTS);
        Self { options }
    }
}

impl MarkdownRenderer for PulldownRenderer {
    fn name(&self) -> &'static str {
        "pulldown-cmark"
    }

    fn render(&self, markdown: &str) -> ClientResult<String> {
        let events = Parser::new_ext(markdown, self.options).map(|event| match event {
            Event::SoftBreak => Event::HardBreak,
            Event::Start(Tag::CodeBlock(kind)) => {
                let class = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.is_empty() => format!(
                        "<pre class=\"code-block\"><code class=\"language-{}\">",
                        html_escape::encode_double_quoted_attribute(&*lang)
                    ),
                    _ => "<pre class=\"code-block\"><code>".to_string(),
                };
                Event::Html(CowStr::from(class))
            }
            Event::End(TagEnd::CodeBlock) => Event::Html(CowStr::from("</code></pre>\n")),
            other => other,
        });

        let mut out = String::with_capacity(markdown.len() * 3 / 2);
        html::push_html(&mut out, events);
        Ok(out)
    }
}

/// Line-oriented fallback: headings, bullet lists and paragraphs only
#[derive(Default)]
pub struct LineRenderer;

impl LineRenderer {
    fn heading_level(line: &str) -> Option<(usize, &str)> {
        let hashes = line.chars().take_while(|c| *c == '#').count();
        if (1..=6).contains(&hashes) {
            let rest = &line[hashes..];
            if let Some(title) = rest.strip_prefix(' ') {
                return Some((hashes, title.trim()));
            }
        }
        None
    }

    fn list_item(line: &str) -> Option<&str> {
        ["- ", "* ", "• "]
            .iter()
            .find_map(|marker| line.strip_prefix(marker))
    }
}

impl MarkdownRenderer for LineRenderer {
    fn name(&self) -> &'static str {
        "line"
    }

    fn render(&self, markdown: &str) -> ClientResult<String> {
        let mut out = String::new();
        let mut paragraph: Vec<String> = Vec::new();
        let mut in_list = false;

        let flush_paragraph = |out: &mut String, paragraph: &mut Vec<String>| {
            if !paragraph.is_empty() {
                out.push_str("<p>");
                out.push_str(&paragraph.join("<br>"));
                out.push_str("</p>\n");
                paragraph.clear();
            }
        };

        for line in markdown.lines() {
            let trimmed = line.trim_start();

            if let Some(item) = Self::list_item(trimmed) {
                flush_paragraph(&mut out, &mut paragraph);
                if !in_list {
                    out.push_str("<ul>\n");
                    in_list = true;
                }
                out.push_str("<li>");
                out.push_str(&html_escape::encode_text(item.trim()));
                out.push_str("</li>\n");
                continue;
            }

            if in_list {
                out.push_str("</ul>\n");
                in_list = false;
            }

            if let Some((level, title)) = Self::heading_level(trimmed) {
                flush_paragraph(&mut out, &mut paragraph);
                out.push_str(&format!(
                    "<h{level}>{}</h{level}>\n",
                    html_escape::encode_text(title)
                ));
            } else if trimmed.is_empty() {
                flush_paragraph(&mut out, &mut paragraph);
            } else {
                paragraph.push(html_escape::encode_text(line).into_owned());
            }
        }

        if in_list {
            out.push_str("</ul>\n");
        }
        flush_paragraph(&mut out, &mut paragraph);
        Ok(out)
    }
}

/// Last resort: escaped raw text with every line break made visible
pub fn literalize(text: &str) -> String {
    html_escape::encode_text(text).replace('\n', "<br>")
}

/// Primary renderer, then secondary, then [`literalize`]
pub struct RenderChain {
    primary: Box<dyn MarkdownRenderer>,
    secondary: Box<dyn MarkdownRenderer>,
}

impl Default for RenderChain {
    fn default() -> Self {
        Self::new(Box::new(PulldownRenderer::default()), Box::new(LineRenderer))
    }
}

impl RenderChain {
    pub fn new(primary: Box<dyn MarkdownRenderer>, secondary: Box<dyn MarkdownRenderer>) -> Self {
        Self { primary, secondary }
    }

    pub fn render(&self, markdown: &str) -> String {
        if markdown.is_empty() {
            return String::new();
        }

        match self.primary.render(markdown) {
            Ok(markup) => return markup,
            Err(e) => {
                warn!(target: "render", "{} renderer failed: {}", self.primary.name(), e)
            }
        }

        match self.secondary.render(markdown) {
            Ok(markup) => return markup,
            Err(e) => {
                warn!(target: "render", "{} renderer failed: {}", self.secondary.name(), e)
            }
        }

        literalize(markdown)
    }
}
