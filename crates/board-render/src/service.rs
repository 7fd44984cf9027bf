//! Rendering service seam and the markdown implementation
//!
//! The preview layer never interprets card text itself. It hands content to a
//! [`RenderService`] and caches whatever subtree comes back.
//!
//! [`MarkdownService`] turns CommonMark into a tree with `pulldown-cmark`,
//! enough for real boards and the CLI. Task-list checkboxes get a
//! `data-checkbox-index` in document order so a host can map a click back to
//! the source line.

use crate::error::RenderError;
use async_trait::async_trait;
use board_dom::Element;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser as MdParser, Tag};

/// Converts card text into a visual subtree
#[async_trait]
pub trait RenderService: Send + Sync {
    /// Produce a fresh subtree for `content`
    async fn render(&self, content: &str) -> Result<Element, RenderError>;

    /// Replace the payload of an existing root, keeping the root's identity
    ///
    /// The default renders a fresh tree and moves its children under `root`.
    async fn update(&self, root: &Element, content: &str) -> Result<(), RenderError> {
        let fresh = self.render(content).await?;
        root.replace_children(fresh.take_children())?;
        Ok(())
    }
}

/// CommonMark renderer backed by `pulldown-cmark`
#[derive(Debug, Clone, Copy)]
pub struct MarkdownService {
    options: Options,
}

impl MarkdownService {
    /// Renderer with tables, strikethrough and task lists enabled
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: Options::ENABLE_TABLES
                | Options::ENABLE_STRIKETHROUGH
                | Options::ENABLE_TASKLISTS,
        }
    }

    /// Renderer with explicit parser options
    #[inline]
    #[must_use]
    pub fn with_options(options: Options) -> Self {
        Self { options }
    }

    /// Synchronous conversion, shared by `render` and the CLI
    ///
    /// # Errors
    /// - `RenderError::Dom` if the produced tree could not be assembled
    pub fn to_tree(&self, content: &str) -> Result<Element, RenderError> {
        let root = Element::new("div");
        root.set_attr("class", "markdown-preview-view");

        let mut stack = vec![root.clone()];
        let mut checkbox_index = 0usize;

        for event in MdParser::new_ext(content, self.options) {
            let top = stack.last().cloned().unwrap_or_else(|| root.clone());
            match event {
                Event::Start(tag) => {
                    let el = element_for(&tag);
                    top.append(&el)?;
                    stack.push(el);
                }
                Event::End(_) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                    top.append(&Element::with_text("#text", text.into_string()))?;
                }
                Event::Code(code) => {
                    top.append(&Element::with_text("code", code.into_string()))?;
                }
                Event::SoftBreak => top.append(&Element::with_text("#text", " "))?,
                Event::HardBreak => top.append(&Element::new("br"))?,
                Event::Rule => top.append(&Element::new("hr"))?,
                Event::TaskListMarker(checked) => {
                    let input = Element::new("input");
                    input.set_attr("type", "checkbox");
                    input.set_attr("class", "task-list-item-checkbox");
                    input.set_attr("data-checkbox-index", checkbox_index.to_string());
                    if checked {
                        input.set_attr("checked", "");
                    }
                    checkbox_index += 1;
                    top.append(&input)?;
                }
                _ => {}
            }
        }
        Ok(root)
    }
}

impl Default for MarkdownService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RenderService for MarkdownService {
    async fn render(&self, content: &str) -> Result<Element, RenderError> {
        self.to_tree(content)
    }
}

fn element_for(tag: &Tag<'_>) -> Element {
    match tag {
        Tag::Paragraph => Element::new("p"),
        Tag::Heading { level, .. } => Element::new(heading_tag(*level)),
        Tag::BlockQuote(_) => Element::new("blockquote"),
        Tag::CodeBlock(kind) => {
            let pre = Element::new("pre");
            if let CodeBlockKind::Fenced(lang) = kind {
                if !lang.is_empty() {
                    pre.set_attr("data-lang", lang.to_string());
                }
            }
            pre
        }
        Tag::List(Some(_)) => Element::new("ol"),
        Tag::List(None) => Element::new("ul"),
        Tag::Item => Element::new("li"),
        Tag::Table(_) => Element::new("table"),
        Tag::TableHead => Element::new("thead"),
        Tag::TableRow => Element::new("tr"),
        Tag::TableCell => Element::new("td"),
        Tag::Emphasis => Element::new("em"),
        Tag::Strong => Element::new("strong"),
        Tag::Strikethrough => Element::new("del"),
        Tag::Link { dest_url, .. } => {
            let a = Element::new("a");
            a.set_attr("href", dest_url.to_string());
            let class = if dest_url.contains("://") {
                "external-link"
            } else {
                "internal-link"
            };
            a.set_attr("class", class);
            a
        }
        Tag::Image { dest_url, .. } => {
            let img = Element::new("img");
            img.set_attr("src", dest_url.to_string());
            img
        }
        _ => Element::new("span"),
    }
}

fn heading_tag(level: HeadingLevel) -> &'static str {
    match level {
        HeadingLevel::H1 => "h1",
        HeadingLevel::H2 => "h2",
        HeadingLevel::H3 => "h3",
        HeadingLevel::H4 => "h4",
        HeadingLevel::H5 => "h5",
        HeadingLevel::H6 => "h6",
    }
}
