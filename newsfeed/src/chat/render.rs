//! Rich-text rendering of assistant replies.
//!
//! Replies arrive as Markdown. `pulldown-cmark` turns them into an event stream
//! that is folded into a small tree of [`Block`] and [`Inline`] nodes, and each
//! [`RenderTarget`] picks its output per node kind. Raw HTML in a reply never
//! reaches the output: block-level fragments are flattened to text, inline tags
//! are dropped.

use pulldown_cmark::{Event, Options, Parser, Tag};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Inline span inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inline {
    Text(String),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Code(String),
    Link { content: Vec<Inline>, url: String },
}

/// Block-level node. List items hold blocks so lists can nest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Block {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph(Vec<Inline>),
    List { ordered: bool, items: Vec<Vec<Block>> },
    CodeBlock(String),
}

/// Output flavour of the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    /// Plain text for terminals
    Plain,
    /// Escaped HTML restricted to the node kinds above
    Html,
}

/// Parsed assistant reply, keeping its source text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    pub source: String,
    pub blocks: Vec<Block>,
}

impl RichText {
    pub fn parse(source: &str) -> Self {
        Self {
            source: source.to_string(),
            blocks: parse_blocks(source),
        }
    }

    pub fn render(&self, target: RenderTarget) -> String {
        render_blocks(&self.blocks, target)
    }

    pub fn to_plain(&self) -> String {
        self.render(RenderTarget::Plain)
    }

    pub fn to_html(&self) -> String {
        self.render(RenderTarget::Html)
    }
}

/// Node under construction while folding parser events.
enum Frame {
    Blocks(Vec<Block>),
    Paragraph(Vec<Inline>),
    Heading(u8, Vec<Inline>),
    List { ordered: bool, items: Vec<Vec<Block>> },
    /// Blocks of the item plus loose inline text of a tight item
    Item(Vec<Block>, Vec<Inline>),
    Emphasis(Vec<Inline>),
    Strong(Vec<Inline>),
    Link(String, Vec<Inline>),
    CodeBlock(String),
}

struct TreeBuilder {
    stack: Vec<Frame>,
    html: String,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Frame::Blocks(Vec::new())],
            html: String::new(),
        }
    }

    fn push_inline(&mut self, inline: Inline) {
        let spans = match self.stack.last_mut() {
            Some(Frame::Paragraph(spans))
            | Some(Frame::Heading(_, spans))
            | Some(Frame::Item(_, spans))
            | Some(Frame::Emphasis(spans))
            | Some(Frame::Strong(spans))
            | Some(Frame::Link(_, spans)) => spans,
            Some(Frame::CodeBlock(code)) => {
                if let Inline::Text(text) | Inline::Code(text) = inline {
                    code.push_str(&text);
                }
                return;
            }
            _ => {
                self.push_block(Block::Paragraph(vec![inline]));
                return;
            }
        };
        match (spans.last_mut(), inline) {
            (Some(Inline::Text(prev)), Inline::Text(text)) => prev.push_str(&text),
            (_, inline) => spans.push(inline),
        }
    }

    fn push_block(&mut self, block: Block) {
        match self.stack.last_mut() {
            Some(Frame::Blocks(blocks)) => blocks.push(block),
            Some(Frame::Item(blocks, pending)) => {
                if !pending.is_empty() {
                    blocks.push(Block::Paragraph(std::mem::take(pending)));
                }
                blocks.push(block);
            }
            _ => debug!("render: dropping block outside a container"),
        }
    }

    fn flush_html(&mut self) {
        if self.html.is_empty() {
            return;
        }
        let html = std::mem::take(&mut self.html);
        for para in flatten_html(&html).split("\n\n") {
            let text = para.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                self.push_block(Block::Paragraph(vec![Inline::Text(text)]));
            }
        }
    }

    fn in_block_container(&self) -> bool {
        matches!(
            self.stack.last(),
            Some(Frame::Blocks(_)) | Some(Frame::Item(..))
        )
    }

    fn start(&mut self, tag: Tag<'_>) {
        let frame = match tag {
            Tag::Paragraph => Frame::Paragraph(Vec::new()),
            Tag::Heading(level, _, _) => Frame::Heading(level as u8, Vec::new()),
            Tag::List(start) => Frame::List {
                ordered: start.is_some(),
                items: Vec::new(),
            },
            Tag::Item => Frame::Item(Vec::new(), Vec::new()),
            Tag::Emphasis => Frame::Emphasis(Vec::new()),
            Tag::Strong => Frame::Strong(Vec::new()),
            Tag::Link(_, url, _) => Frame::Link(url.to_string(), Vec::new()),
            Tag::CodeBlock(_) => Frame::CodeBlock(String::new()),
            // Quotes, tables and images contribute their text to the parent
            _ => return,
        };
        self.stack.push(frame);
    }

    fn end(&mut self, tag: Tag<'_>) {
        let tracked = matches!(
            tag,
            Tag::Paragraph
                | Tag::Heading(..)
                | Tag::List(_)
                | Tag::Item
                | Tag::Emphasis
                | Tag::Strong
                | Tag::Link(..)
                | Tag::CodeBlock(_)
        );
        if !tracked || self.stack.len() < 2 {
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match frame {
            Frame::Paragraph(spans) => {
                if !spans.is_empty() {
                    self.push_block(Block::Paragraph(spans));
                }
            }
            Frame::Heading(level, content) => self.push_block(Block::Heading { level, content }),
            Frame::List { ordered, items } => self.push_block(Block::List { ordered, items }),
            Frame::Item(mut blocks, pending) => {
                if !pending.is_empty() {
                    blocks.push(Block::Paragraph(pending));
                }
                if let Some(Frame::List { items, .. }) = self.stack.last_mut() {
                    items.push(blocks);
                }
            }
            Frame::Emphasis(spans) => self.push_inline(Inline::Emphasis(spans)),
            Frame::Strong(spans) => self.push_inline(Inline::Strong(spans)),
            Frame::Link(url, content) => self.push_inline(Inline::Link { content, url }),
            Frame::CodeBlock(code) => {
                self.push_block(Block::CodeBlock(code.trim_end_matches('\n').to_string()))
            }
            Frame::Blocks(_) => {}
        }
    }

    fn event(&mut self, event: Event<'_>) {
        if !matches!(event, Event::Html(_)) {
            self.flush_html();
        }
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => self.push_inline(Inline::Text(text.to_string())),
            Event::Code(code) => self.push_inline(Inline::Code(code.to_string())),
            Event::Html(html) => {
                // Inline tags are dropped; their text arrives as separate events
                if self.in_block_container() {
                    self.html.push_str(&html);
                }
            }
            Event::SoftBreak => self.push_inline(Inline::Text(" ".to_string())),
            Event::HardBreak => self.push_inline(Inline::Text("\n".to_string())),
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_html();
        while self.stack.len() > 1 {
            self.end(Tag::Paragraph);
        }
        match self.stack.pop() {
            Some(Frame::Blocks(blocks)) => blocks,
            _ => Vec::new(),
        }
    }
}

fn parse_blocks(source: &str) -> Vec<Block> {
    let mut builder = TreeBuilder::new();
    for event in Parser::new_ext(source, Options::empty()) {
        builder.event(event);
    }
    builder.finish()
}

fn flatten_html(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 80) {
        Ok(text) => text,
        Err(e) => {
            warn!("render: failed to flatten embedded HTML: {}", e);
            String::new()
        }
    }
}

fn render_blocks(blocks: &[Block], target: RenderTarget) -> String {
    let rendered: Vec<String> = blocks
        .iter()
        .map(|block| render_block(block, target))
        .collect();
    match target {
        RenderTarget::Plain => rendered.join("\n\n"),
        RenderTarget::Html => rendered.join("\n"),
    }
}

fn render_block(block: &Block, target: RenderTarget) -> String {
    match (block, target) {
        (Block::Heading { level, content }, RenderTarget::Plain) => {
            let text = render_inlines(content, target);
            match level {
                1 => format!("{}\n{}", text, "=".repeat(text.chars().count())),
                2 => format!("{}\n{}", text, "-".repeat(text.chars().count())),
                _ => text,
            }
        }
        (Block::Heading { level, content }, RenderTarget::Html) => {
            format!("<h{0}>{1}</h{0}>", level, render_inlines(content, target))
        }
        (Block::Paragraph(content), RenderTarget::Plain) => render_inlines(content, target),
        (Block::Paragraph(content), RenderTarget::Html) => {
            format!("<p>{}</p>", render_inlines(content, target))
        }
        (Block::List { ordered, items }, RenderTarget::Plain) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let bullet = if *ordered {
                    format!("{}.", i + 1)
                } else {
                    "-".to_string()
                };
                let body = item
                    .iter()
                    .map(|b| render_block(b, target))
                    .collect::<Vec<_>>()
                    .join("\n");
                let mut lines = body.lines();
                let first = lines.next().unwrap_or_default();
                let mut out = format!("  {} {}", bullet, first);
                for line in lines {
                    out.push_str("\n    ");
                    out.push_str(line);
                }
                out
            })
            .collect::<Vec<_>>()
            .join("\n"),
        (Block::List { ordered, items }, RenderTarget::Html) => {
            let tag = if *ordered { "ol" } else { "ul" };
            let body: String = items
                .iter()
                .map(|item| format!("<li>{}</li>", render_item_html(item)))
                .collect();
            format!("<{0}>{1}</{0}>", tag, body)
        }
        (Block::CodeBlock(code), RenderTarget::Plain) => code
            .lines()
            .map(|l| format!("    {}", l))
            .collect::<Vec<_>>()
            .join("\n"),
        (Block::CodeBlock(code), RenderTarget::Html) => {
            format!("<pre><code>{}</code></pre>", html_escape::encode_text(code))
        }
    }
}

// A tight item renders its text without a paragraph wrapper
fn render_item_html(item: &[Block]) -> String {
    match item {
        [Block::Paragraph(content)] => render_inlines(content, RenderTarget::Html),
        blocks => render_blocks(blocks, RenderTarget::Html),
    }
}

fn render_inlines(spans: &[Inline], target: RenderTarget) -> String {
    spans.iter().map(|span| render_inline(span, target)).collect()
}

fn render_inline(span: &Inline, target: RenderTarget) -> String {
    match (span, target) {
        (Inline::Text(t), RenderTarget::Plain) => t.clone(),
        (Inline::Text(t), RenderTarget::Html) => html_escape::encode_text(t).into_owned(),
        (Inline::Emphasis(c), RenderTarget::Plain) | (Inline::Strong(c), RenderTarget::Plain) => {
            render_inlines(c, target)
        }
        (Inline::Emphasis(c), RenderTarget::Html) => format!("<em>{}</em>", render_inlines(c, target)),
        (Inline::Strong(c), RenderTarget::Html) => {
            format!("<strong>{}</strong>", render_inlines(c, target))
        }
        (Inline::Code(t), RenderTarget::Plain) => format!("`{}`", t),
        (Inline::Code(t), RenderTarget::Html) => {
            format!("<code>{}</code>", html_escape::encode_text(t))
        }
        (Inline::Link { content, url }, RenderTarget::Plain) => {
            format!("{} ({})", render_inlines(content, target), url)
        }
        (Inline::Link { content, url }, RenderTarget::Html) => {
            let text = render_inlines(content, target);
            if is_safe_url(url) {
                format!(
                    "<a href=\"{}\">{}</a>",
                    html_escape::encode_double_quoted_attribute(url),
                    text
                )
            } else {
                text
            }
        }
    }
}

fn is_safe_url(url: &str) -> bool {
    url::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https" | "mailto"))
        .unwrap_or(false)
}
