// Terminal rendering of model replies
// Model output is markdown; this turns it into styled plain text for the console

#[cfg(test)]
mod tests;

use console::Style;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// Render markdown as styled terminal text.
///
/// Styling is dropped automatically when the terminal does not support colours.
#[inline]
pub fn render_markdown(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut renderer = TerminalRenderer::default();
    for event in Parser::new_ext(markdown, options) {
        renderer.handle(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct TerminalRenderer {
    output: String,
    strong: usize,
    emphasis: usize,
    strikethrough: usize,
    heading: Option<HeadingLevel>,
    in_code_block: bool,
    /// `Some(next number)` for ordered lists, `None` for bullets
    lists: Vec<Option<u64>>,
    link_targets: Vec<String>,
}

impl TerminalRenderer {
    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    let style = Style::new().dim();
                    for line in text.lines() {
                        self.output.push_str("    ");
                        self.output.push_str(&style.apply_to(line).to_string());
                        self.output.push('\n');
                    }
                } else {
                    let styled = self.inline_style().apply_to(text.as_ref()).to_string();
                    self.output.push_str(&styled);
                }
            }
            Event::Code(code) => {
                let styled = Style::new().yellow().apply_to(code.as_ref()).to_string();
                self.output.push_str(&styled);
            }
            Event::SoftBreak | Event::HardBreak => self.newline(),
            Event::Rule => {
                self.block_gap();
                self.output.push_str(&Style::new().dim().apply_to("─".repeat(40)).to_string());
                self.output.push_str("\n\n");
            }
            Event::TaskListMarker(checked) => {
                self.output.push_str(if checked { "[x] " } else { "[ ] " });
            }
            Event::Html(html) | Event::InlineHtml(html) => self.output.push_str(&html),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.block_gap();
                self.heading = Some(level);
            }
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.block_gap();
                }
            }
            Tag::Strong => self.strong += 1,
            Tag::Emphasis => self.emphasis += 1,
            Tag::Strikethrough => self.strikethrough += 1,
            Tag::CodeBlock(kind) => {
                self.block_gap();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        let label = Style::new().dim().italic().apply_to(lang.as_ref()).to_string();
                        self.output.push_str("    ");
                        self.output.push_str(&label);
                        self.output.push('\n');
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.block_gap();
                } else {
                    self.newline();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.newline();
                let depth = self.lists.len().saturating_sub(1);
                self.output.push_str(&"  ".repeat(depth));
                let marker = match self.lists.last_mut() {
                    Some(Some(number)) => {
                        let marker = format!("{number}. ");
                        *number += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.output.push_str(&marker);
            }
            Tag::Link { dest_url, .. } => self.link_targets.push(dest_url.to_string()),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.heading = None;
                self.output.push('\n');
            }
            TagEnd::Paragraph => self.newline(),
            TagEnd::Strong => self.strong = self.strong.saturating_sub(1),
            TagEnd::Emphasis => self.emphasis = self.emphasis.saturating_sub(1),
            TagEnd::Strikethrough => self.strikethrough = self.strikethrough.saturating_sub(1),
            TagEnd::CodeBlock => self.in_code_block = false,
            TagEnd::List(_) => {
                self.lists.pop();
                self.newline();
            }
            TagEnd::Link => {
                if let Some(url) = self.link_targets.pop() {
                    let styled = Style::new().underlined().apply_to(url).to_string();
                    self.output.push_str(" (");
                    self.output.push_str(&styled);
                    self.output.push(')');
                }
            }
            _ => {}
        }
    }

    fn inline_style(&self) -> Style {
        let mut style = Style::new();
        if let Some(level) = self.heading {
            style = style.bold();
            if level == HeadingLevel::H1 {
                style = style.underlined();
            }
            style = style.cyan();
        }
        if self.strong > 0 {
            style = style.bold();
        }
        if self.emphasis > 0 {
            style = style.italic();
        }
        if self.strikethrough > 0 {
            style = style.strikethrough();
        }
        style
    }

    /// Start a new line unless already at the start of one
    fn newline(&mut self) {
        if !self.output.is_empty() && !self.output.ends_with('\n') {
            self.output.push('\n');
        }
    }

    /// Separate blocks with one blank line
    fn block_gap(&mut self) {
        if self.output.is_empty() {
            return;
        }
        self.newline();
        if !self.output.ends_with("\n\n") {
            self.output.push('\n');
        }
    }

    fn finish(self) -> String {
        self.output.trim_end().to_string()
    }
}
