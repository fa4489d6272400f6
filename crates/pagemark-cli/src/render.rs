//! Page tree to terminal lines, remembering where each node landed so the
//! viewer can scroll to it.

use std::collections::HashMap;

use pagemark_engine::{Annotation, ContentTree, NodeId, NodeKind, NoteKind, Viewport};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "dd", "div", "dl", "dt", "figure",
    "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "li", "main", "ol", "p", "pre",
    "section", "table", "tr", "ul",
];

/// Terminal colour for a marker colour name. Unknown names get a neutral grey.
pub fn marker_color(colour: &str) -> Color {
    match colour {
        "yellow" => Color::Yellow,
        "green" => Color::Green,
        "blue" => Color::Blue,
        "pink" => Color::Magenta,
        "red" => Color::Red,
        "cyan" | "teal" => Color::Cyan,
        _ => Color::Gray,
    }
}

#[derive(Debug, Default)]
pub struct RenderedPage {
    lines: Vec<Line<'static>>,
    line_of: HashMap<NodeId, usize>,
}

impl RenderedPage {
    pub fn from_tree(tree: &ContentTree) -> Self {
        let mut builder = Builder::default();
        builder.walk(tree, tree.root(), Style::default());
        builder.finish()
    }

    pub fn lines(&self) -> &[Line<'static>] {
        &self.lines
    }

    /// Line on which `node` starts.
    pub fn line_of(&self, node: NodeId) -> Option<usize> {
        self.line_of.get(&node).copied()
    }

    /// Lines without styling, as shown on screen.
    pub fn plain_lines(&self) -> Vec<String> {
        self.lines
            .iter()
            .map(|line| line.spans.iter().map(|span| span.content.as_ref()).collect())
            .collect()
    }
}

#[derive(Default)]
struct Builder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    line_of: HashMap<NodeId, usize>,
}

impl Builder {
    fn walk(&mut self, tree: &ContentTree, node: NodeId, style: Style) {
        match tree.kind(node) {
            NodeKind::Comment(_) => {}
            NodeKind::Text(text) => {
                self.line_of.insert(node, self.lines.len());
                self.push_text(text, style);
            }
            NodeKind::Element(element) => {
                let block = BLOCK_TAGS.contains(&element.tag.as_str());
                if block {
                    self.break_line();
                }
                self.line_of.insert(node, self.lines.len());

                let style = match &element.annotation {
                    Some(Annotation::NoteText) => return,
                    Some(Annotation::Marker { colour }) => style
                        .bg(marker_color(colour.as_str()))
                        .fg(Color::Black),
                    Some(Annotation::Note { id, kind }) => {
                        let tag = match kind {
                            NoteKind::Solid => None,
                            NoteKind::Start => Some(format!("[{id}>")),
                            NoteKind::End => Some(format!("<{id}]")),
                        };
                        if let Some(tag) = tag {
                            self.current.push(Span::styled(tag, note_tag_style()));
                            return;
                        }
                        style.add_modifier(Modifier::UNDERLINED)
                    }
                    None => style,
                };

                for &child in tree.children(node) {
                    self.walk(tree, child, style);
                }

                if let Some(Annotation::Note { id, .. }) = &element.annotation {
                    self.current
                        .push(Span::styled(format!("[{id}]"), note_tag_style()));
                }
                if block {
                    self.break_line();
                }
            }
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        let mut collapsed = String::with_capacity(text.len());
        let mut last_space = self.current.is_empty()
            || self
                .current
                .last()
                .is_some_and(|span| span.content.ends_with(' '));
        for ch in text.chars() {
            if ch.is_whitespace() {
                if !last_space {
                    collapsed.push(' ');
                    last_space = true;
                }
            } else {
                collapsed.push(ch);
                last_space = false;
            }
        }
        if !collapsed.is_empty() {
            self.current.push(Span::styled(collapsed, style));
        }
    }

    fn break_line(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.lines.push(Line::from(spans));
        }
    }

    fn finish(mut self) -> RenderedPage {
        self.break_line();
        RenderedPage {
            lines: self.lines,
            line_of: self.line_of,
        }
    }
}

fn note_tag_style() -> Style {
    Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD)
}

/// The scrollable text pane of the viewer.
#[derive(Debug, Default)]
pub struct TextPane {
    rendered: RenderedPage,
    scroll: usize,
}

impl TextPane {
    pub fn new(rendered: RenderedPage) -> Self {
        Self {
            rendered,
            scroll: 0,
        }
    }

    pub fn rendered(&self) -> &RenderedPage {
        &self.rendered
    }

    pub fn scroll(&self) -> usize {
        self.scroll
    }

    pub fn scroll_by(&mut self, delta: isize) {
        let last = self.rendered.lines().len().saturating_sub(1);
        self.scroll = self.scroll.saturating_add_signed(delta).min(last);
    }
}

impl Viewport for TextPane {
    fn scroll_into_view(&mut self, _tree: &ContentTree, node: NodeId) {
        if let Some(line) = self.rendered.line_of(node) {
            log::debug!("scrolling to line {line} for node {node}");
            self.scroll = line;
        }
    }
}
