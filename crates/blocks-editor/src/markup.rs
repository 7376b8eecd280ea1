//! Plain-text markup for message blocks.
//!
//! Blocks are separated by a blank line. Inline text uses `**bold**`,
//! `_italic_`, `~~strike~~` and `[label](url)`; a backslash makes the next
//! character literal. Parsing is total: anything unrecognised is text.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Map;

use crate::error::ConfigurationError;
use crate::message::{BlockMessage, MessageBlock, MessageLeaf, UnknownMessage};
use crate::node::Marks;
use crate::plugin::Pipeline;

const BUILTIN_TAGS: &[&str] = &[
    "paragraph",
    "heading-1",
    "heading-2",
    "heading-3",
    "bulleted-list",
    "numbered-list",
    "list-item",
    "quote",
    "callout",
    "code-block",
    "link",
    "image",
    "image-attachment",
    "image-grid",
    "attachments",
    "table",
    "horizontal-divider",
];

const INLINE_SPECIALS: &[char] = &['\\', '*', '_', '~', '[', ']'];
const LINE_START_SPECIALS: &[char] = &['#', '>', '-', '|', '`', ':', '!'];

fn numbered_item() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)\. ").expect("valid regex"))
}

fn image_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^!\[(attachment)?\]\((.*)\)$").expect("valid regex"))
}

fn image_size() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(.*) =(\d*)x(\d*)$").expect("valid regex"))
}

fn unsupported() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[unsupported: (.+)\]$").expect("valid regex"))
}

/// Converts message blocks to and from markup. Tags registered by plugins
/// are written as `<marker> <content>` lines.
#[derive(Debug, Clone, Default)]
pub struct MarkupCodec {
    /// `(marker, tag)`, longest marker first.
    markers: Vec<(String, String)>,
}

impl MarkupCodec {
    pub fn new(pipeline: &Pipeline) -> Result<Self, ConfigurationError> {
        let mut markers = Vec::new();
        for spec in pipeline.capabilities().specs() {
            if BUILTIN_TAGS.contains(&spec.tag.as_str()) {
                continue;
            }
            let Some(marker) = &spec.markup else {
                return Err(ConfigurationError::UnmappedNodeType(spec.tag.clone()));
            };
            markers.push((marker.clone(), spec.tag.clone()));
        }
        markers.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(&b.0)));
        Ok(Self { markers })
    }

    pub fn to_markup(&self, blocks: &[MessageBlock]) -> String {
        blocks
            .iter()
            .map(|block| self.render_block(block))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn from_markup(&self, text: &str) -> Vec<MessageBlock> {
        let lines: Vec<&str> = text.lines().collect();
        let mut blocks = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if lines[i].trim().is_empty() {
                i += 1;
                continue;
            }
            let (block, next) = self.parse_block(&lines, i);
            blocks.push(block);
            i = next;
        }
        blocks
    }

    fn marker_for(&self, tag: &str) -> Option<&str> {
        self.markers
            .iter()
            .find(|(_, t)| t == tag)
            .map(|(marker, _)| marker.as_str())
    }

    fn render_block(&self, block: &MessageBlock) -> String {
        let block = match block {
            MessageBlock::Leaf(_) => return text_content(std::slice::from_ref(block)),
            MessageBlock::Unknown(unknown) => return self.render_unknown(unknown),
            MessageBlock::Block(block) => block,
        };
        match block {
            BlockMessage::Paragraph { children } => content(children),
            BlockMessage::Heading1 { children } => format!("# {}", content(children)),
            BlockMessage::Heading2 { children } => format!("## {}", content(children)),
            BlockMessage::Heading3 { children } => format!("### {}", content(children)),
            BlockMessage::Quote { children } if holds_blocks(children) => {
                self.render_block_quote(children.as_deref().unwrap_or_default())
            }
            BlockMessage::Quote { children } => prefix_lines("> ", &content(children)),
            BlockMessage::Callout { children } => prefix_lines("!> ", &content(children)),
            BlockMessage::ListItem { children } => format!("- {}", content(children)),
            BlockMessage::BulletedList { children } => children
                .iter()
                .map(|item| format!("- {}", item_content(item)))
                .collect::<Vec<_>>()
                .join("\n"),
            BlockMessage::NumberedList { children } => children
                .iter()
                .enumerate()
                .map(|(ix, item)| format!("{}. {}", ix + 1, item_content(item)))
                .collect::<Vec<_>>()
                .join("\n"),
            BlockMessage::CodeBlock { code } => {
                let fence = "`".repeat(longest_backtick_run(code).max(2) + 1);
                format!("{fence}\n{code}\n{fence}")
            }
            BlockMessage::Link { .. } => text_content(&[MessageBlock::Block(block.clone())]),
            BlockMessage::Image { url, width, height } => {
                render_image("", url, *width, *height)
            }
            BlockMessage::ImageAttachment { url, width, height } => {
                render_image("attachment", url, *width, *height)
            }
            BlockMessage::ImageGrid { children } => self.render_fence("image-grid", children),
            BlockMessage::Attachments { children } => self.render_fence("attachments", children),
            BlockMessage::Table { header, rows } => {
                let mut lines = vec![render_row(header)];
                lines.push(if header.is_empty() {
                    "|".to_string()
                } else {
                    format!("|{}", " --- |".repeat(header.len()))
                });
                lines.extend(rows.iter().map(|row| render_row(row)));
                lines.join("\n")
            }
            BlockMessage::HorizontalDivider => "---".to_string(),
        }
    }

    /// A quote of whole blocks: a bare `>` line, then the blocks' own markup
    /// with every line quoted.
    fn render_block_quote(&self, children: &[MessageBlock]) -> String {
        let mut lines = vec![">".to_string()];
        lines.extend(self.to_markup(children).split('\n').map(|line| {
            if line.is_empty() {
                ">".to_string()
            } else {
                format!("> {line}")
            }
        }));
        lines.join("\n")
    }

    fn render_fence(&self, name: &str, children: &[MessageBlock]) -> String {
        let mut lines = vec![format!(":::{name}")];
        for child in children {
            lines.push(self.render_block(child));
        }
        lines.push(":::".to_string());
        lines.join("\n")
    }

    fn render_unknown(&self, unknown: &UnknownMessage) -> String {
        let Some(marker) = self.marker_for(&unknown.type_name) else {
            return placeholder(&unknown.type_name);
        };
        let children: Vec<MessageBlock> = unknown
            .fields
            .get("children")
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
            .unwrap_or_default();
        let body = text_content(&children);
        if body.is_empty() {
            marker.to_string()
        } else {
            format!("{marker} {body}")
        }
    }

    fn parse_block(&self, lines: &[&str], i: usize) -> (MessageBlock, usize) {
        let line = lines[i];

        if is_code_fence(line) {
            let close = (i + 1..lines.len())
                .find(|&j| lines[j] == line)
                .unwrap_or(lines.len());
            let code = lines[i + 1..close].join("\n");
            return (block(BlockMessage::CodeBlock { code }), close + 1);
        }
        if line == "---" {
            return (block(BlockMessage::HorizontalDivider), i + 1);
        }
        if let Some(name) = line.strip_prefix(":::").filter(|name| !name.is_empty()) {
            let close = (i + 1..lines.len())
                .find(|&j| lines[j] == ":::")
                .unwrap_or(lines.len());
            let children: Vec<MessageBlock> = lines[i + 1..close]
                .iter()
                .filter_map(|l| parse_image(l))
                .collect();
            let parsed = match name {
                "image-grid" => block(BlockMessage::ImageGrid { children }),
                "attachments" => block(BlockMessage::Attachments { children }),
                other => MessageBlock::unknown(other),
            };
            return (parsed, close + 1);
        }
        if let Some(image) = parse_image(line) {
            return (image, i + 1);
        }
        if let Some(caps) = unsupported().captures(line) {
            return (MessageBlock::unknown(&caps[1]), i + 1);
        }

        let end = (i..lines.len())
            .find(|&j| lines[j].trim().is_empty())
            .unwrap_or(lines.len());
        let body = &lines[i..end];
        let rest = || body[1..].iter().map(|l| format!("\n{l}")).collect::<String>();

        let parsed = if line.starts_with('|') {
            parse_table(body)
        } else if let Some(first) = line.strip_prefix("### ") {
            block(BlockMessage::Heading3 {
                children: Some(parse_inline(&(first.to_string() + &rest()))),
            })
        } else if let Some(first) = line.strip_prefix("## ") {
            block(BlockMessage::Heading2 {
                children: Some(parse_inline(&(first.to_string() + &rest()))),
            })
        } else if let Some(first) = line.strip_prefix("# ") {
            block(BlockMessage::Heading1 {
                children: Some(parse_inline(&(first.to_string() + &rest()))),
            })
        } else if line == ">" {
            let inner = body[1..]
                .iter()
                .map(|&l| l.strip_prefix("> ").or_else(|| l.strip_prefix('>')).unwrap_or(l))
                .collect::<Vec<_>>()
                .join("\n");
            block(BlockMessage::Quote {
                children: Some(self.from_markup(&inner)),
            })
        } else if line.starts_with("> ") {
            block(BlockMessage::Quote {
                children: Some(parse_inline(&strip_lines("> ", body))),
            })
        } else if line.starts_with("!> ") {
            block(BlockMessage::Callout {
                children: Some(parse_inline(&strip_lines("!> ", body))),
            })
        } else if line.starts_with("- ") {
            block(BlockMessage::BulletedList {
                children: parse_items(body, |l| l.strip_prefix("- ")),
            })
        } else if numbered_item().is_match(line) {
            block(BlockMessage::NumberedList {
                children: parse_items(body, |l| {
                    numbered_item().find(l).map(|m| &l[m.end()..])
                }),
            })
        } else if let Some(parsed) = self.parse_registered(body) {
            parsed
        } else {
            block(BlockMessage::Paragraph {
                children: Some(parse_inline(&body.join("\n"))),
            })
        };
        (parsed, end)
    }

    fn parse_registered(&self, body: &[&str]) -> Option<MessageBlock> {
        let line = body.first()?;
        let (marker, tag) = self.markers.iter().find(|(marker, _)| {
            *line == marker.as_str()
                || line
                    .strip_prefix(marker.as_str())
                    .is_some_and(|rest| rest.starts_with(' '))
        })?;
        let mut text = line[marker.len()..].trim_start_matches(' ').to_string();
        for l in &body[1..] {
            text.push('\n');
            text.push_str(l);
        }
        let mut fields = Map::new();
        if !text.is_empty() {
            if let Ok(children) = serde_json::to_value(parse_inline(&text)) {
                fields.insert("children".to_string(), children);
            }
        }
        Some(MessageBlock::Unknown(UnknownMessage {
            type_name: tag.clone(),
            fields,
        }))
    }
}

fn block(block: BlockMessage) -> MessageBlock {
    MessageBlock::Block(block)
}

fn placeholder(type_name: &str) -> String {
    format!("[unsupported: {type_name}]")
}

fn content(children: &Option<Vec<MessageBlock>>) -> String {
    text_content(children.as_deref().unwrap_or_default())
}

/// Whether a quote's children are blocks rather than inline content.
fn holds_blocks(children: &Option<Vec<MessageBlock>>) -> bool {
    children.as_deref().unwrap_or_default().iter().any(|child| {
        matches!(child, MessageBlock::Block(inner) if !matches!(inner, BlockMessage::Link { .. }))
    })
}

fn item_content(item: &MessageBlock) -> String {
    match item {
        MessageBlock::Block(BlockMessage::ListItem { children }) => content(children),
        other => text_content(std::slice::from_ref(other)),
    }
}

/// Inline markup for `nodes` with every line start made unambiguous.
fn text_content(nodes: &[MessageBlock]) -> String {
    escape_line_starts(&render_inline(nodes))
}

fn render_inline(nodes: &[MessageBlock]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            MessageBlock::Leaf(leaf) => render_leaf(&mut out, leaf),
            MessageBlock::Block(BlockMessage::Link {
                url,
                label,
                children,
            }) => {
                let label = match children {
                    Some(children) => render_inline(children),
                    None => escape_inline(label.as_deref().unwrap_or(url)),
                };
                out.push('[');
                out.push_str(&label);
                out.push_str("](");
                out.push_str(&escape_url(url));
                out.push(')');
            }
            other => out.push_str(&placeholder(other.type_name().unwrap_or("text"))),
        }
    }
    out
}

fn render_leaf(out: &mut String, leaf: &MessageLeaf) {
    let marks = leaf.marks();
    let openers: Vec<&str> = [
        (marks.bold, "**"),
        (marks.italic, "_"),
        (marks.strikethrough, "~~"),
    ]
    .into_iter()
    .filter_map(|(on, marker)| on.then_some(marker))
    .collect();
    for marker in &openers {
        out.push_str(marker);
    }
    out.push_str(&escape_inline(&leaf.text));
    for marker in openers.iter().rev() {
        out.push_str(marker);
    }
}

fn escape_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if INLINE_SPECIALS.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_url(url: &str) -> String {
    url.replace('\\', "\\\\").replace(')', "\\)")
}

fn escape_line_starts(text: &str) -> String {
    text.split('\n')
        .map(|line| {
            if line.starts_with(LINE_START_SPECIALS) {
                format!("\\{line}")
            } else if let Some(m) = numbered_item().find(line) {
                let dot = m.end() - 2;
                format!("{}\\{}", &line[..dot], &line[dot..])
            } else {
                line.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn prefix_lines(prefix: &str, text: &str) -> String {
    text.split('\n')
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_lines(prefix: &str, body: &[&str]) -> String {
    body.iter()
        .map(|line| line.strip_prefix(prefix).unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn longest_backtick_run(code: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for c in code.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

fn is_code_fence(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| c == '`')
}

fn render_image(alt: &str, url: &str, width: Option<u32>, height: Option<u32>) -> String {
    let size = match (width, height) {
        (None, None) => String::new(),
        (w, h) => format!(
            " ={}x{}",
            w.map(|w| w.to_string()).unwrap_or_default(),
            h.map(|h| h.to_string()).unwrap_or_default()
        ),
    };
    format!("![{alt}]({}{size})", escape_url(url))
}

fn parse_image(line: &str) -> Option<MessageBlock> {
    let caps = image_line().captures(line)?;
    let attachment = caps.get(1).is_some();
    let inner = caps.get(2).map_or("", |m| m.as_str());
    let (raw_url, width, height) = match image_size().captures(inner) {
        Some(size) => (
            size.get(1).map_or("", |m| m.as_str()),
            size[2].parse().ok(),
            size[3].parse().ok(),
        ),
        None => (inner, None, None),
    };
    let url = unescape(raw_url);
    Some(block(if attachment {
        BlockMessage::ImageAttachment { url, width, height }
    } else {
        BlockMessage::Image { url, width, height }
    }))
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn render_row(cells: &[String]) -> String {
    if cells.is_empty() {
        return "|".to_string();
    }
    let cells: Vec<String> = cells.iter().map(|cell| escape_cell(cell)).collect();
    format!("| {} |", cells.join(" | "))
}

fn escape_cell(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    for c in cell.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '|' => out.push_str("\\|"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

fn split_row(line: &str) -> Vec<String> {
    let Some(inner) = line.strip_prefix('|') else {
        return Vec::new();
    };
    let mut cells = Vec::new();
    let mut cell = String::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => cell.push('\n'),
                Some(next) => cell.push(next),
                None => cell.push('\\'),
            },
            '|' => cells.push(std::mem::take(&mut cell)),
            c => cell.push(c),
        }
    }
    // Text after the closing pipe is not a cell.
    cells
        .into_iter()
        .map(|cell| {
            let cell = cell.strip_prefix(' ').unwrap_or(&cell);
            cell.strip_suffix(' ').unwrap_or(cell).to_string()
        })
        .collect()
}

fn parse_table(body: &[&str]) -> MessageBlock {
    let header = body.first().map(|line| split_row(line)).unwrap_or_default();
    let rows = body.iter().skip(2).map(|line| split_row(line)).collect();
    block(BlockMessage::Table { header, rows })
}

fn parse_items<'a>(
    body: &[&'a str],
    item_start: impl Fn(&'a str) -> Option<&'a str>,
) -> Vec<MessageBlock> {
    let mut items: Vec<String> = Vec::new();
    for line in body {
        match (item_start(*line), items.last_mut()) {
            (Some(first), _) => items.push(first.to_string()),
            (None, Some(current)) => {
                current.push('\n');
                current.push_str(line);
            }
            (None, None) => items.push(line.to_string()),
        }
    }
    items
        .iter()
        .map(|text| {
            block(BlockMessage::ListItem {
                children: Some(parse_inline(text)),
            })
        })
        .collect()
}

/// Inline content of one block. Never empty: blank input gives one empty
/// leaf.
fn parse_inline(text: &str) -> Vec<MessageBlock> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = InlineParser::new(Marks::default()).run(&chars);
    if out.is_empty() {
        out.push(MessageBlock::leaf(""));
    }
    out
}

struct InlineParser {
    out: Vec<MessageBlock>,
    buf: String,
    marks: Marks,
}

impl InlineParser {
    fn new(marks: Marks) -> Self {
        Self {
            out: Vec::new(),
            buf: String::new(),
            marks,
        }
    }

    fn flush(&mut self) {
        if !self.buf.is_empty() {
            let text = std::mem::take(&mut self.buf);
            self.out
                .push(MessageBlock::Leaf(MessageLeaf::with_marks(text, self.marks)));
        }
    }

    fn run(mut self, chars: &[char]) -> Vec<MessageBlock> {
        let mut i = 0;
        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match c {
                '\\' if next.is_some() => {
                    self.buf.extend(next);
                    i += 2;
                }
                '*' if next == Some('*') => {
                    self.flush();
                    self.marks.bold = !self.marks.bold;
                    i += 2;
                }
                '~' if next == Some('~') => {
                    self.flush();
                    self.marks.strikethrough = !self.marks.strikethrough;
                    i += 2;
                }
                '_' => {
                    self.flush();
                    self.marks.italic = !self.marks.italic;
                    i += 1;
                }
                '[' => match self.bracket(chars, i) {
                    Some(after) => i = after,
                    None => {
                        self.buf.push('[');
                        i += 1;
                    }
                },
                c => {
                    self.buf.push(c);
                    i += 1;
                }
            }
        }
        self.flush();
        self.out
    }

    /// A link or an inline placeholder starting at `open`. Returns the
    /// index just past it.
    fn bracket(&mut self, chars: &[char], open: usize) -> Option<usize> {
        let close = find_unescaped(chars, open + 1, ']')?;
        let inside = &chars[open + 1..close];
        if chars.get(close + 1) == Some(&'(') {
            let end = find_unescaped(chars, close + 2, ')')?;
            let url = unescape(&chars[close + 2..end].iter().collect::<String>());
            let children = InlineParser::new(self.marks).run(inside);
            let label = children
                .iter()
                .filter_map(|child| match child {
                    MessageBlock::Leaf(leaf) => Some(leaf.text.as_str()),
                    _ => None,
                })
                .collect::<String>();
            self.flush();
            self.out.push(block(BlockMessage::Link {
                url,
                label: Some(label),
                children: Some(children),
            }));
            return Some(end + 1);
        }
        let inside: String = inside.iter().collect();
        let tag = inside.strip_prefix("unsupported: ")?;
        self.flush();
        self.out.push(MessageBlock::unknown(tag));
        Some(close + 1)
    }
}

fn find_unescaped(chars: &[char], from: usize, target: char) -> Option<usize> {
    let mut i = from;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            c if c == target => return Some(i),
            _ => i += 1,
        }
    }
    None
}
