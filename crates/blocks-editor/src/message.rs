//! The flat wire/storage shape of a document, independent of the live
//! editor tree.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::node::{Document, ElementKind, HeadingLevel, Marks, Node, Text};
use crate::plugin::{Capabilities, ChildConstraint};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBlock {
    Leaf(MessageLeaf),
    Block(BlockMessage),
    Unknown(UnknownMessage),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageLeaf {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strikethrough: Option<bool>,
}

impl MessageLeaf {
    pub fn marks(&self) -> Marks {
        Marks {
            bold: self.bold.unwrap_or(false),
            italic: self.italic.unwrap_or(false),
            strikethrough: self.strikethrough.unwrap_or(false),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            bold: marks.bold.then_some(true),
            italic: marks.italic.then_some(true),
            strikethrough: marks.strikethrough.then_some(true),
        }
    }
}

type Children = Option<Vec<MessageBlock>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BlockMessage {
    Paragraph {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    #[serde(rename = "heading-1")]
    Heading1 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    #[serde(rename = "heading-2")]
    Heading2 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    #[serde(rename = "heading-3")]
    Heading3 {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    BulletedList {
        #[serde(default)]
        children: Vec<MessageBlock>,
    },
    NumberedList {
        #[serde(default)]
        children: Vec<MessageBlock>,
    },
    ListItem {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    Quote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    Callout {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    CodeBlock {
        code: String,
    },
    Link {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Children,
    },
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    ImageAttachment {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    ImageGrid {
        #[serde(default)]
        children: Vec<MessageBlock>,
    },
    Attachments {
        #[serde(default)]
        children: Vec<MessageBlock>,
    },
    Table {
        #[serde(default)]
        header: Vec<String>,
        #[serde(default)]
        rows: Vec<Vec<String>>,
    },
    HorizontalDivider,
}

/// A block whose `type` this crate has no mapping for. Every other field is
/// kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnknownMessage {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl MessageBlock {
    pub fn leaf(text: impl Into<String>) -> Self {
        MessageBlock::Leaf(MessageLeaf {
            text: text.into(),
            ..MessageLeaf::default()
        })
    }

    pub fn paragraph(children: Vec<MessageBlock>) -> Self {
        MessageBlock::Block(BlockMessage::Paragraph {
            children: Some(children),
        })
    }

    pub fn unknown(type_name: impl Into<String>) -> Self {
        MessageBlock::Unknown(UnknownMessage {
            type_name: type_name.into(),
            fields: Map::new(),
        })
    }

    /// The `type` discriminant; `None` for leaves.
    pub fn type_name(&self) -> Option<&str> {
        match self {
            MessageBlock::Leaf(_) => None,
            MessageBlock::Block(block) => Some(block.type_name()),
            MessageBlock::Unknown(unknown) => Some(&unknown.type_name),
        }
    }
}

impl BlockMessage {
    pub fn type_name(&self) -> &'static str {
        match self {
            BlockMessage::Paragraph { .. } => "paragraph",
            BlockMessage::Heading1 { .. } => "heading-1",
            BlockMessage::Heading2 { .. } => "heading-2",
            BlockMessage::Heading3 { .. } => "heading-3",
            BlockMessage::BulletedList { .. } => "bulleted-list",
            BlockMessage::NumberedList { .. } => "numbered-list",
            BlockMessage::ListItem { .. } => "list-item",
            BlockMessage::Quote { .. } => "quote",
            BlockMessage::Callout { .. } => "callout",
            BlockMessage::CodeBlock { .. } => "code-block",
            BlockMessage::Link { .. } => "link",
            BlockMessage::Image { .. } => "image",
            BlockMessage::ImageAttachment { .. } => "image-attachment",
            BlockMessage::ImageGrid { .. } => "image-grid",
            BlockMessage::Attachments { .. } => "attachments",
            BlockMessage::Table { .. } => "table",
            BlockMessage::HorizontalDivider => "horizontal-divider",
        }
    }
}

/// Decode a JSON array of blocks.
pub fn from_json_str(s: &str) -> Result<Vec<MessageBlock>, serde_json::Error> {
    serde_json::from_str(s)
}

pub fn to_json_string(blocks: &[MessageBlock]) -> Result<String, serde_json::Error> {
    serde_json::to_string(blocks)
}

/// Build a (not yet normalized) tree from wire blocks. Children of tags a
/// plugin registered as containers are decoded; every other unknown tag
/// keeps its fields verbatim and no children.
pub fn to_document(blocks: &[MessageBlock], capabilities: &Capabilities) -> Document {
    Document::new(
        blocks
            .iter()
            .map(|block| to_node(block, capabilities))
            .collect(),
    )
}

fn to_nodes(children: &[MessageBlock], capabilities: &Capabilities) -> Vec<Node> {
    children
        .iter()
        .map(|child| to_node(child, capabilities))
        .collect()
}

fn text_block(kind: ElementKind, children: &Children, capabilities: &Capabilities) -> Node {
    match children {
        Some(children) => Node::element(kind, to_nodes(children, capabilities)),
        // A block that lost its children decodes to a bare leaf.
        None => Node::text(""),
    }
}

pub fn to_node(block: &MessageBlock, capabilities: &Capabilities) -> Node {
    let block = match block {
        MessageBlock::Leaf(leaf) => return Node::Text(Text::with_marks(leaf.text.clone(), leaf.marks())),
        MessageBlock::Unknown(unknown) => return unknown_to_node(unknown, capabilities),
        MessageBlock::Block(block) => block,
    };
    match block {
        BlockMessage::Paragraph { children } => text_block(ElementKind::Paragraph, children, capabilities),
        BlockMessage::Heading1 { children } => {
            text_block(ElementKind::Heading(HeadingLevel::One), children, capabilities)
        }
        BlockMessage::Heading2 { children } => {
            text_block(ElementKind::Heading(HeadingLevel::Two), children, capabilities)
        }
        BlockMessage::Heading3 { children } => {
            text_block(ElementKind::Heading(HeadingLevel::Three), children, capabilities)
        }
        BlockMessage::ListItem { children } => text_block(ElementKind::ListItem, children, capabilities),
        BlockMessage::Quote { children } => text_block(ElementKind::Quote, children, capabilities),
        BlockMessage::Callout { children } => text_block(ElementKind::Callout, children, capabilities),
        BlockMessage::BulletedList { children } => {
            Node::element(ElementKind::BulletedList, to_nodes(children, capabilities))
        }
        BlockMessage::NumberedList { children } => {
            Node::element(ElementKind::NumberedList, to_nodes(children, capabilities))
        }
        BlockMessage::ImageGrid { children } => {
            Node::element(ElementKind::ImageGrid, to_nodes(children, capabilities))
        }
        BlockMessage::Attachments { children } => {
            Node::element(ElementKind::Attachments, to_nodes(children, capabilities))
        }
        BlockMessage::CodeBlock { code } => {
            Node::element(ElementKind::CodeBlock { code: code.clone() }, Vec::new())
        }
        BlockMessage::Link {
            url,
            label,
            children,
        } => {
            let children = children
                .as_deref()
                .map(|children| to_nodes(children, capabilities))
                .unwrap_or_default();
            let label = match label {
                Some(label) => label.clone(),
                None if !children.is_empty() => children.iter().map(Node::string).collect(),
                None => url.clone(),
            };
            Node::element(
                ElementKind::Link {
                    url: url.clone(),
                    label,
                },
                children,
            )
        }
        BlockMessage::Image { url, width, height } => Node::element(
            ElementKind::Image {
                url: url.clone(),
                width: *width,
                height: *height,
            },
            Vec::new(),
        ),
        BlockMessage::ImageAttachment { url, width, height } => Node::element(
            ElementKind::ImageAttachment {
                url: url.clone(),
                width: *width,
                height: *height,
            },
            Vec::new(),
        ),
        BlockMessage::Table { header, rows } => Node::element(
            ElementKind::Table {
                header: header.clone(),
                rows: rows.clone(),
            },
            Vec::new(),
        ),
        BlockMessage::HorizontalDivider => Node::divider(),
    }
}

fn unknown_to_node(unknown: &UnknownMessage, capabilities: &Capabilities) -> Node {
    let holds_children = capabilities
        .spec(&unknown.type_name)
        .is_some_and(|spec| spec.children != ChildConstraint::None);
    let mut data = unknown.fields.clone();
    let mut children = Vec::new();
    if holds_children {
        if let Some(Value::Array(raw)) = data.remove("children") {
            for item in raw {
                match serde_json::from_value::<MessageBlock>(item) {
                    Ok(block) => children.push(to_node(&block, capabilities)),
                    Err(err) => {
                        tracing::warn!(tag = %unknown.type_name, %err, "dropping undecodable child");
                    }
                }
            }
        }
    }
    Node::element(
        ElementKind::Other {
            tag: unknown.type_name.clone(),
            data,
        },
        children,
    )
}

pub fn from_document(doc: &Document) -> Vec<MessageBlock> {
    doc.children.iter().map(from_node).collect()
}

fn from_nodes(children: &[Node]) -> Vec<MessageBlock> {
    children.iter().map(from_node).collect()
}

pub fn from_node(node: &Node) -> MessageBlock {
    let el = match node {
        Node::Text(t) => return MessageBlock::Leaf(MessageLeaf::with_marks(t.text.clone(), t.marks)),
        Node::Element(el) => el,
    };
    let children = || Some(from_nodes(&el.children));
    let block = match &el.kind {
        ElementKind::Paragraph => BlockMessage::Paragraph {
            children: children(),
        },
        ElementKind::Heading(HeadingLevel::One) => BlockMessage::Heading1 {
            children: children(),
        },
        ElementKind::Heading(HeadingLevel::Two) => BlockMessage::Heading2 {
            children: children(),
        },
        ElementKind::Heading(HeadingLevel::Three) => BlockMessage::Heading3 {
            children: children(),
        },
        ElementKind::ListItem => BlockMessage::ListItem {
            children: children(),
        },
        ElementKind::Quote => BlockMessage::Quote {
            children: children(),
        },
        ElementKind::Callout => BlockMessage::Callout {
            children: children(),
        },
        ElementKind::BulletedList => BlockMessage::BulletedList {
            children: from_nodes(&el.children),
        },
        ElementKind::NumberedList => BlockMessage::NumberedList {
            children: from_nodes(&el.children),
        },
        ElementKind::ImageGrid => BlockMessage::ImageGrid {
            children: from_nodes(&el.children),
        },
        ElementKind::Attachments => BlockMessage::Attachments {
            children: from_nodes(&el.children),
        },
        ElementKind::CodeBlock { code } => BlockMessage::CodeBlock { code: code.clone() },
        ElementKind::Link { url, label } => BlockMessage::Link {
            url: url.clone(),
            label: Some(label.clone()),
            children: children(),
        },
        ElementKind::Image { url, width, height } => BlockMessage::Image {
            url: url.clone(),
            width: *width,
            height: *height,
        },
        ElementKind::ImageAttachment { url, width, height } => BlockMessage::ImageAttachment {
            url: url.clone(),
            width: *width,
            height: *height,
        },
        ElementKind::Table { header, rows } => BlockMessage::Table {
            header: header.clone(),
            rows: rows.clone(),
        },
        ElementKind::HorizontalDivider => BlockMessage::HorizontalDivider,
        ElementKind::Other { tag, data } => {
            let mut fields = data.clone();
            if !el.children.is_empty() {
                let encoded = from_nodes(&el.children)
                    .iter()
                    .filter_map(|child| serde_json::to_value(child).ok())
                    .collect();
                fields.insert("children".to_string(), Value::Array(encoded));
            }
            return MessageBlock::Unknown(UnknownMessage {
                type_name: tag.clone(),
                fields,
            });
        }
    };
    MessageBlock::Block(block)
}
