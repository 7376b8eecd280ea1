use serde_json::{Map, Value};

use crate::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Marks {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
}

impl Marks {
    pub const BOLD: Marks = Marks {
        bold: true,
        italic: false,
        strikethrough: false,
    };
    pub const ITALIC: Marks = Marks {
        bold: false,
        italic: true,
        strikethrough: false,
    };
    pub const STRIKETHROUGH: Marks = Marks {
        bold: false,
        italic: false,
        strikethrough: true,
    };

    pub fn is_plain(&self) -> bool {
        *self == Marks::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Bold,
    Italic,
    Strikethrough,
}

impl Mark {
    pub fn get(self, marks: &Marks) -> bool {
        match self {
            Mark::Bold => marks.bold,
            Mark::Italic => marks.italic,
            Mark::Strikethrough => marks.strikethrough,
        }
    }

    pub fn set(self, marks: &mut Marks, value: bool) {
        match self {
            Mark::Bold => marks.bold = value,
            Mark::Italic => marks.italic = value,
            Mark::Strikethrough => marks.strikethrough = value,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Text {
    pub text: String,
    pub marks: Marks,
}

impl Text {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            marks: Marks::default(),
        }
    }

    pub fn with_marks(text: impl Into<String>, marks: Marks) -> Self {
        Self {
            text: text.into(),
            marks,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadingLevel {
    One,
    Two,
    Three,
}

impl HeadingLevel {
    pub fn depth(&self) -> usize {
        match self {
            HeadingLevel::One => 1,
            HeadingLevel::Two => 2,
            HeadingLevel::Three => 3,
        }
    }

    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            1 => Some(HeadingLevel::One),
            2 => Some(HeadingLevel::Two),
            3 => Some(HeadingLevel::Three),
            _ => None,
        }
    }
}

/// Every element type the editor knows about.
///
/// `Other` is the single escape hatch: tags registered by plugins, and
/// unknown wire content that has to survive a round trip untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    Paragraph,
    Heading(HeadingLevel),
    BulletedList,
    NumberedList,
    ListItem,
    Quote,
    Callout,
    CodeBlock {
        code: String,
    },
    Table {
        header: Vec<String>,
        rows: Vec<Vec<String>>,
    },
    HorizontalDivider,
    ImageGrid,
    Attachments,
    Link {
        url: String,
        label: String,
    },
    Image {
        url: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    ImageAttachment {
        url: String,
        width: Option<u32>,
        height: Option<u32>,
    },
    Other {
        tag: String,
        data: Map<String, Value>,
    },
}

/// How the built-in rule chains treat an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    ParagraphLike,
    List,
    Media,
    Link,
    Terminal,
    Other,
}

impl ElementKind {
    pub fn tag(&self) -> &str {
        match self {
            ElementKind::Paragraph => "paragraph",
            ElementKind::Heading(HeadingLevel::One) => "heading-1",
            ElementKind::Heading(HeadingLevel::Two) => "heading-2",
            ElementKind::Heading(HeadingLevel::Three) => "heading-3",
            ElementKind::BulletedList => "bulleted-list",
            ElementKind::NumberedList => "numbered-list",
            ElementKind::ListItem => "list-item",
            ElementKind::Quote => "quote",
            ElementKind::Callout => "callout",
            ElementKind::CodeBlock { .. } => "code-block",
            ElementKind::Table { .. } => "table",
            ElementKind::HorizontalDivider => "horizontal-divider",
            ElementKind::ImageGrid => "image-grid",
            ElementKind::Attachments => "attachments",
            ElementKind::Link { .. } => "link",
            ElementKind::Image { .. } => "image",
            ElementKind::ImageAttachment { .. } => "image-attachment",
            ElementKind::Other { tag, .. } => tag,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            ElementKind::Paragraph
            | ElementKind::Heading(_)
            | ElementKind::ListItem
            | ElementKind::Quote
            | ElementKind::Callout => Category::ParagraphLike,
            ElementKind::BulletedList | ElementKind::NumberedList => Category::List,
            ElementKind::ImageGrid | ElementKind::Attachments => Category::Media,
            ElementKind::Link { .. } => Category::Link,
            ElementKind::CodeBlock { .. }
            | ElementKind::Table { .. }
            | ElementKind::HorizontalDivider
            | ElementKind::Image { .. }
            | ElementKind::ImageAttachment { .. } => Category::Terminal,
            ElementKind::Other { .. } => Category::Other,
        }
    }

    pub fn is_paragraph_like(&self) -> bool {
        self.category() == Category::ParagraphLike
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            ElementKind::Image { .. } | ElementKind::ImageAttachment { .. }
        )
    }

    /// Whether two kinds are the same element type, ignoring their fields.
    pub fn same_type(&self, other: &ElementKind) -> bool {
        self.tag() == other.tag()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub kind: ElementKind,
    pub children: Vec<Node>,
}

impl Element {
    pub fn new(kind: ElementKind, children: Vec<Node>) -> Self {
        Self { kind, children }
    }

    /// Concatenated text of every leaf below this element.
    pub fn string(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            child.push_string(&mut out);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(Text),
}

impl Node {
    pub fn text(text: impl Into<String>) -> Self {
        Node::Text(Text::new(text))
    }

    pub fn leaf(text: impl Into<String>, marks: Marks) -> Self {
        Node::Text(Text::with_marks(text, marks))
    }

    pub fn element(kind: ElementKind, children: Vec<Node>) -> Self {
        Node::Element(Element::new(kind, children))
    }

    pub fn paragraph(text: impl Into<String>) -> Self {
        Node::element(ElementKind::Paragraph, vec![Node::text(text)])
    }

    pub fn link(url: impl Into<String>, label: impl Into<String>) -> Self {
        let label = label.into();
        Node::element(
            ElementKind::Link {
                url: url.into(),
                label: label.clone(),
            },
            vec![Node::text(label)],
        )
    }

    pub fn image(url: impl Into<String>) -> Self {
        Node::element(
            ElementKind::Image {
                url: url.into(),
                width: None,
                height: None,
            },
            Vec::new(),
        )
    }

    pub fn divider() -> Self {
        Node::element(ElementKind::HorizontalDivider, Vec::new())
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Node::Text(t) => Some(t),
            Node::Element(_) => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            Node::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }

    pub fn kind(&self) -> Option<&ElementKind> {
        self.as_element().map(|el| &el.kind)
    }

    pub fn children(&self) -> &[Node] {
        match self {
            Node::Element(el) => &el.children,
            Node::Text(_) => &[],
        }
    }

    pub fn children_mut(&mut self) -> Option<&mut Vec<Node>> {
        match self {
            Node::Element(el) => Some(&mut el.children),
            Node::Text(_) => None,
        }
    }

    pub fn string(&self) -> String {
        let mut out = String::new();
        self.push_string(&mut out);
        out
    }

    fn push_string(&self, out: &mut String) {
        match self {
            Node::Text(t) => out.push_str(&t.text),
            Node::Element(el) => {
                for child in &el.children {
                    child.push_string(out);
                }
            }
        }
    }

    pub fn get(&self, path: &[usize]) -> Option<&Node> {
        let mut node = self;
        for &ix in path {
            node = node.children().get(ix)?;
        }
        Some(node)
    }

    /// Length used when this node is the left side of a merge: text bytes
    /// for a leaf, child count for an element.
    pub fn merge_position(&self) -> usize {
        match self {
            Node::Text(t) => t.text.len(),
            Node::Element(el) => el.children.len(),
        }
    }

    /// Every descendant path (relative to this node), parents before
    /// children.
    pub fn descendant_paths(&self) -> Vec<Path> {
        fn walk(node: &Node, prefix: &mut Path, out: &mut Vec<Path>) {
            for (ix, child) in node.children().iter().enumerate() {
                prefix.push(ix);
                out.push(prefix.clone());
                walk(child, prefix, out);
                prefix.pop();
            }
        }
        let mut out = Vec::new();
        walk(self, &mut Vec::new(), &mut out);
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub children: Vec<Node>,
}

impl Default for Document {
    fn default() -> Self {
        Self {
            children: vec![Node::paragraph("")],
        }
    }
}

impl Document {
    pub fn new(children: Vec<Node>) -> Self {
        Self { children }
    }

    pub fn node(&self, path: &[usize]) -> Option<&Node> {
        let (first, rest) = path.split_first()?;
        self.children.get(*first)?.get(rest)
    }

    pub fn node_mut(&mut self, path: &[usize]) -> Option<&mut Node> {
        let (first, rest) = path.split_first()?;
        let mut node = self.children.get_mut(*first)?;
        for &ix in rest {
            node = node.children_mut()?.get_mut(ix)?;
        }
        Some(node)
    }

    pub fn element(&self, path: &[usize]) -> Option<&Element> {
        self.node(path).and_then(Node::as_element)
    }

    pub fn text(&self, path: &[usize]) -> Option<&Text> {
        self.node(path).and_then(Node::as_text)
    }

    /// Children of the node at `parent`; the empty path addresses the root.
    pub fn children_at(&self, parent: &[usize]) -> Option<&[Node]> {
        if parent.is_empty() {
            return Some(&self.children);
        }
        match self.node(parent)? {
            Node::Element(el) => Some(&el.children),
            Node::Text(_) => None,
        }
    }

    pub fn children_at_mut(&mut self, parent: &[usize]) -> Option<&mut Vec<Node>> {
        if parent.is_empty() {
            return Some(&mut self.children);
        }
        self.node_mut(parent)?.children_mut()
    }

    pub fn has(&self, path: &[usize]) -> bool {
        self.node(path).is_some()
    }

    pub fn string(&self) -> String {
        self.children
            .iter()
            .map(Node::string)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Every node path in the document, parents before children.
    pub fn all_paths(&self) -> Vec<Path> {
        let mut out = Vec::new();
        for (ix, child) in self.children.iter().enumerate() {
            out.push(vec![ix]);
            for rest in child.descendant_paths() {
                let mut path = vec![ix];
                path.extend(rest);
                out.push(path);
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_lookup_walks_nested_children() {
        let doc = Document::new(vec![
            Node::paragraph("a"),
            Node::element(
                ElementKind::Paragraph,
                vec![Node::text("b "), Node::link("http://x.io", "http://x.io")],
            ),
        ]);

        assert_eq!(doc.text(&[1, 0]).unwrap().text, "b ");
        assert_eq!(doc.text(&[1, 1, 0]).unwrap().text, "http://x.io");
        assert!(doc.node(&[1, 2]).is_none());
        assert!(doc.node(&[]).is_none());
        assert_eq!(doc.children_at(&[]).unwrap().len(), 2);
        assert_eq!(doc.string(), "a\nb http://x.io");
    }

    #[test]
    fn descendant_paths_are_pre_order() {
        let node = Node::element(
            ElementKind::Paragraph,
            vec![Node::text("a"), Node::link("u", "u")],
        );
        assert_eq!(node.descendant_paths(), vec![vec![0], vec![1], vec![1, 0]]);
    }
}
