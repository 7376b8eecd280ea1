use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EditorConfig;
use crate::core::Editor;
use crate::error::{ConfigurationError, Result};
use crate::node::{Category, Document, Element, ElementKind, Node};
use crate::normalize::{self, Rewrite};
use crate::path::Range;
use crate::plugins::{ImagePlugin, LinkPlugin, ListPlugin, MarksPlugin};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Block,
    Inline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildConstraint {
    None,
    BlockOnly,
    InlineOnly,
    Any,
}

/// Structural predicates for one element tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSpec {
    pub tag: String,
    pub role: NodeRole,
    pub is_void: bool,
    pub children: ChildConstraint,
    /// Line prefix used by the plain-text markup for this tag.
    pub markup: Option<String>,
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>, role: NodeRole, children: ChildConstraint) -> Self {
        Self {
            tag: tag.into(),
            role,
            is_void: children == ChildConstraint::None,
            children,
            markup: None,
        }
    }

    pub fn markup(mut self, marker: impl Into<String>) -> Self {
        self.markup = Some(marker.into());
        self
    }
}

/// The `is_block` / `is_inline` / `is_void` table. Built-in kinds answer
/// from their type unless a plugin registered a spec for the same tag.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    specs: HashMap<String, NodeSpec>,
}

impl Capabilities {
    pub fn spec(&self, tag: &str) -> Option<&NodeSpec> {
        self.specs.get(tag)
    }

    pub fn specs(&self) -> impl Iterator<Item = &NodeSpec> {
        self.specs.values()
    }

    pub fn is_inline(&self, kind: &ElementKind) -> bool {
        match self.specs.get(kind.tag()) {
            Some(spec) => spec.role == NodeRole::Inline,
            None => kind.category() == Category::Link,
        }
    }

    pub fn is_block(&self, kind: &ElementKind) -> bool {
        !self.is_inline(kind)
    }

    pub fn is_void(&self, kind: &ElementKind) -> bool {
        match self.specs.get(kind.tag()) {
            Some(spec) => spec.is_void,
            None => match kind {
                ElementKind::Image { .. }
                | ElementKind::ImageAttachment { .. }
                | ElementKind::HorizontalDivider => true,
                // Tags nobody registered are kept as opaque atoms.
                ElementKind::Other { .. } => true,
                _ => false,
            },
        }
    }

    /// Whether `el` is a quote used as a container: one holding paragraphs
    /// or lists rather than inline text.
    pub fn is_block_quote(&self, el: &Element) -> bool {
        el.kind == ElementKind::Quote
            && el
                .children
                .iter()
                .any(|child| child.kind().is_some_and(|kind| self.is_block(kind)))
    }

    pub fn child_constraint(&self, kind: &ElementKind) -> ChildConstraint {
        if let Some(spec) = self.specs.get(kind.tag()) {
            return spec.children;
        }
        match kind.category() {
            Category::ParagraphLike | Category::Link => ChildConstraint::InlineOnly,
            Category::List | Category::Media => ChildConstraint::BlockOnly,
            Category::Terminal => ChildConstraint::None,
            Category::Other => ChildConstraint::Any,
        }
    }
}

/// What a normalizer sees: the document as it is right now.
pub struct NormalizeContext<'a> {
    pub doc: &'a Document,
    pub selection: Option<&'a Range>,
    pub capabilities: &'a Capabilities,
    pub config: &'a EditorConfig,
}

impl NormalizeContext<'_> {
    /// Whether any selection point lies inside the node at `path`.
    pub fn selection_inside(&self, path: &[usize]) -> bool {
        self.selection.is_some_and(|range| {
            range
                .points()
                .iter()
                .any(|point| point.path.starts_with(path))
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NodeEntry<'a> {
    pub node: &'a Node,
    pub path: &'a [usize],
}

/// A `normalizeNode` override. Implementations either return a rewrite or
/// hand the entry to `next`, which runs the remaining overrides and then
/// the built-in rules.
pub trait NormalizeNode: Send + Sync {
    fn id(&self) -> &'static str;
    fn normalize_node(
        &self,
        cx: &NormalizeContext<'_>,
        entry: NodeEntry<'_>,
        next: Next<'_>,
    ) -> Option<Rewrite>;
}

pub struct Next<'a> {
    rest: &'a [Box<dyn NormalizeNode>],
}

impl Next<'_> {
    pub fn run(self, cx: &NormalizeContext<'_>, entry: NodeEntry<'_>) -> Option<Rewrite> {
        match self.rest.split_first() {
            Some((first, rest)) => first.normalize_node(cx, entry, Next { rest }),
            None => normalize::default_normalize(cx, entry),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    pub key: String,
    /// Ctrl on most platforms, Cmd on macOS.
    pub primary: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyPress {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            primary: false,
            shift: false,
            alt: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn is(&self, key: &str) -> bool {
        self.key.eq_ignore_ascii_case(key)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorEvent {
    KeyDown(KeyPress),
    Paste(String),
    BeforeInput(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    KeyDown,
    Paste,
    BeforeInput,
}

impl EditorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EditorEvent::KeyDown(_) => EventKind::KeyDown,
            EditorEvent::Paste(_) => EventKind::Paste,
            EditorEvent::BeforeInput(_) => EventKind::BeforeInput,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventFlow {
    Continue,
    Handled,
}

pub type EventHandlerFn = Arc<dyn Fn(&mut Editor, &EditorEvent) -> Result<EventFlow> + Send + Sync>;

#[derive(Clone)]
pub struct EventHandler {
    pub kind: EventKind,
    pub handler: EventHandlerFn,
}

impl EventHandler {
    pub fn new(
        kind: EventKind,
        handler: impl Fn(&mut Editor, &EditorEvent) -> Result<EventFlow> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            handler: Arc::new(handler),
        }
    }
}

/// Renderer component key for an element tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandler {
    pub tag: String,
    pub component: String,
}

impl ElementHandler {
    pub fn new(tag: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            component: component.into(),
        }
    }
}

pub trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;
    fn node_specs(&self) -> Vec<NodeSpec> {
        Vec::new()
    }
    fn elements(&self) -> Vec<ElementHandler> {
        Vec::new()
    }
    fn normalizers(&self) -> Vec<Box<dyn NormalizeNode>> {
        Vec::new()
    }
    fn event_handlers(&self) -> Vec<EventHandler> {
        Vec::new()
    }
}

/// Plugins composed once, in a fixed precedence order.
#[derive(Default)]
pub struct Pipeline {
    plugin_ids: Vec<&'static str>,
    capabilities: Capabilities,
    normalizers: Vec<Box<dyn NormalizeNode>>,
    elements: HashMap<String, (&'static str, String)>,
    handlers: HashMap<EventKind, Vec<EventHandlerFn>>,
}

impl Pipeline {
    /// Compose `plugins` in precedence order: the first plugin's
    /// normalizer runs first and wraps every later one; the last sits
    /// directly above the built-in rules. Event handlers fire in the same
    /// order.
    pub fn compose(
        plugins: impl IntoIterator<Item = Box<dyn Plugin>>,
    ) -> std::result::Result<Self, ConfigurationError> {
        let mut pipeline = Self::default();
        let mut spec_owner: HashMap<String, &'static str> = HashMap::new();

        for plugin in plugins {
            let id = plugin.id();
            pipeline.plugin_ids.push(id);

            for spec in plugin.node_specs() {
                if let Some(previous) = spec_owner.get(&spec.tag) {
                    return Err(ConfigurationError::DuplicateNodeSpec {
                        tag: spec.tag,
                        plugin: id.to_string(),
                        previous: previous.to_string(),
                    });
                }
                spec_owner.insert(spec.tag.clone(), id);
                pipeline.capabilities.specs.insert(spec.tag.clone(), spec);
            }

            for element in plugin.elements() {
                if let Some((previous, _)) = pipeline.elements.get(&element.tag) {
                    return Err(ConfigurationError::DuplicateElement {
                        tag: element.tag,
                        plugin: id.to_string(),
                        previous: previous.to_string(),
                    });
                }
                pipeline
                    .elements
                    .insert(element.tag, (id, element.component));
            }

            pipeline.normalizers.extend(plugin.normalizers());

            for handler in plugin.event_handlers() {
                pipeline
                    .handlers
                    .entry(handler.kind)
                    .or_default()
                    .push(handler.handler);
            }
        }

        tracing::debug!(plugins = ?pipeline.plugin_ids, "composed editor pipeline");
        Ok(pipeline)
    }

    /// Links, marks, lists and images.
    pub fn standard() -> Self {
        let plugins: Vec<Box<dyn Plugin>> = vec![
            Box::new(LinkPlugin),
            Box::new(MarksPlugin),
            Box::new(ListPlugin),
            Box::new(ImagePlugin),
        ];
        Self::compose(plugins).expect("standard pipeline must be valid")
    }

    pub fn plugin_ids(&self) -> &[&'static str] {
        &self.plugin_ids
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// The component registered for `tag`; `None` means the renderer's
    /// built-in default.
    pub fn render_element(&self, tag: &str) -> Option<&str> {
        self.elements
            .get(tag)
            .map(|(_, component)| component.as_str())
    }

    pub fn normalize_node(
        &self,
        cx: &NormalizeContext<'_>,
        entry: NodeEntry<'_>,
    ) -> Option<Rewrite> {
        Next {
            rest: &self.normalizers,
        }
        .run(cx, entry)
    }

    pub fn handlers_for(&self, kind: EventKind) -> Vec<EventHandlerFn> {
        self.handlers.get(&kind).cloned().unwrap_or_default()
    }
}
