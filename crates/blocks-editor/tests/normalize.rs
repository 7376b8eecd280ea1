use std::sync::Arc;

use blocks_editor::{
    Document, Editor, EditorConfig, EditorError, ElementKind, HeadingLevel, Marks, MessageBlock,
    Next, Node, NodeEntry, NodeProperties, NormalizeContext, NormalizeNode, Op, Pipeline, Plugin,
    Point, Range, Rewrite,
};

fn normalized(doc: Document) -> Document {
    Editor::new(doc, None, Arc::new(Pipeline::standard()))
        .unwrap()
        .doc()
        .clone()
}

#[test]
fn blank_line_run_splits_paragraph() {
    let doc = normalized(Document::new(vec![Node::paragraph("a\n\n\nb")]));
    assert_eq!(
        doc,
        Document::new(vec![Node::paragraph("a"), Node::paragraph("b")])
    );
}

#[test]
fn single_breaks_stay_inside_the_block() {
    let doc = normalized(Document::new(vec![Node::paragraph("a\nb\nc")]));
    assert_eq!(doc, Document::new(vec![Node::paragraph("a\nb\nc")]));
}

#[test]
fn leading_break_is_trimmed_without_selection() {
    let doc = normalized(Document::new(vec![Node::paragraph("\nhello")]));
    assert_eq!(doc, Document::new(vec![Node::paragraph("hello")]));
}

#[test]
fn leading_break_survives_while_caret_is_inside() {
    let doc = Document::new(vec![Node::paragraph("\nhello")]);
    let caret = Range::collapsed(Point::new(vec![0, 0], 0));
    let editor = Editor::new(doc, Some(caret), Arc::new(Pipeline::standard())).unwrap();
    assert_eq!(editor.doc().string(), "\nhello");
}

#[test]
fn adjacent_leaves_with_equal_marks_merge() {
    let doc = normalized(Document::new(vec![Node::element(
        ElementKind::Paragraph,
        vec![
            Node::leaf("ab", Marks::BOLD),
            Node::leaf("cd", Marks::BOLD),
            Node::text("ef"),
        ],
    )]));
    assert_eq!(
        doc.children[0].children(),
        &[Node::leaf("abcd", Marks::BOLD), Node::text("ef")]
    );
}

#[test]
fn empty_document_gets_one_paragraph() {
    assert_eq!(
        normalized(Document::default()),
        Document::new(vec![Node::paragraph("")])
    );
}

#[test]
fn stray_blocks_find_their_place() {
    let doc = normalized(Document::new(vec![
        Node::text("loose"),
        Node::element(
            ElementKind::BulletedList,
            vec![Node::paragraph("item"), Node::text("stray")],
        ),
        Node::element(ElementKind::ListItem, vec![Node::text("orphan")]),
    ]));
    let item = |text: &str| Node::element(ElementKind::ListItem, vec![Node::text(text)]);
    assert_eq!(
        doc,
        Document::new(vec![
            Node::paragraph("loose"),
            Node::element(ElementKind::BulletedList, vec![item("item"), item("stray")]),
            Node::element(ElementKind::BulletedList, vec![item("orphan")]),
        ])
    );
}

#[test]
fn blocks_inside_paragraphs_are_hoisted() {
    let doc = normalized(Document::new(vec![Node::element(
        ElementKind::Paragraph,
        vec![Node::text("before"), Node::divider()],
    )]));
    assert_eq!(
        doc,
        Document::new(vec![Node::paragraph("before"), Node::divider()])
    );
}

#[test]
fn hoisted_blocks_keep_document_order() {
    let heading = |kind: ElementKind, text: &str| Node::element(kind, vec![Node::text(text)]);
    let doc = normalized(Document::new(vec![Node::element(
        ElementKind::Paragraph,
        vec![
            Node::text("x"),
            heading(ElementKind::Heading(HeadingLevel::One), "A"),
            heading(ElementKind::Heading(HeadingLevel::Two), "B"),
        ],
    )]));
    assert_eq!(
        doc,
        Document::new(vec![
            Node::paragraph("x"),
            heading(ElementKind::Heading(HeadingLevel::One), "A"),
            heading(ElementKind::Heading(HeadingLevel::Two), "B"),
        ])
    );
}

#[test]
fn text_after_a_hoisted_block_stays_after_it() {
    let doc = normalized(Document::new(vec![Node::element(
        ElementKind::Paragraph,
        vec![Node::text("x"), Node::divider(), Node::text("y")],
    )]));
    assert_eq!(
        doc,
        Document::new(vec![
            Node::paragraph("x"),
            Node::divider(),
            Node::paragraph("y"),
        ])
    );
}

#[test]
fn evicted_list_children_stay_between_their_neighbours() {
    let item = |text: &str| Node::element(ElementKind::ListItem, vec![Node::text(text)]);
    let doc = normalized(Document::new(vec![Node::element(
        ElementKind::BulletedList,
        vec![item("a"), Node::divider(), item("b")],
    )]));
    assert_eq!(
        doc,
        Document::new(vec![
            Node::element(ElementKind::BulletedList, vec![item("a")]),
            Node::divider(),
            Node::element(ElementKind::BulletedList, vec![item("b")]),
        ])
    );
}

#[test]
fn quotes_hold_paragraphs_and_wrap_stray_text() {
    let doc = normalized(Document::new(vec![Node::element(
        ElementKind::Quote,
        vec![
            Node::text("intro "),
            Node::link("https://a.com", "https://a.com"),
            Node::paragraph("a"),
            Node::text("tail"),
        ],
    )]));
    assert_eq!(
        doc,
        Document::new(vec![Node::element(
            ElementKind::Quote,
            vec![
                Node::element(
                    ElementKind::Paragraph,
                    vec![
                        Node::text("intro "),
                        Node::link("https://a.com", "https://a.com"),
                    ],
                ),
                Node::paragraph("a"),
                Node::paragraph("tail"),
            ],
        )])
    );
}

#[test]
fn quotes_evict_blocks_they_cannot_hold() {
    let doc = normalized(Document::new(vec![Node::element(
        ElementKind::Quote,
        vec![Node::paragraph("a"), Node::divider(), Node::paragraph("b")],
    )]));
    assert_eq!(
        doc,
        Document::new(vec![
            Node::element(ElementKind::Quote, vec![Node::paragraph("a")]),
            Node::divider(),
            Node::element(ElementKind::Quote, vec![Node::paragraph("b")]),
        ])
    );
}

#[test]
fn normalized_documents_are_fixed_points() {
    let raw = r#"[
        {"type":"paragraph","children":[{"text":"\nintro"},{"text":"bold","bold":true}]},
        {"type":"heading-2"},
        {"type":"bulleted-list","children":[{"text":"a"},{"type":"quote","children":[{"text":"b"}]}]},
        {"type":"image-grid","children":[{"type":"image","url":"https://a.com/x.png"},{"text":"c"}]},
        {"type":"poll","question":"lunch?"}
    ]"#;
    let blocks: Vec<MessageBlock> = serde_json::from_str(raw).unwrap();
    let pipeline = Arc::new(Pipeline::standard());
    let first = Editor::from_message_blocks(&blocks, Arc::clone(&pipeline)).unwrap();
    let again = Editor::new(first.doc().clone(), None, pipeline).unwrap();
    assert_eq!(first.doc(), again.doc());
}

/// Flips paragraphs holding "loop" to quotes and back, forever.
struct Flip;

impl NormalizeNode for Flip {
    fn id(&self) -> &'static str {
        "flip"
    }

    fn normalize_node(
        &self,
        cx: &NormalizeContext<'_>,
        entry: NodeEntry<'_>,
        next: Next<'_>,
    ) -> Option<Rewrite> {
        let kind = entry.node.kind().cloned();
        let flipped = match kind {
            Some(ElementKind::Paragraph) => ElementKind::Quote,
            Some(ElementKind::Quote) => ElementKind::Paragraph,
            _ => return next.run(cx, entry),
        };
        if !entry.node.string().contains("loop") {
            return next.run(cx, entry);
        }
        Some(Rewrite::new(
            self.id(),
            vec![Op::SetNode {
                path: entry.path.to_vec(),
                properties: NodeProperties::of(entry.node),
                new_properties: NodeProperties::Element(flipped),
            }],
        ))
    }
}

struct FlipPlugin;

impl Plugin for FlipPlugin {
    fn id(&self) -> &'static str {
        "flip"
    }

    fn normalizers(&self) -> Vec<Box<dyn NormalizeNode>> {
        vec![Box::new(Flip)]
    }
}

fn flipping_editor(strict: bool) -> Editor {
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(FlipPlugin)];
    let pipeline = Pipeline::compose(plugins).unwrap_or_else(|err| panic!("{err}"));
    let config = EditorConfig {
        strict_normalization: strict,
        ..EditorConfig::default()
    };
    let caret = Range::collapsed(Point::new(vec![0, 0], 2));
    Editor::with_config(
        Document::new(vec![Node::paragraph("ok")]),
        Some(caret),
        Arc::new(pipeline),
        config,
    )
    .unwrap()
}

#[test]
fn runaway_rules_restore_the_last_snapshot() {
    let mut editor = flipping_editor(false);
    editor.insert_text(" loop").unwrap();
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("ok")]));
    assert_eq!(
        editor.selection(),
        Some(&Range::collapsed(Point::new(vec![0, 0], 2)))
    );
}

#[test]
fn runaway_rules_are_reported_in_strict_mode() {
    let mut editor = flipping_editor(true);
    let Err(EditorError::Normalization(violation)) = editor.insert_text(" loop") else {
        panic!("expected a normalization violation");
    };
    assert!(violation.iterations > 100);
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("ok")]));
}

#[test]
fn pasting_hundreds_of_paragraphs_stays_within_budget() {
    let mut editor = Editor::standard().unwrap();
    let pasted: String = (0..200).map(|i| format!("p{i}\n\n")).collect();
    editor.insert_text(&pasted).unwrap();

    let children = &editor.doc().children;
    assert_eq!(children.len(), 201);
    for (i, block) in children.iter().take(200).enumerate() {
        assert_eq!(block, &Node::paragraph(format!("p{i}")));
    }
    assert!(children[200].string().trim().is_empty());
}

#[test]
fn pasting_hundreds_of_urls_links_every_one() {
    let mut editor = Editor::standard().unwrap();
    let pasted: String = (0..150).map(|i| format!("http://e{i}.com ")).collect();
    editor.insert_text(&pasted).unwrap();

    assert_eq!(editor.doc().string(), pasted);
    let links: Vec<&str> = editor.doc().children[0]
        .children()
        .iter()
        .filter_map(|child| match child.kind() {
            Some(ElementKind::Link { url, .. }) => Some(url.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(links.len(), 150);
    assert_eq!(links[0], "http://e0.com");
    assert_eq!(links[149], "http://e149.com");
}
