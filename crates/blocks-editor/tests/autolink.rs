use std::sync::Arc;

use blocks_editor::{
    Document, Editor, EditorConfig, ElementKind, Node, Op, Pipeline, Point, Range, Transaction,
};

fn link_kind(node: &Node) -> Option<(&str, &str)> {
    match node.kind()? {
        ElementKind::Link { url, label } => Some((url, label)),
        _ => None,
    }
}

#[test]
fn typed_url_is_wrapped_in_a_link() {
    let mut editor = Editor::standard().unwrap();
    editor.insert_text("see http://example.com for info").unwrap();

    let children = editor.doc().children[0].children();
    assert_eq!(children.len(), 3);
    assert_eq!(children[0], Node::text("see "));
    assert_eq!(
        link_kind(&children[1]),
        Some(("http://example.com", "http://example.com"))
    );
    assert_eq!(children[1].string(), "http://example.com");
    assert_eq!(children[2], Node::text(" for info"));
}

#[test]
fn url_under_the_caret_waits_until_the_caret_leaves() {
    let mut editor = Editor::standard().unwrap();
    editor.insert_text("http://example.com").unwrap();
    assert_eq!(
        editor.doc().children[0].children(),
        &[Node::text("http://example.com")]
    );

    editor.insert_text(" ").unwrap();
    let children = editor.doc().children[0].children();
    assert_eq!(
        link_kind(&children[0]),
        Some(("http://example.com", "http://example.com"))
    );
    assert_eq!(children[1], Node::text(" "));
}

#[test]
fn autolink_can_be_switched_off() {
    let config = EditorConfig {
        autolink: false,
        ..EditorConfig::default()
    };
    let caret = Range::collapsed(Point::new(vec![0, 0], 0));
    let mut editor = Editor::with_config(
        Document::default(),
        Some(caret),
        Arc::new(Pipeline::standard()),
        config,
    )
    .unwrap();
    editor.insert_text("see http://example.com for info").unwrap();
    assert_eq!(
        editor.doc(),
        &Document::new(vec![Node::paragraph("see http://example.com for info")])
    );
}

fn replace_link_text(editor: &mut Editor, old: &str, new: &str) {
    let leaf = vec![0, 1, 0];
    editor
        .apply(Transaction::new(vec![
            Op::RemoveText {
                path: leaf.clone(),
                offset: 0,
                text: old.to_string(),
            },
            Op::InsertText {
                path: leaf,
                offset: 0,
                text: new.to_string(),
            },
        ]))
        .unwrap();
}

fn doc_with_link(url: &str, label: &str) -> Document {
    Document::new(vec![Node::element(
        ElementKind::Paragraph,
        vec![Node::text("go "), Node::link(url, label)],
    )])
}

#[test]
fn label_follows_the_link_text() {
    let doc = doc_with_link("https://example.com", "old");
    let mut editor = Editor::new(doc, None, Arc::new(Pipeline::standard())).unwrap();
    replace_link_text(&mut editor, "old", "new label");

    let link = &editor.doc().children[0].children()[1];
    assert_eq!(link_kind(link), Some(("https://example.com", "new label")));
}

#[test]
fn auto_link_url_follows_its_text() {
    let doc = doc_with_link("https://a.com", "https://a.com");
    let mut editor = Editor::new(doc, None, Arc::new(Pipeline::standard())).unwrap();
    replace_link_text(&mut editor, "https://a.com", "https://b.com");

    let link = &editor.doc().children[0].children()[1];
    assert_eq!(link_kind(link), Some(("https://b.com", "https://b.com")));
}

#[test]
fn emptied_link_is_removed() {
    let doc = doc_with_link("https://example.com", "x");
    let mut editor = Editor::new(doc, None, Arc::new(Pipeline::standard())).unwrap();
    editor
        .apply(Transaction::new(vec![Op::RemoveText {
            path: vec![0, 1, 0],
            offset: 0,
            text: "x".to_string(),
        }]))
        .unwrap();
    assert_eq!(editor.doc(), &Document::new(vec![Node::paragraph("go ")]));
}
