use std::sync::Arc;

use blocks_editor::{
    Document, Editor, EditorError, Node, Op, Pipeline, Point, Range, Transaction,
};

fn at(path: &[usize], offset: usize) -> Point {
    Point::new(path.to_vec(), offset)
}

fn editor(doc: Document) -> Editor {
    Editor::new(doc, None, Arc::new(Pipeline::standard())).unwrap()
}

#[test]
fn reference_follows_inserted_text() {
    let mut editor = editor(Document::new(vec![Node::paragraph("hello world")]));
    let world = editor.range_ref(Range::new(at(&[0, 0], 6), at(&[0, 0], 11)));

    editor
        .set_selection(Some(Range::collapsed(at(&[0, 0], 0))))
        .unwrap();
    editor.insert_text("say ").unwrap();

    assert_eq!(
        world.current(),
        Some(Range::new(at(&[0, 0], 10), at(&[0, 0], 15)))
    );
}

#[test]
fn reference_follows_its_block_when_earlier_blocks_go() {
    let mut editor = editor(Document::new(vec![
        Node::paragraph("one"),
        Node::paragraph("two"),
    ]));
    let two = editor.range_ref(Range::new(at(&[1, 0], 0), at(&[1, 0], 3)));
    editor
        .apply(Transaction::new(vec![Op::RemoveNode {
            path: vec![0],
            node: Node::paragraph("one"),
        }]))
        .unwrap();
    assert_eq!(
        two.current(),
        Some(Range::new(at(&[0, 0], 0), at(&[0, 0], 3)))
    );
}

#[test]
fn reference_into_removed_block_settles_before_it() {
    let mut editor = editor(Document::new(vec![
        Node::paragraph("one"),
        Node::paragraph("two"),
    ]));
    let two = editor.range_ref(Range::new(at(&[1, 0], 1), at(&[1, 0], 2)));
    editor
        .apply(Transaction::new(vec![Op::RemoveNode {
            path: vec![1],
            node: Node::paragraph("two"),
        }]))
        .unwrap();
    assert_eq!(two.current(), Some(Range::collapsed(at(&[0, 0], 3))));
}

#[test]
fn rejected_transaction_restores_references() {
    let mut editor = editor(Document::new(vec![Node::paragraph("hello")]));
    let whole = editor.range_ref(Range::new(at(&[0, 0], 0), at(&[0, 0], 5)));

    let result = editor.apply(Transaction::new(vec![
        Op::InsertText {
            path: vec![0, 0],
            offset: 0,
            text: ">> ".to_string(),
        },
        Op::RemoveNode {
            path: vec![5],
            node: Node::paragraph(""),
        },
    ]));

    let Err(EditorError::InvalidReference { path, .. }) = result else {
        panic!("expected an invalid reference, got {result:?}");
    };
    assert_eq!(path, vec![5]);
    assert_eq!(editor.doc().string(), "hello");
    assert_eq!(
        whole.current(),
        Some(Range::new(at(&[0, 0], 0), at(&[0, 0], 5)))
    );
}

#[test]
fn unref_hands_back_the_final_range() {
    let mut editor = editor(Document::new(vec![Node::paragraph("abc")]));
    let r = editor.range_ref(Range::collapsed(at(&[0, 0], 1)));
    assert_eq!(r.unref(), Some(Range::collapsed(at(&[0, 0], 1))));
}
