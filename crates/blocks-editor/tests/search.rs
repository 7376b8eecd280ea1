use blocks_editor::{search, Document, ElementKind, Marks, Node, Point, Range};

fn split_cat() -> Document {
    Document::new(vec![Node::element(
        ElementKind::Paragraph,
        vec![Node::leaf("ca", Marks::BOLD), Node::text("t dog cat")],
    )])
}

#[test]
fn matches_cross_leaf_boundaries() {
    let doc = split_cat();
    let found: Vec<Range> = search(&doc, "cat", None).collect();
    assert_eq!(
        found,
        vec![
            Range::new(Point::new(vec![0, 0], 0), Point::new(vec![0, 1], 1)),
            Range::new(Point::new(vec![0, 1], 6), Point::new(vec![0, 1], 9)),
        ]
    );
}

#[test]
fn matching_ignores_case() {
    let doc = split_cat();
    let lower: Vec<Range> = search(&doc, "cat", None).collect();
    let upper: Vec<Range> = search(&doc, "CAT", None).collect();
    assert_eq!(lower, upper);
}

#[test]
fn matches_never_cross_blocks() {
    let doc = Document::new(vec![Node::paragraph("ca"), Node::paragraph("t")]);
    assert_eq!(search(&doc, "cat", None).count(), 0);
}

#[test]
fn matches_do_not_overlap() {
    let doc = Document::new(vec![Node::paragraph("aaaa")]);
    let found: Vec<Range> = search(&doc, "aa", None).collect();
    assert_eq!(
        found,
        vec![
            Range::new(Point::new(vec![0, 0], 0), Point::new(vec![0, 0], 2)),
            Range::new(Point::new(vec![0, 0], 2), Point::new(vec![0, 0], 4)),
        ]
    );
}

#[test]
fn empty_query_finds_nothing() {
    assert_eq!(search(&split_cat(), "", None).count(), 0);
}

#[test]
fn scope_keeps_only_matches_inside_it() {
    let doc = split_cat();
    let scope = Range::new(Point::new(vec![0, 1], 2), Point::new(vec![0, 1], 9));
    let found: Vec<Range> = search(&doc, "cat", Some(&scope)).collect();
    assert_eq!(
        found,
        vec![Range::new(
            Point::new(vec![0, 1], 6),
            Point::new(vec![0, 1], 9)
        )]
    );
}

#[test]
fn scope_on_one_block_skips_the_others() {
    let doc = Document::new(vec![
        Node::paragraph("cat one"),
        Node::paragraph("cat two"),
        Node::paragraph("cat three"),
    ]);
    let scope = Range::new(Point::new(vec![1, 0], 0), Point::new(vec![1, 0], 7));
    let found: Vec<Range> = search(&doc, "cat", Some(&scope)).collect();
    assert_eq!(
        found,
        vec![Range::new(
            Point::new(vec![1, 0], 0),
            Point::new(vec![1, 0], 3)
        )]
    );
}
