use blocks_editor::{
    DialogRequest, DialogResponse, Editor, EditorError, EditorEvent, ElementKind, EventFlow,
    ImageDialogState, KeyPress, LinkDialogState, Node, Point, Range,
};

fn at(path: &[usize], offset: usize) -> Point {
    Point::new(path.to_vec(), offset)
}

fn editor_with(text: &str) -> Editor {
    let mut editor = Editor::standard().unwrap();
    editor.insert_text(text).unwrap();
    editor
}

#[test]
fn link_hotkey_round_trips_through_the_host() {
    let mut editor = editor_with("hello world");
    editor
        .set_selection(Some(Range::new(at(&[0, 0], 6), at(&[0, 0], 11))))
        .unwrap();

    let flow = editor
        .dispatch(&EditorEvent::KeyDown(KeyPress::new("k").primary()))
        .unwrap();
    assert_eq!(flow, EventFlow::Handled);

    let pending: Vec<_> = editor
        .pending_dialogs()
        .map(|(id, request)| (id, request.clone()))
        .collect();
    assert_eq!(
        pending,
        vec![(
            1,
            DialogRequest::Link(LinkDialogState {
                url: String::new(),
                label: "world".to_string(),
            })
        )]
    );

    editor
        .resolve_dialog(
            1,
            DialogResponse::Link {
                url: "https://world.example".to_string(),
                label: "world".to_string(),
            },
        )
        .unwrap();

    let children = editor.doc().children[0].children();
    assert_eq!(children[0], Node::text("hello "));
    assert_eq!(
        children[1].kind(),
        Some(&ElementKind::Link {
            url: "https://world.example".to_string(),
            label: "world".to_string(),
        })
    );
    assert_eq!(children[1].string(), "world");
    assert_eq!(editor.pending_dialogs().count(), 0);
}

#[test]
fn cancelled_dialog_changes_nothing() {
    let mut editor = editor_with("hello");
    let id = editor
        .open_dialog(DialogRequest::Link(LinkDialogState::default()))
        .unwrap();
    editor.resolve_dialog(id, DialogResponse::Cancelled).unwrap();
    assert_eq!(editor.doc().string(), "hello");
    assert_eq!(editor.pending_dialogs().count(), 0);
}

#[test]
fn unknown_dialog_ids_are_errors() {
    let mut editor = editor_with("hello");
    assert_eq!(
        editor.resolve_dialog(42, DialogResponse::Cancelled),
        Err(EditorError::UnknownDialog(42))
    );
}

#[test]
fn image_dialog_inserts_after_the_current_block() {
    let mut editor = editor_with("caption");
    editor
        .dispatch(&EditorEvent::KeyDown(
            KeyPress::new("i").primary().shift(),
        ))
        .unwrap();
    let (id, request) = editor.pending_dialogs().next().unwrap();
    assert_eq!(request, &DialogRequest::Image(ImageDialogState::default()));

    editor
        .resolve_dialog(
            id,
            DialogResponse::Image {
                url: "https://a.com/x.png".to_string(),
                width: Some(640),
                height: None,
            },
        )
        .unwrap();
    assert_eq!(
        editor.doc().children[1].kind(),
        Some(&ElementKind::Image {
            url: "https://a.com/x.png".to_string(),
            width: Some(640),
            height: None,
        })
    );
}

#[test]
fn pasted_image_url_becomes_an_image_block() {
    let mut editor = editor_with("look:");
    editor
        .dispatch(&EditorEvent::Paste("https://a.com/cat.png".to_string()))
        .unwrap();
    assert_eq!(editor.doc().children.len(), 2);
    assert_eq!(editor.doc().children[0], Node::paragraph("look:"));
    assert!(matches!(
        editor.doc().children[1].kind(),
        Some(ElementKind::Image { url, .. }) if url == "https://a.com/cat.png"
    ));
}

#[test]
fn dialog_requests_serialize_for_the_host() {
    let request = DialogRequest::Link(LinkDialogState {
        url: "https://a.com".to_string(),
        label: "a".to_string(),
    });
    assert_eq!(
        serde_json::to_value(&request).unwrap(),
        serde_json::json!({ "dialog": "link", "url": "https://a.com", "label": "a" })
    );
}
