use blocks_editor::{
    BlockMessage, ChildConstraint, ConfigurationError, MarkupCodec, MessageBlock, MessageLeaf,
    NodeRole, NodeSpec, Pipeline, Plugin, UnknownMessage,
};
use serde_json::json;

fn codec() -> MarkupCodec {
    MarkupCodec::new(&Pipeline::standard()).unwrap()
}

fn leaf(text: &str) -> MessageBlock {
    MessageBlock::leaf(text)
}

fn block(block: BlockMessage) -> MessageBlock {
    MessageBlock::Block(block)
}

fn text_block(text: &str) -> Option<Vec<MessageBlock>> {
    Some(vec![leaf(text)])
}

#[test]
fn documented_blocks_survive_markup() {
    let blocks = vec![
        block(BlockMessage::Heading1 {
            children: text_block("Title"),
        }),
        block(BlockMessage::Heading3 {
            children: text_block("Small"),
        }),
        MessageBlock::paragraph(vec![
            leaf("Hello "),
            MessageBlock::Leaf(MessageLeaf {
                text: "world".to_string(),
                bold: Some(true),
                ..MessageLeaf::default()
            }),
            leaf(" see "),
            block(BlockMessage::Link {
                url: "https://a.com/(x)".to_string(),
                label: Some("here".to_string()),
                children: text_block("here"),
            }),
            leaf(" or 2 * 3_000 [sic]."),
        ]),
        block(BlockMessage::BulletedList {
            children: vec![
                block(BlockMessage::ListItem {
                    children: text_block("one"),
                }),
                block(BlockMessage::ListItem {
                    children: text_block("- still one\nsecond line"),
                }),
            ],
        }),
        block(BlockMessage::NumberedList {
            children: vec![
                block(BlockMessage::ListItem {
                    children: text_block("first"),
                }),
                block(BlockMessage::ListItem {
                    children: text_block("second"),
                }),
            ],
        }),
        block(BlockMessage::Quote {
            children: text_block("quoted\ntwice"),
        }),
        block(BlockMessage::Callout {
            children: text_block("careful"),
        }),
        block(BlockMessage::CodeBlock {
            code: "fn main() {\n\n    println!(\"```\");\n}".to_string(),
        }),
        block(BlockMessage::Image {
            url: "https://a.com/x.png".to_string(),
            width: Some(300),
            height: Some(200),
        }),
        block(BlockMessage::ImageAttachment {
            url: "https://a.com/y.png".to_string(),
            width: None,
            height: None,
        }),
        block(BlockMessage::ImageGrid {
            children: vec![
                block(BlockMessage::Image {
                    url: "https://a.com/1.png".to_string(),
                    width: None,
                    height: Some(90),
                }),
                block(BlockMessage::Image {
                    url: "https://a.com/2.png".to_string(),
                    width: None,
                    height: None,
                }),
            ],
        }),
        block(BlockMessage::Attachments {
            children: vec![block(BlockMessage::ImageAttachment {
                url: "https://a.com/3.png".to_string(),
                width: None,
                height: None,
            })],
        }),
        block(BlockMessage::Table {
            header: vec!["name".to_string(), "value".to_string()],
            rows: vec![
                vec!["a|b".to_string(), "1".to_string()],
                vec![String::new(), "2".to_string()],
            ],
        }),
        block(BlockMessage::HorizontalDivider),
    ];

    let codec = codec();
    let text = codec.to_markup(&blocks);
    assert_eq!(codec.from_markup(&text), blocks);
}

#[test]
fn quotes_of_blocks_survive_markup() {
    let quote = block(BlockMessage::Quote {
        children: Some(vec![
            MessageBlock::paragraph(vec![leaf("a")]),
            MessageBlock::paragraph(vec![leaf("b")]),
            block(BlockMessage::BulletedList {
                children: vec![block(BlockMessage::ListItem {
                    children: text_block("c"),
                })],
            }),
        ]),
    });
    let codec = codec();
    let text = codec.to_markup(&[quote.clone()]);
    assert_eq!(text, ">\n> a\n>\n> b\n>\n> - c");
    assert!(!text.contains("unsupported"));
    assert_eq!(codec.from_markup(&text), vec![quote]);
}

#[test]
fn single_paragraph_quotes_stay_block_quotes() {
    let quote = block(BlockMessage::Quote {
        children: Some(vec![MessageBlock::paragraph(vec![leaf("only")])]),
    });
    let codec = codec();
    assert_eq!(codec.from_markup(&codec.to_markup(&[quote.clone()])), vec![quote]);
}

#[test]
fn markers_read_as_expected() {
    let text = "## Hi\n\n- a\n- b\n\n1. x\n\n> q\n\n!> c\n\n---";
    let blocks = codec().from_markup(text);
    let types: Vec<&str> = blocks.iter().filter_map(MessageBlock::type_name).collect();
    assert_eq!(
        types,
        [
            "heading-2",
            "bulleted-list",
            "numbered-list",
            "quote",
            "callout",
            "horizontal-divider"
        ]
    );
}

#[test]
fn inline_marks_toggle() {
    let blocks = codec().from_markup("a **b _c_** ~~d~~");
    let MessageBlock::Block(BlockMessage::Paragraph {
        children: Some(children),
    }) = &blocks[0]
    else {
        panic!("expected a paragraph, got {blocks:?}");
    };
    let texts: Vec<(&str, bool, bool, bool)> = children
        .iter()
        .map(|child| {
            let MessageBlock::Leaf(leaf) = child else {
                panic!("expected a leaf, got {child:?}");
            };
            let marks = leaf.marks();
            (
                leaf.text.as_str(),
                marks.bold,
                marks.italic,
                marks.strikethrough,
            )
        })
        .collect();
    assert_eq!(
        texts,
        [
            ("a ", false, false, false),
            ("b ", true, false, false),
            ("c", true, true, false),
            (" ", false, false, false),
            ("d", false, false, true),
        ]
    );
}

#[test]
fn unknown_types_render_as_placeholders() {
    let poll = MessageBlock::Unknown(UnknownMessage {
        type_name: "poll".to_string(),
        fields: serde_json::from_value(json!({ "question": "lunch?" })).unwrap(),
    });
    let codec = codec();
    let text = codec.to_markup(&[MessageBlock::paragraph(vec![leaf("before")]), poll]);
    assert_eq!(text, "before\n\n[unsupported: poll]");

    let parsed = codec.from_markup(&text);
    assert_eq!(parsed[1].type_name(), Some("poll"));
    assert!(matches!(&parsed[1], MessageBlock::Unknown(_)));
}

struct MentionPlugin {
    marker: Option<&'static str>,
}

impl Plugin for MentionPlugin {
    fn id(&self) -> &'static str {
        "mention"
    }

    fn node_specs(&self) -> Vec<NodeSpec> {
        let spec = NodeSpec::new("shout", NodeRole::Block, ChildConstraint::InlineOnly);
        vec![match self.marker {
            Some(marker) => spec.markup(marker),
            None => spec,
        }]
    }
}

fn pipeline_with(marker: Option<&'static str>) -> Pipeline {
    let plugins: Vec<Box<dyn Plugin>> = vec![Box::new(MentionPlugin { marker })];
    Pipeline::compose(plugins).unwrap_or_else(|err| panic!("{err}"))
}

#[test]
fn registered_tags_use_their_marker() {
    let codec = MarkupCodec::new(&pipeline_with(Some("!!"))).unwrap();
    let shout = MessageBlock::Unknown(UnknownMessage {
        type_name: "shout".to_string(),
        fields: serde_json::from_value(json!({ "children": [{ "text": "hey" }] })).unwrap(),
    });
    let text = codec.to_markup(std::slice::from_ref(&shout));
    assert_eq!(text, "!! hey");
    assert_eq!(codec.from_markup(&text), vec![shout]);
}

#[test]
fn registered_tags_without_marker_are_rejected() {
    let Err(err) = MarkupCodec::new(&pipeline_with(None)) else {
        panic!("expected an unmapped node type");
    };
    assert_eq!(err, ConfigurationError::UnmappedNodeType("shout".to_string()));
}
