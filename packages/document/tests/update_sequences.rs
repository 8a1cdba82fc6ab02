//! Tests for sequences of document updates
//!
//! This tests:
//! - Formatting a selection that spans several text nodes
//! - Batched updates folding into one undo step
//! - Listener ordering and version counting

use luthor_document::{
    Block, Document, DocumentHandle, Inline, Mutation, Point, Selection, TextFormat,
};
use std::sync::{Arc, Mutex};

fn document_with(paragraphs: &[&str]) -> DocumentHandle {
    let handle = DocumentHandle::new(Document::new("sequences"));
    handle
        .update("seed", |ctx| {
            let mut blocks = Vec::new();
            for text in paragraphs {
                blocks.push(ctx.factory().paragraph_text(text));
            }
            let mut tree = ctx.tree().clone();
            tree.children = blocks;
            ctx.replace_tree(tree);
            Ok(())
        })
        .unwrap();
    handle
}

#[test]
fn test_bold_across_paragraphs() {
    let handle = document_with(&["Hello world", "Second line"]);
    let keys = handle.read(|state| state.tree.text_keys());

    handle.set_selection(Some(Selection::range(
        Point::new(keys[0].clone(), 6),
        Point::new(keys[1].clone(), 6),
    )));

    handle
        .update("format", |ctx| {
            for key in ctx.isolate_selection() {
                ctx.apply(Mutation::SetTextFormat {
                    node_id: key,
                    format: TextFormat::BOLD,
                })?;
            }
            Ok(())
        })
        .unwrap();

    let state = handle.state();
    let first = state.tree.children[0].inlines().unwrap();
    let second = state.tree.children[1].inlines().unwrap();

    let bold: Vec<_> = first
        .iter()
        .chain(second.iter())
        .filter_map(|inline| match inline {
            Inline::Text { text, format, .. } if format.contains(TextFormat::BOLD) => {
                Some(text.as_str())
            }
            _ => None,
        })
        .collect();

    assert_eq!(bold, vec!["world", "Second"]);
    assert_eq!(state.tree.text_content(), "Hello world\nSecond line");
}

#[test]
fn test_batched_updates_undo_together() {
    let handle = document_with(&["one"]);

    {
        let mut doc = handle.lock();
        doc.history_mut().begin_batch();
        for _ in 0..3 {
            doc.update("insert", |ctx| {
                let block = ctx.factory().horizontal_rule();
                ctx.apply(Mutation::InsertBlock { index: 0, block })
            })
            .unwrap();
        }
        doc.history_mut().end_batch();
    }

    assert_eq!(handle.read(|state| state.tree.children.len()), 4);
    assert!(handle.lock().undo());
    assert_eq!(handle.read(|state| state.tree.children.len()), 1);
    assert!(matches!(
        &handle.state().tree.children[0],
        Block::Paragraph { .. }
    ));
}

#[test]
fn test_listeners_run_in_registration_order() {
    let handle = document_with(&["a"]);
    let calls = Arc::new(Mutex::new(Vec::new()));

    for name in ["first", "second"] {
        let calls = Arc::clone(&calls);
        handle.subscribe(Box::new(move |event, _| {
            calls.lock().unwrap().push(format!("{}:{}", name, event.tag));
        }));
    }

    let before = handle.version();
    handle
        .update("edit", |ctx| {
            let key = ctx.tree().text_keys()[0].clone();
            ctx.apply(Mutation::UpdateText {
                node_id: key,
                content: "b".into(),
            })
        })
        .unwrap();

    assert_eq!(handle.version(), before + 1);
    assert_eq!(
        *calls.lock().unwrap(),
        vec!["first:edit".to_string(), "second:edit".to_string()]
    );
}
