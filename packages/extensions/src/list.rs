//! Bullet, numbered and check lists

use luthor_document::{
    Block, DocumentError, DocumentHandle, EditorState, ListItem, ListType, Mutation, UpdateContext,
};
use luthor_runtime::{
    Category, Cleanup, CommandDef, Extension, ExtensionContext, NodeTypeSpec, Outcome, StateQuery,
};
use serde_json::json;

use crate::block_format::BlockKind;
use crate::support::{inlines_contain, selected_range};

#[derive(Debug, Default)]
pub struct ListExtension;

/// Toggle the selected blocks into a list of `list_type`.
///
/// A list of the same type unwraps into paragraphs, a list of another type
/// switches type, and runs of text blocks become one list each. Items and
/// paragraphs reuse each other's keys so the selection survives.
pub fn toggle_list(document: &DocumentHandle, list_type: ListType) -> Result<bool, DocumentError> {
    document.update("list", |ctx| {
        let Some(range) = selected_range(ctx.state()) else {
            return Ok(false);
        };
        let (start, end) = (*range.start(), *range.end());
        let selected: Vec<Block> = ctx.tree().children[range].to_vec();

        let lists: Vec<&Block> = selected
            .iter()
            .filter(|block| matches!(block, Block::List { .. }))
            .collect();
        let unwrap = !lists.is_empty()
            && lists
                .iter()
                .all(|block| matches!(block, Block::List { list_type: t, .. } if *t == list_type));

        let mut replacement = Vec::with_capacity(selected.len());
        let mut run: Vec<ListItem> = Vec::new();
        for block in selected {
            match block {
                Block::List { items, .. } if unwrap => {
                    flush(&mut run, &mut replacement, ctx, list_type);
                    replacement.extend(items.into_iter().map(|item| Block::Paragraph {
                        key: item.key,
                        align: None,
                        children: item.children,
                    }));
                }
                Block::List { key, items, .. } => {
                    flush(&mut run, &mut replacement, ctx, list_type);
                    let items = items.into_iter().map(|item| retype_item(item, list_type)).collect();
                    replacement.push(Block::List { key, list_type, items });
                }
                block if BlockKind::of(&block).is_some() && !unwrap => {
                    let key = block.key().to_string();
                    let children = block.inlines().cloned().unwrap_or_default();
                    run.push(retype_item(
                        ListItem {
                            key,
                            checked: None,
                            children,
                        },
                        list_type,
                    ));
                }
                other => {
                    flush(&mut run, &mut replacement, ctx, list_type);
                    replacement.push(other);
                }
            }
        }
        flush(&mut run, &mut replacement, ctx, list_type);

        ctx.tree_mut().children.splice(start..=end, replacement);
        Ok(true)
    })
}

fn flush(
    run: &mut Vec<ListItem>,
    out: &mut Vec<Block>,
    ctx: &mut UpdateContext<'_>,
    list_type: ListType,
) {
    if run.is_empty() {
        return;
    }
    let items = std::mem::take(run);
    out.push(ctx.factory().list(list_type, items));
}

fn retype_item(mut item: ListItem, list_type: ListType) -> ListItem {
    item.checked = match list_type {
        ListType::Check => Some(item.checked.unwrap_or(false)),
        _ => None,
    };
    item
}

/// Key of the list item holding `key`
fn item_containing(state: &EditorState, key: &str) -> Option<(String, Option<bool>)> {
    let Block::List { items, .. } = state.tree.block(key)? else {
        return None;
    };
    items
        .iter()
        .find(|item| item.key == key || inlines_contain(&item.children, key))
        .map(|item| (item.key.clone(), item.checked))
}

fn anchor_list_type(state: &EditorState) -> Option<ListType> {
    match state.anchor_block()? {
        Block::List { list_type, .. } => Some(*list_type),
        _ => None,
    }
}

impl Extension for ListExtension {
    fn id(&self) -> &str {
        "list"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![NodeTypeSpec::new("list")]
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let mut commands: Vec<CommandDef> = [
            ("toggleUnorderedList", ListType::Bullet),
            ("toggleOrderedList", ListType::Number),
            ("toggleCheckList", ListType::Check),
        ]
        .into_iter()
        .map(|(name, list_type)| {
            let document = ctx.document.clone();
            CommandDef::new(name, move |_| Ok(Outcome::value(toggle_list(&document, list_type)?)))
                .feature("list")
                .formatting()
                .fallback(json!(false))
        })
        .collect();

        let document = ctx.document.clone();
        commands.push(
            CommandDef::new("toggleChecked", move |_| {
                let target = document.read(|state| {
                    let anchor = state.selection.as_ref()?.anchor.key.clone();
                    match anchor_list_type(state) {
                        Some(ListType::Check) => item_containing(state, &anchor),
                        _ => None,
                    }
                });
                let Some((item, checked)) = target else {
                    return Ok(Outcome::value(false));
                };
                document.update("list-checked", |ctx| {
                    ctx.apply(Mutation::SetAttribute {
                        node_id: item,
                        name: "checked".to_string(),
                        value: json!(!checked.unwrap_or(false)),
                    })
                })?;
                Ok(Outcome::value(true))
            })
            .feature("list")
            .fallback(json!(false)),
        );
        commands
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        [
            ("isUnorderedList", ListType::Bullet),
            ("isOrderedList", ListType::Number),
            ("isCheckList", ListType::Check),
        ]
        .into_iter()
        .map(|(name, list_type)| {
            StateQuery::sync(name, move |state| json!(anchor_list_type(state) == Some(list_type)))
        })
        .collect()
    }
}
