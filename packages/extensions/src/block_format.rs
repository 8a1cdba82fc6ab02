//! Paragraph, heading and quote conversion plus paragraph alignment

use luthor_document::{Alignment, Block, DocumentError, DocumentHandle, EditorState, Mutation};
use luthor_runtime::{
    parse_args, Category, Cleanup, CommandDef, CommandError, Extension, ExtensionContext,
    NodeTypeSpec, Outcome, StateQuery,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::support::selected_range;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Heading(u8),
    Quote,
}

impl BlockKind {
    pub fn of(block: &Block) -> Option<Self> {
        match block {
            Block::Paragraph { .. } => Some(BlockKind::Paragraph),
            Block::Heading { level, .. } => Some(BlockKind::Heading(*level)),
            Block::Quote { .. } => Some(BlockKind::Quote),
            _ => None,
        }
    }
}

/// Same key and inline children under a different text block kind.
/// Non-text blocks are not converted.
pub fn convert_block(block: &Block, kind: BlockKind) -> Option<Block> {
    let key = block.key().to_string();
    let children = block.inlines()?.clone();
    Some(match kind {
        BlockKind::Paragraph => {
            let align = match block {
                Block::Paragraph { align, .. } => *align,
                _ => None,
            };
            Block::Paragraph { key, align, children }
        }
        BlockKind::Heading(level) => Block::Heading {
            key,
            level: level.clamp(1, 6),
            children,
        },
        BlockKind::Quote => Block::Quote { key, children },
    })
}

/// Convert every selected text block to `kind`, or back to paragraphs when
/// they all already are `kind`
pub fn toggle_block_kind(document: &DocumentHandle, kind: BlockKind) -> Result<bool, DocumentError> {
    document.update("block-format", |ctx| {
        let Some(range) = selected_range(ctx.state()) else {
            return Ok(false);
        };
        let blocks: Vec<Block> = ctx.tree().children[range]
            .iter()
            .filter(|block| BlockKind::of(block).is_some())
            .cloned()
            .collect();
        if blocks.is_empty() {
            return Ok(false);
        }

        let all_match = blocks.iter().all(|block| BlockKind::of(block) == Some(kind));
        let target = if all_match { BlockKind::Paragraph } else { kind };
        for block in &blocks {
            if let Some(converted) = convert_block(block, target) {
                ctx.apply(Mutation::ReplaceBlock {
                    node_id: block.key().to_string(),
                    block: converted,
                })?;
            }
        }
        Ok(true)
    })
}

fn anchor_kind(state: &EditorState) -> Option<BlockKind> {
    state.anchor_block().and_then(BlockKind::of)
}

#[derive(Deserialize)]
struct HeadingArgs {
    level: u8,
}

#[derive(Deserialize)]
struct AlignmentArgs {
    alignment: String,
}

#[derive(Debug, Default)]
pub struct BlockFormatExtension;

impl Extension for BlockFormatExtension {
    fn id(&self) -> &str {
        "blockFormat"
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar]
    }

    fn register(&self, _document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        Ok(Cleanup::noop())
    }

    fn node_types(&self) -> Vec<NodeTypeSpec> {
        vec![NodeTypeSpec::new("heading"), NodeTypeSpec::new("quote")]
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        let paragraph = CommandDef::new("toggleParagraph", move |_| {
            Ok(Outcome::value(toggle_block_kind(&document, BlockKind::Paragraph)?))
        });

        let document = ctx.document.clone();
        let heading = CommandDef::new("toggleHeading", move |args| {
            let args: HeadingArgs = match args {
                Value::Number(_) => HeadingArgs {
                    level: parse_args("toggleHeading", args)?,
                },
                args => parse_args("toggleHeading", args)?,
            };
            if !(1..=6).contains(&args.level) {
                return Err(CommandError::invalid_arguments(
                    "toggleHeading",
                    format!("heading level {} is outside 1-6", args.level),
                ));
            }
            Ok(Outcome::value(toggle_block_kind(&document, BlockKind::Heading(args.level))?))
        });

        let document = ctx.document.clone();
        let quote = CommandDef::new("toggleQuote", move |_| {
            Ok(Outcome::value(toggle_block_kind(&document, BlockKind::Quote)?))
        });

        let document = ctx.document.clone();
        let alignment = CommandDef::new("setTextAlignment", move |args| {
            let args: AlignmentArgs = parse_args("setTextAlignment", args)?;
            let alignment = Alignment::parse(&args.alignment).ok_or_else(|| {
                CommandError::invalid_arguments(
                    "setTextAlignment",
                    format!("unknown alignment '{}'", args.alignment),
                )
            })?;
            let changed = document.update("alignment", |ctx| {
                let Some(range) = selected_range(ctx.state()) else {
                    return Ok(0);
                };
                let keys: Vec<String> = ctx.tree().children[range]
                    .iter()
                    .filter(|block| matches!(block, Block::Paragraph { .. }))
                    .map(|block| block.key().to_string())
                    .collect();
                for key in &keys {
                    ctx.apply(Mutation::SetAttribute {
                        node_id: key.clone(),
                        name: "align".to_string(),
                        value: json!(alignment.as_str()),
                    })?;
                }
                Ok(keys.len())
            })?;
            Ok(Outcome::value(changed))
        });

        [paragraph, heading, quote, alignment]
            .into_iter()
            .map(|command| command.feature("blockFormat").formatting().fallback(json!(false)))
            .collect()
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        let mut queries = vec![
            StateQuery::sync("isParagraph", |state| {
                json!(anchor_kind(state) == Some(BlockKind::Paragraph))
            }),
            StateQuery::sync("isQuote", |state| json!(anchor_kind(state) == Some(BlockKind::Quote))),
        ];
        for level in 1..=6u8 {
            queries.push(StateQuery::sync(format!("isH{}", level), move |state| {
                json!(anchor_kind(state) == Some(BlockKind::Heading(level)))
            }));
        }
        queries
    }
}
