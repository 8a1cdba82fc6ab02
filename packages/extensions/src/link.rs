//! Hyperlinks.
//!
//! The extension remembers the last link the selection entered, through
//! its own document subscription, so link dialogs can still edit or remove
//! it after the selection is lost.

use luthor_document::visitor::walk_inline;
use luthor_document::{
    DocumentHandle, EditorState, Inline, Mutation, MutationError, NodeKey, NodeRef,
    Selection, Tree, UpdateContext, Visitor,
};
use luthor_runtime::{
    merge_config, parse_args, Category, Cleanup, CommandDef, CommandError, ConfigurationError,
    Extension, ExtensionContext, Outcome, StateQuery, UiContribution,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::rich_text::inline_container_mut;
use crate::support::{has_range_selection, inlines_contain, isolate_and_reselect};

const ID: &str = "link";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkConfig {
    #[serde(default = "default_protocol")]
    pub default_protocol: String,
    #[serde(default)]
    pub open_in_new_tab: bool,
}

fn default_protocol() -> String {
    "https://".to_string()
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            default_protocol: default_protocol(),
            open_in_new_tab: false,
        }
    }
}

/// Trimmed URL with `default_protocol` prepended when it has no scheme.
/// Relative paths, fragments and `mailto:`/`tel:` targets are kept.
pub fn normalize_url(url: &str, default_protocol: &str) -> Option<String> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    let has_scheme = url.contains("://")
        || ["mailto:", "tel:", "#", "/"].iter().any(|prefix| url.starts_with(prefix));
    Some(if has_scheme {
        url.to_string()
    } else {
        format!("{}{}", default_protocol, url)
    })
}

/// Finds the link that is, or contains, a key
struct LinkFinder<'k> {
    target: &'k str,
    found: Option<Inline>,
}

impl Visitor for LinkFinder<'_> {
    fn visit_inline(&mut self, inline: &Inline) {
        if self.found.is_some() {
            return;
        }
        if let Inline::Link { key, children, .. } = inline {
            if key == self.target || inlines_contain(children, self.target) {
                self.found = Some(inline.clone());
                return;
            }
        }
        walk_inline(self, inline);
    }
}

pub fn link_at(tree: &Tree, key: &str) -> Option<Inline> {
    let mut finder = LinkFinder { target: key, found: None };
    finder.visit_tree(tree);
    finder.found
}

fn anchor_link(state: &EditorState) -> Option<Inline> {
    link_at(&state.tree, &state.selection.as_ref()?.anchor.key)
}

#[derive(Clone, Default)]
struct LastLink(Arc<Mutex<Option<NodeKey>>>);

impl LastLink {
    fn lock(&self) -> MutexGuard<'_, Option<NodeKey>> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn observe(&self, state: &EditorState) {
        let mut last = self.lock();
        match (&state.selection, anchor_link(state)) {
            (_, Some(link)) => *last = Some(link.key().to_string()),
            (Some(_), None) => *last = None,
            (None, None) => {
                if last.as_ref().map_or(false, |key| !state.tree.contains(key)) {
                    *last = None;
                }
            }
        }
    }

    /// Link under the anchor, or the one last selected
    fn resolve(&self, state: &EditorState) -> Option<Inline> {
        if let Some(link) = anchor_link(state) {
            return Some(link);
        }
        let key = self.lock().clone()?;
        match state.tree.find(&key) {
            Some(NodeRef::Inline(link @ Inline::Link { .. })) => Some(link.clone()),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct InsertLinkArgs {
    url: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct UpdateLinkArgs {
    url: String,
    #[serde(default)]
    rel: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

/// Replace each run of covered sibling text nodes with one link
fn wrap_covered(ctx: &mut UpdateContext<'_>, url: &str, config: &LinkConfig) -> Result<Option<NodeKey>, MutationError> {
    let covered = isolate_and_reselect(ctx);
    let mut first_link = None;
    let mut remaining = covered.as_slice();
    while let Some(key) = remaining.first() {
        if let Some(existing) = link_at(ctx.tree(), key) {
            // Already linked: retarget instead of nesting
            let link_key = existing.key().to_string();
            ctx.apply(Mutation::SetAttribute {
                node_id: link_key.clone(),
                name: "url".to_string(),
                value: json!(url),
            })?;
            first_link.get_or_insert(link_key);
            remaining = &remaining[1..];
            continue;
        }

        let link_key = ctx.factory().key();
        let (siblings, start) = ctx
            .tree_mut()
            .inline_siblings_mut(key)
            .ok_or_else(|| MutationError::NodeNotFound(key.clone()))?;
        let mut end = start;
        let mut taken = 1;
        while taken < remaining.len()
            && end + 1 < siblings.len()
            && siblings[end + 1].key() == remaining[taken]
        {
            end += 1;
            taken += 1;
        }
        let children: Vec<Inline> = siblings.drain(start..=end).collect();
        siblings.insert(start, new_link(link_key.clone(), url, children, config));
        first_link.get_or_insert(link_key);
        remaining = &remaining[taken..];
    }
    Ok(first_link)
}

fn new_link(key: NodeKey, url: &str, children: Vec<Inline>, config: &LinkConfig) -> Inline {
    let (rel, target) = if config.open_in_new_tab {
        (Some("noopener noreferrer".to_string()), Some("_blank".to_string()))
    } else {
        (None, None)
    };
    Inline::Link {
        key,
        url: url.to_string(),
        rel,
        target,
        children,
    }
}

/// Insert a link holding `text` at the caret
fn insert_at_caret(
    ctx: &mut UpdateContext<'_>,
    url: &str,
    text: &str,
    config: &LinkConfig,
) -> Result<Option<NodeKey>, MutationError> {
    let Some(point) = ctx.selection().map(|selection| selection.focus.clone()) else {
        return Ok(None);
    };
    if let Some(existing) = link_at(ctx.tree(), &point.key) {
        let key = existing.key().to_string();
        ctx.apply(Mutation::SetAttribute {
            node_id: key.clone(),
            name: "url".to_string(),
            value: json!(url),
        })?;
        return Ok(Some(key));
    }

    let run = ctx.factory().text(text);
    let run_key = run.key().to_string();
    let link_key = ctx.factory().key();
    let link = new_link(link_key.clone(), url, vec![run], config);

    let is_text = matches!(ctx.tree().find(&point.key), Some(NodeRef::Inline(Inline::Text { .. })));
    if is_text {
        ctx.split_text(&point.key, point.offset);
        let (siblings, index) = ctx
            .tree_mut()
            .inline_siblings_mut(&point.key)
            .ok_or_else(|| MutationError::NodeNotFound(point.key.clone()))?;
        let at = if point.offset == 0 { index } else { index + 1 };
        siblings.insert(at, link);
    } else {
        let container = inline_container_mut(ctx.tree_mut(), &point.key)
            .ok_or_else(|| MutationError::InvalidStructure(format!("cannot insert a link into {}", point.key)))?;
        container.push(link);
    }
    ctx.set_selection(Some(Selection::collapsed(run_key, text.chars().count())));
    Ok(Some(link_key))
}

/// Replace a link with its children
fn unwrap_link(ctx: &mut UpdateContext<'_>, key: &str) -> Result<(), MutationError> {
    let (siblings, index) = ctx
        .tree_mut()
        .inline_siblings_mut(key)
        .ok_or_else(|| MutationError::NodeNotFound(key.to_string()))?;
    if let Inline::Link { children, .. } = siblings.remove(index) {
        siblings.splice(index..index, children);
    }
    Ok(())
}

fn describe(link: &Inline) -> Value {
    match link {
        Inline::Link {
            url, rel, target, children, ..
        } => json!({
            "url": url,
            "rel": rel,
            "target": target,
            "text": luthor_document::inline_text(children),
        }),
        _ => Value::Null,
    }
}

#[derive(Default)]
pub struct LinkExtension {
    config: LinkConfig,
    last: LastLink,
}

impl std::fmt::Debug for LinkExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkExtension").field("config", &self.config).finish()
    }
}

impl LinkExtension {
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            last: LastLink::default(),
        }
    }
}

impl Extension for LinkExtension {
    fn id(&self) -> &str {
        ID
    }

    fn categories(&self) -> &[Category] {
        &[Category::Toolbar, Category::Floating]
    }

    fn configure(&mut self, partial: &Value) -> Result<(), ConfigurationError> {
        self.config = merge_config(ID, &self.config, partial)?;
        Ok(())
    }

    fn register(&self, document: &DocumentHandle) -> anyhow::Result<Cleanup> {
        let last = self.last.clone();
        let id = document.subscribe(Box::new(move |_event, state| last.observe(state)));
        Ok(Cleanup::unsubscribe(document, id))
    }

    fn commands(&self, ctx: &ExtensionContext) -> Vec<CommandDef> {
        let document = ctx.document.clone();
        let config = self.config.clone();
        let insert = CommandDef::new("insertLink", move |args| {
            let args: InsertLinkArgs = parse_args("insertLink", args)?;
            let url = normalize_url(&args.url, &config.default_protocol)
                .ok_or_else(|| CommandError::invalid_arguments("insertLink", "url is empty"))?;
            let wrap = document.read(has_range_selection) && args.text.is_none();
            let key = document.update("link-insert", |ctx| {
                if wrap {
                    if let Some(key) = wrap_covered(ctx, &url, &config)? {
                        return Ok(Some(key));
                    }
                }
                let text = args.text.as_deref().unwrap_or(&url);
                insert_at_caret(ctx, &url, text, &config)
            })?;
            Ok(Outcome::value(key))
        })
        .fallback(Value::Null);

        let document = ctx.document.clone();
        let last = self.last.clone();
        let config = self.config.clone();
        let update = CommandDef::new("updateLink", move |args| {
            let args: UpdateLinkArgs = parse_args("updateLink", args)?;
            let url = normalize_url(&args.url, &config.default_protocol)
                .ok_or_else(|| CommandError::invalid_arguments("updateLink", "url is empty"))?;
            let Some(link) = document.read(|state| last.resolve(state)) else {
                return Ok(Outcome::value(false));
            };
            let key = link.key().to_string();
            document.update("link-update", |ctx| {
                for (name, value) in [("url", json!(url)), ("rel", json!(args.rel)), ("target", json!(args.target))] {
                    ctx.apply(Mutation::SetAttribute {
                        node_id: key.clone(),
                        name: name.to_string(),
                        value,
                    })?;
                }
                Ok(())
            })?;
            Ok(Outcome::value(true))
        })
        .fallback(json!(false));

        let document = ctx.document.clone();
        let last = self.last.clone();
        let remove = CommandDef::new("removeLink", move |_| {
            let Some(link) = document.read(|state| last.resolve(state)) else {
                return Ok(Outcome::value(false));
            };
            document.update("link-remove", |ctx| unwrap_link(ctx, link.key()))?;
            Ok(Outcome::value(true))
        })
        .fallback(json!(false));

        let document = ctx.document.clone();
        let last = self.last.clone();
        let current = CommandDef::new("getCurrentLink", move |_| {
            let link = document.read(|state| last.resolve(state));
            Ok(Outcome::value(link.as_ref().map_or(Value::Null, describe)))
        });

        [insert, update, remove, current]
            .into_iter()
            .map(|command| command.feature(ID).formatting())
            .collect()
    }

    fn state_queries(&self, _ctx: &ExtensionContext) -> Vec<StateQuery> {
        vec![
            StateQuery::sync("isLink", |state| json!(anchor_link(state).is_some())),
            StateQuery::sync("isTextSelected", |state| json!(has_range_selection(state))),
        ]
    }

    fn ui_contributions(&self) -> Vec<UiContribution> {
        vec![
            UiContribution::new("link", Category::Toolbar, "Link").command("insertLink"),
            UiContribution::new("linkEditor", Category::Floating, "Edit link").command("updateLink"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luthor_document::{Document, Point};

    fn document(text: &str) -> (DocumentHandle, NodeKey) {
        let mut document = Document::new("links");
        let tree = {
            let mut factory = document.ids_mut().factory();
            Tree::new(vec![factory.paragraph_text(text)])
        };
        document
            .update("setup", |ctx| {
                ctx.replace_tree(tree);
                Ok(())
            })
            .unwrap();
        let document = DocumentHandle::new(document);
        let key = document.read(|state| state.tree.text_keys()[0].clone());
        (document, key)
    }

    fn command(extension: &LinkExtension, document: &DocumentHandle, name: &str) -> CommandDef {
        let ctx = ExtensionContext {
            document: document.clone(),
            node_types: Default::default(),
        };
        extension
            .commands(&ctx)
            .into_iter()
            .find(|command| command.name == name)
            .unwrap()
    }

    fn ready(outcome: Outcome) -> Value {
        match outcome {
            Outcome::Ready(value) => value,
            Outcome::Pending(_) => panic!("expected a ready outcome"),
        }
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(normalize_url(" example.com ", "https://"), Some("https://example.com".into()));
        assert_eq!(normalize_url("http://a.b", "https://"), Some("http://a.b".into()));
        assert_eq!(normalize_url("mailto:me@x.y", "https://"), Some("mailto:me@x.y".into()));
        assert_eq!(normalize_url("   ", "https://"), None);
    }

    #[test]
    fn test_wrap_selected_text() {
        let (document, key) = document("visit site now");
        document.set_selection(Some(Selection::range(Point::new(key.clone(), 6), Point::new(key, 10))));
        let extension = LinkExtension::default();

        let insert = command(&extension, &document, "insertLink");
        ready(insert.invoke(json!({"url": "example.com"})).unwrap());

        document.read(|state| {
            let children = state.tree.children[0].inlines().unwrap();
            assert_eq!(children.len(), 3);
            match &children[1] {
                Inline::Link { url, children, .. } => {
                    assert_eq!(url, "https://example.com");
                    assert_eq!(luthor_document::inline_text(children), "site");
                }
                other => panic!("expected link, got {:?}", other),
            }
            assert_eq!(state.tree.text_content(), "visit site now");
        });
    }

    #[test]
    fn test_insert_at_caret_uses_url_as_text() {
        let (document, key) = document("ab");
        document.set_selection(Some(Selection::collapsed(key, 1)));
        let extension = LinkExtension::default();

        ready(command(&extension, &document, "insertLink").invoke(json!({"url": "x.io"})).unwrap());

        assert_eq!(document.read(|state| state.tree.text_content()), "ahttps://x.iob");
    }

    #[test]
    fn test_last_link_survives_selection_loss() {
        let (document, key) = document("docs");
        let extension = LinkExtension::default();
        let cleanup = extension.register(&document).unwrap();

        document.set_selection(Some(Selection::range(Point::new(key.clone(), 0), Point::new(key.clone(), 4))));
        ready(command(&extension, &document, "insertLink").invoke(json!({"url": "docs.rs"})).unwrap());
        document.set_selection(Some(Selection::collapsed(key, 1)));
        document.set_selection(None);

        let current = ready(command(&extension, &document, "getCurrentLink").invoke(Value::Null).unwrap());
        assert_eq!(current["url"], "https://docs.rs");
        assert_eq!(current["text"], "docs");

        let removed = ready(command(&extension, &document, "removeLink").invoke(Value::Null).unwrap());
        assert_eq!(removed, json!(true));
        document.read(|state| {
            assert!(matches!(state.tree.children[0].inlines().unwrap()[0], Inline::Text { .. }));
            assert_eq!(state.tree.text_content(), "docs");
        });
        cleanup.run();
    }

    #[test]
    fn test_remove_link_keeps_children_in_place() {
        let (document, key) = document("visit site now");
        let extension = LinkExtension::default();
        let cleanup = extension.register(&document).unwrap();
        document.set_selection(Some(Selection::range(Point::new(key.clone(), 6), Point::new(key, 10))));
        ready(command(&extension, &document, "insertLink").invoke(json!({"url": "example.com"})).unwrap());

        let inner = document.read(|state| match &state.tree.children[0].inlines().unwrap()[1] {
            Inline::Link { children, .. } => children[0].key().to_string(),
            other => panic!("expected link, got {:?}", other),
        });
        document.set_selection(Some(Selection::collapsed(inner, 2)));

        let removed = ready(command(&extension, &document, "removeLink").invoke(Value::Null).unwrap());
        assert_eq!(removed, json!(true));
        document.read(|state| {
            let children = state.tree.children[0].inlines().unwrap();
            assert_eq!(children.len(), 3);
            assert!(children.iter().all(|inline| matches!(inline, Inline::Text { .. })));
            assert_eq!(children[1].text_content(), "site");
            assert_eq!(state.tree.text_content(), "visit site now");
        });
        cleanup.run();
    }

    #[test]
    fn test_update_without_link_is_false() {
        let (document, _) = document("plain");
        let extension = LinkExtension::default();
        let update = command(&extension, &document, "updateLink");
        assert_eq!(ready(update.invoke(json!({"url": "a.b"})).unwrap()), json!(false));
    }
}
