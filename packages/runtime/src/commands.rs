//! # Commands
//!
//! Command definitions and the name-keyed tables the aggregator merges them
//! into. Commands are mutation requests: they resolve immediately with a
//! value or hand back a future.

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{CommandError, ConfigurationError};

pub type CommandHandler = Arc<dyn Fn(Value) -> Result<Outcome, CommandError> + Send + Sync>;

/// Result of invoking a command
pub enum Outcome {
    Ready(Value),
    Pending(BoxFuture<'static, Result<Value, CommandError>>),
}

impl Outcome {
    pub fn done() -> Self {
        Outcome::Ready(Value::Null)
    }

    pub fn value(value: impl Into<Value>) -> Self {
        Outcome::Ready(value.into())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Outcome::Pending(_))
    }

    pub async fn resolve(self) -> Result<Value, CommandError> {
        match self {
            Outcome::Ready(value) => Ok(value),
            Outcome::Pending(future) => future.await,
        }
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Ready(value) => f.debug_tuple("Ready").field(value).finish(),
            Outcome::Pending(_) => f.write_str("Pending"),
        }
    }
}

#[derive(Clone)]
pub struct CommandDef {
    pub name: String,
    pub handler: CommandHandler,
    /// Feature flag gating the command
    pub feature: Option<String>,
    /// Member of the formatting set suppressed inside restricted regions
    pub formatting: bool,
    /// Value returned when the command is replaced by a no-op
    pub fallback: Value,
}

impl CommandDef {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value) -> Result<Outcome, CommandError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            feature: None,
            formatting: false,
            fallback: Value::Null,
        }
    }

    pub fn feature(mut self, feature: impl Into<String>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    pub fn formatting(mut self) -> Self {
        self.formatting = true;
        self
    }

    pub fn fallback(mut self, fallback: Value) -> Self {
        self.fallback = fallback;
        self
    }

    /// Copy of this command whose handler does nothing and returns the fallback
    pub fn to_noop(&self) -> Self {
        let fallback = self.fallback.clone();
        Self {
            handler: Arc::new(move |_| Ok(Outcome::Ready(fallback.clone()))),
            ..self.clone()
        }
    }

    pub fn invoke(&self, args: Value) -> Result<Outcome, CommandError> {
        (self.handler)(args)
    }
}

impl std::fmt::Debug for CommandDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandDef")
            .field("name", &self.name)
            .field("feature", &self.feature)
            .field("formatting", &self.formatting)
            .finish()
    }
}

/// Decode command arguments. `null` decodes like an empty object so
/// argument structs with defaults accept a bare call.
pub fn parse_args<T: DeserializeOwned>(command: &str, args: Value) -> Result<T, CommandError> {
    let args = if args.is_null() { json!({}) } else { args };
    serde_json::from_value(args).map_err(|e| CommandError::invalid_arguments(command, e.to_string()))
}

/// What to do when two extensions declare the same command or query name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CollisionPolicy {
    /// The later extension replaces the earlier entry. Each replacement is
    /// logged and recorded.
    #[default]
    LastWins,
    /// Any collision fails the build
    Reject,
}

/// A replaced table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Override {
    pub kind: &'static str,
    pub name: String,
    pub previous_owner: String,
    pub owner: String,
}

#[derive(Debug, Clone)]
pub struct Owned<T> {
    pub owner: String,
    pub item: T,
}

/// Name-keyed table with per-entry ownership
#[derive(Debug, Clone)]
pub struct NamedTable<T> {
    kind: &'static str,
    entries: BTreeMap<String, Owned<T>>,
}

impl<T> NamedTable<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: BTreeMap::new(),
        }
    }

    pub fn insert(
        &mut self,
        owner: &str,
        name: &str,
        item: T,
        policy: CollisionPolicy,
    ) -> Result<Option<Override>, ConfigurationError> {
        let replaced = match self.entries.get(name) {
            Some(existing) if policy == CollisionPolicy::Reject => {
                return Err(ConfigurationError::NameCollision {
                    kind: self.kind,
                    name: name.to_string(),
                    first: existing.owner.clone(),
                    second: owner.to_string(),
                });
            }
            Some(existing) => Some(Override {
                kind: self.kind,
                name: name.to_string(),
                previous_owner: existing.owner.clone(),
                owner: owner.to_string(),
            }),
            None => None,
        };

        if let Some(replaced) = &replaced {
            tracing::warn!(
                kind = self.kind,
                name,
                previous = %replaced.previous_owner,
                owner,
                "name collision, later extension wins"
            );
        }

        self.entries.insert(
            name.to_string(),
            Owned {
                owner: owner.to_string(),
                item,
            },
        );
        Ok(replaced)
    }

    pub fn get(&self, name: &str) -> Option<&Owned<T>> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Owned<T>)> {
        self.entries.iter().map(|(name, owned)| (name.as_str(), owned))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub type CommandTable = NamedTable<CommandDef>;

#[cfg(test)]
mod tests {
    use super::*;

    fn constant(name: &str, value: i64) -> CommandDef {
        CommandDef::new(name, move |_| Ok(Outcome::value(value)))
    }

    #[test]
    fn test_last_wins_records_override() {
        let mut table = CommandTable::new("command");
        assert!(table
            .insert("a", "x", constant("x", 1), CollisionPolicy::LastWins)
            .unwrap()
            .is_none());
        let replaced = table
            .insert("b", "x", constant("x", 2), CollisionPolicy::LastWins)
            .unwrap()
            .unwrap();

        assert_eq!(replaced.previous_owner, "a");
        assert_eq!(replaced.owner, "b");
        let entry = table.get("x").unwrap();
        assert_eq!(entry.owner, "b");
        assert!(matches!(entry.item.invoke(Value::Null), Ok(Outcome::Ready(v)) if v == json!(2)));
    }

    #[test]
    fn test_reject_policy() {
        let mut table = CommandTable::new("command");
        table
            .insert("a", "x", constant("x", 1), CollisionPolicy::Reject)
            .unwrap();
        let err = table
            .insert("b", "x", constant("x", 2), CollisionPolicy::Reject)
            .unwrap_err();
        assert!(matches!(err, ConfigurationError::NameCollision { .. }));
        assert_eq!(table.get("x").unwrap().owner, "a");
    }

    #[test]
    fn test_noop_returns_fallback() {
        let command = constant("x", 1).fallback(json!(false)).to_noop();
        assert!(matches!(command.invoke(Value::Null), Ok(Outcome::Ready(v)) if v == json!(false)));
    }

    #[test]
    fn test_parse_args_accepts_null() {
        #[derive(Deserialize)]
        struct Args {
            #[serde(default)]
            rows: Option<u32>,
        }
        let args: Args = parse_args("insertTable", Value::Null).unwrap();
        assert!(args.rows.is_none());
        let err = parse_args::<Args>("insertTable", json!({"rows": "many"}));
        assert!(matches!(err, Err(CommandError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn test_pending_outcome_resolves() {
        let outcome = Outcome::Pending(Box::pin(async { Ok(json!("later")) }));
        assert!(outcome.is_pending());
        assert_eq!(outcome.resolve().await.unwrap(), json!("later"));
    }
}
