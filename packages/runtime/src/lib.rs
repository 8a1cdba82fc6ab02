//! # Luthor Runtime
//!
//! Composes independently developed extensions into one command and state
//! surface over a shared document.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────────────┐   ┌──────────────────┐
//! │  Extensions  │──▶│ CompositionBuilder   │──▶│   Composition    │
//! │ (ordered)    │   │ validate → register  │   │ execute / query  │
//! └──────────────┘   └──────────────────────┘   └──────────────────┘
//!                              │                         │
//!                              ▼                         ▼
//!                    ┌──────────────────┐      ┌──────────────────┐
//!                    │ NodeTypeTable    │      │ FeatureGuard     │
//!                    │ BlockRegistry    │      │ ContextGuard     │
//!                    └──────────────────┘      │ ActiveStateCache │
//!                                              └──────────────────┘
//! ```

pub mod commands;
pub mod composition;
pub mod config;
pub mod error;
pub mod extension;
pub mod guard;
pub mod node_types;
pub mod registry;
pub mod state;

pub use commands::{
    parse_args, CollisionPolicy, CommandDef, CommandHandler, CommandTable, NamedTable, Outcome,
    Override, Owned,
};
pub use composition::{Composition, CompositionBuilder, ExtensionInfo, Lifecycle};
pub use config::{EditorConfig, DEFAULT_CONFIG_NAME};
pub use error::{BuildError, CommandError, ConfigurationError};
pub use extension::{
    merge_config, merge_patch, Category, Cleanup, Extension, ExtensionContext, UiContribution,
};
pub use guard::{is_enabled, Availability, ContextGuard, FeatureFlags, FeatureGuard};
pub use node_types::{NodeTypeEntry, NodeTypeSpec, NodeTypeTable};
pub use registry::{fields, BlockCodec, BlockDirective, BlockRegistry};
pub use state::{ActiveState, ActiveStateCache, Generation, StateQuery, StateQueryTable};
