pub mod convert;
pub mod inspect;

pub use convert::{convert, ConvertArgs};
pub use inspect::{inspect, InspectArgs};

use anyhow::{Context, Result};
use luthor_extensions::presets;
use luthor_runtime::{Composition, EditorConfig};
use std::path::Path;

/// The full editor, configured from `luthor.config.json` in `cwd`
pub fn compose(cwd: &Path) -> Result<Composition> {
    let config = EditorConfig::load(cwd).context("Failed to load editor config")?;
    let composition = Composition::builder()
        .config(config)
        .extensions(presets::extensive())
        .build()?;
    Ok(composition)
}
