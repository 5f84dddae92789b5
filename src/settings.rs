use std::{fs, path::Path};

use anyhow::{Context, Result};

use crate::convert::ConvertOptions;

/// Persist conversion options as pretty JSON.
pub fn save_options(path: &Path, options: &ConvertOptions) -> Result<()> {
    let content = serde_json::to_string_pretty(options)
        .context("failed to serialize conversion settings as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save conversion settings: {}", path.display()))?;
    Ok(())
}

/// Load conversion options. Missing fields take their default values.
pub fn load_options(path: &Path) -> Result<ConvertOptions> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load conversion settings: {}", path.display()))?;
    let options: ConvertOptions =
        serde_json::from_str(&content).context("failed to parse conversion settings JSON")?;
    Ok(options)
}
