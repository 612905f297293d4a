//! Render-config command implementation.

use otanode_sync::DeviceRegistry;
use std::io::Write;
use std::path::Path;

/// Runs the render-config command.
pub fn run(registry: &Path, device: &str) -> Result<(), Box<dyn std::error::Error>> {
    let registry = DeviceRegistry::load(registry)?;
    let rendered = registry.device(device)?.render_config()?;
    std::io::stdout().write_all(&rendered)?;
    Ok(())
}
