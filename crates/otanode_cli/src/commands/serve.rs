//! Serve command implementation.

use otanode_device::{NodeConfig, OtaHandler, OtaServer, ProcessReset, Reset, StopOnly};
use std::path::Path;
use tracing::info;

/// Runs the serve command.
pub fn run(
    root: &Path,
    port: Option<u16>,
    chunk_size: Option<usize>,
    no_reset: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = node_config(root, port, chunk_size)?;
    let handler = OtaHandler::open(root, config)?;

    if no_reset {
        serve(handler, StopOnly)
    } else {
        serve(handler, ProcessReset)
    }
}

/// Loads `node.json` from the root and applies command-line overrides.
pub fn node_config(
    root: &Path,
    port: Option<u16>,
    chunk_size: Option<usize>,
) -> Result<NodeConfig, Box<dyn std::error::Error>> {
    let mut config = NodeConfig::load(root)?;
    if let Some(port) = port {
        config.bind_addr.set_port(port);
    }
    if let Some(size) = chunk_size {
        config = config.with_chunk_size(size);
    }
    config.validate()?;
    Ok(config)
}

fn serve<R: Reset>(handler: OtaHandler, reset: R) -> Result<(), Box<dyn std::error::Error>> {
    let server = OtaServer::bind(handler, reset)?;
    info!(addr = %server.local_addr()?, "serving OTA");
    server.serve()?;
    println!("Server stopped");
    Ok(())
}
