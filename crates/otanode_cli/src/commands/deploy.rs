//! Deploy command implementation.

use otanode_sync::{
    DeviceRegistry, FileAction, FileReport, GitObjectStore, HttpDeviceClient, SyncConfig,
    SyncEngine, SyncReport,
};
use std::path::Path;
use tracing::info;

/// Options for one deploy.
#[derive(Debug, Clone)]
pub struct DeployOptions {
    /// Send every change with `noop=yes`.
    pub dry_run: bool,
    /// Reboot after a deploy that changed something.
    pub reboot: bool,
    /// Print diffs of changed text files.
    pub show_diff: bool,
}

/// Runs the deploy command.
pub fn run(
    registry: &Path,
    device: &str,
    work_dir: &Path,
    options: &DeployOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let registry = DeviceRegistry::load(registry)?;
    let target = registry.device(device)?;
    let rendered = target.render_config()?;
    let address = target.address();

    info!(device, %address, dry_run = options.dry_run, "deploying");
    let config = SyncConfig::new(work_dir)
        .with_dry_run(options.dry_run)
        .with_reboot(options.reboot);
    let engine = SyncEngine::new(
        config,
        HttpDeviceClient::new(&address),
        GitObjectStore::new(work_dir),
        target.secret()?,
    );

    let report = engine.run(&rendered)?;
    print!("{}", format_report(device, &report, options.show_diff));
    Ok(())
}

/// Renders a report for the terminal.
pub fn format_report(device: &str, report: &SyncReport, show_diff: bool) -> String {
    let mut out = String::new();
    if report.is_noop() {
        out.push_str(&format!("{}: up to date\n", device));
        return out;
    }

    let verb = if report.dry_run { "would " } else { "" };
    for file in &report.files {
        out.push_str(&format_file(verb, file));
        if show_diff {
            if let Some(diff) = &file.diff {
                out.push_str(diff);
            }
        }
    }
    out.push_str(&format!(
        "{}: {} pushed, {} deleted{}{}\n",
        device,
        report.pushed,
        report.deleted,
        if report.rebooted { ", rebooted" } else { "" },
        if report.dry_run { " (dry run)" } else { "" },
    ));
    out
}

fn format_file(verb: &str, file: &FileReport) -> String {
    let short = |hash: &Option<otanode_protocol::ContentHash>| {
        hash.as_ref()
            .map(|h| h.as_str()[..8].to_string())
            .unwrap_or_else(|| "-".to_string())
    };
    match file.action {
        FileAction::Push => format!(
            "  {}push   {} {} -> {}\n",
            verb,
            file.name,
            short(&file.old_hash),
            short(&file.new_hash)
        ),
        FileAction::Delete => format!(
            "  {}delete {} {}\n",
            verb,
            file.name,
            short(&file.old_hash)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otanode_protocol::blob_hash;

    fn report(dry_run: bool) -> SyncReport {
        SyncReport {
            files: vec![
                FileReport {
                    name: "main.py".into(),
                    action: FileAction::Push,
                    old_hash: None,
                    new_hash: Some(blob_hash(b"")),
                    diff: Some("--- old\n+++ new\n".into()),
                },
                FileReport {
                    name: "old.py".into(),
                    action: FileAction::Delete,
                    old_hash: Some(blob_hash(b"")),
                    new_hash: None,
                    diff: None,
                },
            ],
            pushed: 1,
            deleted: 1,
            rebooted: !dry_run,
            dry_run,
        }
    }

    #[test]
    fn report_lists_every_file() {
        let text = format_report("balcony", &report(false), false);
        assert_eq!(
            text,
            "  push   main.py - -> e69de29b\n  delete old.py e69de29b\nbalcony: 1 pushed, 1 deleted, rebooted\n"
        );
    }

    #[test]
    fn dry_run_report_says_would() {
        let text = format_report("balcony", &report(true), true);
        assert!(text.contains("would push   main.py"));
        assert!(text.contains("+++ new\n"));
        assert!(text.ends_with("(dry run)\n"));
    }

    #[test]
    fn noop_report() {
        let text = format_report("balcony", &SyncReport::default(), false);
        assert_eq!(text, "balcony: up to date\n");
    }
}
