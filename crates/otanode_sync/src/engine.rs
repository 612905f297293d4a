//! The sync engine.
//!
//! One run brings a device's filesystem in line with the working tree:
//!
//! 1. Build the local listing: every file named in the deploy listing, by
//!    content hash, plus the rendered configuration file
//! 2. Fetch the remote listing from the device
//! 3. Push every file that is new or changed, then delete every file the
//!    working tree no longer has
//! 4. Reboot, if anything changed and the run is neither a dry run nor told
//!    not to
//!
//! Any non-200 answer aborts the run on the spot; nothing after it is
//! attempted, including the reboot.

use crate::client::{DeviceClient, DeviceRequest, DeviceResponse};
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::ObjectStore;
use otanode_protocol::{
    auth_query, blob_hash, delete_token, is_ota_filename, put_token, ChangeSet, ContentHash,
    FileListing, SharedSecret,
};
use similar::TextDiff;
use std::fs;
use tracing::{debug, info};

/// What happened to one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    /// Written to the device.
    Push,
    /// Removed from the device.
    Delete,
}

/// One changed file in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File name.
    pub name: String,
    /// Action taken.
    pub action: FileAction,
    /// Hash on the device before the run.
    pub old_hash: Option<ContentHash>,
    /// Hash after the run.
    pub new_hash: Option<ContentHash>,
    /// Unified diff from old to new content, when both were available as text.
    pub diff: Option<String>,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Changed files, pushes first, each group in name order.
    pub files: Vec<FileReport>,
    /// Number of files pushed.
    pub pushed: usize,
    /// Number of files deleted.
    pub deleted: usize,
    /// Whether a reboot was requested.
    pub rebooted: bool,
    /// Whether the run was a dry run.
    pub dry_run: bool,
}

impl SyncReport {
    /// Returns true if the device was already up to date.
    pub fn is_noop(&self) -> bool {
        self.files.is_empty()
    }
}

/// The local side of a run: listing plus the rendered configuration.
#[derive(Debug, Clone)]
pub struct LocalFiles {
    /// Desired listing.
    pub listing: FileListing,
    rendered_config: Vec<u8>,
}

/// Drives one device towards the working tree.
pub struct SyncEngine<C: DeviceClient, S: ObjectStore> {
    config: SyncConfig,
    client: C,
    store: S,
    secret: SharedSecret,
}

impl<C: DeviceClient, S: ObjectStore> SyncEngine<C, S> {
    /// Creates a new sync engine.
    pub fn new(config: SyncConfig, client: C, store: S, secret: SharedSecret) -> Self {
        Self {
            config,
            client,
            store,
            secret,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Returns the device client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Builds the local listing from the deploy listing and the rendered
    /// configuration.
    ///
    /// Every name is validated before anything is hashed, so a bad listing
    /// fails the run before the device is contacted.
    pub fn local_files(&self, rendered_config: &[u8]) -> SyncResult<LocalFiles> {
        let listing_path = self.config.deploy_listing_path();
        let text = fs::read_to_string(&listing_path)?;
        let names: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if let Some(bad) = names.iter().find(|name| !is_ota_filename(name)) {
            return Err(SyncError::InvalidFilename((*bad).to_string()));
        }

        let mut listing = FileListing::new();
        for name in names {
            if name == self.config.config_file {
                continue;
            }
            let hash = self.store.hash_object(&self.config.work_dir.join(name))?;
            listing.insert(name, hash);
        }
        listing.insert(self.config.config_file.clone(), blob_hash(rendered_config));

        Ok(LocalFiles {
            listing,
            rendered_config: rendered_config.to_vec(),
        })
    }

    /// Fetches the device's listing.
    pub fn remote_listing(&self) -> SyncResult<FileListing> {
        let response = self.client.send(&DeviceRequest::get("/ota-listing"))?;
        let response = expect_ok(response, "listing", "ota-listing")?;
        let body = String::from_utf8(response.body)
            .map_err(|_| SyncError::transport_fatal("listing is not valid UTF-8"))?;
        Ok(FileListing::parse(&body)?)
    }

    /// Runs a full sync with the given rendered configuration.
    pub fn run(&self, rendered_config: &[u8]) -> SyncResult<SyncReport> {
        let local = self.local_files(rendered_config)?;
        let remote = self.remote_listing()?;
        let changes = ChangeSet::between(&local.listing, &remote);
        info!(
            push = changes.to_push.len(),
            delete = changes.to_delete.len(),
            dry_run = self.config.dry_run,
            "computed changes"
        );

        let mut report = SyncReport {
            dry_run: self.config.dry_run,
            ..SyncReport::default()
        };

        for name in &changes.to_push {
            let content = self.new_content(&local, name)?;
            let old_hash = remote.get(name).cloned();
            let diff = old_hash
                .as_ref()
                .and_then(|hash| self.old_content(name, hash))
                .and_then(|old| unified_diff(&old, &content));

            self.push(name, content)?;
            report.pushed += 1;
            report.files.push(FileReport {
                name: name.clone(),
                action: FileAction::Push,
                old_hash,
                new_hash: local.listing.get(name).cloned(),
                diff,
            });
        }

        for name in &changes.to_delete {
            self.delete(name)?;
            report.deleted += 1;
            report.files.push(FileReport {
                name: name.clone(),
                action: FileAction::Delete,
                old_hash: remote.get(name).cloned(),
                new_hash: None,
                diff: None,
            });
        }

        if !changes.is_empty() && !self.config.dry_run && self.config.reboot {
            self.reboot()?;
            report.rebooted = true;
        }
        Ok(report)
    }

    fn new_content(&self, local: &LocalFiles, name: &str) -> SyncResult<Vec<u8>> {
        if name == self.config.config_file {
            Ok(local.rendered_config.clone())
        } else {
            Ok(fs::read(self.config.work_dir.join(name))?)
        }
    }

    /// Best-effort fetch of what the device currently holds, for display.
    fn old_content(&self, name: &str, hash: &ContentHash) -> Option<Vec<u8>> {
        if name == self.config.config_file {
            // Rendered files are never tracked, so ask the device.
            match self.client.send(&DeviceRequest::get("/config")) {
                Ok(response) if response.is_ok() => Some(response.body),
                Ok(response) => {
                    debug!(status = response.status, "old config not available");
                    None
                }
                Err(e) => {
                    debug!(error = %e, "old config not available");
                    None
                }
            }
        } else {
            self.store.read_object(hash).unwrap_or_else(|e| {
                debug!(file = name, error = %e, "old content not available");
                None
            })
        }
    }

    fn push(&self, name: &str, content: Vec<u8>) -> SyncResult<()> {
        let dry_run = self.config.dry_run;
        let token = put_token(&self.secret, name, &content, dry_run);
        let request = DeviceRequest::put(format!("/ota/{name}"), auth_query(&token, dry_run), content);
        let response = self.client.send(&request)?;
        expect_ok(response, "push", name)?;
        info!(file = name, dry_run, "pushed");
        Ok(())
    }

    fn delete(&self, name: &str) -> SyncResult<()> {
        let dry_run = self.config.dry_run;
        let token = delete_token(&self.secret, name, dry_run);
        let request = DeviceRequest::delete(format!("/ota/{name}"), auth_query(&token, dry_run));
        let response = self.client.send(&request)?;
        expect_ok(response, "delete", name)?;
        info!(file = name, dry_run, "deleted");
        Ok(())
    }

    fn reboot(&self) -> SyncResult<()> {
        let response = self.client.send(&DeviceRequest::get("/reboot"))?;
        expect_ok(response, "reboot", "reboot")?;
        info!("reboot requested");
        Ok(())
    }
}

fn expect_ok(
    response: DeviceResponse,
    operation: &'static str,
    target: &str,
) -> SyncResult<DeviceResponse> {
    if response.is_ok() {
        Ok(response)
    } else {
        Err(SyncError::Rejected {
            operation,
            target: target.to_string(),
            status: response.status,
            body: response.text(),
        })
    }
}

/// Renders a unified diff, or `None` if either side is not UTF-8 text.
pub fn unified_diff(old: &[u8], new: &[u8]) -> Option<String> {
    let old = std::str::from_utf8(old).ok()?;
    let new = std::str::from_utf8(new).ok()?;
    Some(
        TextDiff::from_lines(old, new)
            .unified_diff()
            .header("old", "new")
            .to_string(),
    )
}
