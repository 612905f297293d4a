//! Configuration for sync runs.

use std::path::PathBuf;

/// Configuration for one sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Authenticate every mutation but change nothing on the device.
    pub dry_run: bool,
    /// Reboot the device after a run that changed something.
    pub reboot: bool,
    /// Working tree holding the deployed files.
    pub work_dir: PathBuf,
    /// Deploy listing, relative to the working tree.
    pub deploy_listing: PathBuf,
    /// Name of the rendered configuration file on the device.
    pub config_file: String,
}

impl SyncConfig {
    /// Creates a configuration for the given working tree.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            dry_run: false,
            reboot: true,
            work_dir: work_dir.into(),
            deploy_listing: PathBuf::from("deploy-listing"),
            config_file: "config.json".into(),
        }
    }

    /// Enables or disables dry-run mode.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enables or disables the final reboot.
    pub fn with_reboot(mut self, reboot: bool) -> Self {
        self.reboot = reboot;
        self
    }

    /// Sets the deploy listing path.
    pub fn with_deploy_listing(mut self, path: impl Into<PathBuf>) -> Self {
        self.deploy_listing = path.into();
        self
    }

    /// Sets the configuration file name.
    pub fn with_config_file(mut self, name: impl Into<String>) -> Self {
        self.config_file = name.into();
        self
    }

    /// Full path of the deploy listing.
    pub fn deploy_listing_path(&self) -> PathBuf {
        self.work_dir.join(&self.deploy_listing)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(".")
    }
}
