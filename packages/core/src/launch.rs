//! Unmounting the card and starting the post-processor.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use log::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::ExecutionContext;
use crate::mount;

/// Final steps of a session.
pub trait Launcher {
    /// Unmounts the card mounted at `device_path`.
    ///
    /// Returns false if `device_path` was not a mount point and nothing was
    /// unmounted.
    fn unmount(&self, device_path: &Path) -> Result<bool>;

    /// Starts the post-processor in `staging_dir` without waiting for it.
    fn launch(&self, staging_dir: &Path) -> Result<()>;
}

/// Launcher backed by `umount` and a detached child process.
#[derive(Debug, Clone)]
pub struct SystemLauncher {
    ctx: ExecutionContext,
    post_processor: PathBuf,
    timing_wrapper: Option<PathBuf>,
}

impl SystemLauncher {
    pub fn new(
        ctx: ExecutionContext,
        post_processor: impl Into<PathBuf>,
        timing_wrapper: Option<PathBuf>,
    ) -> Self {
        Self {
            ctx,
            post_processor: post_processor.into(),
            timing_wrapper,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            ExecutionContext::with_escalation(config.escalation),
            &config.post_processor,
            config.timing_wrapper.clone(),
        )
    }

    /// Program and arguments for the post-processing command line.
    fn command_line(&self) -> (&Path, Vec<&OsStr>) {
        match &self.timing_wrapper {
            Some(wrapper) => (wrapper.as_path(), vec![self.post_processor.as_os_str()]),
            None => (self.post_processor.as_path(), Vec::new()),
        }
    }
}

impl Launcher for SystemLauncher {
    fn unmount(&self, device_path: &Path) -> Result<bool> {
        if !mount::is_mount_point(device_path)? {
            warn!(
                "{} is not a mount point, skipping unmount",
                device_path.display()
            );
            return Ok(false);
        }

        mount::unmount_device(&self.ctx, device_path)?;
        info!("Unmounted {}", device_path.display());
        Ok(true)
    }

    fn launch(&self, staging_dir: &Path) -> Result<()> {
        if !self.post_processor.is_file() {
            return Err(Error::PostProcessorNotFound {
                path: self.post_processor.clone(),
            });
        }

        let (program, args) = self.command_line();
        let pid = self.ctx.spawn_detached(program, &args, staging_dir)?;
        info!(
            "Started {} in the background in {} (pid {})",
            self.post_processor.display(),
            staging_dir.display(),
            pid
        );
        Ok(())
    }
}
