//! Archive extraction via the system `unzip`.

use std::path::Path;

use async_trait::async_trait;

use crate::error::InstallError;
use crate::process::{CommandSpec, LauncherRef, run_to_completion};

/// Extracts a single named entry from an archive.
#[async_trait]
pub trait Extract: Send + Sync + 'static {
    /// Extracts `entry` from `archive` into `dest_dir`, flattening any directory prefix.
    async fn extract(&self, archive: &Path, entry: &str, dest_dir: &Path)
    -> Result<(), InstallError>;
}

/// Runs `unzip -o -j <archive> <entry> -d <dest_dir>`.
pub struct UnzipExtractor {
    launcher: LauncherRef,
}

impl UnzipExtractor {
    pub fn new(launcher: LauncherRef) -> Self {
        Self { launcher }
    }

    fn command(archive: &Path, entry: &str, dest_dir: &Path) -> CommandSpec {
        CommandSpec::new("unzip").args([
            "-o".to_string(),
            "-j".to_string(),
            archive.display().to_string(),
            entry.to_string(),
            "-d".to_string(),
            dest_dir.display().to_string(),
        ])
    }
}

#[async_trait]
impl Extract for UnzipExtractor {
    async fn extract(
        &self,
        archive: &Path,
        entry: &str,
        dest_dir: &Path,
    ) -> Result<(), InstallError> {
        let failed = |reason: String| InstallError::Extract {
            archive: archive.to_path_buf(),
            entry: entry.to_string(),
            reason,
        };
        let cmd = Self::command(archive, entry, dest_dir);
        let (lines, exit) = run_to_completion(self.launcher.as_ref(), &cmd)
            .await
            .map_err(|e| failed(e.to_string()))?;
        if !exit.success() {
            return Err(failed(format!(
                "unzip exited with {:?}: {}",
                exit.code(),
                lines.join(" | ")
            )));
        }
        if !dest_dir.join(entry).is_file() {
            return Err(failed("entry missing after extraction".into()));
        }
        Ok(())
    }
}
