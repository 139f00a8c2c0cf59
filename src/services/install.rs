//! Install-step helpers shared by the services.

use std::fs;
use std::path::Path;

use crate::error::InstallError;

/// Removes and recreates `dir`, leaving it empty.
pub(super) fn prepare_dir(dir: &Path) -> Result<(), InstallError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| InstallError::io(dir, e))?;
    }
    fs::create_dir_all(dir).map_err(|e| InstallError::io(dir, e))
}

/// Marks a freshly fetched binary executable, removing it when that fails.
pub(super) fn make_executable(binary: &Path) -> Result<(), InstallError> {
    set_executable(binary).inspect_err(|_| discard_binary(binary))
}

/// Adds the execute bits to `path`.
#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), InstallError> {
    use std::os::unix::fs::PermissionsExt;

    let permission = |source| InstallError::Permission {
        path: path.to_path_buf(),
        source,
    };
    let mut perms = fs::metadata(path).map_err(permission)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    fs::set_permissions(path, perms).map_err(permission)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), InstallError> {
    Ok(())
}

/// Replaces every occurrence of each placeholder, in order.
pub(super) fn render_template(template: &str, pairs: &[(&str, &str)]) -> String {
    pairs
        .iter()
        .fold(template.to_string(), |text, (from, to)| text.replace(from, to))
}

/// Writes a rendered config file, replacing any previous one.
pub(super) fn write_config(path: &Path, text: &str) -> Result<(), InstallError> {
    fs::write(path, text).map_err(|e| InstallError::io(path, e))
}

/// Removes the binary after a failed later step so the next start reinstalls.
pub(super) fn discard_binary(binary: &Path) {
    let _ = fs::remove_file(binary);
}
