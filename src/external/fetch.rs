//! HTTP downloads.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::InstallError;

/// Downloads remote resources.
#[async_trait]
pub trait Fetch: Send + Sync + 'static {
    /// Downloads `url` into `dest`, replacing any existing file.
    ///
    /// On failure `dest` is left untouched.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), InstallError>;

    /// Downloads `url` as UTF-8 text.
    async fn fetch_text(&self, url: &str) -> Result<String, InstallError>;
}

/// [`Fetch`] over `reqwest`.
///
/// Bodies are streamed to `<dest>.part` and renamed into place once complete.
#[derive(Clone, Default)]
pub struct HttpFetcher {
    http: Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, InstallError> {
        let res = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(url, e))?;
        if !res.status().is_success() {
            return Err(InstallError::Download {
                url: url.to_string(),
                reason: format!("unexpected status {}", res.status()),
            });
        }
        Ok(res)
    }
}

fn download_error(url: &str, e: impl std::fmt::Display) -> InstallError {
    InstallError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), InstallError> {
        debug!(url, dest = ?dest, "downloading");
        let mut res = self.get(url).await?;
        let part = part_path(dest);

        let written: Result<(), InstallError> = async {
            let mut file = fs::File::create(&part)
                .await
                .map_err(|e| InstallError::io(&part, e))?;
            while let Some(chunk) = res.chunk().await.map_err(|e| download_error(url, e))? {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| InstallError::io(&part, e))?;
            }
            file.flush().await.map_err(|e| InstallError::io(&part, e))?;
            Ok(())
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&part).await;
            return Err(e);
        }
        fs::rename(&part, dest)
            .await
            .map_err(|e| InstallError::io(dest, e))
    }

    async fn fetch_text(&self, url: &str) -> Result<String, InstallError> {
        debug!(url, "downloading text");
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|e| download_error(url, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/w/bin/cf/cf")),
            PathBuf::from("/w/bin/cf/cf.part")
        );
    }
}
