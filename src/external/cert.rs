//! Self-signed TLS certificates, generated in process with `rcgen`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use rcgen::{CertificateParams, DnType, KeyPair};
use time::OffsetDateTime;
use tokio::fs;

use crate::error::InstallError;

const KEY_FILE: &str = "key.pem";
const CERT_FILE: &str = "cert.pem";
const VALIDITY_DAYS: i64 = 3650;

/// Paths of a generated key/certificate pair.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CertFiles {
    pub key: PathBuf,
    pub cert: PathBuf,
}

impl CertFiles {
    /// Standard file names inside `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            key: dir.join(KEY_FILE),
            cert: dir.join(CERT_FILE),
        }
    }
}

/// Generates self-signed certificates.
#[async_trait]
pub trait CertGenerator: Send + Sync + 'static {
    /// Writes a key/cert pair for `common_name` into `dir`.
    async fn generate(&self, common_name: &str, dir: &Path) -> Result<CertFiles, InstallError>;
}

/// ECDSA P-256 key and X.509 certificate valid for ten years.
#[derive(Clone, Copy, Debug, Default)]
pub struct SelfSignedCertGenerator;

impl SelfSignedCertGenerator {
    pub fn new() -> Self {
        Self
    }

    /// PEM-encoded `(key, cert)` with `CN=common_name`.
    fn render(common_name: &str) -> Result<(String, String), rcgen::Error> {
        let mut params = CertificateParams::new(vec![common_name.to_string()])?;
        params
            .distinguished_name
            .push(DnType::CommonName, common_name);
        let now = OffsetDateTime::now_utc();
        params.not_before = now;
        params.not_after = now + time::Duration::days(VALIDITY_DAYS);

        let key_pair = KeyPair::generate()?;
        let cert = params.self_signed(&key_pair)?;
        Ok((key_pair.serialize_pem(), cert.pem()))
    }

    async fn write(common_name: &str, files: &CertFiles) -> Result<(), String> {
        let (key, cert) = Self::render(common_name).map_err(|e| e.to_string())?;
        fs::write(&files.key, key)
            .await
            .map_err(|e| format!("writing {}: {e}", files.key.display()))?;
        fs::write(&files.cert, cert)
            .await
            .map_err(|e| format!("writing {}: {e}", files.cert.display()))?;
        Ok(())
    }
}

#[async_trait]
impl CertGenerator for SelfSignedCertGenerator {
    async fn generate(&self, common_name: &str, dir: &Path) -> Result<CertFiles, InstallError> {
        let files = CertFiles::in_dir(dir);
        match Self::write(common_name, &files).await {
            Ok(()) => Ok(files),
            Err(reason) => {
                let _ = fs::remove_file(&files.key).await;
                let _ = fs::remove_file(&files.cert).await;
                Err(InstallError::CertGeneration { reason })
            }
        }
    }
}
