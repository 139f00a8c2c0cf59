//! # Persisted settings document.
//!
//! YAML mirror of [`SharedConfig`], written whenever the shared values change and read
//! back as configuration on the next start.
//!
//! ```yaml
//! name: proxyvisor
//! app:
//!   domain: 91.244.197.11
//!   port: '25657'
//!   xray-version: 25.10.15
//!   hy2-version: 2.6.5
//!   argo-version: 2025.10.0
//!   uuid: 6f1c...
//!   argo-domain: foo-bar.trycloudflare.com
//!   reality-public-key: ...
//!   reality-private-key: ...
//!   reality-short-id: 1a2b3c4d
//!   remarks-prefix: vevc
//! ```
//!
//! Every `app` key is optional on read; scalars (e.g. an unquoted numeric port) are
//! accepted as strings.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{ArtifactError, SettingsError};
use crate::settings::SharedConfig;

/// Service name recorded at the top of the document.
pub const SERVICE_NAME: &str = "proxyvisor";

/// On-disk settings document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsDocument {
    #[serde(default = "service_name")]
    pub name: String,
    #[serde(default)]
    pub app: AppSection,
}

fn service_name() -> String {
    SERVICE_NAME.to_string()
}

/// `app` section of the settings document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AppSection {
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub xray_version: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub hy2_version: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub argo_version: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub argo_domain: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub argo_token: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub reality_public_key: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub reality_private_key: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub reality_short_id: Option<String>,
    #[serde(default, deserialize_with = "scalar", skip_serializing_if = "Option::is_none")]
    pub remarks_prefix: Option<String>,
}

/// Accepts any YAML scalar as a string; `null` becomes `None`.
fn scalar<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_yaml::Value;

    match Option::<Value>::deserialize(de)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::Bool(b)) => Ok(Some(b.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "expected a scalar, found {other:?}"
        ))),
    }
}

fn non_blank(s: &str) -> Option<String> {
    (!s.trim().is_empty()).then(|| s.to_string())
}

impl SettingsDocument {
    /// Builds the document mirroring `cfg`. Blank fields are omitted.
    pub fn from_config(cfg: &SharedConfig) -> Self {
        Self {
            name: service_name(),
            app: AppSection {
                domain: non_blank(&cfg.domain),
                port: non_blank(&cfg.port),
                xray_version: non_blank(&cfg.xray_version),
                hy2_version: non_blank(&cfg.hy2_version),
                argo_version: non_blank(&cfg.tunnel_version),
                uuid: non_blank(&cfg.identity),
                argo_domain: non_blank(&cfg.tunnel_domain),
                argo_token: cfg.token().map(str::to_string),
                reality_public_key: non_blank(&cfg.reality_public_key),
                reality_private_key: non_blank(&cfg.reality_private_key),
                reality_short_id: non_blank(&cfg.reality_short_id),
                remarks_prefix: non_blank(&cfg.remarks_prefix),
            },
        }
    }

    /// Converts back into a [`SharedConfig`]; absent keys become blank.
    pub fn into_config(self) -> SharedConfig {
        let app = self.app;
        SharedConfig {
            domain: app.domain.unwrap_or_default(),
            port: app.port.unwrap_or_default(),
            identity: app.uuid.unwrap_or_default(),
            xray_version: app.xray_version.unwrap_or_default(),
            hy2_version: app.hy2_version.unwrap_or_default(),
            tunnel_version: app.argo_version.unwrap_or_default(),
            tunnel_domain: app.argo_domain.unwrap_or_default(),
            tunnel_token: app.argo_token,
            reality_public_key: app.reality_public_key.unwrap_or_default(),
            reality_private_key: app.reality_private_key.unwrap_or_default(),
            reality_short_id: app.reality_short_id.unwrap_or_default(),
            remarks_prefix: app.remarks_prefix.unwrap_or_default(),
        }
    }

    /// Reads the document at `path`. A missing file yields `Ok(None)`.
    pub fn load(path: &Path) -> Result<Option<Self>, SettingsError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(SettingsError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        if text.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        serde_yaml::from_str(&text)
            .map(Some)
            .map_err(|e| SettingsError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }

    /// Overwrites the document at `path`.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let text = serde_yaml::to_string(self).map_err(|e| ArtifactError::Serialize {
            reason: e.to_string(),
        })?;
        fs::write(path, text).map_err(|source| ArtifactError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = SettingsDocument::load(&dir.path().join("application.yml")).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_saved_snapshot_reads_back_as_same_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yml");

        let mut cfg = SharedConfig {
            tunnel_token: Some("tok".into()),
            reality_short_id: "1a2b3c4d".into(),
            ..SharedConfig::default()
        };
        cfg.init();
        SettingsDocument::from_config(&cfg).save(&path).unwrap();

        let back = SettingsDocument::load(&path).unwrap().unwrap();
        assert_eq!(back.name, SERVICE_NAME);
        assert_eq!(back.into_config(), cfg);
    }

    #[test]
    fn test_kebab_keys_and_numeric_scalars() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yml");
        fs::write(
            &path,
            "app:\n  port: 8443\n  argo-domain: a.trycloudflare.com\n  remarks-prefix: p\n",
        )
        .unwrap();

        let cfg = SettingsDocument::load(&path).unwrap().unwrap().into_config();
        assert_eq!(cfg.port, "8443");
        assert_eq!(cfg.tunnel_domain, "a.trycloudflare.com");
        assert_eq!(cfg.remarks_prefix, "p");
        assert!(cfg.domain.is_empty());
        assert_eq!(cfg.tunnel_token, None);
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("application.yml");
        fs::write(&path, "app: [1, 2").unwrap();
        assert!(matches!(
            SettingsDocument::load(&path),
            Err(SettingsError::Parse { .. })
        ));
    }
}
