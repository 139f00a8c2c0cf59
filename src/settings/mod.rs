//! # Shared connection parameters.
//!
//! [`SharedConfig`] is the record every service reads when it installs or starts:
//! domain, port, identity, per-protocol versions, the tunnel domain/token and the
//! reality key material. [`ConfigHandle`] is the shared owning handle passed to every
//! component that needs it.
//!
//! ## Writers
//! ```text
//! init()                      once, before any supervisor starts
//! set_reality_keys()          proxy-server install step
//! set_tunnel_domain()         tunnel propagator (ephemeral mode only)
//! ```
//! No field is written concurrently by two supervisors. Readers take a
//! [`ConfigHandle::snapshot`] and never hold the lock across an `.await`.

mod document;

pub use document::SettingsDocument;

use std::sync::{Arc, PoisonError, RwLock};

/// Default public address of this host.
pub const DEFAULT_DOMAIN: &str = "91.244.197.11";
/// Default listening port shared by the reality and hy2 endpoints.
pub const DEFAULT_PORT: &str = "25657";
/// Default proxy-server release.
pub const DEFAULT_XRAY_VERSION: &str = "25.10.15";
/// Default hy2 release.
pub const DEFAULT_HY2_VERSION: &str = "2.6.5";
/// Default tunnel-client release.
pub const DEFAULT_TUNNEL_VERSION: &str = "2025.10.0";
/// Tunnel domain until a real one is discovered.
pub const PLACEHOLDER_TUNNEL_DOMAIN: &str = "xxx.trycloudflare.com";
/// Default label prefix of connection descriptors.
pub const DEFAULT_REMARKS_PREFIX: &str = "vevc";

/// Connection parameters shared by all services.
///
/// Blank strings mean "unset". [`SharedConfig::init`] fills every defaulted field
/// with its default; the reality key material is filled by the proxy-server install
/// and the tunnel token is optional.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SharedConfig {
    pub domain: String,
    pub port: String,
    /// Client identity (UUID as string); also the hy2 password.
    pub identity: String,
    pub xray_version: String,
    pub hy2_version: String,
    pub tunnel_version: String,
    /// Public host of the reverse tunnel.
    pub tunnel_domain: String,
    /// Static tunnel token; when set the tunnel runs in persistent mode.
    pub tunnel_token: Option<String>,
    pub reality_public_key: String,
    pub reality_private_key: String,
    pub reality_short_id: String,
    pub remarks_prefix: String,
}

impl SharedConfig {
    /// Applies first-non-blank-wins defaults.
    ///
    /// Non-blank fields are preserved unchanged, so calling this again is a no-op and
    /// a generated identity stays stable.
    pub fn init(&mut self) {
        default_if_blank(&mut self.domain, || DEFAULT_DOMAIN.to_string());
        default_if_blank(&mut self.port, || DEFAULT_PORT.to_string());
        default_if_blank(&mut self.identity, || uuid::Uuid::new_v4().to_string());
        default_if_blank(&mut self.xray_version, || DEFAULT_XRAY_VERSION.to_string());
        default_if_blank(&mut self.hy2_version, || DEFAULT_HY2_VERSION.to_string());
        default_if_blank(&mut self.tunnel_version, || {
            DEFAULT_TUNNEL_VERSION.to_string()
        });
        default_if_blank(&mut self.tunnel_domain, || {
            PLACEHOLDER_TUNNEL_DOMAIN.to_string()
        });
        default_if_blank(&mut self.remarks_prefix, || {
            DEFAULT_REMARKS_PREFIX.to_string()
        });
        if self.tunnel_token.as_deref().is_some_and(is_blank) {
            self.tunnel_token = None;
        }
    }

    /// Overwrites fields with every non-blank field of `other`.
    ///
    /// Used to layer CLI/environment values over the persisted settings.
    pub fn overlay(&mut self, other: SharedConfig) {
        let SharedConfig {
            domain,
            port,
            identity,
            xray_version,
            hy2_version,
            tunnel_version,
            tunnel_domain,
            tunnel_token,
            reality_public_key,
            reality_private_key,
            reality_short_id,
            remarks_prefix,
        } = other;
        overlay_field(&mut self.domain, domain);
        overlay_field(&mut self.port, port);
        overlay_field(&mut self.identity, identity);
        overlay_field(&mut self.xray_version, xray_version);
        overlay_field(&mut self.hy2_version, hy2_version);
        overlay_field(&mut self.tunnel_version, tunnel_version);
        overlay_field(&mut self.tunnel_domain, tunnel_domain);
        overlay_field(&mut self.reality_public_key, reality_public_key);
        overlay_field(&mut self.reality_private_key, reality_private_key);
        overlay_field(&mut self.reality_short_id, reality_short_id);
        overlay_field(&mut self.remarks_prefix, remarks_prefix);
        if let Some(token) = tunnel_token.filter(|t| !is_blank(t)) {
            self.tunnel_token = Some(token);
        }
    }

    /// Returns the configured tunnel token, if any.
    pub fn token(&self) -> Option<&str> {
        self.tunnel_token.as_deref().filter(|t| !is_blank(t))
    }
}

fn is_blank(s: &str) -> bool {
    s.trim().is_empty()
}

fn default_if_blank(field: &mut String, default: impl FnOnce() -> String) {
    if is_blank(field) {
        *field = default();
    }
}

fn overlay_field(field: &mut String, value: String) {
    if !is_blank(&value) {
        *field = value;
    }
}

/// Shared owning handle to the process-wide [`SharedConfig`].
#[derive(Clone, Debug, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<SharedConfig>>,
}

impl ConfigHandle {
    /// Wraps `config` after applying [`SharedConfig::init`].
    pub fn new(mut config: SharedConfig) -> Self {
        config.init();
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Returns a copy of the current values.
    pub fn snapshot(&self) -> SharedConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Records a discovered tunnel host. Blank hosts are ignored.
    ///
    /// Returns `true` if the stored value changed.
    pub fn set_tunnel_domain(&self, host: &str) -> bool {
        if is_blank(host) {
            return false;
        }
        let mut cfg = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if cfg.tunnel_domain == host {
            return false;
        }
        cfg.tunnel_domain = host.to_string();
        true
    }

    /// Stores the reality key material produced by the proxy-server install.
    pub fn set_reality_keys(&self, public_key: &str, private_key: &str, short_id: &str) {
        let mut cfg = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        cfg.reality_public_key = public_key.to_string();
        cfg.reality_private_key = private_key.to_string();
        cfg.reality_short_id = short_id.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_fills_blank_fields_with_defaults() {
        let mut cfg = SharedConfig {
            domain: "  ".into(),
            ..SharedConfig::default()
        };
        cfg.init();
        assert_eq!(cfg.domain, DEFAULT_DOMAIN);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.xray_version, DEFAULT_XRAY_VERSION);
        assert_eq!(cfg.hy2_version, DEFAULT_HY2_VERSION);
        assert_eq!(cfg.tunnel_version, DEFAULT_TUNNEL_VERSION);
        assert_eq!(cfg.tunnel_domain, PLACEHOLDER_TUNNEL_DOMAIN);
        assert_eq!(cfg.remarks_prefix, DEFAULT_REMARKS_PREFIX);
        assert!(uuid::Uuid::parse_str(&cfg.identity).is_ok());
        assert_eq!(cfg.token(), None);
    }

    #[test]
    fn test_init_preserves_non_blank_input() {
        let input = SharedConfig {
            domain: "example.net".into(),
            port: "443".into(),
            identity: "abc".into(),
            xray_version: "1.0.0".into(),
            hy2_version: "2.0.0".into(),
            tunnel_version: "3.0.0".into(),
            tunnel_domain: "x.example.com".into(),
            tunnel_token: Some("tok".into()),
            reality_public_key: "pub".into(),
            reality_private_key: "priv".into(),
            reality_short_id: "sid".into(),
            remarks_prefix: "p".into(),
        };
        let mut cfg = input.clone();
        cfg.init();
        assert_eq!(cfg, input);
    }

    #[test]
    fn test_identity_generated_once() {
        let mut cfg = SharedConfig::default();
        cfg.init();
        let first = cfg.identity.clone();
        cfg.init();
        assert_eq!(cfg.identity, first);
    }

    #[test]
    fn test_blank_token_normalized_to_none() {
        let mut cfg = SharedConfig {
            tunnel_token: Some(" ".into()),
            ..SharedConfig::default()
        };
        cfg.init();
        assert_eq!(cfg.tunnel_token, None);
    }

    #[test]
    fn test_overlay_only_takes_non_blank_fields() {
        let mut base = SharedConfig {
            domain: "from-file".into(),
            port: "1000".into(),
            ..SharedConfig::default()
        };
        base.overlay(SharedConfig {
            port: "2000".into(),
            tunnel_token: Some("tok".into()),
            ..SharedConfig::default()
        });
        assert_eq!(base.domain, "from-file");
        assert_eq!(base.port, "2000");
        assert_eq!(base.token(), Some("tok"));
    }

    #[test]
    fn test_handle_tunnel_domain_transition() {
        let handle = ConfigHandle::new(SharedConfig::default());
        assert_eq!(handle.snapshot().tunnel_domain, PLACEHOLDER_TUNNEL_DOMAIN);

        assert!(handle.set_tunnel_domain("a.trycloudflare.com"));
        assert!(!handle.set_tunnel_domain("a.trycloudflare.com"));
        assert!(!handle.set_tunnel_domain(""));
        assert_eq!(handle.snapshot().tunnel_domain, "a.trycloudflare.com");
    }
}
