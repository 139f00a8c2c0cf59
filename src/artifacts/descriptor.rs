//! Connection descriptors: one self-contained connection string per protocol.

use crate::settings::SharedConfig;

/// Supported protocols, in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    /// WebSocket over TLS through the reverse tunnel.
    WsArgo,
    /// Direct TLS with reality key material.
    Reality,
    /// QUIC-based hy2 endpoint.
    Hy2,
}

impl Protocol {
    /// All protocols in declaration order; descriptor lines follow this order.
    pub const ALL: [Protocol; 3] = [Protocol::WsArgo, Protocol::Reality, Protocol::Hy2];

    /// Suffix of the descriptor label (`<prefix>-<label>`).
    pub fn label(self) -> &'static str {
        match self {
            Protocol::WsArgo => "ws-argo",
            Protocol::Reality => "reality",
            Protocol::Hy2 => "hy2",
        }
    }

    /// Renders the descriptor for `cfg`.
    pub fn render(self, cfg: &SharedConfig) -> String {
        let id = &cfg.identity;
        let remark = format!("{}-{}", cfg.remarks_prefix, self.label());
        match self {
            Protocol::WsArgo => {
                let host = &cfg.tunnel_domain;
                format!(
                    "vless://{id}@{host}:443?encryption=none&security=tls&sni={host}\
                     &fp=chrome&type=ws&path=%2F%3Fed%3D2560#{remark}"
                )
            }
            Protocol::Reality => format!(
                "vless://{id}@{domain}:{port}?encryption=none&flow=xtls-rprx-vision\
                 &security=reality&sni=www.cloudflare.com&fp=chrome&pbk={pbk}&sid={sid}\
                 &spx=%2F&type=tcp&headerType=none#{remark}",
                domain = cfg.domain,
                port = cfg.port,
                pbk = cfg.reality_public_key,
                sid = cfg.reality_short_id,
            ),
            Protocol::Hy2 => format!(
                "hysteria2://{id}@{domain}:{port}?insecure=1#{remark}",
                domain = cfg.domain,
                port = cfg.port,
            ),
        }
    }
}

/// Renders every descriptor, newline-terminated, in protocol order.
pub fn render_all(cfg: &SharedConfig) -> String {
    Protocol::ALL.iter().fold(String::new(), |mut out, p| {
        out.push_str(&p.render(cfg));
        out.push('\n');
        out
    })
}
