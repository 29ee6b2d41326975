//! Client share link rendering.

use crate::config::ShareConfig;

/// Build the `vless://` link a client imports to reach this endpoint through
/// `host` (the public hostname, usually the request's `Host` header).
pub fn share_link(user_id: &str, host: &str, share: &ShareConfig) -> String {
    let path: String = url::form_urlencoded::byte_serialize(share.path.as_bytes()).collect();
    format!(
        "vless://{id}@{host}:{port}?encryption=none&security=tls&type=ws&host={host}&path={path}#{host}",
        id = user_id,
        host = host,
        port = share.port,
        path = path,
    )
}
