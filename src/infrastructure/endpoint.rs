use crate::types::constants::MONITOR_PATH;
use crate::types::{LiveError, Result};
use url::Url;

/// Derive the monitoring socket URL from the dashboard page origin.
///
/// `https` pages get `wss`, `http` pages get `ws`. Any path, query or fragment
/// on the origin is replaced by `/ws/monitor`.
pub fn monitor_endpoint(page_origin: &str) -> Result<String> {
    let mut url = Url::parse(page_origin)?;

    let scheme = match url.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(LiveError::InvalidEndpoint(format!(
                "unsupported scheme '{}' in origin {}",
                other, page_origin
            )));
        }
    };

    if url.host_str().is_none() {
        return Err(LiveError::InvalidEndpoint(format!(
            "origin {} has no host",
            page_origin
        )));
    }

    url.set_scheme(scheme)
        .map_err(|_| LiveError::InvalidEndpoint(format!("cannot use scheme {}", scheme)))?;
    url.set_path(MONITOR_PATH);
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.to_string())
}
