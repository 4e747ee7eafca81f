//! TLS connector for the streaming connection
//!
//! Certificate validation can be switched off so the client keeps working
//! behind TLS inspection proxies. The switch is a config value
//! (`accept_invalid_certs`) and is announced with a warning when active.

use tokio_tungstenite::Connector;

use crate::{Error, Result};

/// Build the connector used for `wss://` URLs
///
/// # Errors
///
/// Returns error if the platform TLS backend cannot be initialized
pub fn connector(accept_invalid_certs: bool) -> Result<Connector> {
    let tls = native_tls::TlsConnector::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .danger_accept_invalid_hostnames(accept_invalid_certs)
        .build()
        .map_err(|e| Error::Transport(format!("tls setup failed: {e}")))?;

    Ok(Connector::NativeTls(tls))
}

/// Log once at startup when certificate validation is disabled
pub fn warn_if_insecure(accept_invalid_certs: bool) {
    if accept_invalid_certs {
        tracing::warn!(
            "TLS certificate validation is disabled (set EDGEVOICE_INSECURE_TLS=false to enable)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_both_modes() {
        assert!(matches!(connector(true), Ok(Connector::NativeTls(_))));
        assert!(matches!(connector(false), Ok(Connector::NativeTls(_))));
    }
}
