//! # Agent Settings
//!
//! Resolves the config file and ledger endpoint for every command.
//!
//! ## Config Resolution
//!
//! 1. `--config <path>` argument (highest priority)
//! 2. `LAPOR_CONFIG` environment variable
//!
//! No fallback: the deployment addresses only exist in the file.
//!
//! ## Endpoint Resolution
//!
//! 1. `--rpc-url <url>` argument (highest priority)
//! 2. `LAPOR_RPC_URL` environment variable
//! 3. `rpc_url` from the config file
//! 4. Default: `http://127.0.0.1:8545`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use tracing::debug;

use lapor_client::LedgerClient;
use lapor_common::{load_from_file, Address, ClientConfig};

// ════════════════════════════════════════════════════════════════════════════════
// CONSTANTS
// ════════════════════════════════════════════════════════════════════════════════

/// Default ledger gateway endpoint.
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Environment variable for endpoint override.
pub const ENV_RPC_URL: &str = "LAPOR_RPC_URL";

/// Environment variable for the config file path.
pub const ENV_CONFIG: &str = "LAPOR_CONFIG";

// ════════════════════════════════════════════════════════════════════════════════
// RESOLUTION
// ════════════════════════════════════════════════════════════════════════════════

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Picks the config path from the argument or `env_value`.
pub fn resolve_config_path(cli_arg: Option<PathBuf>, env_value: Option<String>) -> Result<PathBuf> {
    if let Some(path) = cli_arg {
        return Ok(path);
    }
    match non_empty(env_value) {
        Some(path) => Ok(PathBuf::from(path)),
        None => bail!("no config file: pass --config or set {ENV_CONFIG}"),
    }
}

/// Picks the endpoint in flag > env > config > default order.
pub fn resolve_rpc_url(
    cli_arg: Option<&str>,
    env_value: Option<String>,
    config_value: Option<&str>,
) -> String {
    if let Some(url) = cli_arg.filter(|u| !u.trim().is_empty()) {
        return url.to_string();
    }
    if let Some(url) = non_empty(env_value) {
        return url;
    }
    if let Some(url) = config_value.filter(|u| !u.trim().is_empty()) {
        return url.to_string();
    }
    DEFAULT_RPC_URL.to_string()
}

/// Loads, overrides and validates the client config.
pub fn load_config(config: Option<PathBuf>, rpc_url: Option<&str>) -> Result<ClientConfig> {
    let path = resolve_config_path(config, std::env::var(ENV_CONFIG).ok())?;
    let mut cfg = load_from_file(&path)
        .with_context(|| format!("failed to load config {}", path.display()))?;

    cfg.rpc_url = resolve_rpc_url(
        rpc_url,
        std::env::var(ENV_RPC_URL).ok(),
        Some(cfg.rpc_url.as_str()),
    );
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;

    debug!(
        config = %path.display(),
        rpc_url = %cfg.rpc_url,
        rejection_table = %cfg.rejection_table.version,
        "config loaded"
    );
    Ok(cfg)
}

/// Builds a gateway-backed client acting as `signer`.
pub fn connect(cfg: ClientConfig, signer: Address) -> Result<LedgerClient> {
    let url = cfg.rpc_url.clone();
    LedgerClient::connect(cfg, signer).with_context(|| format!("failed to connect to {url}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_url_flag_wins() {
        let url = resolve_rpc_url(
            Some("http://flag:1"),
            Some("http://env:2".to_string()),
            Some("http://file:3"),
        );
        assert_eq!(url, "http://flag:1");
    }

    #[test]
    fn rpc_url_env_beats_config() {
        let url = resolve_rpc_url(None, Some("http://env:2".to_string()), Some("http://file:3"));
        assert_eq!(url, "http://env:2");
    }

    #[test]
    fn rpc_url_empty_env_is_ignored() {
        let url = resolve_rpc_url(None, Some("  ".to_string()), Some("http://file:3"));
        assert_eq!(url, "http://file:3");
    }

    #[test]
    fn rpc_url_default() {
        assert_eq!(resolve_rpc_url(None, None, None), DEFAULT_RPC_URL);
    }

    #[test]
    fn config_path_requires_a_source() {
        let err = resolve_config_path(None, None).unwrap_err();
        assert!(err.to_string().contains(ENV_CONFIG));

        let path = resolve_config_path(None, Some("/etc/lapor.toml".to_string())).unwrap();
        assert_eq!(path, PathBuf::from("/etc/lapor.toml"));
    }
}
