//! Environment-driven service configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

pub const ENV_DB_PATH: &str = "GRIDSHOCK_DB_PATH";
pub const ENV_ADDR: &str = "GRIDSHOCK_ADDR";
pub const ENV_TEMPLATE_DIR: &str = "GRIDSHOCK_TEMPLATE_DIR";
pub const ENV_AUTOLOAD_RULES: &str = "GRIDSHOCK_AUTOLOAD_RULES";

pub const DEFAULT_DB_PATH: &str = "gridshock.sqlite";
pub const DEFAULT_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvConfig {
    pub db_path: PathBuf,
    pub addr: SocketAddr,
    pub template_dir: PathBuf,
    pub autoload_rules: bool,
}

impl EnvConfig {
    pub fn from_env() -> Result<Self, String> {
        let db_path = non_empty_var(ENV_DB_PATH).unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
        let addr_raw = non_empty_var(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_raw
            .parse::<SocketAddr>()
            .map_err(|_| format!("invalid {ENV_ADDR}: {addr_raw}"))?;
        let template_dir =
            non_empty_var(ENV_TEMPLATE_DIR).unwrap_or_else(|| DEFAULT_TEMPLATE_DIR.to_string());
        let autoload_rules = non_empty_var(ENV_AUTOLOAD_RULES)
            .map(|raw| parse_flag(&raw))
            .transpose()?
            .unwrap_or(false);

        Ok(Self {
            db_path: PathBuf::from(db_path),
            addr,
            template_dir: PathBuf::from(template_dir),
            autoload_rules,
        })
    }
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            autoload_rules: false,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_flag(raw: &str) -> Result<bool, String> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("invalid {ENV_AUTOLOAD_RULES}: {other}")),
    }
}
