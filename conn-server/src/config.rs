use std::{fs, ops::RangeInclusive};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

/// How REST errors map onto HTTP status codes. Behind an API gateway
/// unauthenticated callers get 404 and precondition failures 422.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ApiMode {
    #[default]
    Direct,
    Gateway,
}

#[derive(Parser, Debug, Clone, Deserialize)]
#[command(name = "server")]
#[command(author, version, about, long_about = None)]
pub struct AppConfig {
    #[clap(long)]
    #[arg(short = 'c')]
    #[serde(default)]
    pub config: Option<String>,
    /// MySQL url. Resources are kept in memory when unset.
    #[clap(long, env)]
    #[serde(default)]
    pub database_url: Option<String>,
    #[clap(long, env)]
    #[arg(default_value_t = 50)]
    #[serde(default = "default_max_size")]
    pub max_size: u32,
    #[clap(long, env)]
    #[arg(default_value_t = 5)]
    #[serde(default = "default_min_idle")]
    pub min_idle: u32,
    #[clap(long, env)]
    #[arg(default_value_t = false)]
    #[serde(default)]
    pub run_migrations: bool,
    #[clap(long, env)]
    #[arg(default_value_t = default_rust_log())]
    #[serde(default = "default_rust_log")]
    pub rust_log: String,
    #[clap(long, env)]
    #[arg(value_parser = port_in_range, short = 'p', default_value_t = 30050)]
    #[serde(default = "default_port")]
    pub port: u16,
    #[clap(long, env)]
    #[arg(value_parser = port_in_range, default_value_t = 30052)]
    #[serde(default = "default_private_port")]
    pub private_port: u16,
    #[clap(long, env)]
    #[arg(value_parser = port_in_range, default_value_t = 30051)]
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
    #[clap(long, env)]
    #[arg(value_parser = port_in_range, default_value_t = 30053)]
    #[serde(default = "default_private_grpc_port")]
    pub private_grpc_port: u16,
    #[clap(long, env)]
    #[arg(default_value_t = default_cors_origin())]
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    #[clap(long, env, value_enum)]
    #[arg(default_value_t = ApiMode::Direct)]
    #[serde(default)]
    pub api_mode: ApiMode,
    /// Header (gRPC metadata key) carrying the caller's user uid.
    #[clap(long, env)]
    #[arg(default_value_t = default_subject_header())]
    #[serde(default = "default_subject_header")]
    pub subject_header: String,
    /// Directory that `/local` destination paths resolve into.
    #[clap(long, env)]
    #[arg(default_value_t = default_local_root())]
    #[serde(default = "default_local_root")]
    pub local_root: String,
    /// JSON file with extra connector definitions.
    #[clap(long, env)]
    #[serde(default)]
    pub definitions_path: Option<String>,
    #[clap(long, env)]
    #[serde(default)]
    pub pipeline_backend_url: Option<String>,
    #[clap(long, env)]
    #[arg(default_value_t = 16)]
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
    /// Seconds between tombstone reconciliations.
    #[clap(long, env)]
    #[arg(default_value_t = 300)]
    #[serde(default = "default_tombstone_interval")]
    pub tombstone_interval: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            config: None,
            database_url: None,
            max_size: default_max_size(),
            min_idle: default_min_idle(),
            run_migrations: false,
            rust_log: default_rust_log(),
            port: default_port(),
            private_port: default_private_port(),
            grpc_port: default_grpc_port(),
            private_grpc_port: default_private_grpc_port(),
            cors_origin: default_cors_origin(),
            api_mode: ApiMode::default(),
            subject_header: default_subject_header(),
            local_root: default_local_root(),
            definitions_path: None,
            pipeline_backend_url: None,
            probe_concurrency: default_probe_concurrency(),
            tombstone_interval: default_tombstone_interval(),
        }
    }
}

fn default_rust_log() -> String {
    String::from("conn_server=info,conn_connect=info,conn_storage=info")
}

fn default_port() -> u16 {
    30050
}

fn default_private_port() -> u16 {
    30052
}

fn default_grpc_port() -> u16 {
    30051
}

fn default_private_grpc_port() -> u16 {
    30053
}

fn default_max_size() -> u32 {
    50
}

fn default_min_idle() -> u32 {
    5
}

fn default_cors_origin() -> String {
    String::from("http://localhost:3000")
}

fn default_subject_header() -> String {
    String::from("jwt-sub")
}

fn default_local_root() -> String {
    String::from("/tmp/connector-local")
}

fn default_probe_concurrency() -> usize {
    16
}

fn default_tombstone_interval() -> u64 {
    300
}

const PORT_RANGE: RangeInclusive<usize> = 1..=65535;

fn port_in_range(s: &str) -> Result<u16, String> {
    let port: usize = s
        .parse()
        .map_err(|_| format!("`{s}` isn't a port number"))?;
    if PORT_RANGE.contains(&port) {
        Ok(port as u16)
    } else {
        Err(format!(
            "port not in range {}-{}",
            PORT_RANGE.start(),
            PORT_RANGE.end()
        ))
    }
}

pub fn load(cfg: &str) -> Result<AppConfig> {
    let content =
        fs::read_to_string(cfg).context("could not read config file")?;
    toml::from_str(&content).context("could not parse config file")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_defaults_match_flags() {
        let from_file: AppConfig = toml::from_str("").unwrap();
        let from_flags = AppConfig::parse_from(["server"]);
        assert_eq!(from_file.private_grpc_port, from_flags.private_grpc_port);
        assert_eq!(from_file.probe_concurrency, from_flags.probe_concurrency);
        assert_eq!(
            from_file.tombstone_interval,
            from_flags.tombstone_interval
        );
        assert_eq!(from_file.subject_header, "jwt-sub");
        assert_eq!(from_file.port, 30050);
        assert_eq!(from_file.api_mode, ApiMode::Direct);
        assert!(from_file.database_url.is_none());
    }

    #[test]
    fn gateway_mode_from_toml() {
        let config: AppConfig =
            toml::from_str("api_mode = \"gateway\"\nport = 8080").unwrap();
        assert_eq!(config.api_mode, ApiMode::Gateway);
        assert_eq!(config.port, 8080);
    }

    #[test]
    fn ports_are_range_checked() {
        assert!(port_in_range("0").is_err());
        assert!(port_in_range("http").is_err());
        assert_eq!(port_in_range("30050").unwrap(), 30050);
    }
}
