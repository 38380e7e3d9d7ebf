use super::types::*;
use crate::controller::actions::Action;
use crate::error_handling::types::ConfigError;
use cidr::IpCidr;
use clap::Parser;
use log::{debug, info};
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable overriding `region`.
pub const REGION_ENV: &str = "NATWATCH_REGION";
/// Environment variable moving every output file into one directory.
pub const OUTPUT_DIR_ENV: &str = "NATWATCH_OUTPUT_DIR";

/// Logger setup for the binary: `info` unless `RUST_LOG` says otherwise.
// https://docs.rs/env_logger/latest/env_logger/
pub fn logger_builder() -> env_logger::Builder {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_target(false);
    builder
}

/// Command-line arguments of the `natwatch` binary.
///
/// The configuration file carries the full setup; the flags below override
/// the handful of values operators change from one run to the next.
#[derive(Parser, Debug, Clone)]
#[command(name = "natwatch")]
#[command(version)]
#[command(about = "Per-interface NAT throughput recorder fed by VPC flow logs")]
pub struct CliArgs {
    /// Path to the TOML configuration file
    pub config_file: PathBuf,

    /// Region override
    #[arg(long)]
    pub region: Option<String>,

    /// Comma separated subnet ids, replaces the configured list
    #[arg(long, value_delimiter = ',')]
    pub subnets: Option<Vec<String>>,

    /// Start per-interface recorders instead of only tracking membership
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub live: bool,

    /// Comma separated CIDR blocks; records touching none of them are skipped
    #[arg(long = "addr", value_delimiter = ',', value_parser = parse_cidr)]
    pub address_filters: Option<Vec<IpCidr>>,

    /// What to run once the configuration is loaded
    #[arg(long, value_enum, default_value_t = Action::Record)]
    pub action: Action,
}

/// Complete runtime configuration.
///
/// # Fields Overview
///
/// - `region`: region handed to the collaborators, only logged by the directory backend
/// - `subnets`: subnets whose interfaces are watched, one watcher each
/// - `live_recording`: when `false` membership is tracked but no stream is tailed
/// - `address_filters`: optional CIDR allow-list applied to flow records
/// - `recording`, `output`, `source`: see the respective types
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_region")]
    pub region: String,
    pub subnets: Vec<String>,
    #[serde(default)]
    pub live_recording: bool,
    #[serde(default, deserialize_with = "deserialize_cidrs")]
    pub address_filters: Vec<IpCidr>,
    #[serde(default)]
    pub recording: RecordingSettings,
    #[serde(default)]
    pub output: OutputSettings,
    #[serde(default)]
    pub source: SourceConfig,
}

fn default_region() -> String {
    String::from("us-east-1")
}

impl Config {
    /// Loads the file named in `args`, then applies environment and CLI
    /// overrides (CLI wins), then validates the result.
    pub fn load(args: &CliArgs) -> Result<Config, ConfigError> {
        let mut config = Config::from_file(&args.config_file)?;
        config.apply_env_overrides();
        config.apply_cli_overrides(args);
        config.validate()?;
        info!(
            "Configuration loaded: region={}, subnets={:?}, live_recording={}",
            config.region, config.subnets, config.live_recording
        );
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        debug!("Reading configuration file {}", path.display());
        let content = std::fs::read_to_string(path)?;
        Config::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Config, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(region) = std::env::var(REGION_ENV) {
            if !region.is_empty() {
                debug!("Region overridden by {}: {}", REGION_ENV, region);
                self.region = region;
            }
        }
        if let Ok(dir) = std::env::var(OUTPUT_DIR_ENV) {
            if !dir.is_empty() {
                debug!("Output files rebased by {}: {}", OUTPUT_DIR_ENV, dir);
                self.output.rebase(Path::new(&dir));
            }
        }
    }

    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(region) = args.region.as_ref().filter(|r| !r.is_empty()) {
            self.region = region.clone();
        }
        if let Some(subnets) = &args.subnets {
            self.subnets = subnets
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if args.live {
            self.live_recording = true;
        }
        if let Some(filters) = &args.address_filters {
            self.address_filters = filters.clone();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subnets.is_empty() {
            return Err(ConfigError::SubnetsEmpty(
                "at least one subnet must be monitored".to_string(),
            ));
        }

        let subnet_re = Regex::new(r"^subnet-[0-9a-f]+$")
            .map_err(|e| ConfigError::BadSubnetId(e.to_string()))?;
        for subnet in &self.subnets {
            if !subnet_re.is_match(subnet) {
                return Err(ConfigError::BadSubnetId(format!(
                    "'{}' does not look like a subnet id",
                    subnet
                )));
            }
        }

        let r = &self.recording;
        if !(1..=64).contains(&r.worker_pool_size) {
            return Err(ConfigError::NotInRange(format!(
                "worker_pool_size must be within 1..=64, got {}",
                r.worker_pool_size
            )));
        }
        if !(1..=10_000).contains(&r.events_page_limit) {
            return Err(ConfigError::NotInRange(format!(
                "events_page_limit must be within 1..=10000, got {}",
                r.events_page_limit
            )));
        }
        for (name, value) in [
            ("discovery_interval_secs", r.discovery_interval_secs),
            ("poll_interval_secs", r.poll_interval_secs),
            ("retry_backoff_secs", r.retry_backoff_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::NotInRange(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        if self.output.snapshots_path.as_os_str().is_empty() {
            return Err(ConfigError::NotInRange(
                "output.snapshots_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
