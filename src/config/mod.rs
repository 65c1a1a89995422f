//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{num::NonZeroU32, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;
use uuid::Uuid;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "bozza";
const DEFAULT_REMOTE_URL: &str = "http://127.0.0.1:3000";
const DEFAULT_SNAPSHOT_PATH: &str = "blog-draft.json";
const DEFAULT_AUTOSAVE_QUIET_SECS: u64 = 10;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 10;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u64 = 3;
const DEFAULT_RATE_LIMIT_SWEEP_SECS: u64 = 300;

/// Command-line arguments for the bozza binary.
#[derive(Debug, Parser)]
#[command(name = "bozza", version, about = "Offline-tolerant draft editor for the blog API")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "BOZZA_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Open the interactive editor.
    Edit(Box<EditArgs>),
    /// Push the local snapshot to the server and exit.
    Sync(SyncArgs),
    /// Print engine and snapshot status.
    Status(StatusArgs),
    /// Drop the local snapshot.
    Discard(DiscardArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct EditArgs {
    #[command(flatten)]
    pub overrides: EngineOverrides,

    /// Open an existing post for editing.
    #[arg(long = "edit", value_name = "UUID")]
    pub edit: Option<Uuid>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub overrides: EngineOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub overrides: EngineOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct DiscardArgs {
    #[command(flatten)]
    pub overrides: EngineOverrides,

    /// Also delete the server-side draft the snapshot points at.
    #[arg(long = "remote", action = clap::ArgAction::SetTrue)]
    pub remote: bool,
}

#[derive(Debug, Args, Default, Clone)]
pub struct EngineOverrides {
    /// Override the remote API base URL.
    #[arg(long = "remote-url", value_name = "URL")]
    pub remote_url: Option<String>,

    /// Bearer token for the remote API.
    #[arg(long = "api-token", env = "BOZZA_API_TOKEN", value_name = "TOKEN")]
    pub api_token: Option<String>,

    /// Account the token belongs to.
    #[arg(long = "account-id", value_name = "UUID")]
    pub account_id: Option<Uuid>,

    /// Override the local snapshot file path.
    #[arg(long = "storage-path", value_name = "PATH")]
    pub storage_path: Option<PathBuf>,

    /// Override the autosave quiet period.
    #[arg(long = "autosave-quiet-seconds", value_name = "SECONDS")]
    pub autosave_quiet_seconds: Option<u64>,

    /// Override the connectivity probe interval.
    #[arg(long = "probe-interval-seconds", value_name = "SECONDS")]
    pub probe_interval_seconds: Option<u64>,

    /// Override the write throttle window size.
    #[arg(long = "rate-limit-window-seconds", value_name = "SECONDS")]
    pub rate_limit_window_seconds: Option<u64>,

    /// Override the write throttle request ceiling.
    #[arg(long = "rate-limit-max-requests", value_name = "COUNT")]
    pub rate_limit_max_requests: Option<u64>,

    /// Override the throttle bucket sweep cadence.
    #[arg(long = "rate-limit-sweep-seconds", value_name = "SECONDS")]
    pub rate_limit_sweep_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub logging: LoggingSettings,
    pub remote: RemoteSettings,
    pub storage: StorageSettings,
    pub autosave: AutosaveSettings,
    pub connectivity: ConnectivitySettings,
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RemoteSettings {
    pub base_url: Url,
    pub api_token: Option<String>,
    pub account_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct StorageSettings {
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct AutosaveSettings {
    pub quiet_period: Duration,
}

#[derive(Debug, Clone)]
pub struct ConnectivitySettings {
    pub probe_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct RateLimitSettings {
    pub window_seconds: NonZeroU32,
    pub max_requests: NonZeroU32,
    pub sweep_cadence: Duration,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("BOZZA").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Edit(args)) => raw.apply_engine_overrides(&args.overrides),
        Some(Command::Sync(args)) => raw.apply_engine_overrides(&args.overrides),
        Some(Command::Status(args)) => raw.apply_engine_overrides(&args.overrides),
        Some(Command::Discard(args)) => raw.apply_engine_overrides(&args.overrides),
        None => raw.apply_engine_overrides(&EngineOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    logging: RawLoggingSettings,
    remote: RawRemoteSettings,
    storage: RawStorageSettings,
    autosave: RawAutosaveSettings,
    connectivity: RawConnectivitySettings,
    rate_limit: RawRateLimitSettings,
}

impl RawSettings {
    fn apply_engine_overrides(&mut self, overrides: &EngineOverrides) {
        if let Some(url) = overrides.remote_url.as_ref() {
            self.remote.base_url = Some(url.clone());
        }
        if let Some(token) = overrides.api_token.as_ref() {
            self.remote.api_token = Some(token.clone());
        }
        if let Some(account) = overrides.account_id {
            self.remote.account_id = Some(account.to_string());
        }
        if let Some(path) = overrides.storage_path.as_ref() {
            self.storage.snapshot_path = Some(path.clone());
        }
        if let Some(seconds) = overrides.autosave_quiet_seconds {
            self.autosave.quiet_period_seconds = Some(seconds);
        }
        if let Some(seconds) = overrides.probe_interval_seconds {
            self.connectivity.probe_interval_seconds = Some(seconds);
        }
        if let Some(window) = overrides.rate_limit_window_seconds {
            self.rate_limit.window_seconds = Some(window);
        }
        if let Some(max) = overrides.rate_limit_max_requests {
            self.rate_limit.max_requests = Some(max);
        }
        if let Some(sweep) = overrides.rate_limit_sweep_seconds {
            self.rate_limit.sweep_cadence_seconds = Some(sweep);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            logging,
            remote,
            storage,
            autosave,
            connectivity,
            rate_limit,
        } = raw;

        let logging = build_logging_settings(logging)?;
        let remote = build_remote_settings(remote)?;
        let storage = build_storage_settings(storage)?;
        let autosave = build_autosave_settings(autosave)?;
        let connectivity = build_connectivity_settings(connectivity)?;
        let rate_limit = build_rate_limit_settings(rate_limit)?;

        Ok(Self {
            logging,
            remote,
            storage,
            autosave,
            connectivity,
            rate_limit,
        })
    }
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_remote_settings(remote: RawRemoteSettings) -> Result<RemoteSettings, LoadError> {
    let base_url_value = remote
        .base_url
        .unwrap_or_else(|| DEFAULT_REMOTE_URL.to_string());
    let base_url = Url::parse(base_url_value.trim())
        .map_err(|err| LoadError::invalid("remote.base_url", format!("failed to parse: {err}")))?;

    let api_token = remote.api_token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let account_id = match remote.account_id {
        Some(value) if !value.trim().is_empty() => {
            let parsed = Uuid::parse_str(value.trim()).map_err(|err| {
                LoadError::invalid("remote.account_id", format!("failed to parse: {err}"))
            })?;
            Some(parsed)
        }
        _ => None,
    };

    Ok(RemoteSettings {
        base_url,
        api_token,
        account_id,
    })
}

fn build_storage_settings(storage: RawStorageSettings) -> Result<StorageSettings, LoadError> {
    let snapshot_path = storage
        .snapshot_path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOT_PATH));
    if snapshot_path.as_os_str().is_empty() {
        return Err(LoadError::invalid(
            "storage.snapshot_path",
            "path must not be empty",
        ));
    }

    Ok(StorageSettings { snapshot_path })
}

fn build_autosave_settings(autosave: RawAutosaveSettings) -> Result<AutosaveSettings, LoadError> {
    let quiet_seconds = autosave
        .quiet_period_seconds
        .unwrap_or(DEFAULT_AUTOSAVE_QUIET_SECS);
    if quiet_seconds == 0 {
        return Err(LoadError::invalid(
            "autosave.quiet_period_seconds",
            "must be greater than zero",
        ));
    }

    Ok(AutosaveSettings {
        quiet_period: Duration::from_secs(quiet_seconds),
    })
}

fn build_connectivity_settings(
    connectivity: RawConnectivitySettings,
) -> Result<ConnectivitySettings, LoadError> {
    let probe_seconds = connectivity
        .probe_interval_seconds
        .unwrap_or(DEFAULT_PROBE_INTERVAL_SECS);
    if probe_seconds == 0 {
        return Err(LoadError::invalid(
            "connectivity.probe_interval_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ConnectivitySettings {
        probe_interval: Duration::from_secs(probe_seconds),
    })
}

fn build_rate_limit_settings(
    rate_limit: RawRateLimitSettings,
) -> Result<RateLimitSettings, LoadError> {
    let window_seconds_val = rate_limit
        .window_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECS);
    let window_seconds = non_zero_u32(window_seconds_val, "rate_limit.window_seconds")?;

    let max_requests_val = rate_limit
        .max_requests
        .unwrap_or(DEFAULT_RATE_LIMIT_MAX_REQUESTS);
    let max_requests = non_zero_u32(max_requests_val, "rate_limit.max_requests")?;

    let sweep_seconds = rate_limit
        .sweep_cadence_seconds
        .unwrap_or(DEFAULT_RATE_LIMIT_SWEEP_SECS);
    if sweep_seconds == 0 {
        return Err(LoadError::invalid(
            "rate_limit.sweep_cadence_seconds",
            "must be greater than zero",
        ));
    }

    Ok(RateLimitSettings {
        window_seconds,
        max_requests,
        sweep_cadence: Duration::from_secs(sweep_seconds),
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRemoteSettings {
    base_url: Option<String>,
    api_token: Option<String>,
    account_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawStorageSettings {
    snapshot_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAutosaveSettings {
    quiet_period_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawConnectivitySettings {
    probe_interval_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRateLimitSettings {
    window_seconds: Option<u64>,
    max_requests: Option<u64>,
    sweep_cadence_seconds: Option<u64>,
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.remote.base_url = Some("http://config-file.example:9".to_string());
        raw.logging.level = Some("info".to_string());

        let overrides = EngineOverrides {
            remote_url: Some("https://blog.example.net".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_engine_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.remote.base_url.host_str(), Some("blog.example.net"));
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn autosave_quiet_period_defaults_to_ten_seconds() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.autosave.quiet_period, Duration::from_secs(10));
    }

    #[test]
    fn zero_quiet_period_is_rejected() {
        let mut raw = RawSettings::default();
        raw.autosave.quiet_period_seconds = Some(0);

        let error = Settings::from_raw(raw).expect_err("must reject zero");
        assert!(matches!(
            error,
            LoadError::Invalid {
                key: "autosave.quiet_period_seconds",
                ..
            }
        ));
    }

    #[test]
    fn malformed_account_id_is_rejected() {
        let mut raw = RawSettings::default();
        raw.remote.account_id = Some("not-a-uuid".to_string());

        let error = Settings::from_raw(raw).expect_err("must reject malformed id");
        assert!(matches!(
            error,
            LoadError::Invalid {
                key: "remote.account_id",
                ..
            }
        ));
    }

    #[test]
    fn blank_api_token_counts_as_absent() {
        let mut raw = RawSettings::default();
        raw.remote.api_token = Some("   ".to_string());

        let settings = Settings::from_raw(raw).expect("valid settings");
        assert_eq!(settings.remote.api_token, None);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = EngineOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_engine_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn default_to_edit_command() {
        let args = CliArgs::parse_from(["bozza"]);
        let command = args
            .command
            .unwrap_or(Command::Edit(Box::<EditArgs>::default()));
        assert!(matches!(command, Command::Edit(_)));
    }

    #[test]
    fn rate_limit_defaults_follow_the_write_budget() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.rate_limit.window_seconds.get(), 10);
        assert_eq!(settings.rate_limit.max_requests.get(), 3);
        assert_eq!(settings.rate_limit.sweep_cadence, Duration::from_secs(300));
    }
}
