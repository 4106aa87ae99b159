// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "cropcast";
pub const BASE_URL_ENV: &str = "CROPCAST_API_BASE_URL";
const CONFIG_PATH_ENV: &str = "CROPCAST_CONFIG_PATH";
const CONFIG_VERSION: i64 = 1;
const DEFAULT_TIMEOUT: &str = "10s";
const DEFAULT_CURRENCY_SYMBOL: &str = "₹";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub service: Service,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            service: Service::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Service {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub currency_symbol: Option<String>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            currency_symbol: Some(DEFAULT_CURRENCY_SYMBOL.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set {CONFIG_PATH_ENV} to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} is not versioned. Add `version = 1` and keep values under [service], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(timeout) = &self.service.timeout {
            let parsed = parse_duration(timeout)?;
            if parsed <= Duration::ZERO {
                bail!(
                    "service.timeout in {} must be positive, got {}",
                    path.display(),
                    timeout
                );
            }
        }

        if let Some(symbol) = &self.ui.currency_symbol
            && symbol.trim().is_empty()
        {
            bail!(
                "ui.currency_symbol in {} must not be blank -- remove it to use {}",
                path.display(),
                DEFAULT_CURRENCY_SYMBOL
            );
        }

        Ok(())
    }

    /// Resolves the service base URL: command line, then environment, then config.
    pub fn resolve_base_url(&self, cli_override: Option<&str>) -> Result<String> {
        self.resolve_base_url_with(cli_override, env::var(BASE_URL_ENV).ok().as_deref())
    }

    fn resolve_base_url_with(
        &self,
        cli_override: Option<&str>,
        env_value: Option<&str>,
    ) -> Result<String> {
        let candidates = [cli_override, env_value, self.service.base_url.as_deref()];
        let resolved = candidates
            .into_iter()
            .flatten()
            .map(|value| value.trim().trim_end_matches('/'))
            .find(|value| !value.is_empty());

        match resolved {
            Some(url) => Ok(url.to_owned()),
            None => bail!(
                "service base URL is not configured -- set {BASE_URL_ENV} or [service].base_url and retry"
            ),
        }
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.service.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn currency_symbol(&self) -> &str {
        self.ui
            .currency_symbol
            .as_deref()
            .unwrap_or(DEFAULT_CURRENCY_SYMBOL)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let data_root = dirs::data_dir().ok_or_else(|| {
            anyhow!("cannot resolve data directory; set [log].file to an explicit path")
        })?;
        Ok(data_root.join(APP_NAME).join("cropcast.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# cropcast config\n# Place this file at: {}\n\nversion = 1\n\n[service]\n# Overridden by {} or --base-url\n# base_url = \"http://127.0.0.1:8000\"\n# Bounds catalog lookups; predictions wait for the service\ntimeout = \"{}\"\n\n[ui]\ncurrency_symbol = \"{}\"\n\n[log]\nlevel = \"{}\"\n# Optional. Default is platform data dir (for example ~/.local/share/cropcast/cropcast.log)\n# file = \"/absolute/path/to/cropcast.log\"\n",
            path.display(),
            BASE_URL_ENV,
            DEFAULT_TIMEOUT,
            DEFAULT_CURRENCY_SYMBOL,
            DEFAULT_LOG_LEVEL,
        )
    }
}

fn parse_duration(raw: &str) -> Result<Duration> {
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid timeout duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins * 60));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 10s)")
}

#[cfg(test)]
mod tests {
    use super::{BASE_URL_ENV, Config, parse_duration};
    use anyhow::Result;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.timeout()?, Duration::from_secs(10));
        assert_eq!(config.currency_symbol(), "₹");
        assert_eq!(config.log_level(), "info");
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[service]\nbase_url=\"http://prices.example\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[service], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn v1_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[service]\nbase_url = \"http://prices.example/\"\ntimeout = \"2s\"\n[ui]\ncurrency_symbol = \"Rs.\"\n[log]\nlevel = \"debug\"\nfile = \"/tmp/cropcast-test.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.timeout()?, Duration::from_secs(2));
        assert_eq!(config.currency_symbol(), "Rs.");
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_file()?, PathBuf::from("/tmp/cropcast-test.log"));
        assert_eq!(
            config.resolve_base_url_with(None, None)?,
            "http://prices.example"
        );
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("CROPCAST_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path();
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("CROPCAST_CONFIG_PATH");
        }
        assert_eq!(resolved?, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("CROPCAST_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("cropcast/config.toml"));
        Ok(())
    }

    #[test]
    fn base_url_precedence_is_cli_then_env_then_config() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[service]\nbase_url = \"http://from-config\"\n")?;
        let config = Config::load(&path)?;

        assert_eq!(
            config.resolve_base_url_with(Some("http://from-cli/"), Some("http://from-env"))?,
            "http://from-cli"
        );
        assert_eq!(
            config.resolve_base_url_with(None, Some("http://from-env//"))?,
            "http://from-env"
        );
        assert_eq!(
            config.resolve_base_url_with(None, Some("   "))?,
            "http://from-config"
        );
        Ok(())
    }

    #[test]
    fn missing_base_url_names_the_remedy() {
        let error = Config::default()
            .resolve_base_url_with(None, None)
            .expect_err("missing base URL should fail");
        let message = error.to_string();
        assert!(message.contains(BASE_URL_ENV));
        assert!(message.contains("[service].base_url"));
        assert!(message.contains("retry"));
    }

    #[test]
    fn resolve_base_url_reads_environment() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var(BASE_URL_ENV, "http://127.0.0.1:8000/");
        }
        let resolved = Config::default().resolve_base_url(None);
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var(BASE_URL_ENV);
        }
        assert_eq!(resolved?, "http://127.0.0.1:8000");
        Ok(())
    }

    #[test]
    fn timeout_parses_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn timeout_rejects_invalid_duration() {
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        let message = error.to_string();
        assert!(
            message.contains("invalid duration") || message.contains("invalid timeout duration"),
            "unexpected message: {message}"
        );
    }

    #[test]
    fn timeout_rejects_non_positive_values_in_config() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[service]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn blank_currency_symbol_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\ncurrency_symbol = \" \"\n")?;
        let error = Config::load(&path).expect_err("blank symbol should fail");
        assert!(error.to_string().contains("must not be blank"));
        Ok(())
    }

    #[test]
    fn log_file_defaults_under_data_dir() -> Result<()> {
        let path = Config::default().log_file()?;
        assert!(path.ends_with("cropcast/cropcast.log"), "got {}", path.display());
        Ok(())
    }

    #[test]
    fn example_config_includes_required_sections() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("config.toml");
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        assert!(example.contains("[service]"));
        assert!(example.contains("[ui]"));
        assert!(example.contains("[log]"));

        let (_temp, written) = write_config(&example)?;
        let parsed = Config::load(&written)?;
        assert_eq!(parsed.timeout()?, Duration::from_secs(10));
        Ok(())
    }
}
