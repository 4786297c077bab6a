// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! INI-file configuration with environment-variable override, matching the
//! `[host-metering]` section format and `HOST_METERING_*` prefix of the
//! original service.

use std::path::Path;

const SECTION: &str = "host-metering";
const ENV_PREFIX: &str = "HOST_METERING_";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub write_url: String,
    pub write_interval_sec: u64,
    pub collect_interval_sec: u64,
    pub label_refresh_interval_sec: u64,
    pub host_cert_path: String,
    pub host_cert_key_path: String,
    pub write_retry_attempts: u32,
    pub write_retry_min_interval_sec: u64,
    pub write_retry_max_interval_sec: u64,
    pub write_timeout_sec: u64,
    pub metrics_max_age_sec: u64,
    pub metrics_wal_path: String,
    pub log_level: String,
    pub log_path: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            write_url: "http://localhost:9090/api/v1/write".to_string(),
            write_interval_sec: 600,
            collect_interval_sec: 0,
            label_refresh_interval_sec: 86_400,
            host_cert_path: "/etc/pki/consumer/cert.pem".to_string(),
            host_cert_key_path: "/etc/pki/consumer/key.pem".to_string(),
            write_retry_attempts: 8,
            write_retry_min_interval_sec: 1,
            write_retry_max_interval_sec: 10,
            write_timeout_sec: 60,
            metrics_max_age_sec: 5_400,
            metrics_wal_path: "/var/run/host-metering/metrics".to_string(),
            log_level: "INFO".to_string(),
            log_path: String::new(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct ConfigInvalid(String);

impl Config {
    /// Loads the INI file at `path` if it exists, overlays
    /// `HOST_METERING_*` environment variables, then validates. A missing
    /// file is not an error: defaults plus environment overrides are used.
    ///
    /// A malformed numeric value in the file or environment doesn't fail
    /// fast: every such value is left at its previous setting and its
    /// parse failure is collected, so one pass reports every bad key
    /// instead of just the first. Those collected failures are returned
    /// together as one aggregated error; semantic validation, which runs
    /// only once the config is fully loaded, reports just the first rule
    /// it finds violated.
    pub fn load(path: &Path) -> Result<Config, ConfigInvalid> {
        let mut config = Config::default();
        let mut parse_errors = Vec::new();
        if path.exists() {
            if let Ok(ini) = ini::Ini::load_from_file(path) {
                if let Some(section) = ini.section(Some(SECTION)) {
                    apply_ini_section(&mut config, section, &mut parse_errors);
                }
            }
        }
        apply_env(&mut config, &mut parse_errors);
        if !parse_errors.is_empty() {
            let message: String = parse_errors.iter().map(|e| format!("{e}\n")).collect();
            return Err(ConfigInvalid(format!("multiple errors occurred:\n{message}")));
        }
        validate(&config)?;
        Ok(config)
    }
}

fn apply_ini_section(config: &mut Config, section: &ini::Properties, errors: &mut Vec<String>) {
    macro_rules! set_string {
        ($field:ident, $key:literal) => {
            if let Some(v) = section.get($key) {
                config.$field = v.to_string();
            }
        };
    }
    macro_rules! set_num {
        ($field:ident, $key:literal) => {
            if let Some(v) = section.get($key) {
                match v.parse() {
                    Ok(parsed) => config.$field = parsed,
                    Err(e) => errors.push(format!("invalid value of '{}': {e}", $key)),
                }
            }
        };
    }

    set_string!(write_url, "write_url");
    set_num!(write_interval_sec, "write_interval_sec");
    set_num!(collect_interval_sec, "collect_interval_sec");
    set_num!(label_refresh_interval_sec, "label_refresh_interval_sec");
    set_string!(host_cert_path, "host_cert_path");
    set_string!(host_cert_key_path, "host_cert_key_path");
    set_num!(write_retry_attempts, "write_retry_attempts");
    set_num!(write_retry_min_interval_sec, "write_retry_min_interval_sec");
    set_num!(write_retry_max_interval_sec, "write_retry_max_interval_sec");
    set_num!(write_timeout_sec, "write_timeout_sec");
    set_num!(metrics_max_age_sec, "metrics_max_age_sec");
    set_string!(metrics_wal_path, "metrics_wal_path");
    set_string!(log_level, "log_level");
    set_string!(log_path, "log_path");
}

fn apply_env(config: &mut Config, errors: &mut Vec<String>) {
    let get = |key: &str| std::env::var(format!("{ENV_PREFIX}{key}")).ok();
    macro_rules! set_num_env {
        ($field:ident, $key:literal) => {
            if let Some(v) = get($key) {
                match v.parse() {
                    Ok(parsed) => config.$field = parsed,
                    Err(e) => errors.push(format!("invalid value of '{ENV_PREFIX}{}': {e}", $key)),
                }
            }
        };
    }

    if let Some(v) = get("WRITE_URL") {
        config.write_url = v;
    }
    set_num_env!(write_interval_sec, "WRITE_INTERVAL_SEC");
    set_num_env!(collect_interval_sec, "COLLECT_INTERVAL_SEC");
    set_num_env!(label_refresh_interval_sec, "LABEL_REFRESH_INTERVAL_SEC");
    if let Some(v) = get("HOST_CERT_PATH") {
        config.host_cert_path = v;
    }
    if let Some(v) = get("HOST_CERT_KEY_PATH") {
        config.host_cert_key_path = v;
    }
    set_num_env!(write_retry_attempts, "WRITE_RETRY_ATTEMPTS");
    set_num_env!(write_retry_min_interval_sec, "WRITE_RETRY_MIN_INTERVAL_SEC");
    set_num_env!(write_retry_max_interval_sec, "WRITE_RETRY_MAX_INTERVAL_SEC");
    set_num_env!(write_timeout_sec, "WRITE_TIMEOUT_SEC");
    set_num_env!(metrics_max_age_sec, "METRICS_MAX_AGE_SEC");
    if let Some(v) = get("METRICS_WAL_PATH") {
        config.metrics_wal_path = v;
    }
    if let Some(v) = get("LOG_LEVEL") {
        config.log_level = v;
    }
    if let Some(v) = get("LOG_PATH") {
        config.log_path = v;
    }
}

/// Reports only the first rule violated, matching the original's
/// fail-on-first-check semantics.
fn validate(config: &Config) -> Result<(), ConfigInvalid> {
    if config.write_url.is_empty() {
        return Err(ConfigInvalid("write_url must not be empty".to_string()));
    }
    if config.metrics_wal_path.is_empty() {
        return Err(ConfigInvalid("metrics_wal_path must not be empty".to_string()));
    }
    let min_budget = config.write_retry_attempts as u64
        * (config.write_retry_max_interval_sec + config.write_timeout_sec);
    if config.write_interval_sec <= min_budget {
        return Err(ConfigInvalid(format!(
            "write_interval_sec must be greater than write_retry_attempts*(write_retry_max_interval_sec+write_timeout_sec) = {min_budget}"
        )));
    }
    if config.write_retry_min_interval_sec >= config.write_retry_max_interval_sec {
        return Err(ConfigInvalid(
            "write_retry_min_interval_sec must be less than write_retry_max_interval_sec"
                .to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[yare::parameterized(
        empty_write_url = { |c: &mut Config| c.write_url.clear() },
        empty_wal_path = { |c: &mut Config| c.metrics_wal_path.clear() },
        retry_budget_exceeds_interval = { |c: &mut Config| c.write_interval_sec = 1 },
        min_interval_not_less_than_max = { |c: &mut Config| c.write_retry_min_interval_sec = c.write_retry_max_interval_sec },
    )]
    fn rejects_invalid_config(mutate: fn(&mut Config)) {
        let mut config = Config::default();
        mutate(&mut config);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        std::env::set_var("HOST_METERING_WRITE_URL", "https://example.invalid/write");
        let mut config = Config::default();
        apply_env(&mut config, &mut Vec::new());
        std::env::remove_var("HOST_METERING_WRITE_URL");
        assert_eq!(config.write_url, "https://example.invalid/write");
    }

    #[test]
    fn loads_ini_section() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("host-metering.conf");
        std::fs::write(
            &path,
            "[host-metering]\n# comment\nwrite_url = https://ini.example/write\nwrite_interval_sec = 700\n",
        )
        .expect("write config");
        let config = Config::load(&path).expect("load");
        assert_eq!(config.write_url, "https://ini.example/write");
        assert_eq!(config.write_interval_sec, 700);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing.conf");
        let config = Config::load(&path).expect("load");
        assert_eq!(config, Config::default());
    }

    #[test]
    fn malformed_numeric_fields_are_aggregated_and_left_at_their_previous_value() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("host-metering.conf");
        std::fs::write(
            &path,
            "[host-metering]\nwrite_interval_sec = a\ncollect_interval_sec = b\n",
        )
        .expect("write config");

        let err = Config::load(&path).expect_err("malformed config must fail");
        let message = err.to_string();
        assert!(message.starts_with("multiple errors occurred:\n"));
        assert!(message.contains("invalid value of 'write_interval_sec'"));
        assert!(message.contains("invalid value of 'collect_interval_sec'"));
    }

    #[test]
    fn malformed_env_numeric_field_names_the_full_variable() {
        std::env::set_var("HOST_METERING_WRITE_RETRY_ATTEMPTS", "not-a-number");
        let mut errors = Vec::new();
        apply_env(&mut Config::default(), &mut errors);
        std::env::remove_var("HOST_METERING_WRITE_RETRY_ATTEMPTS");

        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("HOST_METERING_WRITE_RETRY_ATTEMPTS"));
    }

    #[test]
    fn semantic_validation_reports_only_the_first_violation() {
        let mut config = Config::default();
        config.write_url.clear();
        config.metrics_wal_path.clear();

        let err = validate(&config).expect_err("must fail");
        assert_eq!(err.to_string(), "write_url must not be empty");
    }
}
