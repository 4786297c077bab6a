// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write;

#[test]
fn parses_daemon_subcommand() {
    let cli = Cli::try_parse_from(["host-metering", "daemon"]).expect("parse");
    assert!(matches!(cli.command, Command::Daemon));
    assert_eq!(cli.config, PathBuf::from("/etc/host-metering.conf"));
}

#[test]
fn parses_once_subcommand_with_overrides() {
    let cli = Cli::try_parse_from([
        "host-metering",
        "--write-url",
        "https://example.test/write",
        "--tick",
        "30",
        "--cert",
        "/tmp/cert.pem",
        "--key",
        "/tmp/key.pem",
        "once",
    ])
    .expect("parse");
    assert!(matches!(cli.command, Command::Once));
    assert_eq!(cli.write_url.as_deref(), Some("https://example.test/write"));
    assert_eq!(cli.tick, Some(30));
}

#[test]
fn rejects_missing_subcommand() {
    let result = Cli::try_parse_from(["host-metering"]);
    assert!(result.is_err());
}

#[test]
fn apply_overrides_leaves_unset_fields_untouched() {
    let mut config = Config::default();
    let original_wal_path = config.metrics_wal_path.clone();
    let cli = Cli::try_parse_from(["host-metering", "--tick", "120", "once"]).expect("parse");

    apply_overrides(&mut config, &cli);

    assert_eq!(config.collect_interval_sec, 120);
    assert_eq!(config.metrics_wal_path, original_wal_path);
}

#[test]
fn apply_overrides_wins_over_file_config() {
    let mut config_file = tempfile::NamedTempFile::new().expect("tempfile");
    writeln!(config_file, "[host-metering]\nwrite_url=https://from-file.test/write")
        .expect("write");
    let mut config = Config::load(config_file.path()).expect("load");
    let cli = Cli::try_parse_from([
        "host-metering",
        "--write-url",
        "https://from-flag.test/write",
        "once",
    ])
    .expect("parse");

    apply_overrides(&mut config, &cli);

    assert_eq!(config.write_url, "https://from-flag.test/write");
}
