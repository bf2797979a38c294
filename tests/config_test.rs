mod common;

use common::{RecordingDestination, at, logon_entry};
use hmc_log_forwarder::app::config::{DestKind, FormatKind};
use hmc_log_forwarder::app::{App, Config, ConfigError};
use hmc_log_forwarder::collector::{MemorySource, StartPoint};
use hmc_log_forwarder::domain::LogType;
use hmc_log_forwarder::formatter::{FormatContext, Formatter};
use hmc_log_forwarder::{Forwarding, ForwarderError};
use std::fs;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const CONFIG: &str = r#"
hmc_host: 10.11.12.13
hmc_user: ensadmin
hmc_password: "s3cret"
label: lab-hmc1
since: all
future: false
log_message_file: messages.yaml
forwardings:
  - name: console
    logs: [security]
    dest: stdout
  - name: central
    dest: syslog
    syslog_host: 10.11.12.14
    syslog_porttype: udp
    syslog_facility: local3
    format: cadf
"#;

const MESSAGES: &str = r#"
hmc_version: "2.15"
messages:
  - number: '1279'
    message: "User {0} has logged on"
    action: authenticate/logon
    outcome: success
    target_type: service/security/account/user
    target_class: user
"#;

fn write_config(dir: &TempDir, config: &str) -> std::path::PathBuf {
    let path = dir.path().join("forwarder.yaml");
    fs::write(&path, config).unwrap();
    path
}

#[test]
fn test_load_resolves_message_file_next_to_config() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("messages.yaml"), MESSAGES).unwrap();
    let config = Config::load(write_config(&dir, CONFIG)).unwrap();

    assert_eq!(config.since, StartPoint::All);
    assert_eq!(config.label(), "lab-hmc1");
    assert_eq!(
        config.log_message_file.as_deref(),
        Some(dir.path().join("messages.yaml").as_path())
    );
    assert_eq!(config.forwardings[0].dest, DestKind::Stdout);
    assert_eq!(config.forwardings[1].format, FormatKind::Cadf);
    assert_eq!(config.all_logs(), vec![LogType::Security, LogType::Audit]);
    assert_eq!(
        config.forwardings[1].describe_dest(),
        "syslog (server 10.11.12.14, port 514/udp, facility local3)"
    );

    let app = App::new(config);
    let catalog = app.load_catalog().unwrap();
    assert_eq!(catalog.len(), 1);
    let forwardings = app.build_forwardings().unwrap();
    assert_eq!(forwardings.len(), 2);
    assert_eq!(app.hmc_config().port, 6794);
}

#[test]
fn test_missing_file() {
    let err = Config::load("/nonexistent/forwarder.yaml").unwrap_err();
    assert!(matches!(err, ConfigError::FileError { .. }));
}

#[test]
fn test_validation_runs_on_load() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        "hmc_host: h\nhmc_user: u\nhmc_password: p\nforwardings:\n  - {name: a, dest: stdout}\n  - {name: a, dest: stderr}\n",
    );
    assert!(matches!(
        Config::load(path),
        Err(ConfigError::InvalidConfig(_))
    ));

    let path = write_config(
        &dir,
        "hmc_host: h\nhmc_user: u\nhmc_password: p\nforwardings:\n  - {name: a, dest: stdout, line_format: '{time} {bogus}'}\n",
    );
    assert!(matches!(
        Config::load(path),
        Err(ConfigError::InvalidForwarding { .. })
    ));
}

#[test]
fn test_missing_message_file_is_catalog_error() {
    let dir = TempDir::new().unwrap();
    let config = Config::load(write_config(&dir, CONFIG)).unwrap();
    assert!(matches!(
        App::new(config).load_catalog(),
        Err(ForwarderError::CatalogLoad(_))
    ));
}

#[tokio::test]
async fn test_app_runs_over_memory_source() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("messages.yaml"), MESSAGES).unwrap();
    let app = App::new(Config::load(write_config(&dir, CONFIG)).unwrap());

    let recording = RecordingDestination::default();
    let forwardings = vec![Forwarding::new(
        "console",
        vec![LogType::Security],
        Box::new(recording.clone()),
        Formatter::line("{label}|{user}|{msg}", "iso8601", FormatContext::new("lab-hmc1"))
            .unwrap(),
    )];
    let mut source = MemorySource::new(at(0))
        .with_version("2.15.0")
        .with_historical(vec![logon_entry(1, 1)]);

    let summary = app
        .run_with_source(
            app.load_catalog().unwrap(),
            forwardings,
            &mut source,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(summary.dispatched, 1);
    assert_eq!(summary.unclassified, 0);
    assert_eq!(recording.texts(), vec!["lab-hmc1|alice|User alice has logged on"]);
}
