mod common;

use common::{entry, logon_entry};
use hmc_log_forwarder::catalog::{CatalogLoadError, MessageCatalog, Outcome};
use hmc_log_forwarder::domain::LogType;
use hmc_log_forwarder::formatter::{
    DEFAULT_LINE_FORMAT, FormatContext, Formatter, LineField, LineFormat,
};
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn test_builtin_catalog_classifies_logon() {
    let catalog = MessageCatalog::builtin().unwrap();
    assert!(catalog.is_applicable_to("2.15.0"));
    assert!(!catalog.is_applicable_to("2.12.1"));

    let classification = catalog.classify(&logon_entry(38, 1));
    assert!(classification.is_classified());
    assert_eq!(classification.action(), "authenticate/logon");
    assert_eq!(classification.outcome(), Outcome::Success);
    assert_eq!(classification.target_class(), "user");
    assert_eq!(classification.args(), &["alice".to_string()]);
}

#[test]
fn test_catalog_from_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "hmc_version: '2.16'\nmessages:\n  - number: '2001'\n    message: 'Backup of {{0}} failed'\n    action: backup\n    outcome: failure\n    target_type: data/backup\n    target_class: backup"
    )
    .unwrap();

    let catalog = MessageCatalog::from_file(file.path()).unwrap();
    assert_eq!(catalog.len(), 1);
    let classification = catalog.classify(&entry(
        LogType::Audit,
        1,
        1,
        "2001",
        "Backup of console data failed",
    ));
    assert_eq!(classification.outcome(), Outcome::Failure);
    assert_eq!(classification.args(), &["console data".to_string()]);
}

#[test]
fn test_catalog_file_errors() {
    assert!(matches!(
        MessageCatalog::from_file("/nonexistent/hmc_messages.yaml"),
        Err(CatalogLoadError::Io { .. })
    ));

    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "hmc_version: '2.15'\nmessages: [{{number: 1}}]").unwrap();
    assert!(matches!(
        MessageCatalog::from_file(file.path()),
        Err(CatalogLoadError::Malformed(_))
    ));
}

#[test]
fn test_logon_renders_in_default_line_format() {
    let catalog = MessageCatalog::builtin().unwrap();
    let entry = logon_entry(38, 1);
    let formatter = Formatter::line(
        DEFAULT_LINE_FORMAT,
        "iso8601",
        FormatContext::new("lab-hmc1"),
    )
    .unwrap();

    let record = formatter.render(&entry, &catalog.classify(&entry));
    let line = record.as_str();
    assert!(line.starts_with("2019-08-09T12:46:38.550000+02:00 "));
    assert!(line.contains(" lab-hmc1 security "));
    assert!(line.contains(" Logon "));
    assert!(line.contains(" 1279 alice "));
    assert!(line.ends_with(" User alice has logged on"));
    assert_eq!(record.outcome(), Outcome::Success);
}

#[test]
fn test_rendered_line_extracts_back() {
    let catalog = MessageCatalog::builtin().unwrap();
    let entry = logon_entry(38, 1);
    let format = "{log:8}|{id:>6}|{user:10}|{msg}";
    let formatter = Formatter::line(format, "iso8601", FormatContext::new("")).unwrap();

    let record = formatter.render(&entry, &catalog.classify(&entry));
    let fields = LineFormat::compile(format).unwrap().extract(record.as_str());

    assert_eq!(fields[&LineField::Log], "security");
    assert_eq!(fields[&LineField::Id], "1279");
    assert_eq!(fields[&LineField::User], "alice");
    assert_eq!(fields[&LineField::Msg], "User alice has logged on");
}

#[test]
fn test_rendering_twice_gives_same_output() {
    let catalog = MessageCatalog::builtin().unwrap();
    let entry = logon_entry(38, 1);
    let classification = catalog.classify(&entry);

    for formatter in [
        Formatter::line(DEFAULT_LINE_FORMAT, "%Y-%m-%d %H:%M:%S.%f%z", FormatContext::new("hmc"))
            .unwrap(),
        Formatter::cadf("iso8601", FormatContext::new("hmc")).unwrap(),
    ] {
        assert_eq!(
            formatter.render(&entry, &classification),
            formatter.render(&entry, &classification)
        );
    }
}

#[test]
fn test_logon_cadf_event() {
    let catalog = MessageCatalog::builtin().unwrap();
    let entry = logon_entry(38, 1).with_source_address("192.0.2.10");
    let formatter = Formatter::cadf("iso8601", FormatContext::new("lab-hmc1")).unwrap();

    let record = formatter.render(&entry, &catalog.classify(&entry));
    let event: serde_json::Value = serde_json::from_str(record.as_str()).unwrap();

    assert_eq!(event["action"], "authenticate/logon");
    assert_eq!(event["outcome"], "success");
    assert_eq!(event["eventTime"], "2019-08-09T12:46:38.550000+02:00");
    assert_eq!(event["initiator"]["name"], "alice");
    assert_eq!(event["initiator"]["host"]["address"], "192.0.2.10");
    assert_eq!(event["observer"]["name"], "lab-hmc1");
    assert!(uuid::Uuid::parse_str(event["id"].as_str().unwrap()).is_ok());
}
