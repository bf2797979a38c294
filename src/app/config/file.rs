use super::serde_helpers;
use super::{ConfigError, DestKind, FormatKind};
use crate::collector::{StartPoint, VerifyCert};
use crate::destination::{ConsoleStream, Facility, Transport};
use crate::domain::LogType;
use crate::formatter::{DEFAULT_LINE_FORMAT, DEFAULT_TIME_FORMAT, default_check_data};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const DEFAULT_SELFLOG_FORMAT: &str = "%(levelname)s: %(message)s";

/// A password that never shows up in `Debug` output.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"********\"")
    }
}

/// The YAML config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub hmc_host: String,
    #[serde(default = "serde_helpers::default_hmc_port")]
    pub hmc_port: u16,
    pub hmc_user: String,
    pub hmc_password: Secret,
    #[serde(default)]
    pub hmc_verify_cert: VerifyCert,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, deserialize_with = "serde_helpers::start_point")]
    pub since: StartPoint,
    #[serde(default)]
    pub future: bool,
    /// Seconds between live polls of the HMC.
    #[serde(default = "serde_helpers::default_live_poll_interval")]
    pub live_poll_interval: u64,
    #[serde(default = "serde_helpers::default_selflog_dest")]
    pub selflog_dest: ConsoleStream,
    #[serde(default = "serde_helpers::default_selflog_format")]
    pub selflog_format: String,
    #[serde(default = "serde_helpers::default_time_format")]
    pub selflog_time_format: String,
    #[serde(default)]
    pub log_message_file: Option<PathBuf>,
    #[serde(default = "default_check_data")]
    pub check_data: serde_json::Value,
    #[serde(default)]
    pub forwardings: Vec<ForwardingConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ForwardingConfig {
    pub name: String,
    #[serde(default = "serde_helpers::default_logs")]
    pub logs: Vec<LogType>,
    pub dest: DestKind,
    #[serde(default)]
    pub syslog_host: Option<String>,
    #[serde(default = "serde_helpers::default_syslog_port")]
    pub syslog_port: u16,
    #[serde(default = "serde_helpers::default_syslog_porttype")]
    pub syslog_porttype: Transport,
    #[serde(default = "serde_helpers::default_syslog_facility")]
    pub syslog_facility: Facility,
    #[serde(default)]
    pub format: FormatKind,
    #[serde(default = "serde_helpers::default_line_format")]
    pub line_format: String,
    #[serde(default = "serde_helpers::default_time_format")]
    pub time_format: String,
}

impl ForwardingConfig {
    /// A forwarding with every optional key at its default.
    pub fn new(name: impl Into<String>, dest: DestKind) -> Self {
        Self {
            name: name.into(),
            logs: serde_helpers::default_logs(),
            dest,
            syslog_host: None,
            syslog_port: serde_helpers::default_syslog_port(),
            syslog_porttype: serde_helpers::default_syslog_porttype(),
            syslog_facility: serde_helpers::default_syslog_facility(),
            format: FormatKind::default(),
            line_format: DEFAULT_LINE_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
        }
    }

    pub fn describe_dest(&self) -> String {
        match self.dest {
            DestKind::Stdout => "stdout".to_string(),
            DestKind::Stderr => "stderr".to_string(),
            DestKind::Syslog => format!(
                "syslog (server {}, port {}/{}, facility {})",
                self.syslog_host.as_deref().unwrap_or("?"),
                self.syslog_port,
                self.syslog_porttype,
                self.syslog_facility
            ),
        }
    }
}

impl Config {
    /// Parse a config document without validating it.
    pub fn from_yaml(document: &str) -> Result<Self, ConfigError> {
        Self::parse(document, Path::new("<inline>"))
    }

    fn parse(document: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(document).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Read, parse and validate a config file. A relative
    /// `log_message_file` is resolved against the config file's directory.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path).map_err(|source| ConfigError::FileError {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&document, path)?;

        if let Some(file) = &config.log_message_file
            && file.is_relative()
            && let Some(dir) = path.parent()
        {
            config.log_message_file = Some(dir.join(file));
        }

        config.validate()?;
        Ok(config)
    }

    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or_default()
    }

    /// Every log type any forwarding asks for, in a stable order.
    pub fn all_logs(&self) -> Vec<LogType> {
        LogType::ALL
            .into_iter()
            .filter(|log| self.forwardings.iter().any(|f| f.logs.contains(log)))
            .collect()
    }

    pub fn verify_cert_enabled(&self) -> bool {
        !matches!(self.hmc_verify_cert, VerifyCert::Enabled(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "hmc_host: 10.11.12.13\nhmc_user: myuser\nhmc_password: mypassword\n";

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        assert_eq!(config.hmc_port, 6794);
        assert_eq!(config.hmc_verify_cert, VerifyCert::Enabled(true));
        assert_eq!(config.since, StartPoint::Now);
        assert!(!config.future);
        assert_eq!(config.live_poll_interval, 5);
        assert_eq!(config.selflog_dest, ConsoleStream::Stdout);
        assert_eq!(config.selflog_format, DEFAULT_SELFLOG_FORMAT);
        assert_eq!(config.selflog_time_format, DEFAULT_TIME_FORMAT);
        assert_eq!(config.label(), "");
        assert_eq!(config.check_data["functional_users"], serde_json::json!([]));
        assert!(config.forwardings.is_empty());
    }

    #[test]
    fn test_forwarding_defaults() {
        let yaml = format!("{MINIMAL}forwardings:\n  - name: f1\n    dest: syslog\n    syslog_host: 10.0.0.1\n");
        let config = Config::from_yaml(&yaml).unwrap();
        let forwarding = &config.forwardings[0];
        assert_eq!(forwarding.logs, vec![LogType::Security, LogType::Audit]);
        assert_eq!(forwarding.syslog_port, 514);
        assert_eq!(forwarding.syslog_porttype, Transport::Tcp);
        assert_eq!(forwarding.syslog_facility, Facility::User);
        assert_eq!(forwarding.format, FormatKind::Line);
        assert_eq!(forwarding.line_format, DEFAULT_LINE_FORMAT);
        assert_eq!(forwarding.time_format, DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let yaml = format!("{MINIMAL}hmc_pasword: typo\n");
        assert!(matches!(
            Config::from_yaml(&yaml),
            Err(ConfigError::ParseError { .. })
        ));
    }

    #[test]
    fn test_missing_required_key() {
        assert!(Config::from_yaml("hmc_host: h\nhmc_user: u\n").is_err());
    }

    #[test]
    fn test_verify_cert_accepts_path() {
        let yaml = format!("{MINIMAL}hmc_verify_cert: /etc/ssl/hmc-ca.pem\n");
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(
            config.hmc_verify_cert,
            VerifyCert::CaBundle(PathBuf::from("/etc/ssl/hmc-ca.pem"))
        );
        assert!(config.verify_cert_enabled());
    }

    #[test]
    fn test_password_is_redacted() {
        let config = Config::from_yaml(MINIMAL).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("mypassword"));
        assert_eq!(config.hmc_password.expose(), "mypassword");
    }

    #[test]
    fn test_all_logs() {
        let yaml = format!(
            "{MINIMAL}forwardings:\n  - {{name: a, dest: stdout, logs: [audit]}}\n  - {{name: b, dest: stderr, logs: [audit]}}\n"
        );
        let config = Config::from_yaml(&yaml).unwrap();
        assert_eq!(config.all_logs(), vec![LogType::Audit]);
    }
}
