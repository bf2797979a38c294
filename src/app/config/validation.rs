use super::{Config, ConfigError, DestKind, FormatKind, ForwardingConfig};
use crate::app::logging_system::SelfLogFormat;
use crate::formatter::{LineFormat, TimeFormat};
use std::collections::HashSet;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [("hmc_host", &self.hmc_host), ("hmc_user", &self.hmc_user)] {
            if value.trim().is_empty() {
                return Err(ConfigError::InvalidConfig(format!("{key} must not be empty")));
            }
        }

        if self.live_poll_interval == 0 {
            return Err(ConfigError::InvalidConfig(
                "live_poll_interval must be greater than 0".to_string(),
            ));
        }

        let selflog_time_format = TimeFormat::parse(&self.selflog_time_format).map_err(|e| {
            ConfigError::InvalidConfig(format!("selflog_time_format: {e}"))
        })?;
        SelfLogFormat::parse(&self.selflog_format, selflog_time_format)
            .map_err(|e| ConfigError::InvalidConfig(format!("selflog_format: {e}")))?;

        let mut names = HashSet::new();
        for forwarding in &self.forwardings {
            if !names.insert(forwarding.name.as_str()) {
                return Err(ConfigError::InvalidConfig(format!(
                    "duplicate forwarding name '{}'",
                    forwarding.name
                )));
            }
            forwarding.validate()?;
        }

        Ok(())
    }
}

impl ForwardingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidForwarding {
            name: self.name.clone(),
            reason,
        };

        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "forwarding name must not be empty".to_string(),
            ));
        }

        if self.logs.is_empty() {
            return Err(invalid("logs must name at least one log".to_string()));
        }

        if self.dest == DestKind::Syslog
            && self.syslog_host.as_deref().is_none_or(|host| host.trim().is_empty())
        {
            return Err(invalid("syslog_host is required for dest syslog".to_string()));
        }

        if self.format == FormatKind::Line {
            LineFormat::compile(&self.line_format)
                .map_err(|e| invalid(format!("line_format: {e}")))?;
        }
        TimeFormat::parse(&self.time_format).map_err(|e| invalid(format!("time_format: {e}")))?;

        Ok(())
    }
}
