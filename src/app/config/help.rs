//! Texts printed by the `--help-*` flags.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    ConfigFile,
    LogMessageFile,
    Format,
    FormatLine,
    FormatCadf,
    TimeFormat,
}

impl HelpTopic {
    pub fn text(&self) -> &'static str {
        match self {
            HelpTopic::ConfigFile => CONFIG_FILE,
            HelpTopic::LogMessageFile => LOG_MESSAGE_FILE,
            HelpTopic::Format => FORMAT,
            HelpTopic::FormatLine => FORMAT_LINE,
            HelpTopic::FormatCadf => FORMAT_CADF,
            HelpTopic::TimeFormat => TIME_FORMAT,
        }
    }
}

const CONFIG_FILE: &str = r#"---
# Config file for the hmc_log_forwarder command, in YAML format.
#
# This example shows every supported parameter. Edit at least the hmc_*
# parameters and the forwardings.

# IP address or hostname of the HMC.
hmc_host: 10.11.12.13

# Port of the HMC Web Services API (default: 6794).
hmc_port: 6794

# HMC userid and password.
hmc_user: myuser
hmc_password: mypassword

# Verify the HMC certificate: true, false, or the path of a CA certificate
# file (default: true).
hmc_verify_cert: true

# Label for the HMC, used in field 'label' of the log records.
label: myregion-myzone-myhmc

# Point in time since when past log entries are included:
# - 'now': Since now. This may include entries from the recent past.
# - 'all': All past log entries the HMC still has.
# - A date and time string. A UTC offset in the string is honored; without
#   one the local timezone is used.
since: now

# Wait for future log entries.
future: true

# Seconds between two polls of the HMC for future log entries (default: 5).
live_poll_interval: 5

# Destination for self-log messages: 'stdout' or 'stderr'.
selflog_dest: stdout

# Format of self-log messages. Supported fields: %(asctime)s,
# %(levelname)s, %(name)s, %(message)s.
selflog_format: '%(levelname)s: %(message)s'

# Format of the 'asctime' field of self-log messages.
# Invoke with --help-time-format for details.
selflog_time_format: '%Y-%m-%d %H:%M:%S.%f%z'

# Path of the HMC log message file. A relative path is relative to the
# directory of this config file. Omit it to use the built-in messages.
# Invoke with --help-log-message-file for details.
log_message_file: null

# Data for checks, passed through into CADF records.
check_data:
  functional_users: []
  imgmt_subnet: null

# List of log forwardings. A forwarding defines the logs to collect and the
# destination to forward them to.
forwardings:

  -
    # Name of the forwarding (unique within this file).
    name: Example forwarding

    # HMC logs to include: 'security', 'audit'.
    logs: [security, audit]

    # Destination: 'stdout', 'stderr' or 'syslog'.
    dest: stdout

    # Syslog server (for syslog destinations).
    syslog_host: 10.11.12.14
    syslog_port: 514
    syslog_porttype: udp

    # Syslog facility: user, auth, authpriv, security, local0 ... local7.
    syslog_facility: user

    # Output format: 'line' or 'cadf'.
    # Invoke with --help-format for details.
    format: line

    # Format for 'line' output.
    # Invoke with --help-format-line for details.
    line_format: '{time:32} {label} {log:8} {name:12} {id:>4} {user:20} {msg}'

    # Format for the 'time' field.
    # Invoke with --help-time-format for details.
    time_format: '%Y-%m-%d %H:%M:%S.%f%z'
"#;

const LOG_MESSAGE_FILE: &str = r#"
The HMC log message file maps HMC log message numbers to their message text
and to the CADF metadata of the action they describe. It is a YAML file:

    hmc_version: "2.15"
    messages:
      - number: '1281'
        message: "User {0} failed to log on from {1}"
        action: authenticate/logon
        outcome: failure
        target_type: service/security/account/user
        target_class: user
        initiator_address_item: 1

Fields of each message:

* number: The HMC log message number.
* message: The English message, where {0}, {1} ... are the substitution
  variables of the log entry in the order of their index numbers.
* action: The CADF action, e.g. authenticate/logon.
* outcome: success, failure, pending or unknown.
* target_type, target_class: The CADF target of the action.
* initiator_address_item: Optional index of the substitution variable that
  holds the initiator's IP address.

Log entries whose number is not in the file are still forwarded, with the
message text the HMC provided and 'unknown' CADF metadata.
"#;

const FORMAT: &str = r#"
The format of each log record sent to a destination is defined by the 'format'
parameter of its forwarding:

    line  - A single line for each record, using the format defined in the
            'line_format' parameter.
            Invoke with --help-format-line for details.

    cadf  - CADF format, as a JSON string.
            Invoke with --help-format-cadf for details.
"#;

const FORMAT_LINE: &str = r#"
For output format 'line', each log record is a single line whose content is
defined by the 'line_format' parameter of the forwarding.

Fields are referenced by name in braces and may carry a format spec with fill,
alignment, width and precision, e.g. {name:12}, {id:>4}, {msg:.80}.

Supported fields:

* time: The time stamp of the log entry as reported by the HMC, formatted
  using the 'time_format' parameter.
  Invoke with --help-time-format for details.
* label: The 'label' config parameter.
* log: The HMC log of the entry: security, audit.
* name: The name of the log entry, or the empty string.
* id: The message number of the log entry.
* user: The HMC userid associated with the entry, or the empty string.
* msg: The fully formatted log message, in English.
* msg_vars: The substitution variables of the message as a JSON list of
  [value, type] pairs. Types are 'long', 'float' and 'string'.
* detail_msgs: The formatted detail messages, as a JSON list.
* detail_msgs_vars: The substitution variables of each detail message.

Example:

    line_format: '{time:32} {label} {log:8} {name:12} {id:>4} {user:20} {msg}'
"#;

const FORMAT_CADF: &str = r#"
For output format 'cadf', each log record is a JSON string that conforms to
the CADF standard (DMTF DSP0262). Example:

  {
      "typeURI": "http://schemas.dmtf.org/cloud/audit/1.0/event",
      "id": "4c8d4c6e-2f7e-5f0a-9d1a-2b3c4d5e6f70",
      "eventType": "activity",
      "eventTime": "2019-08-09T12:46:38.550000+02:00",
      "action": "authenticate/logon",
      "outcome": "failure",
      "initiator": {
          "typeURI": "data/security/account/user",
          "name": "exampleuser",
          "host": { "address": "192.168.1.1" }
      },
      "target": {
          "typeURI": "service/security/account/user",
          "class": "user"
      },
      "observer": {
          "typeURI": "service/hmc",
          "name": "myregion-myzone-myhmc"
      },
      "attachments": [ ... ]
  }

Messages missing from the log message file get 'unknown' for action, outcome
and target.
"#;

const TIME_FORMAT: &str = r#"
The 'time' field of log records is formatted using the 'time_format' parameter
of the forwarding. It is a strftime format string or one of these keywords:

- iso8601: ISO 8601 with 'T' as delimiter,
  e.g. 2019-08-09T12:46:38.550000+02:00
- iso8601b: ISO 8601 with ' ' as delimiter,
  e.g. 2019-08-09 12:46:38.550000+02:00
- syslog: RFC 3164 time stamp, e.g. Aug  9 12:46:38

The 'asctime' field of self-log messages uses 'selflog_time_format' in the
same way. %f stands for microseconds.

Examples:

    time_format: '%Y-%m-%d %H:%M:%S.%f%z'
    time_format: iso8601
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_file_help_parses() {
        let config = crate::app::Config::from_yaml(HelpTopic::ConfigFile.text()).unwrap();
        assert_eq!(config.forwardings.len(), 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_every_topic_has_text() {
        for topic in [
            HelpTopic::ConfigFile,
            HelpTopic::LogMessageFile,
            HelpTopic::Format,
            HelpTopic::FormatLine,
            HelpTopic::FormatCadf,
            HelpTopic::TimeFormat,
        ] {
            assert!(!topic.text().trim().is_empty());
        }
    }
}
