//! Formatter
//!
//! Renders a classified [`LogEntry`] into the payload a destination writes:
//! a single template-expanded line or a CADF JSON event. All validation
//! happens when the formatter is built, so `render` cannot fail.

pub mod cadf;
pub mod line;
pub mod time;

pub use line::{DEFAULT_LINE_FORMAT, LineField, LineFormat, LineValues};
pub use time::TimeFormat;

use crate::catalog::{Classification, Outcome};
use crate::domain::LogEntry;
use crate::parser::TemplateError;
use bytes::Bytes;
use chrono::{DateTime, FixedOffset};
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S.%f%z";

/// Width of the rule printed around console output.
pub const RULE_WIDTH: usize = 120;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormatError {
    #[error("line format references unknown field '{0}'")]
    UnknownField(String),
    #[error("invalid line format: {0}")]
    InvalidLineFormat(#[source] TemplateError),
    #[error("invalid time format '{0}'")]
    InvalidTimeFormat(String),
}

/// Values shared by every record a forwarder renders.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatContext {
    pub label: String,
    pub check_data: Value,
}

impl FormatContext {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            check_data: default_check_data(),
        }
    }

    pub fn with_check_data(mut self, check_data: Value) -> Self {
        self.check_data = check_data;
        self
    }
}

pub fn default_check_data() -> Value {
    json!({ "functional_users": [], "imgmt_subnet": null })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFormat {
    Line(LineFormat),
    Cadf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Entry,
    Banner,
}

/// A rendered record, ready for a destination.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedRecord {
    kind: RecordKind,
    payload: Bytes,
    timestamp: Option<DateTime<FixedOffset>>,
    outcome: Outcome,
}

impl RenderedRecord {
    pub fn entry(text: String, timestamp: DateTime<FixedOffset>, outcome: Outcome) -> Self {
        Self {
            kind: RecordKind::Entry,
            payload: Bytes::from(text),
            timestamp: Some(timestamp),
            outcome,
        }
    }

    pub fn banner(text: String) -> Self {
        Self {
            kind: RecordKind::Banner,
            payload: Bytes::from(text),
            timestamp: None,
            outcome: Outcome::Unknown,
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn as_str(&self) -> &str {
        // Payloads are always built from a String.
        std::str::from_utf8(&self.payload).unwrap_or_default()
    }

    pub fn timestamp(&self) -> Option<&DateTime<FixedOffset>> {
        self.timestamp.as_ref()
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }
}

#[derive(Debug, Clone)]
pub struct Formatter {
    output: OutputFormat,
    time_format: TimeFormat,
    context: Arc<FormatContext>,
    label_width: usize,
}

impl Formatter {
    pub fn new(output: OutputFormat, time_format: TimeFormat, context: FormatContext) -> Self {
        let label_width = context
            .label
            .chars()
            .count()
            .max(LineField::Label.title().len());
        Self {
            output,
            time_format,
            context: Arc::new(context),
            label_width,
        }
    }

    pub fn line(
        line_format: &str,
        time_format: &str,
        context: FormatContext,
    ) -> Result<Self, FormatError> {
        Ok(Self::new(
            OutputFormat::Line(LineFormat::compile(line_format)?),
            TimeFormat::parse(time_format)?,
            context,
        ))
    }

    pub fn cadf(time_format: &str, context: FormatContext) -> Result<Self, FormatError> {
        Ok(Self::new(
            OutputFormat::Cadf,
            TimeFormat::parse(time_format)?,
            context,
        ))
    }

    pub fn output(&self) -> &OutputFormat {
        &self.output
    }

    pub fn context(&self) -> &FormatContext {
        &self.context
    }

    pub fn render(&self, entry: &LogEntry, classification: &Classification<'_>) -> RenderedRecord {
        let text = match &self.output {
            OutputFormat::Line(format) => format.render(&self.line_values(entry)),
            OutputFormat::Cadf => cadf::build_event(entry, classification, &self.context).to_string(),
        };
        RenderedRecord::entry(text, entry.timestamp, classification.outcome())
    }

    /// Column header for line output; CADF output has none.
    pub fn header(&self) -> Option<RenderedRecord> {
        match &self.output {
            OutputFormat::Line(format) => Some(RenderedRecord::banner(
                format.render(&LineValues::titles(self.label_width)),
            )),
            OutputFormat::Cadf => None,
        }
    }

    pub fn rule() -> RenderedRecord {
        RenderedRecord::banner("-".repeat(RULE_WIDTH))
    }

    pub fn line_values(&self, entry: &LogEntry) -> LineValues {
        let msg_vars: Vec<Value> = entry
            .data_items
            .iter()
            .map(|item| json!([item.value, item.kind]))
            .collect();
        let detail_msgs: Vec<&str> = entry.details.iter().map(|d| d.message.as_str()).collect();
        let detail_msgs_vars: Vec<Vec<Value>> = entry
            .details
            .iter()
            .map(|detail| {
                detail
                    .data_items
                    .iter()
                    .map(|item| json!([item.value, item.kind]))
                    .collect()
            })
            .collect();

        LineValues {
            time: self.time_format.render(&entry.timestamp),
            label: format!("{:<width$}", self.context.label, width = self.label_width),
            log: entry.log_type.to_string(),
            name: entry.name.clone(),
            id: entry.message_number.clone(),
            user: entry.user.clone().unwrap_or_default(),
            msg: entry.message.clone(),
            msg_vars: Value::from(msg_vars).to_string(),
            detail_msgs: json!(detail_msgs).to_string(),
            detail_msgs_vars: json!(detail_msgs_vars).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::MessageCatalog;
    use crate::domain::{DataItem, DataItemKind, DetailMessage, LogType};

    fn entry() -> LogEntry {
        LogEntry::new(
            LogType::Security,
            1,
            DateTime::parse_from_rfc3339("2019-08-09T12:46:38.550+02:00").unwrap(),
            "1279",
            "User alice has logged on",
        )
        .with_name("Logon")
        .with_user("alice")
        .with_data_items(vec![DataItem {
            number: 0,
            value: "alice".into(),
            kind: DataItemKind::String,
        }])
    }

    #[test]
    fn test_render_line_record() {
        let catalog = MessageCatalog::builtin().unwrap();
        let formatter =
            Formatter::line("{log} {id} {user} {msg}", DEFAULT_TIME_FORMAT, FormatContext::new("hmc1"))
                .unwrap();
        let entry = entry();
        let record = formatter.render(&entry, &catalog.classify(&entry));

        assert_eq!(record.kind(), RecordKind::Entry);
        assert_eq!(record.as_str(), "security 1279 alice User alice has logged on");
        assert_eq!(record.outcome(), Outcome::Success);
        assert_eq!(record.timestamp(), Some(&entry.timestamp));
    }

    #[test]
    fn test_render_is_idempotent() {
        let catalog = MessageCatalog::builtin().unwrap();
        let entry = entry();
        let classification = catalog.classify(&entry);
        for formatter in [
            Formatter::line(DEFAULT_LINE_FORMAT, DEFAULT_TIME_FORMAT, FormatContext::new("a")).unwrap(),
            Formatter::cadf("iso8601", FormatContext::new("a")).unwrap(),
        ] {
            assert_eq!(
                formatter.render(&entry, &classification),
                formatter.render(&entry, &classification)
            );
        }
    }

    #[test]
    fn test_label_padded_to_title_width() {
        let formatter = Formatter::line("[{label}]", "iso8601", FormatContext::new("ab")).unwrap();
        assert_eq!(formatter.line_values(&entry()).label, "ab   ");
        assert_eq!(formatter.header().unwrap().as_str(), "[Label]");
    }

    #[test]
    fn test_variable_fields_render_as_json() {
        let formatter = Formatter::line("{msg_vars}|{detail_msgs}|{detail_msgs_vars}", "iso8601", FormatContext::new(""))
            .unwrap();
        let entry = entry().with_details(vec![DetailMessage {
            message: "detail".into(),
            data_items: vec![DataItem {
                number: 0,
                value: "3".into(),
                kind: DataItemKind::Long,
            }],
        }]);
        let values = formatter.line_values(&entry);
        assert_eq!(values.msg_vars, r#"[["alice","string"]]"#);
        assert_eq!(values.detail_msgs, r#"["detail"]"#);
        assert_eq!(values.detail_msgs_vars, r#"[[["3","long"]]]"#);
    }

    #[test]
    fn test_cadf_has_no_header() {
        let formatter = Formatter::cadf("iso8601", FormatContext::new("a")).unwrap();
        assert!(formatter.header().is_none());
        assert_eq!(Formatter::rule().as_str().len(), RULE_WIDTH);
    }

    #[test]
    fn test_invalid_formats_fail_at_construction() {
        assert!(matches!(
            Formatter::line("{nope}", "iso8601", FormatContext::new("a")),
            Err(FormatError::UnknownField(_))
        ));
        assert!(matches!(
            Formatter::cadf("%", FormatContext::new("a")),
            Err(FormatError::InvalidTimeFormat(_))
        ));
    }
}
