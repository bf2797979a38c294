use super::FormatError;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset};
use std::fmt::Write;

const ISO8601: &str = "%Y-%m-%dT%H:%M:%S%.6f%:z";
const ISO8601_SPACE: &str = "%Y-%m-%d %H:%M:%S%.6f%:z";
const RFC3164: &str = "%b %e %H:%M:%S";

/// How timestamps are rendered in output records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeFormat {
    /// `2019-08-09T12:46:38.550000+02:00`
    Iso8601,
    /// `2019-08-09 12:46:38.550000+02:00`
    Iso8601Space,
    /// `Aug  9 12:46:38`
    Syslog,
    /// A strftime pattern, already translated to chrono syntax.
    Pattern(String),
}

impl TimeFormat {
    /// Parse a `time_format` setting: a preset keyword or a strftime pattern.
    pub fn parse(setting: &str) -> Result<Self, FormatError> {
        match setting {
            "iso8601" => Ok(TimeFormat::Iso8601),
            "iso8601b" => Ok(TimeFormat::Iso8601Space),
            "syslog" | "rfc3164" => Ok(TimeFormat::Syslog),
            pattern => {
                let translated = translate_strftime(pattern);
                if StrftimeItems::new(&translated).any(|item| matches!(item, Item::Error)) {
                    return Err(FormatError::InvalidTimeFormat(pattern.to_string()));
                }
                Ok(TimeFormat::Pattern(translated))
            }
        }
    }

    fn pattern(&self) -> &str {
        match self {
            TimeFormat::Iso8601 => ISO8601,
            TimeFormat::Iso8601Space => ISO8601_SPACE,
            TimeFormat::Syslog => RFC3164,
            TimeFormat::Pattern(pattern) => pattern,
        }
    }

    pub fn render(&self, time: &DateTime<FixedOffset>) -> String {
        let mut out = String::new();
        if write!(out, "{}", time.format(self.pattern())).is_err() {
            // Patterns are validated on parse; this only catches specifiers
            // chrono accepts but cannot render for a fixed offset.
            out.clear();
            let _ = write!(out, "{}", time.format(ISO8601));
        }
        out
    }
}

/// Translate the strftime dialect used in config files to chrono's.
///
/// The only difference that matters is `%f`: microseconds in the config
/// dialect, nanoseconds in chrono.
pub fn translate_strftime(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len() + 2);
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('f') => out.push_str("%6f"),
            Some(other) => {
                out.push('%');
                out.push(other);
            }
            None => out.push('%'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2019-08-09T12:46:38.550+02:00").unwrap()
    }

    #[test]
    fn test_presets() {
        let time = sample();
        assert_eq!(
            TimeFormat::parse("iso8601").unwrap().render(&time),
            "2019-08-09T12:46:38.550000+02:00"
        );
        assert_eq!(
            TimeFormat::parse("iso8601b").unwrap().render(&time),
            "2019-08-09 12:46:38.550000+02:00"
        );
        assert_eq!(TimeFormat::parse("syslog").unwrap().render(&time), "Aug  9 12:46:38");
    }

    #[test]
    fn test_default_pattern_uses_microseconds() {
        let format = TimeFormat::parse("%Y-%m-%d %H:%M:%S.%f%z").unwrap();
        assert_eq!(format.render(&sample()), "2019-08-09 12:46:38.550000+0200");
    }

    #[test]
    fn test_translate_keeps_escapes() {
        assert_eq!(translate_strftime("%%f %f"), "%%f %6f");
        assert_eq!(translate_strftime("plain"), "plain");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(matches!(
            TimeFormat::parse("%Y-%"),
            Err(FormatError::InvalidTimeFormat(_))
        ));
    }
}
