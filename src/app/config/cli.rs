use super::help::HelpTopic;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "hmc_log_forwarder",
    author,
    version,
    about = "Forward the audit and security logs of an HMC to console or syslog",
    long_about = None
)]
pub struct Args {
    /// Path name of the config file
    #[arg(short = 'c', long = "config-file", value_name = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Show help for the config file and exit
    #[arg(long)]
    pub help_config_file: bool,

    /// Show help for the HMC log message file and exit
    #[arg(long)]
    pub help_log_message_file: bool,

    /// Show help for the output formats and exit
    #[arg(long)]
    pub help_format: bool,

    /// Show help for the 'line' output format and exit
    #[arg(long)]
    pub help_format_line: bool,

    /// Show help for the 'cadf' output format and exit
    #[arg(long)]
    pub help_format_cadf: bool,

    /// Show help for the time format and exit
    #[arg(long)]
    pub help_time_format: bool,

    /// Debug mode: self-log at debug level
    #[arg(long)]
    pub debug: bool,
}

impl Args {
    pub fn from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(args)
    }

    /// The first informational flag given, if any.
    pub fn help_topic(&self) -> Option<HelpTopic> {
        [
            (self.help_config_file, HelpTopic::ConfigFile),
            (self.help_log_message_file, HelpTopic::LogMessageFile),
            (self.help_format, HelpTopic::Format),
            (self.help_format_line, HelpTopic::FormatLine),
            (self.help_format_cadf, HelpTopic::FormatCadf),
            (self.help_time_format, HelpTopic::TimeFormat),
        ]
        .into_iter()
        .find_map(|(set, topic)| set.then_some(topic))
    }

    /// The config file path; its absence is a usage error.
    pub fn require_config_file(&self) -> Result<&PathBuf, clap::Error> {
        self.config_file.as_ref().ok_or_else(|| {
            Self::command().error(
                ErrorKind::MissingRequiredArgument,
                "the following required arguments were not provided:\n  --config-file <CONFIG_FILE>",
            )
        })
    }
}
