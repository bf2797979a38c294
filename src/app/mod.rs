pub mod config;
pub mod logging_system;
pub mod shutdown;

pub use config::{Args, Config, ConfigError, ForwardingConfig};
pub use logging_system::{LoggingError, SelfLogSettings, setup_self_logging};

use crate::catalog::MessageCatalog;
use crate::collector::{HmcConfig, HmcSource, LogSource};
use crate::destination::ConsoleStream;
use crate::domain::{ForwarderError, LogType};
use crate::formatter::DEFAULT_TIME_FORMAT;
use crate::forwarding::Forwarding;
use crate::pipeline::{Dispatcher, DispatcherConfig, RunSummary};
use clap::Parser;
use std::process::ExitCode;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const COMMAND_NAME: &str = "hmc_log_forwarder";

pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// A configured forwarder, ready to run against an HMC.
pub struct App {
    config: Config,
}

impl App {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn load_catalog(&self) -> Result<MessageCatalog, ForwarderError> {
        let catalog = match &self.config.log_message_file {
            Some(path) => {
                debug!("Loading HMC log messages from {}", path.display());
                MessageCatalog::from_file(path)?
            }
            None => MessageCatalog::builtin()?,
        };
        debug!(
            "Loaded {} HMC log messages for HMC version {}",
            catalog.len(),
            catalog.hmc_version()
        );
        Ok(catalog)
    }

    pub fn build_forwardings(&self) -> Result<Vec<Forwarding>, ForwarderError> {
        self.config
            .forwardings
            .iter()
            .map(|forwarding| {
                info!(
                    "Forwarding: '{}'; Logs: {}; Destination: {}; Format: {}",
                    forwarding.name,
                    join_logs(&forwarding.logs),
                    forwarding.describe_dest(),
                    forwarding.format
                );
                Forwarding::from_config(forwarding, &self.config)
            })
            .collect()
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            start: self.config.since,
            future: self.config.future,
            ..Default::default()
        }
    }

    pub fn hmc_config(&self) -> HmcConfig {
        let mut hmc = HmcConfig::new(
            &self.config.hmc_host,
            &self.config.hmc_user,
            self.config.hmc_password.expose(),
        );
        hmc.port = self.config.hmc_port;
        hmc.verify_cert = self.config.hmc_verify_cert.clone();
        hmc.poll_interval = Duration::from_secs(self.config.live_poll_interval);
        hmc
    }

    /// Run against the HMC named in the config.
    pub async fn run(&self, token: CancellationToken) -> Result<RunSummary, ForwarderError> {
        self.log_start();
        let catalog = self.load_catalog()?;
        let forwardings = self.build_forwardings()?;

        let mut source = HmcSource::new(self.hmc_config())?;
        source.connect().await?;

        let result = self.run_with_source(catalog, forwardings, &mut source, token).await;

        info!("Logging off from HMC");
        if let Err(e) = source.close().await {
            warn!("Logging off from HMC failed: {}", e);
        }
        result
    }

    /// Run the dispatcher over any log source.
    pub async fn run_with_source<S>(
        &self,
        catalog: MessageCatalog,
        forwardings: Vec<Forwarding>,
        source: &mut S,
        token: CancellationToken,
    ) -> Result<RunSummary, ForwarderError>
    where
        S: LogSource + ?Sized,
    {
        let mut dispatcher = Dispatcher::new(catalog, forwardings, self.dispatcher_config());
        info!(
            "Collecting these logs altogether: {}",
            join_logs(&dispatcher.log_types())
        );
        dispatcher.run(source, token).await
    }

    fn log_start(&self) {
        info!("{} starting", COMMAND_NAME);
        info!("{} version: {}", COMMAND_NAME, get_version());
        info!(
            "HMC: {}, Userid: {}, Label: {}",
            self.config.hmc_host,
            self.config.hmc_user,
            self.config.label()
        );
        info!("Since: {}, Future: {}", self.config.since, self.config.future);
    }
}

fn join_logs(logs: &[LogType]) -> String {
    logs.iter()
        .map(LogType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

fn self_log_settings(config: Option<&Config>, debug: bool) -> SelfLogSettings {
    match config {
        Some(config) => SelfLogSettings {
            dest: config.selflog_dest,
            format: config.selflog_format.clone(),
            time_format: config.selflog_time_format.clone(),
            debug,
        },
        None => SelfLogSettings {
            dest: ConsoleStream::Stdout,
            format: config::DEFAULT_SELFLOG_FORMAT.to_string(),
            time_format: DEFAULT_TIME_FORMAT.to_string(),
            debug,
        },
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Entry point of the `hmc-log-forwarder` binary.
pub async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version end up here too, with exit code 0.
            let _ = e.print();
            return exit_code(e.exit_code());
        }
    };

    if let Some(topic) = args.help_topic() {
        println!("{}", topic.text());
        return ExitCode::SUCCESS;
    }

    let config_file = match args.require_config_file() {
        Ok(path) => path.clone(),
        Err(e) => {
            let _ = e.print();
            return exit_code(e.exit_code());
        }
    };

    let loaded = Config::load(&config_file);
    if let Err(e) = setup_self_logging(&self_log_settings(loaded.as_ref().ok(), args.debug)) {
        eprintln!("{}: {}", COMMAND_NAME, e);
        return ExitCode::FAILURE;
    }
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let token = CancellationToken::new();
    let signals = shutdown::spawn_signal_handler(token.clone());

    let result = App::new(config).run(token.clone()).await;
    token.cancel();
    let _ = signals.await;

    match result {
        Ok(summary) => {
            debug!(
                "Dispatched {} log entries ({} deliveries, {} dropped, {} unclassified)",
                summary.dispatched, summary.deliveries, summary.dropped, summary.unclassified
            );
            info!("{} stopped", COMMAND_NAME);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            info!("{} stopped", COMMAND_NAME);
            ExitCode::FAILURE
        }
    }
}
