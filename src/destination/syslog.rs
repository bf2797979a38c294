//! RFC 3164 syslog over UDP or TCP.

use super::{Destination, DestinationError};
use crate::catalog::Outcome;
use crate::formatter::{RecordKind, RenderedRecord};
use crate::reliability::{RetryConfig, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::{debug, warn};

pub const DEFAULT_SYSLOG_PORT: u16 = 514;
pub const SYSLOG_TAG: &str = "hmc_log_forwarder";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facility {
    User,
    #[serde(alias = "security")]
    Auth,
    AuthPriv,
    Local0,
    Local1,
    Local2,
    Local3,
    Local4,
    Local5,
    Local6,
    Local7,
}

impl Facility {
    pub fn code(&self) -> u8 {
        match self {
            Facility::User => 1,
            Facility::Auth => 4,
            Facility::AuthPriv => 10,
            Facility::Local0 => 16,
            Facility::Local1 => 17,
            Facility::Local2 => 18,
            Facility::Local3 => 19,
            Facility::Local4 => 20,
            Facility::Local5 => 21,
            Facility::Local6 => 22,
            Facility::Local7 => 23,
        }
    }
}

impl fmt::Display for Facility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facility::User => "user",
            Facility::Auth => "auth",
            Facility::AuthPriv => "authpriv",
            Facility::Local0 => "local0",
            Facility::Local1 => "local1",
            Facility::Local2 => "local2",
            Facility::Local3 => "local3",
            Facility::Local4 => "local4",
            Facility::Local5 => "local5",
            Facility::Local6 => "local6",
            Facility::Local7 => "local7",
        };
        f.write_str(name)
    }
}

impl FromStr for Facility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let facility = match s {
            "user" => Facility::User,
            "auth" | "security" => Facility::Auth,
            "authpriv" => Facility::AuthPriv,
            "local0" => Facility::Local0,
            "local1" => Facility::Local1,
            "local2" => Facility::Local2,
            "local3" => Facility::Local3,
            "local4" => Facility::Local4,
            "local5" => Facility::Local5,
            "local6" => Facility::Local6,
            "local7" => Facility::Local7,
            other => return Err(format!("unknown syslog facility '{other}'")),
        };
        Ok(facility)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning = 4,
    Info = 6,
}

impl From<Outcome> for Severity {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Failure => Severity::Warning,
            _ => Severity::Info,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Udp,
    Tcp,
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Udp => f.write_str("udp"),
            Transport::Tcp => f.write_str("tcp"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyslogConfig {
    pub host: String,
    pub port: u16,
    pub transport: Transport,
    pub facility: Facility,
    pub retry: RetryConfig,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Host name written into the message header.
    pub hostname: String,
}

impl SyslogConfig {
    pub fn new(host: impl Into<String>, port: u16, transport: Transport, facility: Facility) -> Self {
        Self {
            host: host.into(),
            port,
            transport,
            facility,
            retry: RetryConfig::default(),
            connect_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(10),
            hostname: local_hostname(),
        }
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// `<PRI>TIMESTAMP HOSTNAME TAG: MSG`
pub fn format_message(
    facility: Facility,
    severity: Severity,
    timestamp: &DateTime<FixedOffset>,
    hostname: &str,
    message: &str,
) -> String {
    let priority = u16::from(facility.code()) * 8 + severity as u16;
    format!(
        "<{priority}>{} {hostname} {SYSLOG_TAG}: {message}",
        timestamp.format("%b %e %H:%M:%S")
    )
}

enum Connection {
    Udp(UdpSocket),
    Tcp(TcpStream),
}

pub struct SyslogDestination {
    config: SyslogConfig,
    policy: RetryPolicy,
    connection: Option<Connection>,
}

impl SyslogDestination {
    pub fn new(config: SyslogConfig) -> Result<Self, DestinationError> {
        if config.host.trim().is_empty() {
            return Err(DestinationError::InvalidConfiguration(
                "syslog host must not be empty".to_string(),
            ));
        }
        let policy = RetryPolicy::new(config.retry.clone())
            .map_err(|e| DestinationError::InvalidConfiguration(e.to_string()))?;
        Ok(Self {
            config,
            policy,
            connection: None,
        })
    }

    pub fn config(&self) -> &SyslogConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    fn transport_error(&self, source: std::io::Error) -> DestinationError {
        DestinationError::Transport {
            dest: self.describe(),
            source,
        }
    }

    async fn resolve(&self) -> Result<SocketAddr, DestinationError> {
        let mut addrs = tokio::net::lookup_host((self.config.host.as_str(), self.config.port))
            .await
            .map_err(|e| self.transport_error(e))?;
        addrs.next().ok_or_else(|| {
            self.transport_error(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no address found for {}", self.config.host),
            ))
        })
    }

    async fn connect(&self) -> Result<Connection, DestinationError> {
        let addr = self.resolve().await?;
        let connecting = open_connection(self.config.transport, addr);

        match timeout(self.config.connect_timeout, connecting).await {
            Ok(Ok(connection)) => {
                debug!(dest = %self.describe(), %addr, "Connected to syslog server");
                Ok(connection)
            }
            Ok(Err(e)) => Err(self.transport_error(e)),
            Err(_) => Err(DestinationError::Timeout {
                dest: self.describe(),
                operation: "connect",
            }),
        }
    }

    async fn send(&mut self, message: &[u8]) -> Result<(), DestinationError> {
        if self.connection.is_none() {
            self.connection = Some(self.connect().await?);
        }
        let dest = self.describe();
        let write_timeout = self.config.write_timeout;
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };

        let sending = send_on(connection, message);

        match timeout(write_timeout, sending).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(DestinationError::Transport { dest, source }),
            Err(_) => Err(DestinationError::Timeout {
                dest,
                operation: "write",
            }),
        }
    }
}

async fn open_connection(transport: Transport, addr: SocketAddr) -> std::io::Result<Connection> {
    match transport {
        Transport::Udp => {
            let local: SocketAddr = if addr.is_ipv6() {
                (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
            } else {
                (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
            };
            let socket = UdpSocket::bind(local).await?;
            socket.connect(addr).await?;
            Ok(Connection::Udp(socket))
        }
        Transport::Tcp => Ok(Connection::Tcp(TcpStream::connect(addr).await?)),
    }
}

async fn send_on(connection: &mut Connection, message: &[u8]) -> std::io::Result<()> {
    match connection {
        Connection::Udp(socket) => {
            socket.send(message).await?;
        }
        Connection::Tcp(stream) => {
            stream.write_all(message).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await?;
        }
    }
    Ok(())
}

impl fmt::Debug for SyslogDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyslogDestination")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[async_trait]
impl Destination for SyslogDestination {
    fn describe(&self) -> String {
        format!(
            "syslog {}:{}/{}",
            self.config.host, self.config.port, self.config.transport
        )
    }

    async fn open(&mut self) -> Result<(), DestinationError> {
        // Connected lazily on first write.
        Ok(())
    }

    async fn write(&mut self, record: &RenderedRecord) -> Result<(), DestinationError> {
        if record.kind() == RecordKind::Banner {
            return Ok(());
        }
        let timestamp = record
            .timestamp()
            .copied()
            .unwrap_or_else(|| Local::now().fixed_offset());
        let message = format_message(
            self.config.facility,
            Severity::from(record.outcome()),
            &timestamp,
            &self.config.hostname,
            record.as_str(),
        );

        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.send(message.as_bytes()).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            self.connection = None;
            if self.policy.should_give_up(attempt) {
                return Err(DestinationError::Exhausted {
                    dest: self.describe(),
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }
            let delay = self.policy.calculate_delay(attempt);
            warn!(
                "Syslog write failed ({}), retrying in {:?} (attempt {} of {})",
                error,
                delay,
                attempt + 1,
                self.policy.max_attempts()
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        if let Some(Connection::Tcp(mut stream)) = self.connection.take() {
            // Best effort, the peer may already be gone.
            let _ = stream.shutdown().await;
        }
        Ok(())
    }
}
