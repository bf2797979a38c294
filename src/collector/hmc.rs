//! HMC Web Services API client.
//!
//! Logs on with userid and password, queries the console audit and security
//! logs, and emulates a live subscription by polling the same queries from a
//! moving cursor.

use super::{LiveStream, LogSource, SourceError};
use crate::domain::{DataItem, DataItemKind, DetailMessage, EntryFingerprint, LogEntry, LogType};
use crate::reliability::{RetryConfig, RetryPolicy};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Local, TimeZone};
use parking_lot::RwLock;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_HMC_PORT: u16 = 6794;

const SESSION_HEADER: &str = "X-API-Session";

/// `hmc_verify_cert`: verify against the system roots, skip verification,
/// or verify against a CA bundle file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VerifyCert {
    Enabled(bool),
    CaBundle(PathBuf),
}

impl Default for VerifyCert {
    fn default() -> Self {
        VerifyCert::Enabled(true)
    }
}

#[derive(Clone)]
pub struct HmcConfig {
    pub host: String,
    pub port: u16,
    pub userid: String,
    pub password: String,
    pub verify_cert: VerifyCert,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
    /// Overrides the `https://host:port/` base URL.
    pub base_url: Option<Url>,
}

impl HmcConfig {
    pub fn new(
        host: impl Into<String>,
        userid: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_HMC_PORT,
            userid: userid.into(),
            password: password.into(),
            verify_cert: VerifyCert::default(),
            poll_interval: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            retry: RetryConfig::default(),
            base_url: None,
        }
    }

    fn url(&self) -> Result<Url, SourceError> {
        if let Some(url) = &self.base_url {
            return Ok(url.clone());
        }
        let raw = if self.host.contains(':') {
            format!("https://[{}]:{}/", self.host, self.port)
        } else {
            format!("https://{}:{}/", self.host, self.port)
        };
        Url::parse(&raw).map_err(|e| {
            SourceError::InvalidConfiguration(format!("Invalid HMC address '{}': {}", self.host, e))
        })
    }
}

impl fmt::Debug for HmcConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmcConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("userid", &self.userid)
            .field("password", &"********")
            .field("verify_cert", &self.verify_cert)
            .field("poll_interval", &self.poll_interval)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct LogonResponse {
    api_session: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct VersionResponse {
    #[serde(default)]
    hmc_version: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LogResponse {
    Wrapped {
        #[serde(rename = "log-entries")]
        log_entries: Vec<RawLogEntry>,
    },
    Plain(Vec<RawLogEntry>),
}

impl LogResponse {
    fn into_entries(self) -> Vec<RawLogEntry> {
        match self {
            LogResponse::Wrapped { log_entries } => log_entries,
            LogResponse::Plain(entries) => entries,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawLogEntry {
    event_time: i64,
    event_id: Value,
    #[serde(default)]
    event_name: Option<String>,
    #[serde(default)]
    event_message: String,
    #[serde(default)]
    userid: Option<String>,
    #[serde(default)]
    event_data_items: Vec<RawDataItem>,
    #[serde(default)]
    event_details: Vec<RawDetail>,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawDataItem {
    data_item_number: u32,
    data_item_value: Value,
    data_item_type: DataItemKind,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct RawDetail {
    #[serde(default)]
    event_detail_message: String,
    #[serde(default)]
    event_detail_data_items: Vec<RawDataItem>,
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

impl From<RawDataItem> for DataItem {
    fn from(raw: RawDataItem) -> Self {
        DataItem {
            number: raw.data_item_number,
            value: scalar_text(&raw.data_item_value),
            kind: raw.data_item_type,
        }
    }
}

fn millis_to_local(millis: i64) -> Result<DateTime<FixedOffset>, SourceError> {
    Local
        .timestamp_millis_opt(millis)
        .single()
        .map(|t| t.fixed_offset())
        .ok_or_else(|| SourceError::InvalidResponse(format!("event-time {millis} out of range")))
}

/// Connection state shared between the source and its live streams.
struct HmcClient {
    config: HmcConfig,
    client: Client,
    base_url: Url,
    session: RwLock<Option<String>>,
    sequence: AtomicU64,
}

impl HmcClient {
    fn new(config: HmcConfig) -> Result<Self, SourceError> {
        let base_url = config.url()?;

        let mut builder = ClientBuilder::new()
            .timeout(config.request_timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("hmc-log-forwarder/", env!("CARGO_PKG_VERSION")));

        match &config.verify_cert {
            VerifyCert::Enabled(true) => {}
            VerifyCert::Enabled(false) => {
                warn!("HMC certificate verification is disabled");
                builder = builder.danger_accept_invalid_certs(true);
            }
            VerifyCert::CaBundle(path) => {
                let pem = std::fs::read(path).map_err(|e| {
                    SourceError::InvalidConfiguration(format!(
                        "Cannot read CA bundle {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    SourceError::InvalidConfiguration(format!(
                        "Invalid CA bundle {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
        }

        let client = builder.build().map_err(|e| {
            SourceError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
        })?;

        Ok(Self {
            config,
            client,
            base_url,
            session: RwLock::new(None),
            sequence: AtomicU64::new(0),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, SourceError> {
        self.base_url
            .join(path)
            .map_err(|e| SourceError::InvalidConfiguration(format!("Invalid API path {path}: {e}")))
    }

    fn connection_error(&self, error: reqwest::Error) -> SourceError {
        if error.is_connect() || error.is_timeout() {
            SourceError::ConnectionFailed {
                host: self.config.host.clone(),
                message: error.to_string(),
            }
        } else {
            SourceError::NetworkError(error)
        }
    }

    async fn logon(&self) -> Result<String, SourceError> {
        let response = self
            .client
            .post(self.endpoint("api/sessions")?)
            .json(&serde_json::json!({
                "userid": self.config.userid,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceError::Authentication {
                host: self.config.host.clone(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        if !status.is_success() {
            return Err(SourceError::HttpError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let logon: LogonResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("logon response: {e}")))?;
        *self.session.write() = Some(logon.api_session.clone());
        info!(host = %self.config.host, user = %self.config.userid, "Logged on to HMC");
        Ok(logon.api_session)
    }

    async fn session_token(&self) -> Result<String, SourceError> {
        let existing = self.session.read().clone();
        match existing {
            Some(token) => Ok(token),
            None => self.logon().await,
        }
    }

    /// Authenticated GET. An expired session is renewed once.
    async fn get_json<T>(&self, path: &str, query: &[(&str, String)]) -> Result<T, SourceError>
    where
        T: serde::de::DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        let mut renewed = false;
        loop {
            let token = self.session_token().await?;
            let response = self
                .client
                .request(Method::GET, url.clone())
                .header(SESSION_HEADER, token)
                .query(query)
                .send()
                .await
                .map_err(|e| self.connection_error(e))?;

            let status = response.status();
            if (status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN) && !renewed {
                debug!(path, "HMC session rejected, logging on again");
                *self.session.write() = None;
                renewed = true;
                continue;
            }
            if !status.is_success() {
                return Err(SourceError::HttpError {
                    status: status.as_u16(),
                    message: response.text().await.unwrap_or_default(),
                });
            }
            return response
                .json()
                .await
                .map_err(|e| SourceError::InvalidResponse(format!("{path}: {e}")));
        }
    }

    async fn version(&self) -> Result<Option<String>, SourceError> {
        let response = self
            .client
            .get(self.endpoint("api/version")?)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;
        if !response.status().is_success() {
            return Err(SourceError::HttpError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        let version: VersionResponse = response
            .json()
            .await
            .map_err(|e| SourceError::InvalidResponse(format!("version response: {e}")))?;
        Ok(version.hmc_version)
    }

    async fn log_entries(
        &self,
        log_type: LogType,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<LogEntry>, SourceError> {
        let path = match log_type {
            LogType::Audit => "api/console/operations/get-audit-log",
            LogType::Security => "api/console/operations/get-security-log",
        };
        let query: Vec<(&str, String)> = since
            .map(|t| vec![("begin-time", t.timestamp_millis().to_string())])
            .unwrap_or_default();

        let response: Option<LogResponse> = self.get_json(path, &query).await?;
        let mut raw = response.map(LogResponse::into_entries).unwrap_or_default();
        raw.sort_by_key(|entry| entry.event_time);

        let entries = raw
            .into_iter()
            .map(|raw| self.convert(log_type, raw))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(log = %log_type, count = entries.len(), "Fetched HMC log entries");
        Ok(entries)
    }

    fn convert(&self, log_type: LogType, raw: RawLogEntry) -> Result<LogEntry, SourceError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed);
        let timestamp = millis_to_local(raw.event_time)?;
        let details = raw
            .event_details
            .into_iter()
            .map(|detail| {
                let mut data_items: Vec<DataItem> =
                    detail.event_detail_data_items.into_iter().map(DataItem::from).collect();
                data_items.sort_by_key(|item| item.number);
                DetailMessage {
                    message: detail.event_detail_message,
                    data_items,
                }
            })
            .collect();

        let mut entry = LogEntry::new(
            log_type,
            sequence,
            timestamp,
            scalar_text(&raw.event_id),
            raw.event_message,
        )
        .with_name(raw.event_name.unwrap_or_default())
        .with_data_items(raw.event_data_items.into_iter().map(DataItem::from).collect())
        .with_details(details);
        entry.user = raw.userid.filter(|user| !user.is_empty());
        Ok(entry)
    }

    async fn logoff(&self) -> Result<(), SourceError> {
        let token = self.session.write().take();
        let Some(token) = token else {
            return Ok(());
        };
        let response = self
            .client
            .delete(self.endpoint("api/sessions/this-session")?)
            .header(SESSION_HEADER, token)
            .send()
            .await
            .map_err(|e| self.connection_error(e))?;
        if !response.status().is_success() {
            return Err(SourceError::HttpError {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        info!(host = %self.config.host, "Logged off from HMC");
        Ok(())
    }
}

/// [`LogSource`] over the HMC Web Services API.
pub struct HmcSource {
    client: Arc<HmcClient>,
}

impl HmcSource {
    pub fn new(config: HmcConfig) -> Result<Self, SourceError> {
        Ok(Self {
            client: Arc::new(HmcClient::new(config)?),
        })
    }

    /// Log on eagerly so bad credentials surface before any output is made.
    pub async fn connect(&self) -> Result<(), SourceError> {
        self.client.logon().await.map(|_| ())
    }
}

impl fmt::Debug for HmcSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmcSource")
            .field("config", &self.client.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl LogSource for HmcSource {
    async fn current_time(&mut self) -> Result<DateTime<FixedOffset>, SourceError> {
        Ok(Local::now().fixed_offset())
    }

    async fn appliance_version(&mut self) -> Result<Option<String>, SourceError> {
        self.client.version().await
    }

    async fn fetch_historical(
        &mut self,
        log_type: LogType,
        since: Option<DateTime<FixedOffset>>,
    ) -> Result<Vec<LogEntry>, SourceError> {
        self.client.log_entries(log_type, since).await
    }

    async fn subscribe_live(
        &mut self,
        log_types: &[LogType],
    ) -> Result<Box<dyn LiveStream>, SourceError> {
        let policy = RetryPolicy::new(self.client.config.retry.clone())
            .map_err(|e| SourceError::InvalidConfiguration(e.to_string()))?;
        // Fail early when the session cannot be established.
        self.client.session_token().await?;
        info!(
            interval = ?self.client.config.poll_interval,
            "Polling HMC for new log entries"
        );
        Ok(Box::new(PollingLiveStream::new(
            Arc::clone(&self.client),
            log_types,
            Local::now().fixed_offset(),
            policy,
        )))
    }

    async fn close(&mut self) -> Result<(), SourceError> {
        self.client.logoff().await
    }
}

/// Live entries obtained by re-querying the logs, each from its own
/// moving cursor.
struct PollingLiveStream {
    client: Arc<HmcClient>,
    cursors: Vec<(LogType, PollCursor)>,
    pending: VecDeque<LogEntry>,
    policy: RetryPolicy,
    first_poll: bool,
}

/// Newest timestamp returned for one log, with the entries seen at it.
#[derive(Debug)]
struct PollCursor {
    time: DateTime<FixedOffset>,
    seen: HashSet<EntryFingerprint>,
}

impl PollCursor {
    fn starting_at(time: DateTime<FixedOffset>) -> Self {
        Self {
            time,
            seen: HashSet::new(),
        }
    }

    fn is_new(&self, entry: &LogEntry) -> bool {
        entry.timestamp > self.time
            || (entry.timestamp == self.time && !self.seen.contains(&entry.fingerprint()))
    }

    /// `fresh` is sorted by time.
    fn advance(&mut self, fresh: &[LogEntry]) {
        let Some(newest) = fresh.last().map(|e| e.timestamp) else {
            return;
        };
        if newest > self.time {
            self.time = newest;
            self.seen.clear();
        }
        self.seen.extend(
            fresh
                .iter()
                .filter(|e| e.timestamp == newest)
                .map(LogEntry::fingerprint),
        );
    }
}

impl PollingLiveStream {
    fn new(
        client: Arc<HmcClient>,
        log_types: &[LogType],
        start: DateTime<FixedOffset>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            cursors: log_types
                .iter()
                .map(|log_type| (*log_type, PollCursor::starting_at(start)))
                .collect(),
            pending: VecDeque::new(),
            policy,
            first_poll: true,
        }
    }

    async fn poll(&mut self) -> Result<(), SourceError> {
        let mut merged = Vec::new();
        for (log_type, cursor) in &mut self.cursors {
            let mut fresh: Vec<LogEntry> = self
                .client
                .log_entries(*log_type, Some(cursor.time))
                .await?
                .into_iter()
                .filter(|e| cursor.is_new(e))
                .collect();
            fresh.sort_by_key(LogEntry::order_key);
            cursor.advance(&fresh);
            merged.append(&mut fresh);
        }
        merged.sort_by_key(LogEntry::order_key);
        self.pending.extend(merged);
        Ok(())
    }

    async fn poll_with_retry(&mut self) -> Result<(), SourceError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let error = match self.poll().await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };
            if self.policy.should_give_up(attempt) {
                return Err(error);
            }
            warn!(
                "Polling HMC failed ({}), logging on again (attempt {} of {})",
                error,
                attempt + 1,
                self.policy.max_attempts()
            );
            *self.client.session.write() = None;
            self.policy.backoff(attempt).await;
        }
    }
}

#[async_trait]
impl LiveStream for PollingLiveStream {
    async fn next(&mut self) -> Result<Option<LogEntry>, SourceError> {
        loop {
            if let Some(entry) = self.pending.pop_front() {
                return Ok(Some(entry));
            }
            if self.first_poll {
                self.first_poll = false;
            } else {
                tokio::time::sleep(self.client.config.poll_interval).await;
            }
            self.poll_with_retry().await?;
        }
    }
}
