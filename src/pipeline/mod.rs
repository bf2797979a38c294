//! Pipeline
//!
//! The dispatcher pulls entries from a [`LogSource`], classifies each one
//! once and fans it out to every forwarding that wants its log type. Past
//! entries are replayed first, in `(timestamp, sequence)` order; then, if
//! asked to, the dispatcher hands off to a live subscription and keeps
//! forwarding until cancelled.

mod watermark;

use crate::catalog::MessageCatalog;
use crate::collector::{LiveStream, LogSource, SourceError, StartPoint};
use crate::domain::{ForwarderError, LogEntry, LogType};
use crate::forwarding::{Delivery, Forwarding};
use crate::reliability::{RetryConfig, RetryPolicy};
use chrono::{DateTime, FixedOffset};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use watermark::{HandoffWindow, Watermark};

/// Bounds for switching from replay to the live stream.
#[derive(Debug, Clone)]
pub struct HandoffConfig {
    /// Limit for subscribe plus catch-up fetch.
    pub timeout: Duration,
    pub max_attempts: u32,
    /// First backoff between attempts; doubles on each further one.
    pub backoff: Duration,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DispatcherConfig {
    pub start: StartPoint,
    /// Keep forwarding live entries after replay.
    pub future: bool,
    pub handoff: HandoffConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Init,
    ReplayPast,
    WaitLive,
    Done,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Entries taken from the source and fanned out.
    pub dispatched: u64,
    /// Successful writes, summed over forwardings.
    pub deliveries: u64,
    pub dropped: u64,
    pub unclassified: u64,
    pub cancelled: bool,
}

pub struct Dispatcher {
    catalog: MessageCatalog,
    forwardings: Vec<Forwarding>,
    config: DispatcherConfig,
    state: DispatcherState,
    summary: RunSummary,
    watermark: Watermark,
}

enum Flow {
    Continue,
    Cancelled,
}

impl Dispatcher {
    pub fn new(
        catalog: MessageCatalog,
        forwardings: Vec<Forwarding>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            catalog,
            forwardings,
            config,
            state: DispatcherState::Init,
            summary: RunSummary::default(),
            watermark: Watermark::default(),
        }
    }

    pub fn state(&self) -> DispatcherState {
        self.state
    }

    pub fn forwardings(&self) -> &[Forwarding] {
        &self.forwardings
    }

    /// Log types wanted by at least one forwarding.
    pub fn log_types(&self) -> Vec<LogType> {
        LogType::ALL
            .into_iter()
            .filter(|log| self.forwardings.iter().any(|f| f.logs().contains(log)))
            .collect()
    }

    /// Open every forwarding, replay, optionally follow the live stream,
    /// and close the forwardings again.
    pub async fn run<S>(
        &mut self,
        source: &mut S,
        token: CancellationToken,
    ) -> Result<RunSummary, ForwarderError>
    where
        S: LogSource + ?Sized,
    {
        for forwarding in &mut self.forwardings {
            forwarding.open().await?;
        }

        let result = self.run_states(source, &token).await;

        for forwarding in &mut self.forwardings {
            if let Err(e) = forwarding.close().await {
                warn!(forwarding = %forwarding.name(), error = %e, "Failed to close forwarding");
            }
        }

        self.state = DispatcherState::Done;
        result?;
        info!(
            dispatched = self.summary.dispatched,
            deliveries = self.summary.deliveries,
            dropped = self.summary.dropped,
            unclassified = self.summary.unclassified,
            cancelled = self.summary.cancelled,
            "Dispatcher finished"
        );
        Ok(self.summary.clone())
    }

    async fn run_states<S>(
        &mut self,
        source: &mut S,
        token: &CancellationToken,
    ) -> Result<(), ForwarderError>
    where
        S: LogSource + ?Sized,
    {
        self.state = DispatcherState::Init;
        self.check_appliance_version(source, token).await;

        let since = match self.config.start {
            StartPoint::All => None,
            StartPoint::Timestamp(time) => Some(time),
            StartPoint::Now => match cancellable(token, source.current_time()).await {
                Some(now) => Some(now?),
                None => {
                    self.cancel();
                    return Ok(());
                }
            },
        };

        self.state = DispatcherState::ReplayPast;
        if let Flow::Cancelled = self.replay(source, since, token).await? {
            self.cancel();
            return Ok(());
        }

        if !self.config.future {
            return Ok(());
        }

        self.state = DispatcherState::WaitLive;
        self.follow_live(source, since, token).await?;
        self.cancel();
        Ok(())
    }

    async fn check_appliance_version<S>(&self, source: &mut S, token: &CancellationToken)
    where
        S: LogSource + ?Sized,
    {
        match cancellable(token, source.appliance_version()).await {
            Some(Ok(Some(version))) if !self.catalog.is_applicable_to(&version) => warn!(
                hmc_version = %version,
                catalog_version = %self.catalog.hmc_version(),
                "Log message catalog was written for a different HMC version"
            ),
            Some(Err(e)) => debug!(error = %e, "Cannot determine HMC version"),
            _ => {}
        }
    }

    async fn replay<S>(
        &mut self,
        source: &mut S,
        since: Option<DateTime<FixedOffset>>,
        token: &CancellationToken,
    ) -> Result<Flow, ForwarderError>
    where
        S: LogSource + ?Sized,
    {
        let mut entries = Vec::new();
        for log_type in self.log_types() {
            match cancellable(token, source.fetch_historical(log_type, since)).await {
                Some(page) => entries.extend(page?),
                None => return Ok(Flow::Cancelled),
            }
        }
        entries.sort_by_key(LogEntry::order_key);
        info!(
            entries = entries.len(),
            since = %since.map_or_else(|| "all".to_string(), |t| t.to_rfc3339()),
            "Replaying past log entries"
        );

        for entry in &entries {
            if token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            self.dispatch(entry).await?;
            self.watermark.advance(entry);
        }
        Ok(Flow::Continue)
    }

    /// Subscribe, catch up on the gap since replay, then forward live
    /// entries. Returns only on cancellation or a fatal error.
    ///
    /// Each log type is caught up from its own watermark, falling back to
    /// `start` for a type that has not delivered anything yet.
    async fn follow_live<S>(
        &mut self,
        source: &mut S,
        start: Option<DateTime<FixedOffset>>,
        token: &CancellationToken,
    ) -> Result<(), ForwarderError>
    where
        S: LogSource + ?Sized,
    {
        let handoff = self.config.handoff.clone();
        let policy = handoff_policy(&handoff)?;
        let log_types = self.log_types();
        let mut failures = 0;

        loop {
            let since: Vec<_> = log_types
                .iter()
                .map(|log_type| (*log_type, self.watermark.time(*log_type).or(start)))
                .collect();
            let attempt = cancellable(
                token,
                tokio::time::timeout(handoff.timeout, subscribe_and_catch_up(source, &log_types, &since)),
            )
            .await;
            let result = match attempt {
                None => return Ok(()),
                Some(Ok(result)) => result,
                Some(Err(_)) => Err(SourceError::Timeout(handoff.timeout)),
            };

            let (mut stream, gap) = match result {
                Ok(handed_off) => handed_off,
                Err(e) => {
                    failures += 1;
                    if policy.should_give_up(failures) {
                        return Err(e.into());
                    }
                    warn!(attempt = failures, error = %e, "Live handoff failed, retrying");
                    if cancellable(token, policy.backoff(failures)).await.is_none() {
                        return Ok(());
                    }
                    continue;
                }
            };

            let mut window = HandoffWindow::default();
            if let Flow::Cancelled = self.catch_up(&gap, &mut window, token).await? {
                return Ok(());
            }
            info!(log_types = ?log_types, "Waiting for future log entries");

            let received = match self.forward_live(stream.as_mut(), &mut window, token).await? {
                LiveEnd::Cancelled => return Ok(()),
                LiveEnd::Ended { received } => received,
            };

            failures = if received > 0 { 1 } else { failures + 1 };
            if policy.should_give_up(failures) {
                return Err(SourceError::Subscription(
                    "live stream ended repeatedly without delivering entries".to_string(),
                )
                .into());
            }
            if cancellable(token, policy.backoff(failures)).await.is_none() {
                return Ok(());
            }
        }
    }

    async fn catch_up(
        &mut self,
        gap: &[LogEntry],
        window: &mut HandoffWindow,
        token: &CancellationToken,
    ) -> Result<Flow, ForwarderError> {
        let mut caught_up = 0usize;
        for entry in gap {
            if token.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            if self.watermark.is_behind(entry) || self.watermark.has_seen(entry) {
                continue;
            }
            self.dispatch(entry).await?;
            self.watermark.advance(entry);
            window.record(entry);
            caught_up += 1;
        }
        if window.is_empty() {
            debug!("No log entries were logged during handoff");
        } else {
            info!(entries = caught_up, "Forwarded log entries logged during handoff");
        }
        Ok(Flow::Continue)
    }

    async fn forward_live(
        &mut self,
        stream: &mut dyn LiveStream,
        window: &mut HandoffWindow,
        token: &CancellationToken,
    ) -> Result<LiveEnd, ForwarderError> {
        let mut received = 0u64;
        loop {
            let next = match cancellable(token, stream.next()).await {
                None => return Ok(LiveEnd::Cancelled),
                Some(next) => next,
            };

            let entry = match next {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    warn!("Live log stream ended, resubscribing");
                    return Ok(LiveEnd::Ended { received });
                }
                Err(e) => {
                    warn!(error = %e, "Live log stream failed, resubscribing");
                    return Ok(LiveEnd::Ended { received });
                }
            };
            received += 1;

            if window.is_repeat(&entry) || self.watermark.has_seen(&entry) {
                debug!(
                    log = %entry.log_type,
                    id = %entry.message_number,
                    "Skipping live entry already forwarded during handoff"
                );
                continue;
            }
            if self.watermark.is_behind(&entry) {
                warn!(
                    log = %entry.log_type,
                    id = %entry.message_number,
                    time = %entry.timestamp.to_rfc3339(),
                    "Live log entry is older than entries already forwarded"
                );
            }

            self.dispatch(&entry).await?;
            self.watermark.advance(&entry);
        }
    }

    /// Classify once and hand the entry to every matching forwarding.
    async fn dispatch(&mut self, entry: &LogEntry) -> Result<(), ForwarderError> {
        let classification = self.catalog.classify(entry);
        if !classification.is_classified() {
            self.summary.unclassified += 1;
        }

        for forwarding in self.forwardings.iter_mut().filter(|f| f.matches(entry)) {
            match forwarding.deliver(entry, &classification).await? {
                Delivery::Delivered => self.summary.deliveries += 1,
                Delivery::Dropped => self.summary.dropped += 1,
            }
        }
        self.summary.dispatched += 1;
        Ok(())
    }

    fn cancel(&mut self) {
        if !self.summary.cancelled {
            info!("Forwarding cancelled");
        }
        self.summary.cancelled = true;
    }
}

enum LiveEnd {
    Cancelled,
    Ended { received: u64 },
}

/// Handoff retries back off from `backoff`, capped at eight times it.
fn handoff_policy(handoff: &HandoffConfig) -> Result<RetryPolicy, ForwarderError> {
    let config = RetryConfig {
        max_delay: handoff.backoff.saturating_mul(8),
        ..RetryConfig::default()
    }
    .with_max_attempts(handoff.max_attempts)
    .with_base_delay(handoff.backoff);
    RetryPolicy::new(config).map_err(|e| {
        ForwarderError::from(SourceError::InvalidConfiguration(format!(
            "invalid live handoff settings: {e}"
        )))
    })
}

async fn subscribe_and_catch_up<S>(
    source: &mut S,
    log_types: &[LogType],
    since: &[(LogType, Option<DateTime<FixedOffset>>)],
) -> Result<(Box<dyn LiveStream>, Vec<LogEntry>), SourceError>
where
    S: LogSource + ?Sized,
{
    let stream = source.subscribe_live(log_types).await?;
    let mut gap = Vec::new();
    for (log_type, since) in since {
        gap.extend(source.fetch_historical(*log_type, *since).await?);
    }
    gap.sort_by_key(LogEntry::order_key);
    Ok((stream, gap))
}

/// `None` when the token fires first.
async fn cancellable<F: Future>(token: &CancellationToken, future: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = future => Some(output),
    }
}
