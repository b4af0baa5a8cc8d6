//! Periodic quote broadcasting.

use std::sync::Arc;
use std::time::Duration;
use tickerchat_core::{OutboundEnvelope, QuoteSource};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::Hub;

/// Result of one pass over the symbol roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Symbols whose quote was broadcast, in roster order.
    pub broadcast: Vec<String>,
    /// Symbols whose fetch failed or returned an unusable quote.
    pub failed: Vec<String>,
    /// The pass stopped early because of shutdown.
    pub interrupted: bool,
}

/// Fetches every configured symbol once per period and broadcasts the quotes.
pub struct QuotePoller {
    hub: Arc<Hub>,
    source: Arc<dyn QuoteSource>,
    config: PollerConfig,
}

impl QuotePoller {
    pub fn new(hub: Arc<Hub>, source: Arc<dyn QuoteSource>, config: PollerConfig) -> Self {
        Self {
            hub,
            source,
            config,
        }
    }

    /// Run one pass: fetch each symbol in order and broadcast it.
    ///
    /// A failing symbol is logged and skipped; it never stops the pass.
    pub async fn tick(&self) -> TickReport {
        self.run_tick(None).await
    }

    /// Start the poller on its own task.
    ///
    /// The first pass runs one full period after start. A pass that overruns
    /// the period delays the next one instead of stacking up behind it.
    /// Dropping the returned handle also stops the poller.
    pub fn spawn(self) -> PollerHandle {
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let period = self.config.period.max(Duration::from_millis(1));

        let task = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(
                symbols = self.config.symbols.len(),
                period_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
                "Quote poller started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.run_tick(Some(&shutdown_rx)).await;
                        if report.interrupted {
                            break;
                        }
                    }
                    _ = shutdown_rx.changed() => break,
                }
            }
            info!("Quote poller stopped");
        });

        PollerHandle { shutdown, task }
    }

    async fn run_tick(&self, shutdown: Option<&watch::Receiver<bool>>) -> TickReport {
        let mut report = TickReport::default();

        for symbol in &self.config.symbols {
            if stop_requested(shutdown) {
                report.interrupted = true;
                break;
            }

            let fetched = tokio::select! {
                result = self.source.fetch_quote(symbol) => Some(result),
                _ = wait_for_stop(shutdown) => None,
            };
            let Some(fetched) = fetched else {
                report.interrupted = true;
                break;
            };

            let record = match fetched.map_err(|e| e.to_string()).and_then(|record| {
                record.validate()?;
                Ok(record)
            }) {
                Ok(record) => record,
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Skipping quote");
                    report.failed.push(symbol.clone());
                    continue;
                }
            };

            match self.hub.broadcast(&OutboundEnvelope::Stock(record), None).await {
                Ok(sent) => {
                    debug!(symbol = %symbol, delivered = sent.delivered, "Quote broadcast");
                    report.broadcast.push(symbol.clone());
                }
                Err(e) => {
                    warn!(symbol = %symbol, error = %e, "Failed to broadcast quote");
                    report.failed.push(symbol.clone());
                }
            }
        }

        if !report.failed.is_empty() {
            info!(
                broadcast = report.broadcast.len(),
                failed = report.failed.len(),
                "Quote tick finished with failures"
            );
        }
        report
    }
}

impl std::fmt::Debug for QuotePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuotePoller")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn stop_requested(shutdown: Option<&watch::Receiver<bool>>) -> bool {
    shutdown.is_some_and(|rx| *rx.borrow())
}

async fn wait_for_stop(shutdown: Option<&watch::Receiver<bool>>) {
    match shutdown {
        Some(rx) => {
            let mut rx = rx.clone();
            // A dropped sender counts as a stop request.
            let _ = rx.wait_for(|stop| *stop).await;
        }
        None => std::future::pending().await,
    }
}

/// Handle to a running [`QuotePoller`].
#[derive(Debug)]
pub struct PollerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Stop the poller and wait for its task to exit.
    ///
    /// An in-flight fetch is abandoned; no further quotes are broadcast.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "Quote poller task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
