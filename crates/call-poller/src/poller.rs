//! Fixed-interval call identifier poller
//!
//! Fetches once immediately, then on every tick. A failed fetch is logged and
//! the previous value is kept. Stopping cancels the schedule; dropping the
//! poller stops it too.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use callrelay_core::config::PollerConfig;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::source::{HttpStatusSource, StatusSource};

/// How the call identifier moved between two polls
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// None -> Some
    NewCall(String),
    /// Some -> None
    Cleared(String),
    /// Some(a) -> Some(b)
    Changed { from: String, to: String },
    /// Some(a) -> Some(a)
    Unchanged(String),
    /// None -> None
    StillNone,
}

impl Transition {
    /// Classify the move from `previous` to `current`
    pub fn classify(previous: Option<&str>, current: Option<&str>) -> Self {
        match (previous, current) {
            (None, Some(now)) => Transition::NewCall(now.to_string()),
            (Some(before), None) => Transition::Cleared(before.to_string()),
            (Some(before), Some(now)) if before != now => Transition::Changed {
                from: before.to_string(),
                to: now.to_string(),
            },
            (Some(_), Some(now)) => Transition::Unchanged(now.to_string()),
            (None, None) => Transition::StillNone,
        }
    }

    /// Whether the held value changes
    pub fn is_change(&self) -> bool {
        matches!(
            self,
            Transition::NewCall(_) | Transition::Cleared(_) | Transition::Changed { .. }
        )
    }

    fn log(&self) {
        match self {
            Transition::NewCall(call_sid) => info!("🆕 New call detected: {}", call_sid),
            Transition::Cleared(call_sid) => info!("📴 Call cleared (was {})", call_sid),
            Transition::Changed { from, to } => info!("🔀 Call changed: {} -> {}", from, to),
            Transition::Unchanged(call_sid) => trace!("Call unchanged: {}", call_sid),
            Transition::StillNone => trace!("Still no active call"),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transition::NewCall(call_sid) => write!(f, "new call {}", call_sid),
            Transition::Cleared(call_sid) => write!(f, "cleared {}", call_sid),
            Transition::Changed { from, to } => write!(f, "changed {} -> {}", from, to),
            Transition::Unchanged(call_sid) => write!(f, "unchanged {}", call_sid),
            Transition::StillNone => write!(f, "still none"),
        }
    }
}

/// Counters for poller diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Fetches started
    pub attempts: u64,
    pub failures: u64,
    /// Polls that changed the held value
    pub transitions: u64,
}

/// Polls the status endpoint and holds the latest call identifier
pub struct CallSidPoller {
    inner: Arc<PollerInner>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct PollerInner {
    source: Arc<dyn StatusSource>,
    interval: Duration,
    current_tx: watch::Sender<Option<String>>,
    stats: Mutex<PollerStats>,
}

impl CallSidPoller {
    /// Start polling `source` every `interval`
    ///
    /// Must be called inside a Tokio runtime. The first fetch happens right away.
    pub fn start(source: Arc<dyn StatusSource>, interval: Duration) -> Self {
        let (current_tx, _) = watch::channel(None);
        let inner = Arc::new(PollerInner {
            source,
            interval,
            current_tx,
            stats: Mutex::new(PollerStats::default()),
        });
        let cancel = CancellationToken::new();

        let task = {
            let inner = inner.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { inner.run(cancel).await })
        };
        info!("▶️ Polling call SID every {:?}", interval);

        Self {
            inner,
            cancel,
            task: Mutex::new(Some(task)),
        }
    }

    /// Start polling the HTTP endpoint named in `config`
    pub fn from_config(config: &PollerConfig) -> Result<Self> {
        let source = HttpStatusSource::new(config.status_url.clone(), config.request_timeout())?;
        Ok(Self::start(Arc::new(source), config.interval()))
    }

    /// Latest call identifier
    pub fn current(&self) -> Option<String> {
        self.inner.current_tx.borrow().clone()
    }

    /// Receive every change of the held call identifier
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.inner.current_tx.subscribe()
    }

    /// Diagnostic counters
    pub fn stats(&self) -> PollerStats {
        *self.inner.stats.lock()
    }

    /// Poll interval
    pub fn interval(&self) -> Duration {
        self.inner.interval
    }

    /// Whether the polling task is alive
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map_or(false, |task| !task.is_finished())
    }

    /// Stop polling; no fetch starts after this returns
    pub fn stop(&self) {
        self.cancel.cancel();
        if let Some(task) = self.task.lock().take() {
            task.abort();
            info!("⏹️ Call SID poller stopped");
        }
    }
}

impl Drop for CallSidPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

impl fmt::Debug for CallSidPoller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSidPoller")
            .field("interval", &self.inner.interval)
            .field("current", &self.current())
            .field("stats", &self.stats())
            .finish()
    }
}

impl PollerInner {
    async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            self.stats.lock().attempts += 1;
            let fetched = tokio::select! {
                _ = cancel.cancelled() => break,
                fetched = self.source.fetch() => fetched,
            };

            match fetched {
                Ok(response) => self.apply(response.call_sid),
                Err(e) => {
                    self.stats.lock().failures += 1;
                    warn!(
                        "⚠️ Failed to fetch call SID, keeping {:?}: {}",
                        *self.current_tx.borrow(),
                        e
                    );
                }
            }
        }

        debug!("Call SID polling loop exited");
    }

    fn apply(&self, call_sid: Option<String>) {
        let previous = self.current_tx.borrow().clone();
        let transition = Transition::classify(previous.as_deref(), call_sid.as_deref());
        transition.log();

        if transition.is_change() {
            self.stats.lock().transitions += 1;
            self.current_tx.send_replace(call_sid);
        }
    }
}
