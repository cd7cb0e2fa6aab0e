use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use rand::Rng;
use serde::Serialize;

/// Simulated cloud sync: there is no real backend, only a transport that
/// fails with a configured probability. Payloads queue while offline and
/// drain on the scheduler's tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
    pub failure_rate: f64,
    pub max_attempts: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            failure_rate: 0.1,
            max_attempts: 3,
        }
    }
}

/// Shared flag that lets the host stop a drain mid-queue at shutdown.
/// Remaining payloads stay queued.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

pub trait SyncTransport: Send + Sync {
    /// One simulated round trip. Returns whether the payload was accepted.
    fn send(&self, payload: &str) -> bool;
}

/// Default transport: accepts with probability `1 - failure_rate`.
pub struct SimulatedTransport {
    failure_rate: f64,
}

impl SimulatedTransport {
    pub fn new(failure_rate: f64) -> Self {
        Self { failure_rate }
    }
}

impl SyncTransport for SimulatedTransport {
    fn send(&self, _payload: &str) -> bool {
        rand::thread_rng().gen::<f64>() >= self.failure_rate
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrainReport {
    pub sent: usize,
    pub abandoned: usize,
    pub cancelled: bool,
}

struct Pending {
    payload: String,
}

/// Fire-and-forget sync queue. `drain` retries each payload up to
/// `max_attempts` times and abandons it with a logged warning afterwards;
/// nothing here ever blocks the caller on network I/O.
pub struct SyncQueue {
    transport: Arc<dyn SyncTransport>,
    config: SyncConfig,
    pending: Mutex<VecDeque<Pending>>,
    offline: AtomicBool,
}

impl SyncQueue {
    pub fn new(transport: Arc<dyn SyncTransport>, config: SyncConfig) -> Self {
        Self {
            transport,
            config,
            pending: Mutex::new(VecDeque::new()),
            offline: AtomicBool::new(false),
        }
    }

    pub fn enqueue(&self, payload: impl Into<String>) {
        self.pending.lock().unwrap().push_back(Pending {
            payload: payload.into(),
        });
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn drain(&self, token: &CancellationToken) -> DrainReport {
        let mut report = DrainReport::default();
        if self.offline.load(Ordering::SeqCst) {
            tracing::debug!("offline, leaving sync queue untouched");
            return report;
        }

        loop {
            if token.is_cancelled() {
                report.cancelled = true;
                tracing::debug!(remaining = self.pending_len(), "sync drain cancelled");
                return report;
            }

            let Some(item) = self.pending.lock().unwrap().pop_front() else {
                return report;
            };

            let mut delivered = false;
            for attempt in 1..=self.config.max_attempts {
                if self.transport.send(&item.payload) {
                    delivered = true;
                    break;
                }
                tracing::debug!(attempt, "sync attempt failed");
            }

            if delivered {
                report.sent += 1;
            } else {
                report.abandoned += 1;
                tracing::warn!(
                    attempts = self.config.max_attempts,
                    "sync payload abandoned after repeated failures"
                );
            }
        }
    }
}
