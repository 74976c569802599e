use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};
use vehiclelink_frame::Frame;

use crate::error::{LinkError, Result};

/// Default wait for an ACK before retransmitting.
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_millis(2500);

/// Default retransmissions after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Acknowledgment policy for outbound commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckConfig {
    /// How long to wait for each ACK.
    pub ack_timeout: Duration,
    /// Retransmissions before giving up. Total attempts are `max_retries + 1`.
    pub max_retries: u32,
}

impl Default for AckConfig {
    fn default() -> Self {
        Self {
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl AckConfig {
    pub fn with_ack_timeout(mut self, ack_timeout: Duration) -> Self {
        self.ack_timeout = ack_timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Longest a single `send` can wait before failing with `AckTimeout`.
    pub fn worst_case(&self) -> Duration {
        self.ack_timeout.saturating_mul(self.max_retries.saturating_add(1))
    }
}

struct PendingCommand {
    generation: u64,
    issued_at: Instant,
    retry_count: u32,
    resolver: oneshot::Sender<Result<()>>,
}

/// Matches inbound ACKs to outstanding commands and drives retransmission.
///
/// Commands are keyed by the id the device echoes in ACK payload byte 0.
/// At most one command per id is outstanding; a second `send` for the same
/// id fails with [`LinkError::CommandPending`].
pub struct AckCorrelator {
    config: AckConfig,
    pending: Mutex<HashMap<u8, PendingCommand>>,
    next_generation: AtomicU64,
}

impl AckCorrelator {
    pub fn new(config: AckConfig) -> Self {
        Self {
            config,
            pending: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &AckConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u8, PendingCommand>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transmit `frame` and wait for the ACK carrying `id`.
    ///
    /// `transmit` is called once per attempt with an identical frame. A
    /// transmit error aborts the command immediately.
    pub async fn send<F, Fut>(&self, id: u8, frame: Frame, mut transmit: F) -> Result<()>
    where
        F: FnMut(Frame) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let (tx, mut rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        {
            let mut pending = self.lock();
            if pending.contains_key(&id) {
                return Err(LinkError::CommandPending(id));
            }
            pending.insert(
                id,
                PendingCommand {
                    generation,
                    issued_at: Instant::now(),
                    retry_count: 0,
                    resolver: tx,
                },
            );
        }
        let _guard = PendingGuard {
            correlator: self,
            id,
            generation,
        };

        loop {
            transmit(frame.clone()).await?;

            match tokio::time::timeout(self.config.ack_timeout, &mut rx).await {
                Ok(Ok(result)) => return result,
                Ok(Err(_)) => return Err(LinkError::Disconnected),
                Err(_) => {}
            }

            let mut pending = self.lock();
            let Some(entry) = pending.get_mut(&id) else {
                // Resolved between the timeout firing and taking the lock.
                return rx.try_recv().unwrap_or(Err(LinkError::Disconnected));
            };
            if entry.retry_count < self.config.max_retries {
                entry.retry_count += 1;
                debug!(
                    command = id,
                    retry = entry.retry_count,
                    max_retries = self.config.max_retries,
                    "no ACK, retransmitting"
                );
                continue;
            }

            let attempts = entry.retry_count + 1;
            let waited = entry.issued_at.elapsed();
            pending.remove(&id);
            warn!(command = id, attempts, ?waited, "command not acknowledged");
            return Err(LinkError::AckTimeout {
                command: id,
                attempts,
            });
        }
    }

    /// Resolve the command waiting on `id`. Returns false for a stray ACK.
    pub fn on_ack(&self, id: u8) -> bool {
        let entry = self.lock().remove(&id);
        match entry {
            Some(entry) => {
                debug!(
                    command = id,
                    retries = entry.retry_count,
                    latency = ?entry.issued_at.elapsed(),
                    "command acknowledged"
                );
                let _ = entry.resolver.send(Ok(()));
                true
            }
            None => {
                debug!(id, "ACK with no pending command");
                false
            }
        }
    }

    /// Fail every outstanding command with [`LinkError::Disconnected`].
    pub fn fail_all(&self) -> usize {
        let drained: Vec<(u8, PendingCommand)> = self.lock().drain().collect();
        let count = drained.len();
        for (id, entry) in drained {
            debug!(command = id, "failing pending command on disconnect");
            let _ = entry.resolver.send(Err(LinkError::Disconnected));
        }
        count
    }

    pub fn is_pending(&self, id: u8) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

impl Default for AckCorrelator {
    fn default() -> Self {
        Self::new(AckConfig::default())
    }
}

// Removes the entry if the sending future is dropped mid-flight.
struct PendingGuard<'a> {
    correlator: &'a AckCorrelator,
    id: u8,
    generation: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        let mut pending = self.correlator.lock();
        if pending
            .get(&self.id)
            .is_some_and(|entry| entry.generation == self.generation)
        {
            pending.remove(&self.id);
        }
    }
}
