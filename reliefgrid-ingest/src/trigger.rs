// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Trigger Dispatcher - at-least-once delivery of object-created events
//!
//! ```text
//! ObjectStore ─► forward() ─► TriggerHandle ─► TriggerDispatcher ─► Pipeline::handle
//!                                  ▲                   │
//!                                  └── backoff ◄── retryable error
//! ```
//!
//! Each event is handled on its own task so one slow emergency does not hold
//! up the others. Retryable failures go back on the queue after a fixed
//! backoff until `max_deliveries` is reached.

use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{HandleOutcome, Pipeline};
use reliefgrid_storage::ObjectCreated;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Configuration for the Trigger Dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Attempts per event, including the first
    pub max_deliveries: u32,
    /// Wait before a retryable failure is redelivered
    pub backoff: Duration,
    /// Deadline for one delivery
    pub delivery_timeout: Duration,
    /// Queue capacity (backpressure control)
    pub channel_capacity: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for DispatcherConfig {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            max_deliveries: config.max_deliveries.max(1),
            backoff: config.redelivery_backoff(),
            delivery_timeout: config.delivery_timeout(),
            channel_capacity: config.channel_capacity.max(1),
        }
    }
}

/// Statistics for the dispatcher.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub received: u64,
    pub completed: u64,
    pub ignored: u64,
    pub redelivered: u64,
    /// Non-retryable failures
    pub dropped: u64,
    /// Retryable failures that ran out of attempts
    pub exhausted: u64,
}

impl DispatchStats {
    /// Events that will not be delivered again
    pub fn settled(&self) -> u64 {
        self.completed + self.ignored + self.dropped + self.exhausted
    }
}

#[derive(Default)]
struct StatsInternal {
    received: AtomicU64,
    completed: AtomicU64,
    ignored: AtomicU64,
    redelivered: AtomicU64,
    dropped: AtomicU64,
    exhausted: AtomicU64,
}

impl StatsInternal {
    fn snapshot(&self) -> DispatchStats {
        DispatchStats {
            received: self.received.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            redelivered: self.redelivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            exhausted: self.exhausted.load(Ordering::Relaxed),
        }
    }
}

struct Delivery {
    event: ObjectCreated,
    attempt: u32,
}

/// Handle to submit events to the dispatcher.
#[derive(Clone)]
pub struct TriggerHandle {
    sender: mpsc::Sender<Delivery>,
    stats: Arc<StatsInternal>,
}

impl TriggerHandle {
    /// Queue an event for delivery.
    pub async fn submit(&self, event: ObjectCreated) -> PipelineResult<()> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        self.sender
            .send(Delivery { event, attempt: 1 })
            .await
            .map_err(|_| PipelineError::Internal("trigger dispatcher channel closed".to_string()))
    }

    /// Pump object-store notifications into the dispatcher until either side closes.
    pub fn forward(
        &self,
        mut notifications: mpsc::UnboundedReceiver<ObjectCreated>,
    ) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while let Some(event) = notifications.recv().await {
                if handle.submit(event).await.is_err() {
                    warn!("trigger dispatcher stopped, no longer forwarding notifications");
                    break;
                }
            }
        })
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.snapshot()
    }
}

/// The Trigger Dispatcher - runs as a background task.
pub struct TriggerDispatcher {
    config: DispatcherConfig,
    pipeline: Arc<Pipeline>,
}

impl TriggerDispatcher {
    pub fn new(config: DispatcherConfig, pipeline: Arc<Pipeline>) -> Self {
        Self { config, pipeline }
    }

    /// Spawn the dispatcher and return a handle for communication.
    pub fn spawn(self) -> TriggerHandle {
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity);
        let stats = Arc::new(StatsInternal::default());

        // redeliveries must not keep the queue open once every handle is gone
        let requeue = sender.downgrade();
        let actor_stats = stats.clone();
        tokio::spawn(async move {
            self.run(receiver, requeue, actor_stats).await;
        });

        TriggerHandle { sender, stats }
    }

    async fn run(
        self,
        mut receiver: mpsc::Receiver<Delivery>,
        requeue: mpsc::WeakSender<Delivery>,
        stats: Arc<StatsInternal>,
    ) {
        info!(
            max_deliveries = self.config.max_deliveries,
            backoff_ms = self.config.backoff.as_millis() as u64,
            "Trigger dispatcher started"
        );

        while let Some(delivery) = receiver.recv().await {
            let pipeline = self.pipeline.clone();
            let config = self.config.clone();
            let requeue = requeue.clone();
            let stats = stats.clone();
            tokio::spawn(async move {
                deliver(pipeline, config, delivery, requeue, stats).await;
            });
        }

        info!("Trigger dispatcher shutting down");
    }
}

async fn deliver(
    pipeline: Arc<Pipeline>,
    config: DispatcherConfig,
    delivery: Delivery,
    requeue: mpsc::WeakSender<Delivery>,
    stats: Arc<StatsInternal>,
) {
    let key = delivery.event.key.clone();
    let result = match tokio::time::timeout(config.delivery_timeout, pipeline.handle(&delivery.event)).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            operation: format!("delivery of {}", key),
            elapsed: config.delivery_timeout,
        }),
    };

    let err = match result {
        Ok(HandleOutcome::Ignored) => {
            stats.ignored.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Ok(outcome) => {
            debug!(key = %key, attempt = delivery.attempt, ?outcome, "event delivered");
            stats.completed.fetch_add(1, Ordering::Relaxed);
            return;
        }
        Err(err) => err,
    };

    if !err.is_retryable() {
        error!(key = %key, attempt = delivery.attempt, error = %err, "event dropped");
        stats.dropped.fetch_add(1, Ordering::Relaxed);
        return;
    }
    if delivery.attempt >= config.max_deliveries {
        error!(key = %key, attempts = delivery.attempt, error = %err, "event exhausted its deliveries");
        stats.exhausted.fetch_add(1, Ordering::Relaxed);
        return;
    }

    warn!(
        key = %key,
        attempt = delivery.attempt,
        backoff_ms = config.backoff.as_millis() as u64,
        error = %err,
        "delivery failed, will redeliver"
    );
    tokio::time::sleep(config.backoff).await;

    let next = Delivery {
        event: delivery.event,
        attempt: delivery.attempt + 1,
    };
    match requeue.upgrade() {
        Some(sender) if sender.send(next).await.is_ok() => {
            stats.redelivered.fetch_add(1, Ordering::Relaxed);
        }
        _ => {
            warn!(key = %key, "dispatcher closed before redelivery");
            stats.exhausted.fetch_add(1, Ordering::Relaxed);
        }
    }
}
