//! Driver bridge
//!
//! Hand-off point between hardware driver threads/tasks and source nodes. Drivers call
//! [`DriverBridge::deliver_sample`] from any thread; the owning source node drains the
//! queue at the start of its `process()`, so the graph never blocks on a driver.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_channel::{Receiver, Sender, TrySendError};
use contracts::{StreamType, StreamValue};
use observability::{record_sample_delivered, record_samples_dropped};
use tracing::{debug, instrument, trace, warn};

use crate::config::{BackpressureConfig, DropPolicy, IngestionMetrics};
use crate::error::{IngestionError, Result};

/// One sample as handed over by a driver
#[derive(Debug, Clone, PartialEq)]
pub struct DriverSample<T> {
    pub value: T,
    pub is_healthy: bool,
    /// Capture instant on the graph clock
    pub time_point: Duration,
}

struct Endpoint<T> {
    sender: Sender<DriverSample<T>>,
    // kept to evict the oldest sample under DropOldest
    receiver: Receiver<DriverSample<T>>,
}

struct Registration {
    stream_type: StreamType,
    drop_policy: DropPolicy,
    endpoint: Box<dyn Any + Send + Sync>,
}

/// Registry of driver-facing stream endpoints, cheap to clone and share with drivers
#[derive(Clone, Default)]
pub struct DriverBridge {
    streams: Arc<RwLock<HashMap<String, Registration>>>,
    metrics: Arc<IngestionMetrics>,
}

impl DriverBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared counters
    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Open a stream endpoint and return the receiving side
    #[instrument(name = "bridge_register", skip(self, backpressure), fields(capacity = backpressure.channel_capacity))]
    pub fn register<T: StreamValue>(
        &self,
        stream_id: &str,
        stream_type: StreamType,
        backpressure: &BackpressureConfig,
    ) -> Result<Receiver<DriverSample<T>>> {
        let mut streams = self.streams.write().unwrap_or_else(PoisonError::into_inner);
        if streams.contains_key(stream_id) {
            return Err(IngestionError::AlreadyRegistered {
                stream_id: stream_id.to_string(),
            });
        }

        let (sender, receiver) = async_channel::bounded(backpressure.channel_capacity.max(1));
        streams.insert(
            stream_id.to_string(),
            Registration {
                stream_type,
                drop_policy: backpressure.drop_policy,
                endpoint: Box::new(Endpoint {
                    sender,
                    receiver: receiver.clone(),
                }),
            },
        );
        debug!(%stream_type, policy = ?backpressure.drop_policy, "Stream endpoint registered");
        Ok(receiver)
    }

    /// Close a stream endpoint; returns whether it existed
    pub fn unregister(&self, stream_id: &str) -> bool {
        let removed = self
            .streams
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(stream_id);
        if let Some(registration) = &removed {
            debug!(stream_id, stream_type = %registration.stream_type, "Stream endpoint closed");
        }
        removed.is_some()
    }

    pub fn contains(&self, stream_id: &str) -> bool {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(stream_id)
    }

    pub fn stream_type(&self, stream_id: &str) -> Option<StreamType> {
        self.streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(stream_id)
            .map(|r| r.stream_type)
    }

    /// Registered stream ids, sorted
    pub fn stream_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .streams
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    /// Push interface for driver collaborators. Never blocks.
    pub fn deliver_sample<T: StreamValue>(
        &self,
        stream_id: &str,
        value: T,
        is_healthy: bool,
        time_point: Duration,
    ) -> Result<()> {
        let streams = self.streams.read().unwrap_or_else(PoisonError::into_inner);
        let Some(registration) = streams.get(stream_id) else {
            self.metrics.record_rejected();
            return Err(IngestionError::unknown_stream(stream_id));
        };
        let Some(endpoint) = registration.endpoint.downcast_ref::<Endpoint<T>>() else {
            self.metrics.record_rejected();
            return Err(IngestionError::StreamTypeMismatch {
                stream_id: stream_id.to_string(),
                expected: registration.stream_type,
            });
        };

        self.metrics.record_received();
        let sample = DriverSample {
            value,
            is_healthy,
            time_point,
        };

        match endpoint.sender.try_send(sample) {
            Ok(()) => {}
            Err(TrySendError::Full(sample)) => match registration.drop_policy {
                DropPolicy::DropNewest => {
                    self.record_drop(stream_id);
                    return Err(IngestionError::queue_full(stream_id));
                }
                DropPolicy::DropOldest => {
                    if endpoint.receiver.try_recv().is_ok() {
                        self.record_drop(stream_id);
                    }
                    if endpoint.sender.try_send(sample).is_err() {
                        self.record_drop(stream_id);
                        return Err(IngestionError::queue_full(stream_id));
                    }
                }
            },
            Err(TrySendError::Closed(_)) => {
                return Err(IngestionError::ChannelClosed {
                    stream_id: stream_id.to_string(),
                });
            }
        }

        self.metrics.update_queue_len(endpoint.sender.len());
        record_sample_delivered(stream_id);
        trace!(stream_id, ?time_point, is_healthy, "Sample delivered");
        Ok(())
    }

    fn record_drop(&self, stream_id: &str) {
        self.metrics.record_dropped();
        record_samples_dropped(stream_id, 1);
        warn!(stream_id, "Handoff queue full, sample dropped");
    }
}

impl std::fmt::Debug for DriverBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverBridge")
            .field("streams", &self.stream_ids())
            .finish()
    }
}
