//! Output stream buffer and its read-only handles.
//!
//! A stream is owned by exactly one producer ([`OutputStream`]); every consumer holds a
//! [`StreamReader`] sharing the same buffer. Mutation happens under a short write lock so a
//! driver thread can publish while the tick loop reads without tearing `sample_idx`/`last_sample`.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use contracts::{Sample, StreamType, StreamValue};
use tracing::warn;

/// Samples produced during the current tick plus the retained last sample
#[derive(Debug)]
struct StreamBuffer<T> {
    rate: u32,
    dt: Duration,
    samples: Vec<Sample<T>>,
    last_sample: Sample<T>,
    /// Instant of the most recent sample, or the start stamp before the first one
    time_point: Duration,
}

impl<T: StreamValue> StreamBuffer<T> {
    fn new(rate: u32) -> Self {
        Self {
            rate,
            dt: rate_to_dt(rate),
            samples: Vec::new(),
            last_sample: Sample::default(),
            time_point: Duration::ZERO,
        }
    }

    /// Indices saturate at `u32::MAX`; they never wrap back below a consumer's position
    fn push(&mut self, value: T, is_healthy: bool, time_point: Duration, dt: Duration) {
        let last_idx = self.last_sample.sample_idx;
        let sample_idx = last_idx.saturating_add(1);
        if sample_idx == u32::MAX && last_idx != u32::MAX {
            warn!(rate = self.rate, "Stream sample index exhausted, consumers will stall");
        }
        let sample = Sample::new(value, is_healthy, sample_idx, time_point, dt);
        self.time_point = time_point;
        self.last_sample = sample.clone();
        self.samples.push(sample);
    }
}

fn rate_to_dt(rate: u32) -> Duration {
    if rate == 0 {
        Duration::ZERO
    } else {
        Duration::from_nanos(1_000_000_000 / u64::from(rate))
    }
}

struct Shared<T> {
    stream_type: StreamType,
    buffer: RwLock<StreamBuffer<T>>,
}

impl<T> Shared<T> {
    fn read(&self) -> RwLockReadGuard<'_, StreamBuffer<T>> {
        self.buffer.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StreamBuffer<T>> {
        self.buffer.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Producer side of a stream
pub struct OutputStream<T> {
    shared: Arc<Shared<T>>,
}

impl<T: StreamValue> OutputStream<T> {
    /// Create a stream of `stream_type` at `rate` samples per second
    pub fn new(stream_type: StreamType, rate: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                stream_type,
                buffer: RwLock::new(StreamBuffer::new(rate)),
            }),
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.shared.stream_type
    }

    pub fn rate(&self) -> u32 {
        self.shared.read().rate
    }

    /// Nominal period derived from the rate
    pub fn dt(&self) -> Duration {
        self.shared.read().dt
    }

    /// Stamp the stream clock; called on `start`
    pub fn set_time_point(&self, time_point: Duration) {
        self.shared.write().time_point = time_point;
    }

    /// Empty the per-tick sample list, keeping `last_sample`
    pub fn clear(&self) {
        self.shared.write().samples.clear();
    }

    /// Append a sample one nominal period after the previous one
    pub fn push_sample(&self, value: T, is_healthy: bool) {
        let mut buffer = self.shared.write();
        let dt = buffer.dt;
        let time_point = buffer.time_point + dt;
        buffer.push(value, is_healthy, time_point, dt);
    }

    /// Append a sample captured at an explicit instant
    ///
    /// `dt` is the elapsed time since the previous sample, saturating at zero when the
    /// instant lies in the past.
    pub fn push_sample_at(&self, value: T, is_healthy: bool, time_point: Duration) {
        let mut buffer = self.shared.write();
        let dt = time_point.saturating_sub(buffer.time_point);
        let time_point = time_point.max(buffer.time_point);
        buffer.push(value, is_healthy, time_point, dt);
    }

    /// Samples produced since the last `clear`
    pub fn get_samples(&self) -> Vec<Sample<T>> {
        self.shared.read().samples.clone()
    }

    /// Most recent sample; unhealthy default before the first push
    pub fn get_last_sample(&self) -> Sample<T> {
        self.shared.read().last_sample.clone()
    }

    /// Read-only handle for consumers
    pub fn reader(&self) -> StreamReader<T> {
        StreamReader {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Type-erased handle for the stream registry
    pub fn erase(&self) -> AnyStream {
        AnyStream {
            inner: Arc::clone(&self.shared) as Arc<dyn ErasedStream>,
        }
    }
}

impl<T: StreamValue> fmt::Debug for OutputStream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let buffer = self.shared.read();
        f.debug_struct("OutputStream")
            .field("stream_type", &self.shared.stream_type)
            .field("rate", &buffer.rate)
            .field("pending", &buffer.samples.len())
            .field("last_idx", &buffer.last_sample.sample_idx)
            .finish()
    }
}

/// Consumer side of a stream
pub struct StreamReader<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for StreamReader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: StreamValue> StreamReader<T> {
    pub fn stream_type(&self) -> StreamType {
        self.shared.stream_type
    }

    pub fn rate(&self) -> u32 {
        self.shared.read().rate
    }

    pub fn get_samples(&self) -> Vec<Sample<T>> {
        self.shared.read().samples.clone()
    }

    pub fn get_last_sample(&self) -> Sample<T> {
        self.shared.read().last_sample.clone()
    }

    /// Visit, in order, every sample newer than `after`.
    ///
    /// When the per-tick list no longer holds anything newer (the producer cleared before
    /// this consumer looked) but `last_sample` is, the last sample is visited instead so a
    /// late subscriber sees steady state immediately.
    pub fn for_each_after(&self, after: u32, mut f: impl FnMut(&Sample<T>)) -> usize {
        let buffer = self.shared.read();
        let mut visited = 0;
        for sample in buffer.samples.iter().filter(|s| s.sample_idx > after) {
            f(sample);
            visited += 1;
        }
        if visited == 0 && buffer.last_sample.sample_idx > after {
            f(&buffer.last_sample);
            visited = 1;
        }
        visited
    }

    /// Same underlying buffer
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

/// Type-independent view of a stream used by the registry and introspection
pub(crate) trait ErasedStream: Send + Sync {
    fn stream_type(&self) -> StreamType;
    fn rate(&self) -> u32;
    fn last_sample_idx(&self) -> u32;
    fn set_time_point(&self, time_point: Duration);
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

impl<T: StreamValue> ErasedStream for Shared<T> {
    fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    fn rate(&self) -> u32 {
        self.read().rate
    }

    fn last_sample_idx(&self) -> u32 {
        self.read().last_sample.sample_idx
    }

    fn set_time_point(&self, time_point: Duration) {
        self.write().time_point = time_point;
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// Type-erased, cheaply cloneable stream handle
#[derive(Clone)]
pub struct AnyStream {
    inner: Arc<dyn ErasedStream>,
}

impl AnyStream {
    pub fn stream_type(&self) -> StreamType {
        self.inner.stream_type()
    }

    pub fn rate(&self) -> u32 {
        self.inner.rate()
    }

    pub fn last_sample_idx(&self) -> u32 {
        self.inner.last_sample_idx()
    }

    /// Stamp the stream clock without knowing the value type
    pub fn set_time_point(&self, time_point: Duration) {
        self.inner.set_time_point(time_point);
    }

    /// Recover a typed reader; `None` when `T` is not the stream's value type
    pub fn downcast<T: StreamValue>(&self) -> Option<StreamReader<T>> {
        Arc::clone(&self.inner)
            .as_any()
            .downcast::<Shared<T>>()
            .ok()
            .map(|shared| StreamReader { shared })
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for AnyStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyStream")
            .field("stream_type", &self.stream_type())
            .field("rate", &self.rate())
            .field("last_idx", &self.last_sample_idx())
            .finish()
    }
}
