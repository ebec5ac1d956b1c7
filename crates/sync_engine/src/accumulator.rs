//! Multi-rate sample accumulator.
//!
//! Aligns N upstream streams into tuples of "current" samples. Input 0 is the reference:
//! the node callback runs once per new reference sample, and every other input is advanced
//! to the latest sample captured at or before the reference instant. On the last reference
//! sample of a tick the remaining inputs are drained to their newest sample, so a slower
//! input is held (never interpolated) and a faster one is down-sampled by taking the latest.
//!
//! Buffering is bounded per input: pending samples live in a ring buffer sized from the
//! upstream/desired rate ratio, and overflow evicts the oldest.

use std::fmt;
use std::ops::Deref;
use std::time::Duration;

use contracts::{GraphError, Sample, StreamPath, StreamType, StreamValue};
use ringbuf::{traits::*, HeapRb};
use tracing::{debug, info, warn};

use crate::node::InputInfo;
use crate::registry::StreamRegistry;
use crate::stream::StreamReader;

const MIN_PENDING: usize = 4;
const MAX_PENDING: usize = 1024;

/// Sample as seen by a node callback
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedSample<T> {
    pub sample: Sample<T>,

    /// No new sample was consumed for this invocation; `sample` is the held value
    pub carried_forward: bool,
}

impl<T: StreamValue> AlignedSample<T> {
    /// Slot content before anything was received: default value, unhealthy
    fn never_received() -> Self {
        Self {
            sample: Sample::default(),
            carried_forward: true,
        }
    }
}

impl<T> Deref for AlignedSample<T> {
    type Target = Sample<T>;

    fn deref(&self) -> &Self::Target {
        &self.sample
    }
}

/// One declared input of a node
pub struct InputSlot<T> {
    stream_type: StreamType,
    desired_rate: u32,
    path: Option<StreamPath>,
    reader: Option<StreamReader<T>>,
    pending: HeapRb<Sample<T>>,
    current: AlignedSample<T>,
    last_seen_idx: u32,
}

impl<T: StreamValue> InputSlot<T> {
    pub fn new(stream_type: StreamType, desired_rate: u32) -> Self {
        Self {
            stream_type,
            desired_rate,
            path: None,
            reader: None,
            pending: HeapRb::new(MIN_PENDING),
            current: AlignedSample::never_received(),
            last_seen_idx: 0,
        }
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn desired_rate(&self) -> u32 {
        self.desired_rate
    }

    pub fn path(&self) -> Option<&StreamPath> {
        self.path.as_ref()
    }

    pub fn is_resolved(&self) -> bool {
        self.reader.is_some()
    }

    /// Current aligned sample
    pub fn current(&self) -> &AlignedSample<T> {
        &self.current
    }

    /// Point this input at `path`.
    ///
    /// An unresolved path is still recorded and retried on every rewire; the error is
    /// returned so the caller can report the deferral. Type mismatches are rejected and
    /// leave the previous wiring untouched.
    pub fn set_stream_path(
        &mut self,
        path: &StreamPath,
        registry: &StreamRegistry,
    ) -> Result<(), GraphError> {
        match registry.resolve::<T>(path, self.stream_type) {
            Ok(reader) => {
                let unchanged = self.reader.as_ref().is_some_and(|r| r.ptr_eq(&reader));
                self.path = Some(path.clone());
                // Re-setting the same stream keeps the read position
                if !unchanged {
                    self.attach(reader);
                }
                debug!(path = %path, "Input path resolved");
                Ok(())
            }
            Err(err) if err.is_deferrable() => {
                self.path = Some(path.clone());
                self.reader = None;
                warn!(path = %path, "Input path unresolved, deferred until rewire");
                observability::record_path_transition(path.as_str(), false);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Disconnect; the slot keeps holding its last sample
    pub fn clear_stream_path(&mut self) {
        self.path = None;
        self.reader = None;
    }

    /// Re-resolve the recorded path. Returns whether the input is resolved afterwards.
    ///
    /// Logs only on state transitions.
    pub fn rewire(&mut self, registry: &StreamRegistry) -> bool {
        let Some(path) = self.path.clone() else {
            return false;
        };
        let was_resolved = self.is_resolved();

        match registry.resolve::<T>(&path, self.stream_type) {
            Ok(reader) => {
                let unchanged = self.reader.as_ref().is_some_and(|r| r.ptr_eq(&reader));
                if !unchanged {
                    self.attach(reader);
                }
                if !was_resolved {
                    info!(path = %path, "Input path resolved on rewire");
                    observability::record_path_transition(path.as_str(), true);
                }
                true
            }
            Err(err) => {
                self.reader = None;
                if was_resolved {
                    warn!(path = %path, error = %err, "Input path lost, holding last sample");
                    observability::record_path_transition(path.as_str(), false);
                }
                false
            }
        }
    }

    fn attach(&mut self, reader: StreamReader<T>) {
        let ratio = reader.rate().div_ceil(self.desired_rate.max(1)) as usize;
        self.pending = HeapRb::new((ratio * 2 + 2).clamp(MIN_PENDING, MAX_PENDING));
        self.reader = Some(reader);
        self.last_seen_idx = 0;
    }

    /// Move every upstream sample not seen yet into the pending buffer
    fn poll(&mut self) {
        let Some(reader) = &self.reader else {
            return;
        };

        let after = self.last_seen_idx;
        let pending = &mut self.pending;
        let last_seen = &mut self.last_seen_idx;
        let mut dropped = 0u64;
        reader.for_each_after(after, |sample| {
            if pending.push_overwrite(sample.clone()).is_some() {
                dropped += 1;
            }
            *last_seen = sample.sample_idx;
        });

        if dropped > 0 {
            if let Some(path) = &self.path {
                observability::record_samples_dropped(path.as_str(), dropped);
            }
        }
    }

    /// Consume the next pending sample as the reference; returns its instant
    fn next_reference(&mut self) -> Option<Duration> {
        let sample = self.pending.try_pop()?;
        let time_point = sample.time_point;
        self.current = AlignedSample {
            sample,
            carried_forward: false,
        };
        Some(time_point)
    }

    fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Align a non-reference input to the reference instant
    fn align(&mut self, time_point: Duration, drain: bool) {
        let mut latest = None;
        if drain {
            latest = self.pending.pop_iter().last();
        } else {
            while self
                .pending
                .try_peek()
                .is_some_and(|sample| sample.time_point <= time_point)
            {
                latest = self.pending.try_pop();
            }
        }

        match latest {
            Some(sample) => {
                self.current = AlignedSample {
                    sample,
                    carried_forward: false,
                }
            }
            None => self.current.carried_forward = true,
        }
    }

    fn info(&self, name: &str) -> InputInfo {
        InputInfo {
            name: name.to_string(),
            stream_type: self.stream_type,
            rate: self.desired_rate,
            path: self.path.clone(),
            resolved: self.is_resolved(),
        }
    }
}

impl<T: StreamValue> fmt::Debug for InputSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputSlot")
            .field("stream_type", &self.stream_type)
            .field("desired_rate", &self.desired_rate)
            .field("path", &self.path)
            .field("resolved", &self.is_resolved())
            .field("pending", &self.pending.occupied_len())
            .finish()
    }
}

/// Wiring operations shared by every input regardless of value type
pub trait ErasedInput: Send {
    fn stream_type(&self) -> StreamType;
    fn desired_rate(&self) -> u32;
    fn path(&self) -> Option<&StreamPath>;
    fn is_resolved(&self) -> bool;
    fn set_stream_path(
        &mut self,
        path: &StreamPath,
        registry: &StreamRegistry,
    ) -> Result<(), GraphError>;
    fn rewire(&mut self, registry: &StreamRegistry) -> bool;
    fn info(&self, name: &str) -> InputInfo;
}

impl<T: StreamValue> ErasedInput for InputSlot<T> {
    fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    fn desired_rate(&self) -> u32 {
        self.desired_rate
    }

    fn path(&self) -> Option<&StreamPath> {
        self.path.as_ref()
    }

    fn is_resolved(&self) -> bool {
        self.reader.is_some()
    }

    fn set_stream_path(
        &mut self,
        path: &StreamPath,
        registry: &StreamRegistry,
    ) -> Result<(), GraphError> {
        InputSlot::set_stream_path(self, path, registry)
    }

    fn rewire(&mut self, registry: &StreamRegistry) -> bool {
        InputSlot::rewire(self, registry)
    }

    fn info(&self, name: &str) -> InputInfo {
        InputSlot::info(self, name)
    }
}

/// Indexed access to a fixed set of inputs
pub trait InputSlots: Send {
    fn len(&self) -> usize;
    fn get(&self, index: usize) -> Option<&dyn ErasedInput>;
    fn get_mut(&mut self, index: usize) -> Option<&mut dyn ErasedInput>;
    fn poll_all(&mut self);

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-node input alignment engine
pub struct SampleAccumulator<S> {
    owner: &'static str,
    slots: S,
}

impl<S: InputSlots> SampleAccumulator<S> {
    /// `owner` names the node type in errors
    pub fn new(owner: &'static str, slots: S) -> Self {
        Self { owner, slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn input(&self, index: usize) -> Option<&dyn ErasedInput> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    pub fn slots_mut(&mut self) -> &mut S {
        &mut self.slots
    }

    /// Wire input `index` to `path`; see [`InputSlot::set_stream_path`]
    pub fn set_stream_path(
        &mut self,
        index: usize,
        path: &StreamPath,
        registry: &StreamRegistry,
    ) -> Result<(), GraphError> {
        let count = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or_else(|| GraphError::InputIndexOutOfRange {
                node: self.owner.to_string(),
                index,
                count,
            })?;
        slot.set_stream_path(path, registry)
    }

    /// Re-resolve every wired input; returns how many remain unresolved
    pub fn rewire(&mut self, registry: &StreamRegistry) -> usize {
        let mut unresolved = 0;
        for index in 0..self.slots.len() {
            if let Some(slot) = self.slots.get_mut(index) {
                if slot.path().is_some() && !slot.rewire(registry) {
                    unresolved += 1;
                }
            }
        }
        unresolved
    }

    /// Wired inputs that currently have no stream
    pub fn unresolved(&self) -> usize {
        (0..self.slots.len())
            .filter_map(|index| self.slots.get(index))
            .filter(|slot| slot.path().is_some() && !slot.is_resolved())
            .count()
    }

    /// Introspection records, `names` indexed like the inputs
    pub fn input_infos(&self, names: &[&str]) -> Vec<InputInfo> {
        (0..self.slots.len())
            .filter_map(|index| {
                let name = names.get(index).copied().unwrap_or("input");
                self.slots.get(index).map(|slot| slot.info(name))
            })
            .collect()
    }
}

impl<S: InputSlots> fmt::Debug for SampleAccumulator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleAccumulator")
            .field("owner", &self.owner)
            .field("inputs", &self.slots.len())
            .field("unresolved", &self.unresolved())
            .finish()
    }
}

macro_rules! impl_aligned_inputs {
    ($count:expr; $R:ident $(, ($idx:tt, $T:ident))*) => {
        impl<$R: StreamValue $(, $T: StreamValue)*> InputSlots for (InputSlot<$R>, $(InputSlot<$T>,)*) {
            fn len(&self) -> usize {
                $count
            }

            fn get(&self, index: usize) -> Option<&dyn ErasedInput> {
                match index {
                    0 => Some(&self.0),
                    $($idx => Some(&self.$idx),)*
                    _ => None,
                }
            }

            fn get_mut(&mut self, index: usize) -> Option<&mut dyn ErasedInput> {
                match index {
                    0 => Some(&mut self.0),
                    $($idx => Some(&mut self.$idx),)*
                    _ => None,
                }
            }

            fn poll_all(&mut self) {
                self.0.poll();
                $(self.$idx.poll();)*
            }
        }

        impl<$R: StreamValue $(, $T: StreamValue)*> SampleAccumulator<(InputSlot<$R>, $(InputSlot<$T>,)*)> {
            /// Drain upstream streams and invoke `callback` once per new reference sample.
            ///
            /// Returns the number of invocations; zero when the reference produced nothing.
            #[allow(unused_variables)]
            pub fn process<F>(&mut self, mut callback: F) -> usize
            where
                F: FnMut(usize, (&AlignedSample<$R>, $(&AlignedSample<$T>,)*)),
            {
                self.slots.poll_all();

                let mut invocations = 0;
                while let Some(time_point) = self.slots.0.next_reference() {
                    let drain = !self.slots.0.has_pending();
                    $(self.slots.$idx.align(time_point, drain);)*
                    callback(
                        invocations,
                        (&self.slots.0.current, $(&self.slots.$idx.current,)*),
                    );
                    invocations += 1;
                }
                invocations
            }
        }
    };
}

impl_aligned_inputs!(1; A);
impl_aligned_inputs!(2; A, (1, B));
impl_aligned_inputs!(3; A, (1, B), (2, C));
impl_aligned_inputs!(4; A, (1, B), (2, C), (3, D));

impl<T: StreamValue> InputSlots for Vec<InputSlot<T>> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, index: usize) -> Option<&dyn ErasedInput> {
        self.as_slice()
            .get(index)
            .map(|slot| slot as &dyn ErasedInput)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut dyn ErasedInput> {
        self.as_mut_slice()
            .get_mut(index)
            .map(|slot| slot as &mut dyn ErasedInput)
    }

    fn poll_all(&mut self) {
        self.iter_mut().for_each(InputSlot::poll);
    }
}

impl<T: StreamValue> SampleAccumulator<Vec<InputSlot<T>>> {
    /// Each input is its own reference: `callback(input_index, sample)` runs once per new
    /// sample of every input, inputs visited in index order.
    pub fn process_each<F>(&mut self, mut callback: F) -> usize
    where
        F: FnMut(usize, &AlignedSample<T>),
    {
        self.slots.poll_all();

        let mut invocations = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            while slot.next_reference().is_some() {
                callback(index, &slot.current);
                invocations += 1;
            }
        }
        invocations
    }
}
