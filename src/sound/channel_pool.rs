//! Playback channel pool
//!
//! A fixed number of hardware channels shared by every sound instance. The
//! channel ids are allocated from the device on first use and then only ever
//! move between two disjoint sets: available and in use.
//!
//! Reservation never waits. If the available set is empty the caller gets
//! `ChannelExhausted` immediately.

use parking_lot::Mutex;

use super::device::{AudioDevice, ChannelId};
use super::error::{AudioError, AudioResult};

/// Default number of simultaneous playback channels
pub const MAX_CHANNELS: usize = 30;

/// The available/in-use split of the pool's channel ids
#[derive(Debug, Default)]
struct Partition {
    available: Vec<ChannelId>,
    in_use: Vec<ChannelId>,
}

/// Fixed-capacity pool of device channels
#[derive(Debug)]
pub struct ChannelPool {
    capacity: usize,
    /// `None` until the first reservation allocates the channels
    partition: Mutex<Option<Partition>>,
}

impl ChannelPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            partition: Mutex::new(None),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns true once the device channels have been allocated
    pub fn is_initialized(&self) -> bool {
        self.partition.lock().is_some()
    }

    /// Take one channel out of the available set.
    ///
    /// The first call allocates all channels from `device`.
    pub fn reserve(&self, device: &dyn AudioDevice) -> AudioResult<ChannelId> {
        let mut guard = self.partition.lock();

        if guard.is_none() {
            let available = device.gen_channels(self.capacity)?;
            log::info!(
                "allocated {} playback channels on {} device",
                available.len(),
                device.name()
            );
            *guard = Some(Partition {
                available,
                in_use: Vec::with_capacity(self.capacity),
            });
        }

        let partition = guard.get_or_insert_with(Partition::default);
        let channel = match partition.available.pop() {
            Some(channel) => channel,
            None => {
                log::warn!("no available playback channels ({} in use)", partition.in_use.len());
                return Err(AudioError::ChannelExhausted {
                    capacity: self.capacity,
                });
            }
        };
        partition.in_use.push(channel);

        log::debug!("reserved channel {}", channel);
        Ok(channel)
    }

    /// Return a channel to the available set.
    ///
    /// Recycling a channel that is not in use is a caller bug; it is logged
    /// and otherwise ignored so the partition stays intact.
    pub fn recycle(&self, channel: ChannelId) {
        let mut guard = self.partition.lock();
        let Some(partition) = guard.as_mut() else {
            log::warn!("recycle of channel {} before the pool was initialized", channel);
            return;
        };

        match partition.in_use.iter().position(|&c| c == channel) {
            Some(index) => {
                partition.in_use.swap_remove(index);
                partition.available.push(channel);
                log::debug!("recycled channel {}", channel);
            }
            None => log::warn!("recycle of channel {} which is not in use", channel),
        }
    }

    /// Recycle whatever channel `slot` holds and clear it
    pub fn release(&self, slot: &mut Option<ChannelId>) {
        if let Some(channel) = slot.take() {
            self.recycle(channel);
        }
    }

    pub fn available_count(&self) -> usize {
        match self.partition.lock().as_ref() {
            Some(partition) => partition.available.len(),
            None => self.capacity,
        }
    }

    pub fn in_use_count(&self) -> usize {
        self.partition.lock().as_ref().map_or(0, |p| p.in_use.len())
    }

    pub fn is_in_use(&self, channel: ChannelId) -> bool {
        self.partition
            .lock()
            .as_ref()
            .is_some_and(|p| p.in_use.contains(&channel))
    }

    /// Copies of both sets, for diagnostics
    ///
    /// Channel ids only exist once the first reservation has allocated them,
    /// so both sets are empty before that even though `available_count`
    /// already reports the full capacity.
    pub fn snapshot(&self) -> (Vec<ChannelId>, Vec<ChannelId>) {
        match self.partition.lock().as_ref() {
            Some(partition) => (partition.available.clone(), partition.in_use.clone()),
            None => (Vec::new(), Vec::new()),
        }
    }
}

impl Default for ChannelPool {
    fn default() -> Self {
        Self::new(MAX_CHANNELS)
    }
}
