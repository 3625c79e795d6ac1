//! Decoded-audio cache
//!
//! Maps a logical sound name to its decoded [`AudioBuffer`] and the device
//! buffer it was uploaded to. Every instance of the same name shares one entry.
//!
//! Lookups take a read lock only. A miss takes the load lock, checks again,
//! and only then decodes, so two threads racing on the same first request
//! still produce a single entry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::buffer::AudioBuffer;
use super::device::{AudioDevice, BufferHandle};
use super::error::{AudioError, AudioResult};
use super::wav::WavDecoder;
use crate::resource::loader::AssetSource;

/// One cache entry: decoded samples plus their device-resident copy
#[derive(Debug)]
pub struct CachedSound {
    buffer: Arc<AudioBuffer>,
    handle: BufferHandle,
}

impl CachedSound {
    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }

    pub fn handle(&self) -> BufferHandle {
        self.handle
    }
}

/// Cache key for a requested name: its last `/` segment
pub fn cache_key(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}

/// Memoizing decoder in front of an [`AssetSource`]
#[derive(Debug, Default)]
pub struct SoundCache {
    entries: RwLock<HashMap<String, Arc<CachedSound>>>,
    /// Serializes decode + upload for cache misses
    load_lock: Mutex<()>,
}

impl SoundCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `name`, decoding and uploading it on first use
    pub fn resolve(
        &self,
        name: &str,
        assets: &dyn AssetSource,
        device: &dyn AudioDevice,
    ) -> AudioResult<Arc<CachedSound>> {
        let key = cache_key(name);
        if let Some(entry) = self.get(key) {
            return Ok(entry);
        }

        let _loading = self.load_lock.lock();
        if let Some(entry) = self.get(key) {
            return Ok(entry);
        }

        log::debug!("cache miss for '{}', decoding", name);
        let reader = assets.open(name).map_err(|source| AudioError::AssetLoadFailed {
            name: name.to_string(),
            source,
        })?;
        let buffer = WavDecoder::new().decode(reader, key)?;
        let handle = device.create_data_buffer(buffer.data(), buffer.format(), buffer.sample_rate())?;

        log::debug!(
            "cached '{}': {:?} {} Hz, {} samples",
            key,
            buffer.format(),
            buffer.sample_rate(),
            buffer.sample_count()
        );
        let entry = Arc::new(CachedSound {
            buffer: Arc::new(buffer),
            handle,
        });
        self.entries.write().insert(key.to_string(), Arc::clone(&entry));
        Ok(entry)
    }

    /// Look up an entry without loading it
    pub fn get(&self, name: &str) -> Option<Arc<CachedSound>> {
        self.entries.read().get(cache_key(name)).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(cache_key(name))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Drop every entry and destroy its device buffer.
    ///
    /// Instances still holding an entry keep their decoded data alive, but
    /// the device buffer is gone, so only call this once nothing plays.
    pub fn clear(&self, device: &dyn AudioDevice) {
        let drained: Vec<(String, Arc<CachedSound>)> = self.entries.write().drain().collect();
        for (name, entry) in drained {
            if let Err(e) = device.destroy_data_buffer(entry.handle) {
                log::warn!("failed to destroy buffer for '{}': {}", name, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::loader::MemoryAssets;
    use crate::sound::decoder::DecodeError;
    use crate::sound::null::NullDevice;
    use crate::sound::wav::test_support::pcm_wav;
    use std::thread;

    #[test]
    fn test_cache_key() {
        assert_eq!(cache_key("sfx/weapons/laser"), "laser");
        assert_eq!(cache_key("laser"), "laser");
        assert_eq!(cache_key("dir/"), "");
    }

    #[test]
    fn test_resolve_decodes_once() {
        let device = NullDevice::new();
        let assets = MemoryAssets::new().with("sfx/beep", pcm_wav(1, 8000, 16, 4000));
        let cache = SoundCache::new();

        let first = cache.resolve("sfx/beep", &assets, &device).unwrap();
        let second = cache.resolve("sfx/beep", &assets, &device).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(first.buffer(), second.buffer()));
        assert_eq!(device.buffer_count(), 1);
        assert_eq!(first.buffer().sample_count(), 2000);
        assert_eq!(first.buffer().name(), "beep");
        assert!(cache.contains("beep"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_resolve_keys_by_last_segment() {
        let device = NullDevice::new();
        let assets = MemoryAssets::new().with("a/click", pcm_wav(1, 8000, 8, 100));
        let cache = SoundCache::new();

        let first = cache.resolve("a/click", &assets, &device).unwrap();
        // a different directory with the same final segment hits the same entry
        let second = cache.resolve("b/click", &assets, &device).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_missing_asset_is_not_cached() {
        let device = NullDevice::new();
        let assets = MemoryAssets::new();
        let cache = SoundCache::new();

        let err = cache.resolve("nope", &assets, &device).unwrap_err();
        assert!(matches!(err, AudioError::AssetLoadFailed { ref name, .. } if name == "nope"));
        assert!(cache.is_empty());
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_decode_error_is_not_cached() {
        let device = NullDevice::new();
        let assets = MemoryAssets::new().with("bad", b"RIFX\0\0\0\0WAVE".to_vec());
        let cache = SoundCache::new();

        let err = cache.resolve("bad", &assets, &device).unwrap_err();
        assert!(matches!(err, AudioError::Decode(DecodeError::MalformedContainer(_))));
        assert!(!cache.contains("bad"));
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_clear_destroys_device_buffers() {
        let device = NullDevice::new();
        let assets = MemoryAssets::new()
            .with("one", pcm_wav(1, 8000, 16, 64))
            .with("two", pcm_wav(2, 22050, 16, 64));
        let cache = SoundCache::new();
        cache.resolve("one", &assets, &device).unwrap();
        cache.resolve("two", &assets, &device).unwrap();
        assert_eq!(device.buffer_count(), 2);

        cache.clear(&device);
        assert!(cache.is_empty());
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_concurrent_first_resolve_single_entry() {
        let device = Arc::new(NullDevice::new());
        let assets = Arc::new(MemoryAssets::new().with("shared", pcm_wav(1, 8000, 16, 800)));
        let cache = Arc::new(SoundCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let device = Arc::clone(&device);
                let assets = Arc::clone(&assets);
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    cache
                        .resolve("shared", assets.as_ref(), device.as_ref())
                        .unwrap()
                        .handle()
                })
            })
            .collect();

        let handles: Vec<BufferHandle> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(handles.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len(), 1);
        assert_eq!(device.buffer_count(), 1);
    }
}
