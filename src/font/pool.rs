//! Process-wide shared font pool: one glyph cache per logical font identity,
//! reference-counted with explicit acquire/release.
//!
//! The pool is an explicit service object owned by the rendering subsystem,
//! passed by reference to whoever needs fonts — not ambient global state.
//! Release is an explicit lifecycle step (tied to `DeviceResource::destroy`),
//! never left to drop order.

use std::cell::{RefCell, RefMut};
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::OverlayError;
use crate::gpu::Device;

use super::cache::GlyphCache;
use super::raster::FontBackend;
use super::FontDesc;

struct PoolEntry {
    cache: Rc<RefCell<GlyphCache>>,
    refs: u32,
}

/// Shared ownership of one pool entry's glyph cache.
///
/// Handles are created only by [`FontPool::acquire`] and must be returned
/// through [`FontPool::release`]; dropping one without releasing leaks the
/// reference count on purpose (the pool cannot tell an owner apart from a
/// stale clone).
pub struct FontHandle {
    desc: FontDesc,
    cache: Rc<RefCell<GlyphCache>>,
}

impl FontHandle {
    pub fn desc(&self) -> &FontDesc {
        &self.desc
    }

    /// Borrow the shared cache mutably for lazy fills and lookups.
    /// Single-threaded by contract, so the borrow never contends.
    pub fn cache(&self) -> RefMut<'_, GlyphCache> {
        self.cache.borrow_mut()
    }

    /// Whether two handles share one underlying cache instance.
    pub fn shares_cache_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cache, &other.cache)
    }
}

/// Registry deduplicating glyph caches by logical font identity.
pub struct FontPool {
    backend: Box<dyn FontBackend>,
    entries: HashMap<FontDesc, PoolEntry>,
}

impl FontPool {
    pub fn new(backend: Box<dyn FontBackend>) -> Self {
        Self {
            backend,
            entries: HashMap::new(),
        }
    }

    /// Resolve a descriptor to its shared cache, creating the entry on the
    /// first acquisition of a never-seen identity.
    pub fn acquire(&mut self, desc: &FontDesc) -> Result<FontHandle, OverlayError> {
        if let Some(entry) = self.entries.get_mut(desc) {
            entry.refs += 1;
            log::debug!(
                "fonts: reusing {:?} {}px ({} refs)",
                desc.family,
                desc.height,
                entry.refs,
            );
            return Ok(FontHandle {
                desc: desc.clone(),
                cache: Rc::clone(&entry.cache),
            });
        }

        let raster = self.backend.open(desc)?;
        let cache = Rc::new(RefCell::new(GlyphCache::new(raster)));
        self.entries.insert(
            desc.clone(),
            PoolEntry {
                cache: Rc::clone(&cache),
                refs: 1,
            },
        );
        log::debug!("fonts: opened {:?} {}px ({} live)", desc.family, desc.height, self.entries.len());
        Ok(FontHandle {
            desc: desc.clone(),
            cache,
        })
    }

    /// Return a handle. The acquisition that brings an entry's count to zero
    /// destroys the cache — GPU textures freed through `dev` — and removes
    /// the entry.
    pub fn release(&mut self, dev: &mut dyn Device, handle: FontHandle) {
        let FontHandle { desc, cache } = handle;
        let Some(entry) = self.entries.get_mut(&desc) else {
            log::warn!("fonts: release of unknown font {:?} {}px", desc.family, desc.height);
            return;
        };
        entry.refs -= 1;
        if entry.refs == 0 {
            self.entries.remove(&desc);
            cache.borrow_mut().destroy(dev);
            log::debug!(
                "fonts: destroyed {:?} {}px ({} live)",
                desc.family,
                desc.height,
                self.entries.len(),
            );
        }
    }

    /// Outstanding references for an identity. Zero when unknown.
    pub fn refs(&self, desc: &FontDesc) -> u32 {
        self.entries.get(desc).map_or(0, |e| e.refs)
    }

    /// Number of live cache instances.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Device loss: drop every cache's GPU entries. Reference counts and
    /// entries survive; caches refill lazily once the device is restored.
    pub fn invalidate(&mut self, dev: &mut dyn Device) {
        for entry in self.entries.values() {
            entry.cache.borrow_mut().invalidate(dev);
        }
    }

    /// Subsystem shutdown: destroy every cache regardless of outstanding
    /// references. Handles left alive afterwards refer to empty caches.
    pub fn destroy(&mut self, dev: &mut dyn Device) {
        for entry in self.entries.values() {
            entry.cache.borrow_mut().destroy(dev);
        }
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontDesc;
    use crate::testutil::{block_pool, RecordingDevice};

    #[test]
    fn identical_identities_share_one_cache() {
        let mut pool = block_pool();
        let a = pool.acquire(&FontDesc::new("Arial", 14, false, false)).expect("a");
        let b = pool.acquire(&FontDesc::new("Arial", 14, false, false)).expect("b");
        assert!(a.shares_cache_with(&b));
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.refs(a.desc()), 2);
    }

    #[test]
    fn distinct_identities_get_distinct_caches() {
        let mut pool = block_pool();
        let a = pool.acquire(&FontDesc::new("Arial", 14, false, false)).expect("a");
        let b = pool.acquire(&FontDesc::new("Arial", 16, false, false)).expect("b");
        let c = pool.acquire(&FontDesc::new("Arial", 14, true, false)).expect("c");
        assert!(!a.shares_cache_with(&b));
        assert!(!a.shares_cache_with(&c));
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn refcount_tracks_outstanding_acquisitions() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut pool = block_pool();
        let desc = FontDesc::regular("Test", 12);

        let a = pool.acquire(&desc).expect("a");
        let b = pool.acquire(&desc).expect("b");
        let c = pool.acquire(&desc).expect("c");
        assert_eq!(pool.refs(&desc), 3);

        pool.release(&mut dev, b);
        assert_eq!(pool.refs(&desc), 2);
        pool.release(&mut dev, a);
        assert_eq!(pool.refs(&desc), 1);
        assert_eq!(pool.len(), 1, "cache survives until the last release");
        pool.release(&mut dev, c);
        assert_eq!(pool.refs(&desc), 0);
        assert!(pool.is_empty());
    }

    #[test]
    fn final_release_frees_gpu_textures() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut pool = block_pool();
        let desc = FontDesc::regular("Test", 12);

        let handle = pool.acquire(&desc).expect("acquire");
        handle.cache().glyph(&mut dev, u16::from(b'A')).expect("glyph");
        handle.cache().glyph(&mut dev, u16::from(b'B')).expect("glyph");
        assert_eq!(dev.live_textures(), 2);

        pool.release(&mut dev, handle);
        assert_eq!(dev.live_textures(), 0);
    }

    #[test]
    fn reacquired_identity_rebuilds_after_full_release() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut pool = block_pool();
        let desc = FontDesc::regular("Test", 12);

        let first = pool.acquire(&desc).expect("first");
        pool.release(&mut dev, first);
        assert!(pool.is_empty());

        let second = pool.acquire(&desc).expect("second");
        assert_eq!(pool.refs(&desc), 1);
        assert!(second.cache().is_empty(), "fresh cache, no stale glyphs");
    }

    #[test]
    fn invalidate_clears_glyphs_but_keeps_entries() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut pool = block_pool();
        let desc = FontDesc::regular("Test", 12);

        let handle = pool.acquire(&desc).expect("acquire");
        handle.cache().glyph(&mut dev, u16::from(b'A')).expect("glyph");
        assert_eq!(dev.live_textures(), 1);

        pool.invalidate(&mut dev);
        assert_eq!(dev.live_textures(), 0);
        assert_eq!(pool.refs(&desc), 1, "references survive device loss");

        // Lazy refill against the restored device.
        handle.cache().glyph(&mut dev, u16::from(b'A')).expect("refill");
        assert_eq!(dev.live_textures(), 1);
    }
}
