//! The [ResourceCache] drives a [ResourceFile] and a set of [ResourceLoader]s, keeping loaded resources resident under
//! a fixed byte budget.
//!
//! On a miss the cache reads the raw bytes, picks a loader, asks it how big the loaded resource will be, evicts least
//! recently used handles until that fits, and has the loader populate a new handle.  On a hit it just promotes the
//! handle to most recently used.
//!
//! Eviction only removes a handle from the index.  Its bytes stay charged against the budget until the last
//! `Arc<ResourceHandle>` goes away, so callers holding handles can shrink how much the cache is able to load.
use std::collections::VecDeque;
use std::io::{Error as IoError, ErrorKind};
use std::ops::ControlFlow;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

use crate::handle::Accounting;
use crate::lru_index::LruIndex;
use crate::*;

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Clone, Debug, derive_builder::Builder)]
pub struct ResourceCacheConfig {
    /// Maximum total charge, in bytes, of the handles the cache keeps resident.
    pub budget_bytes: u64,
}

impl ResourceCacheConfigBuilder {
    /// Set the budget in megabytes rather than bytes.
    pub fn budget_mb(&mut self, megabytes: u64) -> &mut Self {
        self.budget_bytes = Some(megabytes.saturating_mul(BYTES_PER_MB));
        self
    }
}

impl ResourceCacheConfig {
    pub fn from_megabytes(megabytes: u64) -> ResourceCacheConfig {
        ResourceCacheConfig {
            budget_bytes: megabytes.saturating_mul(BYTES_PER_MB),
        }
    }
}

/// Where a cache is in its lifecycle.
///
/// Caches start out `Uninitialized`, become `Ready` when [ResourceCache::init] opens the archive, and end up `Closed`
/// after [ResourceCache::close].  A failed `init` leaves the cache `Failed` for good.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CacheState {
    Uninitialized,
    Ready,
    Failed,
    Closed,
}

/// Reported to the preload callback after each matching resource.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PreloadProgress {
    /// Archive entries examined so far, matching or not.
    pub processed: usize,
    /// Entries in the archive.
    pub total: usize,
    pub percent: u32,
}

struct Inner<F> {
    state: CacheState,
    file: F,
    /// Most recently registered first.
    loaders: VecDeque<Arc<dyn ResourceLoader>>,
    /// Indexed handles, costed by their charge.
    lru: LruIndex<Resource, Arc<ResourceHandle>>,
}

impl<F> Inner<F> {
    fn find_loader(&self, resource: &Resource) -> Option<Arc<dyn ResourceLoader>> {
        self.loaders
            .iter()
            .find(|l| resource.matches(l.pattern()))
            .cloned()
    }
}

pub struct ResourceCache<F: ResourceFile> {
    config: ResourceCacheConfig,
    accounting: Arc<Accounting>,
    inner: Mutex<Inner<F>>,
}

impl<F: ResourceFile> ResourceCache<F> {
    /// Build a cache over `file` with a budget of `budget_mb` megabytes.  The archive isn't opened until
    /// [init](Self::init).
    pub fn new(budget_mb: u64, file: F) -> ResourceCache<F> {
        ResourceCache::with_config(ResourceCacheConfig::from_megabytes(budget_mb), file)
    }

    pub fn with_config(config: ResourceCacheConfig, file: F) -> ResourceCache<F> {
        ResourceCache {
            config,
            accounting: Arc::new(Accounting::default()),
            inner: Mutex::new(Inner {
                state: CacheState::Uninitialized,
                file,
                loaders: VecDeque::new(),
                lru: LruIndex::new(),
            }),
        }
    }

    pub fn state(&self) -> CacheState {
        self.inner.lock().state
    }

    /// Lock the cache, failing if it isn't ready for use.
    fn lock_ready(&self) -> CacheResult<MutexGuard<'_, Inner<F>>> {
        let inner = self.inner.lock();
        if inner.state != CacheState::Ready {
            return Err(CacheError::NotReady(inner.state));
        }
        Ok(inner)
    }

    /// Open the archive.  Must succeed before anything else is done with the cache.
    pub fn init(&self) -> CacheResult<()> {
        let mut inner = self.inner.lock();
        if inner.state != CacheState::Uninitialized {
            return Err(CacheError::NotReady(inner.state));
        }

        if let Err(e) = inner.file.open() {
            inner.state = CacheState::Failed;
            tracing::warn!(error = %e, "Could not open the resource archive");
            return Err(CacheError::ArchiveUnavailable(e));
        }

        inner.state = CacheState::Ready;
        tracing::info!(
            budget_bytes = self.config.budget_bytes,
            resources = inner.file.resource_count(),
            "Resource cache ready"
        );
        Ok(())
    }

    /// Release every indexed handle and refuse further use.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        let released = inner.lru.clear().len();
        inner.state = CacheState::Closed;
        tracing::info!(released, "Resource cache closed");
    }

    /// Add a loader.  It is tried before every loader registered earlier.
    pub fn register_loader<L: ResourceLoader + 'static>(&self, loader: L) -> CacheResult<()> {
        let mut inner = self.lock_ready()?;
        tracing::debug!(pattern = loader.pattern(), "Registered resource loader");
        inner.loaders.push_front(Arc::new(loader));
        Ok(())
    }

    /// Get the handle for `resource`, loading it from the archive if it isn't cached.
    pub fn get_handle(&self, resource: &Resource) -> CacheResult<Arc<ResourceHandle>> {
        let mut inner = self.lock_ready()?;
        self.get_handle_locked(&mut inner, resource)
    }

    fn get_handle_locked(
        &self,
        inner: &mut Inner<F>,
        resource: &Resource,
    ) -> CacheResult<Arc<ResourceHandle>> {
        if let Some(h) = inner.lru.get(resource) {
            tracing::debug!(%resource, "Cache hit");
            return Ok(h.clone());
        }

        tracing::debug!(%resource, "Cache miss");
        self.load(inner, resource).map_err(|e| {
            tracing::warn!(%resource, error = %e, "Failed to load resource");
            e
        })
    }

    /// The miss path: read, size, make room, populate, index.
    fn load(&self, inner: &mut Inner<F>, resource: &Resource) -> CacheResult<Arc<ResourceHandle>> {
        let name = || resource.name().to_string();

        let raw_size = inner
            .file
            .raw_resource_size(resource)
            .ok_or_else(|| CacheError::ResourceNotFound(name()))? as usize;
        let loader = inner
            .find_loader(resource)
            .ok_or_else(|| CacheError::NoLoaderMatched(name()))?;
        tracing::trace!(%resource, pattern = loader.pattern(), "Selected loader");

        let raw_len = raw_size + loader.append_null() as usize;
        let mut raw = vec![0u8; raw_len];
        let written = inner
            .file
            .load_resource(resource, &mut raw[..raw_size])
            .map_err(|source| CacheError::ArchiveRead {
                name: name(),
                source,
            })?;
        if written < raw_size {
            return Err(CacheError::ArchiveRead {
                name: name(),
                source: IoError::new(
                    ErrorKind::UnexpectedEof,
                    format!("archive returned {} of {} bytes", written, raw_size),
                ),
            });
        }

        let parse_failure = |source: LoadError| CacheError::LoaderParseFailure {
            name: name(),
            source,
        };

        if loader.use_raw_file() {
            self.make_room(inner, resource, raw_len as u64)?;
            let handle = ResourceHandle::new(
                resource.clone(),
                raw,
                raw_size,
                Arc::downgrade(&self.accounting),
            );
            return Ok(self.insert(inner, handle));
        }

        let load_size = loader.loaded_resource_size(&raw).map_err(parse_failure)?;
        let keep_raw = !loader.discard_raw_buffer_after_load();
        // Loader sizes come from untrusted headers, so anything unrepresentable is simply too big.
        let charge = load_size
            .checked_add(if keep_raw { raw_len as u64 } else { 0 })
            .unwrap_or(u64::MAX);
        self.make_room(inner, resource, charge)?;

        let mut handle = ResourceHandle::new(
            resource.clone(),
            vec![0u8; load_size as usize],
            load_size as usize,
            Arc::downgrade(&self.accounting),
        );
        // On failure the handle drops here, giving its charge straight back.
        loader
            .load_resource(&raw, &mut handle)
            .map_err(parse_failure)?;
        if keep_raw {
            handle.retain_raw(raw);
        }
        Ok(self.insert(inner, handle))
    }

    fn insert(&self, inner: &mut Inner<F>, handle: ResourceHandle) -> Arc<ResourceHandle> {
        let handle = Arc::new(handle);
        let charge = handle.charge();
        inner
            .lru
            .insert(handle.resource().clone(), handle.clone(), charge);
        tracing::debug!(
            resource = %handle.resource(),
            charge,
            allocated = self.accounting.allocated(),
            "Loaded resource"
        );
        handle
    }

    /// Evict least recently used handles until `needed` more bytes fit in the budget.
    ///
    /// Evicted handles still held elsewhere keep their bytes charged, so this can empty the index and still fail.
    /// Evictions are not undone on failure.
    fn make_room(&self, inner: &mut Inner<F>, resource: &Resource, needed: u64) -> CacheResult<()> {
        let budget = self.config.budget_bytes;
        let out_of_budget = |allocated| CacheError::OutOfBudget {
            name: resource.name().to_string(),
            needed,
            budget,
            allocated,
        };

        // Can never fit, so don't throw anything away trying.
        if needed > budget {
            return Err(out_of_budget(self.accounting.allocated()));
        }

        while self.accounting.allocated().saturating_add(needed) > budget {
            let (evicted, handle) = inner
                .lru
                .pop_lru()
                .ok_or_else(|| out_of_budget(self.accounting.allocated()))?;
            let referenced = Arc::strong_count(&handle) > 1;
            std::mem::drop(handle);
            tracing::debug!(resource = %evicted, referenced, "Evicted resource");
        }
        Ok(())
    }

    /// Load every archive resource matching `pattern`, in archive order, returning how many loaded successfully.
    ///
    /// `progress` is called after each matching resource; returning [ControlFlow::Break] stops the preload there.  The
    /// cache is not locked while the callback runs.  Resources which fail to load are logged and skipped.
    pub fn preload(
        &self,
        pattern: &str,
        mut progress: Option<&mut dyn FnMut(PreloadProgress) -> ControlFlow<()>>,
    ) -> CacheResult<usize> {
        let total = self.lock_ready()?.file.resource_count();
        let mut loaded = 0;

        for i in 0..total {
            {
                // Someone closed the cache while the lock was released; report what got done.
                let mut inner = match self.lock_ready() {
                    Ok(inner) => inner,
                    Err(_) => {
                        tracing::info!(pattern, loaded, "Preload stopped, cache no longer ready");
                        return Ok(loaded);
                    }
                };
                let resource = match inner.file.resource_name(i) {
                    Some(n) => Resource::new(n),
                    None => continue,
                };
                if !resource.matches(pattern) {
                    continue;
                }
                if self.get_handle_locked(&mut inner, &resource).is_ok() {
                    loaded += 1;
                }
            }

            if let Some(cb) = progress.as_deref_mut() {
                let report = PreloadProgress {
                    processed: i + 1,
                    total,
                    percent: ((i + 1) * 100 / total) as u32,
                };
                if cb(report).is_break() {
                    tracing::info!(pattern, loaded, "Preload cancelled");
                    return Ok(loaded);
                }
            }
        }

        tracing::info!(pattern, loaded, "Preload finished");
        Ok(loaded)
    }

    /// Names of the cached resources matching `pattern`, most recently used first.
    pub fn match_cached(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let inner = self.lock_ready()?;
        Ok(inner
            .lru
            .iter()
            .map(|(r, _)| r)
            .filter(|r| r.matches(pattern))
            .map(|r| r.name().to_string())
            .collect())
    }

    /// Evict everything.
    pub fn flush(&self) -> CacheResult<()> {
        let mut inner = self.lock_ready()?;
        let evicted = inner.lru.clear().len();
        tracing::info!(evicted, allocated = self.accounting.allocated(), "Flushed resource cache");
        Ok(())
    }

    /// Evict one resource, returning whether it was cached.
    pub fn remove(&self, resource: &Resource) -> CacheResult<bool> {
        let mut inner = self.lock_ready()?;
        let removed = inner.lru.remove(resource).is_some();
        if removed {
            tracing::debug!(%resource, "Removed resource");
        }
        Ok(removed)
    }

    /// Is `resource` cached?  Doesn't count as a use.
    pub fn contains(&self, resource: &Resource) -> bool {
        self.inner.lock().lru.contains(resource)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().lru.is_empty()
    }

    /// Names of every cached resource, most recently used first.
    pub fn cached_names(&self) -> Vec<String> {
        self.inner
            .lock()
            .lru
            .iter()
            .map(|(r, _)| r.name().to_string())
            .collect()
    }

    /// Bytes charged by every live handle, including evicted ones still held by callers.
    pub fn allocated_bytes(&self) -> u64 {
        self.accounting.allocated()
    }

    /// Bytes charged by the handles currently in the index.
    pub fn indexed_bytes(&self) -> u64 {
        self.inner.lock().lru.cost()
    }

    pub fn budget_bytes(&self) -> u64 {
        self.config.budget_bytes
    }
}

impl<F: ResourceFile> std::fmt::Debug for ResourceCache<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cached = self.inner.try_lock().map(|i| i.lru.len());
        f.debug_struct("ResourceCache")
            .field("budget_bytes", &self.config.budget_bytes)
            .field("allocated_bytes", &self.accounting.allocated())
            .field("cached", &cached)
            .finish_non_exhaustive()
    }
}
