//! A [ResourceHandle] is the cache's resident record of one loaded resource.
//!
//! Handles are shared as `Arc<ResourceHandle>`.  The cache holds one reference while the handle is indexed, and
//! every caller of [ResourceCache::get_handle](crate::ResourceCache::get_handle) holds another.  Evicting a handle only
//! drops the cache's reference; the handle's bytes are given back to the budget by its `Drop` impl, which runs when the
//! last reference goes away.
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use crate::{LoadError, Resource};

/// Bytes currently charged against a cache's budget.
///
/// Shared between the cache (strongly) and its handles (weakly), so that a handle outliving its cache has nothing to
/// report to.
#[derive(Debug, Default)]
pub(crate) struct Accounting {
    allocated: AtomicU64,
}

impl Accounting {
    pub(crate) fn allocated(&self) -> u64 {
        self.allocated.load(Ordering::Acquire)
    }

    fn charge(&self, bytes: u64) {
        self.allocated.fetch_add(bytes, Ordering::AcqRel);
    }

    fn release(&self, bytes: u64) {
        self.allocated.fetch_sub(bytes, Ordering::AcqRel);
    }
}

pub struct ResourceHandle {
    resource: Resource,
    buffer: Vec<u8>,
    /// Logical length of `buffer`, which excludes the terminating `0` of NUL-terminated handles.
    size: usize,
    raw: Option<Vec<u8>>,
    extra: Option<Box<dyn Any + Send + Sync>>,
    /// What this handle added to `accounting`, and so what it gives back on drop.
    charge: u64,
    accounting: Weak<Accounting>,
}

impl ResourceHandle {
    /// Build a handle around `buffer` and immediately charge its full length to `accounting`.
    pub(crate) fn new(
        resource: Resource,
        buffer: Vec<u8>,
        size: usize,
        accounting: Weak<Accounting>,
    ) -> ResourceHandle {
        debug_assert!(size <= buffer.len());
        let charge = buffer.len() as u64;
        if let Some(acc) = accounting.upgrade() {
            acc.charge(charge);
        }

        ResourceHandle {
            resource,
            buffer,
            size,
            raw: None,
            extra: None,
            charge,
            accounting,
        }
    }

    /// Keep the raw archive bytes alongside the loaded buffer, charging them too.
    pub(crate) fn retain_raw(&mut self, raw: Vec<u8>) {
        let bytes = raw.len() as u64;
        if let Some(acc) = self.accounting.upgrade() {
            acc.charge(bytes);
        }
        self.charge += bytes;
        self.raw = Some(raw);
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    /// The loaded bytes.
    pub fn data(&self) -> &[u8] {
        &self.buffer[..self.size]
    }

    /// The loaded bytes including the terminating `0` if the loader asked for one.
    pub fn data_with_nul(&self) -> &[u8] {
        &self.buffer
    }

    /// View the loaded bytes as UTF-8 text.
    pub fn text(&self) -> Result<&str, std::str::Utf8Error> {
        std::str::from_utf8(self.data())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes this handle counts against the cache's budget while it is alive.
    pub fn charge(&self) -> u64 {
        self.charge
    }

    /// The raw archive bytes, if the loader asked to keep them.
    pub fn raw(&self) -> Option<&[u8]> {
        self.raw.as_deref()
    }

    /// Mutable access to the loaded buffer, for loaders filling the handle in.
    pub fn buffer_mut(&mut self) -> &mut [u8] {
        &mut self.buffer[..self.size]
    }

    /// Attach format-specific data.  A handle takes at most one extra.
    pub fn set_extra<T: Any + Send + Sync>(&mut self, extra: T) -> Result<(), LoadError> {
        if self.extra.is_some() {
            return Err(LoadError::ExtraAlreadySet);
        }
        self.extra = Some(Box::new(extra));
        Ok(())
    }

    /// Get the extra data, if there is some and it is a `T`.
    pub fn extra<T: Any>(&self) -> Option<&T> {
        self.extra.as_deref()?.downcast_ref::<T>()
    }

    pub fn has_extra(&self) -> bool {
        self.extra.is_some()
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("resource", &self.resource)
            .field("size", &self.size)
            .field("charge", &self.charge)
            .field("has_raw", &self.raw.is_some())
            .field("has_extra", &self.extra.is_some())
            .finish()
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        // If the cache is gone there is no budget left to give the bytes back to.
        if let Some(acc) = self.accounting.upgrade() {
            acc.release(self.charge);
            tracing::trace!(resource = %self.resource, bytes = self.charge, "Released handle memory");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_charge_and_release() {
        let acc = Arc::new(Accounting::default());
        let mut handle =
            ResourceHandle::new("a.txt".into(), b"abc\0".to_vec(), 3, Arc::downgrade(&acc));
        assert_eq!(acc.allocated(), 4);
        assert_eq!(handle.data(), b"abc");
        assert_eq!(handle.data_with_nul(), b"abc\0");
        assert_eq!(handle.text().unwrap(), "abc");

        handle.retain_raw(vec![1, 2]);
        assert_eq!(handle.charge(), 6);
        assert_eq!(acc.allocated(), 6);

        let shared = Arc::new(handle);
        let other = shared.clone();
        std::mem::drop(shared);
        assert_eq!(acc.allocated(), 6);
        std::mem::drop(other);
        assert_eq!(acc.allocated(), 0);
    }

    #[test]
    fn test_extra_set_once() {
        let mut handle = ResourceHandle::new("a".into(), vec![0; 2], 2, Weak::new());
        assert!(!handle.has_extra());
        handle.set_extra(5u32).unwrap();
        assert!(matches!(
            handle.set_extra(6u32),
            Err(LoadError::ExtraAlreadySet)
        ));
        assert_eq!(handle.extra::<u32>(), Some(&5));
        assert_eq!(handle.extra::<String>(), None);
    }

    #[test]
    fn test_outlives_accounting() {
        let acc = Arc::new(Accounting::default());
        let handle = ResourceHandle::new("a".into(), vec![7; 3], 3, Arc::downgrade(&acc));
        std::mem::drop(acc);
        assert_eq!(handle.data(), &[7, 7, 7]);
        // Dropping with no accounting left must not panic.
        std::mem::drop(handle);
    }
}
