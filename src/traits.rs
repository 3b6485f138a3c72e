//! The two seams of the cache.
//!
//! A [ResourceFile] is the archive: it knows which resources exist, how big they are on disk, and how to copy their
//! bytes out.  A [ResourceLoader] knows one family of formats: it decides how big a resource will be once loaded and
//! turns the raw bytes into whatever the rest of the program wants to read back out of the handle.
use std::io::Error;

use crate::{LoadError, Resource, ResourceHandle};

/// The archive a cache loads from.
pub trait ResourceFile: Send + 'static {
    /// Open the archive.  Called exactly once, by [ResourceCache::init](crate::ResourceCache::init).
    fn open(&mut self) -> Result<(), Error>;

    /// Size of the resource as stored, or `None` if the archive doesn't have it.
    fn raw_resource_size(&self, resource: &Resource) -> Option<u64>;

    /// Copy the raw bytes of `resource` into the front of `dest`, returning how many bytes were written.
    ///
    /// `dest` is always at least [raw_resource_size](Self::raw_resource_size) bytes long.
    fn load_resource(&mut self, resource: &Resource, dest: &mut [u8]) -> Result<usize, Error>;

    /// Number of resources in the archive.
    fn resource_count(&self) -> usize;

    /// Name of the resource at `index`, in the archive's own enumeration order.
    fn resource_name(&self, index: usize) -> Option<String>;

    /// Iterate over every resource name in enumeration order.
    fn resource_names(&self) -> Box<dyn Iterator<Item = String> + '_> {
        Box::new((0..self.resource_count()).filter_map(move |i| self.resource_name(i)))
    }
}

/// A strategy for turning raw archive bytes into a loaded [ResourceHandle].
///
/// Loaders are picked per miss: the cache tries the most recently registered loader first and uses the first whose
/// [pattern](Self::pattern) matches the resource name.
pub trait ResourceLoader: Send + Sync {
    /// Glob of the resource names this loader handles, e.g. `*.model` or `*`.
    fn pattern(&self) -> &str;

    /// If true, the raw bytes become the handle's buffer as-is and the loader is never asked to populate the handle.
    fn use_raw_file(&self) -> bool;

    /// If false, a transforming loader's raw bytes are kept on the handle (see [ResourceHandle::raw]) and count
    /// against the budget alongside the loaded buffer.
    fn discard_raw_buffer_after_load(&self) -> bool;

    /// Terminate the raw bytes with a single `0` byte, for text-like payloads.
    fn append_null(&self) -> bool {
        false
    }

    /// Size in bytes of the loaded buffer this loader will produce from `raw`.
    ///
    /// Only called when [use_raw_file](Self::use_raw_file) is false.  `raw` ends with the `0` byte when
    /// [append_null](Self::append_null) is set.
    fn loaded_resource_size(&self, raw: &[u8]) -> Result<u64, LoadError>;

    /// Populate `handle` from `raw`.
    ///
    /// The handle's buffer has already been allocated at the size [loaded_resource_size](Self::loaded_resource_size)
    /// returned and zeroed.  Returning an error discards the handle and fails the request.
    fn load_resource(&self, raw: &[u8], handle: &mut ResourceHandle) -> Result<(), LoadError>;
}
