//! An in-memory cache for binary assets loaded on demand from an archive.
//!
//! A real-time program wants its textures, models, shader sources and so on resident when it needs them, but can't
//! afford to keep everything loaded.  This crate keeps recently used assets in memory under a fixed byte budget, and
//! throws out the least recently used ones when something new won't fit.  It is built from a few pieces:
//!
//! - A [ResourceFile] is the archive.  It lists resource names and hands out raw bytes.  [MemoryResourceFile] and
//!   [DirectoryResourceFile] are provided.
//! - A [ResourceLoader] turns raw bytes into a loaded [ResourceHandle], which may be a different size from the raw
//!   bytes and may carry typed extra data.  Loaders are picked by glob pattern, most recently registered first, so
//!   register [DefaultResourceLoader] before anything more specific.
//! - [ResourceCache] ties them together: [ResourceCache::get_handle] returns an `Arc<ResourceHandle>`, loading it if
//!   needed.
//!
//! Handles are reference counted.  Evicting a handle only takes it out of the cache's index; its bytes count against
//! the budget until the last `Arc` is dropped, so holding handles is always safe but leaves less room for loading.
//!
//! To use this crate, implement [ResourceFile] for your archive format and [ResourceLoader] for your asset formats, then:
//!
//! ```no_run
//! use resource_cache::*;
//!
//! let cache = ResourceCache::new(64, DirectoryResourceFile::new("assets"));
//! cache.init()?;
//! cache.register_loader(DefaultResourceLoader)?;
//! cache.register_loader(TextResourceLoader::new("*.glsl"))?;
//!
//! let shader = cache.get_handle(&Resource::new("shaders/sky.glsl"))?;
//! println!("{}", shader.text().unwrap_or_default());
//! # Ok::<(), CacheError>(())
//! ```
mod directory_file;
mod error;
mod handle;
mod loaders;
mod lru_index;
mod memory_file;
mod pattern;
mod resource;
mod resource_cache;
mod traits;

pub use directory_file::*;
pub use error::*;
pub use handle::ResourceHandle;
pub use loaders::*;
pub use lru_index::LruIndex;
pub use memory_file::*;
pub use pattern::*;
pub use resource::*;
pub use resource_cache::*;
pub use traits::*;
