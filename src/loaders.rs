//! Loaders that ship with the crate.
//!
//! Format-specific loaders (textures, models, animations) live with the code that understands those formats; these two
//! only cover bytes that need no transform.
use crate::{LoadError, ResourceHandle, ResourceLoader};

/// Pass-through loader matching every name.
///
/// Register this first so that every other loader, being registered later, is tried before it.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResourceLoader;

impl ResourceLoader for DefaultResourceLoader {
    fn pattern(&self) -> &str {
        "*"
    }

    fn use_raw_file(&self) -> bool {
        true
    }

    fn discard_raw_buffer_after_load(&self) -> bool {
        true
    }

    fn loaded_resource_size(&self, raw: &[u8]) -> Result<u64, LoadError> {
        Ok(raw.len() as u64)
    }

    fn load_resource(&self, _raw: &[u8], _handle: &mut ResourceHandle) -> Result<(), LoadError> {
        Ok(())
    }
}

/// Pass-through loader for text: shader sources, scripts, XML.  The handle's buffer is NUL-terminated so it can be
/// handed to APIs that expect C strings.
#[derive(Debug, Clone)]
pub struct TextResourceLoader {
    pattern: String,
}

impl TextResourceLoader {
    pub fn new(pattern: impl Into<String>) -> TextResourceLoader {
        TextResourceLoader {
            pattern: pattern.into(),
        }
    }
}

impl ResourceLoader for TextResourceLoader {
    fn pattern(&self) -> &str {
        &self.pattern
    }

    fn use_raw_file(&self) -> bool {
        true
    }

    fn discard_raw_buffer_after_load(&self) -> bool {
        true
    }

    fn append_null(&self) -> bool {
        true
    }

    fn loaded_resource_size(&self, raw: &[u8]) -> Result<u64, LoadError> {
        Ok(raw.len() as u64)
    }

    fn load_resource(&self, _raw: &[u8], _handle: &mut ResourceHandle) -> Result<(), LoadError> {
        Ok(())
    }
}
