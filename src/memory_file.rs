use std::collections::HashMap;
use std::io::{Error, ErrorKind};

use ahash::RandomState;

use crate::{Resource, ResourceFile};

/// An archive held entirely in memory.
///
/// Resources enumerate in insertion order.  Useful for assets embedded in the binary, and for tests.
#[derive(Debug, Default)]
pub struct MemoryResourceFile {
    entries: Vec<(Resource, Vec<u8>)>,
    index: HashMap<Resource, usize, RandomState>,
}

impl MemoryResourceFile {
    pub fn new() -> MemoryResourceFile {
        Default::default()
    }

    /// Add a resource, returning the old bytes if it was already present.  Replacing keeps the original position.
    pub fn insert(&mut self, name: impl Into<Resource>, bytes: impl Into<Vec<u8>>) -> Option<Vec<u8>> {
        let resource = name.into();
        let bytes = bytes.into();
        if let Some(&i) = self.index.get(&resource) {
            return Some(std::mem::replace(&mut self.entries[i].1, bytes));
        }

        self.index.insert(resource.clone(), self.entries.len());
        self.entries.push((resource, bytes));
        None
    }

    /// Builder-style [insert](Self::insert).
    pub fn with(mut self, name: impl Into<Resource>, bytes: impl Into<Vec<u8>>) -> MemoryResourceFile {
        self.insert(name, bytes);
        self
    }

    fn bytes(&self, resource: &Resource) -> Option<&[u8]> {
        let i = *self.index.get(resource)?;
        Some(&self.entries[i].1)
    }
}

impl ResourceFile for MemoryResourceFile {
    fn open(&mut self) -> Result<(), Error> {
        Ok(())
    }

    fn raw_resource_size(&self, resource: &Resource) -> Option<u64> {
        self.bytes(resource).map(|b| b.len() as u64)
    }

    fn load_resource(&mut self, resource: &Resource, dest: &mut [u8]) -> Result<usize, Error> {
        let bytes = self
            .bytes(resource)
            .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("{} is not in the archive", resource)))?;
        let len = bytes.len().min(dest.len());
        dest[..len].copy_from_slice(&bytes[..len]);
        Ok(len)
    }

    fn resource_count(&self) -> usize {
        self.entries.len()
    }

    fn resource_name(&self, index: usize) -> Option<String> {
        self.entries.get(index).map(|e| e.0.name().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_file() {
        let mut file = MemoryResourceFile::new()
            .with("B.png", "bb")
            .with("a.model", "aaaa");
        file.open().unwrap();

        assert_eq!(file.resource_count(), 2);
        assert_eq!(
            file.resource_names().collect::<Vec<_>>(),
            vec!["b.png".to_string(), "a.model".to_string()]
        );
        assert_eq!(file.resource_name(2), None);
        assert_eq!(file.raw_resource_size(&"b.PNG".into()), Some(2));
        assert_eq!(file.raw_resource_size(&"missing".into()), None);

        let mut dest = [0u8; 5];
        assert_eq!(file.load_resource(&"a.model".into(), &mut dest).unwrap(), 4);
        assert_eq!(&dest, b"aaaa\0");

        assert_eq!(file.insert("b.png", "ccc"), Some(b"bb".to_vec()));
        assert_eq!(file.resource_name(0).as_deref(), Some("b.png"));
        assert_eq!(file.raw_resource_size(&"b.png".into()), Some(3));

        let err = file.load_resource(&"missing".into(), &mut dest).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
