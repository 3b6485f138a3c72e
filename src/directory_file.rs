use std::collections::HashMap;
use std::fs::File;
use std::io::*;
use std::path::{Path, PathBuf};

use ahash::RandomState;
use relative_path::RelativePathBuf;

use crate::*;

/// An archive backed by a directory tree.
///
/// Every regular file under the root is a resource, named by its path relative to the root with `/` separators (so
/// `textures\hull.png` on Windows is `textures/hull.png` everywhere).  The tree is scanned once, on open; files added
/// afterwards are not seen, and enumeration order is sorted by name.
#[derive(Debug)]
pub struct DirectoryResourceFile {
    root_path: PathBuf,
    names: Vec<Resource>,
    entries: HashMap<Resource, DirectoryEntry, RandomState>,
}

#[derive(Debug)]
struct DirectoryEntry {
    relative: RelativePathBuf,
    size: u64,
}

fn conv_path(path: impl AsRef<Path>) -> Result<RelativePathBuf> {
    RelativePathBuf::from_path(path).map_err(|_| Error::new(ErrorKind::Other, "Invalid path"))
}

impl DirectoryResourceFile {
    pub fn new(root_path: impl Into<PathBuf>) -> DirectoryResourceFile {
        DirectoryResourceFile {
            root_path: root_path.into(),
            names: vec![],
            entries: Default::default(),
        }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Open a file under the root, refusing relative paths which would escape it.
    fn open_file(&self, path: &RelativePathBuf) -> Result<File> {
        // On Windows, canonicalize is very broken when relative path segments appear in the middle of a path, so go
        // via the logical path instead.
        let absolute = path.to_logical_path(&self.root_path);
        if !absolute.starts_with(&self.root_path) {
            return Err(Error::new(
                ErrorKind::Other,
                "path is outside the archive root directory",
            ));
        }
        File::open(absolute)
    }

    fn scan(&self, dir: &Path, found: &mut Vec<(RelativePathBuf, u64)>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();
            if file_type.is_dir() {
                self.scan(&path, found)?;
            } else if file_type.is_file() {
                let relative = path
                    .strip_prefix(&self.root_path)
                    .map_err(|_| Error::new(ErrorKind::Other, "scanned path left the root"))?;
                found.push((conv_path(relative)?, entry.metadata()?.len()));
            }
        }
        Ok(())
    }
}

impl ResourceFile for DirectoryResourceFile {
    fn open(&mut self) -> Result<()> {
        if !self.root_path.is_dir() {
            return Err(Error::new(
                ErrorKind::NotFound,
                format!("{} is not a directory", self.root_path.display()),
            ));
        }

        let mut found = vec![];
        self.scan(&self.root_path, &mut found)?;
        found.sort_by_key(|(relative, _)| relative.as_str().to_lowercase());

        self.names.clear();
        self.entries.clear();
        for (relative, size) in found {
            let resource = Resource::new(relative.as_str());
            if self.entries.contains_key(&resource) {
                tracing::warn!(path = %relative, "Skipping file whose name only differs by case from another");
                continue;
            }
            self.names.push(resource.clone());
            self.entries.insert(resource, DirectoryEntry { relative, size });
        }

        tracing::debug!(root = %self.root_path.display(), count = self.names.len(), "Scanned resource directory");
        Ok(())
    }

    fn raw_resource_size(&self, resource: &Resource) -> Option<u64> {
        self.entries.get(resource).map(|e| e.size)
    }

    fn load_resource(&mut self, resource: &Resource, dest: &mut [u8]) -> Result<usize> {
        let entry = self.entries.get(resource).ok_or_else(|| {
            Error::new(ErrorKind::NotFound, format!("{} is not in the archive", resource))
        })?;
        let mut file = self.open_file(&entry.relative)?;

        let mut written = 0;
        while written < dest.len() {
            match file.read(&mut dest[written..]) {
                Ok(0) => break,
                Ok(n) => written += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }

    fn resource_count(&self) -> usize {
        self.names.len()
    }

    fn resource_name(&self, index: usize) -> Option<String> {
        self.names.get(index).map(|r| r.name().to_string())
    }
}
