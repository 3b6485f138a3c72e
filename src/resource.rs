use std::borrow::Borrow;
use std::fmt;

/// The name of a loadable asset.
///
/// Names are lowercased on construction, so `Textures/Hull.PNG` and `textures/hull.png` are the same resource.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Resource {
    name: String,
}

impl Resource {
    pub fn new(name: impl AsRef<str>) -> Resource {
        Resource {
            name: name.as_ref().to_lowercase(),
        }
    }

    /// The normalized name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Does this resource match the glob `pattern`?
    pub fn matches(&self, pattern: &str) -> bool {
        crate::wildcard_match(pattern, &self.name)
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Resource {
    fn from(name: &str) -> Resource {
        Resource::new(name)
    }
}

impl From<String> for Resource {
    fn from(name: String) -> Resource {
        Resource::new(name)
    }
}

impl AsRef<str> for Resource {
    fn as_ref(&self) -> &str {
        &self.name
    }
}

// Lets maps keyed by `Resource` be queried with a plain (already normalized) `&str`.
impl Borrow<str> for Resource {
    fn borrow(&self) -> &str {
        &self.name
    }
}
