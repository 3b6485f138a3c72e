use std::io::Error as IoError;

use crate::CacheState;

/// Why a [ResourceLoader](crate::ResourceLoader) rejected the bytes it was given.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("bad magic number")]
    BadMagic,
    #[error("unsupported format version {0}")]
    UnsupportedVersion(u32),
    #[error("truncated data: needed {needed} bytes but only {available} are present")]
    Truncated { needed: u64, available: u64 },
    #[error("{0}")]
    Invalid(String),
    #[error("extra data was already attached to this handle")]
    ExtraAlreadySet,
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("could not open the resource archive: {0}")]
    ArchiveUnavailable(#[source] IoError),
    #[error("resource {0} is not in the archive")]
    ResourceNotFound(String),
    #[error("no registered loader matches resource {0}")]
    NoLoaderMatched(String),
    #[error("loader rejected resource {name}: {source}")]
    LoaderParseFailure {
        name: String,
        #[source]
        source: LoadError,
    },
    #[error("resource {name} needs {needed} bytes, which does not fit a budget of {budget} with {allocated} still allocated")]
    OutOfBudget {
        name: String,
        needed: u64,
        budget: u64,
        allocated: u64,
    },
    #[error("failed to read resource {name} from the archive: {source}")]
    ArchiveRead {
        name: String,
        #[source]
        source: IoError,
    },
    #[error("the cache is {0:?}; this operation needs it to be ready")]
    NotReady(CacheState),
}

pub type CacheResult<T> = Result<T, CacheError>;
