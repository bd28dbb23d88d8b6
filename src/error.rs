//! Error taxonomy surfaced by the storage engine and the VFS facade.

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised by [`crate::engine::StorageEngine`] and [`crate::vfs`].
///
/// [`EngineError::NodeNotFound`] and [`EngineError::NodeExists`] are
/// internal signals: [`crate::engine::StorageEngine::navigate`] and
/// `exists_check` raise them, but the `vfs` facade translates them into
/// [`EngineError::FileNotFound`]/[`EngineError::FolderNotFound`]/
/// [`EngineError::FileExists`] before returning to a caller, based on what
/// the operation expected to find. Anything else unexpected is wrapped as
/// [`EngineError::InternalError`] so callers see a uniform surface.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Internal navigation failed to match a path part.
    #[error("node not found")]
    NodeNotFound,

    /// A user operation targeted a missing file, or found a folder where a
    /// file was expected.
    #[error("file not found")]
    FileNotFound,

    /// A user operation targeted a missing folder, or found a file where a
    /// folder was expected.
    #[error("folder not found")]
    FolderNotFound,

    /// An exists-check found a sibling with the same name.
    #[error("node already exists")]
    NodeExists,

    /// `copy`/`move` with `overwrite = false` into a name that already
    /// resolves to a node.
    #[error("file already exists")]
    FileExists,

    /// Non-recursive remove on a folder with children.
    #[error("folder is not empty")]
    FolderNotEmpty,

    /// `copy`/`move` source or destination does not belong to this engine.
    #[error("operation spans two filesystems")]
    CrossFsOperation,

    /// Reference mark is neither `'C'` nor `'F'`, the root reference is
    /// missing at offset 0, or a structural mismatch was found while
    /// reading.
    #[error("backing file is corrupt: {0}")]
    CorruptFormat(String),

    /// The backing file ended before the expected number of bytes.
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: u64, got: u64 },

    /// Any unexpected lower-level failure, wrapping the original.
    #[error("internal error: {0}")]
    InternalError(#[from] std::io::Error),
}

impl EngineError {
    /// Translate an internal [`EngineError::NodeNotFound`] into the
    /// user-facing error appropriate for a lookup that expected a file.
    pub(crate) fn expect_file(self) -> Self {
        match self {
            EngineError::NodeNotFound => EngineError::FileNotFound,
            other => other,
        }
    }

    /// Translate an internal [`EngineError::NodeNotFound`] into the
    /// user-facing error appropriate for a lookup that expected a folder.
    pub(crate) fn expect_folder(self) -> Self {
        match self {
            EngineError::NodeNotFound => EngineError::FolderNotFound,
            other => other,
        }
    }

    /// Translate an internal [`EngineError::NodeExists`] into the
    /// user-facing `FileExists` used by copy/move conflict handling.
    pub(crate) fn expect_no_conflict(self) -> Self {
        match self {
            EngineError::NodeExists => EngineError::FileExists,
            other => other,
        }
    }
}
