//! The external VFS contract and its implementation over
//! [`crate::engine::StorageEngine`].
//!
//! The generic node/file/folder/copy-move trait surface is normally
//! supplied by an external VFS library; this crate only needs to conform
//! to it, so [`Node`], [`FolderOps`], and [`FileOps`] are defined locally,
//! just wide enough for [`Fs`]/[`Folder`]/[`File`] to implement.

mod file;
mod folder;
mod fs;

pub use file::File;
pub use folder::Folder;
pub use fs::Fs;

use async_trait::async_trait;

use crate::error::Result;

/// Render an absolute, `/`-separated path from root, leading `/` included.
pub(crate) fn represent_path(parts: &[String]) -> String {
    let mut out = String::from("/");
    out.push_str(&parts.join("/"));
    out
}

/// Shared identity across files and folders.
pub trait Node {
    fn name(&self) -> &str;
    fn absolute_path(&self) -> String;
}

/// A listed child of a folder: either a file or a folder handle, in
/// stored insertion order.
#[derive(Debug, Clone)]
pub enum Entry {
    File(File),
    Folder(Folder),
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::File(f) => f.name(),
            Entry::Folder(f) => f.name(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, Entry::Folder(_))
    }
}

/// Operations exposed on a folder handle.
#[async_trait]
pub trait FolderOps: Node + Sized {
    async fn list_folder(&self) -> Result<Vec<Entry>>;
    async fn create_file(&self, name: &str) -> Result<File>;
    async fn create_folder(&self, name: &str) -> Result<Folder>;
    async fn child_folder(&self, name: &str) -> Result<Folder>;
    async fn child_file(&self, name: &str) -> Result<File>;
    async fn remove(self, recursive: bool) -> Result<()>;
}

/// Operations exposed on a file handle.
#[async_trait]
pub trait FileOps: Node + Sized {
    async fn size(&self) -> Result<i64>;
    async fn read(&self) -> Result<Vec<u8>>;
    async fn write(&self, data: &[u8]) -> Result<()>;
    async fn remove(self) -> Result<()>;
}
