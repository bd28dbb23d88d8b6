//! [`StorageEngine`] — the single entry point for locked, file-backed
//! access to the tree.
//!
//! Owns the [`RwPreferWriter`] lock, the backing file's path, and a
//! one-shot "has this process initialized the file" flag. Every operation
//! runs through [`StorageEngine::with_read_lock`] or
//! [`StorageEngine::with_write_lock`], which open a fresh
//! [`FileController`] for the duration of the closure and guarantee the
//! matching unlock runs on every exit path, including error returns.

pub mod config;
mod defrag;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{EngineError, Result};
use crate::file_controller::FileController;
use crate::fragment::NodeFragment;
use crate::reference::{NodeKind, NodeReference, REFERENCE_SIZE};
use crate::rwlock::RwPreferWriter;

pub use config::EngineConfig;

/// Point-in-time usage snapshot returned by [`StorageEngine::stat`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStat {
    /// Total length of the backing file, live data plus garbage.
    pub backing_file_bytes: i64,
    /// Bytes reachable from the root, per [`NodeFragment::total_size_bytes`].
    pub live_bytes: i64,
    /// `live_bytes / backing_file_bytes`, or `1.0` for an empty file.
    pub efficiency: f64,
}

/// A virtual filesystem embedded in a single host file, guarded by a
/// writer-preferring lock.
#[derive(Debug)]
pub struct StorageEngine {
    path: PathBuf,
    lock: RwPreferWriter,
    initialized: AtomicBool,
    config: EngineConfig,
}

impl StorageEngine {
    /// Open (or prepare to create) the backing file at `path` with the
    /// default [`EngineConfig`].
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_with_config(path, EngineConfig::default())
    }

    /// Open with an explicit configuration, e.g. a non-default
    /// defragmentation threshold.
    pub fn open_with_config(path: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self { path: path.into(), lock: RwPreferWriter::new(), initialized: AtomicBool::new(false), config }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `op` under a shared read lock against a fresh read-only
    /// [`FileController`].
    ///
    /// `op` returns a boxed future borrowing its `&mut FileController`
    /// argument rather than a bare associated `Future` type: the natural
    /// `F: FnOnce(&mut FileController) -> Fut` signature requires `Fut` to
    /// be a single fixed type independent of the controller's borrow, but
    /// every real caller's `async move` block borrows it across `.await`
    /// points, so no such `Fut` exists for a higher-ranked `F`. Boxing
    /// threads the borrow's lifetime through instead.
    pub async fn with_read_lock<F, T>(&self, op: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut FileController) -> Pin<Box<dyn Future<Output = Result<T>> + 'a>>,
    {
        self.lock.read_lock().await;
        let result = async {
            let mut fc = FileController::open(&self.path, false).await?;
            op(&mut fc).await
        }
        .await;
        self.lock.read_unlock().await;
        result
    }

    /// Run `op` under the exclusive write lock against a fresh read/write
    /// [`FileController`]. Initializes an empty backing file on first use,
    /// then defragments before releasing the lock. See
    /// [`Self::with_read_lock`] for why `op` returns a boxed future.
    pub async fn with_write_lock<F, T>(&self, op: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut FileController) -> Pin<Box<dyn Future<Output = Result<T>> + 'a>>,
    {
        let permit = self.lock.write_lock().await;
        let result = async {
            let mut fc = FileController::open(&self.path, true).await?;
            self.ensure_initialized(&mut fc).await?;
            let outcome = op(&mut fc).await;
            if outcome.is_ok() {
                defrag::run(&self.path, &mut fc, self.config.defrag_threshold).await?;
            }
            fc.close().await?;
            outcome
        }
        .await;
        self.lock.write_unlock(permit).await;
        result
    }

    /// Write an empty root reference and folder record the first time this
    /// engine instance sees an empty backing file. A file that already has
    /// content is left untouched — no format or version header is ever
    /// written.
    async fn ensure_initialized(&self, fc: &mut FileController) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        if fc.size().await? == 0 {
            tracing::debug!(path = %self.path.display(), "initializing empty backing file with virtual root");
            fc.seek(0).await?;
            let root_ref = fc.put_reference(NodeKind::Folder, REFERENCE_SIZE).await?;
            fc.put_folder_fragment(root_ref, "", 0, &[], None).await?;
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }

    /// Resolve a path (given as its already-split components) against the
    /// live tree, starting at the root. Missing parts fail with
    /// [`EngineError::NodeNotFound`].
    pub async fn navigate(&self, fc: &mut FileController, parts: &[String]) -> Result<NodeFragment> {
        let mut current = fc.read_fragment_at(0, None).await?;
        for part in parts {
            let folder = current.as_folder().ok_or(EngineError::NodeNotFound)?;
            let children = folder.children.clone();
            let parent_box = Box::new(current.clone());
            let mut next = None;
            for child_ref in children {
                let child = fc.read_fragment(child_ref, Some(parent_box.clone())).await?;
                if child.name() == part.as_str() {
                    next = Some(child);
                    break;
                }
            }
            current = next.ok_or(EngineError::NodeNotFound)?;
        }
        Ok(current)
    }

    /// Fail with [`EngineError::NodeExists`] if `parts` resolves to
    /// anything; succeed if it resolves to nothing.
    pub async fn exists_check(&self, fc: &mut FileController, parts: &[String]) -> Result<()> {
        match self.navigate(fc, parts).await {
            Ok(_) => Err(EngineError::NodeExists),
            Err(EngineError::NodeNotFound) => Ok(()),
            Err(other) => Err(other),
        }
    }

    /// Append `child` to `parent`'s children, growing the parent's record
    /// at end-of-file and redirecting the parent's own reference to it.
    /// Returns the parent's new fragment.
    pub async fn add_child(
        &self,
        fc: &mut FileController,
        parent: &NodeFragment,
        child: &NodeFragment,
    ) -> Result<NodeFragment> {
        let folder = parent.as_folder().expect("add_child's parent must be a folder");
        tracing::debug!(parent = parent.name(), child = child.name(), "adding child, parent record will grow");
        let mut children = folder.children.clone();
        children.push(child.reference);
        let new_used_space = folder.children_used_space + child.total_size_bytes();

        let new_data_position = fc.size().await?;
        let new_ref = NodeReference { position: parent.reference.position, data_position: new_data_position, kind: NodeKind::Folder };
        let new_parent =
            fc.put_folder_fragment(new_ref, &folder.name, new_used_space, &children, parent.parent.clone()).await?;

        fc.redirect_reference(parent.reference, new_data_position).await?;

        let delta = new_parent.total_size_bytes() - parent.total_size_bytes();
        fc.propagate_used_space_change(parent, delta).await?;
        Ok(new_parent)
    }

    /// Remove `child` from `parent`'s children, rewriting the parent's
    /// record in place (it can only shrink). Returns the parent's new
    /// fragment.
    pub async fn remove_child(
        &self,
        fc: &mut FileController,
        parent: &NodeFragment,
        child: &NodeFragment,
    ) -> Result<NodeFragment> {
        let folder = parent.as_folder().expect("remove_child's parent must be a folder");
        tracing::debug!(parent = parent.name(), child = child.name(), "removing child, parent record rewritten in place");
        let children: Vec<NodeReference> =
            folder.children.iter().copied().filter(|c| c.data_position != child.reference.data_position).collect();
        let new_used_space = folder.children_used_space - child.total_size_bytes();

        let new_ref = parent.reference;
        let new_parent =
            fc.put_folder_fragment(new_ref, &folder.name, new_used_space, &children, parent.parent.clone()).await?;

        let delta = new_parent.total_size_bytes() - parent.total_size_bytes();
        fc.propagate_used_space_change(parent, delta).await?;
        Ok(new_parent)
    }

    /// Usage snapshot for the backing file, taken under a read lock.
    pub async fn stat(&self) -> Result<EngineStat> {
        self.with_read_lock(|fc| -> Pin<Box<dyn Future<Output = Result<EngineStat>> + '_>> {
            Box::pin(async move {
                let root = fc.read_fragment_at(0, None).await?;
                let backing_file_bytes = fc.size().await?;
                let live_bytes = root.total_size_bytes();
                let efficiency =
                    if backing_file_bytes == 0 { 1.0 } else { live_bytes as f64 / backing_file_bytes as f64 };
                Ok(EngineStat { backing_file_bytes, live_bytes, efficiency })
            })
        })
        .await
    }

    /// Force a defragmentation pass regardless of the configured
    /// threshold.
    pub async fn defragment_now(&self) -> Result<()> {
        self.with_write_lock(|fc| -> Pin<Box<dyn Future<Output = Result<()>> + '_>> {
            Box::pin(async move { defrag::run(&self.path, fc, 1.0).await })
        })
        .await
    }
}
