use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::{EngineConfig, EngineStat, StorageEngine};
use crate::error::{EngineError, Result};

use super::{represent_path, File, FileOps, Folder, FolderOps};

/// Top-level entry point: a virtual filesystem backed by a single host
/// file.
#[derive(Debug, Clone)]
pub struct Fs {
    engine: Arc<StorageEngine>,
}

impl Fs {
    /// Open (or prepare to create on first write) the backing file at
    /// `path` with the default configuration.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self { engine: Arc::new(StorageEngine::open(path)) }
    }

    /// Open with an explicit [`EngineConfig`].
    pub fn open_with_config(path: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self { engine: Arc::new(StorageEngine::open_with_config(path, config)) }
    }

    /// The root folder: empty name, no parent, not a persisted node of its
    /// own beyond the root fragment.
    pub fn root(&self) -> Folder {
        Folder::new(self.engine.clone(), Vec::new())
    }

    /// Render an absolute, `/`-separated path with a leading `/`.
    pub fn represent_path(parts: &[String]) -> String {
        represent_path(parts)
    }

    /// Usage snapshot for the backing file.
    pub async fn stat(&self) -> Result<EngineStat> {
        self.engine.stat().await
    }

    /// Force an out-of-band defragmentation pass, bypassing the
    /// configured threshold.
    pub async fn defragment_now(&self) -> Result<()> {
        self.engine.defragment_now().await
    }

    /// Copy `src` into `dst_folder` under `name`. A no-op returning a
    /// clone of `src` if source and destination already coincide. Fails
    /// with [`EngineError::CrossFsOperation`] if either handle belongs to
    /// a different engine, and with [`EngineError::FileExists`] if the
    /// destination name already resolves to a node and `overwrite` is
    /// false.
    pub async fn copy(&self, src: &File, dst_folder: &Folder, name: &str, overwrite: bool) -> Result<File> {
        let dst_parts = self.resolve_destination(src, dst_folder, name)?;
        if let Some(unchanged) = dst_parts {
            return Ok(unchanged);
        }

        if overwrite {
            if let Ok(existing) = dst_folder.child_file(name).await {
                existing.remove().await?;
            }
        }

        let data = src.read().await?;
        let created = dst_folder.create_file(name).await.map_err(EngineError::expect_no_conflict)?;
        created.write(&data).await?;
        Ok(created)
    }

    /// Move `src` into `dst_folder` under `name`; afterwards, operations
    /// against `src` fail with [`EngineError::FileNotFound`].
    pub async fn move_file(&self, src: &File, dst_folder: &Folder, name: &str, overwrite: bool) -> Result<File> {
        let dst_parts = self.resolve_destination(src, dst_folder, name)?;
        if let Some(unchanged) = dst_parts {
            return Ok(unchanged);
        }

        if overwrite {
            if let Ok(existing) = dst_folder.child_file(name).await {
                existing.remove().await?;
            }
        }

        let data = src.read().await?;
        let created = dst_folder.create_file(name).await.map_err(EngineError::expect_no_conflict)?;
        created.write(&data).await?;
        src.clone().remove().await?;
        Ok(created)
    }

    /// Validate both handles belong to this engine, and return `Some(src)`
    /// if `src` and `dst_folder/name` already coincide (a no-op).
    fn resolve_destination(&self, src: &File, dst_folder: &Folder, name: &str) -> Result<Option<File>> {
        self.assert_same_engine(&src.engine)?;
        self.assert_same_engine(&dst_folder.engine)?;

        let mut dst_parts = dst_folder.parts.clone();
        dst_parts.push(name.to_owned());
        if dst_parts == src.parts {
            return Ok(Some(src.clone()));
        }
        Ok(None)
    }

    fn assert_same_engine(&self, other: &Arc<StorageEngine>) -> Result<()> {
        if !Arc::ptr_eq(&self.engine, other) {
            return Err(EngineError::CrossFsOperation);
        }
        Ok(())
    }
}
