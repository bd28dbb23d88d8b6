use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::StorageEngine;
use crate::error::{EngineError, Result};

use super::{represent_path, FileOps, Node};

/// A handle to one file node, identified by its path from root. Cheap to
/// clone; carries no open file descriptor of its own — every operation
/// opens a fresh [`crate::file_controller::FileController`] under the
/// engine's lock for its own duration.
#[derive(Debug, Clone)]
pub struct File {
    pub(super) engine: Arc<StorageEngine>,
    pub(super) parts: Vec<String>,
}

impl File {
    pub(crate) fn new(engine: Arc<StorageEngine>, parts: Vec<String>) -> Self {
        Self { engine, parts }
    }
}

impl Node for File {
    fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    fn absolute_path(&self) -> String {
        represent_path(&self.parts)
    }
}

#[async_trait]
impl FileOps for File {
    async fn size(&self) -> Result<i64> {
        self.engine
            .with_read_lock(|fc| -> Pin<Box<dyn Future<Output = Result<i64>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_file())?;
                    let meta = fragment.as_file().ok_or(EngineError::FileNotFound)?;
                    Ok(meta.file_size)
                })
            })
            .await
    }

    async fn read(&self) -> Result<Vec<u8>> {
        self.engine
            .with_read_lock(|fc| -> Pin<Box<dyn Future<Output = Result<Vec<u8>>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_file())?;
                    fragment.as_file().ok_or(EngineError::FileNotFound)?;
                    fc.read_file_content(&fragment).await
                })
            })
            .await
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        self.engine
            .with_write_lock(|fc| -> Pin<Box<dyn Future<Output = Result<()>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_file())?;
                    fragment.as_file().ok_or(EngineError::FileNotFound)?;
                    fc.update_file_content(&fragment, data).await?;
                    Ok(())
                })
            })
            .await
    }

    async fn remove(self) -> Result<()> {
        let engine = self.engine.clone();
        engine
            .with_write_lock(move |fc| -> Pin<Box<dyn Future<Output = Result<()>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_file())?;
                    fragment.as_file().ok_or(EngineError::FileNotFound)?;
                    if let Some(parent) = fragment.parent.as_deref() {
                        self.engine.remove_child(fc, parent, &fragment).await?;
                    }
                    Ok(())
                })
            })
            .await
    }
}
