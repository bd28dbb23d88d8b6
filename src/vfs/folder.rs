use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::StorageEngine;
use crate::error::{EngineError, Result};
use crate::fragment::NodeData;
use crate::reference::{NodeKind, NodeReference};

use super::{represent_path, Entry, File, FolderOps, Node};

/// A handle to one folder node, identified by its path from root. The
/// root folder has an empty `parts` list, empty name, and no parent.
#[derive(Debug, Clone)]
pub struct Folder {
    pub(super) engine: Arc<StorageEngine>,
    pub(super) parts: Vec<String>,
}

impl Folder {
    pub(crate) fn new(engine: Arc<StorageEngine>, parts: Vec<String>) -> Self {
        Self { engine, parts }
    }
}

impl Node for Folder {
    fn name(&self) -> &str {
        self.parts.last().map(String::as_str).unwrap_or("")
    }

    fn absolute_path(&self) -> String {
        represent_path(&self.parts)
    }
}

#[async_trait]
impl FolderOps for Folder {
    async fn list_folder(&self) -> Result<Vec<Entry>> {
        self.engine
            .with_read_lock(|fc| -> Pin<Box<dyn Future<Output = Result<Vec<Entry>>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_folder())?;
                    let folder = fragment.as_folder().ok_or(EngineError::FolderNotFound)?;
                    let mut entries = Vec::with_capacity(folder.children.len());
                    for child_ref in folder.children.clone() {
                        let child = fc.read_fragment(child_ref, None).await?;
                        let mut child_parts = self.parts.clone();
                        child_parts.push(child.name().to_owned());
                        let entry = match &child.data {
                            NodeData::File(_) => Entry::File(File::new(self.engine.clone(), child_parts)),
                            NodeData::Folder(_) => Entry::Folder(Folder::new(self.engine.clone(), child_parts)),
                        };
                        entries.push(entry);
                    }
                    Ok(entries)
                })
            })
            .await
    }

    async fn create_file(&self, name: &str) -> Result<File> {
        self.engine
            .with_write_lock(|fc| -> Pin<Box<dyn Future<Output = Result<File>> + '_>> {
                Box::pin(async move {
                    let parent = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_folder())?;
                    parent.as_folder().ok_or(EngineError::FolderNotFound)?;

                    let mut child_parts = self.parts.clone();
                    child_parts.push(name.to_owned());
                    self.engine.exists_check(fc, &child_parts).await?;

                    let data_position = fc.size().await?;
                    let reference = NodeReference::intangible(NodeKind::File, data_position);
                    let fragment = fc.put_file_fragment(reference, name, &[], None).await?;
                    self.engine.add_child(fc, &parent, &fragment).await?;

                    Ok(File::new(self.engine.clone(), child_parts))
                })
            })
            .await
    }

    async fn create_folder(&self, name: &str) -> Result<Folder> {
        self.engine
            .with_write_lock(|fc| -> Pin<Box<dyn Future<Output = Result<Folder>> + '_>> {
                Box::pin(async move {
                    let parent = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_folder())?;
                    parent.as_folder().ok_or(EngineError::FolderNotFound)?;

                    let mut child_parts = self.parts.clone();
                    child_parts.push(name.to_owned());
                    self.engine.exists_check(fc, &child_parts).await?;

                    let data_position = fc.size().await?;
                    let reference = NodeReference::intangible(NodeKind::Folder, data_position);
                    let fragment = fc.put_folder_fragment(reference, name, 0, &[], None).await?;
                    self.engine.add_child(fc, &parent, &fragment).await?;

                    Ok(Folder::new(self.engine.clone(), child_parts))
                })
            })
            .await
    }

    async fn child_folder(&self, name: &str) -> Result<Folder> {
        let mut parts = self.parts.clone();
        parts.push(name.to_owned());
        self.engine
            .with_read_lock(|fc| -> Pin<Box<dyn Future<Output = Result<Folder>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &parts).await.map_err(|e| e.expect_folder())?;
                    fragment.as_folder().ok_or(EngineError::FolderNotFound)?;
                    Ok(Folder::new(self.engine.clone(), parts))
                })
            })
            .await
    }

    async fn child_file(&self, name: &str) -> Result<File> {
        let mut parts = self.parts.clone();
        parts.push(name.to_owned());
        self.engine
            .with_read_lock(|fc| -> Pin<Box<dyn Future<Output = Result<File>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &parts).await.map_err(|e| e.expect_file())?;
                    fragment.as_file().ok_or(EngineError::FileNotFound)?;
                    Ok(File::new(self.engine.clone(), parts))
                })
            })
            .await
    }

    async fn remove(self, recursive: bool) -> Result<()> {
        let engine = self.engine.clone();
        engine
            .with_write_lock(move |fc| -> Pin<Box<dyn Future<Output = Result<()>> + '_>> {
                Box::pin(async move {
                    let fragment = self.engine.navigate(fc, &self.parts).await.map_err(|e| e.expect_folder())?;
                    let folder = fragment.as_folder().ok_or(EngineError::FolderNotFound)?;
                    if !folder.children.is_empty() && !recursive {
                        return Err(EngineError::FolderNotEmpty);
                    }
                    if let Some(parent) = fragment.parent.as_deref() {
                        self.engine.remove_child(fc, parent, &fragment).await?;
                    }
                    Ok(())
                })
            })
            .await
    }
}
