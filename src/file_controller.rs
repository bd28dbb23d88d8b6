//! [`FileController`] — a typed cursor over the backing file.
//!
//! Keeps byte-level framing isolated from navigation logic: this layer
//! knows nothing about paths or trees, only how to decode/encode
//! references and node records at a given offset.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{EngineError, Result};
use crate::fragment::{NodeData, NodeFragment};
use crate::meta::{FileMeta, FolderMeta};
use crate::reference::{NodeKind, NodeReference, INTANGIBLE, REFERENCE_SIZE};

/// `children_used_space:8 | children_count:4`, the fixed prefix of a
/// folder record before its child references begin.
const FOLDER_HEADER_SIZE: i64 = 12;

/// An async cursor over one open handle to the backing file. Opened
/// read-only for readers, read/write for writers.
#[derive(Debug)]
pub struct FileController {
    file: File,
}

impl FileController {
    /// Open the backing file at `path`. `writable = false` opens
    /// read-only; `writable = true` opens for read/write, creating the
    /// file if it does not exist.
    pub async fn open(path: &Path, writable: bool) -> Result<Self> {
        let file = if writable {
            OpenOptions::new().read(true).write(true).create(true).open(path).await?
        } else {
            OpenOptions::new().read(true).open(path).await?
        };
        Ok(Self { file })
    }

    /// Open `path` for read/write, truncating any existing content. Used
    /// by defragmentation to start its sidecar file from empty even if a
    /// previous pass was interrupted before renaming it away.
    pub(crate) async fn create_truncated(path: &Path) -> Result<Self> {
        let file =
            OpenOptions::new().read(true).write(true).create(true).truncate(true).open(path).await?;
        Ok(Self { file })
    }

    /// Seek to an absolute offset.
    pub async fn seek(&mut self, pos: i64) -> Result<()> {
        self.file.seek(std::io::SeekFrom::Start(pos as u64)).await?;
        Ok(())
    }

    /// Current file offset.
    pub async fn position(&mut self) -> Result<i64> {
        Ok(self.file.stream_position().await? as i64)
    }

    /// Current length of the backing file.
    pub async fn size(&mut self) -> Result<i64> {
        Ok(self.file.metadata().await?.len() as i64)
    }

    /// Flush and release the underlying handle.
    pub async fn close(mut self) -> Result<()> {
        self.file.flush().await?;
        Ok(())
    }

    // -- primitive field I/O -------------------------------------------------

    async fn read_exact_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn read_u8(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.file.read_exact(&mut buf).await?;
        Ok(buf[0])
    }

    async fn write_u8(&mut self, value: u8) -> Result<()> {
        self.file.write_all(&[value]).await?;
        Ok(())
    }

    async fn read_u16_be(&mut self) -> Result<u16> {
        let buf = self.read_exact_bytes(2).await?;
        Ok(BigEndian::read_u16(&buf))
    }

    async fn write_u16_be(&mut self, value: u16) -> Result<()> {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, value);
        self.file.write_all(&buf).await?;
        Ok(())
    }

    async fn read_i32_be(&mut self) -> Result<i32> {
        let buf = self.read_exact_bytes(4).await?;
        Ok(BigEndian::read_i32(&buf))
    }

    async fn write_i32_be(&mut self, value: i32) -> Result<()> {
        let mut buf = [0u8; 4];
        BigEndian::write_i32(&mut buf, value);
        self.file.write_all(&buf).await?;
        Ok(())
    }

    async fn read_i64_be(&mut self) -> Result<i64> {
        let buf = self.read_exact_bytes(8).await?;
        Ok(BigEndian::read_i64(&buf))
    }

    async fn write_i64_be(&mut self, value: i64) -> Result<()> {
        let mut buf = [0u8; 8];
        BigEndian::write_i64(&mut buf, value);
        self.file.write_all(&buf).await?;
        Ok(())
    }

    async fn read_name(&mut self) -> Result<String> {
        let len = self.read_u16_be().await? as usize;
        let bytes = self.read_exact_bytes(len).await?;
        String::from_utf8(bytes)
            .map_err(|_| EngineError::CorruptFormat("name is not valid UTF-8".into()))
    }

    async fn write_name(&mut self, name: &str) -> Result<()> {
        let bytes = name.as_bytes();
        self.write_u16_be(bytes.len() as u16).await?;
        self.file.write_all(bytes).await?;
        Ok(())
    }

    // -- references ------------------------------------------------------

    /// Decode the 9-byte reference at the current position. The returned
    /// reference's `position` equals the offset it was read from.
    pub async fn read_reference(&mut self) -> Result<NodeReference> {
        let position = self.position().await?;
        let mark = self.read_u8().await?;
        let data_position = self.read_i64_be().await?;
        let kind = NodeKind::from_mark(mark).ok_or_else(|| {
            EngineError::CorruptFormat(format!("unknown reference mark {mark:#x}"))
        })?;
        Ok(NodeReference { position, data_position, kind })
    }

    /// Write a 9-byte reference at the current position, returning the
    /// reference created.
    pub async fn put_reference(&mut self, kind: NodeKind, data_position: i64) -> Result<NodeReference> {
        let position = self.position().await?;
        self.write_u8(kind.mark()).await?;
        self.write_i64_be(data_position).await?;
        Ok(NodeReference { position, data_position, kind })
    }

    /// Overwrite the reference living at `reference.position` so it points
    /// at `new_data_position` instead.
    pub(crate) async fn redirect_reference(&mut self, reference: NodeReference, new_data_position: i64) -> Result<()> {
        self.seek(reference.position).await?;
        self.write_u8(reference.kind.mark()).await?;
        self.write_i64_be(new_data_position).await?;
        Ok(())
    }

    // -- fragments ---------------------------------------------------------

    /// The special-cased entry point: if the backing file is empty and
    /// `ref_position == 0`, synthesize a virtual root fragment; otherwise
    /// decode the reference at `ref_position` and delegate to
    /// [`Self::read_fragment`].
    pub async fn read_fragment_at(
        &mut self,
        ref_position: i64,
        parent: Option<Box<NodeFragment>>,
    ) -> Result<NodeFragment> {
        if ref_position == 0 && self.size().await? == 0 {
            return Ok(NodeFragment {
                reference: NodeReference::intangible(NodeKind::Folder, REFERENCE_SIZE),
                data: NodeData::Folder(FolderMeta {
                    name: String::new(),
                    children_used_space: 0,
                    children: Vec::new(),
                }),
                parent,
                meta_size_bytes: 0,
            });
        }
        self.seek(ref_position).await?;
        let reference = self.read_reference().await?;
        self.read_fragment(reference, parent).await
    }

    /// Decode the node pointed to by `reference`, dispatching on its mark.
    /// File fragments read `name` and `file_size` (content is not read
    /// here); folder fragments read the full child list and name.
    pub async fn read_fragment(
        &mut self,
        reference: NodeReference,
        parent: Option<Box<NodeFragment>>,
    ) -> Result<NodeFragment> {
        self.seek(reference.data_position).await?;
        match reference.kind {
            NodeKind::File => {
                let name = self.read_name().await?;
                let file_size = self.read_i64_be().await?;
                let meta_size_bytes = REFERENCE_SIZE + 2 + name.len() as i64 + 8 + file_size;
                Ok(NodeFragment {
                    reference,
                    data: NodeData::File(FileMeta { name, file_size }),
                    parent,
                    meta_size_bytes,
                })
            }
            NodeKind::Folder => {
                let children_used_space = self.read_i64_be().await?;
                let children_count = self.read_i32_be().await?;
                let mut children = Vec::with_capacity(children_count.max(0) as usize);
                for _ in 0..children_count {
                    children.push(self.read_reference().await?);
                }
                let name = self.read_name().await?;
                let meta_size_bytes = REFERENCE_SIZE
                    + FOLDER_HEADER_SIZE
                    + REFERENCE_SIZE * children_count as i64
                    + 2
                    + name.len() as i64;
                Ok(NodeFragment {
                    reference,
                    data: NodeData::Folder(FolderMeta { name, children_used_space, children }),
                    parent,
                    meta_size_bytes,
                })
            }
        }
    }

    /// Read exactly `file_size` bytes of content for a file fragment.
    /// Fails with [`EngineError::ShortRead`] if fewer bytes are available.
    pub async fn read_file_content(&mut self, fragment: &NodeFragment) -> Result<Vec<u8>> {
        let meta = fragment
            .as_file()
            .expect("read_file_content called on a folder fragment");
        let content_offset =
            fragment.reference.data_position + 2 + meta.name.len() as i64 + 8;
        self.seek(content_offset).await?;
        let mut buf = Vec::with_capacity(meta.file_size.max(0) as usize);
        let mut limited = (&mut self.file).take(meta.file_size.max(0) as u64);
        let got = limited.read_to_end(&mut buf).await? as i64;
        if got != meta.file_size {
            return Err(EngineError::ShortRead {
                expected: meta.file_size as u64,
                got: got as u64,
            });
        }
        Ok(buf)
    }

    /// Write a complete file metadata record (name + size + content) at
    /// `reference.data_position`, returning the resulting fragment.
    pub async fn put_file_fragment(
        &mut self,
        reference: NodeReference,
        name: &str,
        data: &[u8],
        parent: Option<Box<NodeFragment>>,
    ) -> Result<NodeFragment> {
        self.seek(reference.data_position).await?;
        self.write_name(name).await?;
        self.write_i64_be(data.len() as i64).await?;
        self.file.write_all(data).await?;
        let meta_size_bytes = REFERENCE_SIZE + 2 + name.len() as i64 + 8 + data.len() as i64;
        Ok(NodeFragment {
            reference,
            data: NodeData::File(FileMeta { name: name.to_owned(), file_size: data.len() as i64 }),
            parent,
            meta_size_bytes,
        })
    }

    /// Write a complete folder metadata record at `reference.data_position`.
    /// `children` is written verbatim; each child's `position` field in the
    /// returned fragment is updated to reflect where it now lives inside
    /// this record.
    pub async fn put_folder_fragment(
        &mut self,
        reference: NodeReference,
        name: &str,
        children_used_space: i64,
        children: &[NodeReference],
        parent: Option<Box<NodeFragment>>,
    ) -> Result<NodeFragment> {
        self.seek(reference.data_position).await?;
        self.write_i64_be(children_used_space).await?;
        self.write_i32_be(children.len() as i32).await?;

        let mut placed = Vec::with_capacity(children.len());
        for (idx, child) in children.iter().enumerate() {
            let child_ref_position =
                reference.data_position + FOLDER_HEADER_SIZE + idx as i64 * REFERENCE_SIZE;
            self.write_u8(child.kind.mark()).await?;
            self.write_i64_be(child.data_position).await?;
            placed.push(NodeReference {
                position: child_ref_position,
                data_position: child.data_position,
                kind: child.kind,
            });
        }
        self.write_name(name).await?;

        let meta_size_bytes = REFERENCE_SIZE
            + FOLDER_HEADER_SIZE
            + REFERENCE_SIZE * children.len() as i64
            + 2
            + name.len() as i64;
        Ok(NodeFragment {
            reference,
            data: NodeData::Folder(FolderMeta {
                name: name.to_owned(),
                children_used_space,
                children: placed,
            }),
            parent,
            meta_size_bytes,
        })
    }

    /// Update a file's content: rewrite in place when `data.len() <=`
    /// the current `file_size`, or append a brand-new record at
    /// end-of-file and redirect the reference otherwise. Either way,
    /// propagate the size delta to ancestors.
    pub async fn update_file_content(
        &mut self,
        fragment: &NodeFragment,
        data: &[u8],
    ) -> Result<NodeFragment> {
        let meta = fragment.as_file().expect("update_file_content called on a folder fragment");
        let old_size = meta.file_size;
        let new_size = data.len() as i64;
        let delta = new_size - old_size;

        let new_fragment = if new_size <= old_size {
            tracing::debug!(old_size, new_size, "rewriting file content in place");
            let content_offset =
                fragment.reference.data_position + 2 + meta.name.len() as i64 + 8;
            self.seek(content_offset - 8).await?;
            self.write_i64_be(new_size).await?;
            self.file.write_all(data).await?;
            NodeFragment {
                reference: fragment.reference,
                data: NodeData::File(FileMeta { name: meta.name.clone(), file_size: new_size }),
                parent: fragment.parent.clone(),
                meta_size_bytes: fragment.meta_size_bytes + delta,
            }
        } else {
            tracing::debug!(old_size, new_size, "appending new file record");
            let new_data_position = self.size().await?;
            self.redirect_reference(fragment.reference, new_data_position).await?;
            let new_reference = NodeReference {
                position: fragment.reference.position,
                data_position: new_data_position,
                kind: NodeKind::File,
            };
            self.put_file_fragment(new_reference, &meta.name, data, fragment.parent.clone())
                .await?
        };

        self.propagate_used_space_change(fragment, delta).await?;
        Ok(new_fragment)
    }

    /// Walk upward from `fragment` via parent fragments, rewriting the
    /// first 8 bytes (`children_used_space`) of every ancestor's folder
    /// record to `old_children_used_space + delta`.
    pub async fn propagate_used_space_change(
        &mut self,
        fragment: &NodeFragment,
        delta: i64,
    ) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }
        let mut cursor: &NodeFragment = fragment;
        while let Some(ancestor) = cursor.parent.as_deref() {
            let folder = ancestor.as_folder().expect("parent fragment must be a folder");
            let updated = folder.children_used_space + delta;
            self.seek(ancestor.reference.data_position).await?;
            self.write_i64_be(updated).await?;
            cursor = ancestor;
        }
        Ok(())
    }
}

impl NodeReference {
    /// Helper used when a reference has not been persisted yet (the
    /// [`INTANGIBLE`] sentinel never reaches disk).
    pub fn is_intangible(&self) -> bool {
        self.position == INTANGIBLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open(dir: &TempDir, name: &str) -> FileController {
        FileController::open(&dir.path().join(name), true).await.expect("open")
    }

    #[tokio::test]
    async fn empty_file_synthesizes_virtual_root() {
        let dir = TempDir::new().expect("tempdir");
        let mut fc = open(&dir, "store").await;

        let root = fc.read_fragment_at(0, None).await.expect("read virtual root");
        assert!(root.reference.is_intangible());
        assert_eq!(root.as_folder().expect("root is a folder").children.len(), 0);
        assert_eq!(root.total_size_bytes(), 0);
    }

    #[tokio::test]
    async fn reference_round_trips_through_put_and_read() {
        let dir = TempDir::new().expect("tempdir");
        let mut fc = open(&dir, "store").await;

        fc.seek(0).await.expect("seek");
        let written = fc.put_reference(NodeKind::Folder, 9).await.expect("put reference");

        fc.seek(0).await.expect("seek back");
        let read = fc.read_reference().await.expect("read reference");
        assert_eq!(written, read);
        assert_eq!(read.kind, NodeKind::Folder);
        assert_eq!(read.data_position, 9);
    }

    #[tokio::test]
    async fn file_fragment_round_trips_content() {
        let dir = TempDir::new().expect("tempdir");
        let mut fc = open(&dir, "store").await;

        let reference = NodeReference::intangible(NodeKind::File, 0);
        let fragment =
            fc.put_file_fragment(reference, "greeting", b"hello world", None).await.expect("put file");

        let content = fc.read_file_content(&fragment).await.expect("read content");
        assert_eq!(content, b"hello world");
        assert_eq!(fragment.as_file().unwrap().file_size, 11);
    }

    #[tokio::test]
    async fn update_file_content_in_place_when_shrinking() {
        let dir = TempDir::new().expect("tempdir");
        let mut fc = open(&dir, "store").await;

        let reference = NodeReference::intangible(NodeKind::File, 0);
        let fragment =
            fc.put_file_fragment(reference, "f", b"0123456789", None).await.expect("put file");
        let size_before = fc.size().await.expect("size before");

        let updated = fc.update_file_content(&fragment, b"abc").await.expect("shrink in place");
        assert_eq!(updated.reference.data_position, fragment.reference.data_position);
        assert_eq!(fc.size().await.expect("size after"), size_before);
        assert_eq!(fc.read_file_content(&updated).await.expect("read"), b"abc");
    }

    #[tokio::test]
    async fn update_file_content_appends_when_growing() {
        let dir = TempDir::new().expect("tempdir");
        let mut fc = open(&dir, "store").await;

        let reference = NodeReference::intangible(NodeKind::File, 0);
        let fragment = fc.put_file_fragment(reference, "f", b"abc", None).await.expect("put file");

        let updated =
            fc.update_file_content(&fragment, b"much longer content now").await.expect("grow");
        assert!(updated.reference.data_position > fragment.reference.data_position);
        assert_eq!(
            fc.read_file_content(&updated).await.expect("read"),
            b"much longer content now"
        );
    }

    #[tokio::test]
    async fn folder_fragment_total_size_excludes_double_counted_references() {
        let dir = TempDir::new().expect("tempdir");
        let mut fc = open(&dir, "store").await;

        let child_ref = NodeReference::intangible(NodeKind::File, 100);
        let child = fc.put_file_fragment(child_ref, "child", b"xy", None).await.expect("put child");

        let folder_ref = NodeReference::intangible(NodeKind::Folder, 0);
        let folder = fc
            .put_folder_fragment(folder_ref, "parent", child.total_size_bytes(), &[child.reference], None)
            .await
            .expect("put folder");

        assert_eq!(
            folder.total_size_bytes(),
            folder.meta_size_bytes + child.total_size_bytes() - REFERENCE_SIZE
        );
    }
}
