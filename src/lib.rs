//! A virtual filesystem embedded inside a single host file.
//!
//! The backing file holds a rooted tree of folders and files — creation,
//! listing, read/write, copy, move, removal — addressed by one ordinary
//! host-OS path. [`vfs::Fs`] is the entry point; [`engine::StorageEngine`]
//! is the locked, byte-level core it is built on.
//!
//! Durability against host crashes or concurrent multi-process access is
//! out of scope: the engine assumes a single process holds the backing
//! file for its lifetime and that the host does not fail mid-operation.

pub mod engine;
pub mod error;
pub mod file_controller;
pub mod fragment;
pub mod meta;
pub mod reference;
pub mod rwlock;
pub mod vfs;

pub use engine::{EngineConfig, EngineStat, StorageEngine};
pub use error::{EngineError, Result};
pub use vfs::{Entry, File, FileOps, Folder, FolderOps, Fs, Node};
