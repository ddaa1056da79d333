//! Stowage Storage Library
//!
//! This crate provides the storage abstraction, the local filesystem backend
//! and the placement rules that turn a record and an upload into a link.
//!
//! # Link format
//!
//! With the default placement policy a link looks like
//! `{model-folder}/{c}/{a}/{b}/{attribute}/{id}_{token}.{ext}`, for example
//! `blog-post/0/0/0/image/1_5f3a....jpg`.
//!
//! Keys handed to a backend are links, optionally prefixed by a folder such as
//! `original` or `100x100`. Keys must not contain `..` segments or a leading `/`.

pub mod factory;
pub mod local;
pub mod placement;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use local::LocalStorage;
pub use placement::{camel_to_id, normalize_link, resolve_link, sanitize_filename, shard_folder};
pub use traits::{Storage, StorageError, StorageResult, TransferMode};
