//! Library for parsing and building v1, v2, and hybrid bittorrent metainfo
//! files.
//!
//! Parsing yields a typed [`Metainfo`] model with validated cross field
//! invariants and preserved unknown keys; building drives the hasher over a
//! file tree through [`MetainfoBuilder`] and yields the same model.

#[macro_use]
extern crate error_chain;

mod accessor;
mod builder;
mod encode;
mod file_tree;
mod hash;
mod metainfo;
mod parse;
mod piece_range;

pub mod error;
pub mod iter;

pub use crate::accessor::{Accessor, AccessorEntry, DataEntry, DirectAccessor, DirectEntry,
                          FileAccessor, FileEntry, IntoAccessor};
pub use crate::builder::{CancelToken, MetainfoBuilder, PadPolicy, PieceLength};
pub use crate::file_tree::{FileTree, FileTreeLeaf, FileTreeNode, V2File};
pub use crate::hash::{Sha1Hash, Sha256Hash, SHA1_HASH_LEN, SHA256_HASH_LEN};
pub use crate::metainfo::{File, FileAttributes, Flavor, HashScheme, Info, Metainfo, ParseOpt,
                          V1Info, V2Info};
pub use crate::piece_range::{FileRange, V1PieceRange, V2PieceRange};

/// One kibibyte.
pub const KIB: usize = 1024;

/// One mebibyte.
pub const MIB: usize = 1024 * KIB;

/// Size of a v2 merkle leaf block.
pub const BLOCK_SIZE: usize = 16 * KIB;

/// Smallest piece length accepted by the model.
pub const MIN_PIECE_LENGTH: usize = 16 * KIB;

/// Piece length used when callers have no preference of their own.
pub const DEFAULT_PIECE_LENGTH: usize = 256 * KIB;
