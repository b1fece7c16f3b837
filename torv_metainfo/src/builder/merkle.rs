//! Per file SHA-256 merkle trees for the v2 scheme.

use std::io::Read;

use sha2::{Digest, Sha256};

use crate::builder::CancelToken;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::hash::Sha256Hash;
use crate::metainfo::piece_count;

/// Merkle tree of one file: the root over the padded block leaves and the
/// layer whose hashes each cover one piece of data.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct MerkleTree {
    root: Sha256Hash,
    piece_layer: Vec<Sha256Hash>,
}

impl MerkleTree {
    /// Merkle root of the file.
    pub fn root(&self) -> Sha256Hash {
        self.root
    }

    /// Hashes of the layer covering one piece each, trimmed to the data
    /// carrying pieces. Empty for files that fit within a single piece.
    pub fn piece_layer(&self) -> &[Sha256Hash] {
        &self.piece_layer
    }

    /// Compute the tree of a non empty file by reading it block by block.
    pub(crate) fn from_reader<R>(mut reader: R, length: u64, piece_length: u64,
                                 cancel: &CancelToken) -> ParseResult<MerkleTree>
        where R: Read
    {
        let mut leaves = Vec::with_capacity(piece_count(length, crate::BLOCK_SIZE as u64) as usize);
        let mut block = vec![0u8; crate::BLOCK_SIZE];

        loop {
            if cancel.is_cancelled() {
                return Err(ParseError::from_kind(ParseErrorKind::Cancelled));
            }

            let block_len = read_block(&mut reader, &mut block)?;
            if block_len == 0 {
                break;
            }

            leaves.push(Sha256Hash::from_bytes(&block[..block_len]));

            if block_len < crate::BLOCK_SIZE {
                break;
            }
        }

        Ok(MerkleTree::from_leaves(&leaves, length, piece_length))
    }

    /// Build the tree over the given data leaves.
    pub(crate) fn from_leaves(leaves: &[Sha256Hash], length: u64, piece_length: u64) -> MerkleTree {
        let piece_leaves = (piece_length as usize) / crate::BLOCK_SIZE;
        let capacity = padded_leaf_count(leaves.len(), piece_leaves);

        let mut level: Vec<Sha256Hash> = Vec::with_capacity(capacity);
        level.extend_from_slice(leaves);
        level.resize(capacity, Sha256Hash::zero());

        // Index of the level whose hashes each cover one whole piece
        let piece_level = piece_leaves.trailing_zeros();
        let data_pieces = piece_count(length, piece_length) as usize;

        let mut piece_layer = Vec::new();
        for current_level in 0.. {
            if current_level == piece_level && data_pieces > 1 {
                piece_layer = level[..data_pieces].to_vec();
            }
            if level.len() == 1 {
                break;
            }

            level = reduce_level(&level);
        }

        MerkleTree {
            root: level[0],
            piece_layer,
        }
    }
}

/// Merkle root over the given leaves, padded with zero hashes up to the given
/// leaf capacity.
pub(crate) fn merkle_root(leaves: &[Sha256Hash], capacity: usize) -> Sha256Hash {
    let padded = padded_leaf_count(leaves.len(), capacity);

    let mut level: Vec<Sha256Hash> = Vec::with_capacity(padded);
    level.extend_from_slice(leaves);
    level.resize(padded, Sha256Hash::zero());

    while level.len() > 1 {
        level = reduce_level(&level);
    }

    level[0]
}

/// Combine two child hashes into their parent hash.
pub(crate) fn combine(left: Sha256Hash, right: Sha256Hash) -> Sha256Hash {
    let mut digest = Sha256::new();
    digest.update(left.as_ref());
    digest.update(right.as_ref());

    Sha256Hash::from(<[u8; 32]>::from(digest.finalize()))
}

/// Leaf count padded up to a power of two and to at least one whole piece.
fn padded_leaf_count(num_leaves: usize, piece_leaves: usize) -> usize {
    num_leaves.next_power_of_two().max(piece_leaves).max(1)
}

fn reduce_level(level: &[Sha256Hash]) -> Vec<Sha256Hash> {
    level.chunks(2).map(|pair| combine(pair[0], pair[1])).collect()
}

/// Fill a block buffer from the reader, retrying short reads until the block
/// is whole or the reader is exhausted.
fn read_block<R>(reader: &mut R, block: &mut [u8]) -> ParseResult<usize>
    where R: Read
{
    let mut filled = 0;

    while filled < block.len() {
        let bytes_read = reader.read(&mut block[filled..])?;
        if bytes_read == 0 {
            break;
        }

        filled += bytes_read;
    }

    Ok(filled)
}
