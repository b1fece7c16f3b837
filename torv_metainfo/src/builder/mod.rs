//! Building metainfo files from local or in-memory data.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use log::debug;
use url::Url;

use crate::accessor::{Accessor, IntoAccessor};
use crate::builder::worker::V1Item;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::file_tree::{FileTree, FileTreeLeaf};
use crate::hash::Sha256Hash;
use crate::metainfo::{File, Flavor, HashScheme, Info, Metainfo, ParseOpt, V1Info, V2Info};

pub(crate) mod buffer;
pub(crate) mod merkle;
pub(crate) mod worker;

// Piece length is inversely related to the file size.
// Transfer reliability is inversely related to the piece length.
// Transfer reliability is directly related to the file size.

// So for balanced, file size, and transfer piece length optimizations, calculate the
// minimum piece length we can do to reach the designated pieces size. Then, if that
// piece length is less than the minimum piece length for that optimization, set it equal
// to the minimum. Setting it equal to the minimum (in that case) will increase the piece
// size which will shrink the pieces size which ensures we do not go outside of our max size.
// This ensures we can generate good piece lengths for both large and small files.

const BALANCED_MAX_PIECES_SIZE: usize = 30000;
const BALANCED_MIN_PIECE_LENGTH: usize = 512 * 1024;

const FILE_SIZE_MAX_PIECES_SIZE: usize = 10000;
const FILE_SIZE_MIN_PIECE_LENGTH: usize = 1024 * 1024;

const TRANSFER_MAX_PIECES_SIZE: usize = 50000;
const TRANSFER_MIN_PIECE_LENGTH: usize = crate::MIN_PIECE_LENGTH;

/// Enumerates settings for piece length for generating a torrent file.
#[derive(Copy, Clone, Debug)]
pub enum PieceLength {
    /// Optimize piece length for torrent file size and file transfer.
    OptBalanced,
    /// Optimize piece length for torrent file size.
    OptFileSize,
    /// Optimize piece length for torrent file transfer.
    OptTransfer,
    /// Custom piece length.
    Custom(usize),
}

/// Enumerates settings for aligning files to piece boundaries with pad files.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PadPolicy {
    /// Never synthesize pad files.
    None,
    /// Pad every file except the last out to a piece boundary.
    ///
    /// Hybrid torrents always use this policy.
    PieceAligned,
}

/// Cancellation signal checked by the hasher at least once per block.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a new, uncancelled token.
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Signal the hasher to stop after its current block.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Whether or not the token was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

/// Builder for generating a metainfo file from one or more data sources.
pub struct MetainfoBuilder {
    flavor: Flavor,
    piece_length: PieceLength,
    pad_policy: PadPolicy,
    main_tracker: Option<String>,
    trackers: Option<Vec<Vec<String>>>,
    comment: Option<String>,
    created_by: Option<String>,
    creation_date: Option<i64>,
    private: Option<bool>,
    webseeds: Vec<String>,
    cancel: CancelToken,
}

impl Default for MetainfoBuilder {
    fn default() -> MetainfoBuilder {
        MetainfoBuilder::new()
    }
}

impl MetainfoBuilder {
    /// Create a new `MetainfoBuilder` with default settings.
    pub fn new() -> MetainfoBuilder {
        MetainfoBuilder {
            flavor: Flavor::Hybrid,
            piece_length: PieceLength::OptBalanced,
            pad_policy: PadPolicy::PieceAligned,
            main_tracker: None,
            trackers: None,
            comment: None,
            created_by: None,
            creation_date: None,
            private: None,
            webseeds: Vec::new(),
            cancel: CancelToken::new(),
        }
    }

    /// Set the flavor of the generated torrent.
    pub fn set_flavor(mut self, flavor: Flavor) -> MetainfoBuilder {
        self.flavor = flavor;

        self
    }

    /// Sets the piece length for the torrent file.
    pub fn set_piece_length(mut self, piece_length: PieceLength) -> MetainfoBuilder {
        self.piece_length = piece_length;

        self
    }

    /// Sets the pad file policy for v1 and hybrid torrents.
    pub fn set_pad_policy(mut self, pad_policy: PadPolicy) -> MetainfoBuilder {
        self.pad_policy = pad_policy;

        self
    }

    /// Set the main tracker that this torrent file points to.
    pub fn set_main_tracker(mut self, tracker_url: Option<&str>) -> MetainfoBuilder {
        self.main_tracker = tracker_url.map(String::from);

        self
    }

    /// Set the announce-list tiers for the torrent file.
    pub fn set_trackers(mut self, trackers: Option<&[Vec<String>]>) -> MetainfoBuilder {
        self.trackers = trackers.map(|tiers| tiers.to_vec());

        self
    }

    /// Set the creation date for the torrent.
    ///
    /// Defaults to the current time when the builder runs.
    pub fn set_creation_date(mut self, secs_epoch: Option<i64>) -> MetainfoBuilder {
        self.creation_date = secs_epoch;

        self
    }

    /// Set a comment for the torrent file.
    pub fn set_comment(mut self, comment: Option<&str>) -> MetainfoBuilder {
        self.comment = comment.map(String::from);

        self
    }

    /// Set the created by for the torrent file.
    pub fn set_created_by(mut self, created_by: Option<&str>) -> MetainfoBuilder {
        self.created_by = created_by.map(String::from);

        self
    }

    /// Sets the private flag for the torrent file.
    pub fn set_private_flag(mut self, private: Option<bool>) -> MetainfoBuilder {
        self.private = private;

        self
    }

    /// Set the webseed urls for the torrent file.
    pub fn set_webseeds(mut self, webseeds: Option<&[String]>) -> MetainfoBuilder {
        self.webseeds = webseeds.map(|urls| urls.to_vec()).unwrap_or_default();

        self
    }

    /// Set the cancellation token checked while hashing.
    pub fn set_cancel_token(mut self, cancel: &CancelToken) -> MetainfoBuilder {
        self.cancel = cancel.clone();

        self
    }

    /// Get the flavor that was set.
    pub fn get_flavor(&self) -> Flavor {
        self.flavor
    }

    /// Get the main tracker that was set.
    pub fn get_main_tracker(&self) -> Option<String> {
        self.main_tracker.clone()
    }

    /// Get the announce-list tiers that were set.
    pub fn get_trackers(&self) -> Option<Vec<Vec<String>>> {
        self.trackers.clone()
    }

    /// Get the creation date that was set.
    pub fn get_creation_date(&self) -> Option<i64> {
        self.creation_date
    }

    /// Get the comment that was set.
    pub fn get_comment(&self) -> Option<String> {
        self.comment.clone()
    }

    /// Get the created by that was set.
    pub fn get_created_by(&self) -> Option<String> {
        self.created_by.clone()
    }

    /// Get the private flag that was set.
    pub fn get_private_flag(&self) -> Option<bool> {
        self.private
    }

    /// Build the metainfo file with the given accessor and number of workers.
    /// This method WILL block until the hashing completes.
    ///
    /// The progress callback is invoked with a value between 0.0 and 1.0 as
    /// payload bytes are hashed.
    pub fn build<A, C>(self, num_workers: usize, accessor: A, mut progress: C) -> ParseResult<Metainfo>
        where A: IntoAccessor,
              <A::Accessor as Accessor>::Entry: Sync,
              C: FnMut(f64)
    {
        let num_workers = num_workers.max(1);
        self.validate_urls()?;

        let accessor = accessor.into_accessor()?;
        let entries = accessor.access_entries()?;
        if entries.is_empty() {
            return Err(ParseError::from_kind(ParseErrorKind::InvalidData {
                details: "Found No Files To Build From".to_owned(),
            }));
        }

        let directory = accessor.access_directory().map(|dir| dir.to_path_buf());
        if directory.is_none() && entries.len() > 1 {
            return Err(ParseError::from_kind(ParseErrorKind::InvalidData {
                details: "Found Multiple Files Without A Directory".to_owned(),
            }));
        }

        let name = match directory {
            Some(ref dir) => dir.to_string_lossy().into_owned().into_bytes(),
            None => entries[0].path[0].clone(),
        };

        let total_size: u64 = entries.iter().map(|entry| entry.length).sum();
        let piece_length = determine_piece_length(total_size, self.piece_length);
        if piece_length < crate::MIN_PIECE_LENGTH || !piece_length.is_power_of_two() {
            return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "piece length".to_owned(),
                details: format!("Piece Length Of {} Is Not A Power Of Two >= {}",
                                 piece_length, crate::MIN_PIECE_LENGTH),
            }));
        }
        let piece_length_u64 = piece_length as u64;

        let has_v1 = matches!(self.flavor, Flavor::V1 | Flavor::Hybrid);
        let has_v2 = matches!(self.flavor, Flavor::V2 | Flavor::Hybrid);
        let with_pads = has_v1 &&
                        (self.pad_policy == PadPolicy::PieceAligned || self.flavor == Flavor::Hybrid);

        debug!("building a {:?} torrent of {} files, {} bytes, piece length {}",
               self.flavor, entries.len(), total_size, piece_length);

        // Lay out the v1 catenation, synthesizing pads so every real file
        // except the last starts on a piece boundary
        let mut v1_items = Vec::new();
        let mut v1_files = Vec::new();
        let mut catenated = 0u64;
        for (index, entry) in entries.iter().enumerate() {
            v1_items.push(V1Item::Data(&entry.entry));
            v1_files.push(File::from_parts(entry.length, entry.path.clone(), None));
            catenated += entry.length;

            let is_last = index == entries.len() - 1;
            if with_pads && !is_last && catenated % piece_length_u64 != 0 {
                let pad_length = piece_length_u64 - (catenated % piece_length_u64);

                v1_items.push(V1Item::Pad(pad_length));
                v1_files.push(File::pad(pad_length));
                catenated += pad_length;
            }
        }
        let padded_total = catenated;

        let total_work = {
            let v1_work = if has_v1 { padded_total } else { 0 };
            let v2_work = if has_v2 { total_size } else { 0 };

            (v1_work + v2_work).max(1)
        };
        let mut progressed = 0u64;
        let mut on_bytes = |bytes: u64| {
            progressed += bytes;
            progress(progressed as f64 / total_work as f64);
        };

        let v1_info = if has_v1 {
            let hashes = worker::hash_v1_pieces(&v1_items, piece_length, num_workers,
                                                &self.cancel, &mut on_bytes)?;
            let pieces = hashes.into_iter().map(<[u8; 20]>::from).collect();

            Some(V1Info::new(directory.clone(), v1_files, pieces))
        } else {
            None
        };

        let mut piece_layers: BTreeMap<Sha256Hash, Vec<Sha256Hash>> = BTreeMap::new();
        let v2_info = if has_v2 {
            let files: Vec<(u64, _)> = entries.iter().map(|entry| (entry.length, &entry.entry)).collect();
            let trees = worker::hash_v2_trees(&files, piece_length_u64, num_workers,
                                              &self.cancel, &mut on_bytes)?;

            let mut file_tree = FileTree::default();
            for (entry, tree) in entries.iter().zip(trees) {
                let leaf = match tree {
                    Some(tree) => {
                        if !tree.piece_layer().is_empty() {
                            piece_layers.insert(tree.root(), tree.piece_layer().to_vec());
                        }

                        FileTreeLeaf::new(entry.length, Some(tree.root()), BTreeMap::new())
                    }
                    None => FileTreeLeaf::new(0, None, BTreeMap::new()),
                };

                file_tree.insert(&entry.path, leaf);
            }

            Some(V2Info::new(file_tree))
        } else {
            None
        };

        let scheme = match (v1_info, v2_info) {
            (Some(v1), Some(v2)) => HashScheme::Hybrid(v1, v2),
            (Some(v1), None) => HashScheme::V1(v1),
            (None, Some(v2)) => HashScheme::V2(v2),
            (None, None) => unreachable!("torv_metainfo: Flavor Produced No Hash Scheme"),
        };

        let info = Info::from_parts(name, piece_length_u64, self.private, scheme);

        let creation_date = self.creation_date.or_else(|| Some(Utc::now().timestamp()));
        let url_list = if self.webseeds.is_empty() {
            None
        } else {
            Some(self.webseeds)
        };

        let metainfo = Metainfo::from_parts(self.main_tracker,
                                            self.trackers,
                                            self.comment,
                                            self.created_by,
                                            creation_date,
                                            None,
                                            url_list,
                                            piece_layers,
                                            info);
        metainfo.validate(ParseOpt::default())?;

        Ok(metainfo)
    }

    fn validate_urls(&self) -> ParseResult<()> {
        let tracker_urls = self.main_tracker.iter();
        let tier_urls = self.trackers.iter().flatten().flatten();

        for url in tracker_urls.chain(tier_urls).chain(self.webseeds.iter()) {
            if Url::parse(url).is_err() {
                return Err(ParseError::from_kind(ParseErrorKind::InvalidData {
                    details: format!("Given Url {} Is Not Valid", url),
                }));
            }
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------//

/// Calculate the final piece length given the total file size and piece length strategy.
///
/// Lower piece length will result in a bigger file but better transfer reliability and vice versa.
fn determine_piece_length(total_file_size: u64, piece_length: PieceLength) -> usize {
    match piece_length {
        PieceLength::Custom(length) => length,
        PieceLength::OptBalanced => {
            calculate_piece_length(total_file_size, BALANCED_MAX_PIECES_SIZE, BALANCED_MIN_PIECE_LENGTH)
        }
        PieceLength::OptFileSize => {
            calculate_piece_length(total_file_size, FILE_SIZE_MAX_PIECES_SIZE, FILE_SIZE_MIN_PIECE_LENGTH)
        }
        PieceLength::OptTransfer => {
            calculate_piece_length(total_file_size, TRANSFER_MAX_PIECES_SIZE, TRANSFER_MIN_PIECE_LENGTH)
        }
    }
}

/// Calculate the minimum power of 2 piece length for the given max pieces size and total file size.
fn calculate_piece_length(total_file_size: u64, max_pieces_size: usize, min_piece_length: usize) -> usize {
    let num_pieces = (max_pieces_size as f64) / (crate::hash::SHA1_HASH_LEN as f64);
    let piece_length = ((total_file_size as f64) / num_pieces + 0.5) as usize;

    let pot_piece_length = piece_length.next_power_of_two();

    pot_piece_length.max(min_piece_length)
}

#[cfg(test)]
mod tests {
    use super::{calculate_piece_length, determine_piece_length, PieceLength};

    #[test]
    fn positive_custom_piece_length_passed_through() {
        let length = determine_piece_length(123456, PieceLength::Custom(crate::MIN_PIECE_LENGTH));

        assert_eq!(length, crate::MIN_PIECE_LENGTH);
    }

    #[test]
    fn positive_calculated_piece_length_is_bounded_power_of_two() {
        for &total_size in &[0u64, 1, 100_000, 50_000_000, 10_000_000_000] {
            let length = calculate_piece_length(total_size, 30000, 512 * 1024);

            assert!(length.is_power_of_two());
            assert!(length >= 512 * 1024);
        }
    }
}
