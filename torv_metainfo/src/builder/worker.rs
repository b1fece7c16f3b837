use std::io::Read;

use log::debug;

use crate::accessor::DataEntry;
use crate::builder::buffer::{PieceBuffer, PieceBuffers};
use crate::builder::merkle::MerkleTree;
use crate::builder::CancelToken;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::hash::Sha1Hash;

use crossbeam::channel;

/// One item of the v1 catenation.
pub enum V1Item<'a, T> {
    /// Real payload entry.
    Data(&'a T),
    /// Synthesized pad entry of the given length.
    Pad(u64),
}

/// Hash the v1 catenation of the given items into ordered piece hashes.
///
/// With one worker the pieces are hashed inline on the calling thread. With
/// more workers, whole piece buffers are handed to stateless hash workers
/// over a bounded queue and the results are re-ordered by piece index.
pub fn hash_v1_pieces<T, C>(items: &[V1Item<'_, T>], piece_length: usize, num_workers: usize,
                            cancel: &CancelToken, mut progress: C) -> ParseResult<Vec<Sha1Hash>>
    where T: DataEntry + Sync,
          C: FnMut(u64)
{
    debug!("hashing v1 pieces over {} items with {} workers", items.len(), num_workers);

    if num_workers <= 1 {
        hash_v1_serial(items, piece_length, cancel, &mut progress)
    } else {
        hash_v1_threaded(items, piece_length, num_workers, cancel, &mut progress)
    }
}

fn hash_v1_serial<T, C>(items: &[V1Item<'_, T>], piece_length: usize, cancel: &CancelToken,
                        progress: &mut C) -> ParseResult<Vec<Sha1Hash>>
    where T: DataEntry,
          C: FnMut(u64)
{
    let buffers = PieceBuffers::new(piece_length, 1);
    let mut pieces = Vec::new();

    stream_pieces(items, &buffers, cancel, progress, |_, buffer| {
        pieces.push(Sha1Hash::from_bytes(buffer.as_slice()));
        buffers.checkin(buffer);

        Ok(())
    })?;

    Ok(pieces)
}

fn hash_v1_threaded<T, C>(items: &[V1Item<'_, T>], piece_length: usize, num_workers: usize,
                          cancel: &CancelToken, progress: &mut C) -> ParseResult<Vec<Sha1Hash>>
    where T: DataEntry + Sync,
          C: FnMut(u64)
{
    let buffers = PieceBuffers::new(piece_length, num_workers);
    let (work_send, work_recv) = channel::bounded::<(u64, PieceBuffer)>(num_workers * 2);
    let (result_send, result_recv) = channel::unbounded::<(u64, Sha1Hash)>();

    let scope_result = crossbeam::thread::scope(|scope| {
        for _ in 0..num_workers {
            let work_recv = work_recv.clone();
            let result_send = result_send.clone();
            let buffers = &buffers;

            scope.spawn(move |_| {
                while let Ok((piece_index, buffer)) = work_recv.recv() {
                    let hash = Sha1Hash::from_bytes(buffer.as_slice());
                    buffers.checkin(buffer);

                    if result_send.send((piece_index, hash)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(work_recv);
        drop(result_send);

        let stream_result = stream_pieces(items, &buffers, cancel, progress, |piece_index, buffer| {
            work_send.send((piece_index, buffer))
                .map_err(|_| ParseError::from_kind(ParseErrorKind::Cancelled))
        });

        // Closing the work queue lets the workers drain and exit
        drop(work_send);
        let mut indexed_pieces: Vec<(u64, Sha1Hash)> = result_recv.iter().collect();
        let streamed = stream_result?;

        // Workers complete out of order, the piece index restores it
        indexed_pieces.sort_by_key(|&(piece_index, _)| piece_index);
        debug_assert_eq!(indexed_pieces.len() as u64, streamed);

        Ok(indexed_pieces.into_iter().map(|(_, hash)| hash).collect())
    });

    scope_result.unwrap_or_else(|_| panic!("torv_metainfo: Piece Hash Worker Panicked"))
}

/// Fill piece buffers from the catenation of the given items, handing each
/// whole buffer (and the trailing partial buffer) to the emit closure.
///
/// Returns the number of pieces emitted.
fn stream_pieces<T, C, E>(items: &[V1Item<'_, T>], buffers: &PieceBuffers, cancel: &CancelToken,
                          progress: &mut C, mut emit: E) -> ParseResult<u64>
    where T: DataEntry,
          C: FnMut(u64),
          E: FnMut(u64, PieceBuffer) -> ParseResult<()>
{
    let mut piece_index: u64 = 0;
    let mut buffer = buffers.checkout();

    for item in items {
        match item {
            V1Item::Pad(pad_length) => {
                let mut remaining = *pad_length;

                while remaining > 0 {
                    if cancel.is_cancelled() {
                        return Err(ParseError::from_kind(ParseErrorKind::Cancelled));
                    }

                    // Pads are always shorter than one piece
                    let filled = buffer.fill_zeros(remaining as usize);
                    remaining -= filled as u64;
                    progress(filled as u64);

                    if buffer.is_whole() {
                        emit(piece_index, buffer)?;
                        piece_index += 1;
                        buffer = buffers.checkout();
                    }
                }
            }
            V1Item::Data(entry) => {
                let mut reader = entry.access()?;

                loop {
                    if cancel.is_cancelled() {
                        return Err(ParseError::from_kind(ParseErrorKind::Cancelled));
                    }

                    let mut read_count = 0;
                    let eof = buffer.read_bytes(|chunk| {
                        let bytes_read = reader.read(chunk)?;
                        read_count = bytes_read;

                        Ok(bytes_read)
                    })?;
                    progress(read_count as u64);

                    if buffer.is_whole() {
                        emit(piece_index, buffer)?;
                        piece_index += 1;
                        buffer = buffers.checkout();
                    }
                    if eof {
                        break;
                    }
                }
            }
        }
    }

    // Emit the trailing partial piece. A torrent with no payload bytes at all
    // still hashes one empty piece.
    if !buffer.is_empty() || piece_index == 0 {
        emit(piece_index, buffer)?;
        piece_index += 1;
    } else {
        buffers.checkin(buffer);
    }

    Ok(piece_index)
}

// ----------------------------------------------------------------------------//

/// Compute the merkle tree of every non empty file, in parallel when more
/// than one worker is given.
///
/// The result is indexed like the input; zero length files yield `None`.
pub fn hash_v2_trees<T, C>(files: &[(u64, &T)], piece_length: u64, num_workers: usize,
                           cancel: &CancelToken, mut progress: C) -> ParseResult<Vec<Option<MerkleTree>>>
    where T: DataEntry + Sync,
          C: FnMut(u64)
{
    debug!("hashing v2 trees over {} files with {} workers", files.len(), num_workers);

    if num_workers <= 1 {
        let mut trees = Vec::with_capacity(files.len());
        for &(length, entry) in files {
            if length == 0 {
                trees.push(None);
                continue;
            }

            let reader = entry.access()?;
            trees.push(Some(MerkleTree::from_reader(reader, length, piece_length, cancel)?));
            progress(length);
        }

        return Ok(trees);
    }

    let (job_send, job_recv) = channel::unbounded::<(usize, u64, &T)>();
    let (result_send, result_recv) = channel::unbounded::<(usize, u64, ParseResult<MerkleTree>)>();

    let mut num_jobs = 0;
    for (index, &(length, entry)) in files.iter().enumerate() {
        if length > 0 {
            job_send.send((index, length, entry))
                .expect("torv_metainfo: Failed To Queue A Merkle Job");
            num_jobs += 1;
        }
    }
    drop(job_send);

    if num_jobs == 0 {
        return Ok(files.iter().map(|_| None).collect());
    }

    let scope_result = crossbeam::thread::scope(|scope| {
        for _ in 0..num_workers.min(num_jobs) {
            let job_recv = job_recv.clone();
            let result_send = result_send.clone();

            scope.spawn(move |_| {
                while let Ok((index, length, entry)) = job_recv.recv() {
                    let tree = entry.access()
                        .map_err(ParseError::from)
                        .and_then(|reader| MerkleTree::from_reader(reader, length, piece_length, cancel));

                    if result_send.send((index, length, tree)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(job_recv);
        drop(result_send);

        let mut trees: Vec<Option<MerkleTree>> = files.iter().map(|_| None).collect();
        let mut first_error = None;
        for (index, length, tree) in result_recv.iter() {
            match tree {
                Ok(tree) => {
                    trees[index] = Some(tree);
                    progress(length);
                }
                Err(error) => {
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(trees),
        }
    });

    scope_result.unwrap_or_else(|_| panic!("torv_metainfo: Merkle Tree Worker Panicked"))
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor};

    use rand::RngCore;

    use super::{hash_v1_pieces, hash_v2_trees, V1Item};
    use crate::accessor::DataEntry;
    use crate::builder::merkle::MerkleTree;
    use crate::builder::CancelToken;
    use crate::hash::Sha1Hash;

    // Keep these numbers fairly small to avoid lengthy tests
    const DEFAULT_PIECE_LENGTH: usize = 1024;
    const DEFAULT_NUM_PIECES: usize = 300;

    // Mock object for providing direct access to bytes via DataEntry.
    struct MockDataEntry {
        buffer: Vec<u8>,
    }

    impl MockDataEntry {
        /// Creates a new MockDataEntry with the given number of random bytes.
        fn as_random(num_bytes: usize) -> MockDataEntry {
            let mut buffer = vec![0u8; num_bytes];
            rand::thread_rng().fill_bytes(&mut buffer);

            MockDataEntry { buffer }
        }

        fn as_slice(&self) -> &[u8] {
            &self.buffer
        }
    }

    impl DataEntry for MockDataEntry {
        type Data = Cursor<Vec<u8>>;

        fn access(&self) -> io::Result<Cursor<Vec<u8>>> {
            Ok(Cursor::new(self.buffer.clone()))
        }
    }

    /// Validates that the pieces calculated from the given entries match a
    /// directly computed chunking of their concatenation.
    fn validate_entries_pieces(data_entries: Vec<MockDataEntry>, piece_length: usize, num_workers: usize) {
        let contiguous: Vec<u8> = data_entries.iter()
            .flat_map(|entry| entry.as_slice().iter().copied())
            .collect();
        let computed_pieces: Vec<Sha1Hash> = contiguous.chunks(piece_length)
            .map(Sha1Hash::from_bytes)
            .collect();

        let items: Vec<V1Item<'_, MockDataEntry>> = data_entries.iter().map(V1Item::Data).collect();
        let mut progress_bytes = 0;
        let received_pieces = hash_v1_pieces(&items, piece_length, num_workers, &CancelToken::new(),
                                             |bytes| progress_bytes += bytes)
            .unwrap();

        assert_eq!(received_pieces, computed_pieces);
        assert_eq!(progress_bytes, contiguous.len() as u64);
    }

    #[test]
    fn positive_piece_length_divisible_region_single_worker() {
        let region_length = DEFAULT_PIECE_LENGTH * DEFAULT_NUM_PIECES;
        let data_entry = vec![MockDataEntry::as_random(region_length)];

        validate_entries_pieces(data_entry, DEFAULT_PIECE_LENGTH, 1);
    }

    #[test]
    fn positive_piece_length_divisible_region_multiple_workers() {
        let region_length = DEFAULT_PIECE_LENGTH * DEFAULT_NUM_PIECES;
        let data_entry = vec![MockDataEntry::as_random(region_length)];

        validate_entries_pieces(data_entry, DEFAULT_PIECE_LENGTH, 4);
    }

    #[test]
    fn positive_piece_length_undivisible_region_single_worker() {
        let region_length = DEFAULT_PIECE_LENGTH * DEFAULT_NUM_PIECES + 1;
        let data_entry = vec![MockDataEntry::as_random(region_length)];

        validate_entries_pieces(data_entry, DEFAULT_PIECE_LENGTH, 1);
    }

    #[test]
    fn positive_piece_length_undivisible_region_multiple_workers() {
        let region_length = DEFAULT_PIECE_LENGTH * DEFAULT_NUM_PIECES + 1;
        let data_entry = vec![MockDataEntry::as_random(region_length)];

        validate_entries_pieces(data_entry, DEFAULT_PIECE_LENGTH, 4);
    }

    #[test]
    fn positive_piece_length_undivisible_regions_single_worker() {
        let region_lengths = [DEFAULT_PIECE_LENGTH / 2 * DEFAULT_NUM_PIECES,
                              DEFAULT_PIECE_LENGTH / 4 * DEFAULT_NUM_PIECES,
                              DEFAULT_PIECE_LENGTH,
                              (DEFAULT_PIECE_LENGTH * 2 - 1) * 2];
        let data_entries = region_lengths.iter()
            .map(|&length| MockDataEntry::as_random(length))
            .collect();

        validate_entries_pieces(data_entries, DEFAULT_PIECE_LENGTH, 1);
    }

    #[test]
    fn positive_piece_length_undivisible_regions_multiple_workers() {
        let region_lengths = [DEFAULT_PIECE_LENGTH / 2 * DEFAULT_NUM_PIECES,
                              DEFAULT_PIECE_LENGTH / 4 * DEFAULT_NUM_PIECES,
                              DEFAULT_PIECE_LENGTH,
                              (DEFAULT_PIECE_LENGTH * 2 - 1) * 2];
        let data_entries = region_lengths.iter()
            .map(|&length| MockDataEntry::as_random(length))
            .collect();

        validate_entries_pieces(data_entries, DEFAULT_PIECE_LENGTH, 4);
    }

    #[test]
    fn positive_pad_items_hash_as_zeroes() {
        let entry = MockDataEntry::as_random(600);
        let items = vec![V1Item::Data(&entry), V1Item::Pad(424)];

        let mut contiguous = entry.as_slice().to_vec();
        contiguous.extend(std::iter::repeat(0u8).take(424));
        let computed: Vec<Sha1Hash> = contiguous.chunks(DEFAULT_PIECE_LENGTH)
            .map(Sha1Hash::from_bytes)
            .collect();

        let received = hash_v1_pieces(&items, DEFAULT_PIECE_LENGTH, 1, &CancelToken::new(), |_| ())
            .unwrap();

        assert_eq!(received, computed);
    }

    #[test]
    fn positive_empty_catenation_hashes_one_piece() {
        let items: Vec<V1Item<'_, MockDataEntry>> = Vec::new();

        let received = hash_v1_pieces(&items, DEFAULT_PIECE_LENGTH, 1, &CancelToken::new(), |_| ())
            .unwrap();

        assert_eq!(received, vec![Sha1Hash::from_bytes(b"")]);
    }

    #[test]
    fn positive_v2_trees_parallel_matches_serial() {
        let piece_length = 32 * 1024;
        let entries: Vec<MockDataEntry> = [0, 10_000, 16 * 1024, 100_000]
            .iter()
            .map(|&length| MockDataEntry::as_random(length))
            .collect();
        let files: Vec<(u64, &MockDataEntry)> = entries.iter()
            .map(|entry| (entry.as_slice().len() as u64, entry))
            .collect();

        let serial = hash_v2_trees(&files, piece_length, 1, &CancelToken::new(), |_| ()).unwrap();
        let parallel = hash_v2_trees(&files, piece_length, 4, &CancelToken::new(), |_| ()).unwrap();

        assert_eq!(serial, parallel);
        assert!(serial[0].is_none());
        assert!(serial[1].is_some());
    }

    #[test]
    fn positive_v2_tree_matches_direct_leaves() {
        let entry = MockDataEntry::as_random(40_000);
        let files = vec![(40_000u64, &entry)];

        let trees = hash_v2_trees(&files, 32 * 1024, 1, &CancelToken::new(), |_| ()).unwrap();

        let leaves: Vec<_> = entry.as_slice()
            .chunks(crate::BLOCK_SIZE)
            .map(crate::hash::Sha256Hash::from_bytes)
            .collect();
        let expected = MerkleTree::from_leaves(&leaves, 40_000, 32 * 1024);

        assert_eq!(trees[0].as_ref().unwrap(), &expected);
    }

    #[test]
    fn negative_cancelled_v1_returns_error() {
        let entry = MockDataEntry::as_random(DEFAULT_PIECE_LENGTH * 4);
        let items = vec![V1Item::Data(&entry)];

        let cancel = CancelToken::new();
        cancel.cancel();

        let result = hash_v1_pieces(&items, DEFAULT_PIECE_LENGTH, 1, &cancel, |_| ());
        assert!(result.is_err());
    }
}
