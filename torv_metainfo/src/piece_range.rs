//! Mapping piece coordinates back to source file byte ranges.

use sha1::{Digest, Sha1};

use crate::builder::merkle;
use crate::hash::{Sha1Hash, Sha256Hash};
use crate::metainfo::{piece_count, File, Metainfo};

/// One contiguous byte range of a file feeding a piece.
#[derive(Debug, Clone, Copy)]
pub struct FileRange<'a> {
    /// File the range belongs to.
    pub file: &'a File,
    /// Offset of the range within the file.
    pub offset: u64,
    /// Length of the range in bytes.
    pub length: u64,
}

/// The source ranges and expected digest of one v1 piece.
#[derive(Debug, Clone)]
pub struct V1PieceRange<'a> {
    piece_index: u64,
    expected: Sha1Hash,
    ranges: Vec<FileRange<'a>>,
    name: &'a [u8],
    single_file: bool,
}

impl<'a> V1PieceRange<'a> {
    /// Lookup the ranges of the given piece in the given model.
    ///
    /// Returns None for models without v1 pieces or out of range indices.
    pub(crate) fn new(metainfo: &'a Metainfo, piece_index: u64) -> Option<V1PieceRange<'a>> {
        let info = metainfo.info();
        let v1 = info.v1()?;
        let expected = v1.piece(piece_index)?;

        let piece_length = info.piece_length();
        let total_length = info.padded_total_length();
        let piece_start = piece_index * piece_length;
        let piece_end = (piece_start + piece_length).min(total_length);

        // Walk the catenation with a running offset. The position within each
        // file comes from subtracting cumulative offsets; a modulo form would
        // collide for consecutive files of exactly one piece length.
        let mut ranges = Vec::new();
        let mut file_start = 0;
        for file in v1.files() {
            let file_end = file_start + file.length();

            if file_end > piece_start && file_start < piece_end {
                let range_start = piece_start.max(file_start);
                let range_end = piece_end.min(file_end);

                ranges.push(FileRange {
                    file,
                    offset: range_start - file_start,
                    length: range_end - range_start,
                });
            }
            file_start = file_end;

            if file_start >= piece_end {
                break;
            }
        }

        Some(V1PieceRange {
            piece_index,
            expected,
            ranges,
            name: info.name_bytes(),
            single_file: info.directory().is_none(),
        })
    }

    /// Index of the piece within the torrent.
    pub fn piece_index(&self) -> u64 {
        self.piece_index
    }

    /// Expected SHA-1 digest of the piece.
    pub fn expected_hash(&self) -> Sha1Hash {
        self.expected
    }

    /// Ranges feeding the piece, pad files included.
    pub fn ranges(&self) -> &[FileRange<'a>] {
        &self.ranges
    }

    /// Validate caller supplied payload bytes against the expected digest.
    ///
    /// Chunks cover the real file ranges of the piece in order, split at any
    /// boundaries. Pad ranges are virtual: their zeroes are supplied by the
    /// validator itself, regardless of the caller's bytes.
    pub fn validate_data<B>(&self, chunks: &[B]) -> bool
        where B: AsRef<[u8]>
    {
        let mut digest = Sha1::new();
        let mut stream = ChunkStream::new(chunks);

        for range in &self.ranges {
            if range.file.is_pad_file() {
                update_with_zeros(&mut digest, range.length);
                continue;
            }

            match stream.take(range.length) {
                Some(parts) => {
                    for part in parts {
                        digest.update(part);
                    }
                }
                None => return false,
            }
        }
        if !stream.is_exhausted() {
            return false;
        }

        let hash = Sha1Hash::from(<[u8; 20]>::from(digest.finalize()));
        hash == self.expected
    }

    /// Webseed urls of the real files overlapping this piece.
    ///
    /// Single file torrents resolve to `<base>/<name>`, multi file torrents
    /// to `<base>/<name>/<path components>`.
    pub fn webseed_urls(&self, base: &str) -> Vec<String> {
        self.ranges
            .iter()
            .filter(|range| !range.file.is_pad_file())
            .map(|range| webseed_url(base, self.name, range.file, self.single_file))
            .collect()
    }
}

// ----------------------------------------------------------------------------//

/// The source range and expected digest of one v2 piece.
#[derive(Debug, Clone)]
pub struct V2PieceRange<'a> {
    path: Vec<Vec<u8>>,
    piece_index: u64,
    piece_length: u64,
    offset: u64,
    length: u64,
    expected: Sha256Hash,
    name: &'a [u8],
}

impl<'a> V2PieceRange<'a> {
    /// Lookup the given piece of the file at the given tree path.
    ///
    /// Returns None for models without a file tree, unknown paths, zero
    /// length files, and out of range indices.
    pub(crate) fn new(metainfo: &'a Metainfo, path_components: &[&[u8]],
                      piece_index: u64) -> Option<V2PieceRange<'a>> {
        let info = metainfo.info();
        let v2 = info.v2()?;
        let leaf = v2.file_tree().lookup(path_components)?;

        let file_length = leaf.length();
        let pieces_root = leaf.pieces_root()?;
        let piece_length = info.piece_length();

        let expected = if file_length <= piece_length {
            // The whole file is one piece, its root is the digest
            if piece_index != 0 {
                return None;
            }

            pieces_root
        } else {
            if piece_index >= piece_count(file_length, piece_length) {
                return None;
            }

            let layer = metainfo.piece_layers().get(&pieces_root)?;
            *layer.get(piece_index as usize)?
        };

        let offset = piece_index * piece_length;
        let length = (offset + piece_length).min(file_length) - offset;

        Some(V2PieceRange {
            path: path_components.iter().map(|component| component.to_vec()).collect(),
            piece_index,
            piece_length,
            offset,
            length,
            expected,
            name: info.name_bytes(),
        })
    }

    /// Raw path components of the file within the tree.
    pub fn path_components(&self) -> &[Vec<u8>] {
        &self.path
    }

    /// Index of the piece within the file.
    pub fn piece_index(&self) -> u64 {
        self.piece_index
    }

    /// Offset of the piece within the file.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Length of the piece in bytes.
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Expected SHA-256 digest: the file's root for single piece files,
    /// otherwise the piece's hash out of the piece layers.
    pub fn expected_hash(&self) -> Sha256Hash {
        self.expected
    }

    /// Validate caller supplied payload bytes against the expected digest.
    ///
    /// The bytes are split into 16 KiB blocks, hashed into leaves, padded
    /// with zero hashes to the piece's leaf capacity, and rebuilt into the
    /// sub tree root.
    pub fn validate_data<B>(&self, chunks: &[B]) -> bool
        where B: AsRef<[u8]>
    {
        let supplied: u64 = chunks.iter().map(|chunk| chunk.as_ref().len() as u64).sum();
        if supplied != self.length {
            return false;
        }

        let mut leaves = Vec::new();
        let mut block = Vec::with_capacity(crate::BLOCK_SIZE);
        for chunk in chunks {
            let mut remaining = chunk.as_ref();

            while !remaining.is_empty() {
                let take = remaining.len().min(crate::BLOCK_SIZE - block.len());
                block.extend_from_slice(&remaining[..take]);
                remaining = &remaining[take..];

                if block.len() == crate::BLOCK_SIZE {
                    leaves.push(Sha256Hash::from_bytes(&block));
                    block.clear();
                }
            }
        }
        if !block.is_empty() {
            leaves.push(Sha256Hash::from_bytes(&block));
        }

        let capacity = (self.piece_length as usize) / crate::BLOCK_SIZE;
        merkle::merkle_root(&leaves, capacity) == self.expected
    }

    /// Webseed url of the file this piece belongs to.
    pub fn webseed_url(&self, base: &str) -> String {
        let single_file = self.path.len() == 1 && self.path[0] == self.name;

        let mut url = trimmed_base(base);
        push_segment(&mut url, &String::from_utf8_lossy(self.name));
        if !single_file {
            for component in &self.path {
                push_segment(&mut url, &String::from_utf8_lossy(component));
            }
        }

        url
    }
}

// ----------------------------------------------------------------------------//

fn webseed_url(base: &str, name: &[u8], file: &File, single_file: bool) -> String {
    let mut url = trimmed_base(base);

    push_segment(&mut url, &String::from_utf8_lossy(name));
    if !single_file {
        for component in file.path_components() {
            push_segment(&mut url, &String::from_utf8_lossy(component));
        }
    }

    url
}

fn trimmed_base(base: &str) -> String {
    base.trim_end_matches('/').to_owned()
}

fn push_segment(url: &mut String, segment: &str) {
    url.push('/');
    url.push_str(segment.trim_start_matches('/'));
}

fn update_with_zeros(digest: &mut Sha1, mut remaining: u64) {
    let zeros = [0u8; 4096];

    while remaining > 0 {
        let take = remaining.min(zeros.len() as u64) as usize;
        digest.update(&zeros[..take]);
        remaining -= take as u64;
    }
}

/// Sequential reader over a list of byte buffers.
struct ChunkStream<'a, B> {
    chunks: &'a [B],
    chunk_index: usize,
    chunk_offset: usize,
}

impl<'a, B> ChunkStream<'a, B>
    where B: AsRef<[u8]>
{
    fn new(chunks: &'a [B]) -> ChunkStream<'a, B> {
        ChunkStream {
            chunks,
            chunk_index: 0,
            chunk_offset: 0,
        }
    }

    /// Take exactly the given number of bytes, split across chunk boundaries.
    ///
    /// Returns None if the stream holds fewer bytes.
    fn take(&mut self, mut remaining: u64) -> Option<Vec<&'a [u8]>> {
        let mut parts = Vec::new();

        while remaining > 0 {
            let chunk = self.chunks.get(self.chunk_index)?.as_ref();
            let available = &chunk[self.chunk_offset..];

            if available.is_empty() {
                self.chunk_index += 1;
                self.chunk_offset = 0;
                continue;
            }

            let take = (available.len() as u64).min(remaining) as usize;
            parts.push(&available[..take]);
            self.chunk_offset += take;
            remaining -= take as u64;

            if self.chunk_offset == chunk.len() {
                self.chunk_index += 1;
                self.chunk_offset = 0;
            }
        }

        Some(parts)
    }

    /// Whether every supplied byte has been consumed.
    fn is_exhausted(&mut self) -> bool {
        while let Some(chunk) = self.chunks.get(self.chunk_index) {
            if chunk.as_ref().len() > self.chunk_offset {
                return false;
            }

            self.chunk_index += 1;
            self.chunk_offset = 0;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use torv_bencode::{ben_bytes, ben_int, ben_list, ben_map};

    use crate::builder::merkle::MerkleTree;
    use crate::builder::CancelToken;
    use crate::hash::{Sha1Hash, Sha256Hash};
    use crate::metainfo::Metainfo;

    fn concat_pieces(hashes: &[Sha1Hash]) -> Vec<u8> {
        let mut pieces = Vec::with_capacity(hashes.len() * 20);
        for hash in hashes {
            pieces.extend_from_slice(hash.as_ref());
        }

        pieces
    }

    fn v1_multi_metainfo(files: &[(&str, Vec<u8>)], piece_length: i64, with_pad: Option<u64>) -> Metainfo {
        // Build the catenation with an optional pad after the first file
        let mut catenation = Vec::new();
        for (index, (_, contents)) in files.iter().enumerate() {
            catenation.extend_from_slice(contents);
            if index == 0 {
                if let Some(pad_length) = with_pad {
                    catenation.extend(std::iter::repeat(0u8).take(pad_length as usize));
                }
            }
        }
        let hashes: Vec<Sha1Hash> = catenation.chunks(piece_length as usize)
            .map(Sha1Hash::from_bytes)
            .collect();
        let pieces = concat_pieces(&hashes);

        let pad_name = with_pad.map(|pad_length| pad_length.to_string());
        let mut files_list = torv_bencode::BencodeMut::new_list();
        {
            use torv_bencode::BMutAccess;

            let list = files_list.list_mut().unwrap();
            for (index, (file_name, contents)) in files.iter().enumerate() {
                list.push(ben_map! {
                    "length" => ben_int!(contents.len() as i64),
                    "path" => ben_list!(ben_bytes!(*file_name))
                });
                if index == 0 {
                    if let Some(pad_length) = with_pad {
                        list.push(ben_map! {
                            "attr" => ben_bytes!("p"),
                            "length" => ben_int!(pad_length as i64),
                            "path" => ben_list!(ben_bytes!(".pad"), ben_bytes!(pad_name.as_ref().unwrap()))
                        });
                    }
                }
            }
        }

        let bytes = (ben_map! {
            "info" => ben_map!{
                "files" => files_list,
                "name" => ben_bytes!("data"),
                "piece length" => ben_int!(piece_length),
                "pieces" => ben_bytes!(&pieces)
            }
        }).encode();

        Metainfo::from_bytes(bytes).unwrap()
    }

    #[test]
    fn positive_piece_boundary_files_resolved_by_subtraction() {
        // Two files of exactly one piece length: a modulo walk would hand
        // both pieces to the first file
        let file_a = vec![0xAAu8; 16384];
        let file_b = vec![0xBBu8; 16384];
        let metainfo = v1_multi_metainfo(&[("a.bin", file_a.clone()), ("b.bin", file_b.clone())],
                                         16384, None);

        let first = metainfo.v1_piece_range(0).unwrap();
        assert_eq!(first.ranges().len(), 1);
        assert_eq!(first.ranges()[0].file.path_components(), &[b"a.bin".to_vec()][..]);
        assert_eq!(first.ranges()[0].offset, 0);
        assert_eq!(first.ranges()[0].length, 16384);

        let second = metainfo.v1_piece_range(1).unwrap();
        assert_eq!(second.ranges().len(), 1);
        assert_eq!(second.ranges()[0].file.path_components(), &[b"b.bin".to_vec()][..]);
        assert_eq!(second.ranges()[0].offset, 0);

        assert!(first.validate_data(&[&file_a]));
        assert!(second.validate_data(&[&file_b]));
        assert!(!second.validate_data(&[&file_a]));

        assert!(metainfo.v1_piece_range(2).is_none());
    }

    #[test]
    fn positive_piece_spanning_files_splits_at_boundaries() {
        // Five 10 KiB files into 32 KiB pieces: two pieces, the first one
        // spanning four files
        let files: Vec<(&str, Vec<u8>)> = ["a", "b", "c", "d", "e"].iter()
            .map(|name| (*name, vec![0u8; 10240]))
            .collect();
        let metainfo = v1_multi_metainfo(&files, 32768, None);

        assert_eq!(metainfo.info().pieces().count(), 2);

        let first = metainfo.v1_piece_range(0).unwrap();
        let range_lengths: Vec<u64> = first.ranges().iter().map(|range| range.length).collect();
        assert_eq!(range_lengths, vec![10240, 10240, 10240, 2048]);

        let chunks = vec![vec![0u8; 10240], vec![0u8; 10240], vec![0u8; 10240], vec![0u8; 2048]];
        assert!(first.validate_data(&chunks));

        // Wrong byte count is a mismatch, not a panic
        assert!(!first.validate_data(&chunks[..3]));

        let second = metainfo.v1_piece_range(1).unwrap();
        assert_eq!(second.ranges().iter().map(|range| range.length).sum::<u64>(), 18432);
        assert!(second.validate_data(&[vec![0u8; 8192], vec![0u8; 10240]]));
    }

    #[test]
    fn positive_pad_ranges_are_virtual_zeroes() {
        // 20 KiB + 12 KiB pad + 20 KiB across 32 KiB pieces
        let file_a = vec![0u8; 20480];
        let file_b = vec![0u8; 20480];
        let metainfo = v1_multi_metainfo(&[("a.bin", file_a.clone()), ("b.bin", file_b.clone())],
                                         32768, Some(12288));

        let first = metainfo.v1_piece_range(0).unwrap();
        assert_eq!(first.ranges().len(), 2);
        assert!(first.ranges()[1].file.is_pad_file());

        // Only the real file bytes are supplied, pad zeroes are implied
        assert!(first.validate_data(&[&file_a[..10240], &file_a[10240..]]));

        let second = metainfo.v1_piece_range(1).unwrap();
        assert_eq!(second.ranges().len(), 1);
        assert_eq!(second.ranges()[0].offset, 0);
        assert!(second.validate_data(&[&file_b]));
    }

    #[test]
    fn positive_v2_single_piece_file_validates_against_root() {
        let zeros = vec![0u8; 64 * crate::KIB];
        let tree = MerkleTree::from_reader(&zeros[..], zeros.len() as u64, 64 * crate::KIB as u64,
                                           &CancelToken::new())
            .unwrap();
        let root: [u8; 32] = tree.root().into();

        let bytes = (ben_map! {
            "info" => ben_map!{
                "file tree" => ben_map!{
                    "zeros.bin" => ben_map!{
                        "" => ben_map!{
                            "length" => ben_int!(64 * 1024),
                            "pieces root" => ben_bytes!(&root[..])
                        }
                    }
                },
                "meta version" => ben_int!(2),
                "name" => ben_bytes!("zeros.bin"),
                "piece length" => ben_int!(64 * 1024)
            }
        }).encode();
        let metainfo = Metainfo::from_bytes(bytes).unwrap();

        let piece = metainfo.v2_piece_range(&[&b"zeros.bin"[..]], 0).unwrap();
        assert_eq!(piece.length(), 64 * 1024);
        assert_eq!(piece.expected_hash(), tree.root());

        let block = vec![0u8; crate::BLOCK_SIZE];
        assert!(piece.validate_data(&[&block, &block, &block, &block]));
        assert!(!piece.validate_data(&[&block]));

        assert!(metainfo.v2_piece_range(&[&b"zeros.bin"[..]], 1).is_none());
        assert!(metainfo.v2_piece_range(&[&b"missing.bin"[..]], 0).is_none());

        // A lone file matching the name resolves to base plus name
        assert_eq!(piece.webseed_url("http://seed.example.com/"),
                   "http://seed.example.com/zeros.bin");
    }

    #[test]
    fn positive_v2_layer_piece_validates_at_offset() {
        let zeros = vec![0u8; crate::MIB];
        let tree = MerkleTree::from_reader(&zeros[..], zeros.len() as u64, 256 * crate::KIB as u64,
                                           &CancelToken::new())
            .unwrap();
        let root: [u8; 32] = tree.root().into();
        let mut layer_bytes = Vec::new();
        for hash in tree.piece_layer() {
            layer_bytes.extend_from_slice(hash.as_ref());
        }
        assert_eq!(layer_bytes.len(), 32 * 4);

        let bytes = (ben_map! {
            "info" => ben_map!{
                "file tree" => ben_map!{
                    "zeros.bin" => ben_map!{
                        "" => ben_map!{
                            "length" => ben_int!(1024 * 1024),
                            "pieces root" => ben_bytes!(&root[..])
                        }
                    }
                },
                "meta version" => ben_int!(2),
                "name" => ben_bytes!("zeros.bin"),
                "piece length" => ben_int!(256 * 1024)
            },
            "piece layers" => ben_map!{
                &root[..] => ben_bytes!(&layer_bytes)
            }
        }).encode();
        let metainfo = Metainfo::from_bytes(bytes).unwrap();

        let piece = metainfo.v2_piece_range(&[&b"zeros.bin"[..]], 2).unwrap();
        assert_eq!(piece.offset(), 512 * 1024);
        assert_eq!(piece.length(), 256 * 1024);
        assert_eq!(piece.expected_hash(),
                   Sha256Hash::from_hash(&layer_bytes[64..96]).unwrap());

        let blocks: Vec<Vec<u8>> = (0..16).map(|_| vec![0u8; crate::BLOCK_SIZE]).collect();
        assert!(piece.validate_data(&blocks));

        assert!(metainfo.v2_piece_range(&[&b"zeros.bin"[..]], 4).is_none());
    }

    #[test]
    fn positive_webseed_urls_normalized() {
        let metainfo = v1_multi_metainfo(&[("a.bin", vec![1u8; 100]), ("b.bin", vec![2u8; 100])],
                                         16384, None);

        let piece = metainfo.v1_piece_range(0).unwrap();
        let urls = piece.webseed_urls("http://seed.example.com/dl/");

        assert_eq!(urls,
                   vec!["http://seed.example.com/dl/data/a.bin".to_owned(),
                        "http://seed.example.com/dl/data/b.bin".to_owned()]);
    }

    #[test]
    fn positive_webseed_url_single_file_is_base_plus_name() {
        let contents = vec![0u8; 100];
        let hashes = vec![Sha1Hash::from_bytes(&contents)];
        let pieces = concat_pieces(&hashes);

        let bytes = (ben_map! {
            "info" => ben_map!{
                "length" => ben_int!(100),
                "name" => ben_bytes!("single.bin"),
                "piece length" => ben_int!(16384),
                "pieces" => ben_bytes!(&pieces)
            }
        }).encode();
        let metainfo = Metainfo::from_bytes(bytes).unwrap();

        let piece = metainfo.v1_piece_range(0).unwrap();
        let urls = piece.webseed_urls("http://seed.example.com");

        assert_eq!(urls, vec!["http://seed.example.com/single.bin".to_owned()]);
    }
}
