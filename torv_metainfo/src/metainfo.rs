//! Accessing the fields of a metainfo file.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use torv_bencode::{BDecodeOpt, BRefAccess, BencodeMut, BencodeRef};

use crate::encode;
use crate::error::{ParseError, ParseErrorKind, ParseResult};
use crate::file_tree::{FileTree, FileTreeLeaf, FileTreeNode, V2File};
use crate::hash::{Sha1Hash, Sha256Hash, SHA1_HASH_LEN, SHA256_HASH_LEN};
use crate::iter::{Files, PieceMap, Pieces};
use crate::parse::{self, DictRef};
use crate::piece_range::{V1PieceRange, V2PieceRange};

/// Stores parse options for modifying model validation behavior.
#[derive(Copy, Clone, Debug, Default)]
pub struct ParseOpt {
    strict: bool,
    strict_schema: bool,
}

impl ParseOpt {
    /// Create a new `ParseOpt` object.
    pub fn new(strict: bool, strict_schema: bool) -> ParseOpt {
        ParseOpt {
            strict,
            strict_schema,
        }
    }

    /// Whether or not pad file placement and naming are enforced.
    pub fn strict(&self) -> bool {
        self.strict
    }

    /// Whether or not unknown keys are rejected instead of preserved.
    pub fn strict_schema(&self) -> bool {
        self.strict_schema
    }
}

/// The set of hash schemes encoded in a metainfo file.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Flavor {
    /// BEP-3 SHA-1 pieces only.
    V1,
    /// BEP-52 file tree and merkle roots only.
    V2,
    /// Both schemes side by side.
    Hybrid,
}

/// Contains optional metadata for a torrent file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Metainfo {
    announce: Option<String>,
    announce_list: Option<Vec<Vec<String>>>,
    comment: Option<String>,
    created_by: Option<String>,
    creation_date: Option<i64>,
    encoding: Option<String>,
    url_list: Option<Vec<String>>,
    piece_layers: BTreeMap<Sha256Hash, Vec<Sha256Hash>>,
    unknown: BTreeMap<Vec<u8>, BencodeMut<'static>>,
    info: Info,
}

impl Metainfo {
    /// Read a `Metainfo` from metainfo file bytes.
    pub fn from_bytes<B>(bytes: B) -> ParseResult<Metainfo>
        where B: AsRef<[u8]>
    {
        Metainfo::from_bytes_with_opt(bytes, ParseOpt::default())
    }

    /// Read a `Metainfo` from metainfo file bytes with the given options.
    pub fn from_bytes_with_opt<B>(bytes: B, opt: ParseOpt) -> ParseResult<Metainfo>
        where B: AsRef<[u8]>
    {
        parse_meta_bytes(bytes.as_ref(), opt)
    }

    /// Read a `Metainfo` from the metainfo file at the given path.
    pub fn from_file<P>(path: P) -> ParseResult<Metainfo>
        where P: AsRef<Path>
    {
        let bytes = fs::read(path)?;

        Metainfo::from_bytes(bytes)
    }

    pub(crate) fn from_parts(announce: Option<String>,
                             announce_list: Option<Vec<Vec<String>>>,
                             comment: Option<String>,
                             created_by: Option<String>,
                             creation_date: Option<i64>,
                             encoding: Option<String>,
                             url_list: Option<Vec<String>>,
                             piece_layers: BTreeMap<Sha256Hash, Vec<Sha256Hash>>,
                             info: Info)
                             -> Metainfo {
        Metainfo {
            announce,
            announce_list,
            comment,
            created_by,
            creation_date,
            encoding,
            url_list,
            piece_layers,
            unknown: BTreeMap::new(),
            info,
        }
    }

    /// Announce url for the main tracker of the metainfo file.
    pub fn main_tracker(&self) -> Option<&str> {
        self.announce.as_deref()
    }

    /// List of announce url tiers.
    pub fn trackers(&self) -> Option<&Vec<Vec<String>>> {
        self.announce_list.as_ref()
    }

    /// Comment included within the metainfo file.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Person or group that created the metainfo file.
    pub fn created_by(&self) -> Option<&str> {
        self.created_by.as_deref()
    }

    /// Creation date in UNIX epoch format for the metainfo file.
    pub fn creation_date(&self) -> Option<i64> {
        self.creation_date
    }

    /// String encoding format of the pieces portion of the info dictionary.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Webseed urls for the metainfo file.
    pub fn webseeds(&self) -> &[String] {
        self.url_list.as_deref().unwrap_or(&[])
    }

    /// Piece layers of the metainfo file, keyed by each file's merkle root.
    pub fn piece_layers(&self) -> &BTreeMap<Sha256Hash, Vec<Sha256Hash>> {
        &self.piece_layers
    }

    /// Info dictionary for the metainfo file.
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Flavor of the metainfo file.
    pub fn flavor(&self) -> Flavor {
        self.info.flavor()
    }

    /// Set the announce url for the main tracker.
    pub fn set_main_tracker(&mut self, tracker: Option<&str>) {
        self.announce = tracker.map(String::from);
    }

    /// Set the comment for the metainfo file.
    pub fn set_comment(&mut self, comment: Option<&str>) {
        self.comment = comment.map(String::from);
    }

    /// Set the created by for the metainfo file.
    pub fn set_created_by(&mut self, created_by: Option<&str>) {
        self.created_by = created_by.map(String::from);
    }

    /// Set the creation date for the metainfo file.
    pub fn set_creation_date(&mut self, creation_date: Option<i64>) {
        self.creation_date = creation_date;
    }

    /// Lookup the source file ranges feeding the v1 piece at the given index.
    pub fn v1_piece_range(&self, piece_index: u64) -> Option<V1PieceRange<'_>> {
        V1PieceRange::new(self, piece_index)
    }

    /// Lookup the source file range of the given v2 piece within the file at
    /// the given tree path.
    pub fn v2_piece_range(&self, path_components: &[&[u8]], piece_index: u64) -> Option<V2PieceRange<'_>> {
        V2PieceRange::new(self, path_components, piece_index)
    }

    /// Retrieve the bencoded bytes for the `Metainfo` file.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode::metainfo_to_bytes(self)
    }

    /// Write the bencoded bytes for the `Metainfo` file to the given path.
    pub fn write_to_file<P>(&self, path: P) -> ParseResult<()>
        where P: AsRef<Path>
    {
        fs::write(path, self.to_bytes())?;

        Ok(())
    }

    pub(crate) fn unknown(&self) -> &BTreeMap<Vec<u8>, BencodeMut<'static>> {
        &self.unknown
    }

    pub(crate) fn url_list_option(&self) -> Option<&Vec<String>> {
        self.url_list.as_ref()
    }

    /// Validates the cross field invariants of the model.
    pub(crate) fn validate(&self, opt: ParseOpt) -> ParseResult<()> {
        self.info.validate()?;
        self.validate_piece_layers()?;

        if opt.strict() {
            self.info.validate_strict_padding()?;
        }

        Ok(())
    }

    fn validate_piece_layers(&self) -> ParseResult<()> {
        let piece_length = self.info.piece_length();

        let v2_files = match self.info.v2() {
            Some(v2) => v2.file_tree().files(),
            None => {
                if self.piece_layers.is_empty() {
                    return Ok(());
                } else {
                    return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                        details: "Piece Layers Present Without A File Tree".to_owned(),
                    }));
                }
            }
        };

        for file in &v2_files {
            let root = match file.pieces_root() {
                Some(root) => root,
                None => continue,
            };

            if file.length() > piece_length {
                let expected_hashes = piece_count(file.length(), piece_length);

                match self.piece_layers.get(&root) {
                    Some(layer) if layer.len() as u64 == expected_hashes => (),
                    Some(layer) => {
                        return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                            details: format!("Piece Layer For Root {} Has {} Hashes, Expected {}",
                                             root.hex(), layer.len(), expected_hashes),
                        }))
                    }
                    None => {
                        return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                            details: format!("Piece Layer Missing For Root {}", root.hex()),
                        }))
                    }
                }
            } else if self.piece_layers.contains_key(&root) {
                return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                    details: format!("Piece Layer Present For Single Piece File With Root {}", root.hex()),
                }));
            }
        }

        // Layers keyed by a root that no file carries are orphans. Roots are
        // deduplicated across identical files, so compare against the key set.
        let known_roots: std::collections::BTreeSet<Sha256Hash> = v2_files.iter()
            .filter(|file| file.length() > piece_length)
            .filter_map(|file| file.pieces_root())
            .collect();
        if self.piece_layers.keys().any(|root| !known_roots.contains(root)) {
            return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                details: "Piece Layer Present For Unknown Root".to_owned(),
            }));
        }

        Ok(())
    }
}

impl From<Info> for Metainfo {
    fn from(info: Info) -> Metainfo {
        Metainfo {
            announce: None,
            announce_list: None,
            comment: None,
            created_by: None,
            creation_date: None,
            encoding: None,
            url_list: None,
            piece_layers: BTreeMap::new(),
            unknown: BTreeMap::new(),
            info,
        }
    }
}

/// Parses the given metainfo bytes and builds a `Metainfo` from them.
fn parse_meta_bytes(bytes: &[u8], opt: ParseOpt) -> ParseResult<Metainfo> {
    let root_bencode = BencodeRef::decode(bytes, BDecodeOpt::default())?;
    let root_dict = parse::parse_root_dict(&root_bencode)?;

    let announce = parse::parse_announce_url(root_dict).map(String::from);
    let announce_list = parse::parse_announce_list(root_dict).map(parse::convert_announce_list);
    let comment = parse::parse_comment(root_dict).map(String::from);
    let created_by = parse::parse_created_by(root_dict).map(String::from);
    let creation_date = parse::parse_creation_date(root_dict);
    let encoding = parse::parse_encoding(root_dict).map(String::from);
    let url_list = parse_url_list_field(root_dict);

    let piece_layers_dict = parse::parse_piece_layers(root_dict)?;
    let piece_layers = match piece_layers_dict {
        Some(layers_dict) => convert_piece_layers(layers_dict)?,
        None => BTreeMap::new(),
    };

    let info_bencode = parse::parse_info_bencode(root_dict)?;
    let info = parse_info_dictionary(info_bencode, opt)?;

    let mut known_keys: Vec<&[u8]> = vec![parse::INFO_KEY];
    known_if(&mut known_keys, parse::ANNOUNCE_URL_KEY, announce.is_some());
    known_if(&mut known_keys, parse::ANNOUNCE_LIST_KEY, announce_list.is_some());
    known_if(&mut known_keys, parse::COMMENT_KEY, comment.is_some());
    known_if(&mut known_keys, parse::CREATED_BY_KEY, created_by.is_some());
    known_if(&mut known_keys, parse::CREATION_DATE_KEY, creation_date.is_some());
    known_if(&mut known_keys, parse::ENCODING_KEY, encoding.is_some());
    known_if(&mut known_keys, parse::URL_LIST_KEY, url_list.is_some());
    known_if(&mut known_keys, parse::PIECE_LAYERS_KEY, piece_layers_dict.is_some());

    let unknown = collect_unknown(root_dict, &known_keys, opt)?;

    let metainfo = Metainfo {
        announce,
        announce_list,
        comment,
        created_by,
        creation_date,
        encoding,
        url_list,
        piece_layers,
        unknown,
        info,
    };
    metainfo.validate(opt)?;

    Ok(metainfo)
}

fn known_if<'a>(known_keys: &mut Vec<&'a [u8]>, key: &'a [u8], parsed: bool) {
    if parsed {
        known_keys.push(key);
    }
}

/// Parses the url list field, distinguishing absent/unconvertible from present.
fn parse_url_list_field(root_dict: DictRef<'_, '_>) -> Option<Vec<String>> {
    root_dict.lookup(parse::URL_LIST_KEY)?;

    let urls = parse::parse_url_list(root_dict);
    if urls.is_empty() && !url_list_is_empty_list(root_dict) {
        None
    } else {
        Some(urls)
    }
}

fn url_list_is_empty_list(root_dict: DictRef<'_, '_>) -> bool {
    root_dict.lookup(parse::URL_LIST_KEY)
        .and_then(|bencode| bencode.list())
        .map_or(false, |list| list.len() == 0)
}

fn convert_piece_layers(layers_dict: DictRef<'_, '_>) -> ParseResult<BTreeMap<Sha256Hash, Vec<Sha256Hash>>> {
    let mut piece_layers = BTreeMap::new();

    for (key, value) in layers_dict.to_list() {
        let root = Sha256Hash::from_hash(key).ok_or_else(|| {
            ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "piece layers".to_owned(),
                details: "Layer Key Is Not A 32 Byte Root".to_owned(),
            })
        })?;

        let layer_bytes = value.bytes().ok_or_else(|| {
            ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "piece layers".to_owned(),
                details: "Layer Value Is Not A Byte String".to_owned(),
            })
        })?;
        if layer_bytes.len() % SHA256_HASH_LEN != 0 {
            return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "piece layers".to_owned(),
                details: format!("Layer Length Of {} Is Not A Multiple Of {}",
                                 layer_bytes.len(), SHA256_HASH_LEN),
            }));
        }

        let layer = layer_bytes.chunks(SHA256_HASH_LEN)
            .map(|chunk| Sha256Hash::from_hash(chunk).unwrap())
            .collect();
        piece_layers.insert(root, layer);
    }

    Ok(piece_layers)
}

fn collect_unknown(dict: DictRef<'_, '_>, known_keys: &[&[u8]], opt: ParseOpt)
                   -> ParseResult<BTreeMap<Vec<u8>, BencodeMut<'static>>> {
    let mut unknown = BTreeMap::new();

    for (key, value) in dict.to_list() {
        if known_keys.contains(key) {
            continue;
        }

        if opt.strict_schema() {
            return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: String::from_utf8_lossy(key).into_owned(),
                details: "Unknown Key Rejected By Strict Schema".to_owned(),
            }));
        }
        unknown.insert(key.to_vec(), value.to_mut());
    }

    Ok(unknown)
}

/// Checks that a path component is non empty and free of traversal tokens
/// and separators.
pub(crate) fn validate_path_component(component: &[u8]) -> ParseResult<()> {
    let unsafe_component = component.is_empty() || component == b"." || component == b".." ||
                           component.contains(&b'/') || component.contains(&b'\\');

    if unsafe_component {
        Err(ParseError::from_kind(ParseErrorKind::PathUnsafe {
            component: String::from_utf8_lossy(component).into_owned(),
        }))
    } else {
        Ok(())
    }
}

pub(crate) fn piece_count(total_length: u64, piece_length: u64) -> u64 {
    (total_length + piece_length - 1) / piece_length
}

// ----------------------------------------------------------------------------//

/// Contains directory and checksum data for a torrent file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Info {
    v1_hash: Sha1Hash,
    v2_hash: Sha256Hash,
    name: Vec<u8>,
    piece_len: u64,
    is_private: Option<bool>,
    unknown: BTreeMap<Vec<u8>, BencodeMut<'static>>,
    scheme: HashScheme,
}

/// Variant specific tails of the info dictionary.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum HashScheme {
    /// BEP-3 fields only.
    V1(V1Info),
    /// BEP-52 fields only.
    V2(V2Info),
    /// Both field sets side by side.
    Hybrid(V1Info, V2Info),
}

impl Info {
    /// Read an `Info` from info dictionary bytes.
    pub fn from_bytes<B>(bytes: B) -> ParseResult<Info>
        where B: AsRef<[u8]>
    {
        let info_bencode = BencodeRef::decode(bytes.as_ref(), BDecodeOpt::default())?;
        let info = parse_info_dictionary(&info_bencode, ParseOpt::default())?;

        info.validate()?;

        Ok(info)
    }

    pub(crate) fn from_parts(name: Vec<u8>,
                             piece_len: u64,
                             is_private: Option<bool>,
                             scheme: HashScheme)
                             -> Info {
        let mut info = Info {
            v1_hash: Sha1Hash::default(),
            v2_hash: Sha256Hash::default(),
            name,
            piece_len,
            is_private,
            unknown: BTreeMap::new(),
            scheme,
        };

        let info_bytes = encode::info_to_bytes(&info);
        info.v1_hash = Sha1Hash::from_bytes(&info_bytes);
        info.v2_hash = Sha256Hash::from_bytes(&info_bytes);

        info
    }

    /// SHA-1 hash of the bencoded info dictionary, identifying v1 torrents.
    pub fn v1_hash(&self) -> Sha1Hash {
        self.v1_hash
    }

    /// Lowercase hex form of the v1 infohash.
    pub fn v1_hash_hex(&self) -> String {
        self.v1_hash.hex()
    }

    /// SHA-256 hash of the bencoded info dictionary, identifying v2 torrents.
    pub fn v2_hash(&self) -> Sha256Hash {
        self.v2_hash
    }

    /// Lowercase hex form of the v2 infohash.
    pub fn v2_hash_hex(&self) -> String {
        self.v2_hash.hex()
    }

    /// Suggested root name, decoded with replacement where needed.
    pub fn name(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.name)
    }

    /// Raw bytes of the suggested root name.
    pub fn name_bytes(&self) -> &[u8] {
        &self.name
    }

    /// Length in bytes of each piece.
    pub fn piece_length(&self) -> u64 {
        self.piece_len
    }

    /// Whether or not the torrent is private.
    pub fn is_private(&self) -> Option<bool> {
        self.is_private
    }

    /// Flavor of the info dictionary.
    pub fn flavor(&self) -> Flavor {
        match self.scheme {
            HashScheme::V1(_) => Flavor::V1,
            HashScheme::V2(_) => Flavor::V2,
            HashScheme::Hybrid(..) => Flavor::Hybrid,
        }
    }

    /// Variant specific data of the info dictionary.
    pub fn scheme(&self) -> &HashScheme {
        &self.scheme
    }

    /// The v1 tail of the info dictionary, if the flavor carries one.
    pub fn v1(&self) -> Option<&V1Info> {
        match self.scheme {
            HashScheme::V1(ref v1) | HashScheme::Hybrid(ref v1, _) => Some(v1),
            HashScheme::V2(_) => None,
        }
    }

    /// The v2 tail of the info dictionary, if the flavor carries one.
    pub fn v2(&self) -> Option<&V2Info> {
        match self.scheme {
            HashScheme::V2(ref v2) | HashScheme::Hybrid(_, ref v2) => Some(v2),
            HashScheme::V1(_) => None,
        }
    }

    /// Some file directory if this is a v1 multi-file torrent, otherwise None.
    ///
    /// If you want to check to see if this is a multi-file torrent, you should
    /// check whether or not this returns Some. Checking the number of files
    /// present is NOT the correct method. The v2 file tree has no directory
    /// marker of its own; its root components carry the same information.
    pub fn directory(&self) -> Option<&Path> {
        match self.scheme {
            HashScheme::V1(ref v1) | HashScheme::Hybrid(ref v1, _) => v1.directory(),
            HashScheme::V2(_) => None,
        }
    }

    /// Iterator over each file within the torrent file, pad files included.
    ///
    /// Ordering of files yielded in the iterator is guaranteed to be the order in
    /// which they are found in the torrent file as this is necessary to reconstruct
    /// pieces received from peers.
    pub fn files(&self) -> Files<'_> {
        Files::new(self.v1_files())
    }

    /// Iterator over each payload file within the torrent file, pad files excluded.
    pub fn real_files(&self) -> impl Iterator<Item = &File> {
        self.files().filter(|file| !file.is_pad_file())
    }

    /// Iterator over each of the v1 piece SHA-1 hashes.
    ///
    /// Ordering of pieces yielded in the iterator is guaranteed to be the order in
    /// which they are found in the torrent file as this is necessary to refer to
    /// pieces by their index to other peers.
    pub fn pieces(&self) -> Pieces<'_> {
        Pieces::new(self.v1_pieces())
    }

    /// Iterator over the (file, offset, length, piece index) segments of the
    /// v1 catenation.
    pub fn piece_map(&self) -> PieceMap<'_> {
        PieceMap::new(self.v1_files(), self.piece_len)
    }

    /// File tree of the info dictionary, if the flavor carries one.
    pub fn file_tree(&self) -> Option<&FileTree> {
        self.v2().map(|v2| v2.file_tree())
    }

    /// Flattened v2 files of the info dictionary, in tree order.
    pub fn v2_files(&self) -> Vec<V2File> {
        self.file_tree().map(|tree| tree.files()).unwrap_or_default()
    }

    /// Total length of all payload files, pad files excluded.
    pub fn total_length(&self) -> u64 {
        match self.scheme {
            HashScheme::V1(ref v1) | HashScheme::Hybrid(ref v1, _) => {
                v1.files().iter().filter(|file| !file.is_pad_file()).map(File::length).sum()
            }
            HashScheme::V2(ref v2) => v2.file_tree().total_length(),
        }
    }

    /// Total length of the v1 catenation, pad files included.
    pub fn padded_total_length(&self) -> u64 {
        match self.scheme {
            HashScheme::V1(ref v1) | HashScheme::Hybrid(ref v1, _) => {
                v1.files().iter().map(File::length).sum()
            }
            HashScheme::V2(ref v2) => v2.file_tree().total_length(),
        }
    }

    /// Number of payload files, pad files excluded.
    pub fn file_count(&self) -> usize {
        match self.scheme {
            HashScheme::V1(ref v1) | HashScheme::Hybrid(ref v1, _) => {
                v1.files().iter().filter(|file| !file.is_pad_file()).count()
            }
            HashScheme::V2(ref v2) => v2.file_tree().file_count(),
        }
    }

    /// Retrieve the bencoded bytes for the `Info` dictionary.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode::info_to_bytes(self)
    }

    pub(crate) fn unknown(&self) -> &BTreeMap<Vec<u8>, BencodeMut<'static>> {
        &self.unknown
    }

    fn v1_files(&self) -> &[File] {
        self.v1().map(|v1| v1.files()).unwrap_or(&[])
    }

    fn v1_pieces(&self) -> &[[u8; SHA1_HASH_LEN]] {
        self.v1().map(|v1| v1.pieces()).unwrap_or(&[])
    }

    pub(crate) fn validate(&self) -> ParseResult<()> {
        if self.piece_len < crate::MIN_PIECE_LENGTH as u64 || !self.piece_len.is_power_of_two() {
            return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "piece length".to_owned(),
                details: format!("Piece Length Of {} Is Not A Power Of Two >= {}",
                                 self.piece_len, crate::MIN_PIECE_LENGTH),
            }));
        }

        if let Some(v1) = self.v1() {
            v1.validate(self.piece_len)?;
        }
        if let Some(v2) = self.v2() {
            v2.validate()?;
        }

        if let HashScheme::Hybrid(ref v1, ref v2) = self.scheme {
            validate_hybrid_file_sets(v1, v2)?;
        }

        Ok(())
    }

    fn validate_strict_padding(&self) -> ParseResult<()> {
        let v1 = match self.v1() {
            Some(v1) => v1,
            None => return Ok(()),
        };

        let mut offset = 0;
        let files = v1.files();
        for (index, file) in files.iter().enumerate() {
            offset += file.length();

            if file.is_pad_file() {
                file.validate_pad_naming()?;
                continue;
            }

            let last_real = files.iter().skip(index + 1).all(File::is_pad_file);
            if last_real {
                continue;
            }

            if offset % self.piece_len != 0 {
                let expected_pad = self.piece_len - (offset % self.piece_len);
                let next_is_pad = files.get(index + 1)
                    .map_or(false, |next| next.is_pad_file() && next.length() == expected_pad);

                if !next_is_pad {
                    return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                        details: format!("File {:?} Is Not Followed By A Pad Of {} Bytes",
                                         file.path(), expected_pad),
                    }));
                }
            }
        }

        Ok(())
    }
}

fn validate_hybrid_file_sets(v1: &V1Info, v2: &V2Info) -> ParseResult<()> {
    let real_files: Vec<&File> = v1.files().iter().filter(|file| !file.is_pad_file()).collect();
    let tree_files = v2.file_tree().files();

    if real_files.len() != tree_files.len() {
        return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
            details: format!("Hybrid File Sets Differ In Size: {} (v1) vs {} (v2)",
                             real_files.len(), tree_files.len()),
        }));
    }

    for (v1_file, v2_file) in real_files.iter().zip(tree_files.iter()) {
        let paths_match = v1_file.path_components() == v2_file.path_components();
        let lengths_match = v1_file.length() == v2_file.length();

        if !paths_match || !lengths_match {
            return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                details: format!("Hybrid File Sets Differ At {:?}", v1_file.path()),
            }));
        }
    }

    Ok(())
}

/// Parses the given info dictionary and builds an `Info` from it.
fn parse_info_dictionary(info_bencode: &BencodeRef<'_>, opt: ParseOpt) -> ParseResult<Info> {
    let info_bytes = info_bencode.buffer();
    let v1_hash = Sha1Hash::from_bytes(info_bytes);
    let v2_hash = Sha256Hash::from_bytes(info_bytes);

    let info_dict = parse::parse_root_dict(info_bencode)?;
    let piece_len = parse::parse_piece_length(info_dict)?;
    let is_private = parse::parse_private(info_dict);
    let name = parse::parse_name(info_dict)?.to_vec();
    validate_path_component(&name)?;

    let mut known_keys: Vec<&[u8]> = vec![parse::PIECE_LENGTH_KEY, parse::NAME_KEY];
    known_if(&mut known_keys, parse::PRIVATE_KEY, is_private.is_some());

    let v1 = parse_v1_fields(info_dict, &name, opt, &mut known_keys)?;
    let v2 = parse_v2_fields(info_dict, opt, &mut known_keys)?;

    let scheme = match (v1, v2) {
        (Some(v1), Some(v2)) => HashScheme::Hybrid(v1, v2),
        (Some(v1), None) => HashScheme::V1(v1),
        (None, Some(v2)) => HashScheme::V2(v2),
        (None, None) => {
            return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "info".to_owned(),
                details: "No Recognized Hash Scheme Found".to_owned(),
            }))
        }
    };

    let unknown = collect_unknown(info_dict, &known_keys, opt)?;

    Ok(Info {
        v1_hash,
        v2_hash,
        name,
        piece_len,
        is_private,
        unknown,
        scheme,
    })
}

fn parse_v1_fields<'a>(info_dict: DictRef<'_, '_>, name: &[u8], opt: ParseOpt,
                       known_keys: &mut Vec<&'a [u8]>) -> ParseResult<Option<V1Info>> {
    if info_dict.lookup(parse::PIECES_KEY).is_none() {
        return Ok(None);
    }

    let pieces = allocate_pieces(parse::parse_pieces(info_dict)?)?;
    known_keys.push(parse::PIECES_KEY);

    if info_dict.lookup(parse::FILES_KEY).is_some() {
        let files_bencode = parse::parse_files_list(info_dict)?;
        known_keys.push(parse::FILES_KEY);

        let mut files = Vec::with_capacity(files_bencode.len());
        for file_bencode in files_bencode {
            let file_dict = parse::parse_file_dict(file_bencode)?;

            files.push(File::as_multi_file(file_dict, opt)?);
        }

        let mut file_directory = PathBuf::new();
        file_directory.push(String::from_utf8_lossy(name).into_owned());

        Ok(Some(V1Info {
            file_directory: Some(file_directory),
            files,
            pieces,
        }))
    } else if info_dict.lookup(parse::LENGTH_KEY).is_some() {
        known_keys.push(parse::LENGTH_KEY);
        let md5sum = parse::parse_md5sum(info_dict).map(|md5| md5.to_vec());
        known_if(known_keys, parse::MD5SUM_KEY, md5sum.is_some());

        let file = File {
            len: parse::parse_length(info_dict)?,
            path: vec![name.to_vec()],
            md5sum,
            attr: None,
            symlink_path: None,
            unknown: BTreeMap::new(),
        };

        Ok(Some(V1Info {
            file_directory: None,
            files: vec![file],
            pieces,
        }))
    } else {
        Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
            field: "files".to_owned(),
            details: "Found Pieces Without A Files List Or Length".to_owned(),
        }))
    }
}

fn parse_v2_fields<'a>(info_dict: DictRef<'_, '_>, opt: ParseOpt,
                       known_keys: &mut Vec<&'a [u8]>) -> ParseResult<Option<V2Info>> {
    match parse::parse_meta_version(info_dict) {
        Some(2) => {
            let tree_dict = parse::parse_file_tree(info_dict)?;
            known_keys.push(parse::META_VERSION_KEY);
            known_keys.push(parse::FILE_TREE_KEY);

            let nodes = convert_tree_nodes(tree_dict, opt)?;

            Ok(Some(V2Info { file_tree: FileTree::new(nodes) }))
        }
        Some(version) => {
            Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "meta version".to_owned(),
                details: format!("Unsupported Meta Version {}", version),
            }))
        }
        None => {
            if info_dict.lookup(parse::FILE_TREE_KEY).is_some() {
                Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                    field: "file tree".to_owned(),
                    details: "File Tree Found Without A Meta Version".to_owned(),
                }))
            } else {
                Ok(None)
            }
        }
    }
}

fn convert_tree_nodes(tree_dict: DictRef<'_, '_>, opt: ParseOpt)
                      -> ParseResult<BTreeMap<Vec<u8>, FileTreeNode>> {
    let mut nodes = BTreeMap::new();

    for (component, child_bencode) in tree_dict.to_list() {
        validate_path_component(component)?;

        let child_dict = parse::parse_file_dict(child_bencode)?;

        let node = if child_dict.lookup(parse::FILE_TREE_LEAF_KEY).is_some() {
            if child_dict.to_list().len() != 1 {
                return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                    field: "file tree".to_owned(),
                    details: "File Node Mixes File And Directory Entries".to_owned(),
                }));
            }

            let leaf_bencode = child_dict.lookup(parse::FILE_TREE_LEAF_KEY).unwrap();
            let leaf_dict = parse::parse_file_dict(leaf_bencode)?;

            FileTreeNode::File(convert_tree_leaf(leaf_dict, opt)?)
        } else {
            FileTreeNode::Directory(convert_tree_nodes(child_dict, opt)?)
        };

        nodes.insert(component.to_vec(), node);
    }

    Ok(nodes)
}

fn convert_tree_leaf(leaf_dict: DictRef<'_, '_>, opt: ParseOpt) -> ParseResult<FileTreeLeaf> {
    let length = parse::parse_length(leaf_dict)?;
    let pieces_root_bytes = parse::parse_pieces_root(leaf_dict);

    let pieces_root = match pieces_root_bytes {
        Some(bytes) => {
            Some(Sha256Hash::from_hash(bytes).ok_or_else(|| {
                ParseError::from_kind(ParseErrorKind::SchemaViolation {
                    field: "pieces root".to_owned(),
                    details: "Pieces Root Is Not A 32 Byte Hash".to_owned(),
                })
            })?)
        }
        None => None,
    };

    if length > 0 && pieces_root.is_none() {
        return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
            field: "pieces root".to_owned(),
            details: "Pieces Root Missing For Non Empty File".to_owned(),
        }));
    }
    if length == 0 && pieces_root.is_some() {
        return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
            field: "pieces root".to_owned(),
            details: "Pieces Root Present For Empty File".to_owned(),
        }));
    }

    let mut known_keys: Vec<&[u8]> = vec![parse::LENGTH_KEY];
    known_if(&mut known_keys, parse::PIECES_ROOT_KEY, pieces_root.is_some());

    let unknown = collect_unknown(leaf_dict, &known_keys, opt)?;

    Ok(FileTreeLeaf::new(length, pieces_root, unknown))
}

/// Validates and allocates the hash pieces on the heap.
fn allocate_pieces(pieces: &[u8]) -> ParseResult<Vec<[u8; SHA1_HASH_LEN]>> {
    if pieces.len() % SHA1_HASH_LEN != 0 {
        return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
            field: "pieces".to_owned(),
            details: format!("Piece Hash Length Of {} Is Not A Multiple Of {}",
                             pieces.len(), SHA1_HASH_LEN),
        }));
    }

    let mut hash_buffers = Vec::with_capacity(pieces.len() / SHA1_HASH_LEN);
    for chunk in pieces.chunks(SHA1_HASH_LEN) {
        let mut hash_bytes = [0u8; SHA1_HASH_LEN];
        hash_bytes.copy_from_slice(chunk);

        hash_buffers.push(hash_bytes);
    }

    Ok(hash_buffers)
}

// ----------------------------------------------------------------------------//

/// Contains the file list and piece hashes for the v1 scheme.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct V1Info {
    // Present only for multi file torrents.
    file_directory: Option<PathBuf>,
    files: Vec<File>,
    pieces: Vec<[u8; SHA1_HASH_LEN]>,
}

impl V1Info {
    pub(crate) fn new(file_directory: Option<PathBuf>, files: Vec<File>,
                      pieces: Vec<[u8; SHA1_HASH_LEN]>) -> V1Info {
        V1Info {
            file_directory,
            files,
            pieces,
        }
    }

    /// Some file directory if this is a multi-file torrent, otherwise None.
    pub fn directory(&self) -> Option<&Path> {
        self.file_directory.as_deref()
    }

    /// Ordered list of all files, pad files included.
    pub fn files(&self) -> &[File] {
        &self.files
    }

    /// All v1 piece hashes, in catenation order.
    pub fn pieces(&self) -> &[[u8; SHA1_HASH_LEN]] {
        &self.pieces
    }

    /// The piece hash at the given index.
    pub fn piece(&self, piece_index: u64) -> Option<Sha1Hash> {
        self.pieces.get(piece_index as usize).map(|hash| Sha1Hash::from(*hash))
    }

    fn validate(&self, piece_length: u64) -> ParseResult<()> {
        for file in &self.files {
            file.validate()?;
        }

        let padded_total: u64 = self.files.iter().map(File::length).sum();
        let num_pieces = self.pieces.len() as u64;

        let valid_count = if padded_total == 0 {
            // An empty torrent hashes a single empty piece, though some
            // implementations emit no hashes at all.
            num_pieces <= 1
        } else {
            num_pieces == piece_count(padded_total, piece_length)
        };

        if !valid_count {
            return Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                details: format!("Pieces Count Of {} Inconsistent With Total Length {} And Piece Length {}",
                                 num_pieces, padded_total, piece_length),
            }));
        }

        Ok(())
    }
}

/// Contains the file tree for the v2 scheme.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct V2Info {
    file_tree: FileTree,
}

impl V2Info {
    pub(crate) fn new(file_tree: FileTree) -> V2Info {
        V2Info { file_tree }
    }

    /// File tree of the torrent.
    pub fn file_tree(&self) -> &FileTree {
        &self.file_tree
    }

    fn validate(&self) -> ParseResult<()> {
        for file in self.file_tree.files() {
            for component in file.path_components() {
                validate_path_component(component)?;
            }

            if file.length() > 0 && file.pieces_root().is_none() {
                return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                    field: "pieces root".to_owned(),
                    details: "Pieces Root Missing For Non Empty File".to_owned(),
                }));
            }
        }

        Ok(())
    }
}

// ----------------------------------------------------------------------------//

/// View of the BEP-47 attributes of a file.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FileAttributes {
    /// File should be marked executable.
    pub executable: bool,
    /// File should be hidden.
    pub hidden: bool,
    /// File is a pad file.
    pub padding: bool,
    /// File is a symbolic link.
    pub symlink: bool,
}

impl FileAttributes {
    /// Derive the attribute set from the raw attr byte string.
    pub fn from_attr(attr: &[u8]) -> FileAttributes {
        FileAttributes {
            executable: attr.contains(&b'x'),
            hidden: attr.contains(&b'h'),
            padding: attr.contains(&b'p'),
            symlink: attr.contains(&b'l'),
        }
    }
}

/// Contains information for a single file.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct File {
    len: u64,
    path: Vec<Vec<u8>>,
    md5sum: Option<Vec<u8>>,
    attr: Option<Vec<u8>>,
    symlink_path: Option<Vec<Vec<u8>>>,
    unknown: BTreeMap<Vec<u8>, BencodeMut<'static>>,
}

impl File {
    /// Parse the file dictionary and generate a multi file `File`.
    fn as_multi_file(file_dict: DictRef<'_, '_>, opt: ParseOpt) -> ParseResult<File> {
        let length = parse::parse_length(file_dict)?;
        let md5sum = parse::parse_md5sum(file_dict).map(|md5| md5.to_vec());
        let attr = parse::parse_attr(file_dict).map(|attr| attr.to_vec());

        let path_list_bencode = parse::parse_path_list(file_dict)?;
        let mut path = Vec::with_capacity(path_list_bencode.len());
        for path_bencode in path_list_bencode {
            path.push(parse::parse_path_bytes(path_bencode)?.to_vec());
        }

        let symlink_path = match parse::parse_symlink_path_list(file_dict) {
            Some(symlink_bencode) => {
                let mut components = Vec::with_capacity(symlink_bencode.len());
                for component_bencode in symlink_bencode {
                    components.push(parse::parse_path_bytes(component_bencode)?.to_vec());
                }

                Some(components)
            }
            None => None,
        };

        let mut known_keys: Vec<&[u8]> = vec![parse::LENGTH_KEY, parse::PATH_KEY];
        known_if(&mut known_keys, parse::MD5SUM_KEY, md5sum.is_some());
        known_if(&mut known_keys, parse::ATTR_KEY, attr.is_some());
        known_if(&mut known_keys, parse::SYMLINK_PATH_KEY, symlink_path.is_some());

        let unknown = collect_unknown(file_dict, &known_keys, opt)?;

        Ok(File {
            len: length,
            path,
            md5sum,
            attr,
            symlink_path,
            unknown,
        })
    }

    pub(crate) fn from_parts(len: u64, path: Vec<Vec<u8>>, attr: Option<Vec<u8>>) -> File {
        File {
            len,
            path,
            md5sum: None,
            attr,
            symlink_path: None,
            unknown: BTreeMap::new(),
        }
    }

    /// Create the pad file spanning the gap of the given length.
    pub(crate) fn pad(length: u64) -> File {
        File::from_parts(length,
                         vec![b".pad".to_vec(), length.to_string().into_bytes()],
                         Some(b"p".to_vec()))
    }

    /// Length of the file in bytes.
    pub fn length(&self) -> u64 {
        self.len
    }

    /// Optional md5sum of the file.
    ///
    /// Not used by bittorrent.
    pub fn md5sum(&self) -> Option<&[u8]> {
        self.md5sum.as_deref()
    }

    /// Path of the file, decoded with replacement where needed.
    pub fn path(&self) -> PathBuf {
        let mut path = PathBuf::new();
        for component in &self.path {
            path.push(String::from_utf8_lossy(component).into_owned());
        }

        path
    }

    /// Raw path components of the file.
    pub fn path_components(&self) -> &[Vec<u8>] {
        &self.path
    }

    /// Raw attr byte string of the file.
    pub fn attr(&self) -> Option<&[u8]> {
        self.attr.as_deref()
    }

    /// Attribute view derived from the attr byte string.
    pub fn attributes(&self) -> FileAttributes {
        self.attr().map(FileAttributes::from_attr).unwrap_or_default()
    }

    /// Raw symlink target components of the file.
    pub fn symlink_path_components(&self) -> Option<&[Vec<u8>]> {
        self.symlink_path.as_deref()
    }

    /// Whether or not this is a pad file.
    pub fn is_pad_file(&self) -> bool {
        self.attributes().padding ||
        self.path.first().map_or(false, |component| component == b".pad")
    }

    pub(crate) fn unknown(&self) -> &BTreeMap<Vec<u8>, BencodeMut<'static>> {
        &self.unknown
    }

    fn validate(&self) -> ParseResult<()> {
        if self.path.is_empty() {
            return Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
                field: "path".to_owned(),
                details: "File Has An Empty Path List".to_owned(),
            }));
        }

        for component in &self.path {
            validate_path_component(component)?;
        }

        Ok(())
    }

    fn validate_pad_naming(&self) -> ParseResult<()> {
        let expected_name = self.len.to_string().into_bytes();
        let well_named = self.path.len() == 2 &&
                         self.path[0] == b".pad" &&
                         self.path[1] == expected_name;

        if well_named {
            Ok(())
        } else {
            Err(ParseError::from_kind(ParseErrorKind::CrossFieldInvariant {
                details: format!("Pad File {:?} Is Not Named .pad/{}", self.path(), self.len),
            }))
        }
    }
}
