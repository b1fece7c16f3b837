use torv_bencode::{BConvert, BDictAccess, BListAccess, BRefAccess, BencodeConvertError, BencodeRef};

use crate::error::{ParseError, ParseErrorKind, ParseResult};

/// Struct implementing the `BConvert` trait for decoding the metainfo file.
struct MetainfoConverter;

impl BConvert for MetainfoConverter {
    type Error = ParseError;

    fn handle_error(&self, error: BencodeConvertError) -> ParseError {
        error.into()
    }
}

/// Global instance for our conversion struct.
const CONVERT: MetainfoConverter = MetainfoConverter;

/// Used as an error key to refer to the root bencode object.
pub const ROOT_ERROR_KEY: &[u8] = b"root";

/// Keys found within the root dictionary of a metainfo file.
pub const ANNOUNCE_LIST_KEY: &[u8] = b"announce-list";
pub const ANNOUNCE_URL_KEY: &[u8] = b"announce";
pub const COMMENT_KEY: &[u8] = b"comment";
pub const CREATED_BY_KEY: &[u8] = b"created by";
pub const CREATION_DATE_KEY: &[u8] = b"creation date";
pub const ENCODING_KEY: &[u8] = b"encoding";
pub const INFO_KEY: &[u8] = b"info";
pub const PIECE_LAYERS_KEY: &[u8] = b"piece layers";
pub const URL_LIST_KEY: &[u8] = b"url-list";

/// Keys found within the info dictionary of a metainfo file.
pub const FILES_KEY: &[u8] = b"files";
pub const FILE_TREE_KEY: &[u8] = b"file tree";
pub const META_VERSION_KEY: &[u8] = b"meta version";
pub const NAME_KEY: &[u8] = b"name";
pub const PIECES_KEY: &[u8] = b"pieces";
pub const PIECE_LENGTH_KEY: &[u8] = b"piece length";
pub const PRIVATE_KEY: &[u8] = b"private";

/// Keys found within the files dictionaries of a metainfo file.
pub const ATTR_KEY: &[u8] = b"attr";
pub const LENGTH_KEY: &[u8] = b"length";
pub const MD5SUM_KEY: &[u8] = b"md5sum";
pub const PATH_KEY: &[u8] = b"path";
pub const SYMLINK_PATH_KEY: &[u8] = b"symlink path";

/// Key marking a file leaf within a v2 file tree.
pub const FILE_TREE_LEAF_KEY: &[u8] = b"";
pub const PIECES_ROOT_KEY: &[u8] = b"pieces root";

/// Dictionary access for decoded metainfo structures.
pub type DictRef<'b, 'a> = &'b dyn BDictAccess<&'a [u8], BencodeRef<'a>>;

/// List access for decoded metainfo structures.
pub type ListRef<'b, 'a> = &'b dyn BListAccess<BencodeRef<'a>>;

/// Parses the root bencode as a dictionary.
pub fn parse_root_dict<'b, 'a>(root_bencode: &'b BencodeRef<'a>) -> ParseResult<DictRef<'b, 'a>> {
    CONVERT.convert_dict(root_bencode, ROOT_ERROR_KEY)
}

/// Parses the announce url from the root dictionary.
pub fn parse_announce_url<'b, 'a>(root_dict: DictRef<'b, 'a>) -> Option<&'b str> {
    CONVERT.lookup_and_convert_str(root_dict, ANNOUNCE_URL_KEY).ok()
}

/// Parses the announce list from the root dictionary.
pub fn parse_announce_list<'b, 'a>(root_dict: DictRef<'b, 'a>) -> Option<ListRef<'b, 'a>> {
    CONVERT.lookup_and_convert_list(root_dict, ANNOUNCE_LIST_KEY).ok()
}

/// Converts the announce list to a list of tiers of tracker urls.
pub fn convert_announce_list<'b, 'a>(announce_list: ListRef<'b, 'a>) -> Vec<Vec<String>> {
    announce_list.into_iter()
        .filter_map(|tier| tier.list())
        .map(|tier| {
            tier.into_iter()
                .filter_map(|tracker| tracker.str())
                .map(String::from)
                .collect()
        })
        .collect()
}

/// Parses the comment from the root dictionary.
pub fn parse_comment<'b, 'a>(root_dict: DictRef<'b, 'a>) -> Option<&'b str> {
    CONVERT.lookup_and_convert_str(root_dict, COMMENT_KEY).ok()
}

/// Parses the created by from the root dictionary.
pub fn parse_created_by<'b, 'a>(root_dict: DictRef<'b, 'a>) -> Option<&'b str> {
    CONVERT.lookup_and_convert_str(root_dict, CREATED_BY_KEY).ok()
}

/// Parses the creation date from the root dictionary.
pub fn parse_creation_date<'b, 'a>(root_dict: DictRef<'b, 'a>) -> Option<i64> {
    CONVERT.lookup_and_convert_int(root_dict, CREATION_DATE_KEY).ok()
}

/// Parses the encoding from the root dictionary.
pub fn parse_encoding<'b, 'a>(root_dict: DictRef<'b, 'a>) -> Option<&'b str> {
    CONVERT.lookup_and_convert_str(root_dict, ENCODING_KEY).ok()
}

/// Parses the webseed url list from the root dictionary.
///
/// The key holds either a single url or a list of urls on the wire; both
/// forms are folded into a list.
pub fn parse_url_list<'b, 'a>(root_dict: DictRef<'b, 'a>) -> Vec<String> {
    match root_dict.lookup(URL_LIST_KEY) {
        Some(bencode) => {
            if let Some(url) = bencode.str() {
                vec![url.to_owned()]
            } else if let Some(urls) = bencode.list() {
                urls.into_iter()
                    .filter_map(|url| url.str())
                    .map(String::from)
                    .collect()
            } else {
                Vec::new()
            }
        }
        None => Vec::new(),
    }
}

/// Parses the piece layers dictionary from the root dictionary.
pub fn parse_piece_layers<'b, 'a>(root_dict: DictRef<'b, 'a>) -> ParseResult<Option<DictRef<'b, 'a>>> {
    if root_dict.lookup(PIECE_LAYERS_KEY).is_none() {
        return Ok(None);
    }

    CONVERT.lookup_and_convert_dict(root_dict, PIECE_LAYERS_KEY).map(Some)
}

/// Parses the info dictionary bencode from the root dictionary.
pub fn parse_info_bencode<'b, 'a>(root_dict: DictRef<'b, 'a>) -> ParseResult<&'b BencodeRef<'a>> {
    CONVERT.lookup(root_dict, INFO_KEY)
}

// ----------------------------------------------------------------------------//

/// Parses the piece length from the info dictionary.
pub fn parse_piece_length<'b, 'a>(info_dict: DictRef<'b, 'a>) -> ParseResult<u64> {
    let piece_length = CONVERT.lookup_and_convert_int(info_dict, PIECE_LENGTH_KEY)?;

    require_non_negative(piece_length, PIECE_LENGTH_KEY)
}

/// Parses the pieces from the info dictionary.
pub fn parse_pieces<'b, 'a>(info_dict: DictRef<'b, 'a>) -> ParseResult<&'b [u8]> {
    CONVERT.lookup_and_convert_bytes(info_dict, PIECES_KEY)
}

/// Parses the private flag from the info dictionary.
pub fn parse_private<'b, 'a>(info_dict: DictRef<'b, 'a>) -> Option<bool> {
    CONVERT.lookup_and_convert_int(info_dict, PRIVATE_KEY).ok().map(|private| private == 1)
}

/// Parses the raw name from the info dictionary.
pub fn parse_name<'b, 'a>(info_dict: DictRef<'b, 'a>) -> ParseResult<&'b [u8]> {
    CONVERT.lookup_and_convert_bytes(info_dict, NAME_KEY)
}

/// Parses the meta version from the info dictionary.
pub fn parse_meta_version<'b, 'a>(info_dict: DictRef<'b, 'a>) -> Option<i64> {
    CONVERT.lookup_and_convert_int(info_dict, META_VERSION_KEY).ok()
}

/// Parses the files list from the info dictionary.
pub fn parse_files_list<'b, 'a>(info_dict: DictRef<'b, 'a>) -> ParseResult<ListRef<'b, 'a>> {
    CONVERT.lookup_and_convert_list(info_dict, FILES_KEY)
}

/// Parses the file tree dictionary from the info dictionary.
pub fn parse_file_tree<'b, 'a>(info_dict: DictRef<'b, 'a>) -> ParseResult<DictRef<'b, 'a>> {
    CONVERT.lookup_and_convert_dict(info_dict, FILE_TREE_KEY)
}

// ----------------------------------------------------------------------------//

/// Parses the file dictionary from the file bencode.
pub fn parse_file_dict<'b, 'a>(file_bencode: &'b BencodeRef<'a>) -> ParseResult<DictRef<'b, 'a>> {
    CONVERT.convert_dict(file_bencode, FILES_KEY)
}

/// Parses the length from the info or file dictionary.
pub fn parse_length<'b, 'a>(info_or_file_dict: DictRef<'b, 'a>) -> ParseResult<u64> {
    let length = CONVERT.lookup_and_convert_int(info_or_file_dict, LENGTH_KEY)?;

    require_non_negative(length, LENGTH_KEY)
}

/// Parses the md5sum from the info or file dictionary.
pub fn parse_md5sum<'b, 'a>(info_or_file_dict: DictRef<'b, 'a>) -> Option<&'b [u8]> {
    CONVERT.lookup_and_convert_bytes(info_or_file_dict, MD5SUM_KEY).ok()
}

/// Parses the attr byte string from a file dictionary.
pub fn parse_attr<'b, 'a>(file_dict: DictRef<'b, 'a>) -> Option<&'b [u8]> {
    CONVERT.lookup_and_convert_bytes(file_dict, ATTR_KEY).ok()
}

/// Parses the path list from the file dictionary.
pub fn parse_path_list<'b, 'a>(file_dict: DictRef<'b, 'a>) -> ParseResult<ListRef<'b, 'a>> {
    CONVERT.lookup_and_convert_list(file_dict, PATH_KEY)
}

/// Parses the symlink path list from the file dictionary.
pub fn parse_symlink_path_list<'b, 'a>(file_dict: DictRef<'b, 'a>) -> Option<ListRef<'b, 'a>> {
    CONVERT.lookup_and_convert_list(file_dict, SYMLINK_PATH_KEY).ok()
}

/// Parses one raw path component from the path bencode.
pub fn parse_path_bytes<'b, 'a>(path_bencode: &'b BencodeRef<'a>) -> ParseResult<&'b [u8]> {
    CONVERT.convert_bytes(path_bencode, PATH_KEY)
}

/// Parses the pieces root from a file tree leaf dictionary.
pub fn parse_pieces_root<'b, 'a>(leaf_dict: DictRef<'b, 'a>) -> Option<&'b [u8]> {
    CONVERT.lookup_and_convert_bytes(leaf_dict, PIECES_ROOT_KEY).ok()
}

fn require_non_negative(value: i64, field: &[u8]) -> ParseResult<u64> {
    if value < 0 {
        Err(ParseError::from_kind(ParseErrorKind::SchemaViolation {
            field: String::from_utf8_lossy(field).into_owned(),
            details: format!("Negative Value {} Is Not Allowed", value),
        }))
    } else {
        Ok(value as u64)
    }
}
