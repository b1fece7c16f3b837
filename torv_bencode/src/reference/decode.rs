use std::collections::BTreeMap;
use std::str;

use crate::error::{BencodeParseError, BencodeParseErrorKind, BencodeParseResult};
use crate::reference::bencode_ref::{BencodeRef, InnerBencodeRef};
use crate::reference::decode_opt::BDecodeOpt;

/// Decodes the next value out of the given byte buffer at the given position.
///
/// Returns the decoded value as well as the position of the first byte after it.
pub fn decode<'a>(bytes: &'a [u8], pos: usize, opts: BDecodeOpt, depth: usize)
    -> BencodeParseResult<(BencodeRef<'a>, usize)> {
    if depth >= opts.max_recursion() {
        return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidRecursionExceeded {
            pos,
            max: opts.max_recursion(),
        }));
    }
    let curr_byte = peek_byte(bytes, pos)?;

    match curr_byte {
        crate::INT_START => {
            let (value, next_pos) = decode_int(bytes, pos + 1, crate::BEN_END)?;

            Ok((InnerBencodeRef::Int(value, &bytes[pos..next_pos]).into(), next_pos))
        }
        crate::LIST_START => decode_list(bytes, pos, opts, depth),
        crate::DICT_START => decode_dict(bytes, pos, opts, depth),
        crate::BYTE_LEN_LOW..=crate::BYTE_LEN_HIGH => {
            let (value, next_pos) = decode_bytes(bytes, pos)?;

            Ok((InnerBencodeRef::Bytes(value, &bytes[pos..next_pos]).into(), next_pos))
        }
        _ => {
            Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidByte { pos }))
        }
    }
}

fn decode_list<'a>(bytes: &'a [u8], pos: usize, opts: BDecodeOpt, depth: usize)
    -> BencodeParseResult<(BencodeRef<'a>, usize)> {
    let mut list = Vec::new();
    // Consume the list start byte
    let mut next_pos = pos + 1;

    while peek_byte(bytes, next_pos)? != crate::BEN_END {
        let (item, item_end) = decode(bytes, next_pos, opts, depth + 1)?;

        list.push(item);
        next_pos = item_end;
    }
    // Consume the list end byte
    next_pos += 1;

    Ok((InnerBencodeRef::List(list, &bytes[pos..next_pos]).into(), next_pos))
}

fn decode_dict<'a>(bytes: &'a [u8], pos: usize, opts: BDecodeOpt, depth: usize)
    -> BencodeParseResult<(BencodeRef<'a>, usize)> {
    let mut dict = BTreeMap::new();
    let mut last_key: Option<&'a [u8]> = None;
    // Consume the dict start byte
    let mut next_pos = pos + 1;

    loop {
        let curr_byte = peek_byte(bytes, next_pos)?;
        if curr_byte == crate::BEN_END {
            // Consume the dict end byte
            next_pos += 1;
            break;
        }

        // Keys must themselves be byte strings
        if !(crate::BYTE_LEN_LOW..=crate::BYTE_LEN_HIGH).contains(&curr_byte) {
            return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidKeyType { pos: next_pos }));
        }
        let key_pos = next_pos;
        let (key, key_end) = decode_bytes(bytes, next_pos)?;

        // Spec says that duplicate entries are not allowed
        if dict.contains_key(key) {
            return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidKeyDuplicates {
                pos: key_pos,
                key: key.to_vec(),
            }));
        }

        // Spec says that keys must appear in ascending sorted order
        if opts.check_key_sort() {
            if let Some(prev_key) = last_key {
                if key < prev_key {
                    return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidKeyOrdering {
                        pos: key_pos,
                        key: key.to_vec(),
                    }));
                }
            }
        }
        last_key = Some(key);

        let (value, value_end) = decode(bytes, key_end, opts, depth + 1)?;

        dict.insert(key, value);
        next_pos = value_end;
    }

    Ok((InnerBencodeRef::Dict(dict, &bytes[pos..next_pos]).into(), next_pos))
}

/// Returns the parsed integer as well as the position of the first byte after its delimiter.
fn decode_int(bytes: &[u8], pos: usize, delim: u8) -> BencodeParseResult<(i64, usize)> {
    let relative_end_pos = match bytes[pos..].iter().position(|n| *n == delim) {
        Some(end_pos) => end_pos,
        None => {
            return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidIntNoDelimiter { pos }))
        }
    };
    let int_byte_slice = &bytes[pos..pos + relative_end_pos];

    if int_byte_slice.len() > 1 {
        // Negative zero is not allowed (this would not be caught when converting)
        if int_byte_slice[0] == b'-' && int_byte_slice[1] == b'0' {
            return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidIntNegativeZero { pos }));
        }

        // Zero padding is illegal, and unspecified for key lengths (we disallow both)
        if int_byte_slice[0] == b'0' {
            return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidIntZeroPadding { pos }));
        }
    }

    let int_str = match str::from_utf8(int_byte_slice) {
        Ok(n) => n,
        Err(_) => {
            return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidIntParseError { pos }))
        }
    };

    // Position of end of integer type, next byte is the start of the next value
    let absolute_end_pos = pos + relative_end_pos;
    match int_str.parse::<i64>() {
        Ok(n) => Ok((n, absolute_end_pos + 1)),
        Err(_) => Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidIntParseError { pos })),
    }
}

/// Returns the byte string as well as the position of the first byte after it.
fn decode_bytes(bytes: &[u8], pos: usize) -> BencodeParseResult<(&[u8], usize)> {
    let (num_bytes, start_pos) = decode_int(bytes, pos, crate::BYTE_LEN_END)?;

    if num_bytes < 0 {
        return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidLengthNegative { pos }));
    }
    let num_bytes = num_bytes as usize;

    if num_bytes > bytes[start_pos..].len() {
        return Err(BencodeParseError::from_kind(BencodeParseErrorKind::InvalidLengthOverflow { pos }));
    }

    let end_pos = start_pos + num_bytes;
    Ok((&bytes[start_pos..end_pos], end_pos))
}

fn peek_byte(bytes: &[u8], pos: usize) -> BencodeParseResult<u8> {
    bytes.get(pos)
        .copied()
        .ok_or_else(|| BencodeParseError::from_kind(BencodeParseErrorKind::BytesEmpty { pos }))
}

#[cfg(test)]
mod tests {
    use crate::access::bencode::BRefAccess;
    use crate::error::BencodeParseErrorKind;
    use crate::reference::bencode_ref::BencodeRef;
    use crate::reference::decode_opt::BDecodeOpt;

    // Positive Cases
    const GENERAL: &[u8] = b"d0:12:zero_len_key8:location17:udp://test.com:8011:nested dictd4:listli-500500eeee";
    const BYTES_UTF8: &[u8] = b"16:valid_utf8_bytes";
    const DICTIONARY: &[u8] = b"d9:test_dictd10:nested_key12:nested_value11:nested_listli500ei-500ei0eee8:test_key10:test_valuee";
    const LIST: &[u8] = b"l10:test_bytesi500ei0ei-500el12:nested_bytesed8:test_key10:test_valueee";
    const BYTES: &[u8] = b"5:\xC5\xE6\xBE\xE6\xF2";
    const BYTES_ZERO_LEN: &[u8] = b"0:";
    const INT: &[u8] = b"i500e";
    const INT_NEGATIVE: &[u8] = b"i-500e";
    const INT_ZERO: &[u8] = b"i0e";

    // Negative Cases
    const BYTES_NEG_LEN: &[u8] = b"-4:test";
    const BYTES_EXTRA: &[u8] = b"l15:processed_bytese17:unprocessed_bytes";
    const BYTES_NOT_UTF8: &[u8] = b"5:\xC5\xE6\xBE\xE6\xF2";
    const INT_NAN: &[u8] = b"i500a500e";
    const INT_LEADING_ZERO: &[u8] = b"i0500e";
    const INT_DOUBLE_ZERO: &[u8] = b"i00e";
    const INT_NEGATIVE_ZERO: &[u8] = b"i-0e";
    const INT_DOUBLE_NEGATIVE: &[u8] = b"i--5e";
    const INT_UNTERMINATED: &[u8] = b"i500";
    const DICT_UNORDERED_KEYS: &[u8] = b"d5:z_key5:value5:a_key5:valuee";
    const DICT_DUP_KEYS_SAME_DATA: &[u8] = b"d5:a_keyi0e5:a_keyi0ee";
    const DICT_DUP_KEYS_DIFF_DATA: &[u8] = b"d5:a_keyi0e5:a_key7:a_valuee";
    const DICT_NON_STRING_KEY: &[u8] = b"di5e5:valuee";
    const DICT_UNTERMINATED: &[u8] = b"d5:a_keyi0e";
    const DEEP_RECURSION: &[u8] = b"lllllllllllleeeeeeeeeeee";

    #[test]
    fn positive_decode_general() {
        let bencode = BencodeRef::decode(GENERAL, BDecodeOpt::default()).unwrap();

        let ben_dict = bencode.dict().unwrap();
        assert_eq!(ben_dict.lookup(b"").unwrap().str().unwrap(), "zero_len_key");
        assert_eq!(ben_dict.lookup(b"location").unwrap().str().unwrap(),
                   "udp://test.com:80");

        let nested_dict = ben_dict.lookup(b"nested dict").unwrap().dict().unwrap();
        let nested_list = nested_dict.lookup(b"list").unwrap().list().unwrap();
        assert_eq!(nested_list.get(0).unwrap().int().unwrap(), -500500i64);
    }

    #[test]
    fn positive_decode_bytes_utf8() {
        let bencode = BencodeRef::decode(BYTES_UTF8, BDecodeOpt::default()).unwrap();

        assert_eq!(bencode.str().unwrap(), "valid_utf8_bytes");
    }

    #[test]
    fn positive_decode_dict() {
        let bencode = BencodeRef::decode(DICTIONARY, BDecodeOpt::default()).unwrap();
        let dict = bencode.dict().unwrap();
        assert_eq!(dict.lookup(b"test_key").unwrap().str().unwrap(), "test_value");

        let nested_dict = dict.lookup(b"test_dict").unwrap().dict().unwrap();
        assert_eq!(nested_dict.lookup(b"nested_key").unwrap().str().unwrap(),
                   "nested_value");

        let nested_list = nested_dict.lookup(b"nested_list").unwrap().list().unwrap();
        assert_eq!(nested_list.get(0).unwrap().int().unwrap(), 500i64);
        assert_eq!(nested_list.get(1).unwrap().int().unwrap(), -500i64);
        assert_eq!(nested_list.get(2).unwrap().int().unwrap(), 0i64);
    }

    #[test]
    fn positive_decode_list() {
        let bencode = BencodeRef::decode(LIST, BDecodeOpt::default()).unwrap();
        let list = bencode.list().unwrap();

        assert_eq!(list.get(0).unwrap().str().unwrap(), "test_bytes");
        assert_eq!(list.get(1).unwrap().int().unwrap(), 500i64);
        assert_eq!(list.get(2).unwrap().int().unwrap(), 0i64);
        assert_eq!(list.get(3).unwrap().int().unwrap(), -500i64);

        let nested_list = list.get(4).unwrap().list().unwrap();
        assert_eq!(nested_list.get(0).unwrap().str().unwrap(), "nested_bytes");

        let nested_dict = list.get(5).unwrap().dict().unwrap();
        assert_eq!(nested_dict.lookup(b"test_key").unwrap().str().unwrap(),
                   "test_value");
    }

    #[test]
    fn positive_decode_bytes() {
        let bytes = super::decode_bytes(BYTES, 0).unwrap().0;
        assert_eq!(bytes.len(), 5);
        assert_eq!(bytes[0] as char, 'Å');
        assert_eq!(bytes[1] as char, 'æ');
        assert_eq!(bytes[2] as char, '¾');
        assert_eq!(bytes[3] as char, 'æ');
        assert_eq!(bytes[4] as char, 'ò');
    }

    #[test]
    fn positive_decode_bytes_zero_len() {
        let bytes = super::decode_bytes(BYTES_ZERO_LEN, 0).unwrap().0;
        assert_eq!(bytes.len(), 0);
    }

    #[test]
    fn positive_decode_int() {
        let int_value = super::decode_int(INT, 1, crate::BEN_END).unwrap().0;
        assert_eq!(int_value, 500i64);
    }

    #[test]
    fn positive_decode_int_negative() {
        let int_value = super::decode_int(INT_NEGATIVE, 1, crate::BEN_END).unwrap().0;
        assert_eq!(int_value, -500i64);
    }

    #[test]
    fn positive_decode_int_zero() {
        let int_value = super::decode_int(INT_ZERO, 1, crate::BEN_END).unwrap().0;
        assert_eq!(int_value, 0i64);
    }

    #[test]
    fn positive_decode_unordered_keys_without_check() {
        let opts = BDecodeOpt::new(50, false, true);
        let bencode = BencodeRef::decode(DICT_UNORDERED_KEYS, opts).unwrap();

        let dict = bencode.dict().unwrap();
        assert_eq!(dict.lookup(b"a_key").unwrap().str().unwrap(), "value");
        assert_eq!(dict.lookup(b"z_key").unwrap().str().unwrap(), "value");
    }

    #[test]
    fn negative_decode_bytes_neg_len() {
        BencodeRef::decode(BYTES_NEG_LEN, BDecodeOpt::default()).unwrap_err();
    }

    #[test]
    fn negative_decode_bytes_extra() {
        let error = BencodeRef::decode(BYTES_EXTRA, BDecodeOpt::default()).unwrap_err();

        match error.kind() {
            BencodeParseErrorKind::TrailingBytes { pos } => assert_eq!(*pos, 20),
            _ => panic!("Expected TrailingBytes Error"),
        }
    }

    #[test]
    fn negative_decode_bytes_not_utf8() {
        let bencode = BencodeRef::decode(BYTES_NOT_UTF8, BDecodeOpt::default()).unwrap();

        assert!(bencode.str().is_none());
    }

    #[test]
    fn negative_decode_int_nan() {
        super::decode_int(INT_NAN, 1, crate::BEN_END).unwrap_err();
    }

    #[test]
    fn negative_decode_int_leading_zero() {
        super::decode_int(INT_LEADING_ZERO, 1, crate::BEN_END).unwrap_err();
    }

    #[test]
    fn negative_decode_int_double_zero() {
        super::decode_int(INT_DOUBLE_ZERO, 1, crate::BEN_END).unwrap_err();
    }

    #[test]
    fn negative_decode_int_negative_zero() {
        super::decode_int(INT_NEGATIVE_ZERO, 1, crate::BEN_END).unwrap_err();
    }

    #[test]
    fn negative_decode_int_double_negative() {
        super::decode_int(INT_DOUBLE_NEGATIVE, 1, crate::BEN_END).unwrap_err();
    }

    #[test]
    fn negative_decode_int_unterminated() {
        let error = super::decode_int(INT_UNTERMINATED, 1, crate::BEN_END).unwrap_err();

        match error.kind() {
            BencodeParseErrorKind::InvalidIntNoDelimiter { .. } => (),
            _ => panic!("Expected InvalidIntNoDelimiter Error"),
        }
    }

    #[test]
    fn negative_decode_dict_unordered_keys() {
        let error = BencodeRef::decode(DICT_UNORDERED_KEYS, BDecodeOpt::default()).unwrap_err();

        match error.kind() {
            BencodeParseErrorKind::InvalidKeyOrdering { pos, key } => {
                assert_eq!(*pos, 15);
                assert_eq!(&key[..], b"a_key");
            }
            _ => panic!("Expected InvalidKeyOrdering Error"),
        }
    }

    #[test]
    fn negative_decode_dict_dup_keys_same_data() {
        BencodeRef::decode(DICT_DUP_KEYS_SAME_DATA, BDecodeOpt::default()).unwrap_err();
    }

    #[test]
    fn negative_decode_dict_dup_keys_diff_data() {
        let error = BencodeRef::decode(DICT_DUP_KEYS_DIFF_DATA, BDecodeOpt::default()).unwrap_err();

        match error.kind() {
            BencodeParseErrorKind::InvalidKeyDuplicates { key, .. } => assert_eq!(&key[..], b"a_key"),
            _ => panic!("Expected InvalidKeyDuplicates Error"),
        }
    }

    #[test]
    fn negative_decode_dict_non_string_key() {
        let error = BencodeRef::decode(DICT_NON_STRING_KEY, BDecodeOpt::default()).unwrap_err();

        match error.kind() {
            BencodeParseErrorKind::InvalidKeyType { pos } => assert_eq!(*pos, 1),
            _ => panic!("Expected InvalidKeyType Error"),
        }
    }

    #[test]
    fn negative_decode_dict_unterminated() {
        let error = BencodeRef::decode(DICT_UNTERMINATED, BDecodeOpt::default()).unwrap_err();

        match error.kind() {
            BencodeParseErrorKind::BytesEmpty { .. } => (),
            _ => panic!("Expected BytesEmpty Error"),
        }
    }

    #[test]
    fn negative_decode_recursion_exceeded() {
        let error = BencodeRef::decode(DEEP_RECURSION, BDecodeOpt::new(5, true, true)).unwrap_err();

        match error.kind() {
            BencodeParseErrorKind::InvalidRecursionExceeded { .. } => (),
            _ => panic!("Expected InvalidRecursionExceeded Error"),
        }
    }
}
