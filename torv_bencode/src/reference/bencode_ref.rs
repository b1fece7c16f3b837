use std::borrow::Cow;
use std::collections::BTreeMap;
use std::str;

use crate::access::bencode::{BMutAccess, BRefAccess, BencodeRefKind};
use crate::access::dict::BDictAccess;
use crate::access::list::BListAccess;
use crate::error::{BencodeParseError, BencodeParseErrorKind, BencodeParseResult};
use crate::mutable::bencode_mut::BencodeMut;
use crate::mutable::encode;
use crate::reference::decode;
use crate::reference::decode_opt::BDecodeOpt;

/// Bencode object that holds references to the underlying data.
#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub enum InnerBencodeRef<'a> {
    /// Bencode Integer.
    Int(i64, &'a [u8]),
    /// Bencode Bytes.
    Bytes(&'a [u8], &'a [u8]),
    /// Bencode List.
    List(Vec<BencodeRef<'a>>, &'a [u8]),
    /// Bencode Dictionary.
    Dict(BTreeMap<&'a [u8], BencodeRef<'a>>, &'a [u8]),
}

impl<'a> Into<BencodeRef<'a>> for InnerBencodeRef<'a> {
    fn into(self) -> BencodeRef<'a> {
        BencodeRef { inner: self }
    }
}

/// Bencode object that holds references to the underlying data.
#[derive(Debug, Eq, PartialEq, Clone, Hash)]
pub struct BencodeRef<'a> {
    inner: InnerBencodeRef<'a>,
}

impl<'a> BencodeRef<'a> {
    /// Decode the given bytes into a `BencodeRef`.
    pub fn decode(bytes: &'a [u8], opts: BDecodeOpt) -> BencodeParseResult<BencodeRef<'a>> {
        // Apply try so any errors return before the eof check
        let (bencode, end_pos) = decode::decode(bytes, 0, opts, 0)?;

        if opts.enforce_full_decode() && end_pos != bytes.len() {
            return Err(BencodeParseError::from_kind(BencodeParseErrorKind::TrailingBytes { pos: end_pos }));
        }

        Ok(bencode)
    }

    /// Slice of the input buffer that this value occupied.
    ///
    /// For the root value this is the whole decoded input; for nested values
    /// it is the exact sub slice, which callers can hash or split off without
    /// re-encoding the value.
    pub fn buffer(&self) -> &'a [u8] {
        match self.inner {
            InnerBencodeRef::Int(_, buffer) => buffer,
            InnerBencodeRef::Bytes(_, buffer) => buffer,
            InnerBencodeRef::List(_, buffer) => buffer,
            InnerBencodeRef::Dict(_, buffer) => buffer,
        }
    }

    /// Re-encode the value canonically.
    pub fn encode(&self) -> Vec<u8> {
        let mut buffer = Vec::new();

        encode::encode(self, &mut buffer);

        buffer
    }

    /// Deep copy the value into an owned `BencodeMut`.
    pub fn to_mut(&self) -> BencodeMut<'static> {
        match self.inner {
            InnerBencodeRef::Int(value, _) => BencodeMut::new_int(value),
            InnerBencodeRef::Bytes(value, _) => BencodeMut::new_bytes(Cow::Owned(value.to_vec())),
            InnerBencodeRef::List(ref values, _) => {
                let mut bencode_list = BencodeMut::new_list();

                {
                    let list = bencode_list.list_mut().unwrap();
                    for value in values {
                        list.push(value.to_mut());
                    }
                }

                bencode_list
            }
            InnerBencodeRef::Dict(ref values, _) => {
                let mut bencode_dict = BencodeMut::new_dict();

                {
                    let dict = bencode_dict.dict_mut().unwrap();
                    for (&key, value) in values {
                        dict.insert(Cow::Owned(key.to_vec()), value.to_mut());
                    }
                }

                bencode_dict
            }
        }
    }
}

impl<'a> BRefAccess for BencodeRef<'a> {
    type BKey = &'a [u8];
    type BType = BencodeRef<'a>;

    fn kind<'b>(&'b self) -> BencodeRefKind<'b, &'a [u8], BencodeRef<'a>> {
        match self.inner {
            InnerBencodeRef::Int(n, _) => BencodeRefKind::Int(n),
            InnerBencodeRef::Bytes(n, _) => BencodeRefKind::Bytes(n),
            InnerBencodeRef::List(ref n, _) => BencodeRefKind::List(n),
            InnerBencodeRef::Dict(ref n, _) => BencodeRefKind::Dict(n),
        }
    }

    fn str(&self) -> Option<&str> {
        let bytes = self.bytes()?;

        str::from_utf8(bytes).ok()
    }

    fn int(&self) -> Option<i64> {
        match self.inner {
            InnerBencodeRef::Int(n, _) => Some(n),
            _ => None,
        }
    }

    fn bytes(&self) -> Option<&[u8]> {
        match self.inner {
            InnerBencodeRef::Bytes(n, _) => Some(n),
            _ => None,
        }
    }

    fn list(&self) -> Option<&dyn BListAccess<BencodeRef<'a>>> {
        match self.inner {
            InnerBencodeRef::List(ref n, _) => Some(n),
            _ => None,
        }
    }

    fn dict(&self) -> Option<&dyn BDictAccess<&'a [u8], BencodeRef<'a>>> {
        match self.inner {
            InnerBencodeRef::Dict(ref n, _) => Some(n),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::access::bencode::BRefAccess;
    use crate::reference::bencode_ref::BencodeRef;
    use crate::reference::decode_opt::BDecodeOpt;

    #[test]
    fn positive_buffer_spans_nested_value() {
        let bytes = b"d4:infod6:lengthi5eee";
        let bencode = BencodeRef::decode(bytes, BDecodeOpt::default()).unwrap();

        let info = bencode.dict().unwrap().lookup(b"info").unwrap();
        assert_eq!(info.buffer(), &b"d6:lengthi5ee"[..]);
    }

    #[test]
    fn positive_decode_then_encode_identical() {
        let bytes = b"d1:ali1ei2ee1:b4:data1:cd1:di-3eee";
        let bencode = BencodeRef::decode(bytes, BDecodeOpt::default()).unwrap();

        assert_eq!(&bencode.encode()[..], &bytes[..]);
    }

    #[test]
    fn positive_to_mut_matches_encode() {
        let bytes = b"d1:ali1ei2ee1:b4:datae";
        let bencode = BencodeRef::decode(bytes, BDecodeOpt::default()).unwrap();

        assert_eq!(&bencode.to_mut().encode()[..], &bytes[..]);
    }
}
