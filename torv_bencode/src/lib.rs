//! Library for strict parsing and canonical encoding of bencoded data.
//!
//! # Examples
//!
//! Decoding bencoded data:
//!
//! ```rust
//!     use torv_bencode::{BDecodeOpt, BRefAccess, BencodeRef};
//!
//!     let data = b"d12:lucky_numberi7ee";
//!     let bencode = BencodeRef::decode(data, BDecodeOpt::default()).unwrap();
//!
//!     assert_eq!(7, bencode.dict().unwrap().lookup(b"lucky_number")
//!         .unwrap().int().unwrap());
//! ```
//!
//! Encoding bencoded data:
//!
//! ```rust
//!     use torv_bencode::{ben_bytes, ben_int, ben_map};
//!
//!     let message = (ben_map!{
//!         "lucky_number" => ben_int!(7)
//!     }).encode();
//!
//!     assert_eq!(&b"d12:lucky_numberi7ee"[..], &message[..]);
//! ```

#[macro_use]
extern crate error_chain;

mod access;
mod error;
mod mutable;
mod reference;

pub use crate::access::bencode::{BMutAccess, BRefAccess, BencodeMutKind, BencodeRefKind};
pub use crate::access::convert::BConvert;
pub use crate::access::dict::BDictAccess;
pub use crate::access::list::{BListAccess, BListIter};
pub use crate::error::{BencodeConvertError, BencodeConvertErrorKind, BencodeConvertResult};
pub use crate::error::{BencodeParseError, BencodeParseErrorKind, BencodeParseResult};
pub use crate::mutable::bencode_mut::BencodeMut;
pub use crate::reference::bencode_ref::BencodeRef;
pub use crate::reference::decode_opt::BDecodeOpt;

pub(crate) const BEN_END: u8 = b'e';
pub(crate) const DICT_START: u8 = b'd';
pub(crate) const LIST_START: u8 = b'l';
pub(crate) const INT_START: u8 = b'i';

pub(crate) const BYTE_LEN_LOW: u8 = b'0';
pub(crate) const BYTE_LEN_HIGH: u8 = b'9';
pub(crate) const BYTE_LEN_END: u8 = b':';

/// Construct a `BencodeMut` map by supplying string references as keys and `BencodeMut` as values.
#[macro_export]
macro_rules! ben_map {
    ( $($key:expr => $val:expr),* ) => {
        {
            use std::convert::AsRef;
            use $crate::{BMutAccess, BencodeMut};

            let mut bencode_map = BencodeMut::new_dict();
            {
                let map = bencode_map.dict_mut().unwrap();
                $(
                    map.insert(AsRef::<[u8]>::as_ref($key).into(), $val);
                )*
            }
            bencode_map
        }
    }
}

/// Construct a `BencodeMut` list by supplying a list of `BencodeMut` values.
#[macro_export]
macro_rules! ben_list {
    ( $($ben:expr),* ) => {
        {
            use $crate::{BMutAccess, BencodeMut};

            let mut bencode_list = BencodeMut::new_list();
            {
                let list = bencode_list.list_mut().unwrap();
                $(
                    list.push($ben);
                )*
            }
            bencode_list
        }
    }
}

/// Construct `BencodeMut` bytes by supplying a type convertible to `&[u8]`.
#[macro_export]
macro_rules! ben_bytes {
    ( $ben:expr ) => {
        {
            use std::convert::AsRef;
            use $crate::BencodeMut;

            BencodeMut::new_bytes(AsRef::<[u8]>::as_ref($ben).into())
        }
    }
}

/// Construct a `BencodeMut` integer by supplying an `i64`.
#[macro_export]
macro_rules! ben_int {
    ( $ben:expr ) => {
        {
            use $crate::BencodeMut;

            BencodeMut::new_int($ben)
        }
    }
}
