use crate::access::dict::BDictAccess;
use crate::access::list::BListAccess;

/// Abstract representation of a `BencodeRef` object.
pub enum BencodeRefKind<'b, K, T> {
    /// Bencode Integer.
    Int(i64),
    /// Bencode Bytes.
    Bytes(&'b [u8]),
    /// Bencode List.
    List(&'b dyn BListAccess<T>),
    /// Bencode Dictionary.
    Dict(&'b dyn BDictAccess<K, T>),
}

/// Trait for read access to some bencode type.
pub trait BRefAccess: Sized {
    type BKey;
    type BType: BRefAccess<BKey = Self::BKey>;

    fn kind<'b>(&'b self) -> BencodeRefKind<'b, Self::BKey, Self::BType>;

    fn str(&self) -> Option<&str>;

    fn int(&self) -> Option<i64>;

    fn bytes(&self) -> Option<&[u8]>;

    fn list(&self) -> Option<&dyn BListAccess<Self::BType>>;

    fn dict(&self) -> Option<&dyn BDictAccess<Self::BKey, Self::BType>>;
}

impl<'a, T> BRefAccess for &'a T
    where T: BRefAccess {
    type BKey = T::BKey;
    type BType = T::BType;

    fn kind<'b>(&'b self) -> BencodeRefKind<'b, Self::BKey, Self::BType> {
        (*self).kind()
    }

    fn str(&self) -> Option<&str> {
        (*self).str()
    }

    fn int(&self) -> Option<i64> {
        (*self).int()
    }

    fn bytes(&self) -> Option<&[u8]> {
        (*self).bytes()
    }

    fn list(&self) -> Option<&dyn BListAccess<Self::BType>> {
        (*self).list()
    }

    fn dict(&self) -> Option<&dyn BDictAccess<Self::BKey, Self::BType>> {
        (*self).dict()
    }
}

/// Abstract representation of a `BencodeMut` object.
pub enum BencodeMutKind<'b, K, T> {
    /// Bencode Integer.
    Int(i64),
    /// Bencode Bytes.
    Bytes(&'b [u8]),
    /// Bencode List.
    List(&'b mut dyn BListAccess<T>),
    /// Bencode Dictionary.
    Dict(&'b mut dyn BDictAccess<K, T>),
}

/// Trait for write access to some bencode type.
pub trait BMutAccess: Sized + BRefAccess {
    fn kind_mut<'b>(&'b mut self) -> BencodeMutKind<'b, Self::BKey, Self::BType>;

    fn list_mut(&mut self) -> Option<&mut dyn BListAccess<Self::BType>>;

    fn dict_mut(&mut self) -> Option<&mut dyn BDictAccess<Self::BKey, Self::BType>>;
}
