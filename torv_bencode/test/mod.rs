use torv_bencode::{ben_bytes, ben_int, ben_list, ben_map};
use torv_bencode::{BDecodeOpt, BRefAccess, BencodeRef};

#[test]
fn positive_ben_map_macro() {
    let result = (ben_map!{
        "key" => ben_bytes!("value")
    }).encode();

    assert_eq!(b"d3:key5:valuee", &result[..]);
}

#[test]
fn positive_ben_list_macro() {
    let result = (ben_list!(
        ben_int!(5)
    )).encode();

    assert_eq!(b"li5ee", &result[..]);
}

#[test]
fn positive_nested_macros() {
    let result = (ben_map!{
        "announce" => ben_bytes!("udp://test.com:80"),
        "info" => ben_map!{
            "length" => ben_int!(42),
            "name" => ben_bytes!("file.bin")
        },
        "tiers" => ben_list!(
            ben_list!(ben_bytes!("udp://backup.test.com:80"))
        )
    }).encode();

    let expected = &b"d8:announce17:udp://test.com:804:infod6:lengthi42e4:name8:file.bine5:tiersll24:udp://backup.test.com:80eee"[..];
    assert_eq!(expected, &result[..]);
}

#[test]
fn positive_canonical_round_trip() {
    let canonical = &b"d1:ali1e3:two4:misce4:spam4:eggs4:zerod0:i0eee"[..];

    let decoded = BencodeRef::decode(canonical, BDecodeOpt::default()).unwrap();
    assert_eq!(canonical, &decoded.encode()[..]);
    assert_eq!(canonical, &decoded.to_mut().encode()[..]);
}

#[test]
fn positive_encode_then_decode_equal() {
    let built = ben_map!{
        "b_key" => ben_int!(-77),
        "a_key" => ben_list!(ben_bytes!("x"), ben_int!(0))
    };
    let encoded = built.encode();

    let decoded = BencodeRef::decode(&encoded, BDecodeOpt::default()).unwrap();
    let dict = decoded.dict().unwrap();

    assert_eq!(dict.lookup(b"b_key").unwrap().int(), Some(-77));
    let list = dict.lookup(b"a_key").unwrap().list().unwrap();
    assert_eq!(list.get(0).unwrap().bytes(), Some(&b"x"[..]));
    assert_eq!(list.get(1).unwrap().int(), Some(0));
}
