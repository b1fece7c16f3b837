//! Errors for torrent file building and parsing.

use std::io;

use torv_bencode::{BencodeConvertError, BencodeParseError};

error_chain! {
    types {
        ParseError, ParseErrorKind, ParseResultExt, ParseResult;
    }

    foreign_links {
        Io(io::Error);
        Dir(walkdir::Error);
        BencodeConvert(BencodeConvertError);
        BencodeParse(BencodeParseError);
    }

    errors {
        SchemaViolation {
            field: String,
            details: String
         } {
            description("Schema Violation Detected In File")
            display("Schema Violation Detected In File For {}: {}", field, details)
        }
        CrossFieldInvariant {
            details: String
         } {
            description("Cross Field Invariant Violated In File")
            display("Cross Field Invariant Violated In File: {}", details)
        }
        PathUnsafe {
            component: String
         } {
            description("Unsafe Path Component Detected")
            display("Unsafe Path Component Detected: {:?}", component)
        }
        FilesystemMissing {
            path: String
         } {
            description("Referenced File Could Not Be Read")
            display("Referenced File Could Not Be Read: {}", path)
        }
        Cancelled {
            description("Hashing Operation Cancelled")
            display("Hashing Operation Cancelled")
        }
        InvalidData {
            details: String
         } {
            description("Invalid Data Given To Builder")
            display("Invalid Data Given To Builder: {}", details)
        }
    }
}
