mod client;
pub mod hash;

pub use client::Downloader;
pub use hash::{file_matches, sha1_hex, sha512_hex, verify_bytes, ExpectedHashes};
