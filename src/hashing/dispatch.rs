//! Algorithm dispatch table. `HashAlgo` is chosen once from CLI/config at
//! startup; every call site gets a [`DigestContext`] through
//! [`HashAlgo::new_context`] rather than branching on algorithm identity.

use clap::ValueEnum;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha512;
use sha2::Digest as _;
use xxhash_rust::xxh3::Xxh3;

/// `hash-function ∈ {md5, sha1, sha512, xxhash}` (spec §6.1).
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum HashAlgo {
    Md5,
    Sha1,
    Sha512,
    Xxhash,
}

impl HashAlgo {
    pub fn new_context(self) -> DigestContext {
        match self {
            HashAlgo::Md5 => DigestContext::Md5(Md5::new()),
            HashAlgo::Sha1 => DigestContext::Sha1(Sha1::new()),
            HashAlgo::Sha512 => DigestContext::Sha512(Sha512::new()),
            HashAlgo::Xxhash => DigestContext::Xxhash(Xxh3::new()),
        }
    }
}

/// A finished digest. Output length varies by algorithm (spec §4.8: "output
/// length is recorded once at startup and used for all bucketization");
/// bucketization itself only needs the last byte, which `last_byte` exposes
/// directly for the 256-bucket skim table.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Digest {
    Bytes(Vec<u8>),
    U64(u64),
}

impl Digest {
    /// Last byte of the digest, used as the skim-table bucket key.
    pub fn last_byte(&self) -> u8 {
        match self {
            Digest::Bytes(v) => *v.last().unwrap_or(&0),
            Digest::U64(v) => (v & 0xff) as u8,
        }
    }
}

/// Incremental digest context: init (via [`HashAlgo::new_context`]) / update / finalize.
pub enum DigestContext {
    Md5(Md5),
    Sha1(Sha1),
    Sha512(Sha512),
    Xxhash(Xxh3),
}

impl DigestContext {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            DigestContext::Md5(h) => h.update(data),
            DigestContext::Sha1(h) => h.update(data),
            DigestContext::Sha512(h) => h.update(data),
            DigestContext::Xxhash(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> Digest {
        match self {
            DigestContext::Md5(h) => Digest::Bytes(h.finalize().to_vec()),
            DigestContext::Sha1(h) => Digest::Bytes(h.finalize().to_vec()),
            DigestContext::Sha512(h) => Digest::Bytes(h.finalize().to_vec()),
            DigestContext::Xxhash(h) => Digest::U64(h.digest()),
        }
    }
}
