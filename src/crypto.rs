//! Incremental hash and HMAC contexts over the ring backend.
//!
//! The evaluator consumes digests as a black box: start a context, feed
//! byte strings and big-endian integers, take the result. Everything here
//! is a thin veneer over `ring::digest` / `ring::hmac` that fixes the
//! algorithm catalogue to the four digests the policy protocol supports.

use alloc::vec::Vec;

use ring::{constant_time, digest, hmac};
use serde::{Deserialize, Serialize};

use crate::constants::{ALG_SHA1, ALG_SHA256, ALG_SHA384, ALG_SHA512};
use crate::error::{PolicyError, Result};

/// Digest algorithm of a policy session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlg {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
}

impl HashAlg {
    pub fn from_alg_id(id: u16) -> Result<Self> {
        match id {
            ALG_SHA1 => Ok(HashAlg::Sha1),
            ALG_SHA256 => Ok(HashAlg::Sha256),
            ALG_SHA384 => Ok(HashAlg::Sha384),
            ALG_SHA512 => Ok(HashAlg::Sha512),
            _ => Err(PolicyError::UnsupportedAlgorithm(id)),
        }
    }

    pub fn alg_id(self) -> u16 {
        match self {
            HashAlg::Sha1 => ALG_SHA1,
            HashAlg::Sha256 => ALG_SHA256,
            HashAlg::Sha384 => ALG_SHA384,
            HashAlg::Sha512 => ALG_SHA512,
        }
    }

    /// Size of this algorithm's digest in bytes.
    pub fn digest_len(self) -> usize {
        match self {
            HashAlg::Sha1 => 20,
            HashAlg::Sha256 => 32,
            HashAlg::Sha384 => 48,
            HashAlg::Sha512 => 64,
        }
    }

    fn digest_algorithm(self) -> &'static digest::Algorithm {
        match self {
            HashAlg::Sha1 => &digest::SHA1_FOR_LEGACY_USE_ONLY,
            HashAlg::Sha256 => &digest::SHA256,
            HashAlg::Sha384 => &digest::SHA384,
            HashAlg::Sha512 => &digest::SHA512,
        }
    }

    fn hmac_algorithm(self) -> hmac::Algorithm {
        match self {
            HashAlg::Sha1 => hmac::HMAC_SHA1_FOR_LEGACY_USE_ONLY,
            HashAlg::Sha256 => hmac::HMAC_SHA256,
            HashAlg::Sha384 => hmac::HMAC_SHA384,
            HashAlg::Sha512 => hmac::HMAC_SHA512,
        }
    }
}

/// Incremental hash context.
pub struct HashContext {
    inner: digest::Context,
}

impl HashContext {
    pub fn new(alg: HashAlg) -> Self {
        Self {
            inner: digest::Context::new(alg.digest_algorithm()),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn update_be16(&mut self, v: u16) -> &mut Self {
        self.update(&v.to_be_bytes())
    }

    pub fn update_be32(&mut self, v: u32) -> &mut Self {
        self.update(&v.to_be_bytes())
    }

    pub fn update_be64(&mut self, v: u64) -> &mut Self {
        self.update(&v.to_be_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.inner.finish().as_ref().to_vec()
    }
}

/// One-shot convenience over [`HashContext`].
pub fn hash(alg: HashAlg, data: &[u8]) -> Vec<u8> {
    let mut ctx = HashContext::new(alg);
    ctx.update(data);
    ctx.finish()
}

/// Incremental HMAC context. The key material is consumed at construction;
/// callers that hold secrets wipe their own copies.
pub struct HmacContext {
    inner: hmac::Context,
}

impl HmacContext {
    pub fn new(alg: HashAlg, key: &[u8]) -> Self {
        let key = hmac::Key::new(alg.hmac_algorithm(), key);
        Self {
            inner: hmac::Context::with_key(&key),
        }
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        self.inner.update(data);
        self
    }

    pub fn update_be16(&mut self, v: u16) -> &mut Self {
        self.update(&v.to_be_bytes())
    }

    pub fn update_be32(&mut self, v: u32) -> &mut Self {
        self.update(&v.to_be_bytes())
    }

    pub fn update_be64(&mut self, v: u64) -> &mut Self {
        self.update(&v.to_be_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.inner.sign().as_ref().to_vec()
    }
}

/// Constant-time equality; no early exit on the first mismatching byte.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    constant_time::verify_slices_are_equal(a, b).is_ok()
}
