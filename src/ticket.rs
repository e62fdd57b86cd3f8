//! Self-certifying authorization tickets.
//!
//! A ticket re-presents a previously satisfied authorization as an HMAC
//! over the decision's parameters, keyed by a hierarchy secret. Validity
//! is recomputation-equality: whoever holds the secret can reproduce the
//! digest bit-exactly, so no ticket store exists. Verification compares in
//! constant time.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::constants::{
    CC_POLICY_SECRET, CC_POLICY_SIGNED, ST_AUTH_SECRET, ST_AUTH_SIGNED, ST_CREATION,
    ST_HASHCHECK, ST_VERIFIED, TIMEOUT_EXPIRES_ON_RESET,
};
use crate::crypto::{constant_time_eq, HashAlg, HmacContext};
use crate::error::{PolicyError, Result};
use crate::platform::{Hierarchy, Platform};

/// The four ticket kinds; the Auth kind keeps its signed/secret provenance
/// in the tag because ticket replay re-derives the locked command code
/// from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketKind {
    AuthSigned,
    AuthSecret,
    Verified,
    HashCheck,
    Creation,
}

impl TicketKind {
    pub fn tag(self) -> u16 {
        match self {
            TicketKind::AuthSigned => ST_AUTH_SIGNED,
            TicketKind::AuthSecret => ST_AUTH_SECRET,
            TicketKind::Verified => ST_VERIFIED,
            TicketKind::HashCheck => ST_HASHCHECK,
            TicketKind::Creation => ST_CREATION,
        }
    }

    pub fn from_tag(tag: u16) -> Result<Self> {
        Ok(match tag {
            ST_AUTH_SIGNED => TicketKind::AuthSigned,
            ST_AUTH_SECRET => TicketKind::AuthSecret,
            ST_VERIFIED => TicketKind::Verified,
            ST_HASHCHECK => TicketKind::HashCheck,
            ST_CREATION => TicketKind::Creation,
            _ => return Err(PolicyError::BadTicketKind),
        })
    }

    /// The assertion constant a replayed Auth ticket locks the session to.
    pub fn replay_command_code(self) -> Option<u16> {
        match self {
            TicketKind::AuthSigned => Some(CC_POLICY_SIGNED),
            TicketKind::AuthSecret => Some(CC_POLICY_SECRET),
            _ => None,
        }
    }
}

/// An immutable, self-certifying ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub kind: TicketKind,
    pub hierarchy: Hierarchy,
    #[serde(with = "serde_bytes")]
    pub digest: Vec<u8>,
}

/// Pack a deadline and the expires-on-reset flag into the 8-byte wire
/// timeout. The high bit carries the flag; deadlines never reach it.
pub fn pack_wire_timeout(deadline: u64, expires_on_reset: bool) -> [u8; 8] {
    let mut value = deadline & !TIMEOUT_EXPIRES_ON_RESET;
    if expires_on_reset {
        value |= TIMEOUT_EXPIRES_ON_RESET;
    }
    value.to_be_bytes()
}

/// Split an 8-byte wire timeout back into deadline and flag. An empty
/// buffer means "no deadline".
pub fn unpack_wire_timeout(wire: &[u8]) -> Result<(u64, bool)> {
    if wire.is_empty() {
        return Ok((0, false));
    }
    let bytes: [u8; 8] = wire
        .try_into()
        .map_err(|_| PolicyError::BadTimeoutSize(wire.len()))?;
    let value = u64::from_be_bytes(bytes);
    Ok((
        value & !TIMEOUT_EXPIRES_ON_RESET,
        value & TIMEOUT_EXPIRES_ON_RESET != 0,
    ))
}

/// Start an HMAC context keyed by the hierarchy secret; the secret buffer
/// is dropped (wiped) as soon as the key schedule exists.
fn keyed_context(
    platform: &dyn Platform,
    alg: HashAlg,
    hierarchy: Hierarchy,
) -> Result<HmacContext> {
    let secret = platform.hierarchy_secret(hierarchy)?;
    let ctx = HmacContext::new(alg, &secret);
    drop(secret);
    Ok(ctx)
}

impl Ticket {
    /// Issue an Auth ticket for a satisfied signed/secret assertion.
    ///
    /// The MAC'd timeout is the masked deadline; the expires-on-reset flag
    /// enters the MAC indirectly through the reset-count inclusion, and
    /// the epoch is bound whenever any deadline exists, so an epoch change
    /// or (for flagged tickets) a reset makes recomputation diverge.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_auth(
        platform: &dyn Platform,
        alg: HashAlg,
        kind: TicketKind,
        hierarchy: Hierarchy,
        timeout: u64,
        expires_on_reset: bool,
        cp_hash: &[u8],
        policy_ref: &[u8],
        entity_name: &[u8],
    ) -> Result<Self> {
        if kind.replay_command_code().is_none() {
            return Err(PolicyError::Internal("auth ticket requires an auth kind"));
        }
        let masked = timeout & !TIMEOUT_EXPIRES_ON_RESET;
        let mut ctx = keyed_context(platform, alg, hierarchy)?;
        ctx.update_be16(kind.tag()).update_be64(masked);
        if masked != 0 {
            ctx.update_be32(platform.read_device_time()?.epoch);
            if expires_on_reset {
                ctx.update_be32(platform.read_reset_counters()?.total_resets);
            }
        }
        ctx.update(cp_hash).update(policy_ref).update(entity_name);
        Ok(Self {
            kind,
            hierarchy,
            digest: ctx.finish(),
        })
    }

    /// Verify an Auth ticket by recomputation.
    #[allow(clippy::too_many_arguments)]
    pub fn verify_auth(
        &self,
        platform: &dyn Platform,
        alg: HashAlg,
        timeout: u64,
        expires_on_reset: bool,
        cp_hash: &[u8],
        policy_ref: &[u8],
        entity_name: &[u8],
    ) -> Result<()> {
        let expected = Self::compute_auth(
            platform,
            alg,
            self.kind,
            self.hierarchy,
            timeout,
            expires_on_reset,
            cp_hash,
            policy_ref,
            entity_name,
        )?;
        if !constant_time_eq(&self.digest, &expected.digest) {
            return Err(PolicyError::TicketMismatch);
        }
        Ok(())
    }

    /// Issue a Verified ticket: a named key's signature over `digest` was
    /// checked once and need not be re-checked.
    pub fn compute_verified(
        platform: &dyn Platform,
        alg: HashAlg,
        hierarchy: Hierarchy,
        digest: &[u8],
        key_name: &[u8],
    ) -> Result<Self> {
        let mut ctx = keyed_context(platform, alg, hierarchy)?;
        ctx.update_be16(ST_VERIFIED).update(digest).update(key_name);
        Ok(Self {
            kind: TicketKind::Verified,
            hierarchy,
            digest: ctx.finish(),
        })
    }

    pub fn verify_verified(
        &self,
        platform: &dyn Platform,
        alg: HashAlg,
        digest: &[u8],
        key_name: &[u8],
    ) -> Result<()> {
        let expected = Self::compute_verified(platform, alg, self.hierarchy, digest, key_name)?;
        if !constant_time_eq(&self.digest, &expected.digest) {
            return Err(PolicyError::TicketMismatch);
        }
        Ok(())
    }

    /// Issue a HashCheck ticket: `digest` was computed by the device under
    /// `hash_alg` and is safe to sign.
    pub fn compute_hash_check(
        platform: &dyn Platform,
        alg: HashAlg,
        hierarchy: Hierarchy,
        hash_alg: HashAlg,
        digest: &[u8],
    ) -> Result<Self> {
        let mut ctx = keyed_context(platform, alg, hierarchy)?;
        ctx.update_be16(ST_HASHCHECK)
            .update_be16(hash_alg.alg_id())
            .update(digest);
        Ok(Self {
            kind: TicketKind::HashCheck,
            hierarchy,
            digest: ctx.finish(),
        })
    }

    pub fn verify_hash_check(
        &self,
        platform: &dyn Platform,
        alg: HashAlg,
        hash_alg: HashAlg,
        digest: &[u8],
    ) -> Result<()> {
        let expected =
            Self::compute_hash_check(platform, alg, self.hierarchy, hash_alg, digest)?;
        if !constant_time_eq(&self.digest, &expected.digest) {
            return Err(PolicyError::TicketMismatch);
        }
        Ok(())
    }

    /// Issue a Creation ticket binding an object to its creation data.
    pub fn compute_creation(
        platform: &dyn Platform,
        alg: HashAlg,
        hierarchy: Hierarchy,
        object_name: &[u8],
        creation_hash: &[u8],
    ) -> Result<Self> {
        let mut ctx = keyed_context(platform, alg, hierarchy)?;
        ctx.update_be16(ST_CREATION)
            .update(object_name)
            .update(creation_hash);
        Ok(Self {
            kind: TicketKind::Creation,
            hierarchy,
            digest: ctx.finish(),
        })
    }

    pub fn verify_creation(
        &self,
        platform: &dyn Platform,
        alg: HashAlg,
        object_name: &[u8],
        creation_hash: &[u8],
    ) -> Result<()> {
        let expected =
            Self::compute_creation(platform, alg, self.hierarchy, object_name, creation_hash)?;
        if !constant_time_eq(&self.digest, &expected.digest) {
            return Err(PolicyError::TicketMismatch);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_timeout_round_trip() {
        let wire = pack_wire_timeout(123_456, true);
        let (deadline, flag) = unpack_wire_timeout(&wire).unwrap();
        assert_eq!(deadline, 123_456);
        assert!(flag);

        let wire = pack_wire_timeout(123_456, false);
        let (deadline, flag) = unpack_wire_timeout(&wire).unwrap();
        assert_eq!(deadline, 123_456);
        assert!(!flag);
    }

    #[test]
    fn wire_timeout_empty_means_none() {
        assert_eq!(unpack_wire_timeout(&[]).unwrap(), (0, false));
    }

    #[test]
    fn wire_timeout_wrong_size_rejected() {
        assert!(unpack_wire_timeout(&[0; 4]).is_err());
    }

    #[test]
    fn tag_round_trip() {
        for kind in [
            TicketKind::AuthSigned,
            TicketKind::AuthSecret,
            TicketKind::Verified,
            TicketKind::HashCheck,
            TicketKind::Creation,
        ] {
            assert_eq!(TicketKind::from_tag(kind.tag()).unwrap(), kind);
        }
    }

    #[test]
    fn replay_codes() {
        assert_eq!(TicketKind::AuthSigned.replay_command_code(), Some(0x0160));
        assert_eq!(TicketKind::AuthSecret.replay_command_code(), Some(0x0151));
        assert_eq!(TicketKind::Verified.replay_command_code(), None);
    }
}
