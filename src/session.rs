//! The mutable policy-session record.
//!
//! A session accumulates a running policy digest plus a handful of
//! side-channel restrictions (locked command code, locality mask, PCR
//! generation snapshot, deadline). Handlers in [`crate::assertions`] are
//! the only writers; every write happens after all checks for that call
//! have passed, so a failed call leaves the record byte-for-byte
//! unchanged.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::crypto::HashAlg;
use crate::error::{PolicyError, Result};

/// The tagged argument-hash slot: at most one of the four variants is ever
/// bound, and re-binding anything different is a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArgumentHash {
    #[default]
    Unset,
    CpHash(#[serde(with = "serde_bytes")] Vec<u8>),
    NameHash(#[serde(with = "serde_bytes")] Vec<u8>),
    TemplateHash(#[serde(with = "serde_bytes")] Vec<u8>),
    ParamHash(#[serde(with = "serde_bytes")] Vec<u8>),
}

impl ArgumentHash {
    pub fn is_unset(&self) -> bool {
        matches!(self, ArgumentHash::Unset)
    }

    /// The bound cpHash value, if that is the active variant.
    pub fn cp_hash(&self) -> Option<&[u8]> {
        match self {
            ArgumentHash::CpHash(v) => Some(v),
            _ => None,
        }
    }

    /// Check that binding `new` would not conflict with the current
    /// content. Binding the identical variant+value is a no-op.
    pub(crate) fn check_bind(&self, new: &ArgumentHash) -> Result<()> {
        if self.is_unset() || self == new {
            Ok(())
        } else {
            Err(PolicyError::ArgumentHashConflict)
        }
    }

    pub(crate) fn bind(&mut self, new: ArgumentHash) -> Result<()> {
        self.check_bind(&new)?;
        *self = new;
        Ok(())
    }
}

/// An ephemeral policy session.
///
/// Created externally at session open with a zero digest; mutated only by
/// [`crate::assertions::apply`]; destroyed externally at session close.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySession {
    auth_hash: HashAlg,
    #[serde(with = "serde_bytes")]
    policy_digest: Vec<u8>,
    is_trial: bool,

    #[serde(with = "serde_bytes")]
    nonce_tpm: Vec<u8>,
    start_time: u64,
    epoch: u32,

    pub(crate) argument_hash: ArgumentHash,
    pub(crate) command_code: u16,
    pub(crate) command_locality: u8,
    pub(crate) pcr_counter: Option<u32>,
    pub(crate) timeout: u64,

    pub(crate) auth_value_needed: bool,
    pub(crate) password_needed: bool,
    pub(crate) pp_required: bool,
    pub(crate) check_nv_written: Option<bool>,
}

impl PolicySession {
    /// Open a real policy session. `nonce_tpm` is the session's fixed
    /// nonce, `start_time` the device time (ms) at open, `epoch` the time
    /// epoch at open.
    pub fn real(auth_hash: HashAlg, nonce_tpm: Vec<u8>, start_time: u64, epoch: u32) -> Self {
        Self::new(auth_hash, nonce_tpm, start_time, epoch, false)
    }

    /// Open a trial session: it computes digests but never authorizes
    /// anything, so real-world checks are skipped.
    pub fn trial(auth_hash: HashAlg) -> Self {
        Self::new(auth_hash, Vec::new(), 0, 0, true)
    }

    fn new(
        auth_hash: HashAlg,
        nonce_tpm: Vec<u8>,
        start_time: u64,
        epoch: u32,
        is_trial: bool,
    ) -> Self {
        Self {
            auth_hash,
            policy_digest: alloc::vec![0u8; auth_hash.digest_len()],
            is_trial,
            nonce_tpm,
            start_time,
            epoch,
            argument_hash: ArgumentHash::Unset,
            command_code: 0,
            command_locality: 0,
            pcr_counter: None,
            timeout: 0,
            auth_value_needed: false,
            password_needed: false,
            pp_required: false,
            check_nv_written: None,
        }
    }

    pub fn auth_hash(&self) -> HashAlg {
        self.auth_hash
    }

    pub fn digest_len(&self) -> usize {
        self.auth_hash.digest_len()
    }

    /// The accumulated policy digest.
    pub fn policy_digest(&self) -> &[u8] {
        &self.policy_digest
    }

    pub fn is_trial(&self) -> bool {
        self.is_trial
    }

    pub fn nonce_tpm(&self) -> &[u8] {
        &self.nonce_tpm
    }

    pub fn start_time(&self) -> u64 {
        self.start_time
    }

    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// The command this session authorizes, 0 when unrestricted.
    pub fn command_code(&self) -> u16 {
        self.command_code
    }

    pub fn command_locality(&self) -> u8 {
        self.command_locality
    }

    pub fn argument_hash(&self) -> &ArgumentHash {
        &self.argument_hash
    }

    /// Earliest accepted deadline so far, 0 when none applies.
    pub fn timeout(&self) -> u64 {
        self.timeout
    }

    pub fn auth_value_needed(&self) -> bool {
        self.auth_value_needed
    }

    pub fn password_needed(&self) -> bool {
        self.password_needed
    }

    pub fn pp_required(&self) -> bool {
        self.pp_required
    }

    pub fn check_nv_written(&self) -> Option<bool> {
        self.check_nv_written
    }

    pub fn pcr_counter(&self) -> Option<u32> {
        self.pcr_counter
    }

    /// Restart the policy evaluation: zero the digest and drop every
    /// per-policy restriction, keeping the session identity (algorithm,
    /// nonce, start time, epoch, trial flag).
    pub fn restart(&mut self) {
        self.policy_digest = alloc::vec![0u8; self.auth_hash.digest_len()];
        self.argument_hash = ArgumentHash::Unset;
        self.command_code = 0;
        self.command_locality = 0;
        self.pcr_counter = None;
        self.timeout = 0;
        self.auth_value_needed = false;
        self.password_needed = false;
        self.pp_required = false;
        self.check_nv_written = None;
    }

    /// Replace the digest; the chaining module is the only caller.
    pub(crate) fn set_policy_digest(&mut self, digest: Vec<u8>) {
        debug_assert_eq!(digest.len(), self.auth_hash.digest_len());
        self.policy_digest = digest;
    }

    /// Zero the digest in place (authorize-by-redirect assertions).
    pub(crate) fn zero_policy_digest(&mut self) {
        self.policy_digest = alloc::vec![0u8; self.auth_hash.digest_len()];
    }

    /// Monotonically tighten the session deadline; 0 never loosens.
    pub(crate) fn tighten_timeout(&mut self, deadline: u64) {
        if deadline != 0 && (self.timeout == 0 || deadline < self.timeout) {
            self.timeout = deadline;
        }
    }
}
