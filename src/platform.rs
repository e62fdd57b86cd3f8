//! Read-only device capabilities consumed by the evaluator.
//!
//! Global mutable device state (clock, PCR banks, NV storage, reset
//! counters, hierarchy secrets) is never read from process globals; it is
//! threaded through every call as an immutable [`Platform`] reference.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::HashAlg;
use crate::error::Result;

/// Snapshot of the device time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTime {
    /// Milliseconds since the device started; deadline checks use this.
    pub millis: u64,
    /// Milliseconds on the persisted clock, which survives restarts.
    pub clock_millis: u64,
    /// Identifier of the current time epoch; changes whenever continuity
    /// of the clock is lost.
    pub epoch: u32,
    /// Whether the clock is currently being updated. A stopped clock makes
    /// deadline checks temporarily unavailable rather than wrong.
    pub advancing: bool,
    /// Whether the persisted clock is known not to have gone backward
    /// (cleared after an unorderly shutdown until the next write-back).
    pub clock_safe: bool,
}

/// Snapshot of the device reset bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetCounters {
    /// Incremented on every PCR extend/reset; a changed value invalidates
    /// an earlier PCR-state evaluation.
    pub pcr_generation: u32,
    /// Incremented on every device reset.
    pub total_resets: u32,
    /// Incremented on every resume/restart that is not a full reset.
    pub restarts: u32,
}

/// One of the device's top-level trust domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Hierarchy {
    Owner,
    Endorsement,
    Platform,
    /// The ephemeral hierarchy; its secret is regenerated at every reset.
    Null,
}

/// Selection of PCRs within one digest bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrSelection {
    pub alg: HashAlg,
    /// Little bitmap, one bit per PCR, byte 0 bit 0 = PCR 0.
    #[serde(with = "serde_bytes")]
    pub bitmap: Vec<u8>,
}

impl PcrSelection {
    /// An empty selection over `bank` with the conventional 3-byte bitmap.
    pub fn new(bank: HashAlg) -> Self {
        Self {
            alg: bank,
            bitmap: alloc::vec![0u8; 3],
        }
    }

    /// Select one PCR, growing the bitmap if needed.
    pub fn select(mut self, pcr: usize) -> Self {
        let byte = pcr / 8;
        if byte >= self.bitmap.len() {
            self.bitmap.resize(byte + 1, 0);
        }
        self.bitmap[byte] |= 1 << (pcr % 8);
        self
    }

    pub fn is_selected(&self, pcr: usize) -> bool {
        self.bitmap
            .get(pcr / 8)
            .is_some_and(|byte| byte & (1 << (pcr % 8)) != 0)
    }
}

/// Ordered list of per-bank selections, as supplied by the caller of a
/// PCR-state assertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcrSelectionList {
    pub selections: Vec<PcrSelection>,
}

impl PcrSelectionList {
    pub fn new(selections: Vec<PcrSelection>) -> Self {
        Self { selections }
    }

    /// Canonical wire form folded into policy digests:
    /// `BE32(count) ‖ (BE16(alg) ‖ u8(sizeofSelect) ‖ bitmap)*`.
    pub fn marshal(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&(self.selections.len() as u32).to_be_bytes());
        for sel in &self.selections {
            out.extend_from_slice(&sel.alg.alg_id().to_be_bytes());
            out.push(sel.bitmap.len() as u8);
            out.extend_from_slice(&sel.bitmap);
        }
        out
    }
}

/// Device capabilities the evaluator reads. Implemented by the embedding
/// firmware; tests supply scripted mocks.
///
/// All methods are logically `const` with respect to the evaluator: a
/// handler never writes through this trait.
pub trait Platform {
    fn read_device_time(&self) -> Result<DeviceTime>;

    fn read_reset_counters(&self) -> Result<ResetCounters>;

    /// Read `len` bytes at `offset` from a readable NV index. The platform
    /// enforces index bounds and read access.
    fn read_nv_bytes(&self, index: u32, offset: u16, len: u16) -> Result<Vec<u8>>;

    /// The Name of an NV index.
    fn read_nv_name(&self, index: u32) -> Result<Vec<u8>>;

    /// Composite digest over the selected PCRs in `alg`, removing
    /// unimplemented PCRs from `selection` in place so the caller can
    /// marshal exactly what was hashed.
    fn read_pcr_digest(&self, selection: &mut PcrSelectionList, alg: HashAlg) -> Result<Vec<u8>>;

    /// Verify `signature` over `digest` against the key identified by
    /// `key_name`.
    fn verify_signature(&self, key_name: &[u8], digest: &[u8], signature: &[u8]) -> Result<()>;

    /// Current value of a capability property, big-endian, or `None` when
    /// the property is not present on this device.
    fn read_capability(&self, capability: u32, property: u32) -> Result<Option<Vec<u8>>>;

    /// Whether the 16-bit command code names an implemented command.
    fn command_implemented(&self, code: u16) -> bool;

    /// The secret keying tickets of `hierarchy`. The returned buffer wipes
    /// itself on drop; callers must drop it as soon as the MAC key is
    /// derived.
    fn hierarchy_secret(&self, hierarchy: Hierarchy) -> Result<Zeroizing<Vec<u8>>>;
}
