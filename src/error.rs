use alloc::string::String;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The five failure classes of the evaluator.
///
/// Every [`PolicyError`] maps to exactly one class; callers that only care
/// about the remedy (retry, change input, abandon the session) can branch
/// on the class instead of the concrete variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Malformed caller input: wrong size, out-of-range offset,
    /// unimplemented command.
    Validation,
    /// Two incompatible writes to a single-writer session slot.
    StateConflict,
    /// A cryptographic or relational comparison did not hold.
    CryptoMismatch,
    /// Time-related failure; only clock unavailability is retryable.
    Temporal,
    /// Internal invariant violation: an implementation bug, not caller
    /// fault.
    Logic,
}

/// Errors surfaced by assertion handlers and the ticket subsystem.
///
/// All caller-input errors are local to one call and leave the session
/// byte-for-byte unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    // Validation
    #[error("digest size {got} does not match the session digest size {want}")]
    BadDigestSize { got: usize, want: usize },
    #[error("operand range {offset}+{len} exceeds the {bound}-byte source")]
    OperandOutOfRange {
        offset: usize,
        len: usize,
        bound: usize,
    },
    #[error("command code {0:#06x} is not implemented")]
    CommandNotImplemented(u16),
    #[error("disjunction branch count {0} outside the accepted range")]
    BranchCountOutOfRange(usize),
    #[error("locality value {0:#04x} is not acceptable")]
    LocalityOutOfRange(u8),
    #[error("capability {capability:#010x} property {property:#010x} is not available")]
    PropertyUnavailable { capability: u32, property: u32 },
    #[error("unsupported algorithm identifier {0:#06x}")]
    UnsupportedAlgorithm(u16),
    #[error("unsupported operation identifier {0:#06x}")]
    UnsupportedOperation(u16),
    #[error("wire timeout must be 8 bytes, got {0}")]
    BadTimeoutSize(usize),
    #[error("stored digest algorithm {stored:#06x} does not match the session algorithm {session:#06x}")]
    NvAlgMismatch { stored: u16, session: u16 },
    #[error("nonce does not match the session nonce")]
    NonceMismatch,
    #[error("ticket kind is not usable here")]
    BadTicketKind,

    // StateConflict
    #[error("argument-hash slot already bound to a different value")]
    ArgumentHashConflict,
    #[error("session already authorizes command {locked:#06x}, not {requested:#06x}")]
    CommandCodeConflict { locked: u16, requested: u16 },
    #[error("NV-written requirement already fixed to {0}")]
    NvWrittenConflict(bool),
    #[error("locality {requested:#04x} conflicts with the accumulated setting {current:#04x}")]
    LocalityConflict { requested: u8, current: u8 },

    // CryptoMismatch
    #[error("signature verification failed")]
    SignatureInvalid,
    #[error("PCR digest mismatch: expected {expected}, got {got}")]
    PcrDigestMismatch { expected: String, got: String },
    #[error("ticket digest mismatch")]
    TicketMismatch,
    #[error("approved policy does not match the session digest")]
    ApprovedPolicyMismatch,
    #[error("operand comparison is not satisfied")]
    OperandMismatch,
    #[error("current policy digest is not in the disjunction list")]
    OrBranchNotFound,

    // Temporal
    #[error("authorization deadline has passed")]
    Expired,
    #[error("device time epoch changed since the deadline was set")]
    EpochChanged,
    #[error("device clock is not advancing; retry later")]
    ClockUnavailable,
    #[error("PCR state changed since it was checked")]
    PcrChanged,

    // Logic
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

impl PolicyError {
    /// The failure class this error belongs to.
    pub fn class(&self) -> ErrorClass {
        use PolicyError::*;
        match self {
            BadDigestSize { .. }
            | OperandOutOfRange { .. }
            | CommandNotImplemented(_)
            | BranchCountOutOfRange(_)
            | LocalityOutOfRange(_)
            | PropertyUnavailable { .. }
            | UnsupportedAlgorithm(_)
            | UnsupportedOperation(_)
            | BadTimeoutSize(_)
            | NvAlgMismatch { .. }
            | NonceMismatch
            | BadTicketKind => ErrorClass::Validation,
            ArgumentHashConflict
            | CommandCodeConflict { .. }
            | NvWrittenConflict(_)
            | LocalityConflict { .. } => ErrorClass::StateConflict,
            SignatureInvalid
            | PcrDigestMismatch { .. }
            | TicketMismatch
            | ApprovedPolicyMismatch
            | OperandMismatch
            | OrBranchNotFound => ErrorClass::CryptoMismatch,
            Expired | EpochChanged | ClockUnavailable | PcrChanged => ErrorClass::Temporal,
            Internal(_) => ErrorClass::Logic,
        }
    }

    /// Whether retrying with identical input can succeed. True only for
    /// clock/backing-store unavailability.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PolicyError::ClockUnavailable)
    }
}

pub type Result<T, E = PolicyError> = core::result::Result<T, E>;
