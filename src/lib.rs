//! # tpm2-policy
//!
//! This crate implements the policy-session evaluation and
//! authorization-ticket logic of a software TPM 2.0 core in pure Rust. A
//! policy session accumulates a chained digest proving that a set of
//! conditions (signatures, secrets, platform-state measurements, counters,
//! command context) has been satisfied; the object owner's external
//! authorization check later compares that digest against the policy value
//! fixed at object creation. Tickets re-present previously satisfied
//! decisions as compact HMAC tokens keyed by per-hierarchy secrets.
//!
//! # Features
//! - All policy assertion kinds, with trial-session digest computation
//! - Auth, Verified, HashCheck and Creation tickets with
//!   verify-by-recomputation
//! - Arbitrary-width byte-wise operand comparison
//!
//! # Example
//!
//! ```ignore
//! use tpm2_policy::{apply, HashAlg, PolicyAssertion, PolicySession};
//!
//! // Compute the digest a policy "command X at locality 1 only" would
//! // need, using a trial session. `platform` is the embedding firmware's
//! // implementation of the `Platform` trait.
//! let mut session = PolicySession::trial(HashAlg::Sha256);
//! apply(&mut session, &platform, &PolicyAssertion::CommandCode { code: 0x014B })?;
//! apply(&mut session, &platform, &PolicyAssertion::Locality { locality: 0b10 })?;
//! let policy_value = session.policy_digest().to_vec();
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]

#[macro_use]
extern crate alloc;

mod checks;
mod digest;

pub mod assertions;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod operand;
pub mod platform;
pub mod session;
pub mod ticket;

pub use assertions::{apply, AssertionReply, PolicyAssertion};
pub use crypto::HashAlg;
pub use error::{ErrorClass, PolicyError};
pub use operand::{compare, CompareOp};
pub use platform::{
    DeviceTime, Hierarchy, PcrSelection, PcrSelectionList, Platform, ResetCounters,
};
pub use session::{ArgumentHash, PolicySession};
pub use ticket::{pack_wire_timeout, unpack_wire_timeout, Ticket, TicketKind};
