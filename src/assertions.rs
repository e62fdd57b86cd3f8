//! The policy assertion handlers.
//!
//! Each variant of [`PolicyAssertion`] is one condition a caller can fold
//! into a session's policy digest. Handlers follow a common shape: validate
//! caller input, run the real-world check unless the session is a trial,
//! then commit the digest extension and any side-channel restriction. All
//! failures are detected before the first session mutation, so a failed
//! call leaves the session untouched.

use alloc::vec::Vec;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::checks::{bind_cp_hash, check_auth_params, check_cp_hash_slot, compute_auth_timeout};
use crate::constants::*;
use crate::crypto::{HashAlg, HashContext};
use crate::digest::{capability_args_hash, operand_args_hash, policy_update, PolicyFold};
use crate::error::{PolicyError, Result};
use crate::operand::{compare, CompareOp};
use crate::platform::{DeviceTime, Hierarchy, PcrSelectionList, Platform, ResetCounters};
use crate::session::{ArgumentHash, PolicySession};
use crate::ticket::{pack_wire_timeout, unpack_wire_timeout, Ticket, TicketKind};

/// One policy assertion, keyed by its wire constant (see
/// [`crate::constants`]). The enum is closed: adding a kind without a
/// handler arm is a compile error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyAssertion {
    /// Proof that an authority signed this exact authorization.
    Signed {
        #[serde(with = "serde_bytes")]
        auth_key_name: Vec<u8>,
        #[serde(with = "serde_bytes")]
        signature: Vec<u8>,
        #[serde(with = "serde_bytes")]
        nonce_tpm: Vec<u8>,
        #[serde(with = "serde_bytes")]
        cp_hash_a: Vec<u8>,
        #[serde(with = "serde_bytes")]
        policy_ref: Vec<u8>,
        expiration: i32,
        /// Trust domain of the signing key; keys issued tickets are bound
        /// to it.
        hierarchy: Hierarchy,
    },
    /// Proof of knowledge of an entity's secret. The entity's own
    /// authorization is checked by the dispatcher before this handler
    /// runs.
    Secret {
        #[serde(with = "serde_bytes")]
        entity_name: Vec<u8>,
        #[serde(with = "serde_bytes")]
        nonce_tpm: Vec<u8>,
        #[serde(with = "serde_bytes")]
        cp_hash_a: Vec<u8>,
        #[serde(with = "serde_bytes")]
        policy_ref: Vec<u8>,
        expiration: i32,
        hierarchy: Hierarchy,
    },
    /// Replay of a previously issued Auth ticket.
    Ticket {
        ticket: Ticket,
        #[serde(with = "serde_bytes")]
        wire_timeout: Vec<u8>,
        #[serde(with = "serde_bytes")]
        cp_hash_a: Vec<u8>,
        #[serde(with = "serde_bytes")]
        policy_ref: Vec<u8>,
        #[serde(with = "serde_bytes")]
        auth_name: Vec<u8>,
    },
    /// Platform-state measurement over the selected PCR banks.
    Pcr {
        selection: PcrSelectionList,
        /// Expected composite digest. A trial session may leave it empty
        /// to take the current PCR state; a real session must supply it.
        #[serde(with = "serde_bytes")]
        digest: Vec<u8>,
    },
    /// Relational check over NV-index contents.
    Nv {
        nv_index: u32,
        #[serde(with = "serde_bytes")]
        operand_b: Vec<u8>,
        offset: u16,
        operation: CompareOp,
    },
    /// Relational check over the device time structure.
    CounterTimer {
        #[serde(with = "serde_bytes")]
        operand_b: Vec<u8>,
        offset: u16,
        operation: CompareOp,
    },
    /// Lock the session to a single command.
    CommandCode { code: u16 },
    /// Bind the session to one specific future command invocation.
    CpHash {
        #[serde(with = "serde_bytes")]
        hash: Vec<u8>,
    },
    /// Bind the session to a set of handle Names.
    NameHash {
        #[serde(with = "serde_bytes")]
        hash: Vec<u8>,
    },
    /// Bind the session to an object creation template.
    TemplateHash {
        #[serde(with = "serde_bytes")]
        hash: Vec<u8>,
    },
    /// Bind the session to a command parameter hash.
    ParamHash {
        #[serde(with = "serde_bytes")]
        hash: Vec<u8>,
    },
    /// Disjunction over previously computed branch digests.
    Or { branches: Vec<Vec<u8>> },
    /// Restrict the command locality.
    Locality { locality: u8 },
    /// Qualify duplication to one selected new parent.
    DuplicationSelect {
        #[serde(with = "serde_bytes")]
        object_name: Vec<u8>,
        #[serde(with = "serde_bytes")]
        new_parent_name: Vec<u8>,
        include_object: bool,
    },
    /// Replace the accumulated policy with one a named authority
    /// pre-approved.
    Authorize {
        #[serde(with = "serde_bytes")]
        approved_policy: Vec<u8>,
        #[serde(with = "serde_bytes")]
        policy_ref: Vec<u8>,
        #[serde(with = "serde_bytes")]
        key_sign_name: Vec<u8>,
        check_ticket: Ticket,
    },
    /// Replace the accumulated policy with one stored at an NV index.
    AuthorizeNv { nv_index: u32 },
    /// Require the object's auth value via HMAC at use time.
    AuthValue,
    /// Require the object's auth value in cleartext at use time.
    Password,
    /// Require physical presence at use time.
    PhysicalPresence,
    /// Require the NV index's written state to match.
    NvWritten { written: bool },
    /// Relational check over a capability property value.
    Capability {
        #[serde(with = "serde_bytes")]
        operand_b: Vec<u8>,
        offset: u16,
        operation: CompareOp,
        capability: u32,
        property: u32,
    },
}

/// Outputs of an assertion call beyond the session mutation. Only the
/// signature- and secret-based assertions produce anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssertionReply {
    /// 8-byte wire deadline (empty when no deadline applies), suitable for
    /// a later ticket replay.
    pub timeout: Vec<u8>,
    /// Auth ticket re-presenting this decision, issued for negative
    /// expirations on real sessions.
    pub ticket: Option<Ticket>,
}

/// Apply one assertion to a session, reading device state through
/// `platform`.
pub fn apply(
    session: &mut PolicySession,
    platform: &dyn Platform,
    assertion: &PolicyAssertion,
) -> Result<AssertionReply> {
    match assertion {
        PolicyAssertion::Signed {
            auth_key_name,
            signature,
            nonce_tpm,
            cp_hash_a,
            policy_ref,
            expiration,
            hierarchy,
        } => apply_signed(
            session,
            platform,
            auth_key_name,
            signature,
            nonce_tpm,
            cp_hash_a,
            policy_ref,
            *expiration,
            *hierarchy,
        ),
        PolicyAssertion::Secret {
            entity_name,
            nonce_tpm,
            cp_hash_a,
            policy_ref,
            expiration,
            hierarchy,
        } => apply_secret(
            session,
            platform,
            entity_name,
            nonce_tpm,
            cp_hash_a,
            policy_ref,
            *expiration,
            *hierarchy,
        ),
        PolicyAssertion::Ticket {
            ticket,
            wire_timeout,
            cp_hash_a,
            policy_ref,
            auth_name,
        } => apply_ticket(
            session,
            platform,
            ticket,
            wire_timeout,
            cp_hash_a,
            policy_ref,
            auth_name,
        ),
        PolicyAssertion::Pcr { selection, digest } => {
            apply_pcr(session, platform, selection, digest)
        }
        PolicyAssertion::Nv {
            nv_index,
            operand_b,
            offset,
            operation,
        } => apply_nv(session, platform, *nv_index, operand_b, *offset, *operation),
        PolicyAssertion::CounterTimer {
            operand_b,
            offset,
            operation,
        } => apply_counter_timer(session, platform, operand_b, *offset, *operation),
        PolicyAssertion::CommandCode { code } => apply_command_code(session, platform, *code),
        PolicyAssertion::CpHash { hash } => {
            apply_argument_hash(session, CC_POLICY_CP_HASH, ArgumentHash::CpHash, hash)
        }
        PolicyAssertion::NameHash { hash } => {
            apply_argument_hash(session, CC_POLICY_NAME_HASH, ArgumentHash::NameHash, hash)
        }
        PolicyAssertion::TemplateHash { hash } => apply_argument_hash(
            session,
            CC_POLICY_TEMPLATE,
            ArgumentHash::TemplateHash,
            hash,
        ),
        PolicyAssertion::ParamHash { hash } => apply_argument_hash(
            session,
            CC_POLICY_PARAMETERS,
            ArgumentHash::ParamHash,
            hash,
        ),
        PolicyAssertion::Or { branches } => apply_or(session, branches),
        PolicyAssertion::Locality { locality } => apply_locality(session, *locality),
        PolicyAssertion::DuplicationSelect {
            object_name,
            new_parent_name,
            include_object,
        } => apply_duplication_select(session, object_name, new_parent_name, *include_object),
        PolicyAssertion::Authorize {
            approved_policy,
            policy_ref,
            key_sign_name,
            check_ticket,
        } => apply_authorize(
            session,
            platform,
            approved_policy,
            policy_ref,
            key_sign_name,
            check_ticket,
        ),
        PolicyAssertion::AuthorizeNv { nv_index } => {
            apply_authorize_nv(session, platform, *nv_index)
        }
        PolicyAssertion::AuthValue => Ok(apply_auth_value(session, false)),
        PolicyAssertion::Password => Ok(apply_auth_value(session, true)),
        PolicyAssertion::PhysicalPresence => {
            PolicyFold::extend(session, CC_POLICY_PHYSICAL_PRESENCE).commit(session);
            session.pp_required = true;
            Ok(AssertionReply::default())
        }
        PolicyAssertion::NvWritten { written } => apply_nv_written(session, *written),
        PolicyAssertion::Capability {
            operand_b,
            offset,
            operation,
            capability,
            property,
        } => apply_capability(
            session,
            platform,
            operand_b,
            *offset,
            *operation,
            *capability,
            *property,
        ),
    }
}

/// `aHash = H(nonceTPM ‖ BE32(expiration) ‖ cpHashA ‖ policyRef)`, the
/// value an authorizing key signs.
fn signed_auth_hash(
    alg: HashAlg,
    nonce_tpm: &[u8],
    expiration: i32,
    cp_hash_a: &[u8],
    policy_ref: &[u8],
) -> Vec<u8> {
    let mut ctx = HashContext::new(alg);
    ctx.update(nonce_tpm)
        .update(&expiration.to_be_bytes())
        .update(cp_hash_a)
        .update(policy_ref);
    ctx.finish()
}

#[allow(clippy::too_many_arguments)]
fn apply_signed(
    session: &mut PolicySession,
    platform: &dyn Platform,
    auth_key_name: &[u8],
    signature: &[u8],
    nonce_tpm: &[u8],
    cp_hash_a: &[u8],
    policy_ref: &[u8],
    expiration: i32,
    hierarchy: Hierarchy,
) -> Result<AssertionReply> {
    let nonce_given = !nonce_tpm.is_empty();
    let auth_timeout = if session.is_trial() {
        0
    } else {
        compute_auth_timeout(session, platform, expiration, nonce_given)?
    };
    if session.is_trial() {
        check_cp_hash_slot(session, cp_hash_a)?;
    } else {
        check_auth_params(session, platform, auth_timeout, cp_hash_a, nonce_tpm)?;
        let a_hash =
            signed_auth_hash(session.auth_hash(), nonce_tpm, expiration, cp_hash_a, policy_ref);
        platform
            .verify_signature(auth_key_name, &a_hash, signature)
            .map_err(|_| PolicyError::SignatureInvalid)?;
    }
    let reply = auth_reply(
        session,
        platform,
        TicketKind::AuthSigned,
        hierarchy,
        auth_timeout,
        nonce_given,
        expiration,
        cp_hash_a,
        policy_ref,
        auth_key_name,
    )?;
    bind_cp_hash(session, cp_hash_a)?;
    policy_update(session, CC_POLICY_SIGNED, auth_key_name, policy_ref);
    session.tighten_timeout(auth_timeout);
    Ok(reply)
}

#[allow(clippy::too_many_arguments)]
fn apply_secret(
    session: &mut PolicySession,
    platform: &dyn Platform,
    entity_name: &[u8],
    nonce_tpm: &[u8],
    cp_hash_a: &[u8],
    policy_ref: &[u8],
    expiration: i32,
    hierarchy: Hierarchy,
) -> Result<AssertionReply> {
    let nonce_given = !nonce_tpm.is_empty();
    let auth_timeout = if session.is_trial() {
        0
    } else {
        compute_auth_timeout(session, platform, expiration, nonce_given)?
    };
    if session.is_trial() {
        check_cp_hash_slot(session, cp_hash_a)?;
    } else {
        check_auth_params(session, platform, auth_timeout, cp_hash_a, nonce_tpm)?;
    }
    let reply = auth_reply(
        session,
        platform,
        TicketKind::AuthSecret,
        hierarchy,
        auth_timeout,
        nonce_given,
        expiration,
        cp_hash_a,
        policy_ref,
        entity_name,
    )?;
    bind_cp_hash(session, cp_hash_a)?;
    policy_update(session, CC_POLICY_SECRET, entity_name, policy_ref);
    session.tighten_timeout(auth_timeout);
    Ok(reply)
}

/// Build the Signed/Secret reply (wire timeout plus, for negative
/// expirations on real sessions, an Auth ticket). Computed before the
/// session commit so a platform failure here leaves the session unchanged.
#[allow(clippy::too_many_arguments)]
fn auth_reply(
    session: &PolicySession,
    platform: &dyn Platform,
    kind: TicketKind,
    hierarchy: Hierarchy,
    auth_timeout: u64,
    nonce_given: bool,
    expiration: i32,
    cp_hash_a: &[u8],
    policy_ref: &[u8],
    entity_name: &[u8],
) -> Result<AssertionReply> {
    let expires_on_reset = !nonce_given;
    let mut reply = AssertionReply::default();
    if auth_timeout != 0 {
        reply.timeout = pack_wire_timeout(auth_timeout, expires_on_reset).to_vec();
    }
    if !session.is_trial() && expiration < 0 {
        reply.ticket = Some(Ticket::compute_auth(
            platform,
            session.auth_hash(),
            kind,
            hierarchy,
            auth_timeout,
            expires_on_reset,
            cp_hash_a,
            policy_ref,
            entity_name,
        )?);
    }
    Ok(reply)
}

fn apply_ticket(
    session: &mut PolicySession,
    platform: &dyn Platform,
    ticket: &Ticket,
    wire_timeout: &[u8],
    cp_hash_a: &[u8],
    policy_ref: &[u8],
    auth_name: &[u8],
) -> Result<AssertionReply> {
    let cc = ticket
        .kind
        .replay_command_code()
        .ok_or(PolicyError::BadTicketKind)?;
    let (deadline, expires_on_reset) = unpack_wire_timeout(wire_timeout)?;
    if session.is_trial() {
        check_cp_hash_slot(session, cp_hash_a)?;
    } else {
        check_auth_params(session, platform, deadline, cp_hash_a, &[])?;
        ticket
            .verify_auth(
                platform,
                session.auth_hash(),
                deadline,
                expires_on_reset,
                cp_hash_a,
                policy_ref,
                auth_name,
            )
            .map_err(|err| {
                debug!("auth ticket recomputation diverged");
                err
            })?;
    }
    bind_cp_hash(session, cp_hash_a)?;
    policy_update(session, cc, auth_name, policy_ref);
    session.tighten_timeout(deadline);
    Ok(AssertionReply::default())
}

fn apply_pcr(
    session: &mut PolicySession,
    platform: &dyn Platform,
    selection: &PcrSelectionList,
    digest: &[u8],
) -> Result<AssertionReply> {
    if !digest.is_empty() && digest.len() != session.digest_len() {
        return Err(PolicyError::BadDigestSize {
            got: digest.len(),
            want: session.digest_len(),
        });
    }
    let mut filtered = selection.clone();
    let computed = platform.read_pcr_digest(&mut filtered, session.auth_hash())?;
    let mut pcr_generation = None;
    if !session.is_trial() {
        let counters = platform.read_reset_counters()?;
        if let Some(snapshot) = session.pcr_counter() {
            if snapshot != counters.pcr_generation {
                return Err(PolicyError::PcrChanged);
            }
        }
        if digest.len() != session.digest_len() {
            return Err(PolicyError::BadDigestSize {
                got: digest.len(),
                want: session.digest_len(),
            });
        }
        if digest != computed.as_slice() {
            debug!("caller PCR digest does not match the live composite");
            return Err(PolicyError::PcrDigestMismatch {
                expected: hex::encode(digest),
                got: hex::encode(&computed),
            });
        }
        pcr_generation = Some(counters.pcr_generation);
    }
    // A trial session folds the caller's digest when one is supplied and
    // the live composite otherwise; a real session's digest equals the
    // live composite by this point.
    let folded: &[u8] = if digest.is_empty() { &computed } else { digest };
    PolicyFold::extend(session, CC_POLICY_PCR)
        .field(&filtered.marshal())
        .field(folded)
        .commit(session);
    if pcr_generation.is_some() {
        session.pcr_counter = pcr_generation;
    }
    Ok(AssertionReply::default())
}

fn apply_nv(
    session: &mut PolicySession,
    platform: &dyn Platform,
    nv_index: u32,
    operand_b: &[u8],
    offset: u16,
    operation: CompareOp,
) -> Result<AssertionReply> {
    let len = u16::try_from(operand_b.len()).map_err(|_| PolicyError::OperandOutOfRange {
        offset: offset as usize,
        len: operand_b.len(),
        bound: u16::MAX as usize,
    })?;
    let name = platform.read_nv_name(nv_index)?;
    if !session.is_trial() {
        let data = platform.read_nv_bytes(nv_index, offset, len)?;
        if !compare(operation, &data, operand_b)? {
            return Err(PolicyError::OperandMismatch);
        }
    }
    let args = operand_args_hash(session.auth_hash(), operand_b, offset, operation);
    PolicyFold::extend(session, CC_POLICY_NV)
        .field(&args)
        .field(&name)
        .commit(session);
    Ok(AssertionReply::default())
}

/// Marshaled device time structure the counter-timer assertion indexes
/// into: time ‖ clock ‖ resetCount ‖ restartCount ‖ safe.
fn time_info_bytes(time: &DeviceTime, counters: &ResetCounters) -> [u8; TIME_INFO_LEN] {
    let mut out = [0u8; TIME_INFO_LEN];
    out[0..8].copy_from_slice(&time.millis.to_be_bytes());
    out[8..16].copy_from_slice(&time.clock_millis.to_be_bytes());
    out[16..20].copy_from_slice(&counters.total_resets.to_be_bytes());
    out[20..24].copy_from_slice(&counters.restarts.to_be_bytes());
    out[24] = time.clock_safe as u8;
    out
}

fn apply_counter_timer(
    session: &mut PolicySession,
    platform: &dyn Platform,
    operand_b: &[u8],
    offset: u16,
    operation: CompareOp,
) -> Result<AssertionReply> {
    let start = offset as usize;
    let end = start + operand_b.len();
    if end > TIME_INFO_LEN {
        return Err(PolicyError::OperandOutOfRange {
            offset: start,
            len: operand_b.len(),
            bound: TIME_INFO_LEN,
        });
    }
    if !session.is_trial() {
        let time = platform.read_device_time()?;
        if start < TIME_INFO_CLOCK_END && !time.advancing {
            return Err(PolicyError::ClockUnavailable);
        }
        let counters = platform.read_reset_counters()?;
        let info = time_info_bytes(&time, &counters);
        if !compare(operation, &info[start..end], operand_b)? {
            return Err(PolicyError::OperandMismatch);
        }
    }
    let args = operand_args_hash(session.auth_hash(), operand_b, offset, operation);
    PolicyFold::extend(session, CC_POLICY_COUNTER_TIMER)
        .field(&args)
        .commit(session);
    Ok(AssertionReply::default())
}

fn apply_command_code(
    session: &mut PolicySession,
    platform: &dyn Platform,
    code: u16,
) -> Result<AssertionReply> {
    if session.command_code() != 0 && session.command_code() != code {
        return Err(PolicyError::CommandCodeConflict {
            locked: session.command_code(),
            requested: code,
        });
    }
    if !platform.command_implemented(code) {
        return Err(PolicyError::CommandNotImplemented(code));
    }
    PolicyFold::extend(session, CC_POLICY_COMMAND_CODE)
        .be16(code)
        .commit(session);
    session.command_code = code;
    Ok(AssertionReply::default())
}

fn apply_argument_hash(
    session: &mut PolicySession,
    cc: u16,
    variant: fn(Vec<u8>) -> ArgumentHash,
    hash: &[u8],
) -> Result<AssertionReply> {
    if hash.len() != session.digest_len() {
        return Err(PolicyError::BadDigestSize {
            got: hash.len(),
            want: session.digest_len(),
        });
    }
    session.argument_hash.bind(variant(hash.to_vec()))?;
    PolicyFold::extend(session, cc).field(hash).commit(session);
    Ok(AssertionReply::default())
}

fn apply_or(session: &mut PolicySession, branches: &[Vec<u8>]) -> Result<AssertionReply> {
    if !(OR_MIN_BRANCHES..=OR_MAX_BRANCHES).contains(&branches.len()) {
        return Err(PolicyError::BranchCountOutOfRange(branches.len()));
    }
    if !session.is_trial()
        && !branches
            .iter()
            .any(|branch| branch.as_slice() == session.policy_digest())
    {
        debug!("session digest matches none of the disjunction branches");
        return Err(PolicyError::OrBranchNotFound);
    }
    let mut fold = PolicyFold::restart(session, CC_POLICY_OR);
    for branch in branches {
        fold = fold.field(branch);
    }
    fold.commit(session);
    Ok(AssertionReply::default())
}

fn apply_locality(session: &mut PolicySession, locality: u8) -> Result<AssertionReply> {
    if locality == 0 {
        return Err(PolicyError::LocalityOutOfRange(locality));
    }
    let current = session.command_locality();
    let narrowed = if current == 0 {
        locality
    } else if locality < LOCALITY_EXTENDED_START {
        // Bitmap family: intersect; an extended setting or an empty
        // intersection cannot be satisfied.
        if current >= LOCALITY_EXTENDED_START || current & locality == 0 {
            return Err(PolicyError::LocalityConflict {
                requested: locality,
                current,
            });
        }
        current & locality
    } else {
        // Extended family: exact match only.
        if current != locality {
            return Err(PolicyError::LocalityConflict {
                requested: locality,
                current,
            });
        }
        locality
    };
    PolicyFold::extend(session, CC_POLICY_LOCALITY)
        .byte(locality)
        .commit(session);
    session.command_locality = narrowed;
    Ok(AssertionReply::default())
}

fn apply_duplication_select(
    session: &mut PolicySession,
    object_name: &[u8],
    new_parent_name: &[u8],
    include_object: bool,
) -> Result<AssertionReply> {
    if session.command_code() != 0 {
        return Err(PolicyError::CommandCodeConflict {
            locked: session.command_code(),
            requested: CC_DUPLICATE,
        });
    }
    // Unlike PolicyNameHash, this assertion derives the name hash itself,
    // so a slot bound earlier by anyone is a conflict even on equal
    // content.
    if !session.argument_hash.is_unset() {
        return Err(PolicyError::ArgumentHashConflict);
    }
    let mut ctx = HashContext::new(session.auth_hash());
    ctx.update(object_name).update(new_parent_name);
    let name_hash = ctx.finish();
    session.argument_hash.bind(ArgumentHash::NameHash(name_hash))?;

    let mut fold = PolicyFold::extend(session, CC_POLICY_DUPLICATION_SELECT);
    if include_object {
        fold = fold.field(object_name);
    }
    fold.field(new_parent_name)
        .byte(include_object as u8)
        .commit(session);
    session.command_code = CC_DUPLICATE;
    Ok(AssertionReply::default())
}

fn apply_authorize(
    session: &mut PolicySession,
    platform: &dyn Platform,
    approved_policy: &[u8],
    policy_ref: &[u8],
    key_sign_name: &[u8],
    check_ticket: &Ticket,
) -> Result<AssertionReply> {
    if !session.is_trial() {
        if approved_policy != session.policy_digest() {
            return Err(PolicyError::ApprovedPolicyMismatch);
        }
        if check_ticket.kind != TicketKind::Verified {
            return Err(PolicyError::BadTicketKind);
        }
        let mut ctx = HashContext::new(session.auth_hash());
        ctx.update(approved_policy).update(policy_ref);
        let a_hash = ctx.finish();
        check_ticket.verify_verified(platform, session.auth_hash(), &a_hash, key_sign_name)?;
    }
    session.zero_policy_digest();
    policy_update(session, CC_POLICY_AUTHORIZE, key_sign_name, policy_ref);
    Ok(AssertionReply::default())
}

fn apply_authorize_nv(
    session: &mut PolicySession,
    platform: &dyn Platform,
    nv_index: u32,
) -> Result<AssertionReply> {
    let name = platform.read_nv_name(nv_index)?;
    if !session.is_trial() {
        let want = 2 + session.digest_len();
        let data = platform.read_nv_bytes(nv_index, 0, want as u16)?;
        let [hi, lo] = data.get(..2).and_then(|b| <[u8; 2]>::try_from(b).ok()).ok_or(
            PolicyError::OperandOutOfRange {
                offset: 0,
                len: want,
                bound: data.len(),
            },
        )?;
        let stored_id = u16::from_be_bytes([hi, lo]);
        let stored_alg = HashAlg::from_alg_id(stored_id)?;
        if stored_alg != session.auth_hash() {
            return Err(PolicyError::NvAlgMismatch {
                stored: stored_id,
                session: session.auth_hash().alg_id(),
            });
        }
        if data[2..] != session.policy_digest()[..] {
            return Err(PolicyError::ApprovedPolicyMismatch);
        }
    }
    session.zero_policy_digest();
    policy_update(session, CC_POLICY_AUTHORIZE_NV, &name, &[]);
    Ok(AssertionReply::default())
}

/// AuthValue and Password fold the same constant; they differ only in
/// which of the two mutually exclusive flags ends up set.
fn apply_auth_value(session: &mut PolicySession, password: bool) -> AssertionReply {
    PolicyFold::extend(session, CC_POLICY_AUTH_VALUE).commit(session);
    session.password_needed = password;
    session.auth_value_needed = !password;
    AssertionReply::default()
}

fn apply_nv_written(session: &mut PolicySession, written: bool) -> Result<AssertionReply> {
    if let Some(previous) = session.check_nv_written() {
        if previous != written {
            return Err(PolicyError::NvWrittenConflict(previous));
        }
    }
    PolicyFold::extend(session, CC_POLICY_NV_WRITTEN)
        .byte(written as u8)
        .commit(session);
    session.check_nv_written = Some(written);
    Ok(AssertionReply::default())
}

fn apply_capability(
    session: &mut PolicySession,
    platform: &dyn Platform,
    operand_b: &[u8],
    offset: u16,
    operation: CompareOp,
    capability: u32,
    property: u32,
) -> Result<AssertionReply> {
    if !session.is_trial() {
        match platform.read_capability(capability, property)? {
            // A property the device does not have trivially satisfies
            // only "not equal".
            None => {
                if operation != CompareOp::Neq {
                    return Err(PolicyError::PropertyUnavailable {
                        capability,
                        property,
                    });
                }
            }
            Some(value) => {
                let start = offset as usize;
                let end = start + operand_b.len();
                if end > value.len() {
                    return Err(PolicyError::OperandOutOfRange {
                        offset: start,
                        len: operand_b.len(),
                        bound: value.len(),
                    });
                }
                if !compare(operation, &value[start..end], operand_b)? {
                    return Err(PolicyError::OperandMismatch);
                }
            }
        }
    }
    let args = capability_args_hash(
        session.auth_hash(),
        operand_b,
        offset,
        operation,
        capability,
        property,
    );
    PolicyFold::extend(session, CC_POLICY_CAPABILITY)
        .field(&args)
        .commit(session);
    Ok(AssertionReply::default())
}
