//! The digest chaining protocol.
//!
//! Every assertion extends the session digest with
//! `H(policyDigest ‖ BE16(constant) ‖ field…)`; the field order per kind
//! is fixed and reproduced by external verifiers, so the fold here is the
//! wire format. [`PolicyFold`] separates accumulation from the final
//! `commit`, which is the handler's single point of session mutation.

use alloc::vec::Vec;

use crate::crypto::{HashAlg, HashContext};
use crate::operand::CompareOp;
use crate::session::PolicySession;

/// An in-flight digest extension. Nothing touches the session until
/// [`commit`](Self::commit).
pub(crate) struct PolicyFold {
    ctx: HashContext,
}

impl PolicyFold {
    /// Seed with the current digest and the assertion constant.
    pub(crate) fn extend(session: &PolicySession, cc: u16) -> Self {
        let mut ctx = HashContext::new(session.auth_hash());
        ctx.update(session.policy_digest()).update_be16(cc);
        Self { ctx }
    }

    /// Seed with a zero digest and the assertion constant (the
    /// authorize-by-redirect and disjunction folds).
    pub(crate) fn restart(session: &PolicySession, cc: u16) -> Self {
        let zeros = alloc::vec![0u8; session.digest_len()];
        let mut ctx = HashContext::new(session.auth_hash());
        ctx.update(&zeros).update_be16(cc);
        Self { ctx }
    }

    pub(crate) fn field(mut self, bytes: &[u8]) -> Self {
        self.ctx.update(bytes);
        self
    }

    pub(crate) fn byte(mut self, v: u8) -> Self {
        self.ctx.update(&[v]);
        self
    }

    pub(crate) fn be16(mut self, v: u16) -> Self {
        self.ctx.update_be16(v);
        self
    }

    pub(crate) fn commit(self, session: &mut PolicySession) {
        session.set_policy_digest(self.ctx.finish());
    }
}

/// The two-stage name/ref update shared by the signature-, secret-,
/// ticket- and redirect-based assertions:
/// `d' = H(d ‖ BE16(cc) ‖ name)`, then `d'' = H(d' ‖ policyRef)` when a
/// reference is present.
pub(crate) fn policy_update(
    session: &mut PolicySession,
    cc: u16,
    name: &[u8],
    policy_ref: &[u8],
) {
    PolicyFold::extend(session, cc).field(name).commit(session);
    if !policy_ref.is_empty() {
        let mut ctx = HashContext::new(session.auth_hash());
        ctx.update(session.policy_digest()).update(policy_ref);
        session.set_policy_digest(ctx.finish());
    }
}

/// Argument hash of the operand-comparison assertions:
/// `H(operandB ‖ BE16(offset) ‖ BE16(operation))`.
pub(crate) fn operand_args_hash(
    alg: HashAlg,
    operand_b: &[u8],
    offset: u16,
    operation: CompareOp,
) -> Vec<u8> {
    let mut ctx = HashContext::new(alg);
    ctx.update(operand_b)
        .update_be16(offset)
        .update_be16(operation.op_id());
    ctx.finish()
}

/// Argument hash of the capability-comparison assertion, which also binds
/// the capability/property pair being inspected.
pub(crate) fn capability_args_hash(
    alg: HashAlg,
    operand_b: &[u8],
    offset: u16,
    operation: CompareOp,
    capability: u32,
    property: u32,
) -> Vec<u8> {
    let mut ctx = HashContext::new(alg);
    ctx.update(operand_b)
        .update_be16(offset)
        .update_be16(operation.op_id())
        .update_be32(capability)
        .update_be32(property);
    ctx.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash;

    #[test]
    fn fold_matches_manual_concatenation() {
        let mut session = PolicySession::trial(HashAlg::Sha256);
        PolicyFold::extend(&session, 0x016C)
            .be16(0x0145)
            .commit(&mut session);

        let mut manual = alloc::vec![0u8; 32];
        manual.extend_from_slice(&0x016Cu16.to_be_bytes());
        manual.extend_from_slice(&0x0145u16.to_be_bytes());
        assert_eq!(session.policy_digest(), hash(HashAlg::Sha256, &manual));
    }

    #[test]
    fn restart_fold_ignores_current_digest() {
        let mut a = PolicySession::trial(HashAlg::Sha256);
        let mut b = PolicySession::trial(HashAlg::Sha256);
        // Diverge a first.
        PolicyFold::extend(&a, 0x016C).be16(1).commit(&mut a);
        PolicyFold::restart(&a, 0x0171).field(&[0xAA; 32]).commit(&mut a);
        PolicyFold::restart(&b, 0x0171).field(&[0xAA; 32]).commit(&mut b);
        assert_eq!(a.policy_digest(), b.policy_digest());
    }

    #[test]
    fn two_stage_update_skips_empty_ref() {
        let mut with_ref = PolicySession::trial(HashAlg::Sha256);
        let mut without_ref = PolicySession::trial(HashAlg::Sha256);
        policy_update(&mut with_ref, 0x0160, b"key-name", b"ref");
        policy_update(&mut without_ref, 0x0160, b"key-name", b"");

        // Stage one only.
        let mut stage1 = alloc::vec![0u8; 32];
        stage1.extend_from_slice(&0x0160u16.to_be_bytes());
        stage1.extend_from_slice(b"key-name");
        let stage1 = hash(HashAlg::Sha256, &stage1);
        assert_eq!(without_ref.policy_digest(), stage1);

        // Stage two chains the reference.
        let mut stage2 = stage1.clone();
        stage2.extend_from_slice(b"ref");
        assert_eq!(with_ref.policy_digest(), hash(HashAlg::Sha256, &stage2));
    }
}
