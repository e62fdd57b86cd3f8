//! Ticket issuance, recomputation and replay.

mod common;

use common::MockPlatform;
use tpm2_policy::{
    apply, unpack_wire_timeout, HashAlg, Hierarchy, PolicyAssertion, PolicyError, PolicySession,
    Ticket, TicketKind,
};

const CP_HASH: [u8; 32] = [0x11; 32];
const POLICY_REF: &[u8] = b"policy-ref";
const ENTITY: [u8; 34] = [0x22; 34];

fn auth_ticket(platform: &MockPlatform, timeout: u64, expires_on_reset: bool) -> Ticket {
    Ticket::compute_auth(
        platform,
        HashAlg::Sha256,
        TicketKind::AuthSigned,
        Hierarchy::Owner,
        timeout,
        expires_on_reset,
        &CP_HASH,
        POLICY_REF,
        &ENTITY,
    )
    .unwrap()
}

#[test]
fn recomputation_is_bit_exact() {
    let platform = MockPlatform::default();
    let a = auth_ticket(&platform, 90_000, false);
    let b = auth_ticket(&platform, 90_000, false);
    assert_eq!(a, b);
    a.verify_auth(
        &platform,
        HashAlg::Sha256,
        90_000,
        false,
        &CP_HASH,
        POLICY_REF,
        &ENTITY,
    )
    .unwrap();
}

#[test]
fn every_input_is_bound() {
    let platform = MockPlatform::default();
    let baseline = auth_ticket(&platform, 90_000, false);

    let mut flipped_cp = CP_HASH;
    flipped_cp[5] ^= 1;
    let with_cp = Ticket::compute_auth(
        &platform,
        HashAlg::Sha256,
        TicketKind::AuthSigned,
        Hierarchy::Owner,
        90_000,
        false,
        &flipped_cp,
        POLICY_REF,
        &ENTITY,
    )
    .unwrap();
    assert_ne!(baseline.digest, with_cp.digest);

    let with_ref = Ticket::compute_auth(
        &platform,
        HashAlg::Sha256,
        TicketKind::AuthSigned,
        Hierarchy::Owner,
        90_000,
        false,
        &CP_HASH,
        b"policy-reg",
        &ENTITY,
    )
    .unwrap();
    assert_ne!(baseline.digest, with_ref.digest);

    let mut flipped_entity = ENTITY;
    flipped_entity[0] ^= 1;
    let with_entity = Ticket::compute_auth(
        &platform,
        HashAlg::Sha256,
        TicketKind::AuthSigned,
        Hierarchy::Owner,
        90_000,
        false,
        &CP_HASH,
        POLICY_REF,
        &flipped_entity,
    )
    .unwrap();
    assert_ne!(baseline.digest, with_entity.digest);

    let with_timeout = auth_ticket(&platform, 90_001, false);
    assert_ne!(baseline.digest, with_timeout.digest);

    let with_hierarchy = Ticket::compute_auth(
        &platform,
        HashAlg::Sha256,
        TicketKind::AuthSigned,
        Hierarchy::Endorsement,
        90_000,
        false,
        &CP_HASH,
        POLICY_REF,
        &ENTITY,
    )
    .unwrap();
    assert_ne!(baseline.digest, with_hierarchy.digest);

    // The signed and secret flavors never collide.
    let secret_kind = Ticket::compute_auth(
        &platform,
        HashAlg::Sha256,
        TicketKind::AuthSecret,
        Hierarchy::Owner,
        90_000,
        false,
        &CP_HASH,
        POLICY_REF,
        &ENTITY,
    )
    .unwrap();
    assert_ne!(baseline.digest, secret_kind.digest);
}

#[test]
fn reset_binding_only_with_the_flag() {
    let mut platform = MockPlatform::default();
    let flagged = auth_ticket(&platform, 90_000, true);
    let unflagged = auth_ticket(&platform, 90_000, false);

    platform.counters.total_resets += 1;

    // The flagged ticket dies with the reset.
    assert_eq!(
        flagged.verify_auth(
            &platform,
            HashAlg::Sha256,
            90_000,
            true,
            &CP_HASH,
            POLICY_REF,
            &ENTITY,
        ),
        Err(PolicyError::TicketMismatch)
    );
    // The unflagged one survives it.
    unflagged
        .verify_auth(
            &platform,
            HashAlg::Sha256,
            90_000,
            false,
            &CP_HASH,
            POLICY_REF,
            &ENTITY,
        )
        .unwrap();
}

#[test]
fn epoch_binding_applies_whenever_a_deadline_exists() {
    let mut platform = MockPlatform::default();
    let bounded = auth_ticket(&platform, 90_000, false);
    let unbounded = auth_ticket(&platform, 0, false);

    platform.time.epoch += 1;

    assert_eq!(
        bounded.verify_auth(
            &platform,
            HashAlg::Sha256,
            90_000,
            false,
            &CP_HASH,
            POLICY_REF,
            &ENTITY,
        ),
        Err(PolicyError::TicketMismatch)
    );
    unbounded
        .verify_auth(
            &platform,
            HashAlg::Sha256,
            0,
            false,
            &CP_HASH,
            POLICY_REF,
            &ENTITY,
        )
        .unwrap();
}

#[test]
fn other_ticket_kinds_round_trip() {
    let platform = MockPlatform::default();

    let verified = Ticket::compute_verified(
        &platform,
        HashAlg::Sha256,
        Hierarchy::Owner,
        &[0x33; 32],
        &[0x44; 34],
    )
    .unwrap();
    verified
        .verify_verified(&platform, HashAlg::Sha256, &[0x33; 32], &[0x44; 34])
        .unwrap();
    assert_eq!(
        verified.verify_verified(&platform, HashAlg::Sha256, &[0x34; 32], &[0x44; 34]),
        Err(PolicyError::TicketMismatch)
    );

    let hash_check = Ticket::compute_hash_check(
        &platform,
        HashAlg::Sha256,
        Hierarchy::Null,
        HashAlg::Sha384,
        &[0x55; 48],
    )
    .unwrap();
    hash_check
        .verify_hash_check(&platform, HashAlg::Sha256, HashAlg::Sha384, &[0x55; 48])
        .unwrap();
    // The digest algorithm is part of the MAC.
    assert_eq!(
        hash_check.verify_hash_check(&platform, HashAlg::Sha256, HashAlg::Sha512, &[0x55; 48]),
        Err(PolicyError::TicketMismatch)
    );

    let creation = Ticket::compute_creation(
        &platform,
        HashAlg::Sha256,
        Hierarchy::Platform,
        &[0x66; 34],
        &[0x77; 32],
    )
    .unwrap();
    creation
        .verify_creation(&platform, HashAlg::Sha256, &[0x66; 34], &[0x77; 32])
        .unwrap();
    assert_eq!(
        creation.verify_creation(&platform, HashAlg::Sha256, &[0x66; 34], &[0x78; 32]),
        Err(PolicyError::TicketMismatch)
    );
}

#[test]
fn signed_assertion_emits_a_flagged_wire_timeout() {
    let platform = MockPlatform::default();
    let mut session = PolicySession::real(HashAlg::Sha256, vec![0xA5; 16], 10_000, 1);

    // No nonce: the deadline is relative to the running clock, so the
    // reply carries the expires-on-reset bit.
    let reply = apply(
        &mut session,
        &platform,
        &PolicyAssertion::Signed {
            auth_key_name: vec![0x0B; 34],
            signature: platform.good_signature.clone(),
            nonce_tpm: vec![],
            cp_hash_a: vec![],
            policy_ref: vec![],
            expiration: -5,
            hierarchy: Hierarchy::Owner,
        },
    )
    .unwrap();

    let (deadline, expires_on_reset) = unpack_wire_timeout(&reply.timeout).unwrap();
    assert!(expires_on_reset);
    // 5s past the mock clock's 60_000 ms, aligned to the second.
    assert_eq!(deadline, 65_000);
    assert_eq!(session.timeout(), 65_000);

    let ticket = reply.ticket.expect("negative expiration issues a ticket");
    assert_eq!(ticket.kind, TicketKind::AuthSigned);
    ticket
        .verify_auth(
            &platform,
            HashAlg::Sha256,
            deadline,
            expires_on_reset,
            &[],
            &[],
            &[0x0B; 34],
        )
        .unwrap();
}

#[test]
fn replay_locks_the_deadline_and_checks_the_clock() {
    let mut platform = MockPlatform::default();
    let mut issuing = PolicySession::real(HashAlg::Sha256, vec![0xA5; 16], 10_000, 1);
    let reply = apply(
        &mut issuing,
        &platform,
        &PolicyAssertion::Secret {
            entity_name: ENTITY.to_vec(),
            nonce_tpm: vec![0xA5; 16],
            cp_hash_a: vec![],
            policy_ref: POLICY_REF.to_vec(),
            expiration: -100,
            hierarchy: Hierarchy::Owner,
        },
    )
    .unwrap();
    let ticket = reply.ticket.unwrap();

    let replay = PolicyAssertion::Ticket {
        ticket,
        wire_timeout: reply.timeout,
        cp_hash_a: vec![],
        policy_ref: POLICY_REF.to_vec(),
        auth_name: ENTITY.to_vec(),
    };

    // Deadline is 10_000 + 100_000; replay works now but not after it.
    let mut session = PolicySession::real(HashAlg::Sha256, vec![0xB6; 16], 10_000, 1);
    apply(&mut session, &platform, &replay).unwrap();
    assert_eq!(session.policy_digest(), issuing.policy_digest());

    platform.time.millis = 110_000;
    let mut late = PolicySession::real(HashAlg::Sha256, vec![0xB6; 16], 10_000, 1);
    assert_eq!(
        apply(&mut late, &platform, &replay),
        Err(PolicyError::Expired)
    );
}
