//! Shared nonce/expiration/cpHash validation for the signature- and
//! secret-based assertions and for ticket replay.

use crate::error::{PolicyError, Result};
use crate::platform::Platform;
use crate::session::{ArgumentHash, PolicySession};

/// Derive the absolute deadline (ms) for an `expiration` given in signed
/// seconds. Zero means no deadline. Without a nonce the deadline is
/// relative to the current device time (aligned down to the second, since
/// expirations have one-second granularity); with a nonce it is relative
/// to the session start, which later clock manipulation cannot move.
pub(crate) fn compute_auth_timeout(
    session: &PolicySession,
    platform: &dyn Platform,
    expiration: i32,
    nonce_given: bool,
) -> Result<u64> {
    if expiration == 0 {
        return Ok(0);
    }
    // unsigned_abs also covers i32::MIN, which has no signed negation.
    let expiration_ms = u64::from(expiration.unsigned_abs()) * 1000;
    let deadline = if nonce_given {
        session.start_time() + expiration_ms
    } else {
        let now = platform.read_device_time()?.millis;
        expiration_ms + (now - now % 1000)
    };
    Ok(deadline)
}

/// Validate the common assertion parameters against the session.
///
/// Nothing here mutates the session; the caller binds `cp_hash_a` into the
/// argument-hash slot during its own commit step.
pub(crate) fn check_auth_params(
    session: &PolicySession,
    platform: &dyn Platform,
    auth_timeout: u64,
    cp_hash_a: &[u8],
    nonce: &[u8],
) -> Result<()> {
    if !nonce.is_empty() && nonce != session.nonce_tpm() {
        return Err(PolicyError::NonceMismatch);
    }
    if auth_timeout != 0 {
        let time = platform.read_device_time()?;
        if !time.advancing {
            return Err(PolicyError::ClockUnavailable);
        }
        if time.millis >= auth_timeout {
            return Err(PolicyError::Expired);
        }
        // An epoch change severs the link between the recorded deadline
        // and the running clock, invalidating every outstanding deadline.
        if session.epoch() != time.epoch {
            return Err(PolicyError::EpochChanged);
        }
    }
    check_cp_hash_slot(session, cp_hash_a)
}

/// The cpHash size and single-writer checks alone, used by trial sessions
/// where the time- and nonce-based checks do not apply.
pub(crate) fn check_cp_hash_slot(session: &PolicySession, cp_hash_a: &[u8]) -> Result<()> {
    if cp_hash_a.is_empty() {
        return Ok(());
    }
    if cp_hash_a.len() != session.digest_len() {
        return Err(PolicyError::BadDigestSize {
            got: cp_hash_a.len(),
            want: session.digest_len(),
        });
    }
    session
        .argument_hash
        .check_bind(&ArgumentHash::CpHash(cp_hash_a.to_vec()))
}

/// Bind a validated cpHash into the session slot.
pub(crate) fn bind_cp_hash(session: &mut PolicySession, cp_hash_a: &[u8]) -> Result<()> {
    if cp_hash_a.is_empty() {
        return Ok(());
    }
    session
        .argument_hash
        .bind(ArgumentHash::CpHash(cp_hash_a.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;
    use crate::crypto::HashAlg;
    use crate::platform::{DeviceTime, Hierarchy, PcrSelectionList, ResetCounters};
    use zeroize::Zeroizing;

    struct Clock {
        time: DeviceTime,
    }

    impl Platform for Clock {
        fn read_device_time(&self) -> Result<DeviceTime> {
            Ok(self.time)
        }
        fn read_reset_counters(&self) -> Result<ResetCounters> {
            Ok(ResetCounters {
                pcr_generation: 0,
                total_resets: 0,
                restarts: 0,
            })
        }
        fn read_nv_bytes(&self, _: u32, _: u16, _: u16) -> Result<Vec<u8>> {
            unimplemented!()
        }
        fn read_nv_name(&self, _: u32) -> Result<Vec<u8>> {
            unimplemented!()
        }
        fn read_pcr_digest(&self, _: &mut PcrSelectionList, _: HashAlg) -> Result<Vec<u8>> {
            unimplemented!()
        }
        fn verify_signature(&self, _: &[u8], _: &[u8], _: &[u8]) -> Result<()> {
            unimplemented!()
        }
        fn read_capability(&self, _: u32, _: u32) -> Result<Option<Vec<u8>>> {
            unimplemented!()
        }
        fn command_implemented(&self, _: u16) -> bool {
            true
        }
        fn hierarchy_secret(&self, _: Hierarchy) -> Result<Zeroizing<Vec<u8>>> {
            unimplemented!()
        }
    }

    fn clock(millis: u64, epoch: u32, advancing: bool) -> Clock {
        Clock {
            time: DeviceTime {
                millis,
                clock_millis: millis,
                epoch,
                advancing,
                clock_safe: true,
            },
        }
    }

    fn session() -> PolicySession {
        PolicySession::real(HashAlg::Sha256, alloc::vec![0xA5; 16], 10_000, 7)
    }

    #[test]
    fn timeout_zero_expiration() {
        let platform = clock(123_456, 7, true);
        assert_eq!(
            compute_auth_timeout(&session(), &platform, 0, true).unwrap(),
            0
        );
    }

    #[test]
    fn timeout_relative_to_session_start_with_nonce() {
        let platform = clock(999_999, 7, true);
        assert_eq!(
            compute_auth_timeout(&session(), &platform, -30, true).unwrap(),
            10_000 + 30_000
        );
    }

    #[test]
    fn timeout_relative_to_now_without_nonce() {
        let platform = clock(123_456, 7, true);
        assert_eq!(
            compute_auth_timeout(&session(), &platform, 5, false).unwrap(),
            5_000 + 123_000
        );
    }

    #[test]
    fn timeout_saturates_int_min() {
        let platform = clock(0, 7, true);
        let deadline = compute_auth_timeout(&session(), &platform, i32::MIN, false).unwrap();
        assert_eq!(deadline, (1u64 << 31) * 1000);
    }

    #[test]
    fn nonce_must_match() {
        let platform = clock(0, 7, true);
        let s = session();
        assert_eq!(
            check_auth_params(&s, &platform, 0, &[], &[0xFF; 16]),
            Err(PolicyError::NonceMismatch)
        );
        check_auth_params(&s, &platform, 0, &[], &[0xA5; 16]).unwrap();
        // Empty nonce is "none supplied", not a mismatch.
        check_auth_params(&s, &platform, 0, &[], &[]).unwrap();
    }

    #[test]
    fn deadline_boundary_is_exclusive() {
        let s = session();
        let at = clock(20_000, 7, true);
        assert_eq!(
            check_auth_params(&s, &at, 20_000, &[], &[]),
            Err(PolicyError::Expired)
        );
        let before = clock(19_999, 7, true);
        check_auth_params(&s, &before, 20_000, &[], &[]).unwrap();
    }

    #[test]
    fn stopped_clock_is_retryable() {
        let s = session();
        let err = check_auth_params(&s, &clock(0, 7, false), 20_000, &[], &[]).unwrap_err();
        assert_eq!(err, PolicyError::ClockUnavailable);
        assert!(err.is_retryable());
    }

    #[test]
    fn epoch_change_is_terminal() {
        let s = session();
        let err = check_auth_params(&s, &clock(0, 8, true), 20_000, &[], &[]).unwrap_err();
        assert_eq!(err, PolicyError::EpochChanged);
        assert!(!err.is_retryable());
    }

    #[test]
    fn cp_hash_size_and_conflict() {
        let platform = clock(0, 7, true);
        let mut s = session();
        assert!(matches!(
            check_auth_params(&s, &platform, 0, &[1, 2, 3], &[]),
            Err(PolicyError::BadDigestSize { got: 3, want: 32 })
        ));
        bind_cp_hash(&mut s, &[0x11; 32]).unwrap();
        check_auth_params(&s, &platform, 0, &[0x11; 32], &[]).unwrap();
        assert_eq!(
            check_auth_params(&s, &platform, 0, &[0x22; 32], &[]),
            Err(PolicyError::ArgumentHashConflict)
        );
    }
}
