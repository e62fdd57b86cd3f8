//! Wire constants of the policy protocol.
//!
//! The assertion constants are hashed into every policy digest and the
//! ticket tags into every ticket MAC, so they are part of the
//! wire-compatible policy format and must not change.

/// Assertion constants (low 16 bits of the originating command codes).
pub const CC_POLICY_NV: u16 = 0x0149;
pub const CC_POLICY_SECRET: u16 = 0x0151;
pub const CC_POLICY_SIGNED: u16 = 0x0160;
pub const CC_POLICY_AUTHORIZE: u16 = 0x016A;
pub const CC_POLICY_AUTH_VALUE: u16 = 0x016B;
pub const CC_POLICY_COMMAND_CODE: u16 = 0x016C;
pub const CC_POLICY_COUNTER_TIMER: u16 = 0x016D;
pub const CC_POLICY_CP_HASH: u16 = 0x016E;
pub const CC_POLICY_LOCALITY: u16 = 0x016F;
pub const CC_POLICY_NAME_HASH: u16 = 0x0170;
pub const CC_POLICY_OR: u16 = 0x0171;
pub const CC_POLICY_TICKET: u16 = 0x0172;
pub const CC_POLICY_PCR: u16 = 0x017F;
pub const CC_POLICY_PHYSICAL_PRESENCE: u16 = 0x0187;
pub const CC_POLICY_DUPLICATION_SELECT: u16 = 0x0188;
pub const CC_POLICY_PASSWORD: u16 = 0x018C;
pub const CC_POLICY_NV_WRITTEN: u16 = 0x018F;
pub const CC_POLICY_TEMPLATE: u16 = 0x0190;
pub const CC_POLICY_AUTHORIZE_NV: u16 = 0x0192;
pub const CC_POLICY_CAPABILITY: u16 = 0x019B;
pub const CC_POLICY_PARAMETERS: u16 = 0x019C;

/// The command a duplication-select policy locks the session to.
pub const CC_DUPLICATE: u16 = 0x014B;

/// Ticket tag constants.
pub const ST_CREATION: u16 = 0x8021;
pub const ST_VERIFIED: u16 = 0x8022;
pub const ST_AUTH_SECRET: u16 = 0x8023;
pub const ST_HASHCHECK: u16 = 0x8024;
pub const ST_AUTH_SIGNED: u16 = 0x8025;

/// Algorithm identifiers for the supported digest algorithms.
pub const ALG_SHA1: u16 = 0x0004;
pub const ALG_SHA256: u16 = 0x000B;
pub const ALG_SHA384: u16 = 0x000C;
pub const ALG_SHA512: u16 = 0x000D;

/// High bit of the 8-byte wire timeout: the deadline expires on device
/// reset (it was derived relative to the running clock, not the session).
pub const TIMEOUT_EXPIRES_ON_RESET: u64 = 1 << 63;

/// Marshaled layout of the device time structure the counter-timer
/// assertion compares against: time (u64), clock (u64), resetCount (u32),
/// restartCount (u32), safe (u8).
pub const TIME_INFO_LEN: usize = 25;
/// Bytes 0..16 hold the two running clock fields; comparing against them
/// requires an advancing clock.
pub const TIME_INFO_CLOCK_END: usize = 16;

/// Inclusive bounds on the number of branches in a disjunction.
pub const OR_MIN_BRANCHES: usize = 2;
pub const OR_MAX_BRANCHES: usize = 8;

/// Localities below this value are bitmaps; values at or above it name a
/// single extended locality.
pub const LOCALITY_EXTENDED_START: u8 = 32;
