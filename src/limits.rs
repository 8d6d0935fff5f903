//! Hard caps on tenant input. Anything past these is rejected with
//! `LimitExceeded` instead of being stored.

pub const MAX_TENANTS: usize = 1024;
pub const MAX_TENANT_NAME_LEN: usize = 128;

pub const MAX_NAME_LEN: usize = 256;
pub const MAX_EMAIL_LEN: usize = 320;
pub const MAX_PHONE_LEN: usize = 64;
pub const MAX_NOTES_LEN: usize = 4096;
pub const MAX_SESSION_ID_LEN: usize = 256;

/// Longest calendar range a single query may cover, inclusive.
pub const MAX_CALENDAR_DAYS: i64 = 366;

/// One day. No service may run longer than that.
pub const MAX_DURATION_MINUTES: u32 = 24 * 60;

pub const MAX_ADVANCE_DAYS: u32 = 3650;
