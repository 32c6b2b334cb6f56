//! Fixed shop parameters and hard limits enforced by the engine.

/// Width of the booking grid. Every block and appointment start must sit on
/// a multiple of this many minutes past the hour.
pub const SLOT_MINUTES: u32 = 15;

/// A lunch break always spans exactly this long.
pub const LUNCH_BREAK_MINUTES: i64 = 30;

pub const MAX_PROVIDERS_PER_TENANT: usize = 10_000;
pub const MAX_BLOCKS_PER_PROVIDER: usize = 4_096;
pub const MAX_APPOINTMENTS_PER_PROVIDER: usize = 65_536;

/// Provider/client identifiers (emails in practice).
pub const MAX_ID_LEN: usize = 256;
pub const MAX_SERVICE_KEY_LEN: usize = 64;

pub const MAX_TENANTS: usize = 256;
pub const MAX_TENANT_NAME_LEN: usize = 256;
