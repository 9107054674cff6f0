//! Default values pulled from the reference deployment's config tables.
//! Every constant here is a *default* — stations may override it via their
//! on-disk config — never a hard limit enforced regardless of config.

// ── Resilience thresholds ────────────────────────────────────────────────────

/// Endurance-to-isolation-target ratio at or above which a lifeline reads SAFE.
pub const THRESHOLD_SAFE: f64 = 1.2;

/// Ratio at or above which a lifeline reads WARNING (below this is CRITICAL).
pub const THRESHOLD_WARNING: f64 = 1.0;

/// Default isolation target, in days, when a station has no resilience config row.
pub const DEFAULT_ISOLATION_TARGET_DAYS: f64 = 3.0;

/// Default population count used to scale per-person consumption rates.
pub const DEFAULT_POPULATION_COUNT: u32 = 1;

// ── Envelope / replay protection ────────────────────────────────────────────

/// Default envelope max age before it's rejected as expired, in days.
pub const DEFAULT_ENVELOPE_EXPIRY_DAYS: i64 = 7;

/// Age past which a replay-protector record is safe to prune, in days.
pub const REPLAY_RECORD_RETENTION_DAYS: i64 = 30;

/// Minimum accepted event payload size limit; stations may raise this but not lower it.
pub const MIN_EVENT_PAYLOAD_LIMIT_BYTES: usize = 1024 * 1024;

// ── Mobile pairing / session ────────────────────────────────────────────────

/// Pairing code validity window, in seconds.
pub const PAIRING_CODE_TTL_SECS: i64 = 5 * 60;

/// Session token validity window, in seconds.
pub const SESSION_TOKEN_TTL_SECS: i64 = 12 * 60 * 60;

/// Pairing attempts allowed per device within `RATE_LIMIT_WINDOW_SECS`.
pub const RATE_LIMIT_ATTEMPTS: u32 = 5;

/// Rolling window for pairing rate limiting, in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Default scopes granted to a freshly paired mobile device.
pub const DEFAULT_MOBILE_SCOPES: &[&str] = &["inventory:read", "inventory:write", "case:read"];

/// Default roles a pairing code may be exchanged by, absent an explicit restriction.
pub const DEFAULT_ALLOWED_ROLES: &[&str] = &["nurse", "doctor"];

// ── OTA update scheduler ─────────────────────────────────────────────────────

/// Default interval between update-server polls, in seconds.
pub const OTA_POLL_INTERVAL_SECS: u64 = 60 * 60;

/// Number of prior versions retained under the double-buffered version store.
pub const OTA_RETAINED_VERSIONS: usize = 2;
