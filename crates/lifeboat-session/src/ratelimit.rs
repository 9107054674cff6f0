use crate::error::SessionError;

/// Sliding-window rate limiter keyed by client IP, persisted so a process
/// restart doesn't hand an attacker a fresh window. Mirrors the reference
/// implementation's 5-attempts-per-60-seconds policy.
pub struct RateLimiter {
    tree: sled::Tree,
    max_attempts: usize,
    window_ms: i64,
}

impl RateLimiter {
    pub fn open(db: &sled::Db, max_attempts: usize, window_secs: i64) -> Result<Self, SessionError> {
        Ok(Self {
            tree: db.open_tree("session_rate_limit")?,
            max_attempts,
            window_ms: window_secs * 1000,
        })
    }

    /// Returns true if this IP may make another attempt right now, and
    /// records the attempt if so. Returns false (and records nothing) once
    /// the window already holds `max_attempts` entries.
    pub fn check_and_record(&self, ip: &str, now_ms: i64) -> Result<bool, SessionError> {
        let window_start = now_ms - self.window_ms;
        let mut timestamps: Vec<i64> = match self.tree.get(ip.as_bytes())? {
            Some(bytes) => bincode::deserialize(&bytes)?,
            None => Vec::new(),
        };
        timestamps.retain(|&t| t > window_start);

        if timestamps.len() >= self.max_attempts {
            self.tree.insert(ip.as_bytes(), bincode::serialize(&timestamps)?)?;
            return Ok(false);
        }

        timestamps.push(now_ms);
        self.tree.insert(ip.as_bytes(), bincode::serialize(&timestamps)?)?;
        Ok(true)
    }
}
