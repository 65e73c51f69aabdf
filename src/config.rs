//! Memory budget configuration.
//!
//! The host picks a heap budget in MiB. `0` means "use the default", anything
//! above the ceiling is clamped. Both bounds can be overridden by the embedding
//! program or through the environment.

use std::env;

/// Default heap budget, in MiB, when the caller asks for `0`.
pub const DEFAULT_MEMORY_LIMIT_MB: usize = 8;

/// Largest heap budget, in MiB, the host will ever probe for.
pub const MAX_MEMORY_LIMIT_MB: usize = 2048;

/// Environment variable overriding [`BudgetConfig::default_mb`].
pub const DEFAULT_MB_ENV: &str = "SCRIPTGC_DEFAULT_MEMORY_MB";

/// Environment variable overriding [`BudgetConfig::max_mb`].
pub const MAX_MB_ENV: &str = "SCRIPTGC_MAX_MEMORY_MB";

/// Bounds applied to a requested memory limit before it is probed.
///
/// # Examples
///
/// ```
/// use scriptgc::config::BudgetConfig;
///
/// let config = BudgetConfig::default();
/// assert_eq!(config.default_mb, 8);
/// assert_eq!(config.max_mb, 2048);
///
/// let small = BudgetConfig::default().with_max_mb(64);
/// assert_eq!(small.effective_mb(1000), 64);
/// assert_eq!(small.effective_mb(0), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetConfig {
    pub default_mb: usize,
    pub max_mb: usize,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            default_mb: DEFAULT_MEMORY_LIMIT_MB,
            max_mb: MAX_MEMORY_LIMIT_MB,
        }
    }
}

impl BudgetConfig {
    pub fn with_default_mb(mut self, default_mb: usize) -> Self {
        self.default_mb = default_mb;
        self
    }

    pub fn with_max_mb(mut self, max_mb: usize) -> Self {
        self.max_mb = max_mb;
        self
    }

    /// Read overrides from the environment, falling back to the defaults for
    /// anything missing or unparsable.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| {
            lookup(key).and_then(|raw| match raw.trim().parse::<usize>() {
                Ok(value) if value > 0 => Some(value),
                _ => {
                    tracing::warn!(key, raw = raw.as_str(), "ignoring invalid memory setting");
                    None
                }
            })
        };

        let mut config = Self::default();
        if let Some(value) = parse(DEFAULT_MB_ENV) {
            config.default_mb = value;
        }
        if let Some(value) = parse(MAX_MB_ENV) {
            config.max_mb = value;
        }
        config
    }

    /// Clamp a requested limit into `[1, max_mb]`, substituting the default
    /// for `0`.
    pub fn effective_mb(&self, requested_mb: usize) -> usize {
        let mb = if requested_mb == 0 {
            self.default_mb
        } else {
            requested_mb
        };
        mb.clamp(1, self.max_mb.max(1))
    }

    /// Effective limit in bytes.
    pub fn effective_bytes(&self, requested_mb: usize) -> usize {
        self.effective_mb(requested_mb).saturating_mul(1 << 20)
    }
}
