/*!
 * Pool Configuration
 *
 * Bucket sizes and start-up reservation for a [`PoolAllocator`].
 *
 * Environment overrides:
 * - `PARPOOL_SIZE_CLASSES`: comma-separated bucket sizes in bytes
 * - `PARPOOL_MAX_CLASS_LOG2`: largest power-of-two class when no explicit
 *   list is given
 * - `PARPOOL_RESERVE_BYTES`: bytes to pre-fault at start-up
 *
 * [`PoolAllocator`]: super::PoolAllocator
 */

use super::size_class::{default_sizes, SizeClassTable};
use crate::core::errors::{PoolError, PoolResult};
use crate::core::limits::DEFAULT_MIN_CLASS_LOG2;
use serde::{Deserialize, Serialize};

pub const ENV_SIZE_CLASSES: &str = "PARPOOL_SIZE_CLASSES";
pub const ENV_MAX_CLASS_LOG2: &str = "PARPOOL_MAX_CLASS_LOG2";
pub const ENV_RESERVE_BYTES: &str = "PARPOOL_RESERVE_BYTES";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Strictly increasing bucket sizes in bytes
    pub sizes: Vec<usize>,
    /// Bytes to pre-fault when the pool is built
    #[serde(default)]
    pub reserve_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            sizes: default_sizes(),
            reserve_bytes: 0,
        }
    }
}

impl PoolConfig {
    pub fn with_sizes(sizes: Vec<usize>) -> Self {
        Self {
            sizes,
            reserve_bytes: 0,
        }
    }

    /// Powers of two from `2^min_log2` to `2^max_log2`
    pub fn powers_of_two(min_log2: u32, max_log2: u32) -> Self {
        Self::with_sizes(SizeClassTable::powers_of_two(min_log2, max_log2).into_sizes())
    }

    pub fn with_reserve(mut self, bytes: usize) -> Self {
        self.reserve_bytes = bytes;
        self
    }

    /// Validate the bucket list
    pub fn table(&self) -> PoolResult<SizeClassTable> {
        SizeClassTable::new(self.sizes.clone())
    }

    /// Build from the process environment
    pub fn from_env() -> PoolResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup, falling back to defaults for missing keys
    pub fn from_lookup<F>(lookup: F) -> PoolResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = if let Some(raw) = lookup(ENV_SIZE_CLASSES) {
            Self::with_sizes(parse_sizes(&raw)?)
        } else if let Some(raw) = lookup(ENV_MAX_CLASS_LOG2) {
            let max_log2 = parse_number::<u32>(ENV_MAX_CLASS_LOG2, &raw)?;
            if max_log2 < DEFAULT_MIN_CLASS_LOG2 || max_log2 >= usize::BITS - 1 {
                return Err(PoolError::InvalidConfig(format!(
                    "{ENV_MAX_CLASS_LOG2}={max_log2} is outside {DEFAULT_MIN_CLASS_LOG2}..{}",
                    usize::BITS - 1
                )));
            }
            Self::powers_of_two(DEFAULT_MIN_CLASS_LOG2, max_log2)
        } else {
            Self::default()
        };

        if let Some(raw) = lookup(ENV_RESERVE_BYTES) {
            config.reserve_bytes = parse_number(ENV_RESERVE_BYTES, &raw)?;
        }

        config.table()?;
        Ok(config)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> PoolResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| PoolError::InvalidConfig(format!("{key}: '{raw}' is not a valid number")))
}

fn parse_sizes(raw: &str) -> PoolResult<Vec<usize>> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| parse_number(ENV_SIZE_CLASSES, part))
        .collect()
}
