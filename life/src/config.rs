use std::time::Duration;

use crate::error::{LifeError, Result};
use crate::patterns::{self, Pattern};

/// Grid size of the original desktop program.
pub const DEFAULT_WIDTH: usize = 189;
pub const DEFAULT_HEIGHT: usize = 130;

/// One quantum: the pause between generations and the longest a stop
/// request waits to be noticed.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(75);

#[derive(Clone, Debug)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    pub interval: Duration,
    /// Seed for a deterministic entropy source. `None` seeds from the OS.
    pub seed: Option<u64>,
    /// End the run by itself after this many generations.
    pub max_generations: Option<u64>,
    /// Start from this pattern, centred, instead of a random grid.
    pub pattern: Option<&'static Pattern>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            interval: DEFAULT_INTERVAL,
            seed: None,
            max_generations: None,
            pattern: None,
        }
    }
}

impl Config {
    /// Select the starting pattern by name.
    pub fn with_pattern(mut self, name: &str) -> Result<Self> {
        let pattern = patterns::find(name).ok_or_else(|| LifeError::UnknownPattern(name.to_string()))?;
        self.pattern = Some(pattern);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!((config.width, config.height), (189, 130));
        assert_eq!(config.interval, Duration::from_millis(75));
        assert!(config.seed.is_none() && config.max_generations.is_none() && config.pattern.is_none());
    }

    #[test]
    fn test_with_pattern() {
        let config = Config::default().with_pattern("toad").unwrap();
        assert_eq!(config.pattern, Some(&patterns::TOAD));

        match Config::default().with_pattern("nope") {
            Err(LifeError::UnknownPattern(name)) => assert_eq!(name, "nope"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
