//! Engine configuration

use std::env;

use rasterflow_core::{Error, Result};

/// Environment variable overriding the default tile edge length
pub const ENV_TILE_SIZE: &str = "RASTERFLOW_TILE_SIZE";
/// Environment variable selecting the worker count (`0` = all cores)
pub const ENV_THREADS: &str = "RASTERFLOW_THREADS";
/// Environment variable selecting a tile computation observer
pub const ENV_TILE_OBSERVER: &str = "RASTERFLOW_TILE_OBSERVER";

/// How region requests dispatch their constituent tiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing on the caller's thread
    Sequential,
    /// Parallel processing on the global rayon pool
    #[default]
    Parallel,
    /// Parallel with a dedicated pool of the given size
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Map a thread count to a mode: 0 = all cores, 1 = sequential
    pub fn from_threads(threads: usize) -> Self {
        match threads {
            0 => ProcessingMode::Parallel,
            1 => ProcessingMode::Sequential,
            n => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Which built-in observer receives tile computation events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObserverKind {
    #[default]
    None,
    /// Log every event through `tracing`
    Log,
    /// Keep every event in memory
    Record,
}

/// Settings shared by every operator of a graph context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Default tile edge length for operators that do not inherit one
    pub tile_size: usize,
    pub mode: ProcessingMode,
    pub observer: ObserverKind,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: 512,
            mode: ProcessingMode::default(),
            observer: ObserverKind::default(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `RASTERFLOW_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::default().with_lookup(|key| env::var(key).ok())
    }

    /// Overlay values from an arbitrary key lookup
    pub fn with_lookup(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_TILE_SIZE) {
            self.tile_size = parse_positive(ENV_TILE_SIZE, &raw)?;
        }
        if let Some(raw) = lookup(ENV_THREADS) {
            let threads = raw.trim().parse::<usize>().map_err(|_| {
                Error::configuration("engine", format!("{ENV_THREADS}={raw} is not a thread count"))
            })?;
            self.mode = ProcessingMode::from_threads(threads);
        }
        if let Some(raw) = lookup(ENV_TILE_OBSERVER) {
            self.observer = match raw.trim().to_ascii_lowercase().as_str() {
                "" | "none" | "off" => ObserverKind::None,
                "log" => ObserverKind::Log,
                "record" => ObserverKind::Record,
                other => {
                    return Err(Error::configuration(
                        "engine",
                        format!("{ENV_TILE_OBSERVER}={other}: expected none, log or record"),
                    ))
                }
            };
        }
        Ok(self)
    }

    pub fn with_tile_size(mut self, tile_size: usize) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_mode(mut self, mode: ProcessingMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_observer(mut self, observer: ObserverKind) -> Self {
        self.observer = observer;
        self
    }
}

fn parse_positive(key: &str, raw: &str) -> Result<usize> {
    match raw.trim().parse::<usize>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::configuration(
            "engine",
            format!("{key}={raw} must be a positive integer"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_overrides() {
        let cfg = EngineConfig::default().with_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg, EngineConfig::default());
        assert_eq!(cfg.tile_size, 512);
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = EngineConfig::default()
            .with_lookup(lookup(&[
                (ENV_TILE_SIZE, "256"),
                (ENV_THREADS, "4"),
                (ENV_TILE_OBSERVER, "LOG"),
            ]))
            .unwrap();
        assert_eq!(cfg.tile_size, 256);
        assert_eq!(cfg.mode, ProcessingMode::ParallelWith(4));
        assert_eq!(cfg.observer, ObserverKind::Log);
    }

    #[test]
    fn malformed_values_are_configuration_errors() {
        for pairs in [
            [(ENV_TILE_SIZE, "0")],
            [(ENV_THREADS, "many")],
            [(ENV_TILE_OBSERVER, "chatty")],
        ] {
            let err = EngineConfig::default().with_lookup(lookup(&pairs)).unwrap_err();
            assert!(err.is_configuration(), "{err}");
        }
    }

    #[test]
    fn thread_count_mapping() {
        assert_eq!(ProcessingMode::from_threads(0), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::from_threads(1), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_threads(8), ProcessingMode::ParallelWith(8));
    }
}
