use serde::Deserialize;

/// Configuration shared, read-only, by every execution context of a prover.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Whether signature recovery may use the precomputation buffer.
    pub ecrecover_precalc: bool,
    /// Worker count handed to the routine that fills the buffer.
    pub ecrecover_precalc_threads: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            ecrecover_precalc: true,
            ecrecover_precalc_threads: 16,
        }
    }
}

impl ContextConfig {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Precalc worker count, never zero.
    pub fn precalc_threads(&self) -> usize {
        self.ecrecover_precalc_threads.max(1)
    }
}
