//! Registry configuration

/// Configuration for the room registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Maximum number of history entries retained per room
    pub max_history: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { max_history: 2000 }
    }
}

impl RegistryConfig {
    /// Set the per-room history bound
    pub fn max_history(mut self, max: usize) -> Self {
        self.max_history = max;
        self
    }
}
