//! Registry configuration

/// Packets buffered per viewer before new packets are dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// What happens when a publisher claims a key that already has a live hub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepublishPolicy {
    /// The new hub replaces the old one, which the new publish session closes
    #[default]
    Evict,
    /// The new publish attempt fails with `StreamAlreadyPublishing`
    Reject,
}

/// Registry configuration options
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each subscriber queue
    pub queue_capacity: usize,

    /// Collision policy for concurrent publishers on one key
    pub republish: RepublishPolicy,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            republish: RepublishPolicy::default(),
        }
    }
}

impl RegistryConfig {
    /// Set the subscriber queue capacity (minimum 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    /// Set the republish policy
    pub fn republish(mut self, policy: RepublishPolicy) -> Self {
        self.republish = policy;
        self
    }
}
