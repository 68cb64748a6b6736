//! FIB configuration
//!
//! Durations are serialized as whole seconds.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by every FIB a registry creates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FibConfig {
    /// Idle timer of a learned entry
    #[serde(with = "secs")]
    pub idle_timeout: Duration,
    /// Idle timeout carried by flow installations of the learning switch
    #[serde(with = "secs")]
    pub flow_idle_timeout: Duration,
    /// Period of the table dump; `None` disables it
    #[serde(with = "opt_secs")]
    pub dump_interval: Option<Duration>,
    /// Capacity of the service command channel
    pub command_queue: usize,
}

impl Default for FibConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60),
            flow_idle_timeout: Duration::from_secs(15),
            dump_interval: Some(Duration::from_secs(60)),
            command_queue: 1024,
        }
    }
}

impl FibConfig {
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn with_flow_idle_timeout(mut self, timeout: Duration) -> Self {
        self.flow_idle_timeout = timeout;
        self
    }

    pub fn with_dump_interval(mut self, interval: Option<Duration>) -> Self {
        self.dump_interval = interval;
        self
    }

    /// Set the command channel capacity (at least 1)
    pub fn with_command_queue(mut self, capacity: usize) -> Self {
        self.command_queue = capacity.max(1);
        self
    }
}

mod secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

mod opt_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(deserializer).map(|secs| secs.map(Duration::from_secs))
    }
}
