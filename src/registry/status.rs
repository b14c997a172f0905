use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// How long a status snapshot is served before providers are probed again.
pub const STATUS_TTL: Duration = Duration::from_secs(15);

/// Status of one configured provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderStatus {
    /// Enabled and holding the credential it needs.
    pub configured: bool,
    /// Answered the last availability probe.
    pub available: bool,
    pub model: String,
    pub is_primary: bool,
}

/// Provider name to status.
pub type StatusMap = BTreeMap<String, ProviderStatus>;

/// One probe round, tagged with the configuration generation it was taken
/// under. A snapshot from an older generation is never served.
#[derive(Debug, Clone)]
pub(crate) struct StatusCache {
    taken_at: Instant,
    generation: u64,
    data: StatusMap,
}

impl StatusCache {
    pub(crate) fn new(generation: u64, data: StatusMap) -> Self {
        Self {
            taken_at: Instant::now(),
            generation,
            data,
        }
    }

    pub(crate) fn fresh(&self, generation: u64, ttl: Duration) -> Option<&StatusMap> {
        (self.generation == generation && self.taken_at.elapsed() < ttl).then_some(&self.data)
    }
}
