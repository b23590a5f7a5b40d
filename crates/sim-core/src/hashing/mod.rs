mod canonical_json;
mod hash;

pub use canonical_json::to_canonical_json;
pub use hash::{hash_str, hash_value};

use sim_domain::Run;

/// Fingerprint of a run's event log: two runs of the same (twin, scenario)
/// pair must produce identical fingerprints (§9).
pub fn fingerprint_run(run: &Run) -> String {
    let value = serde_json::to_value(&run.events_log).unwrap_or(serde_json::Value::Null);
    hash_value(&value)
}
