//! digitaltwin-sim: re-exports the workspace's crates for callers who want
//! the whole kernel behind a single dependency, mirroring the teacher's
//! root package wrapping `chem-core`/`chem-domain`/`chem-persistence`.

pub use sim_analysis as analysis;
pub use sim_core as core;
pub use sim_domain as domain;

#[cfg(feature = "pg_demo")]
pub use sim_persistence as persistence;
