pub mod error;
pub mod probes;
pub mod scheduler;
pub mod skiplist;
pub mod types;
pub mod version_store;

pub use error::OtaError;
pub use probes::{
    ActiveCaseGuard, PackageVerifier, ServiceRestarter, StationProbe, SystemLoadProbe, TimeGate,
    UpdateServerClient,
};
pub use scheduler::OtaScheduler;
pub use skiplist::SkipList;
pub use types::{CheckResult, HealthReport, SafetyReport, TickOutcome, UpdateInfo};
pub use version_store::VersionStore;
