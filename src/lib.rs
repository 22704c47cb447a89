//! Vigil Agent - Endpoint monitoring supervisor and report pipeline.
//!
//! This library supervises a set of monitoring features from a live policy
//! file and turns their daily report artifacts into a consolidated,
//! delivered summary.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         Vigil Agent                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐        │
//! │  │   Watcher   │──▶│ Supervisor  │──▶│  Registry   │        │
//! │  │ (policy.json)│  │ (reconcile) │   │  (workers)  │        │
//! │  └─────────────┘   └─────────────┘   └─────────────┘        │
//! │         ▲                 │                  │               │
//! │  ┌─────────────┐          ▼                  ▼               │
//! │  │  Scheduler  │   ┌─────────────┐   ┌─────────────┐        │
//! │  │ (ticks)     │──▶│ Aggregator  │──▶│   Bundle    │        │
//! │  └─────────────┘   │ (charts+html)│  │  + Deliver  │        │
//! │                    └─────────────┘   └─────────────┘        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vigil_agent::policy::PolicyStore;
//! use vigil_agent::registry::builtin_registry;
//! use vigil_agent::supervisor::Supervisor;
//!
//! let registry = builtin_registry(std::path::Path::new("/var/lib/vigil/reports"));
//! let store = PolicyStore::new("/var/lib/vigil/policy.json");
//! let supervisor = Supervisor::new(registry, store);
//! let outcome = supervisor.apply_policy();
//! println!("{} transitions", outcome.transitions());
//! ```

pub mod bundle;
pub mod config;
pub mod delivery;
pub mod policy;
pub mod registry;
pub mod report;
pub mod scheduler;
pub mod supervisor;
pub mod watcher;

// Re-export key types at crate root for convenience
pub use bundle::{bundle_day, verify_archive, BundleError, BundleMode};
pub use config::{Config, ConfigError, EmailConfig, UploadConfig};
pub use delivery::{deliver_day, DeliveryError, DeliveryResult};
pub use policy::{Policy, PolicyError, PolicyStore};
pub use registry::{builtin_registry, FeatureGroup, FeatureRegistry, Worker, WorkerError};
pub use report::{Aggregator, DaySummary};
pub use supervisor::{PassOutcome, Supervisor};
pub use watcher::PolicyWatcher;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
