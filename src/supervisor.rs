//! Feature supervisor: diffs desired policy against running state and
//! drives worker transitions.
//!
//! The supervisor owns the running-state map exclusively. A whole
//! diff-and-apply pass runs under one lock, so passes are serialized; the
//! watcher's coalescing channel guarantees that a notification arriving
//! mid-pass triggers exactly one more pass, which re-reads the policy
//! fresh from the store.

use crate::policy::{Policy, PolicyStore};
use crate::registry::FeatureRegistry;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::{info, warn};

/// Per-feature running state, rebuilt to all-disabled at process start.
#[derive(Debug, Clone)]
pub struct FeatureState {
    pub enabled: bool,
    pub last_transition: DateTime<Utc>,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub enabled: Vec<String>,
    pub disabled: Vec<String>,
    /// Features whose transition failed, with the failure message.
    /// State is left unchanged for these, so the next pass retries.
    pub failed: Vec<(String, String)>,
}

impl PassOutcome {
    pub fn transitions(&self) -> usize {
        self.enabled.len() + self.disabled.len()
    }
}

struct Reconciled {
    running: HashMap<String, FeatureState>,
    last_applied: Policy,
}

/// Reconciles policy snapshots against worker running state.
pub struct Supervisor {
    registry: FeatureRegistry,
    store: PolicyStore,
    state: Mutex<Reconciled>,
}

impl Supervisor {
    pub fn new(registry: FeatureRegistry, store: PolicyStore) -> Self {
        Self {
            registry,
            store,
            state: Mutex::new(Reconciled {
                running: HashMap::new(),
                last_applied: Policy::default(),
            }),
        }
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn store(&self) -> &PolicyStore {
        &self.store
    }

    /// Run one serialized reconciliation pass against the current policy.
    ///
    /// Reads the policy fresh, resolves mutual exclusion (persisting any
    /// correction), and issues the minimal set of worker transitions. A
    /// failing worker is isolated: its state is left as-is and the pass
    /// continues with the remaining features.
    pub fn apply_policy(&self) -> PassOutcome {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());

        let mut policy = self.store.load();
        if policy.resolve_exclusive(&state.last_applied) {
            if let Err(e) = self.store.save(&policy) {
                warn!("could not persist mutual-exclusion correction: {e}");
            }
        }

        let mut outcome = PassOutcome::default();

        for descriptor in self.registry.iter() {
            let desired = policy.desired(descriptor.name);
            let actual = state
                .running
                .get(descriptor.name)
                .map(|s| s.enabled)
                .unwrap_or(false);

            if desired == actual {
                continue;
            }

            let result = if desired {
                descriptor.worker.enable()
            } else {
                descriptor.worker.disable()
            };

            match result {
                Ok(()) => {
                    if desired {
                        state.running.insert(
                            descriptor.name.to_string(),
                            FeatureState {
                                enabled: true,
                                last_transition: Utc::now(),
                            },
                        );
                        info!("enabled feature: {}", descriptor.name);
                        outcome.enabled.push(descriptor.name.to_string());
                    } else {
                        state.running.remove(descriptor.name);
                        info!("disabled feature: {}", descriptor.name);
                        outcome.disabled.push(descriptor.name.to_string());
                    }
                }
                Err(e) => {
                    warn!("transition failed for {}: {e}", descriptor.name);
                    outcome.failed.push((descriptor.name.to_string(), e.to_string()));
                }
            }
        }

        state.last_applied = policy;
        outcome
    }

    /// Invoke `generate_report` on every currently enabled worker.
    ///
    /// One collector's failure never stops the others; failures are
    /// returned for logging by the caller.
    pub fn generate_reports(&self) -> Vec<(String, String)> {
        let enabled: Vec<String> = {
            let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            state
                .running
                .iter()
                .filter(|(_, s)| s.enabled)
                .map(|(name, _)| name.clone())
                .collect()
        };

        let mut failures = Vec::new();
        for name in enabled {
            if let Some(descriptor) = self.registry.get(&name) {
                if let Err(e) = descriptor.worker.generate_report() {
                    warn!("report generation failed for {name}: {e}");
                    failures.push((name, e.to_string()));
                }
            }
        }
        failures
    }

    /// Read-only view of the running state, in registry order.
    pub fn snapshot(&self) -> Vec<(String, bool)> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        self.registry
            .iter()
            .map(|d| {
                let enabled = state.running.get(d.name).map(|s| s.enabled).unwrap_or(false);
                (d.name.to_string(), enabled)
            })
            .collect()
    }

    /// Consume coalesced policy-change notifications until the watcher side
    /// hangs up. Each notification triggers one full pass.
    pub fn run_loop(&self, rx: Receiver<()>) {
        for () in rx.iter() {
            let outcome = self.apply_policy();
            if !outcome.failed.is_empty() {
                warn!(
                    "reconciliation pass completed with {} failed transition(s)",
                    outcome.failed.len()
                );
            }
        }
        info!("policy watcher disconnected; reconciliation loop exiting");
    }
}
