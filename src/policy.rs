//! Policy snapshots and the on-disk policy store.
//!
//! The policy file is a flat JSON object mapping feature names to desired
//! enabled-state. It is written by an external configuration surface and,
//! for mutual-exclusion corrections, by the supervisor itself, so all
//! writes go through an atomic write-to-temp-then-rename.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Feature names with coupled semantics.
pub const WEBSITE_WHITELISTING: &str = "Website Whitelisting";
pub const WEBSITE_BLOCKING: &str = "Website Blocking";

/// A whole-file snapshot of desired feature state.
///
/// Keys the registry does not know are carried through untouched so the
/// policy file stays forward-compatible with newer configuration surfaces.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy(pub BTreeMap<String, bool>);

impl Policy {
    /// Desired state for a feature; absent keys read as disabled.
    pub fn desired(&self, feature: &str) -> bool {
        self.0.get(feature).copied().unwrap_or(false)
    }

    pub fn set(&mut self, feature: &str, enabled: bool) {
        self.0.insert(feature.to_string(), enabled);
    }

    /// Resolve the Website Whitelisting / Website Blocking exclusivity.
    ///
    /// If both are desired true, the one that newly became true relative to
    /// the previously applied snapshot wins; when both are newly true (or
    /// neither is), Whitelisting wins. Returns true if the snapshot was
    /// modified and needs to be persisted back.
    pub fn resolve_exclusive(&mut self, previous: &Policy) -> bool {
        if !(self.desired(WEBSITE_WHITELISTING) && self.desired(WEBSITE_BLOCKING)) {
            return false;
        }

        let whitelist_is_new = !previous.desired(WEBSITE_WHITELISTING);
        let blocking_is_new = !previous.desired(WEBSITE_BLOCKING);

        let loser = match (whitelist_is_new, blocking_is_new) {
            (false, true) => WEBSITE_WHITELISTING,
            _ => WEBSITE_BLOCKING,
        };

        warn!(
            "policy requests both website whitelisting and blocking; disabling {}",
            loser
        );
        self.set(loser, false);
        true
    }
}

/// Policy store errors.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Handle to the on-disk policy file.
#[derive(Debug, Clone)]
pub struct PolicyStore {
    path: PathBuf,
}

impl PolicyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current policy snapshot.
    ///
    /// An absent file is an empty policy (all features disabled). A corrupt
    /// file degrades to an empty policy with a warning rather than stopping
    /// reconciliation.
    pub fn load(&self) -> Policy {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Policy::default(),
            Err(e) => {
                warn!("could not read policy file {:?}: {}", self.path, e);
                return Policy::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(policy) => policy,
            Err(e) => {
                warn!(
                    "policy file {:?} is not valid JSON ({}); treating as empty",
                    self.path, e
                );
                Policy::default()
            }
        }
    }

    /// Persist a policy snapshot atomically.
    ///
    /// A concurrent reader sees either the previous document or the new one,
    /// never a partial write.
    pub fn save(&self, policy: &Policy) -> Result<(), PolicyError> {
        let content = serde_json::to_string_pretty(policy)
            .map_err(|e| PolicyError::Serialize(e.to_string()))?;

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(dir).map_err(|e| PolicyError::Io(e.to_string()))?;

        let tmp = dir.join(format!(
            ".{}.tmp",
            self.path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| "policy.json".to_string())
        ));
        std::fs::write(&tmp, content).map_err(|e| PolicyError::Io(e.to_string()))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| PolicyError::Io(e.to_string()))?;

        Ok(())
    }
}
