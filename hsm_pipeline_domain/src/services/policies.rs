// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Policy Types
//!
//! [`RefreshPolicy`] decides when cached metadata or paths are stale
//! enough to re-fetch from the filesystem; the catalog-lookup stage
//! evaluates it when planning fetches for known entries. [`UnlinkPolicy`]
//! controls how UNLINK records with the last-reference bit are applied.
//! [`PolicyMatcher`] is the port to the purge/migration class engine.

use serde::{Deserialize, Serialize};

use crate::entities::{AttrMask, EntryAttributes, EntryId};

/// Freshness policy for catalog-cached metadata and paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum RefreshPolicy {
    /// Never re-fetch; rely on events only for the fields they carry.
    Never,
    /// Re-fetch on every event.
    Always,
    /// Re-fetch only when the event class implies a change.
    #[default]
    OnEvent,
    /// Re-fetch when the cached value is older than `period_secs`.
    Periodic { period_secs: u64 },
}

impl RefreshPolicy {
    /// Evaluates the policy against the cached value's timestamp.
    ///
    /// Returns `(refresh_needed, event_updates_allowed)`:
    /// `refresh_needed` forces a fetch now; `event_updates_allowed` lets
    /// record classes that imply a change (truncate, attribute-set, HSM,
    /// time updates, renames) force one.
    pub fn evaluate(&self, last_update: Option<i64>, now: i64) -> (bool, bool) {
        match self {
            RefreshPolicy::Never => (false, false),
            RefreshPolicy::Always => (true, true),
            RefreshPolicy::OnEvent => (false, true),
            RefreshPolicy::Periodic { period_secs } => match last_update {
                None => (true, true),
                Some(t) => (now.saturating_sub(t) >= *period_secs as i64, true),
            },
        }
    }
}

/// How UNLINK records with the last-reference bit are applied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UnlinkPolicy {
    /// When true, removed files still need HSM-side cleanup: the row moves
    /// to the deferred-removal queue instead of being deleted.
    pub hsm_remove: bool,
    /// Grace delay before the deferred-removal worker may clean a removed
    /// entry's backend copy.
    pub deferred_remove_delay_secs: u64,
}

impl Default for UnlinkPolicy {
    fn default() -> Self {
        Self {
            hsm_remove: true,
            deferred_remove_delay_secs: 86_400,
        }
    }
}

/// Port to the purge/migration class engine. The matcher evaluates its
/// class predicates against the attribute set and records the resulting
/// class names (and their update stamps) back into it.
pub trait PolicyMatcher: Send + Sync {
    /// Attributes the class predicates read; the catalog-lookup stage
    /// includes them in its fetch mask.
    fn attr_mask(&self) -> AttrMask;

    /// Evaluates the class predicates for `id`, writing the matched class
    /// fields into `attrs`. `force_update` re-evaluates even when the
    /// cached classes are fresh.
    fn check_policies(&self, id: &EntryId, attrs: &mut EntryAttributes, force_update: bool);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_never_policy_blocks_event_updates() {
        assert_eq!(RefreshPolicy::Never.evaluate(Some(0), 1000), (false, false));
    }

    #[test]
    fn test_periodic_policy_elapses() {
        let policy = RefreshPolicy::Periodic { period_secs: 60 };
        assert_eq!(policy.evaluate(None, 1000), (true, true));
        assert_eq!(policy.evaluate(Some(990), 1000), (false, true));
        assert_eq!(policy.evaluate(Some(900), 1000), (true, true));
    }

    #[test]
    fn test_on_event_policy_defers_to_events() {
        assert_eq!(
            RefreshPolicy::OnEvent.evaluate(Some(0), i64::MAX),
            (false, true)
        );
    }
}
