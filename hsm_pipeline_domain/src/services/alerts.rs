// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Alert Rules and Emission
//!
//! An [`AlertRule`] pairs a predicate over entry attributes with the mask
//! of attributes the predicate needs. The reporting stage evaluates rules
//! in order against each operation's attribute set and hands the first
//! match to the [`AlertEmitter`] out of band; emission never blocks the
//! pipeline and its failure never affects routing.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use crate::entities::{AttrMask, EntryAttributes, EntryId};

/// Predicate over an entry's identity and attributes.
pub type AlertPredicate = Arc<dyn Fn(&EntryId, &EntryAttributes) -> bool + Send + Sync>;

/// One configured alert: title, required attributes, a human-readable
/// rendering of the predicate, and the predicate itself.
#[derive(Clone)]
pub struct AlertRule {
    title: Option<String>,
    description: String,
    mask: AttrMask,
    predicate: AlertPredicate,
}

impl AlertRule {
    pub fn new(
        title: Option<String>,
        description: impl Into<String>,
        mask: AttrMask,
        predicate: AlertPredicate,
    ) -> Self {
        Self {
            title,
            description: description.into(),
            mask,
            predicate,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Human-readable predicate text, used in the alert body.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Attributes the predicate reads. Entries lacking any of them are
    /// skipped for this rule.
    pub fn required_mask(&self) -> AttrMask {
        self.mask
    }

    /// True when the entry carries every required attribute and the
    /// predicate holds.
    pub fn matches(&self, id: &EntryId, attrs: &EntryAttributes) -> bool {
        attrs.has(self.mask) && (self.predicate)(id, attrs)
    }
}

impl fmt::Debug for AlertRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlertRule")
            .field("title", &self.title)
            .field("description", &self.description)
            .field("mask", &self.mask)
            .finish()
    }
}

/// A matched alert, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryAlert {
    pub title: Option<String>,
    /// Rendering of the matched predicate.
    pub predicate: String,
    /// Entry identity: full path when known, printed id otherwise.
    pub entry: String,
    /// Dump of the attributes the predicate read.
    pub values: String,
}

/// Out-of-band alert delivery. Implementations log their own failures;
/// emission is best-effort by contract.
#[async_trait]
pub trait AlertEmitter: Send + Sync {
    async fn raise(&self, alert: EntryAlert);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size_rule(threshold: u64) -> AlertRule {
        AlertRule::new(
            Some("large file".to_string()),
            format!("size > {}", threshold),
            AttrMask::SIZE,
            Arc::new(move |_, attrs| attrs.size().is_some_and(|s| s > threshold)),
        )
    }

    #[test]
    fn test_rule_skips_entry_missing_required_attrs() {
        let rule = size_rule(100);
        let attrs = EntryAttributes::new();
        assert!(!rule.matches(&EntryId::new(1, 1), &attrs));
    }

    #[test]
    fn test_rule_matches_on_predicate() {
        let rule = size_rule(100);
        let mut attrs = EntryAttributes::new();
        attrs.set_size(500);
        assert!(rule.matches(&EntryId::new(1, 1), &attrs));

        attrs.set_size(50);
        assert!(!rule.matches(&EntryId::new(1, 1), &attrs));
    }
}
