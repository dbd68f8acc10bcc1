// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Pipeline Configuration
//!
//! [`PipelineSettings`] is the file/environment-mapped part of the
//! configuration: worker pool size, the DB-apply concurrency cap
//! (deployment-time, per backend), class matching, freshness policies and
//! the unlink policy. It loads from a TOML file with environment-variable
//! overrides under the `HSM_PIPELINE` prefix.
//!
//! [`PipelineConfig`] is the runtime configuration the stages see:
//! settings plus the configured alert rules and the derived union of
//! their attribute masks.
//!
//! ## Example Configuration File
//!
//! ```toml
//! worker_count = 8
//! db_apply_threads = 1        # SQLite backend locks the whole store
//! match_classes = true
//!
//! [md_update]
//! mode = "periodic"
//! period_secs = 300
//!
//! [path_update]
//! mode = "on_event"
//!
//! [unlink]
//! hsm_remove = true
//! deferred_remove_delay_secs = 86400
//! ```

use serde::Deserialize;
use std::path::Path;

use hsm_pipeline_domain::{AlertRule, AttrMask, PipelineError, RefreshPolicy, UnlinkPolicy};

/// File/environment-mapped pipeline settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineSettings {
    /// Size of the worker pool driving the stages.
    pub worker_count: usize,
    /// Concurrency cap for the DB-apply stage: `0` = unbounded (backends
    /// with row-level write concurrency), `1` for whole-store-locking
    /// backends such as SQLite.
    pub db_apply_threads: usize,
    /// Evaluate purge/migration class predicates after the filesystem
    /// probes.
    pub match_classes: bool,
    /// Freshness policy for cached entry metadata.
    pub md_update: RefreshPolicy,
    /// Freshness policy for cached entry paths.
    pub path_update: RefreshPolicy,
    pub unlink: UnlinkPolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            worker_count: 8,
            db_apply_threads: 1,
            match_classes: false,
            md_update: RefreshPolicy::default(),
            path_update: RefreshPolicy::default(),
            unlink: UnlinkPolicy::default(),
        }
    }
}

impl PipelineSettings {
    /// Loads settings from an optional TOML file, with environment
    /// overrides (`HSM_PIPELINE_WORKER_COUNT=16`, ...).
    pub fn load(path: Option<&Path>) -> Result<Self, PipelineError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let raw = builder
            .add_source(
                config::Environment::with_prefix("HSM_PIPELINE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| PipelineError::invalid_config(format!("cannot load settings: {}", e)))?;

        let settings: PipelineSettings = raw
            .try_deserialize()
            .map_err(|e| PipelineError::invalid_config(format!("invalid settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.worker_count == 0 {
            return Err(PipelineError::invalid_config(
                "worker_count must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Runtime configuration handed to the stages: settings, alert rules and
/// the union of the rules' attribute masks.
#[derive(Debug)]
pub struct PipelineConfig {
    pub settings: PipelineSettings,
    alerts: Vec<AlertRule>,
    alert_attr_mask: AttrMask,
}

impl PipelineConfig {
    pub fn new(settings: PipelineSettings, alerts: Vec<AlertRule>) -> Self {
        let alert_attr_mask = alerts
            .iter()
            .fold(AttrMask::empty(), |acc, rule| acc | rule.required_mask());
        Self {
            settings,
            alerts,
            alert_attr_mask,
        }
    }

    pub fn alerts(&self) -> &[AlertRule] {
        &self.alerts
    }

    /// Union of the attributes any alert rule reads. GET_INFO_DB includes
    /// it in its fetch mask; REPORTING generates derivable fields for it.
    pub fn alert_attr_mask(&self) -> AttrMask {
        self.alert_attr_mask
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new(PipelineSettings::default(), Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_defaults_are_valid() {
        let settings = PipelineSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.db_apply_threads, 1);
    }

    #[test]
    fn test_settings_parse_from_toml() {
        let raw = r#"
            worker_count = 16
            db_apply_threads = 0
            match_classes = true

            [md_update]
            mode = "periodic"
            period_secs = 300

            [path_update]
            mode = "never"

            [unlink]
            hsm_remove = false
            deferred_remove_delay_secs = 7200
        "#;
        let settings: PipelineSettings = toml::from_str(raw).unwrap();
        assert_eq!(settings.worker_count, 16);
        assert_eq!(settings.db_apply_threads, 0);
        assert!(settings.match_classes);
        assert_eq!(
            settings.md_update,
            RefreshPolicy::Periodic { period_secs: 300 }
        );
        assert_eq!(settings.path_update, RefreshPolicy::Never);
        assert!(!settings.unlink.hsm_remove);
        assert_eq!(settings.unlink.deferred_remove_delay_secs, 7200);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let settings = PipelineSettings {
            worker_count: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_alert_mask_is_union_of_rules() {
        let rules = vec![
            AlertRule::new(
                None,
                "size > 0",
                AttrMask::SIZE,
                Arc::new(|_, _| true),
            ),
            AlertRule::new(
                None,
                "status is set",
                AttrMask::STATUS | AttrMask::FULLPATH,
                Arc::new(|_, _| true),
            ),
        ];
        let config = PipelineConfig::new(PipelineSettings::default(), rules);
        assert_eq!(
            config.alert_attr_mask(),
            AttrMask::SIZE | AttrMask::STATUS | AttrMask::FULLPATH
        );
    }
}
