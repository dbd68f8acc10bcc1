// /////////////////////////////////////////////////////////////////////////////
// HSM Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

use thiserror::Error;

/// ESTALE is not covered by `std::io::ErrorKind`; match the raw errno.
const ESTALE: i32 = 116;

/// Failure taxonomy for filesystem probes.
///
/// `Missing` marks entries that vanished between event delivery and the
/// probe (ENOENT/ESTALE class). The pipeline treats it as an expected race,
/// not an error: journal operations are acknowledged, scan operations are
/// dropped, and a later scan or UNLINK record reconciles the catalog.
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The entry no longer exists on the filesystem.
    #[error("entry no longer exists")]
    Missing,

    /// Any other I/O failure from the probe.
    #[error("probe I/O failure: {0}")]
    Io(String),

    /// The probe is not available on this filesystem.
    #[error("probe not supported: {0}")]
    Unsupported(String),
}

impl ProbeError {
    /// True for the vanished-entry class of failures.
    pub fn is_missing(&self) -> bool {
        matches!(self, ProbeError::Missing)
    }
}

impl From<std::io::Error> for ProbeError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound || err.raw_os_error() == Some(ESTALE) {
            ProbeError::Missing
        } else {
            ProbeError::Io(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_enoent_maps_to_missing() {
        let err: ProbeError = io::Error::from(io::ErrorKind::NotFound).into();
        assert!(err.is_missing());
    }

    #[test]
    fn test_estale_maps_to_missing() {
        let err: ProbeError = io::Error::from_raw_os_error(ESTALE).into();
        assert!(err.is_missing());
    }

    #[test]
    fn test_other_io_error_is_not_missing() {
        let err: ProbeError = io::Error::from(io::ErrorKind::PermissionDenied).into();
        assert!(!err.is_missing());
    }
}
