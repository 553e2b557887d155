// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use thiserror::Error;

/// Startup configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no trust domain configured")]
    NoDomains,

    #[error("missing environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },

    #[error("invalid secret: {0}")]
    InvalidSecret(String),

    #[error("duplicate trust domain name: {0}")]
    DuplicateDomain(String),

    #[error("duplicate trust domain issuer: {0}")]
    DuplicateIssuer(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
