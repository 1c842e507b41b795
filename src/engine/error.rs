// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

use crate::models::EntityType;
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Fatal engine failures. Either category aborts the run before results are
/// persisted; neither may be downgraded to a warning.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Bad or missing configuration: VAT rate, rate track, rule basis.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A correctness assertion failed (double charge, credit over-application).
    /// Indicates a logic defect rather than bad input data.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

/// Failure confined to a single (contribution, entity) pair. The entity
/// produces no fee line; the run carries on.
#[derive(Error, Debug)]
pub enum LineError {
    #[error("rule {0} is tiered but has no tiers configured")]
    MissingTiers(i64),

    #[error("rule {rule_id} has an invalid tier table: {reason}")]
    InvalidTiers { rule_id: i64, reason: String },

    #[error("rule {0} has no usable rate: {1}")]
    MissingRate(i64, String),

    #[error("no agreement for party '{0}' in effect on {1}")]
    NoAgreement(String, NaiveDate),
}

/// Outcome split for a single line computation: entity-level errors are
/// collected, fatal errors abort the run.
#[derive(Error, Debug)]
pub enum LineFailure {
    #[error(transparent)]
    Fatal(#[from] EngineError),
    #[error(transparent)]
    Entity(#[from] LineError),
}

/// Recoverable per-entity error as recorded on the run output.
#[derive(Debug, Clone, Serialize)]
pub struct EntityError {
    pub contribution_id: i64,
    pub entity_type: EntityType,
    pub entity_name: String,
    pub reason: String,
}

/// Data-quality note surfaced for human review; never blocks completion.
#[derive(Debug, Clone, Serialize)]
pub struct RunWarning {
    pub contribution_id: Option<i64>,
    pub message: String,
}
