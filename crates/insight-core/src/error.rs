// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION Insight.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use thiserror::Error;

/// Errors raised at the edges of the core crate
///
/// The pipeline itself never fails; these cover invalid input handed to it.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("Invalid timezone: '{0}'")]
    InvalidTimezone(String),

    #[error("Unknown device topic: {0}")]
    UnknownTopic(String),

    #[error("Invalid device payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

pub type InsightResult<T> = Result<T, InsightError>;
