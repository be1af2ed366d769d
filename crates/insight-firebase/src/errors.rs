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

/// Errors talking to the realtime database
#[derive(Error, Debug)]
pub enum FirebaseError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Database API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Database rejected credentials")]
    Unauthorized,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Event stream error: {0}")]
    StreamError(String),
}

pub type FirebaseResult<T> = Result<T, FirebaseError>;
