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

//! Realtime database reading source: REST snapshot queries and the
//! server-sent change stream of `houses/{site}`.

pub mod client;
pub mod errors;
pub mod record;
pub mod source;
pub mod sse;

pub use client::FirebaseClient;
pub use errors::{FirebaseError, FirebaseResult};
pub use record::{FirebaseRecord, parse_snapshot};
pub use source::FirebaseReadingSource;
pub use sse::{SseEvent, SseParser, StreamEvent};
