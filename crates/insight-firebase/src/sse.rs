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

//! Minimal server-sent events decoding for the database streaming API.

/// One dispatched server-sent event
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental parser fed with raw body chunks
///
/// Chunks may split lines or multi-byte characters anywhere; complete
/// events are returned as soon as their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseParser {
    buffer: Vec<u8>,
    current: SseEvent,
    has_data: bool,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
                continue;
            }
            // Comment line
            if line.starts_with(':') {
                continue;
            }

            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_ref(), ""),
            };
            match field {
                "event" => self.current.event = value.to_owned(),
                "data" => {
                    if self.has_data {
                        self.current.data.push('\n');
                    }
                    self.current.data.push_str(value);
                    self.has_data = true;
                }
                _ => {}
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = std::mem::take(&mut self.current);
        let had_data = std::mem::replace(&mut self.has_data, false);
        if event.event.is_empty() && !had_data {
            return None;
        }
        Some(event)
    }
}

/// Database stream event kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Data at a path was replaced
    Put,
    /// Children at a path were updated
    Patch,
    KeepAlive,
    /// Server stopped the stream, typically on a rules change
    Cancel(String),
    AuthRevoked,
    Unknown(String),
}

impl From<&SseEvent> for StreamEvent {
    fn from(event: &SseEvent) -> Self {
        match event.event.as_str() {
            "put" => Self::Put,
            "patch" => Self::Patch,
            "keep-alive" => Self::KeepAlive,
            "cancel" => Self::Cancel(event.data.trim_matches('"').to_owned()),
            "auth_revoked" => Self::AuthRevoked,
            other => Self::Unknown(other.to_owned()),
        }
    }
}
