//! Long-running operation handles.
//!
//! A [`Poller`] wraps a poll function returning the current [`LroStatus`]
//! and, once available, the final result. Callers either drive it step by
//! step with [`Poller::poll_once`] or block with [`Poller::wait`].

// Internal imports (std, crate)
use std::fmt;
use std::time::Duration;

use crate::error::{Result, RuntimeError};
use crate::http::{Request, Response};
use crate::path::lookup;

// External imports (alphabetized)
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;

/// Polling strategy declared for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollingStrategy {
    /// Follow the `Operation-Location` header
    OperationLocation,
    /// Follow the `Azure-AsyncOperation` style status monitor
    StatusMonitor,
    /// Follow the `Location` header
    Location,
    /// Re-read the original resource
    Resource,
}

impl PollingStrategy {
    /// Header carrying the status URL, when the strategy uses one
    pub fn header(&self) -> Option<&'static str> {
        match self {
            Self::OperationLocation => Some("operation-location"),
            Self::StatusMonitor => Some("azure-asyncoperation"),
            Self::Location => Some("location"),
            Self::Resource => None,
        }
    }
}

/// Status of a long-running operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LroStatus {
    NotStarted,
    InProgress,
    Succeeded,
    Failed,
    Canceled,
    /// Any status the client does not recognize; treated as non-terminal
    Other(String),
}

impl LroStatus {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "notstarted" => Self::NotStarted,
            "running" | "inprogress" | "accepted" | "in_progress" => Self::InProgress,
            "succeeded" | "completed" => Self::Succeeded,
            "failed" => Self::Failed,
            "canceled" | "cancelled" => Self::Canceled,
            _ => Self::Other(raw.to_string()),
        }
    }

    /// Read the status from a JSON body at `status_path`
    pub fn from_body(body: &JsonValue, status_path: &str) -> Result<Self> {
        lookup(body, status_path)
            .and_then(JsonValue::as_str)
            .map(Self::parse)
            .ok_or_else(|| RuntimeError::Missing(status_path.to_string()))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// URL to poll after the initial response of a long-running operation.
///
/// Header strategies read the status URL from the response; the resource
/// strategy re-reads the URL of the initial request.
pub fn poll_location(strategy: PollingStrategy, initial: &Request, response: &Response) -> Result<String> {
    match strategy.header() {
        Some(header) => response
            .header(header)
            .map(str::to_string)
            .ok_or_else(|| RuntimeError::Missing(format!("{} header", header))),
        None => Ok(initial.url.to_string()),
    }
}

impl fmt::Display for LroStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => f.write_str("NotStarted"),
            Self::InProgress => f.write_str("InProgress"),
            Self::Succeeded => f.write_str("Succeeded"),
            Self::Failed => f.write_str("Failed"),
            Self::Canceled => f.write_str("Canceled"),
            Self::Other(raw) => f.write_str(raw),
        }
    }
}

/// Result of a single poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollResponse<T> {
    pub status: LroStatus,
    /// Final value, present once the operation succeeded
    pub value: Option<T>,
}

impl<T: DeserializeOwned> PollResponse<T> {
    /// Read the status from a poll body and, once it succeeded, the final
    /// value at `result_path` (the whole body when there is none)
    pub fn from_body(body: &JsonValue, status_path: &str, result_path: Option<&str>) -> Result<Self> {
        let status = LroStatus::from_body(body, status_path)?;
        let value = if status == LroStatus::Succeeded {
            let raw = match result_path {
                Some(path) => lookup(body, path)
                    .cloned()
                    .ok_or_else(|| RuntimeError::Missing(path.to_string()))?,
                None => body.clone(),
            };
            Some(serde_json::from_value(raw)?)
        } else {
            None
        };
        Ok(Self { status, value })
    }
}

/// Options controlling [`Poller::wait`]
#[derive(Debug, Clone)]
pub struct PollerOptions {
    /// Delay between polls
    pub interval: Duration,
    /// Give up after this many polls; `None` polls until a terminal status
    pub max_polls: Option<u32>,
}

impl Default for PollerOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_polls: None,
        }
    }
}

/// Handle to a long-running operation
pub struct Poller<T, F>
where
    F: FnMut() -> Result<PollResponse<T>>,
{
    poll: F,
    options: PollerOptions,
    status: LroStatus,
    value: Option<T>,
    polls: u32,
}

impl<T, F> Poller<T, F>
where
    F: FnMut() -> Result<PollResponse<T>>,
{
    pub fn new(poll: F, options: PollerOptions) -> Self {
        Self {
            poll,
            options,
            status: LroStatus::NotStarted,
            value: None,
            polls: 0,
        }
    }

    /// Last status observed
    pub fn status(&self) -> &LroStatus {
        &self.status
    }

    /// Issue one poll request and record its outcome.
    ///
    /// A failing poll does not reset the recorded status; the error carries it.
    pub fn poll_once(&mut self) -> Result<&LroStatus> {
        if self.status.is_terminal() {
            return Ok(&self.status);
        }

        self.polls += 1;
        let response = (self.poll)().map_err(|source| RuntimeError::Polling {
            last_status: self.status.to_string(),
            source: Box::new(source),
        })?;

        log::debug!("Poll #{} returned status {}", self.polls, response.status);
        self.status = response.status;
        if response.value.is_some() {
            self.value = response.value;
        }
        Ok(&self.status)
    }

    /// Poll until the operation reaches a terminal status.
    pub fn wait(mut self) -> Result<T> {
        loop {
            match self.poll_once()?.clone() {
                LroStatus::Succeeded => {
                    return self
                        .value
                        .take()
                        .ok_or_else(|| RuntimeError::Missing("final result".to_string()))
                }
                LroStatus::Failed | LroStatus::Canceled => {
                    return Err(RuntimeError::OperationFailed {
                        last_status: self.status.to_string(),
                    })
                }
                _ => {}
            }

            if let Some(max) = self.options.max_polls {
                if self.polls >= max {
                    return Err(RuntimeError::PollLimit {
                        polls: self.polls,
                        last_status: self.status.to_string(),
                    });
                }
            }
            if !self.options.interval.is_zero() {
                std::thread::sleep(self.options.interval);
            }
        }
    }
}
