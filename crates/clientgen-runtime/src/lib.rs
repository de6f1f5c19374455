//! Clientgen Runtime
//!
//! Support library linked by every client that `clientgen` generates. It
//! holds the behavior generated code delegates to instead of repeating it:
//! status routing, lazy pagination, long-running operation polling, service
//! version gates, wire encodings, and request bodies.
//!
//! The generator itself depends on this crate too, so the rules it applies
//! when synthesizing declarations are the rules the generated code runs.

pub mod additional;
pub mod encoding;
pub mod error;
pub mod http;
pub mod multipart;
pub mod nullable;
pub mod paging;
pub mod path;
pub mod polling;
pub mod polymorphic;
pub mod status;
pub mod version;

pub use crate::{
    encoding::{Encoded, Encoding},
    error::{Result, RuntimeError},
    http::{Method, Request, RequestBody, RequestBuilder, Response, Transport},
    multipart::{MultipartForm, PartKind, PartSpec},
    nullable::Nullable,
    paging::{Page, Pager},
    polling::{LroStatus, PollResponse, Poller, PollerOptions, PollingStrategy},
    polymorphic::UnknownVariant,
    status::StatusPattern,
    version::{ensure_available, ApiVersion},
};
