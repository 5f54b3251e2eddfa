//! Client for the hosted document-extraction API
//!
//! [`ApiClient`] owns one authenticated session. Requests go through an
//! [`HttpTransport`], which is [`ReqwestTransport`] in production.
//!
//! ```no_run
//! use docschema_sdk::api::{ApiClient, ClientConfig, Query};
//!
//! # fn main() -> Result<(), docschema_sdk::api::ApiError> {
//! let config = ClientConfig::new("https://api.example.com", "alice", "secret");
//! let mut client = ApiClient::connect(config)?;
//! let queues = client.get_paginated("queues", &Query::new())?;
//! println!("{} queues", queues.results.len());
//! client.close()
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod pagination;
pub mod query;
pub mod resources;
pub mod sideload;
pub mod transport;

pub use client::{ApiClient, user_agent};
pub use config::{API_VERSION_PATH, ClientConfig, RetryPolicy};
pub use error::{ApiError, ApiResult};
pub use pagination::{FetchOptions, PageCollector, PaginatedResult};
pub use query::{Query, QueryValue};
pub use resources::{
    DEFAULT_RIR_URL, DeleteReport, HookUpdate, NewConnector, NewHook, NewInbox, NewQueue, NewUser,
    QueueFilter, Resource, UploadOptions,
};
pub use sideload::{Sideload, resolve_sideloads, setup_sideloads};
pub use transport::{
    HttpMethod, HttpRequest, HttpResponse, HttpTransport, MultipartPart, RequestBody,
    ReqwestTransport, TransportError,
};
