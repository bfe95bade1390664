//! HTTP clients for external conversion services.
//!
//! Two protocols are supported:
//!
//! - **Job protocol** ([`ConversionService`]): create a job, upload the
//!   artifact, poll until done, download the result.
//! - **Direct protocol** ([`DirectConversionService`]): a single multipart
//!   request that returns the converted bytes (Gotenberg).
//!
//! Clients are pure I/O. They hold no job state and never retry.

mod config;
mod direct;
mod error;
mod http;
mod traits;
mod types;

pub use config::{DirectResourceKind, DirectServiceConfig, RemoteServiceConfig};
pub use direct::GotenbergClient;
pub use error::{ClientError, DirectClientError};
pub use http::HttpConversionClient;
pub use traits::{ConversionService, DirectConversionService};
pub use types::{JobMetadata, JobTicket, RemoteJobStatus, StatusReport};
