//! Client core for the typograf text-typesetting web service.
//!
//! # Overview
//! Renders a SOAP `ProcessText` request from caller text and options, posts
//! it to the service, and extracts the corrected text from the response.
//! Calls are asynchronous and cancellable: `TypografClient::process_text`
//! returns a `CancellationHandle` at once and later hands exactly one
//! `OperationOutcome` to the caller's callback.
//!
//! # Design
//! - `TypografClient` splits each call into `build_request` (pure) and
//!   `parse_response` (pure), with a `Transport` doing the I/O in between.
//! - The result text is found by a `ResponseExtractor`; the default
//!   `PatternExtractor` uses a pattern from the bundled `SOAP` string table.
//! - Every failure is a variant of `TypografError`; nothing is thrown.

pub mod cancel;
pub mod client;
pub mod error;
pub mod extract;
pub mod http;
pub mod request;
pub mod resources;
pub mod transport;
pub mod types;

pub use cancel::CancellationHandle;
pub use client::{ClientConfig, TypografClient, DEFAULT_ENDPOINT, SOAP_CONTENT_TYPE};
pub use error::{ClientError, TypografError};
pub use extract::{PatternExtractor, ResponseExtractor};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{ReqwestTransport, Transport, TransportError};
pub use types::{EntityType, OperationOutcome, ProcessTextParameters};
