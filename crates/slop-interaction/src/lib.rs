//! Remote model access for SLOP.
//!
//! [`CompletionClient`] talks to an OpenAI-compatible chat-completions API
//! through an [`HttpTransport`], decodes server-sent events with
//! [`SseDecoder`] and hands deltas to callers as a [`CompletionStream`].

pub mod client;
pub mod error;
pub mod sse;
pub mod stream;
pub mod transport;

pub use client::{CompletionClient, ModelInfo};
pub use error::CompletionError;
pub use sse::SseDecoder;
pub use stream::CompletionStream;
pub use transport::{ByteStream, HttpMethod, HttpTransport, ReqwestTransport, TransportRequest, TransportResponse};
