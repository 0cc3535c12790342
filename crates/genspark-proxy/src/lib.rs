//! Genspark Proxy - OpenAI-compatible front end for the Genspark copilot API.
//!
//! Clients speak OpenAI's `/v1/chat/completions` API. This crate exposes a
//! compatible HTTP surface and relays each request to Genspark's cookie
//! authenticated ask endpoint.
//!
//! A request goes through two phases:
//! - Attachment resolution: image and file references inside messages are
//!   fetched, sniffed and either inlined as base64 JPEG data URIs or uploaded
//!   to Genspark's private storage. All references resolve concurrently and
//!   the phase completes before anything is sent upstream.
//! - Translation: the resolved messages become an ask payload; the upstream
//!   event stream is turned back into `chat.completion.chunk` frames (or one
//!   aggregated `chat.completion`).
//!
//! Finished upstream projects can be deleted in the background
//! (`auto_delete_chat`).

pub mod attachment;
pub mod cleanup;
pub mod completion;
pub mod config;
pub mod decoder;
pub mod error;
pub mod server;
pub mod sniff;
pub mod streaming;
pub mod translation;
pub mod types;
pub mod upstream;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use server::serve;
