//! Attachment resolution.
//!
//! Genspark cannot dereference arbitrary image URLs, so every `image_url`
//! part is turned into something it accepts before the ask payload is built:
//!
//! - image bytes become an inline `data:image/jpeg;base64,...` URL (the
//!   label is always `image/jpeg`, whatever the real image format is);
//! - any other bytes are uploaded to private storage and the part becomes a
//!   `private_file` descriptor.
//!
//! A part that cannot be resolved (fetch, decode, or upload failure) is left
//! untouched and the request carries on.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use futures::future::join_all;
use secrecy::SecretString;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ProxyError;
use crate::sniff;
use crate::types::{ChatMessage, ContentPart, MessageContent, PrivateFile};
use crate::upstream::UploadSlot;

const INLINE_IMAGE_PREFIX: &str = "data:image/jpeg;base64,";
const UPLOADED_FILE_NAME: &str = "file";

/// Network operations needed to resolve attachments.
#[async_trait]
pub trait AttachmentTransport: Send + Sync {
    /// GET the bytes behind an http(s) URL. Non-2xx is an error.
    async fn fetch(&self, url: &str) -> Result<Bytes, ProxyError>;

    /// Ask the upstream for a pre-signed upload target.
    async fn request_upload_slot(&self, cookie: &SecretString) -> Result<UploadSlot, ProxyError>;

    /// PUT raw bytes to a previously obtained slot.
    async fn upload(&self, slot: &UploadSlot, bytes: Bytes) -> Result<(), ProxyError>;
}

/// A message that has been through [`AttachmentResolver::resolve`].
///
/// Only the resolver constructs these, so the ask payload cannot be built
/// from unresolved messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ResolvedMessage(ChatMessage);

impl ResolvedMessage {
    pub fn message(&self) -> &ChatMessage {
        &self.0
    }

    pub fn into_inner(self) -> ChatMessage {
        self.0
    }
}

/// Outcome of resolving one image reference.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Inline(String),
    Uploaded(PrivateFile),
    Unresolved,
}

pub struct AttachmentResolver<'a, T: ?Sized> {
    transport: &'a T,
    cookie: &'a SecretString,
}

impl<'a, T> AttachmentResolver<'a, T>
where
    T: AttachmentTransport + ?Sized,
{
    pub fn new(transport: &'a T, cookie: &'a SecretString) -> Self {
        Self { transport, cookie }
    }

    /// Resolve every image reference in `messages`.
    ///
    /// All references are resolved concurrently; this returns once each of
    /// them has finished.
    pub async fn resolve(&self, mut messages: Vec<ChatMessage>) -> Vec<ResolvedMessage> {
        let targets: Vec<(usize, usize, String)> = messages
            .iter()
            .enumerate()
            .flat_map(|(msg_idx, message)| image_references(msg_idx, message))
            .collect();

        if !targets.is_empty() {
            debug!(count = targets.len(), "resolving image references");
        }

        let outcomes = join_all(
            targets
                .iter()
                .map(|(_, _, reference)| self.resolve_reference(reference)),
        )
        .await;

        for ((msg_idx, part_idx, _), outcome) in targets.into_iter().zip(outcomes) {
            if let MessageContent::Parts(parts) = &mut messages[msg_idx].content {
                apply_resolution(&mut parts[part_idx], outcome);
            }
        }

        messages.into_iter().map(ResolvedMessage).collect()
    }

    pub async fn resolve_reference(&self, reference: &str) -> Resolution {
        match self.try_resolve(reference).await {
            Ok(resolution) => resolution,
            Err(e) => {
                warn!(error = %e, reference = %abbreviate(reference), "attachment left unresolved");
                Resolution::Unresolved
            }
        }
    }

    async fn try_resolve(&self, reference: &str) -> Result<Resolution, ProxyError> {
        let bytes = self.load(reference).await?;
        let mime = sniff::detect_content_type(&bytes);

        if mime.starts_with("image/") {
            return Ok(Resolution::Inline(inline_image_url(&bytes)));
        }

        let slot = self.transport.request_upload_slot(self.cookie).await?;
        let size = bytes.len();
        self.transport.upload(&slot, bytes).await?;
        debug!(mime, size, "uploaded attachment to private storage");

        Ok(Resolution::Uploaded(PrivateFile {
            name: UPLOADED_FILE_NAME.to_string(),
            mime_type: mime.to_string(),
            size,
            ext: sniff::subtype(mime).to_string(),
            private_storage_url: slot.private_storage_url,
        }))
    }

    async fn load(&self, reference: &str) -> Result<Bytes, ProxyError> {
        if is_remote(reference) {
            self.transport.fetch(reference).await
        } else {
            Ok(Bytes::from(decode_base64_reference(reference)?))
        }
    }
}

fn image_references(msg_idx: usize, message: &ChatMessage) -> Vec<(usize, usize, String)> {
    let MessageContent::Parts(parts) = &message.content else {
        return Vec::new();
    };
    parts
        .iter()
        .enumerate()
        .filter_map(|(part_idx, part)| match part {
            ContentPart::ImageUrl { image_url } => Some((msg_idx, part_idx, image_url.url.clone())),
            _ => None,
        })
        .collect()
}

fn apply_resolution(part: &mut ContentPart, resolution: Resolution) {
    match resolution {
        Resolution::Inline(url) => {
            if let ContentPart::ImageUrl { image_url } = part {
                image_url.url = url;
            }
        }
        Resolution::Uploaded(private_file) => {
            *part = ContentPart::PrivateFile { private_file };
        }
        Resolution::Unresolved => {}
    }
}

fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}

/// Decode raw base64 or a `data:<mime>;base64,<payload>` URI.
pub fn decode_base64_reference(reference: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let payload = reference
        .split_once(";base64,")
        .map(|(_, data)| data)
        .unwrap_or(reference);
    STANDARD.decode(payload)
}

pub fn inline_image_url(bytes: &[u8]) -> String {
    format!("{}{}", INLINE_IMAGE_PREFIX, STANDARD.encode(bytes))
}

fn abbreviate(reference: &str) -> &str {
    reference
        .char_indices()
        .nth(64)
        .map(|(idx, _)| &reference[..idx])
        .unwrap_or(reference)
}
