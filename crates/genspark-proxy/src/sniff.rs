//! Content-type sniffing from magic bytes.
//!
//! Only the payload is inspected, never a file name. The signature set and
//! the text/binary fallback follow the WHATWG MIME sniffing table, limited to
//! the first 512 bytes.

const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";
pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";

/// Fixed-offset signatures, checked in order.
const SIGNATURES: &[(&[u8], &str)] = &[
    (b"%PDF-", "application/pdf"),
    (b"%!PS-Adobe-", "application/postscript"),
    (&[0xFE, 0xFF], "text/plain; charset=utf-16be"),
    (&[0xFF, 0xFE], "text/plain; charset=utf-16le"),
    (&[0xEF, 0xBB, 0xBF], TEXT_PLAIN),
    (&[0x00, 0x00, 0x01, 0x00], "image/x-icon"),
    (&[0x00, 0x00, 0x02, 0x00], "image/x-icon"),
    (b"BM", "image/bmp"),
    (b"GIF87a", "image/gif"),
    (b"GIF89a", "image/gif"),
    (&[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1A, b'\n'], "image/png"),
    (&[0xFF, 0xD8, 0xFF], "image/jpeg"),
    (b"ID3", "audio/mpeg"),
    (b"OggS\x00", "application/ogg"),
    (b"MThd\x00\x00\x00\x06", "audio/midi"),
    (&[0x1A, 0x45, 0xDF, 0xA3], "video/webm"),
    (&[0x00, 0x01, 0x00, 0x00], "font/ttf"),
    (b"OTTO", "font/otf"),
    (b"ttcf", "font/collection"),
    (b"wOFF", "font/woff"),
    (b"wOF2", "font/woff2"),
    (&[0x1F, 0x8B, 0x08], "application/x-gzip"),
    (b"PK\x03\x04", "application/zip"),
    (b"Rar!\x1A\x07\x00", "application/x-rar-compressed"),
    (b"Rar!\x1A\x07\x01\x00", "application/x-rar-compressed"),
    (b"\x00asm", "application/wasm"),
];

/// Container formats: `outer` at offset 0, `inner` at offset 8.
const RIFF_LIKE: &[(&[u8], &[u8], &str)] = &[
    (b"RIFF", b"WEBPVP", "image/webp"),
    (b"RIFF", b"WAVE", "audio/wave"),
    (b"RIFF", b"AVI ", "video/avi"),
    (b"FORM", b"AIFF", "audio/aiff"),
];

const HTML_TAGS: &[&[u8]] = &[
    b"<!DOCTYPE HTML",
    b"<HTML",
    b"<HEAD",
    b"<SCRIPT",
    b"<IFRAME",
    b"<H1",
    b"<DIV",
    b"<FONT",
    b"<TABLE",
    b"<A",
    b"<STYLE",
    b"<TITLE",
    b"<B",
    b"<BODY",
    b"<BR",
    b"<P",
    b"<!--",
];

/// Detect the content type of `data`. Always returns a valid MIME type,
/// falling back to `application/octet-stream`.
pub fn detect_content_type(data: &[u8]) -> &'static str {
    let data = &data[..data.len().min(SNIFF_LEN)];

    if let Some(mime) = sniff_markup(data) {
        return mime;
    }

    if let Some(mime) = SIGNATURES
        .iter()
        .find(|(sig, _)| data.starts_with(sig))
        .map(|(_, mime)| *mime)
    {
        return mime;
    }

    if let Some(mime) = RIFF_LIKE
        .iter()
        .find(|(outer, inner, _)| {
            data.starts_with(outer) && data.get(8..).is_some_and(|d| d.starts_with(inner))
        })
        .map(|(_, _, mime)| *mime)
    {
        return mime;
    }

    if is_mp4(data) {
        return "video/mp4";
    }

    // Embedded OpenType: "LP" magic at offset 34 of the EOT header.
    if data.get(34..36) == Some(&b"LP"[..]) {
        return "application/vnd.ms-fontobject";
    }

    if data.iter().any(|&b| is_binary_byte(b)) {
        OCTET_STREAM
    } else {
        TEXT_PLAIN
    }
}

/// MIME subtype without parameters, e.g. `pdf` for `application/pdf`.
pub fn subtype(mime: &str) -> &str {
    mime.split_once('/')
        .map(|(_, sub)| sub.split(';').next().unwrap_or(sub).trim())
        .unwrap_or("")
}

fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    let start = data.iter().position(|b| !is_whitespace(*b))?;
    let data = &data[start..];

    let tagged = HTML_TAGS.iter().any(|tag| {
        data.len() > tag.len()
            && data[..tag.len()].eq_ignore_ascii_case(tag)
            && matches!(data[tag.len()], b' ' | b'>')
    });
    if tagged {
        return Some("text/html; charset=utf-8");
    }

    if data.starts_with(b"<?xml") {
        return Some("text/xml; charset=utf-8");
    }

    None
}

fn is_mp4(data: &[u8]) -> bool {
    if data.len() < 12 {
        return false;
    }
    let box_size = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if box_size % 4 != 0 || data.len() < box_size || &data[4..8] != b"ftyp" {
        return false;
    }
    (8..box_size)
        .step_by(4)
        .filter(|i| *i != 12)
        .any(|i| data.get(i..i + 3) == Some(&b"mp4"[..]))
}

fn is_whitespace(b: u8) -> bool {
    matches!(b, b'\t' | b'\n' | 0x0C | b'\r' | b' ')
}

fn is_binary_byte(b: u8) -> bool {
    matches!(b, 0x00..=0x08 | 0x0B | 0x0E..=0x1A | 0x1C..=0x1F)
}
