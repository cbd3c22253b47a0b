//! Content classification for uploads.
//!
//! Resolution order for the MIME type: filename extension against the
//! registered table, then magic-number sniffing over the first 512
//! bytes, then `text/plain`. The language hint comes purely from the
//! extension and never from content, so it is deterministic for a
//! given filename.

/// Sniffing never looks past this many bytes, whatever the payload size.
pub const SNIFF_LEN: usize = 512;

const DEFAULT_CONTENT_TYPE: &str = "text/plain";

/// Extension (without dot, lowercase) to MIME type.
const MIME_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("csv", "text/csv"),
    ("xml", "text/xml"),
    ("json", "application/json"),
    ("js", "text/javascript"),
    ("jsx", "text/javascript"),
    ("ts", "text/x-typescript"),
    ("tsx", "text/x-typescript"),
    ("py", "text/x-python"),
    ("rs", "text/x-rust"),
    ("go", "text/x-go"),
    ("c", "text/x-c"),
    ("h", "text/x-c"),
    ("cpp", "text/x-c++"),
    ("cc", "text/x-c++"),
    ("cxx", "text/x-c++"),
    ("hpp", "text/x-c++"),
    ("java", "text/x-java"),
    ("rb", "text/x-ruby"),
    ("php", "text/x-php"),
    ("sh", "text/x-shellscript"),
    ("bash", "text/x-shellscript"),
    ("zsh", "text/x-shellscript"),
    ("sql", "application/sql"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("toml", "application/toml"),
    ("scss", "text/x-scss"),
    ("sass", "text/x-sass"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("mp3", "audio/mpeg"),
    ("wav", "audio/wav"),
];

/// Extension (without dot, lowercase) to syntax-highlighting hint.
const LANGUAGE_HINTS: &[(&str, &str)] = &[
    ("py", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("ts", "typescript"),
    ("tsx", "typescript"),
    ("go", "go"),
    ("rs", "rust"),
    ("c", "c"),
    ("h", "c"),
    ("cpp", "cpp"),
    ("cc", "cpp"),
    ("cxx", "cpp"),
    ("hpp", "cpp"),
    ("java", "java"),
    ("rb", "ruby"),
    ("php", "php"),
    ("sh", "bash"),
    ("bash", "bash"),
    ("zsh", "zsh"),
    ("sql", "sql"),
    ("html", "html"),
    ("css", "css"),
    ("scss", "scss"),
    ("sass", "sass"),
    ("json", "json"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("xml", "xml"),
    ("md", "markdown"),
    ("txt", "plaintext"),
];

fn extension_of(filename: &str) -> Option<String> {
    let name = filename.rsplit('/').next().unwrap_or(filename);
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// MIME type from filename and/or a content prefix. Only the first
/// `SNIFF_LEN` bytes of `content` are ever inspected.
pub fn detect_content_type(filename: &str, content: &[u8]) -> String {
    if let Some(ext) = extension_of(filename) {
        if let Some((_, mime)) = MIME_TYPES.iter().find(|(e, _)| *e == ext) {
            return (*mime).to_string();
        }
    }

    let prefix = &content[..content.len().min(SNIFF_LEN)];
    if !prefix.is_empty() {
        return sniff(prefix).to_string();
    }

    DEFAULT_CONTENT_TYPE.to_string()
}

/// Syntax-highlighting hint derived from the filename extension alone.
/// Empty string when the extension is unknown or absent.
pub fn detect_language_hint(filename: &str) -> &'static str {
    let Some(ext) = extension_of(filename) else {
        return "";
    };
    LANGUAGE_HINTS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, lang)| *lang)
        .unwrap_or("")
}

/// Magic-number sniffing over a bounded prefix.
fn sniff(prefix: &[u8]) -> &'static str {
    const SIGNATURES: &[(&[u8], &str)] = &[
        (b"\x89PNG\r\n\x1a\n", "image/png"),
        (b"\xff\xd8\xff", "image/jpeg"),
        (b"GIF87a", "image/gif"),
        (b"GIF89a", "image/gif"),
        (b"%PDF-", "application/pdf"),
        (b"PK\x03\x04", "application/zip"),
        (b"\x1f\x8b", "application/gzip"),
        (b"\x7fELF", "application/octet-stream"),
    ];

    for (magic, mime) in SIGNATURES {
        if prefix.starts_with(magic) {
            return mime;
        }
    }

    // RIFF container: WEBP or WAV depending on the format tag.
    if prefix.len() >= 12 && prefix.starts_with(b"RIFF") {
        match &prefix[8..12] {
            b"WEBP" => return "image/webp",
            b"WAVE" => return "audio/wav",
            _ => {}
        }
    }

    let trimmed = skip_whitespace(prefix);
    if starts_with_ignore_case(trimmed, b"<!DOCTYPE HTML")
        || starts_with_ignore_case(trimmed, b"<html")
    {
        return "text/html";
    }
    if trimmed.starts_with(b"<?xml") {
        return "text/xml";
    }

    if looks_like_text(prefix) {
        DEFAULT_CONTENT_TYPE
    } else {
        "application/octet-stream"
    }
}

fn skip_whitespace(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    &data[start..]
}

fn starts_with_ignore_case(data: &[u8], pattern: &[u8]) -> bool {
    data.len() >= pattern.len()
        && data
            .iter()
            .zip(pattern)
            .all(|(a, b)| a.eq_ignore_ascii_case(b))
}

/// Heuristic: valid UTF-8 without control bytes (tab/newline/CR aside)
/// reads as text.
fn looks_like_text(prefix: &[u8]) -> bool {
    // A multi-byte sequence may be cut at the 512-byte boundary; only
    // reject on errors that are not a truncated tail.
    let valid = match std::str::from_utf8(prefix) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    };
    valid
        && !prefix
            .iter()
            .any(|&b| b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
}
