//! The upload pipeline.
//!
//! `upload_file` and `upload_stdin` are the two entry points: they
//! validate the size ceiling before any network I/O, classify the
//! content, assemble the multipart form and hand the exchange to the
//! API client. A file source is sniffed from its first 512 bytes and
//! rewound so the sniffed bytes are transmitted again; stdin is
//! materialized fully in memory first because the multipart headers
//! need the content type and size up front.

use std::fs::{self, File};
use std::io::{self, Cursor, IsTerminal, Read, Seek, SeekFrom};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use reqwest::blocking::multipart::{Form, Part};

use crate::client::ApiClient;
use crate::detect;
use crate::error::CliError;
use crate::types::RelicCreateResponse;

/// Hard ceiling on one payload, enforced before encoding begins.
pub const MAX_PAYLOAD_BYTES: u64 = 100 * 1024 * 1024;

/// Field name the server expects the payload under.
const FILE_FIELD: &str = "file";

#[derive(Debug, Clone, Default)]
pub struct UploadOptions {
    /// Relic name; defaults to the file name (or "stdin").
    pub name: String,
    pub description: String,
    /// Explicit language hint; empty or "auto" requests detection.
    pub language: String,
    pub access_level: String,
    pub expires_in: String,
    pub password: String,
    pub show_progress: bool,
}

struct FormFields {
    name: String,
    description: String,
    content_type: String,
    language_hint: String,
    access_level: String,
    expires_in: String,
    password: String,
}

pub fn upload_file(
    client: &ApiClient,
    path: &Path,
    opts: &UploadOptions,
) -> Result<RelicCreateResponse, CliError> {
    let meta = fs::metadata(path)
        .map_err(|_| CliError::File(format!("File not found: {}", path.display())))?;
    let size = meta.len();
    check_payload_size(size)?;

    let mut file = File::open(path)
        .map_err(|e| CliError::File(format!("Failed to open {}: {e}", path.display())))?;

    // Sniff a bounded prefix, then rewind: the sniffed bytes are part
    // of the payload and must be transmitted again.
    let mut prefix = Vec::with_capacity(detect::SNIFF_LEN);
    file.by_ref()
        .take(detect::SNIFF_LEN as u64)
        .read_to_end(&mut prefix)
        .map_err(|e| CliError::File(format!("Failed to read {}: {e}", path.display())))?;
    file.seek(SeekFrom::Start(0))
        .map_err(|e| CliError::File(format!("Failed to rewind {}: {e}", path.display())))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| CliError::File(format!("Invalid file name: {}", path.display())))?;

    let fields = FormFields {
        name: if opts.name.is_empty() {
            filename.clone()
        } else {
            opts.name.clone()
        },
        description: opts.description.clone(),
        content_type: detect::detect_content_type(&filename, &prefix),
        language_hint: resolve_language(&opts.language, &filename),
        access_level: opts.access_level.clone(),
        expires_in: opts.expires_in.clone(),
        password: opts.password.clone(),
    };

    let part = file_part(file, size, filename, &fields.content_type, opts.show_progress)?;
    client.create_relic(build_form(&fields, part))
}

pub fn upload_stdin(
    client: &ApiClient,
    opts: &UploadOptions,
) -> Result<RelicCreateResponse, CliError> {
    upload_stream(client, io::stdin().lock(), opts)
}

/// Non-seekable sources are buffered whole (bounded by the size check)
/// before sniffing and transmission.
fn upload_stream<R: Read>(
    client: &ApiClient,
    mut reader: R,
    opts: &UploadOptions,
) -> Result<RelicCreateResponse, CliError> {
    let mut content = Vec::new();
    reader
        .by_ref()
        .take(MAX_PAYLOAD_BYTES + 1)
        .read_to_end(&mut content)
        .map_err(|e| CliError::File(format!("Failed to read input: {e}")))?;

    if content.is_empty() {
        return Err(CliError::Validation(
            "No input provided. Pipe content or specify a file.".into(),
        ));
    }
    let size = content.len() as u64;
    check_payload_size(size)?;

    let fields = FormFields {
        name: if opts.name.is_empty() {
            "stdin".to_string()
        } else {
            opts.name.clone()
        },
        description: opts.description.clone(),
        content_type: detect::detect_content_type("", &content),
        // No filename, so only an explicit hint applies.
        language_hint: resolve_language(&opts.language, ""),
        access_level: opts.access_level.clone(),
        expires_in: opts.expires_in.clone(),
        password: opts.password.clone(),
    };

    let name = fields.name.clone();
    let part = file_part(
        Cursor::new(content),
        size,
        name,
        &fields.content_type,
        opts.show_progress,
    )?;
    client.create_relic(build_form(&fields, part))
}

fn check_payload_size(size: u64) -> Result<(), CliError> {
    if size > MAX_PAYLOAD_BYTES {
        return Err(CliError::Validation(format!(
            "Input too large: {} (limit: {})",
            bytesize::to_string(size, true),
            bytesize::to_string(MAX_PAYLOAD_BYTES, true),
        )));
    }
    Ok(())
}

/// An explicit caller hint always wins; empty or "auto" asks for
/// detection from the filename.
fn resolve_language(explicit: &str, filename: &str) -> String {
    if !explicit.is_empty() && explicit != "auto" {
        return explicit.to_string();
    }
    detect::detect_language_hint(filename).to_string()
}

/// Metadata fields in wire order. Name, content type and access level
/// always go out; the rest are omitted entirely when empty.
fn metadata_fields(fields: &FormFields) -> Vec<(&'static str, String)> {
    let mut out = vec![("name", fields.name.clone())];
    if !fields.description.is_empty() {
        out.push(("description", fields.description.clone()));
    }
    out.push(("content_type", fields.content_type.clone()));
    if !fields.language_hint.is_empty() {
        out.push(("language_hint", fields.language_hint.clone()));
    }
    out.push(("access_level", fields.access_level.clone()));
    if !fields.expires_in.is_empty() {
        out.push(("expires_in", fields.expires_in.clone()));
    }
    if !fields.password.is_empty() {
        out.push(("password", fields.password.clone()));
    }
    out
}

fn build_form(fields: &FormFields, file: Part) -> Form {
    let mut form = Form::new();
    for (name, value) in metadata_fields(fields) {
        form = form.text(name, value);
    }
    form.part(FILE_FIELD, file)
}

/// Wraps the payload reader in a progress bar when one is wanted and
/// would actually be seen. Progress is observational only; the bytes
/// and their order are untouched.
fn file_part<R: Read + Send + 'static>(
    reader: R,
    size: u64,
    filename: String,
    content_type: &str,
    show_progress: bool,
) -> Result<Part, CliError> {
    let part = if show_progress && io::stderr().is_terminal() && size > 0 {
        let bar = ProgressBar::new(size);
        bar.set_style(
            ProgressStyle::with_template("{msg} [{bar:30}] {bytes}/{total_bytes} ({bytes_per_sec})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar.set_message("Uploading");
        Part::reader_with_length(bar.wrap_read(reader), size)
    } else {
        Part::reader_with_length(reader, size)
    };

    part.file_name(filename)
        .mime_str(content_type)
        .map_err(|e| CliError::Validation(format!("invalid content type: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::testutil::ScriptedServer;
    use std::io::Write;

    const CREATE_BODY: &str =
        r#"{"id":"abc123","url":"/abc123","created_at":"2024-01-15T10:30:00Z"}"#;

    fn test_client(url: &str) -> ApiClient {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = Config::load_from(dir.path().to_path_buf()).unwrap();
        cfg.server = url.to_string();
        cfg.client_key = "deadbeefdeadbeefdeadbeefdeadbeef".into();
        cfg.timeout_secs = 5;
        ApiClient::new(&cfg).unwrap()
    }

    fn fields(name: &str) -> FormFields {
        FormFields {
            name: name.into(),
            description: String::new(),
            content_type: "text/plain".into(),
            language_hint: String::new(),
            access_level: "private".into(),
            expires_in: String::new(),
            password: String::new(),
        }
    }

    #[test]
    fn size_ceiling_is_inclusive() {
        assert!(check_payload_size(MAX_PAYLOAD_BYTES).is_ok());
        let err = check_payload_size(MAX_PAYLOAD_BYTES + 1).unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(err.exit_code(), crate::error::EXIT_USAGE);
    }

    #[test]
    fn empty_optional_fields_are_omitted() {
        let pairs = metadata_fields(&fields("snippet"));
        let names: Vec<_> = pairs.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["name", "content_type", "access_level"]);
    }

    #[test]
    fn populated_fields_keep_wire_order() {
        let mut f = fields("snippet");
        f.description = "a thing".into();
        f.language_hint = "python".into();
        f.expires_in = "24h".into();
        f.password = "hunter2".into();
        let names: Vec<_> = metadata_fields(&f).iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            vec![
                "name",
                "description",
                "content_type",
                "language_hint",
                "access_level",
                "expires_in",
                "password"
            ]
        );
    }

    #[test]
    fn explicit_language_beats_detection() {
        assert_eq!(resolve_language("ruby", "script.py"), "ruby");
        assert_eq!(resolve_language("auto", "script.py"), "python");
        assert_eq!(resolve_language("", "script.py"), "python");
        assert_eq!(resolve_language("", "notes"), "");
    }

    #[test]
    fn upload_file_classifies_and_transmits_whole_payload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("script.py");
        let mut f = File::create(&path).unwrap();
        // 4 KiB of recognizable source text.
        let line = b"print('relic upload test')\n";
        for _ in 0..(4096 / line.len() + 1) {
            f.write_all(line).unwrap();
        }
        drop(f);

        let server = ScriptedServer::start(vec![(201, CREATE_BODY)]);
        let client = test_client(&server.url);
        let opts = UploadOptions {
            access_level: "private".into(),
            ..Default::default()
        };

        let resp = upload_file(&client, &path, &opts).unwrap();
        assert_eq!(resp.id, "abc123");

        let raw = server.finish().remove(0);
        let body = String::from_utf8_lossy(&raw);
        // Extension-derived classification made it onto the wire.
        assert!(body.contains("text/x-python"), "content_type missing");
        assert!(body.contains("name=\"language_hint\""), "language field missing");
        assert!(body.contains("python"));
        assert!(body.contains("filename=\"script.py\""));
        // Sniffed prefix was rewound, not skipped: the payload starts
        // from byte zero and is fully present.
        assert!(body.contains("print('relic upload test')"));
        let occurrences = body.matches("print('relic upload test')").count();
        assert!(occurrences >= 4096 / line.len(), "payload truncated");
    }

    #[test]
    fn upload_file_omits_empty_optionals_on_the_wire() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let server = ScriptedServer::start(vec![(200, CREATE_BODY)]);
        let client = test_client(&server.url);
        let opts = UploadOptions {
            access_level: "public".into(),
            ..Default::default()
        };

        upload_file(&client, &path, &opts).unwrap();

        let raw = server.finish().remove(0);
        let body = String::from_utf8_lossy(&raw);
        assert!(!body.contains("name=\"description\""));
        assert!(!body.contains("name=\"expires_in\""));
        assert!(!body.contains("name=\"password\""));
        assert!(body.contains("name=\"access_level\""));
    }

    #[test]
    fn missing_file_fails_before_any_request() {
        let server = ScriptedServer::start(vec![]);
        let client = test_client(&server.url);
        let err = upload_file(
            &client,
            Path::new("/no/such/file.txt"),
            &UploadOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CliError::File(_)));
        assert_eq!(server.hits(), 0);
    }

    #[test]
    fn empty_stream_is_a_validation_error() {
        let server = ScriptedServer::start(vec![]);
        let client = test_client(&server.url);
        let err =
            upload_stream(&client, Cursor::new(Vec::new()), &UploadOptions::default()).unwrap_err();
        assert!(matches!(err, CliError::Validation(_)));
        assert_eq!(server.hits(), 0);
    }

    #[test]
    fn stream_uploads_default_to_stdin_name() {
        let server = ScriptedServer::start(vec![(201, CREATE_BODY)]);
        let client = test_client(&server.url);
        let opts = UploadOptions {
            access_level: "private".into(),
            ..Default::default()
        };

        upload_stream(&client, Cursor::new(b"piped content".to_vec()), &opts).unwrap();

        let raw = server.finish().remove(0);
        let body = String::from_utf8_lossy(&raw);
        assert!(body.contains("stdin"));
        assert!(body.contains("piped content"));
        assert!(body.contains("text/plain"));
    }
}
