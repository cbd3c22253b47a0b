//! Rendering of typed records in human, JSON and URL-only modes.

use chrono::{DateTime, Utc};
use colored::Colorize;
use serde::Serialize;

use crate::error::CliError;
use crate::types::{ClientInfo, RelicCreateResponse, RelicListResponse, RelicMetadata};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
    Url,
}

pub const SYMBOL_SUCCESS: &str = "✓";
pub const SYMBOL_ERROR: &str = "✗";
pub const SYMBOL_INFO: &str = "ℹ";
const SYMBOL_ROCKET: &str = "🚀";
const SYMBOL_LINK: &str = "🔗";
const SYMBOL_FILE: &str = "📄";
const SYMBOL_FOLDER: &str = "📁";
const SYMBOL_PUBLIC: &str = "🌐";
const SYMBOL_PRIVATE: &str = "🔒";
const SYMBOL_CLOCK: &str = "🕐";
const SYMBOL_SIZE: &str = "📊";
const SYMBOL_DOT: &str = "•";

fn rule() -> String {
    "─".repeat(57)
}

pub fn print_created(
    resp: &RelicCreateResponse,
    metadata: Option<&RelicMetadata>,
    format: OutputFormat,
    server: &str,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(resp),
        OutputFormat::Url => {
            println!("{}", full_url(server, &resp.url));
            Ok(())
        }
        OutputFormat::Human => {
            println!();
            println!(
                "{} {}",
                SYMBOL_ROCKET,
                "Relic Created Successfully!".green().bold()
            );
            println!("{}", rule().dimmed());
            println!(
                "{} {}",
                SYMBOL_LINK,
                full_url(server, &resp.url).cyan().bold()
            );
            println!();
            if let Some(meta) = metadata {
                print_metadata_block(meta);
            }
            println!("{}", rule().dimmed());
            println!();
            Ok(())
        }
    }
}

pub fn print_info(metadata: &RelicMetadata, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(metadata),
        _ => {
            println!();
            println!("{} {}", SYMBOL_FILE, "Relic Information".blue().bold());
            println!("{}", rule().dimmed());
            println!();
            println!("{} {}", "ID:".dimmed(), metadata.id.cyan().bold());
            print_metadata_block(metadata);
            if metadata.access_count > 0 {
                println!("{} {} {}", SYMBOL_DOT.dimmed(), "Views:".bold(), metadata.access_count);
            }
            if !metadata.fork_of.is_empty() {
                println!("{} {} {}", SYMBOL_DOT.dimmed(), "Fork of:".bold(), metadata.fork_of);
            }
            println!();
            println!("{}", rule().dimmed());
            println!();
            Ok(())
        }
    }
}

fn print_metadata_block(meta: &RelicMetadata) {
    if !meta.name.is_empty() {
        println!("{} {} {}", SYMBOL_FILE.dimmed(), "Name:".bold(), meta.name);
    }
    if !meta.description.is_empty() {
        println!(
            "{} {} {}",
            SYMBOL_DOT.dimmed(),
            "Description:".bold(),
            meta.description
        );
    }
    println!(
        "{} {} {}",
        SYMBOL_SIZE.dimmed(),
        "Size:".bold(),
        bytesize::to_string(meta.size_bytes, true).white().bold()
    );
    print!(
        "{} {} {}",
        SYMBOL_DOT.dimmed(),
        "Type:".bold(),
        friendly_content_type(&meta.content_type).dimmed()
    );
    if !meta.language_hint.is_empty() {
        print!(" {}", format!("({})", meta.language_hint).cyan());
    }
    println!();
    if let Some(created) = meta.created_at.0 {
        println!(
            "{} {} {}",
            SYMBOL_CLOCK.dimmed(),
            "Created:".bold(),
            format_time(created)
        );
    }
    if let Some(expires) = meta.expires_at.0 {
        println!(
            "{} {} {}",
            SYMBOL_CLOCK.dimmed(),
            "Expires:".bold(),
            format_time(expires).yellow()
        );
    }
    let (icon, level) = access_badge(&meta.access_level);
    println!("{icon} {} {level}", "Access:".bold());
}

pub fn print_list(
    list: &RelicListResponse,
    format: OutputFormat,
    server: &str,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(list),
        OutputFormat::Url => {
            for relic in &list.relics {
                println!("{}", full_url(server, &format!("/{}", relic.id)));
            }
            Ok(())
        }
        OutputFormat::Human => {
            if list.relics.is_empty() {
                println!();
                println!("{} No relics found", SYMBOL_INFO.dimmed());
                println!();
                return Ok(());
            }

            println!();
            println!("{} {}", SYMBOL_FOLDER, "Your Relics".blue().bold());
            println!(
                "{:<50} {:<20} {:<10} {:<18} {:<12} {:<6}",
                "URL", "Name", "Size", "Type", "Created", "Access"
            );
            println!("{}", "─".repeat(120).dimmed());

            for relic in &list.relics {
                let name = if relic.name.is_empty() {
                    "(unnamed)".to_string()
                } else {
                    truncate(&relic.name, 20)
                };
                let url = truncate(&full_url(server, &format!("/{}", relic.id)), 50);
                let content_type = truncate(&friendly_content_type(&relic.content_type), 18);
                let age = relic
                    .created_at
                    .0
                    .map(format_age)
                    .unwrap_or_default();
                let (icon, _) = access_badge(&relic.access_level);

                println!(
                    "{} {:<20} {} {} {} {}",
                    format!("{url:<50}").cyan(),
                    name,
                    format!("{:<10}", bytesize::to_string(relic.size_bytes, true)).dimmed(),
                    format!("{content_type:<18}").dimmed(),
                    format!("{age:<12}").dimmed(),
                    icon,
                );
            }

            println!("{}", "─".repeat(120).dimmed());
            println!(
                "{} {} {} of {} relics",
                SYMBOL_DOT.dimmed(),
                "Total:".bold(),
                list.relics.len(),
                list.total
            );
            println!();
            Ok(())
        }
    }
}

pub fn print_client_info(
    info: &ClientInfo,
    format: OutputFormat,
    server: &str,
) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => print_json(info),
        _ => {
            println!("Client ID: {}", info.client_id.bold());
            println!("Server: {server}");
            if let Some(created) = info.created_at.0 {
                println!("Registered: {}", format_time(created));
            }
            println!("Relics: {}", info.relic_count);
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| CliError::Protocol(format!("failed to encode output: {e}")))?;
    println!("{rendered}");
    Ok(())
}

fn access_badge(level: &str) -> (String, String) {
    if level == "public" {
        (SYMBOL_PUBLIC.to_string(), level.blue().to_string())
    } else {
        (SYMBOL_PRIVATE.to_string(), level.yellow().to_string())
    }
}

/// Joins the server URL and a relative path, normalizing the slash
/// between them. Absolute URLs pass through untouched.
pub fn full_url(server: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let server = server.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{server}{path}")
    } else {
        format!("{server}/{path}")
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(3)).collect();
    format!("{cut}...")
}

fn format_time(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn format_age(t: DateTime<Utc>) -> String {
    let elapsed = Utc::now().signed_duration_since(t);
    let minutes = elapsed.num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }
    if minutes < 60 {
        return format!("{minutes}m ago");
    }
    let hours = elapsed.num_hours();
    if hours < 24 {
        return format!("{hours}h ago");
    }
    let days = elapsed.num_days();
    if days < 7 {
        return format!("{days}d ago");
    }
    if days < 30 {
        return format!("{}w ago", days / 7);
    }
    if days < 365 {
        return format!("{}mo ago", days / 30);
    }
    format!("{}y ago", days / 365)
}

/// Friendly display name for a MIME type; unknown types fall back to
/// their subtype.
fn friendly_content_type(content_type: &str) -> String {
    let ct = content_type.trim();
    let base = ct.split(';').next().unwrap_or(ct).trim();
    let friendly = match base {
        "text/plain" => "Text",
        "text/markdown" | "text/x-markdown" => "Markdown",
        "text/html" => "HTML",
        "text/css" => "CSS",
        "text/csv" => "CSV",
        "text/xml" | "application/xml" => "XML",
        "application/json" => "JSON",
        "application/pdf" => "PDF",
        "application/zip" => "ZIP Archive",
        "application/x-tar" => "TAR Archive",
        "application/gzip" => "GZIP Archive",
        "text/x-python" => "Python",
        "text/x-go" => "Go",
        "text/x-java" => "Java",
        "text/x-c" => "C",
        "text/x-c++" => "C++",
        "text/x-rust" => "Rust",
        "text/javascript" | "application/javascript" => "JavaScript",
        "text/x-typescript" => "TypeScript",
        "text/x-ruby" => "Ruby",
        "text/x-php" => "PHP",
        "text/x-shellscript" | "text/x-sh" => "Shell Script",
        "image/png" => "PNG Image",
        "image/jpeg" => "JPEG Image",
        "image/gif" => "GIF Image",
        "image/svg+xml" => "SVG Image",
        "image/webp" => "WebP Image",
        "video/mp4" => "MP4 Video",
        "video/webm" => "WebM Video",
        "audio/mpeg" => "MP3 Audio",
        "audio/wav" => "WAV Audio",
        _ => "",
    };
    if !friendly.is_empty() {
        return friendly.to_string();
    }
    match base.split_once('/') {
        Some((_, subtype)) if !subtype.is_empty() => subtype.to_string(),
        _ => base.to_string(),
    }
}
