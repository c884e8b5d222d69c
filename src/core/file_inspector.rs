/*
 * Stateless helpers for looking at files before (or instead of) copying them:
 * human-readable sizes, MIME sniffing by extension, previews with metadata, and
 * line-range extraction. None of these raise; failures come back as `None`.
 */
use crate::core::models::FilePreview;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;
use std::time::SystemTime;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

const PREVIEW_LINES: usize = 10;
const HEX_PREVIEW_BYTES: u64 = 100;
const SIZE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

pub fn human_readable_size(bytes: u64) -> String {
    let mut size = bytes as f64;
    for unit in SIZE_UNITS {
        if size < 1024.0 {
            return format!("{size:.2} {unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.2} PB")
}

/// Extension-based MIME guess, e.g. `text/plain` for `notes.txt`.
pub fn guess_mime(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

pub fn is_text_like(mime: &str) -> bool {
    mime.contains("text") || mime.contains("json") || mime.contains("xml")
}

fn is_media(mime: &str) -> bool {
    mime.contains("image") || mime.contains("video") || mime.contains("audio")
}

// Local time when the offset can be determined, UTC otherwise.
fn format_modified(modified: SystemTime) -> String {
    let utc = OffsetDateTime::from(modified);
    let local = match UtcOffset::current_local_offset() {
        Ok(offset) => utc.to_offset(offset),
        Err(_) => utc,
    };
    local
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_default()
}

fn hex_dump(path: &Path) -> std::io::Result<String> {
    let mut head = Vec::new();
    File::open(path)?
        .take(HEX_PREVIEW_BYTES)
        .read_to_end(&mut head)?;
    Ok(head
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" "))
}

// Lowercase hex SHA-256 of the file's bytes, streamed through the hasher.
pub fn sha256_hex(path: &Path) -> io::Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    let digest = hasher.finalize();
    log::trace!("FileInspector: Hashed {path:?}.");
    Ok(format!("{digest:x}"))
}

/*
 * Builds a `FilePreview` for a regular file. Text-like files get their line
 * count and first ten lines; media files get metadata only; everything else is
 * shown as a hex dump of its first 100 bytes and reported as `binary`.
 */
pub fn preview_file(path: &Path) -> Option<FilePreview> {
    let metadata = fs::metadata(path).ok().filter(|m| m.is_file())?;
    let size = metadata.len();
    let modified = metadata
        .modified()
        .map(format_modified)
        .unwrap_or_default();
    let checksum = sha256_hex(path).unwrap_or_else(|e| {
        log::warn!("FileInspector: No checksum for {path:?}: {e}");
        String::new()
    });

    let mut preview = FilePreview {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        path: path.to_path_buf(),
        size,
        size_human: human_readable_size(size),
        modified,
        kind: "unknown".to_string(),
        preview: String::new(),
        lines: 0,
        checksum,
    };

    match guess_mime(path) {
        Some(mime) if is_text_like(&mime) => {
            match fs::read(path) {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    let lines: Vec<&str> = text.split_inclusive('\n').collect();
                    preview.lines = lines.len();
                    preview.preview = lines.iter().take(PREVIEW_LINES).copied().collect();
                }
                Err(e) => preview.preview = format!("Error previewing file: {e}"),
            }
            preview.kind = mime;
        }
        Some(mime) if is_media(&mime) => preview.kind = mime,
        _ => match hex_dump(path) {
            Ok(dump) => {
                preview.preview = dump;
                preview.kind = "binary".to_string();
            }
            Err(e) => preview.preview = format!("Error previewing file: {e}"),
        },
    }

    Some(preview)
}

/// Parses `"5"` or `"5-10"` into an inclusive `(start, end)` pair. No bounds checks.
pub fn parse_line_range(range: &str) -> Option<(usize, usize)> {
    let range = range.trim();
    match range.split_once('-') {
        Some((start, end)) => Some((start.trim().parse().ok()?, end.trim().parse().ok()?)),
        None => {
            let line = range.parse().ok()?;
            Some((line, line))
        }
    }
}

/*
 * Returns lines `start..=end` (1-based, `end` defaulting to `start`) with their
 * terminators. `None` for a missing file or a range that is empty, starts
 * before line 1, or runs past the last line.
 */
pub fn extract_line_range(path: &Path, start: usize, end: Option<usize>) -> Option<String> {
    let end = end.unwrap_or(start);
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            log::debug!("FileInspector: Cannot read {path:?} for line range: {e}");
            return None;
        }
    };
    let text = String::from_utf8_lossy(&bytes);
    let lines: Vec<&str> = text.split_inclusive('\n').collect();

    if start < 1 || end > lines.len() || start > end {
        return None;
    }
    Some(lines[start - 1..end].concat())
}
