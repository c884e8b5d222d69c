/*
 * Converts a file into another format and writes the result as
 * `<stem>.<target>` into an output directory (normally the scratch directory).
 *
 * Supported conversions are Markdown to HTML, HTML to Markdown, JSON to CSV and
 * CSV to JSON. Any other source/target pair is a plain copy under the new
 * extension.
 */
use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum ConvertError {
    NotFound(PathBuf),
    Io(io::Error),
    Json(serde_json::Error),
    Csv(csv::Error),
}

impl From<io::Error> for ConvertError {
    fn from(err: io::Error) -> Self {
        ConvertError::Io(err)
    }
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::Json(err)
    }
}

impl From<csv::Error> for ConvertError {
    fn from(err: csv::Error) -> Self {
        ConvertError::Csv(err)
    }
}

impl std::fmt::Display for ConvertError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConvertError::NotFound(p) => write!(f, "File not found: {}", p.display()),
            ConvertError::Io(e) => write!(f, "I/O error: {e}"),
            ConvertError::Json(e) => write!(f, "Invalid JSON: {e}"),
            ConvertError::Csv(e) => write!(f, "CSV error: {e}"),
        }
    }
}

impl std::error::Error for ConvertError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConvertError::Io(e) => Some(e),
            ConvertError::Json(e) => Some(e),
            ConvertError::Csv(e) => Some(e),
            ConvertError::NotFound(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;

pub fn convert_format(path: &Path, target: &str, out_dir: &Path) -> Result<PathBuf> {
    if !path.is_file() {
        return Err(ConvertError::NotFound(path.to_path_buf()));
    }
    let target = target.trim().trim_start_matches('.').to_lowercase();
    let source = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "converted".to_string());

    fs::create_dir_all(out_dir)?;
    let output = out_dir.join(format!("{stem}.{target}"));
    log::debug!("FormatConversion: {source} -> {target} for {path:?} into {output:?}");

    match (source.as_str(), target.as_str()) {
        ("md", "html") => markdown_to_html(path, &output)?,
        ("html" | "htm", "md") => html_to_markdown(path, &output)?,
        ("json", "csv") => json_to_csv(path, &output)?,
        ("csv", "json") => csv_to_json(path, &output)?,
        _ => {
            if is_same_file(path, &output) {
                return Ok(output);
            }
            fs::copy(path, &output)?;
        }
    }
    Ok(output)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn read_lossy(path: &Path) -> Result<String> {
    Ok(String::from_utf8_lossy(&fs::read(path)?).into_owned())
}

fn markdown_to_html(path: &Path, output: &Path) -> Result<()> {
    let markdown = read_lossy(path)?;
    let mut html = String::new();
    pulldown_cmark::html::push_html(&mut html, pulldown_cmark::Parser::new(&markdown));
    fs::write(output, html)?;
    Ok(())
}

fn html_to_markdown(path: &Path, output: &Path) -> Result<()> {
    let html = read_lossy(path)?;
    fs::write(output, html2md::parse_html(&html))?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/*
 * An array of objects becomes a header row (keys of the first object) plus one
 * row per element; an array of scalars becomes one value per row. Any other
 * document produces an empty file.
 */
fn json_to_csv(path: &Path, output: &Path) -> Result<()> {
    let document: Value = serde_json::from_str(&read_lossy(path)?)?;
    let items = match document {
        Value::Array(items) if !items.is_empty() => items,
        _ => {
            fs::write(output, "")?;
            return Ok(());
        }
    };

    let mut writer = csv::Writer::from_path(output)?;
    if let Some(Value::Object(first)) = items.first() {
        let headers: Vec<String> = first.keys().cloned().collect();
        writer.write_record(&headers)?;
        for item in &items {
            let row: Vec<String> = headers.iter().map(|h| cell(item.get(h))).collect();
            writer.write_record(&row)?;
        }
    } else {
        for item in &items {
            writer.write_record([cell(Some(item))])?;
        }
    }
    writer.flush()?;
    Ok(())
}

// Rows shorter than the header get `null` for the missing columns.
fn csv_to_json(path: &Path, output: &Path) -> Result<()> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_path(path)?;
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row: Map<String, Value> = headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let value = record
                    .get(i)
                    .map_or(Value::Null, |field| Value::String(field.to_string()));
                (header.to_string(), value)
            })
            .collect();
        rows.push(Value::Object(row));
    }

    fs::write(output, serde_json::to_string_pretty(&Value::Array(rows))?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{TempDir, tempdir};

    fn source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_markdown_to_html() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let md = source(&dir, "README.md", "# Title\n\nSome *text*.\n");

        let html_path = convert_format(&md, "html", &out).unwrap();

        assert_eq!(html_path, out.join("README.html"));
        let html = fs::read_to_string(html_path).unwrap();
        assert!(html.contains("<h1>Title</h1>"), "{html}");
        assert!(html.contains("<em>text</em>"), "{html}");
    }

    #[test]
    fn test_json_objects_to_csv_keeps_key_order() {
        let dir = tempdir().unwrap();
        let json = source(
            &dir,
            "people.json",
            r#"[{"name": "ada", "age": 36}, {"name": "alan", "age": null}]"#,
        );

        let csv_path = convert_format(&json, "csv", dir.path()).unwrap();

        assert_eq!(
            fs::read_to_string(csv_path).unwrap(),
            "name,age\nada,36\nalan,\n"
        );
    }

    #[test]
    fn test_json_scalars_to_csv_and_non_array_to_empty() {
        let dir = tempdir().unwrap();
        let scalars = source(&dir, "list.json", r#"[1, "x", true]"#);
        let object = source(&dir, "obj.json", r#"{"a": 1}"#);

        let out = convert_format(&scalars, "csv", dir.path()).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "1\nx\ntrue\n");

        let out = convert_format(&object, "csv", dir.path()).unwrap();
        assert_eq!(fs::read_to_string(out).unwrap(), "");
    }

    #[test]
    fn test_csv_to_json_is_header_keyed() {
        let dir = tempdir().unwrap();
        let csv = source(&dir, "table.csv", "name,lang\nferris,rust\nshort\n");

        let json_path = convert_format(&csv, "json", dir.path()).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(json_path).unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!([
                {"name": "ferris", "lang": "rust"},
                {"name": "short", "lang": null}
            ])
        );
    }

    #[test]
    fn test_html_to_markdown() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let html = source(
            &dir,
            "page.html",
            "<p>Read <strong>this</strong> at <a href=\"https://example.com\">the site</a>.</p>",
        );

        let md_path = convert_format(&html, ".MD", &out).unwrap();

        assert_eq!(md_path, out.join("page.md"));
        let md = fs::read_to_string(md_path).unwrap();
        assert!(!md.contains("<p>"), "{md}");
        assert!(md.contains("**this**"), "{md}");
        assert!(md.contains("[the site](https://example.com)"), "{md}");
    }

    #[test]
    fn test_other_pairs_are_copied() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let yaml = source(&dir, "settings.yaml", "key: value\n");

        let txt_path = convert_format(&yaml, "txt", &out).unwrap();

        assert_eq!(txt_path, out.join("settings.txt"));
        assert_eq!(fs::read_to_string(txt_path).unwrap(), "key: value\n");
    }

    #[test]
    fn test_same_target_extension_in_place_keeps_content() {
        let dir = tempdir().unwrap();
        let txt = source(&dir, "keep.txt", "unchanged");

        let out = convert_format(&txt, "txt", dir.path()).unwrap();

        assert_eq!(out, txt);
        assert_eq!(fs::read_to_string(txt).unwrap(), "unchanged");
    }

    #[test]
    fn test_errors_for_missing_file_and_bad_json() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            convert_format(&dir.path().join("gone.md"), "html", dir.path()),
            Err(ConvertError::NotFound(_))
        ));

        let bad = source(&dir, "bad.json", "{ not json");
        assert!(matches!(
            convert_format(&bad, "csv", dir.path()),
            Err(ConvertError::Json(_))
        ));
    }
}
