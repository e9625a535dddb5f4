use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

const DEFAULT_FILENAME: &str = "document";

fn filename_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"filename="([^"]+)""#).expect("static regex"))
}

/// Pull the filename out of a `Content-Disposition` header.
///
/// Only the final path component is kept so a hostile header cannot point
/// outside the download directory.
pub fn filename_from_disposition(header: Option<&str>) -> String {
    header
        .and_then(|value| filename_pattern().captures(value))
        .and_then(|caps| caps.get(1))
        .and_then(|m| {
            Path::new(m.as_str())
                .file_name()
                .and_then(|n| n.to_str())
                .map(str::to_string)
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| DEFAULT_FILENAME.to_string())
}

/// A fetched document body
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl DownloadedFile {
    /// Write into `dir`, returning the final path
    pub async fn save_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(&self.filename);
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_extracted() {
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="report.pdf""#)),
            "report.pdf"
        );
    }

    #[test]
    fn test_filename_stops_at_closing_quote() {
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="a.pdf"; size="12""#)),
            "a.pdf"
        );
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename=""; x="y""#)),
            "document"
        );
    }

    #[test]
    fn test_missing_header_defaults() {
        assert_eq!(filename_from_disposition(None), "document");
        assert_eq!(filename_from_disposition(Some("inline")), "document");
    }

    #[test]
    fn test_path_components_stripped() {
        assert_eq!(
            filename_from_disposition(Some(r#"attachment; filename="../../etc/passwd""#)),
            "passwd"
        );
    }

    #[tokio::test]
    async fn test_save_to_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = DownloadedFile {
            filename: "notes.txt".to_string(),
            bytes: b"hello".to_vec(),
        };
        let path = file.save_to(dir.path()).await.unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"hello");
    }
}
