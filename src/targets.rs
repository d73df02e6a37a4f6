//! URL list loading.

use crate::error::ConfigError;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, warn};

/// Resolve the URLs to measure: a single `--url` wins over `--urls-file`.
pub fn read_urls(single_url: Option<&str>, urls_file: Option<&Path>) -> Result<Vec<String>> {
    let urls = match (single_url, urls_file) {
        (Some(url), _) => vec![url.trim().to_string()],
        (None, Some(path)) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read URL list: {}", path.display()))?;
            let urls = parse_url_list(&content);
            debug!("Read {} URLs from {}", urls.len(), path.display());
            urls
        }
        (None, None) => Vec::new(),
    };

    if urls.iter().all(|u| u.is_empty()) {
        return Err(ConfigError::NoUrls.into());
    }

    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are skipped. Repeated
/// URLs are kept once, at their first position.
pub fn parse_url_list(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if !seen.insert(line) {
            warn!("Skipping repeated URL: {}", line);
            continue;
        }
        urls.push(line.to_string());
    }

    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_url_list() {
        let content = "# landing pages\nhttps://example.com/\n\n  https://example.com/pricing  \n#https://skip.me\n";
        assert_eq!(
            parse_url_list(content),
            vec!["https://example.com/", "https://example.com/pricing"]
        );
    }

    #[test]
    fn test_repeated_urls_are_kept_once() {
        let content = "https://b.example\nhttps://a.example\n  https://b.example\nhttps://c.example\n";
        assert_eq!(
            parse_url_list(content),
            vec!["https://b.example", "https://a.example", "https://c.example"]
        );
    }

    #[test]
    fn test_single_url_wins() {
        let urls = read_urls(Some(" https://example.com "), Some(Path::new("/nonexistent"))).unwrap();
        assert_eq!(urls, vec!["https://example.com"]);
    }

    #[test]
    fn test_read_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "https://a.example\n# comment\nhttps://b.example").unwrap();

        let urls = read_urls(None, Some(file.path())).unwrap();
        assert_eq!(urls, vec!["https://a.example", "https://b.example"]);
    }

    #[test]
    fn test_no_urls_is_a_config_error() {
        let err = read_urls(None, None).unwrap_err();
        assert_eq!(err.downcast_ref::<ConfigError>(), Some(&ConfigError::NoUrls));

        let file = NamedTempFile::new().unwrap();
        assert!(read_urls(None, Some(file.path())).is_err());
    }
}
