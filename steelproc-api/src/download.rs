//! Report download urls
//!
//! The server reports the generated file either as a bare file name, a path
//! that already contains the `download/` segment (with or without a leading
//! slash), or a partial path. All of them resolve to exactly one url of the
//! form `<base>/download/<name>`.

use reqwest::Url;

use crate::{Result, config::DOWNLOAD_SEGMENT, error::validation};

/// Resolves a report file name or path against the server base url.
///
/// ```
/// use steelproc::prelude::*;
/// let base = Url::parse("http://localhost:8000").unwrap();
/// for input in ["report.xlsx", "/download/report.xlsx", "download/report.xlsx"] {
///     assert_eq!(
///         resolve_download_url(&base, input).unwrap(),
///         "http://localhost:8000/download/report.xlsx"
///     );
/// }
/// ```
pub fn resolve_download_url(base: &Url, file: &str) -> Result<String> {
    let file = file.trim();
    if file.starts_with("http://") || file.starts_with("https://") {
        let url = Url::parse(file)
            .map_err(|e| validation(format!("invalid download url '{file}': {e}")))?;
        return Ok(url.to_string());
    }

    let mut segments: Vec<&str> = file
        .split(['/', '\\'])
        .filter(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
        .collect();
    // drop everything up to and including the last "download" segment,
    // so "download/x", "/download/x" and "api/download/x" all reduce to "x"
    if let Some(pos) = segments.iter().rposition(|seg| *seg == DOWNLOAD_SEGMENT) {
        segments.drain(..=pos);
    }
    if segments.is_empty() {
        return Err(validation(format!("no file name in download path '{file}'")));
    }

    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| validation(format!("base url cannot be a base: {base}")))?
        .pop_if_empty()
        .push(DOWNLOAD_SEGMENT)
        .extend(segments);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Last path component of a report name, safe to use as a local file name.
pub fn local_file_name(file: &str) -> Option<&str> {
    file.rsplit(['/', '\\'])
        .find(|seg| !seg.is_empty() && *seg != "." && *seg != "..")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base(s: &str) -> Url {
        Url::parse(s).expect("valid base")
    }

    #[test]
    fn test_three_input_shapes_resolve_identically() {
        let base = base("http://localhost:8000");
        let expected = "http://localhost:8000/download/report.xlsx";
        for input in [
            "report.xlsx",
            "/download/report.xlsx",
            "download/report.xlsx",
            "//download//report.xlsx",
            "download/download/report.xlsx",
            " report.xlsx ",
        ] {
            let url = resolve_download_url(&base, input).unwrap();
            assert_eq!(url, expected, "input {input:?}");
            assert_eq!(url.matches("/download/").count(), 1);
            assert!(!url["http://".len()..].contains("//"));
        }
    }

    #[test]
    fn test_base_with_trailing_slash_and_prefix() {
        let expected = "https://reports.example.com/api/download/r.xlsx";
        for b in ["https://reports.example.com/api", "https://reports.example.com/api/"] {
            assert_eq!(resolve_download_url(&base(b), "/download/r.xlsx").unwrap(), expected);
        }
        assert_eq!(
            resolve_download_url(&base("http://h:1/"), "r.xlsx").unwrap(),
            "http://h:1/download/r.xlsx"
        );
    }

    #[test]
    fn test_partial_path_keeps_subdirectories() {
        let base = base("http://localhost:8000");
        assert_eq!(
            resolve_download_url(&base, "reports/2025/r.xlsx").unwrap(),
            "http://localhost:8000/download/reports/2025/r.xlsx"
        );
        assert_eq!(
            resolve_download_url(&base, "api/download/r.xlsx").unwrap(),
            "http://localhost:8000/download/r.xlsx"
        );
    }

    #[test]
    fn test_special_characters_are_encoded() {
        let base = base("http://localhost:8000");
        assert_eq!(
            resolve_download_url(&base, "Steel Report #1.xlsx").unwrap(),
            "http://localhost:8000/download/Steel%20Report%20%231.xlsx"
        );
    }

    #[test]
    fn test_traversal_segments_dropped() {
        let base = base("http://localhost:8000");
        assert_eq!(
            resolve_download_url(&base, "../../etc/passwd").unwrap(),
            "http://localhost:8000/download/etc/passwd"
        );
    }

    #[test]
    fn test_absolute_url_unchanged() {
        let base = base("http://localhost:8000");
        assert_eq!(
            resolve_download_url(&base, "https://cdn.example.com/download/r.xlsx").unwrap(),
            "https://cdn.example.com/download/r.xlsx"
        );
    }

    #[test]
    fn test_empty_input_rejected() {
        let base = base("http://localhost:8000");
        for input in ["", "/", "download/", "/download/", "..", "./"] {
            assert!(resolve_download_url(&base, input).is_err(), "input {input:?}");
        }
    }

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("report.xlsx"), Some("report.xlsx"));
        assert_eq!(local_file_name("/download/report.xlsx"), Some("report.xlsx"));
        assert_eq!(local_file_name("..\\..\\evil.xlsx"), Some("evil.xlsx"));
        assert_eq!(local_file_name("../"), None);
        assert_eq!(local_file_name(""), None);
    }
}
