use url::Url;

/// Lowercase a host and strip a leading `www.`.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim().to_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Extract the registrable-ish domain of a URL (`www.` stripped, lowercase).
///
/// Returns `None` for unparsable input or URLs without a host.
pub fn extract_domain(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?;
    if host.is_empty() {
        return None;
    }
    Some(normalize_host(host))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_and_lowercases() {
        assert_eq!(
            extract_domain("https://WWW.Example.co.uk/path?q=1").as_deref(),
            Some("example.co.uk")
        );
        assert_eq!(
            extract_domain("http://blog.example.com").as_deref(),
            Some("blog.example.com")
        );
    }

    #[test]
    fn rejects_invalid_urls() {
        assert_eq!(extract_domain("not a url"), None);
        assert_eq!(extract_domain("example.com/page"), None);
        assert_eq!(extract_domain("mailto:someone@example.com"), None);
    }
}
