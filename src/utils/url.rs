//! Joining the backend base URL with endpoint paths.

/// Strips trailing slashes so endpoint paths can be appended verbatim.
///
/// ```
/// use llmdesk::utils::url::normalize_base_url;
///
/// assert_eq!(normalize_base_url("http://localhost:8000/"), "http://localhost:8000");
/// assert_eq!(normalize_base_url("https://api.example.com/v2//"), "https://api.example.com/v2");
/// ```
pub fn normalize_base_url(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

/// Full URL for `endpoint` under `base_url`, with exactly one slash between.
///
/// ```
/// use llmdesk::utils::url::construct_api_url;
///
/// assert_eq!(
///     construct_api_url("http://localhost:8000/", "/providers/ollama/models"),
///     "http://localhost:8000/providers/ollama/models"
/// );
/// ```
pub fn construct_api_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        normalize_base_url(base_url),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_urls_lose_trailing_slashes() {
        assert_eq!(normalize_base_url("http://localhost:8000"), "http://localhost:8000");
        assert_eq!(normalize_base_url("http://localhost:8000///"), "http://localhost:8000");
        assert_eq!(normalize_base_url("///"), "");
    }

    #[test]
    fn endpoints_join_with_a_single_slash() {
        for (base, endpoint) in [
            ("http://localhost:8000", "health"),
            ("http://localhost:8000/", "health"),
            ("http://localhost:8000", "/health"),
            ("http://localhost:8000//", "//health"),
        ] {
            assert_eq!(
                construct_api_url(base, endpoint),
                "http://localhost:8000/health",
                "base={base:?} endpoint={endpoint:?}"
            );
        }

        assert_eq!(
            construct_api_url("https://api.example.com/v2/", "mcp/tools/execute"),
            "https://api.example.com/v2/mcp/tools/execute"
        );
    }
}
