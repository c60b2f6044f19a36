//! Small text, URL and clock helpers shared by the relay, metadata and
//! config layers.

/// Longest slice of a response body quoted in an error message
const BODY_EXCERPT_CHARS: usize = 180;

/// Trim `value` and drop it when nothing is left
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    let value = value?;
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Trimmed `value` without trailing slashes, or `None` unless it is an
/// `http://` or `https://` URL
pub fn http_base_url(value: &str) -> Option<String> {
    let value = value.trim().trim_end_matches('/');
    let has_host = ["http://", "https://"]
        .iter()
        .any(|scheme| value.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()));
    has_host.then(|| value.to_string())
}

/// Describe a failed HTTP call as `"<message> (<status>)"`.
///
/// `message` comes from the service's error payload; without one a short
/// excerpt of the raw body is used, and an empty body gives `"HTTP <status>"`.
pub fn failure_message(status: u16, message: Option<String>, body: &str) -> String {
    let text = normalize_text_option(message)
        .unwrap_or_else(|| body.trim().chars().take(BODY_EXCERPT_CHARS).collect());
    if text.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("{text} ({status})")
    }
}

/// Current Unix time in milliseconds
pub fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_text_option_trims_and_drops_blanks() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \t ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" user-1 ".to_string())).as_deref(),
            Some("user-1")
        );
    }

    #[test]
    fn http_base_url_requires_scheme_and_host() {
        assert_eq!(
            http_base_url(" https://project.supabase.co// ").as_deref(),
            Some("https://project.supabase.co")
        );
        assert_eq!(http_base_url("http://localhost:54321").as_deref(), Some("http://localhost:54321"));
        assert_eq!(http_base_url("https://"), None);
        assert_eq!(http_base_url("ftp://example.com"), None);
        assert_eq!(http_base_url("example.com"), None);
    }

    #[test]
    fn failure_message_prefers_payload_then_body() {
        assert_eq!(
            failure_message(401, Some(" Invalid API key ".to_string()), "{}"),
            "Invalid API key (401)"
        );
        assert_eq!(failure_message(502, None, " bad gateway "), "bad gateway (502)");
        assert_eq!(failure_message(500, Some(String::new()), ""), "HTTP 500");

        let long = "x".repeat(400);
        let message = failure_message(500, None, &long);
        assert_eq!(message, format!("{} (500)", "x".repeat(180)));
    }
}
