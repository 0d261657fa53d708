/// Categories of upstream transport failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorCategory {
    Dns,
    Connection,
    Tls,
    Timeout,
    Proxy,
    Body,
    Unknown,
}

/// Classified transport failure with the message relayed to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkErrorInfo {
    pub category: NetworkErrorCategory,
    pub user_message: String,
    /// Raw error text, for logs
    pub detail: String,
    pub suggested_http_status: u16,
}

impl std::fmt::Display for NetworkErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.user_message)
    }
}

/// Classify a [`reqwest::Error`] from an upstream call.
pub fn classify_network_error(error: &reqwest::Error) -> NetworkErrorInfo {
    classify_parts(
        error.is_connect(),
        error.is_timeout(),
        error.is_body() || error.is_decode(),
        &error_chain_text(error),
    )
}

fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> String {
    let mut text = error.to_string();
    let mut source = error.source();
    while let Some(inner) = source {
        text.push_str(": ");
        text.push_str(&inner.to_string());
        source = inner.source();
    }
    text
}

/// Classification over the observable facts of an error, so it can be
/// exercised without a live socket.
pub fn classify_parts(is_connect: bool, is_timeout: bool, is_body: bool, text: &str) -> NetworkErrorInfo {
    let lower = text.to_lowercase();
    let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

    let (category, user_message, status) = if is_connect && has(&["dns", "resolve", "getaddrinfo"]) {
        (
            NetworkErrorCategory::Dns,
            "DNS resolution failed: cannot resolve the upstream host.",
            502,
        )
    } else if is_connect && has(&["ssl", "tls", "certificate"]) {
        (
            NetworkErrorCategory::Tls,
            "TLS handshake with the upstream failed.",
            502,
        )
    } else if has(&["proxy"]) {
        (
            NetworkErrorCategory::Proxy,
            "Could not reach the upstream through the configured proxy.",
            502,
        )
    } else if is_connect {
        (
            NetworkErrorCategory::Connection,
            "Connection to the upstream failed.",
            502,
        )
    } else if is_timeout {
        (
            NetworkErrorCategory::Timeout,
            "The upstream did not respond in time.",
            504,
        )
    } else if is_body {
        (
            NetworkErrorCategory::Body,
            "The upstream response stream was interrupted.",
            502,
        )
    } else {
        (
            NetworkErrorCategory::Unknown,
            "Upstream request failed.",
            502,
        )
    };

    NetworkErrorInfo {
        category,
        user_message: user_message.to_string(),
        detail: text.to_string(),
        suggested_http_status: status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_error() {
        let info = classify_parts(true, false, false, "error trying to connect: dns error: failed to lookup");
        assert_eq!(info.category, NetworkErrorCategory::Dns);
        assert_eq!(info.suggested_http_status, 502);
    }

    #[test]
    fn test_tls_error() {
        let info = classify_parts(true, false, false, "invalid peer certificate: UnknownIssuer");
        assert_eq!(info.category, NetworkErrorCategory::Tls);
    }

    #[test]
    fn test_connection_refused() {
        let info = classify_parts(true, false, false, "tcp connect error: Connection refused (os error 111)");
        assert_eq!(info.category, NetworkErrorCategory::Connection);
        assert!(info.detail.contains("Connection refused"));
    }

    #[test]
    fn test_timeout() {
        let info = classify_parts(false, true, false, "operation timed out");
        assert_eq!(info.category, NetworkErrorCategory::Timeout);
        assert_eq!(info.suggested_http_status, 504);
    }

    #[test]
    fn test_proxy_wins_over_generic_connect() {
        let info = classify_parts(true, false, false, "proxy connect failed");
        assert_eq!(info.category, NetworkErrorCategory::Proxy);
    }

    #[test]
    fn test_body_and_unknown() {
        assert_eq!(
            classify_parts(false, false, true, "unexpected EOF").category,
            NetworkErrorCategory::Body
        );
        assert_eq!(
            classify_parts(false, false, false, "something else").category,
            NetworkErrorCategory::Unknown
        );
    }

    #[tokio::test]
    async fn test_classify_real_connect_error() {
        // Port 9 on localhost is almost never listening.
        let client = reqwest::Client::new();
        let err = client.get("http://127.0.0.1:9/").send().await.unwrap_err();
        let info = classify_network_error(&err);
        assert_eq!(info.suggested_http_status, 502);
        assert_eq!(info.to_string(), info.user_message);
    }
}
