// Shared outbound client for upstream providers.
// Redirects are never followed; callers see 3xx responses as-is.

use std::time::Duration;

use crate::models::HttpConfig;

/// One pooled client for every upstream call. No overall request timeout:
/// the forwarder and the session controller each apply their own deadline.
pub fn build_http_client(http: &HttpConfig) -> Result<reqwest::Client, reqwest::Error> {
    let proxy = http
        .proxy_url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(reqwest::Proxy::all)
        .transpose()?;

    let builder = reqwest::Client::builder()
        .pool_max_idle_per_host(http.pool_max_idle_per_host)
        .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
        .redirect(reqwest::redirect::Policy::none());

    match proxy {
        Some(proxy) => builder.proxy(proxy).build(),
        None => builder.build(),
    }
}
