use std::error::Error as _;
use std::net::IpAddr;
use std::time::Duration;

use clipper_core::error::AppError;
use clipper_core::traits::Fetcher;
use reqwest::{Client, StatusCode};
use url::{Host, Url};

/// HTTP fetcher using reqwest.
///
/// Failures map onto the kinds the resilience layer recovers from: refused
/// connections and timeouts are retried, 429 waits out a cooldown, 502-504
/// fall back. Other statuses, unresolvable hosts and rejected URLs carry
/// typed variants so their text (which contains the user's URL) is never
/// classified by message.
///
/// Requests to private and reserved addresses are refused unless
/// [`allow_private_urls`](Self::allow_private_urls) is set.
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
    block_private: bool,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent("Clipper/0.1 (+content clipper)")
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: timeout.as_secs(),
            block_private: true,
        })
    }

    /// For the CLI, where the user owns the network being clipped.
    pub fn allow_private_urls(mut self) -> Self {
        self.block_private = false;
        self
    }

    fn request_error(&self, url: &Url, err: reqwest::Error) -> AppError {
        let host = url.host_str().unwrap_or_default();
        if err.is_timeout() {
            AppError::Timeout(self.timeout_secs)
        } else if is_dns_failure(&err) {
            AppError::HostUnresolved(host.to_string())
        } else if err.is_connect() {
            AppError::ConnectionRefused(host.to_string())
        } else {
            AppError::HttpError(err.without_url().to_string())
        }
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let target = parse_target(url)?;
        if self.block_private {
            ensure_public(&target).await?;
        }

        let response = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|e| self.request_error(&target, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status, url));
        }
        tracing::debug!(%url, status = status.as_u16(), "Fetched");

        response.text().await.map_err(|e| {
            AppError::HttpError(format!("Failed to read response body: {}", e.without_url()))
        })
    }
}

fn status_error(status: StatusCode, url: &str) -> AppError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => AppError::RateLimitExceeded,
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            AppError::ServiceUnavailable(format!("HTTP {}", status.as_u16()))
        }
        _ => AppError::HttpStatus {
            status: status.as_u16(),
            url: url.to_string(),
        },
    }
}

/// hyper reports resolver failures as a "dns error" somewhere in the source chain.
fn is_dns_failure(err: &reqwest::Error) -> bool {
    let mut source = err.source();
    while let Some(inner) = source {
        if inner.to_string().contains("dns error") {
            return true;
        }
        source = inner.source();
    }
    false
}

fn parse_target(url: &str) -> Result<Url, AppError> {
    let parsed = Url::parse(url).map_err(|e| AppError::UrlRejected(format!("invalid URL: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AppError::UrlRejected(format!(
            "scheme '{}' is not allowed",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(AppError::UrlRejected("URL has no host".into()));
    }
    Ok(parsed)
}

/// Resolve the host and refuse private or reserved addresses.
async fn ensure_public(target: &Url) -> Result<(), AppError> {
    let host = target.host_str().unwrap_or_default();
    let check = |ip: IpAddr| {
        if is_private_ip(ip) {
            Err(AppError::UrlRejected(format!("SSRF blocked: {host} is {ip}")))
        } else {
            Ok(())
        }
    };

    let domain = match target.host() {
        Some(Host::Ipv4(v4)) => return check(IpAddr::V4(v4)),
        Some(Host::Ipv6(v6)) => return check(IpAddr::V6(v6)),
        Some(Host::Domain(domain)) => domain,
        None => return Err(AppError::UrlRejected("URL has no host".into())),
    };

    let port = target.port_or_known_default().unwrap_or(80);
    let addrs: Vec<_> = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|_| AppError::HostUnresolved(domain.to_string()))?
        .collect();
    if addrs.is_empty() {
        return Err(AppError::HostUnresolved(domain.to_string()));
    }
    addrs.iter().try_for_each(|addr| check(addr.ip()))
}

fn is_private_ip(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, ..] = v4.octets();
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                // carrier-grade NAT, 100.64.0.0/10
                || (a == 100 && (b & 0xC0) == 64)
        }
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback()
                || v6.is_unspecified()
                || (first & 0xFFC0) == 0xFE80
                || (first & 0xFE00) == 0xFC00
                || v6.to_ipv4_mapped().is_some_and(|v4| is_private_ip(IpAddr::V4(v4)))
        }
    }
}

#[cfg(test)]
mod tests {
    use clipper_core::error::ErrorKind;

    use super::*;

    #[test]
    fn test_status_error_kinds() {
        let url = "https://example.com/validation-guide";
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, url),
            AppError::RateLimitExceeded
        ));
        assert_eq!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, url).kind(),
            ErrorKind::ServiceUnavailable
        );
        assert_eq!(
            status_error(StatusCode::GATEWAY_TIMEOUT, url).kind(),
            ErrorKind::ServiceUnavailable
        );

        // The path mentions "validation"; only the status decides the kind.
        let not_found = status_error(StatusCode::NOT_FOUND, url);
        assert_eq!(not_found.to_string(), "HTTP 404 for https://example.com/validation-guide");
        assert_eq!(not_found.kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_refused_connection_maps_to_connection_refused() {
        // Port 9 on loopback has nothing listening.
        let fetcher = ReqwestFetcher::new().unwrap().allow_private_urls();
        let err = fetcher.fetch("http://127.0.0.1:9/").await.unwrap_err();
        assert!(matches!(err, AppError::ConnectionRefused(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_not_retryable() {
        // `.invalid` never resolves.
        let fetcher = ReqwestFetcher::new().unwrap().allow_private_urls();
        let err = fetcher
            .fetch("http://no-such-host.invalid/page")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HostUnresolved(ref h) if h == "no-such-host.invalid"), "got {err}");
        assert_eq!(err.kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn test_unresolvable_host_with_private_blocking() {
        let fetcher = ReqwestFetcher::new().unwrap();
        let err = fetcher
            .fetch("https://no-such-host.invalid/")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::HostUnresolved(_)), "got {err}");
    }

    #[tokio::test]
    async fn test_private_targets_rejected() {
        let fetcher = ReqwestFetcher::new().unwrap();
        for url in [
            "http://127.0.0.1/admin",
            "http://169.254.169.254/latest/meta-data/",
            "http://[::1]:8080/",
        ] {
            let err = fetcher.fetch(url).await.unwrap_err();
            assert!(matches!(err, AppError::UrlRejected(_)), "{url}: got {err}");
            assert!(err.to_string().contains("SSRF blocked"));
        }
    }

    #[test]
    fn test_parse_target() {
        assert!(parse_target("https://example.com/a").is_ok());
        assert!(matches!(parse_target("file:///etc/passwd"), Err(AppError::UrlRejected(_))));
        assert!(matches!(parse_target("not a url"), Err(AppError::UrlRejected(_))));
    }

    #[test]
    fn test_private_ranges() {
        for ip in [
            "127.0.0.1",
            "10.0.0.1",
            "172.16.0.1",
            "192.168.1.1",
            "169.254.169.254",
            "0.0.0.0",
            "100.64.0.1",
            "::1",
            "fe80::1",
            "fc00::1",
            "::ffff:169.254.169.254",
        ] {
            assert!(is_private_ip(ip.parse().unwrap()), "{ip}");
        }
        for ip in ["8.8.8.8", "93.184.216.34", "2001:4860:4860::8888"] {
            assert!(!is_private_ip(ip.parse().unwrap()), "{ip}");
        }
    }
}
