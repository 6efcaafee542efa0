//! The unit of work held by the frontier.

use url::Url;

/// An absolute URL waiting to be fetched.
///
/// Requests are immutable once enqueued. The fragment is stripped on
/// construction since it never reaches the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Request {
    pub url: Url,
}

impl Request {
    /// Creates a new request for `url`.
    pub fn new(mut url: Url) -> Self {
        url.set_fragment(None);
        Request { url }
    }

    /// Parses `url` into a request.
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(Request::new)
    }

    /// Identity key used by the scheduler for deduplication and job tracking.
    pub fn fingerprint(&self) -> String {
        self.url.as_str().to_string()
    }

    /// Lowercased hostname, the spider routing key.
    pub fn host(&self) -> Option<String> {
        self.url.host_str().map(|h| h.to_ascii_lowercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragment_is_dropped() {
        let req = Request::parse("http://example.test/a#section").unwrap();
        assert_eq!(req.fingerprint(), "http://example.test/a");
    }

    #[test]
    fn host_ignores_port_and_case() {
        let req = Request::parse("http://Example.TEST:8080/a").unwrap();
        assert_eq!(req.host().as_deref(), Some("example.test"));
    }
}
