//! The result of one fetch, handed to exactly one spider invocation.

use crate::request::Request;
use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use url::Url;

/// A fetched page.
#[derive(Debug, Clone)]
pub struct Response {
    /// Final URL after redirects.
    pub url: Url,
    /// URL that was originally requested. Spider routing uses its host.
    pub request_url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Response {
    /// Builds a response by hand, mainly for custom downloaders and tests.
    pub fn new(request_url: Url, status: StatusCode, body: impl Into<Bytes>) -> Self {
        Response {
            url: request_url.clone(),
            request_url,
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Reconstructs the request this response answers.
    pub fn request_from_response(&self) -> Request {
        Request::new(self.request_url.clone())
    }

    /// Routing key: the lowercased host of the originating URL.
    pub fn host(&self) -> Option<String> {
        self.request_url.host_str().map(|h| h.to_ascii_lowercase())
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_comes_from_request_url() {
        let mut res = Response::new(
            Url::parse("http://origin.test/page").unwrap(),
            StatusCode::OK,
            "<h1>hi</h1>",
        );
        res.url = Url::parse("http://redirected.test/page").unwrap();
        assert_eq!(res.host().as_deref(), Some("origin.test"));
        assert_eq!(res.text(), "<h1>hi</h1>");
        assert_eq!(
            res.request_from_response().fingerprint(),
            "http://origin.test/page"
        );
    }
}
