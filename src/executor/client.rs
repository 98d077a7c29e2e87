use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, Method};
use thiserror::Error;

/// Everything the transport needs for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub follow_redirects: bool,
    pub verify_tls: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub status_text: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

/// A call that produced no response at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{name}: {message}")]
pub struct TransportError {
    pub name: String,
    pub message: String,
}

impl TransportError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// The transport seam. Any status code is a successful call here; only a
/// missing response is an error.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

#[derive(Debug, Clone, Default)]
pub struct ReqwestClient;

impl ReqwestClient {
    pub fn new() -> Self {
        Self
    }

    fn build_client(request: &HttpRequest) -> Result<Client, TransportError> {
        let redirect = if request.follow_redirects {
            Policy::limited(10)
        } else {
            Policy::none()
        };

        Client::builder()
            .redirect(redirect)
            .danger_accept_invalid_certs(!request.verify_tls)
            .build()
            .map_err(|err| TransportError::new("ClientError", err.to_string()))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let client = Self::build_client(&request)?;

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| TransportError::new("RequestError", format!("invalid HTTP method {}", request.method)))?;
        let mut builder = client.request(method, &request.url);

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(transport_error)?;

        let status = response.status();
        // Non-UTF-8 header bytes are replaced, not dropped.
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let body = response.text().await.map_err(transport_error)?;

        Ok(HttpResponse {
            status: status.as_u16(),
            status_text: status.canonical_reason().map(str::to_string),
            headers,
            body,
        })
    }
}

fn transport_error(err: reqwest::Error) -> TransportError {
    let name = if err.is_timeout() {
        "TimeoutError"
    } else if err.is_connect() {
        "ConnectionError"
    } else if err.is_redirect() {
        "RedirectError"
    } else if err.is_builder() {
        "RequestError"
    } else if err.is_body() || err.is_decode() {
        "ReadError"
    } else {
        "HTTPError"
    };
    TransportError::new(name, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn request(url: String) -> HttpRequest {
        HttpRequest {
            method: "GET".to_string(),
            url,
            headers: Vec::new(),
            body: None,
            follow_redirects: false,
            verify_tls: true,
        }
    }

    #[tokio::test]
    async fn send_returns_error_statuses_as_responses() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/items")
                    .header("x-api-key", "k")
                    .body("{\"a\":1}");
                then.status(422)
                    .header("X-Request-Id", "r-7")
                    .body("nope");
            })
            .await;

        let mut req = request(server.url("/items"));
        req.method = "POST".to_string();
        req.headers.push(("x-api-key".to_string(), "k".to_string()));
        req.body = Some("{\"a\":1}".to_string());

        let response = ReqwestClient::new().send(req).await.unwrap();
        assert_eq!(response.status, 422);
        assert_eq!(response.body, "nope");
        assert_eq!(response.status_text.as_deref(), Some("Unprocessable Entity"));
        assert!(response
            .headers
            .contains(&("x-request-id".to_string(), "r-7".to_string())));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn send_follows_redirects_only_when_asked() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/old");
                then.status(302).header("location", "/new");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/new");
                then.status(200).body("moved");
            })
            .await;

        let client = ReqwestClient::new();
        let stay = client.send(request(server.url("/old"))).await.unwrap();
        assert_eq!(stay.status, 302);

        let mut follow = request(server.url("/old"));
        follow.follow_redirects = true;
        let moved = client.send(follow).await.unwrap();
        assert_eq!(moved.status, 200);
        assert_eq!(moved.body, "moved");
    }

    #[tokio::test]
    async fn send_reports_connection_failures() {
        let err = ReqwestClient::new()
            .send(request("http://127.0.0.1:9/unreachable".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.name, "ConnectionError");
    }
}
