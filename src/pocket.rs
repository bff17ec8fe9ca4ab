use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};

pub const ADD_ENDPOINT: &str = "https://getpocket.com/v3/add";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub consumer_key: String,
    pub access_token: String,
    pub endpoint: String,
    pub http_client: Option<HttpClient>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            access_token: String::new(),
            endpoint: ADD_ENDPOINT.into(),
            http_client: None,
        }
    }
}

/// Read-later client for the Pocket v3 API.
pub struct Client {
    http: HttpClient,
    endpoint: String,
    consumer_key: String,
    access_token: String,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.consumer_key.trim().is_empty() {
            bail!("pocket: consumer key required");
        }
        if config.access_token.trim().is_empty() {
            bail!("pocket: access token required");
        }
        if config.endpoint.trim().is_empty() {
            bail!("pocket: endpoint required");
        }

        let http = match config.http_client {
            Some(client) => client,
            None => HttpClient::builder()
                .timeout(Duration::from_secs(20))
                .build()
                .context("pocket: build http client")?,
        };

        Ok(Client {
            http,
            endpoint: config.endpoint,
            consumer_key: config.consumer_key,
            access_token: config.access_token,
        })
    }

    /// Saves `url` with optional tags. The service reports success through a
    /// `status` field on top of the HTTP status.
    pub fn add(&self, url: &str, tags: &[String]) -> Result<()> {
        let payload = AddRequest {
            url,
            tags: if tags.is_empty() {
                None
            } else {
                Some(tags.join(","))
            },
            consumer_key: &self.consumer_key,
            access_token: &self.access_token,
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("X-Accept", "application/json")
            .json(&payload)
            .send()
            .context("pocket: add request")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            bail!("pocket: add failed {status}: {body}");
        }

        let payload: AddResponse = resp.json().context("pocket: decode add response")?;
        if payload.status != 1 {
            bail!("pocket: service reported failure for {url}");
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AddRequest<'a> {
    url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    tags: Option<String>,
    consumer_key: &'a str,
    access_token: &'a str,
}

#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(default)]
    status: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn stub_add_server(body: &'static str) -> (String, thread::JoinHandle<String>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("bind stub server");
        let endpoint = format!("http://{}/v3/add", server.server_addr());
        let handle = thread::spawn(move || {
            let mut request = server.recv().expect("receive request");
            let mut received = String::new();
            request
                .as_reader()
                .read_to_string(&mut received)
                .expect("read request body");
            let _ = request.respond(tiny_http::Response::from_string(body));
            received
        });
        (endpoint, handle)
    }

    fn client_for(endpoint: String) -> Client {
        Client::new(ClientConfig {
            consumer_key: "ck".into(),
            access_token: "at".into(),
            endpoint,
            http_client: None,
        })
        .expect("build client")
    }

    #[test]
    fn constructor_requires_keys() {
        assert!(Client::new(ClientConfig {
            access_token: "at".into(),
            ..ClientConfig::default()
        })
        .is_err());
        assert!(Client::new(ClientConfig {
            consumer_key: "ck".into(),
            ..ClientConfig::default()
        })
        .is_err());
    }

    #[test]
    fn add_posts_url_and_joined_tags() {
        let (endpoint, handle) = stub_add_server(r#"{"status":1}"#);
        let client = client_for(endpoint);
        client
            .add("https://example.test/post", &["art".into(), "feeds".into()])
            .expect("add succeeds");
        let body = handle.join().expect("stub thread");
        assert!(body.contains(r#""url":"https://example.test/post""#));
        assert!(body.contains(r#""tags":"art,feeds""#));
        assert!(body.contains(r#""consumer_key":"ck""#));
    }

    #[test]
    fn empty_tags_are_omitted() {
        let (endpoint, handle) = stub_add_server(r#"{"status":1}"#);
        let client = client_for(endpoint);
        client.add("https://example.test/post", &[]).expect("add");
        let body = handle.join().expect("stub thread");
        assert!(!body.contains("tags"));
    }

    #[test]
    fn service_reported_failure_is_an_error() {
        let (endpoint, _handle) = stub_add_server(r#"{"status":0}"#);
        let client = client_for(endpoint);
        assert!(client.add("https://example.test/post", &[]).is_err());
    }
}
