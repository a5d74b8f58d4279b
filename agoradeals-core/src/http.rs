//! HTTP client abstraction used by the ledger gateway client.
//!
//! Keeping reqwest behind a trait lets tests swap in a canned responder
//! instead of a live gateway.

use async_trait::async_trait;
use std::collections::HashMap;
use crate::Error;

#[async_trait]
pub trait HttpClient: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// POSTs a JSON body and returns the raw response text.
    async fn post_json(&self, url: String, body: String) -> Result<String, Self::Error>;
    async fn get(&self, url: String, headers: HashMap<String, String>) -> Result<String, Self::Error>;
}

#[derive(Clone, Default)]
pub struct DefaultHttpClient {
    client: reqwest::Client,
}

impl DefaultHttpClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl HttpClient for DefaultHttpClient {
    type Error = Error;

    async fn post_json(&self, url: String, body: String) -> Result<String, Self::Error> {
        // Error statuses still carry the gateway's JSON envelope, so read the
        // body instead of calling error_for_status.
        let response = self.client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?
            .text()
            .await?;
        Ok(response)
    }

    async fn get(&self, url: String, headers: HashMap<String, String>) -> Result<String, Self::Error> {
        let mut request = self.client.get(&url);
        for (key, value) in headers {
            request = request.header(&key, value);
        }
        let response = request
            .send()
            .await?
            .text()
            .await?;
        Ok(response)
    }
}
