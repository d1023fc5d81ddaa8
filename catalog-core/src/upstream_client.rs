//! Upstream Client (§4.2 in the component list, §6): issues authenticated
//! HTTP GET/POST against the automation API. Grounded on
//! `original_source/workunit.go`'s `getPage`/`post` functions.

use reqwest::Client;

/// A raw upstream response; status validation and body decoding are left
/// to the caller (the Work Unit), since the exact failure-message format
/// is part of the wire contract (§4.3.4).
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

pub struct UpstreamClient {
    client: Client,
    bearer_token: Option<String>,
}

impl UpstreamClient {
    pub fn new(client: Client, bearer_token: Option<String>) -> Self {
        Self {
            client,
            bearer_token,
        }
    }

    pub async fn get(&self, url: &str) -> Result<UpstreamResponse, reqwest::Error> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(UpstreamResponse { status, body })
    }

    pub async fn post(&self, url: &str, body: &[u8]) -> Result<UpstreamResponse, reqwest::Error> {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .body(body.to_vec());
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(UpstreamResponse { status, body })
    }
}

/// Successful upstream status codes per §4.3.4.
pub fn is_success_status(status: u16) -> bool {
    matches!(status, 200 | 201 | 202)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    #[tokio::test]
    async fn get_applies_bearer_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/x")
                .header("authorization", "Bearer tok");
            then.status(200).body("{\"a\":1}");
        });

        let client = UpstreamClient::new(Client::new(), Some("tok".to_string()));
        let resp = client.get(&server.url("/x")).await.unwrap();
        assert_eq!(resp.status, 200);
        mock.assert();
    }

    #[test]
    fn success_status_matches_spec() {
        assert!(is_success_status(200));
        assert!(is_success_status(201));
        assert!(is_success_status(202));
        assert!(!is_success_status(404));
    }
}
