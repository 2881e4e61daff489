//! Blocking HTTP authorizer.

use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use reqwest::StatusCode;

use crate::access::{AccessDecision, Authorizer, TagReport};
use crate::error::{FeederError, Result};

/// Posts each identifier to `{server}/tag` and returns the decoded decision.
pub struct HttpAuthorizer {
    client: Client,
    endpoint: String,
}

impl HttpAuthorizer {
    pub fn new(server_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}/tag", server_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Authorizer for HttpAuthorizer {
    fn authorize(&mut self, uid: &str) -> Result<AccessDecision> {
        debug!("POST {} uid={}", self.endpoint, uid);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&TagReport::new(uid))
            .send()?;

        let status = response.status();
        info!("HTTP POST Status = {}", status.as_u16());
        match status {
            StatusCode::OK | StatusCode::FORBIDDEN => {
                let body = response.bytes()?;
                AccessDecision::from_json(&body)
            }
            other => Err(FeederError::UnexpectedStatus(other.as_u16())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let auth = HttpAuthorizer::new("http://feeder.local:5000/", Duration::from_secs(1)).unwrap();
        assert_eq!(auth.endpoint(), "http://feeder.local:5000/tag");
    }

    #[test]
    fn unreachable_server_is_an_http_error() {
        // port 9 (discard) on localhost is closed on test hosts
        let mut auth = HttpAuthorizer::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        assert!(matches!(auth.authorize("049A3C7F"), Err(FeederError::Http(_))));
    }
}
