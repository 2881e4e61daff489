//! Authorization client on the ESP-IDF HTTP stack.

use core::time::Duration;

use embedded_svc::http::client::Client;
use embedded_svc::http::Method;
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
use log::{debug, info};
use petfeeder::error::Result;
use petfeeder::{AccessDecision, Authorizer, FeederError, TagReport};

/// Responses are a few dozen bytes; anything longer is not ours.
const MAX_BODY_LEN: usize = 1024;

pub struct EspAuthorizer {
    client: Client<EspHttpConnection>,
    endpoint: String,
}

impl EspAuthorizer {
    pub fn new(server_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let connection = EspHttpConnection::new(&Configuration {
            timeout: Some(timeout),
            ..Default::default()
        })?;
        Ok(Self {
            client: Client::wrap(connection),
            endpoint: format!("{}/tag", server_url.trim_end_matches('/')),
        })
    }
}

fn transport<E: core::fmt::Debug>(e: E) -> FeederError {
    FeederError::Transport(format!("{:?}", e))
}

impl Authorizer for EspAuthorizer {
    fn authorize(&mut self, uid: &str) -> Result<AccessDecision> {
        let body = TagReport::new(uid).to_json()?;
        let content_length = body.len().to_string();
        let headers = [
            ("content-type", "application/json"),
            ("content-length", content_length.as_str()),
        ];

        debug!("POST {} uid={}", self.endpoint, uid);
        let mut request = self
            .client
            .request(Method::Post, &self.endpoint, &headers)
            .map_err(transport)?;
        request.write_all(&body).map_err(transport)?;
        request.flush().map_err(transport)?;

        let mut response = request.submit().map_err(transport)?;
        let status = response.status();
        info!("HTTP POST Status = {}", status);

        let mut buf = [0u8; MAX_BODY_LEN];
        let mut len = 0;
        while len < buf.len() {
            let n = response.read(&mut buf[len..]).map_err(transport)?;
            if n == 0 {
                break;
            }
            len += n;
        }

        match status {
            200 | 403 => AccessDecision::from_json(&buf[..len]),
            other => Err(FeederError::UnexpectedStatus(other)),
        }
    }
}
