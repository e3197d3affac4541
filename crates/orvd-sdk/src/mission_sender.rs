//! Mission sender client: key exchange and WPL upload.

use anyhow::Result;
use orvd_core::crypto::{KeyPair, PublicKey};
use reqwest::Url;

use crate::client::{parse_key_reply, SignedReply};

pub struct MissionSenderClient {
    base_url: String,
    id: String,
    keys: KeyPair,
    server_key: Option<PublicKey>,
    client: reqwest::Client,
}

impl MissionSenderClient {
    pub fn new(base_url: impl Into<String>, id: impl Into<String>, keys: KeyPair) -> Self {
        Self {
            base_url: base_url.into(),
            id: id.into(),
            keys,
            server_key: None,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(Url::parse(&format!("{}{}", self.base_url.trim_end_matches('/'), path))?)
    }

    /// Ask the relay to create this sender's key and pin the relay key.
    pub async fn exchange_keys(&mut self) -> Result<()> {
        let mut url = self.url("/mission_sender/key")?;
        url.query_pairs_mut().append_pair("id", &self.id);
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Key exchange failed: {}", response.status());
        }
        self.server_key = Some(parse_key_reply(&response.text().await?)?);
        Ok(())
    }

    /// Upload a QGC WPL 110 file for vehicle `vehicle_id`.
    ///
    /// The reply body is `Mission accepted.` or the parser's status string.
    pub async fn upload_mission(&self, vehicle_id: &str, wpl: &str) -> Result<SignedReply> {
        let mut url = self.url("/mission_sender/fmission_ms")?;
        let sig = self.keys.sign_hex(wpl);
        url.query_pairs_mut()
            .append_pair("id", vehicle_id)
            .append_pair("sig", &format!("0x{}", sig));

        let response = self
            .client
            .post(url)
            .header("content-type", "text/plain")
            .body(wpl.to_string())
            .send()
            .await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        Ok(SignedReply::parse(status, &text, self.server_key.as_ref()))
    }
}
