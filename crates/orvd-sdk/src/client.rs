//! Vehicle client for the signed `/api/*` endpoints.

use anyhow::{Context, Result};
use orvd_core::crypto::{KeyPair, PublicKey};
use orvd_core::wire::Message;
use reqwest::Url;

/// Client for one vehicle identity.
pub struct VehicleClient {
    pub(crate) base_url: String,
    pub(crate) id: String,
    keys: KeyPair,
    server_key: Option<PublicKey>,
    pub(crate) client: reqwest::Client,
}

/// A relay reply with its signature checked against the pinned server key.
#[derive(Debug, Clone)]
pub struct SignedReply {
    pub status: u16,
    pub message: Message,
    /// False when no server key is pinned yet or the signature does not match
    pub verified: bool,
}

impl SignedReply {
    pub fn parse(status: u16, text: &str, server_key: Option<&PublicKey>) -> Self {
        let message = Message::parse(text);
        let verified = server_key.map(|key| message.verify(key)).unwrap_or(false);
        Self {
            status,
            message,
            verified,
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Value of the `$tag` segment, e.g. `get("Arm")` on `$Arm 0$Delay 1`.
    pub fn get(&self, tag: &str) -> Option<String> {
        self.message.get(tag)
    }

    pub fn body(&self) -> &str {
        &self.message.body
    }
}

/// Server key from a `$Key: {n} {e}` reply.
pub fn parse_key_reply(text: &str) -> Result<PublicKey> {
    let value = Message::parse(text)
        .get("Key:")
        .with_context(|| format!("not a key reply: {}", text))?;
    let mut parts = value.split_whitespace();
    let (Some(n), Some(e)) = (parts.next(), parts.next()) else {
        anyhow::bail!("malformed key reply: {}", text);
    };
    Ok(PublicKey::from_hex(n, e)?)
}

/// `{base}{path}?{query}&sig=0x..` where the signature covers `{path}?{query}`.
pub fn signed_url(base: &str, path: &str, pairs: &[(&str, &str)], keys: &KeyPair) -> Result<Url> {
    let mut url = Url::parse(&format!("{}{}", base.trim_end_matches('/'), path))?;
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in pairs {
            query.append_pair(key, value);
        }
    }
    let canonical = format!("{}?{}", path, url.query().unwrap_or_default());
    let sig = keys.sign_hex(&canonical);
    url.query_pairs_mut()
        .append_pair("sig", &format!("0x{}", sig));
    Ok(url)
}

impl VehicleClient {
    /// Create a client for `id` signing with `keys`.
    pub fn new(base_url: impl Into<String>, id: impl Into<String>, keys: KeyPair) -> Self {
        Self {
            base_url: base_url.into(),
            id: id.into(),
            keys,
            server_key: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn server_key(&self) -> Option<&PublicKey> {
        self.server_key.as_ref()
    }

    /// Register our public key and pin the relay's.
    pub async fn exchange_keys(&mut self) -> Result<()> {
        let mut url = Url::parse(&format!("{}/api/key", self.base_url.trim_end_matches('/')))?;
        url.query_pairs_mut()
            .append_pair("id", &self.id)
            .append_pair("n", &self.keys.public().n_hex())
            .append_pair("e", &self.keys.public().e_hex());

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Key exchange failed: {}", response.status());
        }
        let text = response.text().await?;
        self.server_key = Some(parse_key_reply(&text)?);
        tracing::debug!("Pinned relay key for {}", self.id);
        Ok(())
    }

    pub(crate) async fn signed_get(&self, path: &str, extra: &[(&str, &str)]) -> Result<SignedReply> {
        let mut pairs = vec![("id", self.id.as_str())];
        pairs.extend_from_slice(extra);
        let url = signed_url(&self.base_url, path, &pairs, &self.keys)?;

        let response = self.client.get(url).send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        let reply = SignedReply::parse(status, &text, self.server_key.as_ref());
        if !reply.verified {
            tracing::warn!("Unverified reply from {}: {}", path, text);
        }
        Ok(reply)
    }

    pub async fn auth(&self) -> Result<SignedReply> {
        self.signed_get("/api/auth", &[]).await
    }

    /// Blocks until an operator decides on the arm request.
    pub async fn arm(&self) -> Result<SignedReply> {
        self.signed_get("/api/arm", &[]).await
    }

    pub async fn fly_accept(&self) -> Result<SignedReply> {
        self.signed_get("/api/fly_accept", &[]).await
    }

    pub async fn flight_info(&self) -> Result<SignedReply> {
        self.signed_get("/api/flight_info", &[]).await
    }

    pub async fn kill_switch(&self) -> Result<SignedReply> {
        self.signed_get("/api/kill_switch", &[]).await
    }

    /// The accepted mission as `$FlightMission ...`.
    pub async fn fmission_kos(&self) -> Result<SignedReply> {
        self.signed_get("/api/fmission_kos", &[]).await
    }

    pub async fn get_all_forbidden_zones(&self) -> Result<SignedReply> {
        self.signed_get("/api/get_all_forbidden_zones", &[]).await
    }

    pub async fn get_forbidden_zones_delta(&self) -> Result<SignedReply> {
        self.signed_get("/api/get_forbidden_zones_delta", &[]).await
    }

    pub async fn forbidden_zones_hash(&self) -> Result<SignedReply> {
        self.signed_get("/api/forbidden_zones_hash", &[]).await
    }

    /// Submit a revised mission in compact form and wait for the operator.
    pub async fn revise_mission(&self, mission: &str) -> Result<SignedReply> {
        self.signed_get("/api/nmission", &[("mission", mission)]).await
    }

    pub async fn send_log(&self, log: &str) -> Result<SignedReply> {
        self.signed_get("/api/logs", &[("log", log)]).await
    }
}
