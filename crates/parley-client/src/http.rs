//! Room lookup over HTTP.

use async_trait::async_trait;
use parley_core::{Credential, ParticipantPair, RoomName};
use serde::Deserialize;

use crate::{ClientError, RoomLookup};

/// Authenticated room-name lookup against the chat API.
pub struct HttpRoomLookup {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
}

/// Response body of the room-name endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomNameResponse {
    room_name: String,
}

impl HttpRoomLookup {
    /// Create a lookup against `base_url`, authenticated by `credential`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
        }
    }
}

#[async_trait]
impl RoomLookup for HttpRoomLookup {
    async fn room_name(&self, pair: ParticipantPair) -> Result<RoomName, ClientError> {
        let url = format!("{}/api/getRoomName/{}/{}", self.base_url, pair.lo(), pair.hi());

        let response = self
            .client
            .get(&url)
            .header(Credential::HEADER, self.credential.bearer())
            .send()
            .await
            .map_err(|e| ClientError::Lookup { reason: e.to_string() })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Lookup { reason: format!("unexpected status {status}") });
        }

        let body: RoomNameResponse =
            response.json().await.map_err(|e| ClientError::Lookup { reason: e.to_string() })?;

        Ok(RoomName::new(body.room_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_normalized() {
        let lookup = HttpRoomLookup::new("http://localhost:8060/", Credential::new("t"));
        assert_eq!(lookup.base_url, "http://localhost:8060");
    }
}
