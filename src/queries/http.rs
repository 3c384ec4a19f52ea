//! Room queries over the authority's HTTP endpoints, using `reqwest`.
//!
//! | Call                | Endpoint                      | Body                   |
//! |---------------------|-------------------------------|------------------------|
//! | room status         | `POST /gameHost/gameStatus`   | `{roomId, clientId}`   |
//! | host status         | `POST /gameHost/checkMyRoom`  | `{roomId, clientId}`   |

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::SpyWordConfig;
use crate::error::{Result, SpyWordError};
use crate::protocol::{
    ConnectionId, GameStatusResponse, HostStatusResponse, RoomId, RoomPhase, RoomQueryRequest,
};
use crate::query::{HostStatus, RoomQuery, RoomStatus};
use crate::status::{Status, StatusClass};

const GAME_STATUS_PATH: &str = "gameHost/gameStatus";
const CHECK_MY_ROOM_PATH: &str = "gameHost/checkMyRoom";

/// [`RoomQuery`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpRoomQuery {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRoomQuery {
    /// Build a client for `config.base_address` with `config.request_timeout`
    /// applied to every call.
    ///
    /// # Errors
    ///
    /// Returns [`SpyWordError::QueryTransport`] if the HTTP client cannot be built.
    pub fn new(config: &SpyWordConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SpyWordError::QueryTransport(e.to_string()))?;
        Ok(Self::with_client(http, &config.base_address))
    }

    /// Use a preconfigured `reqwest::Client` (proxies, headers, TLS).
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// POST the query body. `Ok(None)` means the authority answered 404.
    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<Option<T>> {
        let url = self.url(path);
        let body = RoomQueryRequest {
            room_id: room_id.clone(),
            client_id: connection_id.clone(),
        };
        debug!(url = %url, room_id = %room_id, "room query");

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = Status(resp.status().as_u16());
        match status.class() {
            StatusClass::Ok => resp.json::<T>().await.map(Some).map_err(from_reqwest),
            StatusClass::NotFound => Ok(None),
            StatusClass::Failure => {
                warn!(url = %url, status = %status, "room query failed");
                Err(SpyWordError::QueryStatus { status })
            }
        }
    }
}

fn from_reqwest(e: reqwest::Error) -> SpyWordError {
    if e.is_timeout() {
        SpyWordError::Timeout
    } else {
        SpyWordError::QueryTransport(e.to_string())
    }
}

#[async_trait]
impl RoomQuery for HttpRoomQuery {
    async fn query_room_status(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<RoomStatus> {
        let resp: Option<GameStatusResponse> =
            self.post(GAME_STATUS_PATH, room_id, connection_id).await?;
        Ok(match resp {
            Some(resp) => RoomStatus::present(RoomPhase::from_game_status(resp.res_data.game_status)),
            None => RoomStatus::absent(),
        })
    }

    async fn query_host_status(
        &self,
        room_id: &RoomId,
        connection_id: &ConnectionId,
    ) -> Result<HostStatus> {
        let resp: Option<HostStatusResponse> =
            self.post(CHECK_MY_ROOM_PATH, room_id, connection_id).await?;
        match resp {
            Some(resp) => Ok(HostStatus {
                is_host: resp.res_data.is_host,
            }),
            None => Err(SpyWordError::RoomNotFound),
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_is_dropped_from_base() {
        let query = HttpRoomQuery::with_client(reqwest::Client::new(), "http://localhost:8000/");
        assert_eq!(
            query.url(GAME_STATUS_PATH),
            "http://localhost:8000/gameHost/gameStatus"
        );
    }

    #[tokio::test]
    async fn unreachable_authority_is_a_transport_error() {
        let config = SpyWordConfig::new("http://127.0.0.1:1")
            .with_request_timeout(std::time::Duration::from_secs(2));
        let query = HttpRoomQuery::new(&config).unwrap();

        let err = query
            .query_room_status(&RoomId::parse("ABC123").unwrap(), &ConnectionId::new("c"))
            .await
            .unwrap_err();
        assert!(err.is_transport(), "got {err:?}");
        assert!(!err.is_room_absent());
    }
}
