//! Status codes shared by the push channel and the room query endpoints.
//!
//! Both transports carry a numeric `status` field. Only two values carry
//! meaning for the session: `200` (success) and `404` (room or resource not
//! found). Every other value is a failure that must be surfaced to the caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric status code reported by the authority.
///
/// Serializes as a bare number (e.g. `200`), matching the `status` field of
/// every inbound acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub u16);

/// How a [`Status`] is interpreted by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// `200`: the request succeeded.
    Ok,
    /// `404`: the room (or the requested resource) does not exist.
    NotFound,
    /// Anything else: a failure the caller must surface.
    Failure,
}

impl Status {
    /// `200 OK`.
    pub const OK: Status = Status(200);
    /// `404 Not Found`.
    pub const NOT_FOUND: Status = Status(404);

    /// Returns the raw numeric code.
    pub fn code(self) -> u16 {
        self.0
    }

    /// Classify this status code.
    pub fn class(self) -> StatusClass {
        match self.0 {
            200 => StatusClass::Ok,
            404 => StatusClass::NotFound,
            _ => StatusClass::Failure,
        }
    }

    /// Returns `true` for `200`.
    pub fn is_ok(self) -> bool {
        self.class() == StatusClass::Ok
    }

    /// Returns `true` for `404`.
    pub fn is_not_found(self) -> bool {
        self.class() == StatusClass::NotFound
    }

    /// Returns a human-readable description of this status code.
    ///
    /// The authority usually sends its own `message` alongside the status;
    /// this text is the fallback when that message is empty.
    pub fn description(self) -> &'static str {
        match self.0 {
            200 => "The request succeeded.",
            400 => "The request was rejected as malformed. Check the room code and try again.",
            403 => "You are not allowed to perform this action in this room.",
            404 => {
                "The room could not be found. It may have been closed or the code is incorrect."
            }
            409 => "The room is not accepting this request right now (full or already playing).",
            429 => "Too many requests in a short time. Please slow down and try again later.",
            500..=599 => "The game server ran into a problem. Please try again in a few moments.",
            _ => "The game server returned an unexpected status.",
        }
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Self(code)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
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
    fn classifies_known_codes() {
        assert_eq!(Status(200).class(), StatusClass::Ok);
        assert_eq!(Status(404).class(), StatusClass::NotFound);
        assert_eq!(Status(409).class(), StatusClass::Failure);
        assert_eq!(Status(500).class(), StatusClass::Failure);
        assert_eq!(Status(201).class(), StatusClass::Failure);
    }

    #[test]
    fn serializes_as_bare_number() {
        assert_eq!(serde_json::to_string(&Status::NOT_FOUND).unwrap(), "404");
        let status: Status = serde_json::from_str("200").unwrap();
        assert!(status.is_ok());
    }

    #[test]
    fn every_code_has_a_description() {
        for code in [200, 400, 403, 404, 409, 429, 500, 503, 418] {
            assert!(!Status(code).description().is_empty());
        }
    }
}
