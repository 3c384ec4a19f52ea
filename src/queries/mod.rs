//! [`RoomQuery`](crate::query::RoomQuery) implementations.
//!
//! | Feature      | Implementation    |
//! |--------------|-------------------|
//! | `query-http` | [`HttpRoomQuery`] |

#[cfg(feature = "query-http")]
pub mod http;

#[cfg(feature = "query-http")]
pub use http::HttpRoomQuery;
