//! Network Layer
//!
//! Everything that talks to the outside: the stats stores over HTTP and the
//! access gate the host consults before mounting a session. Failures here
//! never reach the scenes.

pub mod access;
pub mod http;
pub mod identity;
pub mod protocol;
pub mod transport;

pub use access::{AccessContext, AccessDenied, Redirect, Requirement};
pub use http::HttpStatsBackend;
pub use identity::Identity;
pub use protocol::{LoadGameResponse, SaveGameRequest};
pub use transport::{Route, StatsBackend, StatsTransport, TransportError};
