// hublink-client: Async client for SignalR-style JSON hub endpoints

pub mod connection;
pub mod error;
pub mod negotiate;
pub mod protocol;
pub mod reconnect;
pub mod transport;

pub use connection::{ConnectionState, EventHandler, HandlerId, HubConfig, HubConnection};
pub use error::Error;
pub use reconnect::{ReconnectPolicy, StartRetry};
pub use transport::{TlsMode, TransportConfig};
