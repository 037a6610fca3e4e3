//! Consumer side of the real-time layer.
//!
//! A [`ConnectionManager`] keeps one authenticated connection to the
//! server, reconnects under a bounded [`backoff::ReconnectPolicy`], hands
//! decoded events to its [`Dispatcher`] and records notification-worthy
//! ones in the [`NotificationCache`].

pub mod backoff;
pub mod cache;
pub mod dispatcher;
pub mod emit;
pub mod manager;
pub mod state;
pub mod storage;
pub mod transport;

pub use backoff::{Backoff, ReconnectPolicy};
pub use cache::NotificationCache;
pub use dispatcher::{Dispatched, Dispatcher, Subscription};
pub use manager::ConnectionManager;
pub use state::{ConnectionState, ConnectionStatus};
pub use storage::{ClientStorage, FileStorage, MemoryStorage};
pub use transport::{ChannelConnector, Connector, TransportKind, WsConnector};
