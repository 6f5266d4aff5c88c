//! A session-managed MQTT 3.1.1 client: a `Client<T, H>` handle over a transport `T`
//! (`AsyncRead + AsyncWrite + Unpin`), dispatching inbound events to an application-supplied
//! [`ClientHandler`] `H`. See [`ClientOptions`] for connection settings.

mod dispatch;

pub mod client;
pub mod handler;
pub mod options;
pub mod transport;

pub use client::Client;
pub use handler::{ClientHandler, NoopHandler};
pub use options::ClientOptions;
pub use transport::Disconnect;
