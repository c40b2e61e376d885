//! Collaborators of the export pipeline
pub mod dispatcher;
pub mod log_writer;
pub mod nats;
pub mod order_store;
pub mod pipeline;
pub mod relay;

pub use dispatcher::{EventDispatcher, OrderEventHandler};
pub use log_writer::{FileLogWriter, LogSink};
pub use order_store::{InMemoryOrderStore, OrderStore, WooCommerceOrderStore};
pub use relay::{token_provider, CachedTokenProvider, HttpRelay, PasswordGrantClient, Relay, RelayReceipt, TokenProvider};
