//! Client runtime for server-driven view trees.
//!
//! A [`Transport`] fetches view payloads, [`normalize`] flattens them into an
//! [`ApplicationSnapshot`](shared::snapshot::ApplicationSnapshot), and the
//! [`Store`] installs or merges them behind an [`Engine`].

pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod store;
pub mod transport;
pub mod view_context;

pub use config::{load_settings, load_settings_from, ClientSettings};
pub use context::{ApplicationContext, EngineRef};
pub use engine::{Engine, EngineOptions, ForestEngine, NoopEngine};
pub use error::{EngineError, TransportError};
pub use normalize::{find_dangling_references, normalize, DanglingReference};
pub use store::{reduce, Store, StoreAction, StorePhase};
pub use transport::{HttpTransport, Transport};
pub use view_context::{CommandHandle, ViewContext};
