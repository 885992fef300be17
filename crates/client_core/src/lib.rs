//! Client-side core for the bakery admin dashboard.
//!
//! The product store keeps an authoritative in-memory reflection of backend
//! catalog state and mediates every mutation through a [`transport::Transport`];
//! the undo controller wraps logical deletes in a bounded reversal window.
//! Presentation layers hold references to these handles and subscribe to
//! their broadcast events; nothing in this crate is reachable through
//! ambient global state.

pub mod catalog;
pub mod draft;
pub mod error;
pub mod orders;
pub mod session;
pub mod transport;
pub mod undo;

pub use catalog::{CatalogEvent, Product, ProductDraft, ProductStore};
pub use error::StoreError;
pub use orders::{Order, OrderBook, OrderEvent};
pub use session::{AuthSession, FileTokenStore, MemoryTokenStore, StoredSession, TokenStore};
pub use transport::{FilePart, HttpTransport, MissingTransport, Response, SessionEvent, Transport};
pub use undo::{UndoController, UndoEvent, UNDO_WINDOW};
