//! charla-session: Conversation state and turn driver
//!
//! This crate owns everything between decoded wire events and a UI: the
//! transcript, the turn lifecycle, the paced character reveal, and the
//! markdown export. It talks to the backend through the [`Transport`]
//! seam and reports every state change over a broadcast channel.

pub mod conversation;
pub mod error;
pub mod events;
pub mod export;
pub mod handle;
pub mod message;
pub mod session;
pub mod transport;
pub mod typewriter;

pub use conversation::{Conversation, Phase};
pub use error::{Error, Result};
pub use events::SessionEvent;
pub use export::ExportError;
pub use handle::SessionHandle;
pub use message::{Message, Sender};
pub use session::{CONNECTION_ERROR, Session, SessionConfig};
pub use transport::{HttpTransport, Transport};
