//! AG-UI protocol events, run input types and stream encoding.
#![allow(missing_docs)]

mod encoder;
pub mod events;
pub mod types;

pub use encoder::{EncodeError, SseEncoder, StreamEncoder, KEEPALIVE_PACKET};
pub use events::{BaseEvent, Event};
pub use types::{Context, Message, RequestError, Role, RunAgentInput, Tool};
