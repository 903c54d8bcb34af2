//! Value objects: immutable, identity-free building blocks of messages.

mod delivery_mode;
mod recipients;
mod sender;

pub use delivery_mode::{ClassifyError, DeliveryMode};
pub use recipients::{
    MessageRecipients, RecipientInput, RecipientToken, Recipients, BROADCAST_MARKER,
};
pub use sender::{Sender, SenderKind};
