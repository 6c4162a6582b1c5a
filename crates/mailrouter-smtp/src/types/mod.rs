//! Core SMTP types shared by the client and the inbound listener.

mod address;
mod extension;
mod reply;

pub use address::Address;
pub use extension::{AuthMechanism, Extension};
pub use reply::{Reply, ReplyClass, ReplyCode};
