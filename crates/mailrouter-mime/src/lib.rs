//! # mailrouter-mime
//!
//! Just enough RFC 5322 / RFC 2047 to route a message: the header section
//! is parsed (with folding), and encoded words in header values are
//! decoded. Bodies are never touched; the router relays them verbatim.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailrouter_mime::Message;
//!
//! let raw = b"From: sender@example.com\r\n\
//!             Subject: =?utf-8?Q?Caf=C3=A9?= menu\r\n\
//!             \r\n\
//!             Hello";
//!
//! let message = Message::parse(raw)?;
//! assert_eq!(message.subject(), "Café menu");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod error;
mod header;
mod message;

pub mod encoding;

pub use error::{Error, Result};
pub use message::Message;
