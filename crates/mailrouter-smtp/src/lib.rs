//! # mailrouter-smtp
//!
//! The outbound side of mailrouter: a small SMTP submission client
//! implementing the subset of RFC 5321 needed to relay an already
//! accepted message to a downstream server.
//!
//! ## Features
//!
//! - **Type-state connection management**: the compiler rejects
//!   out-of-order commands (no `DATA` before a recipient, and so on)
//! - **Raw relay**: the message bytes are sent as received, only dot-stuffed
//!   and CRLF-normalized
//! - **Authentication**: PLAIN (bound to the dialed host) and CRAM-MD5
//! - **EHLO with HELO fallback** for servers that predate ESMTP
//!
//! Transport encryption is deliberately absent; connections are plain TCP.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailrouter_smtp::{Address, Client, connect};
//!
//! let stream = connect("relay.internal", 25).await?;
//! let client = Client::from_stream(stream).await?.hello("mailrouter.local").await?;
//!
//! let client = client.mail_from(Address::new("sender@example.com")?).await?;
//! let client = client.rcpt_to(Address::new("recipient@example.com")?).await?;
//! let client = client.data().await?;
//! let client = client.send_message(b"Subject: Test\r\n\r\nHello\r\n").await?;
//! client.quit().await?;
//! ```
//!
//! ## Connection States
//!
//! ```text
//! ┌──────────────┐
//! │  Connected   │ ─── authenticate() ───→ Authenticated
//! └──────────────┘
//!        │
//!        └─── mail_from() ───→ MailTransaction ───→ RecipientAdded ───→ Data
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use auth::{Credentials, cram_md5_response, plain_response};
pub use connection::{
    AsyncStream, Authenticated, Client, Connected, Data, MailTransaction, RecipientAdded,
    ServerInfo, SmtpConnection, SmtpStream, connect,
};
pub use error::{Error, Result};
pub use types::{Address, AuthMechanism, Extension, Reply, ReplyClass, ReplyCode};
