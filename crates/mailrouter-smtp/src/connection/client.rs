//! Type-state SMTP client.

use super::{ServerInfo, SmtpStream};
use crate::auth::{Credentials, cram_md5_response, plain_response};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::parser::{is_last_reply_line, parse_reply};
use crate::types::{Address, AuthMechanism, Extension, Reply, ReplyCode};
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::debug;

/// Type-state marker for connected state.
#[derive(Debug)]
pub struct Connected;

/// Type-state marker for authenticated state.
#[derive(Debug)]
pub struct Authenticated;

/// Type-state marker for mail transaction started.
#[derive(Debug)]
pub struct MailTransaction;

/// Type-state marker for recipient added.
#[derive(Debug)]
pub struct RecipientAdded;

/// Type-state marker for data mode.
#[derive(Debug)]
pub struct Data;

/// SMTP client with type-state pattern.
#[derive(Debug)]
pub struct Client<State> {
    stream: SmtpStream,
    server_info: ServerInfo,
    _state: PhantomData<State>,
}

/// Connection trait for all states.
pub trait SmtpConnection {
    /// Returns the server information.
    fn server_info(&self) -> &ServerInfo;
}

impl<S> SmtpConnection for Client<S> {
    fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }
}

impl Client<Connected> {
    /// Creates a client from a stream and reads the server greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the greeting fails or if the server returns an error.
    pub async fn from_stream(mut stream: SmtpStream) -> Result<Self> {
        let greeting = expect_success(read_reply(&mut stream).await?)?;

        let hostname = greeting
            .message
            .first()
            .and_then(|msg| msg.split_whitespace().next())
            .unwrap_or("unknown")
            .to_string();

        Ok(Self {
            stream,
            server_info: ServerInfo {
                hostname,
                extensions: HashSet::new(),
                legacy_helo: false,
            },
            _state: PhantomData,
        })
    }

    /// Greets the server with EHLO, falling back to HELO when EHLO is
    /// refused with a permanent error.
    ///
    /// # Errors
    ///
    /// Returns an error if both greetings fail.
    pub async fn hello(mut self, client_hostname: &str) -> Result<Self> {
        let reply = self
            .send_command(Command::Ehlo {
                hostname: client_hostname.to_string(),
            })
            .await?;

        if reply.is_success() {
            // First line is the server's own name.
            self.server_info.extensions = reply
                .message
                .iter()
                .skip(1)
                .map(|line| Extension::parse(line))
                .collect();
            return Ok(self);
        }

        if !reply.is_permanent_error() {
            return Err(reply_error(&reply));
        }

        debug!(
            host = %self.stream.host(),
            code = %reply.code,
            "EHLO refused, retrying with HELO"
        );
        expect_success(
            self.send_command(Command::Helo {
                hostname: client_hostname.to_string(),
            })
            .await?,
        )?;
        self.server_info.extensions.clear();
        self.server_info.legacy_helo = true;
        Ok(self)
    }

    /// Authenticates with the given credentials.
    ///
    /// PLAIN credentials are only sent when the host they are bound to is
    /// the host this connection was opened to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WrongHost`] for PLAIN credentials bound elsewhere,
    /// [`Error::NotSupported`] if the server did not advertise AUTH, or the
    /// server's error reply.
    pub async fn authenticate(mut self, credentials: &Credentials) -> Result<Client<Authenticated>> {
        if self.server_info.auth_mechanisms().is_empty() {
            return Err(Error::NotSupported("AUTH".into()));
        }

        match credentials {
            Credentials::Plain {
                username,
                password,
                host,
            } => {
                if !host.eq_ignore_ascii_case(self.stream.host()) {
                    return Err(Error::WrongHost {
                        expected: host.clone(),
                        actual: self.stream.host().to_string(),
                    });
                }
                expect_success(
                    self.send_command(Command::Auth {
                        mechanism: AuthMechanism::Plain,
                        initial_response: Some(plain_response(username, password)),
                    })
                    .await?,
                )?;
            }
            Credentials::CramMd5 { username, password } => {
                let challenge = self
                    .send_command(Command::Auth {
                        mechanism: AuthMechanism::CramMd5,
                        initial_response: None,
                    })
                    .await?;
                if challenge.code != ReplyCode::AUTH_CONTINUE {
                    return Err(reply_error(&challenge));
                }
                let response =
                    cram_md5_response(username, password, &challenge.message_text())?;
                expect_success(
                    self.send_command(Command::AuthResponse { response })
                        .await?,
                )?;
            }
        }

        debug!(host = %self.stream.host(), ?credentials, "authenticated");
        Ok(self.transition())
    }

    /// Starts a mail transaction without authentication.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.start_transaction(from).await?;
        Ok(self.transition())
    }
}

impl Client<Authenticated> {
    /// Starts a mail transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the MAIL FROM command fails.
    pub async fn mail_from(mut self, from: Address) -> Result<Client<MailTransaction>> {
        self.start_transaction(from).await?;
        Ok(self.transition())
    }
}

impl Client<MailTransaction> {
    /// Adds a recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Client<RecipientAdded>> {
        expect_success(self.send_command(Command::RcptTo { to }).await?)?;
        Ok(self.transition())
    }
}

impl Client<RecipientAdded> {
    /// Adds another recipient to the transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the RCPT TO command fails.
    pub async fn rcpt_to(mut self, to: Address) -> Result<Self> {
        expect_success(self.send_command(Command::RcptTo { to }).await?)?;
        Ok(self)
    }

    /// Begins sending message data.
    ///
    /// # Errors
    ///
    /// Returns an error if the DATA command fails.
    pub async fn data(mut self) -> Result<Client<Data>> {
        let reply = self.send_command(Command::Data).await?;
        if reply.code != ReplyCode::START_DATA {
            return Err(reply_error(&reply));
        }
        Ok(self.transition())
    }
}

impl Client<Data> {
    /// Sends the message content and completes the transaction.
    ///
    /// The bytes are relayed as-is apart from CRLF normalization and
    /// dot-stuffing. The terminating "." line is added automatically.
    ///
    /// # Errors
    ///
    /// Returns an error if sending the message fails or server rejects it.
    pub async fn send_message(mut self, message: &[u8]) -> Result<Client<Connected>> {
        let body = message.strip_suffix(b"\n").unwrap_or(message);
        let body = body.strip_suffix(b"\r").unwrap_or(body);

        if !body.is_empty() {
            for line in body.split(|&b| b == b'\n') {
                let line = line.strip_suffix(b"\r").unwrap_or(line);
                if line.first() == Some(&b'.') {
                    self.stream.write_all(b".").await?;
                }
                self.stream.write_all(line).await?;
                self.stream.write_all(b"\r\n").await?;
            }
        }

        self.stream.write_all(b".\r\n").await?;

        expect_success(read_reply(&mut self.stream).await?)?;
        Ok(self.transition())
    }
}

impl<S> Client<S> {
    fn transition<T>(self) -> Client<T> {
        Client {
            stream: self.stream,
            server_info: self.server_info,
            _state: PhantomData,
        }
    }

    async fn start_transaction(&mut self, from: Address) -> Result<()> {
        expect_success(self.send_command(Command::MailFrom { from }).await?)?;
        Ok(())
    }

    async fn send_command(&mut self, cmd: Command) -> Result<Reply> {
        debug!(host = %self.stream.host(), "C: {}", cmd.redacted());
        self.stream.write_all(&cmd.serialize()).await?;
        read_reply(&mut self.stream).await
    }

    /// Sends QUIT and closes the connection (available in any state).
    ///
    /// # Errors
    ///
    /// Returns an error if the QUIT command fails.
    pub async fn quit(mut self) -> Result<()> {
        let reply = self.send_command(Command::Quit).await?;
        if !reply.is_success() {
            return Err(reply_error(&reply));
        }
        Ok(())
    }
}

async fn read_reply(stream: &mut SmtpStream) -> Result<Reply> {
    let mut lines = Vec::new();
    loop {
        let line = stream.read_line().await?;
        let is_last = is_last_reply_line(&line);
        lines.push(line);
        if is_last {
            break;
        }
    }
    parse_reply(&lines)
}

fn reply_error(reply: &Reply) -> Error {
    Error::rejected(reply.code.as_u16(), reply.message_text())
}

fn expect_success(reply: Reply) -> Result<Reply> {
    if reply.is_success() {
        Ok(reply)
    } else {
        Err(reply_error(&reply))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    fn stream(mock: tokio_test::io::Mock) -> SmtpStream {
        SmtpStream::new(mock, "relay.internal")
    }

    #[tokio::test]
    async fn test_full_anonymous_submission() {
        let mock = Builder::new()
            .read(b"220 relay.internal ESMTP\r\n")
            .write(b"EHLO router.local\r\n")
            .read(b"250-relay.internal\r\n250-SIZE 1000\r\n250 8BITMIME\r\n")
            .write(b"MAIL FROM:<a@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<b@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<c@example.com>\r\n")
            .read(b"250 OK\r\n")
            .write(b"DATA\r\n")
            .read(b"354 go ahead\r\n")
            .write(b"Subject: hi\r\n\r\n..leading dot\r\nbody\r\n.\r\n")
            .read(b"250 queued\r\n")
            .write(b"QUIT\r\n")
            .read(b"221 bye\r\n")
            .build();

        let client = Client::from_stream(stream(mock)).await.unwrap();
        assert_eq!(client.server_info().hostname, "relay.internal");

        let client = client.hello("router.local").await.unwrap();
        let extensions = &client.server_info().extensions;
        assert!(extensions.contains(&Extension::Size(Some(1000))));
        assert!(extensions.contains(&Extension::EightBitMime));

        let client = client
            .mail_from(Address::new("a@example.com").unwrap())
            .await
            .unwrap()
            .rcpt_to(Address::new("b@example.com").unwrap())
            .await
            .unwrap()
            .rcpt_to(Address::new("c@example.com").unwrap())
            .await
            .unwrap()
            .data()
            .await
            .unwrap();
        let client = client
            .send_message(b"Subject: hi\n\n.leading dot\nbody\n")
            .await
            .unwrap();
        client.quit().await.unwrap();
    }

    #[tokio::test]
    async fn test_ehlo_falls_back_to_helo() {
        let mock = Builder::new()
            .read(b"220 old.host\r\n")
            .write(b"EHLO router.local\r\n")
            .read(b"502 what?\r\n")
            .write(b"HELO router.local\r\n")
            .read(b"250 old.host\r\n")
            .build();

        let client = Client::from_stream(stream(mock)).await.unwrap();
        let client = client.hello("router.local").await.unwrap();
        assert!(client.server_info().legacy_helo);
        assert!(client.server_info().extensions.is_empty());
    }

    #[tokio::test]
    async fn test_ehlo_transient_error_does_not_fall_back() {
        let mock = Builder::new()
            .read(b"220 busy.host\r\n")
            .write(b"EHLO router.local\r\n")
            .read(b"421 try later\r\n")
            .build();

        let client = Client::from_stream(stream(mock)).await.unwrap();
        let err = client.hello("router.local").await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_auth_plain() {
        let mock = Builder::new()
            .read(b"220 relay.internal\r\n")
            .write(b"EHLO router.local\r\n")
            .read(b"250-relay.internal\r\n250 AUTH PLAIN CRAM-MD5\r\n")
            .write(b"AUTH PLAIN AHVzZXIAcGFzcw==\r\n")
            .read(b"235 ok\r\n")
            .build();

        let client = Client::from_stream(stream(mock))
            .await
            .unwrap()
            .hello("router.local")
            .await
            .unwrap();
        let creds = Credentials::plain("user", "pass", "relay.internal");
        client.authenticate(&creds).await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_plain_refuses_other_host() {
        let mock = Builder::new()
            .read(b"220 relay.internal\r\n")
            .write(b"EHLO router.local\r\n")
            .read(b"250-relay.internal\r\n250 AUTH PLAIN\r\n")
            .build();

        let client = Client::from_stream(stream(mock))
            .await
            .unwrap()
            .hello("router.local")
            .await
            .unwrap();
        let creds = Credentials::plain("user", "pass", "elsewhere.example");
        let err = client.authenticate(&creds).await.unwrap_err();
        assert!(matches!(err, Error::WrongHost { .. }));
    }

    #[tokio::test]
    async fn test_auth_cram_md5() {
        let mock = Builder::new()
            .read(b"220 relay.internal\r\n")
            .write(b"EHLO router.local\r\n")
            .read(b"250-relay.internal\r\n250 AUTH CRAM-MD5\r\n")
            .write(b"AUTH CRAM-MD5\r\n")
            .read(b"334 PDE4OTYuNjk3MTcwOTUyQHBvc3RvZmZpY2UucmVzdG9uLm1jaS5uZXQ+\r\n")
            .write(b"dGltIGI5MTNhNjAyYzdlZGE3YTQ5NWI0ZTZlNzMzNGQzODkw\r\n")
            .read(b"235 ok\r\n")
            .build();

        let client = Client::from_stream(stream(mock))
            .await
            .unwrap()
            .hello("router.local")
            .await
            .unwrap();
        let creds = Credentials::cram_md5("tim", "tanstaaftanstaaf");
        client.authenticate(&creds).await.unwrap();
    }

    #[tokio::test]
    async fn test_auth_without_advertisement() {
        let mock = Builder::new()
            .read(b"220 relay.internal\r\n")
            .write(b"EHLO router.local\r\n")
            .read(b"250 relay.internal\r\n")
            .build();

        let client = Client::from_stream(stream(mock))
            .await
            .unwrap()
            .hello("router.local")
            .await
            .unwrap();
        let creds = Credentials::cram_md5("tim", "secret");
        let err = client.authenticate(&creds).await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(_)));
    }

    #[tokio::test]
    async fn test_rejected_recipient() {
        let mock = Builder::new()
            .read(b"220 relay.internal\r\n")
            .write(b"MAIL FROM:<>\r\n")
            .read(b"250 OK\r\n")
            .write(b"RCPT TO:<nobody@example.com>\r\n")
            .read(b"550 no such user\r\n")
            .build();

        let client = Client::from_stream(stream(mock)).await.unwrap();
        let client = client.mail_from(Address::null()).await.unwrap();
        let err = client
            .rcpt_to(Address::new("nobody@example.com").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_bad_greeting() {
        let mock = Builder::new().read(b"554 go away\r\n").build();
        let err = Client::from_stream(stream(mock)).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn test_server_hangs_up_mid_reply() {
        let mock = Builder::new().read(b"220-relay.internal\r\n").build();
        let err = Client::from_stream(stream(mock)).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionClosed));
    }

    #[tokio::test]
    async fn test_greeting_with_non_ascii_after_code() {
        let mock = Builder::new()
            .read("220éhello\r\n220 ready\r\n".as_bytes())
            .build();
        let err = Client::from_stream(stream(mock)).await.unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }
}
