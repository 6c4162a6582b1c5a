//! Inbound SMTP listener.
//!
//! Accepts mail from local clients and hands each completed message to the
//! router. The message is acknowledged with `250` before routing starts, so
//! delivery problems never surface to the submitting client. Deliveries still
//! running at shutdown are awaited before [`serve`] returns.

use anyhow::{Context, bail};
use bytes::Bytes;
use mailrouter_core::{DEFAULT_DELIVERY_TIMEOUT, Envelope, MailRouter, Transport};
use mailrouter_smtp::{Address, Extension, Reply, ReplyCode};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// Name announced in the greeting after the hostname.
pub const APP_NAME: &str = "Mailrouter";

/// Connections silent for this long are closed with `421`.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default cap on the size of one message body.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 25 * 1024 * 1024;

/// Longest line read in one go; longer lines arrive in pieces.
const MAX_LINE_LENGTH: u64 = 64 * 1024;

/// Recipients accepted per transaction.
const MAX_RECIPIENTS: usize = 100;

/// Added to the delivery timeout when waiting for deliveries at shutdown.
pub const DRAIN_MARGIN: Duration = Duration::from_secs(5);

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ListenerSettings {
    /// Name used in the greeting and EHLO reply.
    pub hostname: String,
    /// Largest accepted message, in bytes.
    pub max_message_size: usize,
    /// Idle limit per connection.
    pub idle_timeout: Duration,
    /// How long shutdown waits for deliveries already acknowledged.
    pub drain_timeout: Duration,
}

impl ListenerSettings {
    /// Settings with the default size cap and idle limit.
    #[must_use]
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            idle_timeout: IDLE_TIMEOUT,
            drain_timeout: DEFAULT_DELIVERY_TIMEOUT + DRAIN_MARGIN,
        }
    }
}

/// Accepts connections until `shutdown` resolves, one task per connection.
///
/// Every accepted message is routed on its own task. Once `shutdown`
/// resolves no new connections are taken, sessions still open answer
/// further messages with `421`, and routing already under way gets up to
/// `drain_timeout` to finish.
///
/// # Errors
///
/// Currently infallible once the listener is bound; accept errors are logged
/// and the loop keeps going.
pub async fn serve<T, F>(
    listener: TcpListener,
    router: Arc<MailRouter<T>>,
    settings: Arc<ListenerSettings>,
    shutdown: F,
) -> anyhow::Result<()>
where
    T: Transport + 'static,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    let (deliveries, mut queued) = mpsc::unbounded_channel();
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            () = &mut shutdown => {
                info!("SMTP listener stopping");
                break;
            }
            Some(envelope) = queued.recv() => {
                route(&mut in_flight, &router, envelope);
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                if let Err(err) = joined {
                    warn!(error = %err, "Routing task failed");
                }
            }
            accepted = listener.accept() => {
                let (socket, peer) = match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!(error = %err, "Failed to accept connection");
                        continue;
                    }
                };

                let session = Session::new(socket, peer, deliveries.clone(), Arc::clone(&settings));
                tokio::spawn(async move {
                    if let Err(err) = session.run().await {
                        debug!(%peer, error = %err, "SMTP session ended with error");
                    }
                });
            }
        }
    }

    drop(listener);
    queued.close();
    while let Ok(envelope) = queued.try_recv() {
        route(&mut in_flight, &router, envelope);
    }
    drain(in_flight, settings.drain_timeout).await;
    Ok(())
}

fn route<T>(in_flight: &mut JoinSet<()>, router: &Arc<MailRouter<T>>, envelope: Envelope)
where
    T: Transport + 'static,
{
    let router = Arc::clone(router);
    in_flight.spawn(async move {
        router.handle(envelope).await;
    });
}

async fn drain(mut in_flight: JoinSet<()>, limit: Duration) {
    if in_flight.is_empty() {
        return;
    }
    info!(pending = in_flight.len(), "Waiting for deliveries in progress");

    let finished = timeout(limit, async {
        while let Some(joined) = in_flight.join_next().await {
            if let Err(err) = joined {
                warn!(error = %err, "Routing task failed");
            }
        }
    })
    .await;

    if finished.is_err() {
        warn!(
            abandoned = in_flight.len(),
            "Deliveries still running at shutdown were abandoned"
        );
        in_flight.abort_all();
    }
}

/// One parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Ehlo(String),
    Helo(String),
    Mail { from: Address, size: Option<usize> },
    Rcpt(Address),
    Data,
    Rset,
    Noop,
    Quit,
    Unknown(String),
}

impl Command {
    fn parse(line: &str) -> anyhow::Result<Self> {
        fn prefix_match(line: &str, candidate: &str) -> bool {
            line.len() >= candidate.len()
                && line.as_bytes()[..candidate.len()].eq_ignore_ascii_case(candidate.as_bytes())
        }

        fn domain(arg: &str) -> anyhow::Result<String> {
            let domain = arg.trim();
            if domain.is_empty() {
                bail!("missing domain or address literal");
            }
            Ok(domain.to_string())
        }

        Ok(if line.eq_ignore_ascii_case("QUIT") {
            Self::Quit
        } else if line.eq_ignore_ascii_case("DATA") {
            Self::Data
        } else if line.eq_ignore_ascii_case("RSET") {
            Self::Rset
        } else if line.eq_ignore_ascii_case("NOOP") || prefix_match(line, "NOOP ") {
            Self::Noop
        } else if line.eq_ignore_ascii_case("EHLO") || prefix_match(line, "EHLO ") {
            Self::Ehlo(domain(&line[4..])?)
        } else if line.eq_ignore_ascii_case("HELO") || prefix_match(line, "HELO ") {
            Self::Helo(domain(&line[4..])?)
        } else if prefix_match(line, "MAIL FROM:") {
            let arg = &line[10..];
            Self::Mail {
                from: Address::parse_path(arg)?,
                size: size_param(arg)?,
            }
        } else if prefix_match(line, "RCPT TO:") {
            let to = Address::parse_path(&line[8..])?;
            if to.is_null() {
                bail!("Null sender not permitted as a recipient");
            }
            Self::Rcpt(to)
        } else {
            Self::Unknown(line.to_string())
        })
    }
}

/// Reads the `SIZE=` parameter following a `MAIL FROM:` path.
fn size_param(arg: &str) -> anyhow::Result<Option<usize>> {
    let params = arg.split_once('>').map_or("", |(_, rest)| rest);
    for param in params.split_whitespace() {
        if let Some((key, value)) = param.split_once('=') {
            if key.eq_ignore_ascii_case("SIZE") {
                let size = value
                    .parse()
                    .with_context(|| format!("invalid SIZE value {value:?}"))?;
                return Ok(Some(size));
            }
        }
    }
    Ok(None)
}

/// Sender and recipients collected between `MAIL` and `DATA`.
#[derive(Debug)]
struct Transaction {
    sender: Address,
    recipients: Vec<Address>,
}

enum ReadLine {
    Line,
    Eof,
    TimedOut,
}

enum Body {
    Complete(Vec<u8>),
    TooLarge,
    Eof,
    TimedOut,
}

struct Session<S> {
    stream: BufReader<S>,
    peer: SocketAddr,
    deliveries: mpsc::UnboundedSender<Envelope>,
    settings: Arc<ListenerSettings>,
    transaction: Option<Transaction>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn new(
        stream: S,
        peer: SocketAddr,
        deliveries: mpsc::UnboundedSender<Envelope>,
        settings: Arc<ListenerSettings>,
    ) -> Self {
        Self {
            stream: BufReader::new(stream),
            peer,
            deliveries,
            settings,
            transaction: None,
        }
    }

    async fn reply(&mut self, code: ReplyCode, text: impl Into<String>) -> anyhow::Result<()> {
        self.send(&Reply::single(code, text)).await
    }

    async fn send(&mut self, reply: &Reply) -> anyhow::Result<()> {
        let writer = self.stream.get_mut();
        writer.write_all(reply.to_wire().as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    async fn read_line(&mut self, buf: &mut Vec<u8>) -> anyhow::Result<ReadLine> {
        buf.clear();
        let mut limited = (&mut self.stream).take(MAX_LINE_LENGTH);
        match timeout(self.settings.idle_timeout, limited.read_until(b'\n', buf)).await {
            Err(_) => Ok(ReadLine::TimedOut),
            Ok(Ok(0)) => Ok(ReadLine::Eof),
            Ok(Ok(_)) => Ok(ReadLine::Line),
            Ok(Err(err)) => Err(err.into()),
        }
    }

    async fn run(mut self) -> anyhow::Result<()> {
        debug!(peer = %self.peer, "SMTP session started");
        let greeting = format!("{} {APP_NAME} ESMTP Service ready", self.settings.hostname);
        self.reply(ReplyCode::SERVICE_READY, greeting).await?;

        let mut buf = Vec::new();
        loop {
            match self.read_line(&mut buf).await? {
                ReadLine::Line => {}
                ReadLine::Eof => {
                    debug!(peer = %self.peer, "client disconnected");
                    return Ok(());
                }
                ReadLine::TimedOut => return self.close_idle().await,
            }

            let line = String::from_utf8_lossy(&buf);
            let line = line.trim_end_matches(['\r', '\n']);

            match Command::parse(line) {
                Err(err) => {
                    self.reply(
                        ReplyCode::PARAMETER_ERROR,
                        format!("Syntax error in command or arguments: {err}"),
                    )
                    .await?;
                }
                Ok(Command::Quit) => {
                    let text = format!("{} closing connection", self.settings.hostname);
                    self.reply(ReplyCode::CLOSING, text).await?;
                    return Ok(());
                }
                Ok(Command::Ehlo(domain)) => {
                    self.transaction = None;
                    let reply = Reply::new(
                        ReplyCode::OK,
                        vec![
                            format!("{} greets {domain}", self.settings.hostname),
                            Extension::EightBitMime.to_ehlo_line(),
                            Extension::Size(Some(self.settings.max_message_size)).to_ehlo_line(),
                        ],
                    );
                    self.send(&reply).await?;
                }
                Ok(Command::Helo(domain)) => {
                    self.transaction = None;
                    let text = format!("{} greets {domain}", self.settings.hostname);
                    self.reply(ReplyCode::OK, text).await?;
                }
                Ok(Command::Mail { from, size }) => self.mail(from, size).await?,
                Ok(Command::Rcpt(to)) => self.rcpt(to).await?,
                Ok(Command::Data) => {
                    if !self.data().await? {
                        return Ok(());
                    }
                }
                Ok(Command::Rset) => {
                    self.transaction = None;
                    self.reply(ReplyCode::OK, "OK").await?;
                }
                Ok(Command::Noop) => self.reply(ReplyCode::OK, "OK").await?,
                Ok(Command::Unknown(cmd)) => {
                    debug!(peer = %self.peer, command = %cmd, "unrecognized command");
                    self.reply(ReplyCode::NOT_IMPLEMENTED, "Command not implemented")
                        .await?;
                }
            }
        }
    }

    async fn close_idle(&mut self) -> anyhow::Result<()> {
        debug!(peer = %self.peer, "closing idle connection");
        self.reply(ReplyCode::SERVICE_UNAVAILABLE, "Idle timeout, closing connection")
            .await
    }

    async fn mail(&mut self, from: Address, size: Option<usize>) -> anyhow::Result<()> {
        if self.transaction.is_some() {
            return self
                .reply(ReplyCode::BAD_SEQUENCE, "Nested MAIL command")
                .await;
        }
        if size.is_some_and(|size| size > self.settings.max_message_size) {
            return self
                .reply(
                    ReplyCode::EXCEEDED_STORAGE,
                    "Message size exceeds fixed maximum message size",
                )
                .await;
        }

        self.transaction = Some(Transaction {
            sender: from,
            recipients: Vec::new(),
        });
        self.reply(ReplyCode::OK, "Sender OK").await
    }

    async fn rcpt(&mut self, to: Address) -> anyhow::Result<()> {
        let Some(transaction) = self.transaction.as_mut() else {
            return self
                .reply(ReplyCode::BAD_SEQUENCE, "Need MAIL command first")
                .await;
        };
        if transaction.recipients.len() >= MAX_RECIPIENTS {
            return self
                .reply(ReplyCode::INSUFFICIENT_STORAGE, "Too many recipients")
                .await;
        }

        transaction.recipients.push(to);
        self.reply(ReplyCode::OK, "Recipient OK").await
    }

    /// Runs the `DATA` phase. Returns `false` when the session must end.
    async fn data(&mut self) -> anyhow::Result<bool> {
        match self.transaction.as_ref().map(|t| t.recipients.is_empty()) {
            None => {
                self.reply(ReplyCode::BAD_SEQUENCE, "Need MAIL command first")
                    .await?;
                return Ok(true);
            }
            Some(true) => {
                self.reply(ReplyCode::BAD_SEQUENCE, "Need RCPT command first")
                    .await?;
                return Ok(true);
            }
            Some(false) => {}
        }

        self.reply(ReplyCode::START_DATA, "Send message, end with <CRLF>.<CRLF>")
            .await?;

        let body = self.receive_body().await?;
        let transaction = self.transaction.take();

        let data = match body {
            Body::Complete(data) => data,
            Body::TooLarge => {
                self.reply(
                    ReplyCode::EXCEEDED_STORAGE,
                    "Message size exceeds fixed maximum message size",
                )
                .await?;
                return Ok(true);
            }
            Body::Eof => return Ok(false),
            Body::TimedOut => {
                self.close_idle().await?;
                return Ok(false);
            }
        };

        let Some(transaction) = transaction else {
            return Ok(true);
        };

        let envelope = Envelope::new(
            self.peer,
            transaction.sender.as_str(),
            transaction
                .recipients
                .iter()
                .map(|rcpt| rcpt.as_str().to_string())
                .collect(),
            Bytes::from(data),
        );
        let (from, recipients, size) =
            (envelope.sender.clone(), envelope.recipients.len(), envelope.size());

        if self.deliveries.send(envelope).is_err() {
            warn!(peer = %self.peer, %from, "refusing message, listener is shutting down");
            self.reply(
                ReplyCode::SERVICE_UNAVAILABLE,
                "Service shutting down, try again later",
            )
            .await?;
            return Ok(false);
        }
        info!(peer = %self.peer, %from, recipients, size, "message accepted");

        self.reply(ReplyCode::OK, "Message accepted for delivery")
            .await?;
        Ok(true)
    }

    /// Reads the message up to the terminating dot, removing dot-stuffing.
    ///
    /// Once the size cap is passed the rest of the body is read and
    /// discarded so the session stays in sync.
    async fn receive_body(&mut self) -> anyhow::Result<Body> {
        let max = self.settings.max_message_size;
        let mut data = Vec::new();
        let mut too_large = false;
        let mut at_line_start = true;
        let mut buf = Vec::new();

        loop {
            match self.read_line(&mut buf).await? {
                ReadLine::Line => {}
                ReadLine::Eof => return Ok(Body::Eof),
                ReadLine::TimedOut => return Ok(Body::TimedOut),
            }

            let line_start = at_line_start;
            at_line_start = buf.ends_with(b"\n");

            if line_start && (buf == b".\r\n" || buf == b".\n") {
                break;
            }
            if too_large {
                continue;
            }

            let content = if line_start {
                buf.strip_prefix(b".").unwrap_or(&buf[..])
            } else {
                &buf[..]
            };

            if data.len() + content.len() > max {
                too_large = true;
                data = Vec::new();
                continue;
            }
            data.extend_from_slice(content);
        }

        Ok(if too_large {
            Body::TooLarge
        } else {
            Body::Complete(data)
        })
    }
}
