//! Outbound delivery.

use crate::envelope::Envelope;
use crate::outcome::{Outcome, OutcomeKind};
use crate::route::{AuthMode, Route};
use mailrouter_smtp::{Address, Client, Credentials, connect};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default bound on one outbound submission.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

/// Everything needed for one outbound SMTP submission.
#[derive(Debug, Clone)]
pub struct Submission<'a> {
    /// Destination host.
    pub host: &'a str,
    /// Destination port.
    pub port: u16,
    /// Credentials, if the route authenticates.
    pub credentials: Option<Credentials>,
    /// Reverse-path; empty for the null sender.
    pub sender: &'a str,
    /// Recipients after any route override.
    pub recipients: &'a [String],
    /// Raw message.
    pub data: &'a [u8],
}

/// Something that can carry a submission to a server.
pub trait Transport: Send + Sync {
    /// Performs the submission. Any error means the message was not
    /// accepted.
    fn submit(
        &self,
        submission: &Submission<'_>,
    ) -> impl Future<Output = mailrouter_smtp::Result<()>> + Send;
}

/// Plain-TCP SMTP transport.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    helo_name: String,
}

impl SmtpTransport {
    /// Creates a transport that greets servers as `helo_name`.
    #[must_use]
    pub fn new(helo_name: impl Into<String>) -> Self {
        Self {
            helo_name: helo_name.into(),
        }
    }
}

impl Transport for SmtpTransport {
    async fn submit(&self, submission: &Submission<'_>) -> mailrouter_smtp::Result<()> {
        let from = if submission.sender.is_empty() {
            Address::null()
        } else {
            Address::new(submission.sender)?
        };
        let (first, rest) = submission.recipients.split_first().ok_or_else(|| {
            mailrouter_smtp::Error::InvalidAddress("no recipients".to_string())
        })?;

        let stream = connect(submission.host, submission.port).await?;
        let client = Client::from_stream(stream)
            .await?
            .hello(&self.helo_name)
            .await?;

        let client = match &submission.credentials {
            Some(credentials) => client.authenticate(credentials).await?.mail_from(from).await?,
            None => client.mail_from(from).await?,
        };

        let mut client = client.rcpt_to(Address::new(first.as_str())?).await?;
        for rcpt in rest {
            client = client.rcpt_to(Address::new(rcpt.as_str())?).await?;
        }

        let client = client.data().await?.send_message(submission.data).await?;

        // The message is already accepted at this point.
        if let Err(err) = client.quit().await {
            debug!(host = submission.host, error = %err, "QUIT failed after delivery");
        }
        Ok(())
    }
}

/// What the dispatcher did with a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Classified outcome.
    pub outcome: Outcome,
    /// Recipients the message was addressed to.
    pub recipients: Vec<String>,
    /// Failure detail.
    pub error: Option<String>,
}

/// Delivers messages to resolved routes through a [`Transport`].
#[derive(Debug, Clone)]
pub struct Dispatcher<T> {
    transport: T,
    timeout: Duration,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher with the given per-submission time limit.
    #[must_use]
    pub const fn new(transport: T, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    /// The underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Delivers and returns only the outcome.
    pub async fn dispatch(&self, envelope: &Envelope, route: &Route) -> Outcome {
        self.deliver(envelope, route).await.outcome
    }

    /// Delivers `envelope` to `route`.
    ///
    /// DROP yields `dropped` without touching the network. Otherwise the
    /// whole submission is one attempt: any error, or running past the
    /// time limit, yields `failed`.
    pub async fn deliver(&self, envelope: &Envelope, route: &Route) -> DeliveryReport {
        let size = envelope.size();

        if route.is_drop() {
            return DeliveryReport {
                outcome: Outcome::new(OutcomeKind::Dropped, size),
                recipients: envelope.recipients.clone(),
                error: None,
            };
        }

        let recipients = route.recipients(&envelope.recipients);
        let credentials = match route.auth {
            AuthMode::None => None,
            AuthMode::Plain => Some(Credentials::plain(
                &route.username,
                &route.password,
                &route.hostname,
            )),
            AuthMode::CramMd5 => Some(Credentials::cram_md5(&route.username, &route.password)),
        };
        let submission = Submission {
            host: &route.hostname,
            port: route.port,
            credentials,
            sender: &envelope.sender,
            recipients: &recipients,
            data: &envelope.data,
        };

        debug!(route = %route.name, addr = %route.address(), rcpts = recipients.len(), "submitting");

        let error = match tokio::time::timeout(self.timeout, self.transport.submit(&submission)).await
        {
            Ok(Ok(())) => None,
            Ok(Err(err)) => Some(err.to_string()),
            Err(_) => Some(format!(
                "delivery timed out after {}s",
                self.timeout.as_secs()
            )),
        };

        let kind = if let Some(err) = &error {
            warn!(route = %route.name, addr = %route.address(), error = %err, "delivery failed");
            OutcomeKind::Failed
        } else {
            OutcomeKind::Sent
        };

        DeliveryReport {
            outcome: Outcome::new(kind, size),
            recipients,
            error,
        }
    }
}
