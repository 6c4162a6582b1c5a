//! Router pipeline tests with an in-memory transport.

#![allow(clippy::unwrap_used)]

use mailrouter_core::dispatch::Submission;
use mailrouter_core::{
    Config, ConfigStore, DEFAULT_DELIVERY_TIMEOUT, DROP_ROUTE_ID, Dispatcher, Envelope, Filter,
    MailRouter, OutcomeKind, Route, Transport,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Default)]
struct FakeTransport {
    calls: AtomicUsize,
    hosts: Mutex<Vec<String>>,
}

impl Transport for FakeTransport {
    async fn submit(&self, submission: &Submission<'_>) -> mailrouter_smtp::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.hosts.lock().unwrap().push(submission.host.to_string());
        Ok(())
    }
}

fn route(id: &str, name: &str, is_default: bool) -> Route {
    Route {
        id: id.into(),
        name: name.into(),
        hostname: format!("{id}.internal"),
        port: 25,
        is_default,
        ..Route::default()
    }
}

fn filter(id: &str, order: i64, subject: &str, route_id: &str) -> Filter {
    Filter {
        id: id.into(),
        order,
        name: format!("Filter {id}"),
        subject: subject.into(),
        route_id: route_id.into(),
        ..Filter::default()
    }
}

fn router(routes: Vec<Route>, filters: Vec<Filter>) -> MailRouter<FakeTransport> {
    let config = Config {
        routes: routes.into_iter().map(|r| (r.id.clone(), r)).collect(),
        filters: filters.into_iter().map(|f| (f.id.clone(), f)).collect(),
        ..Config::default()
    };
    MailRouter::new(
        ConfigStore::new(config),
        Dispatcher::new(FakeTransport::default(), DEFAULT_DELIVERY_TIMEOUT),
    )
}

fn envelope(subject: &str) -> Envelope {
    Envelope::new(
        "10.1.2.3:50000".parse().unwrap(),
        "alice@example.com",
        vec!["bob@example.com".to_string()],
        format!("From: alice@example.com\r\nSubject: {subject}\r\n\r\nHello\r\n").into_bytes(),
    )
}

fn calls(router: &MailRouter<FakeTransport>) -> usize {
    router.dispatcher().transport().calls.load(Ordering::SeqCst)
}

#[tokio::test]
async fn matched_filter_routes_to_its_destination() {
    let router = router(
        vec![route("accounts", "Accounts", false), route("main", "Main", true)],
        vec![filter("f1", 1, "Invoice", "accounts")],
    );

    let env = envelope("Invoice 2024-001");
    let size = env.size();
    let outcome = router.handle(env).await;
    assert_eq!(outcome.kind, OutcomeKind::Sent);
    assert_eq!(outcome.size, size);

    let logs = router.logs();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].filter, "Filter f1");
    assert_eq!(logs[0].route, "Accounts");
    assert_eq!(logs[0].subject, "Invoice 2024-001");
    assert_eq!(logs[0].origin.to_string(), "10.1.2.3");

    let stats = router.stats();
    assert_eq!(stats.sent.messages, 1);
    assert_eq!(stats.sent.bytes, size as u64);
    assert_eq!(calls(&router), 1);
    assert_eq!(
        *router.dispatcher().transport().hosts.lock().unwrap(),
        vec!["accounts.internal"]
    );
}

#[tokio::test]
async fn unmatched_message_uses_default_route() {
    let router = router(
        vec![route("accounts", "Accounts", false), route("main", "Main", true)],
        vec![filter("f1", 1, "Invoice", "accounts")],
    );

    let outcome = router.handle(envelope("Lunch?")).await;
    assert_eq!(outcome.kind, OutcomeKind::Sent);
    let logs = router.logs();
    assert_eq!(logs[0].filter, "");
    assert_eq!(logs[0].route, "Main");
}

#[tokio::test]
async fn no_default_falls_back_to_drop_without_network() {
    let router = router(vec![route("accounts", "Accounts", false)], vec![]);

    let env = envelope("anything");
    let size = env.size();
    let outcome = router.handle(env).await;
    assert_eq!(outcome.kind, OutcomeKind::Dropped);

    let logs = router.logs();
    assert_eq!(logs[0].route, "Drop");
    assert!(logs[0].error.is_none());

    let stats = router.stats();
    assert_eq!(stats.dropped.messages, 1);
    assert_eq!(stats.dropped.bytes, size as u64);
    assert_eq!(stats.sent.messages, 0);
    assert_eq!(calls(&router), 0);
}

#[tokio::test]
async fn filter_to_missing_route_is_dropped_with_error() {
    let router = router(
        vec![route("main", "Main", true)],
        vec![filter("f1", 1, "Invoice", "deleted-route")],
    );

    let outcome = router.handle(envelope("Invoice")).await;
    assert_eq!(outcome.kind, OutcomeKind::Dropped);
    let logs = router.logs();
    assert_eq!(logs[0].route, "Drop");
    assert_eq!(logs[0].filter, "Filter f1");
    assert!(logs[0].error.as_deref().unwrap().contains("deleted-route"));
}

#[tokio::test]
async fn filter_to_drop_is_dropped() {
    let router = router(
        vec![route("main", "Main", true)],
        vec![filter("spam", 0, "WIN A PRIZE", DROP_ROUTE_ID)],
    );
    let outcome = router.handle(envelope("WIN A PRIZE now")).await;
    assert_eq!(outcome.kind, OutcomeKind::Dropped);
    assert_eq!(router.logs()[0].route, "Drop");
    assert_eq!(calls(&router), 0);
}

#[tokio::test]
async fn unparsable_message_is_rejected() {
    let router = router(vec![route("main", "Main", true)], vec![]);
    let env = Envelope::new(
        "10.1.2.3:50000".parse().unwrap(),
        "alice@example.com",
        vec!["bob@example.com".to_string()],
        b"this line has no colon\r\n\r\nbody".to_vec(),
    );

    let outcome = router.handle(env).await;
    assert_eq!(outcome.kind, OutcomeKind::Rejected);
    let logs = router.logs();
    assert_eq!(logs[0].route, "Rejected");
    assert!(logs[0].error.is_some());
    assert_eq!(router.stats().rejected.messages, 1);
    assert_eq!(router.stats().sent.messages, 0);
}

#[tokio::test]
async fn route_override_recipient_is_logged() {
    let mut archive = route("archive", "Archive", true);
    archive.to = "archive@example.com".into();
    let router = router(vec![archive], vec![]);

    router.handle(envelope("x")).await;
    assert_eq!(router.logs()[0].to, "archive@example.com");
}

#[tokio::test]
async fn config_changes_apply_to_next_message() {
    let router = router(vec![route("main", "Main", true)], vec![]);
    router.handle(envelope("first")).await;
    assert_eq!(router.logs()[0].route, "Main");

    router.config().delete_route("main").unwrap();
    router.handle(envelope("second")).await;
    assert_eq!(router.logs()[0].route, "Drop");
    assert_eq!(router.logs()[1].route, "Main");
    assert_eq!(router.sorted_routes().len(), 1);
    assert!(router.sorted_filters().is_empty());
}

/// Holds every submission until `release` is notified.
#[derive(Default)]
struct StallingTransport {
    entered: Notify,
    release: Notify,
}

impl Transport for StallingTransport {
    async fn submit(&self, _submission: &Submission<'_>) -> mailrouter_smtp::Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

#[tokio::test]
async fn config_is_writable_while_delivery_is_in_flight() {
    let config = Config {
        routes: [("main".to_string(), route("main", "Main", true))]
            .into_iter()
            .collect(),
        ..Config::default()
    };
    let router = Arc::new(MailRouter::new(
        ConfigStore::new(config),
        Dispatcher::new(StallingTransport::default(), DEFAULT_DELIVERY_TIMEOUT),
    ));

    let delivery = tokio::spawn({
        let router = Arc::clone(&router);
        async move { router.handle(envelope("held")).await }
    });
    router.dispatcher().transport().entered.notified().await;

    let store = router.config().clone();
    let edit = tokio::task::spawn_blocking(move || {
        store.upsert_route(route("backup", "Backup", false))?;
        store.delete_route("backup")
    });
    let removed = tokio::time::timeout(Duration::from_secs(5), edit)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(removed.id, "backup");
    assert!(!delivery.is_finished());

    router.dispatcher().transport().release.notify_one();
    let outcome = delivery.await.unwrap();
    assert_eq!(outcome.kind, OutcomeKind::Sent);
    assert_eq!(router.logs()[0].route, "Main");
}
