//! Fan-out dispatch behavior against mocked channels.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mockall::{mock, Sequence};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use notify::{
    ChannelError, ChannelKind, ChannelRegistry, DispatchError, DispatchReport, Event,
    FailurePolicy, FanoutDispatcher, NotificationPolicy, Notifier, RoutingContext,
};

mock! {
    pub Channel {}

    #[async_trait]
    impl Notifier for Channel {
        fn name(&self) -> &'static str;
        fn kind(&self) -> ChannelKind;
        async fn notify(&self, event: &Event, routing_url: &str) -> Result<(), ChannelError>;
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn channel(name: &'static str, kind: ChannelKind) -> MockChannel {
    let mut mock = MockChannel::new();
    mock.expect_name().return_const(name);
    mock.expect_kind().return_const(kind);
    mock
}

fn incident(kind: &str) -> Event {
    Event::IncidentDetected {
        release_name: "web".to_string(),
        namespace: "default".to_string(),
        involved_object_kind: kind.to_string(),
        involved_object_name: "web-migrate".to_string(),
        details: "BackoffLimitExceeded".to_string(),
        detected_at: Utc::now(),
    }
}

fn routing() -> RoutingContext {
    RoutingContext {
        server_url: "https://dash.example.com".to_string(),
        cluster_name: "prod".to_string(),
        project_id: 12,
    }
}

fn registry(channels: Vec<MockChannel>) -> ChannelRegistry {
    ChannelRegistry::with_channels(
        channels
            .into_iter()
            .map(|c| Arc::new(c) as Arc<dyn Notifier>)
            .collect(),
    )
}

/// Chat channel whose delivery never completes; signals once it has started.
struct StalledChannel {
    started: Arc<Notify>,
}

#[async_trait]
impl Notifier for StalledChannel {
    fn name(&self) -> &'static str {
        "stalled"
    }

    fn kind(&self) -> ChannelKind {
        ChannelKind::Chat
    }

    async fn notify(&self, _event: &Event, _routing_url: &str) -> Result<(), ChannelError> {
        self.started.notify_one();
        std::future::pending().await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_disabled_policy_invokes_no_channel() {
    let mut chat = channel("chat", ChannelKind::Chat);
    chat.expect_notify().never();
    let mut email = channel("email", ChannelKind::Email);
    email.expect_notify().never();

    let report = FanoutDispatcher::default()
        .dispatch(
            &incident("Pod"),
            &NotificationPolicy::disabled(),
            &routing(),
            &registry(vec![chat, email]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(report, DispatchReport::Suppressed);
}

#[tokio::test]
async fn test_each_channel_invoked_once_in_order() {
    let mut seq = Sequence::new();
    let mut first = channel("first", ChannelKind::Chat);
    first
        .expect_notify()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    let mut second = channel("second", ChannelKind::Email);
    second
        .expect_notify()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));

    let report = FanoutDispatcher::default()
        .dispatch(
            &incident("Pod"),
            &NotificationPolicy::default(),
            &routing(),
            &registry(vec![first, second]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        report,
        DispatchReport::Delivered {
            delivered: vec!["first", "second"],
            skipped: vec![],
        }
    );
}

#[tokio::test]
async fn test_fail_fast_stops_at_first_failure() {
    let mut seq = Sequence::new();
    let mut first = channel("first", ChannelKind::Chat);
    first
        .expect_notify()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok(()));
    let mut second = channel("second", ChannelKind::Chat);
    second
        .expect_notify()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(ChannelError::Other("webhook revoked".to_string())));
    let mut third = channel("third", ChannelKind::Email);
    third.expect_notify().never();

    let err = FanoutDispatcher::new(FailurePolicy::FailFast)
        .dispatch(
            &incident("Pod"),
            &NotificationPolicy::default(),
            &routing(),
            &registry(vec![first, second, third]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Channel { channel: "second", .. }));
}

#[tokio::test]
async fn test_aggregate_attempts_every_channel() {
    let mut first = channel("first", ChannelKind::Chat);
    first
        .expect_notify()
        .times(1)
        .returning(|_, _| Err(ChannelError::Other("boom".to_string())));
    let mut second = channel("second", ChannelKind::Email);
    second.expect_notify().times(1).returning(|_, _| Ok(()));

    let err = FanoutDispatcher::new(FailurePolicy::ContinueAndAggregate)
        .dispatch(
            &incident("Pod"),
            &NotificationPolicy::default(),
            &routing(),
            &registry(vec![first, second]),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    match err {
        DispatchError::Aggregate {
            attempted,
            failures,
        } => {
            assert_eq!(attempted, 2);
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].channel, "first");
        }
        other => panic!("expected aggregate error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_chat_only_policy_skips_email() {
    let mut chat = channel("slack", ChannelKind::Chat);
    chat.expect_notify().times(1).returning(|_, _| Ok(()));
    let mut email = channel("sendgrid", ChannelKind::Email);
    email.expect_notify().never();

    let policy = NotificationPolicy {
        notifications_disabled: false,
        chat_enabled: true,
        email_enabled: false,
        ..NotificationPolicy::default()
    };

    let report = FanoutDispatcher::default()
        .dispatch(
            &incident("Pod"),
            &policy,
            &routing(),
            &registry(vec![chat, email]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        report,
        DispatchReport::Delivered {
            delivered: vec!["slack"],
            skipped: vec!["sendgrid"],
        }
    );
}

#[tokio::test]
async fn test_job_incident_gets_job_routing_url() {
    let mut chat = channel("slack", ChannelKind::Chat);
    chat.expect_notify()
        .withf(|_, url| {
            url == "https://dash.example.com/jobs/prod/default/web?project_id=12&job=web-migrate"
        })
        .times(1)
        .returning(|_, _| Ok(()));

    FanoutDispatcher::default()
        .dispatch(
            &incident("JOB"),
            &NotificationPolicy::default(),
            &routing(),
            &registry(vec![chat]),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancelled_token_aborts_before_any_channel() {
    let mut chat = channel("slack", ChannelKind::Chat);
    chat.expect_notify().never();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = FanoutDispatcher::default()
        .dispatch(
            &incident("Pod"),
            &NotificationPolicy::default(),
            &routing(),
            &registry(vec![chat]),
            &cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Cancelled));
}

#[tokio::test]
async fn test_cancel_during_delivery_skips_remaining_channels() {
    let started = Arc::new(Notify::new());
    let mut email = channel("email", ChannelKind::Email);
    email.expect_notify().never();
    let stalled: Arc<dyn Notifier> = Arc::new(StalledChannel {
        started: started.clone(),
    });
    let registry = ChannelRegistry::with_channels(vec![stalled, Arc::new(email)]);

    let cancel = CancellationToken::new();
    let event = incident("Pod");
    let policy = NotificationPolicy::default();
    let routing = routing();
    let dispatcher = FanoutDispatcher::default();

    let (result, ()) = tokio::join!(
        dispatcher.dispatch(&event, &policy, &routing, &registry, &cancel),
        async {
            started.notified().await;
            cancel.cancel();
        }
    );

    assert!(matches!(result, Err(DispatchError::Cancelled)));
}
