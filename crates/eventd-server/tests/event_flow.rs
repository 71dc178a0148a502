//! End-to-end event flow tests through the service facade.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eventd_core::{Error, EventBus, RetentionPolicy};
use eventd_proto::EventOperation;
use eventd_server::{EventService, ServerConfig, SessionTable};

const NO_CLASSES: &[&str] = &[];

fn make_service(config: ServerConfig) -> (Arc<EventService>, Arc<SessionTable>) {
    let bus = Arc::new(EventBus::new(config.bus_config()));
    let sessions = Arc::new(SessionTable::new());
    let service = Arc::new(EventService::new(sessions.clone(), bus));
    (service, sessions)
}

fn default_service() -> (Arc<EventService>, Arc<SessionTable>) {
    make_service(ServerConfig::default())
}

#[tokio::test]
async fn register_then_poll_delivers_one_record_then_times_out() {
    let (service, sessions) = default_service();
    sessions.open("s1");
    service.register("s1", &["VM"]).unwrap();

    service.publish("VM", EventOperation::Add, "r1", "uuid-1");

    let batch = service
        .from("s1", &["VM"], "", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.records[0].object_ref, "r1");
    assert_eq!(batch.records[0].operation, EventOperation::Add);

    // Resuming from the returned token with nothing new times out empty,
    // no earlier than the requested timeout.
    let started = Instant::now();
    let empty = service
        .from("s1", &["VM"], &batch.token, Duration::from_millis(300))
        .await
        .unwrap();
    assert!(empty.is_empty());
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn only_matching_blocked_session_wakes() {
    let (service, sessions) = default_service();
    sessions.open("s1");
    sessions.open("s2");
    service.register("s1", &["VM"]).unwrap();
    service.register("s2", &["Network"]).unwrap();

    let vm_poll = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .from("s1", NO_CLASSES, "", Duration::from_secs(5))
                .await
        })
    };
    let net_poll = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .from("s2", NO_CLASSES, "", Duration::from_millis(400))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let appended_at = Instant::now();
    service.publish("VM", EventOperation::Add, "vm-1", "uuid-1");

    let batch = vm_poll.await.unwrap().unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.records[0].class, "VM");
    assert!(appended_at.elapsed() < Duration::from_millis(500));

    // The Network session saw nothing and ran out its own timeout.
    let batch = net_poll.await.unwrap().unwrap();
    assert!(batch.is_empty());
}

#[tokio::test]
async fn injected_event_is_deliverable_like_a_natural_one() {
    let (service, sessions) = default_service();
    sessions.open("s1");
    service.register("s1", &["VM"]).unwrap();

    let id = service.inject("s1", "VM", "synthetic-1").unwrap();

    let batch = service
        .from("s1", NO_CLASSES, "", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    let record = &batch.records[0];
    assert_eq!(record.id, id);
    assert_eq!(record.class, "VM");
    assert_eq!(record.operation, EventOperation::Mod);
    assert_eq!(record.object_ref, "synthetic-1");
    assert!(record.timestamp > 0);
}

#[tokio::test]
async fn repeated_polls_concatenate_to_exact_filtered_subsequence() {
    let (service, sessions) = make_service(ServerConfig::default().with_max_batch(3));
    sessions.open("s1");
    service.register("s1", &["VM"]).unwrap();

    // Interleave matching and non-matching records up to a fixed target.
    let mut expected = Vec::new();
    for i in 0..25 {
        let class = if i % 2 == 0 { "VM" } else { "Network" };
        let object_ref = format!("r{}", i);
        let id = service.publish(class, EventOperation::Mod, &object_ref, "u");
        if class == "VM" {
            expected.push((id, object_ref));
        }
    }

    let mut collected = Vec::new();
    let mut token = String::new();
    loop {
        let batch = service
            .from("s1", NO_CLASSES, &token, Duration::from_millis(50))
            .await
            .unwrap();
        token = batch.token.clone();
        if batch.is_empty() {
            break;
        }
        collected.extend(
            batch
                .records
                .iter()
                .map(|r| (r.id, r.object_ref.clone())),
        );
    }

    assert_eq!(collected, expected);
}

#[tokio::test]
async fn wildcard_subscription_sees_future_classes() {
    let (service, sessions) = default_service();
    sessions.open("s1");
    service.register("s1", &["*"]).unwrap();

    service.publish("VM", EventOperation::Add, "vm", "u1");
    service.publish("ClassInventedLater", EventOperation::Add, "x", "u2");

    let batch = service
        .from("s1", NO_CLASSES, "", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(batch.len(), 2);
    assert_eq!(batch.records[0].class, "VM");
    assert_eq!(batch.records[1].class, "ClassInventedLater");
}

#[tokio::test]
async fn filtered_session_never_sees_other_classes() {
    let (service, sessions) = default_service();
    sessions.open("s1");
    service.register("s1", &["VM"]).unwrap();

    for i in 0..10 {
        service.publish("Network", EventOperation::Mod, &format!("net-{}", i), "u");
    }
    service.publish("VM", EventOperation::Add, "vm-1", "u");

    let batch = service
        .from("s1", NO_CLASSES, "", Duration::from_secs(5))
        .await
        .unwrap();
    assert!(batch.records.iter().all(|r| r.class == "VM"));
    assert_eq!(batch.len(), 1);
}

#[tokio::test]
async fn stale_token_is_expired_after_pruning() {
    let config = ServerConfig::default()
        .with_retention(RetentionPolicy::with_max_records(2))
        .without_pruning();
    let (service, sessions) = make_service(config);
    sessions.open("s1");
    service.register("s1", &["VM"]).unwrap();

    service.publish("VM", EventOperation::Add, "early", "u");
    let early = service
        .from("s1", NO_CLASSES, "", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(early.len(), 1);
    let early_token = early.token.clone();

    // Drive the log well past the retention bound and consume it all so
    // the retention pass may remove the early records.
    for i in 0..10 {
        service.publish("VM", EventOperation::Mod, &format!("r{}", i), "u");
    }
    let mut token = early_token.clone();
    loop {
        let batch = service
            .from("s1", NO_CLASSES, &token, Duration::from_millis(20))
            .await
            .unwrap();
        token = batch.token.clone();
        if batch.is_empty() {
            break;
        }
    }
    let report = service.bus().prune();
    assert!(report.removed > 0);

    // The early token now points before the retained window.
    let result = service
        .from("s1", NO_CLASSES, &early_token, Duration::from_millis(20))
        .await;
    assert!(matches!(result, Err(Error::Expired)));
}

#[tokio::test]
async fn revoking_a_session_releases_its_blocked_poll() {
    let (service, sessions) = default_service();
    sessions.open("s1");
    service.register("s1", &["VM"]).unwrap();

    let poll = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .from("s1", NO_CLASSES, "", Duration::from_secs(30))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let revoked_at = Instant::now();
    service.revoke_session("s1");

    let result = poll.await.unwrap();
    assert!(matches!(result, Err(Error::SessionInvalid(_))));
    assert!(revoked_at.elapsed() < Duration::from_millis(500));
}

#[tokio::test]
async fn unregistered_classes_are_served_as_the_overlap() {
    let (service, sessions) = default_service();
    sessions.open("s1");
    service.register("s1", &["VM"]).unwrap();

    service.publish("VM", EventOperation::Add, "vm-1", "u");
    service.publish("Host", EventOperation::Add, "host-1", "u");

    // Polling for {VM, Host} with only VM registered serves the overlap.
    let batch = service
        .from("s1", &["VM", "Host"], "", Duration::from_secs(5))
        .await
        .unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.records[0].class, "VM");
}

#[tokio::test]
async fn burst_while_blocked_delivers_each_session_its_subsequence() {
    let (service, sessions) = default_service();
    for session in ["s1", "s2"] {
        sessions.open(session);
    }
    service.register("s1", &["VM"]).unwrap();
    service.register("s2", &["*"]).unwrap();

    let s1_poll = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .from("s1", NO_CLASSES, "", Duration::from_secs(5))
                .await
        })
    };
    let s2_poll = {
        let service = service.clone();
        tokio::spawn(async move {
            service
                .from("s2", NO_CLASSES, "", Duration::from_secs(5))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Burst of mixed appends while both sessions are parked.
    service.publish("VM", EventOperation::Add, "vm-1", "u");
    service.publish("Network", EventOperation::Add, "net-1", "u");
    service.publish("VM", EventOperation::Mod, "vm-1", "u");

    let s1_first = s1_poll.await.unwrap().unwrap();
    let s2_first = s2_poll.await.unwrap().unwrap();

    // Each woken poll returns a monotonic prefix of its subsequence;
    // drain the rest and check the concatenation.
    let mut s1_refs: Vec<String> = s1_first
        .records
        .iter()
        .map(|r| r.object_ref.clone())
        .collect();
    let mut token = s1_first.token.clone();
    loop {
        let batch = service
            .from("s1", NO_CLASSES, &token, Duration::from_millis(50))
            .await
            .unwrap();
        token = batch.token.clone();
        if batch.is_empty() {
            break;
        }
        s1_refs.extend(batch.records.iter().map(|r| r.object_ref.clone()));
    }
    assert_eq!(s1_refs, vec!["vm-1", "vm-1"]);

    let mut s2_count = s2_first.len();
    let mut token = s2_first.token.clone();
    loop {
        let batch = service
            .from("s2", NO_CLASSES, &token, Duration::from_millis(50))
            .await
            .unwrap();
        token = batch.token.clone();
        if batch.is_empty() {
            break;
        }
        s2_count += batch.len();
    }
    assert_eq!(s2_count, 3);
}
