//! Projection convergence over the in-process bus.

use common::events::{
    routing, run_consumer_with_reconnect, EventPublisher, EventSource, InMemoryBus,
};
use enrollment_service::repositories::enrollments::memory::InMemoryEnrollmentProjectionStore;
use enrollment_service::services::{EnrollmentEventHandler, QUEUE, ROUTING_KEYS};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

fn start(
    bus: &InMemoryBus,
    store: Arc<InMemoryEnrollmentProjectionStore>,
    shutdown: &CancellationToken,
) -> tokio::task::JoinHandle<()> {
    bus.bind(QUEUE, ROUTING_KEYS);
    let source: Arc<dyn EventSource> = Arc::new(bus.clone());
    tokio::spawn(run_consumer_with_reconnect(
        source,
        QUEUE.to_string(),
        ROUTING_KEYS.iter().map(|k| (*k).to_string()).collect(),
        Arc::new(EnrollmentEventHandler::new(store)),
        shutdown.clone(),
    ))
}

async fn settled(bus: &InMemoryBus) -> bool {
    for _ in 0..300 {
        if bus.ready_count(QUEUE) == 0 && bus.unacked_count(QUEUE) == 0 {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_student_rename_converges_and_replay_is_stable() -> Result<(), anyhow::Error> {
    let bus = InMemoryBus::new();
    let store = Arc::new(InMemoryEnrollmentProjectionStore::new());
    let shutdown = CancellationToken::new();
    let task = start(&bus, store.clone(), &shutdown);

    let student = Uuid::new_v4();
    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(store.enroll(student, Uuid::new_v4(), Uuid::new_v4()).await);
    }
    let other = store.enroll(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()).await;

    let event = json!({"id": student, "username": "new", "email": "s@example.com"});
    let publisher: &dyn EventPublisher = &bus;
    publisher.publish(routing::USER_UPDATED, &event).await?;
    assert!(settled(&bus).await);

    for id in &ids {
        let row = store.get(*id).await.expect("enrollment exists");
        assert_eq!(row.student_username, "new");
    }
    assert_eq!(store.get(other).await.expect("exists").student_username, "old");

    let before: Vec<_> = store
        .all()
        .await
        .into_iter()
        .map(|r| (r.id, r.student_username, r.course_name, r.course_offering_name))
        .collect();
    publisher.publish(routing::USER_UPDATED, &event).await?;
    assert!(settled(&bus).await);
    let after: Vec<_> = store
        .all()
        .await
        .into_iter()
        .map(|r| (r.id, r.student_username, r.course_name, r.course_offering_name))
        .collect();
    assert_eq!(before, after);

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
    Ok(())
}

#[tokio::test]
async fn test_course_and_offering_renames_apply_independently() -> Result<(), anyhow::Error> {
    let bus = InMemoryBus::new();
    let store = Arc::new(InMemoryEnrollmentProjectionStore::new());
    let shutdown = CancellationToken::new();
    let task = start(&bus, store.clone(), &shutdown);

    let course = Uuid::new_v4();
    let offering = Uuid::new_v4();
    let id = store.enroll(Uuid::new_v4(), course, offering).await;

    let publisher: &dyn EventPublisher = &bus;
    publisher
        .publish(routing::OFFERING_UPDATED, &json!({"id": offering, "name": "Fall 2024"}))
        .await?;
    publisher
        .publish(routing::COURSE_UPDATED, &json!({"id": course, "name": "Operating Systems"}))
        .await?;
    // Not bound on this queue; never delivered.
    publisher
        .publish(routing::COURSE_CREATED, &json!({"id": course, "name": "ignored"}))
        .await?;
    assert!(settled(&bus).await);

    let row = store.get(id).await.expect("enrollment exists");
    assert_eq!(row.course_name, "Operating Systems");
    assert_eq!(row.course_offering_name, "Fall 2024");
    assert_eq!(row.student_username, "old");

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
    Ok(())
}

#[tokio::test]
async fn test_outage_requeues_then_applies() -> Result<(), anyhow::Error> {
    let bus = InMemoryBus::new();
    let store = Arc::new(InMemoryEnrollmentProjectionStore::new());
    let shutdown = CancellationToken::new();
    store.set_failure(true);
    let task = start(&bus, store.clone(), &shutdown);

    let course = Uuid::new_v4();
    let id = store.enroll(Uuid::new_v4(), course, Uuid::new_v4()).await;
    let publisher: &dyn EventPublisher = &bus;
    publisher
        .publish(routing::COURSE_UPDATED, &json!({"id": course, "name": "Networks"}))
        .await?;

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(store.get(id).await.expect("exists").course_name, "old");

    store.set_failure(false);
    assert!(settled(&bus).await);
    assert_eq!(store.get(id).await.expect("exists").course_name, "Networks");

    shutdown.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(2), task).await;
    Ok(())
}
