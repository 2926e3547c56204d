//! Consumer loop driven end to end over the in-process bus.
//!
//! Test naming: `test_<feature>_<scenario>_<expected_result>`

use chrono::Utc;
use common::events::{
    routing, run_consumer_with_reconnect, EventPublisher, EventSource, InMemoryBus,
};
use course_service::models::CONTENT_STATUS_CREATED;
use course_service::repositories::projections::memory::InMemoryCourseProjectionStore;
use course_service::services::{CourseEventHandler, QUEUE, ROUTING_KEYS};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use zoom_service::models::events::MeetingCreatedEvent;

struct TestConsumer {
    bus: InMemoryBus,
    store: Arc<InMemoryCourseProjectionStore>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl TestConsumer {
    fn spawn() -> Self {
        let bus = InMemoryBus::new();
        bus.bind(QUEUE, ROUTING_KEYS);
        let store = Arc::new(InMemoryCourseProjectionStore::new());
        let shutdown = CancellationToken::new();

        let source: Arc<dyn EventSource> = Arc::new(bus.clone());
        let task = tokio::spawn(run_consumer_with_reconnect(
            source,
            QUEUE.to_string(),
            ROUTING_KEYS.iter().map(|k| (*k).to_string()).collect(),
            Arc::new(CourseEventHandler::new(store.clone())),
            shutdown.clone(),
        ));

        Self {
            bus,
            store,
            shutdown,
            task,
        }
    }

    fn publisher(&self) -> &(dyn EventPublisher + 'static) {
        &self.bus
    }

    /// Wait until every message on the queue has been settled.
    async fn drained(&self) -> bool {
        for _ in 0..300 {
            if self.bus.ready_count(QUEUE) == 0 && self.bus.unacked_count(QUEUE) == 0 {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), self.task).await;
    }
}

fn meeting_created(section_module_id: Uuid, zoom_meeting_id: &str) -> MeetingCreatedEvent {
    MeetingCreatedEvent {
        section_module_id,
        zoom_meeting_id: zoom_meeting_id.to_string(),
        topic: "Week 1 live".to_string(),
        join_url: "https://zoom.example/j/1".to_string(),
        start_url: "https://zoom.example/s/1".to_string(),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn test_meeting_created_links_module() -> Result<(), anyhow::Error> {
    let consumer = TestConsumer::spawn();
    let module = consumer.store.add_module(Uuid::new_v4(), "Week 1 live").await;

    consumer
        .publisher()
        .publish(
            routing::ZOOM_MEETING_CREATED,
            &meeting_created(module, "85123456789"),
        )
        .await?;
    assert!(consumer.drained().await);

    let row = consumer.store.module(module).await.expect("module exists");
    assert_eq!(row.content_id.as_deref(), Some("85123456789"));
    assert_eq!(row.content_status, CONTENT_STATUS_CREATED);

    consumer.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_meeting_created_numeric_id_is_stored_as_text() -> Result<(), anyhow::Error> {
    let consumer = TestConsumer::spawn();
    let module = consumer.store.add_module(Uuid::new_v4(), "Lab").await;

    consumer
        .publisher()
        .publish(
            routing::ZOOM_MEETING_CREATED,
            &json!({"section_module_id": module, "zoom_meeting_id": 91234567890u64}),
        )
        .await?;
    assert!(consumer.drained().await);

    let row = consumer.store.module(module).await.expect("module exists");
    assert_eq!(row.content_id.as_deref(), Some("91234567890"));

    consumer.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_user_updated_replay_converges() -> Result<(), anyhow::Error> {
    let consumer = TestConsumer::spawn();
    let instructor = Uuid::new_v4();
    consumer
        .store
        .add_instructor(Uuid::new_v4(), instructor, "grace")
        .await;
    consumer
        .store
        .add_instructor(Uuid::new_v4(), instructor, "grace")
        .await;

    let event = json!({"id": instructor, "username": "ghopper", "email": "g@example.com"});
    consumer.publisher().publish(routing::USER_UPDATED, &event).await?;
    assert!(consumer.drained().await);
    let first = consumer.store.instructors_for(instructor).await;

    consumer.publisher().publish(routing::USER_UPDATED, &event).await?;
    assert!(consumer.drained().await);
    let second = consumer.store.instructors_for(instructor).await;

    assert!(first.iter().all(|r| r.instructor_username == "ghopper"));
    let names = |rows: &[course_service::models::OfferingInstructor]| {
        let mut v: Vec<_> = rows
            .iter()
            .map(|r| (r.id, r.instructor_username.clone()))
            .collect();
        v.sort();
        v
    };
    assert_eq!(names(&first), names(&second));

    consumer.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_malformed_event_is_acked_and_not_redelivered() -> Result<(), anyhow::Error> {
    let consumer = TestConsumer::spawn();

    consumer
        .publisher()
        .publish_raw(routing::USER_UPDATED, b"not json".to_vec())
        .await?;
    assert!(consumer.drained().await);

    // A later valid event still flows.
    let module = consumer.store.add_module(Uuid::new_v4(), "After").await;
    consumer
        .publisher()
        .publish(routing::ZOOM_MEETING_CREATED, &meeting_created(module, "7"))
        .await?;
    assert!(consumer.drained().await);
    assert_eq!(
        consumer.store.module(module).await.and_then(|m| m.content_id),
        Some("7".to_string())
    );

    consumer.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_store_outage_requeues_until_recovered() -> Result<(), anyhow::Error> {
    let consumer = TestConsumer::spawn();
    let module = consumer.store.add_module(Uuid::new_v4(), "Retry").await;
    consumer.store.set_failure(true);

    consumer
        .publisher()
        .publish(routing::ZOOM_MEETING_CREATED, &meeting_created(module, "42"))
        .await?;

    tokio::time::sleep(Duration::from_millis(150)).await;
    let row = consumer.store.module(module).await.expect("module exists");
    assert!(row.content_id.is_none());

    consumer.store.set_failure(false);
    assert!(consumer.drained().await);
    let row = consumer.store.module(module).await.expect("module exists");
    assert_eq!(row.content_id.as_deref(), Some("42"));

    consumer.stop().await;
    Ok(())
}
