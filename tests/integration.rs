use std::time::Duration;

use siftmq::config::{Config, Topology};
use siftmq::delivery::DeliveryOutcome;
use siftmq::error::Error;
use siftmq::filter::CorrelationFilter;
use siftmq::message::Message;
use siftmq::provision::ProvisioningStatus;
use siftmq::queue::QueueOptions;
use siftmq::rule::Rule;
use siftmq::service::Service;
use siftmq::subscription::SubscriptionOptions;

/// Topology mirroring a typical application-host setup: one queue, one
/// topic with a correlation-filtered subscription.
const TOPOLOGY: &str = r#"{
    "queues": [
        {
            "name": "queueOne",
            "display_name": "queue1",
            "dead_lettering_on_message_expiration": false
        }
    ],
    "topics": [
        {
            "name": "topicOne",
            "display_name": "topic1",
            "subscriptions": [
                {
                    "name": "sub1",
                    "max_delivery_count": 10,
                    "rules": [
                        {
                            "name": "app-prop-filter-1",
                            "filter": {
                                "correlation_id": "id1",
                                "subject": "subject1"
                            }
                        }
                    ]
                }
            ]
        }
    ]
}"#;

fn setup() -> Service {
    let service = Service::new();
    service
        .apply_topology(&Topology::from_json(TOPOLOGY).unwrap())
        .unwrap();
    service
}

#[tokio::test]
async fn topology_file_boot_provisions_everything() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("topology.json");
    std::fs::write(&path, TOPOLOGY).unwrap();

    let service = Service::with_config(Config {
        topology_path: Some(path.to_string_lossy().to_string()),
        default_max_delivery_count: None,
    })
    .unwrap();

    assert_eq!(service.list_queues(), vec!["queueOne".to_owned()]);
    assert_eq!(service.list_topics(), vec!["topicOne".to_owned()]);

    let queue = service.queue("queueOne").unwrap();
    assert_eq!(queue.display_name(), Some("queue1"));
    assert_eq!(queue.status(), ProvisioningStatus::Provisioned);

    // The dependency-wait contract: all three resolve immediately.
    queue.provisioned().await;
    service.topic("topicOne").unwrap().provisioned().await;
    let subscription = service.subscription("topicOne", "sub1").unwrap();
    subscription.provisioned().await;
    assert_eq!(subscription.max_delivery_count(), 10);
}

#[tokio::test]
async fn queue_round_trip_through_the_service() {
    let service = setup();

    let id = service
        .send_to_queue("queueOne", Message::builder().body("payload").build())
        .unwrap();

    let queue = service.queue("queueOne").unwrap();
    let received = queue.receive(Duration::from_secs(1)).await.unwrap();
    assert_eq!(received.message.message_id, id);
    assert_eq!(received.delivery, DeliveryOutcome::FirstDelivery);
    assert_eq!(received.message.delivery_count, 1);

    queue.ack(&id).unwrap();
    assert!(queue.try_receive().is_none());
}

#[tokio::test]
async fn subscription_delivers_only_matching_messages() {
    let service = setup();
    let subscription = service.subscription("topicOne", "sub1").unwrap();

    service
        .publish(
            "topicOne",
            Message::builder()
                .correlation_id("id1")
                .subject("subject1")
                .body("wanted")
                .build(),
        )
        .unwrap();
    service
        .publish(
            "topicOne",
            Message::builder()
                .correlation_id("id1")
                .subject("other")
                .build(),
        )
        .unwrap();

    let received = subscription
        .receive(Duration::from_secs(1))
        .await
        .expect("matching message");
    assert_eq!(received.message.body, "wanted");

    // The non-matching message was skipped, not queued behind.
    assert!(subscription.try_receive().is_none());
}

#[tokio::test]
async fn abandoned_messages_are_redelivered_until_dead_lettered() {
    let service = setup();
    service
        .create_queue(
            "retries",
            QueueOptions::builder().max_delivery_count(3).build(),
        )
        .unwrap();

    let queue = service.queue("retries").unwrap();
    let id = queue.send(Message::builder().build());

    for attempt in 1..=3u32 {
        let received = queue.try_receive().expect("deliverable");
        assert_eq!(received.message.delivery_count, attempt);
        queue.abandon(&id).unwrap();
    }

    // Attempt 4 crosses max_delivery_count = 3 and dead-letters.
    assert!(queue.try_receive().is_none());
    let dead = queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].message.message_id, id);
    assert_eq!(dead[0].reason, "max-delivery-exceeded");

    assert_eq!(queue.stats().ready, 0);
    assert_eq!(queue.stats().in_flight, 0);
}

#[tokio::test]
async fn explicit_dead_letter_from_the_worker() {
    let service = setup();
    let subscription = service.subscription("topicOne", "sub1").unwrap();

    service
        .publish(
            "topicOne",
            Message::builder()
                .message_id("poison")
                .correlation_id("id1")
                .subject("subject1")
                .build(),
        )
        .unwrap();

    subscription.receive(Duration::from_secs(1)).await.unwrap();
    subscription
        .dead_letter("poison", "unprocessable payload")
        .unwrap();

    let dead = subscription.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].reason, "unprocessable payload");

    // Settling twice is an error.
    assert!(matches!(
        subscription.ack("poison"),
        Err(Error::MessageNotInFlight { .. })
    ));
}

#[tokio::test]
async fn duplicate_rule_names_prevent_subscription_setup() {
    let service = setup();

    let result = service.create_subscription(
        "topicOne",
        "sub2",
        SubscriptionOptions::builder()
            .rules(vec![
                Rule::builder().name("dup").build(),
                Rule::builder()
                    .name("dup")
                    .filter(CorrelationFilter::builder().correlation_id("id1").build())
                    .build(),
            ])
            .build(),
    );

    assert!(matches!(result, Err(Error::DuplicateRuleName { .. })));
    // The failed subscription never became usable.
    assert!(service.subscription("topicOne", "sub2").is_err());
}

#[tokio::test]
async fn entity_names_are_unique() {
    let service = setup();

    assert!(matches!(
        service.create_queue("queueOne", QueueOptions::default()),
        Err(Error::AlreadyExists { .. })
    ));
    assert!(matches!(
        service.create_topic("topicOne", None),
        Err(Error::AlreadyExists { .. })
    ));
    assert!(matches!(
        service.create_subscription("topicOne", "sub1", SubscriptionOptions::default()),
        Err(Error::AlreadyExists { .. })
    ));
}

#[tokio::test]
async fn deleting_entities_frees_their_names() {
    let service = setup();

    service.delete_queue("queueOne").unwrap();
    assert!(matches!(
        service.queue("queueOne"),
        Err(Error::NotFound { .. })
    ));
    service
        .create_queue("queueOne", QueueOptions::default())
        .unwrap();

    assert!(matches!(
        service.delete_topic("missing"),
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn publish_to_a_topic_with_two_subscriptions() {
    let service = setup();
    let topic = service.topic("topicOne").unwrap();
    let audit = topic
        .create_subscription("audit", SubscriptionOptions::default())
        .unwrap();

    let offered = service
        .publish(
            "topicOne",
            Message::builder()
                .correlation_id("id1")
                .subject("subject1")
                .build(),
        )
        .unwrap();
    assert_eq!(offered, 2);

    // Both the filtered and the pass-through subscription deliver,
    // each with independent tracking state.
    let sub1 = service.subscription("topicOne", "sub1").unwrap();
    assert_eq!(
        sub1.receive(Duration::from_secs(1))
            .await
            .unwrap()
            .delivery,
        DeliveryOutcome::FirstDelivery
    );
    assert_eq!(
        audit
            .receive(Duration::from_secs(1))
            .await
            .unwrap()
            .delivery,
        DeliveryOutcome::FirstDelivery
    );
}
