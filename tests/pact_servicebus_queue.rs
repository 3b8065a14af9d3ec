//! Pact contract tests for the Service Bus queue REST API
//!
//! The consumer side is the trigger host's queue client, authenticating with
//! the mock credential (`Bearer test-token`) as it does under `PACT_MODE`.

mod common;

use common::{base_url, init_rustls};
use pact_consumer::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use workload_identity_samples::credential::MockTokenCredential;
use workload_identity_samples::error::ServiceBusError;
use workload_identity_samples::queue::servicebus::{ServiceBusAuth, ServiceBusQueueClient};
use workload_identity_samples::queue::QueueMessage;

const BROKER_PROPERTIES: &str = r#"{"DeliveryCount":1,"EnqueuedSequenceNumber":0,"EnqueuedTimeUtc":"Mon, 01 Jan 2024 00:00:00 GMT","LockToken":"5f1b2c3d-0000-4000-8000-000000000001","LockedUntilUtc":"Mon, 01 Jan 2024 00:01:00 GMT","MessageId":"msg-1","SequenceNumber":42,"State":"Active","TimeToLive":1209600}"#;

fn client(url: &impl ToString) -> ServiceBusQueueClient {
    ServiceBusQueueClient::new(
        &base_url(url),
        "testqueue",
        ServiceBusAuth::Credential(Arc::new(MockTokenCredential)),
        Duration::from_secs(60),
    )
    .expect("Failed to create Service Bus client")
}

fn locked_message() -> QueueMessage {
    QueueMessage {
        message_id: "msg-1".to_string(),
        lock_token: "5f1b2c3d-0000-4000-8000-000000000001".to_string(),
        delivery_count: 1,
        sequence_number: Some(42),
        body: "order 42 shipped".to_string(),
    }
}

#[tokio::test]
async fn test_servicebus_receive_message_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Svcbus-Trigger", "Azure-Service-Bus");

    pact_builder.interaction("peek-lock the head of the queue", "", |mut i| {
        i.given("the queue holds one message");
        i.request
            .method("POST")
            .path("/testqueue/messages/head")
            .query_param("timeout", "60")
            .header("authorization", "Bearer test-token");
        i.response
            .status(201)
            .header("content-type", "text/plain; charset=utf-8")
            .header("BrokerProperties", BROKER_PROPERTIES)
            .body("order 42 shipped");
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let message = client(&mock_server.url())
        .receive_message()
        .await
        .expect("Failed to receive")
        .expect("Expected a message");

    assert_eq!(message, locked_message());
}

#[tokio::test]
async fn test_servicebus_receive_empty_queue_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Svcbus-Trigger", "Azure-Service-Bus");

    pact_builder.interaction("long poll on an empty queue", "", |mut i| {
        i.given("the queue is empty");
        i.request
            .method("POST")
            .path("/testqueue/messages/head")
            .query_param("timeout", "60")
            .header("authorization", "Bearer test-token");
        i.response.status(204);
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let received = client(&mock_server.url())
        .receive_message()
        .await
        .expect("Failed to receive");

    assert!(received.is_none());
}

#[tokio::test]
async fn test_servicebus_complete_message_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Svcbus-Trigger", "Azure-Service-Bus");

    pact_builder.interaction("complete a locked message", "", |mut i| {
        i.given("message msg-1 is locked");
        i.request
            .method("DELETE")
            .path("/testqueue/messages/msg-1/5f1b2c3d-0000-4000-8000-000000000001")
            .header("authorization", "Bearer test-token");
        i.response.status(200);
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    client(&mock_server.url())
        .complete_message(&locked_message())
        .await
        .expect("Failed to complete");
}

#[tokio::test]
async fn test_servicebus_abandon_message_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Svcbus-Trigger", "Azure-Service-Bus");

    pact_builder.interaction("abandon a locked message", "", |mut i| {
        i.given("message msg-1 is locked");
        i.request
            .method("PUT")
            .path("/testqueue/messages/msg-1/5f1b2c3d-0000-4000-8000-000000000001")
            .header("authorization", "Bearer test-token");
        i.response.status(200);
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    client(&mock_server.url())
        .abandon_message(&locked_message())
        .await
        .expect("Failed to abandon");
}

#[tokio::test]
async fn test_servicebus_unauthorized_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new("Svcbus-Trigger", "Azure-Service-Bus");

    pact_builder.interaction("receive without Listen rights", "", |mut i| {
        i.given("the identity has no Azure Service Bus Data Receiver role");
        i.request
            .method("POST")
            .path("/testqueue/messages/head")
            .query_param("timeout", "60")
            .header("authorization", "Bearer test-token");
        i.response
            .status(401)
            .header("content-type", "application/xml; charset=utf-8")
            .body("<Error><Code>401</Code><Detail>Unauthorized</Detail></Error>");
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let err = client(&mock_server.url())
        .receive_message()
        .await
        .expect_err("401 must be an error");

    match err {
        ServiceBusError::Status {
            operation, status, ..
        } => {
            assert_eq!(operation, "receive");
            assert_eq!(status, 401);
        }
        other => panic!("Expected a status error, got {other}"),
    }
}
