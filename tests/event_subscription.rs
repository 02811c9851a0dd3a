// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for event subscriptions over loopback TCP.
//!
//! The gateway subscribes to a driver it hosts itself: register and
//! unregister calls travel through its own server, and notifies sent to the
//! loopback device are dispatched back to its listeners.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use ubiqlink::engine::{EventListener, ListenerHandle, SubscriptionKey};
use ubiqlink::message::{
    Call, EVENT_KEY_PARAMETER, Message, Notify, REGISTER_LISTENER_SERVICE, Response,
    UNREGISTER_LISTENER_SERVICE,
};
use ubiqlink::transport::{PollPolicy, ServerHandle, TcpTransport, Transport};
use ubiqlink::{Device, Driver, Error, Gateway, GatewayConfig};

const DRIVER: &str = "org.unbiquitous.uos.core.adaptabilityEngine.events.DummyEventDriver";
const TEST_EVENT_KEY: &str = "TEST_EVENT_KEY";
const TEST_EVENT_KEY_2: &str = "TEST_EVENT_KEY_2";
const REJECTED_EVENT_KEY: &str = "REJECTED_EVENT_KEY";
const WAIT: Duration = Duration::from_secs(5);

// ============================================================================
// Fixtures
// ============================================================================

/// Driver recording every call it answers.
#[derive(Default)]
struct RecordingDriver {
    calls: Mutex<Vec<Call>>,
}

impl RecordingDriver {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn count(&self, service: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.service() == service)
            .count()
    }

    fn last(&self) -> Option<Call> {
        self.calls.lock().last().cloned()
    }
}

impl Driver for RecordingDriver {
    fn handle(&self, call: &Call) -> Response {
        self.calls.lock().push(call.clone());
        if call.event_key() == Some(REJECTED_EVENT_KEY) {
            return Response::error("event not supported");
        }
        Response::new()
    }
}

/// Listener counting deliveries and keeping the last notify.
struct RecordingListener {
    count: watch::Sender<usize>,
    last: Mutex<Option<Notify>>,
}

impl RecordingListener {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            count: watch::channel(0).0,
            last: Mutex::new(None),
        })
    }

    fn count(&self) -> usize {
        *self.count.borrow()
    }

    fn last_event_key(&self) -> Option<String> {
        self.last
            .lock()
            .as_ref()
            .map(|notify| notify.event_key().to_string())
    }

    async fn wait_for(&self, target: usize) {
        let mut rx = self.count.subscribe();
        tokio::time::timeout(WAIT, rx.wait_for(|count| *count >= target))
            .await
            .expect("notify not delivered in time")
            .expect("listener dropped");
    }
}

impl EventListener for RecordingListener {
    fn on_event(&self, notify: &Notify) {
        *self.last.lock() = Some(notify.clone());
        self.count.send_modify(|count| *count += 1);
    }
}

struct Node {
    gateway: Gateway,
    driver: Arc<RecordingDriver>,
    dummy: Device,
    server: ServerHandle,
}

impl Node {
    async fn start() -> Self {
        let config = GatewayConfig::new("test-node")
            .with_listen_address("127.0.0.1:0")
            .with_poll_policy(PollPolicy::new(20, Duration::from_millis(50)));
        let gateway = Gateway::new(config);

        let driver = Arc::new(RecordingDriver::default());
        gateway.drivers().deploy_shared(DRIVER, driver.clone());

        let server = gateway.serve().await.unwrap();
        let dummy = Device::new("DummyDevice")
            .with_network_interface(server.local_addr().to_string(), TcpTransport::NETWORK_TYPE);
        gateway.device_registry().register(dummy.clone());

        Self {
            gateway,
            driver,
            dummy,
            server,
        }
    }

    async fn register(&self, listener: &ListenerHandle, event_key: &str) {
        self.gateway
            .register(listener, &self.dummy, DRIVER, event_key)
            .await
            .unwrap();
    }

    async fn unregister(&self, listener: &ListenerHandle, event_key: &str) {
        self.gateway
            .unregister(listener, &self.dummy, DRIVER, None, event_key)
            .await
            .unwrap();
    }

    async fn emit(&self, notify: Notify) {
        self.gateway.notify(&notify, &self.dummy).await.unwrap();
    }

    /// Sends notifies on one connection, so they are dispatched in order.
    async fn emit_in_order(&self, notifies: Vec<Notify>) {
        let mut connection = TcpTransport::new()
            .connect(&self.server.local_addr().to_string())
            .await
            .unwrap();
        for notify in notifies {
            connection.send(&Message::Notify(notify)).await.unwrap();
        }
        connection.shutdown().await.unwrap();
    }
}

fn handle(listener: &Arc<RecordingListener>) -> ListenerHandle {
    listener.clone()
}

// ============================================================================
// Registration
// ============================================================================

mod registration {
    use super::*;

    #[tokio::test]
    async fn fresh_key_sends_one_register_call() {
        let node = Node::start().await;
        let listener = handle(&RecordingListener::new());

        node.register(&listener, TEST_EVENT_KEY).await;

        assert_eq!(node.driver.count(REGISTER_LISTENER_SERVICE), 1);
        let call = node.driver.last().unwrap();
        assert_eq!(call.driver(), DRIVER);
        assert_eq!(call.parameter(EVENT_KEY_PARAMETER), Some(TEST_EVENT_KEY));
    }

    #[tokio::test]
    async fn same_listener_and_key_sends_no_further_call() {
        let node = Node::start().await;
        let listener = handle(&RecordingListener::new());

        node.register(&listener, TEST_EVENT_KEY).await;
        let first = node.driver.calls().len();
        node.register(&listener, TEST_EVENT_KEY).await;

        assert_eq!(node.driver.calls().len(), first);
    }

    #[tokio::test]
    async fn different_key_sends_independent_call() {
        let node = Node::start().await;
        let listener = handle(&RecordingListener::new());

        node.register(&listener, TEST_EVENT_KEY).await;
        let first = node.driver.calls().len();
        node.register(&listener, TEST_EVENT_KEY_2).await;

        assert_ne!(node.driver.calls().len(), first);
        assert_eq!(
            node.driver.last().unwrap().event_key(),
            Some(TEST_EVENT_KEY_2)
        );
    }

    #[tokio::test]
    async fn extra_parameters_reach_driver() {
        let node = Node::start().await;
        let listener = handle(&RecordingListener::new());

        let mut parameters = ubiqlink::Parameters::new();
        parameters.insert("interval".to_string(), serde_json::json!(250));
        node.gateway
            .register_with_parameters(&listener, &node.dummy, DRIVER, TEST_EVENT_KEY, parameters)
            .await
            .unwrap();

        let call = node.driver.last().unwrap();
        assert_eq!(call.parameter_value("interval"), Some(&serde_json::json!(250)));
        assert_eq!(call.event_key(), Some(TEST_EVENT_KEY));
    }

    #[tokio::test]
    async fn rejected_registration_leaves_no_subscription() {
        let node = Node::start().await;
        let listener = handle(&RecordingListener::new());

        let err = node
            .gateway
            .register(&listener, &node.dummy, DRIVER, REJECTED_EVENT_KEY)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ServiceRejected { .. }));
        let key = SubscriptionKey::new("DummyDevice", DRIVER, REJECTED_EVENT_KEY);
        assert!(!node.gateway.engine().is_subscribed(&key));
    }

    #[tokio::test]
    async fn unknown_device_sends_nothing() {
        let node = Node::start().await;
        let listener = handle(&RecordingListener::new());

        let err = node
            .gateway
            .register(&listener, &Device::new("ghost"), DRIVER, TEST_EVENT_KEY)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::UnknownDevice(ref name) if name == "ghost"));
        assert!(node.driver.calls().is_empty());
    }

    #[tokio::test]
    async fn concurrent_registration_sends_one_call() {
        let node = Node::start().await;
        let first = RecordingListener::new();
        let second = RecordingListener::new();
        let (first_handle, second_handle) = (handle(&first), handle(&second));

        let (a, b) = tokio::join!(
            node.gateway
                .register(&first_handle, &node.dummy, DRIVER, TEST_EVENT_KEY),
            node.gateway
                .register(&second_handle, &node.dummy, DRIVER, TEST_EVENT_KEY),
        );
        a.unwrap();
        b.unwrap();
        assert_eq!(node.driver.count(REGISTER_LISTENER_SERVICE), 1);

        node.emit(Notify::new(TEST_EVENT_KEY).with_driver(DRIVER)).await;
        first.wait_for(1).await;
        second.wait_for(1).await;

        // A sentinel on another key flushes anything still queued.
        let sentinel = RecordingListener::new();
        node.register(&handle(&sentinel), TEST_EVENT_KEY_2).await;
        node.emit_in_order(vec![Notify::new(TEST_EVENT_KEY_2)]).await;
        sentinel.wait_for(1).await;

        assert_eq!(first.count(), 1);
        assert_eq!(second.count(), 1);
    }
}

// ============================================================================
// Delivery
// ============================================================================

mod delivery {
    use super::*;

    #[tokio::test]
    async fn registered_listener_receives_notify() {
        let node = Node::start().await;
        let listener = RecordingListener::new();
        node.register(&handle(&listener), TEST_EVENT_KEY).await;

        node.emit(Notify::new(TEST_EVENT_KEY).with_driver(DRIVER)).await;
        listener.wait_for(1).await;

        assert_eq!(listener.last_event_key().as_deref(), Some(TEST_EVENT_KEY));
    }

    #[tokio::test]
    async fn notify_without_driver_matches_on_event_key() {
        let node = Node::start().await;
        let listener = RecordingListener::new();
        node.register(&handle(&listener), TEST_EVENT_KEY).await;

        node.emit(Notify::new(TEST_EVENT_KEY).with_parameter("level", 3))
            .await;
        listener.wait_for(1).await;

        let last = listener.last.lock().clone().unwrap();
        assert_eq!(last.parameter("level"), Some(&serde_json::json!(3)));
    }

    #[tokio::test]
    async fn unregistered_listener_receives_nothing() {
        let node = Node::start().await;
        let listener = RecordingListener::new();
        let listener_handle = handle(&listener);
        let sentinel = RecordingListener::new();
        node.register(&listener_handle, TEST_EVENT_KEY).await;
        node.register(&handle(&sentinel), TEST_EVENT_KEY_2).await;

        node.emit(Notify::new(TEST_EVENT_KEY).with_driver(DRIVER)).await;
        listener.wait_for(1).await;
        let seen = listener.count();

        node.unregister(&listener_handle, TEST_EVENT_KEY).await;
        assert_eq!(node.driver.count(UNREGISTER_LISTENER_SERVICE), 1);
        assert_eq!(
            node.driver.last().unwrap().event_key(),
            Some(TEST_EVENT_KEY)
        );

        node.emit_in_order(vec![
            Notify::new(TEST_EVENT_KEY).with_driver(DRIVER),
            Notify::new(TEST_EVENT_KEY_2).with_driver(DRIVER),
        ])
        .await;
        sentinel.wait_for(1).await;

        assert_eq!(listener.count(), seen);
    }

    #[tokio::test]
    async fn remaining_listener_keeps_subscription() {
        let node = Node::start().await;
        let leaving = handle(&RecordingListener::new());
        let staying = RecordingListener::new();
        node.register(&leaving, TEST_EVENT_KEY).await;
        node.register(&handle(&staying), TEST_EVENT_KEY).await;

        node.unregister(&leaving, TEST_EVENT_KEY).await;
        assert_eq!(node.driver.count(UNREGISTER_LISTENER_SERVICE), 0);

        node.emit(Notify::new(TEST_EVENT_KEY)).await;
        staying.wait_for(1).await;
    }

    #[tokio::test]
    async fn unregister_all_drops_every_subscription() {
        let node = Node::start().await;
        let listener = handle(&RecordingListener::new());
        node.register(&listener, TEST_EVENT_KEY).await;
        node.register(&listener, TEST_EVENT_KEY_2).await;

        node.gateway.unregister_all(&listener).await.unwrap();

        assert_eq!(node.driver.count(UNREGISTER_LISTENER_SERVICE), 2);
        assert_eq!(node.gateway.engine().table().len(), 0);
    }
}

// ============================================================================
// Bounded reads
// ============================================================================

mod bounded_reads {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn silent_peer_yields_no_response() {
        let silent = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = silent.local_addr().unwrap().to_string();
        let accept = tokio::spawn(async move {
            // Hold the connection open without ever answering.
            let (stream, _) = silent.accept().await.unwrap();
            tokio::time::sleep(WAIT).await;
            drop(stream);
        });

        let config = GatewayConfig::new("caller")
            .with_poll_policy(PollPolicy::new(4, Duration::from_millis(25)));
        let gateway = Gateway::new(config);
        let mute = Device::new("mute").with_network_interface(address, TcpTransport::NETWORK_TYPE);
        gateway.device_registry().register(mute.clone());

        let reply = tokio::time::timeout(
            WAIT,
            gateway.call_service(&mute, &Call::new(DRIVER, "status")),
        )
        .await
        .expect("bounded read must not hang")
        .unwrap();

        assert!(reply.is_none());
        accept.abort();
    }

    #[tokio::test]
    async fn unreachable_device_is_a_connection_error() {
        let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = unused.local_addr().unwrap().to_string();
        drop(unused);

        let gateway = Gateway::new(GatewayConfig::new("caller"));
        let gone = Device::new("gone").with_network_interface(address, TcpTransport::NETWORK_TYPE);
        gateway.device_registry().register(gone.clone());
        let listener = handle(&RecordingListener::new());

        let err = gateway
            .register(&listener, &gone, DRIVER, TEST_EVENT_KEY)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Connection(_)));
        assert!(gateway.engine().table().is_empty());
    }
}
