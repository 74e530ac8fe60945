use dendrite_link::{
    ChannelObserver, ConnectionStatus, ConnectionSupervisor, Endpoints, Inbound, LinkConfig,
    LinkEvent, LinkState,
};
use dendrite_test_support::{spawn_echo_backend, unused_port, ECHO_GREETING};
use serde_json::json;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

async fn wait_until<F>(supervisor: &ConnectionSupervisor, mut pred: F) -> LinkState
where
    F: FnMut(&LinkState) -> bool,
{
    let mut rx = supervisor.subscribe();
    let state = timeout(Duration::from_secs(10), rx.wait_for(|s| pred(s)))
        .await
        .expect("state never reached")
        .expect("supervisor gone")
        .clone();
    state
}

async fn next_message(events: &mut mpsc::UnboundedReceiver<LinkEvent>) -> (Inbound, u16) {
    loop {
        let event = timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("no message arrived")
            .expect("observer dropped");
        if let LinkEvent::Message { payload, port } = event {
            return (payload, port);
        }
    }
}

#[tokio::test]
async fn discovers_echo_backend_behind_a_dead_port() {
    let dead = unused_port().await.unwrap();
    let (live, backend) = spawn_echo_backend().await.unwrap();

    let (_endpoints, endpoints_rx) = watch::channel(Endpoints::new("127.0.0.1", [dead, live]));
    let (observer, mut events) = ChannelObserver::new();
    let supervisor = ConnectionSupervisor::websocket(
        endpoints_rx,
        LinkConfig::default().with_attempt_timeout(Duration::from_millis(200)),
        observer,
    );

    supervisor.enable();
    let state = wait_until(&supervisor, |s| s.status == ConnectionStatus::Connected).await;
    assert_eq!(state.connected_ports, vec![live]);

    // The greeting is plain text and arrives as a raw envelope.
    assert_eq!(
        next_message(&mut events).await,
        (Inbound::Raw(ECHO_GREETING.to_string()), live)
    );

    let port = supervisor
        .send(&json!({"front": "perro", "back": "dog"}), None)
        .await
        .unwrap();
    assert_eq!(port, live);
    assert_eq!(
        next_message(&mut events).await,
        (Inbound::Document(json!({"front": "perro", "back": "dog"})), live)
    );

    // Backend dies: the supervisor goes back to searching on its own.
    backend.abort();
    let state = wait_until(&supervisor, |s| s.status == ConnectionStatus::Connecting).await;
    assert!(state.connected_ports.is_empty());

    supervisor.disable().await;
    assert_eq!(supervisor.status(), ConnectionStatus::Disconnected);
}
