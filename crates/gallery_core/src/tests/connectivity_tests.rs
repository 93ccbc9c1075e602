use super::*;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

#[test]
fn observe_only_reports_real_transitions() {
    let state = ConnectivityState::new(Connectivity::Online);
    let gate = ConnectivityGate::new(&state);

    assert!(!gate.observe(Connectivity::Online));
    assert!(gate.observe(Connectivity::Offline));
    assert!(!gate.observe(Connectivity::Offline));
    assert!(state.is_offline());
    assert!(gate.observe(Connectivity::Online));
    assert!(!state.is_offline());
}

#[test]
fn banner_is_shown_only_while_offline() {
    let state = ConnectivityState::new(Connectivity::Offline);
    let gate = ConnectivityGate::new(&state);
    assert_eq!(gate.banner(), Some(OFFLINE_BANNER));

    gate.observe(Connectivity::Online);
    assert_eq!(gate.banner(), None);
}

#[test]
fn subscriptions_are_released_on_unsubscribe() {
    let state = ConnectivityState::new(Connectivity::Online);
    let first = state.subscribe();
    let second = state.subscribe();
    assert_eq!(state.subscriber_count(), 2);

    first.unsubscribe();
    assert_eq!(state.subscriber_count(), 1);
    drop(second);
    assert_eq!(state.subscriber_count(), 0);
}

#[tokio::test]
async fn subscribers_see_transitions() {
    let state = ConnectivityState::new(Connectivity::Online);
    let gate = ConnectivityGate::new(&state);
    let mut subscription = state.subscribe();

    gate.observe(Connectivity::Offline);
    assert_eq!(subscription.changed().await, Some(Connectivity::Offline));
    assert_eq!(subscription.current(), Connectivity::Offline);
}

#[tokio::test]
async fn follow_applies_signals_from_the_environment() {
    let state = ConnectivityState::new(Connectivity::Online);
    let gate = ConnectivityGate::new(&state);
    let (tx, rx) = mpsc::channel(4);

    let listener = gate.follow(ReceiverStream::new(rx));
    tx.send(Connectivity::Offline).await.expect("send offline");
    tx.send(Connectivity::Online).await.expect("send online");
    tx.send(Connectivity::Offline).await.expect("send offline again");
    drop(tx);

    listener.await.expect("listener finished");
    assert!(state.is_offline());
}
