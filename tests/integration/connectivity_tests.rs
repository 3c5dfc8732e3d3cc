//! Connectivity manager against scripted network and broker adapters.

use std::sync::Arc;

use hammer_node::app::commands::InboundAction;
use hammer_node::app::connectivity::{ConnectivityHandle, ConnectivityManager};
use hammer_node::app::events::StatusEvent;
use hammer_node::app::ports::{NetworkPort, ReportPort};
use hammer_node::config::ConnectivityConfig;
use hammer_node::error::{CommsError, FatalError};
use hammer_node::flags::CommandFlags;

use crate::mock_hw::{RecordingSink, ScriptedBroker, ScriptedNetwork, VirtualClock, broker, network};

type Manager = ConnectivityManager<ScriptedNetwork, ScriptedBroker, VirtualClock, RecordingSink>;

struct Harness {
    manager: Manager,
    clock: VirtualClock,
    sink: RecordingSink,
    flags: Arc<CommandFlags>,
}

fn harness(link: ConnectivityConfig, net: ScriptedNetwork, mqtt: ScriptedBroker) -> Harness {
    let clock = VirtualClock::new();
    let sink = RecordingSink::new();
    let flags = Arc::new(CommandFlags::new());
    let manager = ConnectivityManager::new(
        link,
        net,
        mqtt,
        clock.clone(),
        sink.clone(),
        Arc::clone(&flags),
    );
    Harness {
        manager,
        clock,
        sink,
        flags,
    }
}

fn link(ssids: &[&str], hosts: &[&str]) -> ConnectivityConfig {
    let mut cfg = ConnectivityConfig::default();
    for ssid in ssids {
        cfg.networks.push(network(ssid)).unwrap();
    }
    for host in hosts {
        cfg.brokers.push(broker(host)).unwrap();
    }
    cfg
}

fn connected(link_cfg: ConnectivityConfig, mqtt: ScriptedBroker) -> Harness {
    let mut h = harness(link_cfg, ScriptedNetwork::reaching(&["lab"]), mqtt);
    h.manager.bring_up().unwrap();
    h
}

// ── Network join ──────────────────────────────────────────────

#[test]
fn joins_first_reachable_network_in_order() {
    let mut h = harness(
        link(&["net0", "net1", "net2", "net3"], &["broker"]),
        ScriptedNetwork::reaching(&["net2"]),
        ScriptedBroker::default(),
    );

    assert_eq!(h.manager.join_network(), Ok(2));
    assert_eq!(h.manager.network_index(), Some(2));
    assert_eq!(h.manager.network().begun, ["net0", "net1", "net2"]);
    // Ten 500 ms polls for each of the two dead networks, one for the live one.
    assert_eq!(h.clock.now(), 2 * 10 * 500 + 500);
}

#[test]
fn exhausting_networks_is_fatal() {
    let mut h = harness(
        link(&["a", "b"], &["broker"]),
        ScriptedNetwork::reaching(&[]),
        ScriptedBroker::default(),
    );

    assert_eq!(
        h.manager.bring_up(),
        Err(FatalError::NetworkCandidatesExhausted)
    );
    assert!(h.manager.broker().connect_hosts.is_empty());
    assert_eq!(h.manager.network_index(), None);
}

// ── Broker join ───────────────────────────────────────────────

#[test]
fn broker_candidates_get_three_attempts_each() {
    let fail = Err(CommsError::BrokerConnectFailed);
    let mut h = harness(
        link(&["lab"], &["primary", "backup"]),
        ScriptedNetwork::reaching(&["lab"]),
        ScriptedBroker::scripted([fail, fail, fail, Ok(())]),
    );
    h.manager.join_network().unwrap();
    let joined_at = h.clock.now();

    assert_eq!(h.manager.join_broker(), Ok(1));
    assert_eq!(
        h.manager.broker().connect_hosts,
        ["primary", "primary", "primary", "backup"]
    );
    assert_eq!(h.clock.now() - joined_at, 3 * 2_000);
    assert_eq!(h.manager.broker().subscriptions, ["hammer/actions"]);
}

#[test]
fn exhausting_brokers_is_fatal() {
    let mut h = harness(
        link(&["lab"], &["primary", "backup"]),
        ScriptedNetwork::reaching(&["lab"]),
        ScriptedBroker::always(Err(CommsError::BrokerConnectFailed)),
    );

    assert_eq!(
        h.manager.bring_up(),
        Err(FatalError::BrokerCandidatesExhausted)
    );
    assert_eq!(h.manager.broker().connect_hosts.len(), 6);
}

#[test]
fn result_topic_subscribed_only_when_enabled() {
    let mut cfg = link(&["lab"], &["broker"]);
    cfg.result_topic_enabled = true;
    let h = connected(cfg, ScriptedBroker::default());
    assert_eq!(
        h.manager.broker().subscriptions,
        ["hammer/actions", "hammer/results"]
    );
}

// ── Reconnection ──────────────────────────────────────────────

#[test]
fn twenty_failed_reconnects_are_fatal() {
    let mut mqtt = ScriptedBroker::scripted([Ok(())]);
    mqtt.fallback = Err(CommsError::BrokerConnectFailed);
    let mut h = connected(link(&["lab"], &["broker"]), mqtt);
    let before = h.clock.now();

    assert_eq!(
        h.manager.reconnect(),
        Err(FatalError::ReconnectLimitExceeded { attempts: 20 })
    );
    assert_eq!(h.manager.broker().connect_hosts.len(), 1 + 20);
    assert_eq!(
        h.sink.count(|e| matches!(e, StatusEvent::Reconnecting { .. })),
        20
    );
    // No pause after the final failure.
    assert_eq!(h.clock.now() - before, 19 * 5_000);
}

#[test]
fn single_attempts_share_one_ceiling() {
    let mut mqtt = ScriptedBroker::scripted([Ok(())]);
    mqtt.fallback = Err(CommsError::BrokerConnectFailed);
    let mut h = connected(link(&["lab"], &["broker"]), mqtt);
    let before = h.clock.now();

    for _ in 0..19 {
        assert_eq!(h.manager.try_reconnect(), Ok(false));
    }
    assert_eq!(
        h.manager.try_reconnect(),
        Err(FatalError::ReconnectLimitExceeded { attempts: 20 })
    );
    assert_eq!(h.sink.count(|e| *e == StatusEvent::LinkLost), 1);
    // Pausing between attempts is left to the caller.
    assert_eq!(h.clock.now(), before);
}

#[test]
fn success_resets_attempt_count() {
    let fail = Err(CommsError::BrokerConnectFailed);
    let script = [Ok(()), fail, fail, Ok(())];
    let mut mqtt = ScriptedBroker::scripted(script);
    mqtt.fallback = fail;
    let mut h = connected(link(&["lab"], &["broker"]), mqtt);

    assert_eq!(h.manager.try_reconnect(), Ok(false));
    assert_eq!(h.manager.try_reconnect(), Ok(false));
    assert_eq!(h.manager.try_reconnect(), Ok(true));

    for _ in 0..19 {
        assert_eq!(h.manager.try_reconnect(), Ok(false));
    }
    assert!(h.manager.try_reconnect().is_err());
    assert_eq!(h.sink.count(|e| *e == StatusEvent::LinkLost), 2);
}

#[test]
fn success_on_twentieth_attempt_recovers() {
    let fail = Err(CommsError::BrokerConnectFailed);
    let script = std::iter::once(Ok(()))
        .chain(std::iter::repeat_n(fail, 19))
        .chain(std::iter::once(Ok(())));
    let mut mqtt = ScriptedBroker::scripted(script);
    mqtt.fallback = fail;
    let mut h = connected(link(&["lab"], &["broker"]), mqtt);

    assert_eq!(h.manager.reconnect(), Ok(()));
    assert!(h.manager.is_link_up());
    assert_eq!(h.manager.broker().connect_hosts.len(), 1 + 20);
    // Resubscribed after the reconnect.
    assert_eq!(h.manager.broker().subscriptions.len(), 2);
}

#[test]
fn reconnect_reuses_retained_broker() {
    let fail = Err(CommsError::BrokerConnectFailed);
    let mqtt = ScriptedBroker::scripted([fail, fail, fail, Ok(()), fail, Ok(())]);
    let mut h = connected(link(&["lab"], &["primary", "backup"]), mqtt);
    assert_eq!(h.manager.broker_index(), Some(1));

    h.manager.reconnect().unwrap();
    let hosts = &h.manager.broker().connect_hosts;
    assert_eq!(&hosts[4..], ["backup", "backup"]);
}

#[test]
fn reconnect_rejoins_dropped_network() {
    let mut h = connected(link(&["other", "lab"], &["broker"]), ScriptedBroker::default());
    h.manager.network_mut().drop_link();
    h.manager.broker_mut().connected = false;

    h.manager.reconnect().unwrap();
    assert_eq!(h.manager.network().begun, ["other", "lab", "lab"]);
    assert!(h.manager.network().is_joined());
}

// ── Publishing ────────────────────────────────────────────────

#[test]
fn publish_while_disconnected_reconnects_once() {
    let mut h = connected(link(&["lab"], &["broker"]), ScriptedBroker::default());
    h.manager.broker_mut().connected = false;

    assert_eq!(h.manager.publish_report("{\"encoder\":[]}"), Ok(true));
    assert_eq!(h.sink.count(|e| *e == StatusEvent::LinkLost), 1);
    assert_eq!(h.manager.broker().connect_hosts.len(), 2);
    assert_eq!(
        h.manager.broker().published,
        [("node/hammer".to_owned(), "{\"encoder\":[]}".to_owned())]
    );
}

#[test]
fn failed_publish_is_not_retried() {
    let mut h = connected(link(&["lab"], &["broker"]), ScriptedBroker::default());
    h.manager.broker_mut().publish_fails = true;

    assert_eq!(h.manager.publish_report("{}"), Ok(false));
    assert_eq!(h.sink.count(|e| *e == StatusEvent::PublishFailed), 1);
    assert_eq!(h.sink.count(|e| *e == StatusEvent::LinkLost), 0);
}

#[test]
fn handle_publishes_through_shared_manager() {
    let h = connected(link(&["lab"], &["broker"]), ScriptedBroker::default());
    let mut handle = ConnectivityHandle::new(h.manager);
    let other = handle.clone();

    assert_eq!(handle.publish_report("{}"), Ok(true));
    assert_eq!(other.lock().broker().published.len(), 1);
}

// ── Inbound dispatch ──────────────────────────────────────────

#[test]
fn start_test_on_command_topic_sets_start_flag() {
    let mut h = connected(link(&["lab"], &["broker"]), ScriptedBroker::default());
    h.manager.broker_mut().push_inbound("hammer/actions", b"noise");
    h.manager.broker_mut().push_inbound("elsewhere", b"start_test");
    h.manager.service_inbound();
    assert!(!h.flags.start_pending());

    h.manager.broker_mut().push_inbound("hammer/actions", b"start_test");
    h.manager.service_inbound();
    assert!(h.flags.start_pending());
    assert!(h.manager.broker().inbound.is_empty());
}

#[test]
fn result_topic_ignored_unless_enabled() {
    let mut h = connected(link(&["lab"], &["broker"]), ScriptedBroker::default());
    let msg = hammer_node::app::commands::InboundMessage::new("hammer/results", b"OK").unwrap();
    assert_eq!(h.manager.dispatch(&msg), None);

    let mut cfg = link(&["lab"], &["broker"]);
    cfg.result_topic_enabled = true;
    let mut h = connected(cfg, ScriptedBroker::default());
    assert_eq!(h.manager.dispatch(&msg), Some(InboundAction::ResultAccepted));
    assert_eq!(
        h.sink
            .count(|e| *e == StatusEvent::ResultAcknowledged { accepted: true }),
        1
    );
    assert!(!h.flags.start_pending());
}
