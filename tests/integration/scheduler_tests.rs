//! Both scheduling contexts stepped by hand, plus spawn and supervision.

use std::collections::VecDeque;
use std::sync::{Arc, mpsc};

use hammer_node::app::commands::{Command, CommandSource};
use hammer_node::app::connectivity::{ConnectivityHandle, ConnectivityManager};
use hammer_node::app::events::StatusEvent;
use hammer_node::app::ports::{PositionEdge, PositionSensePort, RestartPort};
use hammer_node::app::sequencer::{RunState, TestSequencer};
use hammer_node::config::{ConnectivityConfig, RigConfig};
use hammer_node::drivers::button::DebouncedInputs;
use hammer_node::error::{CommsError, FatalError};
use hammer_node::flags::{CommandFlags, FlagConsumer};
use hammer_node::scheduler::{ConnectivityContext, IoContext, spawn_contexts};
use hammer_node::supervisor::supervise;

use crate::mock_hw::{
    InstantPosition, MockPin, MockRig, RecordingReporter, RecordingSink, ScriptedBroker,
    ScriptedLines, ScriptedNetwork, SteadyCounter, VirtualClock, broker, network,
};

// ── Context B ─────────────────────────────────────────────────

struct IoBench<P> {
    ctx: IoContext<
        SteadyCounter,
        MockRig,
        P,
        VirtualClock,
        RecordingSink,
        RecordingReporter,
        MockPin,
        MockPin,
    >,
    flags: Arc<CommandFlags>,
    start_pin: MockPin,
    drop_pin: MockPin,
    clock: VirtualClock,
    sink: RecordingSink,
}

fn io_bench<P: PositionSensePort>(position: P, flags: Arc<CommandFlags>) -> IoBench<P> {
    let consumer: FlagConsumer = flags.claim_consumer().unwrap();
    let clock = VirtualClock::new();
    let sink = RecordingSink::new();
    let start_pin = MockPin::released();
    let drop_pin = MockPin::released();
    let rig = RigConfig::default();
    let ctx = IoContext::new(
        TestSequencer::new(rig.clone(), SteadyCounter::default()),
        DebouncedInputs::new(start_pin.clone(), drop_pin.clone(), rig.debounce_ms, Arc::clone(&flags)),
        MockRig::new(clock.clone()),
        position,
        clock.clone(),
        sink.clone(),
        RecordingReporter::default(),
        consumer,
        rig.drop_pulse_ms,
        rig.loop_yield_ms,
    );
    IoBench {
        ctx,
        flags,
        start_pin,
        drop_pin,
        clock,
        sink,
    }
}

#[test]
fn idle_step_only_yields() {
    let mut b = io_bench(InstantPosition::default(), Arc::new(CommandFlags::new()));
    b.ctx.step().unwrap();
    assert_eq!(b.clock.now(), 10);
    assert!(b.sink.events().is_empty());
}

#[test]
fn start_flag_runs_one_test_and_clears() {
    let mut b = io_bench(InstantPosition::default(), Arc::new(CommandFlags::new()));
    b.flags.request_start();

    b.ctx.step().unwrap();
    assert!(!b.flags.start_pending());
    assert_eq!(b.sink.count(|e| *e == StatusEvent::TestStarted), 1);
    assert_eq!(b.ctx.sequencer().state(), RunState::Idle);

    b.ctx.step().unwrap();
    assert_eq!(b.sink.count(|e| *e == StatusEvent::TestStarted), 1);
}

/// Position sensors that also press "start" again while the arm moves.
struct RestartingPosition {
    flags: Arc<CommandFlags>,
}

impl PositionSensePort for RestartingPosition {
    fn drain(&self, _edge: PositionEdge) -> bool {
        false
    }

    fn wait(&self, _edge: PositionEdge) {
        self.flags.request_start();
    }
}

#[test]
fn start_requested_mid_run_is_discarded() {
    let flags = Arc::new(CommandFlags::new());
    let position = RestartingPosition {
        flags: Arc::clone(&flags),
    };
    let mut b = io_bench(position, flags);
    b.flags.request_start();

    b.ctx.step().unwrap();
    assert!(!b.flags.start_pending());
    b.ctx.step().unwrap();
    assert_eq!(b.sink.count(|e| *e == StatusEvent::TestStarted), 1);
}

#[test]
fn drop_flag_pulses_magnet_and_clears() {
    let mut b = io_bench(InstantPosition::default(), Arc::new(CommandFlags::new()));
    b.flags.request_drop();

    b.ctx.step().unwrap();
    assert!(!b.flags.drop_pending());
    assert_eq!(b.sink.count(|e| *e == StatusEvent::Dropped), 1);
    // 500 ms pulse plus the 10 ms yield
    assert_eq!(b.clock.now(), 510);
}

#[test]
fn drop_button_needs_debounce_interval() {
    let mut b = io_bench(InstantPosition::default(), Arc::new(CommandFlags::new()));
    b.drop_pin.press();

    for _ in 0..5 {
        b.ctx.step().unwrap();
    }
    assert_eq!(b.sink.count(|e| *e == StatusEvent::Dropped), 0);

    b.ctx.step().unwrap();
    assert_eq!(
        b.sink.count(|e| *e
            == StatusEvent::CommandAccepted {
                command: Command::Drop,
                source: CommandSource::Button
            }),
        1
    );
    assert_eq!(b.sink.count(|e| *e == StatusEvent::Dropped), 1);

    // Holding the button does not repeat the request.
    b.ctx.step().unwrap();
    assert_eq!(b.sink.count(|e| *e == StatusEvent::Dropped), 1);
}

#[test]
fn start_button_runs_a_test() {
    let mut b = io_bench(InstantPosition::default(), Arc::new(CommandFlags::new()));
    b.start_pin.press();

    while b.clock.now() < 50 {
        b.ctx.step().unwrap();
    }
    assert_eq!(b.sink.count(|e| *e == StatusEvent::TestStarted), 0);

    b.ctx.step().unwrap();
    assert_eq!(b.sink.count(|e| *e == StatusEvent::TestStarted), 1);
    assert!(!b.flags.start_pending());
}

// ── Context A ─────────────────────────────────────────────────

type LinkHandle = ConnectivityHandle<ScriptedNetwork, ScriptedBroker, VirtualClock, RecordingSink>;

fn link_handle(mqtt: ScriptedBroker, flags: &Arc<CommandFlags>) -> LinkHandle {
    let mut cfg = ConnectivityConfig::default();
    cfg.networks.push(network("lab")).unwrap();
    cfg.brokers.push(broker("broker")).unwrap();
    let mut manager = ConnectivityManager::new(
        cfg,
        ScriptedNetwork::reaching(&["lab"]),
        mqtt,
        VirtualClock::new(),
        RecordingSink::new(),
        Arc::clone(flags),
    );
    manager.bring_up().unwrap();
    ConnectivityHandle::new(manager)
}

fn console(lines: &[&'static str]) -> ScriptedLines {
    ScriptedLines {
        lines: lines.iter().copied().collect::<VecDeque<_>>(),
    }
}

#[test]
fn console_lines_set_flags() {
    let flags = Arc::new(CommandFlags::new());
    let link = link_handle(ScriptedBroker::default(), &flags);
    let sink = RecordingSink::new();
    let mut ctx = ConnectivityContext::new(
        link,
        console(&["start", "launch", " DROP "]),
        Arc::clone(&flags),
        VirtualClock::new(),
        sink.clone(),
        10,
    );

    ctx.step().unwrap();
    assert!(flags.start_pending());
    assert!(flags.drop_pending());
    assert_eq!(
        sink.count(|e| matches!(
            e,
            StatusEvent::CommandAccepted {
                source: CommandSource::Console,
                ..
            }
        )),
        2
    );
}

#[test]
fn remote_start_reaches_flags_through_context() {
    let flags = Arc::new(CommandFlags::new());
    let link = link_handle(ScriptedBroker::default(), &flags);
    link.lock()
        .broker_mut()
        .push_inbound("hammer/actions", b"start_test");
    let mut ctx = ConnectivityContext::new(
        link,
        console(&[]),
        Arc::clone(&flags),
        VirtualClock::new(),
        RecordingSink::new(),
        10,
    );

    ctx.step().unwrap();
    assert!(flags.start_pending());
    assert!(!flags.drop_pending());
}

#[test]
fn console_is_serviced_while_link_is_down() {
    let flags = Arc::new(CommandFlags::new());
    let mut mqtt = ScriptedBroker::scripted([Ok(())]);
    mqtt.fallback = Err(CommsError::BrokerConnectFailed);
    let link = link_handle(mqtt, &flags);
    link.lock().broker_mut().connected = false;
    let clock = VirtualClock::new();

    let mut ctx = ConnectivityContext::new(
        link.clone(),
        console(&["START"]),
        Arc::clone(&flags),
        clock.clone(),
        RecordingSink::new(),
        10,
    );
    ctx.step().unwrap();
    assert!(flags.start_pending());
    assert_eq!(link.lock().broker().connect_hosts.len(), 1 + 1);

    // Steps inside the reconnect interval do not retry.
    while clock.now() < 5_000 {
        ctx.step().unwrap();
    }
    assert_eq!(link.lock().broker().connect_hosts.len(), 1 + 1);
    ctx.step().unwrap();
    assert_eq!(link.lock().broker().connect_hosts.len(), 1 + 2);
}

#[test]
fn lost_link_that_never_returns_stops_context() {
    let flags = Arc::new(CommandFlags::new());
    let mut mqtt = ScriptedBroker::scripted([Ok(())]);
    mqtt.fallback = Err(CommsError::BrokerConnectFailed);
    let link = link_handle(mqtt, &flags);
    link.lock().broker_mut().connected = false;
    let clock = VirtualClock::new();

    let ctx = ConnectivityContext::new(
        link.clone(),
        console(&[]),
        Arc::clone(&flags),
        clock.clone(),
        RecordingSink::new(),
        10,
    );
    assert_eq!(
        ctx.run(),
        FatalError::ReconnectLimitExceeded { attempts: 20 }
    );
    assert_eq!(link.lock().broker().connect_hosts.len(), 1 + 20);
    assert!(clock.now() >= 19 * 5_000);
}

// ── Spawning and supervision ──────────────────────────────────

#[derive(Default)]
struct CountingRestart(u32);

impl RestartPort for CountingRestart {
    fn restart(&mut self, _reason: &FatalError) {
        self.0 += 1;
    }
}

#[test]
fn first_context_failure_restarts_device() {
    let (tx, rx) = mpsc::channel();
    spawn_contexts(
        || FatalError::ReconnectLimitExceeded { attempts: 20 },
        || FatalError::ReconnectLimitExceeded { attempts: 20 },
        &tx,
    )
    .unwrap();
    drop(tx);

    let mut restart = CountingRestart::default();
    assert_eq!(
        supervise(&rx, &mut restart),
        FatalError::ReconnectLimitExceeded { attempts: 20 }
    );
    assert_eq!(restart.0, 1);
}
