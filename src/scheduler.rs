//! Dual-context scheduler.
//!
//! ```text
//! ┌──────────────────────────────┐      ┌──────────────────────────────┐
//! │ Context A (core 0)           │      │ Context B (core 1)           │
//! │  connectivity + console      │      │  buttons + sequencer + drop  │
//! │                              │      │                              │
//! │  link down? ─▶ one attempt   │      │  poll DebouncedInputs        │
//! │  else ─▶ service inbound     │      │  start? ─▶ TestSequencer::run│
//! │  console lines ─▶ flags      │      │  drop?  ─▶ 500 ms pulse      │
//! │  yield 10 ms                 │      │  yield 10 ms                 │
//! └──────────────┬───────────────┘      └───────────────┬──────────────┘
//!                │   CommandFlags (set ─▶ B clears)     │
//!                │   ConnectivityHandle (publish) ◀─────┘
//!                ▼                                      ▼
//!          FatalError ──────── mpsc ──────▶ supervisor ──▶ restart
//! ```
//!
//! The two contexts never share a call stack.  Context A never blocks
//! without a bound and keeps reading the console through an outage;
//! context B may block indefinitely inside the sequencer's position waits.

use std::sync::Arc;
use std::sync::mpsc::Sender;

use embedded_hal::digital::InputPin;
use log::{error, info};

use crate::app::commands::{Command, CommandSource, parse_console_line};
use crate::app::connectivity::ConnectivityHandle;
use crate::app::events::StatusEvent;
use crate::app::ports::{
    AccelerometerPort, ActuatorPort, BrokerPort, EnvironmentPort, LinePort, NetworkPort, Output,
    PositionSensePort, PulseCounter, ReportPort, StatusSink, TimePort,
};
use crate::app::sequencer::TestSequencer;
use crate::drivers::actuator::pulse_output;
use crate::drivers::button::DebouncedInputs;
use crate::drivers::task_pin::{ContextSpec, Core, spawn_on_core};
use crate::error::FatalError;
use crate::flags::{CommandFlags, FlagConsumer};

pub const CONNECTIVITY_CONTEXT: ContextSpec = ContextSpec {
    core: Core::Pro,
    priority: 5,
    stack_kb: 8,
    name: "link\0",
};

pub const IO_CONTEXT: ContextSpec = ContextSpec {
    core: Core::App,
    priority: 10,
    stack_kb: 16,
    name: "io\0",
};

// ═══════════════════════════════════════════════════════════════
//  Context A — connectivity and console
// ═══════════════════════════════════════════════════════════════

pub struct ConnectivityContext<N, B, T, S, L> {
    link: ConnectivityHandle<N, B, T, S>,
    console: L,
    flags: Arc<CommandFlags>,
    time: T,
    sink: S,
    yield_ms: u32,
    next_attempt_ms: u64,
}

impl<N, B, T, S, L> ConnectivityContext<N, B, T, S, L>
where
    N: NetworkPort,
    B: BrokerPort,
    T: TimePort,
    S: StatusSink,
    L: LinePort,
{
    pub fn new(
        link: ConnectivityHandle<N, B, T, S>,
        console: L,
        flags: Arc<CommandFlags>,
        time: T,
        sink: S,
        yield_ms: u32,
    ) -> Self {
        Self {
            link,
            console,
            flags,
            time,
            sink,
            yield_ms,
            next_attempt_ms: 0,
        }
    }

    /// One loop iteration.
    ///
    /// While the link is down at most one reconnect attempt is made per
    /// reconnect interval, and the console is serviced on every iteration.
    /// A fatal reconnect still lets pending console lines through first.
    pub fn step(&mut self) -> Result<(), FatalError> {
        let outcome = self.service_link();
        self.service_console();
        outcome?;
        self.time.sleep_ms(self.yield_ms);
        Ok(())
    }

    fn service_link(&mut self) -> Result<(), FatalError> {
        let mut link = self.link.lock();
        if link.is_link_up() {
            link.service_inbound();
            return Ok(());
        }
        let now = self.time.uptime_ms();
        if now < self.next_attempt_ms {
            return Ok(());
        }
        if !link.try_reconnect()? {
            self.next_attempt_ms = now + u64::from(link.reconnect_delay_ms());
        }
        Ok(())
    }

    /// Turn every complete console line into a flag request.
    pub fn service_console(&mut self) {
        while let Some(line) = self.console.read_line() {
            let Some(command) = parse_console_line(&line) else {
                continue;
            };
            match command {
                Command::Start => self.flags.request_start(),
                Command::Drop => self.flags.request_drop(),
            }
            self.sink.emit(&StatusEvent::CommandAccepted {
                command,
                source: CommandSource::Console,
            });
        }
    }

    /// Loop until a fatal condition.
    pub fn run(mut self) -> FatalError {
        info!("link context running");
        loop {
            if let Err(e) = self.step() {
                return e;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Context B — physical I/O and test execution
// ═══════════════════════════════════════════════════════════════

pub struct IoContext<C, H, P, T, S, R, SP, DP> {
    sequencer: TestSequencer<C>,
    inputs: DebouncedInputs<SP, DP>,
    hw: H,
    position: P,
    time: T,
    sink: S,
    reporter: R,
    consumer: FlagConsumer,
    drop_pulse_ms: u32,
    yield_ms: u32,
}

impl<C, H, P, T, S, R, SP, DP> IoContext<C, H, P, T, S, R, SP, DP>
where
    C: PulseCounter,
    H: ActuatorPort + EnvironmentPort + AccelerometerPort,
    P: PositionSensePort,
    T: TimePort,
    S: StatusSink,
    R: ReportPort,
    SP: InputPin,
    DP: InputPin,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        sequencer: TestSequencer<C>,
        inputs: DebouncedInputs<SP, DP>,
        hw: H,
        position: P,
        time: T,
        sink: S,
        reporter: R,
        consumer: FlagConsumer,
        drop_pulse_ms: u32,
        yield_ms: u32,
    ) -> Self {
        Self {
            sequencer,
            inputs,
            hw,
            position,
            time,
            sink,
            reporter,
            consumer,
            drop_pulse_ms,
            yield_ms,
        }
    }

    /// One loop iteration.
    pub fn step(&mut self) -> Result<(), FatalError> {
        self.inputs.poll(self.time.uptime_ms() as u32, &mut self.sink);

        if self.consumer.take_start() {
            self.sequencer.run(
                &mut self.hw,
                &self.position,
                &self.time,
                &mut self.sink,
                &mut self.reporter,
            )?;
            if self.consumer.discard_start() {
                info!("io: start requested during run, discarded");
            }
        }

        if self.consumer.drop_pending() {
            pulse_output(&mut self.hw, &self.time, Output::MagnetDrop, self.drop_pulse_ms);
            self.sink.emit(&StatusEvent::Dropped);
            self.consumer.clear_drop();
        }

        self.time.sleep_ms(self.yield_ms);
        Ok(())
    }

    pub fn sequencer(&self) -> &TestSequencer<C> {
        &self.sequencer
    }

    /// Loop until a fatal condition.
    pub fn run(mut self) -> FatalError {
        info!("io context running");
        loop {
            if let Err(e) = self.step() {
                return e;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Spawning
// ═══════════════════════════════════════════════════════════════

/// Start both contexts on their cores.  Each reports its fatal error on `fatal`.
pub fn spawn_contexts<A, B>(
    link: A,
    io: B,
    fatal: &Sender<FatalError>,
) -> std::io::Result<()>
where
    A: FnOnce() -> FatalError + Send + 'static,
    B: FnOnce() -> FatalError + Send + 'static,
{
    let tx = fatal.clone();
    spawn_on_core(CONNECTIVITY_CONTEXT, move || report(&tx, link()))?;
    let tx = fatal.clone();
    spawn_on_core(IO_CONTEXT, move || report(&tx, io()))?;
    Ok(())
}

fn report(tx: &Sender<FatalError>, reason: FatalError) {
    error!("context stopped: {reason}");
    let _ = tx.send(reason);
}
