//! The meter loop: one estimation pass per tick, controlled over a command channel.

use std::io;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{unbounded, Receiver, Sender, TryRecvError};

use crate::capture::CaptureSource;
use crate::presenter::Presenter;
use crate::session::{Session, SessionConfig};

/// Paces the meter loop.
pub trait TickSource {
    /// Block until the next tick is due. Returns false once the source has no more ticks.
    fn wait_for_tick(&mut self) -> bool;
}

/// Fixed rate ticks on the wall clock. A late tick does not cause a burst of catch-up ticks.
pub struct FrameClock {
    interval: Duration,
    next_deadline: Option<Instant>,
}

impl FrameClock {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_deadline: None,
        }
    }
}

impl TickSource for FrameClock {
    fn wait_for_tick(&mut self) -> bool {
        let now = Instant::now();
        let deadline = self.next_deadline.unwrap_or(now);
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline.max(now) + self.interval);
        true
    }
}

/// A fixed number of ticks delivered immediately.
pub struct SyntheticTicks {
    remaining: usize,
}

impl SyntheticTicks {
    pub fn new(count: usize) -> Self {
        Self { remaining: count }
    }
}

impl TickSource for SyntheticTicks {
    fn wait_for_tick(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeterCommand {
    Start,
    Stop,
    ResetPeak,
    Shutdown,
}

pub struct MeterLoop<S: CaptureSource, T: TickSource, P: Presenter> {
    session: Session<S>,
    ticks: T,
    presenter: P,
    commands: Receiver<MeterCommand>,
}

impl<S: CaptureSource, T: TickSource, P: Presenter> MeterLoop<S, T, P> {
    pub fn new(session: Session<S>, ticks: T, presenter: P, commands: Receiver<MeterCommand>) -> Self {
        Self {
            session,
            ticks,
            presenter,
            commands,
        }
    }

    /// Run until shutdown, until every command sender is gone, or until the tick source runs dry.
    /// Capture is released on every exit path.
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn run(mut self) -> (Session<S>, P) {
        tracing::info!("Meter loop started");

        'outer: loop {
            loop {
                match self.commands.try_recv() {
                    Ok(MeterCommand::Shutdown) => break 'outer,
                    Ok(command) => self.handle_command(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        tracing::debug!("All meter command senders dropped");
                        break 'outer;
                    }
                }
            }

            if !self.ticks.wait_for_tick() {
                tracing::debug!("Tick source exhausted");
                break;
            }

            if let Some(outcome) = self.session.tick() {
                if let Some(celebration) = &outcome.celebration {
                    self.presenter.celebrate(celebration);
                }
                self.presenter.present(&self.session.frame());
            }
        }

        if self.session.stop() {
            self.presenter.stopped();
        }
        tracing::info!("Meter loop stopped");

        (self.session, self.presenter)
    }

    fn handle_command(&mut self, command: MeterCommand) {
        tracing::debug!("Meter command: {:?}", command);
        match command {
            MeterCommand::Start => {
                if let Err(e) = self.session.start() {
                    self.presenter.capture_failed(&e);
                }
            },
            MeterCommand::Stop => {
                if self.session.stop() {
                    self.presenter.stopped();
                }
            },
            MeterCommand::ResetPeak => self.session.reset_peak(),
            MeterCommand::Shutdown => {}
        }
    }
}

/// Control side of a meter running on its own thread.
pub struct MeterHandle {
    commands: Sender<MeterCommand>,
    thread: Option<JoinHandle<()>>,
}

impl MeterHandle {
    pub fn start(&self) {
        self.send(MeterCommand::Start);
    }

    pub fn stop(&self) {
        self.send(MeterCommand::Stop);
    }

    pub fn reset_peak(&self) {
        self.send(MeterCommand::ResetPeak);
    }

    /// Stop the loop and wait for the capture to be released.
    pub fn shutdown(mut self) {
        self.send(MeterCommand::Shutdown);
        self.join();
    }

    fn send(&self, command: MeterCommand) {
        if self.commands.send(command).is_err() {
            tracing::error!("Failed to send {:?}, the meter thread has exited", command);
        }
    }

    fn join(&mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Meter thread panicked");
            }
        }
    }
}

impl Drop for MeterHandle {
    fn drop(&mut self) {
        if self.thread.is_some() {
            let _ = self.commands.send(MeterCommand::Shutdown);
            self.join();
        }
    }
}

/// Run a meter on a dedicated thread. The capture source is opened on that thread, so its
/// handles never have to cross threads.
pub fn spawn_meter_thread<S, T, P>(source: S, config: SessionConfig, ticks: T, presenter: P) -> io::Result<MeterHandle>
where
    S: CaptureSource + Send + 'static,
    T: TickSource + Send + 'static,
    P: Presenter + Send + 'static,
{
    let (command_sender, command_receiver) = unbounded();

    let thread = std::thread::Builder::new().name("MeterThread".to_string()).spawn(move || {
        let session = Session::new(source, config);
        MeterLoop::new(session, ticks, presenter, command_receiver).run();
    })?;

    Ok(MeterHandle {
        commands: command_sender,
        thread: Some(thread),
    })
}
