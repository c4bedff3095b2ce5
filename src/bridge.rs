//! Host bridge
//!
//! The host owns two level-triggered flags and wants snapshots back. Hosts
//! that live on the same thread call `Controller::observe` and `subscribe`
//! directly; hosts that prefer message passing use `channel`, which splits
//! the boundary into a command channel (host to core) and an event channel
//! (core to host).

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::platform::input::RawEvent;
use crate::renderer::Frame;
use crate::sim::controller::Controller;
use crate::sim::state::Snapshot;

/// The two host-owned control flags, sampled once per host render
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostFlags {
    pub want_playing: bool,
    pub want_paused: bool,
}

/// Host to core
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    SetFlags(HostFlags),
    Start,
    Pause,
    Resume,
    Restart,
    Input(RawEvent),
    /// Wall-clock time since the previous host frame
    Frame(Duration),
    Unmount,
}

/// Core to host
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    State(Snapshot),
    /// Rendered after a host frame that ran at least one tick
    Frame(Frame),
}

/// Host side of the bridge
#[derive(Debug)]
pub struct HostHandle {
    commands: Sender<HostCommand>,
    events: Receiver<HostEvent>,
}

impl HostHandle {
    pub fn send(&self, command: HostCommand) -> Result<(), EngineError> {
        self.commands
            .send(command)
            .map_err(|_| EngineError::ChannelClosed)
    }

    pub fn set_flags(&self, want_playing: bool, want_paused: bool) -> Result<(), EngineError> {
        self.send(HostCommand::SetFlags(HostFlags {
            want_playing,
            want_paused,
        }))
    }

    /// Next pending event, if any
    pub fn try_event(&self) -> Result<Option<HostEvent>, EngineError> {
        match self.events.try_recv() {
            Ok(event) => Ok(Some(event)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(EngineError::ChannelClosed),
        }
    }

    /// Every pending event
    pub fn drain(&self) -> Vec<HostEvent> {
        self.events.try_iter().collect()
    }
}

/// Core side of the bridge: owns the controller
pub struct CoreEndpoint {
    controller: Controller,
    commands: Receiver<HostCommand>,
    events: Sender<HostEvent>,
    host_gone: bool,
}

/// Wrap a controller in a command/event channel pair
pub fn channel(mut controller: Controller) -> (HostHandle, CoreEndpoint) {
    let (command_tx, command_rx) = mpsc::channel();
    let (event_tx, event_rx) = mpsc::channel();

    let observer_tx = event_tx.clone();
    controller.subscribe(move |snapshot| {
        // A host that stopped listening is not an error for the core
        let _ = observer_tx.send(HostEvent::State(*snapshot));
    });

    (
        HostHandle {
            commands: command_tx,
            events: event_rx,
        },
        CoreEndpoint {
            controller,
            commands: command_rx,
            events: event_tx,
            host_gone: false,
        },
    )
}

impl CoreEndpoint {
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Apply every queued command. Returns how many were handled.
    ///
    /// Once the host handle is dropped the endpoint unmounts the controller.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            match self.commands.try_recv() {
                Ok(command) => {
                    self.apply(command);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    if !self.host_gone {
                        log::info!("host handle dropped; unmounting");
                        self.host_gone = true;
                        self.controller.unmount();
                    }
                    break;
                }
            }
        }
        handled
    }

    fn apply(&mut self, command: HostCommand) {
        log::trace!("bridge command {:?}", command);
        match command {
            HostCommand::SetFlags(flags) => self.controller.observe(flags),
            HostCommand::Start => {
                self.controller.start();
            }
            HostCommand::Pause => {
                self.controller.pause();
            }
            HostCommand::Resume => {
                self.controller.resume();
            }
            HostCommand::Restart => {
                self.controller.restart();
            }
            HostCommand::Input(event) => self.controller.handle_input(&event),
            HostCommand::Frame(dt) => {
                if self.controller.frame_elapsed(dt) > 0 {
                    let _ = self
                        .events
                        .send(HostEvent::Frame(self.controller.frame().clone()));
                }
            }
            HostCommand::Unmount => self.controller.unmount(),
        }
    }

    pub fn is_unmounted(&self) -> bool {
        self.controller.is_unmounted()
    }
}
