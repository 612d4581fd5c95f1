//! Actor-style shell for driving a machine from async code.
//!
//! [`spawn`] moves a machine and its context into a tokio task. The task is
//! the machine's only owner: requests arrive over a command queue and a
//! fixed-period interval drives `update`, so commits, ticks and context
//! mutation never overlap even when many tasks or threads submit requests.
//!
//! Subscribe to the machine's event streams before spawning it.

use crate::core::{ParameterVariant, PlayerId, State};
use crate::machine::StateMachine;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("state machine task has stopped")]
    Stopped,

    #[error("state machine task failed: {0}")]
    TaskFailed(#[from] JoinError),
}

enum Command<S, P> {
    Request {
        target: S,
        player: PlayerId,
        parameters: Option<P>,
    },
    Shutdown,
}

/// Handle to a machine running in its own task.
pub struct MachineHandle<S: State, C, P> {
    commands: mpsc::UnboundedSender<Command<S, P>>,
    state: watch::Receiver<S>,
    task: JoinHandle<(StateMachine<S, C, P>, C)>,
}

impl<S, C, P> MachineHandle<S, C, P>
where
    S: State,
    C: Send + 'static,
    P: ParameterVariant,
{
    /// Queue a transition request. Fire-and-forget, like
    /// [`StateMachine::request_transition`].
    pub fn request_transition(
        &self,
        target: S,
        player: PlayerId,
        parameters: Option<P>,
    ) -> Result<(), RuntimeError> {
        self.commands
            .send(Command::Request {
                target,
                player,
                parameters,
            })
            .map_err(|_| RuntimeError::Stopped)
    }

    /// Last state published by the task.
    pub fn current_state(&self) -> S {
        self.state.borrow().clone()
    }

    /// Receiver that is notified whenever the state changes.
    pub fn watch_state(&self) -> watch::Receiver<S> {
        self.state.clone()
    }

    /// Stop the task and take the machine and its context back.
    pub async fn shutdown(self) -> Result<(StateMachine<S, C, P>, C), RuntimeError> {
        // The task may already be gone; joining reports why.
        let _ = self.commands.send(Command::Shutdown);
        Ok(self.task.await?)
    }
}

/// Move `machine` and `context` into a new task ticking every `tick`.
///
/// The task runs `start` once, then interleaves queued requests with
/// `update` calls whose delta is the measured time between ticks.
///
/// # Panics
///
/// Panics if `tick` is zero or when called outside a tokio runtime.
pub fn spawn<S, C, P>(
    mut machine: StateMachine<S, C, P>,
    mut context: C,
    tick: Duration,
) -> MachineHandle<S, C, P>
where
    S: State,
    C: Send + 'static,
    P: ParameterVariant,
{
    let (commands, mut inbox) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(machine.current_state().clone());

    let task = tokio::spawn(async move {
        machine.start(&mut context);

        let mut interval = tokio::time::interval(tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = interval.tick().await;

        loop {
            tokio::select! {
                now = interval.tick() => {
                    let delta = now.duration_since(last_tick);
                    last_tick = now;
                    machine.update(&mut context, delta);
                }
                command = inbox.recv() => match command {
                    Some(Command::Request { target, player, parameters }) => {
                        machine.request_transition(&mut context, target, player, parameters);
                    }
                    Some(Command::Shutdown) | None => break,
                },
            }

            state_tx.send_if_modified(|published| {
                if published != machine.current_state() {
                    debug!(state = machine.current_state().name(), "Publishing state");
                    *published = machine.current_state().clone();
                    true
                } else {
                    false
                }
            });
        }

        info!(state = machine.current_state().name(), "State machine task stopped");
        (machine, context)
    });

    MachineHandle {
        commands,
        state: state_rx,
        task,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::StateBehavior;
    use crate::clock::TokioClock;
    use crate::core::TransitionParameters;
    use crate::network::{DelayedNetworkSimulator, NetworkConditions};
    use crate::state_enum;
    use std::sync::Arc;

    state_enum! {
        enum Power {
            Off,
            On,
        }
    }

    #[derive(Default)]
    struct Ctx {
        enters: u32,
        uptime: Duration,
    }

    struct Switch(Power);

    impl StateBehavior<Power, Ctx, ()> for Switch {
        fn state_type(&self) -> Power {
            self.0
        }

        fn on_enter(&self, context: &mut Ctx) {
            context.enters += 1;
        }

        fn on_update(&self, context: &mut Ctx, delta: Duration) {
            context.uptime += delta;
        }

        fn can_transition_to(&self, target: &Power, _: &Ctx, _: &TransitionParameters<()>) -> bool {
            *target != self.0
        }
    }

    fn machine(delay: Duration) -> StateMachine<Power, Ctx, ()> {
        let sim = DelayedNetworkSimulator::with_seed(
            NetworkConditions::fixed(delay),
            Arc::new(TokioClock::new()),
            5,
        )
        .unwrap();
        StateMachine::builder()
            .initial(Power::Off)
            .register(Power::Off, || Switch(Power::Off))
            .register(Power::On, || Switch(Power::On))
            .network(sim)
            .build()
            .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_request_commits_inside_task() {
        let mut machine = machine(Duration::from_millis(100));
        let mut changes = machine.subscribe_state_changes();
        let handle = spawn(machine, Ctx::default(), Duration::from_millis(10));

        handle
            .request_transition(Power::On, PlayerId(1), None)
            .unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.from, Power::Off);
        assert_eq!(change.to, Power::On);
        assert_eq!(handle.current_state(), Power::On);

        let (machine, context) = handle.shutdown().await.unwrap();
        assert_eq!(machine.current_state(), &Power::On);
        // Initial start plus one commit.
        assert_eq!(context.enters, 2);
        assert!(context.uptime >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn requests_after_shutdown_fail() {
        let machine = machine(Duration::from_millis(10));
        let handle = spawn(machine, Ctx::default(), Duration::from_millis(5));
        let commands = handle.commands.clone();

        handle.shutdown().await.unwrap();

        assert!(commands
            .send(Command::Request {
                target: Power::On,
                player: PlayerId(1),
                parameters: None,
            })
            .is_err());
    }
}
