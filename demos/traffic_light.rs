//! Traffic light intersection shared by an authoritative server and
//! several clients.
//!
//! The server runs on the direct simulator and advances the light through
//! its cycle. Every committed server state is fanned out by name to the
//! client displays, which parse it back into a light. Each client also runs
//! a local replica on a delayed, lossy link; when a client request survives
//! that link and the replica accepts it, the request is forwarded to the
//! server for the authoritative decision.
//!
//! Run with `RUST_LOG=debug cargo run --example traffic_light` to see the
//! engine's own logging.

#[path = "traffic_light/lights.rs"]
mod lights;

use lights::{traffic_light, TrafficContext, TrafficLight, TrafficParams};
use relay_fsm::clock::TokioClock;
use relay_fsm::core::{PlayerId, State};
use relay_fsm::network::{DelayedNetworkSimulator, DirectNetworkSimulator, NetworkConditions};
use relay_fsm::runtime::{self, MachineHandle};
use relay_fsm::NetworkEvent;
use std::collections::VecDeque;
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CLIENTS: u32 = 3;
const TICK: Duration = Duration::from_millis(50);
const RUN_FOR: Duration = Duration::from_secs(14);
const LOG_CAPACITY: usize = 20;

/// Keeps the most recent messages only.
#[derive(Debug, Default)]
struct MessageLog {
    entries: VecDeque<String>,
}

impl MessageLog {
    fn push(&mut self, entry: String) {
        if self.entries.len() == LOG_CAPACITY {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }
}

/// A client request that the client's replica accepted.
struct Forwarded {
    target: TrafficLight,
    player: PlayerId,
    parameters: TrafficParams,
}

type Replica = MachineHandle<TrafficLight, TrafficContext, TrafficParams>;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    let mut server = traffic_light(TrafficLight::Red, DirectNetworkSimulator::new())?;
    let mut server_changes = server.subscribe_state_changes();
    let server = runtime::spawn(server, TrafficContext::default(), TICK);

    let (names, _) = broadcast::channel::<String>(64);
    let fanout = {
        let names = names.clone();
        tokio::spawn(async move {
            while let Some(change) = server_changes.recv().await {
                // No subscribed display is not an error.
                let _ = names.send(change.to.name().to_string());
            }
        })
    };

    let conditions = NetworkConditions::builder()
        .delay(Duration::from_millis(80), Duration::from_millis(400))
        .loss(0.2)
        .build()?;

    let (uplink, mut forwarded) = mpsc::unbounded_channel();
    let mut replicas = Vec::new();
    let mut clients = Vec::new();
    for id in 1..=CLIENTS {
        let clock = Arc::new(TokioClock::new());
        let network = DelayedNetworkSimulator::new(conditions.clone(), clock)?;
        let mut replica = traffic_light(TrafficLight::Red, network)?;
        let events = replica.subscribe_network_events();
        replicas.push(runtime::spawn(replica, TrafficContext::default(), TICK));
        clients.push(spawn_client(id, events, names.subscribe(), uplink.clone()));
    }
    drop(uplink);

    // A corrupted broadcast; every display must ignore it.
    let _ = names.send("Blue".to_string());

    let controller = PlayerId(0);
    let deadline = Instant::now() + RUN_FOR;
    let mut cycle = time::interval(Duration::from_secs(1));
    let mut emergency_sent = false;

    loop {
        tokio::select! {
            _ = time::sleep_until(deadline) => break,
            _ = cycle.tick() => {
                let next = server.current_state().next();
                server.request_transition(next, controller, None)?;
                client_traffic(&replicas, deadline, &mut emergency_sent)?;
            }
            Some(request) = forwarded.recv() => {
                info!(
                    player = %request.player,
                    to = request.target.name(),
                    "Forwarding client request"
                );
                server.request_transition(
                    request.target,
                    request.player,
                    Some(request.parameters),
                )?;
            }
        }
    }

    for replica in replicas {
        let (machine, _) = replica.shutdown().await?;
        let stats = machine.shutdown();
        info!(
            sent = stats.sent,
            lost = stats.lost,
            loss_rate = stats.loss_rate(),
            "Client link statistics"
        );
    }

    let (machine, context) = server.shutdown().await?;
    info!(
        state = machine.current_state().name(),
        cycles = context.cycles,
        commits = machine.history().recorded(),
        "Server finished"
    );
    machine.shutdown();
    drop(names);
    fanout.await?;

    for (id, client) in (1..=CLIENTS).zip(clients) {
        let log = client.await?;
        info!(client = id, "Last {} messages:", log.entries.len());
        for entry in &log.entries {
            info!(client = id, "  {entry}");
        }
    }

    Ok(())
}

/// Client 1 asks for the next phase every second, client 2 sends one
/// emergency request halfway through the run, client 3 only watches.
fn client_traffic(
    replicas: &[Replica],
    deadline: Instant,
    emergency_sent: &mut bool,
) -> Result<(), runtime::RuntimeError> {
    let regular = &replicas[0];
    regular.request_transition(regular.current_state().next(), PlayerId(1), None)?;

    if !*emergency_sent && deadline.saturating_duration_since(Instant::now()) < RUN_FOR / 2 {
        *emergency_sent = true;
        replicas[1].request_transition(
            TrafficLight::Green,
            PlayerId(2),
            Some(TrafficParams::Emergency {
                is_emergency_vehicle: true,
            }),
        )?;
    }
    Ok(())
}

fn spawn_client(
    id: u32,
    mut replica_events: mpsc::UnboundedReceiver<NetworkEvent<TrafficLight>>,
    mut names: broadcast::Receiver<String>,
    uplink: mpsc::UnboundedSender<Forwarded>,
) -> JoinHandle<MessageLog> {
    tokio::spawn(async move {
        let mut log = MessageLog::default();
        let mut shown: Option<TrafficLight> = None;

        loop {
            tokio::select! {
                name = names.recv() => match name {
                    Ok(name) => match name.parse::<TrafficLight>() {
                        Ok(light) => {
                            shown = Some(light);
                            log.push(format!("Display shows {light}"));
                        }
                        Err(err) => warn!(client = id, %err, "Ignoring state broadcast"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(client = id, skipped, "Display fell behind the server");
                    }
                    Err(RecvError::Closed) => break,
                },
                event = replica_events.recv() => match event {
                    Some(event) => {
                        log.push(event.to_string());
                        if let NetworkEvent::StateChanged { to, player, .. } = event {
                            let parameters = if to == TrafficLight::Green
                                && shown != Some(TrafficLight::Green)
                            {
                                TrafficParams::Emergency {
                                    is_emergency_vehicle: player == PlayerId(2),
                                }
                            } else {
                                TrafficParams::Normal
                            };
                            // The server stops listening at shutdown.
                            let _ = uplink.send(Forwarded { target: to, player, parameters });
                        }
                    }
                    None => break,
                },
            }
        }

        info!(client = id, shown = ?shown, "Client disconnected");
        log
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_log_keeps_latest_entries() {
        let mut log = MessageLog::default();
        for i in 0..45 {
            log.push(format!("message {i}"));
        }

        assert_eq!(log.entries.len(), LOG_CAPACITY);
        assert_eq!(log.entries.front().map(String::as_str), Some("message 25"));
        assert_eq!(log.entries.back().map(String::as_str), Some("message 44"));
    }

    #[test]
    fn broadcast_names_parse_back_into_lights() {
        assert_eq!("Yellow".parse::<TrafficLight>(), Ok(TrafficLight::Yellow));
        assert!("Blue".parse::<TrafficLight>().is_err());
    }
}
