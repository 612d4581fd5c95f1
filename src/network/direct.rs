//! Synchronous delivery with no network hop.

use super::{Dispatch, NetworkSimulator, SimulationStats, TransitionRequest};
use crate::core::State;
use crate::events::{EventBus, NetworkEvent};
use tracing::trace;

/// Delivers every request immediately.
///
/// Publishes one [`NetworkEvent::Direct`] and hands the request back in the
/// same call, so the machine commits before `request_transition` returns.
#[derive(Debug, Default)]
pub struct DirectNetworkSimulator {
    stats: SimulationStats,
}

impl DirectNetworkSimulator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S: State, P: Send> NetworkSimulator<S, P> for DirectNetworkSimulator {
    fn process_transition(
        &mut self,
        request: TransitionRequest<S, P>,
        events: &mut EventBus<NetworkEvent<S>>,
    ) -> Dispatch<S, P> {
        trace!(
            request = %request.id,
            from = request.from.name(),
            to = request.target.name(),
            "Direct delivery"
        );
        events.publish(NetworkEvent::Direct {
            request: request.id,
            from: request.from.clone(),
            to: request.target.clone(),
            player: request.player(),
        });
        self.stats.delivered += 1;
        Dispatch::Delivered(request)
    }

    fn stats(&self) -> SimulationStats {
        self.stats
    }
}
