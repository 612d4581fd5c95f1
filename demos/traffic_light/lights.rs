//! Traffic light instantiation of the engine.
//!
//! Lights cycle Red -> Green -> Yellow -> Red once the current phase has
//! lasted its configured duration. Emergency vehicles may jump straight to
//! Green, and a forced override may move the light anywhere.

#![allow(dead_code)]

use relay_fsm::behavior::StateBehavior;
use relay_fsm::core::TransitionParameters;
use relay_fsm::network::NetworkSimulator;
use relay_fsm::{state_enum, BuildError, StateMachine};
use std::time::Duration;

state_enum! {
    pub enum TrafficLight {
        Red,
        Yellow,
        Green,
    }
}

impl TrafficLight {
    /// Canonical successor in the normal cycle.
    pub fn next(self) -> Self {
        match self {
            Self::Red => Self::Green,
            Self::Green => Self::Yellow,
            Self::Yellow => Self::Red,
        }
    }
}

/// Parameter variants a traffic light request may carry.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum TrafficParams {
    #[default]
    Normal,
    Emergency {
        is_emergency_vehicle: bool,
    },
    Override {
        force: bool,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct LightTimings {
    pub red: Duration,
    pub yellow: Duration,
    pub green: Duration,
}

impl Default for LightTimings {
    fn default() -> Self {
        Self {
            red: Duration::from_secs(5),
            yellow: Duration::from_secs(2),
            green: Duration::from_secs(5),
        }
    }
}

impl LightTimings {
    pub fn duration_of(&self, light: TrafficLight) -> Duration {
        match light {
            TrafficLight::Red => self.red,
            TrafficLight::Yellow => self.yellow,
            TrafficLight::Green => self.green,
        }
    }
}

/// Domain data shared by every light behavior.
#[derive(Clone, Debug, Default)]
pub struct TrafficContext {
    pub timings: LightTimings,
    pub time_in_state: Duration,
    pub cycles: u32,
}

pub struct LightBehavior {
    light: TrafficLight,
}

impl LightBehavior {
    pub fn new(light: TrafficLight) -> Self {
        Self { light }
    }
}

impl StateBehavior<TrafficLight, TrafficContext, TrafficParams> for LightBehavior {
    fn state_type(&self) -> TrafficLight {
        self.light
    }

    fn on_enter(&self, context: &mut TrafficContext) {
        context.time_in_state = Duration::ZERO;
        if self.light == TrafficLight::Red {
            context.cycles += 1;
        }
    }

    fn on_update(&self, context: &mut TrafficContext, delta: Duration) {
        context.time_in_state += delta;
    }

    fn can_transition_to(
        &self,
        target: &TrafficLight,
        context: &TrafficContext,
        parameters: &TransitionParameters<TrafficParams>,
    ) -> bool {
        match parameters.variant {
            TrafficParams::Override { force: true } => return true,
            TrafficParams::Emergency {
                is_emergency_vehicle: true,
            } if *target == TrafficLight::Green => return true,
            TrafficParams::Normal
            | TrafficParams::Emergency { .. }
            | TrafficParams::Override { force: false } => {}
        }

        context.time_in_state >= context.timings.duration_of(self.light)
            && *target == self.light.next()
    }
}

pub type TrafficMachine = StateMachine<TrafficLight, TrafficContext, TrafficParams>;

/// Build a traffic light machine on the given network.
pub fn traffic_light<N>(initial: TrafficLight, network: N) -> Result<TrafficMachine, BuildError>
where
    N: NetworkSimulator<TrafficLight, TrafficParams> + 'static,
{
    StateMachine::builder()
        .initial(initial)
        .register(TrafficLight::Red, || LightBehavior::new(TrafficLight::Red))
        .register(TrafficLight::Yellow, || LightBehavior::new(TrafficLight::Yellow))
        .register(TrafficLight::Green, || LightBehavior::new(TrafficLight::Green))
        .network(network)
        .build()
}
