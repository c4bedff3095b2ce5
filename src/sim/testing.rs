//! Test harness that runs a ruleset without a controller

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::collision::PolicyTable;
use super::particles::ParticleSystem;
use super::ruleset::{RuleContext, Ruleset};
use super::state::{Session, SessionState};
use super::tick::{self, TickReport};
use super::world::World;
use crate::platform::input::{InputFrame, Intent, IntentSet};
use crate::settings::Settings;

pub(crate) struct Harness<R: Ruleset> {
    pub world: World,
    pub session: Session,
    pub particles: ParticleSystem,
    pub rng: Pcg32,
    pub settings: Settings,
    pub rules: R,
    policies: PolicyTable,
}

impl<R: Ruleset> Harness<R> {
    /// Set up a Running session for `rules`
    pub fn new(rules: R, seed: u64) -> Self {
        let size = rules.logical_size();
        let settings = Settings::default();
        let mut harness = Self {
            world: World::new(size.x, size.y),
            session: Session::new(rules.initial_lives(), seed),
            particles: ParticleSystem::new(settings.max_particles(), seed),
            rng: Pcg32::seed_from_u64(seed),
            policies: rules.policies(),
            settings,
            rules,
        };
        let mut ctx = RuleContext {
            world: &mut harness.world,
            session: &mut harness.session,
            particles: &mut harness.particles,
            rng: &mut harness.rng,
            settings: &harness.settings,
            tick: 0,
        };
        harness.rules.setup(&mut ctx);
        harness.session.set_state(SessionState::Running);
        harness
    }

    pub fn step(&mut self, input: &InputFrame) -> TickReport {
        let mut ctx = RuleContext {
            world: &mut self.world,
            session: &mut self.session,
            particles: &mut self.particles,
            rng: &mut self.rng,
            settings: &self.settings,
            tick: 0,
        };
        tick::step(&mut self.rules, &self.policies, &mut ctx, input)
    }

    pub fn idle(&mut self) -> TickReport {
        self.step(&InputFrame::default())
    }

    /// Run `n` ticks holding `intents`, stopping early if the session ends
    pub fn run(&mut self, n: usize, intents: &[Intent]) {
        let input = hold(intents);
        for _ in 0..n {
            if self.session.is_terminal() {
                break;
            }
            self.step(&input);
        }
    }
}

/// Input frame with `intents` held (and just pressed)
pub(crate) fn hold(intents: &[Intent]) -> InputFrame {
    let set = IntentSet::of(intents);
    InputFrame {
        held: set,
        pressed: set,
        ..InputFrame::default()
    }
}
