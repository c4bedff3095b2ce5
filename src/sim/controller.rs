//! Lifecycle controller
//!
//! Owns one mounted game: the ruleset, the world, the session, the clock and
//! the input state. Hosts drive it either with explicit commands
//! (`start`/`pause`/`resume`/`restart`) or by reporting their two
//! level-triggered flags through `observe`, and feed it wall-clock frames.
//! Every visible change of the session is pushed to subscribed observers.

use std::time::Duration;

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::clock::FixedClock;
use super::collision::PolicyTable;
use super::particles::ParticleSystem;
use super::ruleset::{RuleContext, Ruleset};
use super::state::{Session, SessionState, Snapshot};
use super::tick::{self, TickReport};
use super::world::World;
use crate::bridge::HostFlags;
use crate::error::EngineError;
use crate::platform::input::{InputState, RawEvent};
use crate::renderer::{self, Frame, RenderView};
use crate::settings::Settings;

/// Particle RNG is derived from the session seed on a separate stream
const COSMETIC_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;
/// Base seed when neither the settings nor the host provide one
const DEFAULT_BASE_SEED: u64 = 0x5EED_A8CA_DE00_0001;

/// Handle returned by [`Controller::subscribe`]
pub type ObserverId = u64;

type Observer = Box<dyn FnMut(&Snapshot)>;

/// Session state machine for one mounted game
pub struct Controller {
    ruleset: Box<dyn Ruleset>,
    policies: PolicyTable,
    settings: Settings,
    world: World,
    session: Session,
    particles: ParticleSystem,
    rng: Pcg32,
    clock: FixedClock,
    input: InputState,
    /// Last flags reported by the host
    flags: HostFlags,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: ObserverId,
    last_published: Option<Snapshot>,
    frame: Frame,
    seeds: Pcg32,
    sessions_started: u32,
    unmounted: bool,
}

impl Controller {
    pub fn new(ruleset: Box<dyn Ruleset>, settings: Settings) -> Result<Self, EngineError> {
        settings.validate()?;

        let size = ruleset.logical_size();
        let policies = ruleset.policies();
        let base_seed = settings.seed.unwrap_or(DEFAULT_BASE_SEED);
        let input = InputState::new(size).with_touch_zones(settings.touch_zones);

        let mut controller = Self {
            policies,
            world: World::new(size.x, size.y),
            session: Session::new(ruleset.initial_lives(), base_seed),
            particles: ParticleSystem::new(settings.max_particles(), base_seed ^ COSMETIC_STREAM),
            rng: Pcg32::seed_from_u64(base_seed),
            clock: FixedClock::from_settings(&settings),
            input,
            flags: HostFlags::default(),
            observers: Vec::new(),
            next_observer: 1,
            last_published: None,
            frame: Frame::new(size.x, size.y),
            seeds: Pcg32::seed_from_u64(base_seed),
            sessions_started: 0,
            unmounted: false,
            ruleset,
            settings,
        };
        controller.render();
        log::info!("mounted ruleset '{}' ({}x{})", controller.ruleset.name(), size.x, size.y);
        Ok(controller)
    }

    /// Reseed the per-session seed sequence (e.g. from the host clock).
    /// A fixed `Settings::seed` takes precedence.
    pub fn with_base_seed(mut self, seed: u64) -> Self {
        self.seeds = Pcg32::seed_from_u64(seed);
        self
    }

    // === Queries ===

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn snapshot(&self) -> Snapshot {
        self.session.snapshot()
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn ruleset_name(&self) -> &'static str {
        self.ruleset.name()
    }

    /// Last rendered frame; unchanged while paused
    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn clock(&self) -> &FixedClock {
        &self.clock
    }

    pub fn flags(&self) -> HostFlags {
        self.flags
    }

    pub fn is_unmounted(&self) -> bool {
        self.unmounted
    }

    // === Observers ===

    /// Register a snapshot observer; it is called on every visible change.
    pub fn subscribe(&mut self, observer: impl FnMut(&Snapshot) + 'static) -> ObserverId {
        let id = self.next_observer;
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    /// Remove an observer. Unknown ids are ignored.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    fn publish(&mut self) {
        let snapshot = self.session.snapshot();
        if self.last_published == Some(snapshot) {
            return;
        }
        self.last_published = Some(snapshot);
        for (_, observer) in self.observers.iter_mut() {
            observer(&snapshot);
        }
    }

    // === Transitions ===

    /// Begin a fresh session. Valid from Idle or Ended.
    pub fn start(&mut self) -> bool {
        if self.unmounted {
            log::debug!("start ignored: unmounted");
            return false;
        }
        match self.session.state() {
            SessionState::Idle | SessionState::Ended(_) => {
                self.begin_session();
                true
            }
            state => {
                log::debug!("start ignored in {:?}", state);
                false
            }
        }
    }

    /// Suspend ticks. Valid from Running.
    pub fn pause(&mut self) -> bool {
        if self.unmounted || self.session.state() != SessionState::Running {
            log::debug!("pause ignored in {:?}", self.session.state());
            return false;
        }
        self.session.set_state(SessionState::Paused);
        self.clock.disarm();
        self.render();
        log::info!("paused at tick {}", self.session.ticks);
        true
    }

    /// Continue a paused session without resetting it. A finished session
    /// cannot be resumed.
    pub fn resume(&mut self) -> bool {
        if self.unmounted || self.session.state() != SessionState::Paused {
            log::debug!("resume ignored in {:?}", self.session.state());
            return false;
        }
        self.session.set_state(SessionState::Running);
        self.clock.arm();
        self.render();
        log::info!("resumed at tick {}", self.session.ticks);
        true
    }

    /// Discard everything and begin a fresh session from any state.
    pub fn restart(&mut self) -> bool {
        if self.unmounted {
            log::debug!("restart ignored: unmounted");
            return false;
        }
        self.begin_session();
        true
    }

    fn next_seed(&mut self) -> u64 {
        match self.settings.seed {
            Some(seed) => seed,
            None => self.seeds.random(),
        }
    }

    /// Rebuild world, session, RNGs and particles wholesale
    fn begin_session(&mut self) {
        let seed = self.next_seed();
        let size = self.ruleset.logical_size();

        self.world = World::new(size.x, size.y);
        self.session = Session::new(self.ruleset.initial_lives(), seed);
        self.rng = Pcg32::seed_from_u64(seed);
        self.particles = ParticleSystem::new(self.settings.max_particles(), seed ^ COSMETIC_STREAM);
        self.input.clear();

        let mut ctx = RuleContext {
            world: &mut self.world,
            session: &mut self.session,
            particles: &mut self.particles,
            rng: &mut self.rng,
            settings: &self.settings,
            tick: 0,
        };
        self.ruleset.setup(&mut ctx);
        self.world.sweep();

        self.session.set_state(SessionState::Running);
        self.clock.reset();
        self.clock.arm();
        self.sessions_started += 1;

        log::info!(
            "session {} started: ruleset '{}', seed {:#x}, {} entities",
            self.sessions_started,
            self.ruleset.name(),
            seed,
            self.world.len()
        );

        self.render();
        self.publish();
    }

    /// Diff the host's level-triggered flags against the previous report and
    /// apply the implied transition. Combinations with no meaning in the
    /// current state are ignored.
    pub fn observe(&mut self, flags: HostFlags) {
        let prev = std::mem::replace(&mut self.flags, flags);
        if self.unmounted {
            return;
        }

        let state = self.session.state();
        if flags.want_playing && !prev.want_playing {
            if matches!(state, SessionState::Idle | SessionState::Ended(_)) {
                self.start();
            }
        } else if !flags.want_playing && prev.want_playing && state == SessionState::Running {
            self.pause();
        }

        match self.session.state() {
            SessionState::Running if flags.want_playing && flags.want_paused => {
                self.pause();
            }
            SessionState::Paused if flags.want_playing && !flags.want_paused => {
                self.resume();
            }
            _ => {}
        }
    }

    // === Driving ===

    /// Feed one raw input event
    pub fn handle_input(&mut self, event: &RawEvent) {
        self.input.handle(event);
    }

    /// Feed one host frame; runs as many fixed ticks as the clock allows.
    ///
    /// Returns the number of ticks simulated.
    pub fn frame_elapsed(&mut self, dt: Duration) -> u32 {
        if self.unmounted || self.session.state() != SessionState::Running {
            return 0;
        }
        let steps = self.clock.advance(dt);
        let mut ran = 0;
        for _ in 0..steps {
            if self.tick().is_none() {
                break;
            }
            ran += 1;
        }
        ran
    }

    /// Run exactly one tick if the session is Running.
    pub fn tick(&mut self) -> Option<TickReport> {
        if self.unmounted || self.session.state() != SessionState::Running {
            return None;
        }

        let input = self.input.sample();
        let mut ctx = RuleContext {
            world: &mut self.world,
            session: &mut self.session,
            particles: &mut self.particles,
            rng: &mut self.rng,
            settings: &self.settings,
            tick: 0,
        };
        let report = tick::step(self.ruleset.as_mut(), &self.policies, &mut ctx, &input);

        if report.ended {
            self.clock.disarm();
            log::info!(
                "session ended ({:?}) after {} ticks",
                self.session.state(),
                self.session.ticks
            );
        }

        self.render();
        self.publish();
        Some(report)
    }

    fn render(&mut self) {
        self.frame = renderer::render(&RenderView {
            world: &self.world,
            session: &self.session,
            particles: &self.particles,
            ruleset: self.ruleset.as_ref(),
            settings: &self.settings,
        });
    }

    /// Tear down: stop the clock, detach input, drop observers and the world.
    /// Safe to call more than once.
    pub fn unmount(&mut self) {
        if self.unmounted {
            log::debug!("unmount ignored: already unmounted");
            return;
        }
        self.clock.cancel();
        self.input.detach();
        self.observers.clear();
        self.world.clear();
        self.particles.clear();
        self.unmounted = true;
        log::info!("unmounted ruleset '{}'", self.ruleset.name());
    }
}

impl std::fmt::Debug for Controller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Controller")
            .field("ruleset", &self.ruleset.name())
            .field("state", &self.session.state())
            .field("snapshot", &self.session.snapshot())
            .field("entities", &self.world.len())
            .field("observers", &self.observers.len())
            .field("unmounted", &self.unmounted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use glam::Vec2;
    use proptest::prelude::*;

    use super::*;
    use crate::platform::input::{InputFrame, Intent};
    use crate::rulesets;
    use crate::sim::collision::Policy;
    use crate::sim::entity::{Entity, EntityKind};
    use crate::sim::geometry::Shape;
    use crate::sim::state::Outcome;

    /// Player walks right into a wall of hazards; every pickup is worth 5
    struct Drill;

    impl Ruleset for Drill {
        fn name(&self) -> &'static str {
            "drill"
        }

        fn initial_lives(&self) -> f32 {
            2.0
        }

        fn policies(&self) -> PolicyTable {
            PolicyTable::new()
                .with(EntityKind::Player, EntityKind::Pickup, Policy::Collect)
                .with(EntityKind::Player, EntityKind::Enemy, Policy::hurt())
        }

        fn setup(&mut self, ctx: &mut RuleContext) {
            ctx.world.spawn(Entity::new(EntityKind::Player, Vec2::new(20.0, 100.0), Shape::rect(10.0, 10.0)));
            for i in 0..5 {
                ctx.world.spawn(
                    Entity::new(EntityKind::Pickup, Vec2::new(60.0 + i as f32 * 20.0, 105.0), Shape::circle(3.0))
                        .with_value(5),
                );
            }
            ctx.world.spawn(Entity::new(EntityKind::Enemy, Vec2::new(300.0, 105.0), Shape::circle(4.0)));
            // Far enough that the stun from the first hit has worn off
            ctx.world.spawn(Entity::new(EntityKind::Enemy, Vec2::new(600.0, 105.0), Shape::circle(4.0)));
        }

        fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
            if let Some(p) = ctx.world.player_mut() {
                p.vel = Vec2::new(2.0 + 2.0 * input.horizontal(), 0.0);
            }
        }
    }

    /// Drill that is won once every pickup is collected
    struct Sprint(Drill);

    impl Ruleset for Sprint {
        fn name(&self) -> &'static str {
            "sprint"
        }

        fn initial_lives(&self) -> f32 {
            self.0.initial_lives()
        }

        fn policies(&self) -> PolicyTable {
            self.0.policies()
        }

        fn setup(&mut self, ctx: &mut RuleContext) {
            self.0.setup(ctx);
        }

        fn update(&mut self, ctx: &mut RuleContext, input: &InputFrame) {
            self.0.update(ctx, input);
        }

        fn is_won(&self, _world: &World, session: &Session) -> bool {
            session.score() >= 25
        }
    }

    fn drill() -> Controller {
        let settings = Settings {
            seed: Some(7),
            ..Settings::default()
        };
        Controller::new(Box::new(Drill), settings).unwrap()
    }

    fn flags(want_playing: bool, want_paused: bool) -> HostFlags {
        HostFlags {
            want_playing,
            want_paused,
        }
    }

    fn frames(c: &mut Controller, n: usize) {
        for _ in 0..n {
            c.frame_elapsed(Duration::from_millis(16) + Duration::from_micros(700));
        }
    }

    fn positions(c: &Controller) -> Vec<(u32, Vec2, Vec2)> {
        c.world().iter().map(|e| (e.id, e.pos, e.vel)).collect()
    }

    #[test]
    fn test_mount_is_idle() {
        let c = drill();
        assert_eq!(c.state(), SessionState::Idle);
        assert!(c.world().is_empty());
        assert!(!c.frame().is_empty(), "idle frame is drawn");
    }

    #[test]
    fn test_flag_diffing_lifecycle() {
        let mut c = drill();
        c.observe(flags(true, false));
        assert_eq!(c.state(), SessionState::Running);

        c.observe(flags(true, true));
        assert_eq!(c.state(), SessionState::Paused);

        c.observe(flags(true, false));
        assert_eq!(c.state(), SessionState::Running);

        c.observe(flags(false, false));
        assert_eq!(c.state(), SessionState::Paused);

        c.observe(flags(true, false));
        assert_eq!(c.state(), SessionState::Running, "resumed, not restarted");
    }

    #[test]
    fn test_start_with_pause_flag_held() {
        let mut c = drill();
        c.observe(flags(true, true));
        assert_eq!(c.state(), SessionState::Paused);
        assert!(!c.world().is_empty());
    }

    #[test]
    fn test_noop_transitions_are_silent() {
        let mut c = drill();
        assert!(!c.pause());
        assert!(!c.resume());
        c.start();
        assert!(!c.start(), "already running");
        assert!(c.pause());
        assert!(!c.pause());
        c.observe(flags(false, true));
        c.observe(flags(false, true));
        assert_eq!(c.state(), SessionState::Paused);
    }

    #[test]
    fn test_pause_freezes_state() {
        let mut c = drill();
        c.start();
        frames(&mut c, 10);
        c.pause();
        let before = (positions(&c), c.snapshot(), c.session().ticks, c.frame().clone());

        for _ in 0..100 {
            c.frame_elapsed(Duration::from_millis(250));
        }
        assert!(c.tick().is_none());
        c.handle_input(&RawEvent::KeyDown {
            key: "ArrowRight".into(),
        });

        let after = (positions(&c), c.snapshot(), c.session().ticks, c.frame().clone());
        assert_eq!(before, after);
    }

    #[test]
    fn test_pickups_and_game_over() {
        let mut c = drill();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&seen);
        c.subscribe(move |s| log.borrow_mut().push(*s));

        c.start();
        for _ in 0..400 {
            c.tick();
        }

        let snap = c.snapshot();
        assert_eq!(snap.score, 25);
        assert!(snap.game_over);
        assert!(!snap.game_won);
        assert_eq!(c.state(), SessionState::Ended(Outcome::Over));

        let seen = seen.borrow();
        assert_eq!(seen.iter().filter(|s| s.game_over).count(), 1, "game over published once");
        // Score only ever moved in pickup-sized steps
        assert!(seen.windows(2).all(|w| w[1].score == w[0].score || w[1].score == w[0].score + 5));
    }

    #[test]
    fn test_ended_cannot_resume() {
        let mut c = drill();
        c.observe(flags(true, false));
        while !c.state().is_ended() {
            c.tick();
        }
        assert!(!c.resume());
        c.observe(flags(true, false));
        assert!(c.state().is_ended(), "flags unchanged: nothing to do");
    }

    #[test]
    fn test_reentry_starts_fresh() {
        let mut c = drill();
        c.observe(flags(true, false));
        while !c.state().is_ended() {
            c.tick();
        }
        assert!(c.snapshot().score > 0);
        assert_eq!(c.world().count(EntityKind::Pickup), 0);

        c.observe(flags(false, false));
        c.observe(flags(true, false));

        assert_eq!(c.state(), SessionState::Running);
        let snap = c.snapshot();
        assert_eq!(snap.score, 0);
        assert_eq!(snap.lives, 2.0);
        assert_eq!(snap.level, 1);
        assert!(!snap.game_over);
        assert_eq!(c.world().count(EntityKind::Pickup), 5);
        assert_eq!(c.world().count(EntityKind::Enemy), 2);
        assert_eq!(c.world().len(), 8);
    }

    #[test]
    fn test_reentry_after_win_starts_fresh() {
        let mut c = Controller::new(Box::new(Sprint(Drill)), Settings::default()).unwrap();
        c.observe(flags(true, false));
        while !c.state().is_ended() {
            c.tick();
        }
        assert_eq!(c.state(), SessionState::Ended(Outcome::Won));
        let won = c.snapshot();
        assert!(won.game_won);
        assert_eq!(won.score, 25);
        let last_ticks = c.session().ticks;
        assert!(last_ticks > 0);

        // Still wanting to play does nothing until the host toggles
        c.observe(flags(true, false));
        assert!(c.state().is_ended());

        c.observe(flags(false, false));
        c.observe(flags(true, false));

        assert_eq!(c.state(), SessionState::Running);
        let snap = c.snapshot();
        assert_eq!(snap.score, 0);
        assert_eq!(snap.lives, 2.0);
        assert_eq!(snap.level, 1);
        assert!(!snap.game_won);
        assert!(!snap.game_over);
        assert_eq!(c.session().ticks, 0);

        // Only the new session's entities, freshly numbered and in place
        let ids: Vec<_> = c.world().iter().map(|e| e.id).collect();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(c.world().count(EntityKind::Pickup), 5);
        assert_eq!(c.world().player().unwrap().pos, Vec2::new(20.0, 100.0));
    }

    #[test]
    fn test_restart_mid_session() {
        let mut c = drill();
        c.start();
        for _ in 0..30 {
            c.tick();
        }
        assert!(c.snapshot().score > 0);
        c.restart();
        assert_eq!(c.snapshot().score, 0);
        assert_eq!(c.session().ticks, 0);
        assert_eq!(c.world().count(EntityKind::Pickup), 5);
    }

    #[test]
    fn test_fixed_seed_sessions_replay() {
        let mut a = Controller::new(
            rulesets::by_name("shooter").unwrap(),
            Settings {
                seed: Some(99),
                ..Settings::default()
            },
        )
        .unwrap();
        a.start();
        for _ in 0..300 {
            a.tick();
        }
        let first = (positions(&a), a.snapshot());

        a.restart();
        for _ in 0..300 {
            a.tick();
        }
        let second = (positions(&a), a.snapshot());
        assert_eq!(first, second);
    }

    #[test]
    fn test_input_steers_player() {
        let mut c = drill();
        c.start();
        c.handle_input(&RawEvent::KeyDown {
            key: "ArrowLeft".into(),
        });
        c.tick();
        assert_eq!(c.world().player().unwrap().vel, Vec2::ZERO);
        c.handle_input(&RawEvent::FocusLost);
        c.tick();
        assert_eq!(c.world().player().unwrap().vel, Vec2::new(2.0, 0.0));
        assert!(!c.input.held().contains(Intent::MoveLeft));
    }

    #[test]
    fn test_observers() {
        let mut c = drill();
        let count = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&count);
        let id = c.subscribe(move |_| *counter.borrow_mut() += 1);
        c.start();
        assert_eq!(*count.borrow(), 1);
        assert!(c.unsubscribe(id));
        assert!(!c.unsubscribe(id));
        for _ in 0..100 {
            c.tick();
        }
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_no_observer_is_fine() {
        let mut c = drill();
        c.start();
        for _ in 0..400 {
            c.tick();
        }
        assert!(c.state().is_ended());
    }

    #[test]
    fn test_unmount_is_idempotent() {
        let mut c = drill();
        c.start();
        frames(&mut c, 3);
        c.unmount();
        c.unmount();
        assert!(c.is_unmounted());
        assert!(c.clock().is_cancelled());
        assert!(c.world().is_empty());
        assert_eq!(c.frame_elapsed(Duration::from_secs(1)), 0);
        assert!(!c.start());
        assert!(!c.restart());
        c.observe(flags(false, false));
        c.observe(flags(true, false));
        assert!(c.world().is_empty());
    }

    #[test]
    fn test_frames_drive_ticks() {
        let mut c = drill();
        c.start();
        let ran = c.frame_elapsed(c.clock().step() * 3);
        assert_eq!(ran, 3);
        assert_eq!(c.session().ticks, 3);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let settings = Settings {
            tick_rate_hz: 0,
            ..Settings::default()
        };
        assert!(Controller::new(Box::new(Drill), settings).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn prop_every_ruleset_stays_finite(
            index in 0usize..rulesets::NAMES.len(),
            seed in any::<u64>(),
            script in prop::collection::vec((0u8..12, 1u32..20), 1..40),
        ) {
            let name = rulesets::NAMES[index];
            let settings = Settings { seed: Some(seed), ..Settings::default() };
            let mut c = Controller::new(rulesets::by_name(name).unwrap(), settings).unwrap();
            c.start();

            let keys = ["ArrowLeft", "ArrowRight", "ArrowUp", "ArrowDown", " ", "q", "e", "k"];
            for (action, ticks) in script {
                let action = usize::from(action);
                if action < keys.len() {
                    c.handle_input(&RawEvent::KeyDown { key: keys[action].to_string() });
                } else if action == 8 {
                    c.handle_input(&RawEvent::FocusLost);
                } else if action == 9 {
                    c.handle_input(&RawEvent::PointerDown { x: 400.0, y: 250.0 });
                } else {
                    c.handle_input(&RawEvent::KeyUp { key: keys[action % keys.len()].to_string() });
                }
                for _ in 0..ticks {
                    if c.tick().is_none() {
                        c.restart();
                    }
                    for e in c.world().iter() {
                        prop_assert!(e.pos.is_finite(), "{} {:?}", name, e);
                        prop_assert!(e.vel.is_finite(), "{} {:?}", name, e);
                    }
                    prop_assert!(c.snapshot().lives.is_finite());
                }
            }
        }
    }
}
