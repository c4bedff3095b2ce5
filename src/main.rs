//! Arcade Engine entry point
//!
//! Native: runs a ruleset headless through the host bridge, with a scripted
//! autopilot on the keyboard and jittered frame deltas, logging snapshots.
//! Usage: `arcade-engine [ruleset] [frames] [low|medium|high]`.
//! On wasm32 the page mounts games through `GameHandle` instead.

#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::time::Duration;

    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg32;

    use arcade_engine::bridge::{self, HostCommand, HostEvent};
    use arcade_engine::platform::input::RawEvent;
    use arcade_engine::rulesets;
    use arcade_engine::settings::{QualityPreset, Settings};
    use arcade_engine::sim::Controller;
    use arcade_engine::EngineError;

    const DEFAULT_FRAMES: u32 = 3_600;
    /// Keys the autopilot presses
    const KEYS: [&str; 8] = ["ArrowLeft", "ArrowRight", "ArrowUp", "ArrowDown", " ", "q", "e", "k"];

    /// Holds a steering key (and usually fire) for a random number of frames
    struct Autopilot {
        rng: Pcg32,
        held: Vec<&'static str>,
        frames_left: u32,
        step_dt: f32,
    }

    impl Autopilot {
        fn new(seed: u64, step_dt: f32) -> Self {
            Self {
                rng: Pcg32::seed_from_u64(seed),
                held: Vec::new(),
                frames_left: 0,
                step_dt,
            }
        }

        fn next_events(&mut self) -> Vec<RawEvent> {
            if self.frames_left > 0 {
                self.frames_left -= 1;
                return Vec::new();
            }
            let mut events: Vec<RawEvent> = self
                .held
                .drain(..)
                .map(|key| RawEvent::KeyUp { key: key.to_string() })
                .collect();
            // Fire goes down alongside the steering key most of the time
            let key = KEYS[self.rng.random_range(0..KEYS.len())];
            self.held.push(key);
            if key != " " && self.rng.random_bool(0.7) {
                self.held.push(" ");
            }
            events.extend(self.held.iter().map(|key| RawEvent::KeyDown { key: key.to_string() }));
            self.frames_left = self.rng.random_range(5..40);
            events
        }

        /// Frame delta around one step with jitter and the odd hitch
        fn frame_delta(&mut self) -> Duration {
            let base = self.step_dt * self.rng.random_range(0.6..1.4_f32);
            let hitch = if self.rng.random_bool(0.01) { 0.1 } else { 0.0 };
            Duration::from_secs_f32(base + hitch)
        }
    }

    pub fn run(ruleset: &str, frames: u32, quality: QualityPreset) -> Result<(), EngineError> {
        let settings = Settings::from_preset(quality);
        let step_dt = settings.step_dt();
        let controller = Controller::new(rulesets::by_name(ruleset)?, settings)?.with_base_seed(0xA11CE);
        let (host, mut core) = bridge::channel(controller);
        let mut pilot = Autopilot::new(7, step_dt);

        host.set_flags(true, false)?;
        let mut rendered_frames = 0u32;
        for frame in 0..frames {
            for event in pilot.next_events() {
                host.send(HostCommand::Input(event))?;
            }
            host.send(HostCommand::Frame(pilot.frame_delta()))?;
            core.pump();

            for event in host.drain() {
                match event {
                    HostEvent::State(snapshot) => log::info!(
                        "frame {:>5}: score {} lives {:.1} level {}{}{}",
                        frame,
                        snapshot.score,
                        snapshot.lives,
                        snapshot.level,
                        if snapshot.game_over { " GAME OVER" } else { "" },
                        if snapshot.game_won { " WON" } else { "" },
                    ),
                    HostEvent::Frame(rendered) => {
                        rendered_frames += 1;
                        log::trace!("frame {}: {} draw commands", frame, rendered.len());
                    }
                }
            }

            if core.controller().state().is_ended() {
                break;
            }
        }

        let snapshot = core.controller().snapshot();
        log::info!(
            "{} finished after {} ticks ({} rendered frames): {}",
            core.controller().ruleset_name(),
            core.controller().session().ticks,
            rendered_frames,
            serde_json::to_string(&snapshot).unwrap_or_default()
        );
        host.send(HostCommand::Unmount)?;
        core.pump();
        Ok(())
    }

    pub fn main() {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let mut args = std::env::args().skip(1);
        let ruleset = args.next().unwrap_or_else(|| "paddle".to_string());
        let frames = args
            .next()
            .and_then(|f| f.parse().ok())
            .unwrap_or(DEFAULT_FRAMES);
        let quality = args
            .next()
            .and_then(|q| QualityPreset::parse(&q))
            .unwrap_or_default();

        log::info!(
            "Arcade Engine (native) running '{}' for up to {} frames at {} quality",
            ruleset,
            frames,
            quality.as_str()
        );
        if let Err(err) = run(&ruleset, frames, quality) {
            log::error!("{}", err);
            eprintln!("error: {err}");
            eprintln!("available rulesets: {}", rulesets::NAMES.join(", "));
            std::process::exit(1);
        }
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    headless::main();
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is `platform::web::init`, this is just to satisfy the compiler
}
