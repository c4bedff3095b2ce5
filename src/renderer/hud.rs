//! Score/level/lives HUD and the state overlay

use glam::Vec2;

use super::{Frame, TextAlign, shapes};
use crate::sim::state::{Outcome, Session, SessionState};

const HUD_TEXT: [f32; 4] = [0.92, 0.94, 1.0, 1.0];
const PIP_COLOR: [f32; 4] = [1.0, 0.35, 0.45, 1.0];
/// More than this many lives are shown as a number
const MAX_PIPS: f32 = 10.0;

/// Score (left), level (centre), lives (right)
pub fn draw(frame: &mut Frame, session: &Session, fractional: bool) {
    let w = frame.width;

    frame.text(
        Vec2::new(12.0, 24.0),
        format!("SCORE {}", session.score()),
        18.0,
        HUD_TEXT,
        TextAlign::Left,
    );
    frame.text(
        Vec2::new(w / 2.0, 24.0),
        format!("LEVEL {}", session.level()),
        18.0,
        HUD_TEXT,
        TextAlign::Center,
    );

    let lives = session.lives().max(0.0);
    if fractional {
        let initial = session.initial_lives().max(f32::EPSILON);
        shapes::bar(frame, Vec2::new(w - 132.0, 12.0), Vec2::new(120.0, 12.0), lives / initial);
    } else if lives <= MAX_PIPS {
        let pips = lives.ceil() as u32;
        for i in 0..pips {
            frame.circle(Vec2::new(w - 18.0 - i as f32 * 18.0, 18.0), 6.0, PIP_COLOR);
        }
    } else {
        frame.text(
            Vec2::new(w - 12.0, 24.0),
            format!("LIVES {}", lives.ceil()),
            18.0,
            HUD_TEXT,
            TextAlign::Right,
        );
    }
}

/// Dimmed banner for every state except Running
pub fn overlay(frame: &mut Frame, state: SessionState) {
    let (title, hint) = match state {
        SessionState::Running => return,
        SessionState::Idle => ("READY", "press play to start"),
        SessionState::Paused => ("PAUSED", "resume to continue"),
        SessionState::Ended(Outcome::Over) => ("GAME OVER", "restart to play again"),
        SessionState::Ended(Outcome::Won) => ("YOU WIN", "restart to play again"),
    };

    let (w, h) = (frame.width, frame.height);
    frame.rect(0.0, 0.0, w, h, [0.0, 0.0, 0.0, 0.55]);
    frame.text(Vec2::new(w / 2.0, h / 2.0), title, 42.0, HUD_TEXT, TextAlign::Center);
    frame.text(
        Vec2::new(w / 2.0, h / 2.0 + 32.0),
        hint,
        16.0,
        shapes::with_alpha(HUD_TEXT, 0.7),
        TextAlign::Center,
    );
}
