//! Session state and score/progress model
//!
//! One `Session` exists per mounted game. It is rebuilt wholesale on every
//! start; nothing is patched across play-throughs.

use serde::{Deserialize, Serialize};

/// How a session finished
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    /// Lives ran out
    Over,
    /// The ruleset's win predicate held
    Won,
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Mounted, never started
    Idle,
    /// Ticks are being delivered
    Running,
    /// Frozen; no world mutation happens
    Paused,
    /// Terminal; only a fresh start leaves this state
    Ended(Outcome),
}

impl SessionState {
    pub fn is_ended(&self) -> bool {
        matches!(self, SessionState::Ended(_))
    }
}

/// Lives within this distance of zero count as zero (fractional drains)
const LIVES_EPSILON: f32 = 1e-4;

/// State pushed to the host on every visible change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub score: u64,
    pub lives: f32,
    pub level: u32,
    pub game_over: bool,
    pub game_won: bool,
}

/// Complete mutable progress of one play-through
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Run seed for reproducibility
    pub seed: u64,
    state: SessionState,
    score: u64,
    /// Numeric health pool; integer-valued for most rulesets
    lives: f32,
    initial_lives: f32,
    /// 1-based level
    level: u32,
    game_over: bool,
    game_won: bool,
    /// Ticks simulated in this session
    pub ticks: u64,
}

impl Session {
    pub fn new(initial_lives: f32, seed: u64) -> Self {
        Self {
            seed,
            state: SessionState::Idle,
            score: 0,
            lives: initial_lives,
            initial_lives,
            level: 1,
            game_over: false,
            game_won: false,
            ticks: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    pub fn score(&self) -> u64 {
        self.score
    }

    pub fn lives(&self) -> f32 {
        self.lives
    }

    pub fn initial_lives(&self) -> f32 {
        self.initial_lives
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn game_over(&self) -> bool {
        self.game_over
    }

    pub fn game_won(&self) -> bool {
        self.game_won
    }

    /// Game over or won
    pub fn is_terminal(&self) -> bool {
        self.game_over || self.game_won
    }

    /// Award points. Ignored once the session is terminal.
    pub fn add_score(&mut self, points: u64) {
        if self.is_terminal() {
            return;
        }
        self.score = self.score.saturating_add(points);
    }

    /// Remove lives (fractional amounts allowed).
    ///
    /// Returns true exactly once: on the call that crosses into game over.
    pub fn lose_lives(&mut self, amount: f32) -> bool {
        if self.is_terminal() || !amount.is_finite() || amount <= 0.0 {
            return false;
        }
        self.lives -= amount;
        if self.lives.abs() < LIVES_EPSILON {
            self.lives = 0.0;
        }
        if self.lives <= 0.0 {
            self.game_over = true;
            self.state = SessionState::Ended(Outcome::Over);
            log::info!("game over: score {} level {}", self.score, self.level);
            return true;
        }
        false
    }

    /// Restore lives, optionally capped (health pools)
    pub fn gain_lives(&mut self, amount: f32, cap: Option<f32>) {
        if self.is_terminal() || !amount.is_finite() || amount <= 0.0 {
            return;
        }
        self.lives += amount;
        if let Some(cap) = cap {
            self.lives = self.lives.min(cap);
        }
    }

    /// Move to the next level; returns the new level
    pub fn advance_level(&mut self) -> u32 {
        if !self.is_terminal() {
            self.level += 1;
            log::info!("level {}", self.level);
        }
        self.level
    }

    /// Mark the session won. Returns true exactly once.
    pub fn declare_won(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.game_won = true;
        self.state = SessionState::Ended(Outcome::Won);
        log::info!("game won: score {} level {}", self.score, self.level);
        true
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            score: self.score,
            lives: self.lives,
            level: self.level,
            game_over: self.game_over,
            game_won: self.game_won,
        }
    }
}
