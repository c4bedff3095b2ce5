//! Concrete games built on the engine
//!
//! Each ruleset only supplies spawning, policies and win conditions; the
//! loop, collisions, particles, lifecycle and rendering are shared.

pub mod defense;
pub mod paddle;
pub mod racer;
pub mod runner;
pub mod shooter;
pub mod stacker;
pub mod stealth;

use crate::error::EngineError;
use crate::sim::ruleset::Ruleset;

/// Catalog names, in display order
pub const NAMES: [&str; 7] = ["paddle", "shooter", "racer", "stealth", "defense", "runner", "stacker"];

/// Look up a fresh ruleset by catalog name (case-insensitive)
pub fn by_name(name: &str) -> Result<Box<dyn Ruleset>, EngineError> {
    let ruleset: Box<dyn Ruleset> = match name.trim().to_ascii_lowercase().as_str() {
        "paddle" | "breakout" => Box::new(paddle::Paddle::new()),
        "shooter" => Box::new(shooter::Shooter::new()),
        "racer" => Box::new(racer::Racer::new()),
        "stealth" => Box::new(stealth::Stealth::new()),
        "defense" => Box::new(defense::Defense::new()),
        "runner" => Box::new(runner::Runner::new()),
        "stacker" | "puzzle" => Box::new(stacker::Stacker::new()),
        _ => return Err(EngineError::UnknownRuleset(name.to_string())),
    };
    Ok(ruleset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_names_resolve() {
        for name in NAMES {
            let ruleset = by_name(name).unwrap();
            assert_eq!(ruleset.name(), name);
        }
        assert_eq!(by_name(" Shooter ").unwrap().name(), "shooter");
        assert_eq!(by_name("breakout").unwrap().name(), "paddle");
        assert_eq!(by_name("Puzzle").unwrap().name(), "stacker");
    }

    #[test]
    fn test_unknown_name() {
        match by_name("chess") {
            Err(EngineError::UnknownRuleset(name)) => assert_eq!(name, "chess"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(ruleset) => panic!("resolved to {}", ruleset.name()),
        }
    }
}
