pub mod decision;
pub mod engine;

pub use engine::MatchingEngine;
