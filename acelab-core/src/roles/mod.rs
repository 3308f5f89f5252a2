//! The four ACE roles: Generator and Reflector are LLM-driven, Executor and
//! Curator are deterministic.

pub mod curator;
pub mod executor;
pub mod generator;
pub mod prompts;
pub mod reflector;

pub use curator::{Curator, CuratorOutcome, PruneThresholds};
pub use executor::{Executor, PlaybookDelta};
pub use generator::Generator;
pub use reflector::{summarize, Reflector, ReflectorConfig};
