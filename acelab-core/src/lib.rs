//! ACE loop core engine.
//!
//! Provides the Playbook knowledge base, the LLM client seam with defensive
//! JSON decoding, the price-replay simulator, and the four ACE roles
//! (Generator, Executor, Reflector, Curator).

pub mod domain;
pub mod llm;
pub mod playbook;
pub mod roles;
pub mod sim;
