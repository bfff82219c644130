//! LLM — adapter for the remote generation service.
//!
//! DESIGN
//! ======
//! The `Generate` trait is the only seam the services see. `GeminiClient`
//! is the production implementation; tests script a `MockGenerate`. The
//! API key is a per-call argument rather than client state so the
//! credential can change mid-session without rebuilding the client.

pub mod config;
pub mod gemini;
pub mod types;

pub use gemini::GeminiClient;
pub use types::Generate;
