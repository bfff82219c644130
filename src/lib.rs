//! Terminal chat client for the Gemini generation API.

pub mod credential;
pub mod error;
pub mod image;
pub mod llm;
pub mod message;
pub mod repl;
pub mod services;
