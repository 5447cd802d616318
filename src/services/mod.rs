pub mod handoff;
pub mod interview;
pub mod llm;
pub mod persona;
pub mod pipeline;
pub mod prompts;
pub mod session_store;
