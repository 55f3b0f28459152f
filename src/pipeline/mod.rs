pub mod batches;
pub mod clusters;
pub mod metadata;
pub mod orchestrator;
pub mod prompts;
