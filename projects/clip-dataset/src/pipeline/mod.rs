// Dataset preparation pipeline: stage entry points and extraction workers

pub mod orchestrator;
pub mod stages;
pub mod types;
