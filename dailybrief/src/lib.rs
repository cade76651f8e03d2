// Library interface for dailybrief modules
// This allows tests and the helper binaries to import modules

pub mod ingestion;
pub mod llm;
pub mod models;
pub mod notify;
pub mod pipeline;
pub mod report;
