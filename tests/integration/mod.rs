//! Integration tests for the page generation pipeline

mod assembly_repair;
mod fallback_chain;
mod pipeline_scenarios;
mod skeleton_extraction;
