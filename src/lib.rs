//! Track enrichment library - shared modules for all binaries.

pub mod analysis;
pub mod dataset;
pub mod models;
pub mod output;
pub mod progress;
pub mod region;
pub mod safety;
pub mod spotify;
pub mod transform;
