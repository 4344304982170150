pub mod distribution;
pub mod lead;
pub mod scoring;
