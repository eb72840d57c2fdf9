//! Analysis and result aggregation modules
//!
//! Turns feature curves into reviewable analysis output:
//! - Candidate event streams
//! - Confidence scoring
//! - Result types

pub mod candidates;
pub mod confidence;
pub mod result;
