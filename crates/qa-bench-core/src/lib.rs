//! qa-bench Core Library
//!
//! Evaluation harness for benchmarking question-answering accuracy of a
//! language model across structured-output strategies, graded by an LLM judge.

pub mod client;
pub mod config;
pub mod contract;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod generator;
pub mod grader;
pub mod grid;
pub mod logging;
pub mod prompt;
pub mod report;
