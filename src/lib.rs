//! # gradecheck
//!
//! Fetches, builds and grades C++ homework submissions. The heart of the
//! crate is [`reconcile`], which checks a program's printed buckets against
//! the expected test cases of an assignment, allowing a bucket to be printed
//! in reverse.

#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Grades every submission of an assignment, one at a time
pub mod batch;
/// Builds CMake projects and runs the resulting program
pub mod build;
/// Grading configuration and environment
pub mod config;
/// Lists and clones submission repositories from GitHub
pub mod fetch;
/// Source checks and grade rows
pub mod grade;
/// Runs shell commands with a timeout
pub mod process;
/// Matches program output against expected test cases
pub mod reconcile;
/// Plain-text per-submission reports
pub mod report;
/// Utility functions for convenience
pub mod util;
