#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! Rubric checks on submission sources and the grade rows they produce.

/// Header, method, list and prime checks over `.hpp`/`.cpp` files
pub mod checks;
/// Grade and per-requirement result types
pub mod results;

pub use checks::{
    FileKind, HeaderFinding, HeaderProblem, HeaderSummary, MethodFinding, MethodReport,
    SourceFile, SourceFiles, check_header, check_headers, check_methods, has_prime_literal,
    uses_list,
};
pub use results::{Grade, GradeResult, total_grade};
