#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use tabled::Tabled;
use typed_builder::TypedBuilder;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
/// Points earned out of points available.
pub struct Grade {
    /// Points earned.
    pub grade:  f64,
    /// Points available.
    pub out_of: f64,
}

impl Grade {
    /// `grade` points out of `out_of`.
    pub fn new(grade: f64, out_of: f64) -> Self {
        Self { grade, out_of }
    }

    /// `weight` scaled by a fraction clamped to `0.0..=1.0`.
    pub fn scaled(weight: f64, fraction: f64) -> Self {
        Self::new(weight * fraction.clamp(0.0, 1.0), weight)
    }

    /// Points lost against `out_of`.
    pub fn deduction(&self) -> f64 {
        (self.out_of - self.grade).max(0.0)
    }
}

impl Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}/{:.2}", self.grade, self.out_of)
    }
}

#[derive(Tabled, Clone, Debug, TypedBuilder, Serialize, Deserialize)]
#[builder(field_defaults(default, setter(into)))]
/// One row of the grade table.
pub struct GradeResult {
    #[tabled(rename = "Requirement")]
    /// * `requirement`: what was checked
    pub requirement: String,
    #[tabled(rename = "Grade")]
    /// * `grade`: points for the requirement
    pub grade:       Grade,
    #[tabled(rename = "Reason")]
    /// * `reason`: why points were lost, empty when none were
    pub reason:      String,
    #[tabled(skip)]
    /// * `bonus`: extra credit rows add to the total instead of deducting
    pub bonus:       bool,
}

impl GradeResult {
    /// Points earned on this row.
    pub fn grade_value(&self) -> f64 {
        self.grade.grade
    }
}

/// Applies every row to `total`: regular rows deduct what they lost, bonus
/// rows add what they earned.
pub fn total_grade(total: f64, rows: &[GradeResult]) -> Grade {
    let grade = rows.iter().fold(total, |acc, row| {
        if row.bonus {
            acc + row.grade_value()
        } else {
            acc - row.grade.deduction()
        }
    });
    Grade::new(grade.max(0.0), total)
}
