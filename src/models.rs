use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Student {
    pub id: Uuid,
    pub student_no: String,
    pub full_name: String,
    pub email: String,
    pub major_department: Option<String>,
    pub minor_department: Option<String>,
    pub major_credits: Decimal,
    pub minor_credits: Decimal,
}

/// One grade record joined with its course, offering, and the owning
/// student's current major/minor departments.
#[derive(Debug, Clone)]
pub struct GradeRow {
    pub student_id: Uuid,
    pub student_no: String,
    pub student_name: String,
    pub course_code: String,
    pub course_title: String,
    pub course_department_id: Uuid,
    pub course_credits: Option<Decimal>,
    pub teacher_name: String,
    pub term: String,
    pub score: Option<f64>,
    pub graded_at: Option<NaiveDate>,
    pub major_department_id: Option<Uuid>,
    pub minor_department_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreditTotals {
    pub major_credits: Decimal,
    pub minor_credits: Decimal,
    pub total_credits: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct StudentSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub average_score: Option<f64>,
    pub gpa: Option<f64>,
    pub total_credits: Decimal,
    pub earned_credits: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassSummary {
    pub total_students: usize,
    pub graded: usize,
    pub average: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub pass_rate: Option<f64>,
    pub histogram: ScoreHistogram,
}

/// Fixed score bands; boundary values belong to the lower-bound-inclusive band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreHistogram {
    pub band_90_100: usize,
    pub band_80_89: usize,
    pub band_70_79: usize,
    pub band_60_69: usize,
    pub band_0_59: usize,
}
