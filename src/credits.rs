use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::warn;
use uuid::Uuid;

use crate::db;
use crate::models::{CreditTotals, GradeRow};

/// Scores at or above this mark earn the course's credits.
pub const PASS_MARK: f64 = 60.0;

/// A score counts toward credits and statistics only when it is an actual
/// finite number; NULL or garbage values are excluded, never an error.
pub fn usable_score(score: Option<f64>) -> Option<f64> {
    score.filter(|s| s.is_finite())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Major,
    Minor,
}

/// Buckets a course by department at evaluation time, so a change of major
/// reclassifies old grades on the next recomputation. Electives (neither
/// major nor minor department) accrue to the major bucket.
fn classify(
    course_department: Uuid,
    major_department: Option<Uuid>,
    minor_department: Option<Uuid>,
) -> Bucket {
    if minor_department == Some(course_department) && major_department != Some(course_department) {
        Bucket::Minor
    } else {
        Bucket::Major
    }
}

/// Sums earned credits per bucket over a student's grade rows.
///
/// Only passing records contribute; a course with no credit value
/// contributes zero. The result is derived wholly from the rows, so
/// repeated calls over the same rows always agree.
pub fn tally_credits(rows: &[GradeRow]) -> CreditTotals {
    let mut major = Decimal::ZERO;
    let mut minor = Decimal::ZERO;

    for row in rows {
        let score = match usable_score(row.score) {
            Some(score) => score,
            None => continue,
        };
        if score < PASS_MARK {
            continue;
        }

        let credits = row.course_credits.unwrap_or(Decimal::ZERO);
        match classify(
            row.course_department_id,
            row.major_department_id,
            row.minor_department_id,
        ) {
            Bucket::Major => major += credits,
            Bucket::Minor => minor += credits,
        }
    }

    CreditTotals {
        major_credits: major,
        minor_credits: minor,
        total_credits: major + minor,
    }
}

/// Recomputes a student's credit totals from their grade set and overwrites
/// the stored fields wholesale. The stored totals are a cache, never a
/// source of truth; callers mutating grades run this on the same
/// transaction so the mutation and the recompute commit or abort together.
pub async fn recompute_credits(
    conn: &mut PgConnection,
    student_id: Uuid,
) -> anyhow::Result<CreditTotals> {
    let rows = db::fetch_grade_rows(conn, student_id).await?;
    let totals = tally_credits(&rows);
    db::store_credit_totals(conn, student_id, &totals).await?;
    Ok(totals)
}

#[derive(Debug)]
pub struct RecomputeOutcome {
    pub student_no: String,
    pub full_name: String,
    pub result: anyhow::Result<CreditTotals>,
}

/// Recomputes credits for every matching student. A failure for one student
/// is logged and reported in its outcome; it never aborts the batch.
pub async fn recompute_all(
    pool: &PgPool,
    student_no: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<RecomputeOutcome>> {
    let students = db::fetch_students(pool, student_no, email).await?;
    let mut conn = pool
        .acquire()
        .await
        .context("failed to acquire a connection for batch recompute")?;

    let mut outcomes = Vec::with_capacity(students.len());
    for student in students {
        let result = recompute_credits(&mut conn, student.id).await;
        if let Err(err) = &result {
            warn!(
                student_no = %student.student_no,
                error = %err,
                "credit recompute failed"
            );
        }
        outcomes.push(RecomputeOutcome {
            student_no: student.student_no,
            full_name: student.full_name,
            result,
        });
    }

    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dept(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn zero_totals() -> CreditTotals {
        CreditTotals {
            major_credits: Decimal::ZERO,
            minor_credits: Decimal::ZERO,
            total_credits: Decimal::ZERO,
        }
    }

    fn grade_row(
        course_department: Uuid,
        major: Option<Uuid>,
        minor: Option<Uuid>,
        credits: Option<Decimal>,
        score: Option<f64>,
    ) -> GradeRow {
        GradeRow {
            student_id: Uuid::from_u128(1),
            student_no: "S-1001".to_string(),
            student_name: "Avery Lee".to_string(),
            course_code: "CS-101".to_string(),
            course_title: "Intro to Computing".to_string(),
            course_department_id: course_department,
            course_credits: credits,
            teacher_name: "Dr. Okafor".to_string(),
            term: "2026-spring".to_string(),
            score,
            graded_at: None,
            major_department_id: major,
            minor_department_id: minor,
        }
    }

    #[test]
    fn empty_grade_set_yields_zero_totals() {
        let totals = tally_credits(&[]);
        assert_eq!(totals, zero_totals());
    }

    #[test]
    fn buckets_split_by_department_match() {
        let cs = dept(10);
        let math = dept(20);
        let phys = dept(30);
        let rows = vec![
            grade_row(cs, Some(cs), Some(math), Some(Decimal::from(3)), Some(85.0)),
            grade_row(math, Some(cs), Some(math), Some(Decimal::from(4)), Some(70.0)),
            grade_row(phys, Some(cs), Some(math), Some(Decimal::from(2)), Some(55.0)),
        ];

        let totals = tally_credits(&rows);
        assert_eq!(totals.major_credits, Decimal::from(3));
        assert_eq!(totals.minor_credits, Decimal::from(4));
        assert_eq!(totals.total_credits, Decimal::from(7));
    }

    #[test]
    fn passing_elective_accrues_to_major_bucket() {
        let cs = dept(10);
        let math = dept(20);
        let art = dept(40);
        let rows = vec![grade_row(
            art,
            Some(cs),
            Some(math),
            Some(Decimal::from(2)),
            Some(75.0),
        )];

        let totals = tally_credits(&rows);
        assert_eq!(totals.major_credits, Decimal::from(2));
        assert_eq!(totals.minor_credits, Decimal::ZERO);
        assert_eq!(totals.total_credits, Decimal::from(2));
    }

    #[test]
    fn student_without_major_department_still_accrues() {
        let phys = dept(30);
        let rows = vec![grade_row(phys, None, None, Some(Decimal::from(3)), Some(90.0))];

        let totals = tally_credits(&rows);
        assert_eq!(totals.major_credits, Decimal::from(3));
        assert_eq!(totals.total_credits, Decimal::from(3));
    }

    #[test]
    fn missing_credit_value_contributes_zero() {
        let cs = dept(10);
        let rows = vec![
            grade_row(cs, Some(cs), None, None, Some(95.0)),
            grade_row(cs, Some(cs), None, Some(Decimal::from(3)), Some(80.0)),
        ];

        let totals = tally_credits(&rows);
        assert_eq!(totals.major_credits, Decimal::from(3));
    }

    #[test]
    fn unusable_scores_are_excluded() {
        let cs = dept(10);
        let rows = vec![
            grade_row(cs, Some(cs), None, Some(Decimal::from(3)), None),
            grade_row(cs, Some(cs), None, Some(Decimal::from(3)), Some(f64::NAN)),
            grade_row(cs, Some(cs), None, Some(Decimal::from(3)), Some(f64::INFINITY)),
        ];

        let totals = tally_credits(&rows);
        assert_eq!(totals, zero_totals());
    }

    #[test]
    fn pass_mark_is_inclusive() {
        let cs = dept(10);
        let rows = vec![
            grade_row(cs, Some(cs), None, Some(Decimal::from(3)), Some(60.0)),
            grade_row(cs, Some(cs), None, Some(Decimal::from(4)), Some(59.9)),
        ];

        let totals = tally_credits(&rows);
        assert_eq!(totals.total_credits, Decimal::from(3));
    }

    #[test]
    fn tally_is_idempotent_over_an_unchanged_grade_set() {
        let cs = dept(10);
        let math = dept(20);
        let rows = vec![
            grade_row(cs, Some(cs), Some(math), Some(Decimal::from(3)), Some(85.0)),
            grade_row(math, Some(cs), Some(math), Some(Decimal::from(4)), Some(70.0)),
        ];

        assert_eq!(tally_credits(&rows), tally_credits(&rows));
    }

    #[test]
    fn course_in_both_major_and_minor_counts_once_for_major() {
        // major == minor is a degenerate configuration; the major bucket wins
        let cs = dept(10);
        let rows = vec![grade_row(cs, Some(cs), Some(cs), Some(Decimal::from(3)), Some(85.0))];

        let totals = tally_credits(&rows);
        assert_eq!(totals.major_credits, Decimal::from(3));
        assert_eq!(totals.minor_credits, Decimal::ZERO);
    }
}
