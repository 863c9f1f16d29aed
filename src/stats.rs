use rust_decimal::Decimal;

use crate::credits::{usable_score, PASS_MARK};
use crate::models::{ClassSummary, GradeRow, ScoreHistogram, StudentSummary};

/// Maps a 100-point score onto the 4-point scale. Fixed thresholds, no
/// interpolation.
pub fn grade_points(score: f64) -> f64 {
    match score {
        s if s >= 90.0 => 4.0,
        s if s >= 80.0 => 3.0,
        s if s >= 70.0 => 2.0,
        s if s >= 60.0 => 1.0,
        _ => 0.0,
    }
}

fn bump_band(histogram: &mut ScoreHistogram, score: f64) {
    match score {
        s if s >= 90.0 => histogram.band_90_100 += 1,
        s if s >= 80.0 => histogram.band_80_89 += 1,
        s if s >= 70.0 => histogram.band_70_79 += 1,
        s if s >= 60.0 => histogram.band_60_69 += 1,
        _ => histogram.band_0_59 += 1,
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Descriptive statistics over one student's grade set.
///
/// GPA is the arithmetic mean of per-record grade points, not
/// credit-weighted. `total_credits` counts every graded course,
/// `earned_credits` only passing ones. Zero gradable records report zero
/// counts and no averages.
pub fn summarize_student(rows: &[GradeRow]) -> StudentSummary {
    let mut scores = Vec::new();
    let mut total_credits = Decimal::ZERO;
    let mut earned_credits = Decimal::ZERO;

    for row in rows {
        let score = match usable_score(row.score) {
            Some(score) => score,
            None => continue,
        };
        scores.push(score);

        let credits = row.course_credits.unwrap_or(Decimal::ZERO);
        total_credits += credits;
        if score >= PASS_MARK {
            earned_credits += credits;
        }
    }

    let passed = scores.iter().filter(|s| **s >= PASS_MARK).count();
    let points: Vec<f64> = scores.iter().map(|s| grade_points(*s)).collect();

    StudentSummary {
        total: scores.len(),
        passed,
        failed: scores.len() - passed,
        average_score: mean(&scores),
        gpa: mean(&points),
        total_credits,
        earned_credits,
    }
}

/// Descriptive statistics over one class offering's grade set.
///
/// The roster counts every enrolled student; averages, the pass rate
/// (a percentage), and the histogram cover only gradable scores. An empty
/// or ungraded class reports zero counts and no averages.
pub fn summarize_class(rows: &[GradeRow]) -> ClassSummary {
    let total_students = rows
        .iter()
        .map(|row| row.student_id)
        .collect::<std::collections::HashSet<_>>()
        .len();
    let scores: Vec<f64> = rows.iter().filter_map(|row| usable_score(row.score)).collect();

    let mut histogram = ScoreHistogram::default();
    for score in &scores {
        bump_band(&mut histogram, *score);
    }

    let passed = scores.iter().filter(|s| **s >= PASS_MARK).count();
    let pass_rate = if scores.is_empty() {
        None
    } else {
        Some(passed as f64 / scores.len() as f64 * 100.0)
    };

    ClassSummary {
        total_students,
        graded: scores.len(),
        average: mean(&scores),
        high: scores.iter().copied().reduce(f64::max),
        low: scores.iter().copied().reduce(f64::min),
        pass_rate,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn graded_row(score: Option<f64>, credits: Option<Decimal>) -> GradeRow {
        let cs = Uuid::from_u128(10);
        GradeRow {
            student_id: Uuid::new_v4(),
            student_no: "S-1001".to_string(),
            student_name: "Avery Lee".to_string(),
            course_code: "CS-101".to_string(),
            course_title: "Intro to Computing".to_string(),
            course_department_id: cs,
            course_credits: credits,
            teacher_name: "Dr. Okafor".to_string(),
            term: "2026-spring".to_string(),
            score,
            graded_at: None,
            major_department_id: Some(cs),
            minor_department_id: None,
        }
    }

    #[test]
    fn grade_points_follow_fixed_thresholds() {
        assert_eq!(grade_points(100.0), 4.0);
        assert_eq!(grade_points(90.0), 4.0);
        assert_eq!(grade_points(89.9), 3.0);
        assert_eq!(grade_points(80.0), 3.0);
        assert_eq!(grade_points(79.9), 2.0);
        assert_eq!(grade_points(70.0), 2.0);
        assert_eq!(grade_points(60.0), 1.0);
        assert_eq!(grade_points(59.9), 0.0);
        assert_eq!(grade_points(0.0), 0.0);
    }

    #[test]
    fn histogram_boundaries_are_lower_bound_inclusive() {
        let rows = vec![
            graded_row(Some(90.0), None),
            graded_row(Some(80.0), None),
            graded_row(Some(70.0), None),
            graded_row(Some(60.0), None),
            graded_row(Some(59.9), None),
        ];

        let summary = summarize_class(&rows);
        assert_eq!(summary.histogram.band_90_100, 1);
        assert_eq!(summary.histogram.band_80_89, 1);
        assert_eq!(summary.histogram.band_70_79, 1);
        assert_eq!(summary.histogram.band_60_69, 1);
        assert_eq!(summary.histogram.band_0_59, 1);
    }

    #[test]
    fn class_of_five_matches_expected_aggregates() {
        let rows: Vec<GradeRow> = [95.0, 85.0, 72.0, 61.0, 40.0]
            .iter()
            .map(|s| graded_row(Some(*s), None))
            .collect();

        let summary = summarize_class(&rows);
        assert_eq!(summary.total_students, 5);
        assert_eq!(summary.graded, 5);
        assert!((summary.pass_rate.unwrap() - 80.0).abs() < 0.001);
        assert!((summary.average.unwrap() - 70.6).abs() < 0.001);
        assert_eq!(summary.high, Some(95.0));
        assert_eq!(summary.low, Some(40.0));
        assert_eq!(summary.histogram.band_90_100, 1);
        assert_eq!(summary.histogram.band_80_89, 1);
        assert_eq!(summary.histogram.band_70_79, 1);
        assert_eq!(summary.histogram.band_60_69, 1);
        assert_eq!(summary.histogram.band_0_59, 1);
    }

    #[test]
    fn empty_class_reports_null_averages() {
        let summary = summarize_class(&[]);
        assert_eq!(summary.total_students, 0);
        assert_eq!(summary.graded, 0);
        assert_eq!(summary.average, None);
        assert_eq!(summary.high, None);
        assert_eq!(summary.low, None);
        assert_eq!(summary.pass_rate, None);
        assert_eq!(summary.histogram, ScoreHistogram::default());
    }

    #[test]
    fn ungraded_rows_count_toward_roster_only() {
        let rows = vec![graded_row(Some(75.0), None), graded_row(None, None)];

        let summary = summarize_class(&rows);
        assert_eq!(summary.total_students, 2);
        assert_eq!(summary.graded, 1);
        assert_eq!(summary.pass_rate, Some(100.0));
    }

    #[test]
    fn student_summary_splits_attempted_and_earned_credits() {
        let rows = vec![
            graded_row(Some(85.0), Some(Decimal::from(3))),
            graded_row(Some(55.0), Some(Decimal::from(4))),
            graded_row(None, Some(Decimal::from(2))),
        ];

        let summary = summarize_student(&rows);
        assert_eq!(summary.total, 2);
        assert_eq!(summary.passed, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.total_credits, Decimal::from(7));
        assert_eq!(summary.earned_credits, Decimal::from(3));
        assert!((summary.average_score.unwrap() - 70.0).abs() < 0.001);
    }

    #[test]
    fn gpa_is_a_plain_mean_of_grade_points() {
        // 92 -> 4.0 and 71 -> 2.0; credits must not weight the mean
        let rows = vec![
            graded_row(Some(92.0), Some(Decimal::from(1))),
            graded_row(Some(71.0), Some(Decimal::from(5))),
        ];

        let summary = summarize_student(&rows);
        assert!((summary.gpa.unwrap() - 3.0).abs() < 0.001);
    }

    #[test]
    fn student_with_no_gradable_records_reports_zeroes() {
        let summary = summarize_student(&[graded_row(None, Some(Decimal::from(3)))]);
        assert_eq!(summary.total, 0);
        assert_eq!(summary.average_score, None);
        assert_eq!(summary.gpa, None);
        assert_eq!(summary.total_credits, Decimal::ZERO);
        assert_eq!(summary.earned_credits, Decimal::ZERO);
    }
}
