use std::fmt::Write;

use crate::models::GradeRow;
use crate::stats;

/// Renders a markdown report for one course offering: summary statistics,
/// the score-band distribution, and the graded roster.
pub fn build_class_report(course_code: &str, term: &str, rows: &[GradeRow]) -> String {
    let summary = stats::summarize_class(rows);

    let mut output = String::new();
    let _ = writeln!(output, "# Class Report: {course_code} ({term})");

    if let Some(row) = rows.first() {
        let _ = writeln!(
            output,
            "{} — taught by {}",
            row.course_title, row.teacher_name
        );
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- enrolled: {}", summary.total_students);
    let _ = writeln!(output, "- graded: {}", summary.graded);

    match (summary.average, summary.high, summary.low, summary.pass_rate) {
        (Some(average), Some(high), Some(low), Some(pass_rate)) => {
            let _ = writeln!(output, "- average score: {average:.1}");
            let _ = writeln!(output, "- high / low: {high:.1} / {low:.1}");
            let _ = writeln!(output, "- pass rate: {pass_rate:.1}%");
        }
        _ => {
            let _ = writeln!(output, "- no gradable scores recorded yet");
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Score Distribution");
    let histogram = summary.histogram;
    let bands = [
        ("90-100", histogram.band_90_100),
        ("80-89", histogram.band_80_89),
        ("70-79", histogram.band_70_79),
        ("60-69", histogram.band_60_69),
        ("0-59", histogram.band_0_59),
    ];
    for (label, count) in bands {
        let _ = writeln!(output, "- {label}: {count}");
    }

    let mut graded: Vec<&GradeRow> = rows.iter().filter(|row| row.score.is_some()).collect();
    graded.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let _ = writeln!(output);
    let _ = writeln!(output, "## Roster");

    if graded.is_empty() {
        let _ = writeln!(output, "No grades recorded for this offering.");
    } else {
        for row in graded {
            let score = row.score.unwrap_or_default();
            let _ = writeln!(
                output,
                "- {} ({}): {:.1}",
                row.student_name, row.student_no, score
            );
        }
    }

    let ungraded = rows.iter().filter(|row| row.score.is_none()).count();
    if ungraded > 0 {
        let _ = writeln!(output, "- {ungraded} enrolled without a grade");
    }

    let mut recent: Vec<&GradeRow> = rows
        .iter()
        .filter(|row| row.graded_at.is_some() && row.score.is_some())
        .collect();
    recent.sort_by(|a, b| b.graded_at.cmp(&a.graded_at));

    if !recent.is_empty() {
        let _ = writeln!(output);
        let _ = writeln!(output, "## Recently Graded");
        for row in recent.iter().take(5) {
            let _ = writeln!(
                output,
                "- {} — {} {} on {}: {:.1}",
                row.student_name,
                row.course_code,
                row.term,
                row.graded_at.unwrap_or_default(),
                row.score.unwrap_or_default()
            );
        }
    }

    output
}
