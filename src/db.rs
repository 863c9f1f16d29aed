use anyhow::Context;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};
use tracing::warn;
use uuid::Uuid;

use crate::credits;
use crate::models::{CreditTotals, GradeRow, Student};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let departments = vec![
        (
            Uuid::parse_str("1f0f8a76-1b2e-4e0a-9a3c-5d8e2b7c4a10")?,
            "CS",
            "Computer Science",
        ),
        (
            Uuid::parse_str("7c3d9e12-6f4b-4c8d-8e21-0a9b5d3c6e47")?,
            "MATH",
            "Mathematics",
        ),
        (
            Uuid::parse_str("3a8b2c54-9d1e-4f6a-b7c8-2e5f4a1d9b63")?,
            "PHYS",
            "Physics",
        ),
        (
            Uuid::parse_str("9e4f6a21-3c8d-4b5e-a1f2-7d6c5b4a3e90")?,
            "ART",
            "Fine Arts",
        ),
    ];

    for (id, code, name) in departments {
        sqlx::query(
            r#"
            INSERT INTO registrar.departments (id, code, name)
            VALUES ($1, $2, $3)
            ON CONFLICT (code) DO UPDATE SET name = EXCLUDED.name
            "#,
        )
        .bind(id)
        .bind(code)
        .bind(name)
        .execute(pool)
        .await?;
    }

    let students = vec![
        (
            "S-1001",
            "Avery Lee",
            "avery.lee@university.edu",
            Some("CS"),
            Some("MATH"),
        ),
        (
            "S-1002",
            "Jules Moreno",
            "jules.moreno@university.edu",
            Some("MATH"),
            None,
        ),
        ("S-1003", "Kiara Patel", "kiara.patel@university.edu", None, None),
    ];

    for (student_no, name, email, major, minor) in students {
        let major_id = department_id_by_code(pool, major).await?;
        let minor_id = department_id_by_code(pool, minor).await?;
        sqlx::query(
            r#"
            INSERT INTO registrar.students
            (id, student_no, full_name, email, major_department_id, minor_department_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (student_no) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                email = EXCLUDED.email,
                major_department_id = EXCLUDED.major_department_id,
                minor_department_id = EXCLUDED.minor_department_id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(student_no)
        .bind(name)
        .bind(email)
        .bind(major_id)
        .bind(minor_id)
        .execute(pool)
        .await?;
    }

    let courses = vec![
        ("CS-101", "Intro to Computing", "CS", Some(Decimal::new(30, 1))),
        ("MATH-201", "Linear Algebra", "MATH", Some(Decimal::new(40, 1))),
        ("PHYS-110", "Mechanics", "PHYS", Some(Decimal::new(20, 1))),
        ("ART-100", "Studio Foundations", "ART", None),
    ];

    for (code, title, department, credit_value) in courses {
        let department_id = department_id_by_code(pool, Some(department))
            .await?
            .context("seed department missing")?;
        sqlx::query(
            r#"
            INSERT INTO registrar.courses (id, code, title, department_id, credits)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (code) DO UPDATE
            SET title = EXCLUDED.title,
                department_id = EXCLUDED.department_id,
                credits = EXCLUDED.credits
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(code)
        .bind(title)
        .bind(department_id)
        .bind(credit_value)
        .execute(pool)
        .await?;
    }

    let offerings = vec![
        ("Dr. Okafor", "CS-101", "2026-spring"),
        ("Dr. Lindqvist", "MATH-201", "2026-spring"),
        ("Dr. Varga", "PHYS-110", "2026-spring"),
        ("Dr. Bellweather", "ART-100", "2026-spring"),
    ];

    for (teacher, course_code, term) in offerings {
        let course_id: Uuid = sqlx::query("SELECT id FROM registrar.courses WHERE code = $1")
            .bind(course_code)
            .fetch_one(pool)
            .await?
            .get("id");

        sqlx::query(
            r#"
            INSERT INTO registrar.teaching_assignments (id, teacher_name, course_id, term)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (course_id, term) DO UPDATE SET teacher_name = EXCLUDED.teacher_name
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(teacher)
        .bind(course_id)
        .bind(term)
        .execute(pool)
        .await?;
    }

    let grades = vec![
        ("S-1001", "CS-101", "2026-spring", Some(85.0)),
        ("S-1001", "MATH-201", "2026-spring", Some(70.0)),
        ("S-1001", "PHYS-110", "2026-spring", Some(55.0)),
        ("S-1002", "MATH-201", "2026-spring", Some(91.0)),
        ("S-1002", "ART-100", "2026-spring", Some(77.0)),
        ("S-1002", "CS-101", "2026-spring", None),
        ("S-1003", "PHYS-110", "2026-spring", Some(62.0)),
    ];

    let graded_at = NaiveDate::from_ymd_opt(2026, 5, 22).context("invalid date")?;
    for (student_no, course_code, term, score) in grades {
        record_grade(pool, student_no, course_code, term, score, Some(graded_at)).await?;
    }

    Ok(())
}

async fn department_id_by_code(
    pool: &PgPool,
    code: Option<&str>,
) -> anyhow::Result<Option<Uuid>> {
    let Some(code) = code else {
        return Ok(None);
    };
    let row = sqlx::query("SELECT id FROM registrar.departments WHERE code = $1")
        .bind(code)
        .fetch_optional(pool)
        .await?
        .with_context(|| format!("no department with code {code}"))?;
    Ok(Some(row.get("id")))
}

pub async fn fetch_students(
    pool: &PgPool,
    student_no: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<Vec<Student>> {
    let mut query = String::from(
        "SELECT st.id, st.student_no, st.full_name, st.email, \
         maj.code AS major_department, mnr.code AS minor_department, \
         st.major_credits, st.minor_credits \
         FROM registrar.students st \
         LEFT JOIN registrar.departments maj ON maj.id = st.major_department_id \
         LEFT JOIN registrar.departments mnr ON mnr.id = st.minor_department_id",
    );

    if student_no.is_some() {
        query.push_str(" WHERE st.student_no = $1");
    } else if email.is_some() {
        query.push_str(" WHERE st.email = $1");
    }
    query.push_str(" ORDER BY st.student_no");

    let mut rows = sqlx::query(&query);

    if let Some(value) = student_no {
        rows = rows.bind(value);
    } else if let Some(value) = email {
        rows = rows.bind(value);
    }

    let records = rows.fetch_all(pool).await?;
    let mut students = Vec::new();

    for row in records {
        students.push(Student {
            id: row.get("id"),
            student_no: row.get("student_no"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            major_department: row.get("major_department"),
            minor_department: row.get("minor_department"),
            major_credits: row.get("major_credits"),
            minor_credits: row.get("minor_credits"),
        });
    }

    Ok(students)
}

const GRADE_ROW_SELECT: &str =
    "SELECT g.student_id, st.student_no, st.full_name, \
     c.code AS course_code, c.title AS course_title, \
     c.department_id AS course_department_id, c.credits AS course_credits, \
     a.teacher_name, a.term, g.score, g.graded_at, \
     st.major_department_id, st.minor_department_id \
     FROM registrar.grade_records g \
     JOIN registrar.teaching_assignments a ON a.id = g.assignment_id \
     JOIN registrar.courses c ON c.id = a.course_id \
     JOIN registrar.students st ON st.id = g.student_id";

fn grade_row(row: &PgRow) -> GradeRow {
    GradeRow {
        student_id: row.get("student_id"),
        student_no: row.get("student_no"),
        student_name: row.get("full_name"),
        course_code: row.get("course_code"),
        course_title: row.get("course_title"),
        course_department_id: row.get("course_department_id"),
        course_credits: row.get("course_credits"),
        teacher_name: row.get("teacher_name"),
        term: row.get("term"),
        score: row.get("score"),
        graded_at: row.get("graded_at"),
        major_department_id: row.get("major_department_id"),
        minor_department_id: row.get("minor_department_id"),
    }
}

/// All grade rows for one student, as consumed by the aggregator and the
/// transcript summary.
pub async fn fetch_grade_rows(
    conn: &mut PgConnection,
    student_id: Uuid,
) -> anyhow::Result<Vec<GradeRow>> {
    let query = format!("{GRADE_ROW_SELECT} WHERE g.student_id = $1 ORDER BY a.term, c.code");
    let records = sqlx::query(&query)
        .bind(student_id)
        .fetch_all(&mut *conn)
        .await?;
    Ok(records.iter().map(grade_row).collect())
}

/// All grade rows for one course offering, including enrolled-but-ungraded
/// students.
pub async fn fetch_class_rows(
    pool: &PgPool,
    course_code: &str,
    term: &str,
) -> anyhow::Result<Vec<GradeRow>> {
    let query = format!("{GRADE_ROW_SELECT} WHERE c.code = $1 AND a.term = $2 ORDER BY st.student_no");
    let records = sqlx::query(&query)
        .bind(course_code)
        .bind(term)
        .fetch_all(pool)
        .await?;
    Ok(records.iter().map(grade_row).collect())
}

/// Overwrites the cached credit totals on the student record. This is the
/// aggregator's only write.
pub async fn store_credit_totals(
    conn: &mut PgConnection,
    student_id: Uuid,
    totals: &CreditTotals,
) -> anyhow::Result<()> {
    sqlx::query(
        "UPDATE registrar.students SET major_credits = $2, minor_credits = $3 WHERE id = $1",
    )
    .bind(student_id)
    .bind(totals.major_credits)
    .bind(totals.minor_credits)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Creates or replaces one grade and recomputes the student's credits in
/// the same transaction, so a failed recompute aborts the grade change.
pub async fn record_grade(
    pool: &PgPool,
    student_no: &str,
    course_code: &str,
    term: &str,
    score: Option<f64>,
    graded_at: Option<NaiveDate>,
) -> anyhow::Result<CreditTotals> {
    if let Some(score) = score {
        if !score.is_finite() || !(0.0..=100.0).contains(&score) {
            anyhow::bail!("score {score} is outside the 0-100 scale");
        }
    }

    let mut tx = pool.begin().await?;
    let student_id = student_id_by_no(&mut *tx, student_no).await?;
    let assignment_id = assignment_for(&mut *tx, course_code, term).await?;

    sqlx::query(
        r#"
        INSERT INTO registrar.grade_records (id, student_id, assignment_id, score, graded_at)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (student_id, assignment_id) DO UPDATE
        SET score = EXCLUDED.score, graded_at = EXCLUDED.graded_at
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(student_id)
    .bind(assignment_id)
    .bind(score)
    .bind(graded_at)
    .execute(&mut *tx)
    .await?;

    let totals = credits::recompute_credits(&mut *tx, student_id).await?;
    tx.commit().await?;
    Ok(totals)
}

/// Deletes one grade and recomputes the student's credits in the same
/// transaction. Returns `None` when no matching grade existed.
pub async fn delete_grade(
    pool: &PgPool,
    student_no: &str,
    course_code: &str,
    term: &str,
) -> anyhow::Result<Option<CreditTotals>> {
    let mut tx = pool.begin().await?;
    let student_id = student_id_by_no(&mut *tx, student_no).await?;
    let assignment_id = assignment_for(&mut *tx, course_code, term).await?;

    let result = sqlx::query(
        "DELETE FROM registrar.grade_records WHERE student_id = $1 AND assignment_id = $2",
    )
    .bind(student_id)
    .bind(assignment_id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    let totals = credits::recompute_credits(&mut *tx, student_id).await?;
    tx.commit().await?;
    Ok(Some(totals))
}

#[derive(Debug, Default)]
pub struct ImportOutcome {
    pub imported: usize,
    pub skipped: usize,
}

/// Imports grade rows from a CSV file. Each row runs through the same
/// transactional path as a single grade entry; bad rows are logged and
/// skipped without aborting the rest of the file.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<ImportOutcome> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        student_no: String,
        course_code: String,
        term: String,
        score: Option<f64>,
        graded_at: Option<NaiveDate>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut outcome = ImportOutcome::default();

    for result in reader.deserialize::<CsvRow>() {
        let row = match result {
            Ok(row) => row,
            Err(err) => {
                warn!(error = %err, "skipping unreadable csv row");
                outcome.skipped += 1;
                continue;
            }
        };

        match record_grade(
            pool,
            &row.student_no,
            &row.course_code,
            &row.term,
            row.score,
            row.graded_at,
        )
        .await
        {
            Ok(_) => outcome.imported += 1,
            Err(err) => {
                warn!(
                    student_no = %row.student_no,
                    course = %row.course_code,
                    error = %err,
                    "skipping grade row"
                );
                outcome.skipped += 1;
            }
        }
    }

    Ok(outcome)
}

async fn student_id_by_no(conn: &mut PgConnection, student_no: &str) -> anyhow::Result<Uuid> {
    let row = sqlx::query("SELECT id FROM registrar.students WHERE student_no = $1")
        .bind(student_no)
        .fetch_optional(&mut *conn)
        .await?
        .with_context(|| format!("no student with number {student_no}"))?;
    Ok(row.get("id"))
}

async fn assignment_for(
    conn: &mut PgConnection,
    course_code: &str,
    term: &str,
) -> anyhow::Result<Uuid> {
    let row = sqlx::query(
        "SELECT a.id FROM registrar.teaching_assignments a \
         JOIN registrar.courses c ON c.id = a.course_id \
         WHERE c.code = $1 AND a.term = $2",
    )
    .bind(course_code)
    .bind(term)
    .fetch_optional(&mut *conn)
    .await?
    .with_context(|| format!("no offering of {course_code} in {term}"))?;
    Ok(row.get("id"))
}
