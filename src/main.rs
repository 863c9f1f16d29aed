use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{ArgGroup, Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod credits;
mod db;
mod models;
mod report;
mod stats;

#[derive(Parser)]
#[command(name = "credit-tracker")]
#[command(about = "Student credit and GPA tracker for the university registrar", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Import grade records from a CSV file
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Record or replace one grade and recompute the student's credits
    RecordGrade {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        term: String,
        /// 0-100 score; omit to enroll the student ungraded
        #[arg(long)]
        score: Option<f64>,
        #[arg(long)]
        graded_at: Option<NaiveDate>,
    },
    /// Delete one grade and recompute the student's credits
    DeleteGrade {
        #[arg(long)]
        student: String,
        #[arg(long)]
        course: String,
        #[arg(long)]
        term: String,
    },
    /// Recompute credit totals across students
    #[command(group(
        ArgGroup::new("scope")
            .args(["student", "email"])
            .multiple(false)
    ))]
    Recompute {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// Print a transcript summary for one student
    #[command(group(
        ArgGroup::new("scope")
            .args(["student", "email"])
            .required(true)
            .multiple(false)
    ))]
    Summary {
        #[arg(long)]
        student: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Print summary statistics for one course offering
    ClassSummary {
        #[arg(long)]
        course: String,
        #[arg(long)]
        term: String,
        #[arg(long)]
        json: bool,
    },
    /// Generate a markdown report for one course offering
    Report {
        #[arg(long)]
        course: String,
        #[arg(long)]
        term: String,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let database_url = std::env::var("DATABASE_URL")
        .context("DATABASE_URL must be set to a Postgres instance")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to Postgres")?;

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::Import { csv } => {
            let outcome = db::import_csv(&pool, &csv).await?;
            println!(
                "Imported {} grades from {} ({} skipped).",
                outcome.imported,
                csv.display(),
                outcome.skipped
            );
        }
        Commands::RecordGrade {
            student,
            course,
            term,
            score,
            graded_at,
        } => {
            let totals = db::record_grade(&pool, &student, &course, &term, score, graded_at).await?;
            println!("Recorded {course} ({term}) for {student}.");
            print_totals(&totals);
        }
        Commands::DeleteGrade {
            student,
            course,
            term,
        } => match db::delete_grade(&pool, &student, &course, &term).await? {
            Some(totals) => {
                println!("Deleted {course} ({term}) for {student}.");
                print_totals(&totals);
            }
            None => println!("No grade of {course} ({term}) on record for {student}."),
        },
        Commands::Recompute { student, email } => {
            let outcomes =
                credits::recompute_all(&pool, student.as_deref(), email.as_deref()).await?;

            if outcomes.is_empty() {
                println!("No students matched.");
                return Ok(());
            }

            let mut failures = 0usize;
            for outcome in &outcomes {
                match &outcome.result {
                    Ok(totals) => println!(
                        "- {} ({}): major {} / minor {} / total {}",
                        outcome.full_name,
                        outcome.student_no,
                        totals.major_credits,
                        totals.minor_credits,
                        totals.total_credits
                    ),
                    Err(err) => {
                        failures += 1;
                        println!(
                            "- {} ({}): FAILED ({err:#})",
                            outcome.full_name, outcome.student_no
                        );
                    }
                }
            }
            println!(
                "Recomputed {} students, {failures} failed.",
                outcomes.len() - failures
            );
        }
        Commands::Summary {
            student,
            email,
            json,
        } => {
            let students =
                db::fetch_students(&pool, student.as_deref(), email.as_deref()).await?;
            let student = students.into_iter().next().context("no student matched")?;

            let mut conn = pool.acquire().await?;
            let rows = db::fetch_grade_rows(&mut conn, student.id).await?;
            let summary = stats::summarize_student(&rows);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Transcript summary for {} ({}, {}):",
                    student.full_name, student.student_no, student.email
                );
                println!(
                    "- major: {} / minor: {}",
                    student.major_department.as_deref().unwrap_or("none"),
                    student.minor_department.as_deref().unwrap_or("none")
                );
                println!(
                    "- graded: {} (passed {}, failed {})",
                    summary.total, summary.passed, summary.failed
                );
                match (summary.average_score, summary.gpa) {
                    (Some(average), Some(gpa)) => {
                        println!("- average score: {average:.1}");
                        println!("- GPA: {gpa:.2}");
                    }
                    _ => println!("- no gradable scores recorded yet"),
                }
                println!(
                    "- credits earned: {} of {} attempted",
                    summary.earned_credits, summary.total_credits
                );
                println!(
                    "- credits on record: major {} / minor {}",
                    student.major_credits, student.minor_credits
                );
            }
        }
        Commands::ClassSummary { course, term, json } => {
            let rows = db::fetch_class_rows(&pool, &course, &term).await?;
            let summary = stats::summarize_class(&rows);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("Class summary for {course} ({term}):");
                println!(
                    "- enrolled: {} (graded {})",
                    summary.total_students, summary.graded
                );
                match (summary.average, summary.high, summary.low, summary.pass_rate) {
                    (Some(average), Some(high), Some(low), Some(pass_rate)) => {
                        println!("- average: {average:.1} (high {high:.1}, low {low:.1})");
                        println!("- pass rate: {pass_rate:.1}%");
                    }
                    _ => println!("- no gradable scores recorded yet"),
                }
                let histogram = summary.histogram;
                println!(
                    "- bands: 90-100: {}, 80-89: {}, 70-79: {}, 60-69: {}, 0-59: {}",
                    histogram.band_90_100,
                    histogram.band_80_89,
                    histogram.band_70_79,
                    histogram.band_60_69,
                    histogram.band_0_59
                );
            }
        }
        Commands::Report { course, term, out } => {
            let rows = db::fetch_class_rows(&pool, &course, &term).await?;
            let report = report::build_class_report(&course, &term, &rows);
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}

fn print_totals(totals: &models::CreditTotals) {
    println!(
        "- credits: major {} / minor {} / total {}",
        totals.major_credits, totals.minor_credits, totals.total_credits
    );
}
