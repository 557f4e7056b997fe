//! Traintrack CLI - learning progress engine.

use std::sync::Arc;
use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use traintrack_analytics::ScreentimeService;
use traintrack_core::{
    Course, CourseId, LeaderboardScope, Module, ModuleId, ModuleKind, Role, Team, User,
};
use traintrack_leaderboard::LeaderboardRanker;
use traintrack_progress::{DashboardService, ProgressTracker, QuizOutcome, Sequencer};
use traintrack_storage::{JsonStorage, Storage};

#[derive(Parser)]
#[command(name = "traintrack")]
#[command(about = "Learning progress engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Seed sample users, teams, courses and modules
    Seed,
    /// Record learning activity on a module
    Record {
        /// User email or id
        user: String,
        /// Module id
        module: String,
        /// Minutes spent since the last event
        minutes: i64,
        /// Mark the module completed
        #[arg(long)]
        complete: bool,
    },
    /// Record a graded quiz attempt
    Quiz {
        /// User email or id
        user: String,
        /// Quiz module id
        module: String,
        /// Correct answers
        correct: u32,
        /// Total questions
        total: u32,
        /// Points awarded
        #[arg(long, default_value = "0")]
        points: u32,
        /// Maximum points available
        #[arg(long, default_value = "0")]
        max_points: u32,
        /// Whether the attempt passed
        #[arg(long)]
        passed: bool,
    },
    /// List a course's modules with their gate state
    Modules {
        /// User email or id
        user: String,
        /// Course id
        course: String,
    },
    /// Show a user's aggregate progress in a course
    Progress {
        /// User email or id
        user: String,
        /// Course id
        course: String,
    },
    /// Show a user's dashboard
    Dashboard {
        /// User email or id
        user: String,
    },
    /// Show a leaderboard
    Leaderboard {
        /// Board: global, course or team
        #[arg(long, default_value = "global")]
        scope: String,
        /// Course filter
        #[arg(long)]
        course: Option<String>,
        /// Recalculate before reading
        #[arg(long)]
        refresh: bool,
        /// Show only the top N entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show screentime for a module, a course, or everything
    Screentime {
        /// User email or id
        user: String,
        /// Module id
        #[arg(long)]
        module: Option<String>,
        /// Course id
        #[arg(long)]
        course: Option<String>,
    },
    /// Show activity analytics over a trailing window
    Analytics {
        /// User email or id
        user: String,
        /// Window length in days
        #[arg(long, default_value = "30")]
        days: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::WARN)
        .init();

    let cli = Cli::parse();

    let storage = Arc::new(JsonStorage::new(".traintrack").await?);

    match cli.command {
        Commands::Seed => seed(&storage).await?,
        Commands::Record {
            user,
            module,
            minutes,
            complete,
        } => {
            let user = resolve_user(&storage, &user).await?;
            let module_id: ModuleId = module.parse().map_err(|_| anyhow::anyhow!("Invalid module ID"))?;

            let tracker = ProgressTracker::new(storage.clone());
            let snapshot = tracker
                .record_module_activity(user.id, module_id, minutes, complete)
                .await?;

            println!(
                "Course {}: {}% | {}/{} modules | {} min",
                snapshot.course_id,
                snapshot.completion_percentage,
                snapshot.modules_completed,
                snapshot.total_modules,
                snapshot.time_spent_minutes,
            );
        }
        Commands::Quiz {
            user,
            module,
            correct,
            total,
            points,
            max_points,
            passed,
        } => {
            let user = resolve_user(&storage, &user).await?;
            let module_id: ModuleId = module.parse().map_err(|_| anyhow::anyhow!("Invalid module ID"))?;

            let tracker = ProgressTracker::new(storage.clone());
            let snapshot = tracker
                .record_quiz_result(
                    user.id,
                    module_id,
                    QuizOutcome {
                        total_questions: total,
                        correct_answers: correct,
                        points_earned: points,
                        max_points,
                        passed,
                    },
                )
                .await?;

            println!(
                "Recorded {}/{} | course points now {}",
                correct, total, snapshot.total_points_earned,
            );
        }
        Commands::Modules { user, course } => {
            let user = resolve_user(&storage, &user).await?;
            let course_id: CourseId = course.parse().map_err(|_| anyhow::anyhow!("Invalid course ID"))?;

            let sequencer = Sequencer::new(storage.clone());
            let modules = sequencer.list_accessible_modules(user.id, course_id).await?;

            println!("Modules ({})", modules.len());
            for access in modules {
                let gate = if access.locked { "LOCKED" } else { "OPEN" };
                println!(
                    "  {} | #{} | {} | {} | {} - {}",
                    access.module.id,
                    access.module.sequence_order,
                    gate,
                    access.status,
                    if access.module.is_mandatory { "mandatory" } else { "optional" },
                    access.module.title,
                );
            }
        }
        Commands::Progress { user, course } => {
            let user = resolve_user(&storage, &user).await?;
            let course_id: CourseId = course.parse().map_err(|_| anyhow::anyhow!("Invalid course ID"))?;

            let tracker = ProgressTracker::new(storage.clone());
            let progress = tracker.course_progress(user.id, course_id).await?;

            println!("Course: {}", progress.course_id);
            println!("  Status: {}", progress.status);
            println!("  Completion: {}%", progress.completion_percentage);
            println!(
                "  Modules: {}/{}",
                progress.modules_completed, progress.total_modules
            );
            println!("  Time: {} min", progress.time_spent_minutes);
            println!("  Points: {}", progress.total_points_earned);
        }
        Commands::Dashboard { user } => {
            let user = resolve_user(&storage, &user).await?;

            let dashboard = DashboardService::new(storage.clone())
                .dashboard(user.id)
                .await?;

            println!("Dashboard for {}", user.name);
            println!("  Active hours: {}", dashboard.total_active_hours);
            println!("  Points: {}", dashboard.total_points);
            match dashboard.rank {
                Some(rank) => println!("  Global rank: {}", rank),
                None => println!("  Global rank: unranked"),
            }
            println!(
                "  Courses: {} total | {} active | {} not started | {} completed",
                dashboard.course_stats.total_courses,
                dashboard.course_stats.active_courses,
                dashboard.course_stats.not_started_courses,
                dashboard.course_stats.completed_courses,
            );
            for course in dashboard.courses {
                println!(
                    "  {} | {} | {}% - {}",
                    course.course_id, course.status, course.completion_percentage, course.title,
                );
            }
        }
        Commands::Leaderboard {
            scope,
            course,
            refresh,
            limit,
        } => {
            let scope = parse_scope(&scope)
                .ok_or_else(|| anyhow::anyhow!("Unknown scope (global, course or team)"))?;
            let course_id = match course {
                Some(course) => Some(
                    course
                        .parse::<CourseId>()
                        .map_err(|_| anyhow::anyhow!("Invalid course ID"))?,
                ),
                None => None,
            };

            if refresh {
                let ranker = LeaderboardRanker::new(storage.clone());
                ranker.recalculate(scope, course_id).await?;
            }

            match scope {
                LeaderboardScope::Team => {
                    let standings = storage.list_team_standings(course_id).await?;
                    let shown = limit.unwrap_or(standings.len());
                    println!("Team leaderboard ({})", standings.len());
                    for standing in standings.into_iter().take(shown) {
                        println!(
                            "  #{} | {} | {:.1} | {:.0}% avg | {} members",
                            standing.rank,
                            standing.team_id,
                            standing.weighted_score,
                            standing.average_completion_rate,
                            standing.total_members,
                        );
                    }
                }
                _ => {
                    let standings = storage.list_user_standings(course_id).await?;
                    let shown = limit.unwrap_or(standings.len());
                    println!("Leaderboard ({})", standings.len());
                    for standing in standings.into_iter().take(shown) {
                        println!(
                            "  #{} | {} | {:.1} | {} pts | {} modules",
                            standing.rank,
                            standing.user_id,
                            standing.weighted_score,
                            standing.total_points,
                            standing.modules_completed,
                        );
                    }
                }
            }
        }
        Commands::Screentime {
            user,
            module,
            course,
        } => {
            let user = resolve_user(&storage, &user).await?;
            let service = ScreentimeService::new(storage.clone());

            if let Some(module) = module {
                let module_id: ModuleId = module.parse().map_err(|_| anyhow::anyhow!("Invalid module ID"))?;
                let screentime = service.module_screentime(user.id, module_id).await?;
                println!(
                    "{}: {} of {} estimated ({}% efficiency)",
                    screentime.module_title,
                    screentime.time_spent_formatted,
                    screentime.estimated_duration_formatted,
                    screentime.efficiency_percentage,
                );
            } else if let Some(course) = course {
                let course_id: CourseId = course.parse().map_err(|_| anyhow::anyhow!("Invalid course ID"))?;
                let screentime = service.course_screentime(user.id, course_id).await?;
                println!(
                    "{}: {} | {}/{} modules touched",
                    screentime.course_title,
                    screentime.total_time_spent_formatted,
                    screentime.modules_with_activity,
                    screentime.total_modules,
                );
                for entry in screentime.module_breakdown {
                    println!(
                        "  {} | {} - {}",
                        entry.module_id, entry.time_spent_formatted, entry.module_title,
                    );
                }
            } else {
                let total = service.total_screentime(user.id).await?;
                println!(
                    "Total: {} across {} courses",
                    total.total_formatted, total.courses_count,
                );
                for entry in total.courses {
                    println!(
                        "  {} | {} - {}",
                        entry.course_id, entry.time_spent_minutes, entry.course_title,
                    );
                }
            }
        }
        Commands::Analytics { user, days } => {
            let user = resolve_user(&storage, &user).await?;
            let analytics = ScreentimeService::new(storage.clone())
                .activity(user.id, days)
                .await?;

            println!(
                "Last {} days: {} over {} active days",
                analytics.period_days, analytics.total_formatted, analytics.days_active,
            );
            for (date, minutes) in analytics.daily_breakdown {
                println!("  {} | {} min", date, minutes);
            }
        }
    }

    Ok(())
}

/// Resolve a user argument (email or id) to a stored user.
///
/// Identity is resolved here, at the edge; the engine only ever sees an
/// already-resolved id.
async fn resolve_user(storage: &Arc<JsonStorage>, arg: &str) -> Result<User> {
    if let Ok(id) = arg.parse() {
        if let Some(user) = storage.load_user(id).await? {
            return Ok(user);
        }
    }
    storage
        .list_users()
        .await?
        .into_iter()
        .find(|u| u.email == arg)
        .ok_or_else(|| anyhow::anyhow!("User not found: {}", arg))
}

fn parse_scope(s: &str) -> Option<LeaderboardScope> {
    match s.to_lowercase().as_str() {
        "global" => Some(LeaderboardScope::Global),
        "course" => Some(LeaderboardScope::Course),
        "team" => Some(LeaderboardScope::Team),
        _ => None,
    }
}

/// Seed a small, ready-to-demo data set.
async fn seed(storage: &Arc<JsonStorage>) -> Result<()> {
    let trainer = User::new("trainer@example.com", "Taylor Trainer", Role::Trainer);
    storage.save_user(&trainer).await?;

    let mut trainees = Vec::new();
    for (email, name) in [
        ("ada@example.com", "Ada Lovelace"),
        ("grace@example.com", "Grace Hopper"),
        ("alan@example.com", "Alan Turing"),
    ] {
        let user = User::new(email, name, Role::Trainee);
        storage.save_user(&user).await?;
        trainees.push(user);
    }

    let team = Team::new("Pioneers", trainees.iter().map(|u| u.id).collect());
    storage.save_team(&team).await?;

    let mut course = Course::new("Rust Fundamentals", "Ownership, borrowing and beyond");
    course.is_mandatory = true;
    course.estimated_duration_hours = Some(4);
    storage.save_course(&course).await?;

    let module_specs = [
        ("Getting Started", ModuleKind::Video, true, 45),
        ("The Borrow Checker", ModuleKind::Video, true, 60),
        ("Further Reading", ModuleKind::Pdf, false, 30),
        ("Final Quiz", ModuleKind::Quiz, true, 20),
    ];
    for (order, (title, kind, mandatory, estimate)) in module_specs.into_iter().enumerate() {
        let mut module = Module::new(course.id, title, kind, order as u32 + 1);
        module.is_mandatory = mandatory;
        module.estimated_duration_minutes = estimate;
        storage.save_module(&module).await?;
        println!("  module {} - {}", module.id, module.title);
    }

    println!("Seeded course {} - {}", course.id, course.title);
    for user in &trainees {
        println!("  trainee {} - {}", user.id, user.email);
    }
    println!("  team {} - {}", team.id, team.name);

    Ok(())
}
