mod activity;
mod cli;
mod clock;
mod database;
mod error;
mod error_book;
mod models;
mod review_format;
mod study_plan;
mod timer;
mod ui;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use clock::{Clock, SystemClock};
use database::Database;
use error_book::ErrorBook;
use models::{ErrorWord, ImportOutcome};
use review_format::format_review_date;
use study_plan::{format_time, StudyPlan};
use ui::run_tui;

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{}', expected YYYY-MM-DD", value))
}

fn print_outcome(outcome: &ImportOutcome) {
    if outcome.success {
        println!("{}", outcome.message);
    } else {
        println!("Error: {}", outcome.message);
    }
}

fn print_word(word: &ErrorWord, clock: &SystemClock) {
    let now = clock.now();
    let due = error_book::effective_due(word);
    let star = if word.is_special_attention { "*" } else { " " };
    println!(
        "{} {:>5} | {:<10} | {:<24} | {:<12} | reviews {}/{} | {}",
        star,
        word.id,
        word.category,
        word.display_word(),
        word.meaning,
        word.review_records.len(),
        error_book::REVIEW_INTERVALS.len(),
        format_review_date(due, &now)
    );
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = cli.db.clone().unwrap_or_else(Database::default_path);
    let db = Database::open(&db_path)?;
    let clock = SystemClock;
    let book = ErrorBook::new(&db, clock);

    match cli.command {
        Some(Commands::Add { id, category, word, pos, meaning, example, extra }) => {
            let entry = ErrorWord {
                pos,
                meaning,
                example,
                extra,
                ..ErrorWord::new(id, &category, word)
            };
            if book.add(entry)? {
                println!("Added {} ({}) to the error book", id, category);
            } else {
                println!("{} ({}) is already in the error book", id, category);
            }
        }
        Some(Commands::Remove { id, category }) => {
            if book.contains(id, &category)? {
                book.remove(id, &category)?;
                println!("Removed {} ({})", id, category);
            } else {
                println!("{} ({}) not found", id, category);
            }
        }
        Some(Commands::List) => {
            let words = book.words()?;
            println!("Error book ({} words):", words.len());
            println!("------");
            for word in &words {
                print_word(word, &clock);
            }
        }
        Some(Commands::Due) => {
            let due = book.list_due(clock.now_ms())?;
            if due.is_empty() {
                println!("Nothing to review right now");
            } else {
                println!("Due for review ({}):", due.len());
                println!("------");
                for word in &due {
                    print_word(word, &clock);
                }
            }
        }
        Some(Commands::Review { id, category }) => {
            if book.mark_reviewed(id, &category)? {
                let next = book
                    .get(id, &category)?
                    .map(|w| error_book::effective_due(&w))
                    .unwrap_or(0);
                println!("Reviewed. Next review: {}", format_review_date(next, &clock.now()));
            } else {
                println!("{} ({}) not found or already completed every review", id, category);
            }
        }
        Some(Commands::Star { id, category }) => {
            if book.toggle_special_attention(id, &category)? {
                let starred = book.is_special_attention(id, &category)?;
                println!(
                    "{} ({}) {}",
                    id,
                    category,
                    if starred { "marked for special attention" } else { "unmarked" }
                );
            } else {
                println!("{} ({}) not found", id, category);
            }
        }
        Some(Commands::Stats) => {
            let stats = book.stats()?;
            let review = book.review_stats()?;
            println!("Error book: {} words", stats.total);
            for (category, count) in &stats.by_category {
                println!("  {}: {}", category, count);
            }
            println!("Reviews:");
            println!("  overdue:   {}", review.overdue);
            println!("  today:     {}", review.today);
            println!("  tomorrow:  {}", review.tomorrow);
            println!("  this week: {}", review.this_week);
            println!("  later:     {}", review.later);
            println!("  completed: {}", review.completed);
        }
        Some(Commands::Search { query }) => {
            let hits = book.search(&query)?;
            if hits.is_empty() {
                println!("No matches found for '{}'", query);
            }
            for word in &hits {
                print_word(word, &clock);
            }
        }
        Some(Commands::Export { output }) => {
            let json = book.export_json()?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Error book exported to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Some(Commands::Import { file }) => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            print_outcome(&book.import_json(&json));
        }
        Some(Commands::Clear) => {
            book.clear()?;
            println!("Error book cleared");
        }
        Some(Commands::StoreList) => {
            println!("Store: {}", db_path.display());
            println!("------");
            for entry in db.list_entries()? {
                println!("{} | {} bytes | Updated: {}", entry.key, entry.size, entry.updated_at);
            }
        }
        Some(Commands::Tui) | None => {
            let plan = StudyPlan::load(&db, clock)?;
            run_tui(book, plan)?;
        }
        Some(Commands::Completions { shell }) => {
            use clap_complete::{generate, Shell};
            let shell = shell.to_lowercase();
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "elvish" => Shell::Elvish,
                "powershell" => Shell::PowerShell,
                _ => {
                    println!("Unsupported shell: {}", shell);
                    return Ok(());
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "studybook", &mut std::io::stdout());
        }
        Some(plan_command) => {
            let mut plan = StudyPlan::load(&db, clock)?;
            run_plan_command(&mut plan, plan_command)?;
        }
    }

    Ok(())
}

fn run_plan_command(plan: &mut StudyPlan<&Database, SystemClock>, command: Commands) -> Result<()> {
    match command {
        Commands::Vocab { chapter } => {
            if plan.toggle_vocab_chapter(chapter)? {
                if let Some(task) = plan.vocab_tasks().iter().find(|t| t.chapter == chapter) {
                    println!("Chapter {} is now {:?}", chapter, task.item.status);
                }
            } else {
                println!("Chapter {} is not part of the plan", chapter);
            }
        }
        Commands::Listening { book, test, section } => {
            if plan.toggle_listening_section(book, test, section)? {
                let id = format!("listening-c{}t{}s{}", book, test, section);
                if let Some(task) = plan.tasks().item(&id) {
                    println!("C{}T{}S{} is now {:?}", book, test, section, task.status);
                }
            } else {
                println!("C{}T{}S{} is not part of the plan", book, test, section);
            }
        }
        Commands::Start { task_id } => {
            if plan.start_timer(&task_id)? {
                println!("Timer running on {}", task_id);
            } else {
                println!("Task '{}' not found", task_id);
            }
        }
        Commands::Stop { task_id } => {
            if plan.stop_timer(&task_id)? {
                println!("Stopped {} ({})", task_id, format_time(plan.current_elapsed(&task_id)));
            } else {
                println!("No timer is running on {}", task_id);
            }
        }
        Commands::Timer { task_id } => {
            if !plan.toggle_timer(&task_id)? {
                println!("Task '{}' not found", task_id);
            } else if plan.active_timer() == Some(task_id.as_str()) {
                println!("Timer running on {}", task_id);
            } else {
                println!(
                    "Timer paused on {} ({})",
                    task_id,
                    format_time(plan.current_elapsed(&task_id))
                );
            }
        }
        Commands::Pause => match plan.active_timer().map(str::to_string) {
            Some(id) => {
                plan.pause_timer()?;
                println!("Paused {} ({})", id, format_time(plan.current_elapsed(&id)));
            }
            None => println!("No timer is running"),
        },
        Commands::Elapsed { task_id } => {
            if plan.tasks().item(&task_id).is_none() {
                println!("Task '{}' not found", task_id);
            } else {
                let running = if plan.active_timer() == Some(task_id.as_str()) {
                    " (running)"
                } else {
                    ""
                };
                println!("{}: {}{}", task_id, format_time(plan.current_elapsed(&task_id)), running);
            }
        }
        Commands::Progress => {
            let progress = plan.overall_progress();
            println!("Day {} (started {})", plan.current_day(), plan.start_date());
            println!(
                "Vocab:     {}/{} ({}%)",
                progress.vocab.completed, progress.vocab.total, progress.vocab.percentage
            );
            println!(
                "Listening: {}/{} ({}%)",
                progress.listening.completed, progress.listening.total, progress.listening.percentage
            );
            for (book, tests) in plan.listening_by_book() {
                let cells: Vec<String> = tests
                    .values()
                    .map(|sections| {
                        let done = sections.iter().filter(|t| t.item.is_completed()).count();
                        format!("{}/{}", done, sections.len())
                    })
                    .collect();
                println!("  C{:<3} {}", book, cells.join("  "));
            }
        }
        Commands::Today => {
            let goals = plan.today_goals();
            let done = plan.today_completed();
            let chapters: Vec<String> = goals.vocab.iter().map(|c| format!("Ch.{}", c)).collect();
            println!("Day {}", plan.current_day());
            println!("Vocab goal: {}", chapters.join(", "));
            println!("Listening goal: {}", goals.listening.join(", "));
            println!("Completed today: {} chapters, {} sections", done.vocab, done.listening);
            if let Some(id) = plan.active_timer() {
                println!("Timer running on {} ({})", id, format_time(plan.current_elapsed(id)));
            }
        }
        Commands::Logs => {
            let logs = plan.daily_logs();
            if logs.is_empty() {
                println!("No completed tasks yet");
            }
            for log in &logs {
                println!("{} | {} | {}", log.date, format_time(log.total_time), log.summary);
            }
        }
        Commands::Graph => {
            let days = plan.activity_graph_data()?;
            let grid = activity::weekly_grid(&days);
            let shades = [' ', '░', '▒', '▓', '█'];
            for (weekday, label) in ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"].iter().enumerate() {
                let row: String = grid
                    .iter()
                    .map(|week| match week[weekday] {
                        Some(level) => shades[level.min(4) as usize],
                        None => ' ',
                    })
                    .collect();
                println!("{} {}", label, row);
            }
            let active = days.iter().filter(|d| d.count > 0).count();
            println!("{} active days since {}", active, plan.activity_graph_start()?);
        }
        Commands::StartDate { date } => match date {
            Some(date) => {
                plan.set_start_date(parse_date(&date)?)?;
                println!("Start date set to {}", plan.start_date());
            }
            None => println!("{}", plan.start_date()),
        },
        Commands::GraphStart { date } => match date {
            Some(date) => {
                let date = parse_date(&date)?;
                plan.set_activity_graph_start(date)?;
                println!("Activity graph starts {}", date);
            }
            None => println!("{}", plan.activity_graph_start()?),
        },
        Commands::PlanExport { output } => {
            let path = output.unwrap_or_else(|| {
                format!("study-plan-backup-{}.json", SystemClock.today()).into()
            });
            std::fs::write(&path, plan.export_json()?)?;
            println!("Study plan exported to {}", path.display());
        }
        Commands::PlanImport { file } => {
            let json = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            print_outcome(&plan.import_json(&json));
        }
        Commands::PlanReset => {
            plan.reset_all()?;
            println!("All study plan progress reset");
        }
        _ => {}
    }
    Ok(())
}
