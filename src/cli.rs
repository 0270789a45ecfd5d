use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the study database
    #[arg(long, global = true, env = "STUDYBOOK_DB", value_name = "PATH")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a word to the error book
    Add {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(value_name = "CATEGORY")]
        category: String,
        /// One or more word forms
        #[arg(value_name = "WORD", required = true)]
        word: Vec<String>,
        #[arg(long, default_value = "")]
        pos: String,
        #[arg(short, long, default_value = "")]
        meaning: String,
        #[arg(short, long, default_value = "")]
        example: String,
        #[arg(long, default_value = "")]
        extra: String,
    },
    /// Remove a word from the error book
    Remove {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(value_name = "CATEGORY")]
        category: String,
    },
    /// List every word in the error book
    List,
    /// List words due for review
    Due,
    /// Mark a word as reviewed
    Review {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(value_name = "CATEGORY")]
        category: String,
    },
    /// Toggle special attention on a word
    Star {
        #[arg(value_name = "ID")]
        id: u64,
        #[arg(value_name = "CATEGORY")]
        category: String,
    },
    /// Show error book and review statistics
    Stats,
    /// Fuzzy search the error book
    Search {
        #[arg(value_name = "QUERY")]
        query: String,
    },
    /// Export the error book as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Import error book entries from a JSON file
    Import {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Clear the error book
    Clear,
    /// Toggle a vocabulary chapter
    Vocab {
        #[arg(value_name = "CHAPTER")]
        chapter: u32,
    },
    /// Toggle a listening section
    Listening {
        #[arg(value_name = "BOOK")]
        book: u32,
        #[arg(value_name = "TEST")]
        test: u32,
        #[arg(value_name = "SECTION")]
        section: u32,
    },
    /// Start the timer on a task, pausing whichever one is running
    Start {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },
    /// Stop the timer if it is running on this task
    Stop {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },
    /// Start or pause the timer on a task (e.g. vocab-ch3, listening-c12t1s2)
    Timer {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },
    /// Pause the running timer
    Pause,
    /// Show time spent on a task
    Elapsed {
        #[arg(value_name = "TASK_ID")]
        task_id: String,
    },
    /// Show overall progress
    Progress,
    /// Show today's goals and completions
    Today,
    /// Show the daily study log
    Logs,
    /// Show the activity graph
    Graph,
    /// Show or set the plan start date (YYYY-MM-DD)
    StartDate {
        #[arg(value_name = "DATE")]
        date: Option<String>,
    },
    /// Show or set the activity graph start date (YYYY-MM-DD)
    GraphStart {
        #[arg(value_name = "DATE")]
        date: Option<String>,
    },
    /// Export the study plan as JSON
    PlanExport {
        /// Write to a file instead of the default backup name
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },
    /// Replace the study plan with a JSON backup
    PlanImport {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Reset all study plan progress (WARNING: clears completion and time)
    PlanReset,
    /// List stored collections
    StoreList,
    /// Launch TUI interface
    Tui,
    /// Generate shell completions
    Completions {
        #[arg(value_name = "SHELL")]
        shell: String,
    },
}
