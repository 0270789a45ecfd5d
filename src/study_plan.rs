use anyhow::Result;
use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use crate::activity;
use crate::clock::Clock;
use crate::database::{load_json, save_json, KvStore};
use crate::error::ImportError;
use crate::models::{
    ActivityDay, DailyLog, ImportOutcome, ListeningTask, OverallProgress, Progress, TaskItem,
    TaskLists, TaskStatus, TodayCompleted, TodayGoals, VocabTask,
};
use crate::timer::Timer;

pub const START_DATE_KEY: &str = "study-plan-start-date";
pub const VOCAB_TASKS_KEY: &str = "study-plan-vocab-tasks";
pub const LISTENING_TASKS_KEY: &str = "study-plan-listening-tasks";
pub const GRAPH_START_KEY: &str = "activity-graph-start-date";

pub const VOCAB_TOTAL_CHAPTERS: u32 = 22;
pub const LISTENING_BOOKS: std::ops::RangeInclusive<u32> = 12..=20;
pub const TESTS_PER_BOOK: u32 = 4;
pub const SECTIONS_PER_TEST: u32 = 4;
pub const LISTENING_TOTAL_SECTIONS: usize = 9 * 4 * 4;

pub const VOCAB_DAILY_GOAL: u32 = 2;
pub const LISTENING_DAILY_GOAL: usize = 16;

const EXPORT_VERSION: &str = "1.0";

/// Whole-plan backup document.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanSnapshot {
    #[serde(default)]
    version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    export_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    start_date: Option<NaiveDate>,
    vocab_tasks: Option<Vec<VocabTask>>,
    listening_tasks: Option<Vec<ListeningTask>>,
}

fn listening_keys() -> impl Iterator<Item = (u32, u32, u32)> {
    LISTENING_BOOKS.flat_map(|book| {
        (1..=TESTS_PER_BOOK)
            .flat_map(move |test| (1..=SECTIONS_PER_TEST).map(move |section| (book, test, section)))
    })
}

pub fn default_vocab_tasks() -> Vec<VocabTask> {
    (1..=VOCAB_TOTAL_CHAPTERS).map(VocabTask::new).collect()
}

pub fn default_listening_tasks() -> Vec<ListeningTask> {
    listening_keys()
        .map(|(book, test, section)| ListeningTask::new(book, test, section))
        .collect()
}

/// Canonical 22-chapter list, reusing stored tasks by chapter.
fn rebuild_vocab(stored: Vec<VocabTask>) -> Vec<VocabTask> {
    let mut by_chapter: HashMap<u32, VocabTask> = HashMap::new();
    for task in stored {
        if (1..=VOCAB_TOTAL_CHAPTERS).contains(&task.chapter) {
            let canonical = VocabTask::new(task.chapter).item.id;
            by_chapter.entry(task.chapter).or_insert(VocabTask {
                item: TaskItem { id: canonical, ..task.item },
                ..task
            });
        } else {
            log::warn!("dropping vocab task outside the plan: {}", task.item.id);
        }
    }
    (1..=VOCAB_TOTAL_CHAPTERS)
        .map(|chapter| {
            by_chapter
                .remove(&chapter)
                .unwrap_or_else(|| VocabTask::new(chapter))
        })
        .collect()
}

/// Canonical 144-section list, reusing stored tasks by (book, test, section).
fn rebuild_listening(stored: Vec<ListeningTask>) -> Vec<ListeningTask> {
    let mut by_key: HashMap<(u32, u32, u32), ListeningTask> = HashMap::new();
    for task in stored {
        let key = (task.book, task.test, task.section);
        if LISTENING_BOOKS.contains(&key.0)
            && (1..=TESTS_PER_BOOK).contains(&key.1)
            && (1..=SECTIONS_PER_TEST).contains(&key.2)
        {
            let canonical = ListeningTask::new(key.0, key.1, key.2).item.id;
            by_key.entry(key).or_insert(ListeningTask {
                item: TaskItem { id: canonical, ..task.item },
                ..task
            });
        } else {
            log::warn!("dropping listening task outside the plan: {}", task.item.id);
        }
    }
    listening_keys()
        .map(|key| {
            by_key
                .remove(&key)
                .unwrap_or_else(|| ListeningTask::new(key.0, key.1, key.2))
        })
        .collect()
}

fn vocab_is_canonical(vocab: &[VocabTask]) -> bool {
    vocab.len() == VOCAB_TOTAL_CHAPTERS as usize
        && vocab
            .iter()
            .zip(default_vocab_tasks())
            .all(|(task, expected)| task.chapter == expected.chapter && task.item.id == expected.item.id)
}

fn listening_is_canonical(listening: &[ListeningTask]) -> bool {
    listening.len() == LISTENING_TOTAL_SECTIONS
        && listening.iter().zip(default_listening_tasks()).all(|(task, expected)| {
            (task.book, task.test, task.section) == (expected.book, expected.test, expected.section)
                && task.item.id == expected.item.id
        })
}

/// Brings both lists back to the canonical chapters and sections, in order.
/// Returns whether anything was rebuilt.
fn repair(tasks: &mut TaskLists) -> bool {
    let mut repaired = false;
    if !vocab_is_canonical(&tasks.vocab) {
        log::warn!(
            "vocab list ({} tasks) does not match the {} chapters, rebuilding",
            tasks.vocab.len(),
            VOCAB_TOTAL_CHAPTERS
        );
        tasks.vocab = rebuild_vocab(std::mem::take(&mut tasks.vocab));
        repaired = true;
    }
    if !listening_is_canonical(&tasks.listening) {
        log::warn!(
            "listening list ({} tasks) does not match the {} sections, rebuilding",
            tasks.listening.len(),
            LISTENING_TOTAL_SECTIONS
        );
        tasks.listening = rebuild_listening(std::mem::take(&mut tasks.listening));
        repaired = true;
    }
    repaired
}

/// Seconds as `HH:MM:SS`, or `MM:SS` under an hour.
pub fn format_time(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

pub struct StudyPlan<S: KvStore, C: Clock> {
    store: S,
    clock: C,
    start_date: NaiveDate,
    tasks: TaskLists,
    timer: Timer,
}

impl<S: KvStore, C: Clock> StudyPlan<S, C> {
    /// Loads the plan, repairing damaged task lists and writing back any fix.
    pub fn load(store: S, clock: C) -> Result<Self> {
        let stored_start: Option<NaiveDate> = load_json(&store, START_DATE_KEY)?;
        let start_date = stored_start.unwrap_or_else(|| clock.today());
        if stored_start.is_none() {
            save_json(&store, START_DATE_KEY, &start_date)?;
        }

        let stored_vocab: Option<Vec<VocabTask>> = load_json(&store, VOCAB_TASKS_KEY)?;
        let stored_listening: Option<Vec<ListeningTask>> = load_json(&store, LISTENING_TASKS_KEY)?;
        let mut dirty = stored_vocab.is_none() || stored_listening.is_none();

        let mut tasks = TaskLists {
            vocab: stored_vocab.unwrap_or_else(default_vocab_tasks),
            listening: stored_listening.unwrap_or_else(default_listening_tasks),
        };
        dirty |= repair(&mut tasks);

        let (timer, folded) = Timer::restore(&mut tasks, clock.now_ms());
        dirty |= folded;

        let plan = StudyPlan {
            store,
            clock,
            start_date,
            tasks,
            timer,
        };
        if dirty {
            log::info!("study plan initialized or repaired, saving");
            plan.save()?;
        }
        Ok(plan)
    }

    fn save(&self) -> Result<()> {
        save_json(&self.store, VOCAB_TASKS_KEY, &self.tasks.vocab)?;
        save_json(&self.store, LISTENING_TASKS_KEY, &self.tasks.listening)
    }

    pub fn tasks(&self) -> &TaskLists {
        &self.tasks
    }

    pub fn vocab_tasks(&self) -> &[VocabTask] {
        &self.tasks.vocab
    }

    pub fn listening_tasks(&self) -> &[ListeningTask] {
        &self.tasks.listening
    }

    pub fn active_timer(&self) -> Option<&str> {
        self.timer.active()
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn set_start_date(&mut self, date: NaiveDate) -> Result<()> {
        save_json(&self.store, START_DATE_KEY, &date)?;
        self.start_date = date;
        Ok(())
    }

    /// Stored graph start, or one year before the plan start.
    pub fn activity_graph_start(&self) -> Result<NaiveDate> {
        let stored: Option<NaiveDate> = load_json(&self.store, GRAPH_START_KEY)?;
        Ok(stored.unwrap_or_else(|| {
            self.start_date
                .checked_sub_months(Months::new(12))
                .unwrap_or(self.start_date)
        }))
    }

    pub fn set_activity_graph_start(&self, date: NaiveDate) -> Result<()> {
        save_json(&self.store, GRAPH_START_KEY, &date)
    }

    /// 1-based day number of the plan.
    pub fn current_day(&self) -> i64 {
        ((self.clock.today() - self.start_date).num_days() + 1).max(1)
    }

    pub fn today_goals(&self) -> TodayGoals {
        let done = self
            .tasks
            .vocab
            .iter()
            .filter(|t| t.item.is_completed())
            .count() as u32;
        let last = (done + VOCAB_DAILY_GOAL).min(VOCAB_TOTAL_CHAPTERS);

        TodayGoals {
            vocab: (done + 1..=last).collect(),
            listening: self
                .tasks
                .listening
                .iter()
                .filter(|t| !t.item.is_completed())
                .take(LISTENING_DAILY_GOAL)
                .map(|t| t.item.id.clone())
                .collect(),
        }
    }

    pub fn today_completed(&self) -> TodayCompleted {
        let today = Some(self.clock.today());
        TodayCompleted {
            vocab: self
                .tasks
                .vocab
                .iter()
                .filter(|t| t.item.is_completed() && t.item.completed_at == today)
                .count(),
            listening: self
                .tasks
                .listening
                .iter()
                .filter(|t| t.item.is_completed() && t.item.completed_at == today)
                .count(),
        }
    }

    pub fn overall_progress(&self) -> OverallProgress {
        let vocab = self.tasks.vocab.iter().filter(|t| t.item.is_completed()).count();
        let listening = self
            .tasks
            .listening
            .iter()
            .filter(|t| t.item.is_completed())
            .count();
        OverallProgress {
            vocab: Progress::of(vocab, VOCAB_TOTAL_CHAPTERS as usize),
            listening: Progress::of(listening, LISTENING_TOTAL_SECTIONS),
        }
    }

    /// Listening tasks as book -> test -> sections.
    pub fn listening_by_book(&self) -> BTreeMap<u32, BTreeMap<u32, Vec<&ListeningTask>>> {
        let mut grouped: BTreeMap<u32, BTreeMap<u32, Vec<&ListeningTask>>> = BTreeMap::new();
        for task in &self.tasks.listening {
            grouped
                .entry(task.book)
                .or_default()
                .entry(task.test)
                .or_default()
                .push(task);
        }
        grouped
    }

    fn toggle_task(&mut self, id: &str) -> Result<bool> {
        let now = self.clock.now_ms();
        let today = self.clock.today();
        if self.tasks.item(id).is_none() {
            return Ok(false);
        }

        self.timer.stop(&mut self.tasks, id, now);
        if let Some(task) = self.tasks.item_mut(id) {
            if task.is_completed() {
                task.status = TaskStatus::Pending;
                task.completed_at = None;
            } else {
                task.status = TaskStatus::Completed;
                task.completed_at = Some(today);
            }
            log::info!("{} is now {:?}", task.id, task.status);
        }

        self.save()?;
        Ok(true)
    }

    pub fn toggle_vocab_chapter(&mut self, chapter: u32) -> Result<bool> {
        let id = match self.tasks.vocab.iter().find(|t| t.chapter == chapter) {
            Some(task) => task.item.id.clone(),
            None => return Ok(false),
        };
        self.toggle_task(&id)
    }

    pub fn toggle_listening_section(&mut self, book: u32, test: u32, section: u32) -> Result<bool> {
        let id = match self
            .tasks
            .listening
            .iter()
            .find(|t| t.book == book && t.test == test && t.section == section)
        {
            Some(task) => task.item.id.clone(),
            None => return Ok(false),
        };
        self.toggle_task(&id)
    }

    pub fn start_timer(&mut self, id: &str) -> Result<bool> {
        let started = self.timer.start(&mut self.tasks, id, self.clock.now_ms());
        if started {
            self.save()?;
        }
        Ok(started)
    }

    pub fn pause_timer(&mut self) -> Result<()> {
        if self.timer.active().is_some() {
            self.timer.pause(&mut self.tasks, self.clock.now_ms());
            self.save()?;
        }
        Ok(())
    }

    /// Pauses the timer only when `id` is the task it is running on.
    pub fn stop_timer(&mut self, id: &str) -> Result<bool> {
        if self.timer.is_active(id) {
            self.timer.stop(&mut self.tasks, id, self.clock.now_ms());
            self.save()?;
            return Ok(true);
        }
        Ok(false)
    }

    pub fn toggle_timer(&mut self, id: &str) -> Result<bool> {
        let toggled = self.timer.toggle(&mut self.tasks, id, self.clock.now_ms());
        if toggled {
            self.save()?;
        }
        Ok(toggled)
    }

    /// Seconds spent on `id`, live while its timer runs.
    pub fn current_elapsed(&self, id: &str) -> u64 {
        self.timer.elapsed(&self.tasks, id, self.clock.now_ms())
    }

    pub fn daily_logs(&self) -> Vec<DailyLog> {
        activity::daily_logs(&self.tasks.vocab, &self.tasks.listening)
    }

    pub fn activity_graph_data(&self) -> Result<Vec<ActivityDay>> {
        Ok(activity::activity_graph(
            &self.daily_logs(),
            self.activity_graph_start()?,
            self.clock.today(),
        ))
    }

    pub fn reset_all(&mut self) -> Result<()> {
        self.timer.pause(&mut self.tasks, self.clock.now_ms());
        for task in self.tasks.items_mut() {
            task.status = TaskStatus::Pending;
            task.completed_at = None;
            task.time_spent = 0;
            task.timer_start_time = None;
        }
        log::info!("study plan reset");
        self.save()
    }

    pub fn export_json(&self) -> Result<String> {
        let snapshot = PlanSnapshot {
            version: EXPORT_VERSION.to_string(),
            export_date: Some(self.clock.now().to_rfc3339()),
            start_date: Some(self.start_date),
            vocab_tasks: Some(self.tasks.vocab.clone()),
            listening_tasks: Some(self.tasks.listening.clone()),
        };
        Ok(serde_json::to_string_pretty(&snapshot)?)
    }

    /// Replaces the plan with a backup. Nothing changes unless the whole payload parses.
    pub fn import_json(&mut self, json: &str) -> ImportOutcome {
        match self.try_import(json) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("study plan import rejected: {}", e);
                ImportOutcome::failed(e.to_string())
            }
        }
    }

    fn try_import(&mut self, json: &str) -> Result<ImportOutcome, ImportError> {
        let snapshot: PlanSnapshot = serde_json::from_str(json)?;
        let (Some(vocab), Some(listening)) = (snapshot.vocab_tasks, snapshot.listening_tasks) else {
            return Err(ImportError::MissingTaskLists);
        };

        let mut incoming = TaskLists { vocab, listening };
        repair(&mut incoming);

        let (timer, _) = Timer::restore(&mut incoming, self.clock.now_ms());

        // Lists first, then the start date; a failed write puts the old lists back.
        let previous_tasks = std::mem::replace(&mut self.tasks, incoming);
        let previous_timer = std::mem::replace(&mut self.timer, timer);
        let committed = self.save().and_then(|()| match snapshot.start_date {
            Some(date) => self.set_start_date(date),
            None => Ok(()),
        });
        if let Err(e) = committed {
            self.tasks = previous_tasks;
            self.timer = previous_timer;
            if let Err(restore) = self.save() {
                log::error!("could not restore study plan after failed import: {}", restore);
            }
            return Err(e.into());
        }

        let count = self.tasks.vocab.len() + self.tasks.listening.len();
        Ok(ImportOutcome {
            success: true,
            message: format!("{} tasks imported", count),
            count,
        })
    }
}
