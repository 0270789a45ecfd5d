use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn is_zero(value: &u64) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    /// Milliseconds since the epoch
    pub review_date: i64,
    /// Position in the interval sequence, 0..=6
    pub level: u8,
}

/// A vocabulary item the learner got wrong, kept for spaced review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorWord {
    pub id: u64,
    pub word: Vec<String>,
    #[serde(default)]
    pub pos: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub example: String,
    #[serde(default)]
    pub extra: String,
    pub category: String,
    #[serde(default)]
    pub added_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub review_records: Vec<ReviewRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_review_date: Option<i64>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_special_attention: bool,
}

impl ErrorWord {
    pub fn new(id: u64, category: &str, word: Vec<String>) -> Self {
        ErrorWord {
            id,
            word,
            pos: String::new(),
            meaning: String::new(),
            example: String::new(),
            extra: String::new(),
            category: category.to_string(),
            added_at: 0,
            review_records: Vec::new(),
            next_review_date: None,
            is_special_attention: false,
        }
    }

    pub fn matches(&self, id: u64, category: &str) -> bool {
        self.id == id && self.category == category
    }

    pub fn display_word(&self) -> String {
        self.word.join(" / ")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskItem {
    pub id: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<NaiveDate>,
    /// Accumulated seconds
    #[serde(default, skip_serializing_if = "is_zero")]
    pub time_spent: u64,
    /// Milliseconds since the epoch, set while the timer runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_start_time: Option<i64>,
}

impl TaskItem {
    pub fn pending(id: String) -> Self {
        TaskItem {
            id,
            status: TaskStatus::Pending,
            completed_at: None,
            time_spent: 0,
            timer_start_time: None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabTask {
    #[serde(flatten)]
    pub item: TaskItem,
    pub chapter: u32,
}

impl VocabTask {
    pub fn new(chapter: u32) -> Self {
        VocabTask {
            item: TaskItem::pending(format!("vocab-ch{}", chapter)),
            chapter,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListeningTask {
    #[serde(flatten)]
    pub item: TaskItem,
    pub book: u32,
    pub test: u32,
    pub section: u32,
}

impl ListeningTask {
    pub fn new(book: u32, test: u32, section: u32) -> Self {
        ListeningTask {
            item: TaskItem::pending(format!("listening-c{}t{}s{}", book, test, section)),
            book,
            test,
            section,
        }
    }

    pub fn label(&self) -> String {
        format!("C{}T{}S{}", self.book, self.test, self.section)
    }
}

/// Both task lists, searchable by task id.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskLists {
    pub vocab: Vec<VocabTask>,
    pub listening: Vec<ListeningTask>,
}

impl TaskLists {
    pub fn items(&self) -> impl Iterator<Item = &TaskItem> {
        self.vocab
            .iter()
            .map(|t| &t.item)
            .chain(self.listening.iter().map(|t| &t.item))
    }

    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut TaskItem> {
        self.vocab
            .iter_mut()
            .map(|t| &mut t.item)
            .chain(self.listening.iter_mut().map(|t| &mut t.item))
    }

    pub fn item(&self, id: &str) -> Option<&TaskItem> {
        self.items().find(|t| t.id == id)
    }

    pub fn item_mut(&mut self, id: &str) -> Option<&mut TaskItem> {
        self.items_mut().find(|t| t.id == id)
    }
}

/// Per-day summary derived from completed tasks.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyLog {
    pub date: NaiveDate,
    pub vocab: Vec<String>,
    pub listening: Vec<String>,
    pub summary: String,
    /// Seconds
    pub total_time: u64,
}

impl DailyLog {
    pub fn task_count(&self) -> usize {
        self.vocab.len() + self.listening.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityDay {
    pub date: NaiveDate,
    pub level: u8,
    pub count: usize,
    pub time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub percentage: u32,
}

impl Progress {
    pub fn of(completed: usize, total: usize) -> Self {
        let percentage = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };
        Progress { completed, total, percentage }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverallProgress {
    pub vocab: Progress,
    pub listening: Progress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewStats {
    pub overdue: usize,
    pub today: usize,
    pub tomorrow: usize,
    pub this_week: usize,
    pub later: usize,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorBookStats {
    pub total: usize,
    pub by_category: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOutcome {
    pub success: bool,
    pub message: String,
    pub count: usize,
}

impl ImportOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        ImportOutcome {
            success: false,
            message: message.into(),
            count: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TodayGoals {
    pub vocab: Vec<u32>,
    pub listening: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TodayCompleted {
    pub vocab: usize,
    pub listening: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PopupMode {
    None,
    ConfirmDelete,
    ConfirmReset,
    Help,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_json_shape() {
        let mut task = VocabTask::new(3);
        task.item.status = TaskStatus::Completed;
        task.item.completed_at = NaiveDate::from_ymd_opt(2023, 10, 27);
        task.item.time_spent = 90;

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["id"], "vocab-ch3");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["completedAt"], "2023-10-27");
        assert_eq!(json["timeSpent"], 90);
        assert_eq!(json["chapter"], 3);
        assert!(json.get("timerStartTime").is_none());
    }

    #[test]
    fn test_error_word_reads_minimal_entry() {
        let word: ErrorWord =
            serde_json::from_str(r#"{"id":7,"word":["abate"],"category":"A","addedAt":5}"#)
                .unwrap();
        assert!(word.matches(7, "A"));
        assert!(word.review_records.is_empty());
        assert_eq!(word.next_review_date, None);
        assert!(!word.is_special_attention);
    }

    #[test]
    fn test_progress_rounds() {
        assert_eq!(Progress::of(1, 144).percentage, 1);
        assert_eq!(Progress::of(11, 22).percentage, 50);
        assert_eq!(Progress::of(0, 0).percentage, 0);
    }
}
