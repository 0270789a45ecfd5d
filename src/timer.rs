//! Single active timer across both task lists.
//!
//! `Timer` owns the id of the one task accumulating time. Every change of the
//! active task goes through `switch`, which folds the outgoing task and stamps
//! the incoming one under a single mutable borrow of the task lists.

use std::time::{Duration, Instant};

use crate::models::{TaskItem, TaskLists};

pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

fn elapsed_secs(start_ms: i64, now_ms: i64) -> u64 {
    ((now_ms - start_ms).max(0) / 1000) as u64
}

fn fold(task: &mut TaskItem, now_ms: i64) {
    if let Some(start) = task.timer_start_time.take() {
        task.time_spent += elapsed_secs(start, now_ms);
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Timer {
    active: Option<String>,
}

impl Timer {
    /// Rebuilds the timer from persisted start stamps.
    ///
    /// The most recently started task stays active; any other running task is
    /// folded so at most one stamp survives. Returns whether tasks were changed.
    pub fn restore(tasks: &mut TaskLists, now_ms: i64) -> (Self, bool) {
        let latest = tasks
            .items()
            .filter_map(|t| t.timer_start_time.map(|start| (start, t.id.clone())))
            .max_by_key(|(start, _)| *start)
            .map(|(_, id)| id);

        let mut repaired = false;
        for task in tasks.items_mut() {
            if task.timer_start_time.is_some() && Some(&task.id) != latest.as_ref() {
                log::warn!("folding stray timer on {}", task.id);
                fold(task, now_ms);
                repaired = true;
            }
        }

        (Timer { active: latest }, repaired)
    }

    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.active.as_deref() == Some(id)
    }

    /// Makes `next` the active task (or none). Unknown ids leave everything untouched.
    pub fn switch(&mut self, tasks: &mut TaskLists, next: Option<&str>, now_ms: i64) -> bool {
        if let Some(id) = next {
            if tasks.item(id).is_none() {
                return false;
            }
        }
        if self.active.as_deref() == next {
            return true;
        }

        if let Some(current) = self.active.take() {
            if let Some(task) = tasks.item_mut(&current) {
                fold(task, now_ms);
                log::debug!("paused {} at {}s", task.id, task.time_spent);
            }
        }

        if let Some(id) = next {
            if let Some(task) = tasks.item_mut(id) {
                task.timer_start_time.get_or_insert(now_ms);
                log::debug!("started {}", task.id);
            }
            self.active = Some(id.to_string());
        }
        true
    }

    pub fn start(&mut self, tasks: &mut TaskLists, id: &str, now_ms: i64) -> bool {
        self.switch(tasks, Some(id), now_ms)
    }

    pub fn pause(&mut self, tasks: &mut TaskLists, now_ms: i64) {
        self.switch(tasks, None, now_ms);
    }

    /// Pauses only if `id` is the running task.
    pub fn stop(&mut self, tasks: &mut TaskLists, id: &str, now_ms: i64) {
        if self.is_active(id) {
            self.pause(tasks, now_ms);
        }
    }

    pub fn toggle(&mut self, tasks: &mut TaskLists, id: &str, now_ms: i64) -> bool {
        if self.is_active(id) {
            self.pause(tasks, now_ms);
            true
        } else {
            self.start(tasks, id, now_ms)
        }
    }

    /// Accumulated seconds for `id`, including the live span if it is running.
    pub fn elapsed(&self, tasks: &TaskLists, id: &str, now_ms: i64) -> u64 {
        let Some(task) = tasks.item(id) else {
            return 0;
        };
        let live = match task.timer_start_time {
            Some(start) if self.is_active(id) => elapsed_secs(start, now_ms),
            _ => 0,
        };
        task.time_spent + live
    }
}

/// Redraw cadence for views showing a live elapsed value. Holds no task state.
#[derive(Debug)]
pub struct Ticker {
    interval: Duration,
    last: Instant,
}

impl Ticker {
    pub fn new(interval: Duration) -> Self {
        Ticker {
            interval,
            last: Instant::now(),
        }
    }

    /// Time left until the next tick.
    pub fn timeout(&self) -> Duration {
        self.interval.saturating_sub(self.last.elapsed())
    }

    /// True once per interval.
    pub fn tick(&mut self) -> bool {
        if self.last.elapsed() >= self.interval {
            self.last = Instant::now();
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ListeningTask, VocabTask};

    fn lists() -> TaskLists {
        TaskLists {
            vocab: (1..=3).map(VocabTask::new).collect(),
            listening: vec![ListeningTask::new(12, 1, 1)],
        }
    }

    #[test]
    fn test_start_then_pause_accumulates() {
        let mut tasks = lists();
        let mut timer = Timer::default();

        assert!(timer.start(&mut tasks, "vocab-ch1", 10_000));
        assert_eq!(tasks.item("vocab-ch1").unwrap().timer_start_time, Some(10_000));
        assert_eq!(timer.elapsed(&tasks, "vocab-ch1", 15_500), 5);

        timer.pause(&mut tasks, 25_999);
        let task = tasks.item("vocab-ch1").unwrap();
        assert_eq!(task.time_spent, 15);
        assert_eq!(task.timer_start_time, None);
        assert_eq!(timer.active(), None);
        assert_eq!(timer.elapsed(&tasks, "vocab-ch1", 90_000), 15);
    }

    #[test]
    fn test_switching_folds_previous_task() {
        let mut tasks = lists();
        let mut timer = Timer::default();

        timer.start(&mut tasks, "vocab-ch1", 0);
        timer.start(&mut tasks, "listening-c12t1s1", 60_000);

        let b = tasks.item("vocab-ch1").unwrap();
        assert_eq!(b.timer_start_time, None);
        assert_eq!(b.time_spent, 60);
        assert_eq!(timer.active(), Some("listening-c12t1s1"));
        assert_eq!(tasks.items().filter(|t| t.timer_start_time.is_some()).count(), 1);
    }

    #[test]
    fn test_restarting_active_task_keeps_stamp() {
        let mut tasks = lists();
        let mut timer = Timer::default();
        timer.start(&mut tasks, "vocab-ch2", 1_000);
        assert!(timer.start(&mut tasks, "vocab-ch2", 9_000));
        assert_eq!(tasks.item("vocab-ch2").unwrap().timer_start_time, Some(1_000));
    }

    #[test]
    fn test_unknown_task_is_rejected() {
        let mut tasks = lists();
        let mut timer = Timer::default();
        timer.start(&mut tasks, "vocab-ch1", 0);
        assert!(!timer.start(&mut tasks, "vocab-ch99", 5_000));
        assert_eq!(timer.active(), Some("vocab-ch1"));
        assert_eq!(tasks.item("vocab-ch1").unwrap().timer_start_time, Some(0));
    }

    #[test]
    fn test_toggle_and_stop() {
        let mut tasks = lists();
        let mut timer = Timer::default();
        timer.toggle(&mut tasks, "vocab-ch3", 0);
        assert!(timer.is_active("vocab-ch3"));

        timer.stop(&mut tasks, "vocab-ch1", 3_000);
        assert!(timer.is_active("vocab-ch3"));

        timer.toggle(&mut tasks, "vocab-ch3", 3_000);
        assert_eq!(timer.active(), None);
        assert_eq!(tasks.item("vocab-ch3").unwrap().time_spent, 3);
    }

    #[test]
    fn test_restore_keeps_latest_and_folds_others() {
        let mut tasks = lists();
        tasks.vocab[0].item.timer_start_time = Some(0);
        tasks.vocab[1].item.timer_start_time = Some(20_000);

        let (timer, repaired) = Timer::restore(&mut tasks, 30_000);
        assert!(repaired);
        assert_eq!(timer.active(), Some("vocab-ch2"));
        assert_eq!(tasks.vocab[0].item.timer_start_time, None);
        assert_eq!(tasks.vocab[0].item.time_spent, 30);
        assert_eq!(timer.elapsed(&tasks, "vocab-ch2", 30_000), 10);
    }

    #[test]
    fn test_ticker_fires_once_per_interval() {
        let mut ticker = Ticker::new(Duration::from_millis(0));
        assert!(ticker.tick());
        let mut slow = Ticker::new(Duration::from_secs(3600));
        assert!(!slow.tick());
        assert!(slow.timeout() <= Duration::from_secs(3600));
    }
}
