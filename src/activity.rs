use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;

use crate::models::{ActivityDay, DailyLog, ListeningTask, VocabTask};
use crate::study_plan::SECTIONS_PER_TEST;

/// Intensity bucket 0..=4 for a day with `count` completed tasks and `seconds` spent.
pub fn activity_level(count: usize, seconds: u64) -> u8 {
    let hours = seconds as f64 / 3600.0;
    if count >= 20 || hours >= 3.0 {
        4
    } else if count >= 12 || hours >= 2.0 {
        3
    } else if count >= 6 || hours >= 1.0 {
        2
    } else if count >= 1 {
        1
    } else {
        0
    }
}

/// Completed tasks grouped per completion date, newest first.
pub fn daily_logs(vocab: &[VocabTask], listening: &[ListeningTask]) -> Vec<DailyLog> {
    #[derive(Default)]
    struct Day<'a> {
        vocab: Vec<&'a VocabTask>,
        listening: Vec<&'a ListeningTask>,
        total_time: u64,
    }

    let mut days: BTreeMap<NaiveDate, Day> = BTreeMap::new();
    for task in vocab {
        if let (true, Some(date)) = (task.item.is_completed(), task.item.completed_at) {
            let day = days.entry(date).or_default();
            day.vocab.push(task);
            day.total_time += task.item.time_spent;
        }
    }
    for task in listening {
        if let (true, Some(date)) = (task.item.is_completed(), task.item.completed_at) {
            let day = days.entry(date).or_default();
            day.listening.push(task);
            day.total_time += task.item.time_spent;
        }
    }

    days.into_iter()
        .rev()
        .map(|(date, day)| DailyLog {
            date,
            summary: summarize(&day.vocab, &day.listening),
            vocab: day.vocab.iter().map(|t| t.item.id.clone()).collect(),
            listening: day.listening.iter().map(|t| t.item.id.clone()).collect(),
            total_time: day.total_time,
        })
        .collect()
}

fn summarize(vocab: &[&VocabTask], listening: &[&ListeningTask]) -> String {
    let mut parts = Vec::new();

    let mut chapters: Vec<u32> = vocab.iter().map(|t| t.chapter).collect();
    chapters.sort_unstable();
    if !chapters.is_empty() {
        let chapters: Vec<String> = chapters.iter().map(|c| format!("Ch.{}", c)).collect();
        parts.push(format!("Vocab {}", chapters.join(", ")));
    }

    // (book, test) in first-seen order
    let mut groups: Vec<((u32, u32), Vec<u32>)> = Vec::new();
    for task in listening {
        let key = (task.book, task.test);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, sections)) => sections.push(task.section),
            None => groups.push((key, vec![task.section])),
        }
    }
    if !groups.is_empty() {
        let groups: Vec<String> = groups
            .into_iter()
            .map(|((book, test), mut sections)| {
                sections.sort_unstable();
                let sections = if sections.len() as u32 == SECTIONS_PER_TEST {
                    format!("S1-S{}", SECTIONS_PER_TEST)
                } else {
                    let labels: Vec<String> = sections.iter().map(|s| format!("S{}", s)).collect();
                    labels.join("-")
                };
                format!("C{}T{}{}", book, test, sections)
            })
            .collect();
        parts.push(format!("Listening {}", groups.join(", ")));
    }

    parts.join("; ")
}

/// One entry per calendar day from `start` through `today`.
pub fn activity_graph(logs: &[DailyLog], start: NaiveDate, today: NaiveDate) -> Vec<ActivityDay> {
    let by_date: BTreeMap<NaiveDate, &DailyLog> = logs.iter().map(|log| (log.date, log)).collect();

    start
        .iter_days()
        .take_while(|date| *date <= today)
        .map(|date| match by_date.get(&date) {
            Some(log) => ActivityDay {
                date,
                level: activity_level(log.task_count(), log.total_time),
                count: log.task_count(),
                time: log.total_time,
            },
            None => ActivityDay {
                date,
                level: 0,
                count: 0,
                time: 0,
            },
        })
        .collect()
}

/// Levels laid out as week columns, Monday first; days outside the range are `None`.
pub fn weekly_grid(days: &[ActivityDay]) -> Vec<[Option<u8>; 7]> {
    let Some(first) = days.first() else {
        return Vec::new();
    };
    let lead = first.date.weekday().num_days_from_monday() as usize;

    let mut weeks: Vec<[Option<u8>; 7]> = Vec::new();
    for (i, day) in days.iter().enumerate() {
        let slot = lead + i;
        if slot % 7 == 0 || weeks.is_empty() {
            weeks.push([None; 7]);
        }
        if let Some(week) = weeks.last_mut() {
            week[slot % 7] = Some(day.level);
        }
    }
    weeks
}
