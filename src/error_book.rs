use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use std::collections::HashSet;

use crate::clock::{local_date, Clock, DAY_MS, HOUR_MS};
use crate::database::{load_json, save_json, KvStore};
use crate::error::ImportError;
use crate::models::{ErrorBookStats, ErrorWord, ImportOutcome, ReviewRecord, ReviewStats};

pub const ERROR_BOOK_KEY: &str = "vocabulary_error_book";

/// Review intervals in days, indexed by the number of reviews already done.
pub const REVIEW_INTERVALS: [i64; 7] = [1, 2, 4, 7, 15, 30, 60];

/// Entries become visible in the due list this long before they are due.
const DUE_LEAD_MS: i64 = HOUR_MS;

/// Next review timestamp for `word`, or 0 once every interval is used up.
///
/// Depends only on `added_at` and the review log.
pub fn next_review_date(word: &ErrorWord) -> i64 {
    let reviews = word.review_records.len();
    match word.review_records.last() {
        None => word.added_at + REVIEW_INTERVALS[0] * DAY_MS,
        Some(_) if reviews >= REVIEW_INTERVALS.len() => 0,
        Some(last) => last.review_date + REVIEW_INTERVALS[reviews] * DAY_MS,
    }
}

/// Stored due date, falling back to the computed one for entries that never had it set.
pub fn effective_due(word: &ErrorWord) -> i64 {
    match word.next_review_date {
        Some(due) if due != 0 => due,
        _ => next_review_date(word),
    }
}

pub struct ErrorBook<S: KvStore, C: Clock> {
    store: S,
    clock: C,
}

impl<S: KvStore, C: Clock> ErrorBook<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        ErrorBook { store, clock }
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        self.clock.now()
    }

    pub fn words(&self) -> Result<Vec<ErrorWord>> {
        Ok(load_json(&self.store, ERROR_BOOK_KEY)?.unwrap_or_default())
    }

    fn save(&self, words: &[ErrorWord]) -> Result<()> {
        save_json(&self.store, ERROR_BOOK_KEY, words)
    }

    pub fn add(&self, entry: ErrorWord) -> Result<bool> {
        let mut words = self.words()?;
        if words.iter().any(|w| w.matches(entry.id, &entry.category)) {
            return Ok(false);
        }

        log::info!("adding {} ({}) to error book", entry.display_word(), entry.category);
        words.push(ErrorWord {
            added_at: self.clock.now_ms(),
            ..entry
        });
        self.save(&words)?;
        Ok(true)
    }

    pub fn remove(&self, id: u64, category: &str) -> Result<()> {
        let mut words = self.words()?;
        words.retain(|w| !w.matches(id, category));
        self.save(&words)
    }

    pub fn contains(&self, id: u64, category: &str) -> Result<bool> {
        Ok(self.words()?.iter().any(|w| w.matches(id, category)))
    }

    pub fn get(&self, id: u64, category: &str) -> Result<Option<ErrorWord>> {
        Ok(self.words()?.into_iter().find(|w| w.matches(id, category)))
    }

    pub fn clear(&self) -> Result<()> {
        self.store.remove(ERROR_BOOK_KEY)
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.words()?)?)
    }

    pub fn import_json(&self, json: &str) -> ImportOutcome {
        match self.try_import(json) {
            Ok(outcome) => outcome,
            Err(e) => {
                log::warn!("error book import rejected: {}", e);
                ImportOutcome::failed(e.to_string())
            }
        }
    }

    fn try_import(&self, json: &str) -> Result<ImportOutcome, ImportError> {
        let payload: serde_json::Value = serde_json::from_str(json)?;
        let items = payload.as_array().ok_or(ImportError::NotAnArray)?;

        for (index, item) in items.iter().enumerate() {
            if !has_required_fields(item) {
                return Err(ImportError::MissingField { index });
            }
        }

        let incoming: Vec<ErrorWord> = serde_json::from_value(payload)?;
        let mut words = self.words()?;
        let mut seen: HashSet<(u64, String)> =
            words.iter().map(|w| (w.id, w.category.clone())).collect();

        let now = self.clock.now_ms();
        let total = incoming.len();
        let existing = seen.clone();
        let mut imported = 0;
        let mut already_stored = 0;
        for mut word in incoming {
            let key = (word.id, word.category.clone());
            if existing.contains(&key) {
                already_stored += 1;
                continue;
            }
            if !seen.insert(key) {
                continue;
            }
            if word.added_at == 0 {
                word.added_at = now;
            }
            words.push(word);
            imported += 1;
        }

        self.save(&words)?;
        let mut message = format!("{} imported, {} already exists", imported, already_stored);
        let repeated = total - imported - already_stored;
        if repeated > 0 {
            message.push_str(&format!(", {} duplicated in file", repeated));
        }
        Ok(ImportOutcome {
            success: true,
            message,
            count: imported,
        })
    }

    pub fn stats(&self) -> Result<ErrorBookStats> {
        let words = self.words()?;
        let mut stats = ErrorBookStats {
            total: words.len(),
            ..Default::default()
        };
        for word in &words {
            *stats.by_category.entry(word.category.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }

    pub fn mark_reviewed(&self, id: u64, category: &str) -> Result<bool> {
        let mut words = self.words()?;
        let Some(word) = words.iter_mut().find(|w| w.matches(id, category)) else {
            return Ok(false);
        };

        let level = word.review_records.len();
        if level >= REVIEW_INTERVALS.len() {
            return Ok(false);
        }

        word.review_records.push(ReviewRecord {
            review_date: self.clock.now_ms(),
            level: level as u8,
        });
        word.next_review_date = Some(next_review_date(word));
        log::debug!(
            "reviewed {} ({}), level {}, next due {:?}",
            word.display_word(),
            category,
            level,
            word.next_review_date
        );

        self.save(&words)?;
        Ok(true)
    }

    pub fn toggle_special_attention(&self, id: u64, category: &str) -> Result<bool> {
        let mut words = self.words()?;
        let Some(word) = words.iter_mut().find(|w| w.matches(id, category)) else {
            return Ok(false);
        };
        word.is_special_attention = !word.is_special_attention;
        self.save(&words)?;
        Ok(true)
    }

    pub fn is_special_attention(&self, id: u64, category: &str) -> Result<bool> {
        Ok(self
            .get(id, category)?
            .map(|w| w.is_special_attention)
            .unwrap_or(false))
    }

    /// Entries due by `now_ms` (or within the next hour), soonest first.
    pub fn list_due(&self, now_ms: i64) -> Result<Vec<ErrorWord>> {
        let mut due: Vec<ErrorWord> = self
            .words()?
            .into_iter()
            .filter_map(|mut word| {
                let next = effective_due(&word);
                word.next_review_date = Some(next);
                (next != 0 && next <= now_ms + DUE_LEAD_MS).then_some(word)
            })
            .collect();
        due.sort_by_key(|w| w.next_review_date.unwrap_or(0));
        Ok(due)
    }

    /// Buckets every entry by the calendar day its review falls on.
    pub fn review_stats(&self) -> Result<ReviewStats> {
        let words = self.words()?;
        let now = self.clock.now();
        let today = now.date_naive();

        let mut stats = ReviewStats {
            total: words.len(),
            ..Default::default()
        };

        for word in &words {
            let due = effective_due(word);
            if due == 0 {
                stats.completed += 1;
                continue;
            }
            let Some(due_day) = local_date(due, &now) else {
                continue;
            };
            let days = (due_day - today).num_days();
            match days {
                d if d < 0 => stats.overdue += 1,
                0 => stats.today += 1,
                1..=6 => {
                    stats.this_week += 1;
                    if days == 1 {
                        stats.tomorrow += 1;
                    }
                }
                _ => stats.later += 1,
            }
        }

        Ok(stats)
    }

    pub fn search(&self, query: &str) -> Result<Vec<ErrorWord>> {
        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, ErrorWord)> = self
            .words()?
            .into_iter()
            .filter_map(|word| {
                let haystack = format!("{} {}", word.word.join(" "), word.meaning);
                matcher.fuzzy_match(&haystack, query).map(|score| (score, word))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().map(|(_, word)| word).collect())
    }
}

fn has_required_fields(item: &serde_json::Value) -> bool {
    let id_ok = item
        .get("id")
        .and_then(|id| id.as_u64())
        .is_some_and(|id| id != 0);
    let word_ok = item
        .get("word")
        .and_then(|w| w.as_array())
        .is_some_and(|w| !w.is_empty());
    let category_ok = item
        .get("category")
        .and_then(|c| c.as_str())
        .is_some_and(|c| !c.is_empty());
    id_ok && word_ok && category_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::database::Database;

    const T: i64 = 1_700_000_000_000;

    fn word(id: u64, category: &str) -> ErrorWord {
        ErrorWord::new(id, category, vec![format!("word{}", id)])
    }

    fn book_at<'a>(db: &'a Database, clock: &'a FixedClock) -> ErrorBook<&'a Database, &'a FixedClock> {
        ErrorBook::new(db, clock)
    }

    fn test_clock() -> FixedClock {
        let clock = FixedClock::at("2023-11-14T00:00:00+00:00");
        clock.set_ms(T);
        clock
    }

    #[test]
    fn test_add_rejects_duplicate_pair() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);

        assert!(book.add(word(1, "A")).unwrap());
        assert!(!book.add(word(1, "A")).unwrap());
        assert!(book.add(word(1, "B")).unwrap());
        assert_eq!(book.words().unwrap().len(), 2);
        assert_eq!(book.words().unwrap()[0].added_at, T);
    }

    #[test]
    fn test_remove_and_contains() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);

        book.add(word(1, "A")).unwrap();
        book.add(word(1, "B")).unwrap();
        book.remove(1, "A").unwrap();

        assert!(!book.contains(1, "A").unwrap());
        assert!(book.contains(1, "B").unwrap());

        book.clear().unwrap();
        assert!(book.words().unwrap().is_empty());
    }

    #[test]
    fn test_schedule_without_reviews() {
        let mut w = word(1, "A");
        w.added_at = T;
        assert_eq!(next_review_date(&w), T + DAY_MS);
        // pure: same answer twice
        assert_eq!(next_review_date(&w), next_review_date(&w));
    }

    #[test]
    fn test_schedule_follows_interval_table() {
        let mut w = word(1, "A");
        w.added_at = T;
        for k in 1..REVIEW_INTERVALS.len() {
            let reviewed = T + k as i64 * 1000;
            w.review_records.push(ReviewRecord {
                review_date: reviewed,
                level: (k - 1) as u8,
            });
            assert_eq!(next_review_date(&w), reviewed + REVIEW_INTERVALS[k] * DAY_MS);
        }
        w.review_records.push(ReviewRecord { review_date: T, level: 6 });
        assert_eq!(next_review_date(&w), 0);
    }

    #[test]
    fn test_mark_reviewed_scenario() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);

        book.add(word(1, "A")).unwrap();
        assert_eq!(next_review_date(&book.get(1, "A").unwrap().unwrap()), T + DAY_MS);

        clock.set_ms(T + DAY_MS);
        assert!(book.mark_reviewed(1, "A").unwrap());

        let w = book.get(1, "A").unwrap().unwrap();
        assert_eq!(
            w.review_records,
            vec![ReviewRecord { review_date: T + DAY_MS, level: 0 }]
        );
        assert_eq!(w.next_review_date, Some(T + DAY_MS + 2 * DAY_MS));
    }

    #[test]
    fn test_mark_reviewed_stops_after_seven() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        book.add(word(1, "A")).unwrap();

        for _ in 0..7 {
            clock.advance_ms(DAY_MS);
            assert!(book.mark_reviewed(1, "A").unwrap());
        }
        let before = book.get(1, "A").unwrap().unwrap();
        assert_eq!(before.review_records.len(), 7);
        assert_eq!(before.next_review_date, Some(0));
        let levels: Vec<u8> = before.review_records.iter().map(|r| r.level).collect();
        assert_eq!(levels, vec![0, 1, 2, 3, 4, 5, 6]);

        assert!(!book.mark_reviewed(1, "A").unwrap());
        assert_eq!(book.get(1, "A").unwrap().unwrap(), before);

        clock.advance_ms(365 * DAY_MS);
        assert!(book.list_due(clock.now_ms()).unwrap().is_empty());
        assert_eq!(book.review_stats().unwrap().completed, 1);
    }

    #[test]
    fn test_mark_reviewed_missing_entry() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        assert!(!book.mark_reviewed(9, "A").unwrap());
        assert!(!book.toggle_special_attention(9, "A").unwrap());
    }

    #[test]
    fn test_list_due_window_and_order() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);

        book.add(word(1, "A")).unwrap();
        clock.advance_ms(2 * HOUR_MS);
        book.add(word(2, "A")).unwrap();
        clock.set_ms(T - 3 * HOUR_MS);
        book.add(word(3, "A")).unwrap();

        // word 3 due at T+1d-3h, word 1 at T+1d, word 2 at T+1d+2h
        let now = T + DAY_MS - 30 * 60 * 1000;
        let due: Vec<u64> = book.list_due(now).unwrap().iter().map(|w| w.id).collect();
        assert_eq!(due, vec![3, 1]);

        let later: Vec<u64> = book
            .list_due(T + DAY_MS + 2 * HOUR_MS)
            .unwrap()
            .iter()
            .map(|w| w.id)
            .collect();
        assert_eq!(later, vec![3, 1, 2]);
    }

    #[test]
    fn test_import_reports_repeats_separately() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        book.add(word(1, "A")).unwrap();

        let payload = r#"[
            {"id": 1, "word": ["one"], "category": "A"},
            {"id": 2, "word": ["two"], "category": "A"},
            {"id": 2, "word": ["two again"], "category": "A"}
        ]"#;
        let outcome = book.import_json(payload);
        assert!(outcome.success);
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.message, "1 imported, 1 already exists, 1 duplicated in file");
        assert_eq!(book.get(2, "A").unwrap().unwrap().word, vec!["two"]);
    }

    #[test]
    fn test_stored_zero_due_is_rescheduled() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);

        let outcome = book.import_json(
            r#"[{"id": 1, "word": ["abate"], "category": "A", "addedAt": 1000, "nextReviewDate": 0}]"#,
        );
        assert!(outcome.success);

        let w = book.get(1, "A").unwrap().unwrap();
        assert_eq!(w.next_review_date, Some(0));
        assert_eq!(effective_due(&w), 1000 + DAY_MS);
        assert_ne!(
            crate::review_format::format_review_date(effective_due(&w), &clock.now()),
            "complete"
        );

        assert_eq!(book.list_due(clock.now_ms()).unwrap().len(), 1);
        let stats = book.review_stats().unwrap();
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.overdue, 1);
    }

    #[test]
    fn test_import_counts_existing() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        book.add(word(1, "A")).unwrap();

        let payload = r#"[
            {"id": 1, "word": ["one"], "category": "A", "addedAt": 10},
            {"id": 2, "word": ["two"], "category": "A", "addedAt": 10},
            {"id": 1, "word": ["one"], "category": "B", "addedAt": 10}
        ]"#;
        let outcome = book.import_json(payload);
        assert!(outcome.success);
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.message, "2 imported, 1 already exists");
        assert_eq!(book.words().unwrap().len(), 3);
    }

    #[test]
    fn test_import_rejects_bad_payloads() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        book.add(word(1, "A")).unwrap();

        let not_array = book.import_json(r#"{"id": 1}"#);
        assert!(!not_array.success);
        assert_eq!(not_array.count, 0);

        let missing = book.import_json(r#"[{"id": 2, "word": ["x"], "category": "A"}, {"id": 3, "word": ["y"]}]"#);
        assert!(!missing.success);
        assert!(missing.message.contains("entry 1"));

        let garbage = book.import_json("not json");
        assert!(!garbage.success);

        assert_eq!(book.words().unwrap().len(), 1);
    }

    #[test]
    fn test_export_round_trips_through_import() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        book.add(word(4, "C")).unwrap();
        let exported = book.export_json().unwrap();

        let other = Database::open_in_memory().unwrap();
        let copy = book_at(&other, &clock);
        let outcome = copy.import_json(&exported);
        assert_eq!(outcome.count, 1);
        assert_eq!(copy.words().unwrap(), book.words().unwrap());
    }

    #[test]
    fn test_toggle_special_attention() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        book.add(word(1, "A")).unwrap();

        assert!(book.toggle_special_attention(1, "A").unwrap());
        assert!(book.is_special_attention(1, "A").unwrap());
        assert!(book.toggle_special_attention(1, "A").unwrap());
        assert!(!book.is_special_attention(1, "A").unwrap());
    }

    #[test]
    fn test_review_stats_buckets() {
        let db = Database::open_in_memory().unwrap();
        // noon, so same-day offsets stay on the same calendar day
        let clock = FixedClock::at("2024-05-10T12:00:00+00:00");
        let book = book_at(&db, &clock);
        let noon = clock.now_ms();

        // added 3 days ago -> due 2 days ago
        clock.set_ms(noon - 3 * DAY_MS);
        book.add(word(1, "A")).unwrap();
        // added yesterday evening -> due today 20:00
        clock.set_ms(noon - DAY_MS + 8 * HOUR_MS);
        book.add(word(2, "A")).unwrap();
        // added now -> due tomorrow
        clock.set_ms(noon);
        book.add(word(3, "A")).unwrap();
        // added in 4 days -> due in 5 days
        clock.set_ms(noon + 4 * DAY_MS);
        book.add(word(4, "A")).unwrap();
        // added in 20 days
        clock.set_ms(noon + 20 * DAY_MS);
        book.add(word(5, "A")).unwrap();

        clock.set_ms(noon);
        let stats = book.review_stats().unwrap();
        assert_eq!(stats.overdue, 1);
        assert_eq!(stats.today, 1);
        assert_eq!(stats.tomorrow, 1);
        assert_eq!(stats.this_week, 2);
        assert_eq!(stats.later, 1);
        assert_eq!(stats.completed, 0);
        assert_eq!(stats.total, 5);
    }

    #[test]
    fn test_stats_by_category() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);
        book.add(word(1, "A")).unwrap();
        book.add(word(2, "A")).unwrap();
        book.add(word(1, "B")).unwrap();

        let stats = book.stats().unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_category.get("A"), Some(&2));
        assert_eq!(stats.by_category.get("B"), Some(&1));
    }

    #[test]
    fn test_search_matches_word_forms() {
        let db = Database::open_in_memory().unwrap();
        let clock = test_clock();
        let book = book_at(&db, &clock);

        let mut abate = ErrorWord::new(1, "A", vec!["abate".into()]);
        abate.meaning = "to lessen".into();
        book.add(abate).unwrap();
        book.add(ErrorWord::new(2, "A", vec!["zealous".into()])).unwrap();

        let hits = book.search("abat").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);
    }
}
