use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
    Frame, Terminal,
};
use std::io;

use crate::activity::weekly_grid;
use crate::clock::Clock;
use crate::database::KvStore;
use crate::error_book::{effective_due, ErrorBook, REVIEW_INTERVALS};
use crate::models::{ErrorWord, PopupMode, ReviewStats, TaskItem};
use crate::review_format::format_review_date;
use crate::study_plan::{format_time, StudyPlan};
use crate::timer::{Ticker, TICK_INTERVAL};

const TAB_TITLES: [&str; 5] = ["Review", "Error Book", "Vocab", "Listening", "Activity"];
const REVIEW_TAB: usize = 0;
const BOOK_TAB: usize = 1;
const VOCAB_TAB: usize = 2;
const LISTENING_TAB: usize = 3;

/// Restores the terminal when the TUI scope ends, including on error.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen, EnableMouseCapture)?;
        Ok(TerminalGuard)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
    }
}

fn step(state: &mut ListState, len: usize, forward: bool) {
    if len == 0 {
        state.select(None);
        return;
    }
    let i = match state.selected() {
        Some(i) if forward => (i + 1) % len,
        Some(0) => len - 1,
        Some(i) => (i - 1).min(len - 1),
        None => 0,
    };
    state.select(Some(i));
}

pub struct App<S: KvStore, C: Clock> {
    book: ErrorBook<S, C>,
    plan: StudyPlan<S, C>,
    pub current_tab: usize,
    pub due: Vec<ErrorWord>,
    pub words: Vec<ErrorWord>,
    pub review_stats: ReviewStats,
    pub due_state: ListState,
    pub word_state: ListState,
    pub vocab_state: ListState,
    pub listening_state: ListState,
    pub popup_mode: PopupMode,
    pub status: String,
    pub should_quit: bool,
}

impl<S: KvStore, C: Clock> App<S, C> {
    pub fn new(book: ErrorBook<S, C>, plan: StudyPlan<S, C>) -> Result<Self> {
        let mut app = App {
            book,
            plan,
            current_tab: REVIEW_TAB,
            due: Vec::new(),
            words: Vec::new(),
            review_stats: ReviewStats::default(),
            due_state: ListState::default(),
            word_state: ListState::default(),
            vocab_state: ListState::default(),
            listening_state: ListState::default(),
            popup_mode: PopupMode::None,
            status: String::new(),
            should_quit: false,
        };
        app.refresh_data()?;
        Ok(app)
    }

    pub fn refresh_data(&mut self) -> Result<()> {
        self.due = self.book.list_due(self.book.now().timestamp_millis())?;
        self.words = self.book.words()?;
        self.review_stats = self.book.review_stats()?;
        for (state, len) in [
            (&mut self.due_state, self.due.len()),
            (&mut self.word_state, self.words.len()),
        ] {
            if state.selected().is_some_and(|i| i >= len) {
                state.select(len.checked_sub(1));
            }
        }
        Ok(())
    }

    pub fn next_tab(&mut self) {
        self.current_tab = (self.current_tab + 1) % TAB_TITLES.len();
    }

    pub fn previous_tab(&mut self) {
        self.current_tab = (self.current_tab + TAB_TITLES.len() - 1) % TAB_TITLES.len();
    }

    fn move_selection(&mut self, forward: bool) {
        match self.current_tab {
            REVIEW_TAB => step(&mut self.due_state, self.due.len(), forward),
            BOOK_TAB => step(&mut self.word_state, self.words.len(), forward),
            VOCAB_TAB => step(&mut self.vocab_state, self.plan.vocab_tasks().len(), forward),
            LISTENING_TAB => step(
                &mut self.listening_state,
                self.plan.listening_tasks().len(),
                forward,
            ),
            _ => {}
        }
    }

    fn selected_word(&self) -> Option<&ErrorWord> {
        match self.current_tab {
            REVIEW_TAB => self.due_state.selected().and_then(|i| self.due.get(i)),
            BOOK_TAB => self.word_state.selected().and_then(|i| self.words.get(i)),
            _ => None,
        }
    }

    fn selected_task(&self) -> Option<&TaskItem> {
        match self.current_tab {
            VOCAB_TAB => self
                .vocab_state
                .selected()
                .and_then(|i| self.plan.vocab_tasks().get(i))
                .map(|t| &t.item),
            LISTENING_TAB => self
                .listening_state
                .selected()
                .and_then(|i| self.plan.listening_tasks().get(i))
                .map(|t| &t.item),
            _ => None,
        }
    }

    pub fn mark_selected_reviewed(&mut self) -> Result<()> {
        if let Some((id, category)) = self.selected_word().map(|w| (w.id, w.category.clone())) {
            if self.book.mark_reviewed(id, &category)? {
                self.status = format!("Reviewed {} ({})", id, category);
            } else {
                self.status = "Every review of this word is done".to_string();
            }
            self.refresh_data()?;
        }
        Ok(())
    }

    pub fn star_selected(&mut self) -> Result<()> {
        if let Some((id, category)) = self.selected_word().map(|w| (w.id, w.category.clone())) {
            self.book.toggle_special_attention(id, &category)?;
            self.refresh_data()?;
        }
        Ok(())
    }

    pub fn delete_selected(&mut self) -> Result<()> {
        if let Some((id, category)) = self.selected_word().map(|w| (w.id, w.category.clone())) {
            self.book.remove(id, &category)?;
            self.status = format!("Removed {} ({})", id, category);
            self.refresh_data()?;
        }
        Ok(())
    }

    pub fn toggle_selected_task(&mut self) -> Result<()> {
        let toggled = match self.current_tab {
            VOCAB_TAB => match self.vocab_state.selected() {
                Some(i) => {
                    let chapter = self.plan.vocab_tasks()[i].chapter;
                    self.plan.toggle_vocab_chapter(chapter)?
                }
                None => false,
            },
            LISTENING_TAB => match self.listening_state.selected() {
                Some(i) => {
                    let task = &self.plan.listening_tasks()[i];
                    let (book, test, section) = (task.book, task.test, task.section);
                    self.plan.toggle_listening_section(book, test, section)?
                }
                None => false,
            },
            _ => false,
        };
        if toggled {
            self.status = "Task updated".to_string();
        }
        Ok(())
    }

    pub fn toggle_selected_timer(&mut self) -> Result<()> {
        if let Some(id) = self.selected_task().map(|t| t.id.clone()) {
            self.plan.toggle_timer(&id)?;
        }
        Ok(())
    }

    pub fn pause_timer(&mut self) -> Result<()> {
        self.plan.pause_timer()
    }

    pub fn reset_plan(&mut self) -> Result<()> {
        self.plan.reset_all()?;
        self.status = "Study plan reset".to_string();
        Ok(())
    }

    pub fn has_live_timer(&self) -> bool {
        self.plan.active_timer().is_some()
    }

    fn handle_key(&mut self, code: KeyCode) -> Result<()> {
        match self.popup_mode {
            PopupMode::ConfirmDelete | PopupMode::ConfirmReset => {
                if matches!(code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    if self.popup_mode == PopupMode::ConfirmDelete {
                        self.delete_selected()?;
                    } else {
                        self.reset_plan()?;
                    }
                }
                self.popup_mode = PopupMode::None;
                return Ok(());
            }
            PopupMode::Help => {
                self.popup_mode = PopupMode::None;
                return Ok(());
            }
            PopupMode::None => {}
        }

        match code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => self.next_tab(),
            KeyCode::BackTab => self.previous_tab(),
            KeyCode::Down => self.move_selection(true),
            KeyCode::Up => self.move_selection(false),
            KeyCode::Char('?') => self.popup_mode = PopupMode::Help,
            KeyCode::Char('r') => self.refresh_data()?,
            KeyCode::Enter | KeyCode::Char('m') if self.current_tab == REVIEW_TAB => {
                self.mark_selected_reviewed()?
            }
            KeyCode::Char('s') if self.current_tab <= BOOK_TAB => self.star_selected()?,
            KeyCode::Char('d') if self.current_tab == BOOK_TAB && self.selected_word().is_some() => {
                self.popup_mode = PopupMode::ConfirmDelete
            }
            KeyCode::Enter if self.selected_task().is_some() => self.toggle_selected_task()?,
            KeyCode::Char('t') => self.toggle_selected_timer()?,
            KeyCode::Char('p') => self.pause_timer()?,
            KeyCode::Char('R') if matches!(self.current_tab, VOCAB_TAB | LISTENING_TAB) => {
                self.popup_mode = PopupMode::ConfirmReset
            }
            _ => {}
        }
        Ok(())
    }
}

pub fn run_tui<S: KvStore, C: Clock>(book: ErrorBook<S, C>, plan: StudyPlan<S, C>) -> Result<()> {
    let mut app = App::new(book, plan)?;

    let guard = TerminalGuard::enter()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;
    let res = run_app(&mut terminal, &mut app);
    drop(guard);
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("{err:?}");
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend, S: KvStore, C: Clock>(
    terminal: &mut Terminal<B>,
    app: &mut App<S, C>,
) -> io::Result<()> {
    // Lives only as long as this loop; it drives redraws of running timers.
    let mut ticker = Ticker::new(TICK_INTERVAL);
    let mut redraw = true;

    loop {
        if redraw {
            terminal.draw(|f| ui(f, app))?;
            redraw = false;
        }

        if event::poll(ticker.timeout())? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    if let Err(e) = app.handle_key(key.code) {
                        log::error!("action failed: {:#}", e);
                        app.status = format!("Error: {}", e);
                    }
                    redraw = true;
                }
            } else {
                redraw = true;
            }
        }

        if ticker.tick() && app.has_live_timer() {
            redraw = true;
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}

fn ui<S: KvStore, C: Clock>(f: &mut Frame, app: &mut App<S, C>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(1)].as_ref())
        .split(f.area());

    let titles: Vec<Line> = TAB_TITLES.iter().cloned().map(Line::from).collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("Studybook"))
        .select(app.current_tab)
        .style(Style::default().fg(Color::Cyan))
        .highlight_style(Style::default().add_modifier(Modifier::BOLD).bg(Color::Black));
    f.render_widget(tabs, chunks[0]);

    match app.current_tab {
        REVIEW_TAB => render_review(f, app, chunks[1]),
        BOOK_TAB => render_book(f, app, chunks[1]),
        VOCAB_TAB => render_vocab(f, app, chunks[1]),
        LISTENING_TAB => render_listening(f, app, chunks[1]),
        _ => render_activity(f, app, chunks[1]),
    }

    let status = if app.status.is_empty() {
        "Tab: switch view • ↑/↓: navigate • ?: help • q: quit".to_string()
    } else {
        app.status.clone()
    };
    f.render_widget(
        Paragraph::new(status).style(Style::default().fg(Color::DarkGray)),
        chunks[2],
    );

    let popup = match app.popup_mode {
        PopupMode::None => None,
        PopupMode::ConfirmDelete => Some((
            "Remove Word",
            "Remove the selected word from the error book?\n\ny: remove\nany other key: cancel".to_string(),
        )),
        PopupMode::ConfirmReset => Some((
            "Reset Study Plan",
            "Clear every completion and all recorded time?\n\ny: reset\nany other key: cancel".to_string(),
        )),
        PopupMode::Help => Some(("Help", help_text())),
    };
    if let Some((title, text)) = popup {
        let area = centered_rect(60, 40, f.area());
        f.render_widget(Clear, area);
        let content = Paragraph::new(text)
            .block(
                Block::default()
                    .title(title)
                    .borders(Borders::ALL)
                    .style(Style::default().bg(Color::DarkGray)),
            )
            .alignment(ratatui::layout::Alignment::Center)
            .style(Style::default().fg(Color::White));
        f.render_widget(content, area);
    }
}

fn help_text() -> String {
    [
        "Review / Error Book",
        "Enter or m: mark reviewed • s: special attention • d: remove",
        "",
        "Vocab / Listening",
        "Enter: complete / reopen • t: start or pause timer",
        "p: pause running timer • R: reset plan",
        "",
        "r: refresh • q: quit",
    ]
    .join("\n")
}

// Helper function to create centered rectangles for popups
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn split_halves(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
        .split(area)
}

fn word_items(words: &[ErrorWord], now: &chrono::DateTime<chrono::FixedOffset>) -> Vec<ListItem<'static>> {
    words
        .iter()
        .map(|word| {
            let due = effective_due(word);
            let star = if word.is_special_attention { "★ " } else { "  " };
            ListItem::new(Line::from(vec![
                Span::styled(star, Style::default().fg(Color::Yellow)),
                Span::styled(format!("{} ", word.display_word()), Style::default().fg(Color::White)),
                Span::styled(format!("[{}] ", word.category), Style::default().fg(Color::Cyan)),
                Span::styled(format_review_date(due, now), Style::default().fg(Color::Green)),
            ]))
        })
        .collect()
}

fn word_details(word: Option<&ErrorWord>) -> String {
    match word {
        Some(word) => format!(
            "Word: {}\nPart of speech: {}\nMeaning: {}\nExample: {}\nNotes: {}\nCategory: {}\nReviews: {}/{}\nSpecial attention: {}",
            word.display_word(),
            word.pos,
            word.meaning,
            word.example,
            word.extra,
            word.category,
            word.review_records.len(),
            REVIEW_INTERVALS.len(),
            if word.is_special_attention { "yes" } else { "no" }
        ),
        None => "No word selected".to_string(),
    }
}

fn render_review<S: KvStore, C: Clock>(f: &mut Frame, app: &mut App<S, C>, area: Rect) {
    let chunks = split_halves(area);
    let now = app.book.now();

    let list = List::new(word_items(&app.due, &now))
        .block(Block::default().borders(Borders::ALL).title(format!("Due ({})", app.due.len())))
        .highlight_style(Style::default().bg(Color::LightGreen).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[0], &mut app.due_state);

    let stats = app.review_stats;
    let text = format!(
        "Overdue: {}\nToday: {}\nTomorrow: {}\nThis week: {}\nLater: {}\nCompleted: {}\nTotal: {}\n\n{}",
        stats.overdue,
        stats.today,
        stats.tomorrow,
        stats.this_week,
        stats.later,
        stats.completed,
        stats.total,
        word_details(app.selected_word())
    );
    let info = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("Review Plan"))
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White));
    f.render_widget(info, chunks[1]);
}

fn render_book<S: KvStore, C: Clock>(f: &mut Frame, app: &mut App<S, C>, area: Rect) {
    let chunks = split_halves(area);
    let now = app.book.now();

    let list = List::new(word_items(&app.words, &now))
        .block(Block::default().borders(Borders::ALL).title(format!("Error Book ({})", app.words.len())))
        .highlight_style(Style::default().bg(Color::LightGreen).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[0], &mut app.word_state);

    let info = Paragraph::new(word_details(app.selected_word()))
        .block(Block::default().borders(Borders::ALL).title("Word"))
        .wrap(Wrap { trim: false })
        .style(Style::default().fg(Color::White));
    f.render_widget(info, chunks[1]);
}

fn task_line<'a>(label: String, task: &TaskItem, elapsed: u64, running: bool) -> ListItem<'a> {
    let (mark, color) = if task.is_completed() {
        ("[x] ", Color::Green)
    } else {
        ("[ ] ", Color::Blue)
    };
    let mut spans = vec![
        Span::styled(mark, Style::default().fg(color)),
        Span::styled(format!("{:<10} ", label), Style::default().fg(Color::White)),
        Span::styled(format_time(elapsed), Style::default().fg(Color::Cyan)),
    ];
    if running {
        spans.push(Span::styled(" ▶", Style::default().fg(Color::Yellow)));
    }
    if let Some(date) = task.completed_at {
        spans.push(Span::styled(format!("  {}", date), Style::default().fg(Color::DarkGray)));
    }
    ListItem::new(Line::from(spans))
}

fn plan_summary<S: KvStore, C: Clock>(app: &App<S, C>) -> String {
    let progress = app.plan.overall_progress();
    let goals = app.plan.today_goals();
    let done = app.plan.today_completed();
    let timer = match app.plan.active_timer() {
        Some(id) => format!("{} {}", id, format_time(app.plan.current_elapsed(id))),
        None => "idle".to_string(),
    };
    let chapters: Vec<String> = goals.vocab.iter().map(|c| format!("Ch.{}", c)).collect();
    format!(
        "Day {} (since {})\n\nVocab: {}/{} ({}%)\nListening: {}/{} ({}%)\n\nToday's vocab: {}\nToday's listening: {} sections\nDone today: {} chapters, {} sections\n\nTimer: {}\n\nControls:\n• Enter: complete / reopen\n• t: start/pause timer\n• p: pause\n• R: reset plan",
        app.plan.current_day(),
        app.plan.start_date(),
        progress.vocab.completed,
        progress.vocab.total,
        progress.vocab.percentage,
        progress.listening.completed,
        progress.listening.total,
        progress.listening.percentage,
        chapters.join(", "),
        goals.listening.len(),
        done.vocab,
        done.listening,
        timer
    )
}

fn render_vocab<S: KvStore, C: Clock>(f: &mut Frame, app: &mut App<S, C>, area: Rect) {
    let chunks = split_halves(area);
    let items: Vec<ListItem> = app
        .plan
        .vocab_tasks()
        .iter()
        .map(|t| {
            task_line(
                format!("Ch.{}", t.chapter),
                &t.item,
                app.plan.current_elapsed(&t.item.id),
                app.plan.active_timer() == Some(t.item.id.as_str()),
            )
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Vocabulary"))
        .highlight_style(Style::default().bg(Color::LightGreen).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[0], &mut app.vocab_state);

    let info = Paragraph::new(plan_summary(app))
        .block(Block::default().borders(Borders::ALL).title("Plan"))
        .style(Style::default().fg(Color::White));
    f.render_widget(info, chunks[1]);
}

fn render_listening<S: KvStore, C: Clock>(f: &mut Frame, app: &mut App<S, C>, area: Rect) {
    let chunks = split_halves(area);
    let items: Vec<ListItem> = app
        .plan
        .listening_tasks()
        .iter()
        .map(|t| {
            task_line(
                t.label(),
                &t.item,
                app.plan.current_elapsed(&t.item.id),
                app.plan.active_timer() == Some(t.item.id.as_str()),
            )
        })
        .collect();
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Listening"))
        .highlight_style(Style::default().bg(Color::LightGreen).add_modifier(Modifier::BOLD))
        .highlight_symbol(">> ");
    f.render_stateful_widget(list, chunks[0], &mut app.listening_state);

    let info = Paragraph::new(plan_summary(app))
        .block(Block::default().borders(Borders::ALL).title("Plan"))
        .style(Style::default().fg(Color::White));
    f.render_widget(info, chunks[1]);
}

fn level_color(level: u8) -> Color {
    match level {
        0 => Color::DarkGray,
        1 => Color::Rgb(14, 68, 41),
        2 => Color::Rgb(0, 109, 50),
        3 => Color::Rgb(38, 166, 65),
        _ => Color::Rgb(57, 211, 83),
    }
}

fn render_activity<S: KvStore, C: Clock>(f: &mut Frame, app: &mut App<S, C>, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(9), Constraint::Min(0)].as_ref())
        .split(area);

    let days = match app.plan.activity_graph_data() {
        Ok(days) => days,
        Err(e) => {
            log::error!("activity graph unavailable: {:#}", e);
            app.status = format!("Error: {}", e);
            Vec::new()
        }
    };
    let grid = weekly_grid(&days);
    // newest weeks that fit the panel
    let width = chunks[0].width.saturating_sub(6) as usize / 2;
    let shown = &grid[grid.len().saturating_sub(width)..];

    let rows: Vec<Line> = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
        .iter()
        .enumerate()
        .map(|(weekday, label)| {
            let mut spans = vec![Span::raw(format!("{} ", label))];
            spans.extend(shown.iter().map(|week| match week[weekday] {
                Some(level) => Span::styled("■ ", Style::default().fg(level_color(level))),
                None => Span::raw("  "),
            }));
            Line::from(spans)
        })
        .collect();
    let active = days.iter().filter(|d| d.count > 0).count();
    let graph = Paragraph::new(rows).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!("Activity ({} active days)", active)),
    );
    f.render_widget(graph, chunks[0]);

    let logs: Vec<ListItem> = app
        .plan
        .daily_logs()
        .into_iter()
        .map(|log| {
            ListItem::new(Line::from(vec![
                Span::styled(format!("{} ", log.date), Style::default().fg(Color::Cyan)),
                Span::styled(format!("{} ", format_time(log.total_time)), Style::default().fg(Color::Yellow)),
                Span::styled(log.summary, Style::default().fg(Color::White)),
            ]))
        })
        .collect();
    let list = List::new(logs).block(Block::default().borders(Borders::ALL).title("Daily Log"));
    f.render_widget(list, chunks[1]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::database::Database;
    use crate::study_plan::GRAPH_START_KEY;
    use ratatui::backend::TestBackend;

    /// Store whose graph start setting cannot be read.
    struct BrokenGraphStore(Database);

    impl KvStore for BrokenGraphStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            if key == GRAPH_START_KEY {
                anyhow::bail!("database is locked");
            }
            self.0.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.0.set(key, value)
        }

        fn remove(&self, key: &str) -> Result<()> {
            self.0.remove(key)
        }
    }

    #[test]
    fn test_activity_tab_reports_storage_error() {
        let store = BrokenGraphStore(Database::open_in_memory().unwrap());
        let clock = FixedClock::at("2024-04-01T09:00:00+08:00");
        let book = ErrorBook::new(&store, &clock);
        let plan = StudyPlan::load(&store, &clock).unwrap();
        let mut app = App::new(book, plan).unwrap();
        app.current_tab = TAB_TITLES.len() - 1;

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();
        assert!(app.status.starts_with("Error:"));
        assert!(app.status.contains("database is locked"));
    }

    #[test]
    fn test_step_wraps_both_ways() {
        let mut state = ListState::default();
        step(&mut state, 3, true);
        assert_eq!(state.selected(), Some(0));
        step(&mut state, 3, false);
        assert_eq!(state.selected(), Some(2));
        step(&mut state, 3, true);
        assert_eq!(state.selected(), Some(0));

        step(&mut state, 0, true);
        assert_eq!(state.selected(), None);
    }
}
