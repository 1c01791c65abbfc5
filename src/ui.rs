use crate::api::{ApiClient, ApiError};
use crate::calendar::{
    parse_occurs_at, sort_chronologically, week_order, CalendarProjector, CellView, DayCell,
    MonthAnchor, VisibilityFilter,
};
use crate::model::{
    compose_timestamp, Category, CategoryId, Task, TaskCreate, TaskId, TaskUpdate,
};
use anyhow::{anyhow, Result};
use chrono::{Duration as ChronoDuration, Local, NaiveDate, NaiveTime, Weekday};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use log::{error, info};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::time::{Duration, Instant};

const DEFAULT_TASK_COLOR: Color = Color::Rgb(59, 130, 246);

pub fn run(client: ApiClient, first_weekday: Weekday) -> Result<()> {
    let mut app = App::new(client, first_weekday);
    app.refresh_all();
    let mut terminal = setup_terminal()?;
    let result = app.event_loop(&mut terminal);
    teardown_terminal(&mut terminal)?;
    result
}

struct App {
    client: ApiClient,
    projector: CalendarProjector,
    tasks: Vec<Task>,
    categories: Vec<Category>,
    filter: VisibilityFilter,
    month: MonthAnchor,
    selected: NaiveDate,
    focus: Focus,
    category_idx: usize,
    task_idx: usize,
    last_sync: Instant,
    status: String,
    mode: Mode,
}

enum Mode {
    Normal,
    Creating(TaskForm),
    Editing { task_id: TaskId, form: TaskForm },
    ConfirmDelete { task_id: TaskId },
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum Focus {
    Calendar,
    Categories,
    Day,
}

impl Focus {
    fn next(self) -> Self {
        match self {
            Focus::Calendar => Focus::Categories,
            Focus::Categories => Focus::Day,
            Focus::Day => Focus::Calendar,
        }
    }

    fn prev(self) -> Self {
        match self {
            Focus::Calendar => Focus::Day,
            Focus::Categories => Focus::Calendar,
            Focus::Day => Focus::Categories,
        }
    }
}

struct TaskForm {
    title: FieldValue,
    description: FieldValue,
    date: FieldValue,
    time: FieldValue,
    category: FieldValue,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum FormField {
    Title,
    Description,
    Date,
    Time,
    Category,
}

enum FormAction {
    Create,
    Edit(TaskId),
}

#[derive(Clone)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_grapheme(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_grapheme(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_grapheme(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl App {
    fn new(client: ApiClient, first_weekday: Weekday) -> Self {
        let today = Local::now().date_naive();
        let status = format!("Connected to {}", client.base_url());
        App {
            client,
            projector: CalendarProjector::new(first_weekday),
            tasks: Vec::new(),
            categories: Vec::new(),
            filter: VisibilityFilter::default(),
            month: MonthAnchor::of(today),
            selected: today,
            focus: Focus::Calendar,
            category_idx: 0,
            task_idx: 0,
            last_sync: Instant::now(),
            status,
            mode: Mode::Normal,
        }
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Creating(_) | Mode::Editing { .. } => self.handle_form_key(key),
            Mode::ConfirmDelete { .. } => self.handle_confirm_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::BackTab => self.focus = self.focus.prev(),
            KeyCode::Char('[') => self.show_month(self.month.prev()),
            KeyCode::Char(']') => self.show_month(self.month.next()),
            KeyCode::Char('t') => self.select_day(Local::now().date_naive()),
            KeyCode::Char('r') => {
                self.refresh_all();
            }
            KeyCode::Char('n') => {
                self.mode = Mode::Creating(TaskForm::new(self.selected));
                self.status = "New task (Tab/Shift-Tab move, Enter save, Esc cancel)".into();
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.current_task() {
                    let task_id = task.id;
                    let form = TaskForm::from_task(task, &self.categories);
                    self.mode = Mode::Editing { task_id, form };
                    self.status = format!("Editing task {}", task_id);
                } else {
                    self.status = "No task selected to edit".into();
                }
            }
            KeyCode::Char('d') => {
                if let Some(task) = self.current_task() {
                    let task_id = task.id;
                    self.mode = Mode::ConfirmDelete { task_id };
                    self.status = format!("Delete task {}? (y to confirm, n/Esc to cancel)", task_id);
                } else {
                    self.status = "No task selected to delete".into();
                }
            }
            KeyCode::Char('x') => self.toggle_selected_complete(),
            _ => match self.focus {
                Focus::Calendar => self.handle_calendar_key(key),
                Focus::Categories => self.handle_categories_key(key),
                Focus::Day => self.handle_day_key(key),
            },
        }
        Ok(false)
    }

    fn handle_calendar_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Left | KeyCode::Char('h') => self.shift_selected(-1),
            KeyCode::Right | KeyCode::Char('l') => self.shift_selected(1),
            KeyCode::Up | KeyCode::Char('k') => self.shift_selected(-7),
            KeyCode::Down | KeyCode::Char('j') => self.shift_selected(7),
            KeyCode::Enter => self.focus = Focus::Day,
            _ => {}
        }
    }

    fn handle_categories_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.category_idx = self.category_idx.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.category_idx + 1 < self.categories.len() {
                    self.category_idx += 1;
                }
            }
            KeyCode::Char(' ') | KeyCode::Enter => {
                if let Some(category) = self.categories.get(self.category_idx) {
                    let id = category.id;
                    let name = category.name.clone();
                    self.filter = self.filter.clone().toggle(id);
                    let state = if self.filter.is_visible(id) { "shown" } else { "hidden" };
                    self.status = format!("{} {}", name, state);
                    self.ensure_task_bounds();
                }
            }
            _ => {}
        }
    }

    fn handle_day_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.task_idx = self.task_idx.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                self.task_idx += 1;
                self.ensure_task_bounds();
            }
            KeyCode::Char(' ') => self.toggle_selected_complete(),
            KeyCode::Esc => self.focus = Focus::Calendar,
            _ => {}
        }
    }

    fn handle_form_key(&mut self, key: KeyEvent) -> Result<bool> {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close_form = match &mut mode {
            Mode::Creating(form) => self.process_form_key(FormAction::Create, form, key),
            Mode::Editing { task_id, form } => {
                self.process_form_key(FormAction::Edit(*task_id), form, key)
            }
            Mode::ConfirmDelete { .. } | Mode::Normal => false,
        };
        self.mode = if close_form { Mode::Normal } else { mode };
        Ok(false)
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) -> Result<bool> {
        let task_id = match &self.mode {
            Mode::ConfirmDelete { task_id } => *task_id,
            _ => return Ok(false),
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                match self.client.delete_task(task_id) {
                    Ok(()) => self.after_mutation(format!("Deleted task {}", task_id)),
                    Err(err) => self.report(err, "Delete failed"),
                }
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Delete canceled".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
        Ok(false)
    }

    fn process_form_key(&mut self, action: FormAction, form: &mut TaskForm, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.status = "Canceled".into();
                true
            }
            KeyCode::Tab | KeyCode::Down => {
                form.next_field();
                false
            }
            KeyCode::BackTab | KeyCode::Up => {
                form.prev_field();
                false
            }
            KeyCode::Left => {
                form.active_field_mut().move_left();
                false
            }
            KeyCode::Right => {
                form.active_field_mut().move_right();
                false
            }
            KeyCode::Backspace => {
                form.active_field_mut().backspace();
                false
            }
            KeyCode::Enter => self.try_submit(action, form),
            KeyCode::Char(c) => {
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
                {
                    form.active_field_mut().insert_char(c);
                }
                false
            }
            _ => false,
        }
    }

    fn try_submit(&mut self, action: FormAction, form: &TaskForm) -> bool {
        let outcome = match action {
            FormAction::Create => form
                .to_create(&self.categories)
                .and_then(|payload| Ok(self.client.create_task(&payload)?))
                .map(|task| format!("Created task {}", task.id)),
            FormAction::Edit(task_id) => form
                .to_update(&self.categories)
                .and_then(|update| Ok(self.client.update_task(task_id, &update)?))
                .map(|task| format!("Updated task {}", task.id)),
        };
        match outcome {
            Ok(message) => {
                if let Some(date) = form_date(form) {
                    self.select_day(date);
                }
                self.after_mutation(message);
                true
            }
            Err(err) => {
                self.status = format!("Could not save: {:#}", err);
                false
            }
        }
    }

    fn toggle_selected_complete(&mut self) {
        let Some(task) = self.current_task() else {
            self.status = "No task selected".into();
            return;
        };
        let (id, completed) = (task.id, task.completed);
        match self.client.update_task(id, &TaskUpdate::completed(!completed)) {
            Ok(updated) => {
                let state = if updated.completed { "done" } else { "not done" };
                self.after_mutation(format!("Task {} marked {}", id, state));
            }
            Err(err) => self.report(err, "Update failed"),
        }
    }

    /// Every mutation is followed by a full task refetch.
    fn after_mutation(&mut self, message: String) {
        if self.refresh_tasks() {
            self.status = message;
        }
    }

    fn refresh_all(&mut self) {
        match self.client.list_categories() {
            Ok(categories) => {
                self.filter = self.filter.clone().initialize(&categories);
                self.categories = categories;
                self.category_idx = self
                    .category_idx
                    .min(self.categories.len().saturating_sub(1));
            }
            Err(err) => {
                self.report(err, "Could not load categories");
                return;
            }
        }
        if self.refresh_tasks() {
            self.status = format!(
                "Loaded {} tasks, {} categories",
                self.tasks.len(),
                self.categories.len()
            );
        }
    }

    fn refresh_tasks(&mut self) -> bool {
        match self.client.list_tasks() {
            Ok(mut tasks) => {
                sort_chronologically(&mut tasks);
                self.tasks = tasks;
                self.last_sync = Instant::now();
                self.ensure_task_bounds();
                true
            }
            Err(err) => {
                self.report(err, "Could not load tasks");
                false
            }
        }
    }

    fn report(&mut self, err: ApiError, what: &str) {
        error!("event=api_error module=ui action={:?} error=\"{}\"", what, err);
        self.status = match err {
            ApiError::Unauthorized | ApiError::NotLoggedIn => {
                format!("{}: {} (run `taskcal login`)", what, err)
            }
            other => format!("{}: {}", what, other),
        };
    }

    fn show_month(&mut self, month: MonthAnchor) {
        self.month = month;
        self.selected = month.first_day();
        self.task_idx = 0;
    }

    fn select_day(&mut self, date: NaiveDate) {
        self.selected = date;
        if !self.month.contains(date) {
            self.month = MonthAnchor::of(date);
        }
        self.task_idx = 0;
    }

    fn shift_selected(&mut self, days: i64) {
        if let Some(date) = self
            .selected
            .checked_add_signed(ChronoDuration::days(days))
        {
            self.select_day(date);
        }
    }

    fn day_tasks(&self) -> Vec<&Task> {
        self.projector
            .day_detail(self.selected, &self.tasks, &self.filter)
    }

    fn current_task(&self) -> Option<&Task> {
        self.day_tasks().get(self.task_idx).copied()
    }

    fn ensure_task_bounds(&mut self) {
        let len = self.day_tasks().len();
        self.task_idx = self.task_idx.min(len.saturating_sub(1));
    }

    fn draw(&self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(12),
                Constraint::Length(3),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(68), Constraint::Percentage(32)])
            .split(layout[1]);
        self.draw_calendar(f, body[0]);
        self.draw_sidebar(f, body[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Creating(form) => self.draw_form(f, "New Task", form),
            Mode::Editing { form, .. } => self.draw_form(f, "Edit Task", form),
            Mode::ConfirmDelete { task_id } => self.draw_confirm(f, *task_id),
            Mode::Normal => {}
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let title = Line::from(vec![
            Span::styled(
                "taskcal ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                self.month.label(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::raw("  •  "),
            Span::styled(
                self.client.base_url().to_string(),
                Style::default().fg(Color::DarkGray),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("synced {}", format_elapsed(self.last_sync)),
                Style::default().fg(Color::Gray),
            ),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_calendar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let today = Local::now().date_naive();
        let projection = self.projector.project(
            self.month.first_day(),
            &self.tasks,
            &self.filter,
            today,
            self.selected,
        );
        let focused = self.focus == Focus::Calendar;
        let mut title = self.month.label();
        let hidden = self.filter.hidden().count();
        if hidden > 0 {
            title.push_str(&format!("  ({} categories hidden)", hidden));
        }
        if !projection.skipped.is_empty() {
            title.push_str(&format!(
                "  ({} task(s) with unreadable dates)",
                projection.skipped.len()
            ));
        }
        let block = Block::default()
            .title(Span::styled(
                title,
                Style::default()
                    .fg(if focused { Color::Cyan } else { Color::Gray })
                    .add_modifier(Modifier::BOLD),
            ))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(if focused {
                Color::Cyan
            } else {
                Color::DarkGray
            }));
        let inner = block.inner(area);
        f.render_widget(block, area);

        let rows = projection.cells.len().div_ceil(7).max(1);
        let mut constraints = vec![Constraint::Length(1)];
        constraints.extend((0..rows).map(|_| Constraint::Ratio(1, rows as u32)));
        let row_areas = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(inner);

        let headings: Vec<Span<'static>> = week_order(self.projector.first_weekday())
            .iter()
            .map(|day| {
                let width = (inner.width / 7) as usize;
                Span::styled(
                    format!("{:^width$}", &day.to_string()[..2], width = width),
                    Style::default().fg(Color::Gray),
                )
            })
            .collect();
        f.render_widget(Paragraph::new(Line::from(headings)), row_areas[0]);

        for (row_idx, row) in projection.cells.chunks(7).enumerate() {
            let columns = Layout::default()
                .direction(Direction::Horizontal)
                .constraints([Constraint::Ratio(1, 7); 7])
                .split(row_areas[row_idx + 1]);
            for (col_idx, cell) in row.iter().enumerate() {
                if let CellView::Day(day) = cell {
                    draw_day_cell(f, columns[col_idx], day, focused);
                }
            }
        }
    }

    fn draw_sidebar(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let category_height = category_panel_height(self.categories.len(), area.height);
        let sections = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(category_height), Constraint::Min(5)])
            .split(area);
        self.draw_categories(f, sections[0]);
        self.draw_day_detail(f, sections[1]);
    }

    fn draw_categories(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Categories;
        let items = if self.categories.is_empty() {
            vec![ListItem::new("No categories")]
        } else {
            self.categories
                .iter()
                .map(|category| {
                    let check = if self.filter.is_visible(category.id) {
                        "[x]"
                    } else {
                        "[ ]"
                    };
                    ListItem::new(Line::from(vec![
                        Span::raw(format!("{} ", check)),
                        Span::styled("■ ", Style::default().fg(parse_hex_color(&category.color))),
                        Span::raw(category.name.clone()),
                    ]))
                })
                .collect()
        };
        let mut state = ListState::default();
        if focused && !self.categories.is_empty() {
            state.select(Some(self.category_idx));
        }
        let list = List::new(items)
            .block(panel_block("Categories", focused))
            .highlight_style(
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
            );
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_day_detail(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let focused = self.focus == Focus::Day;
        let tasks = self.day_tasks();
        let items = if tasks.is_empty() {
            vec![ListItem::new("No tasks on this day")]
        } else {
            tasks.iter().copied().map(detail_item).collect()
        };
        let mut state = ListState::default();
        if !tasks.is_empty() {
            state.select(Some(self.task_idx));
        }
        let title = self.selected.format("%A, %d %B %Y").to_string();
        let list = List::new(items)
            .block(panel_block(&title, focused))
            .highlight_style(if focused {
                Style::default()
                    .bg(Color::LightCyan)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            });
        f.render_stateful_widget(list, area, &mut state);
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let help = Line::from(vec![
            Span::styled("←↑↓→ / h j k l", Style::default().fg(Color::LightCyan)),
            Span::raw(" move  "),
            Span::styled("[ ]", Style::default().fg(Color::LightCyan)),
            Span::raw(" month  "),
            Span::styled("t", Style::default().fg(Color::LightCyan)),
            Span::raw(" today  "),
            Span::styled("Tab", Style::default().fg(Color::LightCyan)),
            Span::raw(" focus  "),
            Span::styled("n", Style::default().fg(Color::LightMagenta)),
            Span::raw(" new  "),
            Span::styled("e", Style::default().fg(Color::LightYellow)),
            Span::raw(" edit  "),
            Span::styled("x", Style::default().fg(Color::LightGreen)),
            Span::raw(" done  "),
            Span::styled("d", Style::default().fg(Color::LightRed)),
            Span::raw(" delete  "),
            Span::styled("r", Style::default().fg(Color::LightCyan)),
            Span::raw(" refresh  "),
            Span::styled("q", Style::default().fg(Color::LightRed)),
            Span::raw(" quit"),
        ]);
        let paragraph = Paragraph::new(vec![help, Line::from(self.status.clone())])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(paragraph, area);
    }

    fn draw_form(&self, f: &mut ratatui::Frame<'_>, title: &str, form: &TaskForm) {
        let area = centered_rect(60, 50, f.size());
        let mut fields = vec![
            field_line("Title", &form.title, form.field == FormField::Title),
            field_line(
                "Description",
                &form.description,
                form.field == FormField::Description,
            ),
            field_line("Date (YYYY-MM-DD)", &form.date, form.field == FormField::Date),
            field_line("Time (HH:MM)", &form.time, form.field == FormField::Time),
            field_line(
                "Category (name or id)",
                &form.category,
                form.field == FormField::Category,
            ),
            Line::from(""),
        ];
        if !self.categories.is_empty() {
            let names: Vec<String> = self
                .categories
                .iter()
                .map(|c| format!("{}={}", c.id, c.name))
                .collect();
            fields.push(Line::from(Span::styled(
                names.join("  "),
                Style::default().fg(Color::DarkGray),
            )));
        }
        fields.push(Line::from(Span::styled(
            "Enter to save • Esc to cancel • Tab/Shift-Tab to move",
            Style::default().fg(Color::Gray),
        )));
        let dialog = Paragraph::new(fields)
            .block(
                Block::default()
                    .title(Span::styled(
                        title.to_string(),
                        Style::default()
                            .fg(Color::Cyan)
                            .add_modifier(Modifier::BOLD),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Cyan)),
            )
            .wrap(Wrap { trim: true });

        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, task_id: TaskId) {
        let area = centered_rect(50, 30, f.size());
        let title = self
            .tasks
            .iter()
            .find(|t| t.id == task_id)
            .map(|t| t.title.clone())
            .unwrap_or_else(|| task_id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Delete \"{}\"?", title),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("Press y to confirm, n or Esc to cancel"),
        ];
        let dialog = Paragraph::new(body).alignment(Alignment::Center).block(
            Block::default()
                .title(Span::styled(
                    "Confirm Delete",
                    Style::default()
                        .fg(Color::LightRed)
                        .add_modifier(Modifier::BOLD),
                ))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::LightRed)),
        );
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

impl TaskForm {
    fn new(date: NaiveDate) -> Self {
        TaskForm {
            title: FieldValue::new(""),
            description: FieldValue::new(""),
            date: FieldValue::new(&date.format("%Y-%m-%d").to_string()),
            time: FieldValue::new("09:00"),
            category: FieldValue::new(""),
            field: FormField::Title,
        }
    }

    fn from_task(task: &Task, categories: &[Category]) -> Self {
        let when = parse_occurs_at(&task.occurs_at, &Local);
        let category = task
            .category_id
            .map(|id| {
                categories
                    .iter()
                    .find(|c| c.id == id)
                    .map(|c| c.name.clone())
                    .unwrap_or_else(|| id.to_string())
            })
            .unwrap_or_default();
        TaskForm {
            title: FieldValue::new(&task.title),
            description: FieldValue::new(task.description().unwrap_or_default()),
            date: FieldValue::new(
                &when
                    .map(|dt| dt.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ),
            time: FieldValue::new(
                &when
                    .map(|dt| dt.format("%H:%M").to_string())
                    .unwrap_or_default(),
            ),
            category: FieldValue::new(&category),
            field: FormField::Title,
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Description,
            FormField::Description => FormField::Date,
            FormField::Date => FormField::Time,
            FormField::Time => FormField::Category,
            FormField::Category => FormField::Title,
        };
    }

    fn prev_field(&mut self) {
        self.field = match self.field {
            FormField::Title => FormField::Category,
            FormField::Description => FormField::Title,
            FormField::Date => FormField::Description,
            FormField::Time => FormField::Date,
            FormField::Category => FormField::Time,
        };
    }

    fn active_field_mut(&mut self) -> &mut FieldValue {
        match self.field {
            FormField::Title => &mut self.title,
            FormField::Description => &mut self.description,
            FormField::Date => &mut self.date,
            FormField::Time => &mut self.time,
            FormField::Category => &mut self.category,
        }
    }

    fn to_create(&self, categories: &[Category]) -> Result<TaskCreate> {
        let (title, date, category_id) = self.validated(categories)?;
        Ok(TaskCreate {
            title,
            description: self.description.value.trim().to_string(),
            date,
            category_id,
        })
    }

    /// Edits send every field, so clearing the category field removes it.
    fn to_update(&self, categories: &[Category]) -> Result<TaskUpdate> {
        let (title, date, category_id) = self.validated(categories)?;
        Ok(TaskUpdate {
            title: Some(title),
            description: Some(self.description.value.trim().to_string()),
            date: Some(date),
            completed: None,
            category_id: Some(category_id),
        })
    }

    fn validated(&self, categories: &[Category]) -> Result<(String, String, Option<CategoryId>)> {
        let title = self.title.value.trim();
        if title.is_empty() {
            return Err(anyhow!("title is required"));
        }
        let date = NaiveDate::parse_from_str(self.date.value.trim(), "%Y-%m-%d")
            .map_err(|_| anyhow!("invalid date (use YYYY-MM-DD)"))?;
        let time = NaiveTime::parse_from_str(self.time.value.trim(), "%H:%M")
            .map_err(|_| anyhow!("invalid time (use HH:MM)"))?;
        let category = resolve_category(&self.category.value, categories)?;
        Ok((title.to_string(), compose_timestamp(date, time), category))
    }
}

fn form_date(form: &TaskForm) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(form.date.value.trim(), "%Y-%m-%d").ok()
}

/// Blank means no category; otherwise an id or a case-insensitive name.
fn resolve_category(input: &str, categories: &[Category]) -> Result<Option<CategoryId>> {
    let raw = input.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Some(category) = categories.iter().find(|c| c.name.eq_ignore_ascii_case(raw)) {
        return Ok(Some(category.id));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|id| categories.iter().find(|c| c.id == CategoryId(id)))
        .map(|c| Some(c.id))
        .ok_or_else(|| anyhow!("unknown category: {}", raw))
}

/// One row per category plus borders, at most half of `available` and never
/// taller than the sidebar itself.
fn category_panel_height(count: usize, available: u16) -> u16 {
    let wanted = u16::try_from(count).unwrap_or(u16::MAX).saturating_add(2);
    wanted.min(available / 2).max(3.min(available))
}

fn draw_day_cell(f: &mut ratatui::Frame<'_>, area: Rect, day: &DayCell<'_>, focused: bool) {
    let mut number_style = if day.is_today {
        Style::default()
            .fg(Color::LightYellow)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    };
    if day.is_selected {
        number_style = number_style.add_modifier(Modifier::REVERSED);
    }
    let border_style = if day.is_selected {
        Style::default()
            .fg(if focused { Color::Cyan } else { Color::Blue })
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let width = area.width.saturating_sub(2) as usize;
    let mut lines: Vec<Line<'static>> = day
        .shown_tasks
        .iter()
        .map(|task| {
            let style = if task.completed {
                Style::default()
                    .fg(Color::DarkGray)
                    .add_modifier(Modifier::CROSSED_OUT)
            } else {
                Style::default().fg(task
                    .category_color
                    .as_deref()
                    .map(parse_hex_color)
                    .unwrap_or(DEFAULT_TASK_COLOR))
            };
            Line::from(Span::styled(truncate_text(&task.title, width), style))
        })
        .collect();
    if day.overflow_count > 0 {
        lines.push(Line::from(Span::styled(
            format!("+{} more", day.overflow_count),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        )));
    }
    let block = Block::default()
        .title(Span::styled(format!("{}", day.day_number), number_style))
        .borders(Borders::ALL)
        .border_style(border_style);
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn panel_block(title: &str, focused: bool) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default()
                .fg(if focused { Color::Cyan } else { Color::Gray })
                .add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if focused {
            Color::Cyan
        } else {
            Color::DarkGray
        }))
}

fn detail_item(task: &Task) -> ListItem<'static> {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let time = parse_occurs_at(&task.occurs_at, &Local)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".into());
    let title_style = if task.completed {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    };
    let mut first = vec![
        Span::raw(format!("{} ", check)),
        Span::styled(format!("{} ", time), Style::default().fg(Color::LightYellow)),
        Span::styled(task.title.clone(), title_style),
    ];
    if let Some(name) = &task.category_name {
        let color = task
            .category_color
            .as_deref()
            .map(parse_hex_color)
            .unwrap_or(DEFAULT_TASK_COLOR);
        first.push(Span::raw("  "));
        first.push(Span::styled(name.clone(), Style::default().fg(color)));
    }
    let mut lines = vec![Line::from(first)];
    if let Some(description) = task.description() {
        lines.push(Line::from(Span::styled(
            format!("      {}", description),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        )));
    }
    ListItem::new(lines)
}

fn field_line(label: &str, field: &FieldValue, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    Line::from(vec![
        Span::styled(format!("{}: ", label), label_style),
        Span::styled(text, value_style),
    ])
}

/// `#rrggbb` into a terminal color.
fn parse_hex_color(input: &str) -> Color {
    let hex = input.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return DEFAULT_TASK_COLOR;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    match (channel(0..2), channel(2..4), channel(4..6)) {
        (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
        _ => DEFAULT_TASK_COLOR,
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    info!("event=tui_start module=ui");
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

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

fn prev_grapheme(cursor: usize, text: &str) -> usize {
    if cursor == 0 {
        return 0;
    }
    let mut prev = 0;
    for (idx, _) in text.char_indices() {
        if idx >= cursor {
            break;
        }
        prev = idx;
    }
    prev
}

fn next_grapheme(cursor: usize, text: &str) -> usize {
    for (idx, ch) in text.char_indices() {
        if idx > cursor {
            return idx;
        }
        if idx == cursor {
            return cursor + ch.len_utf8();
        }
    }
    text.len()
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    if max <= 3 {
        return text.chars().take(max).collect();
    }
    let mut out: String = text.chars().take(max - 3).collect();
    out.push_str("...");
    out
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("{}s ago", secs)
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else {
        format!("{}h ago", secs / 3600)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::fixtures::{category, task};

    fn filled_form() -> TaskForm {
        let mut form = TaskForm::new(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        form.title = FieldValue::new("  Dentist ");
        form.time = FieldValue::new("23:30");
        form
    }

    #[test]
    fn new_form_targets_selected_day() {
        let form = TaskForm::new(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(form.date.value, "2024-02-29");
    }

    #[test]
    fn form_builds_create_payload() {
        let payload = filled_form().to_create(&[]).unwrap();
        assert_eq!(payload.title, "Dentist");
        assert_eq!(payload.date, "2024-03-10T23:30:00");
        assert_eq!(payload.category_id, None);
    }

    #[test]
    fn form_requires_title_and_valid_time() {
        let mut form = filled_form();
        form.title = FieldValue::new("   ");
        assert!(form.to_create(&[]).is_err());

        let mut form = filled_form();
        form.time = FieldValue::new("7pm");
        assert!(form.to_create(&[]).is_err());
    }

    #[test]
    fn blank_category_clears_it_on_update() {
        let update = filled_form().to_update(&[]).unwrap();
        assert_eq!(update.category_id, Some(None));
    }

    #[test]
    fn category_resolves_by_name_or_id() {
        let mut work = category(3);
        work.name = "Praca".into();
        let categories = vec![category(1), work];
        assert_eq!(
            resolve_category("praca", &categories).unwrap(),
            Some(CategoryId(3))
        );
        assert_eq!(resolve_category("1", &categories).unwrap(), Some(CategoryId(1)));
        assert_eq!(resolve_category(" ", &categories).unwrap(), None);
        assert!(resolve_category("Hobby", &categories).is_err());
        assert!(resolve_category("8", &categories).is_err());
    }

    #[test]
    fn numeric_category_names_win_over_ids() {
        let mut year = category(1);
        year.name = "2".into();
        let categories = vec![year, category(2)];
        assert_eq!(
            resolve_category("2", &categories).unwrap(),
            Some(CategoryId(1))
        );
    }

    #[test]
    fn category_panel_fits_any_height() {
        assert_eq!(category_panel_height(2, 40), 4);
        assert_eq!(category_panel_height(50, 40), 20);
        assert_eq!(category_panel_height(0, 40), 3);
        assert_eq!(category_panel_height(4, 5), 3);
        assert_eq!(category_panel_height(4, 2), 2);
        assert_eq!(category_panel_height(usize::MAX, 0), 0);
    }

    #[test]
    fn draws_on_tiny_terminals() {
        use ratatui::backend::TestBackend;

        let client = ApiClient::new("http://localhost:8000").unwrap();
        let mut app = App::new(client, Weekday::Mon);
        app.categories = vec![category(1), category(2), category(3)];
        let today = Local::now().date_naive().format("%Y-%m-%dT09:00:00").to_string();
        app.tasks = (1..=5).map(|id| task(id, &today, Some(1))).collect();
        for height in (1..=10).rev() {
            let mut terminal = Terminal::new(TestBackend::new(80, height)).unwrap();
            terminal.draw(|f| app.draw(f)).unwrap();
        }
        app.mode = Mode::Creating(TaskForm::new(app.selected));
        let mut terminal = Terminal::new(TestBackend::new(80, 3)).unwrap();
        terminal.draw(|f| app.draw(f)).unwrap();
    }

    #[test]
    fn edit_form_round_trips_task_fields() {
        let mut stored = task(5, "2024-03-10T23:30:00", Some(1));
        stored.title = "Dentist".into();
        let categories = vec![category(1)];
        let form = TaskForm::from_task(&stored, &categories);
        assert_eq!(form.date.value, "2024-03-10");
        assert_eq!(form.time.value, "23:30");
        assert_eq!(form.category.value, "category 1");
        let update = form.to_update(&categories).unwrap();
        assert_eq!(update.date.as_deref(), Some("2024-03-10T23:30:00"));
        assert_eq!(update.category_id, Some(Some(CategoryId(1))));
    }

    #[test]
    fn field_editing_handles_multibyte_text() {
        let mut field = FieldValue::new("Środa");
        field.move_left();
        field.backspace();
        field.insert_char('ą');
        assert_eq!(field.value, "Śroąa");
        while field.cursor > 0 {
            field.move_left();
        }
        field.backspace();
        assert_eq!(field.value, "Śroąa");
    }

    #[test]
    fn hex_colors_parse_with_fallback() {
        assert_eq!(parse_hex_color("#10b981"), Color::Rgb(16, 185, 129));
        assert_eq!(parse_hex_color("teal"), DEFAULT_TASK_COLOR);
        assert_eq!(parse_hex_color("#zzzzzz"), DEFAULT_TASK_COLOR);
    }

    #[test]
    fn truncation_marks_cut_titles() {
        assert_eq!(truncate_text("Dentist", 10), "Dentist");
        assert_eq!(truncate_text("Quarterly review", 10), "Quarter...");
        assert_eq!(truncate_text("abc", 0), "");
    }
}
