use crate::api::ApiClient;
use crate::calendar::{
    parse_occurs_at, sort_chronologically, tasks_on, week_order, CalendarProjector, CellView,
    MonthAnchor, VisibilityFilter,
};
use crate::config::Config;
use crate::model::{
    compose_timestamp, Category, CategoryCreate, CategoryId, Credentials, Task, TaskCreate, TaskId,
    TaskUpdate,
};
use crate::storage::{clear_session, load_session, save_session, AppPaths, Session};
use crate::ui;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, NaiveTime};
use log::info;

pub struct AppContext {
    pub config: Config,
    pub paths: AppPaths,
}

impl AppContext {
    pub fn load() -> Result<Self> {
        let paths = AppPaths::locate()?;
        let config = Config::load(&paths.config)?;
        Ok(AppContext { config, paths })
    }

    fn client(&self) -> Result<ApiClient> {
        ApiClient::new(self.config.api_url.clone()).context("building HTTP client")
    }

    fn session_client(&self) -> Result<ApiClient> {
        let session = load_session(&self.paths.session)?
            .ok_or_else(|| anyhow!("not logged in (run `taskcal login -u <name>`)"))?;
        Ok(self.client()?.with_token(session.access_token))
    }
}

pub fn register(ctx: &AppContext, username: String) -> Result<()> {
    let credentials = prompt_credentials(username)?;
    let token = ctx
        .client()?
        .register(&credentials)
        .context("registering account")?;
    store_session(ctx, credentials.username, token.access_token, token.token_type)
}

pub fn login(ctx: &AppContext, username: String) -> Result<()> {
    let credentials = prompt_credentials(username)?;
    let token = ctx.client()?.login(&credentials).context("logging in")?;
    store_session(ctx, credentials.username, token.access_token, token.token_type)
}

pub fn logout(ctx: &AppContext) -> Result<()> {
    if clear_session(&ctx.paths.session)? {
        info!("event=logout module=commands");
        println!("Logged out");
    } else {
        println!("No active session");
    }
    Ok(())
}

pub fn month(ctx: &AppContext, month: Option<String>, hide: Vec<i64>) -> Result<()> {
    let today = Local::now().date_naive();
    let anchor = month_anchor(month.as_deref(), today)?;
    let client = ctx.session_client()?;
    let (tasks, categories) = fetch_all(&client)?;
    let filter = filter_hiding(&categories, &hide);
    let projector = CalendarProjector::new(ctx.config.first_weekday);
    let projection = projector.project(anchor.first_day(), &tasks, &filter, today, today);

    println!("{}", anchor.label());
    let header: Vec<String> = week_order(projector.first_weekday())
        .iter()
        .map(|day| format!("{:>4}", &day.to_string()[..2]))
        .collect();
    println!("{}", header.join(""));
    for row in projection.cells.chunks(7) {
        let line: String = row
            .iter()
            .map(|cell| match cell {
                CellView::Empty => "    ".to_string(),
                CellView::Day(day) => {
                    let marker = if day.is_today {
                        '*'
                    } else if day.shown_tasks.is_empty() {
                        ' '
                    } else {
                        '+'
                    };
                    format!("{:>3}{}", day.day_number, marker)
                }
            })
            .collect();
        println!("{}", line.trim_end());
    }
    println!();

    for day in projection.cells.iter().filter_map(CellView::day) {
        if day.shown_tasks.is_empty() {
            continue;
        }
        let titles: Vec<&str> = day.shown_tasks.iter().map(|t| t.title.as_str()).collect();
        let mut line = format!("{}: {}", day.date.format("%a %d"), titles.join(", "));
        if day.overflow_count > 0 {
            line.push_str(&format!(" +{} more", day.overflow_count));
        }
        println!("{}", line);
    }
    report_skipped(&projection.skipped);
    Ok(())
}

pub fn day(ctx: &AppContext, date: Option<String>, hide: Vec<i64>) -> Result<()> {
    let client = ctx.session_client()?;
    let (tasks, categories) = fetch_all(&client)?;
    let filter = filter_hiding(&categories, &hide);
    let date = match date {
        Some(raw) => parse_date(&raw)?,
        None => Local::now().date_naive(),
    };
    println!("{}", date.format("%A, %d %B %Y"));
    let on_day = tasks_on(date, &tasks, &filter);
    if on_day.is_empty() {
        println!("  (no tasks)");
    }
    for task in on_day {
        print_task(task);
    }
    Ok(())
}

pub fn add(
    ctx: &AppContext,
    title: String,
    date: String,
    time: String,
    description: Option<String>,
    category: Option<i64>,
) -> Result<()> {
    let title = title.trim().to_string();
    if title.is_empty() {
        bail!("title is required");
    }
    let payload = TaskCreate {
        title,
        description: description.unwrap_or_default(),
        date: compose_timestamp(parse_date(&date)?, parse_time(&time)?),
        category_id: category.map(CategoryId),
    };
    let created = ctx
        .session_client()?
        .create_task(&payload)
        .context("creating task")?;
    println!("Added task {} on {}", created.id, created.occurs_at);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn edit(
    ctx: &AppContext,
    task_id: i64,
    title: Option<String>,
    description: Option<String>,
    date: Option<String>,
    time: Option<String>,
    category: Option<i64>,
    clear_category: bool,
) -> Result<()> {
    let date = match (date, time) {
        (Some(d), Some(t)) => Some(compose_timestamp(parse_date(&d)?, parse_time(&t)?)),
        _ => None,
    };
    if title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        bail!("title cannot be empty");
    }
    let category_id = if clear_category {
        Some(None)
    } else {
        category.map(|id| Some(CategoryId(id)))
    };
    let update = TaskUpdate {
        title: title.map(|t| t.trim().to_string()),
        description,
        date,
        completed: None,
        category_id,
    };
    if update.is_empty() {
        bail!("nothing to change");
    }
    let id = TaskId(task_id);
    ctx.session_client()?
        .update_task(id, &update)
        .with_context(|| format!("updating task {}", id))?;
    println!("Updated task {}", id);
    Ok(())
}

pub fn delete(ctx: &AppContext, task_id: i64) -> Result<()> {
    let id = TaskId(task_id);
    ctx.session_client()?
        .delete_task(id)
        .with_context(|| format!("deleting task {}", id))?;
    println!("Deleted task {}", id);
    Ok(())
}

pub fn done(ctx: &AppContext, task_id: i64) -> Result<()> {
    let client = ctx.session_client()?;
    let id = TaskId(task_id);
    let task = client
        .list_tasks()
        .context("fetching tasks")?
        .into_iter()
        .find(|t| t.id == id)
        .ok_or_else(|| anyhow!("task {} not found", id))?;
    let updated = client
        .update_task(id, &TaskUpdate::completed(!task.completed))
        .with_context(|| format!("updating task {}", id))?;
    let state = if updated.completed { "done" } else { "not done" };
    println!("Marked task {} as {}", id, state);
    Ok(())
}

pub fn categories(ctx: &AppContext) -> Result<()> {
    let categories = ctx
        .session_client()?
        .list_categories()
        .context("fetching categories")?;
    if categories.is_empty() {
        println!("(no categories)");
    }
    for category in categories {
        println!("{:>4}  {}  {}", category.id, category.color, category.name);
    }
    Ok(())
}

pub fn category_add(ctx: &AppContext, name: String, color: Option<String>) -> Result<()> {
    let name = name.trim().to_string();
    if name.is_empty() {
        bail!("category name is required");
    }
    let created = ctx
        .session_client()?
        .create_category(&CategoryCreate::new(name, color))
        .context("creating category")?;
    println!("Added category {} ({})", created.id, created.name);
    Ok(())
}

pub fn tui(ctx: &AppContext) -> Result<()> {
    let client = ctx.session_client()?;
    ui::run(client, ctx.config.first_weekday)
}

/// Full refetch of both collections; tasks come back in chronological order.
pub fn fetch_all(client: &ApiClient) -> Result<(Vec<Task>, Vec<Category>)> {
    let mut tasks = client.list_tasks().context("fetching tasks")?;
    sort_chronologically(&mut tasks);
    let categories = client.list_categories().context("fetching categories")?;
    Ok((tasks, categories))
}

pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let raw = input.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| anyhow!("invalid date (use YYYY-MM-DD): {}", raw))
}

pub fn parse_time(input: &str) -> Result<NaiveTime> {
    let raw = input.trim();
    NaiveTime::parse_from_str(raw, "%H:%M")
        .map_err(|_| anyhow!("invalid time (use HH:MM): {}", raw))
}

fn month_anchor(month: Option<&str>, today: NaiveDate) -> Result<MonthAnchor> {
    match month {
        Some(raw) => Ok(MonthAnchor::parse(raw)?),
        None => Ok(MonthAnchor::of(today)),
    }
}

fn filter_hiding(categories: &[Category], hide: &[i64]) -> VisibilityFilter {
    hide.iter().fold(VisibilityFilter::all_visible(categories), |filter, id| {
        filter.set(CategoryId(*id), false)
    })
}

fn prompt_credentials(username: String) -> Result<Credentials> {
    let username = username.trim().to_string();
    if username.is_empty() {
        bail!("username is required");
    }
    let password = rpassword::prompt_password("Password: ").context("reading password")?;
    if password.is_empty() {
        bail!("password is required");
    }
    Ok(Credentials { username, password })
}

fn store_session(
    ctx: &AppContext,
    username: String,
    access_token: String,
    token_type: String,
) -> Result<()> {
    let session = Session {
        username,
        access_token,
        token_type,
    };
    save_session(&ctx.paths.session, &session)?;
    info!("event=login module=commands username={}", session.username);
    println!("Logged in as {}", session.username);
    Ok(())
}

fn report_skipped(skipped: &[TaskId]) {
    if skipped.is_empty() {
        return;
    }
    let ids: Vec<String> = skipped.iter().map(TaskId::to_string).collect();
    eprintln!(
        "warning: {} task(s) with unreadable dates were left out: {}",
        skipped.len(),
        ids.join(", ")
    );
}

fn print_task(task: &Task) {
    let check = if task.completed { "x" } else { " " };
    let time = parse_occurs_at(&task.occurs_at, &Local)
        .map(|dt| dt.format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".into());
    print!("  [{}] {} #{} {}", check, time, task.id, task.title);
    if let Some(name) = &task.category_name {
        print!("  ({})", name);
    }
    println!();
    if let Some(description) = task.description() {
        println!("        {}", description);
    }
}
