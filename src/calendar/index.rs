use crate::calendar::filter::VisibilityFilter;
use crate::model::{CalendarError, Task, TaskId};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use log::warn;
use std::collections::BTreeMap;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a task timestamp into wall-clock time in `zone`.
///
/// Naive timestamps are taken as already local. Timestamps carrying an offset
/// are converted into `zone`. A bare date means midnight of that day.
pub fn parse_occurs_at<Tz: TimeZone>(raw: &str, zone: &Tz) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(zone).naive_local());
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN))
}

/// The calendar day (year, month, day) a task falls on in `zone`.
pub fn calendar_day<Tz: TimeZone>(task: &Task, zone: &Tz) -> Result<NaiveDate, CalendarError> {
    parse_occurs_at(&task.occurs_at, zone)
        .map(|dt| dt.date())
        .ok_or_else(|| CalendarError::MalformedTask {
            id: task.id,
            raw: task.occurs_at.clone(),
        })
}

/// Tasks grouped by calendar day, in the order they were supplied.
///
/// Callers that want chronological order within a day must sort the task
/// slice by timestamp before building the index.
#[derive(Debug, Clone, Default)]
pub struct TaskIndex<'a> {
    buckets: BTreeMap<NaiveDate, Vec<&'a Task>>,
    skipped: Vec<TaskId>,
}

impl<'a> TaskIndex<'a> {
    pub fn build(tasks: &'a [Task]) -> Self {
        Self::build_in(tasks, &Local)
    }

    /// Tasks whose timestamp cannot be parsed are left out of every bucket
    /// and reported through [`TaskIndex::skipped`].
    pub fn build_in<Tz: TimeZone>(tasks: &'a [Task], zone: &Tz) -> Self {
        let mut index = TaskIndex::default();
        for task in tasks {
            match calendar_day(task, zone) {
                Ok(day) => index.buckets.entry(day).or_default().push(task),
                Err(err) => {
                    warn!("event=task_skipped module=calendar reason=\"{}\"", err);
                    index.skipped.push(task.id);
                }
            }
        }
        index
    }

    pub fn tasks_on(&self, date: NaiveDate, filter: &VisibilityFilter) -> Vec<&'a Task> {
        self.buckets
            .get(&date)
            .map(|bucket| {
                bucket
                    .iter()
                    .copied()
                    .filter(|task| filter.admits(task))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn skipped(&self) -> &[TaskId] {
        &self.skipped
    }
}

/// Stable sort by local timestamp; tasks with unparseable timestamps go last.
pub fn sort_chronologically(tasks: &mut [Task]) {
    tasks.sort_by_cached_key(|task| {
        let parsed = parse_occurs_at(&task.occurs_at, &Local);
        (parsed.is_none(), parsed)
    });
}

/// One-shot query: the visible tasks in `tasks` that fall on `date`.
pub fn tasks_on<'a>(date: NaiveDate, tasks: &'a [Task], filter: &VisibilityFilter) -> Vec<&'a Task> {
    TaskIndex::build(tasks).tasks_on(date, filter)
}
