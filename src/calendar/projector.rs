use crate::calendar::filter::VisibilityFilter;
use crate::calendar::grid::month_cells;
use crate::calendar::index::TaskIndex;
use crate::model::{Task, TaskId};
use chrono::{Datelike, Local, NaiveDate, TimeZone, Weekday};

/// Titles shown per day cell before the rest collapse into an overflow count.
pub const DISPLAY_CAP: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellView<'a> {
    Empty,
    Day(DayCell<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayCell<'a> {
    pub date: NaiveDate,
    pub day_number: u32,
    pub is_today: bool,
    pub is_selected: bool,
    pub shown_tasks: Vec<&'a Task>,
    pub overflow_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection<'a> {
    pub cells: Vec<CellView<'a>>,
    /// Tasks left off the grid because their timestamp could not be parsed.
    pub skipped: Vec<TaskId>,
}

/// Combines month layout, task bucketing and category visibility into the
/// cells a renderer draws. Every call recomputes from its inputs; nothing is
/// cached between calls and the clock is never read.
#[derive(Debug, Clone)]
pub struct CalendarProjector<Tz: TimeZone = Local> {
    first_weekday: Weekday,
    zone: Tz,
}

impl CalendarProjector<Local> {
    pub fn new(first_weekday: Weekday) -> Self {
        Self::with_zone(first_weekday, Local)
    }
}

impl<Tz: TimeZone> CalendarProjector<Tz> {
    pub fn with_zone(first_weekday: Weekday, zone: Tz) -> Self {
        CalendarProjector {
            first_weekday,
            zone,
        }
    }

    pub fn first_weekday(&self) -> Weekday {
        self.first_weekday
    }

    pub fn project<'a>(
        &self,
        anchor: NaiveDate,
        tasks: &'a [Task],
        filter: &VisibilityFilter,
        today: NaiveDate,
        selected: NaiveDate,
    ) -> Projection<'a> {
        let index = TaskIndex::build_in(tasks, &self.zone);
        let cells = month_cells(anchor, self.first_weekday)
            .into_iter()
            .map(|cell| match cell {
                None => CellView::Empty,
                Some(date) => {
                    let mut visible = index.tasks_on(date, filter);
                    let overflow_count = visible.len().saturating_sub(DISPLAY_CAP);
                    visible.truncate(DISPLAY_CAP);
                    CellView::Day(DayCell {
                        date,
                        day_number: date.day(),
                        is_today: date == today,
                        is_selected: date == selected,
                        shown_tasks: visible,
                        overflow_count,
                    })
                }
            })
            .collect();
        Projection {
            cells,
            skipped: index.skipped().to_vec(),
        }
    }

    /// Every visible task on `date`, uncapped, for the day-detail panel.
    pub fn day_detail<'a>(
        &self,
        date: NaiveDate,
        tasks: &'a [Task],
        filter: &VisibilityFilter,
    ) -> Vec<&'a Task> {
        TaskIndex::build_in(tasks, &self.zone).tasks_on(date, filter)
    }
}

impl<'a> CellView<'a> {
    pub fn day(&self) -> Option<&DayCell<'a>> {
        match self {
            CellView::Empty => None,
            CellView::Day(cell) => Some(cell),
        }
    }
}

#[cfg(test)]
impl<'a> Projection<'a> {
    pub fn day(&self, date: NaiveDate) -> Option<&DayCell<'a>> {
        self.cells
            .iter()
            .filter_map(CellView::day)
            .find(|cell| cell.date == date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::fixtures::task;
    use crate::model::CategoryId;
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn projector() -> CalendarProjector<Utc> {
        CalendarProjector::with_zone(Weekday::Mon, Utc)
    }

    fn tasks_on_day(count: i64, day: &str) -> Vec<Task> {
        (1..=count)
            .map(|id| task(id, &format!("{day}T{:02}:00:00", id), None))
            .collect()
    }

    #[test]
    fn march_2024_layout() {
        let projection = projector().project(
            date(2024, 3, 1),
            &[],
            &VisibilityFilter::default(),
            date(2024, 3, 5),
            date(2024, 3, 1),
        );
        assert_eq!(projection.cells.len(), 35);
        assert!(projection.cells[..4].iter().all(|c| *c == CellView::Empty));
        let first = projection.cells[4].day().unwrap();
        assert_eq!(first.day_number, 1);
        assert!(first.is_selected);
        assert!(!first.is_today);
        assert!(projection.day(date(2024, 3, 5)).unwrap().is_today);
    }

    #[test]
    fn five_tasks_overflow_by_two() {
        let tasks = tasks_on_day(5, "2024-03-10");
        let projection = projector().project(
            date(2024, 3, 1),
            &tasks,
            &VisibilityFilter::default(),
            date(2024, 3, 1),
            date(2024, 3, 1),
        );
        let cell = projection.day(date(2024, 3, 10)).unwrap();
        assert_eq!(cell.shown_tasks.len(), 3);
        assert_eq!(cell.overflow_count, 2);
        let shown: Vec<i64> = cell.shown_tasks.iter().map(|t| t.id.0).collect();
        assert_eq!(shown, vec![1, 2, 3]);
    }

    #[test]
    fn two_tasks_do_not_overflow() {
        let tasks = tasks_on_day(2, "2024-03-10");
        let projection = projector().project(
            date(2024, 3, 1),
            &tasks,
            &VisibilityFilter::default(),
            date(2024, 3, 1),
            date(2024, 3, 1),
        );
        let cell = projection.day(date(2024, 3, 10)).unwrap();
        assert_eq!(cell.shown_tasks.len(), 2);
        assert_eq!(cell.overflow_count, 0);
    }

    #[test]
    fn overflow_counts_only_visible_tasks() {
        let mut tasks = tasks_on_day(3, "2024-03-10");
        tasks.push(task(10, "2024-03-10T20:00:00", Some(7)));
        tasks.push(task(11, "2024-03-10T21:00:00", Some(7)));
        let filter = VisibilityFilter::default().set(CategoryId(7), false);
        let projection = projector().project(
            date(2024, 3, 1),
            &tasks,
            &filter,
            date(2024, 3, 1),
            date(2024, 3, 1),
        );
        assert_eq!(projection.day(date(2024, 3, 10)).unwrap().overflow_count, 0);
    }

    #[test]
    fn tasks_outside_the_month_are_ignored() {
        let tasks = vec![task(1, "2024-04-01T09:00:00", None)];
        let projection = projector().project(
            date(2024, 3, 1),
            &tasks,
            &VisibilityFilter::default(),
            date(2024, 3, 1),
            date(2024, 3, 1),
        );
        assert!(projection
            .cells
            .iter()
            .filter_map(CellView::day)
            .all(|cell| cell.shown_tasks.is_empty()));
    }

    #[test]
    fn projection_is_deterministic() {
        let tasks = vec![
            task(1, "2024-03-10T09:00:00", Some(1)),
            task(2, "2024-03-12T09:00:00", None),
            task(3, "garbage", None),
        ];
        let filter = VisibilityFilter::default().set(CategoryId(2), false);
        let run = || {
            projector().project(
                date(2024, 3, 20),
                &tasks,
                &filter,
                date(2024, 3, 12),
                date(2024, 3, 10),
            )
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn malformed_tasks_are_reported_not_fatal() {
        let tasks = vec![
            task(1, "2024-03-10T09:00:00", None),
            task(2, "2024-13-40T09:00:00", None),
        ];
        let projection = projector().project(
            date(2024, 3, 1),
            &tasks,
            &VisibilityFilter::default(),
            date(2024, 3, 1),
            date(2024, 3, 1),
        );
        assert_eq!(projection.skipped, vec![TaskId(2)]);
        assert_eq!(projection.day(date(2024, 3, 10)).unwrap().shown_tasks.len(), 1);
    }

    #[test]
    fn day_detail_is_uncapped() {
        let tasks = tasks_on_day(5, "2024-03-10");
        let detail = projector().day_detail(date(2024, 3, 10), &tasks, &VisibilityFilter::default());
        assert_eq!(detail.len(), 5);
    }

    #[test]
    fn filter_toggle_updates_projection() {
        let tasks = vec![task(1, "2024-03-10T23:30:00", Some(7))];
        let hidden = VisibilityFilter::default().set(CategoryId(7), false);
        let project = |filter: &VisibilityFilter| {
            projector()
                .project(
                    date(2024, 3, 1),
                    &tasks,
                    filter,
                    date(2024, 3, 1),
                    date(2024, 3, 10),
                )
                .day(date(2024, 3, 10))
                .map(|cell| cell.shown_tasks.len())
        };
        assert_eq!(project(&hidden), Some(0));
        assert_eq!(project(&hidden.clone().set(CategoryId(7), true)), Some(1));
    }
}
