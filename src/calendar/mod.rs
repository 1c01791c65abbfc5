pub mod filter;
pub mod grid;
pub mod index;
pub mod projector;

pub use filter::VisibilityFilter;
pub use grid::{week_order, MonthAnchor};
pub use index::{parse_occurs_at, sort_chronologically, tasks_on};
pub use projector::{CalendarProjector, CellView, DayCell};

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::model::{Category, CategoryId, Task, TaskId};

    pub fn task(id: i64, occurs_at: &str, category: Option<i64>) -> Task {
        Task {
            id: TaskId(id),
            title: format!("task {id}"),
            description: None,
            occurs_at: occurs_at.to_string(),
            category_id: category.map(CategoryId),
            completed: false,
            category_name: None,
            category_color: None,
        }
    }

    pub fn category(id: i64) -> Category {
        Category {
            id: CategoryId(id),
            name: format!("category {id}"),
            color: "#3b82f6".into(),
        }
    }
}
