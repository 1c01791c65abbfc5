use crate::model::{Category, CategoryId, Task};
use std::collections::BTreeMap;

/// Per-category show/hide flags. A category without an entry is visible.
///
/// Updates return a new filter; the previous value is never changed in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisibilityFilter {
    entries: BTreeMap<CategoryId, bool>,
}

impl VisibilityFilter {
    /// Filter with every supplied category marked visible.
    pub fn all_visible(categories: &[Category]) -> Self {
        VisibilityFilter::default().initialize(categories)
    }

    /// Marks every supplied category visible. Entries for ids not in
    /// `categories` are left untouched.
    pub fn initialize(mut self, categories: &[Category]) -> Self {
        for category in categories {
            self.entries.insert(category.id, true);
        }
        self
    }

    pub fn set(mut self, category: CategoryId, visible: bool) -> Self {
        self.entries.insert(category, visible);
        self
    }

    pub fn toggle(self, category: CategoryId) -> Self {
        let visible = self.is_visible(category);
        self.set(category, !visible)
    }

    pub fn is_visible(&self, category: CategoryId) -> bool {
        self.entries.get(&category).copied().unwrap_or(true)
    }

    /// Uncategorized tasks are always admitted.
    pub fn admits(&self, task: &Task) -> bool {
        task.category_id.map_or(true, |id| self.is_visible(id))
    }

    pub fn hidden(&self) -> impl Iterator<Item = CategoryId> + '_ {
        self.entries
            .iter()
            .filter(|(_, visible)| !**visible)
            .map(|(id, _)| *id)
    }
}
