use std::collections::HashSet;
use tracing::debug;

/// Which of the configured categories the user has selected
#[derive(Debug, Clone, Default)]
pub struct CategorySelection {
    categories: Vec<String>,
    selected: HashSet<String>,
}

impl CategorySelection {
    pub fn new(categories: Vec<String>) -> Self {
        Self {
            categories,
            selected: HashSet::new(),
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_selected(&self, category: &str) -> bool {
        self.selected.contains(category)
    }

    /// Flip a category. Returns the new selection state, or `None` if the
    /// label is not one of the configured categories.
    pub fn toggle(&mut self, category: &str) -> Option<bool> {
        if !self.categories.iter().any(|c| c == category) {
            return None;
        }

        let now_selected = if self.selected.remove(category) {
            false
        } else {
            self.selected.insert(category.to_string());
            true
        };
        debug!("Category {} selected: {}", category, now_selected);
        Some(now_selected)
    }

    /// Toggle by zero-based position in the configured list
    pub fn toggle_index(&mut self, index: usize) -> Option<bool> {
        let category = self.categories.get(index)?.clone();
        self.toggle(&category)
    }

    pub fn select(&mut self, category: &str) -> bool {
        if self.categories.iter().any(|c| c == category) {
            self.selected.insert(category.to_string());
            true
        } else {
            false
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    pub fn select_all(&mut self) {
        self.selected = self.categories.iter().cloned().collect();
    }

    /// Selected labels in configured order
    pub fn selected(&self) -> Vec<String> {
        self.categories
            .iter()
            .filter(|c| self.selected.contains(c.as_str()))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}
