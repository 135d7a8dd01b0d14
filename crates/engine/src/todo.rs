//! Ordered checklist that a builder session uses to track multi-step work.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TodoError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    items: Vec<TodoItem>,
}

impl TodoList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one open item per title and return the new ids in order.
    pub fn add_items<I, S>(&mut self, titles: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        titles
            .into_iter()
            .map(|title| {
                let id = Uuid::new_v4().to_string();
                self.items.push(TodoItem {
                    id: id.clone(),
                    title: title.into(),
                    completed: false,
                });
                id
            })
            .collect()
    }

    pub fn mark_completed(&mut self, id: &str) -> Result<&TodoItem, TodoError> {
        let item = self
            .items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| TodoError::NotFound(id.to_owned()))?;
        item.completed = true;
        Ok(item)
    }

    /// `index` is zero-based, matching [`TodoList::items`].
    pub fn mark_completed_by_index(&mut self, index: usize) -> Result<&TodoItem, TodoError> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(TodoError::IndexOutOfRange { index, len })?;
        item.completed = true;
        Ok(item)
    }

    pub fn delete_item(&mut self, id: &str) -> Result<TodoItem, TodoError> {
        let index = self
            .items
            .iter()
            .position(|item| item.id == id)
            .ok_or_else(|| TodoError::NotFound(id.to_owned()))?;
        Ok(self.items.remove(index))
    }

    pub fn items(&self) -> &[TodoItem] {
        &self.items
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|item| item.completed).count()
    }

    /// `{completed}/{total}`.
    pub fn summary(&self) -> String {
        format!("{}/{}", self.completed_count(), self.items.len())
    }

    pub fn render_checklist(&self) -> String {
        let mut out = String::new();
        for (i, item) in self.items.iter().enumerate() {
            let mark = if item.completed { 'x' } else { ' ' };
            let _ = writeln!(out, "{}. [{mark}] {}", i + 1, item.title);
        }
        out
    }
}
