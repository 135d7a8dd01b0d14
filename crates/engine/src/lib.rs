//! `engine` crate: the workflow tree, its mutation and compile passes, and
//! the execution engine.
//!
//! - [`models`]: node, trigger and workflow types (the persisted form).
//! - [`tree`], [`render`], [`compile`]: structural edits, display, static
//!   validation.
//! - [`editor`]: a builder session over a workflow, with its [`TodoList`].
//! - [`executor`]: runs a workflow from its trigger to a terminal node.
//! - [`scheduler`], [`source`]: cron firing over stored workflows.

pub mod models;
pub mod error;
pub mod cron;
pub mod tree;
pub mod render;
pub mod compile;
pub mod template;
pub mod todo;
pub mod editor;
pub mod executor;
pub mod source;
pub mod scheduler;

pub use models::{Node, NodeId, NodeKind, Script, ToolSpec, Trigger, TriggerKind, Workflow};
pub use error::{CronError, EngineError, SourceError, TodoError, TreeError, ValidationFailure};
pub use cron::CronExpression;
pub use tree::Branch;
pub use todo::{TodoItem, TodoList};
pub use editor::{NodeDraft, WorkflowEditor};
pub use executor::{ExecutionResult, ExecutionStep, ExecutorConfig, WorkflowExecutor};
pub use source::{DirectorySource, MemorySource, WorkflowSource};
pub use scheduler::{CronScheduler, SchedulerHandle};
