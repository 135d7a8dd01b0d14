//! `tools` crate: the external tool collaborators the workflow engine talks to.
//!
//! Two capabilities live behind narrow traits:
//! - [`ToolRegistry`] answers metadata questions (`describe`, `check_exist`).
//! - [`ToolInvoker`] dispatches a payload to a tool and returns its output.
//!
//! The engine only ever sees the traits; concrete implementations (a JSON
//! catalog, an HTTP invoker, test mocks) are chosen by the binary or the tests.

pub mod error;
pub mod traits;
pub mod catalog;
pub mod http;
pub mod mock;

pub use error::ToolError;
pub use traits::{ToolCall, ToolDescription, ToolInvoker, ToolRegistry};
pub use catalog::ToolCatalog;
pub use http::HttpToolInvoker;
