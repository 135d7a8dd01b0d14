//! `sandbox` crate: compile and run user-authored scripts in isolation.
//!
//! Two halves:
//! - the compiler ([`transpile`], [`Sandbox::compile`]) turns a script or
//!   typed-script snippet into plain script text and syntax-checks it;
//! - the executor ([`Sandbox::execute`]) runs compiled text plus an entry
//!   call inside a fresh interpreter with a wall-clock limit and exactly one
//!   injected capability, `http`.
//!
//! The engine depends on the [`ScriptRunner`] trait, not on [`Sandbox`]
//! directly, so tests can wrap or replace it.

pub mod config;
pub mod error;
pub mod dialect;
mod lexer;
mod strip;
pub mod compiler;
pub mod http;
pub mod executor;

pub use config::SandboxConfig;
pub use error::SandboxError;
pub use dialect::Dialect;
pub use compiler::{transpile, CompiledScript};
pub use http::{DisabledHttp, HttpCapability, HttpRequest, HttpResponse, UreqHttp};
pub use executor::{EntryCall, Sandbox, ScriptRunner};
