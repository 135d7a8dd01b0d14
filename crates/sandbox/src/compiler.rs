//! Sandbox compiler: dialect resolution and type erasure.
//!
//! [`transpile`] is pure text processing. The interpreter-backed syntax
//! check lives on [`crate::Sandbox::compile`], which calls this first.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::strip::{erase_exports, erase_types};
use crate::Dialect;

/// Plain script text ready to be loaded by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledScript {
    source: String,
    dialect: Dialect,
}

impl CompiledScript {
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Dialect the original snippet was written in.
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

/// Lower `source` to plain script. When `dialect` is `None` it is detected
/// from typed-syntax markers.
pub fn transpile(source: &str, dialect: Option<Dialect>) -> CompiledScript {
    let typed = erase_types(source);
    let dialect = dialect.unwrap_or(if typed.erased > 0 {
        Dialect::TypeScript
    } else {
        Dialect::JavaScript
    });

    let lowered = match dialect {
        Dialect::TypeScript => typed.source,
        Dialect::JavaScript => erase_exports(source).source,
    };
    debug!(%dialect, erased = typed.erased, "transpiled script");

    CompiledScript {
        source: lowered,
        dialect,
    }
}
