use serde::{Deserialize, Serialize};

/// Source dialect of a script node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Plain script; runs as-is.
    JavaScript,
    /// Typed script; type syntax is erased before execution.
    TypeScript,
}

impl Dialect {
    /// Guess the dialect from typed-syntax markers in `source`.
    ///
    /// A snippet is typed when the erasure pass finds at least one construct
    /// to remove (annotations, interfaces, type aliases, `as` casts, ...).
    pub fn detect(source: &str) -> Self {
        if crate::strip::erase_types(source).erased > 0 {
            Self::TypeScript
        } else {
            Self::JavaScript
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_script_is_detected_as_javascript() {
        let src = "function handle(ctx) { return ctx.ok ? { a: 1 } : null; }";
        assert_eq!(Dialect::detect(src), Dialect::JavaScript);
    }

    #[test]
    fn annotations_mark_typescript() {
        assert_eq!(
            Dialect::detect("function handle(ctx: Input): number { return 1; }"),
            Dialect::TypeScript
        );
        assert_eq!(
            Dialect::detect("interface Input { x: number }\nfunction handle(i) { return i; }"),
            Dialect::TypeScript
        );
        assert_eq!(Dialect::detect("const x = y as string;"), Dialect::TypeScript);
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        assert_eq!(
            serde_json::to_string(&Dialect::TypeScript).unwrap(),
            "\"typescript\""
        );
    }
}
