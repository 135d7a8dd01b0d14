//! Type erasure for typed-script snippets.
//!
//! Works on the lossless token stream from [`crate::lexer`] and removes the
//! typed constructs a node script realistically contains:
//!
//! - parameter, variable and return-type annotations (`a: T`, `): T {`);
//! - optional-parameter markers and parameter modifiers (`a?`, `readonly a`);
//! - `interface` blocks, `type` aliases and `import type` statements;
//! - `as` casts, non-null assertions (`x!.y`) and explicit type arguments on
//!   `new` expressions and function declarations.
//!
//! Every other token is kept verbatim. Removed text is replaced by the line
//! breaks it contained so line numbers in later syntax errors still match the
//! original snippet. `export` keywords are dropped in both dialects because
//! the interpreter loads snippets as plain scripts.

use crate::lexer::{tokenize, Kind, Token};

/// Result of an erasure pass.
pub(crate) struct Erased {
    pub source: String,
    /// Number of typed constructs removed.
    pub erased: usize,
}

/// Erase typed syntax (and `export` keywords).
pub(crate) fn erase_types(source: &str) -> Erased {
    Eraser::new(source, true).run()
}

/// Only drop `export` keywords; the source is already plain script.
pub(crate) fn erase_exports(source: &str) -> Erased {
    Eraser::new(source, false).run()
}

const KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "function", "return", "typeof", "new", "delete",
    "void", "throw", "in", "of", "instanceof", "do", "else", "case", "yield", "await", "with",
    "super", "import", "export", "class", "const", "let", "var", "true", "false", "null",
    "undefined", "default", "break", "continue", "try", "finally",
];

const MODIFIERS: &[&str] = &["public", "private", "protected", "readonly"];

/// Tokens that may precede a method name in an object literal or class body.
const METHOD_PREFIX: &[&str] = &["{", "}", ";", ",", "async", "static", "get", "set", "*"];

const CAST_STOPS: &[&str] = &[
    ",", ";", "=", "?", ":", "+", "-", "*", "/", "%", "&&", "||", "??", "==", "===", "!=",
    "!==", "<=", ">=", "=>", "?.",
];

/// Tokens that make a generic argument list implausible.
const ANGLE_ABORT: &[&str] = &[
    ";", "&&", "||", "==", "===", "!=", "!==", "+", "-", "*", "/", "%", "<=", ">=", "++", "--",
];

#[derive(Clone, Copy)]
enum Body {
    /// `function f(..) {` and methods.
    Block,
    /// `(..) =>`.
    Arrow,
}

type Range = (usize, usize);

struct Eraser {
    tokens: Vec<Token>,
    removed: Vec<bool>,
    erased: usize,
    typed: bool,
}

impl Eraser {
    fn new(source: &str, typed: bool) -> Self {
        let tokens = tokenize(source);
        let removed = vec![false; tokens.len()];
        Self {
            tokens,
            removed,
            erased: 0,
            typed,
        }
    }

    fn run(mut self) -> Erased {
        for i in 0..self.tokens.len() {
            if self.sig(i) {
                self.visit(i);
            }
        }
        self.render()
    }

    fn visit(&mut self, i: usize) {
        let token = &self.tokens[i];
        let kind = token.kind;
        let text = token.text.clone();

        if kind == Kind::Ident && text == "export" {
            let _ = self.erase_export(i);
            return;
        }
        if !self.typed {
            return;
        }

        let _ = match (kind, text.as_str()) {
            (Kind::Ident, "interface") => self.erase_interface(i),
            (Kind::Ident, "type") => self.erase_type_alias(i),
            (Kind::Ident, "import") => self.erase_type_import(i),
            (Kind::Ident, "function") => self.erase_function(i),
            (Kind::Ident, "let" | "const" | "var") => self.erase_declarator(i),
            (Kind::Ident, "as") => self.erase_cast(i),
            (Kind::Ident, "new") => self.erase_constructor_type_args(i),
            (Kind::Ident, _) => self.erase_method(i),
            (Kind::Punct, "(") => self.erase_arrow(i),
            (Kind::Punct, "!") => self.erase_non_null(i),
            _ => None,
        };
    }

    fn render(self) -> Erased {
        let mut source = String::new();
        for (token, removed) in self.tokens.iter().zip(&self.removed) {
            if *removed {
                source.extend(std::iter::repeat('\n').take(token.newlines()));
            } else {
                source.push_str(&token.text);
            }
        }
        Erased {
            source,
            erased: self.erased,
        }
    }

    // -----------------------------------------------------------------------
    // Token navigation
    // -----------------------------------------------------------------------

    fn tok(&self, i: usize) -> &Token {
        &self.tokens[i]
    }

    /// Significant: neither trivia nor already erased.
    fn sig(&self, i: usize) -> bool {
        !self.removed[i] && !self.tokens[i].is_trivia()
    }

    fn next_sig(&self, i: usize) -> Option<usize> {
        (i + 1..self.tokens.len()).find(|&j| self.sig(j))
    }

    fn sig_from(&self, i: usize) -> Option<usize> {
        (i..self.tokens.len()).find(|&j| self.sig(j))
    }

    fn prev_sig(&self, i: usize) -> Option<usize> {
        (0..i).rev().find(|&j| self.sig(j))
    }

    fn is(&self, i: Option<usize>, text: &str) -> bool {
        i.is_some_and(|j| self.tokens[j].is(text))
    }

    fn is_keyword(&self, i: usize) -> bool {
        KEYWORDS.contains(&self.tokens[i].text.as_str())
    }

    fn newline_between(&self, a: usize, b: usize) -> bool {
        (a + 1..b).any(|j| self.tokens[j].is_trivia() && self.tokens[j].newlines() > 0)
    }

    fn at_statement_start(&self, i: usize) -> bool {
        match self.prev_sig(i) {
            None => true,
            Some(p) => {
                let t = self.tok(p);
                t.is(";") || t.is("{") || t.is("}") || self.newline_between(p, i)
            }
        }
    }

    fn matching(&self, open: usize) -> Option<usize> {
        let (o, c) = match self.tok(open).text.as_str() {
            "(" => ("(", ")"),
            "[" => ("[", "]"),
            "{" => ("{", "}"),
            _ => return None,
        };
        let mut depth = 0usize;
        for j in open..self.tokens.len() {
            let t = &self.tokens[j];
            if t.is(o) {
                depth += 1;
            } else if t.is(c) {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            }
        }
        None
    }

    fn matching_angle(&self, open: usize) -> Option<usize> {
        let mut depth = 0usize;
        for j in open..self.tokens.len() {
            if !self.sig(j) {
                continue;
            }
            let t = &self.tokens[j];
            if t.is("<") {
                depth += 1;
            } else if t.is(">") {
                depth -= 1;
                if depth == 0 {
                    return Some(j);
                }
            } else if ANGLE_ABORT.iter().any(|a| t.is(a)) {
                return None;
            }
        }
        None
    }

    fn type_complete(&self, i: usize) -> bool {
        let t = self.tok(i);
        match t.kind {
            Kind::Ident | Kind::Number | Kind::Literal => true,
            Kind::Punct => matches!(t.text.as_str(), ")" | "]" | "}" | ">"),
            Kind::Trivia => false,
        }
    }

    /// Walk a type expression starting at `from`. Returns the index where the
    /// type ended and the last significant token that belongs to it.
    ///
    /// The type ends at a depth-0 stop token, at an unbalanced closer, or at a
    /// line break after a complete type that is not continued on the next line.
    fn scan_type(&self, from: usize, stops: &[&str]) -> (usize, Option<usize>) {
        let mut depth = 0usize;
        let mut last = None;
        let mut i = from;

        while i < self.tokens.len() {
            if !self.sig(i) {
                let line_break = self.tokens[i].is_trivia() && self.tokens[i].newlines() > 0;
                if depth == 0 && line_break && last.is_some_and(|l| self.type_complete(l)) {
                    let continued = self
                        .next_sig(i)
                        .is_some_and(|n| ["|", "&", ".", "=>", "<", "["].iter().any(|c| self.tok(n).is(c)));
                    if !continued {
                        return (i, last);
                    }
                }
                i += 1;
                continue;
            }

            let t = self.tok(i);
            if depth == 0 && stops.iter().any(|s| t.is(s)) {
                return (i, last);
            }
            if t.kind == Kind::Punct {
                match t.text.as_str() {
                    "(" | "[" | "{" | "<" => depth += 1,
                    ")" | "]" | "}" | ">" => {
                        if depth == 0 {
                            return (i, last);
                        }
                        depth -= 1;
                    }
                    _ => {}
                }
            }
            last = Some(i);
            i += 1;
        }

        (i, last)
    }

    fn remove(&mut self, from: usize, to: usize) {
        for flag in &mut self.removed[from..=to] {
            *flag = true;
        }
    }

    fn apply(&mut self, ranges: Vec<Range>) {
        if ranges.is_empty() {
            return;
        }
        for (from, to) in ranges {
            self.remove(from, to);
        }
        self.erased += 1;
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn erase_export(&mut self, i: usize) -> Option<()> {
        if !self.at_statement_start(i) {
            return None;
        }
        let next = self.next_sig(i)?;
        match self.tok(next).text.as_str() {
            "default" => {
                let after = self.next_sig(next);
                if ["function", "class", "async"].iter().any(|k| self.is(after, k)) {
                    self.remove(i, next);
                }
            }
            "{" => {
                let close = self.matching(next)?;
                let end = self
                    .next_sig(close)
                    .filter(|&s| self.tok(s).is(";"))
                    .unwrap_or(close);
                self.remove(i, end);
            }
            "function" | "class" | "async" | "const" | "let" | "var" | "interface" | "type"
            | "declare" => self.remove(i, i),
            _ => {}
        }
        Some(())
    }

    fn erase_interface(&mut self, i: usize) -> Option<()> {
        if !self.at_statement_start(i) {
            return None;
        }
        let name = self.next_sig(i)?;
        if self.tok(name).kind != Kind::Ident {
            return None;
        }
        let open = (name + 1..self.tokens.len()).find(|&j| self.sig(j) && self.tok(j).is("{"))?;
        let close = self.matching(open)?;
        self.apply(vec![(i, close)]);
        Some(())
    }

    fn erase_type_alias(&mut self, i: usize) -> Option<()> {
        if !self.at_statement_start(i) {
            return None;
        }
        let name = self.next_sig(i)?;
        if self.tok(name).kind != Kind::Ident {
            return None;
        }
        let mut eq = self.next_sig(name)?;
        if self.tok(eq).is("<") {
            let gt = self.matching_angle(eq)?;
            eq = self.next_sig(gt)?;
        }
        if !self.tok(eq).is("=") {
            return None;
        }
        let (stop, last) = self.scan_type(eq + 1, &[";"]);
        let last = last?;
        let end = if stop < self.tokens.len() && self.tok(stop).is(";") {
            stop
        } else {
            last
        };
        self.apply(vec![(i, end)]);
        Some(())
    }

    fn erase_type_import(&mut self, i: usize) -> Option<()> {
        if !self.at_statement_start(i) {
            return None;
        }
        let next = self.next_sig(i)?;
        if !self.tok(next).is("type") {
            return None;
        }
        let (stop, last) = self.scan_type(next + 1, &[";"]);
        let last = last?;
        let end = if stop < self.tokens.len() && self.tok(stop).is(";") {
            stop
        } else {
            last
        };
        self.apply(vec![(i, end)]);
        Some(())
    }

    fn erase_declarator(&mut self, i: usize) -> Option<()> {
        let name = self.next_sig(i)?;
        let end = if self.tok(name).is("{") || self.tok(name).is("[") {
            self.matching(name)?
        } else if self.tok(name).kind == Kind::Ident && !self.is_keyword(name) {
            name
        } else {
            return None;
        };
        let colon = self.next_sig(end)?;
        if !self.tok(colon).is(":") {
            return None;
        }
        let (_, last) = self.scan_type(colon + 1, &["=", ";", ",", ")"]);
        self.apply(vec![(colon, last?)]);
        Some(())
    }

    // -----------------------------------------------------------------------
    // Functions
    // -----------------------------------------------------------------------

    fn erase_function(&mut self, i: usize) -> Option<()> {
        let mut j = self.next_sig(i)?;
        if self.tok(j).is("*") {
            j = self.next_sig(j)?;
        }
        if self.tok(j).kind == Kind::Ident {
            j = self.next_sig(j)?;
        }
        let mut ranges = Vec::new();
        if self.tok(j).is("<") {
            let gt = self.matching_angle(j)?;
            ranges.push((j, gt));
            j = self.next_sig(gt)?;
        }
        if !self.tok(j).is("(") {
            return None;
        }
        ranges.extend(self.signature_ranges(j, Body::Block)?);
        self.apply(ranges);
        Some(())
    }

    fn erase_method(&mut self, i: usize) -> Option<()> {
        if self.is_keyword(i) {
            return None;
        }
        if let Some(p) = self.prev_sig(i) {
            if !METHOD_PREFIX.iter().any(|s| self.tok(p).is(s)) {
                return None;
            }
        }
        let mut open = self.next_sig(i)?;
        let mut ranges = Vec::new();
        if self.tok(open).is("<") {
            let gt = self.matching_angle(open)?;
            ranges.push((open, gt));
            open = self.next_sig(gt)?;
        }
        if !self.tok(open).is("(") {
            return None;
        }
        ranges.extend(self.signature_ranges(open, Body::Block)?);
        self.apply(ranges);
        Some(())
    }

    fn erase_arrow(&mut self, open: usize) -> Option<()> {
        let ranges = self.signature_ranges(open, Body::Arrow)?;
        self.apply(ranges);
        Some(())
    }

    /// Annotation ranges for a parameter list starting at `open`, plus its
    /// return type. `None` when the tokens do not form a signature of the
    /// requested shape.
    fn signature_ranges(&self, open: usize, body: Body) -> Option<Vec<Range>> {
        let close = self.matching(open)?;
        let mut ranges = self.param_annotations(open, close)?;
        let after = self.next_sig(close)?;

        if self.tok(after).is(":") {
            ranges.push(self.return_type_range(after, body)?);
        } else {
            let expected = match body {
                Body::Block => "{",
                Body::Arrow => "=>",
            };
            if !self.tok(after).is(expected) {
                return None;
            }
        }
        Some(ranges)
    }

    fn return_type_range(&self, colon: usize, body: Body) -> Option<Range> {
        let first = self.next_sig(colon)?;
        let (stop, last, terminator) = match body {
            Body::Block if self.tok(first).is("{") => {
                let close = self.matching(first)?;
                let (stop, last) = self.scan_type(close + 1, &["{"]);
                (stop, last.or(Some(close)), "{")
            }
            Body::Block => {
                let (stop, last) = self.scan_type(colon + 1, &["{"]);
                (stop, last, "{")
            }
            Body::Arrow => {
                let (stop, last) = self.scan_type(colon + 1, &["=>"]);
                (stop, last, "=>")
            }
        };
        if !self.is(self.sig_from(stop), terminator) {
            return None;
        }
        Some((colon, last?))
    }

    fn param_annotations(&self, open: usize, close: usize) -> Option<Vec<Range>> {
        let mut ranges = Vec::new();
        let mut i = self.next_sig(open)?;

        while i != close {
            while self.tok(i).kind == Kind::Ident && MODIFIERS.contains(&self.tok(i).text.as_str()) {
                let n = self.next_sig(i)?;
                let binding = self.tok(n).kind == Kind::Ident || self.tok(n).is("{") || self.tok(n).is("[");
                if !binding {
                    break;
                }
                ranges.push((i, i));
                i = n;
            }
            if self.tok(i).is("...") {
                i = self.next_sig(i)?;
            }

            let end = if self.tok(i).is("{") || self.tok(i).is("[") {
                self.matching(i)?
            } else if self.tok(i).kind == Kind::Ident && !self.is_keyword(i) {
                i
            } else {
                return None;
            };

            let mut j = self.next_sig(end)?;
            if self.tok(j).is("?") {
                let n = self.next_sig(j)?;
                if !(self.tok(n).is(":") || self.tok(n).is(",") || n == close) {
                    return None;
                }
                ranges.push((j, j));
                j = n;
            }
            if self.tok(j).is(":") {
                let (_, last) = self.scan_type(j + 1, &[",", "="]);
                let last = last?;
                ranges.push((j, last));
                j = self.next_sig(last)?;
            }
            if self.tok(j).is("=") {
                j = self.skip_default(j, close)?;
            }
            if j == close {
                break;
            }
            if !self.tok(j).is(",") {
                return None;
            }
            i = self.next_sig(j)?;
        }

        Some(ranges)
    }

    fn skip_default(&self, eq: usize, close: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut j = eq;
        loop {
            j = self.next_sig(j)?;
            let t = self.tok(j);
            if depth == 0 && (j == close || t.is(",")) {
                return Some(j);
            }
            if t.is("(") || t.is("[") || t.is("{") {
                depth += 1;
            } else if t.is(")") || t.is("]") || t.is("}") {
                depth = depth.checked_sub(1)?;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn erase_cast(&mut self, i: usize) -> Option<()> {
        let prev = self.prev_sig(i)?;
        if self.newline_between(prev, i) {
            return None;
        }
        let p = self.tok(prev);
        let operand = match p.kind {
            Kind::Ident => !self.is_keyword(prev),
            Kind::Number | Kind::Literal => true,
            Kind::Punct => matches!(p.text.as_str(), ")" | "]" | "}"),
            Kind::Trivia => false,
        };
        if !operand {
            return None;
        }
        let next = self.next_sig(i)?;
        let n = self.tok(next);
        let type_start = matches!(n.kind, Kind::Ident | Kind::Literal | Kind::Number)
            || n.is("{")
            || n.is("[")
            || n.is("(");
        if !type_start {
            return None;
        }
        let (_, last) = self.scan_type(i + 1, CAST_STOPS);
        self.apply(vec![(i, last?)]);
        Some(())
    }

    fn erase_non_null(&mut self, i: usize) -> Option<()> {
        let prev = self.prev_sig(i)?;
        if prev + 1 != i {
            return None;
        }
        let p = self.tok(prev);
        let operand = (p.kind == Kind::Ident && !self.is_keyword(prev)) || p.is(")") || p.is("]");
        if !operand {
            return None;
        }
        let follows = match self.next_sig(i) {
            None => true,
            Some(n) => {
                self.newline_between(i, n)
                    || [".", "?.", ")", "]", ",", ";", "[", "}", "("]
                        .iter()
                        .any(|s| self.tok(n).is(s))
            }
        };
        if !follows {
            return None;
        }
        self.apply(vec![(i, i)]);
        Some(())
    }

    fn erase_constructor_type_args(&mut self, i: usize) -> Option<()> {
        let mut j = self.next_sig(i)?;
        if self.tok(j).kind != Kind::Ident {
            return None;
        }
        loop {
            let n = self.next_sig(j)?;
            if self.tok(n).is(".") {
                j = self.next_sig(n)?;
            } else {
                j = n;
                break;
            }
        }
        if !self.tok(j).is("<") {
            return None;
        }
        let gt = self.matching_angle(j)?;
        if !self.is(self.next_sig(gt), "(") {
            return None;
        }
        self.apply(vec![(j, gt)]);
        Some(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn erase(src: &str) -> String {
        erase_types(src).source
    }

    #[test]
    fn function_annotations_are_removed() {
        let out = erase("function handle(ctx: Ctx, n?: number): Promise<Out> { return ctx; }");
        assert_eq!(out, "function handle(ctx, n) { return ctx; }");
    }

    #[test]
    fn arrow_and_declarator_annotations_are_removed() {
        let out = erase("const f = async (a: string[], b = 2): Promise<void> => { let x: number = a.length; };");
        assert_eq!(out, "const f = async (a, b = 2) => { let x = a.length; };");
    }

    #[test]
    fn interfaces_and_aliases_keep_line_numbers() {
        let src = "interface In {\n  a: number;\n}\ntype Out = { b: string };\nfunction handle(i: In): Out { return { b: String(i.a) }; }";
        let out = erase(src);
        assert_eq!(out.lines().count(), src.lines().count());
        assert!(!out.contains("interface"));
        assert!(!out.contains("type Out"));
        assert!(out.contains("function handle(i) { return { b: String(i.a) }; }"));
    }

    #[test]
    fn casts_generics_and_non_null_are_removed() {
        assert_eq!(erase("const v = (x as any).y!.z;"), "const v = (x ).y.z;");
        assert_eq!(erase("const m = new Map<string, number>();"), "const m = new Map();");
        assert_eq!(erase("function id<T>(v: T): T { return v; }"), "function id(v) { return v; }");
    }

    #[test]
    fn plain_script_constructs_are_untouched() {
        let src = "const o = { a: 1, b: c ? d : e, m(x) { return x; } };\nswitch (k) { case 1: break; }\nconst r = a < b ? f(x) : g(y);";
        let erased = erase_types(src);
        assert_eq!(erased.source, src);
        assert_eq!(erased.erased, 0);
    }

    #[test]
    fn object_literal_methods_lose_annotations() {
        assert_eq!(
            erase("const api = { run(input: In): Out { return input; } };"),
            "const api = { run(input) { return input; } };"
        );
    }

    #[test]
    fn exports_are_dropped_in_both_modes() {
        assert_eq!(
            erase_exports("export function handle(i) { return i; }").source,
            " function handle(i) { return i; }"
        );
        assert_eq!(
            erase_exports("export default function handle(i) { return i; }").source,
            " function handle(i) { return i; }"
        );
    }
}
