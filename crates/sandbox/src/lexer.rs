//! A lossless token stream for script source.
//!
//! Only as much lexing as the type-erasure pass needs: trivia, identifiers,
//! numbers, opaque literals (strings, templates, regexes) and punctuators.
//! Concatenating every token's text reproduces the input exactly.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Kind {
    /// Whitespace and comments.
    Trivia,
    Ident,
    Number,
    /// String, template or regex literal.
    Literal,
    Punct,
}

#[derive(Debug, Clone)]
pub(crate) struct Token {
    pub kind: Kind,
    pub text: String,
}

impl Token {
    /// True for an identifier or punctuator spelled exactly `text`.
    pub fn is(&self, text: &str) -> bool {
        matches!(self.kind, Kind::Ident | Kind::Punct) && self.text == text
    }

    pub fn is_trivia(&self) -> bool {
        self.kind == Kind::Trivia
    }

    pub fn newlines(&self) -> usize {
        self.text.matches('\n').count()
    }
}

/// Words after which a `/` starts a regex rather than a division.
const REGEX_PREFIX_KEYWORDS: &[&str] = &[
    "return", "typeof", "case", "do", "else", "in", "of", "new", "delete", "void", "throw",
    "instanceof", "yield", "await",
];

const PUNCT_3: &[&str] = &["...", "===", "!=="];
const PUNCT_2: &[&str] = &[
    "=>", "?.", "??", "==", "!=", "<=", ">=", "&&", "||", "++", "--", "+=", "-=", "*=", "/=",
    "**",
];

pub(crate) fn tokenize(source: &str) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens: Vec<Token> = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        let kind = if c.is_whitespace() {
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            Kind::Trivia
        } else if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            Kind::Trivia
        } else if c == '/' && chars.get(i + 1) == Some(&'*') {
            i += 2;
            while i < chars.len() && !(chars[i] == '*' && chars.get(i + 1) == Some(&'/')) {
                i += 1;
            }
            i = (i + 2).min(chars.len());
            Kind::Trivia
        } else if c == '"' || c == '\'' {
            i = skip_quoted(&chars, i);
            Kind::Literal
        } else if c == '`' {
            i = skip_template(&chars, i);
            Kind::Literal
        } else if c == '/' && regex_allowed(last_significant(&tokens)) {
            i = skip_regex(&chars, i);
            Kind::Literal
        } else if is_ident_start(c) {
            while i < chars.len() && is_ident_part(chars[i]) {
                i += 1;
            }
            Kind::Ident
        } else if c.is_ascii_digit() {
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_') {
                i += 1;
            }
            Kind::Number
        } else {
            i += punct_len(&chars[i..]);
            Kind::Punct
        };
        // A trailing backslash escape can step past the end.
        i = i.min(chars.len());

        tokens.push(Token {
            kind,
            text: chars[start..i].iter().collect(),
        });
    }

    tokens
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn last_significant(tokens: &[Token]) -> Option<&Token> {
    tokens.iter().rev().find(|t| !t.is_trivia())
}

fn regex_allowed(prev: Option<&Token>) -> bool {
    match prev {
        None => true,
        Some(tok) => match tok.kind {
            Kind::Punct => !matches!(tok.text.as_str(), ")" | "]" | "}"),
            Kind::Ident => REGEX_PREFIX_KEYWORDS.contains(&tok.text.as_str()),
            _ => false,
        },
    }
}

fn punct_len(rest: &[char]) -> usize {
    let head: String = rest.iter().take(3).collect();
    if PUNCT_3.iter().any(|p| head.starts_with(p)) {
        return 3;
    }
    if PUNCT_2.iter().any(|p| head.starts_with(p)) {
        // `a ?.5 : b` is a conditional, not optional chaining.
        let ternary_decimal = head.starts_with("?.") && rest.get(2).is_some_and(|c| c.is_ascii_digit());
        if !ternary_decimal {
            return 2;
        }
    }
    1
}

/// Returns the index just past the closing quote. Unterminated strings stop
/// at the line break so the syntax check reports them.
fn skip_quoted(chars: &[char], start: usize) -> usize {
    let quote = chars[start];
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' => return i,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

fn skip_template(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '`' => return i + 1,
            '$' if chars.get(i + 1) == Some(&'{') => {
                i += 2;
                let mut depth = 1usize;
                while i < chars.len() && depth > 0 {
                    match chars[i] {
                        '{' => {
                            depth += 1;
                            i += 1;
                        }
                        '}' => {
                            depth -= 1;
                            i += 1;
                        }
                        '"' | '\'' => i = skip_quoted(chars, i),
                        '`' => i = skip_template(chars, i),
                        _ => i += 1,
                    }
                }
            }
            _ => i += 1,
        }
    }
    chars.len()
}

fn skip_regex(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    let mut in_class = false;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '\n' => return i,
            '[' => {
                in_class = true;
                i += 1;
            }
            ']' => {
                in_class = false;
                i += 1;
            }
            '/' if !in_class => {
                i += 1;
                while i < chars.len() && is_ident_part(chars[i]) {
                    i += 1;
                }
                return i;
            }
            _ => i += 1,
        }
    }
    chars.len()
}
