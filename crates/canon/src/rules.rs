//! Declarative canonicalization rule-sets.
//!
//! A [`RuleSet`] is an ordered list of [`LineRule`]s followed by one
//! [`Shape`]. Line rules filter and rewrite the raw text line by line; the
//! shape turns the surviving lines into tokens. Rules never re-order lines.

use crate::patterns::collapse_whitespace;
use hostinfo_schema::{sanitize_key, Token, TokenSeq};
use regex::Regex;
use std::collections::HashSet;
use tracing::trace;

/// Line predicate used by skip, keep and drop rules.
#[derive(Debug, Clone)]
pub enum Matcher {
    Contains(String),
    /// Prefix match after leading whitespace is ignored.
    StartsWith(String),
    Pattern(Regex),
    /// The `index`-th field equals one of `any_of`. `separator: None` splits
    /// on whitespace.
    Field {
        separator: Option<char>,
        index: usize,
        any_of: Vec<String>,
    },
}

impl Matcher {
    pub fn contains(needle: impl Into<String>) -> Self {
        Matcher::Contains(needle.into())
    }

    pub fn starts_with(prefix: impl Into<String>) -> Self {
        Matcher::StartsWith(prefix.into())
    }

    pub fn pattern(regex: &Regex) -> Self {
        Matcher::Pattern(regex.clone())
    }

    pub fn field(separator: Option<char>, index: usize, any_of: &[&str]) -> Self {
        Matcher::Field {
            separator,
            index,
            any_of: any_of.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn matches(&self, line: &str) -> bool {
        match self {
            Matcher::Contains(needle) => line.contains(needle.as_str()),
            Matcher::StartsWith(prefix) => line.trim_start().starts_with(prefix.as_str()),
            Matcher::Pattern(regex) => regex.is_match(line),
            Matcher::Field {
                separator,
                index,
                any_of,
            } => {
                let field = match separator {
                    Some(sep) => line.split(*sep).nth(*index),
                    None => line.split_whitespace().nth(*index),
                };
                field.is_some_and(|f| any_of.iter().any(|a| a == f))
            }
        }
    }
}

fn any_match(matchers: &[Matcher], line: &str) -> bool {
    matchers.iter().any(|m| m.matches(line))
}

/// One line-level transformation.
#[derive(Debug, Clone)]
pub enum LineRule {
    /// Drop every line up to and including the first match. No-op when
    /// nothing matches.
    SkipThrough(Matcher),
    /// Drop the first `n` lines.
    SkipLines(usize),
    /// Drop lines matching any matcher.
    Drop(Vec<Matcher>),
    /// Keep only lines matching any matcher.
    Keep(Vec<Matcher>),
    /// Regex replacement on every line.
    Replace { pattern: Regex, with: String },
    /// Append lines that start with whitespace to the previous line.
    JoinIndented,
    /// Join lines ending in `\` with the next line.
    JoinBackslash,
    /// Collapse whitespace runs, trim, and drop blank lines.
    CollapseWhitespace,
    DropBlank,
    /// Drop repeated lines, keeping the first occurrence.
    Dedup,
    /// Keep the first `n` lines.
    Take(usize),
}

impl LineRule {
    pub fn apply(&self, lines: Vec<String>) -> Vec<String> {
        match self {
            LineRule::SkipThrough(matcher) => match lines.iter().position(|l| matcher.matches(l)) {
                Some(pos) => lines.into_iter().skip(pos + 1).collect(),
                None => lines,
            },
            LineRule::SkipLines(n) => lines.into_iter().skip(*n).collect(),
            LineRule::Drop(matchers) => lines
                .into_iter()
                .filter(|l| !any_match(matchers, l))
                .collect(),
            LineRule::Keep(matchers) => lines
                .into_iter()
                .filter(|l| any_match(matchers, l))
                .collect(),
            LineRule::Replace { pattern, with } => lines
                .into_iter()
                .map(|l| pattern.replace_all(&l, with.as_str()).into_owned())
                .collect(),
            LineRule::JoinIndented => join_indented(lines),
            LineRule::JoinBackslash => join_backslash(lines),
            LineRule::CollapseWhitespace => lines
                .iter()
                .map(|l| collapse_whitespace(l))
                .filter(|l| !l.is_empty())
                .collect(),
            LineRule::DropBlank => lines.into_iter().filter(|l| !l.trim().is_empty()).collect(),
            LineRule::Dedup => {
                let mut seen = HashSet::new();
                lines
                    .into_iter()
                    .filter(|l| seen.insert(l.clone()))
                    .collect()
            }
            LineRule::Take(n) => lines.into_iter().take(*n).collect(),
        }
    }
}

fn join_indented(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    for line in lines {
        let indented = line.starts_with(|c: char| c.is_whitespace());
        match out.last_mut() {
            Some(prev) if indented && !line.trim().is_empty() => {
                prev.push(' ');
                prev.push_str(line.trim());
            }
            _ => out.push(line),
        }
    }
    out
}

fn join_backslash(lines: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len());
    let mut pending: Option<String> = None;

    for line in lines {
        let mut current = match pending.take() {
            Some(mut acc) => {
                acc.push(' ');
                acc.push_str(line.trim_start());
                acc
            }
            None => line,
        };

        if current.trim_end().ends_with('\\') {
            let trimmed = current.trim_end().trim_end_matches('\\').trim_end().len();
            current.truncate(trimmed);
            pending = Some(current);
        } else {
            out.push(current);
        }
    }

    out.extend(pending);
    out
}

/// How raw keys are cleaned before sanitizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    /// `Release Date` becomes `ReleaseDate`.
    Squash,
    /// `Local time` becomes `Local_time`.
    Underscore,
}

impl KeyStyle {
    fn apply(&self, raw: &str) -> String {
        match self {
            KeyStyle::Squash => {
                sanitize_key(&raw.chars().filter(|c| !c.is_whitespace()).collect::<String>())
            }
            KeyStyle::Underscore => sanitize_key(raw),
        }
    }
}

/// Final conversion of lines into tokens.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Each line split at the first `delimiter` into key and value.
    Pairs {
        delimiter: String,
        key_style: KeyStyle,
    },
    /// Whitespace columns: `key` column, value from `value_from` onwards.
    Columns { key: usize, value_from: usize },
    /// All lines joined into the value of one token.
    Listing { key: String, separator: String },
}

impl Shape {
    fn build(&self, lines: &[String]) -> TokenSeq {
        match self {
            Shape::Pairs {
                delimiter,
                key_style,
            } => lines
                .iter()
                .filter_map(|line| split_pair(line, delimiter))
                .filter_map(|(k, v)| token(key_style.apply(k), v))
                .collect(),
            Shape::Columns { key, value_from } => lines
                .iter()
                .filter_map(|line| {
                    let fields: Vec<&str> = line.split_whitespace().collect();
                    let k = fields.get(*key)?;
                    let v = fields.get(*value_from..).unwrap_or_default().join(" ");
                    token(sanitize_key(k), &v)
                })
                .collect(),
            Shape::Listing { key, separator } => {
                let value = lines
                    .iter()
                    .map(|l| collapse_whitespace(l))
                    .filter(|l| !l.is_empty())
                    .collect::<Vec<_>>()
                    .join(separator);
                token(sanitize_key(key), &value).into_iter().collect()
            }
        }
    }
}

fn split_pair<'a>(line: &'a str, delimiter: &str) -> Option<(&'a str, &'a str)> {
    if let Some((k, v)) = line.split_once(delimiter) {
        return Some((k, v));
    }
    // "Version:" with its value collapsed away
    let bare = delimiter.trim_end();
    if !bare.is_empty() {
        if let Some(k) = line.trim_end().strip_suffix(bare) {
            return Some((k, ""));
        }
    }
    trace!("No {:?} in line {:?}", delimiter, line);
    None
}

fn token(key: String, value: &str) -> Option<Token> {
    if key.is_empty() {
        return None;
    }
    Some(Token::new(key, value))
}

/// Ordered line rules plus a shape.
#[derive(Debug, Clone)]
pub struct RuleSet {
    lines: Vec<LineRule>,
    shape: Shape,
}

impl RuleSet {
    pub fn new(shape: Shape) -> Self {
        Self {
            lines: Vec::new(),
            shape,
        }
    }

    pub fn pairs(delimiter: &str, key_style: KeyStyle) -> Self {
        Self::new(Shape::Pairs {
            delimiter: delimiter.to_string(),
            key_style,
        })
    }

    pub fn columns(key: usize, value_from: usize) -> Self {
        Self::new(Shape::Columns { key, value_from })
    }

    pub fn listing(key: &str, separator: &str) -> Self {
        Self::new(Shape::Listing {
            key: key.to_string(),
            separator: separator.to_string(),
        })
    }

    pub fn rule(mut self, rule: LineRule) -> Self {
        self.lines.push(rule);
        self
    }

    pub fn skip_through(self, matcher: Matcher) -> Self {
        self.rule(LineRule::SkipThrough(matcher))
    }

    pub fn skip_lines(self, n: usize) -> Self {
        self.rule(LineRule::SkipLines(n))
    }

    pub fn drop(self, matchers: Vec<Matcher>) -> Self {
        self.rule(LineRule::Drop(matchers))
    }

    pub fn keep(self, matchers: Vec<Matcher>) -> Self {
        self.rule(LineRule::Keep(matchers))
    }

    pub fn replace(self, pattern: &Regex, with: &str) -> Self {
        self.rule(LineRule::Replace {
            pattern: pattern.clone(),
            with: with.to_string(),
        })
    }

    pub fn join_indented(self) -> Self {
        self.rule(LineRule::JoinIndented)
    }

    pub fn join_backslash(self) -> Self {
        self.rule(LineRule::JoinBackslash)
    }

    pub fn collapse_whitespace(self) -> Self {
        self.rule(LineRule::CollapseWhitespace)
    }

    pub fn drop_blank(self) -> Self {
        self.rule(LineRule::DropBlank)
    }

    pub fn dedup(self) -> Self {
        self.rule(LineRule::Dedup)
    }

    pub fn take(self, n: usize) -> Self {
        self.rule(LineRule::Take(n))
    }

    /// Canonicalize raw text.
    ///
    /// Text that already parses as a canonical token sequence is returned
    /// as-is, so normalizing rendered output is a no-op.
    pub fn normalize(&self, raw: &str) -> TokenSeq {
        if let Some(seq) = TokenSeq::parse(raw.trim()) {
            trace!("Input already canonical ({} tokens)", seq.len());
            return seq;
        }

        let mut lines: Vec<String> = raw.lines().map(str::to_string).collect();
        for rule in &self.lines {
            lines = rule.apply(lines);
        }

        self.shape.build(&lines)
    }
}

/// Canonicalize `raw` with `rules`.
pub fn normalize(raw: &str, rules: &RuleSet) -> TokenSeq {
    rules.normalize(raw)
}
