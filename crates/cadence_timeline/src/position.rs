//! Position specifiers and the offset resolver
//!
//! A child's absolute offset is resolved exactly once, when it is added, from
//! the build cursor, the label table and the span of the previous `add` call.

use indexmap::IndexMap;

use crate::error::{Result, TimelineError};

/// Where to place a child, as given by the caller
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Position {
    /// Append at the build cursor
    #[default]
    Append,
    /// Absolute offset
    At(f64),
    /// Operator or label token: `"+=10"`, `"-=5"`, `"*=2"`, `"<"`, `"<<+=5"`,
    /// `"intro"`, or a number in string form
    Token(String),
}

impl From<f64> for Position {
    fn from(offset: f64) -> Self {
        Position::At(offset)
    }
}

impl From<&str> for Position {
    fn from(token: &str) -> Self {
        Position::Token(token.to_string())
    }
}

impl From<String> for Position {
    fn from(token: String) -> Self {
        Position::Token(token)
    }
}

impl<T: Into<Position>> From<Option<T>> for Position {
    fn from(position: Option<T>) -> Self {
        position.map_or(Position::Append, Into::into)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Operator {
    Add,
    Subtract,
    Multiply,
}

impl Operator {
    fn apply(self, base: f64, operand: f64) -> f64 {
        match self {
            Operator::Add => base + operand,
            Operator::Subtract => base - operand,
            Operator::Multiply => base * operand,
        }
    }
}

/// Parsed form of a [`Position`]
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum PositionExpr {
    Cursor,
    Absolute(f64),
    Label(String),
    Relative(Operator, f64),
    PreviousEnd(Option<(Operator, f64)>),
    PreviousStart(Option<(Operator, f64)>),
}

impl PositionExpr {
    pub(crate) fn parse(position: &Position) -> Result<Self> {
        match position {
            Position::Append => Ok(PositionExpr::Cursor),
            Position::At(offset) if offset.is_finite() => Ok(PositionExpr::Absolute(*offset)),
            Position::At(offset) => Err(TimelineError::InvalidPosition(offset.to_string())),
            Position::Token(token) => parse_token(token),
        }
    }
}

fn parse_token(token: &str) -> Result<PositionExpr> {
    let invalid = || TimelineError::InvalidPosition(token.to_string());
    let trimmed = token.trim();

    if trimmed.is_empty() {
        return Err(invalid());
    }

    if let Some(rest) = trimmed.strip_prefix("<<") {
        return parse_trailing(rest).map(PositionExpr::PreviousStart).ok_or_else(invalid);
    }
    if let Some(rest) = trimmed.strip_prefix('<') {
        return parse_trailing(rest).map(PositionExpr::PreviousEnd).ok_or_else(invalid);
    }
    if let Some((op, operand)) = parse_operator(trimmed) {
        let operand = operand.ok_or_else(invalid)?;
        return Ok(PositionExpr::Relative(op, operand));
    }
    if let Ok(offset) = trimmed.parse::<f64>() {
        if offset.is_finite() {
            return Ok(PositionExpr::Absolute(offset));
        }
        return Err(invalid());
    }

    Ok(PositionExpr::Label(trimmed.to_string()))
}

/// `Some(None)` for an empty suffix, `Some(Some(..))` for `+=x`/`-=x`, `None` if malformed.
fn parse_trailing(rest: &str) -> Option<Option<(Operator, f64)>> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Some(None);
    }
    match parse_operator(rest)? {
        (Operator::Multiply, _) => None,
        (op, Some(operand)) => Some(Some((op, operand))),
        (_, None) => None,
    }
}

/// Recognises an operator prefix; the operand is `None` when it does not parse.
fn parse_operator(token: &str) -> Option<(Operator, Option<f64>)> {
    let (op, operand) = if let Some(rest) = token.strip_prefix("+=") {
        (Operator::Add, rest)
    } else if let Some(rest) = token.strip_prefix("-=") {
        (Operator::Subtract, rest)
    } else if let Some(rest) = token.strip_prefix("*=") {
        (Operator::Multiply, rest)
    } else {
        return None;
    };
    let operand = operand.trim().parse::<f64>().ok().filter(|v| v.is_finite());
    Some((op, operand))
}

/// Absolute start/end of everything created by one `add` call
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Span {
    pub start: f64,
    pub end: f64,
}

/// Running build state used to place children
#[derive(Clone, Debug, Default)]
pub(crate) struct OffsetResolver {
    cursor: f64,
    previous: Option<Span>,
}

impl OffsetResolver {
    /// Furthest absolute end reached so far
    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    pub fn resolve(&self, position: &Position, labels: &IndexMap<String, f64>) -> Result<f64> {
        let previous = self.previous.unwrap_or(Span { start: 0.0, end: 0.0 });
        let apply = |base: f64, trailing: Option<(Operator, f64)>| {
            trailing.map_or(base, |(op, operand)| op.apply(base, operand))
        };

        Ok(match PositionExpr::parse(position)? {
            PositionExpr::Cursor => self.cursor,
            PositionExpr::Absolute(offset) => offset,
            PositionExpr::Label(name) => *labels
                .get(&name)
                .ok_or(TimelineError::UnknownLabel(name))?,
            PositionExpr::Relative(op, operand) => op.apply(self.cursor, operand),
            PositionExpr::PreviousEnd(trailing) => apply(previous.end, trailing),
            PositionExpr::PreviousStart(trailing) => apply(previous.start, trailing),
        })
    }

    /// Record the span of a freshly added group of children
    pub fn record(&mut self, span: Span) {
        self.cursor = self.cursor.max(span.end);
        self.previous = Some(span);
    }
}
