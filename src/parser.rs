//! Populate path-expression parser using nom.
//!
//! Splits a populate value into path expressions.
//!
//! # Syntax Overview
//!
//! ```text
//! createdBy:friends.name,likedBy
//! ───┬───── ──┬──── ─┬── ───┬───
//!    │        │      │      │
//!    │        │      │      └── Next expression (after ',')
//!    │        │      └── Field selected on the last relation (after '.')
//!    │        └── Nested relation (after ':')
//!    └── Top-level relation
//! ```

use std::fmt;

use nom::{
    bytes::complete::take_while,
    character::complete::char,
    combinator::{all_consuming, opt},
    multi::separated_list1,
    sequence::{pair, preceded},
    IResult,
};

use crate::error::{QueryError, QueryResult};

/// One step of a path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Traverse into the relation and continue.
    Relation(String),
    /// Traverse into the relation and select one field there. Always terminal.
    Leaf { relation: String, field: String },
}

impl Segment {
    /// The relation name this segment traverses.
    pub fn relation(&self) -> &str {
        match self {
            Segment::Relation(name) => name,
            Segment::Leaf { relation, .. } => relation,
        }
    }

    /// The selected field, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            Segment::Relation(_) => None,
            Segment::Leaf { field, .. } => Some(field),
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Relation(name) => write!(f, "{}", name),
            Segment::Leaf { relation, field } => write!(f, "{}.{}", relation, field),
        }
    }
}

/// A tokenized populate expression. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    source: String,
    segments: Vec<Segment>,
}

impl PathExpression {
    /// The trimmed text this expression was tokenized from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// The top-level relation name.
    pub fn head(&self) -> &str {
        self.segments[0].relation()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always `false`: tokenizing never yields an empty expression.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ":")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Split a full populate value on `,` and tokenize every piece.
///
/// The whole value is rejected on the first malformed piece.
pub fn split_expressions(value: &str) -> QueryResult<Vec<PathExpression>> {
    value.split(',').map(tokenize).collect()
}

/// Tokenize a single populate expression.
pub fn tokenize(expr: &str) -> QueryResult<PathExpression> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Err(QueryError::malformed(expr, "empty expression"));
    }

    let raw = match all_consuming(parse_raw_segments)(expr) {
        Ok((_, raw)) => raw,
        Err(e) => {
            return Err(QueryError::malformed(expr, format!("parse failed: {:?}", e)));
        }
    };

    let last = raw.len() - 1;
    let mut segments = Vec::with_capacity(raw.len());
    for (i, (name, field)) in raw.into_iter().enumerate() {
        let (name, field) = (name.trim(), field.map(str::trim));
        if name.is_empty() {
            return Err(QueryError::malformed(
                expr,
                format!("empty relation name at segment {}", i + 1),
            ));
        }
        if let Some(bad) = [Some(name), field]
            .into_iter()
            .flatten()
            .find(|s| s.contains(char::is_whitespace))
        {
            return Err(QueryError::malformed(
                expr,
                format!("whitespace inside name '{}'", bad),
            ));
        }
        let segment = match field {
            None => Segment::Relation(name.to_string()),
            Some("") => {
                return Err(QueryError::malformed(
                    expr,
                    format!("empty field name after '{}.'", name),
                ));
            }
            Some(field) if i < last => {
                return Err(QueryError::misplaced(expr, format!("{}.{}", name, field)));
            }
            Some(field) => Segment::Leaf {
                relation: name.to_string(),
                field: field.to_string(),
            },
        };
        segments.push(segment);
    }

    Ok(PathExpression {
        source: expr.to_string(),
        segments,
    })
}

/// Parse `segment (':' segment)*` without validating names.
fn parse_raw_segments(input: &str) -> IResult<&str, Vec<(&str, Option<&str>)>> {
    separated_list1(char(':'), parse_raw_segment)(input)
}

/// Parse `name ('.' field)?`. Either part may come back empty.
fn parse_raw_segment(input: &str) -> IResult<&str, (&str, Option<&str>)> {
    pair(
        take_while(|c: char| c != ':' && c != '.'),
        opt(preceded(char('.'), take_while(|c: char| c != ':'))),
    )(input)
}
