//! Boolean AND/OR trees used to render WHERE and HAVING clauses

use std::fmt;

/// How the parts of an expression are joined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
}

impl fmt::Display for Connective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Connective::And => write!(f, "AND"),
            Connective::Or => write!(f, "OR"),
        }
    }
}

/// One operand of an expression
#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Raw SQL fragment
    Fragment(String),
    /// Parenthesized sub-tree
    Group(Expression),
}

impl Part {
    fn is_empty(&self) -> bool {
        match self {
            Part::Fragment(s) => s.is_empty(),
            Part::Group(e) => e.is_empty(),
        }
    }
}

impl From<&str> for Part {
    fn from(s: &str) -> Self {
        Part::Fragment(s.to_string())
    }
}

impl From<String> for Part {
    fn from(s: String) -> Self {
        Part::Fragment(s)
    }
}

impl From<Expression> for Part {
    fn from(e: Expression) -> Self {
        Part::Group(e)
    }
}

impl fmt::Display for Part {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Part::Fragment(s) => f.write_str(s),
            Part::Group(e) => e.fmt(f),
        }
    }
}

/// An ordered list of parts joined by one connective.
///
/// Empty fragments and empty sub-trees are never stored. A single part renders
/// verbatim, several parts render as `(p1) AND (p2) AND (p3)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    connective: Connective,
    parts: Vec<Part>,
}

impl Expression {
    pub fn new(connective: Connective) -> Self {
        Self {
            connective,
            parts: Vec::new(),
        }
    }

    pub fn and<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        let mut expr = Self::new(Connective::And);
        expr.add_many(parts);
        expr
    }

    pub fn or<I, P>(parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        let mut expr = Self::new(Connective::Or);
        expr.add_many(parts);
        expr
    }

    /// Append a part, ignoring empty ones
    pub fn add(&mut self, part: impl Into<Part>) -> &mut Self {
        let part = part.into();
        if !part.is_empty() {
            self.parts.push(part);
        }
        self
    }

    pub fn add_many<I, P>(&mut self, parts: I) -> &mut Self
    where
        I: IntoIterator<Item = P>,
        P: Into<Part>,
    {
        for part in parts {
            self.add(part);
        }
        self
    }

    pub fn connective(&self) -> Connective {
        self.connective
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.parts.len() == 1 {
            return self.parts[0].fmt(f);
        }

        f.write_str("(")?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ") {} (", self.connective)?;
            }
            part.fmt(f)?;
        }
        f.write_str(")")
    }
}
