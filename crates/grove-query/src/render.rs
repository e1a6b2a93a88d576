// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Canonical Gremlin text for a parsed traversal.
//!
//! Rendering a parsed query and parsing the result yields the same tree, so
//! the router can rewrite a traversal (e.g. attach a `PartitionStrategy`)
//! and ship the rendered text.

use crate::ast::{Arg, Literal, PartitionStrategy, Predicate, Source, Step, StepKind, Symbol, Traversal};
use std::fmt::{self, Write};

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                f.write_char('\'')?;
                for ch in s.chars() {
                    match ch {
                        '\'' => f.write_str("\\'")?,
                        '\\' => f.write_str("\\\\")?,
                        '\n' => f.write_str("\\n")?,
                        '\t' => f.write_str("\\t")?,
                        '\r' => f.write_str("\\r")?,
                        other => f.write_char(other)?,
                    }
                }
                f.write_char('\'')
            }
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(n) if n.fract() == 0.0 && n.is_finite() => write!(f, "{n:.1}"),
            Literal::Float(n) => write!(f, "{n}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Literal]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.op.name())?;
        write_list(f, &self.values)?;
        f.write_char(')')
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Symbol::Asc => "incr",
            Symbol::Desc => "decr",
            Symbol::Shuffle => "shuffle",
            Symbol::Id => "T.id",
            Symbol::Label => "T.label",
        })
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Literal(lit) => write!(f, "{lit}"),
            Arg::List(items) => {
                f.write_char('[')?;
                write_list(f, items)?;
                f.write_char(']')
            }
            Arg::Predicate(p) => write!(f, "{p}"),
            Arg::Symbol(s) => write!(f, "{s}"),
            Arg::Traversal(t) => write!(f, "{t}"),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.kind.name())?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_char(')')
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PartitionStrategy.build()")?;
        if let Some(key) = &self.partition_key {
            write!(f, ".partitionKey({})", Literal::String(key.clone()))?;
        }
        if let Some(write) = &self.write_partition {
            write!(f, ".writePartition({write})")?;
        }
        if !self.read_partitions.is_empty() {
            f.write_str(".readPartitions(")?;
            write_list(f, &self.read_partitions)?;
            f.write_char(')')?;
        }
        f.write_str(".create()")
    }
}

impl fmt::Display for Traversal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Source::Graph { strategy } => {
                f.write_char('g')?;
                if let Some(strategy) = strategy {
                    write!(f, ".withStrategies({strategy})")?;
                }
                f.write_char('.')?;
            }
            // `in` is a Groovy keyword; anonymous traversals starting with it need `__.`
            Source::Anonymous
                if self.steps.first().is_some_and(|s| s.kind == StepKind::In) =>
            {
                f.write_str("__.")?;
            }
            Source::Anonymous => {}
        }
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_char('.')?;
            }
            write!(f, "{step}")?;
        }
        Ok(())
    }
}
