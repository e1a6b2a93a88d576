// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Intermediate op sequence produced by the parser.
//!
//! A [`Traversal`] is a source (`g`, optionally carrying a
//! `PartitionStrategy`, or an anonymous `__`) followed by an ordered list of
//! [`Step`]s. Arguments are literals, lists, predicates, symbols or nested
//! traversals; nothing in the tree refers back to the source text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string.
    String(String),
    /// Integer (Groovy `L` suffix accepted).
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// `true` / `false`.
    Bool(bool),
}

impl Literal {
    /// Borrow the string payload, if this is a string literal.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Literal::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer payload, if this is an integer literal.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Literal::Int(n) => Some(*n),
            _ => None,
        }
    }
}

/// A value that can address a logical partition.
///
/// Floats are excluded: they have no total equality and the backing store
/// refuses them as partition key values.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PartitionValue {
    /// Boolean key value.
    Bool(bool),
    /// Integer key value.
    Int(i64),
    /// String key value.
    String(String),
}

impl PartitionValue {
    /// Convert a literal into a partition value; floats yield `None`.
    pub fn from_literal(lit: &Literal) -> Option<Self> {
        match lit {
            Literal::String(s) => Some(Self::String(s.clone())),
            Literal::Int(n) => Some(Self::Int(*n)),
            Literal::Bool(b) => Some(Self::Bool(*b)),
            Literal::Float(_) => None,
        }
    }

    /// The literal form of this value (used when rewriting scoped queries).
    pub fn to_literal(&self) -> Literal {
        match self {
            Self::String(s) => Literal::String(s.clone()),
            Self::Int(n) => Literal::Int(*n),
            Self::Bool(b) => Literal::Bool(*b),
        }
    }
}

impl From<&str> for PartitionValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl fmt::Display for PartitionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Comparison operator inside a predicate such as `gt(40)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOp {
    /// `eq`
    Eq,
    /// `neq`
    Neq,
    /// `gt`
    Gt,
    /// `gte`
    Gte,
    /// `lt`
    Lt,
    /// `lte`
    Lte,
    /// `between(lo, hi)`
    Between,
    /// `within(...)`
    Within,
    /// `without(...)`
    Without,
}

impl PredicateOp {
    pub(crate) fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "between" => Self::Between,
            "within" => Self::Within,
            "without" => Self::Without,
            _ => return None,
        })
    }

    /// Canonical Gremlin name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Between => "between",
            Self::Within => "within",
            Self::Without => "without",
        }
    }
}

/// A predicate argument, e.g. `gt(40)` or `within('a','b')`.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Operator.
    pub op: PredicateOp,
    /// Operands in source order (lists are flattened).
    pub values: Vec<Literal>,
}

/// Enumeration constants that appear as bare arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// `incr` / `asc` / `Order.asc`
    Asc,
    /// `decr` / `desc` / `Order.desc`
    Desc,
    /// `shuffle`
    Shuffle,
    /// `T.id`
    Id,
    /// `T.label`
    Label,
}

impl Symbol {
    pub(crate) fn from_bare(name: &str) -> Option<Self> {
        Some(match name {
            "incr" | "asc" => Self::Asc,
            "decr" | "desc" => Self::Desc,
            "shuffle" => Self::Shuffle,
            _ => return None,
        })
    }

    pub(crate) fn from_qualified(class: &str, name: &str) -> Option<Self> {
        match (class, name) {
            ("Order", other) => Self::from_bare(other),
            ("T", "id") => Some(Self::Id),
            ("T", "label") => Some(Self::Label),
            _ => None,
        }
    }
}

/// One argument of a step.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Scalar literal.
    Literal(Literal),
    /// `[a, b, ...]`
    List(Vec<Literal>),
    /// `gt(40)`, `within(...)`, ...
    Predicate(Predicate),
    /// `decr`, `T.id`, ...
    Symbol(Symbol),
    /// Nested anonymous (`out()`) or spawned (`g.V(...)`) traversal.
    Traversal(Box<Traversal>),
}

impl Arg {
    /// Borrow the literal, if this argument is one.
    pub fn as_literal(&self) -> Option<&Literal> {
        match self {
            Arg::Literal(lit) => Some(lit),
            _ => None,
        }
    }

    /// Borrow the string literal payload, if this argument is one.
    pub fn as_str(&self) -> Option<&str> {
        self.as_literal().and_then(Literal::as_str)
    }
}

macro_rules! step_kinds {
    ($( $variant:ident => $name:literal ),+ $(,)?) => {
        /// Steps accepted by the compiler's fixed grammar.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StepKind {
            $(
                #[doc = concat!("`", $name, "()`")]
                $variant,
            )+
        }

        impl StepKind {
            /// Look up a step by its Gremlin name.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$variant), )+
                    _ => None,
                }
            }

            /// Canonical Gremlin name.
            pub fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => $name, )+
                }
            }
        }
    };
}

step_kinds! {
    V => "V",
    E => "E",
    AddV => "addV",
    AddE => "addE",
    Property => "property",
    Has => "has",
    HasLabel => "hasLabel",
    HasId => "hasId",
    HasNot => "hasNot",
    Where => "where",
    Is => "is",
    Values => "values",
    ValueMap => "valueMap",
    Id => "id",
    Label => "label",
    Order => "order",
    By => "by",
    Repeat => "repeat",
    Until => "until",
    Times => "times",
    Emit => "emit",
    Out => "out",
    In => "in",
    Both => "both",
    OutE => "outE",
    InE => "inE",
    BothE => "bothE",
    OutV => "outV",
    InV => "inV",
    BothV => "bothV",
    OtherV => "otherV",
    To => "to",
    From => "from",
    Drop => "drop",
    Count => "count",
    Path => "path",
    Limit => "limit",
    Range => "range",
    Dedup => "dedup",
    Fold => "fold",
    Unfold => "unfold",
    As => "as",
    Select => "select",
}

impl StepKind {
    /// Steps that create or remove graph elements.
    pub fn is_mutating(self) -> bool {
        matches!(self, Self::AddV | Self::AddE | Self::Drop)
    }

    /// Steps that only narrow the current traverser set without moving it.
    pub fn is_filter(self) -> bool {
        matches!(
            self,
            Self::Has
                | Self::HasLabel
                | Self::HasId
                | Self::HasNot
                | Self::Where
                | Self::Is
                | Self::Dedup
                | Self::As
        )
    }

    /// Steps that may only open a `g.` traversal.
    pub fn is_start(self) -> bool {
        matches!(self, Self::V | Self::E | Self::AddV | Self::AddE)
    }
}

/// One step with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// Which step.
    pub kind: StepKind,
    /// Arguments in source order.
    pub args: Vec<Arg>,
}

impl Step {
    /// Build a step.
    pub fn new(kind: StepKind, args: Vec<Arg>) -> Self {
        Self { kind, args }
    }
}

/// `PartitionStrategy.build()...create()` configuration attached to `g`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartitionStrategy {
    /// `partitionKey('...')`
    pub partition_key: Option<String>,
    /// `readPartitions(...)`
    pub read_partitions: Vec<Literal>,
    /// `writePartition('...')`
    pub write_partition: Option<Literal>,
}

/// Where a traversal starts.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    /// `g`, optionally `g.withStrategies(PartitionStrategy...)`.
    Graph {
        /// Attached partition strategy, if any.
        strategy: Option<PartitionStrategy>,
    },
    /// `__` or a bare step chain used as an argument.
    Anonymous,
}

/// A parsed traversal.
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    /// Traversal source.
    pub source: Source,
    /// Ordered steps.
    pub steps: Vec<Step>,
}

impl Traversal {
    /// Partition strategy attached to the source, if any.
    pub fn strategy(&self) -> Option<&PartitionStrategy> {
        match &self.source {
            Source::Graph { strategy } => strategy.as_ref(),
            Source::Anonymous => None,
        }
    }

    /// Whether any top-level step creates or removes elements.
    pub fn is_mutating(&self) -> bool {
        self.steps.iter().any(|s| s.kind.is_mutating())
    }

    /// Return a copy whose leading `V(..)` or `E(..)` is followed by
    /// `has(key, value)`.
    ///
    /// Only the start set is narrowed; steps after it still reach every
    /// partition. `None` when the traversal does not open with `V` or `E`.
    pub fn with_start_filter(&self, key: &str, value: Literal) -> Option<Self> {
        let first = self.steps.first()?;
        if !matches!(first.kind, StepKind::V | StepKind::E) {
            return None;
        }
        let mut steps = self.steps.clone();
        steps.insert(
            1,
            Step::new(
                StepKind::Has,
                vec![Arg::Literal(Literal::String(key.to_string())), Arg::Literal(value)],
            ),
        );
        Some(Self {
            source: self.source.clone(),
            steps,
        })
    }

    /// Return a copy whose trailing `range(lo, hi)` is opened to `range(0, hi)`.
    ///
    /// Each partition then returns its first `hi` records so a merge can drop
    /// the first `lo` across all of them. Anything else is copied unchanged.
    pub fn with_range_from_zero(&self) -> Self {
        let mut steps = self.steps.clone();
        if let Some(last) = steps.last_mut().filter(|s| s.kind == StepKind::Range) {
            if let [lo @ Arg::Literal(Literal::Int(_)), Arg::Literal(Literal::Int(_))] =
                last.args.as_mut_slice()
            {
                *lo = Arg::Literal(Literal::Int(0));
            }
        }
        Self {
            source: self.source.clone(),
            steps,
        }
    }

    /// Return a copy whose source carries `strategy`.
    pub fn with_strategy(&self, strategy: PartitionStrategy) -> Self {
        Self {
            source: Source::Graph {
                strategy: Some(strategy),
            },
            steps: self.steps.clone(),
        }
    }
}
