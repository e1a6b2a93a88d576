// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recursive-descent parser over the token stream.
//!
//! Grammar (informal):
//!
//! ```text
//! query     := source '.' chain EOF
//! source    := 'g' ( '.' 'withStrategies' '(' strategy ')' )?
//! chain     := step ( '.' step )*
//! step      := IDENT '(' ( arg ( ',' arg )* )? ')'
//! arg       := literal | '[' literals ']' | predicate | symbol
//!            | source '.' chain | '__' '.' chain | chain
//! strategy  := 'PartitionStrategy' '.' 'build' '(' ')' ( '.' IDENT '(' literals ')' )* '.' 'create' '(' ')'
//! ```

use crate::ast::{
    Arg, Literal, PartitionStrategy, Predicate, PredicateOp, Source, Step, StepKind, Symbol,
    Traversal,
};
use crate::error::CompileError;
use crate::lexer::{tokenize, Spanned, Tok};

/// Deepest nesting of step arguments and list brackets.
const MAX_NESTING: usize = 64;

/// Parse Gremlin source text into a [`Traversal`] without any partition checks.
pub fn parse(text: &str) -> Result<Traversal, CompileError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let traversal = parser.graph_traversal()?;
    parser.expect(&Tok::Eof, "end of query")?;
    Ok(traversal)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        self.peek_at(0)
    }

    fn peek_at(&self, n: usize) -> &Tok {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].tok
    }

    fn offset(&self) -> usize {
        let idx = self.pos.min(self.tokens.len() - 1);
        self.tokens[idx].offset
    }

    fn bump(&mut self) -> Tok {
        let idx = self.pos.min(self.tokens.len() - 1);
        let tok = self.tokens[idx].tok.clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn error(&self, expected: &'static str) -> CompileError {
        CompileError::Expected {
            expected,
            found: self.peek().describe(),
            offset: self.offset(),
        }
    }

    /// Run `inner` one level deeper, failing once [`MAX_NESTING`] is reached.
    fn nested<T>(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<T, CompileError>,
    ) -> Result<T, CompileError> {
        if self.depth >= MAX_NESTING {
            return Err(CompileError::NestingTooDeep {
                limit: MAX_NESTING,
                offset: self.offset(),
            });
        }
        self.depth += 1;
        let out = inner(self);
        self.depth -= 1;
        out
    }

    fn expect(&mut self, tok: &Tok, expected: &'static str) -> Result<(), CompileError> {
        if self.peek() == tok {
            self.bump();
            Ok(())
        } else {
            Err(self.error(expected))
        }
    }

    fn expect_ident(&mut self, name: &str, expected: &'static str) -> Result<(), CompileError> {
        match self.peek() {
            Tok::Ident(found) if found == name => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(expected)),
        }
    }

    fn ident(&mut self, expected: &'static str) -> Result<(String, usize), CompileError> {
        let offset = self.offset();
        match self.peek() {
            Tok::Ident(name) => {
                let name = name.clone();
                self.bump();
                Ok((name, offset))
            }
            _ => Err(self.error(expected)),
        }
    }

    /// `g[.withStrategies(...)].start(...)...`
    fn graph_traversal(&mut self) -> Result<Traversal, CompileError> {
        self.expect_ident("g", "traversal source `g`")?;
        let mut strategy = None;
        if self.peek() == &Tok::Dot
            && matches!(self.peek_at(1), Tok::Ident(name) if name == "withStrategies")
        {
            self.bump();
            self.bump();
            self.expect(&Tok::LParen, "`(` after withStrategies")?;
            strategy = Some(self.partition_strategy()?);
            self.expect(&Tok::RParen, "`)` closing withStrategies")?;
        }
        self.expect(&Tok::Dot, "`.` after traversal source")?;
        let start_offset = self.offset();
        let steps = self.chain()?;
        match steps.first() {
            Some(first) if first.kind.is_start() => {}
            _ => {
                return Err(CompileError::Expected {
                    expected: "start step (V, E, addV or addE)",
                    found: steps
                        .first()
                        .map_or_else(|| "nothing".into(), |s| format!("`{}`", s.kind.name())),
                    offset: start_offset,
                })
            }
        }
        Ok(Traversal {
            source: Source::Graph { strategy },
            steps,
        })
    }

    fn partition_strategy(&mut self) -> Result<PartitionStrategy, CompileError> {
        self.expect_ident("PartitionStrategy", "`PartitionStrategy`")?;
        self.expect(&Tok::Dot, "`.build()`")?;
        self.expect_ident("build", "`.build()`")?;
        self.expect(&Tok::LParen, "`(`")?;
        self.expect(&Tok::RParen, "`)`")?;

        let mut strategy = PartitionStrategy::default();
        loop {
            self.expect(&Tok::Dot, "`.create()` ending the strategy")?;
            let (name, _) = self.ident("strategy option")?;
            self.expect(&Tok::LParen, "`(`")?;
            let values = self.literal_list(&Tok::RParen)?;
            self.expect(&Tok::RParen, "`)`")?;
            match name.as_str() {
                "create" => {
                    if !values.is_empty() {
                        return Err(strategy_error("create() takes no arguments"));
                    }
                    return Ok(strategy);
                }
                "partitionKey" => match values.as_slice() {
                    [Literal::String(key)] => strategy.partition_key = Some(key.clone()),
                    _ => return Err(strategy_error("partitionKey expects one string")),
                },
                "readPartitions" => {
                    if values.is_empty() {
                        return Err(strategy_error("readPartitions expects at least one value"));
                    }
                    strategy.read_partitions.extend(values);
                }
                "writePartition" => match values.as_slice() {
                    [value] => strategy.write_partition = Some(value.clone()),
                    _ => return Err(strategy_error("writePartition expects one value")),
                },
                _ => return Err(strategy_error(&format!("unsupported option `{name}`"))),
            }
        }
    }

    /// Comma separated literals (lists are flattened) up to `close`.
    fn literal_list(&mut self, close: &Tok) -> Result<Vec<Literal>, CompileError> {
        let mut out = Vec::new();
        if self.peek() == close {
            return Ok(out);
        }
        loop {
            if self.peek() == &Tok::LBracket {
                self.bump();
                out.extend(self.nested(|p| p.literal_list(&Tok::RBracket))?);
                self.expect(&Tok::RBracket, "`]`")?;
            } else {
                out.push(self.literal()?);
            }
            if self.peek() == &Tok::Comma {
                self.bump();
            } else {
                return Ok(out);
            }
        }
    }

    fn literal(&mut self) -> Result<Literal, CompileError> {
        let lit = match self.peek() {
            Tok::Str(s) => Literal::String(s.clone()),
            Tok::Int(n) => Literal::Int(*n),
            Tok::Float(n) => Literal::Float(*n),
            Tok::Ident(name) if name == "true" => Literal::Bool(true),
            Tok::Ident(name) if name == "false" => Literal::Bool(false),
            _ => return Err(self.error("literal")),
        };
        self.bump();
        Ok(lit)
    }

    fn chain(&mut self) -> Result<Vec<Step>, CompileError> {
        let mut steps = vec![self.step()?];
        while self.peek() == &Tok::Dot {
            self.bump();
            steps.push(self.step()?);
        }
        Ok(steps)
    }

    fn step(&mut self) -> Result<Step, CompileError> {
        let (name, offset) = self.ident("step name")?;
        let kind = StepKind::from_name(&name).ok_or(CompileError::UnknownStep { name, offset })?;
        self.expect(&Tok::LParen, "`(` after step name")?;
        let mut args = Vec::new();
        if self.peek() != &Tok::RParen {
            loop {
                args.push(self.nested(Self::arg)?);
                if self.peek() == &Tok::Comma {
                    self.bump();
                } else {
                    break;
                }
            }
        }
        self.expect(&Tok::RParen, "`)` closing step arguments")?;
        let step = Step::new(kind, args);
        check_arity(&step)?;
        Ok(step)
    }

    fn arg(&mut self) -> Result<Arg, CompileError> {
        match self.peek().clone() {
            Tok::Str(_) | Tok::Int(_) | Tok::Float(_) => Ok(Arg::Literal(self.literal()?)),
            Tok::LBracket => {
                self.bump();
                let items = self.literal_list(&Tok::RBracket)?;
                self.expect(&Tok::RBracket, "`]`")?;
                Ok(Arg::List(items))
            }
            Tok::Ident(name) => self.ident_arg(&name),
            _ => Err(self.error("step argument")),
        }
    }

    fn ident_arg(&mut self, name: &str) -> Result<Arg, CompileError> {
        let next = self.peek_at(1).clone();
        match (name, &next) {
            ("true" | "false", _) => Ok(Arg::Literal(self.literal()?)),
            ("g", Tok::Dot) => Ok(Arg::Traversal(Box::new(self.graph_traversal()?))),
            ("__", Tok::Dot) => {
                self.bump();
                self.bump();
                let steps = self.chain()?;
                Ok(Arg::Traversal(Box::new(Traversal {
                    source: Source::Anonymous,
                    steps,
                })))
            }
            (_, Tok::Dot) => {
                // Qualified symbol: Order.desc, T.id
                let offset = self.offset();
                self.bump();
                self.bump();
                let (member, _) = self.ident("enum member")?;
                Symbol::from_qualified(name, &member)
                    .map(Arg::Symbol)
                    .ok_or(CompileError::Expected {
                        expected: "Order.* or T.* constant",
                        found: format!("`{name}.{member}`"),
                        offset,
                    })
            }
            (_, Tok::LParen) => {
                if let Some(op) = PredicateOp::from_name(name) {
                    self.bump();
                    self.bump();
                    let values = self.literal_list(&Tok::RParen)?;
                    self.expect(&Tok::RParen, "`)` closing predicate")?;
                    check_predicate(op, &values)?;
                    return Ok(Arg::Predicate(Predicate { op, values }));
                }
                let steps = self.chain()?;
                Ok(Arg::Traversal(Box::new(Traversal {
                    source: Source::Anonymous,
                    steps,
                })))
            }
            _ => {
                let offset = self.offset();
                self.bump();
                Symbol::from_bare(name)
                    .map(Arg::Symbol)
                    .ok_or(CompileError::Expected {
                        expected: "step argument",
                        found: format!("identifier `{name}`"),
                        offset,
                    })
            }
        }
    }
}

fn strategy_error(reason: &str) -> CompileError {
    CompileError::InvalidArguments {
        step: "withStrategies",
        reason: reason.to_string(),
    }
}

fn invalid(step: &Step, reason: &str) -> CompileError {
    CompileError::InvalidArguments {
        step: step.kind.name(),
        reason: reason.to_string(),
    }
}

fn check_predicate(op: PredicateOp, values: &[Literal]) -> Result<(), CompileError> {
    let ok = match op {
        PredicateOp::Within | PredicateOp::Without => !values.is_empty(),
        PredicateOp::Between => values.len() == 2,
        _ => values.len() == 1,
    };
    if ok {
        Ok(())
    } else {
        Err(CompileError::InvalidArguments {
            step: op.name(),
            reason: format!("unexpected operand count {}", values.len()),
        })
    }
}

fn is_string(arg: &Arg) -> bool {
    arg.as_str().is_some()
}

fn is_traversal(arg: &Arg) -> bool {
    matches!(arg, Arg::Traversal(_))
}

fn is_int(arg: &Arg) -> bool {
    matches!(arg, Arg::Literal(Literal::Int(n)) if *n >= 0)
}

fn check_arity(step: &Step) -> Result<(), CompileError> {
    use StepKind as K;
    let args = step.args.as_slice();
    let all = |pred: fn(&Arg) -> bool| args.iter().all(pred);
    match step.kind {
        K::V | K::E | K::HasId => {
            if all(|a| matches!(a, Arg::Literal(_) | Arg::List(_))) {
                Ok(())
            } else {
                Err(invalid(step, "expects element ids"))
            }
        }
        K::AddV | K::AddE => match args {
            [] => Ok(()),
            [a] if is_string(a) => Ok(()),
            _ => Err(invalid(step, "expects a single label")),
        },
        K::Property => match args {
            [Arg::Literal(Literal::String(_)) | Arg::Symbol(Symbol::Id | Symbol::Label), Arg::Literal(_)] => {
                Ok(())
            }
            _ => Err(invalid(step, "expects a key and a literal value")),
        },
        K::Has => match args {
            [k] if is_string(k) => Ok(()),
            [k, v] if is_string(k) || matches!(k, Arg::Symbol(Symbol::Id | Symbol::Label)) => {
                if matches!(v, Arg::Literal(_) | Arg::Predicate(_) | Arg::Traversal(_)) {
                    Ok(())
                } else {
                    Err(invalid(step, "expects a value, predicate or traversal"))
                }
            }
            [l, k, v] if is_string(l) && is_string(k) => {
                if matches!(v, Arg::Literal(_) | Arg::Predicate(_)) {
                    Ok(())
                } else {
                    Err(invalid(step, "expects a value or predicate"))
                }
            }
            _ => Err(invalid(step, "expects (key), (key, value) or (label, key, value)")),
        },
        K::HasLabel => {
            if !args.is_empty() && all(|a| is_string(a) || matches!(a, Arg::Predicate(_))) {
                Ok(())
            } else {
                Err(invalid(step, "expects one or more labels"))
            }
        }
        K::HasNot => match args {
            [k] if is_string(k) => Ok(()),
            _ => Err(invalid(step, "expects a property key")),
        },
        K::Values | K::Out | K::In | K::Both | K::OutE | K::InE | K::BothE | K::Select => {
            if all(is_string) {
                Ok(())
            } else {
                Err(invalid(step, "expects string keys or labels"))
            }
        }
        K::ValueMap => {
            if all(|a| is_string(a) || matches!(a, Arg::Literal(Literal::Bool(_)))) {
                Ok(())
            } else {
                Err(invalid(step, "expects property keys"))
            }
        }
        K::Where | K::Is | K::Until => match args {
            [a] if is_traversal(a) || matches!(a, Arg::Predicate(_) | Arg::Literal(_)) => Ok(()),
            _ => Err(invalid(step, "expects a traversal or predicate")),
        },
        K::Repeat => match args {
            [a] if is_traversal(a) => Ok(()),
            _ => Err(invalid(step, "expects a traversal")),
        },
        K::Emit => match args {
            [] => Ok(()),
            [a] if is_traversal(a) => Ok(()),
            _ => Err(invalid(step, "expects an optional traversal")),
        },
        K::To | K::From => match args {
            [a] if is_traversal(a) || is_string(a) => Ok(()),
            _ => Err(invalid(step, "expects a vertex traversal or step label")),
        },
        K::By => match args {
            [] => Ok(()),
            [a] if is_string(a) || is_traversal(a) || matches!(a, Arg::Symbol(_)) => Ok(()),
            [a, Arg::Symbol(Symbol::Asc | Symbol::Desc | Symbol::Shuffle)]
                if is_string(a) || is_traversal(a) || matches!(a, Arg::Symbol(Symbol::Id | Symbol::Label)) =>
            {
                Ok(())
            }
            _ => Err(invalid(step, "expects an optional key and order")),
        },
        K::Times | K::Limit => match args {
            [a] if is_int(a) => Ok(()),
            _ => Err(invalid(step, "expects a non-negative integer")),
        },
        K::Range => match args {
            [lo, hi] if is_int(lo) && matches!(hi, Arg::Literal(Literal::Int(_))) => Ok(()),
            _ => Err(invalid(step, "expects (low, high) integers")),
        },
        K::As => match args {
            [a] if is_string(a) => Ok(()),
            _ => Err(invalid(step, "expects a step label")),
        },
        K::Order | K::Id | K::Label | K::OutV | K::InV | K::BothV | K::OtherV | K::Drop
        | K::Count | K::Path | K::Dedup | K::Fold | K::Unfold => {
            if args.is_empty() {
                Ok(())
            } else {
                Err(invalid(step, "takes no arguments"))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_filter_chain() {
        let t = parse("g.V().hasLabel('person').has('age', gt(40))").unwrap();
        assert_eq!(t.steps.len(), 3);
        assert_eq!(t.steps[0].kind, StepKind::V);
        assert_eq!(t.steps[2].kind, StepKind::Has);
        assert_eq!(
            t.steps[2].args[1],
            Arg::Predicate(Predicate {
                op: PredicateOp::Gt,
                values: vec![Literal::Int(40)],
            })
        );
    }

    #[test]
    fn parses_partition_strategy_source() {
        let t = parse(
            "g.withStrategies(PartitionStrategy.build().partitionKey('firstName').readPartitions('Thomas').create()).V('thomas')",
        )
        .unwrap();
        let strategy = t.strategy().unwrap();
        assert_eq!(strategy.partition_key.as_deref(), Some("firstName"));
        assert_eq!(
            strategy.read_partitions,
            vec![Literal::String("Thomas".into())]
        );
    }

    #[test]
    fn parses_nested_anonymous_and_spawned_traversals() {
        let t = parse("g.V(['Thomas','thomas']).addE('knows').to(g.V(['Mary','mary']))").unwrap();
        assert_eq!(
            t.steps[0].args,
            vec![Arg::List(vec![
                Literal::String("Thomas".into()),
                Literal::String("thomas".into())
            ])]
        );
        match &t.steps[2].args[0] {
            Arg::Traversal(inner) => {
                assert!(matches!(inner.source, Source::Graph { .. }));
                assert_eq!(inner.steps[0].kind, StepKind::V);
            }
            other => panic!("expected traversal, got {other:?}"),
        }

        let loop_query =
            parse("g.V('thomas').repeat(out()).until(has('id', 'robin')).path()").unwrap();
        assert!(matches!(&loop_query.steps[1].args[0], Arg::Traversal(t) if t.source == Source::Anonymous));
    }

    #[test]
    fn parses_order_symbols() {
        let t = parse("g.V().order().by('firstName', decr)").unwrap();
        assert_eq!(t.steps[2].args[1], Arg::Symbol(Symbol::Desc));
        let t = parse("g.V().order().by('firstName', Order.asc)").unwrap();
        assert_eq!(t.steps[2].args[1], Arg::Symbol(Symbol::Asc));
    }

    #[test]
    fn rejects_unknown_step() {
        let err = parse("g.V().frobnicate()").unwrap_err();
        assert_eq!(
            err,
            CompileError::UnknownStep {
                name: "frobnicate".into(),
                offset: 6
            }
        );
    }

    #[test]
    fn rejects_traversal_not_starting_at_g() {
        assert!(matches!(
            parse("h.V()").unwrap_err(),
            CompileError::Expected { offset: 0, .. }
        ));
        assert!(matches!(
            parse("g.out()").unwrap_err(),
            CompileError::Expected { offset: 2, .. }
        ));
    }

    #[test]
    fn rejects_bad_arity() {
        assert!(matches!(
            parse("g.V().count(3)").unwrap_err(),
            CompileError::InvalidArguments { step: "count", .. }
        ));
        assert!(matches!(
            parse("g.addV('person').property('id')").unwrap_err(),
            CompileError::InvalidArguments {
                step: "property",
                ..
            }
        ));
    }

    #[test]
    fn rejects_trailing_garbage() {
        assert!(matches!(
            parse("g.V() g.V()").unwrap_err(),
            CompileError::Expected {
                expected: "end of query",
                ..
            }
        ));
    }

    #[test]
    fn rejects_runaway_nesting() {
        let lists = format!("g.V({}'x'{})", "[".repeat(10_000), "]".repeat(10_000));
        assert!(matches!(
            parse(&lists).unwrap_err(),
            CompileError::NestingTooDeep { limit: MAX_NESTING, .. }
        ));

        let traversals = format!("g.V(){}", ".where(__.out('knows')".repeat(500) + &")".repeat(500));
        assert!(matches!(
            parse(&traversals).unwrap_err(),
            CompileError::NestingTooDeep { .. }
        ));

        let shallow = format!("g.V(){}", ".where(__.out('knows')".repeat(8) + &")".repeat(8));
        assert!(parse(&shallow).is_ok());
    }
}
