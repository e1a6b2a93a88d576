// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Compile-time errors. None of these ever reach the network.

use thiserror::Error;

/// Error returned by [`crate::compile`] and [`crate::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A character the lexer does not recognise.
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar {
        /// Offending character.
        found: char,
        /// Byte offset into the source text.
        offset: usize,
    },
    /// A string literal without its closing quote.
    #[error("unterminated string literal starting at offset {offset}")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        offset: usize,
    },
    /// A numeric literal that does not fit the supported types.
    #[error("invalid number literal {text:?} at offset {offset}")]
    InvalidNumber {
        /// Literal as written.
        text: String,
        /// Byte offset into the source text.
        offset: usize,
    },
    /// The parser expected a different token.
    #[error("expected {expected} at offset {offset}, found {found}")]
    Expected {
        /// Human readable description of what was expected.
        expected: &'static str,
        /// Description of the token actually found.
        found: String,
        /// Byte offset into the source text.
        offset: usize,
    },
    /// Lists or nested traversals deeper than the parser accepts.
    #[error("nesting deeper than {limit} levels at offset {offset}")]
    NestingTooDeep {
        /// Deepest nesting accepted.
        limit: usize,
        /// Byte offset where the limit was exceeded.
        offset: usize,
    },
    /// A step name outside the supported grammar.
    #[error("unknown step `{name}` at offset {offset}")]
    UnknownStep {
        /// Step name as written.
        name: String,
        /// Byte offset into the source text.
        offset: usize,
    },
    /// A known step called with arguments it does not accept.
    #[error("invalid arguments for `{step}`: {reason}")]
    InvalidArguments {
        /// Canonical step name.
        step: &'static str,
        /// What is wrong with the arguments.
        reason: String,
    },
    /// A mutating query on a partitioned collection carries no partition key value.
    #[error("mutating query on a collection partitioned by `{key}` does not carry a `{key}` value")]
    MissingPartitionKey {
        /// Partition key property name.
        key: String,
    },
    /// A `PartitionStrategy` names a different key than the collection uses.
    #[error("partition strategy targets `{found}` but the collection is partitioned by `{expected}`")]
    PartitionKeyMismatch {
        /// Key configured for the collection.
        expected: String,
        /// Key named by the strategy.
        found: String,
    },
    /// A partition key value that cannot address a partition (e.g. a float).
    #[error("partition key `{key}` must be assigned a string, integer or boolean")]
    InvalidPartitionValue {
        /// Partition key property name.
        key: String,
    },
}
