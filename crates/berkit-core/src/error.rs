//! Error types for the berkit-core library.
//!
//! Every fallible operation returns [`Result`]. The variants form a closed
//! taxonomy: format errors raised while reading octets, capacity errors
//! raised while writing them, navigation errors raised by the tree cursor,
//! grammar errors raised by the interpreter, and the search outcome
//! [`Error::MatchNotFound`], which callers routinely expect and recover from.
//!
//! Trailing garbage after a successful decode is not an error at all; see
//! [`crate::tree::Trailing`].

use thiserror::Error;

/// Result type alias for berkit operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all berkit operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Malformed identifier or length octets
    #[error("invalid element header at offset {offset}: {details}")]
    InvalidHeader {
        /// Byte offset of the element whose header is malformed
        offset: usize,
        /// Detailed description of the issue
        details: String,
    },

    /// Content octets that violate the rules of their type
    #[error("invalid {kind} content: {details}")]
    InvalidContent {
        /// ASN.1 type name whose content failed to decode
        kind: &'static str,
        /// Detailed description of the issue
        details: String,
    },

    /// An element claims more bytes than the source holds
    #[error("buffer overflow at offset {offset}: element needs {needed} bytes, {available} available")]
    BufferOverflow {
        /// Byte offset of the offending element
        offset: usize,
        /// Bytes claimed by the header plus content
        needed: usize,
        /// Bytes actually remaining in the source
        available: usize,
    },

    /// Nesting deeper than the configured decoder limit
    #[error("nesting depth {depth} exceeds limit of {max}")]
    DepthExceeded {
        /// Depth reached
        depth: usize,
        /// Configured maximum
        max: usize,
    },

    /// Destination buffer cannot hold the encoding
    #[error("buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall {
        /// Bytes required
        needed: usize,
        /// Bytes offered by the caller
        available: usize,
    },

    /// Cursor cannot descend: the node has no children
    #[error("node has no child")]
    NoChild,

    /// Cursor cannot ascend: the node is a root
    #[error("node has no parent")]
    NoParent,

    /// Attempted to attach children to a primitive node
    #[error("node is primitive and cannot hold children")]
    NotConstructed,

    /// Attempted to splice a node that is still linked elsewhere
    #[error("node is already linked into a tree")]
    NodeAttached,

    /// Grammar names a type the registry does not know
    #[error("unknown grammar command '{name}'")]
    UnknownCommand {
        /// The unrecognized name
        name: String,
    },

    /// Grammar opened a parenthesis it never closed
    #[error("missing closing parenthesis for group opened at offset {offset}")]
    MissingParenthesis {
        /// Offset of the unmatched `(`
        offset: usize,
    },

    /// Grammar text ended where a command was expected
    #[error("grammar truncated at offset {offset}: {details}")]
    TruncatedGrammar {
        /// Offset where parsing stopped
        offset: usize,
        /// What was expected
        details: String,
    },

    /// Options block contains an unknown letter or inconsistent flags
    #[error("invalid options '{options}': {details}")]
    InvalidOptions {
        /// The raw options text
        options: String,
        /// Detailed description of the issue
        details: String,
    },

    /// Node under the cursor does not have the shape the grammar requires
    #[error("type mismatch: grammar expects {expected}, found {found}")]
    TypeMismatch {
        /// What the grammar asked for
        expected: String,
        /// What the tree holds
        found: String,
    },

    /// Build argument has the wrong variant for its grammar leaf
    #[error("argument {index} for '{command}' has the wrong type: expected {expected}")]
    ArgumentMismatch {
        /// Position of the argument in the slot list
        index: usize,
        /// Grammar command consuming the argument
        command: &'static str,
        /// Variant that was expected
        expected: &'static str,
    },

    /// Build ran out of arguments
    #[error("missing argument {index} for '{command}'")]
    MissingArgument {
        /// Position of the missing argument
        index: usize,
        /// Grammar command that needed it
        command: &'static str,
    },

    /// Build finished with arguments left over
    #[error("{count} unused argument(s) after building")]
    UnusedArguments {
        /// Number of unconsumed arguments
        count: usize,
    },

    /// Indefinite length requested for a primitive type
    #[error("indefinite length is not allowed for primitive type '{command}'")]
    IndefinitePrimitive {
        /// The primitive grammar command
        command: &'static str,
    },

    /// Pseudo-type that only makes sense when reading was used to build
    #[error("'{command}' cannot be used when building")]
    NotBuildable {
        /// The offending pseudo-type
        command: &'static str,
    },

    /// An optional block matched some but not all of its fields
    #[error("optional block matched partially: field {field} missing")]
    PartialOptional {
        /// Zero-based index of the first missing field inside the block
        field: usize,
    },

    /// More than one choice alternative fits the same node
    #[error("choice is ambiguous: {count} alternatives match")]
    ChoiceTooManyMatches {
        /// Number of fitting alternatives
        count: usize,
    },

    /// No node fits the grammar; an expected, recoverable outcome
    #[error("no matching element found")]
    MatchNotFound,
}

impl Error {
    /// Creates a new header error
    pub fn invalid_header(offset: usize, details: impl Into<String>) -> Self {
        Self::InvalidHeader {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new content error
    pub fn invalid_content(kind: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidContent {
            kind,
            details: details.into(),
        }
    }

    /// Creates a new buffer-too-small error
    pub fn buffer_too_small(needed: usize, available: usize) -> Self {
        Self::BufferTooSmall { needed, available }
    }

    /// Creates a new unknown-command error
    pub fn unknown_command(name: impl Into<String>) -> Self {
        Self::UnknownCommand { name: name.into() }
    }

    /// Creates a new truncated-grammar error
    pub fn truncated(offset: usize, details: impl Into<String>) -> Self {
        Self::TruncatedGrammar {
            offset,
            details: details.into(),
        }
    }

    /// Creates a new options error
    pub fn invalid_options(options: impl Into<String>, details: impl Into<String>) -> Self {
        Self::InvalidOptions {
            options: options.into(),
            details: details.into(),
        }
    }

    /// Creates a new type mismatch error
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Returns true for the expected "nothing matched" outcome
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::MatchNotFound)
    }

    /// Returns true if the octets themselves are malformed
    pub fn is_format(&self) -> bool {
        matches!(
            self,
            Self::InvalidHeader { .. }
                | Self::InvalidContent { .. }
                | Self::BufferOverflow { .. }
                | Self::DepthExceeded { .. }
        )
    }
}
