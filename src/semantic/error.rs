//! Semantic analysis error and warning types.
//!
//! These represent problems found during symbol resolution, type checking,
//! and control-flow validation. Analysis never stops at the first problem;
//! errors accumulate so one run reports everything it can find. Each record
//! carries a source location for diagnostics.

use crate::ast::SourceLocation;
use thiserror::Error;

/// A semantic analysis error with location and description.
#[derive(Debug, Error, Clone)]
pub enum SemanticError {
    // === Declaration conflicts ===
    /// The same line number appears twice.
    #[error("duplicate line number: {line}")]
    DuplicateLineNumber { line: u32, location: SourceLocation },

    /// A `:label` defined more than once.
    #[error("label :{name} already defined")]
    DuplicateLabel {
        name: String,
        location: SourceLocation,
    },

    /// An array DIMmed more than once.
    #[error("array '{name}' already declared")]
    ArrayRedeclared {
        name: String,
        location: SourceLocation,
    },

    /// A function or sub name declared more than once (across DEF FN,
    /// FUNCTION, and SUB alike).
    #[error("function '{name}' already declared")]
    FunctionRedeclared {
        name: String,
        location: SourceLocation,
    },

    /// A constant declared more than once.
    #[error("constant '{name}' already declared")]
    DuplicateConstant {
        name: String,
        location: SourceLocation,
    },

    // === Resolution failures ===
    /// A jump targets a line number that does not exist.
    #[error("{context} target line {line} does not exist")]
    UndefinedLine {
        line: u32,
        context: String,
        location: SourceLocation,
    },

    /// A jump targets a label that does not exist.
    #[error("{context} target label :{name} does not exist")]
    UndefinedLabel {
        name: String,
        context: String,
        location: SourceLocation,
    },

    /// A call names a function that was never declared.
    #[error("undefined function '{name}'")]
    UndefinedFunction {
        name: String,
        location: SourceLocation,
    },

    /// A constant expression referenced a name with no known constant.
    #[error("undefined constant '{name}'")]
    UndefinedConstant {
        name: String,
        location: SourceLocation,
    },

    /// An array used without a DIM declaration (when required).
    #[error("array '{name}' used without DIM declaration")]
    ArrayNotDeclared {
        name: String,
        location: SourceLocation,
    },

    /// `ON <event>` named an event outside the known vocabulary.
    #[error("unknown event name: {name}")]
    UnknownEvent {
        name: String,
        location: SourceLocation,
    },

    // === Shape/type failures ===
    /// Incompatible types (string/numeric crossing, bad operands).
    #[error("type mismatch: {message}")]
    TypeMismatch {
        message: String,
        location: SourceLocation,
    },

    /// An array accessed with the wrong number of dimensions.
    #[error("array '{name}' expects {expected} dimension(s), got {found}")]
    WrongDimensionCount {
        name: String,
        expected: usize,
        found: usize,
        location: SourceLocation,
    },

    /// A non-numeric or non-positive array index or bound.
    #[error("invalid array index: {message}")]
    InvalidArrayIndex {
        message: String,
        location: SourceLocation,
    },

    // === Control-flow imbalance ===
    /// `NEXT` with no open `FOR`.
    #[error("NEXT without matching FOR")]
    NextWithoutFor { location: SourceLocation },

    /// `WEND` with no open `WHILE`.
    #[error("WEND without matching WHILE")]
    WendWithoutWhile { location: SourceLocation },

    /// `UNTIL` with no open `REPEAT`.
    #[error("UNTIL without matching REPEAT")]
    UntilWithoutRepeat { location: SourceLocation },

    /// `LOOP` with no open `DO`.
    #[error("LOOP without matching DO")]
    LoopWithoutDo { location: SourceLocation },

    /// A `FOR` never closed by `NEXT`.
    #[error("FOR loop starting at {location} has no matching NEXT")]
    ForWithoutNext { location: SourceLocation },

    /// A `WHILE` never closed by `WEND`.
    #[error("WHILE loop starting at {location} has no matching WEND")]
    WhileWithoutWend { location: SourceLocation },

    /// A `REPEAT` never closed by `UNTIL`.
    #[error("REPEAT loop starting at {location} has no matching UNTIL")]
    RepeatWithoutUntil { location: SourceLocation },

    /// A `DO` never closed by `LOOP`.
    #[error("DO loop starting at {location} has no matching LOOP")]
    DoWithoutLoop { location: SourceLocation },

    /// An explicit `NEXT` variable does not match the open `FOR`.
    #[error("NEXT variable '{found}' does not match FOR variable '{expected}'")]
    ForNextMismatch {
        expected: String,
        found: String,
        location: SourceLocation,
    },
}

impl SemanticError {
    /// The source location this error points at.
    pub fn location(&self) -> SourceLocation {
        match self {
            SemanticError::DuplicateLineNumber { location, .. }
            | SemanticError::DuplicateLabel { location, .. }
            | SemanticError::ArrayRedeclared { location, .. }
            | SemanticError::FunctionRedeclared { location, .. }
            | SemanticError::DuplicateConstant { location, .. }
            | SemanticError::UndefinedLine { location, .. }
            | SemanticError::UndefinedLabel { location, .. }
            | SemanticError::UndefinedFunction { location, .. }
            | SemanticError::UndefinedConstant { location, .. }
            | SemanticError::ArrayNotDeclared { location, .. }
            | SemanticError::UnknownEvent { location, .. }
            | SemanticError::TypeMismatch { location, .. }
            | SemanticError::WrongDimensionCount { location, .. }
            | SemanticError::InvalidArrayIndex { location, .. }
            | SemanticError::NextWithoutFor { location }
            | SemanticError::WendWithoutWhile { location }
            | SemanticError::UntilWithoutRepeat { location }
            | SemanticError::LoopWithoutDo { location }
            | SemanticError::ForWithoutNext { location }
            | SemanticError::WhileWithoutWend { location }
            | SemanticError::RepeatWithoutUntil { location }
            | SemanticError::DoWithoutLoop { location }
            | SemanticError::ForNextMismatch { location, .. } => *location,
        }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(message: impl Into<String>, location: SourceLocation) -> Self {
        SemanticError::TypeMismatch {
            message: message.into(),
            location,
        }
    }
}

/// A non-fatal finding: reported, never blocks compilation.
#[derive(Debug, Clone)]
pub struct SemanticWarning {
    /// Human-readable description.
    pub message: String,
    /// Where the warning points.
    pub location: SourceLocation,
}

impl SemanticWarning {
    /// Creates a warning.
    pub fn new(message: impl Into<String>, location: SourceLocation) -> Self {
        Self {
            message: message.into(),
            location,
        }
    }
}

impl std::fmt::Display for SemanticWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Warning at {}: {}", self.location, self.message)
    }
}
