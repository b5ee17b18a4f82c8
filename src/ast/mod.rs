//! Abstract Syntax Tree (AST) definitions for RapidBASIC.
//!
//! The AST represents the hierarchical structure of a BASIC program after
//! parsing. RapidBASIC is a line-numbered dialect, so the top level is a
//! sequence of [`ProgramLine`]s, each holding the statements that shared a
//! source line.
//!
//! # Structure
//!
//! ```text
//! Program
//! └── Vec<ProgramLine>          (line number 0 = unnumbered)
//!     └── Vec<Statement>
//!         ├── Print { items, ... }
//!         ├── Let { variable, value: Expr }
//!         ├── Goto { target }
//!         └── ...
//! ```
//!
//! # Design Decisions
//!
//! - **Owned nodes**: AST nodes own their children (no lifetimes). The AST
//!   acts as the arena for the whole compilation; later phases refer back
//!   into it with [`StmtRef`] index pairs rather than pointers.
//! - **Location on every node**: Every node tracks its source line and
//!   column for error messages.
//! - **Closed statement/expression enums**: dispatching in the analyzer and
//!   IR generator is an exhaustive `match`, so adding a statement kind is a
//!   compile error until every phase handles it.

mod expr;
mod stmt;

pub use expr::*;
pub use stmt::*;

/// A position in the source text, as reported by the lexer.
///
/// Lines are 1-based; column 0 means "start of line". Used for error
/// reporting and for the back-references symbols keep to their uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceLocation {
    /// 1-based source line (0 if unknown).
    pub line: u32,
    /// 0-based column within the line.
    pub column: u32,
}

impl SourceLocation {
    /// Creates a new location.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An index pair identifying one statement inside a [`Program`].
///
/// The program owns every AST node; symbol-table entries and CFG blocks
/// refer back to statements with these lightweight handles instead of
/// pointers, so their validity is tied to the program's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StmtRef {
    /// Index into `Program::lines`.
    pub line: usize,
    /// Index into that line's `statements`.
    pub statement: usize,
}

impl StmtRef {
    /// Creates a new statement reference.
    pub fn new(line: usize, statement: usize) -> Self {
        Self { line, statement }
    }
}

/// One source line of a program: an optional line number plus the
/// statements that appeared on it (colon-separated in source).
#[derive(Debug, Clone)]
pub struct ProgramLine {
    /// The BASIC line number; 0 for unnumbered lines.
    pub number: u32,
    /// Statements on this line, in source order.
    pub statements: Vec<Statement>,
    /// Location of the start of the line.
    pub location: SourceLocation,
}

impl ProgramLine {
    /// Creates a program line.
    pub fn new(number: u32, statements: Vec<Statement>, location: SourceLocation) -> Self {
        Self {
            number,
            statements,
            location,
        }
    }
}

/// A complete BASIC program: the ordered list of its lines.
#[derive(Debug, Clone, Default)]
pub struct Program {
    /// The lines that make up the program, in source order.
    pub lines: Vec<ProgramLine>,
}

impl Program {
    /// Creates a new program with the given lines.
    pub fn new(lines: Vec<ProgramLine>) -> Self {
        Self { lines }
    }

    /// Resolves a [`StmtRef`] back to its statement.
    pub fn statement(&self, r: StmtRef) -> Option<&Statement> {
        self.lines.get(r.line)?.statements.get(r.statement)
    }

    /// The BASIC line number carrying the referenced statement (0 if the
    /// reference is stale or the line is unnumbered).
    pub fn line_number_of(&self, r: StmtRef) -> u32 {
        self.lines.get(r.line).map(|l| l.number).unwrap_or(0)
    }
}
