//! Statement AST nodes.
//!
//! Statements are constructs that perform actions. RapidBASIC is a
//! line-numbered dialect, so loop constructs appear as *paired flat
//! statements* (`FOR`/`NEXT`, `WHILE`/`WEND`, `REPEAT`/`UNTIL`, `DO`/`LOOP`)
//! rather than as nested bodies; the semantic analyzer balances them with
//! explicit stacks and the CFG threads the control flow. Only `IF` blocks,
//! `CASE` arms, and `FUNCTION`/`SUB` bodies nest.

use super::{Expr, SourceLocation};

/// A statement with its source location.
#[derive(Debug, Clone)]
pub struct Statement {
    /// The kind of statement.
    pub kind: StatementKind,
    /// Source location of this statement.
    pub location: SourceLocation,
}

impl Statement {
    /// Creates a new statement with the given kind and location.
    pub fn new(kind: StatementKind, location: SourceLocation) -> Self {
        Self { kind, location }
    }
}

/// The target of a jump: a BASIC line number or a symbolic `:label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JumpTarget {
    /// `GOTO 100`
    Line(u32),
    /// `GOTO :retry`
    Label(String),
}

/// One item in a `PRINT` list, with its trailing separator (if any).
#[derive(Debug, Clone)]
pub struct PrintItem {
    /// The expression to print.
    pub expr: Expr,
    /// The separator following this item, if one was written.
    pub separator: Option<PrintSeparator>,
}

/// Separator between `PRINT` items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintSeparator {
    /// `,` - advance to the next tab zone.
    Comma,
    /// `;` - no spacing.
    Semicolon,
}

/// An `ELSEIF` arm of a block `IF`.
#[derive(Debug, Clone)]
pub struct ElseIfClause {
    /// The arm's condition.
    pub condition: Expr,
    /// Statements executed when the condition holds.
    pub body: Vec<Statement>,
}

/// A `WHEN` arm of a `CASE` statement.
#[derive(Debug, Clone)]
pub struct WhenClause {
    /// Values compared against the selector (any match takes the arm).
    pub values: Vec<Expr>,
    /// Statements executed on a match.
    pub body: Vec<Statement>,
}

/// One array declared by a `DIM` statement.
#[derive(Debug, Clone)]
pub struct ArrayDecl {
    /// Array name (type suffix included, e.g. `A$`).
    pub name: String,
    /// Upper-bound expression per dimension.
    pub dimensions: Vec<Expr>,
}

/// The pre-/post-test attached to a `DO` or `LOOP` statement.
#[derive(Debug, Clone)]
pub struct LoopTest {
    /// Whether the test continues the loop (`WHILE`) or ends it (`UNTIL`).
    pub kind: LoopTestKind,
    /// The test condition.
    pub condition: Expr,
}

/// Flavor of a `DO`/`LOOP` condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopTestKind {
    /// Loop while the condition is true.
    While,
    /// Loop until the condition is true.
    Until,
}

/// The construct an `EXIT` statement breaks out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    For,
    While,
    Repeat,
    Do,
    Function,
    Sub,
}

/// The handler wired up by an `ON <event>` statement.
#[derive(Debug, Clone)]
pub enum EventHandler {
    /// `ON KEYPRESSED CALL HandleKey`
    Call { function: String },
    /// `ON BREAK GOTO 900`
    Goto { target: JumpTarget },
    /// `ON TIMER GOSUB :tick`
    Gosub { target: JumpTarget },
}

/// The different kinds of statements in RapidBASIC.
#[derive(Debug, Clone)]
pub enum StatementKind {
    /// `PRINT expr[, expr][; expr]...`
    Print {
        items: Vec<PrintItem>,
        /// False when the statement ends with a separator.
        trailing_newline: bool,
    },

    /// `INPUT ["prompt";] var[, var]...`
    Input {
        prompt: Option<String>,
        variables: Vec<String>,
    },

    /// `[LET] variable[(indices)] = value`
    Let {
        variable: String,
        /// Array indices; empty for a scalar assignment.
        indices: Vec<Expr>,
        value: Expr,
    },

    /// Block `IF`, or the single-line `IF cond THEN GOTO line` form.
    If {
        condition: Expr,
        /// Set for `IF cond THEN GOTO line`; the branch bodies are empty.
        goto_line: Option<u32>,
        then_branch: Vec<Statement>,
        elseif_branches: Vec<ElseIfClause>,
        else_branch: Vec<Statement>,
    },

    /// `CASE selector OF WHEN v[, v]... / OTHERWISE / ENDCASE`
    Case {
        selector: Expr,
        when_clauses: Vec<WhenClause>,
        otherwise: Vec<Statement>,
    },

    /// `FOR variable = start TO end [STEP step]`
    For {
        variable: String,
        start: Expr,
        end: Expr,
        step: Option<Expr>,
    },

    /// `NEXT [variable]`
    Next { variable: Option<String> },

    /// `WHILE condition`
    While { condition: Expr },
    /// `WEND`
    Wend,
    /// `REPEAT`
    Repeat,
    /// `UNTIL condition`
    Until { condition: Expr },
    /// `DO [WHILE cond | UNTIL cond]`
    Do { test: Option<LoopTest> },
    /// `LOOP [WHILE cond | UNTIL cond]`
    Loop { test: Option<LoopTest> },

    /// `GOTO line-or-label`
    Goto { target: JumpTarget },
    /// `GOSUB line-or-label`
    Gosub { target: JumpTarget },
    /// `RETURN [value]` - value form returns from a FUNCTION.
    Return { value: Option<Expr> },

    /// `ON selector GOTO t1, t2, ...`
    OnGoto {
        selector: Expr,
        targets: Vec<JumpTarget>,
    },
    /// `ON selector GOSUB t1, t2, ...`
    OnGosub {
        selector: Expr,
        targets: Vec<JumpTarget>,
    },
    /// `ON selector CALL f1, f2, ...`
    OnCall {
        selector: Expr,
        functions: Vec<String>,
    },
    /// `ON event CALL f` / `ON event GOTO target` / `ON event GOSUB target`
    OnEvent { event: String, handler: EventHandler },

    /// `READ var[, var]...`
    Read { variables: Vec<String> },
    /// `RESTORE [line-or-label]`
    Restore { target: Option<JumpTarget> },
    /// `DATA v1, v2, ...` - values kept as their source text.
    Data { values: Vec<String> },

    /// `DIM name(bounds)[, name(bounds)]...`
    Dim { arrays: Vec<ArrayDecl> },

    /// `CONST name = constant-expression`
    Const { name: String, value: Expr },

    /// `DEF FNname(params) = expression`
    DefFn {
        name: String,
        params: Vec<String>,
        body: Expr,
    },

    /// `FUNCTION name(params) ... ENDFUNCTION`
    Function {
        name: String,
        params: Vec<String>,
        body: Vec<Statement>,
    },

    /// `SUB name(params) ... ENDSUB`
    Sub {
        name: String,
        params: Vec<String>,
        body: Vec<Statement>,
    },

    /// `CALL name(args)` (or bare `name args` sub invocation)
    Call { name: String, args: Vec<Expr> },

    /// `EXIT FOR`, `EXIT DO`, `EXIT FUNCTION`, ...
    Exit { kind: ExitKind },

    /// `END`
    End,

    /// `REM comment` (generates no code)
    Rem { text: String },

    /// `:label`
    Label { name: String },

    /// A host/runtime command statement: `name arg1, arg2, ...`.
    ///
    /// Covers engine commands (graphics, sound, timing) that the parser
    /// recognized from the command registry; the core lowers them to
    /// builtin calls without interpreting them.
    Command { name: String, args: Vec<Expr> },
}
