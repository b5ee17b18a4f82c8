//! Semantic analysis for RapidBASIC.
//!
//! This phase sits between parsing and IR generation. It builds the symbol
//! table, checks types, folds constants, and validates control flow, leaving
//! behind everything the IR generator needs to lower the program without
//! re-validating anything.
//!
//! # Architecture
//!
//! The analyzer makes **two passes** over the AST:
//!
//! 1. **Pass 1 (Declaration Collection)**: line numbers, labels, `DIM`
//!    arrays, `DEF FN`/`FUNCTION`/`SUB` definitions, the `DATA` segment,
//!    and `CONST` declarations (folded on the spot). Collecting first makes
//!    forward references legal - a GOSUB can target a later line, a call
//!    can name a function defined further down.
//!
//! 2. **Pass 2 (Validation)**: every statement is walked in source order,
//!    expressions are type-checked bottom-up, jump targets are resolved,
//!    and the loop stacks balance `FOR`/`NEXT`, `WHILE`/`WEND`,
//!    `REPEAT`/`UNTIL`, and `DO`/`LOOP`. After the walk, anything still
//!    open on a stack is reported as an unclosed construct.
//!
//! # Error Recovery
//!
//! Analysis never aborts: errors accumulate so a single run surfaces as
//! many problems as possible. [`SemanticAnalyzer::analyze`] returns whether
//! the program is clean; the driver gates CFG/IR generation on that.
//!
//! # Usage
//!
//! ```
//! use rapidbasic::ast::Program;
//! use rapidbasic::options::CompilerOptions;
//! use rapidbasic::semantic::SemanticAnalyzer;
//!
//! let program = Program::default();
//! let mut analyzer = SemanticAnalyzer::new();
//! let ok = analyzer.analyze(&program, &CompilerOptions::default());
//! assert!(ok);
//! ```

mod builtins;
mod const_eval;
mod error;
mod expressions;
mod pass1;
mod pass2;
pub mod symbols;
mod types;

pub use error::{SemanticError, SemanticWarning};
pub use symbols::{
    ArraySymbol, ConstantSymbol, DataSegment, FunctionKind, FunctionSymbol, LabelSymbol,
    LineNumberSymbol, SymbolTable, VariableSymbol,
};
pub use types::{promote_types, type_from_name, type_suffix_of, VariableType};

use crate::ast::{Program, SourceLocation};
use crate::constants::{ConstantValue, ConstantsManager};
use crate::options::CompilerOptions;
use crate::registry::CommandRegistry;
use builtins::BuiltinTable;

/// An open `FOR` waiting for its `NEXT`.
#[derive(Debug, Clone)]
pub(crate) struct ForContext {
    pub variable: String,
    pub location: SourceLocation,
}

/// Main entry point for semantic analysis.
///
/// One analyzer owns one compilation's mutable state. Reusing an analyzer
/// for a second `analyze()` call resets the symbol table and constant
/// store back to the pre-registered baseline (engine constants plus any
/// host-injected ones), so compilations never see each other's symbols.
/// Concurrent compilations each need their own instance.
pub struct SemanticAnalyzer {
    /// The symbol table for this compilation unit.
    symbols: SymbolTable,
    /// Accumulated errors.
    errors: Vec<SemanticError>,
    /// Accumulated warnings.
    warnings: Vec<SemanticWarning>,
    /// The live constant store, extended by user `CONST` declarations.
    constants: ConstantsManager,
    /// Snapshot restored at the start of each `analyze()` call.
    baseline: ConstantsManager,
    /// Host command registry (extension functions + event vocabulary).
    registry: CommandRegistry,
    /// Core built-in function table.
    builtins: BuiltinTable,

    /// Warn about declared-but-unused variables.
    warn_unused: bool,
    /// Error on array access without a prior DIM.
    require_explicit_dim: bool,

    // Control-flow stacks, one per loop construct kind.
    pub(crate) for_stack: Vec<ForContext>,
    pub(crate) while_stack: Vec<SourceLocation>,
    pub(crate) repeat_stack: Vec<SourceLocation>,
    pub(crate) do_stack: Vec<SourceLocation>,
}

impl SemanticAnalyzer {
    /// Creates an analyzer with the engine's default command registry.
    pub fn new() -> Self {
        Self::with_registry(CommandRegistry::default())
    }

    /// Creates an analyzer validating against a specific registry.
    pub fn with_registry(registry: CommandRegistry) -> Self {
        let mut baseline = ConstantsManager::new();
        baseline.add_predefined();

        let mut constants = ConstantsManager::new();
        constants.copy_from(&baseline);

        let mut analyzer = Self {
            symbols: SymbolTable::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
            constants,
            baseline,
            registry,
            builtins: BuiltinTable::new(),
            warn_unused: true,
            require_explicit_dim: true,
            for_stack: Vec::new(),
            while_stack: Vec::new(),
            repeat_stack: Vec::new(),
            do_stack: Vec::new(),
        };
        analyzer.seed_constant_symbols();
        analyzer
    }

    /// Analyzes a program under the given options.
    ///
    /// Returns true when no errors were found; warnings never affect the
    /// result. All findings stay available through [`errors`](Self::errors)
    /// and [`warnings`](Self::warnings) afterwards.
    pub fn analyze(&mut self, program: &Program, options: &CompilerOptions) -> bool {
        self.errors.clear();
        self.warnings.clear();

        // Reset per-compilation state, restoring the constant baseline.
        self.symbols = SymbolTable::new();
        self.constants.copy_from(&self.baseline);
        self.seed_constant_symbols();

        self.symbols.array_base = options.array_base;
        self.symbols.unicode_mode = options.unicode_mode;
        self.symbols.error_tracking = options.error_tracking;
        self.symbols.cancellable_loops = options.cancellable_loops;

        self.for_stack.clear();
        self.while_stack.clear();
        self.repeat_stack.clear();
        self.do_stack.clear();

        self.pass1_collect_declarations(program);
        self.pass2_validate(program);
        self.validate_control_flow();

        if self.warn_unused {
            self.check_unused_variables();
        }

        log::debug!(
            "semantic analysis finished: {} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        );

        self.errors.is_empty()
    }

    /// The populated symbol table.
    pub fn symbol_table(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Errors found by the last `analyze()` call.
    pub fn errors(&self) -> &[SemanticError] {
        &self.errors
    }

    /// Warnings found by the last `analyze()` call.
    pub fn warnings(&self) -> &[SemanticWarning] {
        &self.warnings
    }

    /// Whether the last `analyze()` call found errors.
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// The constant store, for the driver to hand to the runtime.
    pub fn constants_manager(&self) -> &ConstantsManager {
        &self.constants
    }

    /// Enables or disables unused-variable warnings.
    pub fn set_warn_unused(&mut self, warn: bool) {
        self.warn_unused = warn;
    }

    /// Enables or disables the DIM-before-use requirement for arrays.
    pub fn set_require_explicit_dim(&mut self, require: bool) {
        self.require_explicit_dim = require;
    }

    /// Registers a host-supplied constant, as if the source declared it.
    ///
    /// Injected constants join the baseline, so they survive analyzer
    /// resets just like the engine's own constants.
    pub fn inject_runtime_constant(&mut self, name: &str, value: impl Into<ConstantValue>) {
        let value = value.into();
        self.baseline.add(name, value.clone());
        let index = self.constants.add(name, value.clone());
        self.symbols.constants.insert(
            name.to_string(),
            ConstantSymbol {
                value,
                index,
                is_predefined: true,
            },
        );
    }

    /// Renders a human-readable analysis report.
    pub fn generate_report(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();

        let _ = writeln!(out, "=== SEMANTIC ANALYSIS REPORT ===");
        let _ = writeln!(
            out,
            "Status: {}",
            if self.errors.is_empty() {
                "PASSED".to_string()
            } else {
                format!("FAILED ({} error(s))", self.errors.len())
            }
        );
        let _ = writeln!(out, "Errors: {}", self.errors.len());
        let _ = writeln!(out, "Warnings: {}", self.warnings.len());

        if !self.errors.is_empty() {
            let _ = writeln!(out, "\nErrors:");
            for err in &self.errors {
                let _ = writeln!(out, "  Semantic Error at {}: {}", err.location(), err);
            }
        }
        if !self.warnings.is_empty() {
            let _ = writeln!(out, "\nWarnings:");
            for warn in &self.warnings {
                let _ = writeln!(out, "  {}", warn);
            }
        }

        let _ = writeln!(out, "\n{}", self.symbols);
        let _ = writeln!(out, "=== END SEMANTIC ANALYSIS REPORT ===");
        out
    }

    /// Registers every baseline constant into the symbol table so source
    /// code can reference engine constants like user-declared ones.
    fn seed_constant_symbols(&mut self) {
        self.symbols.constants.clear();
        for name in self.constants.names() {
            if let Some(index) = self.constants.index_of(&name) {
                if let Some(value) = self.constants.get(index) {
                    self.symbols.constants.insert(
                        name.clone(),
                        ConstantSymbol {
                            value: value.clone(),
                            index,
                            is_predefined: true,
                        },
                    );
                }
            }
        }
    }

    /// Records an error.
    pub(crate) fn error(&mut self, error: SemanticError) {
        self.errors.push(error);
    }

    /// Records a warning.
    pub(crate) fn warning(&mut self, message: impl Into<String>, location: SourceLocation) {
        self.warnings.push(SemanticWarning::new(message, location));
    }

    /// End-of-analysis closure: every construct still open on a stack is
    /// an opener with no closer, one error each.
    fn validate_control_flow(&mut self) {
        let for_leftovers: Vec<ForContext> = self.for_stack.drain(..).collect();
        for ctx in for_leftovers {
            self.errors.push(SemanticError::ForWithoutNext {
                location: ctx.location,
            });
        }
        let while_leftovers: Vec<SourceLocation> = self.while_stack.drain(..).collect();
        for location in while_leftovers {
            self.errors.push(SemanticError::WhileWithoutWend { location });
        }
        let repeat_leftovers: Vec<SourceLocation> = self.repeat_stack.drain(..).collect();
        for location in repeat_leftovers {
            self.errors
                .push(SemanticError::RepeatWithoutUntil { location });
        }
        let do_leftovers: Vec<SourceLocation> = self.do_stack.drain(..).collect();
        for location in do_leftovers {
            self.errors.push(SemanticError::DoWithoutLoop { location });
        }
    }

    /// Warns about variables that were declared and then never read.
    fn check_unused_variables(&mut self) {
        let mut unused: Vec<(String, SourceLocation)> = self
            .symbols
            .variables
            .values()
            .filter(|sym| sym.is_declared && !sym.is_used)
            .map(|sym| (sym.name.clone(), sym.first_use))
            .collect();
        unused.sort_by(|a, b| a.0.cmp(&b.0));
        for (name, location) in unused {
            self.warning(
                format!("Variable '{}' declared but never used", name),
                location,
            );
        }
    }
}

impl Default for SemanticAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use crate::registry::CommandRegistry;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new(line, 0)
    }

    fn stmt(line: u32, kind: StatementKind) -> Statement {
        Statement::new(kind, loc(line))
    }

    fn num(line: u32, v: f64) -> Expr {
        Expr::new(ExprKind::NumberLiteral(v), loc(line))
    }

    fn var(line: u32, name: &str) -> Expr {
        Expr::new(ExprKind::Variable(name.to_string()), loc(line))
    }

    fn program(lines: Vec<(u32, Vec<Statement>)>) -> Program {
        Program::new(
            lines
                .into_iter()
                .map(|(n, stmts)| ProgramLine::new(n, stmts, loc(n)))
                .collect(),
        )
    }

    fn print_stmt(line: u32, expr: Expr) -> Statement {
        stmt(
            line,
            StatementKind::Print {
                items: vec![PrintItem {
                    expr,
                    separator: None,
                }],
                trailing_newline: true,
            },
        )
    }

    #[test]
    fn test_analyze_empty_program() {
        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&Program::default(), &CompilerOptions::default()));
        assert!(!analyzer.has_errors());
    }

    #[test]
    fn test_balanced_for_next() {
        let p = program(vec![
            (
                10,
                vec![stmt(
                    10,
                    StatementKind::For {
                        variable: "I".to_string(),
                        start: num(10, 1.0),
                        end: num(10, 5.0),
                        step: None,
                    },
                )],
            ),
            (20, vec![print_stmt(20, var(20, "I"))]),
            (
                30,
                vec![stmt(
                    30,
                    StatementKind::Next {
                        variable: Some("I".to_string()),
                    },
                )],
            ),
        ]);

        let mut analyzer = SemanticAnalyzer::new();
        assert!(
            analyzer.analyze(&p, &CompilerOptions::default()),
            "{:?}",
            analyzer.errors()
        );
    }

    #[test]
    fn test_for_without_next_reports_once() {
        let p = program(vec![
            (
                10,
                vec![stmt(
                    10,
                    StatementKind::For {
                        variable: "I".to_string(),
                        start: num(10, 1.0),
                        end: num(10, 5.0),
                        step: None,
                    },
                )],
            ),
            (20, vec![print_stmt(20, var(20, "I"))]),
        ]);

        let mut analyzer = SemanticAnalyzer::new();
        assert!(!analyzer.analyze(&p, &CompilerOptions::default()));
        let unclosed: Vec<_> = analyzer
            .errors()
            .iter()
            .filter(|e| matches!(e, SemanticError::ForWithoutNext { .. }))
            .collect();
        assert_eq!(unclosed.len(), 1);
    }

    #[test]
    fn test_goto_undefined_line() {
        let p = program(vec![(
            10,
            vec![stmt(
                10,
                StatementKind::Goto {
                    target: JumpTarget::Line(999),
                },
            )],
        )]);

        let mut analyzer = SemanticAnalyzer::new();
        assert!(!analyzer.analyze(&p, &CompilerOptions::default()));
        assert_eq!(analyzer.errors().len(), 1);
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::UndefinedLine { line: 999, .. }
        ));
    }

    #[test]
    fn test_const_shadows_predefined_without_error() {
        // CONST PI = 3 overwrites the engine constant in place, keeping
        // its index; PRINT PI then folds to the user value.
        let p = program(vec![
            (
                10,
                vec![stmt(
                    10,
                    StatementKind::Const {
                        name: "PI".to_string(),
                        value: num(10, 3.0),
                    },
                )],
            ),
            (20, vec![print_stmt(20, var(20, "PI"))]),
        ]);

        let mut analyzer = SemanticAnalyzer::new();
        assert!(
            analyzer.analyze(&p, &CompilerOptions::default()),
            "{:?}",
            analyzer.errors()
        );

        let sym = analyzer.symbol_table().constants.get("PI").unwrap();
        assert_eq!(sym.value, ConstantValue::Integer(3));
        assert_eq!(
            analyzer.constants_manager().get(sym.index),
            Some(&ConstantValue::Integer(3))
        );
    }

    #[test]
    fn test_reset_between_runs_preserves_engine_constants_only() {
        let declare_x = program(vec![(
            10,
            vec![stmt(
                10,
                StatementKind::Const {
                    name: "USERX".to_string(),
                    value: num(10, 7.0),
                },
            )],
        )]);

        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&declare_x, &CompilerOptions::default()));
        assert!(analyzer.symbol_table().constants.contains_key("USERX"));

        // Second compilation: USERX is gone, PI is still there.
        assert!(analyzer.analyze(&Program::default(), &CompilerOptions::default()));
        assert!(!analyzer.symbol_table().constants.contains_key("USERX"));
        assert!(!analyzer.constants_manager().has("USERX"));
        assert!(analyzer.symbol_table().constants.contains_key("PI"));
    }

    #[test]
    fn test_injected_constant_survives_reset() {
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.inject_runtime_constant("HOST_VALUE", 42_i64);

        assert!(analyzer.analyze(&Program::default(), &CompilerOptions::default()));
        let sym = analyzer.symbol_table().constants.get("HOST_VALUE").unwrap();
        assert_eq!(sym.value, ConstantValue::Integer(42));
    }

    #[test]
    fn test_registry_injection_changes_event_vocabulary() {
        let on_custom = |l: u32| {
            program(vec![(
                l,
                vec![stmt(
                    l,
                    StatementKind::OnEvent {
                        event: "PLASMA".to_string(),
                        handler: EventHandler::Call {
                            function: "HANDLER".to_string(),
                        },
                    },
                )],
            )])
        };

        let mut plain = SemanticAnalyzer::new();
        assert!(!plain.analyze(&on_custom(10), &CompilerOptions::default()));

        let mut registry = CommandRegistry::default();
        registry.register_event("PLASMA");
        let mut extended = SemanticAnalyzer::with_registry(registry);
        assert!(extended.analyze(&on_custom(10), &CompilerOptions::default()));
    }

    #[test]
    fn test_report_mentions_status() {
        let mut analyzer = SemanticAnalyzer::new();
        analyzer.analyze(&Program::default(), &CompilerOptions::default());
        let report = analyzer.generate_report();
        assert!(report.contains("PASSED"));
        assert!(report.contains("Symbol Table"));
    }
}
