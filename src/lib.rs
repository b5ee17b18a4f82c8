//! # RapidBASIC compiler core
//!
//! The middle phases of the RapidBASIC compiler: semantic analysis and
//! intermediate-representation generation for line-numbered BASIC programs.
//!
//! ## Architecture
//!
//! The full pipeline looks like:
//!
//! ```text
//! Source (.bas) → Lexer → Parser → AST → Semantic Analysis → CFG → IR → CodeGen
//! ```
//!
//! This crate owns the two phases in the middle:
//!
//! - [`semantic`] - Two-pass symbol resolution, type inference, constant
//!   folding, and control-flow validation over the parsed AST
//! - [`ir`] - Lowering of CFG basic blocks into a flat, labeled,
//!   stack-machine instruction stream
//!
//! The phases on either side are collaborators, represented here only by the
//! contracts the core needs:
//!
//! - [`ast`] - The parser's output, consumed by semantic analysis
//! - [`cfg`] - The control-flow graph a driver builds between the two
//!   phases, consumed by IR generation
//! - [`constants`] - The indexed constant store shared with the runtime
//! - [`registry`] - Host-extension functions and the event vocabulary
//!
//! ## Example
//!
//! ```
//! use rapidbasic::prelude::*;
//!
//! let program = Program::new(vec![]);
//! let options = CompilerOptions::default();
//!
//! let mut analyzer = SemanticAnalyzer::new();
//! if analyzer.analyze(&program, &options) {
//!     let cfg = ControlFlowGraph::linear(&program);
//!     let code = IRGenerator::generate(&cfg, &program, analyzer.symbol_table()).unwrap();
//!     assert!(!code.instructions.is_empty()); // at least the trailing HALT
//! }
//! ```

pub mod ast;
pub mod cfg;
pub mod constants;
pub mod ir;
pub mod options;
pub mod registry;
pub mod semantic;

/// Re-export commonly used types for convenience
pub mod prelude {
    pub use crate::ast::{
        Expr, ExprKind, Program, ProgramLine, SourceLocation, Statement, StatementKind,
    };
    pub use crate::cfg::{BasicBlock, ControlFlowGraph, Edge, EdgeKind};
    pub use crate::constants::{ConstantValue, ConstantsManager};
    pub use crate::ir::{IRCode, IRGenerator, IRInstruction, IROpcode, Operand};
    pub use crate::options::CompilerOptions;
    pub use crate::registry::CommandRegistry;
    pub use crate::semantic::{SemanticAnalyzer, SemanticError, SemanticWarning, VariableType};
}
