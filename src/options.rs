//! Compiler configuration.
//!
//! `OPTION` statements are collected by the parser before the AST reaches
//! this crate; the driver hands the resulting record to
//! [`SemanticAnalyzer::analyze`](crate::semantic::SemanticAnalyzer::analyze),
//! which copies the flags into the symbol table so the IR generator and the
//! runtime see the same settings.

/// Recognized compiler options, with the engine defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    /// `OPTION BASE`: default array lower bound, 0 or 1.
    pub array_base: u8,
    /// `OPTION UNICODE`: strings are codepoint arrays instead of byte strings.
    pub unicode_mode: bool,
    /// `OPTION ERROR`: emit line tracking for runtime error messages.
    pub error_tracking: bool,
    /// `OPTION CANCELLABLE`: inject cancellation checks into loops.
    pub cancellable_loops: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            array_base: 1,
            unicode_mode: false,
            error_tracking: true,
            cancellable_loops: true,
        }
    }
}
