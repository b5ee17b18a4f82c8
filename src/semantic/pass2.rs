//! Pass 2: statement validation.
//!
//! Walks every statement in source order and dispatches on its kind. Each
//! category does one of three things: recursively validate sub-expressions,
//! push or pop a control-flow stack, or resolve a jump target against the
//! tables pass 1 built. Closers that find their stack empty are reported on
//! the spot; openers left on a stack at end of program are reported by the
//! closure check in `validate_control_flow`.

use crate::ast::{
    EventHandler, Expr, JumpTarget, Program, SourceLocation, Statement, StatementKind,
};
use crate::semantic::error::SemanticError;
use crate::semantic::{ForContext, SemanticAnalyzer};

impl SemanticAnalyzer {
    pub(crate) fn pass2_validate(&mut self, program: &Program) {
        for line in &program.lines {
            for stmt in &line.statements {
                self.validate_statement(stmt);
            }
        }
    }

    fn validate_statement(&mut self, stmt: &Statement) {
        let loc = stmt.location;
        match &stmt.kind {
            StatementKind::Print { items, .. } => {
                for item in items {
                    self.validate_expression(&item.expr);
                }
            }

            StatementKind::Input { variables, .. } => {
                for name in variables {
                    self.use_variable(name, loc);
                }
            }

            StatementKind::Let {
                variable,
                indices,
                value,
            } => self.validate_let(variable, indices, value, loc),

            StatementKind::Goto { target } => self.resolve_jump_target(target, "GOTO", loc),
            StatementKind::Gosub { target } => self.resolve_jump_target(target, "GOSUB", loc),

            StatementKind::If {
                condition,
                goto_line,
                then_branch,
                elseif_branches,
                else_branch,
            } => {
                self.validate_expression(condition);
                if let Some(line) = goto_line {
                    self.resolve_jump_target(&JumpTarget::Line(*line), "IF THEN", loc);
                } else {
                    for s in then_branch {
                        self.validate_statement(s);
                    }
                    for clause in elseif_branches {
                        self.validate_expression(&clause.condition);
                        for s in &clause.body {
                            self.validate_statement(s);
                        }
                    }
                }
                for s in else_branch {
                    self.validate_statement(s);
                }
            }

            StatementKind::Case {
                selector,
                when_clauses,
                otherwise,
            } => {
                self.validate_expression(selector);
                for clause in when_clauses {
                    for value in &clause.values {
                        self.validate_expression(value);
                    }
                    for s in &clause.body {
                        self.validate_statement(s);
                    }
                }
                for s in otherwise {
                    self.validate_statement(s);
                }
            }

            StatementKind::For {
                variable,
                start,
                end,
                step,
            } => self.validate_for(variable, start, end, step.as_ref(), loc),

            StatementKind::Next { variable } => self.validate_next(variable.as_deref(), loc),

            StatementKind::While { condition } => {
                self.validate_expression(condition);
                self.while_stack.push(loc);
            }

            StatementKind::Wend => {
                if self.while_stack.pop().is_none() {
                    self.error(SemanticError::WendWithoutWhile { location: loc });
                }
            }

            StatementKind::Repeat => self.repeat_stack.push(loc),

            StatementKind::Until { condition } => {
                if self.repeat_stack.pop().is_none() {
                    self.error(SemanticError::UntilWithoutRepeat { location: loc });
                }
                self.validate_expression(condition);
            }

            StatementKind::Do { test } => {
                if let Some(test) = test {
                    self.validate_expression(&test.condition);
                }
                self.do_stack.push(loc);
            }

            StatementKind::Loop { test } => {
                if self.do_stack.pop().is_none() {
                    self.error(SemanticError::LoopWithoutDo { location: loc });
                }
                if let Some(test) = test {
                    self.validate_expression(&test.condition);
                }
            }

            StatementKind::Return { value } => {
                if let Some(value) = value {
                    self.validate_expression(value);
                }
            }

            StatementKind::OnGoto { selector, targets } => {
                self.validate_computed_jump(selector, targets, "ON GOTO", loc)
            }
            StatementKind::OnGosub { selector, targets } => {
                self.validate_computed_jump(selector, targets, "ON GOSUB", loc)
            }

            StatementKind::OnCall {
                selector,
                functions,
            } => {
                self.validate_expression(selector);
                for name in functions {
                    if !self.symbols.functions.contains_key(name) {
                        // Forward references are legal; the driver just needs
                        // the function to exist by run time.
                        self.warning(
                            format!("Function '{}' not found for ON CALL dispatch", name),
                            loc,
                        );
                    }
                }
            }

            StatementKind::OnEvent { event, handler } => self.validate_on_event(event, handler, loc),

            StatementKind::Read { variables } => {
                for name in variables {
                    self.use_variable(name, loc);
                }
            }

            StatementKind::Restore { target } => self.validate_restore(target.as_ref(), loc),

            StatementKind::Call { name, args } => {
                for arg in args {
                    self.validate_expression(arg);
                }
                if !self.symbols.functions.contains_key(name) {
                    self.error(SemanticError::UndefinedFunction {
                        name: name.clone(),
                        location: loc,
                    });
                }
            }

            StatementKind::Function { body, .. } | StatementKind::Sub { body, .. } => {
                for s in body {
                    self.validate_statement(s);
                }
            }

            StatementKind::DefFn { body, .. } => {
                // The body is validated in place; parameters resolve as
                // implicitly declared variables.
                self.validate_expression(body);
            }

            // Handled entirely in pass 1.
            StatementKind::Dim { .. }
            | StatementKind::Const { .. }
            | StatementKind::Data { .. }
            | StatementKind::Label { .. } => {}

            StatementKind::Command { args, .. } => {
                for arg in args {
                    self.validate_expression(arg);
                }
            }

            StatementKind::Exit { .. } | StatementKind::End | StatementKind::Rem { .. } => {}
        }
    }

    fn validate_let(
        &mut self,
        variable: &str,
        indices: &[Expr],
        value: &Expr,
        loc: SourceLocation,
    ) {
        for index in indices {
            self.validate_expression(index);
            let index_type = self.infer_expression_type(index);
            if !index_type.is_numeric() && index_type != crate::semantic::VariableType::Unknown {
                self.error(SemanticError::InvalidArrayIndex {
                    message: "Array index must be numeric".to_string(),
                    location: loc,
                });
            }
        }

        if indices.is_empty() {
            self.use_variable(variable, loc);
        } else {
            self.use_array(variable, indices.len(), loc);
        }

        self.validate_expression(value);

        let target_type = if indices.is_empty() {
            self.symbols
                .variables
                .get(variable)
                .map(|sym| sym.var_type)
                .unwrap_or(crate::semantic::VariableType::Unknown)
        } else {
            self.symbols
                .arrays
                .get(variable)
                .map(|sym| sym.element_type)
                .unwrap_or(crate::semantic::VariableType::Unknown)
        };
        let value_type = self.infer_expression_type(value);
        self.check_type_compatibility(target_type, value_type, loc, "assignment");
    }

    fn validate_for(
        &mut self,
        variable: &str,
        start: &Expr,
        end: &Expr,
        step: Option<&Expr>,
        loc: SourceLocation,
    ) {
        self.use_variable(variable, loc);

        self.validate_expression(start);
        self.validate_expression(end);
        if let Some(step) = step {
            self.validate_expression(step);
        }

        let start_type = self.infer_expression_type(start);
        let end_type = self.infer_expression_type(end);
        if !start_type.is_numeric() || !end_type.is_numeric() {
            self.error(SemanticError::type_mismatch(
                "FOR loop bounds must be numeric",
                loc,
            ));
        }

        self.for_stack.push(ForContext {
            variable: variable.to_string(),
            location: loc,
        });
    }

    fn validate_next(&mut self, variable: Option<&str>, loc: SourceLocation) {
        match self.for_stack.last() {
            None => self.error(SemanticError::NextWithoutFor { location: loc }),
            Some(ctx) => {
                if let Some(named) = variable {
                    if !named.eq_ignore_ascii_case(&ctx.variable) {
                        let expected = ctx.variable.clone();
                        self.error(SemanticError::ForNextMismatch {
                            expected,
                            found: named.to_string(),
                            location: loc,
                        });
                    }
                }
                self.for_stack.pop();
            }
        }
    }

    /// Resolves a GOTO/GOSUB-style target, recording the reference on the
    /// symbol for introspection.
    fn resolve_jump_target(&mut self, target: &JumpTarget, context: &str, loc: SourceLocation) {
        match target {
            JumpTarget::Line(line) => {
                if let Some(sym) = self.symbols.line_numbers.get_mut(line) {
                    sym.references.push(loc);
                } else {
                    self.error(SemanticError::UndefinedLine {
                        line: *line,
                        context: context.to_string(),
                        location: loc,
                    });
                }
            }
            JumpTarget::Label(name) => {
                if let Some(sym) = self.symbols.labels.get_mut(name) {
                    sym.references.push(loc);
                } else {
                    self.error(SemanticError::UndefinedLabel {
                        name: name.clone(),
                        context: context.to_string(),
                        location: loc,
                    });
                }
            }
        }
    }

    fn validate_computed_jump(
        &mut self,
        selector: &Expr,
        targets: &[JumpTarget],
        context: &str,
        loc: SourceLocation,
    ) {
        self.validate_expression(selector);
        let selector_type = self.infer_expression_type(selector);
        if !selector_type.is_numeric() && selector_type != crate::semantic::VariableType::Unknown {
            self.error(SemanticError::type_mismatch(
                format!("{} selector must be numeric", context),
                loc,
            ));
        }
        for target in targets {
            self.resolve_jump_target(target, context, loc);
        }
    }

    /// RESTORE targets may name DATA-only labels or lines that have no
    /// entry in the general tables; those resolve later in the runtime's
    /// data manager, so failure here is not an error.
    fn validate_restore(&mut self, target: Option<&JumpTarget>, loc: SourceLocation) {
        match target {
            Some(JumpTarget::Label(name)) => {
                if let Some(sym) = self.symbols.labels.get_mut(name) {
                    sym.references.push(loc);
                }
            }
            Some(JumpTarget::Line(line)) => {
                if let Some(sym) = self.symbols.line_numbers.get_mut(line) {
                    sym.references.push(loc);
                }
            }
            None => {}
        }
    }

    fn validate_on_event(&mut self, event: &str, handler: &EventHandler, loc: SourceLocation) {
        self.symbols.events_used = true;

        if !self.registry.is_valid_event(event) {
            self.error(SemanticError::UnknownEvent {
                name: event.to_string(),
                location: loc,
            });
            return;
        }

        match handler {
            EventHandler::Call { function } => {
                if !self.symbols.functions.contains_key(function) {
                    // Could be defined later in line order - warn, don't fail.
                    self.warning(
                        format!(
                            "Function '{}' not found for event handler. \
                             Ensure function is defined before program runs.",
                            function
                        ),
                        loc,
                    );
                }
            }
            EventHandler::Goto { target } | EventHandler::Gosub { target } => match target {
                JumpTarget::Line(line) => {
                    if !self.symbols.line_numbers.contains_key(line) {
                        self.error(SemanticError::UndefinedLine {
                            line: *line,
                            context: "event handler".to_string(),
                            location: loc,
                        });
                    }
                }
                JumpTarget::Label(name) => {
                    if !self.symbols.labels.contains_key(name) {
                        self.error(SemanticError::UndefinedLabel {
                            name: name.clone(),
                            context: "event handler".to_string(),
                            location: loc,
                        });
                    }
                }
            },
        }
    }
}
