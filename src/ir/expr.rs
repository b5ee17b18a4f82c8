//! Expression lowering, DEF FN inlining, and condition serialization.
//!
//! Expressions lower post-order: operands first, operator last, so the
//! stream executes directly on an operand stack. The `name(args)` shape
//! resolves against the symbol table in priority order: declared array,
//! then inlinable `DEF FN`, then block function, then builtin.
//!
//! `DEF FN` calls are expanded in place. Each argument lands in a
//! `__fn_<fn>_<param>` temporary, and the body is regenerated with an
//! explicit substitution scope mapping parameter names to those
//! temporaries. The scope is a plain value passed down the recursion, so a
//! nested or recursive inline call builds its own scope without disturbing
//! the caller's.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::ir::generator::IRGenerator;
use crate::ir::IROpcode;
use crate::semantic::type_suffix_of;
use std::collections::HashMap;

/// Parameter-name → temporary-name substitutions active while a `DEF FN`
/// body is being regenerated at a call site.
pub(crate) type ParamScope = HashMap<String, String>;

impl<'a> IRGenerator<'a> {
    /// Lowers an expression outside any inline expansion.
    pub(crate) fn generate_expression(&mut self, expr: &Expr) {
        self.generate_expression_in(expr, &ParamScope::new());
    }

    /// Lowers an expression with the given substitution scope active.
    fn generate_expression_in(&mut self, expr: &Expr, scope: &ParamScope) {
        match &expr.kind {
            &ExprKind::NumberLiteral(value) => {
                // Integral in-range literals take the compact integer push.
                if value.fract() == 0.0
                    && value >= i64::MIN as f64
                    && value <= i64::MAX as f64
                {
                    self.emit1(IROpcode::PushInt, value as i64);
                } else {
                    self.emit1(IROpcode::PushFloat, value);
                }
            }

            ExprKind::StringLiteral(value) => {
                self.emit1(IROpcode::PushString, value.as_str());
            }

            ExprKind::Variable(name) => {
                if let Some(constant) = self.symbols.constants.get(name) {
                    // Constants load by index, not by name.
                    let index = constant.index;
                    self.emit1(IROpcode::LoadConst, index);
                } else if let Some(temp) = scope.get(name) {
                    // An inlined parameter reads its temporary.
                    let temp = temp.clone();
                    self.emit1(IROpcode::LoadVar, temp);
                } else {
                    self.emit1(IROpcode::LoadVar, name.as_str());
                }
            }

            ExprKind::Call { name, args } => self.generate_call(name, args, scope),

            ExprKind::Binary { left, op, right } => {
                self.generate_expression_in(left, scope);
                self.generate_expression_in(right, scope);

                let opcode = match op {
                    BinaryOp::Add => {
                        if self.is_string_expression(left) || self.is_string_expression(right) {
                            if self.symbols.unicode_mode {
                                IROpcode::UnicodeConcat
                            } else {
                                IROpcode::StrConcat
                            }
                        } else {
                            IROpcode::Add
                        }
                    }
                    BinaryOp::Subtract => IROpcode::Sub,
                    BinaryOp::Multiply => IROpcode::Mul,
                    BinaryOp::Divide => IROpcode::Div,
                    BinaryOp::IntDivide => IROpcode::IDiv,
                    BinaryOp::Power => IROpcode::Pow,
                    BinaryOp::Modulo => IROpcode::Mod,
                    BinaryOp::Equal => IROpcode::Eq,
                    BinaryOp::NotEqual => IROpcode::Ne,
                    BinaryOp::LessThan => IROpcode::Lt,
                    BinaryOp::LessEqual => IROpcode::Le,
                    BinaryOp::GreaterThan => IROpcode::Gt,
                    BinaryOp::GreaterEqual => IROpcode::Ge,
                    BinaryOp::And => IROpcode::And,
                    BinaryOp::Or => IROpcode::Or,
                    BinaryOp::Xor => IROpcode::Xor,
                    BinaryOp::Eqv => IROpcode::Eqv,
                    BinaryOp::Imp => IROpcode::Imp,
                };
                self.emit(opcode);
            }

            ExprKind::Unary { op, operand } => {
                self.generate_expression_in(operand, scope);
                match op {
                    UnaryOp::Negate => self.emit(IROpcode::Neg),
                    UnaryOp::Not => self.emit(IROpcode::Not),
                    UnaryOp::Plus => {}
                }
            }

            ExprKind::Iif {
                condition,
                if_true,
                if_false,
            } => {
                // Lowered as a three-argument builtin the code generator
                // recognizes and turns into a ternary.
                self.generate_expression_in(condition, scope);
                self.generate_expression_in(if_true, scope);
                self.generate_expression_in(if_false, scope);
                self.emit2(IROpcode::CallBuiltin, "__IIF", 3_i64);
            }
        }
    }

    fn generate_call(&mut self, name: &str, args: &[Expr], scope: &ParamScope) {
        // Declared arrays win over everything: inside `A(I)` the name is an
        // element access, not a call.
        if self.symbols.arrays.contains_key(name) {
            for index in args {
                self.generate_expression_in(index, scope);
            }
            self.emit3(
                IROpcode::LoadArray,
                name,
                args.len(),
                type_suffix_of(name),
            );
            return;
        }

        if self.user_fns.contains_key(name) {
            self.generate_inlined_call(name, args, scope);
            return;
        }

        if self.is_block_fn(name) {
            for arg in args {
                self.generate_expression_in(arg, scope);
            }
            self.emit2(IROpcode::CallFunction, name, args.len());
            return;
        }

        // Everything else goes to the runtime builtin dispatcher.
        for arg in args {
            self.generate_expression_in(arg, scope);
        }
        self.emit2(IROpcode::CallBuiltin, name, args.len());
    }

    /// Expands a `DEF FN` call in place.
    ///
    /// Arguments are evaluated with the *caller's* scope (they may mention
    /// the caller's own inlined parameters) and stored into per-parameter
    /// temporaries; the body is then regenerated under a fresh scope that
    /// maps only this function's parameters.
    fn generate_inlined_call(&mut self, name: &str, args: &[Expr], scope: &ParamScope) {
        let Some(func) = self.user_fns.get(name).copied() else {
            self.emit1(IROpcode::PushInt, 0_i64);
            return;
        };

        log::trace!("inlining FN {}", name);

        let mut body_scope = ParamScope::new();
        for (arg, param) in args.iter().zip(func.params.iter()) {
            self.generate_expression_in(arg, scope);
            let temp = format!("__fn_{}_{}", name, param);
            self.emit1(IROpcode::StoreVar, temp.clone());
            body_scope.insert(param.clone(), temp);
        }

        self.generate_expression_in(func.body, &body_scope);
    }

    /// Statically decides whether an expression is string-shaped, which
    /// chooses concatenation over numeric addition for `+`.
    pub(crate) fn is_string_expression(&self, expr: &Expr) -> bool {
        fn name_is_stringy(name: &str) -> bool {
            name.ends_with('$') || (name.len() > 7 && name.ends_with("_STRING"))
        }

        match &expr.kind {
            ExprKind::StringLiteral(_) => true,

            ExprKind::Variable(name) => {
                if let Some(sym) = self.symbols.variables.get(name) {
                    return sym.var_type.is_string();
                }
                if let Some(sym) = self.symbols.arrays.get(name) {
                    return sym.element_type.is_string();
                }
                name_is_stringy(name)
            }

            // Covers builtins (LEFT$, MID$, CHR$, ...) and user functions
            // alike: string-returning names carry the string suffix.
            ExprKind::Call { name, .. } => name_is_stringy(name),

            ExprKind::Binary { left, op, right } => {
                *op == BinaryOp::Add
                    && (self.is_string_expression(left) || self.is_string_expression(right))
            }

            ExprKind::Iif {
                if_true, if_false, ..
            } => self.is_string_expression(if_true) || self.is_string_expression(if_false),

            _ => false,
        }
    }

    /// Serializes a simple condition to its compact re-evaluable text form.
    ///
    /// Handles literals, variable references, and binary/unary operators
    /// over them. Returns `None` for anything else (function calls most
    /// importantly), which makes the WHILE lowering fall back to the
    /// explicit label/jump pattern.
    pub(crate) fn serialize_expression(&self, expr: &Expr) -> Option<String> {
        match &expr.kind {
            ExprKind::NumberLiteral(value) => Some(value.to_string()),

            ExprKind::StringLiteral(value) => {
                let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
                Some(format!("\"{}\"", escaped))
            }

            ExprKind::Variable(name) => Some(format!("var_{}", name)),

            ExprKind::Binary { left, op, right } => {
                let left = self.serialize_expression(left)?;
                let right = self.serialize_expression(right)?;
                let op = match op {
                    BinaryOp::Add => "+",
                    BinaryOp::Subtract => "-",
                    BinaryOp::Multiply => "*",
                    BinaryOp::Divide => "/",
                    BinaryOp::IntDivide => "//",
                    BinaryOp::Modulo => "%",
                    BinaryOp::Power => "^",
                    BinaryOp::Equal => "==",
                    BinaryOp::NotEqual => "~=",
                    BinaryOp::LessThan => "<",
                    BinaryOp::LessEqual => "<=",
                    BinaryOp::GreaterThan => ">",
                    BinaryOp::GreaterEqual => ">=",
                    BinaryOp::And => "and",
                    BinaryOp::Or => "or",
                    _ => return None,
                };
                Some(format!("({} {} {})", left, op, right))
            }

            ExprKind::Unary { op, operand } => {
                let operand = self.serialize_expression(operand)?;
                match op {
                    UnaryOp::Negate => Some(format!("(-{})", operand)),
                    UnaryOp::Not => Some(format!("(not {})", operand)),
                    UnaryOp::Plus => Some(operand),
                }
            }

            // Function calls must re-evaluate through the stack machine.
            ExprKind::Call { .. } | ExprKind::Iif { .. } => None,
        }
    }
}
