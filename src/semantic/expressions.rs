//! Expression validation and type inference.
//!
//! `infer_expression_type` is structural and bottom-up, and doubles as the
//! expression validator: walking an expression marks variables used,
//! implicitly declares the ones it has never seen, checks array shapes, and
//! reports problems as it goes. Pass 2 calls it on every expression it
//! meets.
//!
//! The ambiguous `name(args)` shape resolves in priority order:
//! declared function → declared array → built-in → registry function →
//! implicit array.

use crate::ast::{Expr, ExprKind, SourceLocation};
use crate::semantic::builtins::ArgCount;
use crate::semantic::error::SemanticError;
use crate::semantic::symbols::VariableSymbol;
use crate::semantic::types::{promote_types, type_from_name, VariableType};
use crate::semantic::SemanticAnalyzer;

impl SemanticAnalyzer {
    /// Validates an expression; type inference happens as a side effect.
    pub(crate) fn validate_expression(&mut self, expr: &Expr) {
        self.infer_expression_type(expr);
    }

    /// Infers the type of an expression, bottom-up.
    pub(crate) fn infer_expression_type(&mut self, expr: &Expr) -> VariableType {
        match &expr.kind {
            ExprKind::NumberLiteral(_) => VariableType::Float,

            ExprKind::StringLiteral(_) => {
                if self.symbols.unicode_mode {
                    VariableType::Unicode
                } else {
                    VariableType::String
                }
            }

            ExprKind::Variable(name) => self.infer_variable_type(name, expr.location),

            ExprKind::Call { name, args } => self.infer_call_type(name, args, expr.location),

            ExprKind::Binary { left, op, right } => {
                let left_type = self.infer_expression_type(left);
                let right_type = self.infer_expression_type(right);

                // `+` over strings is concatenation; Unicode wins.
                if (left_type.is_string() || right_type.is_string())
                    && *op == crate::ast::BinaryOp::Add
                {
                    return if left_type == VariableType::Unicode
                        || right_type == VariableType::Unicode
                    {
                        VariableType::Unicode
                    } else {
                        VariableType::String
                    };
                }

                // Comparisons and logical operators yield numeric truth values.
                if op.is_comparison() || op.is_logical() {
                    return VariableType::Float;
                }

                promote_types(left_type, right_type)
            }

            ExprKind::Unary { op, operand } => {
                let operand_type = self.infer_expression_type(operand);
                match op {
                    crate::ast::UnaryOp::Not => VariableType::Float,
                    crate::ast::UnaryOp::Negate | crate::ast::UnaryOp::Plus => operand_type,
                }
            }

            ExprKind::Iif {
                condition,
                if_true,
                if_false,
            } => {
                self.validate_expression(condition);
                let true_type = self.infer_expression_type(if_true);
                let false_type = self.infer_expression_type(if_false);
                promote_types(true_type, false_type)
            }
        }
    }

    /// A bare name: a constant if one is registered, otherwise a variable
    /// (implicitly declared on first sight).
    fn infer_variable_type(&mut self, name: &str, loc: SourceLocation) -> VariableType {
        if let Some(constant) = self.symbols.constants.get(name) {
            use crate::constants::ConstantValue;
            return match constant.value {
                ConstantValue::Integer(_) => VariableType::Int,
                ConstantValue::Float(_) => VariableType::Float,
                ConstantValue::Text(_) => {
                    if self.symbols.unicode_mode {
                        VariableType::Unicode
                    } else {
                        VariableType::String
                    }
                }
            };
        }

        self.use_variable(name, loc);
        self.symbols
            .variables
            .get(name)
            .map(|sym| sym.var_type)
            .unwrap_or(VariableType::Unknown)
    }

    /// Disambiguates the `name(args)` shape and infers its type.
    fn infer_call_type(&mut self, name: &str, args: &[Expr], loc: SourceLocation) -> VariableType {
        // 1) A declared user function or sub.
        if let Some(func) = self.symbols.functions.get(name) {
            let return_type = func.return_type;
            for arg in args {
                self.validate_expression(arg);
            }
            return return_type;
        }

        // 2) A declared array.
        if self.symbols.arrays.contains_key(name) {
            self.use_array(name, args.len(), loc);
            self.validate_array_indices(args, loc);
            return self
                .symbols
                .arrays
                .get(name)
                .map(|sym| sym.element_type)
                .unwrap_or(VariableType::Unknown);
        }

        // 3) A core built-in.
        if self.builtins.contains(name) {
            if let Some(ArgCount::Exact(expected)) = self.builtins.arg_count(name) {
                if args.len() != expected {
                    self.error(SemanticError::type_mismatch(
                        format!(
                            "Built-in function {} expects {} argument(s), got {}",
                            name,
                            expected,
                            args.len()
                        ),
                        loc,
                    ));
                }
            }
            for arg in args {
                self.validate_expression(arg);
            }
            return self
                .builtins
                .return_type(name, self.symbols.unicode_mode);
        }

        // 4) A host-registered function.
        if let Some(func) = self.registry.function(name) {
            let expected = func.arg_count;
            let returns = func.returns;
            if let Some(expected) = expected {
                if args.len() != expected {
                    self.error(SemanticError::type_mismatch(
                        format!(
                            "Function {} expects {} argument(s), got {}",
                            name,
                            expected,
                            args.len()
                        ),
                        loc,
                    ));
                }
            }
            for arg in args {
                self.validate_expression(arg);
            }
            return returns.variable_type(self.symbols.unicode_mode);
        }

        // 5) Nothing matched: treat as an array that was never DIMmed.
        self.use_array(name, args.len(), loc);
        self.validate_array_indices(args, loc);
        self.symbols
            .arrays
            .get(name)
            .map(|sym| sym.element_type)
            .unwrap_or(VariableType::Unknown)
    }

    fn validate_array_indices(&mut self, indices: &[Expr], loc: SourceLocation) {
        for index in indices {
            let index_type = self.infer_expression_type(index);
            if !index_type.is_numeric() && index_type != VariableType::Unknown {
                self.error(SemanticError::InvalidArrayIndex {
                    message: "Array index must be numeric".to_string(),
                    location: loc,
                });
            }
        }
    }

    /// Marks a variable used, implicitly declaring it on first reference.
    pub(crate) fn use_variable(&mut self, name: &str, loc: SourceLocation) {
        if !self.symbols.variables.contains_key(name) {
            let var_type = type_from_name(name, self.symbols.unicode_mode);
            self.symbols.variables.insert(
                name.to_string(),
                VariableSymbol {
                    name: name.to_string(),
                    var_type,
                    is_declared: false,
                    is_used: false,
                    first_use: loc,
                },
            );
        }
        if let Some(sym) = self.symbols.variables.get_mut(name) {
            sym.is_used = true;
        }
    }

    /// Validates an array use: declared (unless the requirement is off)
    /// and accessed with the dimension count it was declared with.
    pub(crate) fn use_array(&mut self, name: &str, dimension_count: usize, loc: SourceLocation) {
        // A function call in array clothing needs no array checks.
        if self.symbols.functions.contains_key(name) {
            return;
        }

        let declared_dims = match self.symbols.arrays.get(name) {
            Some(sym) => sym.dimensions.len(),
            None => {
                if self.require_explicit_dim {
                    self.error(SemanticError::ArrayNotDeclared {
                        name: name.to_string(),
                        location: loc,
                    });
                }
                return;
            }
        };

        if dimension_count != declared_dims {
            self.error(SemanticError::WrongDimensionCount {
                name: name.to_string(),
                expected: declared_dims,
                found: dimension_count,
                location: loc,
            });
        }
    }

    /// A string-family value can never cross into the numeric family (or
    /// back); everything within a family converts implicitly.
    pub(crate) fn check_type_compatibility(
        &mut self,
        expected: VariableType,
        actual: VariableType,
        loc: SourceLocation,
        context: &str,
    ) {
        if expected == VariableType::Unknown || actual == VariableType::Unknown {
            return;
        }
        if expected.is_string() != actual.is_string() {
            self.error(SemanticError::type_mismatch(
                format!("cannot assign {} to {} in {}", actual, expected, context),
                loc,
            ));
        }
    }
}
