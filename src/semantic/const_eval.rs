//! Compile-time constant expression evaluation.
//!
//! A small recursive evaluator used for `CONST` initializers. It handles
//! literals, arithmetic, string concatenation, a fixed allow-list of
//! built-in functions, and references to already-declared constants.
//!
//! Failures (unsupported shapes, arity mismatches, non-numeric operands,
//! forward constant references) report an error and yield integer zero so
//! the surrounding analysis keeps going; one bad CONST never aborts a
//! compile.
//!
//! Numeric results auto-classify: a value that is exactly representable as
//! a 64-bit integer folds to `Integer`, everything else stays `Float`.

use crate::ast::{BinaryOp, Expr, ExprKind, UnaryOp};
use crate::constants::ConstantValue;
use crate::semantic::error::SemanticError;
use crate::semantic::SemanticAnalyzer;

/// Classifies a numeric result: integral and in range folds to Integer.
fn classify_numeric(value: f64) -> ConstantValue {
    if value.fract() == 0.0 && value >= i64::MIN as f64 && value <= i64::MAX as f64 {
        ConstantValue::Integer(value as i64)
    } else {
        ConstantValue::Float(value)
    }
}

fn as_f64(value: &ConstantValue) -> f64 {
    match value {
        ConstantValue::Integer(v) => *v as f64,
        ConstantValue::Float(v) => *v,
        ConstantValue::Text(_) => 0.0,
    }
}

fn as_i64(value: &ConstantValue) -> i64 {
    match value {
        ConstantValue::Integer(v) => *v,
        ConstantValue::Float(v) => *v as i64,
        ConstantValue::Text(_) => 0,
    }
}

/// Renders a numeric operand for string concatenation.
fn as_text(value: &ConstantValue) -> String {
    match value {
        ConstantValue::Text(s) => s.clone(),
        ConstantValue::Integer(v) => v.to_string(),
        ConstantValue::Float(v) => v.to_string(),
    }
}

impl SemanticAnalyzer {
    /// Fully evaluates a constant expression at compile time.
    pub(crate) fn evaluate_constant_expression(&mut self, expr: &Expr) -> ConstantValue {
        match &expr.kind {
            ExprKind::NumberLiteral(value) => classify_numeric(*value),
            ExprKind::StringLiteral(value) => ConstantValue::Text(value.clone()),
            ExprKind::Binary { left, op, right } => self.eval_const_binary(expr, left, *op, right),
            ExprKind::Unary { op, operand } => self.eval_const_unary(expr, *op, operand),
            ExprKind::Call { name, args } => self.eval_const_function(expr, name, args),
            ExprKind::Variable(name) => self.eval_const_variable(expr, name),
            ExprKind::Iif { .. } => {
                self.error(SemanticError::type_mismatch(
                    "Expression type not supported in constant evaluation",
                    expr.location,
                ));
                ConstantValue::Integer(0)
            }
        }
    }

    fn eval_const_binary(
        &mut self,
        expr: &Expr,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
    ) -> ConstantValue {
        let left = self.evaluate_constant_expression(left);
        let right = self.evaluate_constant_expression(right);

        // `+` concatenates whenever either side is a string; the numeric
        // side is rendered decimally.
        if op == BinaryOp::Add
            && (matches!(left, ConstantValue::Text(_)) || matches!(right, ConstantValue::Text(_)))
        {
            return ConstantValue::Text(as_text(&left) + &as_text(&right));
        }

        if !left.is_numeric() || !right.is_numeric() {
            self.error(SemanticError::type_mismatch(
                "Constant expression requires numeric operands",
                expr.location,
            ));
            return ConstantValue::Integer(0);
        }

        let both_int = matches!(
            (&left, &right),
            (ConstantValue::Integer(_), ConstantValue::Integer(_))
        );

        match op {
            BinaryOp::Add => {
                if both_int {
                    ConstantValue::Integer(as_i64(&left).wrapping_add(as_i64(&right)))
                } else {
                    classify_numeric(as_f64(&left) + as_f64(&right))
                }
            }
            BinaryOp::Subtract => {
                if both_int {
                    ConstantValue::Integer(as_i64(&left).wrapping_sub(as_i64(&right)))
                } else {
                    classify_numeric(as_f64(&left) - as_f64(&right))
                }
            }
            BinaryOp::Multiply => {
                if both_int {
                    ConstantValue::Integer(as_i64(&left).wrapping_mul(as_i64(&right)))
                } else {
                    classify_numeric(as_f64(&left) * as_f64(&right))
                }
            }
            BinaryOp::Divide => classify_numeric(as_f64(&left) / as_f64(&right)),
            BinaryOp::Power => classify_numeric(as_f64(&left).powf(as_f64(&right))),
            BinaryOp::Modulo => {
                if both_int {
                    let divisor = as_i64(&right);
                    if divisor == 0 {
                        self.error(SemanticError::type_mismatch(
                            "Division by zero in constant expression",
                            expr.location,
                        ));
                        return ConstantValue::Integer(0);
                    }
                    ConstantValue::Integer(as_i64(&left) % divisor)
                } else {
                    classify_numeric(as_f64(&left) % as_f64(&right))
                }
            }
            BinaryOp::IntDivide => {
                let divisor = as_i64(&right);
                if divisor == 0 {
                    self.error(SemanticError::type_mismatch(
                        "Division by zero in constant expression",
                        expr.location,
                    ));
                    return ConstantValue::Integer(0);
                }
                ConstantValue::Integer(as_i64(&left) / divisor)
            }
            BinaryOp::And => ConstantValue::Integer(as_i64(&left) & as_i64(&right)),
            BinaryOp::Or => ConstantValue::Integer(as_i64(&left) | as_i64(&right)),
            BinaryOp::Xor => ConstantValue::Integer(as_i64(&left) ^ as_i64(&right)),
            _ => {
                self.error(SemanticError::type_mismatch(
                    "Operator not supported in constant expressions",
                    expr.location,
                ));
                ConstantValue::Integer(0)
            }
        }
    }

    fn eval_const_unary(&mut self, expr: &Expr, op: UnaryOp, operand: &Expr) -> ConstantValue {
        let operand = self.evaluate_constant_expression(operand);
        match op {
            UnaryOp::Negate => match operand {
                ConstantValue::Integer(v) => ConstantValue::Integer(-v),
                ConstantValue::Float(v) => ConstantValue::Float(-v),
                ConstantValue::Text(_) => {
                    self.error(SemanticError::type_mismatch(
                        "Cannot negate a string constant",
                        expr.location,
                    ));
                    ConstantValue::Integer(0)
                }
            },
            UnaryOp::Plus => operand,
            UnaryOp::Not => ConstantValue::Integer(!as_i64(&operand)),
        }
    }

    fn eval_const_function(&mut self, expr: &Expr, name: &str, args: &[Expr]) -> ConstantValue {
        let name = name.to_uppercase();

        // One-argument numeric functions.
        if args.len() == 1 {
            let numeric = |this: &mut Self, f: fn(f64) -> f64, args: &[Expr]| {
                let arg = this.evaluate_constant_expression(&args[0]);
                classify_numeric(f(as_f64(&arg)))
            };
            match name.as_str() {
                "ABS" => {
                    let arg = self.evaluate_constant_expression(&args[0]);
                    return match arg {
                        ConstantValue::Integer(v) => ConstantValue::Integer(v.abs()),
                        other => classify_numeric(as_f64(&other).abs()),
                    };
                }
                "SIN" => return numeric(self, f64::sin, args),
                "COS" => return numeric(self, f64::cos, args),
                "TAN" => return numeric(self, f64::tan, args),
                "ATN" => return numeric(self, f64::atan, args),
                "EXP" => return numeric(self, f64::exp, args),
                "LOG" => return numeric(self, f64::ln, args),
                "SQR" => return numeric(self, f64::sqrt, args),
                "INT" => {
                    let arg = self.evaluate_constant_expression(&args[0]);
                    return ConstantValue::Integer(as_f64(&arg).floor() as i64);
                }
                "SGN" => {
                    let arg = self.evaluate_constant_expression(&args[0]);
                    let v = as_f64(&arg);
                    return ConstantValue::Integer(if v > 0.0 {
                        1
                    } else if v < 0.0 {
                        -1
                    } else {
                        0
                    });
                }
                "LEN" => {
                    let arg = self.evaluate_constant_expression(&args[0]);
                    return match arg {
                        ConstantValue::Text(s) => ConstantValue::Integer(s.chars().count() as i64),
                        _ => {
                            self.error(SemanticError::type_mismatch(
                                "LEN requires string argument",
                                expr.location,
                            ));
                            ConstantValue::Integer(0)
                        }
                    };
                }
                "CHR$" | "CHR" => {
                    let arg = self.evaluate_constant_expression(&args[0]);
                    let code = as_i64(&arg);
                    return if (0..=255).contains(&code) {
                        ConstantValue::Text((code as u8 as char).to_string())
                    } else {
                        self.error(SemanticError::type_mismatch(
                            "CHR$ argument must be 0-255",
                            expr.location,
                        ));
                        ConstantValue::Text(String::new())
                    };
                }
                "STR$" => {
                    let arg = self.evaluate_constant_expression(&args[0]);
                    return ConstantValue::Text(as_text(&arg));
                }
                "VAL" => {
                    let arg = self.evaluate_constant_expression(&args[0]);
                    return match arg {
                        ConstantValue::Text(s) => {
                            let trimmed = s.trim();
                            if let Ok(v) = trimmed.parse::<i64>() {
                                ConstantValue::Integer(v)
                            } else if let Ok(v) = trimmed.parse::<f64>() {
                                ConstantValue::Float(v)
                            } else {
                                ConstantValue::Float(0.0)
                            }
                        }
                        numeric => numeric,
                    };
                }
                _ => {}
            }
        }

        // Two-argument functions.
        if args.len() == 2 {
            match name.as_str() {
                "MIN" | "MAX" => {
                    let a = self.evaluate_constant_expression(&args[0]);
                    let b = self.evaluate_constant_expression(&args[1]);
                    let (a, b) = (as_f64(&a), as_f64(&b));
                    return classify_numeric(if name == "MIN" { a.min(b) } else { a.max(b) });
                }
                "LEFT$" | "LEFT" => {
                    let s = self.evaluate_constant_expression(&args[0]);
                    let n = self.evaluate_constant_expression(&args[1]);
                    return match s {
                        ConstantValue::Text(s) => {
                            let n = as_i64(&n).max(0) as usize;
                            ConstantValue::Text(s.chars().take(n).collect())
                        }
                        _ => {
                            self.error(SemanticError::type_mismatch(
                                "LEFT$ requires string argument",
                                expr.location,
                            ));
                            ConstantValue::Text(String::new())
                        }
                    };
                }
                "RIGHT$" | "RIGHT" => {
                    let s = self.evaluate_constant_expression(&args[0]);
                    let n = self.evaluate_constant_expression(&args[1]);
                    return match s {
                        ConstantValue::Text(s) => {
                            let len = s.chars().count();
                            let n = (as_i64(&n).max(0) as usize).min(len);
                            ConstantValue::Text(s.chars().skip(len - n).collect())
                        }
                        _ => {
                            self.error(SemanticError::type_mismatch(
                                "RIGHT$ requires string argument",
                                expr.location,
                            ));
                            ConstantValue::Text(String::new())
                        }
                    };
                }
                _ => {}
            }
        }

        // MID$ takes two or three arguments.
        if (name == "MID$" || name == "MID") && (args.len() == 2 || args.len() == 3) {
            let s = self.evaluate_constant_expression(&args[0]);
            let start = self.evaluate_constant_expression(&args[1]);
            return match s {
                ConstantValue::Text(s) => {
                    // BASIC string positions are 1-based.
                    let start = (as_i64(&start) - 1).max(0) as usize;
                    let rest: String = s.chars().skip(start).collect();
                    if args.len() == 3 {
                        let len = self.evaluate_constant_expression(&args[2]);
                        let len = as_i64(&len).max(0) as usize;
                        ConstantValue::Text(rest.chars().take(len).collect())
                    } else {
                        ConstantValue::Text(rest)
                    }
                }
                _ => {
                    self.error(SemanticError::type_mismatch(
                        "MID$ requires string argument",
                        expr.location,
                    ));
                    ConstantValue::Text(String::new())
                }
            };
        }

        self.error(SemanticError::UndefinedFunction {
            name: format!(
                "{} (not supported in constant expressions or wrong number of arguments)",
                name
            ),
            location: expr.location,
        });
        ConstantValue::Integer(0)
    }

    /// Named-constant lookup; forward references to constants declared on
    /// later lines have not been folded yet and are an error.
    fn eval_const_variable(&mut self, expr: &Expr, name: &str) -> ConstantValue {
        match self.symbols.constants.get(name) {
            Some(symbol) => symbol.value.clone(),
            None => {
                self.error(SemanticError::UndefinedConstant {
                    name: name.to_string(),
                    location: expr.location,
                });
                ConstantValue::Integer(0)
            }
        }
    }
}
