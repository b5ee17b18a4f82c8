//! Pass 1: declaration collection.
//!
//! Populates the symbol table before any validation runs, so pass 2 can
//! resolve forward references. Order matters: later collectors assume the
//! earlier tables are complete (constant folding, for instance, may look up
//! names that only exist once line numbers and labels are in).

use crate::ast::{Expr, ExprKind, Program, SourceLocation, StatementKind, StmtRef};
use crate::constants::ConstantValue;
use crate::semantic::error::SemanticError;
use crate::semantic::symbols::{
    ArraySymbol, ConstantSymbol, FunctionKind, FunctionSymbol, LabelSymbol, LineNumberSymbol,
};
use crate::semantic::types::{type_from_name, VariableType};
use crate::semantic::SemanticAnalyzer;

impl SemanticAnalyzer {
    /// Runs every collector, in dependency order.
    pub(crate) fn pass1_collect_declarations(&mut self, program: &Program) {
        self.collect_line_numbers(program);
        self.collect_labels(program);
        self.collect_dim_statements(program);
        self.collect_def_statements(program);
        self.collect_function_and_sub_statements(program);
        self.collect_data_statements(program);
        self.collect_constant_statements(program);
    }

    fn collect_line_numbers(&mut self, program: &Program) {
        for (index, line) in program.lines.iter().enumerate() {
            if line.number == 0 {
                continue;
            }
            if self.symbols.line_numbers.contains_key(&line.number) {
                self.error(SemanticError::DuplicateLineNumber {
                    line: line.number,
                    location: line.location,
                });
                continue;
            }
            self.symbols.line_numbers.insert(
                line.number,
                LineNumberSymbol {
                    line_number: line.number,
                    program_line_index: index,
                    references: Vec::new(),
                },
            );
        }
    }

    fn collect_labels(&mut self, program: &Program) {
        for (index, line) in program.lines.iter().enumerate() {
            for stmt in &line.statements {
                if let StatementKind::Label { name } = &stmt.kind {
                    self.declare_label(name, index, stmt.location);
                }
            }
        }
    }

    fn declare_label(&mut self, name: &str, program_line_index: usize, location: SourceLocation) {
        if self.symbols.labels.contains_key(name) {
            self.error(SemanticError::DuplicateLabel {
                name: name.to_string(),
                location,
            });
            return;
        }
        let label_id = self.symbols.allocate_label_id();
        self.symbols.labels.insert(
            name.to_string(),
            LabelSymbol {
                name: name.to_string(),
                label_id,
                program_line_index,
                definition: location,
                references: Vec::new(),
            },
        );
    }

    fn collect_dim_statements(&mut self, program: &Program) {
        for line in &program.lines {
            for stmt in &line.statements {
                if let StatementKind::Dim { arrays } = &stmt.kind {
                    for decl in arrays {
                        self.process_array_decl(&decl.name, &decl.dimensions, stmt.location);
                    }
                }
            }
        }
    }

    fn process_array_decl(&mut self, name: &str, dims: &[Expr], location: SourceLocation) {
        if self.symbols.arrays.contains_key(name) {
            self.error(SemanticError::ArrayRedeclared {
                name: name.to_string(),
                location,
            });
            return;
        }

        let mut dimensions = Vec::with_capacity(dims.len());
        let mut total_size = 1usize;
        for dim in dims {
            let slots = match &dim.kind {
                &ExprKind::NumberLiteral(value) => {
                    let mut bound = value as i64;
                    if bound <= 0 {
                        self.error(SemanticError::InvalidArrayIndex {
                            message: "Array dimension must be positive".to_string(),
                            location,
                        });
                        bound = 1;
                    }
                    // DIM A(N) declares indices 0..=N, so N+1 slots.
                    (bound + 1) as usize
                }
                _ => {
                    // Non-constant bounds are not evaluated here; assume the
                    // classic default of 10 (11 slots) and tell the user.
                    self.warning("Non-constant array dimension; assuming 10", location);
                    11
                }
            };
            dimensions.push(slots);
            total_size *= slots;
        }

        let element_type = type_from_name(name, self.symbols.unicode_mode);
        self.symbols.arrays.insert(
            name.to_string(),
            ArraySymbol {
                name: name.to_string(),
                element_type,
                dimensions,
                declaration: location,
                total_size,
            },
        );
    }

    fn collect_def_statements(&mut self, program: &Program) {
        for (line_index, line) in program.lines.iter().enumerate() {
            for (stmt_index, stmt) in line.statements.iter().enumerate() {
                if let StatementKind::DefFn { name, params, .. } = &stmt.kind {
                    self.declare_function(FunctionSymbol {
                        name: name.clone(),
                        parameters: params.clone(),
                        return_type: type_from_name(name, self.symbols.unicode_mode),
                        kind: FunctionKind::Expression {
                            body: StmtRef::new(line_index, stmt_index),
                        },
                        definition: stmt.location,
                    });
                }
            }
        }
    }

    fn collect_function_and_sub_statements(&mut self, program: &Program) {
        for line in &program.lines {
            for stmt in &line.statements {
                match &stmt.kind {
                    StatementKind::Function { name, params, .. } => {
                        self.declare_function(FunctionSymbol {
                            name: name.clone(),
                            parameters: params.clone(),
                            return_type: type_from_name(name, self.symbols.unicode_mode),
                            kind: FunctionKind::Block { is_sub: false },
                            definition: stmt.location,
                        });
                    }
                    StatementKind::Sub { name, params, .. } => {
                        self.declare_function(FunctionSymbol {
                            name: name.clone(),
                            parameters: params.clone(),
                            return_type: VariableType::Void,
                            kind: FunctionKind::Block { is_sub: true },
                            definition: stmt.location,
                        });
                    }
                    _ => {}
                }
            }
        }
    }

    fn declare_function(&mut self, symbol: FunctionSymbol) {
        if self.symbols.functions.contains_key(&symbol.name) {
            self.error(SemanticError::FunctionRedeclared {
                name: symbol.name.clone(),
                location: symbol.definition,
            });
            return;
        }
        self.symbols
            .functions
            .insert(symbol.name.clone(), symbol);
    }

    /// Collects DATA statements into the flat pool, in source order.
    ///
    /// A label on a line with no DATA is held pending and attaches to the
    /// next DATA-bearing line; a line with neither clears the pending label.
    fn collect_data_statements(&mut self, program: &Program) {
        let mut pending_label: Option<String> = None;

        for line in &program.lines {
            let mut line_label: Option<String> = None;
            let mut has_data = false;

            for stmt in &line.statements {
                match &stmt.kind {
                    StatementKind::Label { name } => line_label = Some(name.clone()),
                    StatementKind::Data { .. } => has_data = true,
                    _ => {}
                }
            }

            if has_data {
                let effective_label = line_label.or(pending_label.take());
                for stmt in &line.statements {
                    if let StatementKind::Data { values } = &stmt.kind {
                        self.process_data_values(values, line.number, effective_label.as_deref());
                    }
                }
            } else if let Some(label) = line_label {
                pending_label = Some(label);
            } else {
                pending_label = None;
            }
        }
    }

    fn process_data_values(&mut self, values: &[String], line_number: u32, label: Option<&str>) {
        let segment = &mut self.symbols.data_segment;
        let start = segment.values.len();

        if line_number > 0 {
            segment.line_restore_points.insert(line_number, start);
        }
        if let Some(label) = label {
            segment
                .label_restore_points
                .insert(label.to_string(), start);
            log::debug!("DATA label '{}' restores to pool index {}", label, start);
        }

        segment.values.extend(values.iter().cloned());
    }

    fn collect_constant_statements(&mut self, program: &Program) {
        for line in &program.lines {
            for stmt in &line.statements {
                if let StatementKind::Const { name, value } = &stmt.kind {
                    self.process_constant(name, value, stmt.location);
                }
            }
        }
    }

    fn process_constant(&mut self, name: &str, value: &Expr, location: SourceLocation) {
        // A CONST may overwrite an engine/host constant (keeping its index),
        // but redeclaring a program constant is an error.
        if let Some(existing) = self.symbols.constants.get(name) {
            if !existing.is_predefined {
                self.error(SemanticError::DuplicateConstant {
                    name: name.to_string(),
                    location,
                });
                return;
            }
        }

        let folded = self.evaluate_constant_expression(value);
        let index = match &folded {
            ConstantValue::Integer(v) => self.constants.add(name, *v),
            ConstantValue::Float(v) => self.constants.add(name, *v),
            ConstantValue::Text(v) => self.constants.add(name, v.clone()),
        };

        self.symbols.constants.insert(
            name.to_string(),
            ConstantSymbol {
                value: folded,
                index,
                is_predefined: false,
            },
        );
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ProgramLine, Statement};
    use crate::options::CompilerOptions;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new(line, 0)
    }

    fn line(n: u32, stmts: Vec<StatementKind>) -> ProgramLine {
        ProgramLine::new(
            n,
            stmts
                .into_iter()
                .map(|k| Statement::new(k, loc(n)))
                .collect(),
            loc(n),
        )
    }

    fn num(v: f64) -> Expr {
        Expr::new(ExprKind::NumberLiteral(v), loc(0))
    }

    #[test]
    fn test_duplicate_line_numbers() {
        let program = Program::new(vec![
            line(10, vec![StatementKind::End]),
            line(10, vec![StatementKind::End]),
        ]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(!analyzer.analyze(&program, &CompilerOptions::default()));
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::DuplicateLineNumber { line: 10, .. }
        ));
        // The first declaration's index survives.
        assert_eq!(
            analyzer.symbol_table().line_numbers[&10].program_line_index,
            0
        );
    }

    #[test]
    fn test_dim_literal_bound_is_inclusive() {
        let program = Program::new(vec![line(
            10,
            vec![StatementKind::Dim {
                arrays: vec![crate::ast::ArrayDecl {
                    name: "A".to_string(),
                    dimensions: vec![num(5.0)],
                }],
            }],
        )]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&program, &CompilerOptions::default()));

        let array = &analyzer.symbol_table().arrays["A"];
        assert_eq!(array.dimensions, vec![6]); // 0..=5
        assert_eq!(array.total_size, 6);
    }

    #[test]
    fn test_dim_non_constant_bound_warns_and_defaults() {
        let program = Program::new(vec![line(
            10,
            vec![StatementKind::Dim {
                arrays: vec![crate::ast::ArrayDecl {
                    name: "A".to_string(),
                    dimensions: vec![Expr::new(ExprKind::Variable("N".to_string()), loc(10))],
                }],
            }],
        )]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&program, &CompilerOptions::default()));

        assert_eq!(analyzer.symbol_table().arrays["A"].dimensions, vec![11]);
        assert!(analyzer
            .warnings()
            .iter()
            .any(|w| w.message.contains("assuming 10")));
    }

    #[test]
    fn test_duplicate_array_keeps_first_declaration() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Dim {
                    arrays: vec![crate::ast::ArrayDecl {
                        name: "A".to_string(),
                        dimensions: vec![num(3.0)],
                    }],
                }],
            ),
            line(
                20,
                vec![StatementKind::Dim {
                    arrays: vec![crate::ast::ArrayDecl {
                        name: "A".to_string(),
                        dimensions: vec![num(9.0)],
                    }],
                }],
            ),
        ]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(!analyzer.analyze(&program, &CompilerOptions::default()));
        // First declaration wins: location and shape are unchanged.
        let array = &analyzer.symbol_table().arrays["A"];
        assert_eq!(array.declaration.line, 10);
        assert_eq!(array.dimensions, vec![4]);
    }

    #[test]
    fn test_data_pending_label() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Label {
                    name: "enemies".to_string(),
                }],
            ),
            line(
                20,
                vec![StatementKind::Data {
                    values: vec!["1".to_string(), "2".to_string()],
                }],
            ),
            line(30, vec![StatementKind::End]),
            line(
                40,
                vec![StatementKind::Data {
                    values: vec!["3".to_string()],
                }],
            ),
        ]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&program, &CompilerOptions::default()));

        let segment = &analyzer.symbol_table().data_segment;
        assert_eq!(segment.values, vec!["1", "2", "3"]);
        // The pending label from line 10 attached to line 20's DATA.
        assert_eq!(segment.label_restore_points["enemies"], 0);
        assert_eq!(segment.line_restore_points[&20], 0);
        assert_eq!(segment.line_restore_points[&40], 2);
    }

    #[test]
    fn test_pending_label_cleared_by_plain_line() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Label {
                    name: "lost".to_string(),
                }],
            ),
            line(20, vec![StatementKind::End]), // clears the pending label
            line(
                30,
                vec![StatementKind::Data {
                    values: vec!["1".to_string()],
                }],
            ),
        ]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&program, &CompilerOptions::default()));
        assert!(analyzer
            .symbol_table()
            .data_segment
            .label_restore_points
            .is_empty());
    }

    #[test]
    fn test_def_fn_registered_with_body_ref() {
        let program = Program::new(vec![line(
            10,
            vec![StatementKind::DefFn {
                name: "SQUARE".to_string(),
                params: vec!["X".to_string()],
                body: Expr::new(
                    ExprKind::Binary {
                        left: Box::new(Expr::new(ExprKind::Variable("X".to_string()), loc(10))),
                        op: crate::ast::BinaryOp::Multiply,
                        right: Box::new(Expr::new(ExprKind::Variable("X".to_string()), loc(10))),
                    },
                    loc(10),
                ),
            }],
        )]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&program, &CompilerOptions::default()));

        let f = &analyzer.symbol_table().functions["SQUARE"];
        assert!(f.is_expression_fn());
        assert_eq!(f.parameters, vec!["X"]);
    }

    #[test]
    fn test_function_and_def_share_namespace() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::DefFn {
                    name: "F".to_string(),
                    params: vec![],
                    body: num(1.0),
                }],
            ),
            line(
                20,
                vec![StatementKind::Function {
                    name: "F".to_string(),
                    params: vec![],
                    body: vec![],
                }],
            ),
        ]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(!analyzer.analyze(&program, &CompilerOptions::default()));
        assert!(matches!(
            analyzer.errors()[0],
            SemanticError::FunctionRedeclared { .. }
        ));
    }

    #[test]
    fn test_const_duplicate_program_constant() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Const {
                    name: "X".to_string(),
                    value: num(1.0),
                }],
            ),
            line(
                20,
                vec![StatementKind::Const {
                    name: "X".to_string(),
                    value: num(2.0),
                }],
            ),
        ]);
        let mut analyzer = SemanticAnalyzer::new();
        assert!(!analyzer.analyze(&program, &CompilerOptions::default()));
        // First declaration's value survives.
        assert_eq!(
            analyzer.symbol_table().constants["X"].value,
            crate::constants::ConstantValue::Integer(1)
        );
    }
}
