//! CFG-driven IR generation.
//!
//! The generator walks basic blocks in order, emits one `LABEL` per block,
//! and lowers each block's statements through a single dispatch keyed on
//! statement kind. Jump targets resolve to integer labels up front: block
//! labels are pre-assigned before any body is lowered, so forward jumps
//! always find their target.
//!
//! Semantic analysis has already accepted the program by the time this
//! runs, so the generator performs no fresh validation. Unresolved names
//! recover with a dummy label or a zero push rather than failing; the one
//! hard error is `WEND` with no open `WHILE`, which can only mean the
//! driver skipped validation.

use crate::ast::{
    EventHandler, Expr, ExitKind, JumpTarget, LoopTestKind, Program, Statement, StatementKind,
};
use crate::cfg::{BasicBlock, ControlFlowGraph};
use crate::ir::{IRCode, IRInstruction, IROpcode, Operand};
use crate::semantic::symbols::{FunctionKind, SymbolTable};
use crate::semantic::type_suffix_of;
use std::collections::HashMap;
use thiserror::Error;

/// Internal-consistency failures during IR generation.
///
/// These indicate a driver bug (generating IR for a program that never
/// passed semantic analysis), not bad user input.
#[derive(Debug, Error)]
pub enum IRGenError {
    /// A `WEND` was lowered with no `WHILE` on the stack.
    #[error("WEND without matching WHILE at line {line}")]
    WendWithoutWhile { line: u32 },
}

/// A single-expression function registered for inlining.
#[derive(Clone, Copy)]
pub(crate) struct InlineFn<'a> {
    pub params: &'a [String],
    pub body: &'a Expr,
}

/// Lowers (CFG, SymbolTable) into an [`IRCode`] stream.
pub struct IRGenerator<'a> {
    cfg: &'a ControlFlowGraph,
    program: &'a Program,
    pub(crate) symbols: &'a SymbolTable,
    code: IRCode,

    next_label: i64,
    block_labels: HashMap<usize, i64>,
    /// Open WHILE loops: the loop-back label, or `None` when the condition
    /// was serialized for deferred re-evaluation.
    while_labels: Vec<Option<i64>>,

    /// `DEF FN` bodies, pre-registered so calls inline even before the
    /// defining line is reached in block order.
    pub(crate) user_fns: HashMap<&'a str, InlineFn<'a>>,
    /// Names of block FUNCTIONs/SUBs, which lower to real calls.
    block_fns: Vec<&'a str>,

    current_line: u32,
    current_block: usize,
}

impl<'a> IRGenerator<'a> {
    /// Generates IR for a program whose CFG and symbol table are in hand.
    pub fn generate(
        cfg: &'a ControlFlowGraph,
        program: &'a Program,
        symbols: &'a SymbolTable,
    ) -> Result<IRCode, IRGenError> {
        let mut generator = IRGenerator {
            cfg,
            program,
            symbols,
            code: IRCode {
                block_count: cfg.block_count(),
                data: symbols.data_segment.clone(),
                array_base: symbols.array_base,
                unicode_mode: symbols.unicode_mode,
                error_tracking: symbols.error_tracking,
                cancellable_loops: symbols.cancellable_loops,
                events_used: symbols.events_used,
                ..Default::default()
            },
            next_label: 1,
            block_labels: HashMap::new(),
            while_labels: Vec::new(),
            user_fns: HashMap::new(),
            block_fns: Vec::new(),
            current_line: 0,
            current_block: 0,
        };

        generator.register_functions();

        // Labels first, bodies second, so forward jumps resolve.
        for block in &cfg.blocks {
            generator.label_for_block(block.id);
        }
        for block in &cfg.blocks {
            generator.generate_block(block)?;
        }

        if !matches!(
            generator.code.instructions.last().map(|i| i.opcode),
            Some(IROpcode::Halt)
        ) {
            generator.emit(IROpcode::Halt);
        }

        generator.code.label_count = (generator.next_label - 1) as usize;
        Ok(generator.code)
    }

    /// Seeds the function maps from the symbol table, resolving `DEF FN`
    /// bodies through their statement handles.
    fn register_functions(&mut self) {
        let symbols: &'a SymbolTable = self.symbols;
        let program: &'a Program = self.program;
        for (name, symbol) in &symbols.functions {
            match &symbol.kind {
                FunctionKind::Expression { body } => {
                    if let Some(stmt) = program.statement(*body) {
                        if let StatementKind::DefFn { params, body, .. } = &stmt.kind {
                            self.user_fns.insert(name.as_str(), InlineFn { params, body });
                        }
                    }
                }
                FunctionKind::Block { .. } => self.block_fns.push(name.as_str()),
            }
        }
        log::debug!(
            "registered {} inline fn(s), {} block fn(s)",
            self.user_fns.len(),
            self.block_fns.len()
        );
    }

    pub(crate) fn is_block_fn(&self, name: &str) -> bool {
        self.block_fns.contains(&name)
    }

    fn generate_block(&mut self, block: &BasicBlock) -> Result<(), IRGenError> {
        self.set_context(block.first_line_number(), block.id);

        let label = self.label_for_block(block.id);
        self.emit1(IROpcode::Label, label);

        // Map every covered line to the address of its first instruction.
        for &line in &block.line_numbers {
            if line > 0 {
                let addr = self.code.instructions.len();
                self.code.line_to_address.insert(line, addr);
            }
        }

        for &stmt_ref in &block.statements {
            let Some(stmt) = self.program.statement(stmt_ref) else {
                continue;
            };
            let line = self.program.line_number_of(stmt_ref);
            self.generate_statement(stmt, line)?;
        }

        // If the block's last statement did not transfer control itself and
        // the CFG gives no implicit fallthrough, thread an explicit jump to
        // the first successor.
        let has_explicit_flow = block
            .statements
            .last()
            .and_then(|&r| self.program.statement(r))
            .map(|stmt| {
                matches!(
                    stmt.kind,
                    StatementKind::Goto { .. }
                        | StatementKind::Gosub { .. }
                        | StatementKind::Return { .. }
                        | StatementKind::End
                        | StatementKind::If { .. }
                )
            })
            .unwrap_or(false);

        if !has_explicit_flow
            && !block.successors.is_empty()
            && !self.cfg.has_fallthrough_from(block.id)
        {
            let target = self.label_for_block(block.successors[0]);
            self.emit1(IROpcode::Jump, target);
        }

        Ok(())
    }

    fn generate_statement(&mut self, stmt: &Statement, line: u32) -> Result<(), IRGenError> {
        self.set_context(line, self.current_block);

        match &stmt.kind {
            StatementKind::Print {
                items,
                trailing_newline,
            } => {
                let count = items.len();
                for (i, item) in items.iter().enumerate() {
                    self.generate_expression(&item.expr);
                    self.emit1(IROpcode::Print, 0_i64);
                    // Comma separators tab to the next print zone.
                    if i + 1 < count
                        && item.separator == Some(crate::ast::PrintSeparator::Comma)
                    {
                        self.emit1(IROpcode::PrintTab, 14_i64);
                    }
                }
                if *trailing_newline {
                    self.emit(IROpcode::PrintNewline);
                }
            }

            StatementKind::Input { prompt, variables } => {
                if let Some(prompt) = prompt {
                    self.emit1(IROpcode::InputPrompt, prompt.as_str());
                }
                for name in variables {
                    self.emit1(IROpcode::Input, name.as_str());
                }
            }

            StatementKind::Let {
                variable,
                indices,
                value,
            } => {
                self.generate_expression(value);
                if indices.is_empty() {
                    self.emit1(IROpcode::StoreVar, variable.as_str());
                } else {
                    for index in indices {
                        self.generate_expression(index);
                    }
                    self.emit3(
                        IROpcode::StoreArray,
                        variable.as_str(),
                        indices.len(),
                        type_suffix_of(variable),
                    );
                }
            }

            StatementKind::If {
                condition,
                goto_line,
                then_branch,
                elseif_branches,
                else_branch,
            } => {
                self.generate_expression(condition);

                if let Some(target_line) = goto_line {
                    // IF cond THEN GOTO: a bare conditional jump, with
                    // fallthrough on false.
                    let target = self.label_for_line(*target_line);
                    self.emit1(IROpcode::JumpIfTrue, target);
                    return Ok(());
                }

                self.emit(IROpcode::IfStart);
                for s in then_branch {
                    self.generate_statement(s, line)?;
                }
                for clause in elseif_branches {
                    self.generate_expression(&clause.condition);
                    self.emit(IROpcode::ElseifStart);
                    for s in &clause.body {
                        self.generate_statement(s, line)?;
                    }
                }
                if !else_branch.is_empty() {
                    self.emit(IROpcode::ElseStart);
                    for s in else_branch {
                        self.generate_statement(s, line)?;
                    }
                }
                self.emit(IROpcode::IfEnd);
            }

            StatementKind::Case {
                selector,
                when_clauses,
                otherwise,
            } => self.generate_case(selector, when_clauses, otherwise, line)?,

            StatementKind::For {
                variable,
                start,
                end,
                step,
            } => {
                self.generate_expression(start);
                self.generate_expression(end);
                match step {
                    Some(step) => self.generate_expression(step),
                    None => self.emit1(IROpcode::PushInt, 1_i64),
                }
                self.emit1(IROpcode::ForInit, variable.as_str());
            }

            StatementKind::Next { variable } => {
                // The loop-back target is the CFG's business; FOR_NEXT just
                // names the variable (empty for a bare NEXT).
                self.emit1(IROpcode::ForNext, variable.as_deref().unwrap_or(""));
            }

            StatementKind::While { condition } => self.generate_while(condition),

            StatementKind::Wend => {
                let Some(entry) = self.while_labels.pop() else {
                    return Err(IRGenError::WendWithoutWhile { line });
                };
                match entry {
                    // Explicit loop-back label for the re-evaluated form.
                    Some(label) => self.emit1(IROpcode::WhileEnd, label),
                    // Deferred evaluation needs no jump target.
                    None => self.emit(IROpcode::WhileEnd),
                }
            }

            StatementKind::Repeat => self.emit(IROpcode::RepeatStart),

            StatementKind::Until { condition } => {
                self.generate_expression(condition);
                self.emit(IROpcode::RepeatEnd);
            }

            StatementKind::Do { test } => match test {
                None => self.emit(IROpcode::DoStart),
                Some(test) => {
                    self.generate_expression(&test.condition);
                    match test.kind {
                        LoopTestKind::While => self.emit(IROpcode::DoWhileStart),
                        LoopTestKind::Until => self.emit(IROpcode::DoUntilStart),
                    }
                }
            },

            StatementKind::Loop { test } => match test {
                None => self.emit(IROpcode::DoLoopEnd),
                Some(test) => {
                    self.generate_expression(&test.condition);
                    match test.kind {
                        LoopTestKind::While => self.emit(IROpcode::DoLoopWhile),
                        LoopTestKind::Until => self.emit(IROpcode::DoLoopUntil),
                    }
                }
            },

            StatementKind::Goto { target } => match target {
                JumpTarget::Label(name) => {
                    let label = self.label_id_or_dummy(name);
                    // Symbolic targets carry no line ordering, so stay
                    // conservative and never mark them as loops.
                    self.emit_jump(IROpcode::Jump, label, false);
                }
                JumpTarget::Line(target_line) => {
                    let label = self.label_for_line(*target_line);
                    let is_loop = self.cfg.is_back_edge(line, *target_line);
                    self.emit_jump(IROpcode::Jump, label, is_loop);
                }
            },

            StatementKind::Gosub { target } => {
                let label = match target {
                    JumpTarget::Label(name) => self.label_id_or_dummy(name),
                    JumpTarget::Line(target_line) => self.label_for_line(*target_line),
                };
                self.emit1(IROpcode::CallGosub, label);
            }

            StatementKind::Return { value } => match value {
                Some(value) => {
                    self.generate_expression(value);
                    self.emit(IROpcode::ReturnValue);
                }
                None => self.emit(IROpcode::ReturnGosub),
            },

            StatementKind::OnGoto { selector, targets } => {
                self.generate_expression(selector);
                let list = self.resolve_target_list(targets);
                self.emit1(IROpcode::OnGoto, list);
            }

            StatementKind::OnGosub { selector, targets } => {
                self.generate_expression(selector);
                let list = self.resolve_target_list(targets);
                self.emit1(IROpcode::OnGosub, list);
            }

            StatementKind::OnCall {
                selector,
                functions,
            } => {
                self.generate_expression(selector);
                self.emit1(IROpcode::OnCall, functions.join(","));
            }

            StatementKind::OnEvent { event, handler } => {
                let descriptor = self.event_descriptor(event, handler);
                self.emit1(IROpcode::OnEvent, descriptor);
            }

            StatementKind::Read { variables } => {
                for name in variables {
                    self.emit1(IROpcode::ReadData, name.as_str());
                }
            }

            StatementKind::Restore { target } => match target {
                // The runtime data manager resolves these; emit them raw.
                Some(JumpTarget::Label(name)) => self.emit1(IROpcode::Restore, name.as_str()),
                Some(JumpTarget::Line(n)) => self.emit1(IROpcode::Restore, *n as i64),
                None => self.emit(IROpcode::Restore),
            },

            StatementKind::Dim { arrays } => {
                for decl in arrays {
                    for dim in &decl.dimensions {
                        self.generate_expression(dim);
                    }
                    self.emit3(
                        IROpcode::DimArray,
                        decl.name.as_str(),
                        decl.dimensions.len(),
                        type_suffix_of(&decl.name),
                    );
                }
            }

            // Values collected into the data segment in pass 1; no IR here.
            StatementKind::Data { .. } => {}

            // Folded at compile time; names load through LOAD_CONST.
            StatementKind::Const { .. } => {}

            // Registered before block lowering began; inlined at call sites.
            StatementKind::DefFn { .. } => {}

            StatementKind::Function { name, params, body } => {
                self.emit1(IROpcode::DefineFunction, name.as_str());
                self.emit1(IROpcode::PushInt, params.len());
                for param in params {
                    self.emit1(IROpcode::PushString, param.as_str());
                }
                for s in body {
                    self.generate_statement(s, line)?;
                }
                self.emit(IROpcode::EndFunction);
            }

            StatementKind::Sub { name, params, body } => {
                self.emit1(IROpcode::DefineSub, name.as_str());
                self.emit1(IROpcode::PushInt, params.len());
                for param in params {
                    self.emit1(IROpcode::PushString, param.as_str());
                }
                for s in body {
                    self.generate_statement(s, line)?;
                }
                self.emit(IROpcode::EndSub);
            }

            StatementKind::Call { name, args } => {
                for arg in args {
                    self.generate_expression(arg);
                }
                self.emit2(IROpcode::CallSub, name.as_str(), args.len());
            }

            StatementKind::Exit { kind } => {
                let opcode = match kind {
                    ExitKind::For => IROpcode::ExitFor,
                    ExitKind::While => IROpcode::ExitWhile,
                    ExitKind::Repeat => IROpcode::ExitRepeat,
                    ExitKind::Do => IROpcode::ExitDo,
                    ExitKind::Function => IROpcode::ExitFunction,
                    ExitKind::Sub => IROpcode::ExitSub,
                };
                self.emit(opcode);
            }

            StatementKind::End => self.emit(IROpcode::End),

            StatementKind::Rem { .. } => self.emit(IROpcode::Nop),

            StatementKind::Label { name } => {
                if let Some(symbol) = self.symbols.labels.get(name) {
                    let id = symbol.label_id;
                    self.emit1(IROpcode::Label, id);
                }
                // Unknown labels were already reported upstream.
            }

            StatementKind::Command { name, args } => {
                for arg in args {
                    self.generate_expression(arg);
                }
                self.emit2(IROpcode::CallBuiltin, name.as_str(), args.len());
            }
        }

        Ok(())
    }

    /// `CASE x OF WHEN a, b: ...` lowers to the same structured brackets as
    /// IF/ELSEIF, with each WHEN's value list becoming an EQ/OR chain.
    fn generate_case(
        &mut self,
        selector: &Expr,
        when_clauses: &[crate::ast::WhenClause],
        otherwise: &[Statement],
        line: u32,
    ) -> Result<(), IRGenError> {
        if when_clauses.is_empty() {
            for s in otherwise {
                self.generate_statement(s, line)?;
            }
            return Ok(());
        }

        for (i, clause) in when_clauses.iter().enumerate() {
            for (v, value) in clause.values.iter().enumerate() {
                self.generate_expression(selector);
                self.generate_expression(value);
                self.emit(IROpcode::Eq);
                if v > 0 {
                    self.emit(IROpcode::Or);
                }
            }
            self.emit(if i == 0 {
                IROpcode::IfStart
            } else {
                IROpcode::ElseifStart
            });
            for s in &clause.body {
                self.generate_statement(s, line)?;
            }
        }

        if !otherwise.is_empty() {
            self.emit(IROpcode::ElseStart);
            for s in otherwise {
                self.generate_statement(s, line)?;
            }
        }
        self.emit(IROpcode::IfEnd);
        Ok(())
    }

    /// WHILE conditions that serialize to a compact textual form are handed
    /// to the code generator for native re-evaluation each iteration; the
    /// rest fall back to an explicit label before the condition and a
    /// loop-back through WHILE_END.
    fn generate_while(&mut self, condition: &Expr) {
        if let Some(serialized) = self.serialize_expression(condition) {
            self.emit1(IROpcode::WhileStart, serialized);
            self.while_labels.push(None);
        } else {
            let label = self.allocate_label();
            self.emit1(IROpcode::Label, label);
            self.while_labels.push(Some(label));
            self.generate_expression(condition);
            self.emit1(IROpcode::WhileStart, label);
        }
    }

    /// Comma-joined label list for ON GOTO / ON GOSUB. Unresolvable labels
    /// encode as -1 (already reported upstream).
    fn resolve_target_list(&mut self, targets: &[JumpTarget]) -> String {
        let mut out = Vec::with_capacity(targets.len());
        for target in targets {
            let label = match target {
                JumpTarget::Label(name) => self
                    .symbols
                    .labels
                    .get(name)
                    .map(|sym| sym.label_id)
                    .unwrap_or(-1),
                JumpTarget::Line(line) => self.label_for_line(*line),
            };
            out.push(label.to_string());
        }
        out.join(",")
    }

    /// Builds the `event|handler|target|isline` descriptor, resolving
    /// numeric-line GOTO/GOSUB targets to label ids up front.
    fn event_descriptor(&mut self, event: &str, handler: &EventHandler) -> String {
        let (kind, target, is_line) = match handler {
            EventHandler::Call { function } => ("call", function.clone(), false),
            EventHandler::Goto { target } | EventHandler::Gosub { target } => {
                let kind = if matches!(handler, EventHandler::Goto { .. }) {
                    "goto"
                } else {
                    "gosub"
                };
                match target {
                    JumpTarget::Line(line) => {
                        (kind, self.label_for_line(*line).to_string(), true)
                    }
                    JumpTarget::Label(name) => (kind, name.clone(), false),
                }
            }
        };
        format!("{}|{}|{}|{}", event, kind, target, is_line)
    }

    // === Label management ===

    fn label_for_block(&mut self, block: usize) -> i64 {
        if let Some(&label) = self.block_labels.get(&block) {
            return label;
        }
        let label = self.allocate_label();
        self.block_labels.insert(block, label);
        label
    }

    /// The label of the block containing `line`, or of the next block when
    /// the exact line has no block of its own.
    fn label_for_line(&mut self, line: u32) -> i64 {
        match self.cfg.block_for_line_or_next(line) {
            Some(block) => self.label_for_block(block),
            // Should not happen with a valid CFG; recover with a fresh
            // label rather than failing.
            None => self.allocate_label(),
        }
    }

    fn label_id_or_dummy(&mut self, name: &str) -> i64 {
        match self.symbols.labels.get(name) {
            Some(symbol) => symbol.label_id,
            None => self.allocate_label(),
        }
    }

    pub(crate) fn allocate_label(&mut self) -> i64 {
        let label = self.next_label;
        self.next_label += 1;
        label
    }

    // === Emission helpers ===

    fn set_context(&mut self, line: u32, block: usize) {
        self.current_line = line;
        self.current_block = block;
    }

    fn instruction(&self, opcode: IROpcode) -> IRInstruction {
        let mut instruction = IRInstruction::new(opcode);
        instruction.line = self.current_line;
        instruction.block = self.current_block;
        instruction
    }

    pub(crate) fn emit(&mut self, opcode: IROpcode) {
        let instruction = self.instruction(opcode);
        self.code.emit(instruction);
    }

    pub(crate) fn emit1(&mut self, opcode: IROpcode, op1: impl Into<Operand>) {
        let mut instruction = self.instruction(opcode);
        instruction.operands[0] = op1.into();
        self.code.emit(instruction);
    }

    pub(crate) fn emit2(
        &mut self,
        opcode: IROpcode,
        op1: impl Into<Operand>,
        op2: impl Into<Operand>,
    ) {
        let mut instruction = self.instruction(opcode);
        instruction.operands[0] = op1.into();
        instruction.operands[1] = op2.into();
        self.code.emit(instruction);
    }

    pub(crate) fn emit3(
        &mut self,
        opcode: IROpcode,
        op1: impl Into<Operand>,
        op2: impl Into<Operand>,
        op3: impl Into<Operand>,
    ) {
        let mut instruction = self.instruction(opcode);
        instruction.operands[0] = op1.into();
        instruction.operands[1] = op2.into();
        instruction.operands[2] = op3.into();
        self.code.emit(instruction);
    }

    fn emit_jump(&mut self, opcode: IROpcode, label: i64, is_loop: bool) {
        let mut instruction = self.instruction(opcode);
        instruction.operands[0] = Operand::Int(label);
        instruction.is_loop_jump = is_loop;
        self.code.emit(instruction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        ArrayDecl, BinaryOp, ExprKind, PrintItem, ProgramLine, SourceLocation,
    };
    use crate::cfg::ControlFlowGraph;
    use crate::options::CompilerOptions;
    use crate::semantic::SemanticAnalyzer;

    fn loc(line: u32) -> SourceLocation {
        SourceLocation::new(line, 0)
    }

    fn line(n: u32, kinds: Vec<StatementKind>) -> ProgramLine {
        ProgramLine::new(
            n,
            kinds
                .into_iter()
                .map(|k| Statement::new(k, loc(n)))
                .collect(),
            loc(n),
        )
    }

    fn num(v: f64) -> Expr {
        Expr::new(ExprKind::NumberLiteral(v), loc(0))
    }

    fn var(name: &str) -> Expr {
        Expr::new(ExprKind::Variable(name.to_string()), loc(0))
    }

    fn call(name: &str, args: Vec<Expr>) -> Expr {
        Expr::new(
            ExprKind::Call {
                name: name.to_string(),
                args,
            },
            loc(0),
        )
    }

    fn print_of(expr: Expr) -> StatementKind {
        StatementKind::Print {
            items: vec![PrintItem {
                expr,
                separator: None,
            }],
            trailing_newline: true,
        }
    }

    /// Analyzes and lowers a program over the straight-line CFG, asserting
    /// analysis succeeded first (the driver gates on that).
    fn compile(program: Program) -> IRCode {
        let mut analyzer = SemanticAnalyzer::new();
        assert!(
            analyzer.analyze(&program, &CompilerOptions::default()),
            "semantic analysis failed: {:?}",
            analyzer.errors()
        );
        let cfg = ControlFlowGraph::linear(&program);
        IRGenerator::generate(&cfg, &program, analyzer.symbol_table()).unwrap()
    }

    fn opcodes(code: &IRCode) -> Vec<IROpcode> {
        code.instructions.iter().map(|i| i.opcode).collect()
    }

    #[test]
    fn test_trailing_halt() {
        let code = compile(Program::new(vec![line(10, vec![print_of(num(1.0))])]));
        assert_eq!(code.instructions.last().unwrap().opcode, IROpcode::Halt);
    }

    #[test]
    fn test_const_loads_by_index() {
        // 10 CONST PI = 3 / 20 PRINT PI
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Const {
                    name: "PI".to_string(),
                    value: num(3.0),
                }],
            ),
            line(20, vec![print_of(var("PI"))]),
        ]);

        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&program, &CompilerOptions::default()));
        let expected_index = analyzer.symbol_table().constants["PI"].index;
        assert_eq!(
            analyzer.constants_manager().get(expected_index),
            Some(&crate::constants::ConstantValue::Integer(3))
        );

        let cfg = ControlFlowGraph::linear(&program);
        let code = IRGenerator::generate(&cfg, &program, analyzer.symbol_table()).unwrap();

        let loads: Vec<&IRInstruction> = code
            .instructions
            .iter()
            .filter(|i| i.opcode == IROpcode::LoadConst)
            .collect();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].op1().as_int(), Some(expected_index as i64));
    }

    #[test]
    fn test_for_next_lowering() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::For {
                    variable: "I".to_string(),
                    start: num(1.0),
                    end: num(5.0),
                    step: None,
                }],
            ),
            line(20, vec![print_of(var("I"))]),
            line(
                30,
                vec![StatementKind::Next {
                    variable: Some("I".to_string()),
                }],
            ),
        ]);
        let code = compile(program);
        let ops = opcodes(&code);

        let init = code
            .instructions
            .iter()
            .position(|i| i.opcode == IROpcode::ForInit)
            .unwrap();
        // start, end, default step pushed before FOR_INIT
        assert_eq!(
            &ops[init - 3..=init],
            &[
                IROpcode::PushInt,
                IROpcode::PushInt,
                IROpcode::PushInt,
                IROpcode::ForInit
            ]
        );
        assert_eq!(
            code.instructions[init].op1().as_text(),
            Some("I")
        );
        let next = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::ForNext)
            .unwrap();
        assert_eq!(next.op1().as_text(), Some("I"));
    }

    #[test]
    fn test_while_simple_condition_serializes() {
        // WHILE X < 10 ... WEND
        let condition = Expr::new(
            ExprKind::Binary {
                left: Box::new(var("X")),
                op: BinaryOp::LessThan,
                right: Box::new(num(10.0)),
            },
            loc(10),
        );
        let program = Program::new(vec![
            line(10, vec![StatementKind::While { condition }]),
            line(20, vec![StatementKind::Wend]),
        ]);
        let code = compile(program);

        let start = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::WhileStart)
            .unwrap();
        assert_eq!(start.op1().as_text(), Some("(var_X < 10)"));

        let end = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::WhileEnd)
            .unwrap();
        // Deferred evaluation: no loop-back label on WHILE_END.
        assert!(end.op1().is_none());
    }

    #[test]
    fn test_while_call_condition_falls_back() {
        // WHILE RND(1) < 0.5 cannot serialize (function call).
        let condition = Expr::new(
            ExprKind::Binary {
                left: Box::new(call("RND", vec![num(1.0)])),
                op: BinaryOp::LessThan,
                right: Box::new(num(0.5)),
            },
            loc(10),
        );
        let program = Program::new(vec![
            line(10, vec![StatementKind::While { condition }]),
            line(20, vec![StatementKind::Wend]),
        ]);
        let code = compile(program);

        let start = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::WhileStart)
            .unwrap();
        let label = start.op1().as_int().expect("fallback carries a label id");

        // The same label is emitted as a LABEL before the condition and on
        // WHILE_END for the loop-back.
        assert!(code
            .instructions
            .iter()
            .any(|i| i.opcode == IROpcode::Label && i.op1().as_int() == Some(label)));
        let end = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::WhileEnd)
            .unwrap();
        assert_eq!(end.op1().as_int(), Some(label));
    }

    #[test]
    fn test_wend_without_while_is_hard_error() {
        // Bypass the analyzer gate on purpose: this is the one internal
        // consistency check that must fail loudly.
        let program = Program::new(vec![line(10, vec![StatementKind::Wend])]);
        let cfg = ControlFlowGraph::linear(&program);
        let symbols = crate::semantic::SymbolTable::new();
        let result = IRGenerator::generate(&cfg, &program, &symbols);
        assert!(matches!(
            result,
            Err(IRGenError::WendWithoutWhile { line: 10 })
        ));
    }

    #[test]
    fn test_backward_goto_tagged_as_loop() {
        let program = Program::new(vec![
            line(10, vec![print_of(num(1.0))]),
            line(
                20,
                vec![StatementKind::Goto {
                    target: JumpTarget::Line(10),
                }],
            ),
        ]);
        let code = compile(program);

        let jump = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::Jump)
            .unwrap();
        assert!(jump.is_loop_jump);
    }

    #[test]
    fn test_forward_goto_not_tagged() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Goto {
                    target: JumpTarget::Line(30),
                }],
            ),
            line(20, vec![print_of(num(1.0))]),
            line(30, vec![StatementKind::End]),
        ]);
        let code = compile(program);

        let jump = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::Jump)
            .unwrap();
        assert!(!jump.is_loop_jump);
    }

    #[test]
    fn test_goto_missing_line_resolves_to_next_block() {
        // GOTO 15 tolerates the gap: resolves to line 20's block.
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Goto {
                    target: JumpTarget::Line(15),
                }],
            ),
            line(20, vec![StatementKind::End]),
        ]);

        let mut analyzer = SemanticAnalyzer::new();
        // Line 15 does not exist, so analysis reports it; IR generation is
        // exercised anyway to check its recovery path.
        analyzer.analyze(&program, &CompilerOptions::default());
        let cfg = ControlFlowGraph::linear(&program);
        let code = IRGenerator::generate(&cfg, &program, analyzer.symbol_table()).unwrap();

        let jump = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::Jump)
            .unwrap();
        let target_label = jump.op1().as_int().unwrap();
        // Block 1 (line 20) carries that label.
        let label_addrs: Vec<usize> = code
            .instructions
            .iter()
            .enumerate()
            .filter(|(_, i)| i.opcode == IROpcode::Label && i.op1().as_int() == Some(target_label))
            .map(|(a, _)| a)
            .collect();
        assert_eq!(label_addrs.len(), 1);
        assert_eq!(code.instructions[label_addrs[0]].block, 1);
    }

    #[test]
    fn test_if_then_goto_is_conditional_jump() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::If {
                    condition: var("X"),
                    goto_line: Some(30),
                    then_branch: vec![],
                    elseif_branches: vec![],
                    else_branch: vec![],
                }],
            ),
            line(20, vec![print_of(num(1.0))]),
            line(30, vec![StatementKind::End]),
        ]);
        let code = compile(program);
        let ops = opcodes(&code);
        assert!(ops.contains(&IROpcode::JumpIfTrue));
        assert!(!ops.contains(&IROpcode::IfStart));
    }

    #[test]
    fn test_block_if_uses_structured_brackets() {
        let program = Program::new(vec![line(
            10,
            vec![StatementKind::If {
                condition: var("X"),
                goto_line: None,
                then_branch: vec![Statement::new(print_of(num(1.0)), loc(10))],
                elseif_branches: vec![crate::ast::ElseIfClause {
                    condition: var("Y"),
                    body: vec![Statement::new(print_of(num(2.0)), loc(10))],
                }],
                else_branch: vec![Statement::new(print_of(num(3.0)), loc(10))],
            }],
        )]);
        let code = compile(program);
        let ops = opcodes(&code);

        let pos = |op: IROpcode| ops.iter().position(|&o| o == op).unwrap();
        assert!(pos(IROpcode::IfStart) < pos(IROpcode::ElseifStart));
        assert!(pos(IROpcode::ElseifStart) < pos(IROpcode::ElseStart));
        assert!(pos(IROpcode::ElseStart) < pos(IROpcode::IfEnd));
    }

    #[test]
    fn test_inlining_two_call_sites_are_independent() {
        // DEF FNSQ(X) = X * X, then PRINT FNSQ(2) and PRINT FNSQ(3).
        let def = StatementKind::DefFn {
            name: "SQ".to_string(),
            params: vec!["X".to_string()],
            body: Expr::new(
                ExprKind::Binary {
                    left: Box::new(var("X")),
                    op: BinaryOp::Multiply,
                    right: Box::new(var("X")),
                },
                loc(10),
            ),
        };
        let program = Program::new(vec![
            line(10, vec![def]),
            line(20, vec![print_of(call("SQ", vec![num(2.0)]))]),
            line(30, vec![print_of(call("SQ", vec![num(3.0)]))]),
        ]);
        let code = compile(program);

        // Each call site stores its own argument exactly once.
        let stores: Vec<&IRInstruction> = code
            .instructions
            .iter()
            .filter(|i| i.opcode == IROpcode::StoreVar)
            .collect();
        assert_eq!(stores.len(), 2);
        for store in &stores {
            assert_eq!(store.op1().as_text(), Some("__fn_SQ_X"));
        }

        // The body loads the temporary, not the raw parameter name.
        let loads: Vec<&str> = code
            .instructions
            .iter()
            .filter(|i| i.opcode == IROpcode::LoadVar)
            .filter_map(|i| i.op1().as_text())
            .collect();
        assert_eq!(loads, vec!["__fn_SQ_X"; 4]);

        // Arguments are pushed once per call site.
        let arg_pushes = code
            .instructions
            .iter()
            .filter(|i| {
                i.opcode == IROpcode::PushInt
                    && matches!(i.op1().as_int(), Some(2) | Some(3))
            })
            .count();
        assert_eq!(arg_pushes, 2);
    }

    #[test]
    fn test_nested_inline_call_uses_caller_scope_for_args() {
        // DEF FNINC(N) = N + 1, PRINT FNINC(FNINC(5))
        let def = StatementKind::DefFn {
            name: "INC".to_string(),
            params: vec!["N".to_string()],
            body: Expr::new(
                ExprKind::Binary {
                    left: Box::new(var("N")),
                    op: BinaryOp::Add,
                    right: Box::new(num(1.0)),
                },
                loc(10),
            ),
        };
        let inner = call("INC", vec![num(5.0)]);
        let program = Program::new(vec![
            line(10, vec![def]),
            line(20, vec![print_of(call("INC", vec![inner]))]),
        ]);
        let code = compile(program);

        // Two expansions, both storing into the same temp sequentially:
        // inner completes (store+load) before the outer store runs.
        let temp_ops: Vec<IROpcode> = code
            .instructions
            .iter()
            .filter(|i| i.op1().as_text() == Some("__fn_INC_N"))
            .map(|i| i.opcode)
            .collect();
        assert_eq!(
            temp_ops,
            vec![
                IROpcode::StoreVar,
                IROpcode::LoadVar,
                IROpcode::StoreVar,
                IROpcode::LoadVar
            ]
        );
    }

    #[test]
    fn test_dim_lowering_carries_suffix() {
        let program = Program::new(vec![line(
            10,
            vec![StatementKind::Dim {
                arrays: vec![ArrayDecl {
                    name: "A$".to_string(),
                    dimensions: vec![num(5.0)],
                }],
            }],
        )]);
        let code = compile(program);

        let dim = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::DimArray)
            .unwrap();
        assert_eq!(dim.op1().as_text(), Some("A$"));
        assert_eq!(dim.op2().as_int(), Some(1));
        assert_eq!(dim.op3().as_text(), Some("$"));
    }

    #[test]
    fn test_array_store_and_load() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Dim {
                    arrays: vec![ArrayDecl {
                        name: "A".to_string(),
                        dimensions: vec![num(5.0)],
                    }],
                }],
            ),
            line(
                20,
                vec![StatementKind::Let {
                    variable: "A".to_string(),
                    indices: vec![num(3.0)],
                    value: num(7.0),
                }],
            ),
            line(30, vec![print_of(call("A", vec![num(3.0)]))]),
        ]);
        let code = compile(program);
        let ops = opcodes(&code);
        assert!(ops.contains(&IROpcode::StoreArray));
        assert!(ops.contains(&IROpcode::LoadArray));
    }

    #[test]
    fn test_line_to_address_mapping() {
        let program = Program::new(vec![
            line(10, vec![print_of(num(1.0))]),
            line(20, vec![print_of(num(2.0))]),
        ]);
        let code = compile(program);

        let addr10 = code.line_to_address[&10];
        let addr20 = code.line_to_address[&20];
        assert!(addr10 < addr20);
        // Each mapped address points just past the block's LABEL.
        assert_eq!(code.instructions[addr10 - 1].opcode, IROpcode::Label);
    }

    #[test]
    fn test_data_segment_copied_into_ircode() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Data {
                    values: vec!["3".to_string(), "9".to_string()],
                }],
            ),
            line(
                20,
                vec![StatementKind::Read {
                    variables: vec!["X".to_string()],
                }],
            ),
        ]);
        let code = compile(program);
        assert_eq!(code.data.values, vec!["3", "9"]);
        assert_eq!(code.data.line_restore_points[&10], 0);
        assert!(opcodes(&code).contains(&IROpcode::ReadData));
    }

    #[test]
    fn test_gosub_and_return() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Gosub {
                    target: JumpTarget::Line(30),
                }],
            ),
            line(20, vec![StatementKind::End]),
            line(30, vec![print_of(num(1.0))]),
            line(40, vec![StatementKind::Return { value: None }]),
        ]);
        let code = compile(program);
        let ops = opcodes(&code);
        assert!(ops.contains(&IROpcode::CallGosub));
        assert!(ops.contains(&IROpcode::ReturnGosub));
    }

    #[test]
    fn test_label_statement_emits_symbol_label_id() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::Label {
                    name: "retry".to_string(),
                }],
            ),
            line(
                20,
                vec![StatementKind::Goto {
                    target: JumpTarget::Label("retry".to_string()),
                }],
            ),
        ]);

        let mut analyzer = SemanticAnalyzer::new();
        assert!(analyzer.analyze(&program, &CompilerOptions::default()));
        let label_id = analyzer.symbol_table().labels["retry"].label_id;
        assert!(label_id >= crate::semantic::symbols::FIRST_LABEL_ID);

        let cfg = ControlFlowGraph::linear(&program);
        let code = IRGenerator::generate(&cfg, &program, analyzer.symbol_table()).unwrap();

        assert!(code
            .instructions
            .iter()
            .any(|i| i.opcode == IROpcode::Label && i.op1().as_int() == Some(label_id)));
        let jump = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::Jump)
            .unwrap();
        assert_eq!(jump.op1().as_int(), Some(label_id));
    }

    #[test]
    fn test_on_event_descriptor() {
        let program = Program::new(vec![
            line(
                10,
                vec![StatementKind::OnEvent {
                    event: "BREAK".to_string(),
                    handler: crate::ast::EventHandler::Goto {
                        target: JumpTarget::Line(20),
                    },
                }],
            ),
            line(20, vec![StatementKind::End]),
        ]);
        let code = compile(program);

        let on_event = code
            .instructions
            .iter()
            .find(|i| i.opcode == IROpcode::OnEvent)
            .unwrap();
        let descriptor = on_event.op1().as_text().unwrap();
        let parts: Vec<&str> = descriptor.split('|').collect();
        assert_eq!(parts[0], "BREAK");
        assert_eq!(parts[1], "goto");
        assert_eq!(parts[3], "true");
        // The line target was pre-resolved to a label id.
        assert!(parts[2].parse::<i64>().is_ok());
        assert!(code.events_used);
    }

    #[test]
    fn test_case_lowering_builds_or_chain() {
        let when = crate::ast::WhenClause {
            values: vec![num(1.0), num(2.0)],
            body: vec![Statement::new(print_of(num(10.0)), loc(10))],
        };
        let program = Program::new(vec![line(
            10,
            vec![StatementKind::Case {
                selector: var("X"),
                when_clauses: vec![when],
                otherwise: vec![Statement::new(print_of(num(0.0)), loc(10))],
            }],
        )]);
        let code = compile(program);
        let ops = opcodes(&code);

        let eq_count = ops.iter().filter(|&&o| o == IROpcode::Eq).count();
        let or_count = ops.iter().filter(|&&o| o == IROpcode::Or).count();
        assert_eq!(eq_count, 2);
        assert_eq!(or_count, 1);
        assert!(ops.contains(&IROpcode::IfStart));
        assert!(ops.contains(&IROpcode::ElseStart));
        assert!(ops.contains(&IROpcode::IfEnd));
    }

    #[test]
    fn test_compiler_flags_copied() {
        let program = Program::new(vec![line(10, vec![print_of(num(1.0))])]);
        let mut analyzer = SemanticAnalyzer::new();
        let options = CompilerOptions {
            array_base: 0,
            unicode_mode: true,
            error_tracking: false,
            cancellable_loops: false,
        };
        assert!(analyzer.analyze(&program, &options));
        let cfg = ControlFlowGraph::linear(&program);
        let code = IRGenerator::generate(&cfg, &program, analyzer.symbol_table()).unwrap();

        assert_eq!(code.array_base, 0);
        assert!(code.unicode_mode);
        assert!(!code.error_tracking);
        assert!(!code.cancellable_loops);
        assert_eq!(code.block_count, 1);
    }
}
