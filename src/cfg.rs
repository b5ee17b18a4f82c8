//! Control-flow graph input contract.
//!
//! CFG construction happens in the driver, between semantic analysis and IR
//! generation; this module only defines the shape the IR generator consumes:
//! basic blocks holding [`StmtRef`] handles into the program, edges between
//! them, and the two queries the generator relies on -
//! [`ControlFlowGraph::is_back_edge`] for loop tagging and
//! [`ControlFlowGraph::block_for_line_or_next`] for jump-target resolution.

use crate::ast::{Program, StmtRef};

/// The kind of a CFG edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    /// Execution falls off the end of the source block into the target.
    Fallthrough,
    /// A jump or branch transfers control explicitly.
    Explicit,
}

/// A directed edge between two basic blocks.
#[derive(Debug, Clone, Copy)]
pub struct Edge {
    /// Source block id.
    pub source: usize,
    /// Target block id.
    pub target: usize,
    /// How control reaches the target.
    pub kind: EdgeKind,
}

/// A maximal straight-line run of statements with one entry and one exit.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    /// Block id; equals the block's index in [`ControlFlowGraph::blocks`].
    pub id: usize,
    /// The statements in this block, as handles into the program.
    pub statements: Vec<StmtRef>,
    /// The BASIC line numbers this block covers, in order (0s excluded).
    pub line_numbers: Vec<u32>,
    /// Successor block ids.
    pub successors: Vec<usize>,
}

impl BasicBlock {
    /// The first BASIC line number in the block (0 if none are numbered).
    pub fn first_line_number(&self) -> u32 {
        self.line_numbers.first().copied().unwrap_or(0)
    }
}

/// A read-only control-flow graph over a [`Program`].
#[derive(Debug, Clone, Default)]
pub struct ControlFlowGraph {
    /// Blocks in emission order.
    pub blocks: Vec<BasicBlock>,
    /// All edges between blocks.
    pub edges: Vec<Edge>,
}

impl ControlFlowGraph {
    /// Number of blocks in the graph.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Whether a jump from `from_line` to `to_line` runs backward in
    /// program order (including self-loops), indicating a loop.
    pub fn is_back_edge(&self, from_line: u32, to_line: u32) -> bool {
        from_line > 0 && to_line > 0 && to_line <= from_line
    }

    /// The block containing `line`, or the first block covering a later
    /// line when `line` itself has no block (tolerates gaps left by
    /// comment-only or blank lines).
    pub fn block_for_line_or_next(&self, line: u32) -> Option<usize> {
        let mut best: Option<(u32, usize)> = None;
        for block in &self.blocks {
            for &n in &block.line_numbers {
                if n == line {
                    return Some(block.id);
                }
                if n > line {
                    match best {
                        Some((b, _)) if b <= n => {}
                        _ => best = Some((n, block.id)),
                    }
                }
            }
        }
        best.map(|(_, id)| id)
    }

    /// Whether `block` has an outgoing fallthrough edge.
    pub fn has_fallthrough_from(&self, block: usize) -> bool {
        self.edges
            .iter()
            .any(|e| e.source == block && e.kind == EdgeKind::Fallthrough)
    }

    /// Builds the degenerate straight-line graph: one block per program
    /// line, linked by fallthrough edges.
    ///
    /// Real drivers run a full CFG builder; this constructor exists for
    /// tests and simple hosts that compile straight-line programs.
    pub fn linear(program: &Program) -> Self {
        let mut blocks = Vec::with_capacity(program.lines.len());
        let mut edges = Vec::new();

        for (i, line) in program.lines.iter().enumerate() {
            let statements = (0..line.statements.len())
                .map(|s| StmtRef::new(i, s))
                .collect();
            let successors = if i + 1 < program.lines.len() {
                edges.push(Edge {
                    source: i,
                    target: i + 1,
                    kind: EdgeKind::Fallthrough,
                });
                vec![i + 1]
            } else {
                Vec::new()
            };
            blocks.push(BasicBlock {
                id: i,
                statements,
                line_numbers: if line.number > 0 {
                    vec![line.number]
                } else {
                    Vec::new()
                },
                successors,
            });
        }

        Self { blocks, edges }
    }
}
