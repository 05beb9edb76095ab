//! The program builder.
//!
//! A [`Process`] owns every handle it issues and all of the state behind
//! them: qubit lifecycle flags, future expressions, dump slots, labels and
//! their basic blocks, the control stack and the adjoint recorder. Every
//! operation validates first and mutates second, so a failed call leaves the
//! process exactly as it was.
//!
//! Emission model:
//! - block 0 is the entry block; label `lN` names block `N`
//! - gates pass through the adjoint recorder and pick up the flattened
//!   control set at emission time
//! - allocation and classical future arithmetic go straight to the current
//!   block, whatever scope is open
//! - `jump` and `breach` terminate the current block; nothing else may be
//!   emitted until `open_block` selects another one

use crate::code::{Block, ClassicalOp, GateKind, GateOp, Instruction, IntArg, Program};
use crate::engine::{DumpData, Engine, EngineRegistry};
use crate::handle::{Dump, Future, Label, Operand, OperandKind, Qubit};
use crate::scope::{AdjointRecorder, ControlStack};
use crate::{KetConfig, KetError, KetResult};
use indexmap::IndexSet;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Public state views
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle flags of one qubit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QubitState {
    /// False once the qubit is measured or freed.
    pub allocated: bool,
    pub measured: bool,
}

/// How a future's value is produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FutureExpr {
    /// Measurement result over these qubit indices, first one most
    /// significant.
    Raw { qubits: Vec<u32> },

    /// Fixed at build time.
    Constant(i64),

    Derived {
        op: ClassicalOp,
        kind: OperandKind,
        lhs: Operand,
        rhs: Operand,
    },
}

/// Handle and resource counters of a process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    /// Qubit indices issued.
    pub qubits: u32,
    pub live_qubits: u32,
    pub peak_live_qubits: u32,
    pub futures: u32,
    pub dumps: u32,
    /// Labels issued by `get_label` (the entry block is not counted).
    pub labels: u32,
    pub instructions: usize,
}

#[derive(Debug, Clone)]
struct FutureSlot {
    expr: FutureExpr,
    value: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default)]
struct LabelSlot {
    bound: bool,
    referenced: bool,
}

const ADJOINT_SCOPE: &str = "an adjoint region";
const CONTROL_SCOPE: &str = "a control scope";

// ─────────────────────────────────────────────────────────────────────────────
// Process
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct Process {
    id: u32,
    config: KetConfig,
    engine: Box<dyn Engine>,

    qubits: Vec<QubitState>,
    futures: Vec<FutureSlot>,
    dumps: Vec<Option<DumpData>>,

    /// `labels[i]` and `blocks[i]` describe the same block; index 0 is the
    /// entry block and is bound from the start.
    labels: Vec<LabelSlot>,
    blocks: Vec<Block>,
    current: usize,

    ctrl: ControlStack,
    adj: AdjointRecorder,

    executed: bool,
    exec_time: Option<f64>,
    live_qubits: u32,
    peak_live_qubits: u32,
}

impl Process {
    /// Create a process configured from the environment.
    pub fn new(id: u32) -> KetResult<Self> {
        Self::with_config(id, KetConfig::from_env())
    }

    /// Create a process running on the bundled engine selected by `config`.
    pub fn with_config(id: u32, config: KetConfig) -> KetResult<Self> {
        Self::with_registry(id, config, &EngineRegistry::with_builtins())
    }

    /// Create a process whose engine is resolved through `registry`.
    pub fn with_registry(id: u32, config: KetConfig, registry: &EngineRegistry) -> KetResult<Self> {
        let engine = registry.create(&config)?;
        Ok(Self::build(id, config, engine))
    }

    /// Create a process running on an explicit engine.
    pub fn with_engine(id: u32, engine: Box<dyn Engine>) -> Self {
        Self::build(id, KetConfig::default(), engine)
    }

    fn build(id: u32, config: KetConfig, engine: Box<dyn Engine>) -> Self {
        log::debug!("process {id}: created on engine {}", engine.name());
        Self {
            id,
            config,
            engine,
            qubits: Vec::new(),
            futures: Vec::new(),
            dumps: Vec::new(),
            labels: vec![LabelSlot {
                bound: true,
                referenced: false,
            }],
            blocks: vec![Block::default()],
            current: 0,
            ctrl: ControlStack::new(),
            adj: AdjointRecorder::new(),
            executed: false,
            exec_time: None,
            live_qubits: 0,
            peak_live_qubits: 0,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn config(&self) -> &KetConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn is_executed(&self) -> bool {
        self.executed
    }

    /// Engine execution time in seconds, once the process has run.
    pub fn exec_time(&self) -> Option<f64> {
        self.exec_time
    }

    pub fn ctrl_depth(&self) -> usize {
        self.ctrl.depth()
    }

    pub fn adj_depth(&self) -> usize {
        self.adj.depth()
    }

    pub fn metrics(&self) -> Metrics {
        Metrics {
            qubits: self.qubits.len() as u32,
            live_qubits: self.live_qubits,
            peak_live_qubits: self.peak_live_qubits,
            futures: self.futures.len() as u32,
            dumps: self.dumps.len() as u32,
            labels: (self.labels.len() - 1) as u32,
            instructions: self.blocks.iter().map(|b| b.instructions.len()).sum(),
        }
    }

    // ── validation helpers ──────────────────────────────────────────────────

    fn ensure_editable(&self) -> KetResult<()> {
        if self.executed {
            return Err(KetError::AlreadyExecuted(self.id));
        }
        Ok(())
    }

    fn ensure_open_block(&self, op: &str) -> KetResult<()> {
        if self.blocks[self.current].terminated {
            return Err(KetError::BlockTerminated {
                block: self.current as u32,
                op: op.to_string(),
            });
        }
        Ok(())
    }

    /// Adjoint regions reject `op`; so do control scopes when `ctrl` is set.
    fn ensure_outside_scopes(&self, op: &str, ctrl: bool) -> KetResult<()> {
        let scope = if self.adj.is_recording() {
            ADJOINT_SCOPE
        } else if ctrl && !self.ctrl.is_empty() {
            CONTROL_SCOPE
        } else {
            return Ok(());
        };

        Err(KetError::Scope {
            op: op.to_string(),
            scope: scope.to_string(),
        })
    }

    fn live_qubit(&self, qubit: Qubit) -> KetResult<u32> {
        let index = qubit.index();
        let invalid = |reason: &str| KetError::InvalidQubit {
            index,
            reason: reason.to_string(),
        };

        if qubit.process_id() != self.id {
            return Err(invalid(&format!(
                "belongs to process {}",
                qubit.process_id()
            )));
        }

        let state = self
            .qubits
            .get(index as usize)
            .ok_or_else(|| invalid("was not issued by this process"))?;

        if state.measured {
            return Err(invalid("has been measured"));
        }
        if !state.allocated {
            return Err(invalid("has been freed"));
        }

        Ok(index)
    }

    fn distinct_live_qubits(&self, qubits: &[Qubit]) -> KetResult<Vec<u32>> {
        let mut seen = IndexSet::with_capacity(qubits.len());
        for qubit in qubits {
            let index = self.live_qubit(*qubit)?;
            if !seen.insert(index) {
                return Err(KetError::InvalidQubit {
                    index,
                    reason: "is listed more than once".into(),
                });
            }
        }
        Ok(seen.into_iter().collect())
    }

    fn label_index(&self, label: Label) -> KetResult<usize> {
        if label.process_id() != self.id || label.index() as usize >= self.labels.len() {
            return Err(KetError::ForeignHandle(format!(
                "label {label} of process {}",
                label.process_id()
            )));
        }
        Ok(label.index() as usize)
    }

    fn future_index(&self, future: Future) -> KetResult<usize> {
        if future.process_id() != self.id || future.index() as usize >= self.futures.len() {
            return Err(KetError::ForeignHandle(format!(
                "future {future} of process {}",
                future.process_id()
            )));
        }
        Ok(future.index() as usize)
    }

    fn dump_index(&self, dump: Dump) -> KetResult<usize> {
        if dump.process_id() != self.id || dump.index() as usize >= self.dumps.len() {
            return Err(KetError::ForeignHandle(format!(
                "dump {dump} of process {}",
                dump.process_id()
            )));
        }
        Ok(dump.index() as usize)
    }

    fn emit(&mut self, instruction: Instruction) {
        log::debug!("process {}: l{}: {instruction}", self.id, self.current);
        self.blocks[self.current].push(instruction);
    }

    // ── qubits and gates ────────────────────────────────────────────────────

    /// Allocate a qubit; `dirty` allows it to start in an unspecified state.
    pub fn alloc(&mut self, dirty: bool) -> KetResult<Qubit> {
        if self.executed {
            return Err(KetError::Allocation(format!(
                "process {} has already been executed",
                self.id
            )));
        }
        self.ensure_open_block("alloc")?;

        let index = self.qubits.len() as u32;
        self.emit(Instruction::Alloc {
            dirty,
            target: index,
        });
        self.qubits.push(QubitState {
            allocated: true,
            measured: false,
        });
        self.live_qubits += 1;
        self.peak_live_qubits = self.peak_live_qubits.max(self.live_qubits);

        Ok(Qubit::new(index, self.id))
    }

    /// Return a qubit to the engine.
    ///
    /// A clean free promises the qubit is back in |0>.
    pub fn free(&mut self, qubit: Qubit, dirty: bool) -> KetResult<()> {
        self.ensure_editable()?;
        self.ensure_outside_scopes("free", true)?;
        let index = self.live_qubit(qubit)?;
        self.ensure_open_block("free")?;

        self.emit(Instruction::Free {
            dirty,
            target: index,
        });
        self.qubits[index as usize].allocated = false;
        self.live_qubits -= 1;
        Ok(())
    }

    /// Apply `kind` to `qubit`, controlled by every qubit on the control
    /// stack. `param` is ignored by non-parametric gates.
    pub fn gate(&mut self, kind: GateKind, qubit: Qubit, param: f64) -> KetResult<()> {
        self.ensure_editable()?;
        let target = self.live_qubit(qubit)?;
        if self.ctrl.contains(target) {
            return Err(KetError::InvalidQubit {
                index: target,
                reason: "is part of the active control set".into(),
            });
        }
        self.ensure_open_block(kind.mnemonic())?;

        let gate = GateOp {
            kind,
            param: if kind.is_parametric() { param } else { 0.0 },
            target,
            control: self.ctrl.flatten(),
        };

        if let Some(gate) = self.adj.record(gate) {
            self.emit(Instruction::Gate(gate));
        }
        Ok(())
    }

    pub fn x(&mut self, qubit: Qubit) -> KetResult<()> {
        self.gate(GateKind::PauliX, qubit, 0.0)
    }

    pub fn y(&mut self, qubit: Qubit) -> KetResult<()> {
        self.gate(GateKind::PauliY, qubit, 0.0)
    }

    pub fn z(&mut self, qubit: Qubit) -> KetResult<()> {
        self.gate(GateKind::PauliZ, qubit, 0.0)
    }

    pub fn h(&mut self, qubit: Qubit) -> KetResult<()> {
        self.gate(GateKind::Hadamard, qubit, 0.0)
    }

    pub fn phase(&mut self, qubit: Qubit, lambda: f64) -> KetResult<()> {
        self.gate(GateKind::Phase, qubit, lambda)
    }

    pub fn rx(&mut self, qubit: Qubit, theta: f64) -> KetResult<()> {
        self.gate(GateKind::RotationX, qubit, theta)
    }

    pub fn ry(&mut self, qubit: Qubit, theta: f64) -> KetResult<()> {
        self.gate(GateKind::RotationY, qubit, theta)
    }

    pub fn rz(&mut self, qubit: Qubit, theta: f64) -> KetResult<()> {
        self.gate(GateKind::RotationZ, qubit, theta)
    }

    /// Lifecycle flags of `qubit`.
    pub fn qubit_state(&self, qubit: Qubit) -> KetResult<QubitState> {
        if qubit.process_id() != self.id {
            return Err(KetError::InvalidQubit {
                index: qubit.index(),
                reason: format!("belongs to process {}", qubit.process_id()),
            });
        }
        self.qubits
            .get(qubit.index() as usize)
            .copied()
            .ok_or_else(|| KetError::InvalidQubit {
                index: qubit.index(),
                reason: "was not issued by this process".into(),
            })
    }

    // ── control stack and adjoint regions ───────────────────────────────────

    pub fn ctrl_push(&mut self, qubits: &[Qubit]) -> KetResult<()> {
        self.ensure_editable()?;
        if qubits.is_empty() {
            return Err(KetError::EmptyControlSet);
        }
        let indices = qubits
            .iter()
            .map(|q| self.live_qubit(*q))
            .collect::<KetResult<Vec<u32>>>()?;
        self.ctrl.push(indices)
    }

    pub fn ctrl_pop(&mut self) -> KetResult<()> {
        self.ensure_editable()?;
        self.ctrl.pop().map(|_| ())
    }

    pub fn adj_begin(&mut self) -> KetResult<()> {
        self.ensure_editable()?;
        self.ensure_open_block("adj_begin")?;
        self.adj.begin();
        Ok(())
    }

    /// Close the innermost adjoint region, emitting its inverse once the
    /// outermost region closes.
    pub fn adj_end(&mut self) -> KetResult<()> {
        self.ensure_editable()?;
        for gate in self.adj.end()? {
            self.emit(Instruction::Gate(gate));
        }
        Ok(())
    }

    /// Run `body` with `qubits` pushed as controls. The scope is popped even
    /// when `body` fails.
    pub fn with_ctrl<T>(
        &mut self,
        qubits: &[Qubit],
        body: impl FnOnce(&mut Self) -> KetResult<T>,
    ) -> KetResult<T> {
        self.ctrl_push(qubits)?;
        let result = body(self);
        let popped = self.ctrl_pop();
        let value = result?;
        popped?;
        Ok(value)
    }

    /// Emit the inverse of `body`. The region is closed even when `body`
    /// fails.
    pub fn with_adj<T>(&mut self, body: impl FnOnce(&mut Self) -> KetResult<T>) -> KetResult<T> {
        self.adj_begin()?;
        let result = body(self);
        let ended = self.adj_end();
        let value = result?;
        ended?;
        Ok(value)
    }

    /// `outer; inner; adjoint(outer)`.
    pub fn around<T>(
        &mut self,
        outer: impl Fn(&mut Self) -> KetResult<()>,
        inner: impl FnOnce(&mut Self) -> KetResult<T>,
    ) -> KetResult<T> {
        outer(self)?;
        let value = inner(self)?;
        self.with_adj(|p| outer(p))?;
        Ok(value)
    }

    // ── labels and control flow ─────────────────────────────────────────────

    /// Issue a new, unbound label.
    pub fn get_label(&mut self) -> KetResult<Label> {
        self.ensure_editable()?;
        let index = self.labels.len() as u32;
        self.labels.push(LabelSlot::default());
        self.blocks.push(Block::default());
        Ok(Label::new(index, self.id))
    }

    pub fn is_bound(&self, label: Label) -> KetResult<bool> {
        let index = self.label_index(label)?;
        Ok(self.labels[index].bound)
    }

    /// Continue emission at the start of `label`'s block.
    ///
    /// If the block being left is not terminated it falls through into
    /// `label` with an implicit jump.
    pub fn open_block(&mut self, label: Label) -> KetResult<()> {
        self.ensure_editable()?;
        let index = self.label_index(label)?;
        if self.labels[index].bound {
            return Err(KetError::DuplicateBinding(label.index()));
        }
        self.ensure_outside_scopes("open_block", false)?;

        if !self.blocks[self.current].terminated {
            self.emit(Instruction::Jump {
                addr: label.index(),
            });
            self.labels[index].referenced = true;
        }

        self.labels[index].bound = true;
        self.current = index;
        log::debug!("process {}: entering block {label}", self.id);
        Ok(())
    }

    pub fn jump(&mut self, label: Label) -> KetResult<()> {
        self.ensure_editable()?;
        let index = self.label_index(label)?;
        self.ensure_outside_scopes("jump", false)?;
        self.ensure_open_block("jump")?;

        self.emit(Instruction::Jump {
            addr: label.index(),
        });
        self.labels[index].referenced = true;
        Ok(())
    }

    /// Branch to `then` when `test` resolves nonzero, else to `otherwise`.
    pub fn breach(&mut self, test: Future, then: Label, otherwise: Label) -> KetResult<()> {
        self.ensure_editable()?;
        let test_index = self.future_index(test)?;
        let then_index = self.label_index(then)?;
        let otherwise_index = self.label_index(otherwise)?;
        self.ensure_outside_scopes("breach", false)?;
        self.ensure_open_block("breach")?;

        self.emit(Instruction::Branch {
            test: test_index as u32,
            then: then.index(),
            otherwise: otherwise.index(),
        });
        self.labels[then_index].referenced = true;
        self.labels[otherwise_index].referenced = true;
        Ok(())
    }

    // ── measurement and dumps ───────────────────────────────────────────────

    /// Measure `qubits`; the first qubit is the most significant bit of the
    /// result. Measured qubits are released back to the engine.
    pub fn measure(&mut self, qubits: &[Qubit]) -> KetResult<Future> {
        self.ensure_editable()?;
        if qubits.is_empty() {
            return Err(KetError::EmptyQubitList("measure".into()));
        }
        self.ensure_outside_scopes("measure", true)?;
        let indices = self.distinct_live_qubits(qubits)?;
        self.ensure_open_block("measure")?;

        for &index in &indices {
            let state = &mut self.qubits[index as usize];
            state.measured = true;
            state.allocated = false;
        }
        self.live_qubits -= indices.len() as u32;

        let future = self.push_future(FutureExpr::Raw {
            qubits: indices.clone(),
        });
        self.emit(Instruction::Measure {
            qubits: indices,
            output: future.index(),
        });
        Ok(future)
    }

    /// Request a snapshot of the joint state of `qubits` at this point.
    pub fn dump(&mut self, qubits: &[Qubit]) -> KetResult<Dump> {
        self.ensure_editable()?;
        if qubits.is_empty() {
            return Err(KetError::EmptyQubitList("dump".into()));
        }
        self.ensure_outside_scopes("dump", true)?;
        let indices = self.distinct_live_qubits(qubits)?;
        self.ensure_open_block("dump")?;

        let index = self.dumps.len() as u32;
        self.dumps.push(None);
        self.emit(Instruction::Dump {
            qubits: indices,
            output: index,
        });
        Ok(Dump::new(index, self.id))
    }

    pub fn is_dump_available(&self, dump: Dump) -> KetResult<bool> {
        let index = self.dump_index(dump)?;
        Ok(self.dumps[index].is_some())
    }

    pub fn dump_value(&self, dump: Dump) -> KetResult<&DumpData> {
        let index = self.dump_index(dump)?;
        self.dumps[index]
            .as_ref()
            .ok_or_else(|| KetError::NotAvailable(format!("dump {dump}")))
    }

    /// Basis states of a resolved dump.
    pub fn states(&self, dump: Dump) -> KetResult<impl Iterator<Item = u64> + '_> {
        Ok(self.dump_value(dump)?.states())
    }

    /// Amplitude lists of a resolved dump, aligned with [`Process::states`].
    pub fn amplitudes(&self, dump: Dump) -> KetResult<impl Iterator<Item = &[Complex64]> + '_> {
        Ok(self.dump_value(dump)?.amplitudes())
    }

    pub fn probability(&self, dump: Dump, state: u64) -> KetResult<f64> {
        Ok(self.dump_value(dump)?.probability(state))
    }

    // ── futures ─────────────────────────────────────────────────────────────

    fn push_future(&mut self, expr: FutureExpr) -> Future {
        let index = self.futures.len() as u32;
        self.futures.push(FutureSlot { expr, value: None });
        Future::new(index, self.id)
    }

    fn int_arg(&self, operand: Operand) -> KetResult<IntArg> {
        match operand {
            Operand::Future(future) => Ok(IntArg::Future(self.future_index(future)? as u32)),
            Operand::Immediate(value) => Ok(IntArg::Immediate(value)),
        }
    }

    /// A future fixed to `value`.
    pub fn new_int(&mut self, value: i64) -> KetResult<Future> {
        self.ensure_editable()?;
        self.ensure_open_block("new_int")?;

        let future = self.push_future(FutureExpr::Constant(value));
        self.emit(Instruction::IntSet {
            result: future.index(),
            value,
        });
        Ok(future)
    }

    /// A new future holding `lhs op rhs`. Operands are left untouched; two
    /// immediates are folded into a constant.
    pub fn int_op(
        &mut self,
        op: ClassicalOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
    ) -> KetResult<Future> {
        self.ensure_editable()?;
        let (lhs, rhs) = (lhs.into(), rhs.into());
        let lhs_arg = self.int_arg(lhs)?;
        let rhs_arg = self.int_arg(rhs)?;
        self.ensure_open_block(op.mnemonic())?;

        let kind = match OperandKind::of(&lhs, &rhs) {
            Some(kind) => kind,
            None => return self.fold(op, lhs_arg, rhs_arg),
        };

        let future = self.push_future(FutureExpr::Derived { op, kind, lhs, rhs });
        self.emit(Instruction::IntOp {
            op,
            result: future.index(),
            lhs: lhs_arg,
            rhs: rhs_arg,
        });
        Ok(future)
    }

    /// Overwrite `target` with `value` when execution reaches this point.
    ///
    /// This is the only way to update a future at run time (loop counters);
    /// `future_expr(target)` keeps describing its original definition.
    pub fn int_set(&mut self, target: Future, value: impl Into<Operand>) -> KetResult<()> {
        self.ensure_editable()?;
        let result = self.future_index(target)? as u32;
        let value = self.int_arg(value.into())?;
        self.ensure_open_block("int_set")?;

        self.emit(Instruction::IntOp {
            op: ClassicalOp::Add,
            result,
            lhs: IntArg::Immediate(0),
            rhs: value,
        });
        Ok(())
    }

    fn fold(&mut self, op: ClassicalOp, lhs: IntArg, rhs: IntArg) -> KetResult<Future> {
        let value = match (lhs, rhs) {
            (IntArg::Immediate(a), IntArg::Immediate(b)) => op.apply(a, b),
            _ => None,
        }
        .ok_or_else(|| {
            KetError::InvalidProgram(format!(
                "cannot fold {lhs} {} {rhs}: division by zero or invalid shift",
                op.mnemonic()
            ))
        })?;
        self.new_int(value)
    }

    /// Resolved value of `future`.
    pub fn value(&self, future: Future) -> KetResult<i64> {
        let index = self.future_index(future)?;
        self.futures[index]
            .value
            .ok_or_else(|| KetError::NotAvailable(format!("future {future}")))
    }

    pub fn is_available(&self, future: Future) -> KetResult<bool> {
        let index = self.future_index(future)?;
        Ok(self.futures[index].value.is_some())
    }

    pub fn future_expr(&self, future: Future) -> KetResult<&FutureExpr> {
        let index = self.future_index(future)?;
        Ok(&self.futures[index].expr)
    }

    // ── finalization and execution ──────────────────────────────────────────

    /// The finalized program, as `run` would submit it.
    pub fn program(&self) -> KetResult<Program> {
        self.ensure_editable()?;
        if !self.ctrl.is_empty() {
            return Err(KetError::UnbalancedControlStack(self.ctrl.depth()));
        }
        if self.adj.is_recording() {
            return Err(KetError::UnclosedAdjoint(self.adj.depth()));
        }
        if let Some(index) = self
            .labels
            .iter()
            .position(|label| label.referenced && !label.bound)
        {
            return Err(KetError::UnboundLabel(index as u32));
        }

        let mut blocks: Vec<Vec<Instruction>> = self
            .blocks
            .iter()
            .map(|block| block.instructions.clone())
            .collect();
        if !self.blocks[self.current].terminated {
            blocks[self.current].push(Instruction::Halt);
        }

        Ok(Program {
            process_id: self.id,
            num_qubits: self.qubits.len() as u32,
            num_futures: self.futures.len() as u32,
            num_dumps: self.dumps.len() as u32,
            blocks,
        })
    }

    /// Finalize the program, execute it and resolve every future and dump.
    ///
    /// Either everything is resolved or, on failure, nothing changes.
    pub fn run(&mut self) -> KetResult<()> {
        let program = self.program()?;

        log::info!(
            "process {}: running {} block(s) on {}",
            self.id,
            program.blocks.len(),
            self.engine.name()
        );

        let result = self.engine.execute(&program)?;

        if result.futures.len() != self.futures.len() || result.dumps.len() != self.dumps.len() {
            return Err(KetError::BackendExecution(format!(
                "engine returned {} future(s) and {} dump(s), expected {} and {}",
                result.futures.len(),
                result.dumps.len(),
                self.futures.len(),
                self.dumps.len()
            )));
        }

        // Only programs that executed are logged.
        if let Some(path) = &self.config.kqasm_output {
            program.append_kqasm(path)?;
        }

        for (slot, value) in self.futures.iter_mut().zip(result.futures) {
            slot.value = Some(value);
        }
        self.dumps = result.dumps.into_iter().map(Some).collect();
        self.exec_time = Some(result.exec_time);
        self.executed = true;

        log::info!(
            "process {}: executed in {:.6}s",
            self.id,
            result.exec_time
        );
        Ok(())
    }
}

macro_rules! int_ops {
    ($($name:ident => $op:ident),* $(,)?) => {
        impl Process {
            $(
                #[doc = concat!("`int_op(ClassicalOp::", stringify!($op), ", lhs, rhs)`.")]
                pub fn $name(
                    &mut self,
                    lhs: impl Into<Operand>,
                    rhs: impl Into<Operand>,
                ) -> KetResult<Future> {
                    self.int_op(ClassicalOp::$op, lhs, rhs)
                }
            )*
        }
    };
}

int_ops! {
    add => Add,
    sub => Sub,
    mul => Mul,
    div => Div,
    shl => Shl,
    shr => Shr,
    and => And,
    or => Or,
    xor => Xor,
    eq => Eq,
    neq => Neq,
    lt => Lt,
    leq => Leq,
    gt => Gt,
    geq => Geq,
}
