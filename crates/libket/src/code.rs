//! Instruction stream model.
//!
//! A [`Program`] is a list of basic blocks. Block 0 is the entry block; every
//! other block is named by the label with the same index. Each reachable
//! block ends in `jump`, `branch` or `halt`.
//!
//! Programs serialize to JSON (the engine wire format) and render to KQASM, a
//! line-oriented text form used for inspection.

use crate::{KetError, KetResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    PauliX,
    PauliY,
    PauliZ,
    RotationX,
    RotationY,
    RotationZ,
    Hadamard,
    Phase,
}

impl GateKind {
    /// Whether the gate reads its parameter.
    pub fn is_parametric(&self) -> bool {
        matches!(
            self,
            GateKind::RotationX | GateKind::RotationY | GateKind::RotationZ | GateKind::Phase
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            GateKind::PauliX => "X",
            GateKind::PauliY => "Y",
            GateKind::PauliZ => "Z",
            GateKind::RotationX => "RX",
            GateKind::RotationY => "RY",
            GateKind::RotationZ => "RZ",
            GateKind::Hadamard => "H",
            GateKind::Phase => "PHASE",
        }
    }
}

/// One gate application as it appears in the stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOp {
    pub kind: GateKind,
    pub param: f64,
    pub target: u32,
    #[serde(default)]
    pub control: Vec<u32>,
}

impl GateOp {
    /// The inverse gate: parametric gates get their parameter negated, the
    /// others are self-inverse.
    pub fn inverse(mut self) -> Self {
        if self.kind.is_parametric() {
            self.param = -self.param;
        }
        self
    }
}

impl fmt::Display for GateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.control.is_empty() {
            write!(f, "CTRL {} ", qubit_list(&self.control))?;
        }
        if self.kind.is_parametric() {
            write!(f, "{}({}) q{}", self.kind.mnemonic(), self.param, self.target)
        } else {
            write!(f, "{} q{}", self.kind.mnemonic(), self.target)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassicalOp {
    Add,
    Sub,
    Mul,
    Div,
    Shl,
    Shr,
    And,
    Or,
    Xor,
    Eq,
    Neq,
    Lt,
    Leq,
    Gt,
    Geq,
}

impl ClassicalOp {
    /// Evaluate on two resolved values.
    ///
    /// Arithmetic wraps on overflow. Returns `None` for division by zero
    /// (or `i64::MIN / -1`) and for shift amounts outside `0..64`.
    /// Comparisons yield 0 or 1.
    pub fn apply(&self, a: i64, b: i64) -> Option<i64> {
        let shift = || u32::try_from(b).ok().filter(|s| *s < 64);
        match self {
            ClassicalOp::Add => Some(a.wrapping_add(b)),
            ClassicalOp::Sub => Some(a.wrapping_sub(b)),
            ClassicalOp::Mul => Some(a.wrapping_mul(b)),
            ClassicalOp::Div => a.checked_div(b),
            ClassicalOp::Shl => shift().map(|s| a << s),
            ClassicalOp::Shr => shift().map(|s| a >> s),
            ClassicalOp::And => Some(a & b),
            ClassicalOp::Or => Some(a | b),
            ClassicalOp::Xor => Some(a ^ b),
            ClassicalOp::Eq => Some(i64::from(a == b)),
            ClassicalOp::Neq => Some(i64::from(a != b)),
            ClassicalOp::Lt => Some(i64::from(a < b)),
            ClassicalOp::Leq => Some(i64::from(a <= b)),
            ClassicalOp::Gt => Some(i64::from(a > b)),
            ClassicalOp::Geq => Some(i64::from(a >= b)),
        }
    }

    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            ClassicalOp::Eq
                | ClassicalOp::Neq
                | ClassicalOp::Lt
                | ClassicalOp::Leq
                | ClassicalOp::Gt
                | ClassicalOp::Geq
        )
    }

    pub fn mnemonic(&self) -> &'static str {
        match self {
            ClassicalOp::Add => "ADD",
            ClassicalOp::Sub => "SUB",
            ClassicalOp::Mul => "MUL",
            ClassicalOp::Div => "DIV",
            ClassicalOp::Shl => "SLL",
            ClassicalOp::Shr => "SRL",
            ClassicalOp::And => "AND",
            ClassicalOp::Or => "OR",
            ClassicalOp::Xor => "XOR",
            ClassicalOp::Eq => "EQ",
            ClassicalOp::Neq => "NEQ",
            ClassicalOp::Lt => "LT",
            ClassicalOp::Leq => "LEQ",
            ClassicalOp::Gt => "GT",
            ClassicalOp::Geq => "GEQ",
        }
    }
}

/// Operand of an `int_op` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntArg {
    Future(u32),
    Immediate(i64),
}

impl fmt::Display for IntArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntArg::Future(i) => write!(f, "f{i}"),
            IntArg::Immediate(v) => write!(f, "{v}"),
        }
    }
}

/// Serialized with an `instr` tag, e.g. `{"instr":"jump","addr":1}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "instr", rename_all = "snake_case")]
pub enum Instruction {
    Alloc {
        dirty: bool,
        target: u32,
    },
    Free {
        dirty: bool,
        target: u32,
    },
    Gate(GateOp),
    Measure {
        qubits: Vec<u32>,
        output: u32,
    },
    Dump {
        qubits: Vec<u32>,
        output: u32,
    },
    IntOp {
        op: ClassicalOp,
        result: u32,
        lhs: IntArg,
        rhs: IntArg,
    },
    IntSet {
        result: u32,
        value: i64,
    },
    Jump {
        addr: u32,
    },
    Branch {
        test: u32,
        then: u32,
        otherwise: u32,
    },
    Halt,
}

impl Instruction {
    /// Whether the instruction ends its block.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Instruction::Jump { .. } | Instruction::Branch { .. } | Instruction::Halt
        )
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Alloc { dirty, target } => {
                write!(f, "ALLOC {}q{target}", if *dirty { "DIRTY " } else { "" })
            }
            Instruction::Free { dirty, target } => {
                write!(f, "FREE {}q{target}", if *dirty { "DIRTY " } else { "" })
            }
            Instruction::Gate(gate) => write!(f, "{gate}"),
            Instruction::Measure { qubits, output } => {
                write!(f, "MEASURE {} -> f{output}", qubit_list(qubits))
            }
            Instruction::Dump { qubits, output } => {
                write!(f, "DUMP {} -> d{output}", qubit_list(qubits))
            }
            Instruction::IntOp {
                op,
                result,
                lhs,
                rhs,
            } => write!(f, "INT f{result} = {lhs} {} {rhs}", op.mnemonic()),
            Instruction::IntSet { result, value } => write!(f, "INT f{result} = {value}"),
            Instruction::Jump { addr } => write!(f, "JUMP l{addr}"),
            Instruction::Branch {
                test,
                then,
                otherwise,
            } => write!(f, "BR f{test} l{then} l{otherwise}"),
            Instruction::Halt => write!(f, "HALT"),
        }
    }
}

fn qubit_list(qubits: &[u32]) -> String {
    let parts: Vec<String> = qubits.iter().map(|q| format!("q{q}")).collect();
    format!("[{}]", parts.join(", "))
}

/// A basic block under construction.
#[derive(Debug, Clone, Default)]
pub(crate) struct Block {
    pub(crate) instructions: Vec<Instruction>,
    pub(crate) terminated: bool,
}

impl Block {
    pub(crate) fn push(&mut self, instruction: Instruction) {
        self.terminated = instruction.is_terminator();
        self.instructions.push(instruction);
    }
}

/// A finalized instruction stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub process_id: u32,
    /// Number of qubit indices issued (not the peak live count).
    pub num_qubits: u32,
    pub num_futures: u32,
    pub num_dumps: u32,
    pub blocks: Vec<Vec<Instruction>>,
}

impl Program {
    pub fn from_json(bytes: &[u8]) -> KetResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_json_pretty(&self) -> KetResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Structural checks for programs that did not come from a `Process`
    /// (e.g. loaded from disk).
    pub fn validate(&self) -> KetResult<()> {
        if self.blocks.is_empty() {
            return Err(KetError::InvalidProgram("program has no blocks".into()));
        }

        // Every qubit, future and dump is introduced by an instruction, so no
        // count can exceed the instruction count. This also bounds what an
        // engine preallocates for a loaded program.
        let num_instructions: usize = self.blocks.iter().map(Vec::len).sum();
        for (what, count) in [
            ("qubit", self.num_qubits),
            ("future", self.num_futures),
            ("dump", self.num_dumps),
        ] {
            if count as usize > num_instructions {
                return Err(KetError::InvalidProgram(format!(
                    "{count} {what}(s) declared but only {num_instructions} instruction(s) present"
                )));
            }
        }

        let num_blocks = self.blocks.len();
        let block_ok = |addr: u32| (addr as usize) < num_blocks;
        let qubit_ok = |q: &u32| *q < self.num_qubits;
        let future_ok = |f: u32| f < self.num_futures;

        for (b, block) in self.blocks.iter().enumerate() {
            for (pc, instruction) in block.iter().enumerate() {
                let at = || format!("l{b}:{pc} `{instruction}`");

                let ok = match instruction {
                    Instruction::Alloc { target, .. } | Instruction::Free { target, .. } => {
                        qubit_ok(target)
                    }
                    Instruction::Gate(gate) => {
                        qubit_ok(&gate.target) && gate.control.iter().all(qubit_ok)
                    }
                    Instruction::Measure { qubits, output } => {
                        !qubits.is_empty() && qubits.iter().all(qubit_ok) && future_ok(*output)
                    }
                    Instruction::Dump { qubits, output } => {
                        !qubits.is_empty() && qubits.iter().all(qubit_ok) && *output < self.num_dumps
                    }
                    Instruction::IntOp {
                        result, lhs, rhs, ..
                    } => {
                        let arg_ok = |a: &IntArg| match a {
                            IntArg::Future(f) => future_ok(*f),
                            IntArg::Immediate(_) => true,
                        };
                        future_ok(*result) && arg_ok(lhs) && arg_ok(rhs)
                    }
                    Instruction::IntSet { result, .. } => future_ok(*result),
                    Instruction::Jump { addr } => {
                        if !block_ok(*addr) {
                            return Err(KetError::UnboundLabel(*addr));
                        }
                        true
                    }
                    Instruction::Branch {
                        test,
                        then,
                        otherwise,
                    } => {
                        for addr in [then, otherwise] {
                            if !block_ok(*addr) {
                                return Err(KetError::UnboundLabel(*addr));
                            }
                        }
                        future_ok(*test)
                    }
                    Instruction::Halt => true,
                };

                if !ok {
                    return Err(KetError::InvalidProgram(format!(
                        "index out of range at {}",
                        at()
                    )));
                }

                if instruction.is_terminator() && pc + 1 != block.len() {
                    return Err(KetError::InvalidProgram(format!(
                        "terminator is not the last instruction at {}",
                        at()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Render as KQASM text.
    pub fn to_kqasm(&self) -> String {
        let mut out = String::new();
        for (b, block) in self.blocks.iter().enumerate() {
            out.push_str(&format!("l{b}:\n"));
            for instruction in block {
                out.push_str(&format!("\t{instruction}\n"));
            }
        }
        out
    }

    /// Append the KQASM rendering to `path`, creating the file if needed.
    pub fn append_kqasm(&self, path: &Path) -> KetResult<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(self.to_kqasm().as_bytes())?;
        log::debug!("appended KQASM of process {} to {}", self.process_id, path.display());
        Ok(())
    }
}
