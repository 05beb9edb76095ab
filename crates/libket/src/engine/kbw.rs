//! KBW: sparse bitwise reference engine.
//!
//! The state is a map from basis state (bitmask over physical qubits) to
//! amplitude; only non-negligible amplitudes are kept. Logical qubit indices
//! from the program are mapped onto at most 64 physical qubits, reusing freed
//! ones. A measured qubit is reset and released. Measurement samples from a `StdRng`, seeded when a seed is
//! configured, so runs are reproducible.
//!
//! Unexecuted futures resolve to 0 and unexecuted dumps to an empty dump.

use super::{DumpData, Engine, EngineError, EngineResult, QuantumResult};
use crate::code::{GateKind, GateOp, Instruction, IntArg, Program};
use crate::KetConfig;
use indexmap::IndexMap;
use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::FRAC_1_SQRT_2;
use std::time::Instant;

pub const MAX_PHYSICAL_QUBITS: u32 = 64;
pub const DEFAULT_MAX_INSTRUCTIONS: u64 = 1_000_000;

const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
pub struct Kbw {
    seed: Option<u64>,
    max_instructions: u64,
}

impl Kbw {
    pub fn new() -> Self {
        Self {
            seed: None,
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
        }
    }

    pub fn from_config(cfg: &KetConfig) -> Self {
        Self {
            seed: cfg.seed,
            max_instructions: cfg.max_instructions.unwrap_or(DEFAULT_MAX_INSTRUCTIONS),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_max_instructions(mut self, limit: u64) -> Self {
        self.max_instructions = limit;
        self
    }
}

impl Default for Kbw {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for Kbw {
    fn name(&self) -> &str {
        "kbw"
    }

    fn execute(&mut self, program: &Program) -> EngineResult<QuantumResult> {
        let rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let start = Instant::now();
        let mut machine = Machine::new(program, rng);
        machine.run(program, self.max_instructions)?;
        let exec_time = start.elapsed().as_secs_f64();

        log::debug!(
            "kbw: process {} finished in {exec_time:.6}s with {} basis state(s)",
            program.process_id,
            machine.space.len()
        );

        Ok(QuantumResult {
            futures: machine.futures,
            dumps: machine
                .dumps
                .into_iter()
                .map(Option::unwrap_or_default)
                .collect(),
            exec_time,
        })
    }
}

type Matrix = [[Complex64; 2]; 2];

fn c(re: f64, im: f64) -> Complex64 {
    Complex64::new(re, im)
}

/// `[out][in]` matrix of a single-qubit gate.
fn matrix(kind: GateKind, param: f64) -> Matrix {
    let (sin, cos) = (param / 2.0).sin_cos();
    match kind {
        GateKind::PauliX => [[c(0.0, 0.0), c(1.0, 0.0)], [c(1.0, 0.0), c(0.0, 0.0)]],
        GateKind::PauliY => [[c(0.0, 0.0), c(0.0, -1.0)], [c(0.0, 1.0), c(0.0, 0.0)]],
        GateKind::PauliZ => [[c(1.0, 0.0), c(0.0, 0.0)], [c(0.0, 0.0), c(-1.0, 0.0)]],
        GateKind::Hadamard => [
            [c(FRAC_1_SQRT_2, 0.0), c(FRAC_1_SQRT_2, 0.0)],
            [c(FRAC_1_SQRT_2, 0.0), c(-FRAC_1_SQRT_2, 0.0)],
        ],
        GateKind::Phase => [
            [c(1.0, 0.0), c(0.0, 0.0)],
            [c(0.0, 0.0), Complex64::from_polar(1.0, param)],
        ],
        GateKind::RotationX => [[c(cos, 0.0), c(0.0, -sin)], [c(0.0, -sin), c(cos, 0.0)]],
        GateKind::RotationY => [[c(cos, 0.0), c(-sin, 0.0)], [c(sin, 0.0), c(cos, 0.0)]],
        GateKind::RotationZ => [
            [Complex64::from_polar(1.0, -param / 2.0), c(0.0, 0.0)],
            [c(0.0, 0.0), Complex64::from_polar(1.0, param / 2.0)],
        ],
    }
}

struct Machine {
    space: IndexMap<u64, Complex64>,
    /// logical index -> physical qubit
    qubit_map: Vec<Option<u32>>,
    free: Vec<u32>,
    dirty: Vec<u32>,
    futures: Vec<i64>,
    dumps: Vec<Option<DumpData>>,
    rng: StdRng,
}

impl Machine {
    fn new(program: &Program, rng: StdRng) -> Self {
        let mut space = IndexMap::new();
        space.insert(0, c(1.0, 0.0));

        Self {
            space,
            qubit_map: vec![None; program.num_qubits as usize],
            free: (0..MAX_PHYSICAL_QUBITS).rev().collect(),
            dirty: Vec::new(),
            futures: vec![0; program.num_futures as usize],
            dumps: vec![None; program.num_dumps as usize],
            rng,
        }
    }

    fn run(&mut self, program: &Program, budget: u64) -> EngineResult<()> {
        let mut block = 0usize;
        let mut steps = 0u64;

        'blocks: loop {
            let instructions = program
                .blocks
                .get(block)
                .ok_or_else(|| EngineError::new(format!("jump to missing block l{block}")))?;

            for instruction in instructions {
                steps += 1;
                if steps > budget {
                    return Err(EngineError::new(format!(
                        "instruction budget of {budget} exhausted in block l{block}"
                    )));
                }

                log::trace!("kbw: l{block}: {instruction}");

                match instruction {
                    Instruction::Jump { addr } => {
                        block = *addr as usize;
                        continue 'blocks;
                    }
                    Instruction::Branch {
                        test,
                        then,
                        otherwise,
                    } => {
                        let value = self.future(*test)?;
                        let next = if value != 0 { *then } else { *otherwise };
                        block = next as usize;
                        continue 'blocks;
                    }
                    Instruction::Halt => return Ok(()),
                    other => self.step(other)?,
                }
            }

            return Err(EngineError::new(format!(
                "block l{block} ends without a terminator"
            )));
        }
    }

    fn step(&mut self, instruction: &Instruction) -> EngineResult<()> {
        match instruction {
            Instruction::Alloc { dirty, target } => self.alloc(*target, *dirty),
            Instruction::Free { dirty, target } => self.free(*target, *dirty),
            Instruction::Gate(gate) => self.gate(gate),
            Instruction::Measure { qubits, output } => {
                let value = self.measure(qubits)?;
                *self.future_slot(*output)? = value;
                Ok(())
            }
            Instruction::Dump { qubits, output } => {
                let data = self.dump(qubits)?;
                let slot = self
                    .dumps
                    .get_mut(*output as usize)
                    .ok_or_else(|| EngineError::new(format!("d{output} is out of range")))?;
                *slot = Some(data);
                Ok(())
            }
            Instruction::IntOp {
                op,
                result,
                lhs,
                rhs,
            } => {
                let a = self.arg(lhs)?;
                let b = self.arg(rhs)?;
                let value = op.apply(a, b).ok_or_else(|| {
                    EngineError::new(format!(
                        "f{result} = {a} {} {b}: division by zero or invalid shift",
                        op.mnemonic()
                    ))
                })?;
                *self.future_slot(*result)? = value;
                Ok(())
            }
            Instruction::IntSet { result, value } => {
                *self.future_slot(*result)? = *value;
                Ok(())
            }
            Instruction::Jump { .. } | Instruction::Branch { .. } | Instruction::Halt => {
                Err(EngineError::new("control transfer outside block dispatch"))
            }
        }
    }

    fn future(&self, index: u32) -> EngineResult<i64> {
        self.futures
            .get(index as usize)
            .copied()
            .ok_or_else(|| EngineError::new(format!("f{index} is out of range")))
    }

    fn future_slot(&mut self, index: u32) -> EngineResult<&mut i64> {
        self.futures
            .get_mut(index as usize)
            .ok_or_else(|| EngineError::new(format!("f{index} is out of range")))
    }

    fn arg(&self, arg: &IntArg) -> EngineResult<i64> {
        match arg {
            IntArg::Future(index) => self.future(*index),
            IntArg::Immediate(value) => Ok(*value),
        }
    }

    fn physical(&self, logical: u32) -> EngineResult<u32> {
        self.qubit_map
            .get(logical as usize)
            .copied()
            .flatten()
            .ok_or_else(|| EngineError::new(format!("q{logical} is not allocated")))
    }

    fn alloc(&mut self, logical: u32, dirty: bool) -> EngineResult<()> {
        let slot = self
            .qubit_map
            .get_mut(logical as usize)
            .ok_or_else(|| EngineError::new(format!("q{logical} is out of range")))?;
        if slot.is_some() {
            return Err(EngineError::new(format!("q{logical} is allocated twice")));
        }

        let physical = if dirty {
            self.dirty.pop().or_else(|| self.free.pop())
        } else {
            self.free.pop()
        }
        .ok_or_else(|| {
            EngineError::new(format!(
                "cannot allocate q{logical}: all {MAX_PHYSICAL_QUBITS} physical qubits in use"
            ))
        })?;

        *slot = Some(physical);
        Ok(())
    }

    fn free(&mut self, logical: u32, dirty: bool) -> EngineResult<()> {
        let physical = self.physical(logical)?;
        let mask = 1u64 << physical;

        if dirty {
            self.dirty.push(physical);
        } else {
            if self.space.keys().any(|state| state & mask != 0) {
                return Err(EngineError::new(format!(
                    "q{logical} freed clean while not in |0>"
                )));
            }
            self.free.push(physical);
        }

        self.qubit_map[logical as usize] = None;
        Ok(())
    }

    fn gate(&mut self, gate: &GateOp) -> EngineResult<()> {
        let target = 1u64 << self.physical(gate.target)?;
        let mut ctrl_mask = 0u64;
        for ctrl in &gate.control {
            ctrl_mask |= 1u64 << self.physical(*ctrl)?;
        }

        self.apply(target, ctrl_mask, matrix(gate.kind, gate.param));
        Ok(())
    }

    fn apply(&mut self, target: u64, ctrl_mask: u64, u: Matrix) {
        let zero = c(0.0, 0.0);
        let mut next: IndexMap<u64, Complex64> = IndexMap::with_capacity(self.space.len() * 2);

        for (&state, &amp) in &self.space {
            if state & ctrl_mask != ctrl_mask {
                *next.entry(state).or_insert(zero) += amp;
                continue;
            }

            let bit = usize::from(state & target != 0);
            let same = u[bit][bit];
            let flip = u[1 - bit][bit];

            if same != zero {
                *next.entry(state).or_insert(zero) += same * amp;
            }
            if flip != zero {
                *next.entry(state ^ target).or_insert(zero) += flip * amp;
            }
        }

        next.retain(|_, amp| amp.norm() >= EPSILON);
        self.space = next;
    }

    /// Big-endian: the first listed qubit is the most significant bit.
    fn measure(&mut self, qubits: &[u32]) -> EngineResult<i64> {
        if qubits.len() > 63 {
            return Err(EngineError::new(format!(
                "cannot measure {} qubits into a 64-bit signed value",
                qubits.len()
            )));
        }

        let mut result = 0i64;
        for &logical in qubits {
            let physical = self.physical(logical)?;
            let mask = 1u64 << physical;
            let bit = self.measure_one(mask);
            result = (result << 1) | bit;

            // A measured qubit is released: reset it to |0> so a clean
            // allocation can take its slot.
            if bit == 1 {
                self.space = self
                    .space
                    .drain(..)
                    .map(|(state, amp)| (state ^ mask, amp))
                    .collect();
            }
            self.qubit_map[logical as usize] = None;
            self.free.push(physical);
        }
        Ok(result)
    }

    fn measure_one(&mut self, mask: u64) -> i64 {
        let p1: f64 = self
            .space
            .iter()
            .filter(|(state, _)| **state & mask != 0)
            .map(|(_, amp)| amp.norm_sqr())
            .sum();

        let one = if p1 <= EPSILON {
            false
        } else if 1.0 - p1 <= EPSILON {
            true
        } else {
            self.rng.gen::<f64>() < p1
        };

        let p = if one { p1 } else { 1.0 - p1 };
        let norm = p.sqrt();
        self.space.retain(|state, _| (state & mask != 0) == one);
        for amp in self.space.values_mut() {
            *amp = *amp / norm;
        }

        i64::from(one)
    }

    fn dump(&self, qubits: &[u32]) -> EngineResult<DumpData> {
        if qubits.len() > MAX_PHYSICAL_QUBITS as usize {
            return Err(EngineError::new(format!(
                "cannot dump {} qubits",
                qubits.len()
            )));
        }

        let masks = qubits
            .iter()
            .map(|q| self.physical(*q).map(|p| 1u64 << p))
            .collect::<EngineResult<Vec<u64>>>()?;

        let mut grouped: IndexMap<u64, Vec<Complex64>> = IndexMap::new();
        for (&state, &amp) in &self.space {
            let sub = masks
                .iter()
                .fold(0u64, |acc, m| (acc << 1) | u64::from(state & m != 0));
            grouped.entry(sub).or_default().push(amp);
        }

        let (basis_states, amplitudes) = grouped.into_iter().unzip();
        Ok(DumpData {
            basis_states,
            amplitudes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::ClassicalOp;
    use std::f64::consts::PI;

    fn program(num_qubits: u32, num_futures: u32, num_dumps: u32, blocks: Vec<Vec<Instruction>>) -> Program {
        Program {
            process_id: 0,
            num_qubits,
            num_futures,
            num_dumps,
            blocks,
        }
    }

    fn alloc(target: u32) -> Instruction {
        Instruction::Alloc {
            dirty: false,
            target,
        }
    }

    fn gate(kind: GateKind, param: f64, target: u32, control: Vec<u32>) -> Instruction {
        Instruction::Gate(GateOp {
            kind,
            param,
            target,
            control,
        })
    }

    fn measure(qubits: Vec<u32>, output: u32) -> Instruction {
        Instruction::Measure { qubits, output }
    }

    fn run(p: &Program, seed: u64) -> QuantumResult {
        Kbw::new().with_seed(seed).execute(p).unwrap()
    }

    #[test]
    fn x_then_measure_is_one() {
        let p = program(
            1,
            1,
            0,
            vec![vec![
                alloc(0),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                measure(vec![0], 0),
                Instruction::Halt,
            ]],
        );
        assert_eq!(run(&p, 1).futures, vec![1]);
    }

    #[test]
    fn measurement_is_big_endian() {
        let p = program(
            3,
            1,
            0,
            vec![vec![
                alloc(0),
                alloc(1),
                alloc(2),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                gate(GateKind::PauliX, 0.0, 2, vec![]),
                measure(vec![0, 1, 2], 0),
                Instruction::Halt,
            ]],
        );
        assert_eq!(run(&p, 1).futures, vec![0b101]);

        let p = program(
            2,
            1,
            0,
            vec![vec![
                alloc(0),
                alloc(1),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                measure(vec![0, 1], 0),
                Instruction::Halt,
            ]],
        );
        assert_eq!(run(&p, 1).futures, vec![2]);
    }

    #[test]
    fn bell_pair_is_correlated_and_dumped() {
        let p = program(
            2,
            1,
            1,
            vec![vec![
                alloc(0),
                alloc(1),
                gate(GateKind::Hadamard, 0.0, 0, vec![]),
                gate(GateKind::PauliX, 0.0, 1, vec![0]),
                Instruction::Dump {
                    qubits: vec![0, 1],
                    output: 0,
                },
                measure(vec![0, 1], 0),
                Instruction::Halt,
            ]],
        );

        let mut seen = [false; 4];
        for seed in 0..64 {
            let r = run(&p, seed);
            let m = r.futures[0];
            assert!(m == 0 || m == 3, "unexpected outcome {m}");
            seen[m as usize] = true;

            let dump = &r.dumps[0];
            let mut states: Vec<u64> = dump.states().collect();
            states.sort_unstable();
            assert_eq!(states, vec![0, 3]);
            for state in [0, 3] {
                let amp = dump.amplitude(state).unwrap();
                assert!((amp.norm() - FRAC_1_SQRT_2).abs() < 1e-9);
            }
            assert!((dump.total_probability() - 1.0).abs() < 1e-9);
        }
        assert!(seen[0] && seen[3]);
    }

    #[test]
    fn partial_dump_groups_amplitudes() {
        // |+> on q0, |0> on q1: dumping q1 alone sees one basis state with
        // two components.
        let p = program(
            2,
            0,
            1,
            vec![vec![
                alloc(0),
                alloc(1),
                gate(GateKind::Hadamard, 0.0, 0, vec![]),
                Instruction::Dump {
                    qubits: vec![1],
                    output: 0,
                },
                Instruction::Halt,
            ]],
        );
        let dump = &run(&p, 0).dumps[0];
        assert_eq!(dump.states().collect::<Vec<_>>(), vec![0]);
        assert_eq!(dump.amplitudes_of(0).map(<[Complex64]>::len), Some(2));
        assert_eq!(dump.amplitude(0), None);
        assert!((dump.probability(0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_outcomes() {
        let mut blocks = vec![alloc(0), alloc(1), alloc(2)];
        for q in 0..3 {
            blocks.push(gate(GateKind::Hadamard, 0.0, q, vec![]));
        }
        blocks.push(measure(vec![0, 1, 2], 0));
        blocks.push(Instruction::Halt);
        let p = program(3, 1, 0, vec![blocks]);

        assert_eq!(run(&p, 7).futures, run(&p, 7).futures);
    }

    #[test]
    fn rotations_match_their_definitions() {
        // RX(pi) = -iX, RY(pi)|0> = |1>, RZ(pi)|1> = i|1>, Phase(pi/2)|1> = i|1>
        let cases = [
            (GateKind::RotationX, PI, false, 1u64, c(0.0, -1.0)),
            (GateKind::RotationY, PI, false, 1, c(1.0, 0.0)),
            (GateKind::RotationZ, PI, true, 1, c(0.0, 1.0)),
            (GateKind::Phase, PI / 2.0, true, 1, c(0.0, 1.0)),
            (GateKind::PauliY, 0.0, false, 1, c(0.0, 1.0)),
            (GateKind::PauliZ, 0.0, true, 1, c(-1.0, 0.0)),
        ];

        for (kind, param, start_one, state, expected) in cases {
            let mut blocks = vec![alloc(0)];
            if start_one {
                blocks.push(gate(GateKind::PauliX, 0.0, 0, vec![]));
            }
            blocks.push(gate(kind, param, 0, vec![]));
            blocks.push(Instruction::Dump {
                qubits: vec![0],
                output: 0,
            });
            blocks.push(Instruction::Halt);

            let r = run(&program(1, 0, 1, vec![blocks]), 0);
            let amp = r.dumps[0].amplitude(state).unwrap();
            assert!(
                (amp - expected).norm() < 1e-9,
                "{kind:?}({param}): got {amp}, expected {expected}"
            );
        }
    }

    #[test]
    fn control_requires_all_controls_set() {
        let p = program(
            3,
            1,
            0,
            vec![vec![
                alloc(0),
                alloc(1),
                alloc(2),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                gate(GateKind::PauliX, 0.0, 2, vec![0, 1]),
                measure(vec![2], 0),
                Instruction::Halt,
            ]],
        );
        assert_eq!(run(&p, 0).futures, vec![0]);
    }

    #[test]
    fn branch_follows_future_value() {
        // f0 = measure(X q0) = 1 -> l1 flips q1 -> l2 measures q1
        let p = program(
            2,
            2,
            0,
            vec![
                vec![
                    alloc(0),
                    alloc(1),
                    gate(GateKind::PauliX, 0.0, 0, vec![]),
                    measure(vec![0], 0),
                    Instruction::Branch {
                        test: 0,
                        then: 1,
                        otherwise: 2,
                    },
                ],
                vec![
                    gate(GateKind::PauliX, 0.0, 1, vec![]),
                    Instruction::Jump { addr: 2 },
                ],
                vec![measure(vec![1], 1), Instruction::Halt],
            ],
        );
        assert_eq!(run(&p, 0).futures, vec![1, 1]);
    }

    #[test]
    fn classical_ops_and_constants() {
        let p = program(
            0,
            3,
            0,
            vec![vec![
                Instruction::IntSet {
                    result: 0,
                    value: 20,
                },
                Instruction::IntOp {
                    op: ClassicalOp::Sub,
                    result: 1,
                    lhs: IntArg::Future(0),
                    rhs: IntArg::Immediate(5),
                },
                Instruction::IntOp {
                    op: ClassicalOp::Gt,
                    result: 2,
                    lhs: IntArg::Immediate(16),
                    rhs: IntArg::Future(1),
                },
                Instruction::Halt,
            ]],
        );
        assert_eq!(run(&p, 0).futures, vec![20, 15, 1]);
    }

    #[test]
    fn division_by_zero_fails_the_run() {
        let p = program(
            0,
            1,
            0,
            vec![vec![
                Instruction::IntOp {
                    op: ClassicalOp::Div,
                    result: 0,
                    lhs: IntArg::Immediate(1),
                    rhs: IntArg::Immediate(0),
                },
                Instruction::Halt,
            ]],
        );
        let err = Kbw::new().execute(&p).unwrap_err();
        assert!(err.message.contains("division by zero"));
    }

    #[test]
    fn endless_loop_exhausts_budget() {
        let p = program(0, 0, 0, vec![vec![Instruction::Jump { addr: 0 }]]);
        let err = Kbw::new().with_max_instructions(50).execute(&p).unwrap_err();
        assert!(err.message.contains("budget"));
    }

    #[test]
    fn clean_free_requires_zero_state() {
        let p = program(
            1,
            0,
            0,
            vec![vec![
                alloc(0),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                Instruction::Free {
                    dirty: false,
                    target: 0,
                },
                Instruction::Halt,
            ]],
        );
        let err = Kbw::new().execute(&p).unwrap_err();
        assert!(err.message.contains("freed clean"));
    }

    #[test]
    fn dirty_free_is_reused_by_dirty_alloc() {
        // q0 is left in |1> and freed dirty; q1 allocated dirty inherits it.
        let p = program(
            2,
            1,
            0,
            vec![vec![
                alloc(0),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                Instruction::Free {
                    dirty: true,
                    target: 0,
                },
                Instruction::Alloc {
                    dirty: true,
                    target: 1,
                },
                measure(vec![1], 0),
                Instruction::Halt,
            ]],
        );
        assert_eq!(run(&p, 0).futures, vec![1]);
    }

    #[test]
    fn unexecuted_values_default() {
        let p = program(
            1,
            1,
            1,
            vec![
                vec![Instruction::Jump { addr: 2 }],
                vec![
                    alloc(0),
                    Instruction::Dump {
                        qubits: vec![0],
                        output: 0,
                    },
                    measure(vec![0], 0),
                    Instruction::Halt,
                ],
                vec![Instruction::Halt],
            ],
        );
        let r = run(&p, 0);
        assert_eq!(r.futures, vec![0]);
        assert!(r.dumps[0].is_empty());
    }

    #[test]
    fn measured_qubits_release_their_slot() {
        let count = MAX_PHYSICAL_QUBITS + 8;
        let mut block = Vec::new();
        for q in 0..count {
            block.push(alloc(q));
            block.push(gate(GateKind::PauliX, 0.0, q, vec![]));
            block.push(measure(vec![q], q));
        }
        block.push(Instruction::Halt);
        let p = program(count, count, 0, vec![block]);

        assert_eq!(run(&p, 0).futures, vec![1; count as usize]);
    }

    #[test]
    fn measurement_leaves_other_qubits_intact() {
        // q1 is measured as 1 and released; q0 still holds |1>, q2 reuses
        // q1's slot and starts in |0>.
        let p = program(
            3,
            2,
            0,
            vec![vec![
                alloc(0),
                alloc(1),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                gate(GateKind::PauliX, 0.0, 1, vec![]),
                measure(vec![1], 0),
                alloc(2),
                measure(vec![0, 2], 1),
                Instruction::Halt,
            ]],
        );
        assert_eq!(run(&p, 0).futures, vec![1, 0b10]);
    }

    #[test]
    fn gate_on_measured_qubit_fails() {
        let p = program(
            1,
            1,
            0,
            vec![vec![
                alloc(0),
                measure(vec![0], 0),
                gate(GateKind::PauliX, 0.0, 0, vec![]),
                Instruction::Halt,
            ]],
        );
        let err = Kbw::new().execute(&p).unwrap_err();
        assert_eq!(err.message, "q0 is not allocated");
    }

    #[test]
    fn gate_on_unallocated_qubit_fails() {
        let p = program(
            1,
            0,
            0,
            vec![vec![gate(GateKind::Hadamard, 0.0, 0, vec![]), Instruction::Halt]],
        );
        let err = Kbw::new().execute(&p).unwrap_err();
        assert_eq!(err.message, "q0 is not allocated");
    }
}
