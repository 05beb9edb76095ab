//! Adjoint region recorder.
//!
//! While at least one region is open, gates are buffered instead of being
//! emitted. Closing a region replays its buffer in reverse order with every
//! parameter negated; the result goes to the enclosing region when there is
//! one, otherwise it is handed back to the caller for emission.

use crate::code::GateOp;
use crate::{KetError, KetResult};

#[derive(Debug, Clone, Default)]
pub struct AdjointRecorder {
    buffers: Vec<Vec<GateOp>>,
}

impl AdjointRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_recording(&self) -> bool {
        !self.buffers.is_empty()
    }

    pub fn begin(&mut self) {
        self.buffers.push(Vec::new());
    }

    /// Buffer `gate` if a region is open; otherwise give it back.
    pub fn record(&mut self, gate: GateOp) -> Option<GateOp> {
        match self.buffers.last_mut() {
            Some(buffer) => {
                buffer.push(gate);
                None
            }
            None => Some(gate),
        }
    }

    /// Close the innermost region.
    ///
    /// Returns the gates to emit once the outermost region closes, and an
    /// empty list while an enclosing region is still open.
    pub fn end(&mut self) -> KetResult<Vec<GateOp>> {
        let buffer = self.buffers.pop().ok_or(KetError::NoOpenAdjoint)?;
        let inverted: Vec<GateOp> = buffer.into_iter().rev().map(GateOp::inverse).collect();

        match self.buffers.last_mut() {
            Some(parent) => {
                parent.extend(inverted);
                Ok(Vec::new())
            }
            None => Ok(inverted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::GateKind;
    use pretty_assertions::assert_eq;

    fn rz(target: u32, param: f64) -> GateOp {
        GateOp {
            kind: GateKind::RotationZ,
            param,
            target,
            control: vec![],
        }
    }

    #[test]
    fn passthrough_when_not_recording() {
        let mut adj = AdjointRecorder::new();
        assert_eq!(adj.record(rz(0, 1.0)), Some(rz(0, 1.0)));
    }

    #[test]
    fn end_without_begin_fails() {
        let mut adj = AdjointRecorder::new();
        assert_eq!(adj.end(), Err(KetError::NoOpenAdjoint));
    }

    #[test]
    fn single_region_reverses_and_negates() {
        let mut adj = AdjointRecorder::new();
        adj.begin();
        assert_eq!(adj.record(rz(0, 1.0)), None);
        assert_eq!(adj.record(rz(1, 2.0)), None);
        assert_eq!(adj.record(rz(2, 3.0)), None);
        assert_eq!(adj.end().unwrap(), vec![rz(2, -3.0), rz(1, -2.0), rz(0, -1.0)]);
        assert!(!adj.is_recording());
    }

    #[test]
    fn nested_region_is_flattened_into_parent() {
        let mut adj = AdjointRecorder::new();
        adj.begin();
        adj.record(rz(0, 1.0));
        adj.begin();
        adj.record(rz(1, 2.0));
        adj.record(rz(2, 3.0));
        assert!(adj.end().unwrap().is_empty());
        assert_eq!(adj.depth(), 1);
        adj.record(rz(3, 4.0));

        // parent buffer: rz0(1), rz2(-3), rz1(-2), rz3(4)
        assert_eq!(
            adj.end().unwrap(),
            vec![rz(3, -4.0), rz(1, 2.0), rz(2, 3.0), rz(0, -1.0)]
        );
    }
}
