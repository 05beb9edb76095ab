//! Control-qubit stack.
//!
//! Each scope is a non-empty set of qubit indices. A gate emitted while the
//! stack is non-empty is controlled by the union of every scope, in push
//! order, with duplicates removed.

use crate::{KetError, KetResult};
use indexmap::IndexSet;

#[derive(Debug, Clone, Default)]
pub struct ControlStack {
    scopes: Vec<Vec<u32>>,
}

impl ControlStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, qubits: Vec<u32>) -> KetResult<()> {
        if qubits.is_empty() {
            return Err(KetError::EmptyControlSet);
        }
        self.scopes.push(qubits);
        Ok(())
    }

    pub fn pop(&mut self) -> KetResult<Vec<u32>> {
        self.scopes.pop().ok_or(KetError::StackUnderflow)
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    pub fn contains(&self, qubit: u32) -> bool {
        self.scopes.iter().any(|scope| scope.contains(&qubit))
    }

    /// Union of all scopes, first occurrence order.
    pub fn flatten(&self) -> Vec<u32> {
        let set: IndexSet<u32> = self.scopes.iter().flatten().copied().collect();
        set.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scope_is_rejected() {
        let mut stack = ControlStack::new();
        assert_eq!(stack.push(vec![]), Err(KetError::EmptyControlSet));
        assert!(stack.is_empty());
    }

    #[test]
    fn pop_on_empty_underflows() {
        let mut stack = ControlStack::new();
        assert_eq!(stack.pop(), Err(KetError::StackUnderflow));
    }

    #[test]
    fn flatten_unions_nested_scopes_without_duplicates() {
        let mut stack = ControlStack::new();
        stack.push(vec![2, 0]).unwrap();
        stack.push(vec![0, 5]).unwrap();
        assert_eq!(stack.flatten(), vec![2, 0, 5]);
        assert!(stack.contains(5));

        assert_eq!(stack.pop().unwrap(), vec![0, 5]);
        assert_eq!(stack.flatten(), vec![2, 0]);
        assert!(!stack.contains(5));
        assert_eq!(stack.depth(), 1);
    }
}
