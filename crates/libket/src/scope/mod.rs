// Scope module root for libket.
//
// This module groups the two nested scopes a process tracks while code is
// being emitted: the control-qubit stack and the adjoint (inverse) regions.
// Both must be balanced before a program can be finalized.

pub mod adjoint;
pub mod control;

pub use adjoint::AdjointRecorder;
pub use control::ControlStack;
