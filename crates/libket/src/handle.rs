//! Handles issued by a [`Process`](crate::Process).
//!
//! A handle is a small `Copy` value: an index into one of the owning
//! process's arenas plus that process's id. Handles carry no state of their
//! own; everything they refer to lives in the process and is queried through
//! it. Using a handle with a different process is detected and refused.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name {
            index: u32,
            process_id: u32,
        }

        impl $name {
            pub(crate) fn new(index: u32, process_id: u32) -> Self {
                Self { index, process_id }
            }

            pub fn index(&self) -> u32 {
                self.index
            }

            pub fn process_id(&self) -> u32 {
                self.process_id
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.index)
            }
        }
    };
}

handle!(
    /// One quantum register entry.
    Qubit,
    "q"
);

handle!(
    /// A jump target; the index is the basic block it names.
    Label,
    "l"
);

handle!(
    /// A deferred 64-bit signed integer.
    Future,
    "f"
);

handle!(
    /// A deferred snapshot of a qubit subset's state.
    Dump,
    "d"
);

/// One side of a classical operation on futures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    Future(Future),
    Immediate(i64),
}

impl Operand {
    pub fn is_immediate(&self) -> bool {
        matches!(self, Operand::Immediate(_))
    }
}

impl From<Future> for Operand {
    fn from(f: Future) -> Self {
        Operand::Future(f)
    }
}

impl From<&Future> for Operand {
    fn from(f: &Future) -> Self {
        Operand::Future(*f)
    }
}

impl From<i64> for Operand {
    fn from(v: i64) -> Self {
        Operand::Immediate(v)
    }
}

impl From<i32> for Operand {
    fn from(v: i32) -> Self {
        Operand::Immediate(i64::from(v))
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Future(fut) => write!(f, "{fut}"),
            Operand::Immediate(v) => write!(f, "{v}"),
        }
    }
}

/// Operand-kind tag of a derived future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperandKind {
    FutureFuture,
    FutureImmediate,
    ImmediateFuture,
}

impl OperandKind {
    /// `None` when both operands are immediates.
    pub fn of(lhs: &Operand, rhs: &Operand) -> Option<Self> {
        match (lhs, rhs) {
            (Operand::Future(_), Operand::Future(_)) => Some(OperandKind::FutureFuture),
            (Operand::Future(_), Operand::Immediate(_)) => Some(OperandKind::FutureImmediate),
            (Operand::Immediate(_), Operand::Future(_)) => Some(OperandKind::ImmediateFuture),
            (Operand::Immediate(_), Operand::Immediate(_)) => None,
        }
    }
}
