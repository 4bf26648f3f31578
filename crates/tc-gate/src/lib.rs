//! Lock Evaluator (C6): pure F2/F6/F8 hard-lock predicates plus the
//! blocker-to-action mapping table surfaced to callers who need to tell a
//! human what to do next.

pub mod blockers;
pub mod evaluator;

pub use blockers::actions_for_blockers;
pub use evaluator::{evaluate_lock, GateError, LockContext, LockResult};
