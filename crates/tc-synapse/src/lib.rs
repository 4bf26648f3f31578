//! Context Assembler (C3): builds the deterministic, schema-restricted
//! context map each agent sees, from project, supplier, documents and
//! prior deliberations.

pub mod assembler;

pub use assembler::{AgentContext, ContextAssembler, ContextError, ContextMeta};
