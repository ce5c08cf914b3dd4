//! CIL instruction model.
//!
//! The module codec decodes method bodies into [`Instruction`] vectors before the graph
//! reaches the rewriting passes, so this module holds no byte-level decoder: only the opcode
//! table, operands and the stack effect helpers the passes reason with.

mod instruction;
mod opcodes;

pub use instruction::{Immediate, Instruction, Operand, StackBehavior};
pub use opcodes::OpCode;
