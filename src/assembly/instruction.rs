//! CIL instruction representation inside the module graph.
//!
//! An [`Instruction`] is an `(OpCode, Operand)` pair. Method bodies are plain vectors of
//! instructions that the rewriting passes edit in place: opcode and operand of a slot are
//! reassigned, slots are never inserted or removed. A retired instruction becomes `nop`.
//!
//! # Key Components
//!
//! - [`crate::assembly::instruction::Instruction`] - One instruction slot of a method body
//! - [`crate::assembly::instruction::Operand`] - Type-safe operand representation
//! - [`crate::assembly::instruction::Immediate`] - Numeric literal operands
//! - [`crate::assembly::instruction::StackBehavior`] - Evaluation stack effect
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use cryptoscope::assembly::{Instruction, OpCode};
//!
//! let load = Instruction::ldc_i4(0x0A000123);
//! assert_eq!(load.ldc_i4_value(), Some(0x0A000123));
//!
//! let short = Instruction::new(OpCode::LDC_I4_7);
//! assert_eq!(short.ldc_i4_value(), Some(7));
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    assembly::OpCode,
    metadata::{token::Token, userstring::UserString},
};

/// Numeric literal carried by an instruction.
///
/// `ldc.i4.s` operands are widened to [`Immediate::Int32`] by the module codec, so every
/// `ldc.i4` form exposes its value the same way.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Immediate {
    /// 32-bit signed integer
    Int32(i32),
    /// 64-bit signed integer
    Int64(i64),
    /// 32-bit floating point, exchanged as its bit pattern
    Float32(#[serde(with = "crate::utils::bits::f32_bits")] f32),
    /// 64-bit floating point, exchanged as its bit pattern
    Float64(#[serde(with = "crate::utils::bits::f64_bits")] f64),
}

/// Operand of a CIL instruction.
///
/// # Examples
///
/// ```rust,no_run
/// use cryptoscope::assembly::{Immediate, Operand};
/// use cryptoscope::metadata::token::Token;
///
/// let immediate = Operand::Immediate(Immediate::Int32(42));
/// let target = Operand::Method(Token::new(0x0A000001));
/// let literal = Operand::String("hello".into());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Operand {
    /// No operand present
    #[default]
    None,
    /// Immediate value (constant embedded in instruction)
    Immediate(Immediate),
    /// String literal of `ldstr`
    String(UserString),
    /// Method reference of `call`, `callvirt`, `newobj`, `ldftn` and friends (`MethodDef` or `MemberRef`)
    Method(Token),
    /// Any other metadata token reference
    Token(Token),
    /// Branch target, as an index into the method body
    Target(u32),
    /// Switch table, as indices into the method body
    Switch(Vec<u32>),
    /// Local variable index
    Local(u16),
    /// Method argument index
    Argument(u16),
}

impl Operand {
    /// Returns a formatted string representation of the operand, `None` for [`Operand::None`].
    #[must_use]
    pub fn as_string(&self) -> Option<String> {
        match self {
            Operand::None => None,
            Operand::Immediate(Immediate::Int32(v)) => Some(v.to_string()),
            Operand::Immediate(Immediate::Int64(v)) => Some(v.to_string()),
            Operand::Immediate(Immediate::Float32(v)) => Some(v.to_string()),
            Operand::Immediate(Immediate::Float64(v)) => Some(v.to_string()),
            Operand::String(s) => Some(format!("{s:?}")),
            Operand::Method(t) | Operand::Token(t) => Some(format!("0x{:08X}", t.value())),
            Operand::Target(t) => Some(format!("IL_{t:04}")),
            Operand::Switch(targets) => Some(format!("switch({})", targets.len())),
            Operand::Local(l) => Some(format!("V_{l}")),
            Operand::Argument(a) => Some(format!("A_{a}")),
        }
    }
}

/// Stack effect of an instruction.
///
/// Describes how an instruction modifies the evaluation stack. Call sites are only ever
/// rewritten into instructions with the same net effect.
///
/// # Examples
///
/// ```rust,no_run
/// use cryptoscope::assembly::StackBehavior;
///
/// // `call int32 Foo::Bar(int32)` pops the argument and pushes the result
/// let call = StackBehavior::new(1, 1);
/// assert_eq!(call.net_effect, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackBehavior {
    /// Number of items popped from stack
    pub pops: u8,
    /// Number of items pushed to stack
    pub pushes: u8,
    /// Net effect on stack depth (pushes - pops)
    pub net_effect: i8,
}

impl StackBehavior {
    /// Builds a stack behavior from pop and push counts, deriving the net effect.
    #[must_use]
    pub fn new(pops: u8, pushes: u8) -> Self {
        StackBehavior {
            pops,
            pushes,
            net_effect: pushes as i8 - pops as i8,
        }
    }
}

/// One instruction slot of a method body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// The opcode of this slot
    pub opcode: OpCode,
    /// The operand data for this instruction
    #[serde(default)]
    pub operand: Operand,
}

impl Instruction {
    /// Creates an instruction without operand.
    #[must_use]
    pub fn new(opcode: OpCode) -> Self {
        Instruction {
            opcode,
            operand: Operand::None,
        }
    }

    /// Creates an instruction with the given operand.
    #[must_use]
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Instruction { opcode, operand }
    }

    /// `nop`
    #[must_use]
    pub fn nop() -> Self {
        Instruction::new(OpCode::NOP)
    }

    /// `ldc.i4 value`
    #[must_use]
    pub fn ldc_i4(value: i32) -> Self {
        Instruction::with_operand(OpCode::LDC_I4, Operand::Immediate(Immediate::Int32(value)))
    }

    /// `call method`
    #[must_use]
    pub fn call(method: Token) -> Self {
        Instruction::with_operand(OpCode::CALL, Operand::Method(method))
    }

    /// `callvirt method`
    #[must_use]
    pub fn callvirt(method: Token) -> Self {
        Instruction::with_operand(OpCode::CALLVIRT, Operand::Method(method))
    }

    /// Returns true for `call` and `callvirt`
    #[must_use]
    pub fn is_call(&self) -> bool {
        self.opcode.is_call()
    }

    /// Returns true for `call`/`callvirt` whose operand is `method`
    #[must_use]
    pub fn calls(&self, method: Token) -> bool {
        self.is_call() && self.method_operand() == Some(method)
    }

    /// The value pushed by any `ldc.i4` form.
    ///
    /// Covers the short forms (`ldc.i4.m1` to `ldc.i4.8`), whose value is implied by the
    /// opcode, as well as `ldc.i4.s` and `ldc.i4`. Returns `None` for every other
    /// instruction, or when an explicit form carries no integer operand.
    #[must_use]
    pub fn ldc_i4_value(&self) -> Option<i32> {
        if let Some(value) = self.opcode.implicit_i4() {
            return Some(value);
        }
        if !self.opcode.is_ldc_i4() {
            return None;
        }
        self.get_i32_operand()
    }

    /// Extracts an i32 operand from the instruction.
    #[must_use]
    pub fn get_i32_operand(&self) -> Option<i32> {
        match &self.operand {
            Operand::Immediate(Immediate::Int32(v)) => Some(*v),
            _ => None,
        }
    }

    /// Extracts the method token of a call-like instruction.
    #[must_use]
    pub fn method_operand(&self) -> Option<Token> {
        match &self.operand {
            Operand::Method(token) => Some(*token),
            _ => None,
        }
    }

    /// Extracts a metadata token of any kind from the instruction.
    #[must_use]
    pub fn get_token_operand(&self) -> Option<Token> {
        match &self.operand {
            Operand::Method(token) | Operand::Token(token) => Some(*token),
            _ => None,
        }
    }

    /// Stack behavior of instructions whose effect does not depend on a signature.
    ///
    /// Covers literal loads (pop 0, push 1) and `nop` (0/0). Call-like instructions need the
    /// callee signature, see [`crate::metadata::Module::call_stack_behavior`].
    #[must_use]
    pub fn fixed_stack_behavior(&self) -> Option<StackBehavior> {
        match self.opcode {
            OpCode::NOP => Some(StackBehavior::new(0, 0)),
            OpCode::LDSTR | OpCode::LDC_I8 | OpCode::LDC_R4 | OpCode::LDC_R8 | OpCode::LDNULL => {
                Some(StackBehavior::new(0, 1))
            }
            op if op.is_ldc_i4() => Some(StackBehavior::new(0, 1)),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand.as_string() {
            Some(operand) => write!(f, "{} {}", self.opcode, operand),
            None => write!(f, "{}", self.opcode),
        }
    }
}
