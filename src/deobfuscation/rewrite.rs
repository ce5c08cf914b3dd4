//! In-place instruction rewriting.
//!
//! This is the only place method bodies are edited. Both primitives walk every method of
//! every type in module order and reassign opcode and operand of existing instruction slots;
//! no slot is ever inserted or removed, so branch targets and exception regions expressed as
//! instruction indices stay valid. An instruction that is no longer needed is neutralized to
//! `nop`.
//!
//! - [`rewrite_instructions`] replaces single matching instructions.
//! - [`patch_instructions`] lets the caller inspect the surrounding body and edit several
//!   slots of one method at once.

use log::debug;

use crate::{
    assembly::{Instruction, OpCode, Operand},
    metadata::module::{MethodDef, Module},
};

/// A single slot edit inside one method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    /// Index of the instruction slot
    pub index: usize,
    /// New opcode
    pub opcode: OpCode,
    /// New operand
    pub operand: Operand,
}

impl Patch {
    /// Creates a patch replacing slot `index`
    #[must_use]
    pub fn new(index: usize, opcode: OpCode, operand: Operand) -> Self {
        Patch {
            index,
            opcode,
            operand,
        }
    }

    /// A patch that neutralizes slot `index` to `nop`
    #[must_use]
    pub fn nop(index: usize) -> Self {
        Patch::new(index, OpCode::NOP, Operand::None)
    }
}

/// The instruction a patcher is asked about, with its method for context.
pub struct PatchSite<'a> {
    /// The method whose body is being scanned, with all edits applied so far
    pub method: &'a MethodDef,
    /// Index of the current instruction in the body
    pub index: usize,
}

impl PatchSite<'_> {
    /// The body of the current method
    #[must_use]
    pub fn body(&self) -> &[Instruction] {
        self.method.instructions()
    }

    /// The current instruction
    #[must_use]
    pub fn instruction(&self) -> &Instruction {
        &self.body()[self.index]
    }

    /// The instruction directly before the current one, `None` at the start of the body
    #[must_use]
    pub fn previous(&self) -> Option<&Instruction> {
        self.index
            .checked_sub(1)
            .and_then(|index| self.body().get(index))
    }
}

/// Replaces opcode and operand of every instruction matching `predicate`.
///
/// `produce` is called for each match and returns the new opcode and operand. Returns the
/// number of instructions rewritten.
///
/// # Examples
///
/// ```rust,no_run
/// use cryptoscope::{
///     assembly::{OpCode, Operand},
///     deobfuscation::rewrite::rewrite_instructions,
///     metadata::{token::Token, Module},
/// };
///
/// fn redirect(module: &mut Module, from: Token, to: Token) -> usize {
///     rewrite_instructions(
///         module,
///         |_, instruction| instruction.calls(from),
///         |_, _| (OpCode::CALL, Operand::Method(to)),
///     )
/// }
/// ```
pub fn rewrite_instructions<P, F>(module: &mut Module, mut predicate: P, mut produce: F) -> usize
where
    P: FnMut(&MethodDef, &Instruction) -> bool,
    F: FnMut(&MethodDef, &Instruction) -> (OpCode, Operand),
{
    let mut rewritten = 0;
    for method in module.types.iter_mut().flat_map(|t| t.methods.iter_mut()) {
        for index in 0..method.instructions().len() {
            let instruction = &method.instructions()[index];
            if !predicate(method, instruction) {
                continue;
            }
            let (opcode, operand) = produce(method, instruction);

            if let Some(slot) = method.body.as_mut().and_then(|body| body.get_mut(index)) {
                slot.opcode = opcode;
                slot.operand = operand;
                rewritten += 1;
            }
        }
    }
    rewritten
}

/// Offers every instruction of the module to `patcher` and applies the returned edits.
///
/// Edits are applied as soon as the patcher returns them, so the following indices of the
/// same body are offered with those edits in place. Edits addressing a slot outside the body
/// are dropped. Returns the number of sites for which at least one edit was applied.
pub fn patch_instructions<F>(module: &mut Module, mut patcher: F) -> usize
where
    F: FnMut(&PatchSite<'_>) -> Option<Vec<Patch>>,
{
    let mut patched = 0;
    for method in module.types.iter_mut().flat_map(|t| t.methods.iter_mut()) {
        for index in 0..method.instructions().len() {
            let Some(patches) = patcher(&PatchSite {
                method,
                index,
            }) else {
                continue;
            };

            let Some(body) = method.body.as_mut() else {
                continue;
            };
            let mut applied = false;
            for patch in patches {
                match body.get_mut(patch.index) {
                    Some(slot) => {
                        slot.opcode = patch.opcode;
                        slot.operand = patch.operand;
                        applied = true;
                    }
                    None => debug!(
                        "Dropping patch of slot {} in {} ({} slots)",
                        patch.index,
                        method.token,
                        body.len()
                    ),
                }
            }
            if applied {
                patched += 1;
            }
        }
    }
    patched
}
