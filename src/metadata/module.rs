//! The mutable module graph the rewriting passes operate on.
//!
//! A [`Module`] is the decoded form of one managed binary, as produced by a
//! [`crate::metadata::codec::ModuleCodec`]: its type definitions with their methods and
//! instruction bodies, and its `MemberRef` table. Types are stored flat, in the order
//! the codec reported them; a nested type records the token of its enclosing type.
//!
//! The graph is owned by exactly one caller at a time and passed by `&mut` to each pass.
//! Entities are addressed by [`Token`], and no operation here ever renumbers them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cryptoscope::metadata::{Module, token::Token};
//!
//! fn show(module: &Module) {
//!     for ty in &module.types {
//!         println!("{} ({} methods)", module.type_full_name(ty), ty.methods.len());
//!     }
//!     if let Some(member) = module.member_ref(Token::new(0x0A000001)) {
//!         println!("first reference: {}::{}", member.class, member.name);
//!     }
//! }
//! ```

use std::collections::HashSet;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{
    assembly::{Instruction, OpCode, StackBehavior},
    metadata::{
        signatures::{MethodSignature, TypeSignature},
        token::Token,
    },
    Error, Result,
};

/// Name of instance constructors
pub const CONSTRUCTOR_NAME: &str = ".ctor";
/// Name of static initializers
pub const STATIC_CONSTRUCTOR_NAME: &str = ".cctor";

/// Bitmask for the member access bits of method attributes
pub const METHOD_ACCESS_MASK: u32 = 0x0007;
/// Bitmask for the vtable layout bit of method attributes
pub const METHOD_VTABLE_LAYOUT_MASK: u32 = 0x0100;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// Method modifiers and properties (II.23.1.10)
    pub struct MethodModifiers: u32 {
        /// Defined on type, else per instance
        const STATIC = 0x0010;
        /// Method cannot be overridden
        const FINAL = 0x0020;
        /// Method is virtual
        const VIRTUAL = 0x0040;
        /// Method hides by name+sig, else just by name
        const HIDE_BY_SIG = 0x0080;
        /// Method can only be overriden if also accessible
        const STRICT = 0x0200;
        /// Method does not provide an implementation
        const ABSTRACT = 0x0400;
        /// Method is special
        const SPECIAL_NAME = 0x0800;
        /// CLI provides 'special' behavior, depending upon the name of the method
        const RTSPECIAL_NAME = 0x1000;
        /// Implementation is forwarded through PInvoke
        const PINVOKE_IMPL = 0x2000;
        /// Method has security associate with it
        const HAS_SECURITY = 0x4000;
        /// Method calls another method containing security code
        const REQUIRE_SEC_OBJECT = 0x8000;
    }
}

impl MethodModifiers {
    /// Extract method modifiers from raw method attributes
    #[must_use]
    pub fn from_method_flags(flags: u32) -> Self {
        let modifiers = flags & !METHOD_ACCESS_MASK & !METHOD_VTABLE_LAYOUT_MASK;
        Self::from_bits_truncate(modifiers)
    }
}

/// A method defined in the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    /// `MethodDef` token of this method
    pub token: Token,
    /// Simple name, `.ctor` / `.cctor` for constructors
    pub name: String,
    /// Raw method attributes (II.23.1.10)
    pub flags: u32,
    /// Decoded method signature
    pub signature: MethodSignature,
    /// Instruction body, `None` for abstract, runtime and pinvoke methods
    #[serde(default)]
    pub body: Option<Vec<Instruction>>,
}

impl MethodDef {
    /// The modifier bits of the raw attributes
    #[must_use]
    pub fn modifiers(&self) -> MethodModifiers {
        MethodModifiers::from_method_flags(self.flags)
    }

    /// Returns true if the method is declared `static`
    #[must_use]
    pub fn is_static(&self) -> bool {
        self.modifiers().contains(MethodModifiers::STATIC)
    }

    /// Returns true for instance constructors and static initializers
    #[must_use]
    pub fn is_constructor(&self) -> bool {
        self.name == CONSTRUCTOR_NAME || self.name == STATIC_CONSTRUCTOR_NAME
    }

    /// Returns true for the static initializer
    #[must_use]
    pub fn is_static_constructor(&self) -> bool {
        self.name == STATIC_CONSTRUCTOR_NAME
    }

    /// The body instructions, empty if the method has no body
    #[must_use]
    pub fn instructions(&self) -> &[Instruction] {
        self.body.as_deref().unwrap_or(&[])
    }
}

/// A type defined in the module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    /// `TypeDef` token of this type
    pub token: Token,
    /// Namespace, empty for the global namespace and for nested types
    #[serde(default)]
    pub namespace: String,
    /// Simple name
    pub name: String,
    /// Token of the enclosing type if this type is nested
    #[serde(default)]
    pub enclosing: Option<Token>,
    /// Raw type attributes (II.23.1.15)
    #[serde(default)]
    pub flags: u32,
    /// Set if the base type is `System.MulticastDelegate`
    #[serde(default)]
    pub is_delegate: bool,
    /// Methods declared by this type
    #[serde(default)]
    pub methods: Vec<MethodDef>,
}

impl TypeDef {
    /// The static initializer, if the type has one
    #[must_use]
    pub fn static_constructor(&self) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.is_static_constructor())
    }

    /// First method with the given name
    #[must_use]
    pub fn method_by_name(&self, name: &str) -> Option<&MethodDef> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Returns true if this type is nested in another type
    #[must_use]
    pub fn is_nested(&self) -> bool {
        self.enclosing.is_some()
    }
}

/// Signature of a `MemberRef`, which may reference a method or a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemberRefSignature {
    /// Method reference
    Method(MethodSignature),
    /// Field reference
    Field {
        /// Field type
        field_type: TypeSignature,
    },
}

/// A reference to a method or field, possibly defined in another module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRef {
    /// `MemberRef` token of this reference
    pub token: Token,
    /// Full name of the declaring class, `Namespace.Outer/Inner`
    pub class: String,
    /// Member name
    pub name: String,
    /// Decoded signature
    pub signature: MemberRefSignature,
}

impl MemberRef {
    /// The method signature, `None` for field references
    #[must_use]
    pub fn method_signature(&self) -> Option<&MethodSignature> {
        match &self.signature {
            MemberRefSignature::Method(sig) => Some(sig),
            MemberRefSignature::Field { .. } => None,
        }
    }
}

/// A decoded managed module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module name (`Module` table)
    #[serde(default)]
    pub name: String,
    /// All type definitions, nested types included
    #[serde(default)]
    pub types: Vec<TypeDef>,
    /// The `MemberRef` table
    #[serde(default)]
    pub member_refs: Vec<MemberRef>,
}

impl Module {
    /// Creates an empty module
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Module {
            name: name.into(),
            types: Vec::new(),
            member_refs: Vec::new(),
        }
    }

    /// Looks up a `MemberRef` by exact token.
    #[must_use]
    pub fn member_ref(&self, token: Token) -> Option<&MemberRef> {
        if !token.is_member_ref() {
            return None;
        }
        self.member_refs.iter().find(|m| m.token == token)
    }

    /// Looks up a type definition by token.
    #[must_use]
    pub fn type_def(&self, token: Token) -> Option<&TypeDef> {
        self.types.iter().find(|t| t.token == token)
    }

    /// Looks up a method definition by token.
    #[must_use]
    pub fn method(&self, token: Token) -> Option<&MethodDef> {
        if !token.is_method_def() {
            return None;
        }
        self.types
            .iter()
            .flat_map(|t| t.methods.iter())
            .find(|m| m.token == token)
    }

    /// The type declaring the given method.
    #[must_use]
    pub fn declaring_type(&self, method: Token) -> Option<&TypeDef> {
        self.types
            .iter()
            .find(|t| t.methods.iter().any(|m| m.token == method))
    }

    /// Signature of the method addressed by a `MethodDef` or `MemberRef` token.
    #[must_use]
    pub fn method_signature(&self, token: Token) -> Option<&MethodSignature> {
        if token.is_method_def() {
            self.method(token).map(|m| &m.signature)
        } else {
            self.member_ref(token).and_then(MemberRef::method_signature)
        }
    }

    /// Metadata full name of a type: `Namespace.Outer/Inner`.
    #[must_use]
    pub fn type_full_name(&self, ty: &TypeDef) -> String {
        self.qualified_name(ty, '/')
    }

    /// Reflection full name of a type: `Namespace.Outer+Inner`, the form the execution host
    /// expects when locating a live type.
    #[must_use]
    pub fn reflection_full_name(&self, ty: &TypeDef) -> String {
        self.qualified_name(ty, '+')
    }

    fn qualified_name(&self, ty: &TypeDef, separator: char) -> String {
        let mut chain = vec![ty];
        let mut seen = HashSet::from([ty.token]);
        let mut current = ty;
        while let Some(parent) = current.enclosing.and_then(|e| self.type_def(e)) {
            // a malformed enclosing chain must not loop forever
            if !seen.insert(parent.token) {
                break;
            }
            chain.push(parent);
            current = parent;
        }

        let outermost = chain[chain.len() - 1];
        let mut name = String::new();
        if !outermost.namespace.is_empty() {
            name.push_str(&outermost.namespace);
            name.push('.');
        }
        for (i, ty) in chain.iter().rev().enumerate() {
            if i > 0 {
                name.push(separator);
            }
            name.push_str(&ty.name);
        }
        name
    }

    /// Human readable name of a `MethodDef` or `MemberRef`: `Type::Name(params)`.
    #[must_use]
    pub fn method_display_name(&self, token: Token) -> String {
        if token.is_method_def() {
            if let (Some(method), Some(ty)) = (self.method(token), self.declaring_type(token)) {
                return format!(
                    "{} {}::{}{}",
                    method.signature.return_type,
                    self.type_full_name(ty),
                    method.name,
                    method.signature
                );
            }
        } else if let Some(member) = self.member_ref(token) {
            return match &member.signature {
                MemberRefSignature::Method(sig) => format!(
                    "{} {}::{}{}",
                    sig.return_type, member.class, member.name, sig
                ),
                MemberRefSignature::Field { field_type } => {
                    format!("{} {}::{}", field_type, member.class, member.name)
                }
            };
        }
        token.to_string()
    }

    /// Removes a type and every type nested in it, returning the tokens of all removed types.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TokenNotFound`] if no type with `token` exists.
    pub fn remove_type(&mut self, token: Token) -> Result<Vec<Token>> {
        if self.type_def(token).is_none() {
            return Err(Error::TokenNotFound(token));
        }

        let doomed = self.type_and_nested(token);
        self.types.retain(|t| !doomed.contains(&t.token));
        Ok(doomed)
    }

    /// `token` followed by the tokens of every type nested in it, at any depth.
    #[must_use]
    pub fn type_and_nested(&self, token: Token) -> Vec<Token> {
        let mut found = vec![token];
        let mut i = 0;
        while i < found.len() {
            let parent = found[i];
            for ty in &self.types {
                if ty.enclosing == Some(parent) && !found.contains(&ty.token) {
                    found.push(ty.token);
                }
            }
            i += 1;
        }
        found
    }

    /// Number of types enclosing `ty`, 0 for a top-level type.
    #[must_use]
    pub fn nesting_depth(&self, ty: &TypeDef) -> usize {
        let mut depth = 0;
        let mut enclosing = ty.enclosing.and_then(|t| self.type_def(t));
        // a malformed enclosing chain may loop
        while let Some(parent) = enclosing {
            depth += 1;
            if depth >= self.types.len() {
                break;
            }
            enclosing = parent.enclosing.and_then(|t| self.type_def(t));
        }
        depth
    }

    /// Stack behavior of a `call`, `callvirt` or `newobj` instruction.
    ///
    /// `call`/`callvirt` pop one value per parameter plus `this` for instance signatures and
    /// push the return value unless it is `void`. `newobj` pops the constructor parameters and
    /// pushes the new object. Returns `None` for other opcodes and when the callee signature
    /// is unknown.
    #[must_use]
    pub fn call_stack_behavior(&self, instruction: &Instruction) -> Option<StackBehavior> {
        let signature = self.method_signature(instruction.method_operand()?)?;
        let params = u8::try_from(signature.param_count()).ok()?;
        match instruction.opcode {
            OpCode::CALL | OpCode::CALLVIRT => {
                let pops = params.checked_add(u8::from(signature.has_this))?;
                let pushes = u8::from(!signature.return_type.is_void());
                Some(StackBehavior::new(pops, pushes))
            }
            OpCode::NEWOBJ => Some(StackBehavior::new(params, 1)),
            _ => None,
        }
    }

    /// Stack behavior of any instruction the rewriting passes produce or replace.
    #[must_use]
    pub fn stack_behavior(&self, instruction: &Instruction) -> Option<StackBehavior> {
        instruction
            .fixed_stack_behavior()
            .or_else(|| self.call_stack_behavior(instruction))
    }

    /// All methods of all types.
    pub fn methods(&self) -> impl Iterator<Item = &MethodDef> {
        self.types.iter().flat_map(|t| t.methods.iter())
    }

    /// Total number of instruction slots over all method bodies.
    #[must_use]
    pub fn instruction_count(&self) -> usize {
        self.methods().map(|m| m.instructions().len()).sum()
    }
}
