//! Resolution of `MemberRef`s to concrete method definitions.
//!
//! A proxy type encodes the token of a `MemberRef`; to pick the right call opcode the proxy
//! pass needs to know whether the referenced method is static or a constructor. That
//! information lives in the defining module, which is either the module under
//! transformation or one of its references. [`MethodResolver`] is the seam, and
//! [`ModuleResolver`] the implementation over decoded modules.

use crate::metadata::{
    module::{MemberRef, Module},
    signatures::MethodSignature,
    token::Token,
};

/// A `MemberRef` resolved to its method definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMethod {
    /// `MethodDef` token of the definition, in its defining module
    pub token: Token,
    /// `Namespace.Type::Name` of the definition
    pub full_name: String,
    /// The definition is declared `static`
    pub is_static: bool,
    /// The definition is a `.ctor` or `.cctor`
    pub is_constructor: bool,
}

/// Resolves member references to method definitions.
pub trait MethodResolver {
    /// Resolves `member` as seen from `module`, `None` if no definition matches.
    fn resolve_method(&self, module: &Module, member: &MemberRef) -> Option<ResolvedMethod>;
}

/// Resolves against the module itself and a set of reference modules.
///
/// A definition matches when its declaring type's full name equals the `MemberRef` class,
/// its name equals the member name, and its signature equals the member signature. The
/// module under transformation is searched first, then the references in registration
/// order.
#[derive(Debug, Default)]
pub struct ModuleResolver {
    references: Vec<Module>,
}

impl ModuleResolver {
    /// Creates a resolver without reference modules
    #[must_use]
    pub fn new() -> Self {
        ModuleResolver::default()
    }

    /// Creates a resolver over the given reference modules
    #[must_use]
    pub fn with_references(references: Vec<Module>) -> Self {
        ModuleResolver { references }
    }

    /// Registers another reference module
    pub fn add_reference(&mut self, module: Module) {
        self.references.push(module);
    }

    /// Number of registered reference modules
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.references.len()
    }

    fn find_in(module: &Module, member: &MemberRef, signature: &MethodSignature) -> Option<ResolvedMethod> {
        module
            .types
            .iter()
            .filter(|ty| module.type_full_name(ty) == member.class)
            .flat_map(|ty| ty.methods.iter().map(move |m| (ty, m)))
            .find(|(_, m)| m.name == member.name && &m.signature == signature)
            .map(|(ty, m)| ResolvedMethod {
                token: m.token,
                full_name: format!("{}::{}", module.type_full_name(ty), m.name),
                is_static: m.is_static(),
                is_constructor: m.is_constructor(),
            })
    }
}

impl MethodResolver for ModuleResolver {
    fn resolve_method(&self, module: &Module, member: &MemberRef) -> Option<ResolvedMethod> {
        let signature = member.method_signature()?;
        std::iter::once(module)
            .chain(self.references.iter())
            .find_map(|candidate| Self::find_in(candidate, member, signature))
    }
}
