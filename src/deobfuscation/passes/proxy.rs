//! Delegate-proxy resolution.
//!
//! The obfuscator hides call targets behind generated delegate types. Each proxy type has a
//! static initializer that hands the metadata token of the real target to an initialization
//! routine, and a static entry point that forwards its arguments to the delegate's `Invoke`.
//! Every original call site is replaced by a call to that entry point.
//!
//! ```text
//! .class sealed D extends System.MulticastDelegate
//!   .cctor:  ldc.i4 <key>; ldc.i4 <MemberRef token>; ldc.i4 <kind>; call Init; ...
//!   Invoke:  runtime managed
//!   P:       ldsfld D::instance; ldarg.0; ...; call D::Invoke; ret
//!
//! call D::P            =>   call / callvirt / newobj <MemberRef token>
//! ```
//!
//! The pass decodes the token, resolves the `MemberRef` to learn whether the target is a
//! constructor, a static or an instance method, rewrites every call of the entry point to a
//! direct call of the reference, and deletes the proxy type.

use std::cmp::Reverse;

use log::{debug, info};

use crate::{
    assembly::{Instruction, OpCode, Operand},
    deobfuscation::{
        changes::{EventKind, EventLog},
        pass::ModulePass,
        rewrite::rewrite_instructions,
    },
    metadata::{
        module::{Module, TypeDef},
        resolver::{MethodResolver, ResolvedMethod},
        token::Token,
    },
    Result,
};

const PASS_NAME: &str = "proxy-resolution";

/// Number of leading initializer instructions that make up the proxy signature.
const SIGNATURE_LEN: usize = 4;

/// A type matching the structural proxy signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyType {
    /// The delegate type
    pub type_token: Token,
    /// The method every proxied call site invokes
    pub entry: Token,
    /// The encoded `MemberRef` token of the real target
    pub target: Token,
}

impl ProxyType {
    /// Checks `ty` against the proxy signature.
    ///
    /// The type must be a delegate whose static initializer starts with three `ldc.i4` loads
    /// (any encoding) followed by a `call`, and it must declare an `Invoke` method and exactly
    /// one other method that `call`s it. The second constant is the target token.
    #[must_use]
    pub fn detect(ty: &TypeDef) -> Option<ProxyType> {
        if !ty.is_delegate {
            return None;
        }

        let cctor = ty.static_constructor()?;
        let body = cctor.instructions();
        if body.len() < SIGNATURE_LEN {
            debug!("{}: initializer too short for a proxy", ty.name);
            return None;
        }
        let constants: Vec<i32> = body[..3]
            .iter()
            .map_while(Instruction::ldc_i4_value)
            .collect();
        if constants.len() != 3 || body[3].opcode != OpCode::CALL {
            debug!("{}: initializer does not match the proxy signature", ty.name);
            return None;
        }

        let invoke = ty.method_by_name("Invoke")?;
        let mut entries = ty.methods.iter().filter(|m| {
            m.token != invoke.token
                && m.instructions()
                    .iter()
                    .any(|i| i.opcode == OpCode::CALL && i.method_operand() == Some(invoke.token))
        });
        let entry = entries.next()?;
        if entries.next().is_some() {
            debug!("{}: more than one method calls Invoke", ty.name);
            return None;
        }

        Some(ProxyType {
            type_token: ty.token,
            entry: entry.token,
            // the constant carries the raw token bits
            target: Token::new(constants[1] as u32),
        })
    }
}

/// Opcode that calls `target` the way the original call site did.
#[must_use]
pub fn call_kind(target: &ResolvedMethod) -> OpCode {
    if target.is_constructor {
        OpCode::NEWOBJ
    } else if target.is_static {
        OpCode::CALL
    } else {
        OpCode::CALLVIRT
    }
}

/// First method outside `proxy` that still references a type nested in it, or a member of one.
///
/// The proxy's own members are not checked, their call sites are gone once it resolved.
fn outside_reference(module: &Module, proxy: Token) -> Option<Token> {
    let doomed = module.type_and_nested(proxy);
    let nested = &doomed[1..];
    if nested.is_empty() {
        return None;
    }

    let nested_members: Vec<Token> = module
        .types
        .iter()
        .filter(|ty| nested.contains(&ty.token))
        .flat_map(|ty| ty.methods.iter().map(|m| m.token))
        .collect();

    module
        .types
        .iter()
        .filter(|ty| !doomed.contains(&ty.token))
        .flat_map(|ty| ty.methods.iter())
        .find(|method| {
            method.instructions().iter().any(|i| {
                i.get_token_operand()
                    .is_some_and(|t| nested.contains(&t) || nested_members.contains(&t))
            })
        })
        .map(|method| method.token)
}

/// Resolves delegate proxies and rewrites their call sites into direct calls.
///
/// # Example
///
/// ```rust,no_run
/// use cryptoscope::deobfuscation::{passes::ProxyResolutionPass, EventLog, ModulePass};
/// use cryptoscope::metadata::{resolver::ModuleResolver, Module};
///
/// fn resolve(module: &mut Module) -> cryptoscope::Result<bool> {
///     let resolver = ModuleResolver::new();
///     let mut pass = ProxyResolutionPass::new(&resolver, true);
///     pass.run(module, &mut EventLog::new())
/// }
/// ```
pub struct ProxyResolutionPass<'a> {
    resolver: &'a dyn MethodResolver,
    remove_types: bool,
}

impl<'a> ProxyResolutionPass<'a> {
    /// Creates the pass; `remove_types` controls whether resolved proxy types are deleted.
    #[must_use]
    pub fn new(resolver: &'a dyn MethodResolver, remove_types: bool) -> Self {
        ProxyResolutionPass {
            resolver,
            remove_types,
        }
    }

    fn skip(events: &mut EventLog, ty: Token, reason: String) {
        debug!("{reason}");
        events
            .record(EventKind::CandidateSkipped)
            .token(ty)
            .message(reason)
            .pass(PASS_NAME);
    }

    /// Resolves one proxy and rewrites its call sites. Returns true if the module changed.
    fn process(&self, module: &mut Module, proxy: &ProxyType, events: &mut EventLog) -> Result<bool> {
        let type_name = module
            .type_def(proxy.type_token)
            .map(|ty| module.type_full_name(ty))
            .unwrap_or_else(|| proxy.type_token.to_string());

        let Some(member) = module.member_ref(proxy.target) else {
            Self::skip(
                events,
                proxy.type_token,
                format!("{type_name}: no MemberRef with token {}", proxy.target),
            );
            return Ok(false);
        };
        let Some(resolved) = self.resolver.resolve_method(module, member) else {
            Self::skip(
                events,
                proxy.type_token,
                format!("{type_name}: cannot resolve {}::{}", member.class, member.name),
            );
            return Ok(false);
        };

        let opcode = call_kind(&resolved);
        let replacement = Instruction::with_operand(opcode, Operand::Method(proxy.target));
        let before = module.call_stack_behavior(&Instruction::call(proxy.entry));
        let after = module.call_stack_behavior(&replacement);
        if let (Some(before), Some(after)) = (before, after) {
            if before.net_effect != after.net_effect {
                Self::skip(
                    events,
                    proxy.type_token,
                    format!(
                        "{type_name}: stack effect {} of the proxy differs from {} of {}",
                        before.net_effect, after.net_effect, resolved.full_name
                    ),
                );
                return Ok(false);
            }
        }

        info!("Resolved: {}", resolved.full_name);
        events
            .record(EventKind::ProxyResolved)
            .token(proxy.type_token)
            .message(format!("{type_name} -> {}", resolved.full_name))
            .pass(PASS_NAME);

        let mut sites = Vec::new();
        let rewritten = rewrite_instructions(
            module,
            |_, instruction| instruction.calls(proxy.entry),
            |method, _| {
                sites.push(method.token);
                (opcode, Operand::Method(proxy.target))
            },
        );
        for method in sites {
            events
                .record(EventKind::CallSiteRewritten)
                .token(method)
                .message(format!("{opcode} {}", resolved.full_name))
                .pass(PASS_NAME);
        }
        debug!("{type_name}: {rewritten} call sites rewritten");

        let mut removed_any = false;
        if self.remove_types {
            if let Some(user) = outside_reference(module, proxy.type_token) {
                Self::skip(
                    events,
                    proxy.type_token,
                    format!(
                        "{type_name}: kept, a nested type is still used by {}",
                        module.method_display_name(user)
                    ),
                );
                return Ok(rewritten > 0);
            }
            for removed in module.remove_type(proxy.type_token)? {
                removed_any = true;
                events
                    .record(EventKind::ProxyTypeRemoved)
                    .token(removed)
                    .message(format!("removed {type_name}"))
                    .pass(PASS_NAME);
            }
        }

        Ok(rewritten > 0 || removed_any)
    }
}

impl ModulePass for ProxyResolutionPass<'_> {
    fn name(&self) -> &'static str {
        PASS_NAME
    }

    fn description(&self) -> &'static str {
        "Replaces calls through delegate proxies with direct calls to the proxied method"
    }

    fn run(&mut self, module: &mut Module, events: &mut EventLog) -> Result<bool> {
        // innermost first, removing a proxy removes everything nested in it
        let mut candidates: Vec<(usize, Token)> = module
            .types
            .iter()
            .filter(|ty| ty.is_delegate)
            .map(|ty| (module.nesting_depth(ty), ty.token))
            .collect();
        candidates.sort_by_key(|&(depth, _)| Reverse(depth));

        let mut changed = false;
        for (_, token) in candidates {
            let Some(proxy) = module.type_def(token).and_then(ProxyType::detect) else {
                continue;
            };
            changed |= self.process(module, &proxy, events)?;
        }
        Ok(changed)
    }
}
