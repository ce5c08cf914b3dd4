//! Constant decryption through a live oracle.
//!
//! Literal strings and numbers are replaced by calls into an obfuscator-generated helper type
//! whose static initializer unpacks an embedded base64 resource. Each decrypt method takes an
//! `int32` index and returns the plaintext literal:
//!
//! ```text
//! ldc.i4 7                                  nop
//! call string Helper::M(int32)      =>      ldstr "abc"
//! ```
//!
//! # Flow
//!
//! ```text
//! 1. Detection
//!    └─> Helper: .cctor references FromBase64String, GetExecutingAssembly
//!        and GetManifestResourceStream
//!    └─> Decrypt methods: one per kind, by signature `<kind> (int32)`
//!
//! 2. Oracle
//!    └─> Load the original, unmodified bytes into the execution host
//!    └─> Look up each helper by reflection name, each decrypt method by name
//!
//! 3. Rewrite, for every `call` of a decrypt method
//!    └─> Argument from the preceding ldc.i4
//!    └─> Check cache for a previous answer, otherwise invoke the live method
//!    └─> nop the argument load, replace the call with the literal load
//! ```
//!
//! A string decrypt method excludes the numeric ones of the same helper. Per-site failures
//! leave the site untouched.

use std::collections::HashMap;

use log::{debug, info, warn};

use crate::{
    assembly::{Immediate, OpCode, Operand},
    deobfuscation::{
        changes::{EventKind, EventLog},
        config::NumericOracle,
        pass::ModulePass,
        rewrite::{patch_instructions, Patch},
    },
    emulation::{ExecutionHost, RuntimeMethod, Value},
    metadata::{
        module::{Module, TypeDef},
        signatures::TypeSignature,
        token::Token,
    },
    Result,
};

const PASS_NAME: &str = "constant-decryption";

/// Names of the resource loading APIs a helper initializer must reference.
const HELPER_MARKERS: [&str; 3] = [
    "FromBase64String",
    "GetExecutingAssembly",
    "GetManifestResourceStream",
];

/// Kind of literal a decrypt method produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecryptKind {
    /// `string M(int32)`, rewritten to `ldstr`
    String,
    /// `int32 M(int32)`, rewritten to `ldc.i4`
    Int32,
    /// `int64 M(int32)`, rewritten to `ldc.i8`
    Int64,
    /// `float32 M(int32)`, rewritten to `ldc.r4`
    Float32,
    /// `float64 M(int32)`, rewritten to `ldc.r8`
    Float64,
}

impl DecryptKind {
    /// All kinds, string first.
    pub const ALL: [DecryptKind; 5] = [
        DecryptKind::String,
        DecryptKind::Int32,
        DecryptKind::Int64,
        DecryptKind::Float32,
        DecryptKind::Float64,
    ];

    /// Return type of a decrypt method of this kind.
    #[must_use]
    pub fn return_type(self) -> TypeSignature {
        match self {
            DecryptKind::String => TypeSignature::String,
            DecryptKind::Int32 => TypeSignature::I4,
            DecryptKind::Int64 => TypeSignature::I8,
            DecryptKind::Float32 => TypeSignature::R4,
            DecryptKind::Float64 => TypeSignature::R8,
        }
    }

    /// Label used in the per-value log line.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            DecryptKind::String => "String",
            DecryptKind::Int32 => "Int",
            DecryptKind::Int64 => "Long",
            DecryptKind::Float32 => "Float",
            DecryptKind::Float64 => "Double",
        }
    }

    /// Builds the literal load for an oracle answer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::UnexpectedValue`] if `value` is not exactly of this kind.
    pub fn literal(self, value: &Value) -> Result<(OpCode, Operand)> {
        Ok(match self {
            DecryptKind::String => (
                OpCode::LDSTR,
                Operand::String(value.unbox_string()?.clone()),
            ),
            DecryptKind::Int32 => (
                OpCode::LDC_I4,
                Operand::Immediate(Immediate::Int32(value.unbox_i32()?)),
            ),
            DecryptKind::Int64 => (
                OpCode::LDC_I8,
                Operand::Immediate(Immediate::Int64(value.unbox_i64()?)),
            ),
            DecryptKind::Float32 => (
                OpCode::LDC_R4,
                Operand::Immediate(Immediate::Float32(value.unbox_f32()?)),
            ),
            DecryptKind::Float64 => (
                OpCode::LDC_R8,
                Operand::Immediate(Immediate::Float64(value.unbox_f64()?)),
            ),
        })
    }

    fn event_kind(self) -> EventKind {
        match self {
            DecryptKind::String => EventKind::StringDecrypted,
            _ => EventKind::ConstantDecrypted,
        }
    }

    fn is_float(self) -> bool {
        matches!(self, DecryptKind::Float32 | DecryptKind::Float64)
    }
}

/// A decrypt method of a helper type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptMethod {
    /// Literal kind the method returns
    pub kind: DecryptKind,
    /// The method in the module graph
    pub token: Token,
    /// Name used to find the live counterpart
    pub name: String,
}

/// A type matching the decryption helper signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptionHelper {
    /// The helper type
    pub type_token: Token,
    /// Reflection full name used to find the live type
    pub runtime_name: String,
    /// Decrypt methods to process, string or numeric
    pub methods: Vec<DecryptMethod>,
}

impl DecryptionHelper {
    /// Checks `ty` against the helper signature and identifies its decrypt methods.
    ///
    /// Returns `None` if the initializer does not reference all marker APIs or no decrypt
    /// method exists.
    #[must_use]
    pub fn detect(module: &Module, ty: &TypeDef) -> Option<DecryptionHelper> {
        let cctor = ty.static_constructor()?;
        let referenced: Vec<&str> = cctor
            .instructions()
            .iter()
            .filter(|i| i.is_call())
            .filter_map(|i| module.member_ref(i.method_operand()?))
            .map(|m| m.name.as_str())
            .collect();
        if !HELPER_MARKERS.iter().all(|marker| referenced.contains(marker)) {
            return None;
        }

        let mut methods = Vec::new();
        for kind in DecryptKind::ALL {
            let return_type = kind.return_type();
            let found = ty
                .methods
                .iter()
                .find(|m| m.signature.is_unary(&return_type, &TypeSignature::I4));
            if let Some(method) = found {
                methods.push(DecryptMethod {
                    kind,
                    token: method.token,
                    name: method.name.clone(),
                });
                if kind == DecryptKind::String {
                    break;
                }
            }
        }

        if methods.is_empty() {
            debug!("{}: helper without decrypt methods", ty.name);
            return None;
        }

        Some(DecryptionHelper {
            type_token: ty.token,
            runtime_name: module.reflection_full_name(ty),
            methods,
        })
    }

    fn method_of(&self, kind: DecryptKind) -> Option<&DecryptMethod> {
        self.methods.iter().find(|m| m.kind == kind)
    }
}

/// Replaces calls of decrypt methods with the literals the live methods return.
///
/// The execution host is only asked to load the original bytes once a helper has been found.
pub struct ConstantDecryptionPass<'a> {
    host: &'a dyn ExecutionHost,
    original: &'a [u8],
    numeric_oracle: NumericOracle,
    /// Oracle answers per live method and argument
    cache: HashMap<(Token, i32), std::result::Result<Value, String>>,
}

impl<'a> ConstantDecryptionPass<'a> {
    /// Creates the pass. `original` must be the unmodified input bytes.
    #[must_use]
    pub fn new(host: &'a dyn ExecutionHost, original: &'a [u8]) -> Self {
        ConstantDecryptionPass {
            host,
            original,
            numeric_oracle: NumericOracle::default(),
            cache: HashMap::new(),
        }
    }

    /// Selects the oracle for floating point sites.
    #[must_use]
    pub fn with_numeric_oracle(mut self, numeric_oracle: NumericOracle) -> Self {
        self.numeric_oracle = numeric_oracle;
        self
    }

    /// Number of distinct oracle queries made so far.
    #[must_use]
    pub fn query_count(&self) -> usize {
        self.cache.len()
    }

    /// The decrypt method whose live counterpart answers sites of `method`.
    fn oracle_for<'h>(
        &self,
        helper: &'h DecryptionHelper,
        method: &'h DecryptMethod,
    ) -> Option<&'h DecryptMethod> {
        if self.numeric_oracle == NumericOracle::Int64Compat && method.kind.is_float() {
            helper.method_of(DecryptKind::Int64)
        } else {
            Some(method)
        }
    }

    /// Rewrites every call site of `method`. Returns the number of sites rewritten.
    fn decrypt_sites(
        &mut self,
        module: &mut Module,
        method: &DecryptMethod,
        oracle: Token,
        live: &dyn RuntimeMethod,
        events: &mut EventLog,
    ) -> usize {
        let cache = &mut self.cache;
        patch_instructions(module, |site| {
            let instruction = site.instruction();
            if instruction.opcode != OpCode::CALL || instruction.method_operand() != Some(method.token) {
                return None;
            }

            let Some(arg) = site.previous().and_then(|prev| prev.ldc_i4_value()) else {
                debug!(
                    "{}+{}: argument of {} is not a constant",
                    site.method.token, site.index, method.name
                );
                events
                    .record(EventKind::SiteFailed)
                    .at(site.method.token, site.index)
                    .message(format!("non-constant argument to {}", method.name))
                    .pass(PASS_NAME);
                return None;
            };

            let answer = cache.entry((oracle, arg)).or_insert_with(|| {
                live.invoke(&[Value::Int32(arg)])
                    .map_err(|e| e.to_string())
            });
            let literal = match answer {
                Ok(value) => method.kind.literal(value).map_err(|e| e.to_string()),
                Err(e) => Err(e.clone()),
            };

            match literal {
                Ok((opcode, operand)) => {
                    let shown = match &operand {
                        Operand::String(s) => s.to_string_lossy(),
                        other => other.as_string().unwrap_or_default(),
                    };
                    info!("{} decrypted: {}", method.kind.label(), shown);
                    events
                        .record(method.kind.event_kind())
                        .at(site.method.token, site.index)
                        .message(format!(
                            "{}({arg}) = {}",
                            method.name,
                            operand.as_string().unwrap_or_default()
                        ))
                        .pass(PASS_NAME);
                    Some(vec![
                        Patch::nop(site.index - 1),
                        Patch::new(site.index, opcode, operand),
                    ])
                }
                Err(reason) => {
                    debug!(
                        "{}+{}: {}({arg}) failed: {reason}",
                        site.method.token, site.index, method.name
                    );
                    events
                        .record(EventKind::SiteFailed)
                        .at(site.method.token, site.index)
                        .message(format!("{}({arg}): {reason}", method.name))
                        .pass(PASS_NAME);
                    None
                }
            }
        })
    }
}

impl ModulePass for ConstantDecryptionPass<'_> {
    fn name(&self) -> &'static str {
        PASS_NAME
    }

    fn description(&self) -> &'static str {
        "Replaces calls of string and constant decrypt methods with the decrypted literals"
    }

    fn run(&mut self, module: &mut Module, events: &mut EventLog) -> Result<bool> {
        let helpers: Vec<DecryptionHelper> = module
            .types
            .iter()
            .filter_map(|ty| DecryptionHelper::detect(module, ty))
            .collect();
        if helpers.is_empty() {
            debug!("No decryption helpers found");
            return Ok(false);
        }

        let host = self.host;
        let image = match host.load_executable(self.original) {
            Ok(image) => image,
            Err(e) => {
                info!("Failed to load assembly, skipping the decryption: {e}");
                events
                    .record(EventKind::Warning)
                    .message(format!("decryption skipped, oracle unavailable: {e}"))
                    .pass(PASS_NAME);
                return Ok(false);
            }
        };

        let mut rewritten = 0;
        for helper in &helpers {
            let Some(live_type) = image.get_type(&helper.runtime_name) else {
                warn!("Live type {} not found, stopping decryption", helper.runtime_name);
                events
                    .record(EventKind::Error)
                    .token(helper.type_token)
                    .message(format!("live type {} not found", helper.runtime_name))
                    .pass(PASS_NAME);
                break;
            };

            for method in &helper.methods {
                let Some(oracle) = self.oracle_for(helper, method) else {
                    warn!(
                        "{}: no int64 decrypt method to answer {}",
                        helper.runtime_name, method.name
                    );
                    events
                        .record(EventKind::Warning)
                        .token(method.token)
                        .message(format!("no oracle for {}", method.name))
                        .pass(PASS_NAME);
                    continue;
                };
                let Some(live) = live_type.get_method(&oracle.name) else {
                    warn!("Live method {}::{} not found", helper.runtime_name, oracle.name);
                    events
                        .record(EventKind::Warning)
                        .token(method.token)
                        .message(format!(
                            "live method {}::{} not found",
                            helper.runtime_name, oracle.name
                        ))
                        .pass(PASS_NAME);
                    continue;
                };
                let oracle_token = oracle.token;
                rewritten += self.decrypt_sites(module, method, oracle_token, live.as_ref(), events);
            }
        }

        Ok(rewritten > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::Instruction,
        metadata::signatures::MethodSignature,
        test::{MethodBuilder, MockHost, ModuleBuilder, TypeBuilder},
        Error,
    };

    const ORIGINAL: &[u8] = b"original bytes";

    fn site(arg: i32, method: Token) -> Vec<Instruction> {
        vec![Instruction::ldc_i4(arg), Instruction::call(method)]
    }

    fn body(sites: &[Vec<Instruction>]) -> Vec<Instruction> {
        let mut body: Vec<Instruction> = sites.iter().flatten().cloned().collect();
        body.push(Instruction::new(OpCode::RET));
        body
    }

    fn run(module: &mut Module, host: &MockHost, oracle: NumericOracle) -> (bool, EventLog) {
        let mut pass = ConstantDecryptionPass::new(host, ORIGINAL).with_numeric_oracle(oracle);
        let mut events = EventLog::new();
        let changed = pass.run(module, &mut events).unwrap();
        (changed, events)
    }

    #[test]
    fn string_site_becomes_ldstr() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper("Obf", "Helper", &[("M", TypeSignature::String)]);
        let m = helper.methods[0];
        let caller = builder.add_caller("Program", body(&[site(7, m)]));
        let mut module = builder.build();
        let host = MockHost::new().with_method("Obf.Helper", "M", |arg| {
            assert_eq!(arg, 7);
            Ok(Value::String("abc".into()))
        });

        let (changed, events) = run(&mut module, &host, NumericOracle::TypeMatched);

        assert!(changed);
        assert_eq!(
            module.method(caller).unwrap().instructions(),
            &[
                Instruction::nop(),
                Instruction::with_operand(OpCode::LDSTR, Operand::String("abc".into())),
                Instruction::new(OpCode::RET),
            ]
        );
        assert_eq!(host.loads(), vec![ORIGINAL.to_vec()]);
        assert_eq!(events.count_kind(EventKind::StringDecrypted), 1);
    }

    #[test]
    fn numeric_sites_get_matching_literals() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper(
            "",
            "Numbers",
            &[
                ("I", TypeSignature::I4),
                ("L", TypeSignature::I8),
                ("F", TypeSignature::R4),
                ("D", TypeSignature::R8),
            ],
        );
        let [i, l, f, d] = [0, 1, 2, 3].map(|n| helper.methods[n]);
        let caller = builder.add_caller(
            "Program",
            body(&[site(1, i), site(2, l), site(3, f), site(4, d)]),
        );
        let mut module = builder.build();
        let host = MockHost::new()
            .with_method("Numbers", "I", |a| Ok(Value::Int32(a * 100)))
            .with_method("Numbers", "L", |a| Ok(Value::Int64(i64::from(a) << 40)))
            .with_method("Numbers", "F", |_| Ok(Value::Float32(1.5)))
            .with_method("Numbers", "D", |_| Ok(Value::Float64(-2.25)));

        let (changed, events) = run(&mut module, &host, NumericOracle::TypeMatched);

        assert!(changed);
        let instructions = module.method(caller).unwrap().instructions();
        assert_eq!(instructions[1], Instruction::ldc_i4(100));
        assert_eq!(
            instructions[3],
            Instruction::with_operand(OpCode::LDC_I8, Operand::Immediate(Immediate::Int64(2_i64 << 40)))
        );
        assert_eq!(
            instructions[5],
            Instruction::with_operand(OpCode::LDC_R4, Operand::Immediate(Immediate::Float32(1.5)))
        );
        assert_eq!(
            instructions[7],
            Instruction::with_operand(OpCode::LDC_R8, Operand::Immediate(Immediate::Float64(-2.25)))
        );
        assert!([0, 2, 4, 6].iter().all(|&n| instructions[n] == Instruction::nop()));
        assert_eq!(events.count_kind(EventKind::ConstantDecrypted), 4);
    }

    #[test]
    fn string_method_excludes_numeric_methods() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper(
            "",
            "Mixed",
            &[("S", TypeSignature::String), ("I", TypeSignature::I4)],
        );
        let (s, i) = (helper.methods[0], helper.methods[1]);
        let caller = builder.add_caller("Program", body(&[site(1, s), site(2, i)]));
        let mut module = builder.build();
        let host = MockHost::new()
            .with_method("Mixed", "S", |_| Ok(Value::String("x".into())))
            .with_method("Mixed", "I", |_| Ok(Value::Int32(9)));

        run(&mut module, &host, NumericOracle::TypeMatched);

        let instructions = module.method(caller).unwrap().instructions();
        assert_eq!(instructions[1].opcode, OpCode::LDSTR);
        assert_eq!(&instructions[2..4], &site(2, i)[..]);
        assert!(host.invocations().iter().all(|(name, _)| name == "Mixed::S"));
    }

    #[test]
    fn oracle_answers_are_cached() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper("", "H", &[("M", TypeSignature::String)]);
        let m = helper.methods[0];
        let caller = builder.add_caller("Program", body(&[site(7, m), site(8, m), site(7, m)]));
        let mut module = builder.build();
        let host = MockHost::new().with_method("H", "M", |a| Ok(Value::String(format!("s{a}").into())));

        let mut pass = ConstantDecryptionPass::new(&host, ORIGINAL);
        let mut events = EventLog::new();
        pass.run(&mut module, &mut events).unwrap();

        assert_eq!(host.invocations().len(), 2);
        assert_eq!(pass.query_count(), 2);
        let instructions = module.method(caller).unwrap().instructions();
        assert_eq!(instructions[1], instructions[5]);
        assert_eq!(instructions[3].operand, Operand::String("s8".into()));
    }

    #[test]
    fn int64_compat_rejects_float_sites() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper(
            "",
            "N",
            &[("L", TypeSignature::I8), ("F", TypeSignature::R4)],
        );
        let (l, f) = (helper.methods[0], helper.methods[1]);
        let caller = builder.add_caller("Program", body(&[site(1, l), site(2, f)]));
        let mut module = builder.build();
        let host = MockHost::new()
            .with_method("N", "L", |a| Ok(Value::Int64(i64::from(a))))
            .with_method("N", "F", |_| Ok(Value::Float32(0.5)));

        let (changed, events) = run(&mut module, &host, NumericOracle::Int64Compat);

        assert!(changed);
        let instructions = module.method(caller).unwrap().instructions();
        assert_eq!(instructions[1].opcode, OpCode::LDC_I8);
        assert_eq!(&instructions[2..4], &site(2, f)[..]);
        assert_eq!(events.count_kind(EventKind::SiteFailed), 1);
        assert!(host.invocations().iter().all(|(name, _)| name == "N::L"));
    }

    #[test]
    fn unavailable_oracle_skips_pass() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper("", "H", &[("M", TypeSignature::String)]);
        builder.add_caller("Program", body(&[site(7, helper.methods[0])]));
        let mut module = builder.build();
        let before = module.clone();
        let host = MockHost::unavailable("no runtime");

        let (changed, events) = run(&mut module, &host, NumericOracle::TypeMatched);

        assert!(!changed);
        assert_eq!(module, before);
        assert_eq!(events.count_kind(EventKind::Warning), 1);
    }

    #[test]
    fn missing_live_type_stops_pass() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper("", "H", &[("M", TypeSignature::String)]);
        builder.add_caller("Program", body(&[site(7, helper.methods[0])]));
        let mut module = builder.build();
        let before = module.clone();

        let (changed, events) = run(&mut module, &MockHost::new(), NumericOracle::TypeMatched);

        assert!(!changed);
        assert_eq!(module, before);
        assert_eq!(events.count_kind(EventKind::Error), 1);
    }

    #[test]
    fn missing_live_method_skips_its_sites() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper(
            "",
            "N",
            &[("I", TypeSignature::I4), ("L", TypeSignature::I8)],
        );
        let (i, l) = (helper.methods[0], helper.methods[1]);
        let caller = builder.add_caller("Program", body(&[site(1, i), site(2, l)]));
        let mut module = builder.build();
        let host = MockHost::new().with_method("N", "L", |_| Ok(Value::Int64(5)));

        let (changed, _) = run(&mut module, &host, NumericOracle::TypeMatched);

        assert!(changed);
        let instructions = module.method(caller).unwrap().instructions();
        assert_eq!(&instructions[0..2], &site(1, i)[..]);
        assert_eq!(instructions[3].opcode, OpCode::LDC_I8);
    }

    #[test]
    fn failing_sites_are_left_untouched() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper("", "H", &[("M", TypeSignature::String)]);
        let m = helper.methods[0];
        let caller = builder.add_caller(
            "Program",
            vec![
                Instruction::call(m),
                Instruction::with_operand(OpCode::LDARG, Operand::Argument(0)),
                Instruction::call(m),
                Instruction::ldc_i4(13),
                Instruction::call(m),
                Instruction::ldc_i4(21),
                Instruction::call(m),
                Instruction::new(OpCode::RET),
            ],
        );
        let mut module = builder.build();
        let before = module.clone();
        let host = MockHost::new().with_method("H", "M", |a| match a {
            13 => Err(Error::Invocation {
                method: "M".into(),
                message: "index out of range".into(),
            }),
            _ => Ok(Value::Int32(a)),
        });

        let (changed, events) = run(&mut module, &host, NumericOracle::TypeMatched);

        assert!(!changed);
        assert_eq!(module.method(caller), before.method(caller));
        assert_eq!(events.count_kind(EventKind::SiteFailed), 4);
    }

    #[test]
    fn callvirt_of_decrypt_method_is_ignored() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper("", "H", &[("M", TypeSignature::String)]);
        let m = helper.methods[0];
        builder.add_caller(
            "Program",
            vec![Instruction::ldc_i4(1), Instruction::callvirt(m), Instruction::new(OpCode::RET)],
        );
        let mut module = builder.build();
        let before = module.clone();
        let host = MockHost::new().with_method("H", "M", |_| Ok(Value::String("x".into())));

        let (changed, _) = run(&mut module, &host, NumericOracle::TypeMatched);
        assert!(!changed);
        assert_eq!(module, before);
        assert!(host.invocations().is_empty());
    }

    #[test]
    fn incomplete_initializer_is_not_a_helper() {
        let mut builder = ModuleBuilder::new("app.exe");
        let executing = builder.add_method_ref(
            "System.Reflection.Assembly",
            "GetExecutingAssembly",
            MethodSignature::new_static(TypeSignature::Object, vec![]),
        );
        let from_base64 = builder.add_method_ref(
            "System.Convert",
            "FromBase64String",
            MethodSignature::new_static(TypeSignature::Object, vec![TypeSignature::String]),
        );
        let ty = builder.add_type(
            TypeBuilder::new("", "Almost")
                .method(
                    MethodBuilder::new_static(
                        ".cctor",
                        MethodSignature::new_static(TypeSignature::Void, vec![]),
                    )
                    .body(vec![
                        Instruction::call(executing),
                        Instruction::call(from_base64),
                        Instruction::new(OpCode::RET),
                    ]),
                )
                .method(MethodBuilder::new_static(
                    "M",
                    MethodSignature::new_static(TypeSignature::String, vec![TypeSignature::I4]),
                )),
        );
        let mut module = builder.build();
        assert!(DecryptionHelper::detect(&module, module.type_def(ty).unwrap()).is_none());

        let host = MockHost::new();
        let (changed, _) = run(&mut module, &host, NumericOracle::TypeMatched);
        assert!(!changed);
        assert!(host.loads().is_empty());
    }

    #[test]
    fn detects_helper_methods_by_signature() {
        let mut builder = ModuleBuilder::new("app.exe");
        let helper = builder.add_decryption_helper(
            "Obf",
            "H",
            &[("a", TypeSignature::I4), ("b", TypeSignature::I4), ("c", TypeSignature::R8)],
        );
        let module = builder.build();
        let detected =
            DecryptionHelper::detect(&module, module.type_def(helper.type_token).unwrap()).unwrap();

        assert_eq!(detected.runtime_name, "Obf.H");
        let kinds: Vec<(DecryptKind, &str)> = detected
            .methods
            .iter()
            .map(|m| (m.kind, m.name.as_str()))
            .collect();
        assert_eq!(kinds, vec![(DecryptKind::Int32, "a"), (DecryptKind::Float64, "c")]);
    }

    #[test]
    fn literal_unboxing_is_strict() {
        assert!(DecryptKind::Int32.literal(&Value::Int64(1)).is_err());
        assert!(DecryptKind::Float64.literal(&Value::Float32(1.0)).is_err());
        assert!(DecryptKind::String.literal(&Value::Null).is_err());
        assert_eq!(
            DecryptKind::Int64.literal(&Value::Int64(-1)).unwrap(),
            (OpCode::LDC_I8, Operand::Immediate(Immediate::Int64(-1)))
        );
    }
}
