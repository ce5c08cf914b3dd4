//! Fixtures shared by the integration tests: a sample obfuscated module and a scripted
//! execution host.

#![allow(dead_code)]

use std::{cell::RefCell, collections::HashMap};

use cryptoscope::{
    assembly::{Instruction, OpCode, Operand},
    emulation::{ExecutionHost, RuntimeImage, RuntimeMethod, RuntimeType, Value},
    metadata::{
        signatures::{MethodSignature, TypeSignature},
        token::Token,
        MemberRef, MemberRefSignature, MethodDef, Module, TypeDef,
    },
    Error, Result,
};

/// `MemberRef` the proxy `D` forwards to: `void Foo::Bar(int32)`
pub const PROXY_TARGET: Token = Token(0x0A000123);
/// `call` target of the proxy initializers
pub const PROXY_INIT: Token = Token(0x06FF0001);

pub const PROXY_TYPE: Token = Token(0x02000002);
pub const PROXY_ENTRY: Token = Token(0x06000004);
pub const HELPER_TYPE: Token = Token(0x02000003);
pub const DECRYPT: Token = Token(0x06000006);
pub const CALLER_TYPE: Token = Token(0x02000004);
pub const CALLER: Token = Token(0x06000007);
pub const SHORT_TYPE: Token = Token(0x02000005);
pub const SHORT_ENTRY: Token = Token(0x0600000A);

/// Bytes standing in for the unmodified input image.
pub const ORIGINAL: &[u8] = b"MZ original image";

const STATIC: u32 = 0x0096;
const INSTANCE: u32 = 0x0086;
const SPECIAL: u32 = 0x1800;

fn void_int() -> MethodSignature {
    MethodSignature::new_static(TypeSignature::Void, vec![TypeSignature::I4])
}

fn method(token: u32, name: &str, flags: u32, signature: MethodSignature, body: Option<Vec<Instruction>>) -> MethodDef {
    MethodDef {
        token: Token(token),
        name: name.to_string(),
        flags,
        signature,
        body,
    }
}

fn type_def(token: Token, namespace: &str, name: &str, is_delegate: bool, methods: Vec<MethodDef>) -> TypeDef {
    TypeDef {
        token,
        namespace: namespace.to_string(),
        name: name.to_string(),
        enclosing: None,
        flags: 0x0010_0001,
        is_delegate,
        methods,
    }
}

fn method_ref(token: u32, class: &str, name: &str, signature: MethodSignature) -> MemberRef {
    MemberRef {
        token: Token(token),
        class: class.to_string(),
        name: name.to_string(),
        signature: MemberRefSignature::Method(signature),
    }
}

fn cctor(token: u32, body: Vec<Instruction>) -> MethodDef {
    method(
        token,
        ".cctor",
        STATIC | SPECIAL,
        MethodSignature::new_static(TypeSignature::Void, vec![]),
        Some(body),
    )
}

/// The body of `App.Program::Run` before deobfuscation.
pub fn caller_body() -> Vec<Instruction> {
    vec![
        Instruction::ldc_i4(7),
        Instruction::call(DECRYPT),
        Instruction::call(Token(0x0A000004)),
        Instruction::ldc_i4(42),
        Instruction::call(PROXY_ENTRY),
        Instruction::ldc_i4(43),
        Instruction::callvirt(PROXY_ENTRY),
        Instruction::new(OpCode::RET),
    ]
}

/// A module protected with one delegate proxy and one string decryption helper.
///
/// - `D` (delegate): proxy to `Foo::Bar(int32)`, entry point `P`
/// - `Obf.Helper`: decryption helper with `string M(int32)`
/// - `App.Program::Run`: decrypts string 7, calls `P` twice
/// - `Short` (delegate): initializer too short for a proxy
pub fn sample_module() -> Module {
    let proxy = type_def(
        PROXY_TYPE,
        "",
        "D",
        true,
        vec![
            cctor(
                0x06000001,
                vec![
                    Instruction::new(OpCode::LDC_I4_0),
                    Instruction::ldc_i4(PROXY_TARGET.value() as i32),
                    Instruction::new(OpCode::LDC_I4_1),
                    Instruction::call(PROXY_INIT),
                    Instruction::new(OpCode::RET),
                ],
            ),
            method(
                0x06000002,
                ".ctor",
                INSTANCE | SPECIAL,
                MethodSignature::new_instance(
                    TypeSignature::Void,
                    vec![TypeSignature::Object, TypeSignature::I],
                ),
                None,
            ),
            method(
                0x06000003,
                "Invoke",
                0x01C6,
                MethodSignature::new_instance(TypeSignature::Void, vec![TypeSignature::I4]),
                None,
            ),
            method(
                PROXY_ENTRY.value(),
                "P",
                STATIC,
                void_int(),
                Some(vec![
                    Instruction::with_operand(OpCode::LDSFLD, Operand::Token(Token(0x04000001))),
                    Instruction::with_operand(OpCode::LDARG, Operand::Argument(0)),
                    Instruction::call(Token(0x06000003)),
                    Instruction::new(OpCode::RET),
                ]),
            ),
        ],
    );

    let helper = type_def(
        HELPER_TYPE,
        "Obf",
        "Helper",
        false,
        vec![
            cctor(
                0x06000005,
                vec![
                    Instruction::call(Token(0x0A000002)),
                    Instruction::with_operand(OpCode::LDSTR, Operand::String("data".into())),
                    Instruction::callvirt(Token(0x0A000003)),
                    Instruction::new(OpCode::POP),
                    Instruction::with_operand(OpCode::LDSTR, Operand::String("AAAA".into())),
                    Instruction::call(Token(0x0A000001)),
                    Instruction::new(OpCode::POP),
                    Instruction::new(OpCode::RET),
                ],
            ),
            method(
                DECRYPT.value(),
                "M",
                STATIC,
                MethodSignature::new_static(TypeSignature::String, vec![TypeSignature::I4]),
                Some(vec![
                    Instruction::with_operand(OpCode::LDARG, Operand::Argument(0)),
                    Instruction::new(OpCode::RET),
                ]),
            ),
        ],
    );

    let caller = type_def(
        CALLER_TYPE,
        "App",
        "Program",
        false,
        vec![method(
            CALLER.value(),
            "Run",
            STATIC,
            MethodSignature::new_static(TypeSignature::Void, vec![]),
            Some(caller_body()),
        )],
    );

    let short = type_def(
        SHORT_TYPE,
        "",
        "Short",
        true,
        vec![
            cctor(
                0x06000008,
                vec![
                    Instruction::ldc_i4(PROXY_TARGET.value() as i32),
                    Instruction::call(PROXY_INIT),
                ],
            ),
            method(
                0x06000009,
                "Invoke",
                0x01C6,
                MethodSignature::new_instance(TypeSignature::Void, vec![TypeSignature::I4]),
                None,
            ),
            method(
                SHORT_ENTRY.value(),
                "Q",
                STATIC,
                void_int(),
                Some(vec![
                    Instruction::with_operand(OpCode::LDARG, Operand::Argument(0)),
                    Instruction::call(Token(0x06000009)),
                    Instruction::new(OpCode::RET),
                ]),
            ),
        ],
    );

    let stream = TypeSignature::Class("System.IO.Stream".into());
    let assembly = TypeSignature::Class("System.Reflection.Assembly".into());
    Module {
        name: "app.exe".to_string(),
        types: vec![proxy, helper, caller, short],
        member_refs: vec![
            method_ref(
                0x0A000001,
                "System.Convert",
                "FromBase64String",
                MethodSignature::new_static(
                    TypeSignature::SzArray(Box::new(TypeSignature::U1)),
                    vec![TypeSignature::String],
                ),
            ),
            method_ref(
                0x0A000002,
                "System.Reflection.Assembly",
                "GetExecutingAssembly",
                MethodSignature::new_static(assembly, vec![]),
            ),
            method_ref(
                0x0A000003,
                "System.Reflection.Assembly",
                "GetManifestResourceStream",
                MethodSignature::new_instance(stream, vec![TypeSignature::String]),
            ),
            method_ref(
                0x0A000004,
                "System.Console",
                "WriteLine",
                MethodSignature::new_static(TypeSignature::Void, vec![TypeSignature::String]),
            ),
            method_ref(PROXY_TARGET.value(), "Foo", "Bar", void_int()),
        ],
    }
}

/// The module `Foo::Bar(int32)` lives in.
pub fn library() -> Module {
    Module {
        name: "lib.dll".to_string(),
        types: vec![type_def(
            Token(0x02000002),
            "",
            "Foo",
            false,
            vec![method(0x06000001, "Bar", STATIC, void_int(), None)],
        )],
        member_refs: Vec::new(),
    }
}

type Answer = fn(i32) -> Value;

/// An execution host answering from a fixed table of `(type, method) -> fn(arg)`.
#[derive(Default)]
pub struct ScriptedHost {
    unavailable: bool,
    methods: HashMap<String, HashMap<String, Answer>>,
    invocations: RefCell<Vec<(String, i32)>>,
}

impl ScriptedHost {
    pub fn new() -> Self {
        ScriptedHost::default()
    }

    /// A host that cannot load any image.
    pub fn unavailable() -> Self {
        ScriptedHost {
            unavailable: true,
            ..ScriptedHost::default()
        }
    }

    pub fn answer(mut self, type_name: &str, method: &str, answer: Answer) -> Self {
        self.methods
            .entry(type_name.to_string())
            .or_default()
            .insert(method.to_string(), answer);
        self
    }

    /// `(method, argument)` of every invocation so far.
    pub fn invocations(&self) -> Vec<(String, i32)> {
        self.invocations.borrow().clone()
    }
}

/// The host used by most tests: `Obf.Helper::M(7)` is `"abc"`.
pub fn sample_host() -> ScriptedHost {
    ScriptedHost::new().answer("Obf.Helper", "M", |arg| match arg {
        7 => Value::String("abc".into()),
        other => Value::String(format!("string #{other}").into()),
    })
}

impl ExecutionHost for ScriptedHost {
    fn load_executable(&self, data: &[u8]) -> Result<Box<dyn RuntimeImage + '_>> {
        if self.unavailable {
            return Err(Error::OracleUnavailable("BadImageFormatException".into()));
        }
        assert_eq!(data, ORIGINAL, "the oracle must see the original bytes");
        Ok(Box::new(ScriptedImage(self)))
    }
}

struct ScriptedImage<'a>(&'a ScriptedHost);

impl RuntimeImage for ScriptedImage<'_> {
    fn get_type(&self, full_name: &str) -> Option<Box<dyn RuntimeType + '_>> {
        let (name, methods) = self.0.methods.get_key_value(full_name)?;
        Some(Box::new(ScriptedType {
            host: self.0,
            name,
            methods,
        }))
    }
}

struct ScriptedType<'a> {
    host: &'a ScriptedHost,
    name: &'a str,
    methods: &'a HashMap<String, Answer>,
}

impl RuntimeType for ScriptedType<'_> {
    fn full_name(&self) -> &str {
        self.name
    }

    fn get_method(&self, name: &str) -> Option<Box<dyn RuntimeMethod + '_>> {
        let (name, answer) = self.methods.get_key_value(name)?;
        Some(Box::new(ScriptedMethod {
            host: self.host,
            name,
            answer: *answer,
        }))
    }
}

struct ScriptedMethod<'a> {
    host: &'a ScriptedHost,
    name: &'a str,
    answer: Answer,
}

impl RuntimeMethod for ScriptedMethod<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn invoke(&self, args: &[Value]) -> Result<Value> {
        let arg = args.first().ok_or_else(|| Error::Invocation {
            method: self.name.to_string(),
            message: "missing argument".into(),
        })?;
        let arg = arg.unbox_i32()?;
        self.host
            .invocations
            .borrow_mut()
            .push((self.name.to_string(), arg));
        Ok((self.answer)(arg))
    }
}
