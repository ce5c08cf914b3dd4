//! In-process execution host answering oracle queries from closures.

use std::{cell::RefCell, collections::HashMap};

use crate::{
    emulation::{ExecutionHost, RuntimeImage, RuntimeMethod, RuntimeType, Value},
    Error, Result,
};

type Oracle = Box<dyn Fn(i32) -> Result<Value>>;

#[derive(Default)]
pub struct MockHost {
    unavailable: Option<String>,
    types: HashMap<String, HashMap<String, Oracle>>,
    invocations: RefCell<Vec<(String, Vec<Value>)>>,
    loads: RefCell<Vec<Vec<u8>>>,
}

impl MockHost {
    pub fn new() -> Self {
        MockHost::default()
    }

    /// A host that refuses to load any image.
    pub fn unavailable(reason: &str) -> Self {
        MockHost {
            unavailable: Some(reason.to_string()),
            ..MockHost::default()
        }
    }

    /// Declares a live type without methods.
    pub fn with_type(mut self, type_name: &str) -> Self {
        self.types.entry(type_name.to_string()).or_default();
        self
    }

    /// Declares a live static method answering with `oracle`.
    pub fn with_method(
        mut self,
        type_name: &str,
        method: &str,
        oracle: impl Fn(i32) -> Result<Value> + 'static,
    ) -> Self {
        self.types
            .entry(type_name.to_string())
            .or_default()
            .insert(method.to_string(), Box::new(oracle));
        self
    }

    /// Every invocation so far, as `Type::Method` and arguments.
    pub fn invocations(&self) -> Vec<(String, Vec<Value>)> {
        self.invocations.borrow().clone()
    }

    /// The bytes of every image loaded so far.
    pub fn loads(&self) -> Vec<Vec<u8>> {
        self.loads.borrow().clone()
    }
}

impl ExecutionHost for MockHost {
    fn load_executable(&self, data: &[u8]) -> Result<Box<dyn RuntimeImage + '_>> {
        if let Some(reason) = &self.unavailable {
            return Err(Error::OracleUnavailable(reason.clone()));
        }
        self.loads.borrow_mut().push(data.to_vec());
        Ok(Box::new(MockImage { host: self }))
    }
}

struct MockImage<'a> {
    host: &'a MockHost,
}

impl RuntimeImage for MockImage<'_> {
    fn get_type(&self, full_name: &str) -> Option<Box<dyn RuntimeType + '_>> {
        let (name, methods) = self.host.types.get_key_value(full_name)?;
        Some(Box::new(MockType {
            host: self.host,
            name,
            methods,
        }))
    }
}

struct MockType<'a> {
    host: &'a MockHost,
    name: &'a str,
    methods: &'a HashMap<String, Oracle>,
}

impl RuntimeType for MockType<'_> {
    fn full_name(&self) -> &str {
        self.name
    }

    fn get_method(&self, name: &str) -> Option<Box<dyn RuntimeMethod + '_>> {
        let (method, oracle) = self.methods.get_key_value(name)?;
        Some(Box::new(MockMethod {
            host: self.host,
            type_name: self.name,
            name: method,
            oracle,
        }))
    }
}

struct MockMethod<'a> {
    host: &'a MockHost,
    type_name: &'a str,
    name: &'a str,
    oracle: &'a Oracle,
}

impl RuntimeMethod for MockMethod<'_> {
    fn name(&self) -> &str {
        self.name
    }

    fn invoke(&self, args: &[Value]) -> Result<Value> {
        self.host
            .invocations
            .borrow_mut()
            .push((format!("{}::{}", self.type_name, self.name), args.to_vec()));
        match args {
            [Value::Int32(arg)] => (self.oracle)(*arg),
            _ => Err(Error::Invocation {
                method: self.name.to_string(),
                message: "expected a single int32 argument".to_string(),
            }),
        }
    }
}
