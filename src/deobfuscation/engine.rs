//! Main deobfuscation engine.
//!
//! The [`DeobfuscationEngine`] is the main entry point for deobfuscating
//! .NET modules. It runs the proxy resolution pass and the constant decryption
//! pass over one module graph, in that order, and collects their events.

use std::time::Instant;

use log::{debug, info};

use crate::{
    deobfuscation::{
        changes::EventLog,
        config::EngineConfig,
        pass::ModulePass,
        passes::{ConstantDecryptionPass, ProxyResolutionPass},
        result::DeobfuscationResult,
    },
    emulation::ExecutionHost,
    file::File,
    metadata::{
        codec::ModuleCodec,
        module::Module,
        resolver::{MethodResolver, ModuleResolver},
    },
    Result,
};

/// Main deobfuscation engine.
///
/// The engine orchestrates the pipeline:
///
/// 1. **Proxy resolution**: delegate proxies are replaced by direct calls
/// 2. **Constant decryption**: decrypt calls are replaced by literals, using the
///    execution host as an oracle on the original bytes
///
/// Without a resolver the engine resolves `MemberRef`s against the module itself only.
/// Without an execution host the decryption pass is skipped.
///
/// # APIs
///
/// - [`process`](Self::process) - Rewrites an already loaded module graph
/// - [`process_file`](Self::process_file) - Loads, rewrites and serializes a validated file
///   through a [`ModuleCodec`]
///
/// # Example
///
/// ```rust,no_run
/// use cryptoscope::bridge::HostBridge;
/// use cryptoscope::deobfuscation::{DeobfuscationEngine, EngineConfig};
/// use cryptoscope::file::File;
/// use std::path::Path;
///
/// let bridge = HostBridge::new("cryptoscope-host");
/// let engine = DeobfuscationEngine::new(EngineConfig::default()).with_host(&bridge);
///
/// let file = File::from_file(Path::new("obfuscated.exe"))?;
/// let (output, result) = engine.process_file(&bridge, &file)?;
/// println!("{} ({} bytes)", result.summary(), output.len());
/// # Ok::<(), cryptoscope::Error>(())
/// ```
pub struct DeobfuscationEngine<'a> {
    /// Configuration.
    config: EngineConfig,
    /// Resolver for proxy targets, module-only when absent.
    resolver: Option<&'a dyn MethodResolver>,
    /// Oracle for constant decryption.
    host: Option<&'a dyn ExecutionHost>,
}

impl Default for DeobfuscationEngine<'_> {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<'a> DeobfuscationEngine<'a> {
    /// Creates a new engine with the given configuration.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        DeobfuscationEngine {
            config,
            resolver: None,
            host: None,
        }
    }

    /// Uses `resolver` to resolve proxy targets.
    #[must_use]
    pub fn with_resolver(mut self, resolver: &'a dyn MethodResolver) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Uses `host` as the decryption oracle.
    #[must_use]
    pub fn with_host(mut self, host: &'a dyn ExecutionHost) -> Self {
        self.host = Some(host);
        self
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Runs the enabled passes over `module`.
    ///
    /// `original` must be the unmodified bytes the module was loaded from; it is what the
    /// execution host loads, never the rewritten graph.
    ///
    /// # Errors
    ///
    /// Returns an error only if a pass fails as a whole. Skipped candidates and failed sites
    /// are reported through the events of the result.
    pub fn process(&self, module: &mut Module, original: &[u8]) -> Result<DeobfuscationResult> {
        let start = Instant::now();
        let mut events = EventLog::new();

        if !self.config.any_enabled() {
            debug!("All passes disabled");
        }

        if self.config.enable_proxy_resolution {
            let fallback = ModuleResolver::new();
            let resolver: &dyn MethodResolver = match self.resolver {
                Some(resolver) => resolver,
                None => &fallback,
            };
            let mut pass = ProxyResolutionPass::new(resolver, self.config.remove_proxy_types);
            self.run_pass(&mut pass, module, &mut events)?;
        }

        if self.config.enable_constant_decryption {
            match self.host {
                Some(host) => {
                    let mut pass = ConstantDecryptionPass::new(host, original)
                        .with_numeric_oracle(self.config.numeric_oracle);
                    self.run_pass(&mut pass, module, &mut events)?;
                }
                None => {
                    info!("No execution host configured, skipping the decryption");
                    events.warn("decryption skipped, no execution host configured");
                }
            }
        }

        Ok(DeobfuscationResult::new(events).with_timing(start.elapsed()))
    }

    /// Loads `file` through `codec`, runs the enabled passes and serializes the result.
    ///
    /// Returns the output image and the result of the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec cannot load or write the module, or a pass fails.
    pub fn process_file(
        &self,
        codec: &dyn ModuleCodec,
        file: &File,
    ) -> Result<(Vec<u8>, DeobfuscationResult)> {
        self.process_bytes(codec, file.data())
    }

    /// Like [`process_file`](Self::process_file), for bytes that were validated elsewhere.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec cannot load or write the module, or a pass fails.
    pub fn process_bytes(
        &self,
        codec: &dyn ModuleCodec,
        data: &[u8],
    ) -> Result<(Vec<u8>, DeobfuscationResult)> {
        let mut module = codec.load(data)?;
        debug!(
            "Loaded {}: {} types, {} instructions",
            module.name,
            module.types.len(),
            module.instruction_count()
        );

        let result = self.process(&mut module, data)?;
        let output = codec.write(&module)?;
        Ok((output, result))
    }

    fn run_pass(
        &self,
        pass: &mut dyn ModulePass,
        module: &mut Module,
        events: &mut EventLog,
    ) -> Result<bool> {
        debug!("Starting pass: {}", pass.name());
        events.info(format!("Starting pass: {}", pass.name()));

        let changed = pass.run(module, events)?;
        debug!(
            "Finished pass: {} ({})",
            pass.name(),
            if changed { "changed" } else { "unchanged" }
        );
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        assembly::{Instruction, OpCode, Operand},
        deobfuscation::{changes::EventKind, config::NumericOracle},
        emulation::Value,
        metadata::{
            signatures::{MethodSignature, TypeSignature},
            token::Token,
        },
        test::{MethodBuilder, MockHost, ModuleBuilder, TypeBuilder},
    };

    const TARGET: Token = Token(0x0A000123);
    const ORIGINAL: &[u8] = b"original";

    struct Fixture {
        module: Module,
        proxy: Token,
        caller: Token,
    }

    /// A proxy to a method defined in the module itself, and one string site.
    fn fixture() -> Fixture {
        let signature = MethodSignature::new_static(TypeSignature::Void, vec![TypeSignature::I4]);
        let mut builder = ModuleBuilder::new("app.exe");
        builder.add_type(
            TypeBuilder::new("Lib", "Foo").method(MethodBuilder::new_static("Bar", signature.clone())),
        );
        builder.add_method_ref_at(TARGET, "Lib.Foo", "Bar", signature.clone());
        let proxy = builder.add_proxy("D", TARGET, signature);
        let helper = builder.add_decryption_helper("", "H", &[("M", TypeSignature::String)]);
        let caller = builder.add_caller(
            "Program",
            vec![
                Instruction::ldc_i4(7),
                Instruction::call(helper.methods[0]),
                Instruction::new(OpCode::POP),
                Instruction::ldc_i4(1),
                Instruction::call(proxy.entry),
                Instruction::new(OpCode::RET),
            ],
        );
        Fixture {
            module: builder.build(),
            proxy: proxy.type_token,
            caller,
        }
    }

    fn host() -> MockHost {
        MockHost::new().with_method("H", "M", |_| Ok(Value::String("abc".into())))
    }

    #[test]
    fn runs_both_passes() {
        let mut f = fixture();
        let host = host();
        let engine = DeobfuscationEngine::new(EngineConfig::default()).with_host(&host);

        let result = engine.process(&mut f.module, ORIGINAL).unwrap();

        let body = f.module.method(f.caller).unwrap().instructions();
        assert_eq!(body[1], Instruction::with_operand(OpCode::LDSTR, Operand::String("abc".into())));
        assert_eq!(body[4], Instruction::call(TARGET));
        assert!(f.module.type_def(f.proxy).is_none());

        let stats = result.stats();
        assert_eq!(stats.proxies_resolved, 1);
        assert_eq!(stats.strings_decrypted, 1);
        assert_eq!(host.loads(), vec![ORIGINAL.to_vec()]);
    }

    #[test]
    fn oracle_unavailable_keeps_proxy_results() {
        let mut f = fixture();
        let host = MockHost::unavailable("no runtime");
        let engine = DeobfuscationEngine::new(EngineConfig::default()).with_host(&host);

        let result = engine.process(&mut f.module, ORIGINAL).unwrap();

        let body = f.module.method(f.caller).unwrap().instructions();
        assert_eq!(body[1].opcode, OpCode::CALL);
        assert_eq!(body[4], Instruction::call(TARGET));
        assert!(result.events.has(EventKind::Warning));
        assert_eq!(result.stats().strings_decrypted, 0);
    }

    #[test]
    fn without_host_decryption_is_skipped() {
        let mut f = fixture();
        let engine = DeobfuscationEngine::new(EngineConfig::default());
        let result = engine.process(&mut f.module, ORIGINAL).unwrap();
        assert_eq!(result.stats().proxies_resolved, 1);
        assert_eq!(result.stats().warnings, 1);
    }

    #[test]
    fn disabled_passes_leave_module_alone() {
        let mut f = fixture();
        let before = f.module.clone();
        let host = host();
        let config = EngineConfig {
            enable_proxy_resolution: false,
            enable_constant_decryption: false,
            ..EngineConfig::default()
        };
        let engine = DeobfuscationEngine::new(config).with_host(&host);

        let result = engine.process(&mut f.module, ORIGINAL).unwrap();
        assert_eq!(f.module, before);
        assert!(!result.has_changes());
        assert!(host.loads().is_empty());
    }

    #[test]
    fn proxies_only_never_loads_host() {
        let mut f = fixture();
        let host = host();
        let engine = DeobfuscationEngine::new(EngineConfig::proxies_only()).with_host(&host);
        engine.process(&mut f.module, ORIGINAL).unwrap();
        assert!(host.loads().is_empty());
        assert!(f.module.type_def(f.proxy).is_none());
    }

    #[test]
    fn config_reaches_passes() {
        let mut f = fixture();
        let config = EngineConfig {
            remove_proxy_types: false,
            numeric_oracle: NumericOracle::Int64Compat,
            ..EngineConfig::proxies_only()
        };
        let engine = DeobfuscationEngine::new(config);
        engine.process(&mut f.module, ORIGINAL).unwrap();
        assert!(f.module.type_def(f.proxy).is_some());
        assert_eq!(engine.config().numeric_oracle, NumericOracle::Int64Compat);
    }
}
