//! Runs the engine against a [`HostBridge`] connected to scripted streams.
//!
//! The scripted host answers every request with a prepared response line. The tests check
//! the requests the bridge sends, in order, and what comes back out of the engine.

mod common;

use std::{cell::RefCell, io::Cursor, io::Write, rc::Rc};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::{library, sample_module, CALLER, DECRYPT, ORIGINAL, PROXY_TARGET};
use cryptoscope::{
    assembly::{Instruction, OpCode, Operand},
    deobfuscation::{DeobfuscationEngine, EngineConfig},
    metadata::{resolver::ModuleResolver, Module},
    Error, HostBridge,
};
use serde_json::{json, Value};

/// Collects every request line the bridge writes.
#[derive(Clone, Default)]
struct Capture(Rc<RefCell<Vec<u8>>>);

impl Write for Capture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Capture {
    fn requests(&self) -> Vec<Value> {
        String::from_utf8(self.0.borrow().clone())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    fn ops(&self) -> Vec<String> {
        self.requests()
            .iter()
            .map(|r| r["op"].as_str().unwrap_or_default().to_string())
            .collect()
    }
}

fn ok(result: Value) -> String {
    json!({ "ok": true, "result": result }).to_string()
}

fn failed(error: &str) -> String {
    json!({ "ok": false, "error": error }).to_string()
}

/// Runs the default pipeline over `ORIGINAL` with the host answering `responses`.
fn run(responses: &[String]) -> (cryptoscope::Result<Vec<u8>>, Capture) {
    let capture = Capture::default();
    let script: String = responses.iter().map(|r| format!("{r}\n")).collect();
    let bridge = HostBridge::from_streams(Cursor::new(script.into_bytes()), capture.clone());
    let resolver = ModuleResolver::with_references(vec![library()]);
    let output = DeobfuscationEngine::new(EngineConfig::default())
        .with_resolver(&resolver)
        .with_host(&bridge)
        .process_bytes(&bridge, ORIGINAL)
        .map(|(output, _)| output);
    drop(bridge);
    (output, capture)
}

fn written_module(capture: &Capture) -> Module {
    let request = capture
        .requests()
        .into_iter()
        .find(|r| r["op"] == "write_module")
        .expect("module never written");
    serde_json::from_value(request["module"].clone()).unwrap()
}

#[test]
fn full_pipeline_over_the_bridge() {
    let module = serde_json::to_value(sample_module()).unwrap();
    let (output, capture) = run(&[
        ok(module),
        ok(json!(1)),
        ok(json!(true)),
        ok(json!(true)),
        ok(json!({ "type": "string", "value": "abc" })),
        ok(json!(STANDARD.encode(b"rewritten image"))),
    ]);

    assert_eq!(output.unwrap(), b"rewritten image");
    assert_eq!(
        capture.ops(),
        vec![
            "load_module",
            "load_executable",
            "get_type",
            "get_method",
            "invoke",
            "write_module",
            "shutdown"
        ]
    );

    let requests = capture.requests();
    let original = STANDARD.encode(ORIGINAL);
    assert_eq!(requests[0]["data"], original);
    assert_eq!(requests[1]["data"], original);
    assert_eq!(requests[2]["name"], "Obf.Helper");
    assert_eq!(requests[3]["name"], "M");
    assert_eq!(requests[4]["args"], json!([{ "type": "int32", "value": 7 }]));

    let written = written_module(&capture);
    let body = written.method(CALLER).unwrap().instructions();
    assert_eq!(body[0], Instruction::nop());
    assert_eq!(
        body[1],
        Instruction::with_operand(OpCode::LDSTR, Operand::String("abc".into()))
    );
    assert_eq!(body[4], Instruction::call(PROXY_TARGET));
}

#[test]
fn load_failure_still_writes_proxy_results() {
    let module = serde_json::to_value(sample_module()).unwrap();
    let (output, capture) = run(&[
        ok(module),
        failed("BadImageFormatException"),
        ok(json!(STANDARD.encode(b"out"))),
    ]);

    assert_eq!(output.unwrap(), b"out");
    assert_eq!(
        capture.ops(),
        vec!["load_module", "load_executable", "write_module", "shutdown"]
    );

    let written = written_module(&capture);
    let body = written.method(CALLER).unwrap().instructions();
    assert_eq!(body[1], Instruction::call(DECRYPT));
    assert_eq!(body[4], Instruction::call(PROXY_TARGET));
}

#[test]
fn closed_host_fails_the_run() {
    let (output, capture) = run(&[]);
    assert!(matches!(output, Err(Error::Bridge(_))));
    assert_eq!(capture.ops(), vec!["load_module", "shutdown"]);
}

#[test]
fn codec_error_is_reported() {
    let (output, _) = run(&[failed("not a managed image")]);
    match output {
        Err(Error::Bridge(message)) => assert_eq!(message, "not a managed image"),
        other => panic!("unexpected result: {other:?}"),
    }
}
