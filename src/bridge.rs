//! Process-backed module codec and execution host.
//!
//! Decoding and re-encoding managed metadata, and running managed code, are done by a small
//! helper process (the host) that lives next to a CLR. [`HostBridge`] talks to it over its
//! standard input and output with newline-delimited JSON: one request object per line, one
//! response object per line, strictly alternating.
//!
//! Requests are tagged by `op`:
//!
//! | op | fields | result |
//! |----|--------|--------|
//! | `load_module` | `data` (base64) | [`Module`] |
//! | `write_module` | `module` | base64 bytes |
//! | `load_executable` | `data` (base64) | image id |
//! | `get_type` | `image`, `name` | bool |
//! | `get_method` | `image`, `type_name`, `name` | bool |
//! | `invoke` | `image`, `type_name`, `method`, `args` | [`Value`] |
//! | `shutdown` | | none |
//!
//! Responses are `{"ok": true, "result": ...}` or `{"ok": false, "error": "..."}`.
//!
//! The host is started on first use and asked to shut down when the bridge is dropped.
//! A reference host built on dnlib ships in `host/`; [`HostBridge::locate`] finds an
//! installed copy.
//! There is no request timeout; a host that never answers stalls the caller.
//!
//! # Examples
//!
//! ```rust,no_run
//! use cryptoscope::{bridge::HostBridge, metadata::codec::ModuleCodec};
//!
//! let bridge = HostBridge::new("cryptoscope-host");
//! let data = std::fs::read("obfuscated.exe")?;
//! let module = bridge.load(&data)?;
//! println!("{} types", module.types.len());
//! # Ok::<(), cryptoscope::Error>(())
//! ```

use std::{
    cell::RefCell,
    ffi::OsString,
    io::{BufRead, BufReader, Write},
    path::{Path, PathBuf},
    process::{Child, Command, Stdio},
};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{debug, trace, warn};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::{
    emulation::{ExecutionHost, RuntimeImage, RuntimeMethod, RuntimeType, Value},
    metadata::{codec::ModuleCodec, module::Module},
    Error, Result,
};

#[derive(Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum Request<'a> {
    LoadModule {
        data: String,
    },
    WriteModule {
        module: &'a Module,
    },
    LoadExecutable {
        data: String,
    },
    GetType {
        image: u32,
        name: &'a str,
    },
    GetMethod {
        image: u32,
        type_name: &'a str,
        name: &'a str,
    },
    Invoke {
        image: u32,
        type_name: &'a str,
        method: &'a str,
        args: &'a [Value],
    },
    Shutdown,
}

#[derive(Deserialize)]
struct Response {
    ok: bool,
    #[serde(default)]
    result: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

/// A failed request, split by where it failed.
enum Failure {
    /// The host answered `ok: false`
    Host(String),
    /// The exchange itself failed
    Transport(Error),
}

impl From<Error> for Failure {
    fn from(error: Error) -> Self {
        Failure::Transport(error)
    }
}

impl Failure {
    fn into_error(self, host: impl FnOnce(String) -> Error) -> Error {
        match self {
            Failure::Host(message) => host(message),
            Failure::Transport(error) => error,
        }
    }
}

struct Channel {
    reader: Box<dyn BufRead>,
    writer: Box<dyn Write>,
    child: Option<Child>,
}

impl Channel {
    fn spawn(program: &Path, args: &[OsString]) -> Result<Channel> {
        debug!("Starting host {}", program.display());
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| bridge_error!("failed to start {}: {}", program.display(), e))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| bridge_error!("host stdin unavailable"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| bridge_error!("host stdout unavailable"))?;

        Ok(Channel {
            reader: Box::new(BufReader::new(stdout)),
            writer: Box::new(stdin),
            child: Some(child),
        })
    }

    fn send(&mut self, request: &Request<'_>) -> Result<()> {
        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        self.writer.write_all(&line)?;
        self.writer.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<Response> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(bridge_error!("host closed the connection"));
        }
        trace!("host <- {}", line.trim_end());
        Ok(serde_json::from_str(&line)?)
    }
}

/// File name of the reference host, without the platform executable suffix.
pub const HOST_NAME: &str = "cryptoscope-host";

/// Client of an out-of-process module codec and execution host.
///
/// Implements [`ModuleCodec`] and [`ExecutionHost`]. The bridge is single-threaded: requests
/// are serialized through an internal [`RefCell`], and runtime objects handed out by
/// [`HostBridge::load_executable`] borrow the bridge.
pub struct HostBridge {
    program: PathBuf,
    args: Vec<OsString>,
    channel: RefCell<Option<Channel>>,
}

impl HostBridge {
    /// Creates a bridge that will start `program` on first use.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        HostBridge {
            program: program.into(),
            args: Vec::new(),
            channel: RefCell::new(None),
        }
    }

    /// Looks for an installed host, first next to the running executable, then on `PATH`.
    #[must_use]
    pub fn locate() -> Option<PathBuf> {
        let beside = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        let path = std::env::var_os("PATH");
        let searched = path.iter().flat_map(std::env::split_paths);
        locate_in(beside.into_iter().chain(searched))
    }

    /// Adds a command line argument for the host process.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Creates a bridge over already connected streams instead of a child process.
    ///
    /// The bridge reads responses from `reader` and writes requests to `writer`.
    pub fn from_streams(reader: impl BufRead + 'static, writer: impl Write + 'static) -> Self {
        HostBridge {
            program: PathBuf::new(),
            args: Vec::new(),
            channel: RefCell::new(Some(Channel {
                reader: Box::new(reader),
                writer: Box::new(writer),
                child: None,
            })),
        }
    }

    /// The host program this bridge starts
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Returns true once a connection to the host exists
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.channel.borrow().is_some()
    }

    fn request<T: DeserializeOwned>(&self, request: &Request<'_>) -> std::result::Result<T, Failure> {
        let mut slot = self.channel.borrow_mut();
        if slot.is_none() {
            *slot = Some(Channel::spawn(&self.program, &self.args)?);
        }
        let Some(channel) = slot.as_mut() else {
            return Err(Failure::Transport(bridge_error!("host not connected")));
        };

        channel.send(request)?;
        let response = channel.receive()?;
        if !response.ok {
            return Err(Failure::Host(
                response
                    .error
                    .unwrap_or_else(|| "unspecified host error".to_string()),
            ));
        }
        serde_json::from_value(response.result).map_err(|e| Failure::Transport(e.into()))
    }

    fn call<T: DeserializeOwned>(&self, request: &Request<'_>) -> Result<T> {
        self.request(request)
            .map_err(|f| f.into_error(Error::Bridge))
    }
}

fn locate_in(dirs: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    let file = format!("{HOST_NAME}{}", std::env::consts::EXE_SUFFIX);
    let found = dirs
        .into_iter()
        .map(|dir| dir.join(&file))
        .find(|candidate| candidate.is_file());
    match &found {
        Some(host) => debug!("Using host {}", host.display()),
        None => debug!("No {file} found"),
    }
    found
}

impl ModuleCodec for HostBridge {
    fn load(&self, data: &[u8]) -> Result<Module> {
        self.call(&Request::LoadModule {
            data: STANDARD.encode(data),
        })
    }

    fn write(&self, module: &Module) -> Result<Vec<u8>> {
        let encoded: String = self.call(&Request::WriteModule { module })?;
        Ok(STANDARD.decode(encoded)?)
    }
}

impl ExecutionHost for HostBridge {
    fn load_executable(&self, data: &[u8]) -> Result<Box<dyn RuntimeImage + '_>> {
        let id: u32 = self
            .request(&Request::LoadExecutable {
                data: STANDARD.encode(data),
            })
            .map_err(|f| f.into_error(Error::OracleUnavailable))?;
        debug!("Host loaded image #{id}");
        Ok(Box::new(BridgeImage { bridge: self, id }))
    }
}

impl Drop for HostBridge {
    fn drop(&mut self) {
        let Some(mut channel) = self.channel.get_mut().take() else {
            return;
        };
        if let Err(e) = channel.send(&Request::Shutdown) {
            debug!("Host shutdown request failed: {e}");
        }

        let Channel {
            reader,
            writer,
            child,
        } = channel;
        drop(writer);
        drop(reader);
        if let Some(mut child) = child {
            if let Err(e) = child.wait() {
                warn!("Waiting for host exit failed: {e}");
            }
        }
    }
}

struct BridgeImage<'a> {
    bridge: &'a HostBridge,
    id: u32,
}

impl RuntimeImage for BridgeImage<'_> {
    fn get_type(&self, full_name: &str) -> Option<Box<dyn RuntimeType + '_>> {
        let found: bool = match self.bridge.call(&Request::GetType {
            image: self.id,
            name: full_name,
        }) {
            Ok(found) => found,
            Err(e) => {
                warn!("Type lookup of {full_name} failed: {e}");
                false
            }
        };
        found.then(|| {
            Box::new(BridgeType {
                bridge: self.bridge,
                image: self.id,
                full_name: full_name.to_string(),
            }) as Box<dyn RuntimeType + '_>
        })
    }
}

struct BridgeType<'a> {
    bridge: &'a HostBridge,
    image: u32,
    full_name: String,
}

impl RuntimeType for BridgeType<'_> {
    fn full_name(&self) -> &str {
        &self.full_name
    }

    fn get_method(&self, name: &str) -> Option<Box<dyn RuntimeMethod + '_>> {
        let found: bool = match self.bridge.call(&Request::GetMethod {
            image: self.image,
            type_name: &self.full_name,
            name,
        }) {
            Ok(found) => found,
            Err(e) => {
                warn!("Method lookup of {}::{name} failed: {e}", self.full_name);
                false
            }
        };
        found.then(|| {
            Box::new(BridgeMethod {
                bridge: self.bridge,
                image: self.image,
                type_name: &self.full_name,
                name: name.to_string(),
            }) as Box<dyn RuntimeMethod + '_>
        })
    }
}

struct BridgeMethod<'a> {
    bridge: &'a HostBridge,
    image: u32,
    type_name: &'a str,
    name: String,
}

impl RuntimeMethod for BridgeMethod<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke(&self, args: &[Value]) -> Result<Value> {
        self.bridge
            .request(&Request::Invoke {
                image: self.image,
                type_name: self.type_name,
                method: &self.name,
                args,
            })
            .map_err(|f| {
                f.into_error(|message| Error::Invocation {
                    method: format!("{}::{}", self.type_name, self.name),
                    message,
                })
            })
    }
}
