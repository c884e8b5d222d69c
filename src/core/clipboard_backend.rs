/*
 * Platform clipboard access. Each supported platform is one implementation of
 * `ClipboardBackendOperations`; the backend is chosen once at start-up by
 * probing for the native facility, and every later transfer goes through it
 * without re-inspecting the environment.
 *
 * Backends:
 *   - macOS:   `pbcopy` / `pbpaste`
 *   - Windows: the Win32 clipboard via `clipboard-win`
 *   - Wayland: `wl-copy` / `wl-paste` (tried before X11)
 *   - X11:     `xclip -selection clipboard`
 *   - none:    every call fails with `ClipboardError::NoBackend`
 */
use std::io::{self, Write};
use std::process::{Command, ExitStatus, Stdio};

#[derive(Debug)]
pub enum ClipboardError {
    Io(io::Error),
    CommandFailed {
        program: String,
        status: ExitStatus,
    },
    #[cfg(any(target_os = "windows", test))]
    Platform(String),
    NoBackend,
}

impl From<io::Error> for ClipboardError {
    fn from(err: io::Error) -> Self {
        ClipboardError::Io(err)
    }
}

impl std::fmt::Display for ClipboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClipboardError::Io(e) => write!(f, "Clipboard I/O error: {e}"),
            ClipboardError::CommandFailed { program, status } => {
                write!(f, "Clipboard tool '{program}' failed with {status}")
            }
            #[cfg(any(target_os = "windows", test))]
            ClipboardError::Platform(reason) => write!(f, "Clipboard error: {reason}"),
            ClipboardError::NoBackend => write!(f, "No clipboard utility found"),
        }
    }
}

impl std::error::Error for ClipboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClipboardError::Io(e) => Some(e),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClipboardError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    MacOs,
    Windows,
    Wayland,
    X11,
    None,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::MacOs => "macos",
            BackendKind::Windows => "windows",
            BackendKind::Wayland => "wayland",
            BackendKind::X11 => "x11",
            BackendKind::None => "none",
        }
    }
}

pub trait ClipboardBackendOperations: Send + Sync {
    fn kind(&self) -> BackendKind;
    fn write(&self, content: &[u8]) -> Result<()>;
    fn read(&self) -> Result<String>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: &str, args: &[&str]) -> Self {
        ToolCommand {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    fn check(&self, status: ExitStatus) -> Result<()> {
        if status.success() {
            Ok(())
        } else {
            Err(ClipboardError::CommandFailed {
                program: self.program.clone(),
                status,
            })
        }
    }

    fn run_with_input(&self, input: &[u8]) -> Result<()> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(input)?;
        }
        let status = child.wait()?;
        self.check(status)
    }

    fn run_for_output(&self) -> Result<String> {
        let output = self
            .command()
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()?;
        self.check(output.status)?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run(&self) -> Result<()> {
        let status = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        self.check(status)
    }
}

/*
 * A backend driven entirely by command-line tools. `clear` is either a
 * dedicated command or, when absent, a write of empty content.
 */
pub struct CommandClipboardBackend {
    kind: BackendKind,
    copy: ToolCommand,
    paste: ToolCommand,
    clear: Option<ToolCommand>,
}

impl CommandClipboardBackend {
    pub fn new(
        kind: BackendKind,
        copy: ToolCommand,
        paste: ToolCommand,
        clear: Option<ToolCommand>,
    ) -> Self {
        CommandClipboardBackend {
            kind,
            copy,
            paste,
            clear,
        }
    }

    pub fn macos() -> Self {
        Self::new(
            BackendKind::MacOs,
            ToolCommand::new("pbcopy", &[]),
            ToolCommand::new("pbpaste", &[]),
            None,
        )
    }

    pub fn wayland() -> Self {
        Self::new(
            BackendKind::Wayland,
            ToolCommand::new("wl-copy", &[]),
            ToolCommand::new("wl-paste", &["--no-newline"]),
            Some(ToolCommand::new("wl-copy", &["--clear"])),
        )
    }

    pub fn x11() -> Self {
        Self::new(
            BackendKind::X11,
            ToolCommand::new("xclip", &["-selection", "clipboard"]),
            ToolCommand::new("xclip", &["-selection", "clipboard", "-o"]),
            None,
        )
    }
}

impl ClipboardBackendOperations for CommandClipboardBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn write(&self, content: &[u8]) -> Result<()> {
        log::trace!(
            "ClipboardBackend: Writing {} bytes via {}",
            content.len(),
            self.copy.program
        );
        self.copy.run_with_input(content)
    }

    fn read(&self) -> Result<String> {
        self.paste.run_for_output()
    }

    fn clear(&self) -> Result<()> {
        match &self.clear {
            Some(clear) => clear.run(),
            None => self.copy.run_with_input(b""),
        }
    }
}

#[cfg(target_os = "windows")]
pub struct WindowsClipboardBackend {}

#[cfg(target_os = "windows")]
impl ClipboardBackendOperations for WindowsClipboardBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Windows
    }

    fn write(&self, content: &[u8]) -> Result<()> {
        let text = String::from_utf8_lossy(content);
        clipboard_win::set_clipboard_string(&text)
            .map_err(|e| ClipboardError::Platform(e.to_string()))
    }

    fn read(&self) -> Result<String> {
        clipboard_win::get_clipboard_string().map_err(|e| ClipboardError::Platform(e.to_string()))
    }

    fn clear(&self) -> Result<()> {
        let _clip = clipboard_win::Clipboard::new_attempts(10)
            .map_err(|e| ClipboardError::Platform(e.to_string()))?;
        clipboard_win::empty().map_err(|e| ClipboardError::Platform(e.to_string()))
    }
}

pub struct NoClipboardBackend {}

impl ClipboardBackendOperations for NoClipboardBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::None
    }

    fn write(&self, _content: &[u8]) -> Result<()> {
        Err(ClipboardError::NoBackend)
    }

    fn read(&self) -> Result<String> {
        Err(ClipboardError::NoBackend)
    }

    fn clear(&self) -> Result<()> {
        Err(ClipboardError::NoBackend)
    }
}

/*
 * Chooses the backend variant for `os` (a `std::env::consts::OS` value).
 * `has_tool` answers whether an executable is on the PATH. On Linux and the
 * BSDs a Wayland session with `wl-copy` wins, then `xclip`, then `wl-copy`
 * outside a detected Wayland session. This departs from a strict "Wayland
 * before X11" order: an X11 session with both tool sets installed gets `xclip`,
 * because `wl-copy` cannot reach a clipboard without a Wayland compositor.
 */
pub fn select_backend_kind(
    os: &str,
    wayland_session: bool,
    has_tool: impl Fn(&str) -> bool,
) -> BackendKind {
    match os {
        "macos" => BackendKind::MacOs,
        "windows" => BackendKind::Windows,
        _ => {
            let has_wayland_tools = has_tool("wl-copy") && has_tool("wl-paste");
            if has_wayland_tools && wayland_session {
                BackendKind::Wayland
            } else if has_tool("xclip") {
                BackendKind::X11
            } else if has_wayland_tools {
                BackendKind::Wayland
            } else {
                BackendKind::None
            }
        }
    }
}

pub fn backend_for(kind: BackendKind) -> Box<dyn ClipboardBackendOperations> {
    match kind {
        BackendKind::MacOs => Box::new(CommandClipboardBackend::macos()),
        #[cfg(target_os = "windows")]
        BackendKind::Windows => Box::new(WindowsClipboardBackend {}),
        #[cfg(not(target_os = "windows"))]
        BackendKind::Windows => Box::new(NoClipboardBackend {}),
        BackendKind::Wayland => Box::new(CommandClipboardBackend::wayland()),
        BackendKind::X11 => Box::new(CommandClipboardBackend::x11()),
        BackendKind::None => Box::new(NoClipboardBackend {}),
    }
}

pub fn probe_backend() -> Box<dyn ClipboardBackendOperations> {
    let wayland_session = std::env::var_os("WAYLAND_DISPLAY").is_some_and(|v| !v.is_empty());
    let kind = select_backend_kind(std::env::consts::OS, wayland_session, |tool| {
        which::which(tool).is_ok()
    });
    log::debug!("ClipboardBackend: Selected '{}' backend.", kind.as_str());
    backend_for(kind)
}
