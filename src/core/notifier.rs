/*
 * Best-effort desktop notifications. Whether notifications are wanted at all is
 * decided by the caller (`ClipboardTransfer::show_notification`); this module
 * only knows how to ask the platform to display one.
 */
use std::io;
use std::process::{Command, Stdio};

pub const APP_TITLE: &str = "CLIPBARD";

#[derive(Debug)]
pub enum NotifyError {
    Io(io::Error),
    Failed(String),
}

impl From<io::Error> for NotifyError {
    fn from(err: io::Error) -> Self {
        NotifyError::Io(err)
    }
}

impl std::fmt::Display for NotifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotifyError::Io(e) => write!(f, "Notification I/O error: {e}"),
            NotifyError::Failed(reason) => write!(f, "Notification failed: {reason}"),
        }
    }
}

impl std::error::Error for NotifyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NotifyError::Io(e) => Some(e),
            NotifyError::Failed(_) => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NotifyError>;

pub trait NotifierOperations: Send + Sync {
    fn notify(&self, title: &str, message: &str) -> Result<()>;
}

pub struct CoreNotifier {}

impl CoreNotifier {
    pub fn new() -> Self {
        CoreNotifier {}
    }
}

impl Default for CoreNotifier {
    fn default() -> Self {
        Self::new()
    }
}

// AppleScript string literal: backslashes and double quotes must be escaped.
fn applescript_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

// PowerShell single-quoted literal: a quote is escaped by doubling it.
fn powershell_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "''"))
}

fn notification_command(os: &str, title: &str, message: &str) -> Command {
    match os {
        "macos" => {
            let script = format!(
                "display notification {} with title {}",
                applescript_quote(message),
                applescript_quote(title)
            );
            let mut cmd = Command::new("osascript");
            cmd.args(["-e", &script]);
            cmd
        }
        "windows" => {
            let script = format!(
                "Add-Type -AssemblyName System.Windows.Forms; \
                 $n = New-Object System.Windows.Forms.NotifyIcon; \
                 $n.Icon = [System.Drawing.SystemIcons]::Information; \
                 $n.Visible = $true; \
                 $n.ShowBalloonTip(3000, {}, {}, 'Info'); \
                 Start-Sleep -Seconds 3; $n.Dispose()",
                powershell_quote(title),
                powershell_quote(message)
            );
            let mut cmd = Command::new("powershell");
            cmd.args(["-NoProfile", "-NonInteractive", "-Command", &script]);
            cmd
        }
        _ => {
            let mut cmd = Command::new("notify-send");
            cmd.args(["-a", APP_TITLE, title, message]);
            cmd
        }
    }
}

impl NotifierOperations for CoreNotifier {
    fn notify(&self, title: &str, message: &str) -> Result<()> {
        let status = notification_command(std::env::consts::OS, title, message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            log::trace!("Notifier: Displayed '{title}: {message}'");
            Ok(())
        } else {
            Err(NotifyError::Failed(format!("notifier exited with {status}")))
        }
    }
}
