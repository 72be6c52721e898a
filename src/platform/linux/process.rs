use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, ExitStatus, Output, Stdio};

use tracing::debug;

use crate::core::error::{NetnsError, Result};

/// One invocation of an external tool.
///
/// Every run is logged at debug level as `+ program args...`, which is what
/// `-v` shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    argv: Vec<String>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.argv.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    #[cfg(test)]
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    fn command(&self) -> Command {
        debug!("+ {self}");
        let mut cmd = Command::new(&self.argv[0]);
        cmd.args(&self.argv[1..]);
        cmd
    }

    fn spawn_error(&self, source: std::io::Error) -> NetnsError {
        NetnsError::Spawn {
            program: self.program().to_string(),
            source,
        }
    }

    /// Run with inherited stdio and return the exit status.
    pub fn status(&self) -> Result<i32> {
        let status = self
            .command()
            .status()
            .map_err(|e| self.spawn_error(e))?;
        Ok(exit_code(status))
    }

    /// Run, failing with the tool's status and stderr if it does not succeed.
    pub fn check(&self) -> Result<()> {
        self.output().map(drop)
    }

    /// Run and capture stdout, failing like [`check`](Self::check).
    pub fn stdout(&self) -> Result<String> {
        let output = self.output()?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn output(&self) -> Result<Output> {
        let output = self
            .command()
            .stdin(Stdio::null())
            .output()
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(NetnsError::CommandFailed {
                program: self.program().to_string(),
                code: exit_code(output.status),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }
        Ok(output)
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, arg) in self.argv.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write_quoted(f, arg)?;
        }
        Ok(())
    }
}

/// Quote `arg` for display the way a shell trace would.
fn write_quoted(f: &mut fmt::Formatter<'_>, arg: &str) -> fmt::Result {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./=:,@%+#{}".contains(&b));
    if plain {
        f.write_str(arg)
    } else {
        write!(f, "'{}'", arg.replace('\'', r"'\''"))
    }
}

/// Map a wait status to a shell-style exit code (128+signal for signal death).
pub fn exit_code(status: ExitStatus) -> i32 {
    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(sig)) => 128 + sig,
        (None, None) => 1,
    }
}
