//! Argument-vector command builder and bounded subprocess execution.
//!
//! Converter invocations are assembled as discrete arguments and handed to
//! [`std::process::Command`] directly, so file paths and settings are never
//! re-interpreted by a shell. The [`fmt::Display`] form is a shell-like
//! rendering used only for logging.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A program plus its ordered arguments and extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    program: PathBuf,
    args: Vec<OsString>,
    envs: Vec<(OsString, OsString)>,
}

/// Exit status and captured standard output of a finished command.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: String,
}

impl Captured {
    pub fn lines(&self) -> Vec<&str> {
        self.stdout.lines().collect()
    }
}

impl CommandLine {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for a in args {
            self.arg(a);
        }
        self
    }

    pub fn env(&mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> &mut Self {
        self.envs
            .push((key.as_ref().to_os_string(), value.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments as (lossy) UTF-8 strings, program excluded.
    pub fn arg_strings(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    /// Environment overrides as (lossy) UTF-8 pairs.
    pub fn env_strings(&self) -> Vec<(String, String)> {
        self.envs
            .iter()
            .map(|(k, v)| (k.to_string_lossy().into_owned(), v.to_string_lossy().into_owned()))
            .collect()
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).stdin(Stdio::null());
        for (k, v) in &self.envs {
            cmd.env(k, v);
        }
        cmd
    }

    /// Run with standard error discarded and standard output captured.
    ///
    /// A child still running when `timeout` expires is killed and an
    /// [`io::ErrorKind::TimedOut`] error is returned.
    pub fn run_captured(&self, timeout: Option<Duration>) -> io::Result<Captured> {
        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let reader = child.stdout.take().map(|mut out| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = out.read_to_end(&mut buf);
                buf
            })
        });

        // on timeout the reader is left detached; an orphaned grandchild may
        // still hold the pipe open
        let status = wait_bounded(&mut child, timeout)?;
        let stdout = reader
            .and_then(|h| h.join().ok())
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default();

        Ok(Captured { status, stdout })
    }

    /// Run with both output streams discarded.
    pub fn run(&self, timeout: Option<Duration>) -> io::Result<ExitStatus> {
        let mut child = self
            .command()
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        wait_bounded(&mut child, timeout)
    }
}

fn wait_bounded(child: &mut Child, timeout: Option<Duration>) -> io::Result<ExitStatus> {
    let Some(limit) = timeout else {
        return child.wait();
    };
    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("process timed out after {}s", limit.as_secs_f32()),
            ));
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn quote(s: &str) -> String {
    if !s.is_empty() && !s.contains(|c: char| c.is_whitespace() || "'\"\\$`;&|<>()".contains(c)) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.envs {
            write!(f, "{}={} ", k.to_string_lossy(), quote(&v.to_string_lossy()))?;
        }
        f.write_str(&quote(&self.program.to_string_lossy()))?;
        for a in &self.args {
            write!(f, " {}", quote(&a.to_string_lossy()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_only_when_needed() {
        let mut cmd = CommandLine::new("/usr/bin/wkhtmltopdf");
        cmd.env("LD_LIBRARY_PATH", "/opt/lib")
            .args(["-T", "20mm"])
            .arg("/tmp/my dir/body.html")
            .arg("it's.pdf");
        assert_eq!(
            cmd.to_string(),
            r"LD_LIBRARY_PATH=/opt/lib /usr/bin/wkhtmltopdf -T 20mm '/tmp/my dir/body.html' 'it'\''s.pdf'"
        );
    }

    #[test]
    fn spawn_failure_is_io_error() {
        let cmd = CommandLine::new("/nonexistent/htmltopdf-test-binary");
        assert!(cmd.run_captured(None).is_err());
        assert!(cmd.run(None).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_lines_and_status() {
        let mut cmd = CommandLine::new("/bin/sh");
        cmd.args(["-c", "echo one; echo two; echo oops >&2; exit 3"]);
        let out = cmd.run_captured(Some(Duration::from_secs(10))).unwrap();
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.lines(), vec!["one", "two"]);
    }

    #[cfg(unix)]
    #[test]
    fn timeout_kills_child() {
        let mut cmd = CommandLine::new("/bin/sh");
        cmd.args(["-c", "sleep 5"]);
        let started = Instant::now();
        let err = cmd.run(Some(Duration::from_millis(200))).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn env_reaches_child() {
        let mut cmd = CommandLine::new("/bin/sh");
        cmd.env("HTMLTOPDF_PROBE", "42")
            .args(["-c", "echo $HTMLTOPDF_PROBE"]);
        let out = cmd.run_captured(None).unwrap();
        assert_eq!(out.stdout.trim(), "42");
    }
}
