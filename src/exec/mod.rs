//! # Command Execution
//!
//! The execution abstraction behind every pipeline stage. Fetch, template,
//! deploy, delete, and inspect all shell out to external tools; this module
//! normalizes an invocation into a uniform [`CmdRunResult`] so the pipelines
//! can treat tool failures, spawn failures, and synthetic failures (e.g. a
//! staging directory that could not be created) identically.

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Environment overrides that keep local rendering tools from reaching the
/// cluster through ambient service discovery variables.
const NEUTRALIZED_CLUSTER_ENV: [(&str, &str); 2] = [
    ("KUBERNETES_SERVICE_HOST", "not-real"),
    ("KUBERNETES_SERVICE_PORT", "not-real"),
];

/// One external command invocation
#[derive(Debug, Clone, Default)]
pub struct CmdSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; inherits the controller's when unset
    pub cwd: Option<PathBuf>,
    /// Bytes piped to the child's stdin
    pub stdin: Option<Vec<u8>>,
    /// Additional environment variables
    pub env: Vec<(String, String)>,
    /// Neutralize ambient cluster-service env vars before running
    pub isolate_cluster_env: bool,
}

impl CmdSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin(mut self, bytes: Vec<u8>) -> Self {
        self.stdin = Some(bytes);
        self
    }

    pub fn isolate_cluster_env(mut self) -> Self {
        self.isolate_cluster_env = true;
        self
    }
}

impl fmt::Display for CmdSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.program, self.args.join(" "))
    }
}

/// Normalized outcome of one external operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdRunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    /// Structured error text; None means the operation succeeded
    pub error: Option<String>,
    /// False means the operation was still running when last observed
    pub finished: bool,
}

impl CmdRunResult {
    /// A finished result carrying only an error (used for synthetic failures
    /// such as staging-directory creation errors)
    pub fn with_error(err: impl fmt::Display) -> Self {
        Self {
            exit_code: -1,
            error: Some(err.to_string()),
            finished: true,
            ..Self::default()
        }
    }

    /// Wrap the current error, if any, with stage context
    pub fn attach_error_context(&mut self, context: &str) {
        if let Some(err) = self.error.take() {
            self.error = Some(format!("{context}: {err}"));
        }
    }

    pub fn error_str(&self) -> String {
        self.error.clone().unwrap_or_default()
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    /// True when the result carries no output and no error. An empty inspect
    /// result clears the inspect status record instead of recording it.
    pub fn is_empty(&self) -> bool {
        self.stdout.is_empty() && self.stderr.is_empty() && self.error.is_none()
    }

    /// Trim trailing whitespace noise from tool output so YAML-ish blobs read
    /// cleanly when copied into status
    pub fn with_friendly_strings(mut self) -> Self {
        self.stdout = self.stdout.trim_end().to_string();
        self.stderr = self.stderr.trim_end().to_string();
        self
    }
}

/// Runs one external operation. Implementations must support stdin
/// redirection and environment overrides.
#[async_trait]
pub trait CmdRunner: Send + Sync {
    async fn run(&self, spec: CmdSpec) -> CmdRunResult;
}

/// Runs commands as local subprocesses via `tokio::process`
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCmdRunner;

#[async_trait]
impl CmdRunner for LocalCmdRunner {
    async fn run(&self, spec: CmdSpec) -> CmdRunResult {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(if spec.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }
        if spec.isolate_cluster_env {
            for (key, value) in NEUTRALIZED_CLUSTER_ENV {
                cmd.env(key, value);
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return CmdRunResult::with_error(format!("Spawning {}: {e}", spec.program));
            }
        };

        if let Some(bytes) = spec.stdin {
            if let Some(mut stdin) = child.stdin.take() {
                if let Err(e) = stdin.write_all(&bytes).await {
                    return CmdRunResult::with_error(format!(
                        "Writing stdin to {}: {e}",
                        spec.program
                    ));
                }
                drop(stdin);
            }
        }

        let output = match child.wait_with_output().await {
            Ok(output) => output,
            Err(e) => {
                return CmdRunResult::with_error(format!("Waiting for {}: {e}", spec.program));
            }
        };

        let exit_code = output.status.code().unwrap_or(-1);
        let error = if output.status.success() {
            None
        } else {
            Some(format!(
                "Running {}: exit status {exit_code}",
                spec.program
            ))
        };

        CmdRunResult {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code,
            error,
            finished: true,
        }
    }
}
