//! Launches the external data-preparation program.
//!
//! The launcher owns no output handling: stdio is inherited and the child's
//! exit status becomes the caller's exit status.

use crate::error::{PrepError, Result};
use crate::invocation::{InvocationConfig, PREPARE_SCRIPT};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};

/// Where the external program lives and how to start it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramConfig {
    /// Interpreter to run the script with; `None` executes the script directly
    pub interpreter: Option<String>,
    /// Path to the data-preparation script
    pub script: String,
    /// Working directory for the child (default: inherited)
    pub working_dir: Option<PathBuf>,
    /// Extra environment variables for the child
    pub env: BTreeMap<String, String>,
    /// Kill the child after this many milliseconds (default: no limit)
    pub timeout_ms: Option<u64>,
}

impl Default for ProgramConfig {
    fn default() -> Self {
        Self {
            interpreter: Some("python".to_string()),
            script: PREPARE_SCRIPT.to_string(),
            working_dir: None,
            env: BTreeMap::new(),
            timeout_ms: None,
        }
    }
}

impl ProgramConfig {
    /// Create a config for the given script, run with the default interpreter
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    /// Set or clear the interpreter
    pub fn interpreter(mut self, interpreter: Option<&str>) -> Self {
        self.interpreter = interpreter.map(String::from);
        self
    }

    /// Add an environment variable
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Set the working directory
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Set the timeout in milliseconds
    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    /// Executable that is actually spawned
    pub fn executable(&self) -> &str {
        self.interpreter.as_deref().unwrap_or(&self.script)
    }

    /// Script location as the child will see it
    fn script_path(&self) -> PathBuf {
        match &self.working_dir {
            Some(dir) => dir.join(&self.script),
            None => PathBuf::from(&self.script),
        }
    }

    /// Arguments placed before the invocation's own arguments
    fn leading_args(&self) -> Vec<String> {
        match self.interpreter {
            Some(_) => vec![self.script.clone()],
            None => Vec::new(),
        }
    }
}

/// Spawns the data-preparation program for an [`InvocationConfig`]
#[derive(Debug, Clone)]
pub struct Launcher {
    program: ProgramConfig,
    home: Option<PathBuf>,
}

impl Launcher {
    /// Create a launcher that expands `~` against the user's home directory
    pub fn new(program: ProgramConfig) -> Self {
        Self {
            program,
            home: dirs::home_dir(),
        }
    }

    /// Use an explicit home directory for `~` expansion
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    pub fn program(&self) -> &ProgramConfig {
        &self.program
    }

    fn resolve(&self, invocation: &InvocationConfig) -> InvocationConfig {
        match &self.home {
            Some(home) => invocation.expand_home(home),
            None => {
                log::warn!("No home directory found, leaving '~' paths unexpanded");
                invocation.clone()
            }
        }
    }

    /// Full command line, executable first, with home-relative paths expanded
    pub fn command_line(&self, invocation: &InvocationConfig) -> Vec<String> {
        let mut line = vec![self.program.executable().to_string()];
        line.extend(self.program.leading_args());
        line.extend(self.resolve(invocation).args());
        line
    }

    /// Command line rendered for a POSIX shell
    pub fn display_command_line(&self, invocation: &InvocationConfig) -> String {
        self.command_line(invocation)
            .iter()
            .map(|arg| shlex::try_quote(arg).map(|q| q.into_owned()).unwrap_or_else(|_| arg.clone()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the program to completion and return its exit code unchanged.
    pub async fn run(&self, invocation: &InvocationConfig) -> Result<i32> {
        invocation.validate()?;

        let line = self.command_line(invocation);
        let (executable, args) = line
            .split_first()
            .ok_or_else(|| PrepError::InvalidConfig("empty command line".to_string()))?;

        let mut cmd = Command::new(executable);
        cmd.args(args);
        if let Some(dir) = &self.program.working_dir {
            cmd.current_dir(dir);
        }
        for (key, value) in &self.program.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if self.program.interpreter.is_some() && !self.program.script_path().is_file() {
            log::warn!("Script {} not found, launching anyway", self.program.script_path().display());
        }

        log::info!("Launching: {}", self.display_command_line(invocation));
        let mut child = cmd.spawn().map_err(|e| spawn_error(executable, e))?;

        let status = self.wait(&mut child).await?;
        let code = exit_code(status);
        log::info!("{} exited with code {}", executable, code);
        Ok(code)
    }

    async fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let Some(ms) = self.program.timeout_ms else {
            return wait_or_interrupt(child).await;
        };
        match tokio::time::timeout(Duration::from_millis(ms), wait_or_interrupt(child)).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!("Program exceeded {}ms, killing it", ms);
                child.kill().await?;
                Err(PrepError::TimedOut(ms))
            }
        }
    }
}

async fn wait_or_interrupt(child: &mut Child) -> Result<ExitStatus> {
    tokio::select! {
        status = child.wait() => Ok(status?),
        _ = tokio::signal::ctrl_c() => {
            log::warn!("Interrupted, stopping child process");
            child.kill().await?;
            Ok(child.wait().await?)
        }
    }
}

fn spawn_error(executable: &str, err: std::io::Error) -> PrepError {
    if err.kind() == std::io::ErrorKind::NotFound {
        PrepError::ProgramNotFound(executable.to_string())
    } else {
        PrepError::Spawn {
            program: executable.to_string(),
            source: err,
        }
    }
}

/// Map a child's exit status to a process exit code.
///
/// Signal deaths become `128 + signal`, as a shell reports them.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn stub(dir: &TempDir, body: &str) -> String {
        let path = dir.path().join("stub.sh");
        fs::write(&path, body).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn sh_launcher(script: String) -> Launcher {
        Launcher::new(ProgramConfig::new(script).interpreter(Some("sh"))).with_home("/home/test")
    }

    #[test]
    fn test_program_config_default() {
        let config = ProgramConfig::default();
        assert_eq!(config.interpreter.as_deref(), Some("python"));
        assert_eq!(config.script, PREPARE_SCRIPT);
        assert!(config.env.is_empty());
        assert!(config.timeout_ms.is_none());
        assert_eq!(config.executable(), "python");
    }

    #[test]
    fn test_program_config_builder() {
        let config = ProgramConfig::new("/opt/prep.py")
            .interpreter(None)
            .env("PYTHONUNBUFFERED", "1")
            .working_dir("/tmp")
            .timeout_ms(5000);

        assert_eq!(config.executable(), "/opt/prep.py");
        assert!(config.leading_args().is_empty());
        assert_eq!(config.env.get("PYTHONUNBUFFERED").map(String::as_str), Some("1"));
        assert_eq!(config.working_dir, Some(PathBuf::from("/tmp")));
        assert_eq!(config.timeout_ms, Some(5000));
    }

    #[test]
    fn test_command_line_with_interpreter() {
        let launcher = Launcher::new(ProgramConfig::default()).with_home("/home/test");
        let line = launcher.command_line(&InvocationConfig::preset());
        assert_eq!(line[0], "python");
        assert_eq!(line[1], PREPARE_SCRIPT);
        assert_eq!(line[2], "/home/test/data/iwslt/en-de/train.tags.en-de.en");
        assert_eq!(line.len(), 2 + InvocationConfig::preset().args().len());
    }

    #[test]
    fn test_command_line_without_interpreter() {
        let launcher = Launcher::new(ProgramConfig::new("./prep.py").interpreter(None)).with_home("/h");
        let line = launcher.command_line(&InvocationConfig::preset());
        assert_eq!(line[0], "./prep.py");
        assert_eq!(line[1], "/h/data/iwslt/en-de/train.tags.en-de.en");
    }

    #[test]
    fn test_display_command_line_quotes_punctuation() {
        let launcher = Launcher::new(ProgramConfig::default()).with_home("/home/test");
        let display = launcher.display_command_line(&InvocationConfig::preset());
        assert!(display.starts_with("python prepare_wmt_data_for_punctuation_capitalization_task.py "));
        let words = shlex::split(&display).unwrap();
        assert_eq!(words, launcher.command_line(&InvocationConfig::preset()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_success_exit_code() {
        let dir = TempDir::new().unwrap();
        let launcher = sh_launcher(stub(&dir, "exit 0\n"));
        let code = launcher.run(&InvocationConfig::preset()).await.unwrap();
        assert_eq!(code, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_propagates_nonzero_exit_code() {
        let dir = TempDir::new().unwrap();
        let launcher = sh_launcher(stub(&dir, "exit 1\n"));
        assert_eq!(launcher.run(&InvocationConfig::preset()).await.unwrap(), 1);

        let launcher = sh_launcher(stub(&dir, "exit 3\n"));
        assert_eq!(launcher.run(&InvocationConfig::preset()).await.unwrap(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_signal_death_exit_code() {
        let dir = TempDir::new().unwrap();
        let launcher = sh_launcher(stub(&dir, "kill -TERM $$\n"));
        // SIGTERM is 15
        assert_eq!(launcher.run(&InvocationConfig::preset()).await.unwrap(), 143);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_passes_arguments() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("args.txt");
        let program = ProgramConfig::new(stub(&dir, "printf '%s\\n' \"$@\" > \"$ARGS_OUT\"\n"))
            .interpreter(Some("sh"))
            .env("ARGS_OUT", out.to_string_lossy());
        let launcher = Launcher::new(program).with_home("/home/test");
        let invocation = InvocationConfig::preset();

        assert_eq!(launcher.run(&invocation).await.unwrap(), 0);

        let written = fs::read_to_string(&out).unwrap();
        let received: Vec<&str> = written.lines().collect();
        let expected = invocation.expand_home(Path::new("/home/test")).args();
        assert_eq!(received, expected);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_in_working_dir() {
        let dir = TempDir::new().unwrap();
        let program = ProgramConfig::new(stub(&dir, "pwd > pwd.txt\n"))
            .interpreter(Some("sh"))
            .working_dir(dir.path());
        let launcher = Launcher::new(program).with_home("/home/test");

        assert_eq!(launcher.run(&InvocationConfig::preset()).await.unwrap(), 0);
        assert!(dir.path().join("pwd.txt").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_timeout() {
        let dir = TempDir::new().unwrap();
        let program = ProgramConfig::new(stub(&dir, "sleep 10\n"))
            .interpreter(Some("sh"))
            .timeout_ms(100);
        let launcher = Launcher::new(program).with_home("/home/test");

        let err = launcher.run(&InvocationConfig::preset()).await.unwrap_err();
        assert!(matches!(err, PrepError::TimedOut(100)));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let program = ProgramConfig::new("prep.py").interpreter(Some("nonexistent_interpreter_xyz123"));
        let launcher = Launcher::new(program).with_home("/home/test");

        let err = launcher.run(&InvocationConfig::preset()).await.unwrap_err();
        assert!(matches!(err, PrepError::ProgramNotFound(ref p) if p == "nonexistent_interpreter_xyz123"));
        assert_eq!(err.exit_code(), 127);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_invocation() {
        let launcher = Launcher::new(ProgramConfig::new("prep.py").interpreter(Some("nonexistent_interpreter_xyz123")));
        let invocation = InvocationConfig {
            input_path: String::new(),
            ..InvocationConfig::preset()
        };
        let err = launcher.run(&invocation).await.unwrap_err();
        assert!(matches!(err, PrepError::InvalidConfig(_)));
    }

    #[cfg(unix)]
    #[test]
    fn test_exit_code_from_signal() {
        use std::os::unix::process::ExitStatusExt;
        // Raw wait status: terminated by SIGKILL (9)
        assert_eq!(exit_code(ExitStatus::from_raw(9)), 137);
        // Raw wait status: exited with code 2
        assert_eq!(exit_code(ExitStatus::from_raw(2 << 8)), 2);
    }

    #[test]
    fn test_script_path_relative_to_working_dir() {
        let config = ProgramConfig::new("prep.py").working_dir("/srv/nemo");
        assert_eq!(config.script_path(), PathBuf::from("/srv/nemo/prep.py"));
        assert_eq!(ProgramConfig::new("/abs/prep.py").working_dir("/srv").script_path(), PathBuf::from("/abs/prep.py"));
    }
}
