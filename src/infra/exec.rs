//! External command execution with container fallback
//!
//! Every tool the drive builders need (`xgenext2fs`, `mksquashfs`, `crane`,
//! `cartesi-machine`) is first looked up on the host. When the binary is
//! absent the same command line is re-issued inside a transient container of
//! the toolchain image, with the working directory mounted at `/work` and the
//! host user/group preserved so produced files keep their ownership.
//!
//! Only a missing binary triggers the fallback. A command that runs and
//! fails is reported as is, with its own diagnostic output.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::process::Command;

use crate::config::defaults::CONTAINER_WORKDIR;
use crate::error::ExecError;

/// Execution options
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Working directory (mounted as `/work` in the container)
    pub cwd: Option<PathBuf>,
    /// Toolchain image used when the binary is missing
    pub image: Option<String>,
    /// Always run inside the toolchain image
    pub force_docker: bool,
    /// File fed to the command's stdin
    pub stdin: Option<PathBuf>,
    /// File receiving the command's stdout
    pub stdout: Option<PathBuf>,
    /// Attach the command to the terminal instead of capturing output
    pub inherit_stdio: bool,
    /// Extra environment for the host process (`docker` itself on fallback)
    pub env: Vec<(String, String)>,
}

impl ExecOptions {
    /// Create options with nothing set
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the working directory
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Set the fallback toolchain image
    #[must_use]
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Route through the container even if the binary exists locally
    #[must_use]
    pub fn force_docker(mut self, force: bool) -> Self {
        self.force_docker = force;
        self
    }

    /// Read stdin from a file
    #[must_use]
    pub fn with_stdin(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdin = Some(path.into());
        self
    }

    /// Write stdout to a file
    #[must_use]
    pub fn with_stdout(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdout = Some(path.into());
        self
    }

    /// Inherit the terminal
    #[must_use]
    pub fn inherit_stdio(mut self) -> Self {
        self.inherit_stdio = true;
        self
    }

    /// Set an environment variable on the host process
    ///
    /// A `PATH` set here is also used to look the binary up.
    #[must_use]
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

/// Output of a finished command
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Exit status
    pub status: ExitStatus,
    /// Captured stdout (empty when redirected or inherited)
    pub stdout: String,
    /// Captured stderr (empty when inherited)
    pub stderr: String,
}

/// Outcome of one execution attempt
#[derive(Debug)]
enum Attempt {
    /// The process ran to completion, successfully or not
    Completed(ExecOutput),
    /// The binary does not exist
    NotFound,
}

/// Run `command` on the host, falling back to the toolchain image
pub async fn run(
    command: &str,
    args: &[String],
    options: &ExecOptions,
) -> Result<ExecOutput, ExecError> {
    if !options.force_docker {
        match attempt(command, args, options).await? {
            Attempt::Completed(output) => return check(command, output),
            Attempt::NotFound => {
                tracing::debug!("'{command}' not found on host");
            }
        }
    }

    let Some(image) = options.image.as_deref() else {
        return Err(ExecError::CommandNotFound {
            command: command.to_string(),
        });
    };

    if !options.force_docker {
        tracing::warn!(
            "error executing '{command}', falling back to docker execution using image '{image}'"
        );
    }

    let name = container_name();
    let docker_args = container_args(&name, command, args, image, options)?;
    tracing::debug!("docker {}", docker_args.join(" "));

    let guard = ContainerGuard::new(name, options.env.clone());
    match attempt("docker", &docker_args, options).await? {
        Attempt::Completed(output) => {
            guard.disarm();
            check(command, output)
        }
        Attempt::NotFound => {
            guard.disarm();
            Err(ExecError::CommandNotFound {
                command: "docker".to_string(),
            })
        }
    }
}

/// Arguments for `docker` re-issuing `command` inside `image`
pub fn container_args(
    name: &str,
    command: &str,
    args: &[String],
    image: &str,
    options: &ExecOptions,
) -> Result<Vec<String>, ExecError> {
    let cwd = working_dir(options)?;

    let mut docker_args = vec![
        "run".to_string(),
        "--rm".to_string(),
        "--name".to_string(),
        name.to_string(),
        "--volume".to_string(),
        format!("{}:{CONTAINER_WORKDIR}", cwd.display()),
        "--workdir".to_string(),
        CONTAINER_WORKDIR.to_string(),
        "--interactive".to_string(),
    ];

    if let Some((uid, gid)) = host_user(&cwd) {
        docker_args.push("--user".to_string());
        docker_args.push(format!("{uid}:{gid}"));
    }

    docker_args.push(image.to_string());
    docker_args.push(command.to_string());
    docker_args.extend(args.iter().cloned());
    Ok(docker_args)
}

fn working_dir(options: &ExecOptions) -> Result<PathBuf, ExecError> {
    let cwd = match &options.cwd {
        Some(cwd) => cwd.clone(),
        None => std::env::current_dir().map_err(|e| ExecError::Io {
            path: PathBuf::from("."),
            error: e.to_string(),
        })?,
    };
    std::fs::canonicalize(&cwd).map_err(|e| ExecError::Io {
        path: cwd,
        error: e.to_string(),
    })
}

/// Owner of the mounted directory, which is the user running the build
#[cfg(unix)]
fn host_user(dir: &Path) -> Option<(u32, u32)> {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata(dir).ok().map(|m| (m.uid(), m.gid()))
}

#[cfg(not(unix))]
fn host_user(_dir: &Path) -> Option<(u32, u32)> {
    None
}

fn container_name() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!(
        "cartesi-build-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    )
}

fn open_stdin(options: &ExecOptions) -> Result<Stdio, ExecError> {
    match &options.stdin {
        Some(path) => std::fs::File::open(path)
            .map(Stdio::from)
            .map_err(|e| ExecError::Io {
                path: path.clone(),
                error: e.to_string(),
            }),
        None if options.inherit_stdio => Ok(Stdio::inherit()),
        None => Ok(Stdio::null()),
    }
}

fn open_stdout(options: &ExecOptions) -> Result<Stdio, ExecError> {
    match &options.stdout {
        Some(path) => std::fs::File::create(path)
            .map(Stdio::from)
            .map_err(|e| ExecError::Io {
                path: path.clone(),
                error: e.to_string(),
            }),
        None if options.inherit_stdio => Ok(Stdio::inherit()),
        None => Ok(Stdio::piped()),
    }
}

async fn attempt(
    command: &str,
    args: &[String],
    options: &ExecOptions,
) -> Result<Attempt, ExecError> {
    let mut cmd = Command::new(command);
    cmd.args(args).envs(options.env.iter().map(|(k, v)| (k, v)));

    if let Some(cwd) = &options.cwd {
        // A missing cwd would also surface as NotFound from spawn
        if !cwd.is_dir() {
            return Err(ExecError::Io {
                path: cwd.clone(),
                error: "working directory does not exist".to_string(),
            });
        }
        cmd.current_dir(cwd);
    }

    cmd.stdin(open_stdin(options)?)
        .stdout(open_stdout(options)?)
        .stderr(if options.inherit_stdio {
            Stdio::inherit()
        } else {
            Stdio::piped()
        })
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Attempt::NotFound),
        Err(e) => {
            return Err(ExecError::Spawn {
                command: command.to_string(),
                error: e.to_string(),
            })
        }
    };

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| ExecError::Spawn {
            command: command.to_string(),
            error: e.to_string(),
        })?;

    Ok(Attempt::Completed(ExecOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    }))
}

fn check(command: &str, output: ExecOutput) -> Result<ExecOutput, ExecError> {
    if output.status.success() {
        return Ok(output);
    }
    tracing::error!("error executing '{command}'");
    Err(ExecError::Failed {
        command: command.to_string(),
        status: describe_status(output.status),
        stderr: output.stderr.trim().to_string(),
    })
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit code {code}"),
        None => "signal".to_string(),
    }
}

/// Removes a fallback container that is still running when dropped
///
/// The `docker run` client is killed when its future is dropped, but the
/// container it started keeps running unless removed explicitly.
#[derive(Debug)]
struct ContainerGuard {
    name: String,
    env: Vec<(String, String)>,
    armed: bool,
}

impl ContainerGuard {
    fn new(name: String, env: Vec<(String, String)>) -> Self {
        Self {
            name,
            env,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for ContainerGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        tracing::debug!("removing container {}", self.name);
        let args = ["rm", "--force", self.name.as_str()];
        // Not awaited inside the runtime: tokio reaps the orphaned child
        let spawned = if tokio::runtime::Handle::try_current().is_ok() {
            Command::new("docker")
                .args(args)
                .envs(self.env.iter().map(|(k, v)| (k, v)))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .spawn()
                .map(drop)
        } else {
            std::process::Command::new("docker")
                .args(args)
                .envs(self.env.iter().map(|(k, v)| (k, v)))
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .map(drop)
        };
        if let Err(e) = spawned {
            tracing::warn!("failed to remove container {}: {e}", self.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[tokio::test]
    async fn test_local_success() {
        let output = run("echo", &strings(&["hello"]), &ExecOptions::new())
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_local_failure_is_not_retried() {
        let options = ExecOptions::new().with_image("image-that-is-never-used");
        let err = run("sh", &strings(&["-c", "echo boom >&2; exit 3"]), &options)
            .await
            .unwrap_err();
        match err {
            ExecError::Failed {
                command,
                status,
                stderr,
            } => {
                assert_eq!(command, "sh");
                assert_eq!(status, "exit code 3");
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_binary_without_image() {
        let err = run("cartesi-build-no-such-tool", &[], &ExecOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::CommandNotFound { command } if command == "cartesi-build-no-such-tool"));
    }

    #[tokio::test]
    async fn test_force_docker_without_image() {
        let err = run("echo", &[], &ExecOptions::new().force_docker(true))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::CommandNotFound { .. }));
    }

    #[tokio::test]
    async fn test_stdin_and_stdout_redirection() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, "payload").unwrap();

        let options = ExecOptions::new()
            .with_cwd(dir.path())
            .with_stdin(&input)
            .with_stdout(&output);
        run("cat", &[], &options).await.unwrap();

        assert_eq!(std::fs::read_to_string(output).unwrap(), "payload");
    }

    #[tokio::test]
    async fn test_missing_cwd() {
        let options = ExecOptions::new().with_cwd("/nonexistent/cartesi-build");
        let err = run("true", &[], &options).await.unwrap_err();
        assert!(matches!(err, ExecError::Io { .. }));
    }

    #[test]
    fn test_container_args() {
        let dir = TempDir::new().unwrap();
        let cwd = std::fs::canonicalize(dir.path()).unwrap();
        let options = ExecOptions::new().with_cwd(dir.path());
        let args = container_args(
            "cartesi-build-test",
            "xgenext2fs",
            &strings(&["--faketime", "root.ext2"]),
            "cartesi/sdk:test",
            &options,
        )
        .unwrap();

        assert_eq!(
            &args[..9],
            &strings(&[
                "run",
                "--rm",
                "--name",
                "cartesi-build-test",
                "--volume",
                &format!("{}:/work", cwd.display()),
                "--workdir",
                "/work",
                "--interactive",
            ])[..]
        );
        #[cfg(unix)]
        assert_eq!(args[9], "--user");
        assert_eq!(
            &args[args.len() - 4..],
            &strings(&["cartesi/sdk:test", "xgenext2fs", "--faketime", "root.ext2"])[..]
        );
    }

    /// Directory holding a `docker` that prints its arguments and exits
    /// with `code`, placed first on the returned PATH
    #[cfg(unix)]
    fn fake_docker(dir: &Path, code: i32) -> String {
        use std::os::unix::fs::PermissionsExt;
        let bin = dir.join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let script = bin.join("docker");
        std::fs::write(&script, format!("#!/bin/sh\necho \"$@\"\nexit {code}\n")).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        format!(
            "{}:{}",
            bin.display(),
            std::env::var("PATH").unwrap_or_default()
        )
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_binary_falls_back_to_container() {
        let dir = TempDir::new().unwrap();
        let options = ExecOptions::new()
            .with_cwd(dir.path())
            .with_image("cartesi/sdk:test")
            .with_env("PATH", fake_docker(dir.path(), 0));

        let output = run(
            "cartesi-build-no-such-tool",
            &strings(&["--block-size", "4096", "out.ext2"]),
            &options,
        )
        .await
        .unwrap();

        let stdout = output.stdout.trim();
        assert!(stdout.starts_with("run --rm --name cartesi-build-"), "{stdout}");
        assert!(
            stdout.ends_with("cartesi/sdk:test cartesi-build-no-such-tool --block-size 4096 out.ext2"),
            "{stdout}"
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_force_docker_skips_host_binary() {
        let dir = TempDir::new().unwrap();
        let options = ExecOptions::new()
            .with_cwd(dir.path())
            .with_image("cartesi/sdk:test")
            .force_docker(true)
            .with_env("PATH", fake_docker(dir.path(), 0));

        let output = run("echo", &strings(&["hello"]), &options).await.unwrap();

        let stdout = output.stdout.trim();
        assert_ne!(stdout, "hello");
        assert!(stdout.starts_with("run --rm"), "{stdout}");
        assert!(stdout.ends_with("cartesi/sdk:test echo hello"), "{stdout}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_container_failure_reports_tool() {
        let dir = TempDir::new().unwrap();
        let options = ExecOptions::new()
            .with_cwd(dir.path())
            .with_image("cartesi/sdk:test")
            .with_env("PATH", fake_docker(dir.path(), 4));

        let err = run("cartesi-build-no-such-tool", &[], &options)
            .await
            .unwrap_err();

        match err {
            ExecError::Failed {
                command, status, ..
            } => {
                assert_eq!(command, "cartesi-build-no-such-tool");
                assert_eq!(status, "exit code 4");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_container_guard_does_not_block_runtime() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let dir = TempDir::new().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let marker = dir.path().join("removed");
        let script = bin.join("docker");
        std::fs::write(
            &script,
            format!("#!/bin/sh\nsleep 2\necho \"$@\" > {}\n", marker.display()),
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        let path = format!(
            "{}:{}",
            bin.display(),
            std::env::var("PATH").unwrap_or_default()
        );

        let start = Instant::now();
        drop(ContainerGuard::new(
            "cartesi-build-guard".to_string(),
            vec![("PATH".to_string(), path)],
        ));
        assert!(start.elapsed() < Duration::from_secs(1));

        let deadline = Instant::now() + Duration::from_secs(10);
        while !marker.exists() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(
            std::fs::read_to_string(&marker).unwrap().trim(),
            "rm --force cartesi-build-guard"
        );
    }

    #[test]
    fn test_container_names_are_unique() {
        assert_ne!(container_name(), container_name());
    }
}
