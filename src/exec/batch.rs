//! Non-interactive execution with captured output.
use super::{exit_code, RawOutput, POLL_INTERVAL};
use crate::env::ChildEnv;
use anyhow::{anyhow, Context, Result};
use std::io::{Read, Write};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Run `argv` to completion, feeding `stdin` when given.
///
/// Output pipes are drained on background threads so a chatty child never
/// blocks on a full pipe. The child leads its own process group; with a
/// `timeout`, the whole group is killed once the wall-clock bound passes and
/// the result is marked `timed_out`.
pub fn run(
    argv: &[String],
    cwd: &Path,
    env: &ChildEnv,
    stdin: Option<&[u8]>,
    timeout: Option<Duration>,
) -> Result<RawOutput> {
    let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty argv"))?;
    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .env_clear()
        .envs(env.iter())
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0);

    let start = Instant::now();
    let mut child = cmd.spawn().with_context(|| format!("spawn {program}"))?;

    let stdout_reader = child.stdout.take().map(spawn_reader);
    let stderr_reader = child.stderr.take().map(spawn_reader);

    if let (Some(payload), Some(mut handle)) = (stdin, child.stdin.take()) {
        // A child that exits without reading its input closes the pipe early.
        if let Err(err) = handle.write_all(payload) {
            if err.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(err).context("write child stdin");
            }
        }
    }

    let mut timed_out = false;
    let status = loop {
        if let Some(status) = child.try_wait().context("check child status")? {
            break status;
        }
        if timeout.is_some_and(|limit| start.elapsed() > limit) {
            timed_out = true;
            tracing::warn!(program = %program, "batch execution timed out; killing child");
            kill_group(child.id());
            if let Err(err) = child.kill() {
                tracing::debug!(error = %err, "kill after timeout failed");
            }
            break child.wait().context("wait for killed child")?;
        }
        thread::sleep(POLL_INTERVAL);
    };
    let duration_ms = start.elapsed().as_millis();

    let stdout = join_reader(stdout_reader)?;
    let stderr = join_reader(stderr_reader)?;
    Ok(RawOutput {
        exit_code: exit_code(status),
        duration_ms,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
        timed_out,
    })
}

/// SIGKILL the child's process group so helpers it spawned release the pipes.
fn kill_group(pid: u32) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: signalling a process group we created; failure is harmless.
    unsafe {
        libc::kill(-pid, libc::SIGKILL);
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut source: R) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join_reader(handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>) -> Result<Vec<u8>> {
    let Some(handle) = handle else {
        return Ok(Vec::new());
    };
    handle
        .join()
        .map_err(|_| anyhow!("output reader panicked"))?
        .context("read child output")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".to_string(), "-c".to_string(), script.to_string()]
    }

    fn path_env() -> ChildEnv {
        let mut env = ChildEnv::default();
        env.set("PATH", "/usr/bin:/bin");
        env
    }

    #[test]
    fn captures_both_streams_and_exit_code() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run(
            &sh("echo out; echo err >&2; exit 3"),
            temp.path(),
            &path_env(),
            None,
            None,
        )
        .expect("run");
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
        assert_eq!(output.exit_code, 3);
        assert!(!output.timed_out);
    }

    #[test]
    fn feeds_stdin_payload() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run(
            &sh("read answer; echo \"got $answer\""),
            temp.path(),
            &path_env(),
            Some(b"y\n"),
            None,
        )
        .expect("run");
        assert_eq!(output.stdout, "got y\n");
    }

    #[test]
    fn child_sees_only_the_composed_environment() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut env = path_env();
        env.set("E2E_MARKER", "present");
        let output = run(
            &sh("echo \"$E2E_MARKER:${CARGO_PKG_NAME:-unset}\"; pwd"),
            temp.path(),
            &env,
            None,
            None,
        )
        .expect("run");
        let mut lines = output.stdout.lines();
        assert_eq!(lines.next(), Some("present:unset"));
        let cwd = std::fs::canonicalize(temp.path()).expect("canonicalize");
        assert_eq!(lines.next().map(std::path::PathBuf::from), Some(cwd));
    }

    #[test]
    fn timeout_kills_the_child() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run(
            &sh("sleep 30"),
            temp.path(),
            &path_env(),
            None,
            Some(Duration::from_millis(200)),
        )
        .expect("run");
        assert!(output.timed_out);
        assert_eq!(output.exit_code, 128 + libc::SIGKILL);
        assert!(output.duration_ms < 10_000);
    }

    #[test]
    fn large_output_does_not_deadlock() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run(
            &sh("i=0; while [ $i -lt 20000 ]; do echo line-$i; i=$((i+1)); done"),
            temp.path(),
            &path_env(),
            None,
            Some(Duration::from_secs(60)),
        )
        .expect("run");
        assert_eq!(output.exit_code, 0);
        assert_eq!(output.stdout.lines().count(), 20_000);
    }
}
