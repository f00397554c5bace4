//! Interactive execution through a pseudo-terminal.
//!
//! The child runs as a session leader with the subordinate side as its
//! controlling terminal, so line-discipline input such as `^C` reaches it the
//! way it would from a real keyboard.
use super::{exit_code, InteractiveScript, RawOutput, POLL_INTERVAL};
use crate::env::ChildEnv;
use anyhow::{anyhow, Context, Result};
use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};
use std::ptr;
use std::thread;
use std::time::{Duration, Instant};

/// How long a single wait on the controller side may block.
const READ_POLL: Duration = Duration::from_millis(200);

/// Run `argv` attached to a fresh pseudo-terminal and drive it with `script`.
///
/// All output (stdout and stderr share the terminal) lands in `stdout`. Once
/// the script's deadline passes the child receives SIGTERM, and SIGKILL if it
/// is still alive after the grace period.
pub fn run(
    argv: &[String],
    cwd: &Path,
    env: &ChildEnv,
    script: &InteractiveScript,
) -> Result<RawOutput> {
    let (program, args) = argv.split_first().ok_or_else(|| anyhow!("empty argv"))?;
    let (controller, subordinate) = open_pty()?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .env_clear()
        .envs(env.iter())
        .stdin(Stdio::from(subordinate.try_clone().context("dup pty stdin")?))
        .stdout(Stdio::from(subordinate.try_clone().context("dup pty stdout")?))
        .stderr(Stdio::from(subordinate));
    // SAFETY: only async-signal-safe calls run between fork and exec.
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(io::Error::last_os_error());
            }
            if libc::ioctl(0, libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let start = Instant::now();
    let mut child = cmd.spawn().with_context(|| format!("spawn {program} on pty"))?;
    // The parent must not keep the subordinate side open or EOF never arrives.
    drop(cmd);

    let mut controller = File::from(controller);
    let fd = controller.as_raw_fd();
    let mut output = Vec::new();
    let mut sent = false;
    let mut closed = false;
    let mut timed_out = false;
    let mut terminated_at: Option<Instant> = None;
    let mut killed = false;

    let status = loop {
        if !sent && start.elapsed() >= script.send_after {
            sent = true;
            if let Err(err) = controller.write_all(&script.payload) {
                tracing::debug!(error = %err, "pty input not delivered");
            }
        }

        if closed {
            thread::sleep(POLL_INTERVAL);
        } else if wait_readable(fd, READ_POLL)? {
            closed = read_chunk(&mut controller, &mut output)?;
        }

        if let Some(status) = child.try_wait().context("check pty child status")? {
            break status;
        }

        if terminated_at.is_none() && start.elapsed() > script.deadline {
            timed_out = true;
            tracing::warn!(program = %program, "interactive deadline passed; terminating child");
            signal(child.id(), libc::SIGTERM);
            terminated_at = Some(Instant::now());
        }
        if !killed && terminated_at.is_some_and(|at| at.elapsed() > script.grace) {
            killed = true;
            if let Err(err) = child.kill() {
                tracing::debug!(error = %err, "kill after timeout failed");
            }
        }
    };

    while !closed && wait_readable(fd, Duration::ZERO)? {
        closed = read_chunk(&mut controller, &mut output)?;
    }

    Ok(RawOutput {
        exit_code: exit_code(status),
        duration_ms: start.elapsed().as_millis(),
        stdout: String::from_utf8_lossy(&output).into_owned(),
        stderr: String::new(),
        timed_out,
    })
}

fn open_pty() -> Result<(OwnedFd, OwnedFd)> {
    let mut controller: libc::c_int = -1;
    let mut subordinate: libc::c_int = -1;
    // SAFETY: out-pointers are valid; name, termios and winsize are optional.
    let rc = unsafe {
        libc::openpty(
            &mut controller,
            &mut subordinate,
            ptr::null_mut(),
            ptr::null_mut(),
            ptr::null_mut(),
        )
    };
    if rc != 0 {
        return Err(io::Error::last_os_error()).context("openpty");
    }
    // SAFETY: openpty succeeded, so both descriptors are open and ours.
    let pair = unsafe {
        (
            OwnedFd::from_raw_fd(controller),
            OwnedFd::from_raw_fd(subordinate),
        )
    };
    set_cloexec(pair.0.as_raw_fd())?;
    set_cloexec(pair.1.as_raw_fd())?;
    Ok(pair)
}

fn set_cloexec(fd: RawFd) -> Result<()> {
    // SAFETY: fd is a valid open descriptor.
    let rc = unsafe { libc::fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC) };
    if rc == -1 {
        return Err(io::Error::last_os_error()).context("set FD_CLOEXEC on pty");
    }
    Ok(())
}

fn wait_readable(fd: RawFd, timeout: Duration) -> Result<bool> {
    let mut pollfd = libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
    // SAFETY: pollfd points at one initialized entry.
    let rc = unsafe { libc::poll(&mut pollfd, 1, millis) };
    if rc == -1 {
        let err = io::Error::last_os_error();
        if err.kind() == io::ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err).context("poll pty");
    }
    Ok(rc > 0)
}

/// Read one chunk; returns true once the terminal has been closed.
fn read_chunk(controller: &mut File, output: &mut Vec<u8>) -> Result<bool> {
    let mut buf = [0u8; 4096];
    match controller.read(&mut buf) {
        Ok(0) => Ok(true),
        Ok(n) => {
            output.extend_from_slice(&buf[..n]);
            Ok(false)
        }
        // Linux reports EIO once every subordinate descriptor is closed.
        Err(err) if err.raw_os_error() == Some(libc::EIO) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::Interrupted => Ok(false),
        Err(err) => Err(err).context("read pty"),
    }
}

fn signal(pid: u32, sig: libc::c_int) {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return;
    };
    // SAFETY: plain kill(2) on our own child.
    unsafe {
        libc::kill(pid, sig);
    }
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

    fn quick(payload: &[u8], send_after_ms: u64) -> InteractiveScript {
        InteractiveScript {
            payload: payload.to_vec(),
            send_after: Duration::from_millis(send_after_ms),
            deadline: Duration::from_secs(10),
            grace: Duration::from_secs(2),
        }
    }

    #[test]
    fn scripted_input_reaches_the_child() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run(
            &sh("read line; echo \"got:$line\""),
            temp.path(),
            &path_env(),
            &quick(b"hello\n", 100),
        )
        .expect("run");
        assert_eq!(output.exit_code, 0);
        assert!(output.stdout.contains("got:hello"), "{:?}", output.stdout);
        assert!(output.stderr.is_empty());
        assert!(!output.timed_out);
    }

    #[test]
    fn child_owns_a_controlling_terminal() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run(
            &sh("if [ -t 0 ] && [ -t 1 ]; then echo tty; else echo notty; fi"),
            temp.path(),
            &path_env(),
            &quick(b"", 0),
        )
        .expect("run");
        assert!(output.stdout.contains("tty"));
        assert!(!output.stdout.contains("notty"));
    }

    #[test]
    fn interrupt_byte_signals_the_foreground_job() {
        let temp = tempfile::tempdir().expect("tempdir");
        let output = run(
            &sh("sleep 30"),
            temp.path(),
            &path_env(),
            &quick(b"\x03", 300),
        )
        .expect("run");
        assert_eq!(output.exit_code, 130);
        assert!(!output.timed_out);
    }

    #[test]
    fn hard_deadline_escalates_to_kill() {
        let temp = tempfile::tempdir().expect("tempdir");
        let script = InteractiveScript {
            payload: Vec::new(),
            send_after: Duration::ZERO,
            deadline: Duration::from_millis(300),
            grace: Duration::from_millis(300),
        };
        let start = Instant::now();
        let output = run(
            &sh("trap '' TERM; exec sleep 30"),
            temp.path(),
            &path_env(),
            &script,
        )
        .expect("run");
        assert!(output.timed_out);
        assert_eq!(output.exit_code, 128 + libc::SIGKILL);
        assert!(start.elapsed() < Duration::from_secs(10));
    }
}
