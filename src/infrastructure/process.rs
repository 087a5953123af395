#[cfg(test)]
#[path = "process_test.rs"]
mod tests;

use std::io;
use std::process;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use tokio::io::AsyncRead;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;

/// Time allowed to drain stdout and stderr once the process group is gone.
/// A descendant that left the group and kept the pipes open must not stall
/// the caller.
const IO_CAPTURE_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
    pub duration: Duration,
}

/// The child runs as the leader of its own process group. Dropping this
/// kills the whole group, so nothing the child started outlives the run,
/// whichever way `run` returns.
struct ProcessGroup {
    pgid: Option<u32>,
}

#[cfg(unix)]
fn kill_group(pgid: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::killpg;
    use nix::sys::signal::Signal;
    use nix::unistd::Pid;

    if let Err(err) = killpg(Pid::from_raw(pgid as i32), Signal::SIGKILL) {
        if err != Errno::ESRCH {
            tracing::warn!(pgid, error = %err, "Failed to kill process group");
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pgid: u32) {}

impl ProcessGroup {
    fn kill(&self) {
        if let Some(pgid) = self.pgid {
            kill_group(pgid);
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Output of one stream, collected as it arrives so a capture that has to
/// be abandoned still returns what was read up to then.
struct Capture {
    stream: &'static str,
    buffer: Arc<Mutex<Vec<u8>>>,
    task: Option<JoinHandle<io::Result<()>>>,
}

async fn stream_into<R: AsyncRead + Unpin>(
    mut reader: R,
    buffer: Arc<Mutex<Vec<u8>>>,
    max_bytes: usize,
) -> io::Result<()> {
    let mut chunk = [0u8; 8192];
    let mut truncated = false;

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }

        let mut buf = buffer.lock().await;
        let remaining = max_bytes.saturating_sub(buf.len());
        if n > remaining && !truncated {
            truncated = true;
            tracing::warn!(max_bytes, "Output exceeded limit, truncating");
        }
        buf.extend_from_slice(&chunk[..n.min(remaining)]);
    }
}

impl Capture {
    fn start<R>(stream: &'static str, reader: Option<R>) -> Capture
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buffer = Arc::new(Mutex::new(Vec::with_capacity(8192)));
        let task = reader.map(|reader| {
            return tokio::spawn(stream_into(reader, buffer.clone(), MAX_OUTPUT_BYTES));
        });

        return Capture {
            stream,
            buffer,
            task,
        };
    }

    async fn finish(self) -> String {
        if let Some(mut task) = self.task {
            match timeout(IO_CAPTURE_TIMEOUT, &mut task).await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(err))) => {
                    tracing::warn!(stream = self.stream, error = %err, "Output capture failed");
                }
                Ok(Err(err)) => {
                    tracing::warn!(stream = self.stream, error = %err, "Output capture task panicked");
                }
                Err(_) => {
                    tracing::warn!(stream = self.stream, "Output capture timed out, keeping partial output");
                    task.abort();
                }
            }
        }

        let buf = self.buffer.lock().await;
        return String::from_utf8_lossy(&buf).to_string();
    }
}

/// Spawns `cmd` with piped output and waits at most `limit` for it. On
/// timeout the process and everything it started are killed, and whatever
/// was printed so far is kept. Errors only come from starting or waiting on
/// the process.
pub async fn run(mut cmd: process::Command, limit: Duration) -> io::Result<ProcessOutput> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let mut cmd = Command::from(cmd);
    cmd.kill_on_drop(true);

    let start = Instant::now();
    let mut child = cmd.spawn()?;
    let group = ProcessGroup { pgid: child.id() };
    tracing::debug!(pid = ?child.id(), "Spawned process");

    let stdout = Capture::start("stdout", child.stdout.take());
    let stderr = Capture::start("stderr", child.stderr.take());

    let mut exit_code = None;
    let mut timed_out = false;
    match timeout(limit, child.wait()).await {
        Ok(status) => {
            exit_code = status?.code();
        }
        Err(_) => {
            timed_out = true;
            tracing::warn!(timeout_secs = limit.as_secs_f64(), "Process timed out, killing");
        }
    }

    // Descendants still holding the pipes would keep the captures open.
    group.kill();
    if timed_out {
        if let Err(err) = child.kill().await {
            tracing::error!(error = %err, "Failed to kill timed out process");
        }
    }
    let duration = start.elapsed();

    let (stdout, stderr) = tokio::join!(stdout.finish(), stderr.finish());
    return Ok(ProcessOutput {
        exit_code,
        stdout,
        stderr,
        timed_out,
        duration,
    });
}
