//! Child process with stdout and stderr merged into one line stream.
//!
//! Both standard streams of the child share a single OS pipe, so lines arrive in
//! the order the child wrote them. The read end is drained on a blocking thread
//! and forwarded over a channel as each line completes.

use super::toolchain::Invocation;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{debug, trace};

pub struct MergedChild {
    child: Child,
    lines: UnboundedReceiver<String>,
}

impl MergedChild {
    pub fn spawn(inv: &Invocation, cwd: &Path) -> std::io::Result<Self> {
        let (reader, writer) = os_pipe::pipe()?;
        let writer_err = writer.try_clone()?;

        let mut cmd = Command::new(&inv.program);
        cmd.args(&inv.args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(writer)
            .stderr(writer_err)
            .kill_on_drop(true);
        let child = cmd.spawn()?;
        // Our copies of the write end must close, or the reader never sees EOF.
        drop(cmd);
        debug!(cmd = %inv.display(), pid = ?child.id(), "spawned");

        let (tx, lines) = mpsc::unbounded_channel();
        tokio::task::spawn_blocking(move || {
            let mut reader = BufReader::new(reader);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf) {
                    Ok(0) => break,
                    Ok(_) => {
                        if buf.ends_with(b"\n") {
                            buf.pop();
                            if buf.ends_with(b"\r") {
                                buf.pop();
                            }
                        }
                        if tx.send(String::from_utf8_lossy(&buf).into_owned()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                    Err(e) => {
                        trace!("output pipe read failed: {e}");
                        break;
                    }
                }
            }
        });

        Ok(Self { child, lines })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Next complete output line, or `None` once every writer has closed the pipe.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcibly kill the child and reap it.
    pub async fn kill(&mut self) -> std::io::Result<ExitStatus> {
        if let Err(e) = self.child.start_kill() {
            // Already exited and reaped: report that status instead of failing.
            if let Ok(Some(status)) = self.child.try_wait() {
                return Ok(status);
            }
            return Err(e);
        }
        self.child.wait().await
    }
}
