use super::{ExecOpts, ExecutorError, OutputStream};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::*;

/// Spawns `cmd`, forwards its output line by line to the streams in `opts`, and waits for it to
/// finish. The child is killed if `cancel` fires first.
///
#[tracing::instrument(name = "process::run", skip(cmd, opts, cancel), fields(name = opts.name()))]
pub(crate) async fn run(
    mut cmd: Command,
    program: &str,
    opts: &ExecOpts,
    cancel: &CancellationToken,
) -> Result<(), ExecutorError> {
    if cancel.is_cancelled() {
        return Err(ExecutorError::Cancelled {
            name: opts.name().to_string(),
        });
    }

    cmd.stdin(Stdio::null())
        .stdout(stdio_for(opts.stdout()))
        .stderr(stdio_for(opts.stderr()))
        .kill_on_drop(true);

    let mut child = cmd.spawn().map_err(|err| ExecutorError::CouldNotSpawn {
        name: opts.name().to_string(),
        program: program.to_string(),
        err,
    })?;

    let stdout = child
        .stdout
        .take()
        .map(|out| tokio::spawn(forward(out, opts.stdout().clone())));
    let stderr = child
        .stderr
        .take()
        .map(|err| tokio::spawn(forward(err, opts.stderr().clone())));

    let status = tokio::select! {
        status = child.wait() => status.map_err(|err| ExecutorError::Io {
            name: opts.name().to_string(),
            err,
        })?,
        _ = cancel.cancelled() => {
            debug!("Killing {} after cancellation", opts.name());
            let _ = child.kill().await;
            return Err(ExecutorError::Cancelled {
                name: opts.name().to_string(),
            });
        }
    };

    for forwarder in [stdout, stderr].into_iter().flatten() {
        let _ = forwarder.await;
    }

    if status.success() {
        Ok(())
    } else {
        Err(ExecutorError::NonZeroExit {
            name: opts.name().to_string(),
            code: status.code(),
        })
    }
}

fn stdio_for(stream: &OutputStream) -> Stdio {
    if stream.is_null() {
        Stdio::null()
    } else {
        Stdio::piped()
    }
}

async fn forward<R>(reader: R, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        stream.write_line(&line);
    }
}
