use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memsock_channel::{poll, Backoff, Channel, ChannelError, Role};

use crate::cmd::EchoArgs;
use crate::exit::{channel_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::OutputFormat;

/// How long a blocked echo write waits before rechecking for shutdown.
const WRITE_SLICE: Duration = Duration::from_millis(100);

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let mut channel = Channel::open(&args.path, args.capacities.config(), Role::Server)
        .map_err(|err| channel_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    tracing::info!(path = ?args.path, "echoing client bytes");
    let mut buf = vec![0u8; channel.capacity(Role::Server.inbound()) as usize];
    let mut echoed: u64 = 0;
    let mut backoff = Backoff::new();

    while running.load(Ordering::SeqCst) && args.limit.is_none_or(|limit| echoed < limit) {
        let n = channel.read(&mut buf);
        if n == 0 {
            backoff.snooze();
            continue;
        }
        backoff.reset();

        let mut sent = 0;
        while sent < n {
            match poll::write_all(&mut channel, &buf[sent..n], Some(WRITE_SLICE)) {
                Ok(()) => sent = n,
                Err(ChannelError::Timeout { transferred, .. }) => {
                    sent += transferred;
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                }
                Err(err) => return Err(channel_error("echo failed", err)),
            }
        }
        echoed += sent as u64;
        tracing::debug!(bytes = sent, total = echoed, "echoed");
    }

    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;
    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
