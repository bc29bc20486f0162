use memsock_channel::{poll, Channel, Role};
use serde::Serialize;

use crate::cmd::{usage, RecvArgs};
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{payload_preview, print_fields, print_json, print_raw, OutputFormat};

#[derive(Debug, Serialize)]
struct RecvOutput {
    path: String,
    role: &'static str,
    direction: &'static str,
    bytes: usize,
    payload: String,
}

pub fn run(args: RecvArgs, format: OutputFormat) -> CliResult<i32> {
    if args.bytes == Some(0) {
        return Err(usage("--bytes must be greater than zero"));
    }
    let role = Role::from(args.role);
    let mut channel = Channel::open(&args.path, args.capacities.config(), role)
        .map_err(|err| channel_error("open failed", err))?;

    let data = match args.bytes {
        Some(n) => {
            let mut buf = vec![0u8; n];
            poll::read_exact(&mut channel, &mut buf, Some(args.timeout))
                .map_err(|err| channel_error("receive failed", err))?;
            buf
        }
        None => {
            let mut buf = vec![0u8; channel.capacity(role.inbound()) as usize];
            let mut filled = poll::read_some(&mut channel, &mut buf, Some(args.timeout))
                .map_err(|err| channel_error("receive failed", err))?;
            // The writer may have published more behind a wrap; take it too.
            while filled < buf.len() {
                let n = channel.read(&mut buf[filled..]);
                if n == 0 {
                    break;
                }
                filled += n;
            }
            buf.truncate(filled);
            buf
        }
    };
    tracing::info!(bytes = data.len(), %role, "payload read");

    let output = RecvOutput {
        path: channel.path().display().to_string(),
        role: role.as_str(),
        direction: role.inbound().as_str(),
        bytes: data.len(),
        payload: payload_preview(&data),
    };
    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => print_fields(&[
            ("direction", output.direction.to_string()),
            ("bytes", output.bytes.to_string()),
            ("payload", output.payload.clone()),
        ]),
        OutputFormat::Pretty => println!(
            "received {} bytes {}: {}",
            output.bytes, output.direction, output.payload
        ),
        OutputFormat::Raw => print_raw(&data),
    }
    Ok(SUCCESS)
}
