use std::fs;

use memsock_channel::{poll, Channel, Role};
use serde::Serialize;

use crate::cmd::SendArgs;
use crate::exit::{channel_error, io_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct SendOutput {
    path: String,
    role: &'static str,
    direction: &'static str,
    bytes: usize,
}

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let role = Role::from(args.role);
    let mut channel = Channel::open(&args.path, args.capacities.config(), role)
        .map_err(|err| channel_error("open failed", err))?;

    poll::write_all(&mut channel, &payload, Some(args.timeout))
        .map_err(|err| channel_error("send failed", err))?;
    tracing::info!(bytes = payload.len(), %role, "payload written");

    let output = SendOutput {
        path: channel.path().display().to_string(),
        role: role.as_str(),
        direction: role.outbound().as_str(),
        bytes: payload.len(),
    };
    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => print_fields(&[
            ("path", output.path.clone()),
            ("role", output.role.to_string()),
            ("direction", output.direction.to_string()),
            ("bytes", output.bytes.to_string()),
        ]),
        OutputFormat::Pretty => println!(
            "sent {} bytes {} on {}",
            output.bytes, output.direction, output.path
        ),
        OutputFormat::Raw => println!("{}", output.bytes),
    }
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    match &args.file {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        None => Ok(Vec::new()),
    }
}
