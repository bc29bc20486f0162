use memsock_channel::{Channel, ChannelConfig, Direction, Role};
use serde::Serialize;

use crate::cmd::CreateArgs;
use crate::exit::{channel_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Debug, Serialize)]
struct CreateOutput {
    path: String,
    sc_capacity: u32,
    cs_capacity: u32,
    file_len: usize,
    mode: String,
}

pub fn run(args: CreateArgs, format: OutputFormat) -> CliResult<i32> {
    let config = ChannelConfig {
        file_mode: args.mode,
        ..args.capacities.config()
    };
    // The creating process only initializes; peers join with send/recv/echo.
    let channel = Channel::create(&args.path, config, Role::Server)
        .map_err(|err| channel_error("create failed", err))?;

    let output = CreateOutput {
        path: channel.path().display().to_string(),
        sc_capacity: channel.capacity(Direction::ServerToClient),
        cs_capacity: channel.capacity(Direction::ClientToServer),
        file_len: channel.mapped_len(),
        mode: format!("{:o}", args.mode),
    };
    channel
        .close()
        .map_err(|err| channel_error("close failed", err))?;

    match format {
        OutputFormat::Json => print_json(&output),
        OutputFormat::Table => print_fields(&[
            ("path", output.path.clone()),
            ("sc_capacity", output.sc_capacity.to_string()),
            ("cs_capacity", output.cs_capacity.to_string()),
            ("file_len", output.file_len.to_string()),
            ("mode", output.mode.clone()),
        ]),
        OutputFormat::Pretty => println!(
            "created {} (sc={} cs={} bytes, mode {})",
            output.path, output.sc_capacity, output.cs_capacity, output.mode
        ),
        OutputFormat::Raw => println!("{}", output.path),
    }
    Ok(SUCCESS)
}
