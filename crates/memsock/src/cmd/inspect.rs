use memsock_channel::Channel;

use crate::cmd::InspectArgs;
use crate::exit::{channel_error, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{print_inspection, OutputFormat};

pub fn run(args: InspectArgs, format: OutputFormat) -> CliResult<i32> {
    let inspection = Channel::inspect(&args.path, args.sc_capacity)
        .map_err(|err| channel_error("inspect failed", err))?;
    print_inspection(&inspection, format);

    let snapshot = &inspection.snapshot;
    if snapshot.server_to_client.is_corrupt() || snapshot.client_to_server.is_corrupt() {
        tracing::warn!(path = ?args.path, "control block has out-of-range heads");
        return Ok(DATA_INVALID);
    }
    Ok(SUCCESS)
}
