use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    println!("memsock {}", env!("CARGO_PKG_VERSION"));
    if args.extended {
        println!("target_os: {}", std::env::consts::OS);
        println!("target_arch: {}", std::env::consts::ARCH);
        println!("pointer_width: {}", usize::BITS);
        println!(
            "features: codec={}, registry={}, cli=true",
            cfg!(feature = "codec"),
            cfg!(feature = "registry")
        );
        println!("max_ring_capacity: {}", memsock_channel::MAX_CAPACITY);
    }
    Ok(SUCCESS)
}
