//! Two threads exchange tagged values over one channel file.
//!
//! Run with:
//!   cargo run --example tagged-ping --features codec

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use memsock::channel::{read_exact, write_all, Channel, ChannelConfig, Role};
use memsock::codec::{CodecRegistry, StringCodec};

const PING: u8 = 1;

fn codecs() -> Result<CodecRegistry, Box<dyn std::error::Error>> {
    let mut codecs = CodecRegistry::new();
    codecs.register::<String, _>(PING, StringCodec)?;
    Ok(codecs)
}

/// Values are sent as `u32 LE length ‖ tagged value` so the reader knows how
/// much to wait for.
fn send(channel: &mut Channel, codecs: &CodecRegistry, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut body = BytesMut::new();
    codecs.encode(&text.to_string(), &mut body)?;
    let timeout = Some(Duration::from_secs(5));
    write_all(channel, &(body.len() as u32).to_le_bytes(), timeout)?;
    write_all(channel, &body, timeout)?;
    Ok(())
}

fn recv(channel: &mut Channel, codecs: &CodecRegistry) -> Result<String, Box<dyn std::error::Error>> {
    let timeout = Some(Duration::from_secs(5));
    let mut len = [0u8; 4];
    read_exact(channel, &mut len, timeout)?;
    let mut body = vec![0u8; u32::from_le_bytes(len) as usize];
    read_exact(channel, &mut body, timeout)?;
    Ok(codecs.decode_as::<String>(&mut Bytes::from(body))?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::temp_dir().join(format!("memsock-ping-{}.memsock", std::process::id()));
    let config = ChannelConfig::with_capacities(64, 64);

    let mut server = Channel::create(&path, config, Role::Server)?;
    let mut client = Channel::open(&path, config, Role::Client)?;

    let responder = std::thread::spawn(move || -> Result<(), String> {
        let codecs = codecs().map_err(|e| e.to_string())?;
        for _ in 0..3 {
            let text = recv(&mut server, &codecs).map_err(|e| e.to_string())?;
            send(&mut server, &codecs, &format!("pong: {text}")).map_err(|e| e.to_string())?;
        }
        Ok(())
    });

    let codecs = codecs()?;
    for i in 0..3 {
        send(&mut client, &codecs, &format!("ping {i}"))?;
        println!("{}", recv(&mut client, &codecs)?);
    }

    responder
        .join()
        .map_err(|_| "responder panicked")?
        .map_err(|e| format!("responder failed: {e}"))?;
    std::fs::remove_file(&path)?;
    Ok(())
}
