use std::io::{IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use memsock_channel::{DirectionStatus, Inspection};
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Two-column FIELD/VALUE table.
pub fn print_fields(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value.clone()]);
    }
    println!("{table}");
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

pub fn payload_preview(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => format!("<binary {} bytes>", payload.len()),
    }
}

#[derive(Debug, Serialize)]
pub struct DirectionOutput {
    pub direction: &'static str,
    pub capacity: u32,
    pub read_head: u32,
    pub read_lap: bool,
    pub write_head: u32,
    pub write_lap: bool,
    pub full: bool,
    pub empty: bool,
    pub mirror_full: bool,
    pub mirror_empty: bool,
    pub pending: u32,
    pub corrupt: bool,
}

impl From<&DirectionStatus> for DirectionOutput {
    fn from(status: &DirectionStatus) -> Self {
        Self {
            direction: status.direction.as_str(),
            capacity: status.capacity,
            read_head: status.read.offset(),
            read_lap: status.read.lap(),
            write_head: status.write.offset(),
            write_lap: status.write.lap(),
            full: status.is_full(),
            empty: status.is_empty(),
            mirror_full: status.mirror_full,
            mirror_empty: status.mirror_empty,
            pending: if status.is_corrupt() { 0 } else { status.pending() },
            corrupt: status.is_corrupt(),
        }
    }
}

#[derive(Debug, Serialize)]
struct InspectOutput {
    path: String,
    file_len: u64,
    mapped_len: usize,
    directions: Vec<DirectionOutput>,
}

pub fn print_inspection(inspection: &Inspection, format: OutputFormat) {
    let directions: Vec<DirectionOutput> = [
        &inspection.snapshot.server_to_client,
        &inspection.snapshot.client_to_server,
    ]
    .into_iter()
    .map(DirectionOutput::from)
    .collect();

    match format {
        OutputFormat::Json => print_json(&InspectOutput {
            path: inspection.path.display().to_string(),
            file_len: inspection.file_len,
            mapped_len: inspection.layout.total_len(),
            directions,
        }),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec![
                    "DIRECTION", "CAPACITY", "READ", "WRITE", "STATE", "MIRROR", "PENDING",
                ]);
            for d in &directions {
                table.add_row(vec![
                    d.direction.to_string(),
                    d.capacity.to_string(),
                    head_text(d.read_head, d.read_lap),
                    head_text(d.write_head, d.write_lap),
                    state_text(d.full, d.empty, d.corrupt).to_string(),
                    state_text(d.mirror_full, d.mirror_empty, false).to_string(),
                    d.pending.to_string(),
                ]);
            }
            println!("{}", inspection.path.display());
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} ({} bytes)",
                inspection.path.display(),
                inspection.file_len
            );
            for d in &directions {
                println!(
                    "  {:<17} cap={} read={} write={} state={} mirror={} pending={}",
                    d.direction,
                    d.capacity,
                    head_text(d.read_head, d.read_lap),
                    head_text(d.write_head, d.write_lap),
                    state_text(d.full, d.empty, d.corrupt),
                    state_text(d.mirror_full, d.mirror_empty, false),
                    d.pending
                );
            }
        }
        OutputFormat::Raw => {
            for d in &directions {
                println!("{} {}", d.direction, d.pending);
            }
        }
    }
}

fn head_text(offset: u32, lap: bool) -> String {
    format!("{offset}/{}", u8::from(lap))
}

fn state_text(full: bool, empty: bool, corrupt: bool) -> &'static str {
    match (corrupt, full, empty) {
        (true, _, _) => "corrupt",
        (false, true, true) => "invalid",
        (false, true, false) => "full",
        (false, false, true) => "empty",
        (false, false, false) => "partial",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memsock_channel::{Direction, Head};

    #[test]
    fn direction_output_derives_state_from_heads() {
        let status = DirectionStatus {
            direction: Direction::ServerToClient,
            capacity: 8,
            read: Head::new(3, false),
            write: Head::new(3, true),
            mirror_full: true,
            mirror_empty: false,
        };
        let out = DirectionOutput::from(&status);
        assert!(out.full && !out.empty);
        assert_eq!(out.pending, 8);
        assert_eq!(out.direction, "server-to-client");
        let json = serde_json::to_string(&out).expect("direction output should serialize");
        assert!(json.contains("\"write_lap\":true"));
    }

    #[test]
    fn state_text_never_reports_both() {
        assert_eq!(state_text(true, false, false), "full");
        assert_eq!(state_text(false, true, false), "empty");
        assert_eq!(state_text(true, true, false), "invalid");
        assert_eq!(state_text(false, false, true), "corrupt");
    }
}
