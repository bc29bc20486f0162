use std::path::PathBuf;

use memsock_channel::{Channel, ChannelConfig, Role};
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{print_json, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
    Skip,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

impl CheckResult {
    fn new(name: &'static str, status: CheckStatus, detail: impl Into<String>) -> Self {
        Self {
            name,
            status,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(_args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let checks = vec![
        mmap_roundtrip_check(),
        capacity_env_check("MEMSOCK_SC_CAPACITY"),
        capacity_env_check("MEMSOCK_CS_CAPACITY"),
        compiled_features_check(),
    ];

    let failed = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        checks,
        overall: if failed { "fail" } else { "pass" },
    };
    print_doctor(&output, format);

    Ok(if failed { HEALTH_CHECK_FAILED } else { SUCCESS })
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("memsock doctor\n");
            for c in &output.checks {
                println!("  [{:>4}] {:<20} {}", status_text(c.status), c.name, c.detail);
            }
            let summary = if output.overall == "pass" {
                "all checks passed"
            } else {
                "one or more checks failed"
            };
            println!("\n  Result: {summary}");
        }
        OutputFormat::Raw => println!("{}", output.overall),
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
        CheckStatus::Skip => "SKIP",
    }
}

/// Create a small channel in the temp dir, join it, and move bytes both ways.
fn mmap_roundtrip_check() -> CheckResult {
    let path = PathBuf::from(format!(
        "{}/memsock-doctor-{}-{}.memsock",
        std::env::temp_dir().display(),
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default()
    ));
    let result = roundtrip(&path);
    let _ = std::fs::remove_file(&path);

    match result {
        Ok(()) => CheckResult::new(
            "mmap_roundtrip",
            CheckStatus::Pass,
            format!("shared mapping in {} works", std::env::temp_dir().display()),
        ),
        Err(detail) => CheckResult::new("mmap_roundtrip", CheckStatus::Fail, detail),
    }
}

fn roundtrip(path: &std::path::Path) -> Result<(), String> {
    let config = ChannelConfig::with_capacities(8, 8);
    let mut server = Channel::create(path, config, Role::Server).map_err(|e| e.to_string())?;
    let mut client = Channel::open(path, config, Role::Client).map_err(|e| e.to_string())?;

    let mut buf = [0u8; 8];
    if server.write(b"ping") != 4 || client.read(&mut buf) != 4 || &buf[..4] != b"ping" {
        return Err("server→client bytes did not arrive".to_string());
    }
    if client.write(b"pong") != 4 || server.read(&mut buf) != 4 || &buf[..4] != b"pong" {
        return Err("client→server bytes did not arrive".to_string());
    }
    client.close().map_err(|e| e.to_string())?;
    server.close().map_err(|e| e.to_string())
}

fn capacity_env_check(var: &'static str) -> CheckResult {
    let Ok(value) = std::env::var(var) else {
        return CheckResult::new(var_check_name(var), CheckStatus::Skip, format!("{var} not set"));
    };
    match value.parse::<u32>() {
        Ok(n) if n > 0 && n <= memsock_channel::MAX_CAPACITY => {
            CheckResult::new(var_check_name(var), CheckStatus::Pass, format!("{var}={n}"))
        }
        _ => CheckResult::new(
            var_check_name(var),
            CheckStatus::Fail,
            format!(
                "{var}={value:?} is not a capacity in 1..={}",
                memsock_channel::MAX_CAPACITY
            ),
        ),
    }
}

fn var_check_name(var: &str) -> &'static str {
    if var.ends_with("SC_CAPACITY") {
        "sc_capacity_env"
    } else {
        "cs_capacity_env"
    }
}

fn compiled_features_check() -> CheckResult {
    let mut features = vec!["cli"];
    if cfg!(feature = "codec") {
        features.push("codec");
    }
    if cfg!(feature = "registry") {
        features.push("registry");
    }
    CheckResult::new("compiled_features", CheckStatus::Info, features.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doctor_output_has_overall_status() {
        let output = DoctorOutput {
            checks: vec![CheckResult::new("x", CheckStatus::Pass, "ok")],
            overall: "pass",
        };
        let json = serde_json::to_string(&output).expect("doctor output should serialize");
        assert!(json.contains("\"overall\":\"pass\""));
        assert!(json.contains("\"status\":\"pass\""));
    }

    #[test]
    fn roundtrip_succeeds_in_temp_dir() {
        assert_eq!(mmap_roundtrip_check().status, CheckStatus::Pass);
    }
}
