//! Command-line argument parsing for the `mipssim` binary.
//!
//! A thin translation layer: the library itself never sees a `clap` type,
//! only the plain [`Pipeline`]/[`Policy`] it already exposes, so it stays
//! usable as a dependency without pulling a CLI parser along.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::functional_unit::UnitKind;

/// A five-stage pipelined MIPS-style simulator.
#[derive(Parser, Debug)]
#[command(name = "mipssim", version, about)]
pub struct Args {
    /// Path to the assembly source file to simulate.
    pub program: PathBuf,

    /// Base address instructions are loaded at.
    #[arg(long, default_value_t = 0, value_parser = parse_u32)]
    pub base_address: u32,

    /// Data memory size in bytes.
    #[arg(long, default_value_t = 4096)]
    pub mem_size: usize,

    /// Extra stall cycles a memory access takes beyond the baseline.
    #[arg(long, default_value_t = 0)]
    pub mem_latency: u32,

    /// Number of cycles to run; 0 runs to completion (EOP reaches WB).
    #[arg(long, default_value_t = 0)]
    pub cycles: u64,

    /// Selects the floating-point pipeline variant instead of integer-only.
    #[arg(long)]
    pub fp: bool,

    /// Functional unit spec for the FP variant, repeatable:
    /// `kind:latency:instances` (kind one of integer, adder, multiplier, divider).
    #[arg(long = "unit", value_parser = parse_unit_spec)]
    pub units: Vec<UnitSpec>,

    /// Prints per-cycle stage tracing to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Prints a cycle/instruction/stall/IPC summary after the run.
    #[arg(long)]
    pub history: bool,
}

#[derive(Clone, Copy, Debug)]
pub struct UnitSpec {
    pub kind: UnitKind,
    pub latency: u32,
    pub instances: u32,
}

fn parse_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| e.to_string())
    } else {
        s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
    }
}

fn parse_unit_spec(s: &str) -> Result<UnitSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [kind, latency, instances] = parts.as_slice() else {
        return Err(format!("expected kind:latency:instances, got '{s}'"));
    };
    let kind = match kind.to_ascii_lowercase().as_str() {
        "integer" => UnitKind::Integer,
        "adder" => UnitKind::Adder,
        "multiplier" => UnitKind::Multiplier,
        "divider" => UnitKind::Divider,
        other => return Err(format!("unknown functional unit kind '{other}'")),
    };
    let latency = u32::from_str(latency).map_err(|e| e.to_string())?;
    let instances = u32::from_str(instances).map_err(|e| e.to_string())?;
    Ok(UnitSpec { kind, latency, instances })
}
