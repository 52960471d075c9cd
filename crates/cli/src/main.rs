// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

mod runner;
mod vcd_trace;

use clap::{Parser, Subcommand};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

use runner::{ExpectationFailure, ScriptRun};
use upbus_config::{load_test_script, BenchConfig, TestLimits};
use upbus_core::testbench::MASTER_NAME;
use upbus_core::{BusMetrics, Channel, SimulationConfig, SimulationError, Testbench};
use vcd_trace::VcdObserver;

const EXIT_PASS: u8 = 0;
const EXIT_ASSERT_FAIL: u8 = 1;
const EXIT_CONFIG_ERROR: u8 = 2;
const EXIT_RUNTIME_ERROR: u8 = 3;

const RESULT_SCHEMA_VERSION: &str = "1.0";

#[derive(Parser, Debug)]
#[command(author, version, about = "UpBus uP Bus Verification Runner", long_about = None)]
struct Cli {
    /// Log every channel state transition
    #[arg(short, long, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a test script (YAML) against a master, echo slave and monitor.
    Test(TestArgs),
}

#[derive(Parser, Debug)]
struct TestArgs {
    /// Path to the test script (YAML)
    #[arg(short = 'c', long)]
    script: PathBuf,

    /// Bench configuration (YAML); replaces the script's `bench` section
    #[arg(short, long)]
    bench: Option<PathBuf>,

    /// Write a VCD waveform of the bus to this path
    #[arg(long)]
    vcd: Option<PathBuf>,

    /// Directory to write test artifacts (result.json)
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override the per-wait cycle limit
    #[arg(long)]
    max_cycles: Option<u64>,
}

#[derive(Debug, Serialize)]
struct TestResult {
    result_schema_version: String,
    status: String,
    steps_executed: usize,
    cycles: u64,
    write_beats: u64,
    read_beats: u64,
    limits: TestLimits,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    failures: Vec<ExpectationFailure>,
    script_hash: String,
    config: TestConfig,
}

#[derive(Debug, Serialize)]
struct TestConfig {
    script: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    bench_file: Option<PathBuf>,
    vcd: Option<PathBuf>,
    bench: Option<BenchConfig>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.trace {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Commands::Test(args) => run_test(args),
    }
}

/// Calls the bench rejected before queuing anything map to a configuration
/// error; everything else that stops the bus is a runtime error.
fn exit_code_for(err: &SimulationError) -> u8 {
    match err {
        SimulationError::LengthMismatch { .. } | SimulationError::ValueTooWide { .. } => {
            EXIT_CONFIG_ERROR
        }
        _ => EXIT_RUNTIME_ERROR,
    }
}

fn hash_file(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let mut hasher = Sha256::new();
            hasher.update(&bytes);
            format!("{:x}", hasher.finalize())
        }
        Err(_) => String::new(),
    }
}

fn run_test(args: TestArgs) -> ExitCode {
    let script_hash = hash_file(&args.script);

    let script = match load_test_script(&args.script) {
        Ok(s) => s,
        Err(e) => {
            let msg = format!("{:#}", e);
            error!("{}", msg);
            write_result(&args, &config_error_result(&args, script_hash, msg));
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    let bench = match &args.bench {
        Some(path) => match BenchConfig::from_file(path) {
            Ok(b) => b,
            Err(e) => {
                let msg = format!("{:#}", e);
                error!("{}", msg);
                write_result(&args, &config_error_result(&args, script_hash, msg));
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        },
        None => script.bench_config(),
    };
    let limits = TestLimits {
        max_cycles: args
            .max_cycles
            .or(script.limits.max_cycles)
            .or(bench.watchdog_cycles),
    };
    if limits.max_cycles == Some(0) {
        let msg = "max_cycles must be greater than zero".to_string();
        error!("{}", msg);
        write_result(&args, &config_error_result(&args, script_hash, msg));
        return ExitCode::from(EXIT_CONFIG_ERROR);
    }

    let mut config = SimulationConfig::from(&bench);
    config.watchdog_cycles = limits.max_cycles;
    let mut tb = Testbench::new(config, bench.numreg, bench.reset_cycles);

    let metrics = Arc::new(BusMetrics::new());
    tb.add_observer(metrics.clone());

    if let Some(path) = &args.vcd {
        match VcdObserver::new(path.clone(), tb.simulator().config().widths) {
            Ok(observer) => tb.add_observer(Arc::new(observer)),
            Err(e) => {
                let msg = format!("Failed to create VCD file {:?}: {:#}", path, e);
                error!("{}", msg);
                write_result(&args, &config_error_result(&args, script_hash, msg));
                return ExitCode::from(EXIT_CONFIG_ERROR);
            }
        }
    }

    info!(
        "Running {:?}: {} steps, {} registers",
        args.script,
        script.steps.len(),
        bench.numreg
    );
    let start = Instant::now();
    let run = runner::run_steps(&mut tb, &script.steps);
    let duration = start.elapsed();

    let (status, code, message) = outcome(&run);
    info!(
        "Finished in {} cycles ({:.3}s, {:.0} edges/s): {}",
        tb.cycle(),
        duration.as_secs_f64(),
        metrics.get_edges_per_second(),
        status
    );
    if let Some(msg) = &message {
        error!("{}", msg);
    }

    let result = TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: status.to_string(),
        steps_executed: run.steps_executed,
        cycles: tb.cycle(),
        write_beats: metrics.beats_for(MASTER_NAME, Channel::Write),
        read_beats: metrics.beats_for(MASTER_NAME, Channel::Read),
        limits,
        message,
        failures: run.failures.clone(),
        script_hash,
        config: TestConfig {
            script: args.script.clone(),
            bench_file: args.bench.clone(),
            vcd: args.vcd.clone(),
            bench: Some(bench),
        },
    };
    write_result(&args, &result);

    ExitCode::from(code)
}

fn outcome(run: &ScriptRun) -> (&'static str, u8, Option<String>) {
    if run.passed() {
        return ("pass", EXIT_PASS, None);
    }
    match &run.error {
        Some(err) => ("error", exit_code_for(err), Some(err.to_string())),
        None => {
            let msg = format!("{} read expectation(s) failed", run.failures.len());
            ("fail", EXIT_ASSERT_FAIL, Some(msg))
        }
    }
}

fn config_error_result(args: &TestArgs, script_hash: String, message: String) -> TestResult {
    TestResult {
        result_schema_version: RESULT_SCHEMA_VERSION.to_string(),
        status: "error".to_string(),
        steps_executed: 0,
        cycles: 0,
        write_beats: 0,
        read_beats: 0,
        limits: TestLimits {
            max_cycles: args.max_cycles,
        },
        message: Some(message),
        failures: vec![],
        script_hash,
        config: TestConfig {
            script: args.script.clone(),
            bench_file: args.bench.clone(),
            vcd: args.vcd.clone(),
            bench: None,
        },
    }
}

fn write_result(args: &TestArgs, result: &TestResult) {
    let Some(output_dir) = &args.output_dir else {
        return;
    };
    if let Err(e) = std::fs::create_dir_all(output_dir) {
        error!("Failed to create output directory {:?}: {}", output_dir, e);
        return;
    }
    let result_path = output_dir.join("result.json");
    match std::fs::File::create(&result_path) {
        Ok(f) => {
            if let Err(e) = serde_json::to_writer_pretty(f, result) {
                error!("Failed to write result.json: {}", e);
            }
        }
        Err(e) => error!("Failed to create result.json: {}", e),
    }
}
