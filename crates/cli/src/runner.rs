// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::Serialize;
use tracing::{info, warn};
use upbus_config::{RestartTarget, ScriptStep};
use upbus_core::{BusLine, SimResult, SimulationError, Testbench};

/// A read whose value differed from the script's expectation.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExpectationFailure {
    pub step: usize,
    pub address: u32,
    pub expected: u32,
    pub actual: u32,
}

#[derive(Debug, Default)]
pub struct ScriptRun {
    pub steps_executed: usize,
    pub failures: Vec<ExpectationFailure>,
    pub error: Option<SimulationError>,
}

impl ScriptRun {
    pub fn passed(&self) -> bool {
        self.failures.is_empty() && self.error.is_none()
    }
}

/// Execute steps in order. Expectation failures are collected and the run
/// goes on; the first simulation error ends it.
pub fn run_steps(tb: &mut Testbench, steps: &[ScriptStep]) -> ScriptRun {
    let mut run = ScriptRun::default();
    for (index, step) in steps.iter().enumerate() {
        if let Err(e) = execute_step(tb, index, step, &mut run.failures) {
            run.error = Some(e);
            break;
        }
        run.steps_executed += 1;
    }
    run
}

fn execute_step(
    tb: &mut Testbench,
    index: usize,
    step: &ScriptStep,
    failures: &mut Vec<ExpectationFailure>,
) -> SimResult<()> {
    match step {
        ScriptStep::Reset(r) => match r.cycles {
            Some(cycles) => tb.reset_for(cycles),
            None => tb.reset(),
        },
        ScriptStep::Write(w) => tb.write_burst(&w.address.to_vec(), &w.data.to_vec()),
        ScriptStep::Read(r) => {
            let addresses = r.address.to_vec();
            let values = tb.read_burst(&addresses)?;
            for (address, value) in addresses.iter().zip(&values) {
                info!("step {}: read [{:#x}] = {:#x}", index, address, value);
            }
            if let Some(expect) = &r.expect {
                for ((&address, &actual), expected) in
                    addresses.iter().zip(&values).zip(expect.to_vec())
                {
                    if actual != expected {
                        warn!(
                            "step {}: register {:#x} holds {:#x}, expected {:#x}",
                            index, address, actual, expected
                        );
                        failures.push(ExpectationFailure {
                            step: index,
                            address,
                            expected,
                            actual,
                        });
                    }
                }
            }
            Ok(())
        }
        ScriptStep::Idle(i) => tb.run(i.cycles),
        ScriptStep::WaitIdle => tb.wait_idle().map(|_| ()),
        ScriptStep::Restart(target) => match target {
            RestartTarget::Master => tb.restart_master(),
            RestartTarget::Slave => tb.restart_slave(),
            RestartTarget::Monitor => tb.restart_monitor(),
            RestartTarget::All => {
                tb.restart_all();
                Ok(())
            }
        },
        ScriptStep::Force(f) => tb.force(BusLine::from(f.signal), f.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use upbus_config::TestScript;

    fn script(yaml: &str) -> TestScript {
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        script.validate().unwrap();
        script
    }

    #[test]
    fn test_passing_script() {
        let s = script(
            r#"
schema_version: "1.0"
bench: { numreg: 4 }
steps:
  - reset: {}
  - write: { address: [0, 1, 2, 3], data: [10, 20, 30, 40] }
  - read: { address: [0, 1, 2, 3], expect: [10, 20, 30, 40] }
  - wait_idle
"#,
        );
        let mut tb = Testbench::from_bench_config(&s.bench_config());
        let run = run_steps(&mut tb, &s.steps);
        assert!(run.passed(), "{:?}", run);
        assert_eq!(run.steps_executed, 4);
    }

    #[test]
    fn test_mismatch_is_collected_and_run_continues() {
        let s = script(
            r#"
schema_version: "1.0"
bench: { numreg: 4 }
steps:
  - reset: {}
  - write: { address: 1, data: 5 }
  - read: { address: 1, expect: 6 }
  - idle: { cycles: 3 }
"#,
        );
        let mut tb = Testbench::from_bench_config(&s.bench_config());
        let run = run_steps(&mut tb, &s.steps);
        assert_eq!(
            run.failures,
            vec![ExpectationFailure {
                step: 2,
                address: 1,
                expected: 6,
                actual: 5
            }]
        );
        assert!(run.error.is_none());
        assert_eq!(run.steps_executed, 4);
    }

    #[test]
    fn test_forced_violation_stops_the_run() {
        let s = script(
            r#"
schema_version: "1.0"
steps:
  - reset: { cycles: 1 }
  - force: { signal: wack, value: 1 }
  - idle: { cycles: 1 }
  - wait_idle
"#,
        );
        let mut tb = Testbench::from_bench_config(&s.bench_config());
        let run = run_steps(&mut tb, &s.steps);
        assert_eq!(run.steps_executed, 2);
        assert!(matches!(
            run.error,
            Some(SimulationError::ProtocolViolation { .. })
        ));
    }
}
