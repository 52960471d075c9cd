// UpBus - uP Bus Verification Components
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const SCHEMA_VERSION: &str = "1.0";
pub const DEFAULT_NUMREG: usize = 256;
pub const MAX_BUS_WIDTH: u8 = 32;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

fn default_numreg() -> usize {
    DEFAULT_NUMREG
}

fn default_width() -> u8 {
    MAX_BUS_WIDTH
}

fn default_reset_cycles() -> u64 {
    2
}

/// Shape of a master/echo-slave/monitor bench.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BenchConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    /// Depth of the echo slave register file.
    #[serde(default = "default_numreg")]
    pub numreg: usize,
    #[serde(default = "default_width")]
    pub address_width: u8,
    #[serde(default = "default_width")]
    pub data_width: u8,
    /// Clock edges of active reset applied by a bench reset.
    #[serde(default = "default_reset_cycles")]
    pub reset_cycles: u64,
    /// Upper bound on clock edges spent waiting for the bus. Absent means wait forever.
    #[serde(default)]
    pub watchdog_cycles: Option<u64>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            numreg: DEFAULT_NUMREG,
            address_width: MAX_BUS_WIDTH,
            data_width: MAX_BUS_WIDTH,
            reset_cycles: default_reset_cycles(),
            watchdog_cycles: None,
        }
    }
}

impl BenchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read bench config at {:?}", path.as_ref()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("Failed to parse Bench Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        if self.numreg == 0 {
            anyhow::bail!("'numreg' must be greater than zero");
        }

        for (name, width) in [
            ("address_width", self.address_width),
            ("data_width", self.data_width),
        ] {
            if width == 0 || width > MAX_BUS_WIDTH {
                anyhow::bail!(
                    "'{}' must be between 1 and {} bits, got {}",
                    name,
                    MAX_BUS_WIDTH,
                    width
                );
            }
        }

        if self.watchdog_cycles == Some(0) {
            anyhow::bail!("'watchdog_cycles' must be greater than zero when set");
        }

        Ok(())
    }
}

/// One address/data word or a list of them.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum Words {
    One(u32),
    Many(Vec<u32>),
}

impl Words {
    pub fn to_vec(&self) -> Vec<u32> {
        match self {
            Words::One(w) => vec![*w],
            Words::Many(ws) => ws.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Words::One(_) => 1,
            Words::Many(ws) => ws.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The eight named uP bus lines, as spelled in scripts.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SignalName {
    Wreq,
    Wack,
    Waddr,
    Wdata,
    Rreq,
    Rack,
    Raddr,
    Rdata,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RestartTarget {
    Master,
    Slave,
    Monitor,
    All,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ResetStep {
    /// Overrides the bench's `reset_cycles`.
    #[serde(default)]
    pub cycles: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct WriteStep {
    pub address: Words,
    pub data: Words,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReadStep {
    pub address: Words,
    #[serde(default)]
    pub expect: Option<Words>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct IdleStep {
    pub cycles: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ForceStep {
    pub signal: SignalName,
    pub value: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStep {
    Reset(ResetStep),
    Write(WriteStep),
    Read(ReadStep),
    Idle(IdleStep),
    WaitIdle,
    Restart(RestartTarget),
    Force(ForceStep),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct TestLimits {
    /// Clock edges any single wait may take; overrides the bench watchdog.
    #[serde(default)]
    pub max_cycles: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(deny_unknown_fields)]
pub struct TestScript {
    pub schema_version: String,
    #[serde(default)]
    pub bench: Option<BenchConfig>,
    #[serde(default)]
    pub limits: TestLimits,
    pub steps: Vec<ScriptStep>,
}

impl TestScript {
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema_version '{}'. Supported versions: '{}'",
                self.schema_version,
                SCHEMA_VERSION
            );
        }

        if let Some(bench) = &self.bench {
            bench.validate().context("Invalid 'bench' section")?;
        }

        if self.limits.max_cycles == Some(0) {
            anyhow::bail!("Limit 'max_cycles' must be greater than zero");
        }

        for (index, step) in self.steps.iter().enumerate() {
            match step {
                ScriptStep::Write(w) if w.address.len() != w.data.len() => {
                    anyhow::bail!(
                        "Step {}: write address and data lists differ in length ({} vs {})",
                        index,
                        w.address.len(),
                        w.data.len()
                    );
                }
                ScriptStep::Read(ReadStep {
                    address,
                    expect: Some(expect),
                }) if address.len() != expect.len() => {
                    anyhow::bail!(
                        "Step {}: read address and expect lists differ in length ({} vs {})",
                        index,
                        address.len(),
                        expect.len()
                    );
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// The bench this script runs against, falling back to defaults.
    pub fn bench_config(&self) -> BenchConfig {
        self.bench.clone().unwrap_or_default()
    }
}

/// Load a test script from YAML.
pub fn load_test_script<P: AsRef<Path>>(path: P) -> Result<TestScript> {
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read test script at {:?}", path.as_ref()))?;

    let script: TestScript = serde_yaml::from_str(&contents).context(format!(
        "Failed to parse Test Script YAML (expected schema_version: \"{}\")",
        SCHEMA_VERSION
    ))?;
    script.validate()?;
    tracing::debug!(
        "Loaded test script {:?} with {} steps",
        path.as_ref(),
        script.steps.len()
    );
    Ok(script)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn test_valid_script() {
        let yaml = r#"
schema_version: "1.0"
bench:
  numreg: 4
limits:
  max_cycles: 500
steps:
  - reset: {}
  - write: { address: [0, 1, 2, 3], data: [10, 20, 30, 40] }
  - read: { address: [0, 1, 2, 3], expect: [10, 20, 30, 40] }
  - wait_idle
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        assert!(script.validate().is_ok());
        assert_eq!(script.bench_config().numreg, 4);
        assert_eq!(script.limits.max_cycles, Some(500));
        assert_eq!(script.steps.len(), 4);
        assert_eq!(script.steps[0], ScriptStep::Reset(ResetStep { cycles: None }));
        assert_eq!(script.steps[3], ScriptStep::WaitIdle);
    }

    #[test]
    fn test_invalid_version() {
        let yaml = r#"
schema_version: "2.0"
steps: []
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("Unsupported schema_version"));
    }

    #[test]
    fn test_invalid_max_cycles() {
        let yaml = r#"
schema_version: "1.0"
limits:
  max_cycles: 0
steps: []
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("max_cycles"));
    }

    #[test]
    fn test_mismatched_write_lists() {
        let yaml = r#"
schema_version: "1.0"
steps:
  - write: { address: [0, 1], data: [10] }
"#;
        let script: TestScript = serde_yaml::from_str(yaml).unwrap();
        let err = script.validate().unwrap_err();
        assert!(err.to_string().contains("differ in length"));
    }

    #[test]
    fn test_bench_defaults() {
        let bench = BenchConfig::from_yaml("{}").unwrap();
        assert_eq!(bench, BenchConfig::default());
        assert_eq!(bench.numreg, 256);
        assert_eq!(bench.watchdog_cycles, None);
    }

    #[test]
    fn test_bench_rejects_bad_widths() {
        let err = BenchConfig::from_yaml("data_width: 40").unwrap_err();
        assert!(format!("{:#}", err).contains("data_width"));

        let err = BenchConfig::from_yaml("numreg: 0").unwrap_err();
        assert!(format!("{:#}", err).contains("numreg"));
    }

    fn write_temp_file(prefix: &str, contents: &str) -> std::path::PathBuf {
        let mut dir = std::env::temp_dir();
        dir.push("upbus-config-tests");
        let _ = std::fs::create_dir_all(&dir);

        let nonce = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = dir.join(format!("{}-{}.yaml", prefix, nonce));
        std::fs::write(&path, contents).expect("Failed to write temp file");
        path
    }

    #[test]
    fn test_load_script_from_disk() {
        let script_path = write_temp_file(
            "script",
            r#"
schema_version: "1.0"
steps:
  - idle: { cycles: 3 }
  - restart: all
  - force: { signal: wack, value: 1 }
"#,
        );

        let script = load_test_script(&script_path).unwrap();
        assert_eq!(script.steps.len(), 3);
        assert_eq!(script.steps[1], ScriptStep::Restart(RestartTarget::All));
        assert_eq!(
            script.steps[2],
            ScriptStep::Force(ForceStep {
                signal: SignalName::Wack,
                value: 1
            })
        );
    }

    #[test]
    fn test_load_missing_script() {
        let err = load_test_script("/nonexistent/upbus-script.yaml").unwrap_err();
        assert!(err.to_string().contains("Failed to read test script"));
    }
}
