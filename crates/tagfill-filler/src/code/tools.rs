//! External compiler collaborators

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tracing::debug;

use crate::error::{FillerError, FillerResult};

/// Options parsed from a `:yul` header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct YulOptions {
    /// Target EVM version, e.g. `berlin`
    pub evm_version: Option<String>,
    /// Optimizer switch as written
    pub optimize: Option<String>,
}

impl YulOptions {
    /// Whether the optimizer token asks for optimization
    pub fn optimize_enabled(&self) -> bool {
        match &self.optimize {
            Some(flag) => !matches!(
                flag.to_ascii_lowercase().as_str(),
                "false" | "0" | "no" | "none"
            ),
            None => false,
        }
    }
}

/// Compilers invoked for `:yul` and LLL code
///
/// Implementations return the hex text the tool printed; a `0x` prefix is
/// tolerated.
pub trait CompilerTools {
    /// Compile a YUL source file
    fn compile_yul(&self, source: &Path, options: &YulOptions) -> FillerResult<String>;

    /// Compile an LLL source file
    fn compile_lll(&self, source: &Path) -> FillerResult<String>;
}

/// No compilers available; every invocation fails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTools;

impl CompilerTools for NoTools {
    fn compile_yul(&self, source: &Path, _options: &YulOptions) -> FillerResult<String> {
        Err(not_configured("solc", source))
    }

    fn compile_lll(&self, source: &Path) -> FillerResult<String> {
        Err(not_configured("lllc", source))
    }
}

fn not_configured(tool: &str, source: &Path) -> FillerError {
    FillerError::ExternalTool {
        tool: tool.to_string(),
        message: format!("not configured, cannot compile {}", source.display()),
    }
}

/// `solc` and `lllc` binaries run as subprocesses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTools {
    /// Path to solc
    pub solc: PathBuf,
    /// Path to lllc
    pub lllc: PathBuf,
}

impl Default for SystemTools {
    fn default() -> Self {
        Self {
            solc: PathBuf::from("solc"),
            lllc: PathBuf::from("lllc"),
        }
    }
}

impl SystemTools {
    /// Create with explicit binary paths
    pub fn new(solc: impl Into<PathBuf>, lllc: impl Into<PathBuf>) -> Self {
        Self {
            solc: solc.into(),
            lllc: lllc.into(),
        }
    }
}

fn run(tool: &Path, command: &mut Command) -> FillerResult<String> {
    let name = tool.display().to_string();
    let Output {
        status,
        stdout,
        stderr,
    } = command.output().map_err(|e| FillerError::ExternalTool {
        tool: name.clone(),
        message: e.to_string(),
    })?;

    if !status.success() {
        return Err(FillerError::ExternalTool {
            tool: name,
            message: format!(
                "exit status {}: {}",
                status.code().unwrap_or(-1),
                String::from_utf8_lossy(&stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&stdout).into_owned())
}

impl CompilerTools for SystemTools {
    fn compile_yul(&self, source: &Path, options: &YulOptions) -> FillerResult<String> {
        let mut command = Command::new(&self.solc);
        command.arg("--strict-assembly").arg("--bin");
        if let Some(version) = &options.evm_version {
            command.arg("--evm-version").arg(version.to_ascii_lowercase());
        }
        if options.optimize_enabled() {
            command.arg("--optimize");
        }
        command.arg(source);
        debug!(source = %source.display(), ?options, "Running solc");

        let stdout = run(&self.solc, &mut command)?;
        let mut lines = stdout.lines();
        while let Some(line) = lines.next() {
            if line.trim() == "Binary representation:" {
                if let Some(binary) = lines.next() {
                    return Ok(binary.trim().to_string());
                }
            }
        }
        Err(FillerError::ExternalTool {
            tool: self.solc.display().to_string(),
            message: "no binary representation in output".to_string(),
        })
    }

    fn compile_lll(&self, source: &Path) -> FillerResult<String> {
        let mut command = Command::new(&self.lllc);
        command.arg(source);
        debug!(source = %source.display(), "Running lllc");

        let stdout = run(&self.lllc, &mut command)?;
        let binary: String = stdout.lines().map(str::trim).collect();
        if binary.is_empty() {
            return Err(FillerError::ExternalTool {
                tool: self.lllc.display().to_string(),
                message: "empty output".to_string(),
            });
        }
        Ok(binary)
    }
}
