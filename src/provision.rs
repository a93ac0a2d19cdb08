//! Wrappers around the fixed system provisioning scripts.
//!
//! Two-button launchers for the host's configuration scripts: build the
//! argument list, run the script, capture the outcome. A non-zero exit code
//! is part of the outcome, not an `Err`; only failing to run the script at
//! all is.

use serde::Serialize;
use std::process::Command;
use thiserror::Error;

/// Script that rewrites a QCOW2 image's network configuration.
const MODIFY_NETWORK_SCRIPT: &str = "/usr/sbin/so-qcow2-modify-network";

/// Script that changes a virtual machine's hardware assignment.
const MODIFY_HARDWARE_SCRIPT: &str = "/usr/sbin/so-kvm-modify-hardware";

/// Errors from the provisioning wrappers.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// A CPU count of zero was requested.
    #[error("cpu must be a positive integer")]
    InvalidCpu,

    /// A memory size of zero was requested.
    #[error("memory must be a positive integer")]
    InvalidMemory,

    /// The script could not be spawned at all.
    #[error("Failed to run {script}: {source}")]
    Spawn {
        /// Path of the script that failed to start.
        script: &'static str,
        /// The underlying spawn error.
        source: std::io::Error,
    },
}

/// Captured outcome of one script invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    /// Exit code of the script, `-1` if it was killed by a signal.
    pub retcode: i32,
    /// Everything the script wrote to stdout.
    pub stdout: String,
    /// Everything the script wrote to stderr.
    pub stderr: String,
}

/// IPv4 addressing mode for [`modify_network_config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkMode {
    /// DHCP-assigned addressing.
    Dhcp4,
    /// Static addressing. `ip4` carries CIDR notation; `ip4` and `gw4` are
    /// both mandatory for a static configuration.
    Static4 {
        /// IPv4 address with CIDR suffix, e.g. `192.168.1.10/24`.
        ip4: String,
        /// IPv4 gateway.
        gw4: String,
        /// Optional comma-separated IPv4 DNS servers.
        dns4: Option<String>,
        /// Optional DNS search domain.
        search4: Option<String>,
    },
}

/// Hardware changes for [`modify_hardware_config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HardwareConfig {
    /// Name of the virtual machine to modify.
    pub vm_name: String,
    /// Number of virtual CPUs to assign; must be positive when present.
    pub cpu: Option<u32>,
    /// Memory to assign in MiB; must be positive when present.
    pub memory: Option<u32>,
    /// PCI hardware ID to pass through, e.g. `0000:00:1f.2`.
    pub pci: Option<String>,
    /// Start the VM after modification.
    pub start: bool,
}

/// Rewrite the network configuration inside a QCOW2 image.
pub fn modify_network_config(
    image: &str,
    interface: &str,
    mode: &NetworkMode,
) -> Result<CommandOutput, ProvisionError> {
    run_script(MODIFY_NETWORK_SCRIPT, network_args(image, interface, mode))
}

/// Change a virtual machine's CPU, memory, or PCI passthrough assignment.
pub fn modify_hardware_config(config: &HardwareConfig) -> Result<CommandOutput, ProvisionError> {
    run_script(MODIFY_HARDWARE_SCRIPT, hardware_args(config)?)
}

fn network_args(image: &str, interface: &str, mode: &NetworkMode) -> Vec<String> {
    let mut args = vec![
        "-I".to_string(),
        image.to_string(),
        "-i".to_string(),
        interface.to_string(),
    ];

    match mode {
        NetworkMode::Dhcp4 => args.push("--dhcp4".to_string()),
        NetworkMode::Static4 {
            ip4,
            gw4,
            dns4,
            search4,
        } => {
            args.push("--static4".to_string());
            args.extend(["--ip4".to_string(), ip4.clone(), "--gw4".to_string(), gw4.clone()]);
            if let Some(dns4) = dns4 {
                args.extend(["--dns4".to_string(), dns4.clone()]);
            }
            if let Some(search4) = search4 {
                args.extend(["--search4".to_string(), search4.clone()]);
            }
        }
    }

    args
}

fn hardware_args(config: &HardwareConfig) -> Result<Vec<String>, ProvisionError> {
    let mut args = vec!["-v".to_string(), config.vm_name.clone()];

    if let Some(cpu) = config.cpu {
        if cpu == 0 {
            return Err(ProvisionError::InvalidCpu);
        }
        args.extend(["-c".to_string(), cpu.to_string()]);
    }
    if let Some(memory) = config.memory {
        if memory == 0 {
            return Err(ProvisionError::InvalidMemory);
        }
        args.extend(["-m".to_string(), memory.to_string()]);
    }
    if let Some(pci) = &config.pci {
        args.extend(["-p".to_string(), pci.clone()]);
    }
    if config.start {
        args.push("-s".to_string());
    }

    Ok(args)
}

fn run_script(script: &'static str, args: Vec<String>) -> Result<CommandOutput, ProvisionError> {
    tracing::info!("Executing command: {} {}", script, args.join(" "));

    let output = Command::new(script)
        .args(&args)
        .output()
        .map_err(|source| ProvisionError::Spawn { script, source })?;

    let result = CommandOutput {
        retcode: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };

    if result.retcode != 0 {
        tracing::error!(
            "Script {} failed with return code {}: {}",
            script,
            result.retcode,
            result.stderr
        );
    } else {
        tracing::info!("Script {} executed successfully", script);
    }

    Ok(result)
}
