//! Best-effort hardware/OS identity probe.
//!
//! `probe_system` captures the machine identity that telemetry reports carry:
//! architecture, OS version, CPU and GPU model strings, device model, and RAM.
//! Probing is intentionally forgiving:
//! - every external command is bounded by a 2-second timeout,
//! - a field that cannot be determined becomes an empty string (or zero RAM),
//!   never an omitted key,
//! - multi-line tool output is collapsed to a single line.

use std::io::Read;
use std::process::Stdio;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Upper bound for any single external probe command.
const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// One enumerated GPU adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpuAdapter {
    pub name: String,
    pub vendor: String,
}

/// Normalized machine identity snapshot. Immutable after capture.
///
/// Field order matters: the canonical JSON encoding used for [`machine_id`]
/// serializes fields in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Normalized architecture: `x86_64`, `arm64`, or the raw value.
    pub arch: String,
    /// OS kind: `linux`, `macos`, `windows`, ...
    pub os: String,
    /// Human-readable OS version string, empty when undetermined.
    pub os_version: String,
    /// CPU model string, empty when undetermined.
    pub cpu_model: String,
    /// Primary GPU model string, empty when undetermined.
    pub gpu_model: String,
    /// All enumerated GPU adapters (may be empty).
    pub gpu_adapters: Vec<GpuAdapter>,
    /// Device/board model string, empty when undetermined.
    pub device_model: String,
    /// Total RAM in bytes, zero when undetermined.
    pub ram_bytes: u64,
}

/// Capture a [`SystemInfo`] snapshot for the current machine.
pub fn probe_system() -> SystemInfo {
    let adapters = probe_gpu_adapters();
    let gpu_model = adapters
        .first()
        .map(|a| a.name.clone())
        .unwrap_or_default();

    SystemInfo {
        arch: normalize_arch(std::env::consts::ARCH),
        os: std::env::consts::OS.to_string(),
        os_version: probe_os_version().unwrap_or_default(),
        cpu_model: probe_cpu_model().unwrap_or_default(),
        gpu_model,
        gpu_adapters: adapters,
        device_model: probe_device_model().unwrap_or_default(),
        ram_bytes: probe_ram_bytes().unwrap_or(0),
    }
}

/// Stable 32-character hex fingerprint of a [`SystemInfo`].
///
/// The snapshot is canonicalized by lower-casing the CPU and GPU model
/// strings, JSON-encoded, and MD5-hashed. This is a fingerprint for grouping
/// reports, not a security boundary.
pub fn machine_id(info: &SystemInfo) -> String {
    let mut canonical = info.clone();
    canonical.cpu_model = canonical.cpu_model.to_lowercase();
    canonical.gpu_model = canonical.gpu_model.to_lowercase();
    let encoded = serde_json::to_string(&canonical).unwrap_or_default();
    format!("{:x}", md5::compute(encoded.as_bytes()))
}

/// Map toolchain/uname spellings onto the two names reports use.
pub fn normalize_arch(raw: &str) -> String {
    match raw {
        "x86_64" | "amd64" => "x86_64".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        other => other.to_string(),
    }
}

/// Collapse all runs of whitespace (including newlines) to single spaces.
pub fn collapse_ws(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Run an external command, returning trimmed stdout on success.
///
/// Returns `None` on spawn failure, non-zero exit, empty output, or when the
/// command exceeds [`COMMAND_TIMEOUT`] (the child is killed).
fn run_command(cmd: &str, args: &[&str]) -> Option<String> {
    let mut child = std::process::Command::new(cmd)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    return None;
                }
                let mut out = Vec::new();
                if let Some(mut stdout) = child.stdout.take() {
                    let _ = stdout.read_to_end(&mut out);
                }
                let s = String::from_utf8_lossy(&out).trim().to_string();
                return if s.is_empty() { None } else { Some(s) };
            }
            Ok(None) => {
                if start.elapsed() >= COMMAND_TIMEOUT {
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(_) => return None,
        }
    }
}

#[cfg(target_os = "linux")]
fn read_trimmed(path: &str) -> Option<String> {
    let raw = std::fs::read_to_string(path).ok()?;
    let v = raw.trim();
    if v.is_empty() { None } else { Some(v.to_string()) }
}

// ---------------------------------------------------------------------------
// Linux
// ---------------------------------------------------------------------------

#[cfg(target_os = "linux")]
fn probe_os_version() -> Option<String> {
    if let Some(release) = std::fs::read_to_string("/etc/os-release")
        .ok()
        .and_then(|s| {
            s.lines().find(|l| l.starts_with("PRETTY_NAME=")).map(|l| {
                l.trim_start_matches("PRETTY_NAME=")
                    .trim_matches('"')
                    .to_string()
            })
        })
        .filter(|s| !s.is_empty())
    {
        return Some(collapse_ws(&release));
    }
    if let Some(lsb) = run_command("lsb_release", &["-ds"]) {
        return Some(collapse_ws(lsb.trim_matches('"')));
    }
    run_command("uname", &["-sr"]).map(|s| collapse_ws(&s))
}

#[cfg(target_os = "linux")]
fn probe_cpu_model() -> Option<String> {
    if let Some(model) = std::fs::read_to_string("/proc/cpuinfo").ok().and_then(|s| {
        s.lines()
            .find(|l| l.starts_with("model name"))
            .and_then(|l| l.split(':').nth(1))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }) {
        return Some(collapse_ws(&model));
    }
    let lscpu = run_command("lscpu", &[])?;
    lscpu
        .lines()
        .find(|l| l.trim_start().starts_with("Model name"))
        .and_then(|l| l.split(':').nth(1))
        .map(|v| collapse_ws(v))
        .filter(|v| !v.is_empty())
}

#[cfg(target_os = "linux")]
fn probe_gpu_adapters() -> Vec<GpuAdapter> {
    if let Some(lspci) = run_command("lspci", &[]) {
        let adapters: Vec<GpuAdapter> = lspci
            .lines()
            .filter(|l| {
                l.contains("VGA compatible controller")
                    || l.contains("3D controller")
                    || l.contains("Display controller")
            })
            .filter_map(|l| l.split_once(": "))
            .map(|(_, name)| GpuAdapter {
                name: collapse_ws(name),
                vendor: String::new(),
            })
            .collect();
        if !adapters.is_empty() {
            return adapters;
        }
    }
    // Headless or container hosts often lack lspci; ask GL instead.
    if let Some(glx) = run_command("glxinfo", &["-B"]) {
        let renderer = glx
            .lines()
            .find(|l| l.trim_start().starts_with("OpenGL renderer string:"))
            .and_then(|l| l.split(':').nth(1))
            .map(|v| collapse_ws(v))
            .filter(|v| !v.is_empty());
        if let Some(name) = renderer {
            return vec![GpuAdapter {
                name,
                vendor: String::new(),
            }];
        }
    }
    Vec::new()
}

#[cfg(target_os = "linux")]
fn probe_device_model() -> Option<String> {
    let vendor = read_trimmed("/sys/class/dmi/id/sys_vendor").unwrap_or_default();
    let product = read_trimmed("/sys/class/dmi/id/product_name").unwrap_or_default();
    let combined = collapse_ws(format!("{vendor} {product}").trim());
    if combined.is_empty() { None } else { Some(combined) }
}

#[cfg(target_os = "linux")]
fn probe_ram_bytes() -> Option<u64> {
    let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
    let kb: u64 = meminfo
        .lines()
        .find(|l| l.starts_with("MemTotal:"))?
        .split_whitespace()
        .nth(1)?
        .parse()
        .ok()?;
    Some(kb * 1024)
}

// ---------------------------------------------------------------------------
// macOS
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
fn read_sysctl(key: &str) -> Option<String> {
    run_command("sysctl", &["-n", key])
}

#[cfg(target_os = "macos")]
fn probe_os_version() -> Option<String> {
    let version = run_command("sw_vers", &["-productVersion"])?;
    Some(collapse_ws(&format!("macOS {version}")))
}

#[cfg(target_os = "macos")]
fn probe_cpu_model() -> Option<String> {
    read_sysctl("machdep.cpu.brand_string").map(|s| collapse_ws(&s))
}

#[cfg(target_os = "macos")]
fn probe_gpu_adapters() -> Vec<GpuAdapter> {
    // JSON output is stable across macOS releases; the text form is a fallback.
    if let Some(raw) = run_command("system_profiler", &["SPDisplaysDataType", "-json"])
        && let Ok(doc) = serde_json::from_str::<serde_json::Value>(&raw)
        && let Some(displays) = doc.get("SPDisplaysDataType").and_then(|v| v.as_array())
    {
        let adapters: Vec<GpuAdapter> = displays
            .iter()
            .filter_map(|entry| {
                let name = entry
                    .get("sppci_model")
                    .or_else(|| entry.get("_name"))
                    .and_then(|v| v.as_str())?;
                let vendor = entry
                    .get("spdisplays_vendor")
                    .and_then(|v| v.as_str())
                    .unwrap_or("");
                Some(GpuAdapter {
                    name: collapse_ws(name),
                    vendor: collapse_ws(vendor),
                })
            })
            .collect();
        if !adapters.is_empty() {
            return adapters;
        }
    }
    if let Some(raw) = run_command("system_profiler", &["SPDisplaysDataType"]) {
        return raw
            .lines()
            .filter(|l| l.trim_start().starts_with("Chipset Model:"))
            .filter_map(|l| l.split(':').nth(1))
            .map(|name| GpuAdapter {
                name: collapse_ws(name),
                vendor: String::new(),
            })
            .collect();
    }
    Vec::new()
}

#[cfg(target_os = "macos")]
fn probe_device_model() -> Option<String> {
    read_sysctl("hw.model").map(|s| collapse_ws(&s))
}

#[cfg(target_os = "macos")]
fn probe_ram_bytes() -> Option<u64> {
    read_sysctl("hw.memsize").and_then(|s| s.trim().parse().ok())
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

#[cfg(target_os = "windows")]
fn wmic_value(args: &[&str]) -> Option<String> {
    // `wmic <class> get <prop> /value` emits `Prop=value` lines.
    let raw = run_command("wmic", args)?;
    let values: Vec<String> = raw
        .lines()
        .filter_map(|l| l.split_once('='))
        .map(|(_, v)| collapse_ws(v))
        .filter(|v| !v.is_empty())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}

#[cfg(target_os = "windows")]
fn powershell_value(expr: &str) -> Option<String> {
    run_command("powershell", &["-NoProfile", "-Command", expr]).map(|s| collapse_ws(&s))
}

#[cfg(target_os = "windows")]
fn probe_os_version() -> Option<String> {
    wmic_value(&["os", "get", "Caption", "/value"])
        .or_else(|| powershell_value("(Get-CimInstance Win32_OperatingSystem).Caption"))
}

#[cfg(target_os = "windows")]
fn probe_cpu_model() -> Option<String> {
    wmic_value(&["cpu", "get", "Name", "/value"])
        .or_else(|| powershell_value("(Get-CimInstance Win32_Processor).Name"))
}

#[cfg(target_os = "windows")]
fn probe_gpu_adapters() -> Vec<GpuAdapter> {
    let raw = wmic_value(&["path", "win32_VideoController", "get", "Name", "/value"]).or_else(
        || powershell_value("(Get-CimInstance Win32_VideoController).Name -join \"; \""),
    );
    match raw {
        Some(joined) => joined
            .split("; ")
            .filter(|n| !n.is_empty())
            .map(|name| GpuAdapter {
                name: name.to_string(),
                vendor: String::new(),
            })
            .collect(),
        None => Vec::new(),
    }
}

#[cfg(target_os = "windows")]
fn probe_device_model() -> Option<String> {
    wmic_value(&["computersystem", "get", "Model", "/value"])
        .or_else(|| powershell_value("(Get-CimInstance Win32_ComputerSystem).Model"))
}

#[cfg(target_os = "windows")]
fn probe_ram_bytes() -> Option<u64> {
    // TotalVisibleMemorySize is reported in KB.
    let raw = wmic_value(&["os", "get", "TotalVisibleMemorySize", "/value"]).or_else(|| {
        powershell_value("(Get-CimInstance Win32_OperatingSystem).TotalVisibleMemorySize")
    })?;
    raw.split(';')
        .next()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(|kb| kb * 1024)
}

// ---------------------------------------------------------------------------
// Other platforms
// ---------------------------------------------------------------------------

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn probe_os_version() -> Option<String> {
    run_command("uname", &["-sr"]).map(|s| collapse_ws(&s))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn probe_cpu_model() -> Option<String> {
    None
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn probe_gpu_adapters() -> Vec<GpuAdapter> {
    Vec::new()
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn probe_device_model() -> Option<String> {
    None
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn probe_ram_bytes() -> Option<u64> {
    None
}
