//! Host-local collectors.
//!
//! These run inside the invoking process and read the host OS through
//! sysinfo. No cluster client, no RBAC gate. Output lands under
//! `host-collectors/system/…`.

use serde::Serialize;
use sysinfo::{Networks, System};

use stetho_specs::types::HostCollectorSpec;

use crate::collector::CollectedFiles;
use crate::error::CollectError;

pub const SYSTEM_ROOT: &str = "host-collectors/system";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CpuInfo {
    logical_cpu_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    physical_cpu_count: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MemoryInfo {
    total: u64,
    free: u64,
    available: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OsInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kernel_version: Option<String>,
    platform: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hostname: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InterfaceInfo {
    name: String,
    mac_address: String,
}

pub fn collect(spec: &HostCollectorSpec) -> Result<CollectedFiles, CollectError> {
    match spec {
        HostCollectorSpec::Cpu(_) => collect_cpu(),
        HostCollectorSpec::Memory(_) => collect_memory(),
        HostCollectorSpec::HostOs(_) => collect_os(),
        HostCollectorSpec::Ipv4Interfaces(_) => collect_interfaces(),
    }
}

fn collect_cpu() -> Result<CollectedFiles, CollectError> {
    let system = System::new_all();
    let info = CpuInfo {
        logical_cpu_count: system.cpus().len(),
        physical_cpu_count: system.physical_core_count(),
    };
    emit_one(format!("{SYSTEM_ROOT}/cpu.json"), &info)
}

fn collect_memory() -> Result<CollectedFiles, CollectError> {
    let system = System::new_all();
    let info = MemoryInfo {
        total: system.total_memory(),
        free: system.free_memory(),
        available: system.available_memory(),
    };
    emit_one(format!("{SYSTEM_ROOT}/memory.json"), &info)
}

fn collect_os() -> Result<CollectedFiles, CollectError> {
    let info = OsInfo {
        name: System::name(),
        version: System::os_version(),
        kernel_version: System::kernel_version(),
        platform: std::env::consts::OS.to_string(),
        hostname: System::host_name(),
    };
    emit_one(format!("{SYSTEM_ROOT}/hostos_info.json"), &info)
}

fn collect_interfaces() -> Result<CollectedFiles, CollectError> {
    let networks = Networks::new_with_refreshed_list();
    let mut interfaces: Vec<InterfaceInfo> = networks
        .iter()
        .map(|(name, data)| InterfaceInfo {
            name: name.clone(),
            mac_address: data.mac_address().to_string(),
        })
        .collect();
    interfaces.sort_by(|a, b| a.name.cmp(&b.name));
    emit_one(format!("{SYSTEM_ROOT}/ipv4Interfaces.json"), &interfaces)
}

fn emit_one<T: Serialize>(path: String, value: &T) -> Result<CollectedFiles, CollectError> {
    let mut files = CollectedFiles::new();
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| CollectError::Serialize {
        path: path.clone(),
        source: e,
    })?;
    files.insert(path, bytes);
    Ok(files)
}
