// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Host metadata attached to every OCR result

use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Snapshot of the machine that served a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostInfo {
    pub hostname: String,
    pub os: String,
    pub cpu_count: usize,
    pub total_memory_kb: u64,
    pub available_memory_kb: u64,
    pub uptime_secs: u64,
}

struct StaticHostInfo {
    hostname: String,
    os: String,
    cpu_count: usize,
    total_memory_kb: u64,
}

static STATIC_INFO: OnceLock<StaticHostInfo> = OnceLock::new();

fn static_info() -> &'static StaticHostInfo {
    STATIC_INFO.get_or_init(|| {
        let mut sys = System::new();
        sys.refresh_memory();

        StaticHostInfo {
            hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
            os: System::long_os_version()
                .or_else(System::name)
                .unwrap_or_else(|| std::env::consts::OS.to_string()),
            cpu_count: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
            total_memory_kb: sys.total_memory() / 1024,
        }
    })
}

impl HostInfo {
    /// Collect current host metadata
    ///
    /// Hostname, OS, CPU count and total memory are probed once per process;
    /// available memory and uptime are read on every call.
    pub fn current() -> Self {
        let fixed = static_info();
        let mut sys = System::new();
        sys.refresh_memory();

        Self {
            hostname: fixed.hostname.clone(),
            os: fixed.os.clone(),
            cpu_count: fixed.cpu_count,
            total_memory_kb: fixed.total_memory_kb,
            available_memory_kb: sys.available_memory() / 1024,
            uptime_secs: System::uptime(),
        }
    }
}
