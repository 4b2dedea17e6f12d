// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A description of the machine a run executes on.

use bytesize::ByteSize;
use pulse_metadata::{CpuInfo, EnvironmentInfo};
use sysinfo::System;

const UNKNOWN: &str = "unknown";

/// Captures the current machine's environment.
///
/// `runtime` is the version of the host test runner, if it reported one. Values that can't be
/// determined are recorded as `unknown`.
pub fn capture_environment(runtime: Option<&str>) -> EnvironmentInfo {
    let mut system = System::new();
    system.refresh_cpu();
    system.refresh_memory();

    let cpus = system.cpus();
    let model = cpus
        .first()
        .map(|cpu| cpu.brand().trim())
        .filter(|brand| !brand.is_empty())
        .unwrap_or(UNKNOWN)
        .to_owned();

    let memory = match system.total_memory() {
        0 => UNKNOWN.to_owned(),
        bytes => ByteSize::b(bytes).to_string(),
    };

    EnvironmentInfo {
        host: System::host_name().unwrap_or_else(|| UNKNOWN.to_owned()),
        os: os_description(),
        cpu: CpuInfo {
            model,
            cores: cpus.len(),
        },
        memory,
        runtime: runtime
            .map(str::trim)
            .filter(|runtime| !runtime.is_empty())
            .unwrap_or(UNKNOWN)
            .to_owned(),
    }
}

fn os_description() -> String {
    System::long_os_version()
        .or_else(|| match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => Some(format!("{name} {version}")),
            (name, _) => name,
        })
        .unwrap_or_else(|| UNKNOWN.to_owned())
}
