//! Process memory sampling for the sweep loop. Reads resident set size
//! from procfs; on platforms without it the reading is absent and pressure
//! handling is skipped.

use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryPressure {
    Normal,
    Warning,
    Critical,
}

/// Resident set size of the current process in bytes, when available.
pub fn process_memory_bytes() -> Option<u64> {
    let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
    let resident_pages: u64 = statm.split_whitespace().nth(1)?.parse().ok()?;
    Some(resident_pages * page_size())
}

fn page_size() -> u64 {
    // Linux has used 4 KiB pages on the common targets for decades; exotic
    // configurations only make the estimate conservative.
    4096
}

pub fn pressure(resident_bytes: u64, config: &SessionConfig) -> MemoryPressure {
    if resident_bytes >= config.memory_critical_bytes {
        MemoryPressure::Critical
    } else if resident_bytes >= config.memory_warn_bytes {
        MemoryPressure::Warning
    } else {
        MemoryPressure::Normal
    }
}
