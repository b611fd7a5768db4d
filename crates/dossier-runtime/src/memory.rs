//! Process memory probe.

/// Resident set size of this process in MB, or 0 when unavailable.
#[must_use]
pub fn current_memory_mb() -> u64 {
    read_rss_kb().map_or(0, |kb| kb / 1024)
}

#[cfg(target_os = "linux")]
fn read_rss_kb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_kb(&status)
}

#[cfg(not(target_os = "linux"))]
fn read_rss_kb() -> Option<u64> {
    None
}

/// Extract the `VmRSS` figure (kB) from `/proc/<pid>/status` content.
#[must_use]
pub fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tdossier\nVmPeak:\t  400000 kB\nVmRSS:\t  153600 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss_kb(status), Some(153_600));
    }

    #[test]
    fn test_parse_vm_rss_missing() {
        assert_eq!(parse_vm_rss_kb("Name:\tdossier\n"), None);
        assert_eq!(parse_vm_rss_kb("VmRSS:\tgarbage kB\n"), None);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_current_memory_is_readable() {
        assert!(read_rss_kb().is_some());
    }
}
