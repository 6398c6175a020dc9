//! Process memory measurement for the pressure tier.

/// Reports the resident memory of the current process.
///
/// `None` means "unknown" and disables pressure eviction.
pub trait MemoryProbe: Send + Sync {
    fn resident_bytes(&self) -> Option<u64>;
}

impl<F> MemoryProbe for F
where
    F: Fn() -> Option<u64> + Send + Sync,
{
    fn resident_bytes(&self) -> Option<u64> {
        self()
    }
}

/// Reads `VmRSS` from `/proc/self/status`. Unknown on other platforms.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcStatus;

impl MemoryProbe for ProcStatus {
    fn resident_bytes(&self) -> Option<u64> {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        parse_vm_rss(&status)
    }
}

/// Parse `VmRSS:   123456 kB` into bytes.
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|line| line.starts_with("VmRSS:"))?;
    let mut fields = line["VmRSS:".len()..].split_whitespace();
    let value: u64 = fields.next()?.parse().ok()?;
    let scale = match fields.next() {
        Some("kB") | None => 1024,
        Some("mB") | Some("MB") => 1024 * 1024,
        Some(_) => return None,
    };
    Some(value * scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vm_rss() {
        let status = "Name:\tsitegraph\nVmPeak:\t  20000 kB\nVmRSS:\t   10240 kB\nThreads:\t4\n";
        assert_eq!(parse_vm_rss(status), Some(10240 * 1024));
    }

    #[test]
    fn test_parse_vm_rss_missing() {
        assert_eq!(parse_vm_rss("Name:\tsitegraph\n"), None);
        assert_eq!(parse_vm_rss("VmRSS:\tlots kB\n"), None);
    }

    #[test]
    fn test_closure_probe() {
        let probe = || Some(42_u64);
        assert_eq!(probe.resident_bytes(), Some(42));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_proc_status_reads_self() {
        assert!(ProcStatus.resident_bytes().is_some_and(|rss| rss > 0));
    }
}
