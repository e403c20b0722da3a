//! Host identity and system facts attached to every report.

use compliance_core::SystemInfo;

/// Get a stable host identifier.
///
/// Uses the configured override, then `/etc/machine-id`, then the hostname.
#[must_use]
pub fn host_identifier(configured: Option<&str>) -> String {
    if let Some(id) = configured.map(str::trim).filter(|id| !id.is_empty()) {
        return id.to_string();
    }

    if let Ok(id) = std::fs::read_to_string("/etc/machine-id") {
        let trimmed = id.trim().to_string();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }

    hostname_or_unknown()
}

/// Collect the host facts sent alongside a scan.
#[must_use]
pub fn system_info() -> SystemInfo {
    SystemInfo {
        hostname: hostname_or_unknown(),
        os: std::env::consts::OS.to_string(),
        architecture: std::env::consts::ARCH.to_string(),
        kernel: std::fs::read_to_string("/proc/sys/kernel/osrelease")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty()),
        cpu_count: std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get),
    }
}

fn hostname_or_unknown() -> String {
    hostname::get().map_or_else(
        |_| "unknown".to_string(),
        |h| h.to_string_lossy().into_owned(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_identifier_wins() {
        assert_eq!(host_identifier(Some(" web-01 ")), "web-01");
    }

    #[test]
    fn blank_override_falls_back() {
        let id = host_identifier(Some("   "));
        assert!(!id.is_empty());
        assert_ne!(id, "   ");
    }

    #[test]
    fn system_info_is_populated() {
        let info = system_info();
        assert!(!info.hostname.is_empty());
        assert_eq!(info.os, std::env::consts::OS);
        assert!(info.cpu_count >= 1);
    }
}
