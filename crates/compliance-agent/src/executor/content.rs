//! Locating the SCAP datastream to scan with.

use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

use super::ExecutorError;
use crate::config::AgentConfig;

/// System directories where distributions install SCAP Security Guide content
pub const SYSTEM_CONTENT_DIRS: [&str; 3] = [
    "/usr/share/xml/scap/ssg/content",
    "/usr/share/scap-security-guide",
    "/usr/share/xml/scap",
];

/// Resolves which content file a scan should use.
#[derive(Debug, Clone)]
pub struct ContentLocator {
    explicit: Option<PathBuf>,
    search_dirs: Vec<PathBuf>,
    os_release: PathBuf,
}

impl ContentLocator {
    /// Locator that searches `content_dir` and then the system directories
    #[must_use]
    pub fn new(explicit: Option<PathBuf>, content_dir: impl Into<PathBuf>) -> Self {
        let mut search_dirs = vec![content_dir.into()];
        search_dirs.extend(SYSTEM_CONTENT_DIRS.iter().map(PathBuf::from));
        Self {
            explicit,
            search_dirs,
            os_release: PathBuf::from("/etc/os-release"),
        }
    }

    /// Locator configured from the agent config
    #[must_use]
    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(config.content_path.clone(), config.content_dir.clone())
    }

    /// Locator that always returns the given file
    #[must_use]
    pub fn fixed(path: impl Into<PathBuf>) -> Self {
        Self {
            explicit: Some(path.into()),
            search_dirs: Vec::new(),
            os_release: PathBuf::from("/etc/os-release"),
        }
    }

    /// Replace the directories searched during auto-detection
    #[must_use]
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Read OS details from another file
    #[must_use]
    pub fn with_os_release(mut self, path: impl Into<PathBuf>) -> Self {
        self.os_release = path.into();
        self
    }

    /// Pick the content file for the next scan.
    ///
    /// An explicitly configured path is returned as-is; the executor reports
    /// it as a configuration error if it is missing. Auto-detection failing
    /// means no content bundle is installed at all.
    pub fn resolve(&self) -> Result<PathBuf, ExecutorError> {
        if let Some(path) = &self.explicit {
            return Ok(path.clone());
        }

        let os_release = std::fs::read_to_string(&self.os_release).unwrap_or_default();
        if let Some(name) = datastream_for_os(&os_release) {
            if let Some(path) = self.find(name) {
                info!(path = %path.display(), "found datastream for host OS");
                return Ok(path);
            }
            debug!(datastream = name, "datastream for host OS not installed");
        }

        if let Some(path) = self.first_available() {
            info!(path = %path.display(), "using first available datastream");
            return Ok(path);
        }

        let searched: Vec<String> = self
            .search_dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect();
        Err(ExecutorError::unavailable(format!(
            "no SCAP content available (searched {})",
            searched.join(", ")
        )))
    }

    /// Locate a datastream an operator asked for by name.
    ///
    /// An absolute path is taken as-is. A bare file name is looked up in the
    /// search directories; anything else, or a name that is not installed,
    /// is a configuration error.
    pub fn resolve_named(&self, name: &str) -> Result<PathBuf, ExecutorError> {
        let requested = Path::new(name);
        if requested.is_absolute() {
            return Ok(requested.to_path_buf());
        }
        let mut components = requested.components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(ExecutorError::configuration(format!(
                "datastream {name:?} must be a file name or an absolute path"
            )));
        }
        self.find(name).ok_or_else(|| {
            ExecutorError::configuration(format!("datastream {name} is not installed"))
        })
    }

    fn find(&self, name: &str) -> Option<PathBuf> {
        self.search_dirs
            .iter()
            .map(|dir| dir.join(name))
            .find(|path| path.is_file())
    }

    fn first_available(&self) -> Option<PathBuf> {
        self.search_dirs.iter().find_map(|dir| {
            let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
                .ok()?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_ssg_datastream(path))
                .collect();
            found.sort();
            found.into_iter().next()
        })
    }
}

/// Map `/etc/os-release` contents to the matching SSG datastream name.
#[must_use]
pub fn datastream_for_os(os_release: &str) -> Option<&'static str> {
    let info = os_release.to_lowercase();
    if info.contains("ubuntu") {
        if info.contains("24.04") {
            Some("ssg-ubuntu2404-ds.xml")
        } else if info.contains("22.04") {
            Some("ssg-ubuntu2204-ds.xml")
        } else if info.contains("20.04") {
            Some("ssg-ubuntu2004-ds.xml")
        } else {
            Some("ssg-ubuntu2404-ds.xml")
        }
    } else if info.contains("debian") {
        Some("ssg-debian12-ds.xml")
    } else if info.contains("rhel") || info.contains("red hat") {
        Some("ssg-rhel9-ds.xml")
    } else if info.contains("centos") {
        Some("ssg-centos9-ds.xml")
    } else {
        None
    }
}

fn is_ssg_datastream(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with("ssg-") && n.ends_with("-ds.xml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ExecutorErrorKind;

    #[test]
    fn os_release_mapping() {
        let ubuntu = "NAME=\"Ubuntu\"\nVERSION_ID=\"22.04\"\n";
        assert_eq!(datastream_for_os(ubuntu), Some("ssg-ubuntu2204-ds.xml"));
        assert_eq!(
            datastream_for_os("ID=ubuntu\nVERSION_ID=\"24.04\""),
            Some("ssg-ubuntu2404-ds.xml")
        );
        assert_eq!(datastream_for_os("ID=debian"), Some("ssg-debian12-ds.xml"));
        assert_eq!(
            datastream_for_os("NAME=\"Red Hat Enterprise Linux\""),
            Some("ssg-rhel9-ds.xml")
        );
        assert_eq!(datastream_for_os("ID=centos"), Some("ssg-centos9-ds.xml"));
        assert_eq!(datastream_for_os("ID=arch"), None);
    }

    #[test]
    fn explicit_path_is_used_verbatim() {
        let locator = ContentLocator::fixed("/does/not/exist.xml");
        assert_eq!(
            locator.resolve().unwrap(),
            PathBuf::from("/does/not/exist.xml")
        );
    }

    #[test]
    fn detects_datastream_for_host_os() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ssg-debian12-ds.xml"), "<x/>").unwrap();
        std::fs::write(dir.path().join("ssg-aaa-ds.xml"), "<x/>").unwrap();
        let os_release = dir.path().join("os-release");
        std::fs::write(&os_release, "ID=debian\n").unwrap();

        let locator = ContentLocator::new(None, dir.path())
            .with_search_dirs(vec![dir.path().to_path_buf()])
            .with_os_release(&os_release);
        assert_eq!(
            locator.resolve().unwrap(),
            dir.path().join("ssg-debian12-ds.xml")
        );
    }

    #[test]
    fn falls_back_to_first_available_datastream() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ssg-sle15-ds.xml"), "<x/>").unwrap();
        std::fs::write(dir.path().join("ssg-rhel8-ds.xml"), "<x/>").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();

        let locator = ContentLocator::new(None, dir.path())
            .with_search_dirs(vec![dir.path().to_path_buf()])
            .with_os_release(dir.path().join("missing-os-release"));
        assert_eq!(
            locator.resolve().unwrap(),
            dir.path().join("ssg-rhel8-ds.xml")
        );
    }

    #[test]
    fn named_datastream_is_searched() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("ssg-rhel8-ds.xml"), "<x/>").unwrap();
        let locator = ContentLocator::new(None, dir.path())
            .with_search_dirs(vec![dir.path().join("empty"), dir.path().to_path_buf()]);

        assert_eq!(
            locator.resolve_named("ssg-rhel8-ds.xml").unwrap(),
            dir.path().join("ssg-rhel8-ds.xml")
        );
        assert_eq!(
            locator.resolve_named("/opt/content/custom-ds.xml").unwrap(),
            PathBuf::from("/opt/content/custom-ds.xml")
        );

        let err = locator.resolve_named("ssg-sle15-ds.xml").unwrap_err();
        assert_eq!(err.kind, ExecutorErrorKind::Configuration);
        let err = locator.resolve_named("../etc/ssg-rhel8-ds.xml").unwrap_err();
        assert_eq!(err.kind, ExecutorErrorKind::Configuration);
    }

    #[test]
    fn missing_content_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let locator = ContentLocator::new(None, dir.path())
            .with_search_dirs(vec![dir.path().to_path_buf()])
            .with_os_release(dir.path().join("missing-os-release"));
        let err = locator.resolve().unwrap_err();
        assert!(err.is_unavailable());
        assert!(err.detail.contains("no SCAP content"));
    }
}
