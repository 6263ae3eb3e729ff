use std::path::{Path, PathBuf};

/// One `BUFSIZ` worth of request bytes.
pub const DEFAULT_RECV_LIMIT: usize = 8192;

pub const DEFAULT_LOG_FILE: &str = "log.log";

/// Settings for one server instance.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory served by `index` and filename lookups.
    pub root: PathBuf,
    /// Audit log store; relative paths resolve against `root`.
    pub log_file: PathBuf,
    /// Upper bound on the bytes read for one request.
    pub recv_limit: usize,
}

impl ServerConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = log_file.into();
        self
    }

    pub fn log_path(&self) -> PathBuf {
        resolve(&self.root, &self.log_file)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            recv_limit: DEFAULT_RECV_LIMIT,
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_file_defaults_into_root() {
        let config = ServerConfig::new("/srv/files");
        assert_eq!(config.log_path(), PathBuf::from("/srv/files/log.log"));
        assert_eq!(config.recv_limit, DEFAULT_RECV_LIMIT);
    }

    #[test]
    fn absolute_log_file_is_kept() {
        let config = ServerConfig::new("/srv/files").with_log_file("/var/log/browser.log");
        assert_eq!(config.log_path(), PathBuf::from("/var/log/browser.log"));
    }
}
