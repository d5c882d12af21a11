use std::path::PathBuf;

/// CLI-supplied values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Explicit config file; disables upward discovery
    pub config_path: Option<PathBuf>,
    pub base_dir: Option<String>,
    /// Replaces `[defaults] enable` when non-empty
    pub enable: Vec<String>,
    pub port_stride: Option<u16>,
    /// `--archive` sets this; absent means "use file or default"
    pub archive: Option<bool>,
}
