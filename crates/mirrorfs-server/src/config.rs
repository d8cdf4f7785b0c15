//! Mount configuration.
//!
//! Settings come from the command line and, optionally, a TOML file.
//! Command-line values win; the file fills in whatever was not given.
//!
//! ```toml
//! root = "/srv/export"
//! mountpoint = "/mnt/export"
//! fs_name = "export"
//! allow_other = false
//! auto_unmount = true
//! trace = false
//! attr_timeout_secs = 1
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use fuser::MountOption;
use serde::Deserialize;
use thiserror::Error;

use crate::constants::{DEFAULT_ATTR_TIMEOUT, DEFAULT_FS_NAME, FS_SUBTYPE};

/// Mirror a directory through a FUSE mount.
#[derive(Parser, Debug, Default)]
#[command(name = "mirrorfs")]
#[command(about = "Passthrough FUSE filesystem mirroring a directory")]
pub struct Args {
    /// Directory to mirror
    pub root: Option<PathBuf>,

    /// Where to mount it (created if missing)
    pub mountpoint: Option<PathBuf>,

    /// TOML file with mount settings
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Filesystem name shown in the mount table
    #[arg(long)]
    pub fs_name: Option<String>,

    /// Let other users access the mount
    #[arg(long)]
    pub allow_other: bool,

    /// Leave the mount in place if the process dies
    #[arg(long)]
    pub no_auto_unmount: bool,

    /// Log every filesystem operation at debug level
    #[arg(long)]
    pub trace: bool,

    /// Seconds the kernel may cache attributes
    #[arg(long)]
    pub attr_timeout_secs: Option<u64>,
}

/// Settings as read from a config file. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub root: Option<PathBuf>,
    pub mountpoint: Option<PathBuf>,
    pub fs_name: Option<String>,
    pub allow_other: Option<bool>,
    pub auto_unmount: Option<bool>,
    pub trace: Option<bool>,
    pub attr_timeout_secs: Option<u64>,
}

impl FileConfig {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse config text.
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("no root directory given (argument or `root` in config)")]
    MissingRoot,

    #[error("no mount point given (argument or `mountpoint` in config)")]
    MissingMountpoint,
}

/// Fully resolved mount settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountConfig {
    /// Directory being mirrored.
    pub root: PathBuf,
    /// Where the mirror appears.
    pub mountpoint: PathBuf,
    /// Name shown in the mount table.
    pub fs_name: String,
    /// Allow users other than the mounter.
    pub allow_other: bool,
    /// Unmount automatically when the process exits.
    pub auto_unmount: bool,
    /// Wrap the backend in the tracing decorator.
    pub trace: bool,
    /// Kernel attribute/entry cache lifetime.
    pub attr_timeout: Duration,
}

impl MountConfig {
    /// Resolve command-line arguments, loading `--config` if given.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(args, file)
    }

    /// Combine arguments with file settings; arguments take precedence.
    pub fn merge(args: Args, file: FileConfig) -> Result<Self, ConfigError> {
        let root = args.root.or(file.root).ok_or(ConfigError::MissingRoot)?;
        let mountpoint = args
            .mountpoint
            .or(file.mountpoint)
            .ok_or(ConfigError::MissingMountpoint)?;

        Ok(Self {
            root,
            mountpoint,
            fs_name: args
                .fs_name
                .or(file.fs_name)
                .unwrap_or_else(|| DEFAULT_FS_NAME.to_string()),
            allow_other: args.allow_other || file.allow_other.unwrap_or(false),
            auto_unmount: !args.no_auto_unmount && file.auto_unmount.unwrap_or(true),
            trace: args.trace || file.trace.unwrap_or(false),
            attr_timeout: args
                .attr_timeout_secs
                .or(file.attr_timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_ATTR_TIMEOUT),
        })
    }

    /// FUSE mount options for these settings.
    pub fn mount_options(&self) -> Vec<MountOption> {
        let mut options = vec![
            MountOption::FSName(self.fs_name.clone()),
            MountOption::Subtype(FS_SUBTYPE.to_string()),
        ];
        if self.allow_other {
            options.push(MountOption::AllowOther);
        }
        if self.auto_unmount {
            options.push(MountOption::AutoUnmount);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(root: Option<&str>, mountpoint: Option<&str>) -> Args {
        Args {
            root: root.map(PathBuf::from),
            mountpoint: mountpoint.map(PathBuf::from),
            ..Default::default()
        }
    }

    #[test]
    fn test_positional_order_is_root_then_mountpoint() {
        let args = Args::try_parse_from(["mirrorfs", "/srv/export", "/mnt/export"]).unwrap();
        let config = MountConfig::merge(args, FileConfig::default()).unwrap();

        assert_eq!(config.root, PathBuf::from("/srv/export"));
        assert_eq!(config.mountpoint, PathBuf::from("/mnt/export"));
        assert_eq!(config.fs_name, DEFAULT_FS_NAME);
        assert!(config.auto_unmount);
        assert!(!config.allow_other);
        assert!(!config.trace);
        assert_eq!(config.attr_timeout, DEFAULT_ATTR_TIMEOUT);
    }

    #[test]
    fn test_flags_parse() {
        let args = Args::try_parse_from([
            "mirrorfs",
            "/r",
            "/m",
            "--allow-other",
            "--no-auto-unmount",
            "--trace",
            "--fs-name",
            "data",
            "--attr-timeout-secs",
            "0",
        ])
        .unwrap();
        let config = MountConfig::merge(args, FileConfig::default()).unwrap();

        assert!(config.allow_other);
        assert!(!config.auto_unmount);
        assert!(config.trace);
        assert_eq!(config.fs_name, "data");
        assert_eq!(config.attr_timeout, Duration::ZERO);
    }

    #[test]
    fn test_file_fills_gaps_and_args_win() {
        let file = FileConfig::parse(
            r#"
            root = "/from/file"
            mountpoint = "/mnt/file"
            fs_name = "filename"
            trace = true
            attr_timeout_secs = 5
            "#,
        )
        .unwrap();

        let config = MountConfig::merge(args(Some("/from/args"), None), file).unwrap();
        assert_eq!(config.root, PathBuf::from("/from/args"));
        assert_eq!(config.mountpoint, PathBuf::from("/mnt/file"));
        assert_eq!(config.fs_name, "filename");
        assert!(config.trace);
        assert_eq!(config.attr_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_file_can_disable_auto_unmount() {
        let file = FileConfig::parse("auto_unmount = false").unwrap();
        let config = MountConfig::merge(args(Some("/r"), Some("/m")), file).unwrap();
        assert!(!config.auto_unmount);
    }

    #[test]
    fn test_missing_paths() {
        assert!(matches!(
            MountConfig::merge(args(None, Some("/m")), FileConfig::default()),
            Err(ConfigError::MissingRoot)
        ));
        assert!(matches!(
            MountConfig::merge(args(Some("/r"), None), FileConfig::default()),
            Err(ConfigError::MissingMountpoint)
        ));
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(FileConfig::parse("rooot = \"/typo\"").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = FileConfig::load(Path::new("/nonexistent/mirrorfs.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_mount_options() {
        let config = MountConfig::merge(
            Args {
                allow_other: true,
                ..args(Some("/r"), Some("/m"))
            },
            FileConfig::default(),
        )
        .unwrap();

        let options = config.mount_options();
        assert!(options.contains(&MountOption::FSName(DEFAULT_FS_NAME.to_string())));
        assert!(options.contains(&MountOption::Subtype(FS_SUBTYPE.to_string())));
        assert!(options.contains(&MountOption::AllowOther));
        assert!(options.contains(&MountOption::AutoUnmount));
    }
}
