//! System-wide constants and default paths.

/// Default location of the local declarative config file.
pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/pier.json";

/// Spawn UID used when the local config file names none.
pub const DEFAULT_SPAWN_UID: u32 = 48;

/// Spawn GID used when the local config file names none.
pub const DEFAULT_SPAWN_GID: u32 = 48;

/// File name of the mount manifest.
pub const DEFAULT_MOUNT_FILE: &str = "Mountfile";

/// Remote name that requests a fresh temporary directory.
pub const EPHEMERAL_REMOTE: &str = "ephemeral";

/// Prefix for ephemeral remote directories.
pub const EPHEMERAL_PREFIX: &str = "pier-ephemeral-";

/// Environment variable carrying a JSON-encoded template context.
pub const CONFIG_OVERRIDE_VAR: &str = "CONFIG";

/// Case-insensitive prefix of variables that override VCS settings.
pub const VCS_OVERRIDE_PREFIX: &str = "GIT";

/// Inherited variables never written to the persisted env file.
pub const PERSIST_DENY_LIST: &[&str] = &["HOME", "PATH"];

/// Name of the VCS client binary.
pub const VCS_PROGRAM: &str = "git";

/// Application name used in log output.
pub const APP_NAME: &str = "pier";
