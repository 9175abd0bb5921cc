//! Application-wide constants
//!
//! File locations, state identifiers and value limits shared by the
//! front-end, the privileged helper and the daemon.

/// Authoritative file locations (owned by the daemon)
pub mod paths {
    /// Directory holding the authoritative settings and profiles files
    pub const CONFIG_DIR: &str = "/etc/hwprofile";

    /// Settings file name inside [`CONFIG_DIR`]
    pub const SETTINGS_FILE: &str = "settings";

    /// Custom profiles file name inside [`CONFIG_DIR`]
    pub const PROFILES_FILE: &str = "profiles";

    /// Staging file for pending settings, overwritten on every commit
    pub const TMP_SETTINGS: &str = "/tmp/tmphwpsettings";

    /// Staging file for pending custom profiles, overwritten on every commit
    pub const TMP_PROFILES: &str = "/tmp/tmphwpprofiles";

    /// Root-owned list of extra directories the helper may write to
    pub const ALLOWED_CONFIG_DIRS: &str = "/etc/hwprofile/allowed-config-dirs";

    /// PID file of the running daemon
    pub const PID_FILE: &str = "/run/hwprofile.pid";

    /// Root of the kernel power supply class
    pub const POWER_SUPPLY_DIR: &str = "/sys/class/power_supply";
}

/// Front-end configuration file (per user)
pub mod frontend {
    /// Directory name under the XDG config dir
    pub const APP_DIR: &str = "hwprofile";

    /// Front-end config file name
    pub const FILENAME: &str = "frontend.json";

    /// Default privilege escalation wrapper
    pub const ESCALATION: &str = "pkexec";
}

/// Environment variable overrides
pub mod env {
    pub const CONFIG_DIR: &str = "HWPROFILE_CONFIG_DIR";
    pub const ESCALATION: &str = "HWPROFILE_ESCALATION";
    pub const DAEMON_EXEC: &str = "HWPROFILE_DAEMON_EXEC";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
}

/// Helper command-line flags (must match the clap definitions in main)
pub mod helper {
    pub const NEW_SETTINGS: &str = "--new-settings";
    pub const NEW_PROFILES: &str = "--new-profiles";
    pub const CONFIG_DIR: &str = "--config-dir";
}

/// Operating state identifiers used as state map keys
pub mod state {
    /// Running on mains power
    pub const POWER_AC: &str = "power_ac";

    /// Running on battery
    pub const POWER_BATTERY: &str = "power_bat";
}

/// Exit codes returned by the escalation wrapper (pkexec)
pub mod escalation {
    /// Authorization dialog dismissed
    pub const EXIT_DISMISSED: i32 = 126;

    /// Not authorized or authentication failed
    pub const EXIT_NOT_AUTHORIZED: i32 = 127;
}

/// Daemon timing
pub mod daemon {
    /// Interval between power state polls in milliseconds
    pub const POLL_INTERVAL_MS: u64 = 2000;
}

/// Value limits enforced when the helper validates a payload
pub mod validation {
    /// Maximum display brightness in percent
    pub const MAX_BRIGHTNESS: u8 = 100;

    /// Maximum fan speed in percent
    pub const MAX_FAN_SPEED: u8 = 100;

    /// Fan speed offset range in percent
    pub const MIN_FAN_OFFSET: i8 = -30;
    pub const MAX_FAN_OFFSET: i8 = 30;

    /// Highest temperature accepted for a fan curve point (°C)
    pub const MAX_CURVE_TEMPERATURE: u8 = 105;
}
