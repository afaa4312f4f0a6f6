//! Shared constants for paths, defaults, and limits

/// Filesystem locations
pub mod paths {
    /// Control socket for client connections
    pub const SOCKET: &str = "/var/run/notefan.sock";

    /// PID file of the running daemon
    pub const PID_FILE: &str = "/var/run/notefand.pid";

    /// Persisted service configuration
    pub const SERVICE_CONFIG: &str = "/etc/notefan/notefan.json";

    /// Directory holding per-model configurations (`<SelectedConfigId>.json`)
    pub const MODEL_CONFIGS_DIR: &str = "/usr/share/notefan/configs";

    /// Linux hardware monitoring sysfs tree
    pub const HWMON_BASE: &str = "/sys/class/hwmon";
}

/// Embedded controller device nodes
pub mod ec {
    /// Register window exposed by the `ec_sys` kernel module
    pub const SYSFS_IO: &str = "/sys/kernel/debug/ec/ec0/io";

    /// Register window exposed by the `acpi_ec` kernel module
    pub const ACPI_DEV: &str = "/dev/ec";

    /// Raw port access used by the port-I/O backend
    pub const DEV_PORT: &str = "/dev/port";
}

/// Model-config defaults for fields a config may omit
pub mod defaults {
    /// Poll interval of the control loop in milliseconds
    pub const EC_POLL_INTERVAL_MS: u32 = 3000;

    /// Temperature at which fans are forced to full speed
    pub const CRITICAL_TEMPERATURE: i32 = 75;

    /// Upper bound of the raw speed range when a config omits it
    pub const MAX_SPEED_VALUE: u16 = 100;
}

/// Operational limits
pub mod limits {
    /// Consecutive control-loop failures before the daemon gives up
    pub const MAX_LOOP_FAILURES: u32 = 100;

    /// Consecutive accept/handle failures before the server requests shutdown
    pub const MAX_SERVER_FAILURES: u32 = 100;

    /// Deviation between current and target speed that forces re-applying
    /// the initialization register writes (percent)
    pub const RE_INIT_SPEED_DELTA: f32 = 15.0;

    /// Pause before retrying a failed control-loop tick
    pub const FAILURE_RETRY_MS: u64 = 10;
}
