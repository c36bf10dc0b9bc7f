use embassy_time::Duration;

/// High time of the `RESET` line to reset the modem
pub fn reset_time() -> Duration {
    Duration::from_millis(500)
}

/// High time of the `PWRKEY` line to toggle the modem power state
pub fn pwr_toggle_time() -> Duration {
    Duration::from_millis(1500)
}

/// Time to wait for the modem to boot after power on
pub fn boot_time() -> Duration {
    Duration::from_secs(6)
}

/// Stray input is drained until the line stays quiet this long
pub fn drain_idle_time() -> Duration {
    Duration::from_secs(1)
}

/// Default deadline of a command transaction
pub fn cmd_timeout() -> Duration {
    Duration::from_secs(5)
}

/// Deadline of a quick `AT` liveness check
pub fn liveness_timeout() -> Duration {
    Duration::from_secs(1)
}

/// Pause between two quick liveness checks
pub fn liveness_interval() -> Duration {
    Duration::from_millis(100)
}

/// Quick liveness checks per round
pub const LIVENESS_ATTEMPTS: usize = 10;

/// Liveness rounds, each followed by a power toggle on failure
pub const LIVENESS_ROUNDS: usize = 2;

/// Pause between teardown steps while powering the modem off
pub fn teardown_gap() -> Duration {
    Duration::from_millis(100)
}

/// Pause between a two-phase command header and its payload
pub fn payload_settle_time() -> Duration {
    Duration::from_secs(1)
}

/// Interval between network registration polls
pub fn netreg_poll_interval() -> Duration {
    Duration::from_secs(1)
}

/// Network registration polls before giving up
pub const NETREG_POLLS: usize = 120;

/// Interval between MQTT connection state polls
pub fn mqtt_poll_interval() -> Duration {
    Duration::from_secs(5)
}

/// MQTT connection state polls allowed to report offline before giving up
pub const MQTT_CONNECT_RETRIES: usize = 5;

/// Consecutive failed publish cycles tolerated before the attempt is aborted
pub const MAX_PUBLISH_FAILURES: usize = 5;
