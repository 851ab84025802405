//! Human-readable error descriptions and structured JSON error formatting.

use sorter_core::error::{BuildError, SorterError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingUpstreamSensor | BuildError::MissingDownstreamSensor => format!(
                "What happened: {be}.\nLikely causes: The color sensor failed to initialize or was not wired into the builder.\nHow to fix: Check the [hardware] I2C bus numbers and that both sensors answer on the bus."
            ),
            BuildError::MissingMotor(name) => format!(
                "What happened: No {name} motor was provided to the line.\nLikely causes: The motor driver failed to initialize.\nHow to fix: Check the [hardware.{name}] step/dir pins and GPIO permissions."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/sorter_config.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SorterError>() {
        return match se {
            SorterError::Timeout => "What happened: Color sensor read timed out.\nLikely causes: Sensor not wired or powered, wrong I2C bus, or timeout too low.\nHow to fix: Verify the sensor wiring and [hardware] bus numbers, and consider increasing hardware.sensor_read_timeout_ms in the config.".to_string(),
            SorterError::HardwareFault(msg) | SorterError::Hardware(msg) => format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: Loose wiring, a stalled belt, or missing GPIO/I2C permissions.\nHow to fix: Check the motors and sensors, then restart the line."
            ),
            SorterError::Config(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See etc/sorter_config.toml for a sample."
            ),
            SorterError::Io(msg) => format!(
                "What happened: I/O error ({msg}).\nLikely causes: Missing file or insufficient permissions.\nHow to fix: Check the paths in the config (calibration.file, logging.file)."
            ),
            SorterError::State(msg) => format!(
                "What happened: {msg}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or the store
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("background store") {
        return format!(
            "What happened: Could not use the calibration store ({msg}).\nLikely causes: Unwritable directory or a damaged file.\nHow to fix: Check calibration.file, or run `sorter factory-reset` to rewrite it."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.chain().nth(1) {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable name for the JSON `reason` field.
pub fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "Build";
    }
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Timeout) => "Timeout",
        Some(SorterError::Hardware(_) | SorterError::HardwareFault(_)) => "HardwareFault",
        Some(SorterError::Config(_)) => "Config",
        Some(SorterError::Io(_)) => "Io",
        Some(SorterError::State(_)) | None => "Error",
    }
}

/// Stable exit codes: 3 config, 4 hardware, 5 timeout, 1 anything else.
/// (clap uses 2 for usage errors.)
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match reason_name(err) {
        "Build" | "Config" => 3,
        "HardwareFault" => 4,
        "Timeout" => 5,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "event": "error",
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
