//! Human-readable error descriptions and structured JSON error formatting.

use dutycycle_core::error::{BuildError, DutyCycleError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingAddress => {
                "What happened: No peer address was given.\nLikely causes: [peer].address missing from the config.\nHow to fix: Set the 24-bit radio address, e.g. address = \"0x3F0C8E\".".to_string()
            }
            BuildError::MissingTransport => {
                "What happened: No radio transport was wired into the peer.\nLikely causes: The radio failed to initialize.\nHow to fix: Check the radio setup and rerun with --log-level=debug.".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No variable store was wired into the peer.\nLikely causes: The state file could not be opened.\nHow to fix: Check [persistence].state_file and its directory permissions.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun `dutycycle check-config`."
            ),
        };
    }

    if let Some(de) = err.downcast_ref::<DutyCycleError>() {
        return match de {
            DutyCycleError::Store(msg) => format!(
                "What happened: Persisted variables could not be written ({msg}).\nLikely causes: State file directory missing, read-only or full.\nHow to fix: Check [persistence].state_file; the peer keeps running but a restart will not resume."
            ),
            DutyCycleError::Transport(msg) => format!(
                "What happened: The radio rejected a packet ({msg}).\nLikely causes: Radio interface down or busy.\nHow to fix: Check the radio and rerun with --log-level=debug."
            ),
            DutyCycleError::Thread(msg) => format!(
                "What happened: A worker thread could not be started ({msg}).\nLikely causes: Resource limits.\nHow to fix: Check ulimits and available memory."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("needs --config") {
        return format!("{msg}\nHow to fix: Pass --config <FILE> pointing at the peer's TOML config.");
    }

    if lower.contains("invalid config") {
        let cause = err.root_cause();
        return format!(
            "What happened: Configuration is invalid: {cause}.\nHow to fix: Edit the TOML config and try again."
        );
    }

    if lower.contains("config") && (lower.contains("read") || lower.contains("pars")) {
        let cause = err.root_cause();
        return format!(
            "What happened: The config file could not be loaded ({msg}).\nCause: {cause}\nHow to fix: Check the path and the TOML syntax."
        );
    }

    if lower.contains("state file") {
        let cause = err.root_cause();
        return format!(
            "What happened: The state file could not be opened ({msg}).\nCause: {cause}\nHow to fix: Fix or remove the file; a missing file starts with defaults."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error family; anything untyped returns 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    match err.downcast_ref::<DutyCycleError>() {
        Some(DutyCycleError::Config(_)) => 3,
        Some(DutyCycleError::Store(_)) => 4,
        Some(DutyCycleError::Transport(_)) => 5,
        Some(DutyCycleError::Thread(_)) => 6,
        Some(DutyCycleError::State(_)) | None => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingAddress => "MissingAddress",
            BuildError::MissingTransport => "MissingTransport",
            BuildError::MissingStore => "MissingStore",
            BuildError::InvalidConfig(_) => "InvalidConfig",
        };
    }
    match err.downcast_ref::<DutyCycleError>() {
        Some(DutyCycleError::Store(_)) => "Store",
        Some(DutyCycleError::Transport(_)) => "Transport",
        Some(DutyCycleError::Config(_)) => "Config",
        Some(DutyCycleError::State(_)) => "State",
        Some(DutyCycleError::Thread(_)) => "Thread",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "message": humanize(err),
        "exit_code": exit_code_for_error(err),
    })
    .to_string()
}
