//! Human-readable error descriptions and structured JSON error formatting.

use crate::cli::LAST_DEVICE;
use miscale_core::error::{BuildError, ScaleError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingTransport => {
                "What happened: No scale transport was configured.\nLikely causes: The Bluetooth backend failed to initialize before the session was built.\nHow to fix: Rerun with --sim to check the rest of the pipeline, or build with --features ble.".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No measurement store was configured.\nLikely causes: The database could not be opened.\nHow to fix: Check [store] path in the config or DB_PATH.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Out-of-range values in [stability] or [runner].\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::InvalidProfile(msg) => format!(
                "What happened: The user profile is invalid ({msg}).\nLikely causes: AGE, HEIGHT_CM or GENDER set to an unusable value.\nHow to fix: Pass --age, --height-cm and --gender (male|female), or fix [profile] in the config."
            ),
            ScaleError::SessionAlreadyRunning => {
                "What happened: A weigh-in is already in progress.\nLikely causes: A previous session has not finished.\nHow to fix: Wait for it to finish or stop it first.".to_string()
            }
            ScaleError::Cancelled => {
                "What happened: Measurement stopped before the weight settled.\nLikely causes: Interrupted with Ctrl-C.\nHow to fix: Run `miscale weigh` again and stand still until it completes.".to_string()
            }
            ScaleError::Timeout => {
                "What happened: The scale did not respond in time.\nLikely causes: You stepped off, the scale went to sleep, or it is out of range.\nHow to fix: Step on the scale again and rerun; raise scale.notify_timeout_ms if the link is slow.".to_string()
            }
            ScaleError::TransportFailure(msg) => format!(
                "What happened: Lost contact with the scale ({msg}).\nLikely causes: Bluetooth adapter off, wrong SCALE_MAC, or the scale is out of range.\nHow to fix: Check the adapter, verify the address with a BLE scanner, and move closer."
            ),
            ScaleError::PersistenceFailure(msg) => format!(
                "What happened: The measurement could not be saved ({msg}).\nLikely causes: Database path not writable or disk full.\nHow to fix: Check [store] path or DB_PATH and free disk space."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("bluetooth") || lower.contains("adapter") {
        return "What happened: Bluetooth is not available.\nLikely causes: No adapter present, adapter powered off, or missing permissions.\nHow to fix: Enable the adapter and check permissions, or use --sim.".to_string();
    }

    if lower.contains("database") || lower.contains("schema") {
        return format!(
            "What happened: The measurement database could not be used.\nLikely causes: Wrong path, no permission, or a database written by a newer version.\nHow to fix: Check [store] path or DB_PATH. Original: {msg}"
        );
    }

    if lower.contains("config") || lower.contains("must be") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range values in the TOML or environment overrides.\nHow to fix: Edit the TOML config or environment and try again."
        );
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes per error kind; anything untyped is 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::Cancelled) => 2,
        Some(ScaleError::TransportFailure(_)) => 3,
        Some(ScaleError::Timeout) => 4,
        Some(ScaleError::PersistenceFailure(_)) => 5,
        Some(ScaleError::InvalidProfile(_)) => 6,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = err
        .downcast_ref::<ScaleError>()
        .map_or("Error", ScaleError::kind);
    let mut obj = json!({ "reason": reason, "message": humanize(err) });
    if let Some(device) = LAST_DEVICE.get() {
        obj["details"] = json!({ "device": device });
    }
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_are_stable() {
        let code = |e: ScaleError| exit_code_for_error(&eyre::Report::new(e));
        assert_eq!(code(ScaleError::Cancelled), 2);
        assert_eq!(code(ScaleError::TransportFailure("x".into())), 3);
        assert_eq!(code(ScaleError::Timeout), 4);
        assert_eq!(code(ScaleError::PersistenceFailure("x".into())), 5);
        assert_eq!(code(ScaleError::InvalidProfile("x".into())), 6);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn typed_errors_get_specific_text() {
        let msg = humanize(&eyre::Report::new(ScaleError::Timeout));
        assert!(msg.starts_with("What happened: The scale did not respond in time"));
        let msg = humanize(&eyre::eyre!("no bluetooth adapter available"));
        assert!(msg.contains("Bluetooth is not available"));
    }

    #[test]
    fn json_carries_kind() {
        let s = format_error_json(&eyre::Report::new(ScaleError::PersistenceFailure(
            "disk full".into(),
        )));
        let v: serde_json::Value = serde_json::from_str(&s).expect("json");
        assert_eq!(v["reason"], "PersistenceFailure");
        assert!(v["message"].as_str().is_some_and(|m| m.contains("disk full")));
    }
}
