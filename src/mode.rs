//! Startup selection of the telemetry source.
//!
//! Sampled once; the chosen mode holds for the lifetime of the process.

use std::fs;
use tracing::{info, warn};

use crate::config::ModeConfig;
use crate::telemetry::SourceMode;

/// Pick live or synthetic telemetry
///
/// Priority: the `--synthetic` command line flag, then the select input at
/// `mode.select_path` (`0` selects synthetic), then `mode.synthetic`.
pub fn select_mode(cli_synthetic: bool, config: &ModeConfig) -> SourceMode {
    if cli_synthetic {
        info!("Synthetic mode selected on the command line");
        return SourceMode::Synthetic;
    }

    if let Some(path) = config.select_path.as_deref() {
        match fs::read_to_string(path) {
            Ok(value) => {
                let asserted = value.trim() == "0";
                info!("Mode select input {} reads {:?}", path, value.trim());
                return if asserted {
                    SourceMode::Synthetic
                } else {
                    SourceMode::Live
                };
            }
            Err(e) => warn!("Cannot read mode select input {}: {}", path, e),
        }
    }

    if config.synthetic {
        SourceMode::Synthetic
    } else {
        SourceMode::Live
    }
}
