//! `doctor` command (spec.md 4.10).

use crate::core::doctor;
use crate::error::Result;

pub fn run(json: bool) -> Result<()> {
    let report = doctor::run();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for check in &report.checks {
            if check.ok {
                crate::cli::output::success(&format!("{}: {}", check.name, check.details));
            } else {
                crate::cli::output::error(&format!("{}: {}", check.name, check.details));
                if let Some(hint) = &check.hint {
                    crate::cli::output::hint(hint);
                }
            }
        }
    }

    if report.ok {
        Ok(())
    } else {
        std::process::exit(1);
    }
}
