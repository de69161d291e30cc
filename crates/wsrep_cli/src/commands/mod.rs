//! CLI command implementations.

pub mod monitor;
pub mod registry;

use wsrep_testkit::StressTestResult;

/// Prints a stress report and fails if any invariant was violated.
pub fn report(
    name: &str,
    result: &StressTestResult,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(result)?),
        "text" => result.print_summary(name),
        other => return Err(format!("Unknown output format: {other}").into()),
    }

    if result.violations > 0 {
        return Err(format!("{name}: {} invariant violations", result.violations).into());
    }
    Ok(())
}
