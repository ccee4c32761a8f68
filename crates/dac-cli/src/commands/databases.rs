//! `dac databases` command implementation.

use dac_core::DacConfig;

pub fn run(config: &DacConfig) {
    let summary = config.database_summary();
    if summary.is_empty() {
        println!("No databases configured.");
        return;
    }
    for (name, description) in summary {
        if description.is_empty() {
            println!("{name}");
        } else {
            println!("{name}: {description}");
        }
    }
}
