// SPDX-License-Identifier: GPL-3.0-only

//! CLI output for device discovery, sensor options and run summaries

use depth_roi::backends::{DepthSource, describe_options, enumerate_depth_devices};
use depth_roi::session::RunSummary;

/// List all V4L2 video nodes
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = enumerate_depth_devices();

    if devices.is_empty() {
        println!("No V4L2 devices found.");
        return Ok(());
    }

    println!("Available devices:");
    println!();
    for (index, device) in devices.iter().enumerate() {
        println!("  [{}] {}", index, device.card);
        println!("      Path:   {}", device.path);
        println!("      Driver: {}", device.driver);
        println!(
            "      Depth:  {}",
            if device.has_z16 { "Z16" } else { "not available" }
        );
        println!();
    }

    if !devices.iter().any(|d| d.has_z16) {
        println!("None of the devices stream 16-bit depth.");
    }

    Ok(())
}

/// Print every sensor option with its description and current value
pub fn print_options(source: &dyn DepthSource) {
    println!("{}", source.descriptor());
    println!("Sensor supports the following options:");
    println!();

    for (index, report) in describe_options(source).iter().enumerate() {
        print!("  {}: {}", index, report.option);

        if !report.supported {
            println!(" is not supported");
            continue;
        }

        println!();
        println!("       Description   : {}", report.option.description());
        match report.value {
            Some(value) => println!("       Current Value : {}", value),
            None => println!("       Current Value : unavailable"),
        }
        if let Some(range) = report.range {
            println!(
                "       Range         : {} .. {} (step {}, default {})",
                range.min, range.max, range.step, range.default
            );
        }
    }
}

pub fn print_summary(summary: &RunSummary) {
    println!("Frames:      {}", summary.frames);
    match summary.region {
        Some(roi) => println!("Region:      {}", roi),
        None => println!("Region:      none"),
    }
    println!("Candidates:  {}", summary.candidates_seen);
    println!("Scaling:     {:.1}", summary.final_scaling);
    if summary.acquisition_errors > 0 {
        println!("Frame errors: {}", summary.acquisition_errors);
    }
    if summary.snapshot_written {
        println!("Snapshot written.");
    }
}
