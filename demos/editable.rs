//! Monthly demand per region as an editable surface.
//!
//! Hover a point to highlight it, drag it up or down to change the value.
//! Left drag on empty space orbits, shift + drag pans, the wheel zooms.

use bevy_math::UVec2;
use vidi_surface::prelude::*;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];
const REGIONS: [&str; 6] = ["North", "East", "South", "West", "Central", "Islands"];

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    let container = SharedContainer::new(UVec2::new(1280, 720));
    let config = SurfaceConfig::new(0.0, 100.0)
        .x_axis(MONTHS)
        .y_axis(REGIONS)
        .data(seasonal_demand())
        .on_change(|change| {
            tracing::info!(
                month = MONTHS[change.col],
                region = REGIONS[change.row],
                value = change.value,
                "demand edited"
            );
            Ok(())
        });

    let chart = match SurfaceChart::new(config, container.clone()) {
        Ok(chart) => chart,
        Err(report) => {
            eprintln!("failed to build chart: {report:?}");
            std::process::exit(1);
        }
    };

    run_surface(SharedChart::new(chart), container);
}

#[cfg(target_arch = "wasm32")]
fn main() {}

/// Summer peak that shifts later the further south a region is.
fn seasonal_demand() -> Vec<Vec<f64>> {
    (0..REGIONS.len())
        .map(|row| {
            let peak = 5.0 + row as f64 * 0.6;
            (0..MONTHS.len())
                .map(|col| {
                    let d = (col as f64 - peak) / 2.5;
                    15.0 + 70.0 * (-d * d).exp() + 5.0 * (row as f64 * 1.3).sin()
                })
                .collect()
        })
        .collect()
}
