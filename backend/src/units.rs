use shared::PaceUnit;

pub fn meters_to_units(meters: f64, unit: PaceUnit) -> f64 {
    meters / unit.meters()
}

/// Convert seconds-per-unit between km and mi.
pub fn convert_pace(seconds_per_unit: f64, from: PaceUnit, to: PaceUnit) -> f64 {
    seconds_per_unit / from.meters() * to.meters()
}

/// `H:MM:SS`, rounded to the nearest second. Negative or non-finite input
/// formats as `0:00:00`.
pub fn format_duration(seconds: f64) -> String {
    let total = if seconds.is_finite() { seconds.max(0.0).round() as u64 } else { 0 };
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    format!("{h}:{m:02}:{s:02}")
}

/// `M:SS /km` style pace label.
pub fn format_pace(seconds_per_unit: Option<f64>, unit: PaceUnit) -> String {
    match seconds_per_unit.filter(|p| p.is_finite() && *p >= 0.0) {
        Some(pace) => {
            let total = pace.round() as u64;
            format!("{}:{:02} /{}", total / 60, total % 60, unit.label())
        }
        None => "--".to_string(),
    }
}
