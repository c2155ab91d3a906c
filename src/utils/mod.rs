//! The utilities module provides general capabilities that may span the
//! input modeling, station, and simulator modules.  The utilities are
//! centered around error handling and time unit conversion.

pub mod errors;

// Simulation time is dimensionless.  The helpers below fix the convention
// used throughout flowsim: one unit of simulation time is one hour.

pub fn minutes(minutes: f64) -> f64 {
    minutes / 60.0
}

pub fn hours(hours: f64) -> f64 {
    hours
}

pub fn days(days: f64) -> f64 {
    days * 24.0
}

pub fn weeks(weeks: f64) -> f64 {
    weeks * 7.0 * 24.0
}
