//! Domain types for Stockcast

pub mod bar;
pub mod horizon;
pub mod record;

pub use bar::{Bar, BarError};
pub use horizon::{months_to_horizon, Horizon, HorizonParseError, CANONICAL_HORIZONS};
pub use record::{Forecast, Predictions, SymbolRecord};

/// Symbol type alias
pub type Symbol = String;

/// Round to 2 decimal places for presentation stability.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
