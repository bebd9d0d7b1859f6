/// Fuel quantities are liters, stored and exchanged as floating point.
/// The external 1C integration contract uses plain JSON floats, so the
/// whole pipeline stays in f64 instead of a fixed-point representation.
pub type Liters = f64;

/// Currency values (price per liter, operation amounts).
pub type Money = f64;
