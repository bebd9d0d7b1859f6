mod card;
mod client;
mod fuel_type;
mod operation;
mod station;
mod units;

pub use card::*;
pub use client::*;
pub use fuel_type::*;
pub use operation::*;
pub use station::*;
pub use units::*;
