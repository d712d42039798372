pub mod tariff;
pub mod weather;

pub use tariff::*;
pub use weather::*;
