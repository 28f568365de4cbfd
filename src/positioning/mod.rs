//! Tag position resolution from anchor range reports

pub mod multilateration;

pub use multilateration::Multilateration;
