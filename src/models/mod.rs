pub mod enums;

mod audit;
mod checkup;
mod diagnosis;
mod listing;
mod patient;
mod prescription;
mod profile;

pub use audit::*;
pub use checkup::*;
pub use diagnosis::*;
pub use listing::*;
pub use patient::*;
pub use prescription::*;
pub use profile::*;
