//! Population and individual types

pub mod individual;
#[allow(clippy::module_inception)]
pub mod population;

pub use individual::{Individual, Provenance};
pub use population::Population;

/// Prelude for population module
pub mod prelude {
    pub use super::individual::{Individual, Provenance};
    pub use super::population::Population;
}
