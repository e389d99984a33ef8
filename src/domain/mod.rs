pub mod io;
pub mod price_table;
pub mod weights;
pub mod yields;

pub use price_table::*;
pub use weights::*;
