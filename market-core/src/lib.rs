pub mod cart;
pub mod catalog;
pub mod envelope;
pub mod format;
pub mod load;
pub mod model;
pub mod ports;

pub use cart::*;
pub use catalog::*;
pub use envelope::*;
pub use load::*;
pub use model::*;
pub use ports::*;
