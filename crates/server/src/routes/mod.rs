mod analysis;
mod health;
mod sessions;

pub use analysis::*;
pub use health::*;
pub use sessions::*;
