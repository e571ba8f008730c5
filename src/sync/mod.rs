mod engagement;
mod merger;
mod paginator;

pub use engagement::*;
pub use merger::*;
pub use paginator::*;
