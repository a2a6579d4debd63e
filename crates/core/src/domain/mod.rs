mod options;
mod research;
mod session;
mod snapshot;

pub use options::*;
pub use research::*;
pub use session::*;
pub use snapshot::*;
