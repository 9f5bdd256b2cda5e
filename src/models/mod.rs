pub mod bulk;
pub mod record;

pub use bulk::*;
pub use record::*;
