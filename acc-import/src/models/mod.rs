mod import;
mod requests;
mod session;

pub use import::*;
pub use requests::*;
pub use session::*;
