pub mod bypass;
pub mod proxy;
pub mod response;

pub use bypass::*;
pub use proxy::*;
pub use response::*;
