mod codecs;
pub use codecs::*;

mod session;
pub use session::*;
