#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod backend;
pub use backend::*;

mod config;
pub use config::*;

mod frame;
pub use frame::*;

mod packet;
pub use packet::*;
