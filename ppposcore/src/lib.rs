#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod accm;
pub mod chain;
pub mod decode;
pub mod fcs;
pub mod frame;
pub mod proto;
pub mod stats;
pub mod vj;
