#![doc = include_str!("../README.md")]

pub mod dispatch;
pub mod error;
pub mod link;
pub mod serial;

#[cfg(test)]
mod test_util;

pub use link::{LinkCommand, LinkStatus, Pppos, PpposConfig};
