//! # Domain Models
//!
//! Configuration types and shared constants for the `splus` workspace.
//! Keep it lean: no I/O, networking, or heavy logic. Just data and simple helpers.

pub mod config;
pub mod constants;
