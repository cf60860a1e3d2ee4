//! ifctl: interface address, route, and tunnel control
//!
//! A library for enumerating interface addresses, decoding the kernel
//! routing table, and adding or removing addresses, routes, and tunnel
//! interfaces through one idempotent resource contract.

pub mod config;
pub mod network;
pub mod resource;
