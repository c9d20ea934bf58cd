//! Role-Based Access Control
//!
//! Every inbound request passes through [`AccessGate::authorize`] before it
//! is dispatched. The gate is a pure decision table:
//!
//! - public path prefixes are always allowed
//! - anonymous requests are sent to the login page
//! - superusers and administrators bypass the tables
//! - everyone else needs the operation in their role's allow-list, or a
//!   request path under one of their role's path prefixes
//!
//! The tables themselves live in [`permissions`] and are built once.

pub mod gate;
pub mod operations;
pub mod permissions;
pub mod roles;

pub use gate::*;
pub use operations::*;
pub use permissions::*;
pub use roles::*;
