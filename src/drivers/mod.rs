//! Hardware bindings for the [`ServoBus`](crate::robot::servo::ServoBus) contract.
pub mod lx16a;
