//! Hiwonder LX-16A serial bus servos.
pub mod driver;
pub mod protocol;

pub use driver::Lx16aBus;
