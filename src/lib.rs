//!
//! Core of a Data General Nova / Eclipse / MV Eclipse processor emulator:
//! opcode decoding, the execution engine, Main Store, the I/O bus and the
//! channel address translators used by device DMA.
//!

#[macro_use]
extern crate lazy_static;

pub mod bus;
pub mod chan;
pub mod cpu;
pub mod decode;
pub mod err;
pub mod history;
pub mod instr;
pub mod machine;
pub mod mem;
