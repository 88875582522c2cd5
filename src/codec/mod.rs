//! Low-level binary building blocks shared by both chart formats.

pub mod stream;
pub mod string_pool;

pub use stream::{ByteReader, ByteWriter, Endian};
pub use string_pool::{DecodeMode, PoolIndex, StringPoolBuilder};
