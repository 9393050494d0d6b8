//! Local persistence: a small key-value store plus the typed records kept
//! in it (cached album PINs, the consent decision).

pub mod consent;
pub mod kv;
pub mod pins;

pub use consent::{ConsentRecord, ConsentStore};
pub use kv::{KvStore, MemoryStore, SqliteStore};
pub use pins::PinCache;
