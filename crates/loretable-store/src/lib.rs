//! Record store seam for Loretable.
//!
//! The live session engine delegates all durability to a
//! [`RecordStore`]: session metadata, maps, participation, fog sets,
//! tokens, channels, and messages. This crate defines that contract,
//! the record types it moves, and an in-memory reference
//! implementation ([`MemoryStore`]).

mod error;
mod memory;
mod records;
mod store;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use records::{
    ChannelRecord, MapRecord, MessagePage, NewMessage, NewToken,
    ParticipationRecord, SessionRecord,
};
pub use store::{RecordStore, now_ms};
