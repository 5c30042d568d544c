pub mod dictionary;
pub mod interval;
pub mod virtual_offset;

pub use dictionary::{DictionaryError, SequenceDictionary};
pub use interval::{Interval, RawInterval};
pub use virtual_offset::VirtualOffset;
