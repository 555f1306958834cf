pub mod jsonl_reader;

pub use jsonl_reader::{PacketFileReader, ReaderError};
