//! Reference document adapters.

mod in_memory_reader;

pub use in_memory_reader::InMemoryDocumentReader;
