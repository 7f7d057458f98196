pub mod error;
pub mod hex;
pub mod mode;
pub mod header;
pub mod padding;
pub mod entry;
pub mod io_stream;
pub mod archive;
pub mod extract;

pub use error::{CpioError, ErrorKind, Result};
pub use header::{CpioHeader, is_valid_magic};
pub use entry::{CpioEntry, EntryName};
pub use io_stream::{CpioReader, CpioWriter, WriteOptions};
pub use archive::{Archive, OpenMode};
pub use extract::{extract, ExtractOptions, ExtractStats};
