//! Fixed limits of the GBLN format and its configuration.

/// Capacity buckets for foreign string slots, ascending.
///
/// A string is stored in the smallest bucket that holds its character count.
pub const STRING_CAPACITY_BUCKETS: [usize; 10] = [2, 4, 8, 16, 32, 64, 128, 256, 512, 1024];

/// Maximum string length in characters (the largest bucket).
pub const MAX_STRING_CHARS: usize = 1024;

/// Highest accepted XZ compression level.
pub const MAX_COMPRESSION_LEVEL: u8 = 9;

/// Highest accepted indentation width for the pretty format.
pub const MAX_INDENT: usize = 16;

/// Compression level used by [`Config::io_default`](crate::Config::io_default).
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

/// Indentation width used by the default configurations.
pub const DEFAULT_INDENT: usize = 2;
