//! Wire key names.

/// Original client-side filename (no path separators allowed).
pub const FILENAME: &str = "resumableFilename";

/// Declared total size of the file in bytes.
pub const TOTAL_SIZE: &str = "resumableTotalSize";

/// 1-based index of the chunk carried by this request.
pub const CHUNK_NUMBER: &str = "resumableChunkNumber";

/// Size in bytes of the chunk carried by this request.
pub const CURRENT_CHUNK_SIZE: &str = "resumableCurrentChunkSize";

/// Nominal chunk size configured on the client.
pub const CHUNK_SIZE: &str = "resumableChunkSize";

/// Number of chunks the client will send.
pub const TOTAL_CHUNKS: &str = "resumableTotalChunks";

/// Client-generated upload identifier.
pub const IDENTIFIER: &str = "resumableIdentifier";

/// Relative path of the file on the client (directory uploads).
pub const RELATIVE_PATH: &str = "resumableRelativePath";

/// MIME type reported by the browser.
pub const CONTENT_TYPE: &str = "resumableType";

/// Keys every chunk request must carry.
pub const REQUIRED_KEYS: [&str; 4] = [FILENAME, TOTAL_SIZE, CHUNK_NUMBER, CURRENT_CHUNK_SIZE];
