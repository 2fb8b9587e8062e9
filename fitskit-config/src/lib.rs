use envconfig::Envconfig;
use lazy_static::lazy_static;

/// Size of one FITS block in bytes.
pub const BLOCK_SIZE: usize = 2880;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "FITSKIT_LOG_LEVEL", default = "info")]
    pub log_level: String,
    /// Bytes of I/O buffer the in-memory backends pretend to have.
    /// The default mirrors CFITSIO: 40 buffers of one block each.
    #[envconfig(from = "FITSKIT_IO_BUFFER_BYTES", default = "115200")]
    pub io_buffer_bytes: usize,
    /// Upper bound on the number of rows moved per chunk, 0 to follow the backend hint.
    #[envconfig(from = "FITSKIT_MAX_CHUNK_ROWS", default = "0")]
    pub max_chunk_rows: usize,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }

    /// Number of rows of `row_width` bytes which fit in the I/O buffer, at least 1.
    pub fn buffer_rows(&self, row_width: usize) -> usize {
        if row_width == 0 {
            return self.io_buffer_bytes.max(1);
        }
        (self.io_buffer_bytes / row_width).max(1)
    }

    /// Clamp a backend chunk hint with the configured maximum.
    pub fn chunk_rows(&self, hint: usize) -> usize {
        let hint = hint.max(1);
        match self.max_chunk_rows {
            0 => hint,
            max => hint.min(max),
        }
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(io_buffer_bytes: usize, max_chunk_rows: usize) -> Config {
        Config {
            log_level: "info".to_string(),
            io_buffer_bytes,
            max_chunk_rows,
        }
    }

    #[test]
    fn buffer_rows_divides_buffer_by_row_width() {
        let config = config(40 * BLOCK_SIZE, 0);
        assert_eq!(config.buffer_rows(16), 7200);
        assert_eq!(config.buffer_rows(0), 40 * BLOCK_SIZE);
        assert_eq!(config.buffer_rows(200_000), 1);
    }

    #[test]
    fn chunk_rows_honors_override() {
        assert_eq!(config(BLOCK_SIZE, 0).chunk_rows(500), 500);
        assert_eq!(config(BLOCK_SIZE, 64).chunk_rows(500), 64);
        assert_eq!(config(BLOCK_SIZE, 64).chunk_rows(10), 10);
        assert_eq!(config(BLOCK_SIZE, 0).chunk_rows(0), 1);
    }
}
