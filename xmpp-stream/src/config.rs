//! Transport configuration.

/// Default maximum encoded size of a single token frame.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// Framed token transport configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Max frame size in bytes. Larger incoming or outgoing frames are
    /// rejected as transport errors.
    pub max_frame_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl StreamConfig {
    /// Set a custom frame size limit.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = StreamConfig::default();
        assert_eq!(config.max_frame_size, 65536);
    }

    #[test]
    fn custom_config() {
        let config = StreamConfig::default().with_max_frame_size(128);
        assert_eq!(config.max_frame_size, 128);
    }
}
