//! Writer configuration and memory profiles

/// What to do when text contains a character XML cannot carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InvalidCharPolicy {
    /// Return `ExcelError::InvalidCharacter` with the offending position
    #[default]
    Fail,
    /// Drop the character and keep going
    Skip,
}

/// Options for a workbook writer, fixed at construction time
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WriterOptions {
    /// Deflate level, 0-9
    pub compression_level: u32,
    /// Emit `r` on every row and cell, not only after gaps
    pub always_emit_references: bool,
    pub invalid_char_policy: InvalidCharPolicy,
    /// Buffered XML is pushed to the archive once it reaches this many bytes
    pub flush_threshold: usize,
    /// Write ZIP64 records (needed above 4 GiB or 65 535 entries).
    /// Only the `from_writer` package honors it; the file-backed `create` rejects it.
    pub zip64: bool,
}

impl Default for WriterOptions {
    fn default() -> Self {
        WriterOptions {
            compression_level: 6,
            always_emit_references: false,
            invalid_char_policy: InvalidCharPolicy::Fail,
            flush_threshold: 64 * 1024,
            zip64: false,
        }
    }
}

impl WriterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set deflate level (clamped to 9)
    pub fn compression_level(mut self, level: u32) -> Self {
        self.compression_level = level.min(9);
        self
    }

    pub fn always_emit_references(mut self, value: bool) -> Self {
        self.always_emit_references = value;
        self
    }

    pub fn invalid_char_policy(mut self, policy: InvalidCharPolicy) -> Self {
        self.invalid_char_policy = policy;
        self
    }

    pub fn flush_threshold(mut self, bytes: usize) -> Self {
        self.flush_threshold = bytes.max(1);
        self
    }

    pub fn zip64(mut self, value: bool) -> Self {
        self.zip64 = value;
        self
    }

    /// Apply a memory profile's flush threshold
    pub fn memory_profile(self, profile: MemoryProfile) -> Self {
        self.flush_threshold(profile.flush_threshold())
    }
}

/// Memory profile for different deployment sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProfile {
    /// Small pods (< 512MB): flush at 16KB
    Low,
    /// Medium pods (512MB-1GB): flush at 64KB
    Medium,
    /// Large pods (> 1GB): flush at 256KB
    High,
    /// Explicit threshold in bytes
    Custom { flush_threshold: usize },
}

impl MemoryProfile {
    /// Pick a profile from a memory limit in MB
    pub fn from_memory_mb(memory_mb: usize) -> Self {
        if memory_mb < 512 {
            MemoryProfile::Low
        } else if memory_mb < 1024 {
            MemoryProfile::Medium
        } else {
            MemoryProfile::High
        }
    }

    /// Detect from the `MEMORY_LIMIT_MB` environment variable
    pub fn from_env() -> Self {
        std::env::var("MEMORY_LIMIT_MB")
            .ok()
            .and_then(|s| s.parse::<usize>().ok())
            .map(Self::from_memory_mb)
            .unwrap_or(MemoryProfile::High)
    }

    pub fn flush_threshold(&self) -> usize {
        match self {
            MemoryProfile::Low => 16 * 1024,
            MemoryProfile::Medium => 64 * 1024,
            MemoryProfile::High => 256 * 1024,
            MemoryProfile::Custom { flush_threshold } => *flush_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_profile_from_mb() {
        assert_eq!(MemoryProfile::from_memory_mb(256), MemoryProfile::Low);
        assert_eq!(MemoryProfile::from_memory_mb(768), MemoryProfile::Medium);
        assert_eq!(MemoryProfile::from_memory_mb(2048), MemoryProfile::High);
    }

    #[test]
    fn test_options_builder() {
        let options = WriterOptions::new()
            .compression_level(42)
            .memory_profile(MemoryProfile::Low)
            .invalid_char_policy(InvalidCharPolicy::Skip);

        assert_eq!(options.compression_level, 9);
        assert_eq!(options.flush_threshold, 16 * 1024);
        assert_eq!(options.invalid_char_policy, InvalidCharPolicy::Skip);
        assert!(!options.zip64);
    }
}
