//! Engine limits and their configuration file.
//!
//! Limits bound how much native memory a single built-in may touch.  They
//! can be loaded from a small `key = value` file:
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `max_string_length` | code units scanned for a NUL terminator | 65536 |
//! | `max_byte_array_length` | bytes `send_byte_array` may copy | 16 MiB |
//! | `max_format_arguments` | operands one format string may consume | 64 |
//!
//! Blank lines and lines starting with `#` or `;` are ignored.

use std::path::Path;

pub const DEFAULT_MAX_STRING_LENGTH: usize = 64 * 1024;
pub const DEFAULT_MAX_BYTE_ARRAY_LENGTH: usize = 16 * 1024 * 1024;
pub const DEFAULT_MAX_FORMAT_ARGUMENTS: usize = 64;

// ── Public API ────────────────────────────────────────────────────────────────

/// A non-fatal problem on one line of a limits file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {message}")]
pub struct ConfigError {
    pub line: usize,
    pub message: String,
}

/// Resource bounds applied while executing a script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_string_length: usize,
    pub max_byte_array_length: usize,
    pub max_format_arguments: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
            max_byte_array_length: DEFAULT_MAX_BYTE_ARRAY_LENGTH,
            max_format_arguments: DEFAULT_MAX_FORMAT_ARGUMENTS,
        }
    }
}

impl Limits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a limits file.
    ///
    /// Recognised keys are applied in order; anything else is reported and
    /// skipped, so a partly wrong file still yields usable limits.
    pub fn load_str(s: &str) -> (Self, Vec<ConfigError>) {
        let mut limits = Limits::new();
        let mut errors = Vec::new();

        for (i, raw) in s.lines().enumerate() {
            let lineno = i + 1;
            let line = raw.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            if let Err(message) = limits.apply(line) {
                errors.push(ConfigError { line: lineno, message });
            }
        }

        (limits, errors)
    }

    /// Read and parse a limits file from disk.
    pub fn load_file(path: &Path) -> std::io::Result<(Self, Vec<ConfigError>)> {
        let s = std::fs::read_to_string(path)?;
        Ok(Self::load_str(&s))
    }

    fn apply(&mut self, line: &str) -> Result<(), String> {
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| format!("expected `key = value`, got `{line}`"))?;
        let key = key.trim();
        let value = parse_size(value.trim()).map_err(|e| format!("{key}: {e}"))?;
        if value == 0 {
            return Err(format!("{key}: must be greater than zero"));
        }
        match key {
            "max_string_length" => self.max_string_length = value,
            "max_byte_array_length" => self.max_byte_array_length = value,
            "max_format_arguments" => self.max_format_arguments = value,
            _ => return Err(format!("unknown key `{key}`")),
        }
        Ok(())
    }
}

// ── Value parsing ─────────────────────────────────────────────────────────────

/// Parse a size with an optional `k`/`m` binary suffix (`64k`, `16M`).
fn parse_size(s: &str) -> Result<usize, String> {
    let (digits, scale) = match s.chars().last() {
        Some('k' | 'K') => (&s[..s.len() - 1], 1024),
        Some('m' | 'M') => (&s[..s.len() - 1], 1024 * 1024),
        _ => (s, 1),
    };
    let n: usize = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid number `{s}`"))?;
    n.checked_mul(scale).ok_or_else(|| format!("`{s}` is too large"))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_gives_defaults() {
        let (limits, errors) = Limits::load_str("");
        assert_eq!(limits, Limits::default());
        assert!(errors.is_empty());
    }

    #[test]
    fn keys_and_comments() {
        let src = "# limits\n\
                   max_string_length = 256\n\
                   ; older comment style\n\
                   max_byte_array_length = 4k\n\
                   max_format_arguments=8\n";
        let (limits, errors) = Limits::load_str(src);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(limits.max_string_length, 256);
        assert_eq!(limits.max_byte_array_length, 4096);
        assert_eq!(limits.max_format_arguments, 8);
    }

    #[test]
    fn megabyte_suffix() {
        let (limits, _) = Limits::load_str("max_byte_array_length = 2M");
        assert_eq!(limits.max_byte_array_length, 2 * 1024 * 1024);
    }

    #[test]
    fn errors_carry_line_numbers() {
        let src = "max_string_length = 10\nbogus = 1\nmax_format_arguments = lots\nnonsense\n";
        let (limits, errors) = Limits::load_str(src);
        assert_eq!(limits.max_string_length, 10);
        assert_eq!(limits.max_format_arguments, DEFAULT_MAX_FORMAT_ARGUMENTS);
        let lines: Vec<usize> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![2, 3, 4]);
        assert_eq!(errors[0].to_string(), "line 2: unknown key `bogus`");
    }

    #[test]
    fn zero_is_rejected() {
        let (limits, errors) = Limits::load_str("max_string_length = 0");
        assert_eq!(limits.max_string_length, DEFAULT_MAX_STRING_LENGTH);
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn load_file_reads_disk() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "max_string_length = 32").unwrap();
        let (limits, errors) = Limits::load_file(f.path()).unwrap();
        assert!(errors.is_empty());
        assert_eq!(limits.max_string_length, 32);
    }
}
