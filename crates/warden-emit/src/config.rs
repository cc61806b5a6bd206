use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmitterConfig {
    pub use_colors: bool,
    pub verbosity: VerbosityLevel,
    /// Append the patched source to text and markdown output.
    pub include_patch: bool,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            use_colors: true,
            verbosity: VerbosityLevel::Normal,
            include_patch: false,
        }
    }
}

impl EmitterConfig {
    pub fn plain() -> Self {
        Self {
            use_colors: false,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerbosityLevel {
    Quiet,
    Normal,
    Verbose,
    Debug,
}

impl VerbosityLevel {
    /// Maps a repeated `-v` count onto a level.
    pub fn from_occurrences(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Normal,
            1 => VerbosityLevel::Verbose,
            _ => VerbosityLevel::Debug,
        }
    }

    pub fn should_print_findings(&self) -> bool {
        !matches!(self, VerbosityLevel::Quiet)
    }

    pub fn should_print_edits(&self) -> bool {
        matches!(self, VerbosityLevel::Verbose | VerbosityLevel::Debug)
    }

    pub fn should_print_resolutions(&self) -> bool {
        matches!(self, VerbosityLevel::Verbose | VerbosityLevel::Debug)
    }

    pub fn should_print_ids(&self) -> bool {
        matches!(self, VerbosityLevel::Debug)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_occurrences() {
        assert_eq!(VerbosityLevel::from_occurrences(0), VerbosityLevel::Normal);
        assert_eq!(VerbosityLevel::from_occurrences(1), VerbosityLevel::Verbose);
        assert_eq!(VerbosityLevel::from_occurrences(5), VerbosityLevel::Debug);
        assert!(VerbosityLevel::Verbose.should_print_edits());
        assert!(!VerbosityLevel::Quiet.should_print_findings());
        assert!(!VerbosityLevel::Verbose.should_print_ids());
    }
}
