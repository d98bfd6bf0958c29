/// Regular expression literal: pattern CString + options CString
/// (spec §3 RegularExpression row).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Regex {
    pattern: String,
    options: String,
}

impl Regex {
    pub fn new(pattern: impl Into<String>, options: impl Into<String>) -> Self {
        Regex {
            pattern: pattern.into(),
            options: options.into(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn options(&self) -> &str {
        &self.options
    }

    pub fn serialized_len(&self) -> usize {
        self.pattern.len() + 1 + self.options.len() + 1
    }
}
