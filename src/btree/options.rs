use crate::btree::merge::DEFAULT_MERGE_THRESHOLD;
use crate::btree::node::{MAX_KEY_SIZE, MAX_VALUE_SIZE};
use crate::error::{Result, TreeError};
use crate::storage::page::PAGE_SIZE;

/// Configuration supplied when creating or opening a [`super::BTree`].
///
/// The size limits may be tightened below the page-format bounds but never
/// raised above them: the split logic relies on any single entry fitting
/// in one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeOptions {
    /// Maximum key length in bytes (1..=1000).
    pub max_key_size: usize,
    /// Maximum value length in bytes (0..=3000).
    pub max_value_size: usize,
    /// A child that shrinks to this many bytes or fewer after a delete
    /// tries to merge with a sibling.
    pub merge_threshold: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            max_key_size: MAX_KEY_SIZE,
            max_value_size: MAX_VALUE_SIZE,
            merge_threshold: DEFAULT_MERGE_THRESHOLD,
        }
    }
}

impl TreeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_key_size == 0 || self.max_key_size > MAX_KEY_SIZE {
            return Err(TreeError::Config(format!(
                "max_key_size must be in 1..={}, got {}",
                MAX_KEY_SIZE, self.max_key_size
            )));
        }
        if self.max_value_size > MAX_VALUE_SIZE {
            return Err(TreeError::Config(format!(
                "max_value_size must be at most {}, got {}",
                MAX_VALUE_SIZE, self.max_value_size
            )));
        }
        if self.merge_threshold > PAGE_SIZE {
            return Err(TreeError::Config(format!(
                "merge_threshold must be at most {}, got {}",
                PAGE_SIZE, self.merge_threshold
            )));
        }
        Ok(())
    }

    pub(crate) fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(TreeError::EmptyKey);
        }
        if key.len() > self.max_key_size {
            return Err(TreeError::KeyTooLarge {
                len: key.len(),
                max: self.max_key_size,
            });
        }
        Ok(())
    }

    pub(crate) fn check_value(&self, value: &[u8]) -> Result<()> {
        if value.len() > self.max_value_size {
            return Err(TreeError::ValueTooLarge {
                len: value.len(),
                max: self.max_value_size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let opts = TreeOptions::default();
        opts.validate().unwrap();
        assert_eq!(opts.max_key_size, 1000);
        assert_eq!(opts.max_value_size, 3000);
        assert_eq!(opts.merge_threshold, 1024);
    }

    #[test]
    fn test_limits_above_page_bounds_rejected() {
        let opts = TreeOptions {
            max_key_size: MAX_KEY_SIZE + 1,
            ..TreeOptions::default()
        };
        assert!(matches!(opts.validate(), Err(TreeError::Config(_))));

        let opts = TreeOptions {
            max_value_size: MAX_VALUE_SIZE + 1,
            ..TreeOptions::default()
        };
        assert!(matches!(opts.validate(), Err(TreeError::Config(_))));

        let opts = TreeOptions {
            merge_threshold: PAGE_SIZE + 1,
            ..TreeOptions::default()
        };
        assert!(matches!(opts.validate(), Err(TreeError::Config(_))));

        let opts = TreeOptions {
            max_key_size: 0,
            ..TreeOptions::default()
        };
        assert!(matches!(opts.validate(), Err(TreeError::Config(_))));
    }

    #[test]
    fn test_check_key_and_value() {
        let opts = TreeOptions {
            max_key_size: 4,
            max_value_size: 2,
            ..TreeOptions::default()
        };
        assert!(matches!(opts.check_key(b""), Err(TreeError::EmptyKey)));
        assert!(opts.check_key(b"abcd").is_ok());
        assert!(matches!(
            opts.check_key(b"abcde"),
            Err(TreeError::KeyTooLarge { len: 5, max: 4 })
        ));
        assert!(opts.check_value(b"").is_ok());
        assert!(matches!(
            opts.check_value(b"xyz"),
            Err(TreeError::ValueTooLarge { len: 3, max: 2 })
        ));
    }
}
