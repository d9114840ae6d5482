//! Size and shape limits enforced on documents.

use thiserror::Error;

/// Maximum encoded size of a single document, in bytes.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Maximum nesting depth of a document/array value tree.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Maximum length of a dotted field path (e.g. in `distinct`, update operators).
pub const MAX_PATH_LENGTH: usize = 256;

/// Maximum number of elements in a single array value.
pub const MAX_ARRAY_SIZE: usize = 1_000_000;

/// A document or path exceeded one of the fixed limits above.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimitError {
    /// Document exceeds [`MAX_DOCUMENT_SIZE`].
    #[error("document too large: {size} bytes exceeds limit of {limit}")]
    DocumentTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// The configured limit.
        limit: usize,
    },

    /// Value tree exceeds [`MAX_NESTING_DEPTH`].
    #[error("nesting too deep: {depth} exceeds limit of {limit}")]
    NestingTooDeep {
        /// Actual nesting depth.
        depth: usize,
        /// The configured limit.
        limit: usize,
    },

    /// Dotted path exceeds [`MAX_PATH_LENGTH`].
    #[error("path too long: {length} exceeds limit of {limit}")]
    PathTooLong {
        /// Actual path length.
        length: usize,
        /// The configured limit.
        limit: usize,
    },

    /// Array exceeds [`MAX_ARRAY_SIZE`].
    #[error("array too large: {size} exceeds limit of {limit}")]
    ArrayTooLarge {
        /// Actual array length.
        size: usize,
        /// The configured limit.
        limit: usize,
    },
}

/// Checks a value tree's nesting depth against [`MAX_NESTING_DEPTH`].
pub fn check_nesting_depth(depth: usize) -> Result<(), LimitError> {
    if depth > MAX_NESTING_DEPTH {
        Err(LimitError::NestingTooDeep {
            depth,
            limit: MAX_NESTING_DEPTH,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesting_depth_within_limit_is_ok() {
        assert!(check_nesting_depth(MAX_NESTING_DEPTH).is_ok());
    }

    #[test]
    fn nesting_depth_beyond_limit_errors() {
        let err = check_nesting_depth(MAX_NESTING_DEPTH + 1).unwrap_err();
        assert!(matches!(err, LimitError::NestingTooDeep { .. }));
    }
}
