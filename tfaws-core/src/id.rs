//! Composite resource identifiers
//!
//! Resources nested under a parent (a filter under a detector, an alias
//! under a bot) are identified by the parent and child IDs joined with a
//! separator.

use crate::provider::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("minimum number of ID parts: 2, got {0}")]
    TooFewPartsRequested(usize),

    #[error("unexpected format for ID ({id}), expected more than one part")]
    SinglePart { id: String },

    #[error("unexpected format for ID ({id}), expected ({expected}) parts, got ({got})")]
    WrongPartCount {
        id: String,
        expected: usize,
        got: usize,
    },

    #[error("unexpected format for ID ({id}), expected all parts of ID to be non-empty")]
    EmptyPart { id: String },
}

impl From<IdError> for ProviderError {
    fn from(err: IdError) -> Self {
        ProviderError::new(err.to_string())
    }
}

/// Join ID parts with `separator`
pub fn create_resource_id<S: AsRef<str>>(parts: &[S], separator: &str) -> String {
    parts
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(separator)
}

/// Split `id` into exactly `count` non-empty parts
pub fn parse_resource_id<'a>(
    id: &'a str,
    separator: &str,
    count: usize,
) -> Result<Vec<&'a str>, IdError> {
    if count <= 1 {
        return Err(IdError::TooFewPartsRequested(count));
    }

    let parts: Vec<&str> = id.split(separator).collect();
    if parts.len() <= 1 {
        return Err(IdError::SinglePart { id: id.to_string() });
    }
    if parts.len() != count {
        return Err(IdError::WrongPartCount {
            id: id.to_string(),
            expected: count,
            got: parts.len(),
        });
    }
    if parts.iter().any(|p| p.is_empty()) {
        return Err(IdError::EmptyPart { id: id.to_string() });
    }
    Ok(parts)
}
