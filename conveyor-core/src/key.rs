//! Encryption key reference for the artifact channel

use serde::{Deserialize, Serialize};
use std::fmt;

/// ARN of the artifact channel key
///
/// Assigned by the provisioning engine when the channel stack is created,
/// so it can only be learned from that stack's outputs. Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyArn(String);

impl KeyArn {
    /// Parses a key ARN, rejecting blank values
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(Self(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rejects_blank() {
        assert!(KeyArn::parse("").is_none());
        assert!(KeyArn::parse("  \t").is_none());
        assert_eq!(
            KeyArn::parse(" arn:aws:kms:us-east-1:111:key/abc ")
                .unwrap()
                .as_str(),
            "arn:aws:kms:us-east-1:111:key/abc"
        );
    }
}
