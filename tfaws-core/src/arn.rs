//! Amazon Resource Names
//!
//! `arn:partition:service:region:account-id:resource`. The resource part may
//! itself contain `:` and `/`, so only the first five separators are split.

use std::fmt;
use std::str::FromStr;

const ARN_PREFIX: &str = "arn:";
const ARN_SECTIONS: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArnError {
    #[error("arn: invalid prefix")]
    InvalidPrefix,

    #[error("arn: not enough sections")]
    NotEnoughSections,
}

/// Parsed ARN
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Arn {
    pub partition: String,
    pub service: String,
    pub region: String,
    pub account_id: String,
    pub resource: String,
}

impl Arn {
    pub fn parse(s: &str) -> Result<Self, ArnError> {
        if !s.starts_with(ARN_PREFIX) {
            return Err(ArnError::InvalidPrefix);
        }
        let sections: Vec<&str> = s.splitn(ARN_SECTIONS, ':').collect();
        if sections.len() != ARN_SECTIONS {
            return Err(ArnError::NotEnoughSections);
        }
        Ok(Self {
            partition: sections[1].to_string(),
            service: sections[2].to_string(),
            region: sections[3].to_string(),
            account_id: sections[4].to_string(),
            resource: sections[5].to_string(),
        })
    }

    /// Resource split on `/`
    pub fn resource_parts(&self) -> Vec<&str> {
        self.resource.split('/').collect()
    }

    /// Same ARN with a different resource
    pub fn with_resource(&self, resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ..self.clone()
        }
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Arn::parse(s)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account_id, self.resource
        )
    }
}

/// Cheap syntactic check, without allocating
pub fn is_arn(s: &str) -> bool {
    s.starts_with(ARN_PREFIX) && s.matches(':').count() >= ARN_SECTIONS - 1
}

/// Partition a region belongs to
pub fn partition_for_region(region: &str) -> &'static str {
    if region.starts_with("cn-") {
        "aws-cn"
    } else if region.starts_with("us-gov-") {
        "aws-us-gov"
    } else if region.starts_with("us-iso-") {
        "aws-iso"
    } else if region.starts_with("us-isob-") {
        "aws-iso-b"
    } else {
        "aws"
    }
}
