use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::PortalError;

/// A member identifier as supplied by a caller: either the raw member UUID
/// or the human-formatted `MEM-YYYY-XXXXXX` card number, where `XXXXXX` is
/// the first six hex characters of the UUID, lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberRef {
    Id(Uuid),
    Prefix(String),
}

impl MemberRef {
    /// Returns the lowercase hex prefix used to match against the member
    /// UUID, whichever form the reference was given in.
    pub fn hex_prefix(&self) -> String {
        match self {
            MemberRef::Id(id) => id.simple().to_string()[..6].to_string(),
            MemberRef::Prefix(p) => p.clone(),
        }
    }

    pub fn matches(&self, member_id: Uuid) -> bool {
        match self {
            MemberRef::Id(id) => *id == member_id,
            MemberRef::Prefix(p) => member_id.simple().to_string().starts_with(p.as_str()),
        }
    }
}

impl FromStr for MemberRef {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Ok(id) = Uuid::parse_str(s) {
            return Ok(MemberRef::Id(id));
        }
        // MEM-YYYY-XXXXXX card form
        let parts: Vec<&str> = s.split('-').collect();
        if parts.len() == 3 && parts[0].eq_ignore_ascii_case("MEM") {
            let year = parts[1];
            let prefix = parts[2].to_ascii_lowercase();
            if year.len() == 4
                && year.chars().all(|c| c.is_ascii_digit())
                && prefix.len() == 6
                && prefix.chars().all(|c| c.is_ascii_hexdigit())
            {
                return Ok(MemberRef::Prefix(prefix));
            }
        }
        Err(PortalError::Validation(format!(
            "'{}' is neither a UUID nor a MEM-YYYY-XXXXXX member number",
            s
        )))
    }
}

impl fmt::Display for MemberRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberRef::Id(id) => write!(f, "{}", id),
            MemberRef::Prefix(p) => write!(f, "MEM-????-{}", p),
        }
    }
}

/// Formats the display member number for a member enrolled in `year`.
pub fn member_number(member_id: Uuid, year: i32) -> String {
    format!("MEM-{}-{}", year, &member_id.simple().to_string()[..6])
}

/// Unique policy number, `POL-YYYY-NNNNNN`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyNumber(String);

impl PolicyNumber {
    pub fn new(year: i32, seq: u32) -> Self {
        PolicyNumber(format!("POL-{}-{:06}", year, seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PolicyNumber {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('-').collect();
        let ok = parts.len() == 3
            && parts[0] == "POL"
            && parts[1].len() == 4
            && parts[1].chars().all(|c| c.is_ascii_digit())
            && parts[2].len() == 6
            && parts[2].chars().all(|c| c.is_ascii_digit());
        if ok {
            Ok(PolicyNumber(s.to_string()))
        } else {
            Err(PortalError::Validation(format!(
                "'{}' is not a valid policy number",
                s
            )))
        }
    }
}

impl fmt::Display for PolicyNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// National Provider Identifier: exactly ten digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Npi(String);

impl Npi {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Npi {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 10 && s.chars().all(|c| c.is_ascii_digit()) {
            Ok(Npi(s.to_string()))
        } else {
            Err(PortalError::Validation(format!(
                "NPI must be exactly 10 digits, got '{}'",
                s
            )))
        }
    }
}

impl fmt::Display for Npi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
