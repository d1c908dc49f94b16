//! API and protocol version dispatch.

use serde::{Deserialize, Serialize};

/// Wire-format version of server responses.
///
/// Selected once at the start of each request from the `api` parameter and
/// passed by value; unknown or missing values fall back to the oldest
/// version, matching the original server's dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "20161215")]
    V20161215,
    #[serde(rename = "20190520")]
    V20190520,
    #[serde(rename = "20200115")]
    V20200115,
}

impl ApiVersion {
    /// Parse the `api` request parameter; anything unrecognized degrades
    /// to 20161215.
    pub fn from_param(param: Option<&str>) -> Self {
        match param {
            Some("20200115") => Self::V20200115,
            Some("20190520") => Self::V20190520,
            _ => Self::V20161215,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V20161215 => "20161215",
            Self::V20190520 => "20190520",
            Self::V20200115 => "20200115",
        }
    }

    /// Whether this API version reports conflicts via the `conflicts`
    /// array (vs the legacy `unsaved` array).
    pub fn uses_conflicts(self) -> bool {
        !matches!(self, Self::V20161215)
    }

    /// Whether this API version can carry the session token model.
    pub fn supports_sessions(self) -> bool {
        matches!(self, Self::V20200115)
    }
}

/// Client-side crypto protocol versions.
pub const PROTOCOL_VERSION_2: &str = "002";
pub const PROTOCOL_VERSION_3: &str = "003";
pub const PROTOCOL_VERSION_4: &str = "004";

/// Account version starting the support of sessions.
pub const SESSION_PROTOCOL_VERSION: &str = PROTOCOL_VERSION_4;

/// Returns true if `current` is non-empty and numerically >= `version`.
pub fn version_gte(version: &str, current: &str) -> bool {
    match (version.parse::<u32>(), current.parse::<u32>()) {
        (Ok(v), Ok(c)) => c >= v,
        _ => false,
    }
}

/// Returns true if `current` is empty or numerically < `version`.
pub fn version_lt(version: &str, current: &str) -> bool {
    if current.is_empty() {
        return true;
    }
    match (version.parse::<u32>(), current.parse::<u32>()) {
        (Ok(v), Ok(c)) => c < v,
        _ => false,
    }
}

/// Whether a user on the given protocol version uses the session model.
pub fn supports_sessions(user_version: &str) -> bool {
    version_gte(SESSION_PROTOCOL_VERSION, user_version)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_from_param() {
        assert_eq!(ApiVersion::from_param(None), ApiVersion::V20161215);
        assert_eq!(ApiVersion::from_param(Some("")), ApiVersion::V20161215);
        assert_eq!(ApiVersion::from_param(Some("bogus")), ApiVersion::V20161215);
        assert_eq!(
            ApiVersion::from_param(Some("20190520")),
            ApiVersion::V20190520
        );
        assert_eq!(
            ApiVersion::from_param(Some("20200115")),
            ApiVersion::V20200115
        );
    }

    #[test]
    fn session_support_per_protocol_version() {
        assert!(!supports_sessions("002"));
        assert!(!supports_sessions("003"));
        assert!(supports_sessions("004"));
        assert!(!supports_sessions(""));
    }

    #[test]
    fn version_ordering() {
        assert!(version_gte("003", "004"));
        assert!(version_gte("004", "004"));
        assert!(!version_gte("004", "003"));
        assert!(version_lt("004", "003"));
        assert!(version_lt("004", ""));
    }
}
