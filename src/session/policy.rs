use std::str::FromStr;
use uuid::Uuid;

const DEFAULT_DEVICE: &str = "default";

/// How many live sessions an identity may hold, expressed as how session keys are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPolicy {
    /// One session per identity; a new login replaces the previous one.
    #[default]
    SingleSession,
    /// One session per (identity, device); a login replaces only that device's session.
    PerDevice,
}

impl SessionPolicy {
    /// Cache key for an identity's session under this policy
    pub fn session_key(&self, identity_id: &str, device: Option<&str>) -> String {
        match self {
            SessionPolicy::SingleSession => identity_id.to_string(),
            SessionPolicy::PerDevice => {
                format!("{identity_id}:{}", device.unwrap_or(DEFAULT_DEVICE))
            }
        }
    }

    /// The device claim to embed in tokens, if this policy tracks devices
    pub fn device_claim(&self, device: Option<&str>) -> Option<String> {
        match self {
            SessionPolicy::SingleSession => None,
            SessionPolicy::PerDevice => {
                Some(device.unwrap_or(DEFAULT_DEVICE).to_string())
            }
        }
    }

    pub fn key_for(&self, identity_id: Uuid, device: Option<&str>) -> String {
        self.session_key(&identity_id.to_string(), device)
    }
}

impl FromStr for SessionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "single" | "single_session" => Ok(SessionPolicy::SingleSession),
            "per_device" | "per-device" => Ok(SessionPolicy::PerDevice),
            other => Err(format!("unknown session policy: {other}")),
        }
    }
}
