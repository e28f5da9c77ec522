//! Manager error type.

use super::radio::RadioError;
use crate::config::ConfigError;
use crate::store::StoreError;
use std::fmt;

/// Errors returned by [`WifiManager`](super::WifiManager) commands.
///
/// The `Display` text is short enough to show on the device screen and is
/// reused verbatim as the reason of a `Failed` status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiError {
    /// The command needs a role that is switched off.
    InterfaceDisabled,
    /// Another command is still running.
    RadioBusy,
    /// A hardware operation exceeded its deadline.
    Timeout,
    /// The network rejected the credentials.
    AuthFailed,
    /// The network is not in range.
    NotFound,
    /// Access point password is neither empty nor a valid WPA2 passphrase.
    InvalidPassword,
    /// SSID is longer than 32 bytes (or empty where a name is required).
    InvalidSsid,
    /// The access point has no SSID to broadcast.
    NoSsid,
    /// No station network has been saved.
    NoSavedCredentials,
    /// `restore()` was already run.
    AlreadyRestored,
    /// The persistent store failed.
    Store(StoreError),
    /// Any other radio failure.
    Radio(String),
}

impl WifiError {
    /// Text for a `Failed` status.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for WifiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InterfaceDisabled => write!(f, "interface disabled"),
            Self::RadioBusy => write!(f, "radio busy"),
            Self::Timeout => write!(f, "timeout"),
            Self::AuthFailed => write!(f, "auth failed"),
            Self::NotFound => write!(f, "network not found"),
            Self::InvalidPassword => write!(f, "invalid password"),
            Self::InvalidSsid => write!(f, "invalid ssid"),
            Self::NoSsid => write!(f, "no ssid"),
            Self::NoSavedCredentials => write!(f, "no saved credentials"),
            Self::AlreadyRestored => write!(f, "already restored"),
            Self::Store(e) => write!(f, "store failure: {}", e),
            Self::Radio(msg) => write!(f, "radio error: {}", msg),
        }
    }
}

impl std::error::Error for WifiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RadioError> for WifiError {
    fn from(e: RadioError) -> Self {
        match e {
            RadioError::Timeout => Self::Timeout,
            RadioError::AuthRejected => Self::AuthFailed,
            RadioError::NotFound => Self::NotFound,
            RadioError::NotActive => Self::InterfaceDisabled,
            RadioError::Driver(msg) => Self::Radio(msg),
        }
    }
}

impl From<StoreError> for WifiError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}

impl From<ConfigError> for WifiError {
    fn from(e: ConfigError) -> Self {
        match e {
            ConfigError::SsidEmpty | ConfigError::SsidTooLong { .. } => Self::InvalidSsid,
            ConfigError::PasswordTooShort { .. } | ConfigError::PasswordTooLong { .. } => {
                Self::InvalidPassword
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_error_mapping() {
        assert_eq!(WifiError::from(RadioError::Timeout), WifiError::Timeout);
        assert_eq!(
            WifiError::from(RadioError::AuthRejected),
            WifiError::AuthFailed
        );
        assert_eq!(WifiError::from(RadioError::NotFound), WifiError::NotFound);
        assert_eq!(
            WifiError::from(RadioError::Driver("phy".into())),
            WifiError::Radio("phy".into())
        );
    }

    #[test]
    fn test_config_error_mapping() {
        assert_eq!(
            WifiError::from(ConfigError::PasswordTooShort { len: 3, min: 8 }),
            WifiError::InvalidPassword
        );
        assert_eq!(
            WifiError::from(ConfigError::SsidEmpty),
            WifiError::InvalidSsid
        );
    }

    #[test]
    fn test_reasons() {
        assert_eq!(WifiError::NoSsid.reason(), "no ssid");
        assert_eq!(WifiError::AuthFailed.reason(), "auth failed");
        assert_eq!(
            WifiError::Store(StoreError::Commit("storage full".into())).reason(),
            "store failure: commit failed: storage full"
        );
    }
}
