use serde::{Deserialize, Serialize};

/// Where a standard request addressed to the "other" recipient goes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OtherRecipientPolicy {
    /// Route to the first interface of the active configuration. Hub class drivers query this
    /// way; whether it is right for multi-interface non-hub devices is unverified.
    #[default]
    FirstInterface,
    Stall,
}

/// What SET_CONFIGURATION does with a value above the configuration count.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidConfigurationPolicy {
    /// Log and activate the first configuration anyway.
    #[default]
    FallbackToFirst,
    Stall,
}

/// Knobs for the quirks of the request dispatcher.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicePolicy {
    pub other_recipient: OtherRecipientPolicy,
    pub invalid_configuration: InvalidConfigurationPolicy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_permissive() {
        let policy: DevicePolicy = serde_json::from_str("{}").unwrap();
        assert_eq!(policy.other_recipient, OtherRecipientPolicy::FirstInterface);
        assert_eq!(
            policy.invalid_configuration,
            InvalidConfigurationPolicy::FallbackToFirst
        );
    }

    #[test]
    fn fields_deserialize_from_snake_case() {
        let policy: DevicePolicy =
            serde_json::from_str(r#"{"invalid_configuration": "stall"}"#).unwrap();
        assert_eq!(policy.invalid_configuration, InvalidConfigurationPolicy::Stall);
        assert_eq!(policy.other_recipient, OtherRecipientPolicy::FirstInterface);
    }
}
