//! Mutation hook consulted by every descriptor-producing path.
//!
//! The engine holds no fuzzing state. Each builder names its [`Stage`], computes the canonical
//! bytes and hands both to the application; whatever the application returns is sent verbatim,
//! valid or not.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::app::Application;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    DeviceDescriptor,
    DeviceQualifierDescriptor,
    ConfigurationDescriptor,
    OtherSpeedConfigurationDescriptor,
    InterfaceDescriptor,
    EndpointDescriptor,
    CsInterfaceDescriptor,
    CsEndpointDescriptor,
    StringDescriptorZero,
    StringDescriptor,
    HubDescriptor,
    BosDescriptor,
    DeviceCapabilityDescriptor,
}

impl Stage {
    pub const ALL: [Stage; 13] = [
        Stage::DeviceDescriptor,
        Stage::DeviceQualifierDescriptor,
        Stage::ConfigurationDescriptor,
        Stage::OtherSpeedConfigurationDescriptor,
        Stage::InterfaceDescriptor,
        Stage::EndpointDescriptor,
        Stage::CsInterfaceDescriptor,
        Stage::CsEndpointDescriptor,
        Stage::StringDescriptorZero,
        Stage::StringDescriptor,
        Stage::HubDescriptor,
        Stage::BosDescriptor,
        Stage::DeviceCapabilityDescriptor,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::DeviceDescriptor => "device_descriptor",
            Stage::DeviceQualifierDescriptor => "device_qualifier_descriptor",
            Stage::ConfigurationDescriptor => "configuration_descriptor",
            Stage::OtherSpeedConfigurationDescriptor => "other_speed_configuration_descriptor",
            Stage::InterfaceDescriptor => "interface_descriptor",
            Stage::EndpointDescriptor => "endpoint_descriptor",
            Stage::CsInterfaceDescriptor => "cs_interface_descriptor",
            Stage::CsEndpointDescriptor => "cs_endpoint_descriptor",
            Stage::StringDescriptorZero => "string_descriptor_zero",
            Stage::StringDescriptor => "string_descriptor",
            Stage::HubDescriptor => "hub_descriptor",
            Stage::BosDescriptor => "bos_descriptor",
            Stage::DeviceCapabilityDescriptor => "device_capability_descriptor",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown mutation stage `{0}`")]
pub struct UnknownStage(pub String);

impl FromStr for Stage {
    type Err = UnknownStage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s.trim())
            .ok_or_else(|| UnknownStage(s.to_owned()))
    }
}

/// Routes builder output through the application's mutation provider.
///
/// A disabled mutator always yields the canonical encoding.
pub struct Mutator<'a> {
    app: Option<&'a mut dyn Application>,
}

impl<'a> Mutator<'a> {
    pub fn new(app: &'a mut dyn Application) -> Self {
        Self { app: Some(app) }
    }

    pub fn disabled() -> Self {
        Self { app: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.app.is_some()
    }

    /// Builds the canonical bytes for `stage` and lets the provider replace them.
    ///
    /// `build` receives the mutator back so nested descriptors consult their own stages.
    pub fn mutable(&mut self, stage: Stage, build: impl FnOnce(&mut Self) -> Vec<u8>) -> Vec<u8> {
        let canonical = build(self);
        let Some(app) = self.app.as_deref_mut() else {
            return canonical;
        };
        match app.get_mutation(stage, &canonical) {
            Some(mutated) => {
                tracing::debug!(
                    %stage,
                    canonical = canonical.len(),
                    mutated = mutated.len(),
                    "substituting mutated descriptor"
                );
                mutated
            }
            None => canonical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ReplaceInterface;

    impl Application for ReplaceInterface {
        fn get_mutation(&mut self, stage: Stage, _canonical: &[u8]) -> Option<Vec<u8>> {
            (stage == Stage::InterfaceDescriptor).then(|| vec![0xde, 0xad])
        }
    }

    #[test]
    fn disabled_mutator_returns_canonical_bytes() {
        let mut m = Mutator::disabled();
        assert!(!m.is_enabled());
        assert_eq!(m.mutable(Stage::InterfaceDescriptor, |_| vec![1, 2, 3]), vec![1, 2, 3]);
    }

    #[test]
    fn provider_output_is_returned_verbatim() {
        let mut app = ReplaceInterface;
        let mut m = Mutator::new(&mut app);
        assert_eq!(m.mutable(Stage::InterfaceDescriptor, |_| vec![1, 2, 3]), vec![0xde, 0xad]);
        assert_eq!(m.mutable(Stage::EndpointDescriptor, |_| vec![7]), vec![7]);
    }

    #[test]
    fn nested_stages_are_consulted_independently() {
        let mut app = ReplaceInterface;
        let mut m = Mutator::new(&mut app);
        let out = m.mutable(Stage::ConfigurationDescriptor, |m| {
            let mut out = vec![9];
            out.extend(m.mutable(Stage::InterfaceDescriptor, |_| vec![4, 4, 4]));
            out
        });
        assert_eq!(out, vec![9, 0xde, 0xad]);
    }

    #[test]
    fn stage_names_round_trip_through_from_str() {
        for stage in Stage::ALL {
            assert_eq!(stage.as_str().parse::<Stage>().unwrap(), stage);
        }
        let err = "nope".parse::<Stage>().unwrap_err();
        assert_eq!(err, UnknownStage("nope".to_owned()));
        assert_eq!(err.to_string(), "unknown mutation stage `nope`");
    }
}
