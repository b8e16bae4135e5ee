//! Name-to-constructor table of device profiles.

use core::fmt;
use core::str::FromStr;
use std::collections::BTreeMap;

use phantom_usb::{DeviceModel, UsbError, UsbResult};
use thiserror::Error;

use crate::options::ProfileOptions;
use crate::{billboard, cdc, hub};

pub type ProfileConstructor = fn(&ProfileOptions) -> UsbResult<DeviceModel>;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("unknown device profile `{0}`")]
    Unknown(String),
    #[error("device profile `{0}` is already registered")]
    Duplicate(String),
    #[error("failed to build device profile: {0}")]
    Build(#[from] UsbError),
}

/// Built-in device profiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Profile {
    Billboard,
    CdcAcm,
    CdcDl,
    Hub,
}

impl Profile {
    /// Sorted by name.
    pub const ALL: [Profile; 4] = [
        Profile::Billboard,
        Profile::CdcAcm,
        Profile::CdcDl,
        Profile::Hub,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Profile::Billboard => "billboard",
            Profile::CdcAcm => "cdc_acm",
            Profile::CdcDl => "cdc_dl",
            Profile::Hub => "hub",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Profile::Billboard => "A billboard, requires USB 2.1 and higher",
            Profile::CdcAcm => "Abstract Control Model device (like serial modem)",
            Profile::CdcDl => "Direct Line Control device (like modem)",
            Profile::Hub => "USB hub",
        }
    }

    pub fn constructor(self) -> ProfileConstructor {
        match self {
            Profile::Billboard => billboard::build,
            Profile::CdcAcm => cdc::acm::build,
            Profile::CdcDl => cdc::dl::build,
            Profile::Hub => hub::build,
        }
    }

    pub fn build(self, options: &ProfileOptions) -> UsbResult<DeviceModel> {
        (self.constructor())(options)
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Profile::ALL
            .into_iter()
            .find(|p| p.name() == s)
            .ok_or_else(|| ProfileError::Unknown(s.to_owned()))
    }
}

#[derive(Clone, Copy)]
pub struct ProfileEntry {
    pub description: &'static str,
    pub constructor: ProfileConstructor,
}

impl fmt::Debug for ProfileEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileEntry")
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Profiles addressable by name: the built-ins plus any registered at startup.
#[derive(Clone, Debug, Default)]
pub struct ProfileRegistry {
    entries: BTreeMap<&'static str, ProfileEntry>,
}

impl ProfileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtins() -> Self {
        let mut registry = Self::new();
        for profile in Profile::ALL {
            registry.entries.insert(
                profile.name(),
                ProfileEntry {
                    description: profile.description(),
                    constructor: profile.constructor(),
                },
            );
        }
        registry
    }

    pub fn register(
        &mut self,
        name: &'static str,
        description: &'static str,
        constructor: ProfileConstructor,
    ) -> Result<(), ProfileError> {
        if self.entries.contains_key(name) {
            return Err(ProfileError::Duplicate(name.to_owned()));
        }
        tracing::debug!(name, "registered device profile");
        self.entries.insert(
            name,
            ProfileEntry {
                description,
                constructor,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ProfileEntry> {
        self.entries.get(name)
    }

    pub fn build(&self, name: &str, options: &ProfileOptions) -> Result<DeviceModel, ProfileError> {
        let entry = self
            .get(name)
            .ok_or_else(|| ProfileError::Unknown(name.to_owned()))?;
        tracing::info!(profile = name, "loading device profile");
        Ok((entry.constructor)(options)?)
    }

    /// Profile names with their descriptions, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ProfileEntry)> + '_ {
        self.entries.iter().map(|(name, entry)| (*name, entry))
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.keys().copied().collect()
    }
}
