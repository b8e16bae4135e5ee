//! Built-in device profiles for the `phantom-usb` engine.
//!
//! Each profile is a constructor returning a [`phantom_usb::DeviceModel`]; [`ProfileRegistry`]
//! maps profile names to those constructors.

pub mod billboard;
pub mod cdc;
pub mod hub;
pub mod options;
pub mod registry;

pub use cdc::{LineAccumulator, LineCoding, ReceivedLines};
pub use options::ProfileOptions;
pub use registry::{Profile, ProfileConstructor, ProfileEntry, ProfileError, ProfileRegistry};
