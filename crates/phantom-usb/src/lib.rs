//! USB device emulation engine.
//!
//! A device is described as a tree of [`Configuration`]s, [`Interface`]s and [`Endpoint`]s held by
//! a [`DeviceModel`]. A [`Device`] binds that model to a transport ([`Phy`]) and an
//! [`Application`], decodes SETUP packets, routes them by type and recipient to handler tables
//! and answers with descriptors, data or a STALL. Every descriptor passes through a named
//! mutation [`Stage`] so a fuzzer can substitute arbitrary bytes.

pub mod app;
pub mod bos;
pub mod class_specific;
pub mod configuration;
pub mod descriptor;
pub mod device;
pub mod endpoint;
pub mod error;
pub mod handler;
pub mod interface;
pub mod mutation;
pub mod phy;
pub mod setup;

pub use app::{Application, NullApplication};
pub use bos::{BinaryObjectStore, DeviceCapability};
pub use class_specific::{CsEndpointDescriptor, CsInterfaceDescriptor};
pub use configuration::{ConfigAttributes, Configuration};
pub use descriptor::UsbSpeed;
pub use device::{
    Device, DeviceInfo, DeviceModel, DevicePolicy, DeviceState, InvalidConfigurationPolicy,
    OtherRecipientPolicy, StringTable,
};
pub use endpoint::{Endpoint, EndpointDirection, EndpointHandler, SyncType, TransferType, UsageType};
pub use error::{UsbError, UsbResult};
pub use handler::{
    ClassHandler, DeviceContext, HandlerKind, HandlerTable, RequestFn, RequestHandler,
    RequestOverrides, VendorHandler,
};
pub use interface::Interface;
pub use mutation::{Mutator, Stage, UnknownStage};
pub use phy::{HostEvent, Phy, PhyCall, PhyError, PhyLog, RecordingPhy};
pub use setup::{RequestDirection, RequestRecipient, RequestType, SetupRequest};
