//! Communications Device Class profiles (PSTN subclasses).
//!
//! Both variants share one layout: a communications control interface carrying the functional
//! descriptors and a notification endpoint, and a data interface with a bulk OUT/IN pair.

pub mod acm;
pub mod dl;

use std::cell::RefCell;
use std::rc::Rc;

use phantom_usb::descriptor::{CLASS_CDC, CLASS_CDC_DATA};
use phantom_usb::{
    ClassHandler, Configuration, CsInterfaceDescriptor, DeviceContext, DeviceInfo, DeviceModel,
    Endpoint, EndpointDirection, EndpointHandler, Interface, SetupRequest, TransferType, UsbError,
    UsbResult,
};

use crate::options::ProfileOptions;

pub const CDC_VENDOR_ID: u16 = 0x2548;
pub const CDC_PRODUCT_ID: u16 = 0x1001;
pub const CDC_REVISION: u16 = 0x0010;

pub const SUBCLASS_DIRECT_LINE: u8 = 0x01;
pub const SUBCLASS_ABSTRACT_CONTROL: u8 = 0x02;
pub const PROTOCOL_AT_V250: u8 = 0x01;

pub const FD_HEADER: u8 = 0x00;
pub const FD_CALL_MANAGEMENT: u8 = 0x01;
pub const FD_ABSTRACT_CONTROL: u8 = 0x02;
pub const FD_DIRECT_LINE: u8 = 0x03;
pub const FD_UNION: u8 = 0x06;

pub const REQ_SET_LINE_CODING: u8 = 0x20;
pub const REQ_GET_LINE_CODING: u8 = 0x21;
pub const REQ_SET_CONTROL_LINE_STATE: u8 = 0x22;
pub const REQ_SEND_BREAK: u8 = 0x23;

const CONTROL_INTERFACE: u8 = 0;
const DATA_INTERFACE: u8 = 1;

const EP_DATA_OUT: u8 = 1;
const EP_DATA_IN: u8 = 2;
const EP_NOTIFICATION: u8 = 3;
const BULK_MAX_PACKET_SIZE: u16 = 0x40;

/// Capability bits advertised in the call-management and ACM/DLM functional descriptors.
const CAPABILITIES: u8 = 0x01;

const LINE_CODING_LEN: usize = 7;

/// `dwDTERate`, `bCharFormat`, `bParityType`, `bDataBits`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineCoding {
    pub rate: u32,
    pub stop_bits: u8,
    pub parity: u8,
    pub data_bits: u8,
}

impl LineCoding {
    pub const LEN: usize = LINE_CODING_LEN;

    pub fn to_bytes(self) -> [u8; LINE_CODING_LEN] {
        let [r0, r1, r2, r3] = self.rate.to_le_bytes();
        [r0, r1, r2, r3, self.stop_bits, self.parity, self.data_bits]
    }

    pub fn parse(raw: &[u8]) -> Option<Self> {
        let [r0, r1, r2, r3, stop_bits, parity, data_bits] = *raw.first_chunk::<LINE_CODING_LEN>()?;
        Some(Self {
            rate: u32::from_le_bytes([r0, r1, r2, r3]),
            stop_bits,
            parity,
            data_bits,
        })
    }
}

impl Default for LineCoding {
    /// 115200 8N1.
    fn default() -> Self {
        Self {
            rate: 115_200,
            stop_bits: 0,
            parity: 0,
            data_bits: 8,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CdcState {
    pub line_coding: LineCoding,
    /// DTR in bit 0, RTS in bit 1.
    pub control_line_state: u16,
}

pub fn class_handler() -> ClassHandler<CdcState> {
    ClassHandler::class("cdc", CdcState::default())
        .with_request(REQ_SET_LINE_CODING, set_line_coding)
        .with_request(REQ_GET_LINE_CODING, get_line_coding)
        .with_request(REQ_SET_CONTROL_LINE_STATE, set_control_line_state)
        .with_request(REQ_SEND_BREAK, send_break)
}

fn set_line_coding(
    state: &mut CdcState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    let Some(coding) = LineCoding::parse(&req.data) else {
        return Err(UsbError::ShortDataStage {
            request: req.request,
            expected: LineCoding::LEN,
            actual: req.data.len(),
        });
    };
    if coding.stop_bits > 2 || coding.parity > 4 {
        return Err(UsbError::Handler {
            handler: "cdc",
            request: req.request,
            reason: format!("invalid line coding {coding:?}"),
        });
    }
    tracing::info!(
        rate = coding.rate,
        data_bits = coding.data_bits,
        parity = coding.parity,
        stop_bits = coding.stop_bits,
        "line coding set"
    );
    state.line_coding = coding;
    cx.usb_function_supported("cdc set line coding");
    cx.ack_status_stage()
}

fn get_line_coding(
    state: &mut CdcState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    cx.usb_function_supported("cdc get line coding");
    cx.reply(req, &state.line_coding.to_bytes())
}

fn set_control_line_state(
    state: &mut CdcState,
    cx: &mut DeviceContext<'_>,
    req: &SetupRequest,
) -> UsbResult<()> {
    state.control_line_state = req.value;
    tracing::debug!(dtr = req.value & 1 != 0, rts = req.value & 2 != 0, "control line state");
    cx.usb_function_supported("cdc set control line state");
    cx.ack_status_stage()
}

fn send_break(_: &mut CdcState, cx: &mut DeviceContext<'_>, req: &SetupRequest) -> UsbResult<()> {
    tracing::debug!(duration_ms = req.value, "break");
    cx.usb_function_supported("cdc send break");
    cx.ack_status_stage()
}

/// Splits an inbound byte stream into carriage-return terminated lines.
#[derive(Clone, Debug, Default)]
pub struct LineAccumulator {
    pending: Vec<u8>,
}

impl LineAccumulator {
    /// Appends `data` and returns every line it completed. The unterminated tail is kept.
    pub fn push(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(data);
        let Some(last_cr) = self.pending.iter().rposition(|&b| b == b'\r') else {
            return Vec::new();
        };
        let tail = self.pending.split_off(last_cr + 1);
        let complete = core::mem::replace(&mut self.pending, tail);
        complete[..last_cr]
            .split(|&b| b == b'\r')
            .map(<[u8]>::to_vec)
            .collect()
    }

    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

/// Shared view of the lines a CDC device received.
#[derive(Clone, Debug, Default)]
pub struct ReceivedLines(Rc<RefCell<Vec<String>>>);

impl ReceivedLines {
    pub fn lines(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    fn push(&self, line: String) {
        self.0.borrow_mut().push(line);
    }
}

/// Bulk OUT handler: logs every received line.
struct LineReceiver {
    accumulator: LineAccumulator,
    lines: ReceivedLines,
}

impl EndpointHandler for LineReceiver {
    fn data_available(&mut self, _cx: &mut DeviceContext<'_>, data: &[u8]) -> UsbResult<()> {
        for line in self.accumulator.push(data) {
            let line = String::from_utf8_lossy(&line).into_owned();
            tracing::info!(line = %line, "received line");
            self.lines.push(line);
        }
        Ok(())
    }
}

/// Bulk IN handler: answers every free buffer with the same frame.
struct CannedResponder {
    frame: &'static [u8],
}

impl EndpointHandler for CannedResponder {
    fn buffer_available(&mut self, cx: &mut DeviceContext<'_>) -> UsbResult<()> {
        tracing::debug!(len = self.frame.len(), "sending canned frame");
        cx.send_on_endpoint(EP_DATA_IN, self.frame)
    }
}

/// The parts in which the two PSTN variants differ.
struct Variant {
    product: &'static str,
    subclass: u8,
    /// Functional descriptor subtype describing the control model.
    model_descriptor: u8,
    frame: &'static [u8],
}

fn build(
    variant: Variant,
    options: &ProfileOptions,
    lines: ReceivedLines,
) -> UsbResult<DeviceModel> {
    let control = Interface::new(CONTROL_INTERFACE, CLASS_CDC, variant.subclass, PROTOCOL_AT_V250)
        .with_cs_descriptor(CsInterfaceDescriptor::new([FD_HEADER, 0x01, 0x01]))
        .with_cs_descriptor(CsInterfaceDescriptor::new([
            FD_CALL_MANAGEMENT,
            CAPABILITIES,
            DATA_INTERFACE,
        ]))
        .with_cs_descriptor(CsInterfaceDescriptor::new([variant.model_descriptor, CAPABILITIES]))
        .with_cs_descriptor(CsInterfaceDescriptor::new([
            FD_UNION,
            CONTROL_INTERFACE,
            DATA_INTERFACE,
        ]))
        .with_endpoint(
            Endpoint::new(EP_NOTIFICATION, EndpointDirection::In, TransferType::Interrupt, 0x10)
                .with_interval(0x20),
        )
        .with_class_handler(class_handler());

    let data = Interface::new(DATA_INTERFACE, CLASS_CDC_DATA, 0, 0)
        .with_endpoint(
            Endpoint::new(
                EP_DATA_OUT,
                EndpointDirection::Out,
                TransferType::Bulk,
                BULK_MAX_PACKET_SIZE,
            )
            .with_handler(LineReceiver {
                accumulator: LineAccumulator::default(),
                lines,
            }),
        )
        .with_endpoint(
            Endpoint::new(
                EP_DATA_IN,
                EndpointDirection::In,
                TransferType::Bulk,
                BULK_MAX_PACKET_SIZE,
            )
            .with_handler(CannedResponder {
                frame: variant.frame,
            }),
        );

    let info = DeviceInfo {
        class: CLASS_CDC,
        vendor_id: CDC_VENDOR_ID,
        product_id: CDC_PRODUCT_ID,
        revision: CDC_REVISION,
        manufacturer: Some("Phantom".into()),
        product: Some(variant.product.into()),
        serial: Some("00000001".into()),
        ..DeviceInfo::default()
    };
    let model = DeviceModel::new(
        info,
        vec![Configuration::new(vec![control, data]).with_name("Emulated CDC")],
    )?;
    Ok(options.apply(model))
}
