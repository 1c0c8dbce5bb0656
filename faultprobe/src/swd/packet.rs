//! Request framing and the single-transfer packet engine.
//!
//! A transfer is: 8-bit request header, direction hand-over, 3-bit ack,
//! 33-bit data phase (32 data bits plus parity), with operation-specific
//! turnaround pulse counts between the phases. The engine never retries and
//! never raises on a non-OK ack; the [`Status`] goes back to the caller,
//! who decides whether to re-issue on WAIT or give up on FAULT.

use crate::probe::{ProbeError, SwdIo};
use crate::swd::transport::SwdInterface;
use crate::swd::{PortType, Status, TransferDirection};
use crate::timing::Timebase;

// Turnaround pulse counts per phase. These were tuned against the target's
// line drivers; do not normalize them to the single-turnaround figure the
// protocol standard suggests.
const READ_ACK_TURNAROUNDS: usize = 4;
const READ_TRAILING_TURNAROUNDS: usize = 9;
const WRITE_TRAILING_TURNAROUNDS: usize = 20;

/// XOR of the first `bits` bits of `data`, LSB-first.
pub fn parity(data: &[u8], bits: usize) -> bool {
    let mut parity = false;
    for i in 0..bits {
        parity ^= data[i / 8] >> (i % 8) & 1 == 1;
    }
    parity
}

/// One register access: which port, which way, which 2-bit register index.
///
/// Immutable per transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    pub port: PortType,
    pub direction: TransferDirection,
    pub register: u8,
}

impl TransferRequest {
    pub fn read(port: PortType, register: u8) -> Self {
        Self::new(port, TransferDirection::Read, register)
    }

    pub fn write(port: PortType, register: u8) -> Self {
        Self::new(port, TransferDirection::Write, register)
    }

    fn new(port: PortType, direction: TransferDirection, register: u8) -> Self {
        assert!(register < 4, "invalid register index {register:#x}");
        Self {
            port,
            direction,
            register,
        }
    }

    /// Assemble the 8-bit request header, transmitted LSB-first:
    /// start (1), APnDP, RnW, register select (2 bits), parity over the
    /// four preceding bits, stop (0), park (1).
    pub fn header(&self) -> u8 {
        let mut header = 0u8;

        if self.port == PortType::AccessPort {
            header |= 0x02;
        }
        if self.direction == TransferDirection::Read {
            header |= 0x04;
        }
        header |= (self.register & 0x03) << 3;

        if parity(&[header], 7) {
            header |= 0x20;
        }

        header | 0x01 | 0x80
    }

    /// Recover a request from a header byte; `None` if the framing bits or
    /// the parity don't hold.
    pub fn decode(header: u8) -> Option<Self> {
        let start = header & 0x01 != 0;
        let stop = header & 0x40 != 0;
        let park = header & 0x80 != 0;
        if !start || stop || !park {
            return None;
        }

        if parity(&[header & 0x1E], 7) != (header & 0x20 != 0) {
            return None;
        }

        let port = if header & 0x02 != 0 {
            PortType::AccessPort
        } else {
            PortType::DebugPort
        };
        let direction = if header & 0x04 != 0 {
            TransferDirection::Read
        } else {
            TransferDirection::Write
        };

        Some(Self {
            port,
            direction,
            register: header >> 3 & 0x03,
        })
    }
}

/// Wire-level register access, one transfer per call.
///
/// This is the seam between the bit-banged engine and the logical
/// debug-port operations; tests substitute a scripted implementation here.
pub trait DapAccess {
    fn read_register(&mut self, port: PortType, register: u8) -> Result<(Status, u32), ProbeError>;

    fn write_register(
        &mut self,
        port: PortType,
        register: u8,
        value: u32,
    ) -> Result<Status, ProbeError>;

    fn line_reset(&mut self) -> Result<(), ProbeError>;
}

impl<IO: SwdIo, T: Timebase> SwdInterface<IO, T> {
    /// Execute one read transfer and return the ack plus the 32-bit value.
    ///
    /// The first-received data byte is the least-significant byte of the
    /// result. The trailing parity bit is captured with the data phase but
    /// not verified, matching the deployed firmware.
    pub fn read_packet(&mut self, port: PortType, register: u8) -> Result<(Status, u32), ProbeError> {
        let request = TransferRequest::read(port, register);

        self.send_bits(&[request.header()], 8)?;
        self.release_swdio()?;
        for _ in 0..READ_ACK_TURNAROUNDS {
            self.turnaround()?;
        }

        let status = Status::from(self.read_bits(3)?[0]);
        let data = self.read_bits(33)?;

        self.drive_swdio()?;
        for _ in 0..READ_TRAILING_TURNAROUNDS {
            self.turnaround()?;
        }

        let value = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
        tracing::trace!(?request, %status, value = format_args!("{value:#010x}"), "read packet");

        Ok((status, value))
    }

    /// Execute one write transfer and return the ack.
    pub fn write_packet(
        &mut self,
        port: PortType,
        register: u8,
        value: u32,
    ) -> Result<Status, ProbeError> {
        let request = TransferRequest::write(port, register);

        self.send_bits(&[request.header()], 8)?;
        self.release_swdio()?;
        self.turnaround()?;

        let status = Status::from(self.read_bits(3)?[0]);

        self.release_swdio()?;
        self.turnaround()?;
        self.drive_swdio()?;

        let mut payload = [0u8; 5];
        payload[..4].copy_from_slice(&value.to_le_bytes());
        payload[4] = parity(&payload[..4], 32) as u8;
        self.send_bits(&payload, 33)?;

        self.drive_swdio()?;
        for _ in 0..WRITE_TRAILING_TURNAROUNDS {
            self.turnaround()?;
        }

        tracing::trace!(?request, %status, value = format_args!("{value:#010x}"), "write packet");

        Ok(status)
    }
}

impl<IO: SwdIo, T: Timebase> DapAccess for SwdInterface<IO, T> {
    fn read_register(&mut self, port: PortType, register: u8) -> Result<(Status, u32), ProbeError> {
        self.read_packet(port, register)
    }

    fn write_register(
        &mut self,
        port: PortType,
        register: u8,
        value: u32,
    ) -> Result<Status, ProbeError> {
        self.write_packet(port, register, value)
    }

    fn line_reset(&mut self) -> Result<(), ProbeError> {
        SwdInterface::line_reset(self)
    }
}
