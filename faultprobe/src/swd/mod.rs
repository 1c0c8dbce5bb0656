//! The bit-banged SWD-style debug port.
//!
//! Layered bottom-up: [`transport`] drives the two signal lines,
//! [`packet`] frames requests and decodes acknowledgements, [`dp`] builds
//! the logical debug-port operations on top.

pub mod dp;
pub mod packet;
pub mod transport;

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Which of the two register spaces a transfer addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortType {
    DebugPort,
    AccessPort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferDirection {
    Write,
    Read,
}

/// Acknowledgement status of one or more transfers.
///
/// The raw value is the 3-bit ack field as it lands in the capture byte
/// (first-received bit at bit 5, see
/// [`transport::SwdInterface::read_bits`]). Statuses of a compound
/// operation are OR-ed together, so a value can carry several set bits at
/// once — e.g. an earlier OK merged with a later WAIT yields
/// [`Status::WAIT_OK`]. Inspect individual bits with [`Status::has_ok`],
/// [`Status::has_wait`] and [`Status::has_fault`] rather than comparing
/// against the named constants. Once a bit is set by a sub-operation it is
/// never cleared within the same compound call.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Status(u8);

impl Status {
    /// No status recorded yet.
    pub const NONE: Status = Status(0x00);
    /// Transfer accepted.
    pub const OK: Status = Status(0x20);
    /// Bus access not granted in time; the request may be retried.
    pub const WAIT: Status = Status(0x40);
    /// An earlier transfer was accepted, a later one got WAIT.
    pub const WAIT_OK: Status = Status(0x60);
    /// Command error (access denied or similar).
    pub const FAULT: Status = Status(0x80);
    /// An earlier transfer was accepted, a later one faulted.
    pub const FAULT_OK: Status = Status(0xA0);
    /// No valid reply on the wire at all; all three ack bits read high, as
    /// they do on a floating line with no target attached.
    pub const FAILURE: Status = Status(0xE0);

    pub const fn raw(self) -> u8 {
        self.0
    }

    /// True if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Status) -> bool {
        self.0 & other.0 == other.0
    }

    /// Exactly OK, nothing else merged in.
    pub fn is_ok(self) -> bool {
        self == Status::OK
    }

    pub const fn has_ok(self) -> bool {
        self.contains(Status::OK)
    }

    pub const fn has_wait(self) -> bool {
        self.contains(Status::WAIT)
    }

    pub const fn has_fault(self) -> bool {
        self.contains(Status::FAULT)
    }

    pub const fn is_failure(self) -> bool {
        self.contains(Status::FAILURE)
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Status::NONE => "NONE",
            Status::OK => "OK",
            Status::WAIT => "WAIT",
            Status::WAIT_OK => "WAIT_OK",
            Status::FAULT => "FAULT",
            Status::FAULT_OK => "FAULT_OK",
            Status::FAILURE => "FAILURE",
            _ => return None,
        })
    }
}

impl From<u8> for Status {
    fn from(raw: u8) -> Self {
        Status(raw)
    }
}

impl From<Status> for u8 {
    fn from(status: Status) -> Self {
        status.0
    }
}

impl BitOr for Status {
    type Output = Status;

    fn bitor(self, rhs: Status) -> Status {
        Status(self.0 | rhs.0)
    }
}

impl BitOrAssign for Status {
    fn bitor_assign(&mut self, rhs: Status) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "Status({name})"),
            None => write!(f, "Status({:#04x})", self.0),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#04x}", self.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combining_statuses_matches_the_wire_values() {
        assert_eq!(Status::OK | Status::WAIT, Status::WAIT_OK);
        assert_eq!(Status::FAULT | Status::OK, Status::FAULT_OK);
        assert_eq!(Status::OK | Status::WAIT | Status::FAULT, Status::FAILURE);
    }

    #[test]
    fn combined_bits_are_never_cleared() {
        let mut status = Status::NONE;
        status |= Status::OK;
        status |= Status::FAULT;
        status |= Status::OK;

        assert!(status.has_ok());
        assert!(status.has_fault());
        assert_eq!(status, Status::FAULT_OK);
        assert!(!status.is_ok());
    }

    #[test]
    fn failure_covers_all_ack_bits() {
        assert!(Status::FAILURE.has_ok());
        assert!(Status::FAILURE.has_wait());
        assert!(Status::FAILURE.has_fault());
        assert!(Status::FAILURE.is_failure());
        assert!(!Status::FAULT_OK.is_failure());
    }

    #[test]
    fn display_names_known_values_and_hex_for_mixtures() {
        assert_eq!(Status::WAIT_OK.to_string(), "WAIT_OK");
        assert_eq!((Status::WAIT | Status::FAULT).to_string(), "0xc0");
    }
}
