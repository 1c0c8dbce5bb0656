//! Hardware access seam.
//!
//! The protocol engine and the glitch controller never touch pins directly;
//! they go through the [`SwdIo`] and [`ControlIo`] traits. Real deployments
//! implement these over GPIO (or over a bridge, see [`remote`]), tests use
//! the recording [`fake::FakeProbe`].

pub mod fake;
pub mod remote;

/// Direction of the shared SWDIO data line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinDirection {
    Input,
    Output,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe I/O failed")]
    Io(#[from] std::io::Error),
    #[error("unexpected reply byte from remote probe: {0:#04x}")]
    UnexpectedReply(u8),
    #[error("the trigger wait was cancelled by the probe backend")]
    Cancelled,
    #[error("an error specific to a probe backend occurred")]
    ProbeSpecific(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Pin-level access to the two debug-protocol lines.
///
/// Implementations must apply each call to the hardware before returning;
/// the transport layer interleaves these calls with calibrated waits and the
/// resulting edge timing is what the target sees.
pub trait SwdIo {
    /// Drive the clock line.
    fn set_clock(&mut self, high: bool) -> Result<(), ProbeError>;

    /// Drive the data line. Only meaningful while the line direction is
    /// [`PinDirection::Output`]; implementations may latch the level for the
    /// next direction switch otherwise.
    fn set_swdio(&mut self, high: bool) -> Result<(), ProbeError>;

    /// Sample the data line.
    fn swdio(&mut self) -> Result<bool, ProbeError>;

    /// Switch the data line between driving and sampling.
    fn set_swdio_direction(&mut self, direction: PinDirection) -> Result<(), ProbeError>;
}

/// The three fault-injection control lines.
pub trait ControlIo {
    /// Drive the target power switch.
    fn set_power(&mut self, on: bool) -> Result<(), ProbeError>;

    /// Drive the glitch output (shorts the target's core supply while high).
    fn set_glitch(&mut self, active: bool) -> Result<(), ProbeError>;

    /// Sample the trigger input.
    ///
    /// Returning an error from here is the only way to break out of
    /// [`crate::glitch::GlitchController::wait_for_trigger`]; a backend that
    /// wants cancellation support can return [`ProbeError::Cancelled`].
    fn trigger(&mut self) -> Result<bool, ProbeError>;
}
