//! Firmware logic for a voltage-glitching fault injection tool with a
//! bit-banged, SWD-style two-wire debug port.
//!
//! The crate is hardware-agnostic: pin access goes through the
//! [`SwdIo`]/[`ControlIo`] traits and all waits through a [`Timebase`], so
//! the protocol engine and the glitch timing run unchanged on a GPIO
//! backend, over a [`RemoteProbe`] bridge, or against the recording
//! [`FakeProbe`] in tests.
//!
//! ```
//! use faultprobe::{FakeProbe, GlitchController, Session, SwdInterface};
//!
//! let probe = FakeProbe::new();
//! probe.set_trigger(true);
//!
//! let swd = SwdInterface::new(probe.clone(), probe.clone());
//! let glitch = GlitchController::new(probe.clone(), probe.clone());
//! let mut session = Session::new(swd, glitch);
//!
//! session.set_delay(0);
//! session.set_pulse(5);
//! session.run_glitch_cycle()?;
//! # Ok::<(), faultprobe::ProbeError>(())
//! ```

pub mod glitch;
pub mod probe;
pub mod session;
pub mod swd;
pub mod timing;

pub use glitch::{GlitchController, GlitchSettings, GlitchState, GlitchStatistics};
pub use probe::fake::FakeProbe;
pub use probe::remote::RemoteProbe;
pub use probe::{ControlIo, PinDirection, ProbeError, SwdIo};
pub use session::{Command, CommandError, CommandReply, Session};
pub use swd::dp::{DebugPortOps, DpResult, IdCode};
pub use swd::packet::{DapAccess, TransferRequest};
pub use swd::transport::SwdInterface;
pub use swd::{PortType, Status, TransferDirection};
pub use timing::{SpinTimer, Timebase};
