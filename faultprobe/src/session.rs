//! Host command handling.
//!
//! The host drives the tool through single-byte opcodes, some followed by a
//! little-endian parameter word. [`Session`] owns the debug-port engine and
//! the glitch controller and maps each parsed [`Command`] onto them.

use crate::glitch::GlitchController;
use crate::probe::{ControlIo, ProbeError};
use crate::swd::dp::DebugPortOps;
use crate::swd::packet::DapAccess;
use crate::swd::Status;
use crate::timing::Timebase;

mod opcodes {
    pub const SET_DELAY: u8 = 0x41;
    pub const SET_PULSE: u8 = 0x42;
    pub const RUN_GLITCH_CYCLE: u8 = 0x43;
    pub const POWER_ON: u8 = 0x44;
    pub const POWER_OFF: u8 = 0x45;
    pub const READ_IDENTIFICATION: u8 = 0x49;
}

/// A decoded host command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Set the trigger-to-pulse delay, in quanta.
    SetDelay(u32),
    /// Set the pulse width, in quanta.
    SetPulse(u32),
    /// Run one glitch attempt with the current settings.
    RunGlitchCycle,
    PowerOn,
    PowerOff,
    /// Read the target's identification code.
    ReadIdentification,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),
    #[error("parameter too short: expected {expected} bytes, received {received}")]
    ShortParameter { expected: usize, received: usize },
}

impl Command {
    /// Decode an opcode byte and its parameter bytes.
    ///
    /// Parameter words are little-endian; extra payload bytes beyond what
    /// the opcode consumes are ignored.
    pub fn parse(opcode: u8, payload: &[u8]) -> Result<Command, CommandError> {
        let word = |payload: &[u8]| -> Result<u32, CommandError> {
            match payload.first_chunk::<4>() {
                Some(bytes) => Ok(u32::from_le_bytes(*bytes)),
                None => Err(CommandError::ShortParameter {
                    expected: 4,
                    received: payload.len(),
                }),
            }
        };

        match opcode {
            opcodes::SET_DELAY => Ok(Command::SetDelay(word(payload)?)),
            opcodes::SET_PULSE => Ok(Command::SetPulse(word(payload)?)),
            opcodes::RUN_GLITCH_CYCLE => Ok(Command::RunGlitchCycle),
            opcodes::POWER_ON => Ok(Command::PowerOn),
            opcodes::POWER_OFF => Ok(Command::PowerOff),
            opcodes::READ_IDENTIFICATION => Ok(Command::ReadIdentification),
            other => Err(CommandError::UnknownOpcode(other)),
        }
    }
}

/// What a completed command reports back to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandReply {
    /// The command finished; nothing to report beyond completion.
    Done,
    /// Result of [`Command::ReadIdentification`].
    Identification { status: Status, idcode: u32 },
}

/// One attached tool: a debug-port engine plus a glitch controller.
#[derive(Debug)]
pub struct Session<DAP, IO, T> {
    dap: DAP,
    glitch: GlitchController<IO, T>,
}

impl<DAP, IO, T> Session<DAP, IO, T>
where
    DAP: DapAccess,
    IO: ControlIo,
    T: Timebase,
{
    pub fn new(dap: DAP, glitch: GlitchController<IO, T>) -> Self {
        Self { dap, glitch }
    }

    pub fn dap(&mut self) -> &mut DAP {
        &mut self.dap
    }

    pub fn glitch(&mut self) -> &mut GlitchController<IO, T> {
        &mut self.glitch
    }

    pub fn set_delay(&mut self, quanta: u32) {
        self.glitch.set_delay(quanta);
    }

    pub fn set_pulse(&mut self, quanta: u32) {
        self.glitch.set_pulse(quanta);
    }

    pub fn power_on(&mut self) -> Result<(), ProbeError> {
        self.glitch.power_on()
    }

    pub fn power_off(&mut self) -> Result<(), ProbeError> {
        self.glitch.power_off()
    }

    pub fn run_glitch_cycle(&mut self) -> Result<(), ProbeError> {
        self.glitch.run_glitch_cycle()
    }

    pub fn read_identification(&mut self) -> Result<(Status, u32), ProbeError> {
        let result = self.dap.read_identification()?;
        Ok((result.status, result.value))
    }

    /// Execute one command against the attached hardware.
    pub fn run_command(&mut self, command: Command) -> Result<CommandReply, ProbeError> {
        tracing::debug!(?command, "running command");

        match command {
            Command::SetDelay(quanta) => {
                self.set_delay(quanta);
                Ok(CommandReply::Done)
            }
            Command::SetPulse(quanta) => {
                self.set_pulse(quanta);
                Ok(CommandReply::Done)
            }
            Command::RunGlitchCycle => {
                self.run_glitch_cycle()?;
                Ok(CommandReply::Done)
            }
            Command::PowerOn => {
                self.power_on()?;
                Ok(CommandReply::Done)
            }
            Command::PowerOff => {
                self.power_off()?;
                Ok(CommandReply::Done)
            }
            Command::ReadIdentification => {
                let (status, idcode) = self.read_identification()?;
                Ok(CommandReply::Identification { status, idcode })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fake::{Event, FakeProbe};
    use crate::swd::PortType;
    use test_case::test_case;

    #[test_case(0x41, &[0x10, 0x27, 0x00, 0x00] => Ok(Command::SetDelay(10_000)))]
    #[test_case(0x42, &[0x05, 0x00, 0x00, 0x00] => Ok(Command::SetPulse(5)))]
    #[test_case(0x42, &[0x05, 0x00, 0x00, 0x00, 0xFF] => Ok(Command::SetPulse(5)); "extra payload bytes ignored")]
    #[test_case(0x43, &[] => Ok(Command::RunGlitchCycle))]
    #[test_case(0x44, &[] => Ok(Command::PowerOn))]
    #[test_case(0x45, &[] => Ok(Command::PowerOff))]
    #[test_case(0x49, &[] => Ok(Command::ReadIdentification))]
    #[test_case(0x46, &[] => Err(CommandError::UnknownOpcode(0x46)))]
    #[test_case(0x41, &[0x10, 0x27] => Err(CommandError::ShortParameter { expected: 4, received: 2 }))]
    fn command_parsing(opcode: u8, payload: &[u8]) -> Result<Command, CommandError> {
        Command::parse(opcode, payload)
    }

    /// Debug-port stand-in answering every read with a fixed word.
    struct FixedDap(u32);

    impl DapAccess for FixedDap {
        fn read_register(&mut self, _: PortType, _: u8) -> Result<(Status, u32), ProbeError> {
            Ok((Status::OK, self.0))
        }

        fn write_register(&mut self, _: PortType, _: u8, _: u32) -> Result<Status, ProbeError> {
            Ok(Status::OK)
        }

        fn line_reset(&mut self) -> Result<(), ProbeError> {
            Ok(())
        }
    }

    fn session(probe: &FakeProbe) -> Session<FixedDap, FakeProbe, FakeProbe> {
        Session::new(
            FixedDap(0x2BA0_1477),
            GlitchController::new(probe.clone(), probe.clone()),
        )
    }

    #[test]
    fn set_commands_update_the_glitch_settings() {
        let probe = FakeProbe::new();
        let mut session = session(&probe);

        session.run_command(Command::SetDelay(1200)).unwrap();
        session.run_command(Command::SetPulse(7)).unwrap();

        assert_eq!(session.glitch().settings().delay_quanta, 1200);
        assert_eq!(session.glitch().settings().pulse_quanta, 7);
    }

    #[test]
    fn power_commands_drive_the_power_line() {
        let probe = FakeProbe::new();
        let mut session = session(&probe);

        session.run_command(Command::PowerOn).unwrap();
        session.run_command(Command::PowerOff).unwrap();

        assert_eq!(
            probe.events(),
            vec![Event::Power(true), Event::Power(false)]
        );
    }

    #[test]
    fn identification_reply_carries_status_and_idcode() {
        let probe = FakeProbe::new();
        let mut session = session(&probe);

        let reply = session.run_command(Command::ReadIdentification).unwrap();

        assert_eq!(
            reply,
            CommandReply::Identification {
                status: Status::OK,
                idcode: 0x2BA0_1477
            }
        );
    }
}
