//! Bit-level transport over the clock and data lines.
//!
//! Every edge is bracketed by one timebase quantum, mirroring the cadence
//! the target hardware was characterized against. The transport knows
//! nothing about packets; it moves raw bit sequences and handles line
//! direction hand-over.

use crate::probe::{PinDirection, ProbeError, SwdIo};
use crate::timing::Timebase;

/// Clock pulses with both lines held high during a line reset.
///
/// The protocol standard asks for at least 50; the extra margin and the
/// trailing 3 pulses with data low are what the supported targets were
/// brought up with, so the sequence is kept verbatim rather than replaced
/// by a textbook switch sequence.
const LINE_RESET_HIGH_PULSES: usize = 60;
const LINE_RESET_LOW_PULSES: usize = 3;

/// Owns the two protocol pins and the timebase that paces them.
#[derive(Debug)]
pub struct SwdInterface<IO, T> {
    io: IO,
    timer: T,
}

impl<IO: SwdIo, T: Timebase> SwdInterface<IO, T> {
    pub fn new(io: IO, timer: T) -> Self {
        Self { io, timer }
    }

    /// Clock out the lowest `count` bits of `data`, LSB-first.
    ///
    /// The data line must already be in output mode.
    pub fn send_bits(&mut self, data: &[u8], count: usize) -> Result<(), ProbeError> {
        for i in 0..count {
            let bit = data[i / 8] >> (i % 8) & 1 == 1;

            self.io.set_swdio(bit)?;
            self.timer.wait_quantum();

            self.io.set_clock(true)?;
            self.timer.wait_quantum();
            self.io.set_clock(false)?;
            self.timer.wait_quantum();
        }

        Ok(())
    }

    /// Release the data line and clock in `count` bits.
    ///
    /// Each bit is sampled immediately before its clock pulse. Bits are
    /// assembled LSB-first into successive bytes, so the first-received
    /// eight bits form byte 0 of the result. The accumulator shifts from
    /// the top, which leaves a trailing partial byte left-aligned: a 3-bit
    /// read lands at bits 7:5. That alignment is what maps a raw ack
    /// capture directly onto the [`crate::swd::Status`] constants.
    pub fn read_bits(&mut self, count: usize) -> Result<Vec<u8>, ProbeError> {
        self.release_swdio()?;

        let mut buffer = vec![0u8; count.div_ceil(8)];
        let mut acc = 0u8;

        for i in 0..count {
            acc >>= 1;
            if self.io.swdio()? {
                acc |= 0x80;
            }
            buffer[i / 8] = acc;

            self.io.set_clock(true)?;
            self.timer.wait_quantum();
            self.io.set_clock(false)?;
            self.timer.wait_quantum();

            if i % 8 == 7 {
                acc = 0;
            }
        }

        Ok(buffer)
    }

    /// Yield the data line to the target: drive it high, then switch to
    /// input.
    pub fn release_swdio(&mut self) -> Result<(), ProbeError> {
        self.io.set_swdio(true)?;
        self.timer.wait_quantum();
        self.io.set_swdio_direction(PinDirection::Input)?;
        self.timer.wait_quantum();
        Ok(())
    }

    /// Reclaim the data line: drive it low, then switch to output.
    pub fn drive_swdio(&mut self) -> Result<(), ProbeError> {
        self.io.set_swdio(false)?;
        self.timer.wait_quantum();
        self.io.set_swdio_direction(PinDirection::Output)?;
        self.timer.wait_quantum();
        Ok(())
    }

    /// One clock pulse with no data-line change, stepping through a
    /// direction hand-over window.
    pub fn turnaround(&mut self) -> Result<(), ProbeError> {
        self.io.set_clock(true)?;
        self.timer.wait_quantum();
        self.io.set_clock(false)?;
        self.timer.wait_quantum();
        Ok(())
    }

    /// Reset the wire: both lines high for [`LINE_RESET_HIGH_PULSES`]
    /// clocks, then data low for [`LINE_RESET_LOW_PULSES`] more.
    pub fn line_reset(&mut self) -> Result<(), ProbeError> {
        tracing::debug!("performing line reset");

        self.io.set_swdio_direction(PinDirection::Output)?;
        self.io.set_clock(true)?;
        self.io.set_swdio(true)?;
        self.timer.wait_quantum();

        for _ in 0..LINE_RESET_HIGH_PULSES {
            self.turnaround()?;
        }

        self.io.set_swdio(false)?;

        for _ in 0..LINE_RESET_LOW_PULSES {
            self.turnaround()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::fake::{Event, FakeProbe};

    fn interface(probe: &FakeProbe) -> SwdInterface<FakeProbe, FakeProbe> {
        SwdInterface::new(probe.clone(), probe.clone())
    }

    fn pin_events(probe: &FakeProbe) -> Vec<Event> {
        probe
            .events()
            .into_iter()
            .filter(|event| !matches!(event, Event::Quanta(_)))
            .collect()
    }

    #[test]
    fn send_bits_sets_data_before_each_clock_pulse() {
        let probe = FakeProbe::new();
        let mut swd = interface(&probe);

        swd.send_bits(&[0b101], 3).unwrap();

        assert_eq!(
            pin_events(&probe),
            vec![
                Event::Swdio(true),
                Event::Clock(true),
                Event::Clock(false),
                Event::Swdio(false),
                Event::Clock(true),
                Event::Clock(false),
                Event::Swdio(true),
                Event::Clock(true),
                Event::Clock(false),
            ]
        );
    }

    #[test]
    fn send_bits_paces_every_transition_by_one_quantum() {
        let probe = FakeProbe::new();
        let mut swd = interface(&probe);

        swd.send_bits(&[0xFF], 8).unwrap();

        // Three waits per bit: after data, after rising edge, after falling.
        assert_eq!(probe.quanta_total(), 24);
    }

    #[test]
    fn read_bits_packs_a_partial_byte_left_aligned() {
        let probe = FakeProbe::new();
        probe.script_reply_bits([true, false, false]);
        let mut swd = interface(&probe);

        // An OK ack (1, 0, 0) must land at bit 5.
        assert_eq!(swd.read_bits(3).unwrap(), vec![0x20]);
    }

    #[test]
    fn read_bits_fills_successive_bytes_first_received_first() {
        let probe = FakeProbe::new();
        // 9 bits: 0xA5 then a single 1 bit.
        let mut bits: Vec<bool> = (0..8).map(|i| 0xA5 >> i & 1 == 1).collect();
        bits.push(true);
        probe.script_reply_bits(bits);
        let mut swd = interface(&probe);

        assert_eq!(swd.read_bits(9).unwrap(), vec![0xA5, 0x80]);
    }

    #[test]
    fn read_bits_releases_the_line_first() {
        let probe = FakeProbe::new();
        probe.script_reply_bits([false]);
        let mut swd = interface(&probe);

        swd.read_bits(1).unwrap();

        assert_eq!(
            pin_events(&probe)[..2],
            [Event::Swdio(true), Event::Direction(PinDirection::Input)]
        );
    }

    #[test]
    fn line_reset_pulses_sixty_high_then_three_low() {
        let probe = FakeProbe::new();
        let mut swd = interface(&probe);

        swd.line_reset().unwrap();

        let events = pin_events(&probe);
        let data_low = events
            .iter()
            .position(|event| *event == Event::Swdio(false))
            .unwrap();
        let rising = |range: &[Event]| {
            range
                .iter()
                .filter(|event| **event == Event::Clock(true))
                .count()
        };

        // The initial hold counts as one rising edge, then 60 pulses before
        // the data line drops and 3 after.
        assert_eq!(rising(&events[..data_low]), 61);
        assert_eq!(rising(&events[data_low..]), 3);
    }
}
