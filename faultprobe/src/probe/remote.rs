//! Remote pin access over TCP, for bench setups where the pins hang off a
//! networked bridge.
//!
//! The protocol is single ASCII characters per action, in the spirit of the
//! openocd remote_bitbang transport: [bitbang](https://github.com/openocd-org/openocd/blob/b6b4f9d46a48aadc1de6bb5152ff4913661c9059/doc/manual/jtag/drivers/remote_bitbang.txt).
//! Sampling commands answer with `'0'` or `'1'`.
//!
//! Round-trip latency makes this transport unsuitable for timing-faithful
//! glitching; pair it with [`crate::timing::SpinTimer`] for protocol
//! exploration against targets that tolerate a slow clock.

use std::io::{Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::probe::{ControlIo, PinDirection, ProbeError, SwdIo};

#[derive(Debug)]
pub struct RemoteProbe {
    socket: TcpStream,
}

impl RemoteProbe {
    /// Connect to a bridge listening at `addr`.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProbeError> {
        let mut socket = TcpStream::connect(addr)?;

        // Dump anything that was already in the socket.
        let mut junk = vec![];
        socket.set_read_timeout(Some(Duration::from_millis(500)))?;
        socket.set_write_timeout(Some(Duration::from_millis(500)))?;
        let _ = socket.read_to_end(&mut junk);

        tracing::debug!("connected to remote probe");
        Ok(Self { socket })
    }

    fn send(&mut self, command: char) -> Result<(), ProbeError> {
        let mut buf = [0; 4];
        self.socket
            .write_all(command.encode_utf8(&mut buf).as_bytes())?;
        Ok(())
    }

    /// Send a sampling command and decode the one-byte reply.
    fn query(&mut self, command: char) -> Result<bool, ProbeError> {
        self.send(command)?;

        let mut reply = [0; 1];
        self.socket.read_exact(&mut reply)?;
        match reply[0] {
            b'0' => Ok(false),
            b'1' => Ok(true),
            other => Err(ProbeError::UnexpectedReply(other)),
        }
    }
}

impl Drop for RemoteProbe {
    fn drop(&mut self) {
        // Tell the bridge we are done; it may keep listening for the next
        // session.
        let _ = self.send('Q');
    }
}

impl SwdIo for RemoteProbe {
    fn set_clock(&mut self, high: bool) -> Result<(), ProbeError> {
        self.send(if high { 'C' } else { 'c' })
    }

    fn set_swdio(&mut self, high: bool) -> Result<(), ProbeError> {
        self.send(if high { '1' } else { '0' })
    }

    fn swdio(&mut self) -> Result<bool, ProbeError> {
        self.query('R')
    }

    fn set_swdio_direction(&mut self, direction: PinDirection) -> Result<(), ProbeError> {
        self.send(match direction {
            PinDirection::Input => 'i',
            PinDirection::Output => 'o',
        })
    }
}

impl ControlIo for RemoteProbe {
    fn set_power(&mut self, on: bool) -> Result<(), ProbeError> {
        self.send(if on { 'P' } else { 'p' })
    }

    fn set_glitch(&mut self, active: bool) -> Result<(), ProbeError> {
        self.send(if active { 'G' } else { 'g' })
    }

    fn trigger(&mut self) -> Result<bool, ProbeError> {
        self.query('T')
    }
}
