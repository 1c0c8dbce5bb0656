//! Logical debug-port operations built on single transfers.
//!
//! Each operation is a fixed sequence of register accesses. A sub-access
//! never aborts the sequence: its acknowledgement is merged into the
//! running [`Status`] mask and the remaining accesses run regardless, so
//! the caller always sees the full picture of what the target answered.

use bitfield::bitfield;

use crate::probe::ProbeError;
use crate::swd::packet::DapAccess;
use crate::swd::{PortType, Status};

/// Register indices on the two ports, as encoded in the request header.
pub mod regs {
    /// DP: identification code (read-only).
    pub const DP_IDCODE: u8 = 0;
    /// DP: control and status.
    pub const DP_CTRL_STAT: u8 = 1;
    /// DP: access-port and bank select.
    pub const DP_SELECT: u8 = 2;
    /// DP: posted-read result buffer.
    pub const DP_RDBUFF: u8 = 3;
    /// AP: control and status word.
    pub const AP_CSW: u8 = 0;
    /// AP: transfer address.
    pub const AP_TAR: u8 = 1;
    /// AP: data read/write.
    pub const AP_DRW: u8 = 3;
}

bitfield! {
    /// The SELECT register.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct Select(u32);
    impl Debug;

    u8;
    /// Which access port subsequent AP transfers address.
    pub ap_sel, set_ap_sel: 31, 24;

    /// Register bank within the selected access port. Placed in the low
    /// nibble; targets that expect the bank at bits 7:4 are out of scope.
    pub bank_sel, set_bank_sel: 3, 0;
}

impl From<u32> for Select {
    fn from(raw: u32) -> Self {
        Select(raw)
    }
}

impl From<Select> for u32 {
    fn from(raw: Select) -> Self {
        raw.0
    }
}

bitfield! {
    /// The CTRL/STAT register.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct Ctrl(u32);
    impl Debug;

    pub csyspwrupack, _: 31;
    pub csyspwrupreq, set_csyspwrupreq: 30;
    pub cdbgpwrupack, _: 29;
    pub cdbgpwrupreq, set_cdbgpwrupreq: 28;
    pub sticky_err, _: 5;
    pub sticky_orun, _: 1;
}

impl Default for Ctrl {
    fn default() -> Self {
        Ctrl(0)
    }
}

impl From<u32> for Ctrl {
    fn from(raw: u32) -> Self {
        Ctrl(raw)
    }
}

impl From<Ctrl> for u32 {
    fn from(raw: Ctrl) -> Self {
        raw.0
    }
}

bitfield! {
    /// The access port's control and status word.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct Csw(u32);
    impl Debug;

    pub device_en, _: 6;

    u8;
    /// Address auto-increment mode.
    pub addr_inc, set_addr_inc: 5, 4;

    /// Transfer size; `0b010` selects 32-bit accesses.
    pub size, set_size: 2, 0;
}

impl From<u32> for Csw {
    fn from(raw: u32) -> Self {
        Csw(raw)
    }
}

impl From<Csw> for u32 {
    fn from(raw: Csw) -> Self {
        raw.0
    }
}

bitfield! {
    /// An identification code as read from the debug port.
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct IdCode(u32);
    impl Debug;

    u8;
    /// The IDCODE version.
    pub version, set_version: 31, 28;

    u16;
    /// The part number.
    pub part_number, set_part_number: 27, 12;

    /// The JEDEC JEP-106 Manufacturer ID.
    pub manufacturer, set_manufacturer: 11, 1;

    u8;
    /// The continuation code of the JEDEC JEP-106 Manufacturer ID.
    pub manufacturer_continuation, set_manufacturer_continuation: 11, 8;

    /// The identity code of the JEDEC JEP-106 Manufacturer ID.
    pub manufacturer_identity, set_manufacturer_identity: 7, 1;

    bool;
    /// The least-significant bit. Always set on a valid code.
    pub lsbit, set_lsbit: 0;
}

impl IdCode {
    /// Returns `true` iff the least significant bit is `1` and the 7-bit
    /// `manufacturer_identity` holds a non-reserved value.
    pub fn valid(&self) -> bool {
        self.lsbit() && (self.manufacturer() != 0) && (self.manufacturer() != 127)
    }

    /// Return the manufacturer name, if available.
    pub fn manufacturer_name(&self) -> Option<&'static str> {
        let cc = self.manufacturer_continuation();
        let id = self.manufacturer_identity();
        jep106::JEP106Code::new(cc, id).get()
    }
}

impl From<u32> for IdCode {
    fn from(raw: u32) -> Self {
        IdCode(raw)
    }
}

impl From<IdCode> for u32 {
    fn from(raw: IdCode) -> Self {
        raw.0
    }
}

impl std::fmt::Display for IdCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(mfn) = self.manufacturer_name() {
            write!(f, "0x{:08X} ({})", self.0, mfn)
        } else {
            write!(f, "0x{:08X}", self.0)
        }
    }
}

/// Outcome of a compound debug-port operation.
///
/// `status` is the OR of every sub-access acknowledgement; `steps` keeps
/// them individually, in execution order, for callers that need to know
/// which access misbehaved. `value` is whatever the operation's final read
/// produced (zero for pure write sequences).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DpResult {
    pub status: Status,
    pub value: u32,
    pub steps: Vec<Status>,
}

impl DpResult {
    fn step(&mut self, status: Status) -> Status {
        self.status |= status;
        self.steps.push(status);
        status
    }
}

/// The debug-port operations exposed to command handling.
///
/// Implemented for anything that can move single transfers; the provided
/// methods contain the full sequences.
pub trait DebugPortOps: DapAccess {
    /// Read the identification code register.
    fn read_identification(&mut self) -> Result<DpResult, ProbeError> {
        let mut result = DpResult::default();

        let (status, value) = self.read_register(PortType::DebugPort, regs::DP_IDCODE)?;
        result.step(status);
        result.value = value;

        let idcode = IdCode::from(value);
        tracing::debug!(%idcode, %result.status, "read identification");

        Ok(result)
    }

    /// Point subsequent access-port transfers at `ap`, bank `bank`.
    fn select_access_port_bank(&mut self, ap: u8, bank: u8) -> Result<DpResult, ProbeError> {
        let mut select = Select(0);
        select.set_ap_sel(ap);
        select.set_bank_sel(bank);

        let mut result = DpResult::default();
        result.step(self.write_register(PortType::DebugPort, regs::DP_SELECT, select.into())?);
        Ok(result)
    }

    /// Select access port 0, bank 0 (the memory access port).
    fn select_ahb_access_port(&mut self) -> Result<DpResult, ProbeError> {
        self.select_access_port_bank(0, 0)
    }

    /// Put the memory access port into 32-bit transfer mode.
    ///
    /// Reads the current control word, patches the size field and writes it
    /// back, then reads it again so the caller can verify the setting took.
    /// The returned value is the final control word.
    fn configure_32bit_transfer_mode(&mut self) -> Result<DpResult, ProbeError> {
        let mut result = DpResult::default();

        let select = self.select_ahb_access_port()?;
        result.step(select.status);

        result.step(self.read_register(PortType::AccessPort, regs::AP_CSW)?.0);
        let (status, posted) = self.read_register(PortType::DebugPort, regs::DP_RDBUFF)?;
        result.step(status);

        let mut csw = Csw::from(posted);
        csw.set_size(0b010);
        result.step(self.write_register(PortType::AccessPort, regs::AP_CSW, csw.into())?);

        result.step(self.read_register(PortType::AccessPort, regs::AP_CSW)?.0);
        let (status, value) = self.read_register(PortType::DebugPort, regs::DP_RDBUFF)?;
        result.step(status);
        result.value = value;

        Ok(result)
    }

    /// Read one 32-bit word from the target's address space.
    ///
    /// Posts the address, issues the access and collects the result from
    /// the posted-read buffer.
    fn read_access_port_address(&mut self, address: u32) -> Result<DpResult, ProbeError> {
        let mut result = DpResult::default();

        result.step(self.write_register(PortType::AccessPort, regs::AP_TAR, address)?);
        result.step(self.read_register(PortType::AccessPort, regs::AP_DRW)?.0);
        let (status, value) = self.read_register(PortType::DebugPort, regs::DP_RDBUFF)?;
        result.step(status);
        result.value = value;

        tracing::trace!(
            address = format_args!("{address:#010x}"),
            value = format_args!("{:#010x}", result.value),
            %result.status,
            "read word"
        );

        Ok(result)
    }

    /// Request debug and system power-up.
    fn enable_debug_interface(&mut self) -> Result<DpResult, ProbeError> {
        let mut ctrl = Ctrl::default();
        ctrl.set_csyspwrupreq(true);
        ctrl.set_cdbgpwrupreq(true);

        let mut result = DpResult::default();
        result.step(self.write_register(PortType::DebugPort, regs::DP_CTRL_STAT, ctrl.into())?);
        Ok(result)
    }

    /// Reset the wire and read the identification code, the first exchange
    /// after connecting to a target.
    fn initialize(&mut self) -> Result<DpResult, ProbeError> {
        self.line_reset()?;
        self.read_identification()
    }
}

impl<P: DapAccess + ?Sized> DebugPortOps for P {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swd::TransferDirection;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Access {
        Register(TransferDirection, PortType, u8, u32),
        LineReset,
    }

    /// Scripted transfer mover recording the access sequence.
    #[derive(Default)]
    struct MockDap {
        responses: VecDeque<(Status, u32)>,
        accesses: Vec<Access>,
    }

    impl MockDap {
        fn respond(mut self, status: Status, value: u32) -> Self {
            self.responses.push_back((status, value));
            self
        }

        fn respond_ok(self, value: u32) -> Self {
            self.respond(Status::OK, value)
        }

        fn next_response(&mut self) -> (Status, u32) {
            // Past the script the target answers like a floating line.
            self.responses
                .pop_front()
                .unwrap_or((Status::FAILURE, u32::MAX))
        }
    }

    impl DapAccess for MockDap {
        fn read_register(
            &mut self,
            port: PortType,
            register: u8,
        ) -> Result<(Status, u32), ProbeError> {
            let (status, value) = self.next_response();
            self.accesses
                .push(Access::Register(TransferDirection::Read, port, register, value));
            Ok((status, value))
        }

        fn write_register(
            &mut self,
            port: PortType,
            register: u8,
            value: u32,
        ) -> Result<Status, ProbeError> {
            let (status, _) = self.next_response();
            self.accesses
                .push(Access::Register(TransferDirection::Write, port, register, value));
            Ok(status)
        }

        fn line_reset(&mut self) -> Result<(), ProbeError> {
            self.accesses.push(Access::LineReset);
            Ok(())
        }
    }

    #[test]
    fn read_identification_returns_the_idcode_register() {
        let mut dap = MockDap::default().respond_ok(0x2BA0_1477);

        let result = dap.read_identification().unwrap();

        assert_eq!(result.status, Status::OK);
        assert_eq!(result.value, 0x2BA0_1477);
        assert!(IdCode::from(result.value).valid());
        assert_eq!(
            dap.accesses,
            vec![Access::Register(
                TransferDirection::Read,
                PortType::DebugPort,
                regs::DP_IDCODE,
                0x2BA0_1477
            )]
        );
    }

    #[test]
    fn select_packs_ap_high_and_bank_in_the_low_nibble() {
        let mut dap = MockDap::default().respond_ok(0);

        dap.select_access_port_bank(1, 3).unwrap();

        assert_eq!(
            dap.accesses,
            vec![Access::Register(
                TransferDirection::Write,
                PortType::DebugPort,
                regs::DP_SELECT,
                0x0100_0003
            )]
        );
    }

    #[test]
    fn enable_debug_interface_requests_both_powerups() {
        let mut dap = MockDap::default().respond_ok(0);

        dap.enable_debug_interface().unwrap();

        assert_eq!(
            dap.accesses,
            vec![Access::Register(
                TransferDirection::Write,
                PortType::DebugPort,
                regs::DP_CTRL_STAT,
                0x5000_0000
            )]
        );
    }

    #[test]
    fn configure_32bit_mode_patches_only_the_size_field() {
        let mut dap = MockDap::default()
            .respond_ok(0) // SELECT write
            .respond_ok(0) // CSW read (posted)
            .respond_ok(0xA7) // RDBUFF: current CSW
            .respond_ok(0) // CSW write
            .respond_ok(0) // CSW read (posted)
            .respond_ok(0xA2); // RDBUFF: resulting CSW

        let result = dap.configure_32bit_transfer_mode().unwrap();

        assert_eq!(result.status, Status::OK);
        assert_eq!(result.value, 0xA2);
        assert_eq!(result.steps.len(), 6);
        // The written value is the read-back 0xA7 with size forced to 0b010.
        assert!(dap.accesses.contains(&Access::Register(
            TransferDirection::Write,
            PortType::AccessPort,
            regs::AP_CSW,
            0xA2
        )));
    }

    #[test]
    fn address_read_posts_tar_then_collects_from_rdbuff() {
        let mut dap = MockDap::default()
            .respond_ok(0)
            .respond_ok(0xFFFF_FFFF)
            .respond_ok(0x1234_5678);

        let result = dap.read_access_port_address(0x4000_0000).unwrap();

        assert_eq!(result.value, 0x1234_5678);
        assert_eq!(
            dap.accesses,
            vec![
                Access::Register(
                    TransferDirection::Write,
                    PortType::AccessPort,
                    regs::AP_TAR,
                    0x4000_0000
                ),
                Access::Register(
                    TransferDirection::Read,
                    PortType::AccessPort,
                    regs::AP_DRW,
                    0xFFFF_FFFF
                ),
                Access::Register(
                    TransferDirection::Read,
                    PortType::DebugPort,
                    regs::DP_RDBUFF,
                    0x1234_5678
                ),
            ]
        );
    }

    #[test]
    fn mixed_acknowledgements_merge_but_every_access_still_runs() {
        let mut dap = MockDap::default()
            .respond(Status::WAIT, 0)
            .respond_ok(0xCAFE_F00D)
            .respond(Status::FAULT, 0);

        let result = dap.read_access_port_address(0).unwrap();

        assert_eq!(result.status, Status::OK | Status::WAIT | Status::FAULT);
        assert_eq!(result.steps, vec![Status::WAIT, Status::OK, Status::FAULT]);
        assert_eq!(dap.accesses.len(), 3);
    }

    #[test]
    fn initialize_resets_the_wire_before_the_first_read() {
        let mut dap = MockDap::default().respond_ok(0x0BC1_1477);

        let result = dap.initialize().unwrap();

        assert_eq!(result.value, 0x0BC1_1477);
        assert_eq!(dap.accesses[0], Access::LineReset);
    }

    #[test]
    fn idcode_decodes_the_manufacturer() {
        let idcode = IdCode::from(0x2BA0_1477);
        assert_eq!(idcode.manufacturer_name(), Some("ARM Ltd"));
        assert_eq!(idcode.to_string(), "0x2BA01477 (ARM Ltd)");
        assert_eq!(idcode.version(), 2);
    }
}
