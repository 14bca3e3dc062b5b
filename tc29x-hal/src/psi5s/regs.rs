//! PSI5-S register file
//!
//! The subset of the module's register map that this driver programs,
//! expressed as explicit encode/decode pairs: a `bitfield` image per
//! register plus the raw `u32` it packs to. Hardware layout knowledge is
//! confined to this module; the divider math never sees a register bit.

use crate::endinit::ConfigWrite;
use crate::fracdiv::DividerMode;
use vcell::VolatileCell;

/// Number of PSI5-S channels.
pub const NUM_CHANNELS: usize = 8;

/// Number of UART frame slots per PSI5 frame.
pub const NUM_FRAME_SLOTS: usize = 6;

/// Size of the baud generator's divisor domain (13-bit BG field).
pub const BG_RANGE: u32 = 0x2000;

/// Size of the fractional pre-divider's domain (10-bit FDV field).
pub const FDV_RANGE: u32 = 0x400;

bitfield::bitfield! {
    /// Image of a kernel clock divider register (FDR, FDRT).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct FracDiv(u32);
    /// Divider reload step value.
    pub u32, step, set_step: 9, 0;
    /// Divider mode field.
    pub u32, dm, set_dm: 15, 14;
}

bitfield::bitfield! {
    /// Image of the ASC clock output divider register (FDO).
    ///
    /// Same shape as [`FracDiv`] but with an 11-bit step field, since this
    /// divider runs on a doubled step domain.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct OutputDiv(u32);
    /// Divider reload step value.
    pub u32, step, set_step: 10, 0;
    /// Divider mode field.
    pub u32, dm, set_dm: 15, 14;
}

bitfield::bitfield! {
    /// Image of the baud generator register (BG).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct BaudGen(u32);
    /// Bit generator reload value.
    pub u32, value, set_value: 12, 0;
}

bitfield::bitfield! {
    /// Image of the fractional pre-divider register (FDV).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct FracDivPre(u32);
    /// Fractional divider reload value.
    pub u32, value, set_value: 9, 0;
}

bitfield::bitfield! {
    /// Image of the ASC control register (CON).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct Con(u32);
    /// Receive mode (0 = synchronous, 1 = asynchronous).
    pub u32, m, set_m: 2, 0;
    /// Two stop bits instead of one.
    pub stp, set_stp: 3;
    /// Parity check enable.
    pub pen, set_pen: 4;
    /// Framing check enable.
    pub fen, set_fen: 5;
    /// Overrun check enable.
    pub oen, set_oen: 6;
    /// Receiver odd parity.
    pub odd, set_odd: 7;
    /// Loopback enable.
    pub lb, set_lb: 9;
    /// Fractional divider enable.
    pub fde, set_fde: 11;
    /// Baud rate prescaler selection.
    pub brs, set_brs: 13;
    /// Transmit mode (0 = synchronous, 1 = asynchronous).
    pub u32, mtx, set_mtx: 18, 16;
    /// Transmitter odd parity.
    pub oddtx, set_oddtx: 19;
}

bitfield::bitfield! {
    /// Image of the global control register (GCR).
    ///
    /// The error-consideration bits select which error classes raise the
    /// receive status interrupt.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct GlobalCon(u32);
    /// CRC errors considered for RSI.
    pub crci, set_crci: 0;
    /// XCRC errors considered for RSI.
    pub xcrci, set_xcrci: 1;
    /// Transmit errors considered for RSI.
    pub tei, set_tei: 2;
    /// Parity errors considered for RSI.
    pub pe, set_pe: 3;
    /// Framing errors considered for RSI.
    pub fe, set_fe: 4;
    /// Overrun errors considered for RSI.
    pub oe, set_oe: 5;
    /// Receive buffer errors considered for RSI.
    pub rbi, set_rbi: 6;
    /// Header errors considered for RSI.
    pub hdi, set_hdi: 7;
    /// Idle time between UART frames, in bit times.
    pub u32, idt, set_idt: 11, 8;
    /// ASC-only mode, bypassing the PSI5 protocol layer.
    pub asc, set_asc: 12;
}

bitfield::bitfield! {
    /// Image of a channel's pulse generation control register (PGC).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct PulseGen(u32);
    /// Sync pulse command code for a zero bit.
    pub u32, txcmd, set_txcmd: 7, 0;
    /// Sync pulse command code for a one bit.
    pub u32, atxcmd, set_atxcmd: 15, 8;
    /// Time base select (0 = internal, 1 = external).
    pub tbs, set_tbs: 16;
    /// External time base input select.
    pub u32, etb, set_etb: 18, 17;
    /// External trigger input select.
    pub u32, ets, set_ets: 20, 19;
    /// Periodic trigger enable.
    pub pte, set_pte: 21;
    /// External trigger enable.
    pub ete, set_ete: 22;
}

bitfield::bitfield! {
    /// Image of a channel's trigger value register (CTV).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct ChannelTrigger(u32);
    /// Channel trigger compare value.
    pub u32, ctv, set_ctv: 15, 0;
    /// Channel trigger counter start value.
    pub u32, ctc, set_ctc: 31, 16;
}

bitfield::bitfield! {
    /// Image of a channel's receive control register A (RCRA).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct RecvControlA(u32);
    /// CRC (1) or parity (0) check per UART frame slot.
    pub u32, crc, set_crc: 0, 0, 6;
    /// Timestamp capture enable.
    pub tsen, set_tsen: 6;
    /// Timestamp register select (0 = A, 1 = B).
    pub tsp, set_tsp: 7;
    /// Timestamp trigger select (0 = sync pulse, 1 = frame reception).
    pub tsts, set_tsts: 8;
    /// Frame ID source select (0 = frame header, 1 = channel number).
    pub fids, set_fids: 9;
    /// Watchdog mode select (0 = per frame, 1 = per sync pulse).
    pub wdms, set_wdms: 10;
    /// Expected UART frame count per slot.
    pub u32, ufc, set_ufc: 13, 11, 6;
}

bitfield::bitfield! {
    /// Image of a channel's receive control register B (RCRB).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct RecvControlB(u32);
    /// Payload length in bits per UART frame slot.
    pub u32, pdl, set_pdl: 4, 0, 6;
}

bitfield::bitfield! {
    /// Image of a channel's send control register (SCR).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct SendControl(u32);
    /// Transmit payload length in nibbles.
    pub u32, pll, set_pll: 4, 0;
    /// Enhanced protocol selection (0 = tooth gap, 1 = pulse width).
    pub eps, set_eps: 5;
    /// Bit stuffing enable.
    pub bsc, set_bsc: 6;
    /// CRC generation enable.
    pub crc, set_crc: 7;
    /// Start sequence generation enable.
    pub sta, set_sta: 8;
}

bitfield::bitfield! {
    /// Image of the kernel reset registers (KRST0/KRST1).
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct KernelReset(u32);
    /// Reset request.
    pub rst, set_rst: 0;
    /// Reset status; set once the requested reset has executed (KRST0 only).
    pub rststat, _: 1;
}

bitfield::bitfield! {
    /// Interrupt flag image, shared by the INTSTAT and INTCLR registers.
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
    pub struct IntFlags(u32);
    /// Receive data interrupt.
    pub rdi, set_rdi: 0;
    /// Receive status interrupt.
    pub rsi, set_rsi: 1;
    /// Transmit prepare interrupt.
    pub tpi, set_tpi: 2;
    /// Transmit prepare overwrite interrupt.
    pub tpoi, set_tpoi: 3;
}

fn mode_bits(mode: DividerMode) -> u32 {
    match mode {
        DividerMode::Spb => 0b00,
        DividerMode::Normal => 0b01,
        DividerMode::Fractional => 0b10,
        DividerMode::Off => 0b11,
    }
}

fn mode_from_bits(bits: u32) -> DividerMode {
    match bits & 0b11 {
        0b00 => DividerMode::Spb,
        0b01 => DividerMode::Normal,
        0b10 => DividerMode::Fractional,
        _ => DividerMode::Off,
    }
}

impl FracDiv {
    /// Builds a register image from a divider mode and step value.
    pub fn pack(mode: DividerMode, step: u32) -> Self {
        let mut image = FracDiv(0);
        image.set_dm(mode_bits(mode));
        image.set_step(step);
        image
    }

    /// Decodes the divider mode field.
    pub fn divider_mode(&self) -> DividerMode {
        mode_from_bits(self.dm())
    }

    /// Raw register value.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Rebuilds the image from a raw register value.
    pub fn from_raw(raw: u32) -> Self {
        FracDiv(raw)
    }
}

impl OutputDiv {
    /// Builds a register image from a divider mode and step value.
    pub fn pack(mode: DividerMode, step: u32) -> Self {
        let mut image = OutputDiv(0);
        image.set_dm(mode_bits(mode));
        image.set_step(step);
        image
    }

    /// Decodes the divider mode field.
    pub fn divider_mode(&self) -> DividerMode {
        mode_from_bits(self.dm())
    }

    /// Raw register value.
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Rebuilds the image from a raw register value.
    pub fn from_raw(raw: u32) -> Self {
        OutputDiv(raw)
    }
}

/// The PSI5-S register file.
///
/// On hardware this struct overlays the memory-mapped register space and
/// is obtained through [`RegisterBlock::from_addr`]. [`RegisterBlock::new`]
/// creates a zeroed in-memory image, which is what the host-side tests
/// run against.
#[repr(C)]
pub struct RegisterBlock {
    pub(crate) clc: VolatileCell<u32>,
    pub(crate) con: VolatileCell<u32>,
    pub(crate) gcr: VolatileCell<u32>,
    pub(crate) fdr: VolatileCell<u32>,
    pub(crate) fdrt: VolatileCell<u32>,
    pub(crate) fdo: VolatileCell<u32>,
    pub(crate) bg: VolatileCell<u32>,
    pub(crate) fdv: VolatileCell<u32>,
    pub(crate) rdr: VolatileCell<u32>,
    pub(crate) rds: VolatileCell<u32>,
    pub(crate) tsm: VolatileCell<u32>,
    pub(crate) nfc: VolatileCell<u32>,
    pub(crate) pgc: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) ctv: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) wdtl: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) rcra: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) rcrb: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) scr: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) sdr: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) intstat: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) intclr: [VolatileCell<u32>; NUM_CHANNELS],
    pub(crate) krst0: VolatileCell<u32>,
    pub(crate) krst1: VolatileCell<u32>,
    pub(crate) krstclr: VolatileCell<u32>,
}

impl RegisterBlock {
    /// Creates a zeroed in-memory register file image.
    pub const fn new() -> Self {
        RegisterBlock {
            clc: VolatileCell::new(0),
            con: VolatileCell::new(0),
            gcr: VolatileCell::new(0),
            fdr: VolatileCell::new(0),
            fdrt: VolatileCell::new(0),
            fdo: VolatileCell::new(0),
            bg: VolatileCell::new(0),
            fdv: VolatileCell::new(0),
            rdr: VolatileCell::new(0),
            rds: VolatileCell::new(0),
            tsm: VolatileCell::new(0),
            nfc: VolatileCell::new(0),
            pgc: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            ctv: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            wdtl: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            rcra: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            rcrb: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            scr: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            sdr: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            intstat: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            intclr: [const { VolatileCell::new(0) }; NUM_CHANNELS],
            krst0: VolatileCell::new(0),
            krst1: VolatileCell::new(0),
            krstclr: VolatileCell::new(0),
        }
    }

    /// Overlays the register file onto the module's register space.
    ///
    /// # Safety
    ///
    /// `addr` must be the base address of a PSI5-S module's register space
    /// and no other overlay of the same module may be live.
    pub unsafe fn from_addr<'a>(addr: usize) -> &'a RegisterBlock {
        &*(addr as *const RegisterBlock)
    }

    /// Enables the module clock. Protected write.
    pub fn write_clc(&self, value: u32, _permit: &ConfigWrite) {
        self.clc.set(value);
    }

    /// Programs the ASC control register. Protected write.
    pub fn write_con(&self, image: Con, _permit: &ConfigWrite) {
        self.con.set(image.0);
    }

    /// Current ASC control register image.
    pub fn con(&self) -> Con {
        Con(self.con.get())
    }

    /// Programs the global control register. Protected write.
    pub fn write_gcr(&self, image: GlobalCon, _permit: &ConfigWrite) {
        self.gcr.set(image.0);
    }

    /// Current global control register image.
    pub fn gcr(&self) -> GlobalCon {
        GlobalCon(self.gcr.get())
    }

    /// Programs the kernel clock divider. Protected write.
    pub fn write_fdr(&self, image: FracDiv, _permit: &ConfigWrite) {
        self.fdr.set(image.raw());
    }

    /// Current kernel clock divider image.
    pub fn fdr(&self) -> FracDiv {
        FracDiv::from_raw(self.fdr.get())
    }

    /// Programs the timestamp clock divider. Protected write.
    pub fn write_fdrt(&self, image: FracDiv, _permit: &ConfigWrite) {
        self.fdrt.set(image.raw());
    }

    /// Current timestamp clock divider image.
    pub fn fdrt(&self) -> FracDiv {
        FracDiv::from_raw(self.fdrt.get())
    }

    /// Programs the ASC clock output divider. Protected write.
    pub fn write_fdo(&self, image: OutputDiv, _permit: &ConfigWrite) {
        self.fdo.set(image.raw());
    }

    /// Current ASC clock output divider image.
    pub fn fdo(&self) -> OutputDiv {
        OutputDiv::from_raw(self.fdo.get())
    }

    /// Programs the baud generator. Protected write.
    pub fn write_bg(&self, image: BaudGen, _permit: &ConfigWrite) {
        self.bg.set(image.0);
    }

    /// Current baud generator image.
    pub fn bg(&self) -> BaudGen {
        BaudGen(self.bg.get())
    }

    /// Programs the fractional pre-divider. Protected write.
    pub fn write_fdv(&self, image: FracDivPre, _permit: &ConfigWrite) {
        self.fdv.set(image.0);
    }

    /// Current fractional pre-divider image.
    pub fn fdv(&self) -> FracDivPre {
        FracDivPre(self.fdv.get())
    }

    /// Programs a channel's pulse generation control. Protected write.
    pub fn write_pgc(&self, channel: usize, image: PulseGen, _permit: &ConfigWrite) {
        self.pgc[channel].set(image.0);
    }

    /// Current pulse generation control image of a channel.
    pub fn pgc(&self, channel: usize) -> PulseGen {
        PulseGen(self.pgc[channel].get())
    }

    /// Programs a channel's trigger value register. Protected write.
    pub fn write_ctv(&self, channel: usize, image: ChannelTrigger, _permit: &ConfigWrite) {
        self.ctv[channel].set(image.0);
    }

    /// Current trigger value image of a channel.
    pub fn ctv(&self, channel: usize) -> ChannelTrigger {
        ChannelTrigger(self.ctv[channel].get())
    }

    /// Programs a channel's watchdog timer limit. Protected write.
    pub fn write_wdtl(&self, channel: usize, limit: u32, _permit: &ConfigWrite) {
        self.wdtl[channel].set(limit);
    }

    /// Current watchdog timer limit of a channel.
    pub fn wdtl(&self, channel: usize) -> u32 {
        self.wdtl[channel].get()
    }

    /// Programs a channel's receive control register A. Protected write.
    pub fn write_rcra(&self, channel: usize, image: RecvControlA, _permit: &ConfigWrite) {
        self.rcra[channel].set(image.0);
    }

    /// Current receive control A image of a channel.
    pub fn rcra(&self, channel: usize) -> RecvControlA {
        RecvControlA(self.rcra[channel].get())
    }

    /// Programs a channel's receive control register B. Protected write.
    pub fn write_rcrb(&self, channel: usize, image: RecvControlB, _permit: &ConfigWrite) {
        self.rcrb[channel].set(image.0);
    }

    /// Current receive control B image of a channel.
    pub fn rcrb(&self, channel: usize) -> RecvControlB {
        RecvControlB(self.rcrb[channel].get())
    }

    /// Programs a channel's 3-bit expected-frame-count slot in the NFC
    /// register, leaving the other channels' slots intact. Protected write.
    pub fn write_expected_frames(&self, channel: usize, count: u32, _permit: &ConfigWrite) {
        let shift = channel * 3;
        let mask = 0b111 << shift;
        let value = (self.nfc.get() & !mask) | ((count & 0b111) << shift);
        self.nfc.set(value);
    }

    /// Expected frame count configured for a channel.
    pub fn expected_frames(&self, channel: usize) -> u32 {
        (self.nfc.get() >> (channel * 3)) & 0b111
    }

    /// Programs a channel's send control register. Protected write.
    pub fn write_scr(&self, channel: usize, image: SendControl, _permit: &ConfigWrite) {
        self.scr[channel].set(image.0);
    }

    /// Current send control image of a channel.
    pub fn scr(&self, channel: usize) -> SendControl {
        SendControl(self.scr[channel].get())
    }

    /// Latest received frame data.
    pub fn rdr(&self) -> u32 {
        self.rdr.get()
    }

    /// Status word of the latest received frame.
    pub fn rds(&self) -> u32 {
        self.rds.get()
    }

    /// Timestamp of the latest received frame.
    pub fn tsm(&self) -> u32 {
        self.tsm.get()
    }

    /// Queues a word in a channel's send data register.
    pub fn write_sdr(&self, channel: usize, value: u32) {
        self.sdr[channel].set(value);
    }

    /// Word currently queued in a channel's send data register.
    pub fn sdr(&self, channel: usize) -> u32 {
        self.sdr[channel].get()
    }

    /// Pending interrupt flags of a channel.
    pub fn intstat(&self, channel: usize) -> IntFlags {
        IntFlags(self.intstat[channel].get())
    }

    /// Clears the given interrupt flags of a channel (write-one-to-clear).
    pub fn clear_interrupts(&self, channel: usize, flags: IntFlags) {
        self.intclr[channel].set(self.intclr[channel].get() | flags.0);
    }

    /// Flags last written to a channel's interrupt clear register.
    pub fn intclr(&self, channel: usize) -> IntFlags {
        IntFlags(self.intclr[channel].get())
    }

    /// Requests a kernel reset via KRST0. Protected write.
    pub fn write_krst0(&self, image: KernelReset, _permit: &ConfigWrite) {
        self.krst0.set(image.0);
    }

    /// Current KRST0 image.
    pub fn krst0(&self) -> KernelReset {
        KernelReset(self.krst0.get())
    }

    /// Requests a kernel reset via KRST1. Protected write.
    pub fn write_krst1(&self, image: KernelReset, _permit: &ConfigWrite) {
        self.krst1.set(image.0);
    }

    /// Current KRST1 image.
    pub fn krst1(&self) -> KernelReset {
        KernelReset(self.krst1.get())
    }

    /// Clears the kernel reset status bit. Protected write.
    pub fn write_krstclr(&self, value: u32, _permit: &ConfigWrite) {
        self.krstclr.set(value);
    }
}

impl Default for RegisterBlock {
    fn default() -> Self {
        RegisterBlock::new()
    }
}
