//! PSI5-S (Peripheral Sensor Interface, serial) module driver
//!
//! Brings the module up from a [`Psi5sConfig`]: the kernel, timestamp and
//! ASC output clocks are derived through the fractional divider
//! calculator in [`crate::fracdiv`], the serial bit rate through
//! [`baudrate`], and the resulting register images are programmed inside
//! an endinit write window. If any divider cannot derive a clock the
//! sequence aborts before the peripheral is left running on an undefined
//! clock. Individual sensor channels are configured afterwards through
//! [`Psi5s::configure_channel`].
//!
//! ## Usage
//!
//! ```no_run
//! use tc29x_hal::clocks::{Baud2Clock, SpbClock};
//! use tc29x_hal::endinit::SafetyWatchdog;
//! use tc29x_hal::fugit::RateExtU32;
//! use tc29x_hal::psi5s::regs::RegisterBlock;
//! use tc29x_hal::psi5s::{ChannelConfig, ChannelId, Psi5s, Psi5sConfig};
//!
//! // On hardware the block overlays the module's register space instead.
//! let regs = RegisterBlock::new();
//! let spb = SpbClock::new(100_000_000.Hz());
//! let baud2 = Baud2Clock::new(100_000_000.Hz());
//! let mut watchdog = SafetyWatchdog::new();
//!
//! let config = Psi5sConfig::new(100_000_000.Hz());
//! let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();
//! psi5s.configure_channel(ChannelId::Channel0, &ChannelConfig::default(), &mut watchdog);
//! ```

pub mod baudrate;
pub mod regs;

use crate::clocks::{ClockSource, FracDivClock};
use crate::endinit::SafetyWatchdog;
use crate::fracdiv::{compute_divider, DividerConfig, DividerMode, DividerResult, STEP_RANGE};
use self::baudrate::{compute_baudrate_divider, BaudConfig, BaudMode, BaudResult, Prescaler};
use self::regs::{
    BaudGen, Con, FracDiv, FracDivPre, GlobalCon, IntFlags, KernelReset, OutputDiv,
    RegisterBlock, NUM_FRAME_SLOTS,
};
use fugit::HertzU32;

/// Errors raised while deriving the module clocks.
#[non_exhaustive]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockError {
    /// A dividing mode was asked to produce 0 Hz.
    InvalidArgument,
    /// No clock could be derived; the upstream clock reports 0 Hz or the
    /// divider is switched off.
    UnavailableInput,
}

/// The word queued for transmission had not been fetched by the interface
/// yet and was overwritten.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TxOverrun;

/// PSI5-S channel index.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[allow(missing_docs)]
pub enum ChannelId {
    Channel0,
    Channel1,
    Channel2,
    Channel3,
    Channel4,
    Channel5,
    Channel6,
    Channel7,
}

impl ChannelId {
    fn index(self) -> usize {
        self as usize
    }
}

/// Snapshot of one received PSI5 frame.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    /// Raw receive data register contents.
    pub data: u32,
    /// Raw receive status register contents.
    pub status: u32,
    /// Raw timestamp register contents.
    pub timestamp: u32,
}

/// One kernel clock request: divider mode plus target frequency.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KernelClockConfig {
    /// Divider operating mode.
    pub mode: DividerMode,
    /// Requested output frequency.
    pub freq: HertzU32,
}

/// Stop bit selection of the serial interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// One stop bit.
    One,
    /// Two stop bits.
    Two,
}

/// Serial interface configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AscConfig {
    /// Requested baudrate.
    pub baudrate: HertzU32,
    /// Clocking scheme of the interface.
    pub mode: BaudMode,
    /// Prescaler ahead of the bit generator.
    pub prescaler: Prescaler,
    /// Stop bits per UART frame.
    pub stop_bits: StopBits,
    /// Receive parity check enable.
    pub parity_check: bool,
    /// Receive framing check enable.
    pub framing_check: bool,
    /// Receive overrun check enable.
    pub overrun_check: bool,
    /// Odd instead of even parity on receive.
    pub receiver_odd_parity: bool,
    /// Odd instead of even parity on transmit.
    pub transmitter_odd_parity: bool,
    /// Internal loopback from transmit to receive.
    pub loopback: bool,
    /// Clock driven out on the ASC clock pin.
    pub clock_output: KernelClockConfig,
}

/// Which error classes raise the receive status interrupt, plus global
/// protocol settings (GCR).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlobalControl {
    /// CRC errors raise RSI.
    pub crc_errors: bool,
    /// Extended CRC errors raise RSI.
    pub xcrc_errors: bool,
    /// Transmit errors raise RSI.
    pub transmit_errors: bool,
    /// Parity errors raise RSI.
    pub parity_errors: bool,
    /// Framing errors raise RSI.
    pub framing_errors: bool,
    /// Overrun errors raise RSI.
    pub overrun_errors: bool,
    /// Receive buffer errors raise RSI.
    pub receive_buffer_errors: bool,
    /// Frame header errors raise RSI.
    pub header_errors: bool,
    /// Idle time between UART frames, in bit times.
    pub idle_time: u8,
    /// Run as a plain ASC interface, bypassing the PSI5 protocol layer.
    pub asc_only: bool,
}

impl Default for GlobalControl {
    fn default() -> Self {
        GlobalControl {
            crc_errors: true,
            xcrc_errors: true,
            transmit_errors: true,
            parity_errors: true,
            framing_errors: true,
            overrun_errors: false,
            receive_buffer_errors: false,
            header_errors: false,
            idle_time: 1,
            asc_only: false,
        }
    }
}

/// Complete module configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Psi5sConfig {
    /// Kernel (fracDiv) clock, derived from the bus clock.
    pub frac_div: KernelClockConfig,
    /// Timestamp counter clock, derived from the kernel clock.
    pub timestamp: KernelClockConfig,
    /// Serial interface settings.
    pub asc: AscConfig,
    /// Global control settings.
    pub global: GlobalControl,
}

impl Psi5sConfig {
    /// Default configuration for the given bus frequency: divide-down
    /// kernel and timestamp clocks running at the bus frequency, and the
    /// serial interface at 1.5625 MBd on the integer bit generator.
    pub fn new(spb_freq: HertzU32) -> Self {
        Psi5sConfig {
            frac_div: KernelClockConfig {
                mode: DividerMode::Normal,
                freq: spb_freq,
            },
            timestamp: KernelClockConfig {
                mode: DividerMode::Normal,
                freq: spb_freq,
            },
            asc: AscConfig {
                baudrate: HertzU32::from_raw(1_562_500),
                mode: BaudMode::Asynchronous,
                prescaler: Prescaler::Div2,
                stop_bits: StopBits::One,
                parity_check: false,
                framing_check: false,
                overrun_check: false,
                receiver_odd_parity: false,
                transmitter_odd_parity: false,
                loopback: false,
                clock_output: KernelClockConfig {
                    mode: DividerMode::Normal,
                    freq: spb_freq,
                },
            },
            global: GlobalControl::default(),
        }
    }
}

/// Sync pulse generation settings of one channel (PGC).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PulseGeneration {
    /// Sync pulse command code for a zero bit.
    pub code_for_zero: u8,
    /// Sync pulse command code for a one bit.
    pub code_for_one: u8,
    /// Run the pulse generator from an external time base.
    pub external_time_base: bool,
    /// External time base input selection.
    pub time_base_input: u8,
    /// Trigger pulses from an external input instead of periodically.
    pub external_trigger: bool,
    /// External trigger input selection.
    pub trigger_input: u8,
}

/// Channel trigger compare settings (CTV).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerCompare {
    /// Trigger compare value.
    pub value: u16,
    /// Trigger counter start value.
    pub counter: u16,
}

/// Per-slot integrity check selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlotCheck {
    /// Parity bit per UART frame.
    Parity,
    /// CRC over the slot payload.
    Crc,
}

/// Receive path settings of one channel (RCRA, RCRB, NFC).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReceiveControl {
    /// Integrity check per UART frame slot.
    pub slot_check: [SlotCheck; NUM_FRAME_SLOTS],
    /// Capture a timestamp per received frame.
    pub timestamp_enabled: bool,
    /// Capture into timestamp register B instead of A.
    pub timestamp_register_b: bool,
    /// Trigger the timestamp on frame reception instead of the sync pulse.
    pub timestamp_on_frame: bool,
    /// Take the frame ID from the channel number instead of the header.
    pub frame_id_from_channel: bool,
    /// Run the channel watchdog per sync pulse instead of per frame.
    pub watchdog_per_sync_pulse: bool,
    /// Expected UART frame count per slot.
    pub uart_frame_count: [u8; NUM_FRAME_SLOTS],
    /// Payload length in bits per slot.
    pub payload_length: [u8; NUM_FRAME_SLOTS],
    /// Number of frames expected per sync period.
    pub expected_frames: u8,
}

/// Transmit path settings of one channel (SCR).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SendControlConfig {
    /// Transmit payload length in nibbles.
    pub payload_length: u8,
    /// Pulse width coding instead of the tooth gap method.
    pub pulse_width_coding: bool,
    /// Bit stuffing enable.
    pub bit_stuffing: bool,
    /// CRC generation enable.
    pub crc_generation: bool,
    /// Start sequence generation enable.
    pub start_sequence: bool,
}

/// Complete configuration of one sensor channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelConfig {
    /// Sync pulse generation.
    pub pulse_generation: PulseGeneration,
    /// Channel trigger compare.
    pub trigger: TriggerCompare,
    /// Channel watchdog timer limit; 0 disables the watchdog.
    pub watchdog_limit: u32,
    /// Receive path settings.
    pub receive: ReceiveControl,
    /// Transmit path settings.
    pub send: SendControlConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            pulse_generation: PulseGeneration {
                code_for_zero: 0,
                code_for_one: 1,
                external_time_base: false,
                time_base_input: 0,
                external_trigger: false,
                trigger_input: 0,
            },
            trigger: TriggerCompare {
                value: 0x20,
                counter: 0,
            },
            watchdog_limit: 0,
            receive: ReceiveControl {
                slot_check: [SlotCheck::Parity; NUM_FRAME_SLOTS],
                timestamp_enabled: false,
                timestamp_register_b: false,
                timestamp_on_frame: false,
                frame_id_from_channel: false,
                watchdog_per_sync_pulse: false,
                uart_frame_count: [3; NUM_FRAME_SLOTS],
                payload_length: [0; NUM_FRAME_SLOTS],
                expected_frames: 1,
            },
            send: SendControlConfig {
                payload_length: 6,
                pulse_width_coding: false,
                bit_stuffing: false,
                crc_generation: false,
                start_sequence: false,
            },
        }
    }
}

/// An enabled PSI5-S module.
pub struct Psi5s<'a> {
    regs: &'a RegisterBlock,
    frac_div_freq: HertzU32,
    timestamp_freq: HertzU32,
    clock_output_freq: HertzU32,
    baudrate: HertzU32,
}

impl<'a> Psi5s<'a> {
    /// Enables the module and programs all clock dividers, the baud
    /// generator and the interface control registers.
    ///
    /// Fails fast: if any divider cannot derive a clock (upstream clock
    /// dead, divider off, or a 0 Hz request in a dividing mode) the
    /// remaining registers are left untouched and the error is returned.
    /// Clamped dividers are not errors; compare the achieved frequencies
    /// reported by [`Psi5s::frac_div_freq`] and friends against the
    /// request to detect them.
    pub fn enable(
        regs: &'a RegisterBlock,
        config: &Psi5sConfig,
        spb: &impl ClockSource,
        baud2: &impl ClockSource,
        watchdog: &mut SafetyWatchdog,
    ) -> Result<Self, ClockError> {
        // Ungate the module clock before touching anything else.
        watchdog.with_config_write(|permit| regs.write_clc(0, permit));

        // Kernel clock from the bus clock.
        let frac_div = kernel_clock(spb.get_freq(), config.frac_div, STEP_RANGE)?;
        let fdr = FracDiv::pack(config.frac_div.mode, frac_div.step);
        watchdog.with_config_write(|permit| regs.write_fdr(fdr, permit));

        // Timestamp clock runs from the kernel clock just programmed.
        let kernel = FracDivClock::new(spb.get_freq(), regs.fdr());
        let timestamp = kernel_clock(kernel.get_freq(), config.timestamp, STEP_RANGE)?;
        let fdrt = FracDiv::pack(config.timestamp.mode, timestamp.step);
        watchdog.with_config_write(|permit| regs.write_fdrt(fdrt, permit));

        // ASC clock output runs on the doubled step domain.
        let clock_output = kernel_clock(spb.get_freq(), config.asc.clock_output, 2 * STEP_RANGE)?;
        let fdo = OutputDiv::pack(config.asc.clock_output.mode, clock_output.step);
        watchdog.with_config_write(|permit| regs.write_fdo(fdo, permit));

        // Baud generator from the interface clock.
        let baud = asc_baud(baud2.get_freq(), &config.asc)?;
        let mut bg = BaudGen::default();
        bg.set_value(baud.dividers.bg);
        let mut fdv = FracDivPre::default();
        fdv.set_value(baud.dividers.fdv);
        let con = encode_con(&config.asc);
        let gcr = encode_gcr(&config.global);
        watchdog.with_config_write(|permit| {
            regs.write_bg(bg, permit);
            regs.write_fdv(fdv, permit);
            regs.write_con(con, permit);
            regs.write_gcr(gcr, permit);
        });

        Ok(Psi5s {
            regs,
            frac_div_freq: frac_div.freq,
            timestamp_freq: timestamp.freq,
            clock_output_freq: clock_output.freq,
            baudrate: baud.freq,
        })
    }

    /// Achieved kernel clock frequency.
    pub fn frac_div_freq(&self) -> HertzU32 {
        self.frac_div_freq
    }

    /// Achieved timestamp clock frequency.
    pub fn timestamp_freq(&self) -> HertzU32 {
        self.timestamp_freq
    }

    /// Achieved ASC clock output frequency.
    pub fn clock_output_freq(&self) -> HertzU32 {
        self.clock_output_freq
    }

    /// Achieved baudrate.
    pub fn baudrate(&self) -> HertzU32 {
        self.baudrate
    }

    /// Programs one channel's pulse generation, trigger, watchdog, receive
    /// and transmit control registers.
    ///
    /// Register fields not covered by [`ChannelConfig`] keep their current
    /// hardware values. The channel's 3-bit slot in the shared expected
    /// frame count register is updated without disturbing the other
    /// channels.
    pub fn configure_channel(
        &mut self,
        channel: ChannelId,
        config: &ChannelConfig,
        watchdog: &mut SafetyWatchdog,
    ) {
        let idx = channel.index();

        let mut pgc = self.regs.pgc(idx);
        pgc.set_txcmd(u32::from(config.pulse_generation.code_for_zero));
        pgc.set_atxcmd(u32::from(config.pulse_generation.code_for_one));
        pgc.set_tbs(config.pulse_generation.external_time_base);
        pgc.set_etb(u32::from(config.pulse_generation.time_base_input));
        pgc.set_ets(u32::from(config.pulse_generation.trigger_input));
        pgc.set_pte(!config.pulse_generation.external_trigger);
        pgc.set_ete(config.pulse_generation.external_trigger);

        let mut ctv = self.regs.ctv(idx);
        ctv.set_ctv(u32::from(config.trigger.value));
        ctv.set_ctc(u32::from(config.trigger.counter));

        let mut rcra = self.regs.rcra(idx);
        let mut rcrb = self.regs.rcrb(idx);
        for slot in 0..NUM_FRAME_SLOTS {
            let crc = matches!(config.receive.slot_check[slot], SlotCheck::Crc);
            rcra.set_crc(slot, crc as u32);
            rcra.set_ufc(slot, u32::from(config.receive.uart_frame_count[slot]));
            rcrb.set_pdl(slot, u32::from(config.receive.payload_length[slot]));
        }
        rcra.set_tsen(config.receive.timestamp_enabled);
        rcra.set_tsp(config.receive.timestamp_register_b);
        rcra.set_tsts(config.receive.timestamp_on_frame);
        rcra.set_fids(config.receive.frame_id_from_channel);
        rcra.set_wdms(config.receive.watchdog_per_sync_pulse);

        let mut scr = self.regs.scr(idx);
        scr.set_pll(u32::from(config.send.payload_length));
        scr.set_eps(config.send.pulse_width_coding);
        scr.set_bsc(config.send.bit_stuffing);
        scr.set_crc(config.send.crc_generation);
        scr.set_sta(config.send.start_sequence);

        let regs = self.regs;
        watchdog.with_config_write(|permit| {
            regs.write_pgc(idx, pgc, permit);
            regs.write_ctv(idx, ctv, permit);
            regs.write_wdtl(idx, config.watchdog_limit, permit);
            regs.write_rcra(idx, rcra, permit);
            regs.write_rcrb(idx, rcrb, permit);
            regs.write_expected_frames(idx, u32::from(config.receive.expected_frames), permit);
            regs.write_scr(idx, scr, permit);
        });
    }

    /// Reads the most recent frame of a channel together with its status
    /// and timestamp, clearing the channel's receive interrupt flags.
    pub fn read_frame(&mut self, channel: ChannelId) -> Frame {
        let frame = Frame {
            data: self.regs.rdr(),
            status: self.regs.rds(),
            timestamp: self.regs.tsm(),
        };

        let mut flags = IntFlags::default();
        flags.set_rdi(true);
        flags.set_rsi(true);
        self.regs.clear_interrupts(channel.index(), flags);

        frame
    }

    /// Queues a 24-bit word for transmission on a channel.
    ///
    /// Returns [`TxOverrun`] if the previously queued word had not been
    /// fetched by the interface yet.
    pub fn send_data(&mut self, channel: ChannelId, data: u32) -> Result<(), TxOverrun> {
        self.regs.write_sdr(channel.index(), data & 0x00FF_FFFF);

        if self.regs.intstat(channel.index()).tpoi() {
            Err(TxOverrun)
        } else {
            Ok(())
        }
    }

    /// Requests a kernel reset. A reset is only executed once both kernel
    /// reset bits are set.
    pub fn start_reset(&mut self, watchdog: &mut SafetyWatchdog) {
        let mut request = KernelReset::default();
        request.set_rst(true);
        let regs = self.regs;
        watchdog.with_config_write(|permit| {
            regs.write_krst1(request, permit);
            regs.write_krst0(request, permit);
        });
    }

    /// Completes a kernel reset started with [`Psi5s::start_reset`].
    ///
    /// Returns [`nb::Error::WouldBlock`] until the hardware reports the
    /// reset as executed, then clears the reset status bit.
    pub fn await_reset(
        &mut self,
        watchdog: &mut SafetyWatchdog,
    ) -> nb::Result<(), core::convert::Infallible> {
        if !self.regs.krst0().rststat() {
            return Err(nb::Error::WouldBlock);
        }

        let regs = self.regs;
        watchdog.with_config_write(|permit| regs.write_krstclr(1, permit));
        Ok(())
    }

    /// Releases the underlying register block.
    pub fn free(self) -> &'a RegisterBlock {
        self.regs
    }
}

/// Derives one kernel clock, mapping the calculator's 0 Hz sentinel onto
/// the error taxonomy: a 0 Hz request in a dividing mode is the caller's
/// mistake, everything else that yields no clock aborts the sequence as
/// an unavailable input.
fn kernel_clock(
    input: HertzU32,
    config: KernelClockConfig,
    step_range: u32,
) -> Result<DividerResult, ClockError> {
    let dividing = matches!(config.mode, DividerMode::Normal | DividerMode::Fractional);
    if dividing && config.freq.to_Hz() == 0 {
        return Err(ClockError::InvalidArgument);
    }

    let result = compute_divider(&DividerConfig {
        input,
        requested: config.freq,
        mode: config.mode,
        step_range,
    });
    if result.freq.to_Hz() == 0 {
        return Err(ClockError::UnavailableInput);
    }
    Ok(result)
}

/// Derives the serial bit rate, with the same error mapping as
/// [`kernel_clock`]: a 0 Hz baud request is the caller's mistake, a dead
/// interface clock an unavailable input.
fn asc_baud(input: HertzU32, asc: &AscConfig) -> Result<BaudResult, ClockError> {
    if asc.baudrate.to_Hz() == 0 {
        return Err(ClockError::InvalidArgument);
    }

    let result = compute_baudrate_divider(&BaudConfig {
        input,
        requested: asc.baudrate,
        prescaler: asc.prescaler,
        mode: asc.mode,
    });
    if result.freq.to_Hz() == 0 {
        return Err(ClockError::UnavailableInput);
    }
    Ok(result)
}

fn encode_con(asc: &AscConfig) -> Con {
    // 0 = synchronous, 1 = asynchronous; receive and transmit run on the
    // same scheme.
    let mode = match asc.mode {
        BaudMode::Synchronous => 0,
        BaudMode::Asynchronous | BaudMode::AsynchronousFractional => 1,
    };

    let mut con = Con::default();
    con.set_m(mode);
    con.set_mtx(mode);
    con.set_stp(asc.stop_bits == StopBits::Two);
    con.set_pen(asc.parity_check);
    con.set_fen(asc.framing_check);
    con.set_oen(asc.overrun_check);
    con.set_odd(asc.receiver_odd_parity);
    con.set_oddtx(asc.transmitter_odd_parity);
    con.set_lb(asc.loopback);
    con.set_fde(asc.mode == BaudMode::AsynchronousFractional);
    con.set_brs(asc.prescaler == Prescaler::Div3);
    con
}

fn encode_gcr(global: &GlobalControl) -> GlobalCon {
    let mut gcr = GlobalCon::default();
    gcr.set_crci(global.crc_errors);
    gcr.set_xcrci(global.xcrc_errors);
    gcr.set_tei(global.transmit_errors);
    gcr.set_pe(global.parity_errors);
    gcr.set_fe(global.framing_errors);
    gcr.set_oe(global.overrun_errors);
    gcr.set_rbi(global.receive_buffer_errors);
    gcr.set_hdi(global.header_errors);
    gcr.set_idt(u32::from(global.idle_time));
    gcr.set_asc(global.asc_only);
    gcr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clocks::{Baud2Clock, SpbClock};
    use fugit::RateExtU32;

    fn fixture() -> (RegisterBlock, SpbClock, Baud2Clock, SafetyWatchdog) {
        (
            RegisterBlock::new(),
            SpbClock::new(100_000_000.Hz()),
            Baud2Clock::new(100_000_000.Hz()),
            SafetyWatchdog::new(),
        )
    }

    #[test]
    fn enable_programs_all_dividers() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());

        let psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        assert_eq!(regs.fdr(), FracDiv::pack(DividerMode::Normal, STEP_RANGE - 1));
        assert_eq!(regs.fdrt(), FracDiv::pack(DividerMode::Normal, STEP_RANGE - 1));
        assert_eq!(
            regs.fdo(),
            OutputDiv::pack(DividerMode::Normal, 2 * STEP_RANGE - 1)
        );
        assert_eq!(regs.bg().value(), 1);
        assert_eq!(regs.fdv().value(), 0);
        assert!(!regs.con().fde());
        assert!(!regs.con().brs());

        assert_eq!(psi5s.frac_div_freq().to_Hz(), 100_000_000);
        assert_eq!(psi5s.timestamp_freq().to_Hz(), 100_000_000);
        assert_eq!(psi5s.clock_output_freq().to_Hz(), 100_000_000);
        assert_eq!(psi5s.baudrate().to_Hz(), 1_562_500);
    }

    #[test]
    fn enable_programs_asc_and_global_control() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let mut config = Psi5sConfig::new(100_000_000.Hz());
        config.asc.stop_bits = StopBits::Two;
        config.asc.parity_check = true;
        config.asc.loopback = true;

        Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        let con = regs.con();
        assert_eq!(con.m(), 1);
        assert_eq!(con.mtx(), 1);
        assert!(con.stp());
        assert!(con.pen());
        assert!(con.lb());
        assert!(!con.fen());

        let gcr = regs.gcr();
        assert!(gcr.crci());
        assert!(gcr.xcrci());
        assert!(gcr.tei());
        assert!(gcr.pe());
        assert!(gcr.fe());
        assert!(!gcr.oe());
        assert!(!gcr.rbi());
        assert!(!gcr.hdi());
        assert_eq!(gcr.idt(), 1);
        assert!(!gcr.asc());
    }

    #[test]
    fn enable_reports_clamped_clocks_for_extreme_requests() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let mut config = Psi5sConfig::new(100_000_000.Hz());
        config.frac_div.freq = 1.Hz();

        let psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        // The ideal divisor does not fit the register; the divider is
        // left at divide-by-one and the caller sees the deviation.
        assert_eq!(regs.fdr().step(), STEP_RANGE - 1);
        assert_eq!(psi5s.frac_div_freq().to_Hz(), 100_000_000);
    }

    #[test]
    fn timestamp_clock_chains_off_the_kernel_clock() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let mut config = Psi5sConfig::new(100_000_000.Hz());
        config.frac_div.freq = 1_562_500.Hz();
        config.timestamp.freq = 781_250.Hz();

        let psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        assert_eq!(psi5s.frac_div_freq().to_Hz(), 1_562_500);
        // 1_562_500 / 2, derived from the programmed kernel clock.
        assert_eq!(regs.fdrt(), FracDiv::pack(DividerMode::Normal, STEP_RANGE - 2));
        assert_eq!(psi5s.timestamp_freq().to_Hz(), 781_250);
    }

    #[test]
    fn enable_fails_fast_on_dead_bus_clock() {
        let (regs, _, baud2, mut watchdog) = fixture();
        let spb = SpbClock::new(0.Hz());
        let config = Psi5sConfig::new(100_000_000.Hz());

        let result = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog);

        assert_eq!(result.err(), Some(ClockError::UnavailableInput));
        // The divider registers were never touched.
        assert_eq!(regs.fdr().raw(), 0);
        assert_eq!(regs.fdrt().raw(), 0);
        assert_eq!(regs.fdo().raw(), 0);
    }

    #[test]
    fn enable_rejects_zero_frequency_request() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let mut config = Psi5sConfig::new(100_000_000.Hz());
        config.frac_div.freq = 0.Hz();

        let result = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog);

        assert_eq!(result.err(), Some(ClockError::InvalidArgument));
        assert_eq!(regs.fdr().raw(), 0);
    }

    #[test]
    fn enable_rejects_zero_baudrate() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let mut config = Psi5sConfig::new(100_000_000.Hz());
        config.asc.baudrate = 0.Hz();

        let result = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog);

        assert_eq!(result.err(), Some(ClockError::InvalidArgument));
        assert_eq!(regs.bg().value(), 0);
        assert_eq!(regs.con().0, 0);
    }

    #[test]
    fn enable_rejects_switched_off_kernel_clock() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let mut config = Psi5sConfig::new(100_000_000.Hz());
        config.frac_div.mode = DividerMode::Off;

        let result = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog);

        assert_eq!(result.err(), Some(ClockError::UnavailableInput));
    }

    #[test]
    fn enable_leaves_the_endinit_window_closed() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());

        Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();
        assert!(watchdog.is_protected());

        let spb_dead = SpbClock::new(0.Hz());
        let _ = Psi5s::enable(&regs, &config, &spb_dead, &baud2, &mut watchdog);
        assert!(watchdog.is_protected());
    }

    #[test]
    fn fractional_scheme_sets_the_control_bits() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let mut config = Psi5sConfig::new(100_000_000.Hz());
        config.asc.baudrate = 115_200.Hz();
        config.asc.mode = BaudMode::AsynchronousFractional;
        config.asc.prescaler = Prescaler::Div3;

        Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        assert!(regs.con().fde());
        assert!(regs.con().brs());
        assert_eq!(regs.fdv().value(), 18);
    }

    #[test]
    fn configure_channel_programs_the_channel_registers() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());
        let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        let mut channel = ChannelConfig::default();
        channel.watchdog_limit = 0x4000;
        channel.receive.slot_check[1] = SlotCheck::Crc;
        channel.receive.payload_length[0] = 12;
        channel.receive.expected_frames = 2;
        channel.send.crc_generation = true;

        psi5s.configure_channel(ChannelId::Channel3, &channel, &mut watchdog);

        let pgc = regs.pgc(3);
        assert_eq!(pgc.txcmd(), 0);
        assert_eq!(pgc.atxcmd(), 1);
        assert!(pgc.pte());
        assert!(!pgc.ete());

        assert_eq!(regs.ctv(3).ctv(), 0x20);
        assert_eq!(regs.wdtl(3), 0x4000);

        let rcra = regs.rcra(3);
        assert_eq!(rcra.crc(1), 1);
        assert_eq!(rcra.crc(0), 0);
        assert_eq!(rcra.ufc(0), 3);
        assert_eq!(regs.rcrb(3).pdl(0), 12);
        assert_eq!(regs.expected_frames(3), 2);

        let scr = regs.scr(3);
        assert_eq!(scr.pll(), 6);
        assert!(scr.crc());
        assert!(!scr.eps());

        assert!(watchdog.is_protected());
    }

    #[test]
    fn configure_channel_keeps_other_channels_frame_counts() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());
        let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        let mut first = ChannelConfig::default();
        first.receive.expected_frames = 5;
        psi5s.configure_channel(ChannelId::Channel0, &first, &mut watchdog);

        let mut second = ChannelConfig::default();
        second.receive.expected_frames = 2;
        psi5s.configure_channel(ChannelId::Channel4, &second, &mut watchdog);

        assert_eq!(regs.expected_frames(0), 5);
        assert_eq!(regs.expected_frames(4), 2);
    }

    #[test]
    fn external_trigger_flips_the_trigger_enables() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());
        let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        let mut channel = ChannelConfig::default();
        channel.pulse_generation.external_trigger = true;
        channel.pulse_generation.trigger_input = 2;
        psi5s.configure_channel(ChannelId::Channel1, &channel, &mut watchdog);

        let pgc = regs.pgc(1);
        assert!(!pgc.pte());
        assert!(pgc.ete());
        assert_eq!(pgc.ets(), 2);
    }

    #[test]
    fn send_data_masks_to_24_bits() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());
        let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        psi5s.send_data(ChannelId::Channel2, 0xABCD_EF42).unwrap();
        assert_eq!(regs.sdr(2), 0x00CD_EF42);
    }

    #[test]
    fn send_data_reports_overwritten_word() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());
        let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        let mut pending = IntFlags::default();
        pending.set_tpoi(true);
        regs.intstat[5].set(pending.0);

        assert_eq!(
            psi5s.send_data(ChannelId::Channel5, 0x1234),
            Err(TxOverrun)
        );
    }

    #[test]
    fn read_frame_snapshots_and_clears_receive_flags() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());
        let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        regs.rdr.set(0x0012_3456);
        regs.rds.set(0x0000_0007);
        regs.tsm.set(0x00AB_CDEF);

        let frame = psi5s.read_frame(ChannelId::Channel1);
        assert_eq!(
            frame,
            Frame {
                data: 0x0012_3456,
                status: 0x0000_0007,
                timestamp: 0x00AB_CDEF,
            }
        );

        let cleared = regs.intclr(1);
        assert!(cleared.rdi());
        assert!(cleared.rsi());
        assert!(!cleared.tpoi());
    }

    #[test]
    fn kernel_reset_completes_once_hardware_reports_it() {
        let (regs, spb, baud2, mut watchdog) = fixture();
        let config = Psi5sConfig::new(100_000_000.Hz());
        let mut psi5s = Psi5s::enable(&regs, &config, &spb, &baud2, &mut watchdog).unwrap();

        psi5s.start_reset(&mut watchdog);
        assert!(regs.krst0().rst());
        assert!(regs.krst1().rst());
        assert_eq!(psi5s.await_reset(&mut watchdog), Err(nb::Error::WouldBlock));

        // Hardware flags the executed reset.
        regs.krst0.set(regs.krst0.get() | 0b10);

        assert_eq!(psi5s.await_reset(&mut watchdog), Ok(()));
        assert!(watchdog.is_protected());
    }
}
