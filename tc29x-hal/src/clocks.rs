//! Clock-tree collaborators for the PSI5-S module
//!
//! The module sits behind two bus clocks it does not own: the system
//! peripheral bus clock feeding the kernel clock dividers, and the baud-2
//! clock feeding the ASC baud generator. Both are queried through the
//! [`ClockSource`] trait; a source may legitimately report 0 Hz when the
//! upstream clock is disabled, and every consumer in this crate treats
//! that as a hard configuration failure.

use crate::fracdiv::{DividerMode, STEP_RANGE};
use crate::psi5s::regs::FracDiv;
use crate::typelevel::Sealed;
use fugit::HertzU32;

/// Trait for things that can be used as clock source
pub trait ClockSource: Sealed {
    /// Get the operating frequency for this source
    ///
    /// Used to determine the divisor. 0 Hz means the upstream clock is
    /// disabled.
    fn get_freq(&self) -> HertzU32;
}

/// The system peripheral bus clock (f_SPB).
pub struct SpbClock {
    freq: HertzU32,
}

impl SpbClock {
    /// Creates a handle reporting the given bus frequency.
    pub fn new(freq: HertzU32) -> Self {
        SpbClock { freq }
    }
}

impl Sealed for SpbClock {}
impl ClockSource for SpbClock {
    fn get_freq(&self) -> HertzU32 {
        self.freq
    }
}

/// The baud-2 interface clock feeding the ASC baud generator.
pub struct Baud2Clock {
    freq: HertzU32,
}

impl Baud2Clock {
    /// Creates a handle reporting the given interface clock frequency.
    pub fn new(freq: HertzU32) -> Self {
        Baud2Clock { freq }
    }
}

impl Sealed for Baud2Clock {}
impl ClockSource for Baud2Clock {
    fn get_freq(&self) -> HertzU32 {
        self.freq
    }
}

/// The PSI5-S module's own fractional divider output.
///
/// Feeds the timestamp clock divider. The frequency is decoded back out
/// of a programmed kernel divider image, so it reflects whatever was
/// actually written to the hardware, not what was requested.
pub struct FracDivClock {
    spb: HertzU32,
    fdr: FracDiv,
}

impl FracDivClock {
    /// Creates the source from the bus frequency and the current kernel
    /// divider image.
    pub fn new(spb: HertzU32, fdr: FracDiv) -> Self {
        FracDivClock { spb, fdr }
    }
}

impl Sealed for FracDivClock {}
impl ClockSource for FracDivClock {
    fn get_freq(&self) -> HertzU32 {
        let spb = self.spb.to_Hz();
        let step = self.fdr.step();
        let hz = match self.fdr.divider_mode() {
            DividerMode::Spb => spb,
            // step is confined to [0, STEP_RANGE - 1] by the register
            // field, so the divisor never reaches zero.
            DividerMode::Normal => spb / (STEP_RANGE - step.min(STEP_RANGE - 1)),
            DividerMode::Fractional => {
                ((u64::from(spb) * u64::from(step)) / u64::from(STEP_RANGE)) as u32
            }
            DividerMode::Off => 0,
        };
        HertzU32::from_raw(hz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fugit::RateExtU32;

    #[test]
    fn frac_div_clock_decodes_normal_mode() {
        let fdr = FracDiv::pack(DividerMode::Normal, STEP_RANGE - 64);
        let source = FracDivClock::new(100_000_000.Hz(), fdr);
        assert_eq!(source.get_freq().to_Hz(), 1_562_500);
    }

    #[test]
    fn frac_div_clock_decodes_fractional_mode() {
        let fdr = FracDiv::pack(DividerMode::Fractional, 102);
        let source = FracDivClock::new(1_000_000.Hz(), fdr);
        assert_eq!(source.get_freq().to_Hz(), 99_706);
    }

    #[test]
    fn frac_div_clock_reports_zero_when_off() {
        let fdr = FracDiv::pack(DividerMode::Off, 0);
        let source = FracDivClock::new(100_000_000.Hz(), fdr);
        assert_eq!(source.get_freq().to_Hz(), 0);
    }

    #[test]
    fn spb_mode_passes_bus_clock_through() {
        let fdr = FracDiv::pack(DividerMode::Spb, 0);
        let source = FracDivClock::new(100_000_000.Hz(), fdr);
        assert_eq!(source.get_freq().to_Hz(), 100_000_000);
    }
}
