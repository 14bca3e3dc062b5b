//! ASC baud generator calculator
//!
//! The serial side of the module derives its bit rate from the baud-2
//! interface clock through a prescaler, the 13-bit bit generator (BG) and,
//! in asynchronous operation, an optional 10-bit fractional pre-divider
//! (FDV). From the wanted baudrate, we calculate the divisor values to
//! program; the clamp and floor contract is the same as for the kernel
//! clock dividers: no divisor ever exceeds its register range, and a
//! clamped result reports the best achievable baudrate, not the request.

use super::regs::{BG_RANGE, FDV_RANGE};
use fugit::HertzU32;

/// Prescaler ahead of the bit generator (CON.BRS).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Prescaler {
    /// Divide the interface clock by 2.
    Div2,
    /// Divide the interface clock by 3.
    Div3,
}

impl Prescaler {
    fn factor(self) -> u32 {
        match self {
            Prescaler::Div2 => 2,
            Prescaler::Div3 => 3,
        }
    }
}

/// Clocking scheme of the serial interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudMode {
    /// Receive and transmit run synchronously to the interface clock;
    /// the bit generator oversamples by 4.
    Synchronous,
    /// Asynchronous operation on the integer bit generator alone;
    /// oversampling by 16.
    Asynchronous,
    /// Asynchronous operation with the fractional pre-divider enabled
    /// ahead of the fixed divide-by-16 stage.
    AsynchronousFractional,
}

/// Requested baud generator configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudConfig {
    /// Frequency of the baud-2 interface clock.
    pub input: HertzU32,
    /// Desired baudrate.
    pub requested: HertzU32,
    /// Prescaler selection.
    pub prescaler: Prescaler,
    /// Clocking scheme.
    pub mode: BaudMode,
}

/// Divisors to program into the BG and FDV registers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudDividers {
    /// Bit generator reload value, always below [`BG_RANGE`].
    pub bg: u32,
    /// Fractional pre-divider reload value, always below [`FDV_RANGE`].
    /// 0 unless the fractional scheme is selected.
    pub fdv: u32,
}

/// Outcome of a baud generator computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudResult {
    /// Divisors to program.
    pub dividers: BaudDividers,
    /// Baudrate the generator will actually produce. 0 Hz means no bit
    /// clock can be derived.
    pub freq: HertzU32,
}

impl BaudResult {
    const NONE: BaudResult = BaudResult {
        dividers: BaudDividers { bg: 0, fdv: 0 },
        freq: HertzU32::from_raw(0),
    };
}

/// Computes the divisors that bring the bit rate closest to the requested
/// baudrate.
///
/// Pure and total, like [`crate::fracdiv::compute_divider`]. A request
/// above the fastest derivable bit rate leaves the bit generator at its
/// smallest divisor; a request below the slowest clamps it to the largest.
pub fn compute_baudrate_divider(config: &BaudConfig) -> BaudResult {
    let input = config.input.to_Hz();
    let requested = config.requested.to_Hz();

    if input == 0 || requested == 0 {
        return BaudResult::NONE;
    }

    match config.mode {
        BaudMode::Synchronous => integer_bit_generator(input, requested, config.prescaler, 4),
        BaudMode::Asynchronous => integer_bit_generator(input, requested, config.prescaler, 16),
        BaudMode::AsynchronousFractional => fractional_bit_generator(input, requested),
    }
}

/// Plain divide-down through prescaler and bit generator:
/// baudrate = input / (prescaler * oversampling * (bg + 1)).
fn integer_bit_generator(
    input: u32,
    requested: u32,
    prescaler: Prescaler,
    oversampling: u32,
) -> BaudResult {
    let unit = u64::from(prescaler.factor() * oversampling) * u64::from(requested);
    let ideal = u64::from(input) / unit;
    let bg = ideal.saturating_sub(1).min(u64::from(BG_RANGE - 1)) as u32;

    let freq = (u64::from(input) / (u64::from(prescaler.factor() * oversampling) * u64::from(bg + 1))) as u32;
    BaudResult {
        dividers: BaudDividers { bg, fdv: 0 },
        freq: HertzU32::from_raw(freq),
    }
}

/// Fractional pre-divider stage ahead of the fixed divide-by-16:
/// baudrate = (fdv / FDV_RANGE) * input / (16 * (bg + 1)).
///
/// While the ideal pre-divider value fits its register the bit generator
/// stays at divide-by-one and FDV does all the work; once it clamps, the
/// bit generator picks up the remaining division. The inner
/// `input / (16 * requested)` quotient is truncated before the FDV
/// scaling, mirroring the hardware's cascade order.
fn fractional_bit_generator(input: u32, requested: u32) -> BaudResult {
    let fdv_max = u64::from(FDV_RANGE - 1);
    let ideal_fdv = (u64::from(requested) * u64::from(FDV_RANGE) * 16) / u64::from(input);

    let (fdv, bg) = if ideal_fdv > fdv_max {
        let coarse = u64::from(input) / (16 * u64::from(requested));
        let bg = ((fdv_max * coarse) / u64::from(FDV_RANGE))
            .saturating_sub(1)
            .min(u64::from(BG_RANGE - 1));
        (fdv_max, bg)
    } else {
        (ideal_fdv, 0)
    };

    let freq = (fdv * (u64::from(input) / (16 * (bg + 1)))) / u64::from(FDV_RANGE);
    BaudResult {
        dividers: BaudDividers {
            bg: bg as u32,
            fdv: fdv as u32,
        },
        freq: HertzU32::from_raw(freq as u32),
    }
}
