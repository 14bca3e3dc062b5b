//! Fractional clock divider calculator
//!
//! The PSI5-S module derives its kernel clock, its timestamp clock and the
//! clock driven out on the ASC clock pin from the bus clock through
//! per-register fractional dividers. Each divider is programmed with an
//! operating mode and a step value; this module computes the step value
//! that comes closest to a requested output frequency and reports the
//! frequency the divider will actually produce.
//!
//! The arithmetic is integer-only and truncating, matching the hardware
//! dividers. Changing the rounding changes real clock outputs.

use fugit::HertzU32;

/// Size of the step domain of the kernel and timestamp clock dividers.
///
/// The ASC clock output divider runs on a doubled domain,
/// `2 * STEP_RANGE`.
pub const STEP_RANGE: u32 = 0x3FF;

/// Operating mode of a fractional divider.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DividerMode {
    /// The bus clock is passed through undivided.
    Spb,
    /// Divide-down mode: output = input / (step_range - step).
    Normal,
    /// Fractional mode: output = input * step / step_range.
    Fractional,
    /// The divider output is stopped.
    Off,
}

/// Requested divider configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DividerConfig {
    /// Frequency of the clock feeding the divider. May be 0 Hz if the
    /// upstream clock is disabled.
    pub input: HertzU32,
    /// Desired output frequency.
    pub requested: HertzU32,
    /// Divider operating mode.
    pub mode: DividerMode,
    /// Size of the divider's step domain, fixed by the width of the
    /// target register. [`STEP_RANGE`] for the kernel and timestamp
    /// clock dividers, twice that for the ASC clock output divider.
    pub step_range: u32,
}

/// Outcome of a divider computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DividerResult {
    /// Step value to program, always within `[0, step_range - 1]`.
    pub step: u32,
    /// Frequency the divider will actually produce. 0 Hz means no clock
    /// could be derived and dependent peripheral setup must be aborted.
    pub freq: HertzU32,
}

impl DividerResult {
    const NONE: DividerResult = DividerResult {
        step: 0,
        freq: HertzU32::from_raw(0),
    };
}

/// Computes the divider step that brings the output closest to the
/// requested frequency.
///
/// Pure and total: identical inputs produce identical outputs and no input
/// panics. If the ideal divisor does not fit the register width the step
/// is clamped to the end of its range and the reported frequency is the
/// closest attainable one, which may be far from the request. A result of
/// 0 Hz means no clock can be derived at all (divider off, zero request
/// in a dividing mode, or the input clock itself reports 0 Hz).
pub fn compute_divider(config: &DividerConfig) -> DividerResult {
    let input = config.input.to_Hz();
    let requested = config.requested.to_Hz();

    // A divider with fewer than two representable steps cannot divide.
    if input == 0 || config.step_range < 2 {
        return DividerResult::NONE;
    }
    let step_max = config.step_range - 1;

    match config.mode {
        DividerMode::Off => DividerResult::NONE,
        DividerMode::Spb => DividerResult {
            step: 0,
            freq: config.input,
        },
        DividerMode::Normal => {
            if requested == 0 {
                return DividerResult::NONE;
            }
            let divisor = input / requested;
            // A divisor beyond the step domain is not representable; the
            // clamped step leaves the divider at its smallest divisor.
            let step = if divisor > config.step_range {
                step_max
            } else {
                (config.step_range - divisor).min(step_max)
            };
            DividerResult {
                step,
                freq: HertzU32::from_raw(input / (config.step_range - step)),
            }
        }
        DividerMode::Fractional => {
            let step = (u64::from(requested) * u64::from(config.step_range))
                / u64::from(input);
            let step = step.min(u64::from(step_max)) as u32;
            let freq = (u64::from(input) * u64::from(step))
                / u64::from(config.step_range);
            DividerResult {
                step,
                freq: HertzU32::from_raw(freq as u32),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fugit::RateExtU32;

    fn normal(input: u32, requested: u32) -> DividerConfig {
        DividerConfig {
            input: input.Hz(),
            requested: requested.Hz(),
            mode: DividerMode::Normal,
            step_range: STEP_RANGE,
        }
    }

    fn fractional(input: u32, requested: u32) -> DividerConfig {
        DividerConfig {
            input: input.Hz(),
            requested: requested.Hz(),
            mode: DividerMode::Fractional,
            step_range: STEP_RANGE,
        }
    }

    #[test]
    fn normal_exact_division() {
        let result = compute_divider(&normal(100_000_000, 1_562_500));
        assert_eq!(result.step, STEP_RANGE - 64);
        assert_eq!(result.freq.to_Hz(), 1_562_500);
    }

    #[test]
    fn normal_clamps_oversized_divisor() {
        // The ideal divisor (100_000_000) does not fit the register, so
        // the step clamps and the divider falls back to divide-by-one.
        let result = compute_divider(&normal(100_000_000, 1));
        assert_eq!(result.step, STEP_RANGE - 1);
        assert_eq!(result.freq.to_Hz(), 100_000_000);
    }

    #[test]
    fn normal_cannot_increase_frequency() {
        let result = compute_divider(&normal(100_000_000, 200_000_000));
        assert_eq!(result.step, STEP_RANGE - 1);
        assert_eq!(result.freq.to_Hz(), 100_000_000);
    }

    #[test]
    fn normal_largest_divisor_uses_step_zero() {
        let input = STEP_RANGE * 1000;
        let result = compute_divider(&normal(input, 1000));
        assert_eq!(result.step, 0);
        assert_eq!(result.freq.to_Hz(), 1000);
    }

    #[test]
    fn normal_achieved_is_monotonic() {
        // Within the representable divisor domain the achieved frequency
        // must not increase as the request decreases.
        let requests = [50_000_000, 10_000_000, 1_000_000, 200_000, 100_000];
        let mut previous = u32::MAX;
        for requested in requests {
            let result = compute_divider(&normal(100_000_000, requested));
            assert!(result.freq.to_Hz() <= previous);
            assert!(result.step < STEP_RANGE);
            previous = result.freq.to_Hz();
        }
    }

    #[test]
    fn fractional_stays_below_input() {
        for requested in [1_000, 500_000, 20_000_000, 99_999_999, 150_000_000] {
            let result = compute_divider(&fractional(100_000_000, requested));
            assert!(result.freq.to_Hz() <= 100_000_000);
            assert!(result.step < STEP_RANGE);
        }
    }

    #[test]
    fn fractional_achieved_is_monotonic() {
        let requests = [100_000, 1_000_000, 25_000_000, 80_000_000, 100_000_000];
        let mut previous = 0;
        for requested in requests {
            let result = compute_divider(&fractional(100_000_000, requested));
            assert!(result.freq.to_Hz() >= previous);
            previous = result.freq.to_Hz();
        }
    }

    #[test]
    fn fractional_truncates_toward_zero() {
        // step = 100_000 * 1023 / 1_000_000 = 102 (truncated from 102.3),
        // freq = 1_000_000 * 102 / 1023 = 99_706 (truncated from 99706.7).
        let result = compute_divider(&fractional(1_000_000, 100_000));
        assert_eq!(result.step, 102);
        assert_eq!(result.freq.to_Hz(), 99_706);
    }

    #[test]
    fn spb_passes_input_through() {
        let config = DividerConfig {
            input: 100_000_000.Hz(),
            requested: 1.Hz(),
            mode: DividerMode::Spb,
            step_range: STEP_RANGE,
        };
        let result = compute_divider(&config);
        assert_eq!(result.step, 0);
        assert_eq!(result.freq.to_Hz(), 100_000_000);
    }

    #[test]
    fn off_yields_no_clock() {
        let config = DividerConfig {
            input: 100_000_000.Hz(),
            requested: 1_562_500.Hz(),
            mode: DividerMode::Off,
            step_range: STEP_RANGE,
        };
        let result = compute_divider(&config);
        assert_eq!(result, DividerResult::NONE);
    }

    #[test]
    fn dead_input_yields_no_clock_in_every_mode() {
        for mode in [
            DividerMode::Spb,
            DividerMode::Normal,
            DividerMode::Fractional,
            DividerMode::Off,
        ] {
            let config = DividerConfig {
                input: 0.Hz(),
                requested: 1_562_500.Hz(),
                mode,
                step_range: STEP_RANGE,
            };
            assert_eq!(compute_divider(&config), DividerResult::NONE);
        }
    }

    #[test]
    fn zero_request_yields_no_clock() {
        assert_eq!(compute_divider(&normal(100_000_000, 0)), DividerResult::NONE);
        let result = compute_divider(&fractional(100_000_000, 0));
        assert_eq!(result, DividerResult::NONE);
    }

    #[test]
    fn computation_is_idempotent() {
        let config = normal(100_000_000, 1_562_500);
        assert_eq!(compute_divider(&config), compute_divider(&config));
    }

    #[test]
    fn doubled_step_range_for_clock_output() {
        let config = DividerConfig {
            step_range: 2 * STEP_RANGE,
            ..normal(100_000_000, 100_000_000)
        };
        let result = compute_divider(&config);
        assert_eq!(result.step, 2 * STEP_RANGE - 1);
        assert_eq!(result.freq.to_Hz(), 100_000_000);
    }
}
