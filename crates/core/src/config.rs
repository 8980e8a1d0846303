//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.

use crate::{CoreError, CoreResult};
use chrono::{Duration, NaiveTime, Weekday};

/// Default number of reservations admitted per slot.
pub const DEFAULT_SLOT_CAPACITY: u32 = 6;

/// Default flat consultation fee (KRW).
pub const DEFAULT_CONSULTATION_FEE: u32 = 15_000;

/// Default fee charged when a visit carries a test order (KRW).
pub const DEFAULT_TEST_FEE: u32 = 30_000;

/// The clinic's weekly operating pattern.
///
/// All times are clinic-local times of day. The pattern is fixed per process:
/// an opening and closing time for ordinary days, an earlier closing time for
/// the weekly partial day, a daily break window during which no slots are
/// offered, and the weekly closure day on which no slots exist at all.
#[derive(Clone, Debug)]
pub struct ScheduleConfig {
    open: NaiveTime,
    close: NaiveTime,
    partial_close: NaiveTime,
    break_start: NaiveTime,
    break_end: NaiveTime,
    increment: Duration,
    closure_weekday: Weekday,
    partial_weekday: Weekday,
}

impl ScheduleConfig {
    /// Create a new `ScheduleConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if:
    /// - the opening time is not strictly before the closing time,
    /// - the partial-day closing time is later than the ordinary closing time,
    /// - the break window is inverted,
    /// - the slot increment is not a positive number of minutes,
    /// - the closure and partial weekdays coincide.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        open: NaiveTime,
        close: NaiveTime,
        partial_close: NaiveTime,
        break_start: NaiveTime,
        break_end: NaiveTime,
        increment: Duration,
        closure_weekday: Weekday,
        partial_weekday: Weekday,
    ) -> CoreResult<Self> {
        if open >= close {
            return Err(CoreError::Validation(
                "opening time must be before closing time".into(),
            ));
        }
        if partial_close > close {
            return Err(CoreError::Validation(
                "partial-day closing time cannot be later than the ordinary closing time".into(),
            ));
        }
        if break_start >= break_end {
            return Err(CoreError::Validation(
                "break window start must be before its end".into(),
            ));
        }
        if increment <= Duration::zero() {
            return Err(CoreError::Validation(
                "slot increment must be positive".into(),
            ));
        }
        if closure_weekday == partial_weekday {
            return Err(CoreError::Validation(
                "closure day and partial day cannot be the same weekday".into(),
            ));
        }

        Ok(Self {
            open,
            close,
            partial_close,
            break_start,
            break_end,
            increment,
            closure_weekday,
            partial_weekday,
        })
    }

    pub fn open(&self) -> NaiveTime {
        self.open
    }

    pub fn close(&self) -> NaiveTime {
        self.close
    }

    pub fn partial_close(&self) -> NaiveTime {
        self.partial_close
    }

    pub fn break_start(&self) -> NaiveTime {
        self.break_start
    }

    pub fn break_end(&self) -> NaiveTime {
        self.break_end
    }

    pub fn increment(&self) -> Duration {
        self.increment
    }

    pub fn closure_weekday(&self) -> Weekday {
        self.closure_weekday
    }

    pub fn partial_weekday(&self) -> Weekday {
        self.partial_weekday
    }
}

impl Default for ScheduleConfig {
    /// The clinic's published hours: 09:00-18:00 on ordinary days with a
    /// 13:00-14:00 lunch break, Saturdays until 12:30, Sundays closed,
    /// 30-minute slots.
    fn default() -> Self {
        Self {
            open: NaiveTime::from_hms_opt(9, 0, 0).expect("valid opening time"),
            close: NaiveTime::from_hms_opt(18, 0, 0).expect("valid closing time"),
            partial_close: NaiveTime::from_hms_opt(12, 30, 0).expect("valid partial close"),
            break_start: NaiveTime::from_hms_opt(13, 0, 0).expect("valid break start"),
            break_end: NaiveTime::from_hms_opt(14, 0, 0).expect("valid break end"),
            increment: Duration::minutes(30),
            closure_weekday: Weekday::Sun,
            partial_weekday: Weekday::Sat,
        }
    }
}

/// The fixed two-line fee schedule applied at the billing station.
#[derive(Clone, Copy, Debug)]
pub struct FeeSchedule {
    consultation_fee: u32,
    test_fee: u32,
}

impl FeeSchedule {
    pub fn new(consultation_fee: u32, test_fee: u32) -> Self {
        Self {
            consultation_fee,
            test_fee,
        }
    }

    /// Flat fee charged on every paid visit.
    pub fn consultation_fee(&self) -> u32 {
        self.consultation_fee
    }

    /// Fee charged when and only when a test order exists on the visit.
    pub fn test_fee(&self) -> u32 {
        self.test_fee
    }
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            consultation_fee: DEFAULT_CONSULTATION_FEE,
            test_fee: DEFAULT_TEST_FEE,
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    schedule: ScheduleConfig,
    fees: FeeSchedule,
    slot_capacity: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    pub fn new(schedule: ScheduleConfig, fees: FeeSchedule, slot_capacity: u32) -> CoreResult<Self> {
        if slot_capacity == 0 {
            return Err(CoreError::Validation(
                "slot capacity must be at least 1".into(),
            ));
        }

        Ok(Self {
            schedule,
            fees,
            slot_capacity,
        })
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn slot_capacity(&self) -> u32 {
        self.slot_capacity
    }
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            schedule: ScheduleConfig::default(),
            fees: FeeSchedule::default(),
            slot_capacity: DEFAULT_SLOT_CAPACITY,
        }
    }
}

/// Parse the per-slot capacity from an optional string value.
///
/// If `value` is `None` or empty/whitespace, returns [`DEFAULT_SLOT_CAPACITY`].
pub fn slot_capacity_from_env_value(value: Option<String>) -> CoreResult<u32> {
    parse_u32_env_value(value, "slot capacity", DEFAULT_SLOT_CAPACITY)
}

/// Parse a fee amount from an optional string value, falling back to `default`.
pub fn fee_from_env_value(value: Option<String>, default: u32) -> CoreResult<u32> {
    parse_u32_env_value(value, "fee", default)
}

fn parse_u32_env_value(value: Option<String>, what: &str, default: u32) -> CoreResult<u32> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| CoreError::Validation(format!("invalid {what}: {raw}"))),
    }
}
