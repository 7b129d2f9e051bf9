//! Volatility presets mapping a retention intent to rotation bounds

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

const ONE_DAY_SECONDS: u64 = 24 * 60 * 60;

/// Named tolerance level. Higher volatility keeps less history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Volatility {
    /// Keep only the most recent logs for about a day. Suited to devices with
    /// 100GB of storage or less whose logs are collected daily.
    Minimal,
    /// Keep a respectable history for about three days.
    Conservative,
    /// Keep a large history for about five days.
    Anticonservative,
    /// Keep a massive history for about a week.
    Hoarding,
    /// Caller-supplied bounds.
    Custom,
}

impl Volatility {
    /// Map a configured volatility code to a preset.
    ///
    /// Code 0 hoards the most history and code 3 keeps the least.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Volatility::Hoarding),
            1 => Ok(Volatility::Anticonservative),
            2 => Ok(Volatility::Conservative),
            3 => Ok(Volatility::Minimal),
            other => Err(Error::config(format!(
                "volatility code {} has no logging preset (valid codes are 0-3)",
                other
            ))),
        }
    }

    /// Inverse of [`Volatility::from_code`]; `None` for custom bounds
    pub fn code(self) -> Option<u8> {
        match self {
            Volatility::Hoarding => Some(0),
            Volatility::Anticonservative => Some(1),
            Volatility::Conservative => Some(2),
            Volatility::Minimal => Some(3),
            Volatility::Custom => None,
        }
    }
}

/// Immutable rotation and retention bounds for a log session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolatilityPolicy {
    pub volatility: Volatility,

    /// Rotation count at which the oldest file starts being pruned
    pub max_files: u64,

    /// Messages written to one file before it is rotated
    pub max_messages: u64,

    /// Seconds one file may stay active before it is rotated
    pub max_duration_seconds: u64,
}

impl VolatilityPolicy {
    pub fn minimal() -> Self {
        Self::preset(Volatility::Minimal, 10, 1_000, ONE_DAY_SECONDS)
    }

    pub fn conservative() -> Self {
        Self::preset(Volatility::Conservative, 100, 5_000, 3 * ONE_DAY_SECONDS)
    }

    pub fn anticonservative() -> Self {
        Self::preset(
            Volatility::Anticonservative,
            1_000,
            10_000,
            5 * ONE_DAY_SECONDS,
        )
    }

    pub fn hoarding() -> Self {
        Self::preset(Volatility::Hoarding, 5_000, 10_000, 7 * ONE_DAY_SECONDS)
    }

    /// Build a policy from explicit bounds, bypassing the preset table.
    ///
    /// Zero bounds are rejected: a zero message or duration bound would
    /// rotate on every append and a zero file bound would prune the file
    /// that was just rotated out before anyone could read it.
    pub fn custom(max_files: u64, max_messages: u64, max_duration_seconds: u64) -> Result<Self> {
        if max_files == 0 || max_messages == 0 || max_duration_seconds == 0 {
            return Err(Error::config(format!(
                "custom log bounds must be greater than 0 (files: {}, messages: {}, seconds: {})",
                max_files, max_messages, max_duration_seconds
            )));
        }

        Ok(Self::preset(
            Volatility::Custom,
            max_files,
            max_messages,
            max_duration_seconds,
        ))
    }

    /// Select a preset by its volatility code
    pub fn from_code(code: u8) -> Result<Self> {
        let volatility = Volatility::from_code(code)?;
        Self::for_volatility(volatility).ok_or_else(|| {
            Error::config(format!("volatility code {} has no preset bounds", code))
        })
    }

    /// Preset bounds for a named volatility; `None` for [`Volatility::Custom`]
    pub fn for_volatility(volatility: Volatility) -> Option<Self> {
        match volatility {
            Volatility::Minimal => Some(Self::minimal()),
            Volatility::Conservative => Some(Self::conservative()),
            Volatility::Anticonservative => Some(Self::anticonservative()),
            Volatility::Hoarding => Some(Self::hoarding()),
            Volatility::Custom => None,
        }
    }

    fn preset(
        volatility: Volatility,
        max_files: u64,
        max_messages: u64,
        max_duration_seconds: u64,
    ) -> Self {
        Self {
            volatility,
            max_files,
            max_messages,
            max_duration_seconds,
        }
    }
}

impl Default for VolatilityPolicy {
    fn default() -> Self {
        Self::minimal()
    }
}
