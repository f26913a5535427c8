//! 基础类型定义
//!
//! 单元标识、属性位、时间单位以及单元类别

use core::fmt;
use std::time::Duration;
use thiserror::Error;

/// 单元唯一标识
///
/// 仅作为引用使用，不持有任何资源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uid(pub u32);

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

bitflags::bitflags! {
    /// 单元属性位
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AttrFlags: u32 {
        /// 支持 Reset & Play
        const RESET_AND_PLAY = 0x0000_0001;
    }
}

/// 经过时间（毫秒）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ElapsedTime(pub u64);

impl ElapsedTime {
    pub const ZERO: Self = Self(0);

    pub const fn from_millis(ms: u64) -> Self {
        Self(ms)
    }

    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0)
    }
}

impl From<Duration> for ElapsedTime {
    fn from(d: Duration) -> Self {
        Self(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }
}

/// 单元类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum UnitCategory {
    #[default]
    None = 0,
    UnitLED = 1,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CategoryError {
    #[error("未知的单元类别: {0}")]
    Unknown(u8),
}

impl TryFrom<u8> for UnitCategory {
    type Error = CategoryError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(UnitCategory::None),
            1 => Ok(UnitCategory::UnitLED),
            _ => Err(CategoryError::Unknown(v)),
        }
    }
}

/// 单元需要访问的总线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub access_gpio: bool,
    pub access_i2c: bool,
}

/// 根据单元类别返回默认的总线访问需求
///
/// LED 单元直接驱动引脚，因此需要 GPIO
pub const fn capabilities(category: UnitCategory) -> Capabilities {
    match category {
        UnitCategory::UnitLED => Capabilities {
            access_gpio: true,
            access_i2c: false,
        },
        UnitCategory::None => Capabilities {
            access_gpio: false,
            access_i2c: false,
        },
    }
}
