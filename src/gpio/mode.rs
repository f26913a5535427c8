//! 引脚模式定义
//!
//! 每个非 RMT 模式对应一组固定的方向与上下拉设置

use core::fmt;

/// 引脚模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum PinMode {
    Input,
    Output,
    Pullup,
    InputPullup,
    Pulldown,
    InputPulldown,
    OpenDrain,
    OutputOpenDrain,
    Analog,
    RmtRX,
    RmtTX,
    RmtRXTX,
}

impl PinMode {
    pub const ALL: [PinMode; 12] = [
        PinMode::Input,
        PinMode::Output,
        PinMode::Pullup,
        PinMode::InputPullup,
        PinMode::Pulldown,
        PinMode::InputPulldown,
        PinMode::OpenDrain,
        PinMode::OutputOpenDrain,
        PinMode::Analog,
        PinMode::RmtRX,
        PinMode::RmtTX,
        PinMode::RmtRXTX,
    ];

    #[inline]
    pub const fn is_rmt(&self) -> bool {
        matches!(self, PinMode::RmtRX | PinMode::RmtTX | PinMode::RmtRXTX)
    }

    /// 是否使用 RMT 发送
    #[inline]
    pub const fn needs_tx(&self) -> bool {
        matches!(self, PinMode::RmtTX | PinMode::RmtRXTX)
    }

    /// 是否使用 RMT 接收
    #[inline]
    pub const fn needs_rx(&self) -> bool {
        matches!(self, PinMode::RmtRX | PinMode::RmtRXTX)
    }

    /// 是否会主动驱动引脚电平
    #[inline]
    pub const fn drives_output(&self) -> bool {
        matches!(
            self,
            PinMode::Output
                | PinMode::OpenDrain
                | PinMode::OutputOpenDrain
                | PinMode::RmtTX
                | PinMode::RmtRXTX
        )
    }

    /// 非 RMT 模式的电气设置，RMT 模式返回 `None`
    pub const fn electrical(&self) -> Option<Electrical> {
        let (direction, pull_up, pull_down) = match self {
            PinMode::Input => (Direction::Input, false, false),
            PinMode::Output => (Direction::Output, false, false),
            PinMode::Pullup | PinMode::InputPullup => (Direction::Input, true, false),
            PinMode::Pulldown | PinMode::InputPulldown => (Direction::Input, false, true),
            // 开漏模式默认打开内部上拉
            PinMode::OpenDrain => (Direction::OutputOpenDrain, true, false),
            PinMode::OutputOpenDrain => (Direction::OutputOpenDrain, false, false),
            PinMode::Analog => (Direction::Disabled, false, false),
            PinMode::RmtRX | PinMode::RmtTX | PinMode::RmtRXTX => return None,
        };
        Some(Electrical {
            direction,
            pull_up,
            pull_down,
        })
    }
}

impl fmt::Display for PinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Disabled,
    Input,
    Output,
    OutputOpenDrain,
}

/// 上下拉状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pull {
    None,
    Up,
    Down,
}

/// 驱动能力
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DriveStrength {
    Weakest,
    Weak,
    #[default]
    Medium,
    Strongest,
}

/// 非 RMT 模式的通用属性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DigitalConfig {
    /// `None` 时使用模式自带的上下拉
    pub pull: Option<Pull>,
    pub drive: DriveStrength,
}

impl DigitalConfig {
    pub const fn with_pull(mut self, pull: Pull) -> Self {
        self.pull = Some(pull);
        self
    }

    pub const fn with_drive(mut self, drive: DriveStrength) -> Self {
        self.drive = drive;
        self
    }
}

/// 写入外设的最终电气设置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Electrical {
    pub direction: Direction,
    pub pull_up: bool,
    pub pull_down: bool,
}

impl Electrical {
    /// 模式默认设置叠加用户指定的上下拉
    pub fn resolve(mode: PinMode, config: &DigitalConfig) -> Option<Self> {
        let mut e = mode.electrical()?;
        match config.pull {
            Some(Pull::None) => {
                e.pull_up = false;
                e.pull_down = false;
            }
            Some(Pull::Up) => {
                e.pull_up = true;
                e.pull_down = false;
            }
            Some(Pull::Down) => {
                e.pull_up = false;
                e.pull_down = true;
            }
            None => {}
        }
        Some(e)
    }

    /// 未被驱动时读取到的电平
    pub fn idle_level(&self) -> bool {
        self.pull_up && !self.pull_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rmt_modes_have_no_electrical() {
        for mode in PinMode::ALL {
            assert_eq!(mode.is_rmt(), mode.electrical().is_none(), "{mode}");
        }
    }

    #[test]
    fn test_rmt_directions() {
        assert!(PinMode::RmtTX.needs_tx() && !PinMode::RmtTX.needs_rx());
        assert!(PinMode::RmtRX.needs_rx() && !PinMode::RmtRX.needs_tx());
        assert!(PinMode::RmtRXTX.needs_rx() && PinMode::RmtRXTX.needs_tx());
        assert!(!PinMode::Output.needs_tx());
    }

    #[test]
    fn test_open_drain_defaults_to_pullup() {
        let e = PinMode::OpenDrain.electrical().unwrap();
        assert_eq!(e.direction, Direction::OutputOpenDrain);
        assert!(e.pull_up);

        let e = PinMode::OutputOpenDrain.electrical().unwrap();
        assert!(!e.pull_up && !e.pull_down);
    }

    #[test]
    fn test_pull_override() {
        let cfg = DigitalConfig::default().with_pull(Pull::None);
        let e = Electrical::resolve(PinMode::InputPullup, &cfg).unwrap();
        assert!(!e.pull_up);
        assert!(!e.idle_level());

        let cfg = DigitalConfig::default().with_pull(Pull::Up);
        let e = Electrical::resolve(PinMode::Input, &cfg).unwrap();
        assert!(e.idle_level());

        let e = Electrical::resolve(PinMode::Pulldown, &DigitalConfig::default()).unwrap();
        assert!(e.pull_down);
        assert!(Electrical::resolve(PinMode::RmtTX, &DigitalConfig::default()).is_none());
    }
}
