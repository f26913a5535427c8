//! 单元端口引脚配置
//!
//! 定义单元连接端口使用的 GPIO 引脚

use thiserror::Error;

use super::board::BoardProfile;

/// 引脚编号
pub type PinId = u8;

/// 单元使用的一对引脚
///
/// 两个编号相同表示单线单元（例如只有一根数据线的 LED 单元）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnitPins {
    /// 输入 / RMT 接收引脚
    pub rx: PinId,
    /// 输出 / RMT 发送引脚
    pub tx: PinId,
}

impl UnitPins {
    pub const fn new(rx: PinId, tx: PinId) -> Self {
        Self { rx, tx }
    }

    pub const fn single(pin: PinId) -> Self {
        Self { rx: pin, tx: pin }
    }

    pub const fn is_single(&self) -> bool {
        self.rx == self.tx
    }
}

/// M5Stack Core 端口 A (GPIO21 / GPIO22)
pub const PORT_A: UnitPins = UnitPins::new(21, 22);

/// M5Stack Core 端口 B (GPIO36 输入 / GPIO26 输出)
pub const PORT_B: UnitPins = UnitPins::new(36, 26);

/// M5Stack Core 端口 C (GPIO16 / GPIO17)
pub const PORT_C: UnitPins = UnitPins::new(16, 17);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PinConfigError {
    #[error("引脚 {pin} 不是 {board} 上有效的 GPIO 引脚")]
    InvalidPin { pin: PinId, board: &'static str },

    #[error("引脚 {0} 只能输入，不能作为输出引脚")]
    InputOnly(PinId),
}

/// 验证引脚配置的有效性
///
/// # 参数
/// * `pins` - 要验证的引脚配置
/// * `board` - 目标板
///
/// # 返回
/// * `Ok(())` - 配置有效
/// * `Err(PinConfigError)` - 配置无效
pub fn validate_pins(pins: &UnitPins, board: &BoardProfile) -> Result<(), PinConfigError> {
    for pin in [pins.rx, pins.tx] {
        if !board.is_valid_pin(pin) {
            return Err(PinConfigError::InvalidPin {
                pin,
                board: board.name,
            });
        }
    }
    if board.is_input_only(pins.tx) {
        return Err(PinConfigError::InputOnly(pins.tx));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_ports_are_valid() {
        for port in [PORT_A, PORT_B, PORT_C] {
            assert_eq!(validate_pins(&port, &BoardProfile::ESP32), Ok(()));
        }
    }

    #[test]
    fn test_input_only_tx_rejected() {
        let pins = UnitPins::new(26, 36);
        assert_eq!(
            validate_pins(&pins, &BoardProfile::ESP32),
            Err(PinConfigError::InputOnly(36))
        );
    }

    #[test]
    fn test_invalid_pin_rejected() {
        let pins = UnitPins::single(7);
        assert_eq!(
            validate_pins(&pins, &BoardProfile::ESP32),
            Err(PinConfigError::InvalidPin { pin: 7, board: "esp32" })
        );
        assert!(pins.is_single());
    }
}
