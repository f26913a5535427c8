//! 已绑定引脚的句柄
//!
//! 句柄独占引脚，释放（或析构）后引脚回到注册表。
//! 已释放的句柄不能再次绑定，所有操作都返回 [`PinError::Released`]

use embedded_hal::digital::{self, ErrorKind, ErrorType, InputPin, OutputPin};
use thiserror::Error;

use super::adapter_config::{AdapterConfig, PinSetup};
use super::mode::PinMode;
use super::rmt::RmtItem;
use crate::config::manager::{BindError, PinRegistry};
use crate::config::pins::PinId;
use crate::peripherals::{ClaimToken, Peripheral, PlatformError};
use crate::types::{AttrFlags, Uid};

/// `pulse_in` 的默认超时（微秒）
pub const DEFAULT_PULSE_TIMEOUT_US: u32 = 30_000;

/// 引脚操作错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PinError {
    #[error("引脚 {0} 已释放")]
    Released(PinId),

    #[error("引脚 {pin} 处于 {mode} 模式，不支持 {op}")]
    WrongMode {
        pin: PinId,
        mode: PinMode,
        op: &'static str,
    },

    #[error("等待脉冲超时")]
    Timeout,

    #[error("外设错误: {0}")]
    Platform(#[from] PlatformError),
}

impl digital::Error for PinError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// 已绑定的引脚
pub struct BoundPin<P: Peripheral> {
    registry: PinRegistry<P>,
    token: Option<ClaimToken>,
    pin: PinId,
    setup: PinSetup,
    config: AdapterConfig,
}

impl<P: Peripheral> BoundPin<P> {
    pub(crate) fn new(
        registry: PinRegistry<P>,
        token: ClaimToken,
        setup: PinSetup,
        config: AdapterConfig,
    ) -> Self {
        Self {
            registry,
            pin: token.pin,
            token: Some(token),
            setup,
            config,
        }
    }

    #[inline]
    pub fn pin(&self) -> PinId {
        self.pin
    }

    #[inline]
    pub fn mode(&self) -> PinMode {
        self.setup.mode()
    }

    pub fn setup(&self) -> &PinSetup {
        &self.setup
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn uid(&self) -> Uid {
        self.config.uid
    }

    pub fn attr(&self) -> AttrFlags {
        self.config.attr
    }

    /// 分配到的 RMT (发送, 接收) 通道
    pub fn rmt_channels(&self) -> (Option<u8>, Option<u8>) {
        self.token
            .as_ref()
            .map(|t| (t.tx_channel, t.rx_channel))
            .unwrap_or((None, None))
    }

    pub fn is_released(&self) -> bool {
        self.token.is_none()
    }

    /// 把引脚交还注册表，重复调用无副作用
    pub fn release(&mut self) {
        if let Some(token) = self.token.take() {
            self.registry.release_token(token);
        }
    }

    /// 改变引脚用途，引脚始终归本句柄所有
    ///
    /// 新配置的 `uid` 被忽略。失败时恢复原用途，恢复也失败时句柄变为已释放
    pub fn reconfigure(&mut self, config: AdapterConfig) -> Result<(), BindError> {
        let setup = config.setup()?;
        let old = self.token.take().ok_or(BindError::Released(self.pin))?;
        match self.registry.reclaim(old, &self.setup, &setup) {
            Ok(token) => {
                self.token = Some(token);
                self.setup = setup;
                self.config = AdapterConfig {
                    uid: self.config.uid,
                    ..config
                };
                Ok(())
            }
            Err((err, restored)) => {
                self.token = restored;
                Err(err)
            }
        }
    }

    fn check(
        &self,
        op: &'static str,
        allowed: impl Fn(PinMode) -> bool,
    ) -> Result<&ClaimToken, PinError> {
        let token = self.token.as_ref().ok_or(PinError::Released(self.pin))?;
        let mode = self.mode();
        if !allowed(mode) {
            return Err(PinError::WrongMode {
                pin: self.pin,
                mode,
                op,
            });
        }
        Ok(token)
    }

    fn is_digital(mode: PinMode) -> bool {
        !mode.is_rmt() && mode != PinMode::Analog
    }

    pub fn write_digital(&mut self, high: bool) -> Result<(), PinError> {
        self.check("write_digital", |m| {
            matches!(m, PinMode::Output | PinMode::OpenDrain | PinMode::OutputOpenDrain)
        })?;
        let pin = self.pin;
        Ok(self.registry.with_peripheral(|p| p.write_digital(pin, high))?)
    }

    pub fn read_digital(&mut self) -> Result<bool, PinError> {
        self.check("read_digital", Self::is_digital)?;
        self.read_level()
    }

    /// 输出 8 位 DAC 值，高位被忽略
    pub fn write_analog(&mut self, value: u16) -> Result<(), PinError> {
        self.check("write_analog", |m| m == PinMode::Analog)?;
        let pin = self.pin;
        Ok(self.registry.with_peripheral(|p| p.write_analog(pin, value))?)
    }

    /// 读取 12 位 ADC 原始值
    pub fn read_analog(&mut self) -> Result<u16, PinError> {
        self.check("read_analog", |m| m == PinMode::Analog)?;
        let pin = self.pin;
        Ok(self.registry.with_peripheral(|p| p.read_analog(pin))?)
    }

    fn read_level(&self) -> Result<bool, PinError> {
        let pin = self.pin;
        Ok(self.registry.with_peripheral(|p| p.read_digital(pin))?)
    }

    fn now_us(&self) -> u64 {
        self.registry.with_peripheral(|p| p.now_us())
    }

    /// 测量一个脉冲的宽度（微秒）
    ///
    /// 先等待当前处于 `level` 的脉冲结束，再等待下一个脉冲开始并计时到其结束。
    /// 任一阶段超过 `timeout_us` 返回 [`PinError::Timeout`]
    pub fn pulse_in(&mut self, level: bool, timeout_us: u32) -> Result<u32, PinError> {
        self.check("pulse_in", Self::is_digital)?;
        let timeout = u64::from(timeout_us);

        let start = self.now_us();
        while self.read_level()? == level {
            if self.now_us().saturating_sub(start) > timeout {
                return Err(PinError::Timeout);
            }
        }
        while self.read_level()? != level {
            if self.now_us().saturating_sub(start) > timeout {
                return Err(PinError::Timeout);
            }
        }

        let pulse_start = self.now_us();
        while self.read_level()? == level {
            if self.now_us().saturating_sub(pulse_start) > timeout {
                return Err(PinError::Timeout);
            }
        }
        let pulse_end = self.now_us();
        Ok(u32::try_from(pulse_end.saturating_sub(pulse_start)).unwrap_or(u32::MAX))
    }

    /// 发送 RMT 符号
    ///
    /// 配置了 `rmt_item` 时追加到末尾；`elapsed` 非 0 时等待发送完成，
    /// 等待期间不占用注册表锁
    pub fn transmit(&mut self, items: &[RmtItem]) -> Result<(), PinError> {
        let token = self.check("transmit", |m| m.needs_tx())?;
        let mut frame = items.to_vec();
        if !self.config.rmt_item.is_zero() {
            frame.push(self.config.rmt_item);
        }
        if frame.is_empty() {
            return Ok(());
        }
        let wait_ms = self.config.elapsed.as_millis();
        log::debug!("引脚 {} 发送 {} 个 RMT 符号", self.pin, frame.len());
        self.registry.with_peripheral(|p| p.rmt_transmit(token, &frame))?;
        Ok(self.registry.wait_tx_done(token, wait_ms)?)
    }

    /// 取出一帧已接收的 RMT 符号，没有数据时返回 `None`
    pub fn receive(&mut self) -> Result<Option<Vec<RmtItem>>, PinError> {
        let token = self.check("receive", |m| m.needs_rx())?;
        Ok(self.registry.with_peripheral(|p| p.rmt_receive(token))?)
    }
}

impl<P: Peripheral> Drop for BoundPin<P> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<P: Peripheral> core::fmt::Debug for BoundPin<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundPin")
            .field("pin", &self.pin)
            .field("mode", &self.mode())
            .field("uid", &self.config.uid)
            .field("released", &self.is_released())
            .finish()
    }
}

impl<P: Peripheral> ErrorType for BoundPin<P> {
    type Error = PinError;
}

impl<P: Peripheral> OutputPin for BoundPin<P> {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write_digital(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write_digital(true)
    }
}

impl<P: Peripheral> InputPin for BoundPin<P> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        self.read_digital()
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        self.read_digital().map(|high| !high)
    }
}
