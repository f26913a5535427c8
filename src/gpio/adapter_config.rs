//! 适配器配置
//!
//! 描述一个引脚如何被单元驱动使用，并在绑定前校验模式与 RMT 子配置是否一致

use thiserror::Error;

use super::mode::{DigitalConfig, PinMode};
use super::rmt::{RmtItem, RmtRxConfig, RmtTxConfig};
use crate::types::{AttrFlags, ElapsedTime, Uid};

/// RMT 方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmtDirection {
    Tx,
    Rx,
}

/// 配置错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("模式 {mode} 缺少 RMT {missing:?} 配置")]
    InvalidRmtConfig { mode: PinMode, missing: RmtDirection },

    #[error("模式 {mode} 不使用 RMT，但设置了 RMT {populated:?} 配置")]
    ConflictingMode { mode: PinMode, populated: RmtDirection },
}

/// 适配器配置
///
/// 由单元驱动在初始化时构造，绑定后不再修改
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterConfig {
    pub mode: PinMode,
    pub config: DigitalConfig,
    /// 仅 `RmtTX` / `RmtRXTX` 使用
    pub tx: Option<RmtTxConfig>,
    /// 仅 `RmtRX` / `RmtRXTX` 使用
    pub rx: Option<RmtRxConfig>,
    pub attr: AttrFlags,
    /// 等待发送完成的超时，0 表示不等待
    pub elapsed: ElapsedTime,
    /// 每次发送末尾追加的符号，全零表示不追加
    pub rmt_item: RmtItem,
    pub uid: Uid,
}

impl AdapterConfig {
    pub fn new(mode: PinMode) -> Self {
        Self {
            mode,
            config: DigitalConfig::default(),
            tx: None,
            rx: None,
            attr: AttrFlags::empty(),
            elapsed: ElapsedTime::ZERO,
            rmt_item: RmtItem::default(),
            uid: Uid::default(),
        }
    }

    /// 数字 / 模拟模式
    pub fn gpio(mode: PinMode, config: DigitalConfig) -> Self {
        Self {
            config,
            ..Self::new(mode)
        }
    }

    pub fn rmt_tx(tx: RmtTxConfig) -> Self {
        Self {
            tx: Some(tx),
            ..Self::new(PinMode::RmtTX)
        }
    }

    pub fn rmt_rx(rx: RmtRxConfig) -> Self {
        Self {
            rx: Some(rx),
            ..Self::new(PinMode::RmtRX)
        }
    }

    pub fn rmt_rxtx(tx: RmtTxConfig, rx: RmtRxConfig) -> Self {
        Self {
            tx: Some(tx),
            rx: Some(rx),
            ..Self::new(PinMode::RmtRXTX)
        }
    }

    pub fn with_uid(mut self, uid: Uid) -> Self {
        self.uid = uid;
        self
    }

    pub fn with_attr(mut self, attr: AttrFlags) -> Self {
        self.attr = attr;
        self
    }

    pub fn with_elapsed(mut self, elapsed: ElapsedTime) -> Self {
        self.elapsed = elapsed;
        self
    }

    pub fn with_rmt_item(mut self, item: RmtItem) -> Self {
        self.rmt_item = item;
        self
    }

    /// 校验模式与 RMT 子配置是否一致
    ///
    /// # 返回
    /// * `Ok(())` - 配置有效
    /// * `Err(ConfigError::InvalidRmtConfig)` - 所选 RMT 方向缺少子配置
    /// * `Err(ConfigError::ConflictingMode)` - 非 RMT 模式设置了 RMT 子配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mode = self.mode;
        if !mode.is_rmt() {
            if self.tx.is_some() {
                return Err(ConfigError::ConflictingMode {
                    mode,
                    populated: RmtDirection::Tx,
                });
            }
            if self.rx.is_some() {
                return Err(ConfigError::ConflictingMode {
                    mode,
                    populated: RmtDirection::Rx,
                });
            }
            return Ok(());
        }

        if mode.needs_tx() && self.tx.is_none() {
            return Err(ConfigError::InvalidRmtConfig {
                mode,
                missing: RmtDirection::Tx,
            });
        }
        if mode.needs_rx() && self.rx.is_none() {
            return Err(ConfigError::InvalidRmtConfig {
                mode,
                missing: RmtDirection::Rx,
            });
        }
        Ok(())
    }

    /// 校验并转换为不可能出现非法组合的 [`PinSetup`]
    ///
    /// 单方向 RMT 模式下多余的另一方向子配置会被忽略
    pub fn setup(&self) -> Result<PinSetup, ConfigError> {
        self.validate()?;
        let setup = match (self.mode, self.tx, self.rx) {
            (PinMode::RmtTX, Some(tx), _) => PinSetup::RmtTx(tx),
            (PinMode::RmtRX, _, Some(rx)) => PinSetup::RmtRx(rx),
            (PinMode::RmtRXTX, Some(tx), Some(rx)) => PinSetup::RmtRxTx { tx, rx },
            (mode, _, _) => PinSetup::Gpio {
                mode,
                config: self.config,
            },
        };
        Ok(setup)
    }
}

/// 校验后的引脚用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinSetup {
    /// 数字或模拟模式（不含 RMT）
    Gpio { mode: PinMode, config: DigitalConfig },
    RmtTx(RmtTxConfig),
    RmtRx(RmtRxConfig),
    RmtRxTx { tx: RmtTxConfig, rx: RmtRxConfig },
}

impl PinSetup {
    pub fn mode(&self) -> PinMode {
        match self {
            PinSetup::Gpio { mode, .. } => *mode,
            PinSetup::RmtTx(_) => PinMode::RmtTX,
            PinSetup::RmtRx(_) => PinMode::RmtRX,
            PinSetup::RmtRxTx { .. } => PinMode::RmtRXTX,
        }
    }

    pub fn tx(&self) -> Option<&RmtTxConfig> {
        match self {
            PinSetup::RmtTx(tx) | PinSetup::RmtRxTx { tx, .. } => Some(tx),
            _ => None,
        }
    }

    pub fn rx(&self) -> Option<&RmtRxConfig> {
        match self {
            PinSetup::RmtRx(rx) | PinSetup::RmtRxTx { rx, .. } => Some(rx),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpio::mode::Pull;

    #[test]
    fn test_tx_modes_require_tx_config() {
        for mode in [PinMode::RmtTX, PinMode::RmtRXTX] {
            let mut cfg = AdapterConfig::new(mode);
            cfg.rx = Some(RmtRxConfig::default());
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::InvalidRmtConfig {
                    mode,
                    missing: RmtDirection::Tx
                })
            );
        }
    }

    #[test]
    fn test_rx_modes_require_rx_config() {
        for mode in [PinMode::RmtRX, PinMode::RmtRXTX] {
            let mut cfg = AdapterConfig::new(mode);
            cfg.tx = Some(RmtTxConfig::default());
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::InvalidRmtConfig {
                    mode,
                    missing: RmtDirection::Rx
                })
            );
        }
    }

    #[test]
    fn test_non_rmt_modes_reject_rmt_configs() {
        for mode in PinMode::ALL.into_iter().filter(|m| !m.is_rmt()) {
            assert_eq!(AdapterConfig::new(mode).validate(), Ok(()));

            let mut cfg = AdapterConfig::new(mode);
            cfg.tx = Some(RmtTxConfig::default());
            assert!(matches!(cfg.validate(), Err(ConfigError::ConflictingMode { .. })));

            let mut cfg = AdapterConfig::new(mode);
            cfg.rx = Some(RmtRxConfig::default());
            assert_eq!(
                cfg.validate(),
                Err(ConfigError::ConflictingMode {
                    mode,
                    populated: RmtDirection::Rx
                })
            );
        }
    }

    #[test]
    fn test_setup_from_constructors() {
        let tx = RmtTxConfig::default();
        let rx = RmtRxConfig::default();

        assert_eq!(AdapterConfig::rmt_tx(tx).setup(), Ok(PinSetup::RmtTx(tx)));
        assert_eq!(AdapterConfig::rmt_rx(rx).setup(), Ok(PinSetup::RmtRx(rx)));

        let setup = AdapterConfig::rmt_rxtx(tx, rx).setup().unwrap();
        assert_eq!(setup.mode(), PinMode::RmtRXTX);
        assert_eq!(setup.tx(), Some(&tx));
        assert_eq!(setup.rx(), Some(&rx));

        let digital = DigitalConfig::default().with_pull(Pull::None);
        let setup = AdapterConfig::gpio(PinMode::Output, digital).setup().unwrap();
        assert_eq!(
            setup,
            PinSetup::Gpio {
                mode: PinMode::Output,
                config: digital
            }
        );
        assert!(setup.tx().is_none() && setup.rx().is_none());
    }

    #[test]
    fn test_single_direction_ignores_extra_config() {
        let mut cfg = AdapterConfig::rmt_tx(RmtTxConfig::default());
        cfg.rx = Some(RmtRxConfig::default());
        assert_eq!(cfg.setup().map(|s| s.mode()), Ok(PinMode::RmtTX));
    }
}
