//! 引脚注册表
//!
//! 安全地管理引脚的所有权，防止冲突使用。
//! 检查与占用在同一把锁内完成，并发绑定同一引脚时只有一方成功

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;

use crate::config::pins::PinId;
use crate::gpio::adapter_config::{AdapterConfig, ConfigError, PinSetup};
use crate::gpio::bound::BoundPin;
use crate::gpio::mode::PinMode;
use crate::peripherals::{ClaimToken, Peripheral, PlatformError, RmtTxWait};
use crate::types::Uid;

/// 绑定错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("配置无效: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("引脚 {0} 已被使用")]
    PinBusy(PinId),

    #[error("引脚 {pin} 无法工作在 {mode} 模式")]
    UnsupportedMode { pin: PinId, mode: PinMode },

    #[error("无效的引脚编号: {0}")]
    InvalidPin(PinId),

    #[error("引脚 {0} 的句柄已释放")]
    Released(PinId),

    #[error("外设错误: {0}")]
    Platform(PlatformError),
}

impl BindError {
    fn from_platform(err: PlatformError, pin: PinId, mode: PinMode) -> Self {
        match err {
            PlatformError::InvalidPin(pin) => BindError::InvalidPin(pin),
            PlatformError::NoRmtChannel | PlatformError::UnsupportedMode { .. } => {
                BindError::UnsupportedMode { pin, mode }
            }
            other => BindError::Platform(other),
        }
    }
}

struct RegistryState<P> {
    peripheral: P,
    /// 已绑定的引脚及其所属单元
    claimed: HashMap<PinId, Uid>,
}

struct Shared<P: Peripheral> {
    state: Mutex<RegistryState<P>>,
    /// 不经过注册表锁
    tx_wait: P::TxWait,
}

/// 引脚注册表
///
/// 克隆得到的是同一个注册表的句柄
pub struct PinRegistry<P: Peripheral> {
    inner: Arc<Shared<P>>,
}

impl<P: Peripheral> Clone for PinRegistry<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Peripheral> PinRegistry<P> {
    pub fn new(peripheral: P) -> Self {
        let tx_wait = peripheral.tx_wait();
        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(RegistryState {
                    peripheral,
                    claimed: HashMap::new(),
                }),
                tx_wait,
            }),
        }
    }

    // 状态只是已占用引脚的集合，锁中毒后仍然一致
    fn lock(&self) -> MutexGuard<'_, RegistryState<P>> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 以独占方式绑定引脚
    ///
    /// # 参数
    /// * `config` - 适配器配置
    /// * `pin` - GPIO 引脚编号
    ///
    /// # 返回
    /// * `Ok(BoundPin)` - 绑定成功，句柄独占该引脚直到释放
    /// * `Err(BindError)` - 配置无效、引脚无效、引脚已被使用或硬件不支持该模式
    pub fn bind(&self, config: &AdapterConfig, pin: PinId) -> Result<BoundPin<P>, BindError> {
        let setup = config.setup()?;
        let mode = setup.mode();

        let token = {
            let mut state = self.lock();
            if !state.peripheral.is_valid_pin(pin) {
                return Err(BindError::InvalidPin(pin));
            }
            if let Some(owner) = state.claimed.get(&pin) {
                log::warn!("引脚 {pin} 已被单元 {owner} 使用");
                return Err(BindError::PinBusy(pin));
            }
            let token = state.peripheral.claim(pin, &setup).map_err(|e| {
                log::error!("引脚 {pin} 配置为 {mode} 失败: {e}");
                BindError::from_platform(e, pin, mode)
            })?;
            state.claimed.insert(pin, config.uid);
            token
        };

        log::info!("引脚 {pin} 绑定为 {mode} (uid {})", config.uid);
        Ok(BoundPin::new(self.clone(), token, setup, config.clone()))
    }

    /// 释放句柄持有的引脚，重复释放无副作用
    pub fn release(&self, bound: &mut BoundPin<P>) {
        bound.release();
    }

    /// 在不放弃所有权的前提下改变已绑定引脚的用途
    ///
    /// 失败时引脚恢复为原来的用途
    pub fn reconfigure(
        &self,
        bound: &mut BoundPin<P>,
        config: AdapterConfig,
    ) -> Result<(), BindError> {
        bound.reconfigure(config)
    }

    pub fn is_bound(&self, pin: PinId) -> bool {
        self.lock().claimed.contains_key(&pin)
    }

    /// 已绑定的引脚（升序）
    pub fn bound_pins(&self) -> Vec<PinId> {
        let mut pins: Vec<PinId> = self.lock().claimed.keys().copied().collect();
        pins.sort_unstable();
        pins
    }

    /// 在锁内访问外设
    ///
    /// # 死锁
    /// 锁不可重入。闭包内不能再调用本注册表，也不能读写或析构任何 [`BoundPin`]
    pub fn with_peripheral<R>(&self, f: impl FnOnce(&mut P) -> R) -> R {
        f(&mut self.lock().peripheral)
    }

    pub fn tx_wait(&self) -> &P::TxWait {
        &self.inner.tx_wait
    }

    pub(crate) fn wait_tx_done(
        &self,
        token: &ClaimToken,
        wait_ms: u64,
    ) -> Result<(), PlatformError> {
        self.inner.tx_wait.wait_tx_done(token, wait_ms)
    }

    /// 按新用途重新配置引脚，占用关系保持不变
    ///
    /// 失败时尝试恢复原用途，并把恢复得到的凭证一起返回
    pub(crate) fn reclaim(
        &self,
        old: ClaimToken,
        old_setup: &PinSetup,
        setup: &PinSetup,
    ) -> Result<ClaimToken, (BindError, Option<ClaimToken>)> {
        let pin = old.pin;
        let mode = setup.mode();
        let mut state = self.lock();
        state.peripheral.release(old);
        match state.peripheral.claim(pin, setup) {
            Ok(token) => {
                log::info!("引脚 {pin} 重新配置为 {mode}");
                Ok(token)
            }
            Err(e) => {
                log::error!("引脚 {pin} 重新配置为 {mode} 失败: {e}");
                let restored = match state.peripheral.claim(pin, old_setup) {
                    Ok(token) => Some(token),
                    Err(e) => {
                        log::error!("引脚 {pin} 恢复为 {} 失败: {e}", old_setup.mode());
                        state.claimed.remove(&pin);
                        None
                    }
                };
                Err((BindError::from_platform(e, pin, mode), restored))
            }
        }
    }

    pub(crate) fn release_token(&self, token: ClaimToken) {
        let pin = token.pin;
        let mut state = self.lock();
        state.claimed.remove(&pin);
        state.peripheral.release(token);
        log::info!("引脚 {pin} 已释放");
    }
}
