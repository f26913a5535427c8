//! 外设层接口
//!
//! 引脚注册表通过 [`Peripheral`] 访问真实硬件或模拟外设

pub mod sim;

#[cfg(target_os = "espidf")]
pub mod esp;

use thiserror::Error;

use crate::config::board::BoardProfile;
use crate::config::pins::PinId;
use crate::gpio::adapter_config::PinSetup;
use crate::gpio::mode::PinMode;
use crate::gpio::rmt::RmtItem;

/// 外设层错误类型
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlatformError {
    #[error("无效的引脚编号: {0}")]
    InvalidPin(PinId),

    #[error("引脚 {pin} 不支持模式 {mode}")]
    UnsupportedMode { pin: PinId, mode: PinMode },

    #[error("没有可用的 RMT 通道")]
    NoRmtChannel,

    #[error("引脚 {0} 未配置")]
    NotConfigured(PinId),

    #[error("参数无效: {0}")]
    InvalidArgument(String),

    #[error("等待超时")]
    Timeout,

    #[error("ESP-IDF 错误: {0}")]
    Esp(i32),
}

/// 外设占用凭证
///
/// 由 [`Peripheral::claim`] 返回，释放时交还
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimToken {
    pub pin: PinId,
    pub mode: PinMode,
    pub tx_channel: Option<u8>,
    pub rx_channel: Option<u8>,
}

impl ClaimToken {
    pub fn gpio(pin: PinId, mode: PinMode) -> Self {
        Self {
            pin,
            mode,
            tx_channel: None,
            rx_channel: None,
        }
    }
}

/// 等待 RMT 发送完成
///
/// 在注册表锁之外调用，等待期间其他引脚的绑定和读写不受影响
pub trait RmtTxWait: Send + Sync {
    /// `wait_ms` 为 0 时立即返回
    fn wait_tx_done(&self, token: &ClaimToken, wait_ms: u64) -> Result<(), PlatformError>;
}

/// 外设层
///
/// 引脚所有权由注册表保证，实现方只负责把引脚配置到硬件上
pub trait Peripheral {
    type TxWait: RmtTxWait;

    /// 注册表创建时取得一次，之后脱离外设单独使用
    fn tx_wait(&self) -> Self::TxWait;

    fn is_valid_pin(&self, pin: PinId) -> bool;

    /// 按用途配置引脚，必要时分配 RMT 通道
    fn claim(&mut self, pin: PinId, setup: &PinSetup) -> Result<ClaimToken, PlatformError>;

    /// 恢复引脚并归还 RMT 通道
    fn release(&mut self, token: ClaimToken);

    fn write_digital(&mut self, pin: PinId, high: bool) -> Result<(), PlatformError>;

    fn read_digital(&mut self, pin: PinId) -> Result<bool, PlatformError>;

    fn write_analog(&mut self, pin: PinId, value: u16) -> Result<(), PlatformError>;

    fn read_analog(&mut self, pin: PinId) -> Result<u16, PlatformError>;

    /// 单调递增的微秒计数
    fn now_us(&mut self) -> u64;

    /// 开始发送一组 RMT 符号，不等待发送完成
    fn rmt_transmit(&mut self, token: &ClaimToken, items: &[RmtItem]) -> Result<(), PlatformError>;

    /// 取出一帧已接收的 RMT 符号
    fn rmt_receive(&mut self, token: &ClaimToken) -> Result<Option<Vec<RmtItem>>, PlatformError>;
}

/// 输出 RMT 通道的派生设置
pub(crate) fn log_rmt_settings(pin: PinId, setup: &PinSetup, board: &BoardProfile) {
    let apb = board.apb_freq_hz;
    let words = board.rmt_words_per_channel;
    if let Some(tx) = setup.tx() {
        log::debug!(
            "引脚 {pin} RMT 发送: 分频 {} 分辨率 {}Hz 内存 {} 符号 结束电平 {} 循环 {}",
            tx.clk_div(apb),
            tx.resolution_hz(apb),
            tx.mem_block_symbols(words),
            tx.eot_level(),
            tx.transmit_loop_count()
        );
    }
    if let Some(rx) = setup.rx() {
        log::debug!(
            "引脚 {pin} RMT 接收: 分频 {} 分辨率 {}Hz 内存 {} 符号 范围 {}..{}ns 缓冲 {} 字节",
            rx.clk_div(apb),
            rx.resolution_hz(apb),
            rx.mem_block_symbols(words),
            rx.signal_range_min_ns(),
            rx.signal_range_max_ns(),
            rx.aligned_buffer_size()
        );
    }
}
