//! RMT 收发配置与符号定义

use core::fmt;

use crate::config::board::RmtLayout;
use crate::utils::calculate::{calculate_rmt_clk_div, calculate_rmt_resolution_hz, quick_align};

/// RMT 发送配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RmtTxConfig {
    /// 期望的 tick 时间 (ns)
    pub tick_ns: u32,
    /// 占用的内存块数
    pub mem_blocks: u8,
    /// 空闲时是否输出固定电平
    pub idle_output: bool,
    pub idle_level_high: bool,
    pub loop_enabled: bool,
    pub loop_count: u32,
    pub with_dma: bool,
    pub invert_signal: bool,
}

impl Default for RmtTxConfig {
    fn default() -> Self {
        Self {
            tick_ns: 100,
            mem_blocks: 1,
            idle_output: true,
            idle_level_high: false,
            loop_enabled: false,
            loop_count: 0,
            with_dma: false,
            invert_signal: false,
        }
    }
}

impl RmtTxConfig {
    pub fn clk_div(&self, apb_freq_hz: u32) -> u8 {
        calculate_rmt_clk_div(apb_freq_hz, self.tick_ns)
    }

    pub fn resolution_hz(&self, apb_freq_hz: u32) -> u32 {
        calculate_rmt_resolution_hz(apb_freq_hz, self.tick_ns)
    }

    /// 至少占用一个通道的内存
    pub fn mem_block_symbols(&self, words_per_channel: usize) -> usize {
        words_per_channel.max(usize::from(self.mem_blocks) * words_per_channel)
    }

    /// 发送结束后的电平
    pub fn eot_level(&self) -> bool {
        self.idle_output && self.idle_level_high
    }

    pub fn transmit_loop_count(&self) -> u32 {
        if self.loop_enabled {
            self.loop_count
        } else {
            0
        }
    }
}

/// RMT 接收配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RmtRxConfig {
    /// 期望的 tick 时间 (ns)
    pub tick_ns: u32,
    pub mem_blocks: u8,
    pub filter_enabled: bool,
    /// 小于该 tick 数的脉冲被滤除
    pub filter_ticks_threshold: u8,
    /// 超过该 tick 数无跳变视为一帧结束
    pub idle_ticks_threshold: u16,
    /// 接收缓冲区大小（字节）
    pub ring_buffer_size: usize,
    pub with_dma: bool,
    pub invert_signal: bool,
}

impl Default for RmtRxConfig {
    fn default() -> Self {
        Self {
            tick_ns: 100,
            mem_blocks: 1,
            filter_enabled: true,
            filter_ticks_threshold: 30,
            idle_ticks_threshold: 300,
            ring_buffer_size: 1024,
            with_dma: false,
            invert_signal: false,
        }
    }
}

impl RmtRxConfig {
    pub fn clk_div(&self, apb_freq_hz: u32) -> u8 {
        calculate_rmt_clk_div(apb_freq_hz, self.tick_ns)
    }

    pub fn resolution_hz(&self, apb_freq_hz: u32) -> u32 {
        calculate_rmt_resolution_hz(apb_freq_hz, self.tick_ns)
    }

    pub fn mem_block_symbols(&self, words_per_channel: usize) -> usize {
        words_per_channel.max(usize::from(self.mem_blocks) * words_per_channel)
    }

    /// 接收的最短脉冲 (ns)，未启用滤波时为 0
    pub fn signal_range_min_ns(&self) -> u32 {
        if self.filter_enabled && self.filter_ticks_threshold != 0 && self.tick_ns != 0 {
            u32::from(self.filter_ticks_threshold) * 10_000 / self.tick_ns
        } else {
            0
        }
    }

    /// 接收的最长脉冲 (ns)，为 0 表示不限制
    pub fn signal_range_max_ns(&self) -> u32 {
        u32::from(self.idle_ticks_threshold).saturating_mul(self.tick_ns)
    }

    /// 按符号大小对齐后的缓冲区字节数
    pub fn aligned_buffer_size(&self) -> usize {
        quick_align(self.ring_buffer_size, RmtItem::SIZE)
    }

    /// 缓冲区可容纳的帧数（每帧至少一个符号）
    pub fn frame_capacity(&self) -> usize {
        (self.aligned_buffer_size() / RmtItem::SIZE).max(1)
    }
}

/// 一个 RMT 符号
///
/// 布局与 `rmt_item32_t` 相同：`duration0:15 | level0:1 | duration1:15 | level1:1`
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RmtItem(u32);

impl RmtItem {
    pub const SIZE: usize = core::mem::size_of::<u32>();
    pub const MAX_DURATION: u16 = 0x7FFF;

    /// 超过 15 位的时长会被截断为最大值
    pub const fn new(duration0: u16, level0: bool, duration1: u16, level1: bool) -> Self {
        let d0 = if duration0 > Self::MAX_DURATION { Self::MAX_DURATION } else { duration0 };
        let d1 = if duration1 > Self::MAX_DURATION { Self::MAX_DURATION } else { duration1 };
        Self((d0 as u32) | ((level0 as u32) << 15) | ((d1 as u32) << 16) | ((level1 as u32) << 31))
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn duration0(&self) -> u16 {
        (self.0 & 0x7FFF) as u16
    }

    pub const fn level0(&self) -> bool {
        self.0 & (1 << 15) != 0
    }

    pub const fn duration1(&self) -> u16 {
        ((self.0 >> 16) & 0x7FFF) as u16
    }

    pub const fn level1(&self) -> bool {
        self.0 & (1 << 31) != 0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// 两段时长之和（tick）
    pub const fn total_ticks(&self) -> u32 {
        self.duration0() as u32 + self.duration1() as u32
    }
}

impl fmt::Display for RmtItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RmtItem {{ {}:{}, {}:{} }}",
            u8::from(self.level0()),
            self.duration0(),
            u8::from(self.level1()),
            self.duration1()
        )
    }
}

/// RMT 通道池
///
/// 按位记录已占用的通道，总是分配编号最小的空闲通道
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPool {
    used: u32,
    count: u8,
}

impl ChannelPool {
    pub const fn new(count: u8) -> Self {
        // 位图最多记录 32 个通道
        let count = if count > 32 { 32 } else { count };
        Self { used: 0, count }
    }

    pub fn acquire(&mut self) -> Option<u8> {
        let ch = (0..self.count).find(|&ch| self.used & (1u32 << ch) == 0)?;
        self.used |= 1u32 << ch;
        Some(ch)
    }

    pub fn release(&mut self, ch: u8) {
        if ch < self.count {
            self.used &= !(1u32 << ch);
        }
    }

    pub fn available(&self) -> usize {
        usize::from(self.count) - self.used.count_ones() as usize
    }

    pub fn is_used(&self, ch: u8) -> bool {
        ch < self.count && self.used & (1u32 << ch) != 0
    }
}

/// 按芯片布局组织的 RMT 通道
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RmtChannels {
    Shared(ChannelPool),
    Split { tx: ChannelPool, rx: ChannelPool },
}

impl RmtChannels {
    pub const fn new(layout: RmtLayout) -> Self {
        match layout {
            RmtLayout::Shared(n) => RmtChannels::Shared(ChannelPool::new(n)),
            RmtLayout::Split { tx, rx } => RmtChannels::Split {
                tx: ChannelPool::new(tx),
                rx: ChannelPool::new(rx),
            },
        }
    }

    pub fn tx(&mut self) -> &mut ChannelPool {
        match self {
            RmtChannels::Shared(pool) => pool,
            RmtChannels::Split { tx, .. } => tx,
        }
    }

    pub fn rx(&mut self) -> &mut ChannelPool {
        match self {
            RmtChannels::Shared(pool) => pool,
            RmtChannels::Split { rx, .. } => rx,
        }
    }

    /// 接收池中的编号对应的硬件通道号
    ///
    /// 分离布局下接收通道排在发送通道之后
    pub fn rx_hw_channel(&self, ch: u8) -> u8 {
        match self {
            RmtChannels::Shared(_) => ch,
            RmtChannels::Split { tx, .. } => tx.count + ch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_layout() {
        let item = RmtItem::new(4, true, 8, false);
        assert_eq!(item.bits(), 4 | (1 << 15) | (8 << 16));
        assert_eq!(item.duration0(), 4);
        assert!(item.level0());
        assert_eq!(item.duration1(), 8);
        assert!(!item.level1());
        assert_eq!(item.total_ticks(), 12);
        assert_eq!(item.to_string(), "RmtItem { 1:4, 0:8 }");
    }

    #[test]
    fn test_item_duration_saturates() {
        let item = RmtItem::new(u16::MAX, false, 0x8000, true);
        assert_eq!(item.duration0(), RmtItem::MAX_DURATION);
        assert_eq!(item.duration1(), RmtItem::MAX_DURATION);
        assert!(item.level1());
        assert!(!item.level0());
    }

    #[test]
    fn test_tx_derived_settings() {
        let mut tx = RmtTxConfig {
            mem_blocks: 2,
            ..Default::default()
        };
        assert_eq!(tx.mem_block_symbols(48), 96);
        tx.mem_blocks = 0;
        assert_eq!(tx.mem_block_symbols(48), 48);

        assert!(!tx.eot_level());
        tx.idle_level_high = true;
        assert!(tx.eot_level());
        tx.idle_output = false;
        assert!(!tx.eot_level());

        tx.loop_count = 5;
        assert_eq!(tx.transmit_loop_count(), 0);
        tx.loop_enabled = true;
        assert_eq!(tx.transmit_loop_count(), 5);
        assert_eq!(tx.clk_div(80_000_000), 8);
    }

    #[test]
    fn test_rx_signal_range() {
        let mut rx = RmtRxConfig::default();
        assert_eq!(rx.signal_range_min_ns(), 30 * 10_000 / 100);
        assert_eq!(rx.signal_range_max_ns(), 300 * 100);

        rx.filter_enabled = false;
        assert_eq!(rx.signal_range_min_ns(), 0);
        rx.idle_ticks_threshold = 0;
        assert_eq!(rx.signal_range_max_ns(), 0);
    }

    #[test]
    fn test_rx_buffer_capacity() {
        let rx = RmtRxConfig {
            ring_buffer_size: 10,
            ..Default::default()
        };
        assert_eq!(rx.aligned_buffer_size(), 12);
        assert_eq!(rx.frame_capacity(), 3);

        let rx = RmtRxConfig {
            ring_buffer_size: 0,
            ..Default::default()
        };
        assert_eq!(rx.frame_capacity(), 1);
    }

    #[test]
    fn test_channel_pool() {
        let mut pool = ChannelPool::new(2);
        assert_eq!(pool.acquire(), Some(0));
        assert_eq!(pool.acquire(), Some(1));
        assert_eq!(pool.acquire(), None);
        assert_eq!(pool.available(), 0);

        pool.release(0);
        assert!(!pool.is_used(0));
        assert_eq!(pool.acquire(), Some(0));

        // 越界释放被忽略
        pool.release(9);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_channel_layouts() {
        let mut shared = RmtChannels::new(RmtLayout::Shared(8));
        assert_eq!(shared.tx().acquire(), Some(0));
        assert_eq!(shared.rx().acquire(), Some(1));
        assert_eq!(shared.rx_hw_channel(1), 1);

        let mut split = RmtChannels::new(RmtLayout::Split { tx: 4, rx: 4 });
        assert_eq!(split.tx().acquire(), Some(0));
        assert_eq!(split.rx().acquire(), Some(0));
        assert_eq!(split.rx_hw_channel(0), 4);
        assert_eq!(split.tx().available(), 3);
    }
}
