//! 模拟外设
//!
//! 在主机上运行单元驱动和测试时代替真实硬件。
//! 时钟是虚拟的：每次调用 `now_us` 前进固定的微秒数

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use super::{ClaimToken, Peripheral, PlatformError, RmtTxWait};
use crate::config::board::BoardProfile;
use crate::config::pins::PinId;
use crate::gpio::adapter_config::PinSetup;
use crate::gpio::mode::{Direction, Electrical, PinMode};
use crate::gpio::rmt::{RmtChannels, RmtItem};
use crate::utils::circular_queue::CircularQueue;

const ADC_MAX: u16 = 0x0FFF;

/// 外部施加到引脚上的信号
#[derive(Debug, Clone)]
enum ExternalSignal {
    Level(bool),
    /// (电平, 持续微秒)，结束后保持最后一段的电平
    Waveform { start_us: u64, segments: Vec<(bool, u64)> },
}

impl ExternalSignal {
    fn level_at(&self, now_us: u64) -> Option<bool> {
        match self {
            ExternalSignal::Level(level) => Some(*level),
            ExternalSignal::Waveform { start_us, segments } => {
                let mut elapsed = now_us.saturating_sub(*start_us);
                for &(level, duration) in segments {
                    if elapsed < duration {
                        return Some(level);
                    }
                    elapsed -= duration;
                }
                segments.last().map(|&(level, _)| level)
            }
        }
    }
}

#[derive(Debug, Default)]
struct WaitLog {
    /// 每次发送的等待时长，按引脚记录
    waits: Mutex<HashMap<PinId, Vec<u64>>>,
    active: AtomicUsize,
}

/// 模拟的发送完成等待
///
/// 默认立即返回；阻塞模式下按 `wait_ms` 真实休眠
#[derive(Debug, Clone, Default)]
pub struct SimTxWait {
    log: Arc<WaitLog>,
    blocking: bool,
}

impl SimTxWait {
    /// 是否有线程正在等待发送完成
    pub fn in_progress(&self) -> bool {
        self.log.active.load(Ordering::SeqCst) > 0
    }

    fn waits(&self, pin: PinId) -> Vec<u64> {
        let waits = self.log.waits.lock().unwrap_or_else(PoisonError::into_inner);
        waits.get(&pin).cloned().unwrap_or_default()
    }
}

impl RmtTxWait for SimTxWait {
    fn wait_tx_done(&self, token: &ClaimToken, wait_ms: u64) -> Result<(), PlatformError> {
        if token.tx_channel.is_none() {
            return Err(PlatformError::NotConfigured(token.pin));
        }
        self.log
            .waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(token.pin)
            .or_default()
            .push(wait_ms);
        if self.blocking && wait_ms > 0 {
            self.log.active.fetch_add(1, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(wait_ms));
            self.log.active.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct SimPin {
    mode: PinMode,
    electrical: Option<Electrical>,
    driven: bool,
    dac: Option<u8>,
    rx_frames: Option<CircularQueue<Vec<RmtItem>>>,
}

/// 模拟外设
#[derive(Debug)]
pub struct SimulatedPeripheral {
    board: BoardProfile,
    channels: RmtChannels,
    pins: HashMap<PinId, SimPin>,
    external: HashMap<PinId, ExternalSignal>,
    analog_in: HashMap<PinId, u16>,
    tx_log: HashMap<PinId, Vec<Vec<RmtItem>>>,
    tx_wait: SimTxWait,
    clock_us: u64,
    tick_us: u64,
}

impl SimulatedPeripheral {
    pub fn new(board: BoardProfile) -> Self {
        Self {
            board,
            channels: RmtChannels::new(board.rmt),
            pins: HashMap::new(),
            external: HashMap::new(),
            analog_in: HashMap::new(),
            tx_log: HashMap::new(),
            tx_wait: SimTxWait::default(),
            clock_us: 0,
            tick_us: 1,
        }
    }

    /// 每次读取时钟前进的微秒数，至少为 1
    pub fn with_tick_us(mut self, tick_us: u64) -> Self {
        self.tick_us = tick_us.max(1);
        self
    }

    /// 等待发送完成时按请求的时长真实休眠
    pub fn with_blocking_waits(mut self) -> Self {
        self.tx_wait.blocking = true;
        self
    }

    pub fn board(&self) -> &BoardProfile {
        &self.board
    }

    pub fn is_claimed(&self, pin: PinId) -> bool {
        self.pins.contains_key(&pin)
    }

    pub fn mode_of(&self, pin: PinId) -> Option<PinMode> {
        self.pins.get(&pin).map(|p| p.mode)
    }

    /// 引脚当前输出的电平
    pub fn driven_level(&self, pin: PinId) -> Option<bool> {
        self.pins.get(&pin).map(|p| p.driven)
    }

    pub fn dac_output(&self, pin: PinId) -> Option<u8> {
        self.pins.get(&pin).and_then(|p| p.dac)
    }

    pub fn set_input_level(&mut self, pin: PinId, high: bool) {
        self.external.insert(pin, ExternalSignal::Level(high));
    }

    /// 从当前时刻开始施加一段波形
    pub fn set_input_waveform(&mut self, pin: PinId, segments: &[(bool, u64)]) {
        self.external.insert(
            pin,
            ExternalSignal::Waveform {
                start_us: self.clock_us,
                segments: segments.to_vec(),
            },
        );
    }

    pub fn clear_input(&mut self, pin: PinId) {
        self.external.remove(&pin);
    }

    pub fn set_analog_input(&mut self, pin: PinId, raw: u16) {
        self.analog_in.insert(pin, raw & ADC_MAX);
    }

    /// 已发送的 RMT 帧（引脚释放后仍保留）
    pub fn transmitted(&self, pin: PinId) -> &[Vec<RmtItem>] {
        self.tx_log.get(&pin).map(Vec::as_slice).unwrap_or(&[])
    }

    /// 每次发送后请求的等待时长 (ms)
    pub fn tx_waits(&self, pin: PinId) -> Vec<u64> {
        self.tx_wait.waits(pin)
    }

    /// 模拟接收到一帧 RMT 数据
    pub fn inject_rmt_frame(
        &mut self,
        pin: PinId,
        frame: Vec<RmtItem>,
    ) -> Result<(), PlatformError> {
        let queue = self
            .pins
            .get_mut(&pin)
            .and_then(|p| p.rx_frames.as_mut())
            .ok_or(PlatformError::NotConfigured(pin))?;
        if queue.push_overwrite(frame).is_some() {
            log::warn!("引脚 {pin} 接收缓冲区已满，丢弃最旧的一帧");
        }
        Ok(())
    }

    pub fn free_tx_channels(&mut self) -> usize {
        self.channels.tx().available()
    }

    pub fn free_rx_channels(&mut self) -> usize {
        self.channels.rx().available()
    }

    fn claim_rmt(&mut self, pin: PinId, setup: &PinSetup) -> Result<ClaimToken, PlatformError> {
        let mode = setup.mode();
        if setup.tx().is_some() && self.board.is_input_only(pin) {
            return Err(PlatformError::UnsupportedMode { pin, mode });
        }

        let tx_channel = match setup.tx() {
            Some(_) => Some(self.channels.tx().acquire().ok_or(PlatformError::NoRmtChannel)?),
            None => None,
        };
        let rx_channel = match setup.rx() {
            Some(_) => match self.channels.rx().acquire() {
                Some(ch) => Some(ch),
                None => {
                    // 回滚已分配的发送通道
                    if let Some(ch) = tx_channel {
                        self.channels.tx().release(ch);
                    }
                    return Err(PlatformError::NoRmtChannel);
                }
            },
            None => None,
        };

        super::log_rmt_settings(pin, setup, &self.board);

        let idle = setup.tx().map(|tx| tx.eot_level()).unwrap_or(false);
        self.pins.insert(
            pin,
            SimPin {
                mode,
                electrical: None,
                driven: idle,
                dac: None,
                rx_frames: setup.rx().map(|rx| CircularQueue::with_capacity(rx.frame_capacity())),
            },
        );
        Ok(ClaimToken {
            pin,
            mode,
            tx_channel,
            rx_channel,
        })
    }

    fn input_level(&self, pin: PinId, electrical: Option<&Electrical>) -> bool {
        self.external
            .get(&pin)
            .and_then(|s| s.level_at(self.clock_us))
            .unwrap_or_else(|| electrical.map(Electrical::idle_level).unwrap_or(false))
    }
}

impl Peripheral for SimulatedPeripheral {
    type TxWait = SimTxWait;

    fn tx_wait(&self) -> SimTxWait {
        self.tx_wait.clone()
    }

    fn is_valid_pin(&self, pin: PinId) -> bool {
        self.board.is_valid_pin(pin)
    }

    fn claim(&mut self, pin: PinId, setup: &PinSetup) -> Result<ClaimToken, PlatformError> {
        if !self.board.is_valid_pin(pin) {
            return Err(PlatformError::InvalidPin(pin));
        }
        let PinSetup::Gpio { mode, config } = setup else {
            return self.claim_rmt(pin, setup);
        };
        let mode = *mode;
        let electrical = Electrical::resolve(mode, config)
            .ok_or(PlatformError::UnsupportedMode { pin, mode })?;

        let unsupported = match electrical.direction {
            Direction::Output | Direction::OutputOpenDrain => self.board.is_input_only(pin),
            Direction::Disabled => {
                self.board.adc_channel(pin).is_none() && !self.board.has_dac(pin)
            }
            Direction::Input => false,
        };
        if unsupported {
            return Err(PlatformError::UnsupportedMode { pin, mode });
        }

        // 开漏输出默认释放（高阻）
        let driven = electrical.direction == Direction::OutputOpenDrain;
        self.pins.insert(
            pin,
            SimPin {
                mode,
                electrical: Some(electrical),
                driven,
                dac: None,
                rx_frames: None,
            },
        );
        Ok(ClaimToken::gpio(pin, mode))
    }

    fn release(&mut self, token: ClaimToken) {
        if let Some(ch) = token.tx_channel {
            self.channels.tx().release(ch);
        }
        if let Some(ch) = token.rx_channel {
            self.channels.rx().release(ch);
        }
        self.pins.remove(&token.pin);
    }

    fn write_digital(&mut self, pin: PinId, high: bool) -> Result<(), PlatformError> {
        let p = self.pins.get_mut(&pin).ok_or(PlatformError::NotConfigured(pin))?;
        p.driven = high;
        Ok(())
    }

    fn read_digital(&mut self, pin: PinId) -> Result<bool, PlatformError> {
        let p = self.pins.get(&pin).ok_or(PlatformError::NotConfigured(pin))?;
        let level = match p.electrical.map(|e| e.direction) {
            Some(Direction::Output) => p.driven,
            // 开漏输出低时读到低，否则由外部或上拉决定
            Some(Direction::OutputOpenDrain) if !p.driven => false,
            _ => self.input_level(pin, p.electrical.as_ref()),
        };
        Ok(level)
    }

    fn write_analog(&mut self, pin: PinId, value: u16) -> Result<(), PlatformError> {
        if !self.board.has_dac(pin) {
            return Err(PlatformError::InvalidArgument(format!("引脚 {pin} 没有 DAC")));
        }
        let p = self.pins.get_mut(&pin).ok_or(PlatformError::NotConfigured(pin))?;
        p.dac = Some((value & 0xFF) as u8);
        Ok(())
    }

    fn read_analog(&mut self, pin: PinId) -> Result<u16, PlatformError> {
        if !self.pins.contains_key(&pin) {
            return Err(PlatformError::NotConfigured(pin));
        }
        if self.board.adc_channel(pin).is_none() {
            return Err(PlatformError::InvalidArgument(format!("引脚 {pin} 没有可用的 ADC 通道")));
        }
        Ok(self.analog_in.get(&pin).copied().unwrap_or(0))
    }

    fn now_us(&mut self) -> u64 {
        self.clock_us += self.tick_us;
        self.clock_us
    }

    fn rmt_transmit(&mut self, token: &ClaimToken, items: &[RmtItem]) -> Result<(), PlatformError> {
        if token.tx_channel.is_none() {
            return Err(PlatformError::NotConfigured(token.pin));
        }
        let p = self.pins.get_mut(&token.pin).ok_or(PlatformError::NotConfigured(token.pin))?;
        if let Some(last) = items.last() {
            p.driven = last.level1();
        }
        self.tx_log.entry(token.pin).or_default().push(items.to_vec());
        Ok(())
    }

    fn rmt_receive(&mut self, token: &ClaimToken) -> Result<Option<Vec<RmtItem>>, PlatformError> {
        if token.rx_channel.is_none() {
            return Err(PlatformError::NotConfigured(token.pin));
        }
        let queue = self
            .pins
            .get_mut(&token.pin)
            .and_then(|p| p.rx_frames.as_mut())
            .ok_or(PlatformError::NotConfigured(token.pin))?;
        Ok(queue.pop())
    }
}
