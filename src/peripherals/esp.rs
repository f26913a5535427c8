//! ESP-IDF 外设
//!
//! 直接调用 esp-idf-sys 的 GPIO、ADC oneshot、DAC 和旧版 RMT 驱动

use std::collections::HashMap;

use esp_idf_svc::hal::delay::TickType;
use esp_idf_sys::{self as sys, esp, EspError};

use super::{ClaimToken, Peripheral, PlatformError, RmtTxWait};
use crate::config::board::{AdcChannel, BoardProfile};
use crate::config::pins::PinId;
use crate::gpio::adapter_config::PinSetup;
use crate::gpio::mode::{DigitalConfig, Direction, DriveStrength, Electrical, PinMode};
use crate::gpio::rmt::{RmtChannels, RmtItem, RmtRxConfig, RmtTxConfig};

impl From<EspError> for PlatformError {
    fn from(e: EspError) -> Self {
        if e.code() == sys::ESP_ERR_TIMEOUT {
            PlatformError::Timeout
        } else {
            PlatformError::Esp(e.code())
        }
    }
}

fn drive_capability(drive: DriveStrength) -> sys::gpio_drive_cap_t {
    match drive {
        DriveStrength::Weakest => sys::gpio_drive_cap_t_GPIO_DRIVE_CAP_0,
        DriveStrength::Weak => sys::gpio_drive_cap_t_GPIO_DRIVE_CAP_1,
        DriveStrength::Medium => sys::gpio_drive_cap_t_GPIO_DRIVE_CAP_2,
        DriveStrength::Strongest => sys::gpio_drive_cap_t_GPIO_DRIVE_CAP_3,
    }
}

/// 等待旧版 RMT 驱动发送完成
///
/// `rmt_wait_tx_done` 按通道加锁，可以在注册表锁之外调用
#[derive(Debug, Clone, Copy, Default)]
pub struct EspTxWait;

impl RmtTxWait for EspTxWait {
    fn wait_tx_done(&self, token: &ClaimToken, wait_ms: u64) -> Result<(), PlatformError> {
        if wait_ms == 0 {
            return Ok(());
        }
        let ch = token.tx_channel.ok_or(PlatformError::NotConfigured(token.pin))?;
        let ticks = TickType::new_millis(wait_ms).ticks();
        let channel = sys::rmt_channel_t::from(ch);
        esp!(unsafe { sys::rmt_wait_tx_done(channel, ticks) }).map_err(|e| {
            log::error!("等待 RMT 通道 {ch} 发送完成失败: {e}");
            PlatformError::from(e)
        })
    }
}

#[derive(Debug)]
struct EspPin {
    analog: Option<AdcChannel>,
}

/// ESP-IDF 外设
///
/// 每个芯片只应创建一个实例，并交给唯一的 [`PinRegistry`](crate::config::PinRegistry)
#[derive(Debug)]
pub struct EspPeripheral {
    board: BoardProfile,
    channels: RmtChannels,
    pins: HashMap<PinId, EspPin>,
}

impl EspPeripheral {
    pub fn new(board: BoardProfile) -> Self {
        Self {
            board,
            channels: RmtChannels::new(board.rmt),
            pins: HashMap::new(),
        }
    }

    fn configure_digital(
        &self,
        pin: PinId,
        electrical: &Electrical,
        config: &DigitalConfig,
    ) -> Result<(), EspError> {
        let mode = match electrical.direction {
            Direction::Disabled => sys::gpio_mode_t_GPIO_MODE_DISABLE,
            Direction::Input => sys::gpio_mode_t_GPIO_MODE_INPUT,
            // 保留输入以便读回输出电平
            Direction::Output => sys::gpio_mode_t_GPIO_MODE_INPUT_OUTPUT,
            Direction::OutputOpenDrain => sys::gpio_mode_t_GPIO_MODE_INPUT_OUTPUT_OD,
        };
        let cfg = sys::gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode,
            pull_up_en: u32::from(electrical.pull_up),
            pull_down_en: u32::from(electrical.pull_down),
            intr_type: sys::gpio_int_type_t_GPIO_INTR_DISABLE,
            ..Default::default()
        };
        let gpio = i32::from(pin);
        esp!(unsafe { sys::gpio_config(&cfg) })?;
        if electrical.direction == Direction::OutputOpenDrain {
            // 开漏默认释放
            esp!(unsafe { sys::gpio_set_level(gpio, 1) })?;
        }
        if matches!(electrical.direction, Direction::Output | Direction::OutputOpenDrain) {
            let drive = drive_capability(config.drive);
            esp!(unsafe { sys::gpio_set_drive_capability(gpio, drive) })?;
        }
        Ok(())
    }

    fn install_tx(&self, pin: PinId, hw: u8, tx: &RmtTxConfig) -> Result<(), EspError> {
        let mut cfg = sys::rmt_config_t {
            rmt_mode: sys::rmt_mode_t_RMT_MODE_TX,
            channel: sys::rmt_channel_t::from(hw),
            gpio_num: i32::from(pin),
            clk_div: tx.clk_div(self.board.apb_freq_hz),
            mem_block_num: tx.mem_blocks.max(1),
            flags: 0,
            ..Default::default()
        };
        cfg.__bindgen_anon_1.tx_config = sys::rmt_tx_config_t {
            carrier_en: false,
            idle_output_en: tx.idle_output,
            idle_level: if tx.idle_level_high {
                sys::rmt_idle_level_t_RMT_IDLE_LEVEL_HIGH
            } else {
                sys::rmt_idle_level_t_RMT_IDLE_LEVEL_LOW
            },
            loop_en: tx.loop_enabled,
            ..Default::default()
        };
        esp!(unsafe { sys::rmt_config(&cfg) })?;
        esp!(unsafe { sys::rmt_driver_install(cfg.channel, 0, 0) })?;
        if tx.invert_signal {
            log::warn!("RMT 通道 {hw} 不支持反相输出，已忽略");
        }
        Ok(())
    }

    fn install_rx(&self, pin: PinId, hw: u8, rx: &RmtRxConfig) -> Result<(), EspError> {
        let mut cfg = sys::rmt_config_t {
            rmt_mode: sys::rmt_mode_t_RMT_MODE_RX,
            channel: sys::rmt_channel_t::from(hw),
            gpio_num: i32::from(pin),
            clk_div: rx.clk_div(self.board.apb_freq_hz),
            mem_block_num: rx.mem_blocks.max(1),
            flags: 0,
            ..Default::default()
        };
        cfg.__bindgen_anon_1.rx_config = sys::rmt_rx_config_t {
            filter_en: rx.filter_enabled,
            filter_ticks_thresh: rx.filter_ticks_threshold,
            idle_threshold: rx.idle_ticks_threshold,
            ..Default::default()
        };
        let buffer = rx.aligned_buffer_size();
        esp!(unsafe { sys::rmt_config(&cfg) })?;
        esp!(unsafe { sys::rmt_driver_install(cfg.channel, buffer, 0) })?;
        esp!(unsafe { sys::rmt_rx_start(cfg.channel, true) })?;
        Ok(())
    }

    fn uninstall(hw: u8, tx: bool) {
        let channel = sys::rmt_channel_t::from(hw);
        let stopped = if tx {
            esp!(unsafe { sys::rmt_tx_stop(channel) })
        } else {
            esp!(unsafe { sys::rmt_rx_stop(channel) })
        };
        if let Err(e) = stopped {
            log::warn!("停止 RMT 通道 {hw} 失败: {e}");
        }
        if let Err(e) = esp!(unsafe { sys::rmt_driver_uninstall(channel) }) {
            log::error!("卸载 RMT 通道 {hw} 失败: {e}");
        }
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
                    if let Some(ch) = tx_channel {
                        self.channels.tx().release(ch);
                    }
                    return Err(PlatformError::NoRmtChannel);
                }
            },
            None => None,
        };
        let token = ClaimToken {
            pin,
            mode,
            tx_channel,
            rx_channel,
        };

        super::log_rmt_settings(pin, setup, &self.board);
        let installed = (|| {
            if let (Some(tx), Some(ch)) = (setup.tx(), tx_channel) {
                self.install_tx(pin, ch, tx)?;
            }
            if let (Some(rx), Some(ch)) = (setup.rx(), rx_channel) {
                self.install_rx(pin, self.channels.rx_hw_channel(ch), rx)?;
            }
            Ok::<(), EspError>(())
        })();
        if let Err(e) = installed {
            log::error!("引脚 {pin} 安装 RMT 驱动失败: {e}");
            self.release(token);
            return Err(e.into());
        }

        self.pins.insert(pin, EspPin { analog: None });
        Ok(token)
    }

    fn claim_analog(&mut self, pin: PinId, mode: PinMode) -> Result<ClaimToken, PlatformError> {
        if let Some(adc) = self.board.adc_channel(pin) {
            self.pins.insert(pin, EspPin { analog: Some(adc) });
            return Ok(ClaimToken::gpio(pin, mode));
        }
        if self.board.has_dac(pin) {
            self.pins.insert(pin, EspPin { analog: None });
            return Ok(ClaimToken::gpio(pin, mode));
        }
        Err(PlatformError::UnsupportedMode { pin, mode })
    }

    fn pin(&self, pin: PinId) -> Result<&EspPin, PlatformError> {
        self.pins.get(&pin).ok_or(PlatformError::NotConfigured(pin))
    }

    #[cfg(esp32)]
    fn dac_channel(pin: PinId) -> Option<sys::dac_channel_t> {
        match pin {
            25 => Some(sys::dac_channel_t_DAC_CHANNEL_1),
            26 => Some(sys::dac_channel_t_DAC_CHANNEL_2),
            _ => None,
        }
    }

    #[cfg(esp32)]
    fn disable_dac(pin: PinId) {
        if let Some(ch) = Self::dac_channel(pin) {
            unsafe { sys::dac_output_disable(ch) };
        }
    }

    #[cfg(not(esp32))]
    fn disable_dac(_pin: PinId) {}
}

impl Peripheral for EspPeripheral {
    type TxWait = EspTxWait;

    fn tx_wait(&self) -> EspTxWait {
        EspTxWait
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

        if electrical.direction == Direction::Disabled {
            return self.claim_analog(pin, mode);
        }
        if electrical.direction != Direction::Input && self.board.is_input_only(pin) {
            return Err(PlatformError::UnsupportedMode { pin, mode });
        }
        self.configure_digital(pin, &electrical, config).map_err(|e| {
            log::error!("配置 GPIO {pin} 失败: {e}");
            PlatformError::from(e)
        })?;
        self.pins.insert(pin, EspPin { analog: None });
        Ok(ClaimToken::gpio(pin, mode))
    }

    fn release(&mut self, token: ClaimToken) {
        if let Some(ch) = token.tx_channel {
            Self::uninstall(ch, true);
            self.channels.tx().release(ch);
        }
        if let Some(ch) = token.rx_channel {
            Self::uninstall(self.channels.rx_hw_channel(ch), false);
            self.channels.rx().release(ch);
        }
        if token.mode == PinMode::Analog {
            Self::disable_dac(token.pin);
        }
        self.pins.remove(&token.pin);
        if let Err(e) = esp!(unsafe { sys::gpio_reset_pin(i32::from(token.pin)) }) {
            log::warn!("复位 GPIO {} 失败: {e}", token.pin);
        }
    }

    fn write_digital(&mut self, pin: PinId, high: bool) -> Result<(), PlatformError> {
        self.pin(pin)?;
        esp!(unsafe { sys::gpio_set_level(i32::from(pin), u32::from(high)) })?;
        Ok(())
    }

    fn read_digital(&mut self, pin: PinId) -> Result<bool, PlatformError> {
        self.pin(pin)?;
        Ok(unsafe { sys::gpio_get_level(i32::from(pin)) } != 0)
    }

    #[cfg(esp32)]
    fn write_analog(&mut self, pin: PinId, value: u16) -> Result<(), PlatformError> {
        self.pin(pin)?;
        let ch = Self::dac_channel(pin)
            .ok_or_else(|| PlatformError::InvalidArgument(format!("引脚 {pin} 没有 DAC")))?;
        esp!(unsafe { sys::dac_output_enable(ch) })?;
        esp!(unsafe { sys::dac_output_voltage(ch, (value & 0xFF) as u8) })?;
        Ok(())
    }

    #[cfg(not(esp32))]
    fn write_analog(&mut self, pin: PinId, _value: u16) -> Result<(), PlatformError> {
        self.pin(pin)?;
        Err(PlatformError::InvalidArgument(format!("引脚 {pin} 没有 DAC")))
    }

    fn read_analog(&mut self, pin: PinId) -> Result<u16, PlatformError> {
        let adc = self.pin(pin)?.analog.ok_or_else(|| {
            PlatformError::InvalidArgument(format!("引脚 {pin} 没有可用的 ADC 通道"))
        })?;

        let unit_cfg = sys::adc_oneshot_unit_init_cfg_t {
            unit_id: if adc.unit == 1 {
                sys::adc_unit_t_ADC_UNIT_1
            } else {
                sys::adc_unit_t_ADC_UNIT_2
            },
            ..Default::default()
        };
        let mut handle: sys::adc_oneshot_unit_handle_t = core::ptr::null_mut();
        esp!(unsafe { sys::adc_oneshot_new_unit(&unit_cfg, &mut handle) })?;

        let chan_cfg = sys::adc_oneshot_chan_cfg_t {
            atten: sys::adc_atten_t_ADC_ATTEN_DB_12,
            bitwidth: sys::adc_bitwidth_t_ADC_BITWIDTH_12,
        };
        let channel = sys::adc_channel_t::from(adc.channel);
        let mut raw: i32 = 0;
        let result = esp!(unsafe { sys::adc_oneshot_config_channel(handle, channel, &chan_cfg) })
            .and_then(|_| esp!(unsafe { sys::adc_oneshot_read(handle, channel, &mut raw) }));
        if let Err(e) = esp!(unsafe { sys::adc_oneshot_del_unit(handle) }) {
            log::warn!("释放 ADC{} 失败: {e}", adc.unit);
        }
        result?;
        Ok(u16::try_from(raw.clamp(0, 0x0FFF)).unwrap_or(0))
    }

    fn now_us(&mut self) -> u64 {
        u64::try_from(unsafe { sys::esp_timer_get_time() }).unwrap_or(0)
    }

    fn rmt_transmit(&mut self, token: &ClaimToken, items: &[RmtItem]) -> Result<(), PlatformError> {
        let ch = token.tx_channel.ok_or(PlatformError::NotConfigured(token.pin))?;
        let channel = sys::rmt_channel_t::from(ch);
        let len = i32::try_from(items.len()).map_err(|_| {
            PlatformError::InvalidArgument(format!("{} 个符号过多", items.len()))
        })?;
        // RmtItem 与 rmt_item32_t 布局相同
        let data = items.as_ptr().cast::<sys::rmt_item32_t>();
        esp!(unsafe { sys::rmt_write_items(channel, data, len, false) })?;
        Ok(())
    }

    fn rmt_receive(
        &mut self,
        token: &ClaimToken,
    ) -> Result<Option<Vec<RmtItem>>, PlatformError> {
        let ch = token.rx_channel.ok_or(PlatformError::NotConfigured(token.pin))?;
        let channel = sys::rmt_channel_t::from(self.channels.rx_hw_channel(ch));
        let mut ring: sys::RingbufHandle_t = core::ptr::null_mut();
        esp!(unsafe { sys::rmt_get_ringbuf_handle(channel, &mut ring) })?;

        let mut size: usize = 0;
        let data = unsafe { sys::xRingbufferReceive(ring, &mut size, 0) };
        if data.is_null() {
            return Ok(None);
        }
        let count = size / RmtItem::SIZE;
        let words = unsafe { core::slice::from_raw_parts(data.cast::<u32>(), count) };
        let frame = words.iter().copied().map(RmtItem::from_bits).collect();
        unsafe { sys::vRingbufferReturnItem(ring, data) };
        Ok(Some(frame))
    }
}
