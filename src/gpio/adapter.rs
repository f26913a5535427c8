//! 单元 GPIO 适配器
//!
//! 按一份 [`AdapterConfig`] 绑定单元的接收 / 发送引脚

use super::adapter_config::{AdapterConfig, RmtDirection};
use super::bound::{BoundPin, PinError};
use super::mode::PinMode;
use super::rmt::RmtItem;
use crate::config::manager::{BindError, PinRegistry};
use crate::config::pins::{PinId, UnitPins};
use crate::peripherals::Peripheral;

/// 单元引脚适配器
pub struct GpioAdapter<P: Peripheral> {
    registry: PinRegistry<P>,
    pins: UnitPins,
    config: AdapterConfig,
    rx: Option<BoundPin<P>>,
    tx: Option<BoundPin<P>>,
    /// 同一个句柄同时负责收发（保存在 `tx`）
    shared: bool,
}

// 把双向 RMT 配置拆成单方向的配置
fn direction_config(config: &AdapterConfig, direction: RmtDirection) -> AdapterConfig {
    let mut cfg = config.clone();
    match direction {
        RmtDirection::Tx => {
            cfg.mode = PinMode::RmtTX;
            cfg.rx = None;
        }
        RmtDirection::Rx => {
            cfg.mode = PinMode::RmtRX;
            cfg.tx = None;
        }
    }
    cfg
}

impl<P: Peripheral> GpioAdapter<P> {
    /// 绑定单元引脚
    ///
    /// # 参数
    /// * `registry` - 引脚注册表
    /// * `pins` - 单元连接的引脚
    /// * `config` - 适配器配置
    ///
    /// # 返回
    /// * `Ok(GpioAdapter)` - 所需引脚全部绑定成功
    /// * `Err(BindError)` - 任一引脚绑定失败，已绑定的引脚会被释放
    pub fn begin(
        registry: &PinRegistry<P>,
        pins: UnitPins,
        config: AdapterConfig,
    ) -> Result<Self, BindError> {
        config.validate()?;

        let (rx, tx, shared) = match config.mode {
            PinMode::RmtTX => (None, Some(registry.bind(&config, pins.tx)?), false),
            PinMode::RmtRX => (Some(registry.bind(&config, pins.rx)?), None, false),
            PinMode::RmtRXTX if !pins.is_single() => {
                let tx = registry.bind(&direction_config(&config, RmtDirection::Tx), pins.tx)?;
                let rx = registry.bind(&direction_config(&config, RmtDirection::Rx), pins.rx)?;
                (Some(rx), Some(tx), false)
            }
            _ if pins.is_single() => (None, Some(registry.bind(&config, pins.tx)?), true),
            _ => {
                let rx = registry.bind(&config, pins.rx)?;
                let tx = registry.bind(&config, pins.tx)?;
                (Some(rx), Some(tx), false)
            }
        };

        log::info!(
            "单元 {} 适配器启动: {} (rx {}, tx {})",
            config.uid,
            config.mode,
            pins.rx,
            pins.tx
        );
        Ok(Self {
            registry: registry.clone(),
            pins,
            config,
            rx,
            tx,
            shared,
        })
    }

    pub fn pins(&self) -> UnitPins {
        self.pins
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn mode(&self) -> PinMode {
        self.config.mode
    }

    /// 负责接收的句柄
    pub fn rx(&self) -> Option<&BoundPin<P>> {
        if self.shared {
            self.tx.as_ref()
        } else {
            self.rx.as_ref()
        }
    }

    /// 负责发送的句柄
    pub fn tx(&self) -> Option<&BoundPin<P>> {
        self.tx.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some() || self.tx.is_some()
    }

    fn missing(&self, pin: PinId, op: &'static str) -> PinError {
        PinError::WrongMode {
            pin,
            mode: self.config.mode,
            op,
        }
    }

    fn rx_mut(&mut self, op: &'static str) -> Result<&mut BoundPin<P>, PinError> {
        let err = self.missing(self.pins.rx, op);
        let slot = if self.shared { &mut self.tx } else { &mut self.rx };
        slot.as_mut().ok_or(err)
    }

    fn tx_mut(&mut self, op: &'static str) -> Result<&mut BoundPin<P>, PinError> {
        let err = self.missing(self.pins.tx, op);
        self.tx.as_mut().ok_or(err)
    }

    // 沿用适配器的电气配置、uid 和属性
    fn pin_config(&self, mode: PinMode) -> AdapterConfig {
        AdapterConfig::gpio(mode, self.config.config)
            .with_uid(self.config.uid)
            .with_attr(self.config.attr)
    }

    fn set_slot_mode(
        registry: &PinRegistry<P>,
        slot: &mut Option<BoundPin<P>>,
        pin: PinId,
        config: AdapterConfig,
    ) -> Result<(), BindError> {
        match slot {
            Some(handle) => handle.reconfigure(config),
            None => {
                *slot = Some(registry.bind(&config, pin)?);
                Ok(())
            }
        }
    }

    /// 切换接收引脚的数字 / 模拟模式
    ///
    /// 引脚尚未绑定时按新模式绑定，已绑定时保持所有权原地切换。
    /// 失败时引脚保持原来的模式
    ///
    /// # 参数
    /// * `mode` - 新的非 RMT 模式
    ///
    /// # 返回
    /// * `Ok(())` - 切换成功
    /// * `Err(BindError)` - RMT 模式返回 `InvalidConfig`，其余同 [`PinRegistry::bind`]
    pub fn pin_mode_rx(&mut self, mode: PinMode) -> Result<(), BindError> {
        let config = self.pin_config(mode);
        let slot = if self.shared { &mut self.tx } else { &mut self.rx };
        Self::set_slot_mode(&self.registry, slot, self.pins.rx, config)
    }

    /// 切换发送引脚的数字 / 模拟模式，规则同 [`Self::pin_mode_rx`]
    pub fn pin_mode_tx(&mut self, mode: PinMode) -> Result<(), BindError> {
        let config = self.pin_config(mode);
        Self::set_slot_mode(&self.registry, &mut self.tx, self.pins.tx, config)
    }

    pub fn write_digital_tx(&mut self, high: bool) -> Result<(), PinError> {
        self.tx_mut("write_digital")?.write_digital(high)
    }

    pub fn write_digital_rx(&mut self, high: bool) -> Result<(), PinError> {
        self.rx_mut("write_digital")?.write_digital(high)
    }

    pub fn read_digital_rx(&mut self) -> Result<bool, PinError> {
        self.rx_mut("read_digital")?.read_digital()
    }

    pub fn read_digital_tx(&mut self) -> Result<bool, PinError> {
        self.tx_mut("read_digital")?.read_digital()
    }

    pub fn write_analog_tx(&mut self, value: u16) -> Result<(), PinError> {
        self.tx_mut("write_analog")?.write_analog(value)
    }

    pub fn write_analog_rx(&mut self, value: u16) -> Result<(), PinError> {
        self.rx_mut("write_analog")?.write_analog(value)
    }

    pub fn read_analog_rx(&mut self) -> Result<u16, PinError> {
        self.rx_mut("read_analog")?.read_analog()
    }

    pub fn read_analog_tx(&mut self) -> Result<u16, PinError> {
        self.tx_mut("read_analog")?.read_analog()
    }

    pub fn pulse_in_rx(&mut self, level: bool, timeout_us: u32) -> Result<u32, PinError> {
        self.rx_mut("pulse_in")?.pulse_in(level, timeout_us)
    }

    pub fn pulse_in_tx(&mut self, level: bool, timeout_us: u32) -> Result<u32, PinError> {
        self.tx_mut("pulse_in")?.pulse_in(level, timeout_us)
    }

    pub fn transmit(&mut self, items: &[RmtItem]) -> Result<(), PinError> {
        self.tx_mut("transmit")?.transmit(items)
    }

    pub fn receive(&mut self) -> Result<Option<Vec<RmtItem>>, PinError> {
        self.rx_mut("receive")?.receive()
    }

    /// 释放所有引脚
    pub fn end(&mut self) {
        if let Some(mut tx) = self.tx.take() {
            tx.release();
        }
        if let Some(mut rx) = self.rx.take() {
            rx.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::board::BoardProfile;
    use crate::config::pins::{PORT_A, PORT_B};
    use crate::gpio::rmt::{RmtRxConfig, RmtTxConfig};
    use crate::peripherals::sim::SimulatedPeripheral;
    use crate::types::Uid;

    fn registry() -> PinRegistry<SimulatedPeripheral> {
        PinRegistry::new(SimulatedPeripheral::new(BoardProfile::ESP32))
    }

    fn rxtx() -> AdapterConfig {
        AdapterConfig::rmt_rxtx(RmtTxConfig::default(), RmtRxConfig::default())
    }

    #[test]
    fn test_rmt_tx_binds_tx_pin_only() {
        let reg = registry();
        let config = AdapterConfig::rmt_tx(RmtTxConfig::default());
        let mut adapter = GpioAdapter::begin(&reg, PORT_B, config).unwrap();
        assert_eq!(reg.bound_pins(), vec![26]);
        assert!(adapter.rx().is_none());
        assert_eq!(
            adapter.receive(),
            Err(PinError::WrongMode {
                pin: 36,
                mode: PinMode::RmtTX,
                op: "receive"
            })
        );
        adapter.transmit(&[RmtItem::new(1, true, 1, false)]).unwrap();
    }

    #[test]
    fn test_rmt_rxtx_split_pins() {
        let reg = registry();
        let adapter = GpioAdapter::begin(&reg, PORT_A, rxtx()).unwrap();
        assert_eq!(reg.bound_pins(), vec![21, 22]);
        assert_eq!(reg.with_peripheral(|p| p.mode_of(21)), Some(PinMode::RmtRX));
        assert_eq!(reg.with_peripheral(|p| p.mode_of(22)), Some(PinMode::RmtTX));
        assert_eq!(adapter.tx().map(|t| t.rmt_channels()), Some((Some(0), None)));
        assert_eq!(adapter.rx().map(|r| r.rmt_channels()), Some((None, Some(1))));
    }

    #[test]
    fn test_rmt_rxtx_single_pin() {
        let reg = registry();
        let mut adapter = GpioAdapter::begin(&reg, UnitPins::single(27), rxtx()).unwrap();
        assert_eq!(reg.bound_pins(), vec![27]);
        assert_eq!(adapter.rx().map(|r| r.mode()), Some(PinMode::RmtRXTX));
        assert_eq!(adapter.receive(), Ok(None));
        adapter.end();
        assert!(!adapter.is_active());
        assert!(reg.bound_pins().is_empty());
    }

    #[test]
    fn test_digital_modes_bind_both_pins() {
        let reg = registry();
        let config = AdapterConfig::new(PinMode::OpenDrain);
        let mut adapter = GpioAdapter::begin(&reg, PORT_A, config).unwrap();
        assert_eq!(reg.bound_pins(), vec![21, 22]);
        adapter.write_digital_tx(false).unwrap();
        assert_eq!(reg.with_peripheral(|p| p.driven_level(22)), Some(false));
        assert_eq!(adapter.read_digital_rx(), Ok(true));

        let config = AdapterConfig::new(PinMode::Input);
        let single = GpioAdapter::begin(&reg, UnitPins::single(5), config).unwrap();
        assert!(single.rx().is_some());
        assert_eq!(reg.bound_pins(), vec![5, 21, 22]);
    }

    #[test]
    fn test_failed_begin_releases_bound_pins() {
        let reg = registry();
        let _busy = reg.bind(&AdapterConfig::new(PinMode::Output), 22).unwrap();
        let result = GpioAdapter::begin(&reg, PORT_A, AdapterConfig::new(PinMode::Input));
        assert_eq!(result.err(), Some(BindError::PinBusy(22)));
        assert_eq!(reg.bound_pins(), vec![22]);
    }

    #[test]
    fn test_failed_rxtx_returns_tx_channel() {
        let reg = PinRegistry::new(SimulatedPeripheral::new(BoardProfile::ESP32C3));
        let rx_only = AdapterConfig::rmt_rx(RmtRxConfig::default());
        let _a = reg.bind(&rx_only, 0).unwrap();
        let _b = reg.bind(&rx_only, 1).unwrap();

        let result = GpioAdapter::begin(&reg, UnitPins::new(2, 3), rxtx());
        assert!(matches!(result, Err(BindError::UnsupportedMode { pin: 2, .. })));
        assert_eq!(reg.bound_pins(), vec![0, 1]);
        assert_eq!(reg.with_peripheral(|p| p.free_tx_channels()), 2);
    }

    #[test]
    fn test_invalid_config_binds_nothing() {
        let reg = registry();
        let mut cfg = rxtx();
        cfg.rx = None;
        assert!(matches!(
            GpioAdapter::begin(&reg, PORT_A, cfg),
            Err(BindError::InvalidConfig(_))
        ));
        assert!(reg.bound_pins().is_empty());
    }

    #[test]
    fn test_pulse_in_through_adapter() {
        let reg = registry();
        let config = AdapterConfig::new(PinMode::Input);
        let mut adapter = GpioAdapter::begin(&reg, PORT_B, config).unwrap();
        reg.with_peripheral(|p| p.set_input_waveform(36, &[(false, 3), (true, 12), (false, 50)]));
        assert_eq!(adapter.pulse_in_rx(true, 1_000), Ok(12));
        reg.with_peripheral(|p| p.set_input_waveform(26, &[(false, 3), (true, 7), (false, 50)]));
        assert_eq!(adapter.pulse_in_tx(true, 1_000), Ok(7));
    }

    #[test]
    fn test_digital_io_on_both_pins() {
        let reg = registry();
        let config = AdapterConfig::new(PinMode::OpenDrain);
        let mut adapter = GpioAdapter::begin(&reg, PORT_A, config).unwrap();
        adapter.write_digital_rx(false).unwrap();
        assert_eq!(reg.with_peripheral(|p| p.driven_level(21)), Some(false));
        assert_eq!(adapter.read_digital_tx(), Ok(true));
        adapter.write_digital_tx(false).unwrap();
        assert_eq!(adapter.read_digital_tx(), Ok(false));
    }

    #[test]
    fn test_pin_mode_switches_to_analog() {
        let reg = registry();
        let config = AdapterConfig::new(PinMode::Input).with_uid(Uid(3));
        let mut adapter = GpioAdapter::begin(&reg, PORT_B, config).unwrap();
        assert!(matches!(
            adapter.write_analog_tx(0x80),
            Err(PinError::WrongMode { pin: 26, .. })
        ));

        adapter.pin_mode_tx(PinMode::Analog).unwrap();
        adapter.write_analog_tx(0x80).unwrap();
        assert_eq!(reg.with_peripheral(|p| p.dac_output(26)), Some(0x80));

        adapter.pin_mode_rx(PinMode::Analog).unwrap();
        reg.with_peripheral(|p| p.set_analog_input(36, 1234));
        assert_eq!(adapter.read_analog_rx(), Ok(1234));
        assert_eq!(adapter.rx().map(|r| r.uid()), Some(Uid(3)));
        assert_eq!(reg.bound_pins(), vec![26, 36]);
    }

    #[test]
    fn test_pin_mode_binds_unused_pin() {
        let reg = registry();
        let config = AdapterConfig::rmt_rx(RmtRxConfig::default());
        let mut adapter = GpioAdapter::begin(&reg, PORT_B, config).unwrap();
        assert!(adapter.tx().is_none());

        adapter.pin_mode_tx(PinMode::Output).unwrap();
        assert_eq!(reg.bound_pins(), vec![26, 36]);
        adapter.write_digital_tx(true).unwrap();
        assert_eq!(reg.with_peripheral(|p| p.driven_level(26)), Some(true));
        assert!(matches!(
            adapter.read_analog_tx(),
            Err(PinError::WrongMode { pin: 26, .. })
        ));

        adapter.end();
        assert!(reg.bound_pins().is_empty());
    }

    #[test]
    fn test_failed_pin_mode_keeps_old_mode() {
        let reg = registry();
        let config = AdapterConfig::new(PinMode::Input);
        let mut adapter = GpioAdapter::begin(&reg, PORT_B, config).unwrap();

        assert_eq!(
            adapter.pin_mode_rx(PinMode::Output),
            Err(BindError::UnsupportedMode {
                pin: 36,
                mode: PinMode::Output
            })
        );
        assert_eq!(adapter.rx().map(|r| r.mode()), Some(PinMode::Input));
        assert!(matches!(
            adapter.pin_mode_tx(PinMode::RmtTX),
            Err(BindError::InvalidConfig(_))
        ));
        assert_eq!(reg.with_peripheral(|p| p.mode_of(26)), Some(PinMode::Input));
        assert_eq!(reg.bound_pins(), vec![26, 36]);
    }
}
