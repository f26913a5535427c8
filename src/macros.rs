//! 绑定宏
//!
//! 在返回 `anyhow::Result` 的初始化代码里简化引脚绑定

/// 启动单元适配器的宏
///
/// 失败时记录日志并从当前函数返回 `anyhow` 错误。
///
/// # 示例
/// ```ignore
/// let registry = PinRegistry::new(SimulatedPeripheral::new(BoardProfile::ESP32));
/// let led = bind_adapter!(&registry, PORT_B, AdapterConfig::rmt_tx(RmtTxConfig::default()));
/// ```
#[macro_export]
macro_rules! bind_adapter {
    ($registry:expr, $pins:expr, $config:expr) => {{
        match $crate::gpio::GpioAdapter::begin($registry, $pins, $config) {
            Ok(adapter) => adapter,
            Err(e) => {
                $crate::__private::log::error!("单元适配器启动失败: {}", e);
                return Err($crate::__private::anyhow::anyhow!("单元适配器启动失败: {}", e));
            }
        }
    }};
}

/// 绑定单个引脚的宏
///
/// # 示例
/// ```ignore
/// let pin5 = bind_pin!(&registry, AdapterConfig::new(PinMode::Output), 5);
/// ```
#[macro_export]
macro_rules! bind_pin {
    ($registry:expr, $config:expr, $pin:expr) => {{
        match $crate::config::PinRegistry::bind($registry, &$config, $pin) {
            Ok(pin) => pin,
            Err(e) => {
                $crate::__private::log::error!("绑定 GPIO {} 失败: {}", $pin, e);
                return Err($crate::__private::anyhow::anyhow!("绑定 GPIO {} 失败: {}", $pin, e));
            }
        }
    }};
}

#[cfg(test)]
mod tests {
    use crate::config::board::BoardProfile;
    use crate::config::pins::PORT_B;
    use crate::config::PinRegistry;
    use crate::gpio::{AdapterConfig, GpioAdapter, PinMode, RmtTxConfig};
    use crate::peripherals::sim::SimulatedPeripheral;

    fn start_led(
        registry: &PinRegistry<SimulatedPeripheral>,
    ) -> anyhow::Result<GpioAdapter<SimulatedPeripheral>> {
        let config = AdapterConfig::rmt_tx(RmtTxConfig::default());
        let mut led = bind_adapter!(registry, PORT_B, config);
        led.transmit(&[])?;
        Ok(led)
    }

    fn drive_pin(registry: &PinRegistry<SimulatedPeripheral>, pin: u8) -> anyhow::Result<()> {
        let mut out = bind_pin!(registry, AdapterConfig::new(PinMode::Output), pin);
        out.write_digital(true)?;
        Ok(())
    }

    #[test]
    fn test_bind_adapter_returns_anyhow_error() {
        let registry = PinRegistry::new(SimulatedPeripheral::new(BoardProfile::ESP32));
        let _led = start_led(&registry).unwrap();

        let err = start_led(&registry).err().unwrap();
        assert!(err.to_string().contains("26"));
    }

    #[test]
    fn test_bind_pin() {
        let registry = PinRegistry::new(SimulatedPeripheral::new(BoardProfile::ESP32));
        assert!(drive_pin(&registry, 5).is_ok());
        // 句柄已析构，引脚可以再次绑定
        assert!(drive_pin(&registry, 5).is_ok());
        assert!(drive_pin(&registry, 36).is_err());
    }

    /// 调用方没有直接依赖 `log` 和 `anyhow` 时宏仍然可用
    mod without_log_or_anyhow {
        #[allow(dead_code)]
        mod log {}
        #[allow(dead_code)]
        mod anyhow {}

        use crate::__private::anyhow::Result;
        use crate::config::board::BoardProfile;
        use crate::config::pins::PORT_A;
        use crate::config::PinRegistry;
        use crate::gpio::{AdapterConfig, PinMode};
        use crate::peripherals::sim::SimulatedPeripheral;

        fn start(registry: &PinRegistry<SimulatedPeripheral>, pin: u8) -> Result<()> {
            let _adapter = bind_adapter!(registry, PORT_A, AdapterConfig::new(PinMode::Input));
            let _pin = bind_pin!(registry, AdapterConfig::new(PinMode::Output), pin);
            Ok(())
        }

        #[test]
        fn test_macros_use_crate_paths() {
            let registry = PinRegistry::new(SimulatedPeripheral::new(BoardProfile::ESP32));
            assert!(start(&registry, 5).is_ok());
            let err = start(&registry, 36).err().unwrap();
            assert!(err.to_string().contains("36"));
        }
    }
}
