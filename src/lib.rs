//! 单元 GPIO 适配器
//!
//! 为单元驱动提供引脚模式 / RMT 配置、配置校验，
//! 以及带独占所有权的引脚绑定与释放。
//!
//! 日志通过 `log` 输出，由应用在启动时绑定（ESP-IDF 上使用 `EspLogger`）

pub mod config;
pub mod gpio;
pub mod macros;
pub mod peripherals;
pub mod types;
pub mod utils;

/// 宏展开时使用的依赖路径
#[doc(hidden)]
pub mod __private {
    pub use anyhow;
    pub use log;
}

pub use config::{BindError, BoardProfile, PinId, PinRegistry, UnitPins};
pub use gpio::{
    AdapterConfig, BoundPin, ConfigError, GpioAdapter, PinError, PinMode, PinSetup,
};
pub use peripherals::sim::SimulatedPeripheral;
pub use peripherals::{Peripheral, PlatformError};
pub use types::{capabilities, AttrFlags, Capabilities, ElapsedTime, Uid, UnitCategory};
