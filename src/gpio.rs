//! GPIO 适配器模块
//!
//! 引脚模式、RMT 配置、适配器配置以及已绑定引脚的句柄

pub mod adapter;
pub mod adapter_config;
pub mod bound;
pub mod mode;
pub mod rmt;

pub use adapter::GpioAdapter;
pub use adapter_config::{AdapterConfig, ConfigError, PinSetup, RmtDirection};
pub use bound::{BoundPin, PinError, DEFAULT_PULSE_TIMEOUT_US};
pub use mode::{DigitalConfig, Direction, DriveStrength, PinMode, Pull};
pub use rmt::{RmtItem, RmtRxConfig, RmtTxConfig};
