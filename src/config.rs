//! 外设配置模块
//!
//! 提供引脚、板级描述和引脚注册表

pub mod board;
pub mod manager;
pub mod pins;

// 重新导出常用类型
pub use board::BoardProfile;
pub use manager::{BindError, PinRegistry};
pub use pins::{PinId, UnitPins};
