//! 板级硬件描述
//!
//! 各芯片可用的 GPIO、ADC/DAC 引脚以及 RMT 通道布局

/// RMT 通道布局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RmtLayout {
    /// 通道可收可发（RMT v1，例如 ESP32）
    Shared(u8),
    /// 收发通道分开（RMT v2，例如 ESP32-S3 / ESP32-C3）
    Split { tx: u8, rx: u8 },
}

/// ADC 通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdcChannel {
    /// 1 或 2
    pub unit: u8,
    pub channel: u8,
}

/// 板级配置
#[derive(Debug, Clone, Copy)]
pub struct BoardProfile {
    pub name: &'static str,
    /// 可用的 GPIO 编号
    pub valid_pins: &'static [u8],
    /// 仅能输入的 GPIO
    pub input_only_pins: &'static [u8],
    /// (GPIO, ADC 通道)
    pub adc_pins: &'static [(u8, AdcChannel)],
    pub dac_pins: &'static [u8],
    /// ADC2 是否可用
    pub adc2_supported: bool,
    pub rmt: RmtLayout,
    /// 每个 RMT 通道的内存字数
    pub rmt_words_per_channel: usize,
    pub apb_freq_hz: u32,
}

const fn adc(unit: u8, channel: u8) -> AdcChannel {
    AdcChannel { unit, channel }
}

impl BoardProfile {
    /// ESP32（M5Stack Core / Basic 等）
    pub const ESP32: BoardProfile = BoardProfile {
        name: "esp32",
        // 6-11 连接 SPI Flash
        valid_pins: &[
            0, 1, 2, 3, 4, 5, 12, 13, 14, 15, 16, 17, 18, 19, 21, 22, 23, 25, 26, 27, 32, 33, 34,
            35, 36, 37, 38, 39,
        ],
        input_only_pins: &[34, 35, 36, 37, 38, 39],
        adc_pins: &[
            (0, adc(2, 1)),
            (2, adc(2, 2)),
            (4, adc(2, 0)),
            (12, adc(2, 5)),
            (13, adc(2, 4)),
            (14, adc(2, 6)),
            (15, adc(2, 3)),
            (25, adc(2, 8)),
            (26, adc(2, 9)),
            (27, adc(2, 7)),
            (32, adc(1, 4)),
            (33, adc(1, 5)),
            (34, adc(1, 6)),
            (35, adc(1, 7)),
            (36, adc(1, 0)),
            (37, adc(1, 1)),
            (38, adc(1, 2)),
            (39, adc(1, 3)),
        ],
        dac_pins: &[25, 26],
        adc2_supported: true,
        rmt: RmtLayout::Shared(8),
        rmt_words_per_channel: 64,
        apb_freq_hz: 80_000_000,
    };

    /// ESP32-S3（AtomS3 / CoreS3 等）
    pub const ESP32S3: BoardProfile = BoardProfile {
        name: "esp32s3",
        valid_pins: &[
            0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20, 21, 35, 36,
            37, 38, 39, 40, 41, 42, 43, 44, 45, 46, 47, 48,
        ],
        input_only_pins: &[],
        adc_pins: &[
            (1, adc(1, 0)),
            (2, adc(1, 1)),
            (3, adc(1, 2)),
            (4, adc(1, 3)),
            (5, adc(1, 4)),
            (6, adc(1, 5)),
            (7, adc(1, 6)),
            (8, adc(1, 7)),
            (9, adc(1, 8)),
            (10, adc(1, 9)),
            (11, adc(2, 0)),
            (12, adc(2, 1)),
            (13, adc(2, 2)),
            (14, adc(2, 3)),
            (15, adc(2, 4)),
            (16, adc(2, 5)),
            (17, adc(2, 6)),
            (18, adc(2, 7)),
            (19, adc(2, 8)),
            (20, adc(2, 9)),
        ],
        dac_pins: &[],
        adc2_supported: true,
        rmt: RmtLayout::Split { tx: 4, rx: 4 },
        rmt_words_per_channel: 48,
        apb_freq_hz: 80_000_000,
    };

    /// ESP32-C3（StampC3 等）
    pub const ESP32C3: BoardProfile = BoardProfile {
        name: "esp32c3",
        valid_pins: &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 21],
        input_only_pins: &[],
        adc_pins: &[
            (0, adc(1, 0)),
            (1, adc(1, 1)),
            (2, adc(1, 2)),
            (3, adc(1, 3)),
            (4, adc(1, 4)),
            (5, adc(2, 0)),
        ],
        dac_pins: &[],
        // 单个 ADC 外设
        adc2_supported: false,
        rmt: RmtLayout::Split { tx: 2, rx: 2 },
        rmt_words_per_channel: 48,
        apb_freq_hz: 80_000_000,
    };

    pub fn is_valid_pin(&self, pin: u8) -> bool {
        self.valid_pins.contains(&pin)
    }

    pub fn is_input_only(&self, pin: u8) -> bool {
        self.input_only_pins.contains(&pin)
    }

    /// GPIO 对应的可用 ADC 通道
    pub fn adc_channel(&self, pin: u8) -> Option<AdcChannel> {
        self.adc_pins
            .iter()
            .find(|(p, _)| *p == pin)
            .map(|(_, ch)| *ch)
            .filter(|ch| ch.unit == 1 || self.adc2_supported)
    }

    pub fn has_dac(&self, pin: u8) -> bool {
        self.dac_pins.contains(&pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_esp32_adc_table() {
        let b = BoardProfile::ESP32;
        assert_eq!(b.adc_channel(36), Some(AdcChannel { unit: 1, channel: 0 }));
        assert_eq!(b.adc_channel(25), Some(AdcChannel { unit: 2, channel: 8 }));
        assert_eq!(b.adc_channel(5), None);
        assert!(b.has_dac(26));
        assert!(!b.has_dac(27));
        assert!(b.is_input_only(36));
        assert!(!b.is_valid_pin(6));
    }

    #[test]
    fn test_c3_has_no_adc2() {
        let b = BoardProfile::ESP32C3;
        assert_eq!(b.adc_channel(4), Some(AdcChannel { unit: 1, channel: 4 }));
        assert_eq!(b.adc_channel(5), None);
        assert!(!b.is_valid_pin(20));
    }

    #[test]
    fn test_rmt_layouts() {
        assert_eq!(BoardProfile::ESP32.rmt, RmtLayout::Shared(8));
        assert_eq!(BoardProfile::ESP32S3.rmt, RmtLayout::Split { tx: 4, rx: 4 });
    }
}
