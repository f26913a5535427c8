//! RMT 时钟相关计算

/// 向上对齐到 `align` 的整数倍
pub fn quick_align(val: usize, align: usize) -> usize {
    if align == 0 {
        return val;
    }
    if (align & (align - 1)) == 0 {
        // align 是 2 的幂次方
        (val + align - 1) & !(align - 1)
    } else {
        val.div_ceil(align) * align
    }
}

/// 根据期望的 tick 时间计算 RMT v1 的 clk_div
///
/// # 参数
/// * `apb_freq_hz` - 当前 APB 时钟 (Hz)
/// * `tick_ns` - 期望的 tick 时间 (ns)
///
/// # 返回
/// 四舍五入后的分频值，范围 0..=255；`tick_ns` 为 0 时返回 1
pub fn calculate_rmt_clk_div(apb_freq_hz: u32, tick_ns: u32) -> u8 {
    if tick_ns == 0 {
        return 1;
    }
    let clk_div = (u64::from(apb_freq_hz) * u64::from(tick_ns) + 500) / 1_000_000_000;
    clk_div.min(255) as u8
}

/// 根据期望的 tick 时间计算 RMT v2 的分辨率
///
/// # 参数
/// * `apb_freq_hz` - 当前 APB 时钟 (Hz)
/// * `tick_ns` - 期望的 tick 时间 (ns)
///
/// # 返回
/// 实际可得到的分辨率 (Hz)，分频值限制在 1..=255
pub fn calculate_rmt_resolution_hz(apb_freq_hz: u32, tick_ns: u32) -> u32 {
    if tick_ns == 0 {
        return apb_freq_hz;
    }
    let target_hz = (1_000_000_000 / u64::from(tick_ns)).max(1);
    let clk_div = ((u64::from(apb_freq_hz) + target_hz / 2) / target_hz).clamp(1, 255);
    (u64::from(apb_freq_hz) / clk_div) as u32
}
