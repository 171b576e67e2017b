//! 适配器分类
//!
//! 只用于日志：根据 PCI 厂商 ID 粗略判断显卡类型，不影响适配器选择。

use std::fmt;

/// NVIDIA
pub const VENDOR_NVIDIA: u32 = 0x10DE;
/// AMD
pub const VENDOR_AMD: u32 = 0x1002;
/// Intel
pub const VENDOR_INTEL: u32 = 0x8086;

/// GPU 性能类别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuPerformanceClass {
    Unknown,
    Integrated,
    Dedicated,
}

impl GpuPerformanceClass {
    /// 根据厂商 ID 分类
    pub fn from_vendor_id(vendor_id: u32) -> Self {
        match vendor_id {
            VENDOR_NVIDIA | VENDOR_AMD => GpuPerformanceClass::Dedicated,
            VENDOR_INTEL => GpuPerformanceClass::Integrated,
            _ => GpuPerformanceClass::Unknown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GpuPerformanceClass::Unknown => "Unknown",
            GpuPerformanceClass::Integrated => "Integrated",
            GpuPerformanceClass::Dedicated => "Dedicated",
        }
    }
}

impl fmt::Display for GpuPerformanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 把 UTF-16 适配器描述（以 0 结尾的定长数组）转为字符串
pub fn adapter_description(raw: &[u16]) -> String {
    let len = raw.iter().position(|&c| c == 0).unwrap_or(raw.len());
    String::from_utf16_lossy(&raw[..len])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vendors() {
        assert_eq!(GpuPerformanceClass::from_vendor_id(0x10DE), GpuPerformanceClass::Dedicated);
        assert_eq!(GpuPerformanceClass::from_vendor_id(0x1002), GpuPerformanceClass::Dedicated);
        assert_eq!(GpuPerformanceClass::from_vendor_id(0x8086), GpuPerformanceClass::Integrated);
    }

    #[test]
    fn test_unknown_vendor() {
        // Microsoft Basic Render Driver
        assert_eq!(GpuPerformanceClass::from_vendor_id(0x1414), GpuPerformanceClass::Unknown);
        assert_eq!(GpuPerformanceClass::from_vendor_id(0).to_string(), "Unknown");
    }

    #[test]
    fn test_adapter_description() {
        let mut raw = [0u16; 128];
        for (i, c) in "NVIDIA GeForce".encode_utf16().enumerate() {
            raw[i] = c;
        }
        assert_eq!(adapter_description(&raw), "NVIDIA GeForce");
        assert_eq!(adapter_description(&[0x41, 0x42]), "AB");
    }
}
