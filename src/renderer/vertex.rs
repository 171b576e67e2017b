//! 顶点与常量缓冲区数据定义
//!
//! # 设计说明
//!
//! - 使用 `#[repr(C)]` 确保内存布局与 HLSL 输入布局一致
//! - 实现 `Pod` 和 `Zeroable` trait 以支持零拷贝上传到 GPU

use bytemuck::{Pod, Zeroable};
use nalgebra::{Vector3, Vector4};

/// 顶点结构体
///
/// # 内存布局
///
/// - `position`：偏移 0，3 个 f32（`POSITION`）
/// - `color`：偏移 12，4 个 f32（`COLOR`）
///
/// 总大小：28 字节
#[repr(C)]
#[derive(Default, Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// 顶点位置
    pub position: [f32; 3],
    /// 顶点颜色（RGBA）
    pub color: [f32; 4],
}

impl Vertex {
    /// `COLOR` 属性的字节偏移
    pub const COLOR_OFFSET: u32 = 12;

    pub fn new(position: [f32; 3], color: [f32; 4]) -> Self {
        Self { position, color }
    }

    /// 从 nalgebra 向量创建顶点
    pub fn from_vectors(position: Vector3<f32>, color: Vector4<f32>) -> Self {
        Self {
            position: [position.x, position.y, position.z],
            color: [color.x, color.y, color.z, color.w],
        }
    }

    /// 顶点步长
    pub const fn stride() -> u32 {
        std::mem::size_of::<Self>() as u32
    }
}

/// 教程中的彩色三角形
///
/// - 顶部 (0, 0.25)，红色
/// - 右下 (0.25, -0.25)，绿色
/// - 左下 (-0.25, -0.25)，蓝色
pub fn triangle_vertices() -> [Vertex; 3] {
    [
        Vertex::from_vectors(Vector3::new(0.0, 0.25, 0.0), Vector4::new(1.0, 0.0, 0.0, 1.0)),
        Vertex::from_vectors(Vector3::new(0.25, -0.25, 0.0), Vector4::new(0.0, 1.0, 0.0, 1.0)),
        Vertex::from_vectors(Vector3::new(-0.25, -0.25, 0.0), Vector4::new(0.0, 0.0, 1.0, 1.0)),
    ]
}

/// 常量缓冲区对齐（D3D12 要求 256 字节）
pub const CONSTANT_BUFFER_ALIGNMENT: usize = 256;

/// 三角形着色器的常量缓冲区（`cbuffer` 位于 b0）
///
/// 只有 `time` 有意义，其余为填充，整体恰好 256 字节。
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ConstantBufferPayload {
    pub time: f32,
    _pad: [f32; 3],
    _reserved: [[f32; 4]; 15],
}

impl ConstantBufferPayload {
    /// 第 `frame` 帧的数据：`time = frame / 100`
    pub fn for_frame(frame: u64) -> Self {
        Self {
            time: frame as f32 / 100.0,
            ..Zeroable::zeroed()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(Vertex::stride(), 28);
        assert_eq!(std::mem::offset_of!(Vertex, color) as u32, Vertex::COLOR_OFFSET);
    }

    #[test]
    fn test_triangle_vertices() {
        let vertices = triangle_vertices();
        assert_eq!(vertices[0].position, [0.0, 0.25, 0.0]);
        assert_eq!(vertices[1].color, [0.0, 1.0, 0.0, 1.0]);
        assert_eq!(vertices[2].position, [-0.25, -0.25, 0.0]);

        let bytes: &[u8] = bytemuck::cast_slice(&vertices);
        assert_eq!(bytes.len(), 3 * 28);
    }

    #[test]
    fn test_constant_buffer_payload() {
        assert_eq!(std::mem::size_of::<ConstantBufferPayload>(), CONSTANT_BUFFER_ALIGNMENT);
        assert_eq!(ConstantBufferPayload::for_frame(0).time, 0.0);
        assert_eq!(ConstantBufferPayload::for_frame(250).time, 2.5);

        let payload = ConstantBufferPayload::for_frame(100);
        let bytes = bytemuck::bytes_of(&payload);
        assert_eq!(&bytes[..4], &1.0f32.to_ne_bytes());
        assert!(bytes[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_shader_source_matches_payload() {
        let source = std::fs::read_to_string(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders/triangle.hlsl")).unwrap();

        // b0 只有一个 float，与 payload 的首个字段对应
        assert!(source.contains("register(b0)"));
        assert!(source.contains("float Time;"));
        assert!(source.contains("VSMain") && source.contains("PSMain"));

        // 颜色随时间旋转，位置保持不变
        assert!(source.contains("RotateHue(input.Color.rgb, Time)"));
        assert!(source.contains("float4(input.Position, 1.0)"));
    }
}
