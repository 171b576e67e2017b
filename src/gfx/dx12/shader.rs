//! 着色器字节码加载
//!
//! 优先读取预编译的 `<dir>/<Entity>.<Stage>.cso`，原样使用。
//! 不存在时，如果 `<dir>/<entity>.hlsl` 存在则用 `D3DCompile` 在运行时编译
//! （入口 `VSMain` / `PSMain`，目标 `vs_5_0` / `ps_5_0`）。

use std::fs;
use std::path::{Path, PathBuf};

use windows::core::s;
use windows::Win32::Graphics::Direct3D::Fxc::{D3DCompile, D3DCOMPILE_DEBUG, D3DCOMPILE_SKIP_OPTIMIZATION};
use windows::Win32::Graphics::Direct3D::ID3DBlob;
use windows::Win32::Graphics::Direct3D12::D3D12_SHADER_BYTECODE;

use crate::core::error::{Result, ShaderError};

/// 着色器阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderStage {
    Vertex,
    Pixel,
}

impl ShaderStage {
    pub fn name(&self) -> &'static str {
        match self {
            ShaderStage::Vertex => "Vertex",
            ShaderStage::Pixel => "Pixel",
        }
    }
}

/// 着色器字节码
pub struct ShaderBytecode {
    code: Vec<u8>,
    path: PathBuf,
}

impl ShaderBytecode {
    /// 加载 `entity` 在 `stage` 阶段的字节码
    pub fn load(shader_dir: &Path, entity: &str, stage: ShaderStage) -> Result<Self> {
        let cso = bytecode_path(shader_dir, entity, stage);
        if cso.exists() {
            crate::dx12_info!(path = %cso.display(), "Loading shader bytecode");
            let code = fs::read(&cso)?;
            return Self::from_bytes(code, cso);
        }

        let hlsl = source_path(shader_dir, entity);
        if hlsl.exists() {
            crate::dx12_info!(path = %hlsl.display(), stage = stage.name(), "Compiling shader source");
            let source = fs::read_to_string(&hlsl)?;
            let code = compile(&source, stage)?;
            return Self::from_bytes(code, hlsl);
        }

        Err(ShaderError::FileNotFound(cso).into())
    }

    fn from_bytes(code: Vec<u8>, path: PathBuf) -> Result<Self> {
        if code.is_empty() {
            return Err(ShaderError::Empty(path).into());
        }
        Ok(Self { code, path })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.code
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 用于管线状态描述的字节码引用，`self` 必须比管线描述活得久
    pub fn as_d3d12(&self) -> D3D12_SHADER_BYTECODE {
        D3D12_SHADER_BYTECODE {
            pShaderBytecode: self.code.as_ptr() as _,
            BytecodeLength: self.code.len(),
        }
    }
}

/// 预编译字节码路径，例如 `shaders/Triangle.Vertex.cso`
pub fn bytecode_path(shader_dir: &Path, entity: &str, stage: ShaderStage) -> PathBuf {
    shader_dir.join(format!("{}.{}.cso", entity, stage.name()))
}

/// 源文件路径，例如 `shaders/triangle.hlsl`
pub fn source_path(shader_dir: &Path, entity: &str) -> PathBuf {
    shader_dir.join(format!("{}.hlsl", entity.to_lowercase()))
}

fn compile(source: &str, stage: ShaderStage) -> Result<Vec<u8>> {
    let flags = if cfg!(debug_assertions) {
        D3DCOMPILE_DEBUG | D3DCOMPILE_SKIP_OPTIMIZATION
    } else {
        0
    };

    let (entry, target) = match stage {
        ShaderStage::Vertex => (s!("VSMain"), s!("vs_5_0")),
        ShaderStage::Pixel => (s!("PSMain"), s!("ps_5_0")),
    };

    let mut blob: Option<ID3DBlob> = None;
    let mut error_blob: Option<ID3DBlob> = None;

    let result = unsafe {
        D3DCompile(
            source.as_ptr() as _,
            source.len(),
            None,
            None,
            None,
            entry,
            target,
            flags,
            0,
            &mut blob,
            Some(&mut error_blob),
        )
    };

    if let Err(e) = result {
        let message = match error_blob {
            Some(error) => String::from_utf8_lossy(blob_bytes(&error)).into_owned(),
            None => format!("{:?}", e),
        };
        return Err(ShaderError::Compilation(format!("{} shader: {}", stage.name(), message)).into());
    }

    match blob {
        Some(blob) => Ok(blob_bytes(&blob).to_vec()),
        None => Err(ShaderError::Compilation(format!("{} shader: no bytecode produced", stage.name())).into()),
    }
}

fn blob_bytes(blob: &ID3DBlob) -> &[u8] {
    unsafe { std::slice::from_raw_parts(blob.GetBufferPointer() as *const u8, blob.GetBufferSize()) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RenderError;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rendering_101_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_paths() {
        let dir = Path::new("shaders");
        assert_eq!(bytecode_path(dir, "Triangle", ShaderStage::Pixel), dir.join("Triangle.Pixel.cso"));
        assert_eq!(source_path(dir, "Triangle"), dir.join("triangle.hlsl"));
    }

    #[test]
    fn test_precompiled_bytecode_is_used_verbatim() {
        let dir = scratch_dir("cso");
        fs::write(dir.join("Triangle.Vertex.cso"), b"DXBC").unwrap();

        let code = ShaderBytecode::load(&dir, "Triangle", ShaderStage::Vertex).unwrap();
        assert_eq!(code.as_bytes(), b"DXBC");
        assert_eq!(code.as_d3d12().BytecodeLength, 4);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_empty_bytecode_rejected() {
        let dir = scratch_dir("empty");
        fs::write(dir.join("Triangle.Pixel.cso"), Vec::<u8>::new()).unwrap();

        let result = ShaderBytecode::load(&dir, "Triangle", ShaderStage::Pixel);
        assert!(matches!(result, Err(RenderError::Shader(ShaderError::Empty(_)))));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_missing_shader() {
        let dir = scratch_dir("missing");
        let result = ShaderBytecode::load(&dir, "Triangle", ShaderStage::Vertex);
        assert!(matches!(result, Err(RenderError::Shader(ShaderError::FileNotFound(_)))));
        fs::remove_dir_all(&dir).unwrap();
    }
}
