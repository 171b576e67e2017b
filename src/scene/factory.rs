//! 默认场景
//!
//! 两个根节点：一个空的根节点和一个持有三角形实体的节点。

use crate::gfx::backend::GraphicsBackend;

use super::entity::Entity;
use super::graph::SceneGraph;

/// 默认场景工厂
pub struct DefaultSceneGraphFactory;

impl DefaultSceneGraphFactory {
    /// 用给定的三角形实体构建默认场景
    pub fn make_with<B: GraphicsBackend>(triangle: Box<dyn Entity<B>>) -> SceneGraph<B> {
        let mut graph = SceneGraph::new();

        let root = graph.create_node(None);
        let triangle = graph.create_node(Some(triangle));

        graph.add_root(root);
        graph.add_root(triangle);

        crate::scene_info!(nodes = graph.len(), "Default scene graph created");
        graph
    }
}

#[cfg(target_os = "windows")]
impl DefaultSceneGraphFactory {
    /// 构建使用 DirectX 12 三角形实体的默认场景
    pub fn make(shader_dir: &std::path::Path) -> SceneGraph<crate::gfx::dx12::Dx12Backend> {
        Self::make_with(Box::new(crate::gfx::dx12::triangle::TriangleEntity::new(shader_dir)))
    }
}
