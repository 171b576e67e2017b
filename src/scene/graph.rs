//! 场景图
//!
//! 节点存放在图内部的数组中，通过 `NodeId` 引用。
//! 父节点是非拥有的反向引用，子节点有序。节点创建后不会被回收，
//! 移除只会断开连接，所以 `NodeId` 始终有效。

use crate::core::error::Result;
use crate::gfx::backend::GraphicsBackend;
use crate::renderer::command::FrameMetadata;

use super::entity::{Entity, ResourceInitMetadata};

/// 场景节点 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

/// 场景节点
pub struct SceneNode<B: GraphicsBackend> {
    entity: Option<Box<dyn Entity<B>>>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl<B: GraphicsBackend> SceneNode<B> {
    pub fn entity(&self) -> Option<&dyn Entity<B>> {
        self.entity.as_deref()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// 场景图
pub struct SceneGraph<B: GraphicsBackend> {
    nodes: Vec<SceneNode<B>>,
    roots: Vec<NodeId>,
}

impl<B: GraphicsBackend> SceneGraph<B> {
    pub fn new() -> Self {
        Self { nodes: Vec::new(), roots: Vec::new() }
    }

    /// 创建一个未连接的节点，节点拥有 `entity`
    pub fn create_node(&mut self, entity: Option<Box<dyn Entity<B>>>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode { entity, parent: None, children: Vec::new() });
        id
    }

    pub fn node(&self, id: NodeId) -> &SceneNode<B> {
        &self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 添加根节点
    ///
    /// 有父节点或已经是根节点时被忽略，返回 `false`。
    pub fn add_root(&mut self, id: NodeId) -> bool {
        if self.nodes[id.0].parent.is_some() || self.roots.contains(&id) {
            crate::scene_debug!(node = id.0, "Node rejected as root");
            return false;
        }
        self.roots.push(id);
        true
    }

    /// 移除根节点（节点本身保留）
    pub fn remove_root(&mut self, id: NodeId) -> bool {
        let before = self.roots.len();
        self.roots.retain(|r| *r != id);
        self.roots.len() != before
    }

    /// 把 `child` 挂到 `parent` 下
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        self.set_parent(child, parent)
    }

    /// 设置父节点
    ///
    /// 以下情况被忽略并返回 `false`：
    /// - 父节点就是自己
    /// - 父节点已经是当前父节点
    /// - 父节点是自己的后代（会形成环）
    ///
    /// 节点如果原来是根节点，会从根节点列表中移除。
    pub fn set_parent(&mut self, id: NodeId, parent: NodeId) -> bool {
        if id == parent || self.nodes[id.0].parent == Some(parent) || self.is_descendant(parent, id) {
            crate::scene_debug!(node = id.0, parent = parent.0, "Parent change rejected");
            return false;
        }

        if let Some(old) = self.nodes[id.0].parent {
            self.nodes[old.0].children.retain(|c| *c != id);
        }
        self.remove_root(id);

        self.nodes[id.0].parent = Some(parent);
        self.nodes[parent.0].children.push(id);
        true
    }

    /// 断开 `child` 与 `parent` 的连接
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        if self.nodes[child.0].parent != Some(parent) {
            return false;
        }
        self.nodes[parent.0].children.retain(|c| *c != child);
        self.nodes[child.0].parent = None;
        true
    }

    /// `node` 是否在 `ancestor` 的子树中
    fn is_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = self.nodes[node.0].parent;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes[id.0].parent;
        }
        false
    }

    /// 深度优先（先自身后子节点）访问 `id` 的子树
    fn visit<F>(&mut self, id: NodeId, f: &mut F) -> Result<()>
    where
        F: FnMut(&mut dyn Entity<B>) -> Result<()>,
    {
        if let Some(entity) = self.nodes[id.0].entity.as_deref_mut() {
            f(entity)?;
        }

        let children = self.nodes[id.0].children.clone();
        for child in children {
            self.visit(child, f)?;
        }
        Ok(())
    }

    fn visit_all<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&mut dyn Entity<B>) -> Result<()>,
    {
        let roots = self.roots.clone();
        for root in roots {
            self.visit(root, &mut f)?;
        }
        Ok(())
    }

    /// 为所有实体创建 GPU 资源
    pub fn on_resource_create(&mut self, init: &ResourceInitMetadata<'_, B>) -> Result<()> {
        self.visit_all(|entity| {
            crate::scene_debug!(entity = entity.name(), "Creating entity resources");
            entity.on_resource_create(init)
        })
    }

    /// 渲染一帧：每个根节点先深度优先 update，再深度优先 render
    pub fn update_and_render(&mut self, frame: &mut FrameMetadata<B>) -> Result<()> {
        let roots = self.roots.clone();
        let counter = frame.frame;
        for root in roots {
            self.visit(root, &mut |entity: &mut dyn Entity<B>| {
                entity.on_update(counter);
                Ok(())
            })?;
            self.visit(root, &mut |entity: &mut dyn Entity<B>| entity.on_render(frame))?;
        }
        Ok(())
    }

    /// 释放所有实体的 GPU 资源
    ///
    /// 调用前必须等待 GPU 空闲。
    pub fn on_shutdown(&mut self) {
        let result = self.visit_all(|entity| {
            crate::scene_debug!(entity = entity.name(), "Shutting down entity");
            entity.on_shutdown();
            Ok(())
        });
        debug_assert!(result.is_ok());
        crate::scene_info!(nodes = self.nodes.len(), "Scene shut down");
    }
}

impl<B: GraphicsBackend> Default for SceneGraph<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    use crate::gfx::recording::{GpuCall, RecordingBackend};
    use crate::renderer::{Renderer, RendererSettings};

    type Journal = Rc<RefCell<Vec<String>>>;

    struct Probe {
        name: String,
        journal: Journal,
    }

    impl Probe {
        fn boxed(name: &str, journal: &Journal) -> Box<dyn Entity<RecordingBackend>> {
            Box::new(Probe { name: name.to_string(), journal: Rc::clone(journal) })
        }

        fn log(&self, event: &str) {
            self.journal.borrow_mut().push(format!("{}:{}", event, self.name));
        }
    }

    impl Entity<RecordingBackend> for Probe {
        fn name(&self) -> &str {
            &self.name
        }

        fn on_resource_create(&mut self, init: &ResourceInitMetadata<'_, RecordingBackend>) -> Result<()> {
            for i in 0..init.back_buffer_count {
                init.device.create_resource(&format!("{} cb {}", self.name, i));
            }
            self.log("create");
            Ok(())
        }

        fn on_update(&mut self, _frame: u64) {
            self.log("update");
        }

        fn on_render(&mut self, frame: &mut FrameMetadata<RecordingBackend>) -> Result<()> {
            frame.command_list.draw(&self.name, 3);
            self.log("render");
            Ok(())
        }

        fn on_shutdown(&mut self) {
            self.log("shutdown");
        }
    }

    #[test]
    fn test_root_rules() {
        let journal = Journal::default();
        let mut graph = SceneGraph::<RecordingBackend>::new();
        let a = graph.create_node(Some(Probe::boxed("a", &journal)));
        let b = graph.create_node(None);

        assert!(graph.add_root(a));
        assert!(!graph.add_root(a));

        assert!(graph.add_child(a, b));
        assert!(!graph.add_root(b));
        assert_eq!(graph.roots(), &[a]);

        assert!(graph.remove_root(a));
        assert!(!graph.remove_root(a));
        assert!(graph.roots().is_empty());
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut graph = SceneGraph::<RecordingBackend>::new();
        let a = graph.create_node(None);
        let b = graph.create_node(None);
        let c = graph.create_node(None);

        assert!(graph.set_parent(b, a));
        assert!(graph.set_parent(c, b));

        assert!(!graph.set_parent(a, a));
        assert!(!graph.set_parent(c, b));
        assert!(!graph.set_parent(a, c));

        // 重新挂载会从旧父节点移除
        assert!(graph.set_parent(c, a));
        assert!(graph.node(b).children().is_empty());
        assert_eq!(graph.node(a).children(), &[b, c]);
        assert_eq!(graph.node(c).parent(), Some(a));
    }

    #[test]
    fn test_set_parent_removes_from_roots() {
        let mut graph = SceneGraph::<RecordingBackend>::new();
        let a = graph.create_node(None);
        let b = graph.create_node(None);
        graph.add_root(a);
        graph.add_root(b);

        assert!(graph.set_parent(b, a));
        assert_eq!(graph.roots(), &[a]);
    }

    #[test]
    fn test_remove_child() {
        let mut graph = SceneGraph::<RecordingBackend>::new();
        let a = graph.create_node(None);
        let b = graph.create_node(None);
        let c = graph.create_node(None);
        graph.add_child(a, b);

        assert!(!graph.remove_child(c, b));
        assert!(graph.remove_child(a, b));
        assert_eq!(graph.node(b).parent(), None);
        assert!(graph.add_root(b));
    }

    #[test]
    fn test_traversal_order() {
        let journal = Journal::default();
        let mut graph = SceneGraph::<RecordingBackend>::new();

        let root = graph.create_node(Some(Probe::boxed("root", &journal)));
        let left = graph.create_node(Some(Probe::boxed("left", &journal)));
        let leaf = graph.create_node(Some(Probe::boxed("leaf", &journal)));
        let right = graph.create_node(Some(Probe::boxed("right", &journal)));
        let empty = graph.create_node(None);
        let second = graph.create_node(Some(Probe::boxed("second", &journal)));

        graph.add_root(root);
        graph.add_child(root, left);
        graph.add_child(left, leaf);
        graph.add_child(root, right);
        graph.add_root(empty);
        graph.add_child(empty, second);

        let mut renderer =
            Renderer::new(RecordingBackend::new(320, 240), 320, 240, RendererSettings::default()).unwrap();

        let init = ResourceInitMetadata::<RecordingBackend> {
            device: renderer.device(),
            back_buffer_count: renderer.back_buffer_count(),
        };
        graph.on_resource_create(&init).unwrap();
        assert_eq!(renderer.device().resources().len(), 5 * 2);

        journal.borrow_mut().clear();
        let mut frame = renderer.begin_frame().unwrap().unwrap();
        graph.update_and_render(&mut frame).unwrap();
        renderer.end_frame(frame).unwrap();

        let expected: Vec<String> = [
            "update:root", "update:left", "update:leaf", "update:right",
            "render:root", "render:left", "render:leaf", "render:right",
            "update:second", "render:second",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        assert_eq!(*journal.borrow(), expected);

        let draws = renderer
            .backend()
            .calls()
            .into_iter()
            .filter(|c| matches!(c, GpuCall::Draw { .. }))
            .count();
        assert_eq!(draws, 5);

        renderer.wait_for_gpu("test").unwrap();
        graph.on_shutdown();
        assert_eq!(journal.borrow().iter().filter(|e| e.starts_with("shutdown")).count(), 5);
    }

    #[test]
    fn test_detached_nodes_are_not_visited() {
        let journal = Journal::default();
        let mut graph = SceneGraph::<RecordingBackend>::new();
        let root = graph.create_node(Some(Probe::boxed("root", &journal)));
        let _orphan = graph.create_node(Some(Probe::boxed("orphan", &journal)));
        graph.add_root(root);

        graph.on_shutdown();
        assert_eq!(*journal.borrow(), vec!["shutdown:root".to_string()]);
    }
}
