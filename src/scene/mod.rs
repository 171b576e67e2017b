//! 场景模块
//!
//! - `entity`：实体绘制约定
//! - `graph`：场景图（节点、父子关系、深度优先遍历）
//! - `factory`：默认场景

pub mod entity;
pub mod factory;
pub mod graph;

pub use entity::{Entity, ResourceInitMetadata};
pub use factory::DefaultSceneGraphFactory;
pub use graph::{NodeId, SceneGraph, SceneNode};
