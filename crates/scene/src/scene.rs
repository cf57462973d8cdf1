use std::collections::BTreeMap;

use glam::Mat4;
use serde::{Deserialize, Serialize};
use waterglass_common::{Color, NodeId, Transform};
use waterglass_reflect::SceneGraph;

use crate::geometry::MeshKind;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SceneError {
    #[error("node {0:?} does not exist")]
    UnknownNode(NodeId),
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    Cycle { child: NodeId, parent: NodeId },
}

/// How the host shades a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shading {
    /// Diffuse lighting from a fixed sun.
    #[default]
    Lit,
    /// Flat color, for backdrops.
    Unlit,
    /// Drawn with the water program.
    Water,
}

/// Per-node data stored in the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub transform: Transform,
    pub parent: Option<NodeId>,
    /// Groups carry no mesh.
    pub mesh: Option<MeshKind>,
    pub color: Color,
    pub shading: Shading,
    pub visible: bool,
}

impl Node {
    pub fn group(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            parent: None,
            mesh: None,
            color: Color::WHITE,
            shading: Shading::Lit,
            visible: true,
        }
    }

    pub fn mesh(name: impl Into<String>, mesh: MeshKind, transform: Transform, color: Color) -> Self {
        Self {
            mesh: Some(mesh),
            color,
            ..Self::group(name, transform)
        }
    }

    pub fn with_shading(mut self, shading: Shading) -> Self {
        self.shading = shading;
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent = Some(parent);
        self
    }
}

/// Flat node store with parent links.
///
/// Nodes keep their insertion order, which is also the draw order.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    nodes: BTreeMap<NodeId, Node>,
    order: Vec<NodeId>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Insert a node. Its parent, if any, must already exist.
    pub fn spawn(&mut self, node: Node) -> Result<NodeId, SceneError> {
        if let Some(parent) = node.parent {
            if !self.nodes.contains_key(&parent) {
                return Err(SceneError::UnknownNode(parent));
            }
        }
        let id = NodeId::new();
        tracing::trace!(node = %id.short(), name = %node.name, "node spawned");
        self.nodes.insert(id, node);
        self.order.push(id);
        Ok(id)
    }

    /// Remove a node and everything parented under it.
    pub fn despawn(&mut self, id: NodeId) -> Option<Node> {
        let node = self.nodes.remove(&id)?;
        self.order.retain(|n| *n != id);
        let children: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(id))
            .map(|(child, _)| *child)
            .collect();
        for child in children {
            self.despawn(child);
        }
        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    /// Nodes in draw order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.order.iter().filter_map(|id| self.nodes.get(id).map(|n| (*id, n)))
    }

    pub fn set_transform(&mut self, id: NodeId, transform: Transform) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))?;
        node.transform = transform;
        Ok(())
    }

    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        if !self.nodes.contains_key(&child) {
            return Err(SceneError::UnknownNode(child));
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return Err(SceneError::UnknownNode(p));
            }
            if self.ancestors(p).any(|a| a == child) {
                return Err(SceneError::Cycle { child, parent: p });
            }
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = parent;
        }
        Ok(())
    }

    /// `id` followed by its parent chain up to the root.
    fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |current| {
            self.nodes.get(current).and_then(|n| n.parent)
        })
        .take(self.nodes.len() + 1)
    }

    /// Number of nodes with a mesh that a render would draw.
    pub fn drawable_count(&self) -> usize {
        self.visible_nodes().len()
    }
}

impl SceneGraph for Scene {
    fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
        self.nodes.get(&node)?;
        Some(
            self.ancestors(node)
                .filter_map(|a| self.nodes.get(&a))
                .fold(Mat4::IDENTITY, |acc, n| n.transform.matrix() * acc),
        )
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.nodes.get(&node).is_some_and(|n| n.visible)
    }

    /// Visible itself and through every ancestor.
    fn is_rendered(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
            && self
                .ancestors(node)
                .all(|a| self.nodes.get(&a).is_some_and(|n| n.visible))
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.visible = visible;
        }
    }

    fn visible_nodes(&self) -> Vec<NodeId> {
        self.iter()
            .filter(|(id, n)| n.mesh.is_some() && self.is_rendered(*id))
            .map(|(id, _)| id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec3, Vec4Swizzles};

    fn cube(name: &str, position: Vec3) -> Node {
        Node::mesh(name, MeshKind::Cube, Transform::from_position(position), Color::WHITE)
    }

    #[test]
    fn world_matrix_composes_parents() {
        let mut scene = Scene::new();
        let root = scene
            .spawn(Node::group(
                "root",
                Transform {
                    position: Vec3::new(10.0, 0.0, 0.0),
                    rotation: Quat::from_rotation_y(std::f32::consts::FRAC_PI_2),
                    scale: Vec3::ONE,
                },
            ))
            .unwrap();
        let child = scene
            .spawn(cube("child", Vec3::new(0.0, 0.0, 1.0)).with_parent(root))
            .unwrap();

        let world = scene.world_matrix(child).unwrap();
        let p = (world * glam::Vec4::W).xyz();
        assert!((p - Vec3::new(11.0, 0.0, 0.0)).length() < 1e-5);
        assert_eq!(scene.world_matrix(NodeId::new()), None);
    }

    #[test]
    fn hidden_parent_hides_children_but_keeps_their_flag() {
        let mut scene = Scene::new();
        let group = scene.spawn(Node::group("g", Transform::default())).unwrap();
        let a = scene.spawn(cube("a", Vec3::ZERO).with_parent(group)).unwrap();
        let b = scene.spawn(cube("b", Vec3::X)).unwrap();
        assert_eq!(scene.visible_nodes(), vec![a, b]);

        scene.set_visible(group, false);
        assert_eq!(scene.visible_nodes(), vec![b]);
        assert!(scene.is_visible(a));
        assert!(!scene.is_rendered(a));
    }

    #[test]
    fn spawn_and_reparent_are_checked() {
        let mut scene = Scene::new();
        let missing = NodeId::new();
        assert_eq!(
            scene.spawn(cube("x", Vec3::ZERO).with_parent(missing)),
            Err(SceneError::UnknownNode(missing))
        );

        let a = scene.spawn(Node::group("a", Transform::default())).unwrap();
        let b = scene.spawn(Node::group("b", Transform::default()).with_parent(a)).unwrap();
        assert_eq!(
            scene.set_parent(a, Some(b)),
            Err(SceneError::Cycle { child: a, parent: b })
        );
        assert!(scene.set_parent(b, None).is_ok());
    }

    #[test]
    fn despawn_removes_the_subtree() {
        let mut scene = Scene::new();
        let a = scene.spawn(Node::group("a", Transform::default())).unwrap();
        let b = scene.spawn(cube("b", Vec3::ZERO).with_parent(a)).unwrap();
        scene.spawn(cube("c", Vec3::ZERO)).unwrap();

        assert!(scene.despawn(a).is_some());
        assert!(scene.get(b).is_none());
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.drawable_count(), 1);
    }
}
