use glam::Mat4;
use waterglass_common::NodeId;

use crate::pass::SceneGraph;

/// Flat scene of world matrices for unit tests.
#[derive(Debug, Default)]
pub(crate) struct TestScene {
    nodes: Vec<(NodeId, Mat4, bool)>,
}

impl TestScene {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add_surface(&mut self, world: Mat4) -> NodeId {
        let id = NodeId::new();
        self.nodes.push((id, world, true));
        id
    }

    pub(crate) fn set_world(&mut self, node: NodeId, world: Mat4) {
        if let Some(entry) = self.nodes.iter_mut().find(|(id, _, _)| *id == node) {
            entry.1 = world;
        }
    }
}

impl SceneGraph for TestScene {
    fn world_matrix(&self, node: NodeId) -> Option<Mat4> {
        self.nodes
            .iter()
            .find(|(id, _, _)| *id == node)
            .map(|(_, world, _)| *world)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        self.nodes
            .iter()
            .any(|(id, _, visible)| *id == node && *visible)
    }

    fn set_visible(&mut self, node: NodeId, visible: bool) {
        if let Some(entry) = self.nodes.iter_mut().find(|(id, _, _)| *id == node) {
            entry.2 = visible;
        }
    }

    fn visible_nodes(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, _, visible)| *visible)
            .map(|(id, _, _)| *id)
            .collect()
    }
}
