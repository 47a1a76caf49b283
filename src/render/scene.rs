use serde::Serialize;

/// 0xRRGGBB
pub type Color = u32;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeKind {
    Group,
    Box {
        size: [f32; 3],
        face_colors: [Color; 6],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SceneNode {
    pub name: String,
    pub kind: NodeKind,
    pub position: [f32; 3],
}

/// Camera-agnostic scene graph. The session engine only hands it to the
/// renderer; it never inspects the content.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Scene {
    nodes: Vec<SceneNode>,
}

impl Scene {
    pub fn add(&mut self, node: SceneNode) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[SceneNode] {
        &self.nodes
    }

    pub fn find(&self, name: &str) -> Option<&SceneNode> {
        self.nodes.iter().find(|node| node.name == name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

pub trait SceneProvider {
    fn scene(&mut self) -> Scene;
}

impl<F> SceneProvider for F
where
    F: FnMut() -> Scene,
{
    fn scene(&mut self) -> Scene {
        self()
    }
}

/// A single 20 cm box floating at (1, 1, 1), one solid colour per face.
#[derive(Debug, Default, Clone, Copy)]
pub struct CubeSceneProvider;

impl CubeSceneProvider {
    pub const FACE_COLORS: [Color; 6] = [0xff0000, 0x0000ff, 0x00ff00, 0xff00ff, 0x00ffff, 0xffff00];
}

impl SceneProvider for CubeSceneProvider {
    fn scene(&mut self) -> Scene {
        let mut scene = Scene::default();
        scene.add(SceneNode {
            name: "box".to_string(),
            kind: NodeKind::Box {
                size: [0.2, 0.2, 0.2],
                face_colors: Self::FACE_COLORS,
            },
            position: [1.0, 1.0, 1.0],
        });
        scene
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_scene_contains_single_colored_box() {
        let scene = CubeSceneProvider.scene();
        assert_eq!(scene.len(), 1);

        let node = scene.find("box").expect("box node");
        assert_eq!(node.position, [1.0, 1.0, 1.0]);
        match &node.kind {
            NodeKind::Box { size, face_colors } => {
                assert_eq!(*size, [0.2, 0.2, 0.2]);
                assert_eq!(face_colors[0], 0xff0000);
            }
            other => panic!("expected box, got {other:?}"),
        }
    }

    #[test]
    fn closures_act_as_scene_providers() {
        let mut provider = Scene::default;
        assert!(provider.scene().is_empty());
    }
}
