//! Flat scene-node container
//!
//! Transform, group, and shape chunks describe a hierarchy whose
//! cross-references are positional indices into one flat, ordered list.
//! The container keeps that list exactly as it appears in the file and
//! resolves references lazily through a validated accessor; nodes never
//! hold pointers to each other. Building renderable objects out of the
//! hierarchy is the caller's job.

use crate::core::ValidationError;
use crate::vox::chunk::{Body, Chunk, GroupBody, NodeHeader, ShapeBody, TransformBody};

/// One entry of the flat node list.
#[derive(Clone, Debug, PartialEq)]
pub enum SceneNode {
    Transform(TransformBody),
    Group(GroupBody),
    Shape(ShapeBody),
}

impl SceneNode {
    /// Node display name; empty when the file did not set one.
    pub fn name(&self) -> &str {
        match self {
            SceneNode::Transform(b) => &b.node.name,
            SceneNode::Group(b) => &b.node.name,
            SceneNode::Shape(b) => &b.node.name,
        }
    }
}

/// Flat, ordered scene-node container.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneNodes {
    nodes: Vec<SceneNode>,
}

impl SceneNodes {
    /// Collect the node chunks under the container root, in file order.
    pub fn from_root(root: &Chunk) -> Self {
        let nodes = root
            .children
            .iter()
            .filter_map(|child| match &child.body {
                Body::Transform(b) => Some(SceneNode::Transform(b.clone())),
                Body::Group(b) => Some(SceneNode::Group(b.clone())),
                Body::Shape(b) => Some(SceneNode::Shape(b.clone())),
                _ => None,
            })
            .collect();
        Self { nodes }
    }

    /// Default hierarchy for files that carry no transform node: a named
    /// root transform, and for multi-model files a group fanning out to one
    /// (transform, shape) pair per model.
    pub fn synthesize(name: &str, models: usize) -> Self {
        let transform = |name: String, child: i32| {
            SceneNode::Transform(TransformBody {
                node: NodeHeader {
                    name,
                    ..Default::default()
                },
                child,
                frames: 1,
                ..Default::default()
            })
        };
        let shape = |model: i32| {
            SceneNode::Shape(ShapeBody {
                model,
                ..Default::default()
            })
        };

        let mut nodes = vec![transform(name.to_string(), 1)];
        if models > 1 {
            let children = (0..models).map(|i| 2 + 2 * i as i32).collect();
            nodes.push(SceneNode::Group(GroupBody {
                children,
                ..Default::default()
            }));
            for i in 0..models {
                nodes.push(transform(format!("Model {}", i + 1), 2 + 2 * i as i32 + 1));
                nodes.push(shape(i as i32));
            }
        } else {
            nodes.push(shape(0));
        }
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SceneNode> {
        self.nodes.iter()
    }

    /// Resolve a node reference. Out-of-range indices are a validation
    /// failure, never a panic.
    pub fn resolve(&self, index: usize) -> Result<&SceneNode, ValidationError> {
        self.nodes.get(index).ok_or(ValidationError::NodeIndex {
            index,
            len: self.nodes.len(),
        })
    }
}
