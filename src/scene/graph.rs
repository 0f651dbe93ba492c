//! The scene hierarchy.
//!
//! A [`Scene`] is an arena of [`Node`]s. Children are owned (removing a node
//! drops its whole subtree), the parent link is a non-owning key used only
//! for lookups, and every node gets a monotonic identity for render-list
//! tiebreaks. Because a node has exactly one owner, the graph cannot form a
//! cycle and traversal needs no visited set.

use cgmath::Matrix4;
use slotmap::{SlotMap, new_key_type};

use crate::device::DrawMode;
use crate::resources::{GeometryKey, ProgramKey};
use crate::scene::camera::Camera;
use crate::scene::transform::Transform;

new_key_type! {
    /// Key of a [`Node`] in its [`Scene`].
    pub struct NodeKey;
}

/// Observer invoked around each draw of a node, with the node's key and the
/// active camera (when one was supplied to the render call).
pub type RenderCallback = Box<dyn FnMut(NodeKey, Option<&Camera>)>;

/// The drawable payload of a mesh node: which geometry to draw with which
/// shader binding, plus the per-node render-list inputs.
pub struct Drawable {
    /// Shared reference into the renderer's geometry arena.
    pub geometry: GeometryKey,
    /// Shared reference into the renderer's program arena.
    pub program: ProgramKey,
    pub mode: DrawMode,
    /// Explicit sort override. Non-zero skips depth-key computation and
    /// wins over depth ordering inside each bucket.
    pub render_order: i32,
    /// Clear to always draw the node regardless of the camera frustum.
    pub frustum_culled: bool,
    /// Depth key of the last render pass; recomputed per pass when used.
    pub(crate) z_depth: f32,
    pub(crate) before_render: Vec<RenderCallback>,
    pub(crate) after_render: Vec<RenderCallback>,
}

impl Drawable {
    pub fn new(geometry: GeometryKey, program: ProgramKey) -> Self {
        Self {
            geometry,
            program,
            mode: DrawMode::Triangles,
            render_order: 0,
            frustum_culled: true,
            z_depth: 0.0,
            before_render: Vec::new(),
            after_render: Vec::new(),
        }
    }

    /// Register an observer called just before each draw of this node.
    pub fn on_before_render(&mut self, callback: impl FnMut(NodeKey, Option<&Camera>) + 'static) {
        self.before_render.push(Box::new(callback));
    }

    /// Register an observer called just after each draw of this node.
    pub fn on_after_render(&mut self, callback: impl FnMut(NodeKey, Option<&Camera>) + 'static) {
        self.after_render.push(Box::new(callback));
    }
}

/// One scene-graph node: a transform, a visibility flag and an optional
/// drawable payload.
pub struct Node {
    pub(crate) id: u64,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
    pub transform: Transform,
    /// An invisible node hides its whole subtree.
    pub visible: bool,
    pub drawable: Option<Drawable>,
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl Node {
    /// A plain container node with an identity transform.
    pub fn new() -> Self {
        Self {
            id: 0,
            parent: None,
            children: Vec::new(),
            transform: Transform::new(),
            visible: true,
            drawable: None,
        }
    }

    /// A mesh node drawing `geometry` with `program`.
    pub fn mesh(geometry: GeometryKey, program: ProgramKey) -> Self {
        Self {
            drawable: Some(Drawable::new(geometry, program)),
            ..Self::new()
        }
    }

    /// Identity used for render-list tiebreaks; assigned by the scene.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }
}

/// An arena-backed node hierarchy with a single root.
pub struct Scene {
    nodes: SlotMap<NodeKey, Node>,
    root: NodeKey,
    next_id: u64,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(Node::new());
        Self {
            nodes,
            root,
            next_id: 1,
        }
    }

    pub fn root(&self) -> NodeKey {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // The root always exists.
        self.nodes.len() <= 1
    }

    pub fn get(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Insert `node` as the last child of `parent` and return its key.
    pub fn add(&mut self, parent: NodeKey, mut node: Node) -> NodeKey {
        node.id = self.next_id;
        self.next_id += 1;
        node.parent = Some(parent);
        node.children.clear();
        let key = self.nodes.insert(node);
        match self.nodes.get_mut(parent) {
            Some(parent_node) => parent_node.children.push(key),
            None => {
                log::warn!("parent node no longer exists; attaching to the root instead");
                self.nodes[key].parent = Some(self.root);
                let root = self.root;
                self.nodes[root].children.push(key);
            }
        }
        key
    }

    /// Move `child` (with its subtree) under `parent`. Refused with a
    /// warning when it would detach the root or create a cycle.
    pub fn attach(&mut self, child: NodeKey, parent: NodeKey) {
        if child == self.root {
            log::warn!("the scene root cannot be re-parented");
            return;
        }
        if !self.nodes.contains_key(child) || !self.nodes.contains_key(parent) {
            log::warn!("attach refers to a node that no longer exists");
            return;
        }
        // Walking up from the new parent must not meet the child.
        let mut cursor = Some(parent);
        while let Some(key) = cursor {
            if key == child {
                log::warn!("attach would make a node its own ancestor; ignored");
                return;
            }
            cursor = self.nodes[key].parent;
        }
        self.detach(child);
        self.nodes[child].parent = Some(parent);
        self.nodes[parent].children.push(child);
    }

    /// Remove a node and drop its entire subtree. The root cannot be
    /// removed.
    pub fn remove(&mut self, key: NodeKey) {
        if key == self.root {
            log::warn!("the scene root cannot be removed");
            return;
        }
        if !self.nodes.contains_key(key) {
            return;
        }
        self.detach(key);
        let mut pending = vec![key];
        while let Some(next) = pending.pop() {
            if let Some(node) = self.nodes.remove(next) {
                pending.extend(node.children);
            }
        }
    }

    fn detach(&mut self, key: NodeKey) {
        if let Some(parent) = self.nodes[key].parent.take() {
            if let Some(parent_node) = self.nodes.get_mut(parent) {
                parent_node.children.retain(|&child| child != key);
            }
        }
    }

    /// Recompute world matrices in a single top-to-bottom pass. Only stale
    /// subtrees are recomputed; a recomputed ancestor forces all of its
    /// descendants so their world matrices pick up the change.
    pub fn update_world_matrices(&mut self) {
        let mut stack: Vec<(NodeKey, Option<Matrix4<f32>>, bool)> =
            vec![(self.root, None, false)];
        while let Some((key, parent_world, forced)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            let forced = node.transform.update_world(parent_world.as_ref(), forced);
            let world = node.transform.world_matrix;
            for &child in &self.nodes[key].children {
                stack.push((child, Some(world), forced));
            }
        }
    }

    /// Depth-first pre-order traversal. Returning `true` from the visitor
    /// prunes the node's subtree (its siblings are still visited).
    pub fn traverse(&self, mut visitor: impl FnMut(NodeKey, &Node) -> bool) {
        let mut stack = vec![self.root];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if visitor(key, node) {
                continue;
            }
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
    }
}

impl std::ops::Index<NodeKey> for Scene {
    type Output = Node;

    fn index(&self, key: NodeKey) -> &Node {
        &self.nodes[key]
    }
}

impl std::ops::IndexMut<NodeKey> for Scene {
    fn index_mut(&mut self, key: NodeKey) -> &mut Node {
        &mut self.nodes[key]
    }
}
