use std::rc::Rc;

use super::{Component, Container, ContainerId, ListDefinitions, Object, Path, Pointer};
use crate::error::{Result, StoryError};

/// Something in the tree that can be addressed by a path.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub(crate) enum ObjectRef {
    Container(ContainerId),
    /// A non-container object: the containing container and its index within it.
    Leaf(ContainerId, usize),
}

impl ObjectRef {
    pub(crate) fn as_container(self) -> Option<ContainerId> {
        match self {
            ObjectRef::Container(id) => Some(id),
            ObjectRef::Leaf(..) => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct SearchResult {
    pub(crate) obj: ObjectRef,
    /// The path could not be followed to its end; `obj` is the deepest object reached.
    pub(crate) approximate: bool,
}

impl SearchResult {
    pub(crate) fn container(&self) -> Option<ContainerId> {
        self.obj.as_container()
    }
}

/// The result of turning a path into a pointer.
#[derive(Copy, Clone, Debug)]
pub(crate) struct PathLookup {
    pub(crate) pointer: Option<Pointer>,
    /// Set when the path was only approximately found.
    pub(crate) approximated_to: Option<ObjectRef>,
}

/// The immutable compiled story: a tree of containers stored in an arena.
///
/// The root container is always the first entry.
#[derive(Clone, Debug, Default)]
pub struct Program {
    containers: Vec<Container>,
    pub(crate) list_definitions: Rc<ListDefinitions>,
    pub(crate) ink_version: u32,
}

impl Program {
    pub(crate) const ROOT: ContainerId = ContainerId(0);

    /// Reserves a slot for a container whose content is not read yet.
    pub(crate) fn reserve(&mut self) -> ContainerId {
        self.containers.push(Container::default());
        ContainerId(self.containers.len() - 1)
    }

    pub(crate) fn fill(&mut self, id: ContainerId, container: Container) {
        self.containers[id.0] = container;
    }

    /// Links parents and computes every container's path. Called once the whole tree is read.
    pub(crate) fn link(&mut self) {
        let mut pending = vec![Self::ROOT];
        while let Some(id) = pending.pop() {
            let parent_path = self.containers[id.0].path.clone();
            let indexed: Vec<(usize, ContainerId)> = self.containers[id.0]
                .content
                .iter()
                .enumerate()
                .filter_map(|(index, obj)| obj.as_container().map(|child| (index, child)))
                .collect();
            let named: Vec<(String, ContainerId)> = self.containers[id.0]
                .named_content
                .iter()
                .map(|(name, child)| (name.clone(), *child))
                .collect();

            for (index, child) in &indexed {
                let container = &mut self.containers[child.0];
                container.parent = Some(id);
                container.index_in_parent = Some(*index);
            }
            for (name, child) in &named {
                let container = &mut self.containers[child.0];
                container.parent = Some(id);
                if container.name.is_none() {
                    container.name = Some(name.clone());
                }
            }

            let mut children: Vec<ContainerId> = indexed.iter().map(|(_, child)| *child).collect();
            for (_, child) in &named {
                if !children.contains(child) {
                    children.push(*child);
                }
            }
            for child in children {
                let container = &self.containers[child.0];
                let component = match (&container.name, container.index_in_parent) {
                    (Some(name), _) if self.containers[id.0].named_content.contains_key(name) => {
                        Component::Name(name.clone())
                    }
                    (_, Some(index)) => Component::Index(index),
                    (Some(name), None) => Component::Name(name.clone()),
                    (None, None) => continue,
                };
                let mut path = parent_path.clone();
                path.join(component);
                self.containers[child.0].path = path;
                pending.push(child);
            }
        }
    }

    pub fn ink_version(&self) -> u32 {
        self.ink_version
    }

    pub fn list_definitions(&self) -> &ListDefinitions {
        &self.list_definitions
    }

    pub(crate) fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id.0]
    }

    pub(crate) fn containers(&self) -> impl Iterator<Item = &Container> {
        self.containers.iter()
    }

    pub(crate) fn root(&self) -> &Container {
        self.container(Self::ROOT)
    }

    pub(crate) fn child_ref(&self, container: ContainerId, index: usize) -> Option<ObjectRef> {
        match self.container(container).content.get(index)? {
            Object::Container(child) => Some(ObjectRef::Container(*child)),
            _ => Some(ObjectRef::Leaf(container, index)),
        }
    }

    /// The object behind a reference. Containers without a content slot have no object.
    pub(crate) fn object(&self, obj: ObjectRef) -> Option<&Object> {
        match obj {
            ObjectRef::Leaf(container, index) => self.container(container).content.get(index),
            ObjectRef::Container(id) => {
                let container = self.container(id);
                let parent = self.container(container.parent?);
                parent.content.get(container.index_in_parent?)
            }
        }
    }

    pub(crate) fn parent_of(&self, obj: ObjectRef) -> Option<ContainerId> {
        match obj {
            ObjectRef::Container(id) => self.container(id).parent,
            ObjectRef::Leaf(container, _) => Some(container),
        }
    }

    pub(crate) fn path_of(&self, obj: ObjectRef) -> Path {
        match obj {
            ObjectRef::Container(id) => self.container(id).path.clone(),
            ObjectRef::Leaf(container, index) => self.container(container).path.with_index(index),
        }
    }

    pub(crate) fn knot_container_with_name(&self, name: &str) -> Option<ContainerId> {
        self.root().named_content.get(name).copied()
    }

    fn content_with_component(&self, container: ContainerId, component: &Component) -> Option<ObjectRef> {
        match component {
            Component::Index(index) => self.child_ref(container, *index),
            Component::Parent => self.container(container).parent.map(ObjectRef::Container),
            Component::Name(name) => self
                .container(container)
                .named_content
                .get(name)
                .map(|child| ObjectRef::Container(*child)),
        }
    }

    /// Follows `path` down from `start`, stopping at the deepest object found.
    ///
    /// Only the first `partial_len` components are followed when given.
    pub(crate) fn content_at_path(&self, start: ContainerId, path: &Path, partial_len: Option<usize>) -> SearchResult {
        let len = partial_len.unwrap_or(path.len());
        let mut approximate = false;
        let mut current_container = Some(start);
        let mut current = ObjectRef::Container(start);

        for (i, component) in path.components().iter().take(len).enumerate() {
            let Some(container) = current_container else {
                approximate = true;
                break;
            };
            let Some(found) = self.content_with_component(container, component) else {
                approximate = true;
                break;
            };
            let next_container = found.as_container();
            if i + 1 < len && next_container.is_none() {
                approximate = true;
                break;
            }
            current = found;
            current_container = next_container;
        }

        SearchResult { obj: current, approximate }
    }

    /// Resolves `path` from `from`: relative paths against the nearest container, absolute ones against the root.
    pub(crate) fn resolve_path(&self, from: ObjectRef, path: &Path) -> SearchResult {
        if !path.is_relative() {
            return self.content_at_path(Self::ROOT, path, None);
        }
        match from {
            ObjectRef::Container(id) => self.content_at_path(id, path, None),
            // The leading `^` climbs out of the leaf into its container.
            ObjectRef::Leaf(container, _) => self.content_at_path(container, &path.tail(), None),
        }
    }

    pub(crate) fn pointer_at_path(&self, path: &Path) -> Result<PathLookup> {
        if path.is_empty() {
            return Ok(PathLookup { pointer: None, approximated_to: None });
        }

        let (result, index, used_len) = match path.last_component() {
            Some(Component::Index(index)) => {
                let used_len = path.len() - 1;
                (self.content_at_path(Self::ROOT, path, Some(used_len)), Some(*index), used_len)
            }
            _ => (self.content_at_path(Self::ROOT, path, None), None, path.len()),
        };

        if result.obj == ObjectRef::Container(Self::ROOT) && used_len > 0 {
            return Err(StoryError::runtime(format!(
                "Failed to find content at path '{}', and no approximation of it was possible.",
                path,
            )));
        }

        let pointer = result.container().map(|container| Pointer::new(container, index));
        let approximated_to = if result.approximate { Some(result.obj) } else { None };
        Ok(PathLookup { pointer, approximated_to })
    }

    /// Where a divert at `from` with target `path` lands.
    pub(crate) fn divert_target_pointer(&self, from: ObjectRef, path: &Path) -> Option<Pointer> {
        let result = self.resolve_path(from, path);
        match path.last_component() {
            Some(Component::Index(index)) if !result.approximate => {
                self.parent_of(result.obj).map(|container| Pointer::new(container, Some(*index)))
            }
            _ => result.container().map(Pointer::start_of),
        }
    }

    /// The absolute path a relative `path` reaches when resolved from `from`.
    pub(crate) fn globalise_path(&self, from: ObjectRef, path: &Path) -> Path {
        if !path.is_relative() {
            return path.clone();
        }
        let result = self.resolve_path(from, path);
        self.path_of(result.obj)
    }

    pub(crate) fn convert_path_to_relative(&self, from: ObjectRef, global_path: &Path) -> Path {
        let own_path = self.path_of(from);
        let shared = own_path
            .components()
            .iter()
            .zip(global_path.components())
            .take_while(|(own, other)| own == other)
            .count();
        if shared == 0 {
            return global_path.clone();
        }
        let upward_moves = own_path.len() - shared;
        let mut parts = vec![Component::Parent; upward_moves];
        parts.extend(global_path.components()[shared..].iter().cloned());
        Path::new(parts, true)
    }

    /// Whichever of the relative and absolute forms of `path` is shorter when written.
    pub(crate) fn compact_path_string(&self, from: ObjectRef, path: &Path) -> String {
        let (relative, global) = if path.is_relative() {
            (path.components_string(), self.path_of(from).append_path(path).components_string())
        } else {
            (self.convert_path_to_relative(from, path).components_string(), path.components_string())
        };
        if relative.len() < global.len() {
            relative
        } else {
            global
        }
    }
}
