use std::fmt::{self, Display, Formatter};
use std::ops::Index;
use std::str::FromStr;

/// The name used for the "parent" component of a relative path.
const PARENT_NAME: &str = "^";

#[derive(Clone, Hash, Eq, PartialEq, Debug)]
pub enum Component {
    Index(usize),
    Name(String),
    Parent,
}

impl Component {
    pub fn is_index(&self) -> bool {
        matches!(self, Component::Index(..))
    }

    pub fn is_parent(&self) -> bool {
        matches!(self, Component::Parent)
    }

    fn parse(part: &str) -> Self {
        if part == PARENT_NAME {
            Component::Parent
        } else if let Ok(index) = part.parse::<usize>() {
            Component::Index(index)
        } else {
            Component::Name(part.to_owned())
        }
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Component::Index(int) => write!(f, "{}", int),
            Component::Name(name) => write!(f, "{}", name),
            Component::Parent => write!(f, "{}", PARENT_NAME),
        }
    }
}

impl From<usize> for Component {
    fn from(v: usize) -> Self {
        Self::Index(v)
    }
}

impl From<String> for Component {
    fn from(v: String) -> Self {
        Self::Name(v)
    }
}

impl From<&str> for Component {
    fn from(v: &str) -> Self {
        Self::Name(v.to_owned())
    }
}

impl From<()> for Component {
    fn from((): ()) -> Self {
        Self::Parent
    }
}

/// A dot separated address into the story's container tree.
///
/// Absolute paths start at the root container. Relative paths start with a
/// `.` when written out, and climb with `^` components.
#[derive(Clone, Hash, Eq, PartialEq, Debug, Default)]
pub struct Path {
    pub(crate) parts: Vec<Component>,
    pub(crate) is_relative: bool,
}

impl Path {
    pub fn new(parts: Vec<Component>, is_relative: bool) -> Self {
        Self { parts, is_relative }
    }

    /// The relative path pointing at the object it is resolved from.
    pub fn to_self() -> Self {
        Self { parts: vec![], is_relative: true }
    }

    pub(crate) fn join<I: Into<Component>>(&mut self, part: I) {
        self.parts.push(part.into());
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn is_relative(&self) -> bool {
        self.is_relative
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn components(&self) -> &[Component] {
        &self.parts
    }

    pub fn head(&self) -> Option<&Component> {
        self.parts.first()
    }

    pub fn last_component(&self) -> Option<&Component> {
        self.parts.last()
    }

    /// Everything but the first component. The tail of a single component path is the self path.
    pub fn tail(&self) -> Path {
        if self.parts.len() >= 2 {
            Path { parts: self.parts[1..].to_vec(), is_relative: false }
        } else {
            Path::to_self()
        }
    }

    pub fn with_index(&self, index: usize) -> Path {
        let mut path = self.clone();
        path.join(index);
        path
    }

    /// Appends `other`, letting its leading parent components climb out of `self`.
    pub fn append_path(&self, other: &Path) -> Path {
        let upward_moves = other.parts.iter().take_while(|part| part.is_parent()).count();
        let kept = self.parts.len().saturating_sub(upward_moves);
        let parts = self.parts[..kept]
            .iter()
            .chain(other.parts[upward_moves..].iter())
            .cloned()
            .collect();
        Path { parts, is_relative: self.is_relative }
    }

    /// The components joined by `.`, prefixed with `.` when relative.
    pub fn components_string(&self) -> String {
        let joined = self.parts
            .iter()
            .map(|comp| comp.to_string())
            .collect::<Vec<_>>()
            .join(".");
        if self.is_relative {
            format!(".{}", joined)
        } else {
            joined
        }
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        Ok(Path::from(string))
    }
}

impl From<&str> for Path {
    fn from(string: &str) -> Self {
        if string.is_empty() {
            return Path::default();
        }
        let (is_relative, body) = match string.strip_prefix('.') {
            Some(rest) => (true, rest),
            None => (false, string),
        };
        let parts = body
            .split('.')
            .filter(|part| !part.is_empty())
            .map(Component::parse)
            .collect();
        Path { parts, is_relative }
    }
}

impl Index<usize> for Path {
    type Output = Component;
    fn index(&self, index: usize) -> &Self::Output {
        &self.parts[index]
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.components_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mixed_components() {
        let path = Path::from("knot.0.stitch");
        assert!(!path.is_relative());
        assert_eq!(path.components(), &[
            Component::Name("knot".into()),
            Component::Index(0),
            Component::Name("stitch".into()),
        ]);
        assert_eq!(path.to_string(), "knot.0.stitch");
    }

    #[test]
    fn parses_relative_paths() {
        let path = Path::from(".^.^.c-0");
        assert!(path.is_relative());
        assert!(path[0].is_parent());
        assert_eq!(path.len(), 3);
        assert_eq!(path.to_string(), ".^.^.c-0");
    }

    #[test]
    fn appending_climbs_parents() {
        let base = Path::from("a.b.0");
        let joined = base.append_path(&Path::from(".^.c"));
        assert_eq!(joined.to_string(), "a.b.c");
    }

    #[test]
    fn tail_of_short_path_is_self() {
        assert_eq!(Path::from("a").tail(), Path::to_self());
        assert_eq!(Path::from("a.b.c").tail().to_string(), "b.c");
    }

    #[test]
    fn equality_is_structural() {
        assert_eq!(Path::from("a.1"), Path::new(vec!["a".into(), 1.into()], false));
        assert_ne!(Path::from("a.1"), Path::from(".a.1"));
    }
}
