use indexmap::IndexMap;

use super::{Object, Path};

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct ContainerId(pub(crate) usize);

#[derive(Clone, Debug, Default)]
pub struct Container {
    pub(crate) name: Option<String>,

    pub(crate) content: Vec<Object>,
    /// Every named child container, whether or not it also appears in `content`.
    pub(crate) named_content: IndexMap<String, ContainerId>,
    pub(crate) visits_should_be_counted: bool,
    pub(crate) turn_index_should_be_counted: bool,
    pub(crate) counting_at_start_only: bool,

    pub(crate) parent: Option<ContainerId>,
    pub(crate) index_in_parent: Option<usize>,
    pub(crate) path: Path,
}

impl Container {
    const VISITS: u32 = 0x1;
    const TURNS: u32 = 0x2;
    const COUNT_START_ONLY: u32 = 0x4;

    pub(crate) fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn content(&self) -> &[Object] {
        &self.content
    }

    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    /// Count flags in the json bitmask form. Counting at start only is dropped when nothing is counted.
    pub fn count_flags(&self) -> u32 {
        let mut flags = 0;
        if self.visits_should_be_counted { flags |= Self::VISITS; }
        if self.turn_index_should_be_counted { flags |= Self::TURNS; }
        if self.counting_at_start_only && flags != 0 { flags |= Self::COUNT_START_ONLY; }
        flags
    }

    pub(crate) fn set_count_flags(&mut self, flags: u32) {
        self.visits_should_be_counted = flags & Self::VISITS != 0;
        self.turn_index_should_be_counted = flags & Self::TURNS != 0;
        self.counting_at_start_only = flags & Self::COUNT_START_ONLY != 0;
    }

    pub(crate) fn index_of(&self, child: ContainerId) -> Option<usize> {
        self.content
            .iter()
            .position(|item| item.as_container() == Some(child))
    }

    /// Named children that are not part of the ordered content.
    pub(crate) fn named_only_content<'a>(&'a self) -> impl Iterator<Item = (&'a String, ContainerId)> + 'a {
        self.named_content
            .iter()
            .filter(move |(_, id)| self.index_of(**id).is_none())
            .map(|(name, id)| (name, *id))
    }
}
