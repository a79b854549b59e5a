//! Contains the chunk status handle and the catalog which issues them.

use flexstr::SharedStr;

use crate::CatalogError;

/// A milestone a chunk can reach while it is being generated or loaded.
///
/// This is a lightweight handle carrying the dense index the status was registered with. Handles
/// are ordered by this index, so `Ord::max` picks the status which comes later in the pipeline.
/// A handle is only meaningful together with the [`StatusCatalog`] which issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ChunkStatus(u8);

impl ChunkStatus {
    pub(crate) const fn from_index(index: u8) -> Self {
        Self(index)
    }

    /// The position of this status within its catalog. The root status has index 0.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns `true` if `self` is `other` or comes after it.
    #[must_use]
    pub const fn is_or_after(self, other: Self) -> bool {
        self.0 >= other.0
    }

    /// Returns `true` if `self` comes strictly after `other`.
    #[must_use]
    pub const fn is_after(self, other: Self) -> bool {
        self.0 > other.0
    }

    /// Returns `true` if `self` is `other` or comes before it.
    #[must_use]
    pub const fn is_or_before(self, other: Self) -> bool {
        self.0 <= other.0
    }

    /// Returns `true` if `self` comes strictly before `other`.
    #[must_use]
    pub const fn is_before(self, other: Self) -> bool {
        self.0 < other.0
    }
}

/// Distinguishes the in-progress representation of a chunk from the final one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkType {
    /// mutable, in-progress chunk
    Proto,
    /// fully loaded chunk which takes part in the running world
    Level,
}

/// The kinds of height maps a chunk keeps track of.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HeightmapKind {
    /// highest non-air block, only used during generation
    WorldSurfaceWg,
    /// highest non-air block
    WorldSurface,
    /// highest solid block, only used during generation
    OceanFloorWg,
    /// highest solid block
    OceanFloor,
    /// highest block blocking motion or containing a fluid
    MotionBlocking,
    /// like `MotionBlocking` but ignoring leaves
    MotionBlockingNoLeaves,
}

impl HeightmapKind {
    /// Height maps which are valid before features have been placed.
    pub const PRE_FEATURES: &'static [Self] = &[Self::WorldSurfaceWg, Self::OceanFloorWg];

    /// Height maps which are valid once features have been placed.
    pub const POST_FEATURES: &'static [Self] = &[
        Self::WorldSurface,
        Self::OceanFloor,
        Self::MotionBlocking,
        Self::MotionBlockingNoLeaves,
    ];
}

/// Everything the catalog knows about a single status.
#[derive(Clone, Debug)]
pub struct StatusInfo {
    name: SharedStr,
    parent: Option<ChunkStatus>,
    heightmaps_after_status: Box<[HeightmapKind]>,
    chunk_type: ChunkType,
}

impl StatusInfo {
    /// The unique name of the status
    #[must_use]
    pub fn name(&self) -> &SharedStr {
        &self.name
    }

    /// The status directly preceding this one; `None` for the root status.
    #[must_use]
    pub fn parent(&self) -> Option<ChunkStatus> {
        self.parent
    }

    /// Height maps which are valid once a chunk has reached this status.
    #[must_use]
    pub fn heightmaps_after_status(&self) -> &[HeightmapKind] {
        &self.heightmaps_after_status
    }

    /// The chunk representation used at this status.
    #[must_use]
    pub fn chunk_type(&self) -> ChunkType {
        self.chunk_type
    }
}

/// The ordered catalog of all statuses a chunk may reach.
///
/// Statuses are registered once during startup, each one naming its predecessor. The catalog is
/// supposed to be shared (e.g. through an `Arc`) and not to be modified afterwards.
#[derive(Clone, Debug, Default)]
pub struct StatusCatalog {
    statuses: Vec<StatusInfo>,
}

impl StatusCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a new status to the end of the chain.
    ///
    /// The first status is registered without a parent and receives index 0. Every following
    /// status must name the most recently registered status as its parent and receives the next
    /// index.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken, the parent is not the last status of the chain, a
    /// second root is being registered or the catalog is full.
    pub fn register(
        &mut self,
        name: &str,
        parent: Option<ChunkStatus>,
        heightmaps_after_status: &[HeightmapKind],
        chunk_type: ChunkType,
    ) -> Result<ChunkStatus, CatalogError> {
        let name: SharedStr = name.to_owned().into();
        if self.by_name(&name).is_some() {
            return Err(CatalogError::DuplicateName(name));
        }

        let index = match parent {
            None if self.statuses.is_empty() => 0,
            None => return Err(CatalogError::SecondRoot { name }),
            Some(parent) if parent.index() >= self.statuses.len() => {
                return Err(CatalogError::UnknownParent { name, parent });
            }
            Some(parent) if parent.index() + 1 != self.statuses.len() => {
                return Err(CatalogError::ParentNotLast { name, parent });
            }
            Some(parent) => parent.index() + 1,
        };
        let index = u8::try_from(index).map_err(|_error| CatalogError::CatalogFull)?;

        self.statuses.push(StatusInfo {
            name,
            parent,
            heightmaps_after_status: heightmaps_after_status.into(),
            chunk_type,
        });

        Ok(ChunkStatus::from_index(index))
    }

    /// Returns everything known about the given status.
    #[must_use]
    pub fn get(&self, status: ChunkStatus) -> Option<&StatusInfo> {
        self.statuses.get(status.index())
    }

    /// Returns the name of the given status or an empty string if it's unknown.
    #[must_use]
    pub fn name(&self, status: ChunkStatus) -> &str {
        self.get(status).map_or("", |info| &*info.name)
    }

    /// Looks up a status by its name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<ChunkStatus> {
        self.statuses
            .iter()
            .position(|info| &*info.name == name)
            .and_then(|index| u8::try_from(index).ok())
            .map(ChunkStatus::from_index)
    }

    /// The status directly preceding the given one; `None` for the root and for unknown
    /// statuses.
    #[must_use]
    pub fn parent(&self, status: ChunkStatus) -> Option<ChunkStatus> {
        self.get(status).and_then(StatusInfo::parent)
    }

    /// Returns `true` if this is the status every chunk starts with.
    #[must_use]
    pub fn is_root(&self, status: ChunkStatus) -> bool {
        self.get(status).is_some_and(|info| info.parent.is_none())
    }

    /// The status following the given one. The last status is its own successor.
    #[must_use]
    pub fn next_status(&self, status: ChunkStatus) -> ChunkStatus {
        let next = status.index() + 1;
        if next < self.statuses.len() {
            u8::try_from(next).map_or(status, ChunkStatus::from_index)
        } else {
            status
        }
    }

    /// The chunk representation used at the given status.
    #[must_use]
    pub fn chunk_type(&self, status: ChunkStatus) -> Option<ChunkType> {
        self.get(status).map(StatusInfo::chunk_type)
    }

    /// Height maps which are valid once a chunk has reached the given status.
    #[must_use]
    pub fn heightmaps_after(&self, status: ChunkStatus) -> &[HeightmapKind] {
        self.get(status)
            .map(StatusInfo::heightmaps_after_status)
            .unwrap_or_default()
    }

    /// All registered statuses in ascending order.
    pub fn statuses(&self) -> impl DoubleEndedIterator<Item = ChunkStatus> + '_ {
        (0..self.statuses.len())
            .filter_map(|index| u8::try_from(index).ok())
            .map(ChunkStatus::from_index)
    }

    /// The status every chunk starts with.
    #[must_use]
    pub fn first(&self) -> Option<ChunkStatus> {
        self.statuses().next()
    }

    /// The final status of the pipeline.
    #[must_use]
    pub fn last(&self) -> Option<ChunkStatus> {
        self.statuses().next_back()
    }

    /// Number of registered statuses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Returns `true` if nothing has been registered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    fn chain(length: usize) -> (StatusCatalog, Vec<ChunkStatus>) {
        let mut catalog = StatusCatalog::new();
        let mut statuses: Vec<ChunkStatus> = Vec::new();
        for index in 0..length {
            let status = catalog
                .register(
                    &format!("s{index}"),
                    statuses.last().copied(),
                    HeightmapKind::PRE_FEATURES,
                    ChunkType::Proto,
                )
                .unwrap();
            statuses.push(status);
        }
        (catalog, statuses)
    }

    #[test]
    fn indices_follow_the_parent_chain() {
        let (catalog, statuses) = chain(6);
        for (expected, &status) in statuses.iter().enumerate() {
            assert_eq!(status.index(), expected);

            let mut steps = 0;
            let mut current = status;
            while let Some(parent) = catalog.parent(current) {
                assert_eq!(parent.index() + 1, current.index());
                current = parent;
                steps += 1;
            }
            assert_eq!(current.index(), 0);
            assert_eq!(steps, status.index());
        }
    }

    #[test]
    fn root_and_successors() {
        let (catalog, statuses) = chain(3);
        assert!(catalog.is_root(statuses[0]));
        assert!(!catalog.is_root(statuses[1]));
        assert_eq!(catalog.parent(statuses[0]), None);
        assert_eq!(catalog.next_status(statuses[0]), statuses[1]);
        assert_eq!(catalog.next_status(statuses[2]), statuses[2]);
        assert_eq!(catalog.first(), Some(statuses[0]));
        assert_eq!(catalog.last(), Some(statuses[2]));
        assert_eq!(catalog.by_name("s1"), Some(statuses[1]));
        assert_eq!(catalog.by_name("nope"), None);
        assert_eq!(catalog.name(statuses[2]), "s2");
    }

    #[test]
    fn comparisons() {
        let (_catalog, statuses) = chain(3);
        let (early, late) = (statuses[0], statuses[2]);
        assert!(late.is_after(early));
        assert!(late.is_or_after(early));
        assert!(late.is_or_after(late));
        assert!(!late.is_after(late));
        assert!(early.is_before(late));
        assert!(early.is_or_before(early));
        assert!(!late.is_or_before(early));
    }

    #[test]
    fn max_is_commutative_and_picks_the_later_status() {
        let (_catalog, statuses) = chain(5);
        for &first in &statuses {
            for &second in &statuses {
                let max = first.max(second);
                assert_eq!(max, second.max(first));
                assert_eq!(max.index(), first.index().max(second.index()));
            }
        }
    }

    #[test]
    fn malformed_registrations() {
        let (mut catalog, statuses) = chain(3);

        assert_eq!(
            catalog.register("s1", Some(statuses[2]), &[], ChunkType::Proto),
            Err(CatalogError::DuplicateName(SharedStr::from_static("s1")))
        );
        assert!(matches!(
            catalog.register("root", None, &[], ChunkType::Proto),
            Err(CatalogError::SecondRoot { .. })
        ));
        assert!(matches!(
            catalog.register("branch", Some(statuses[0]), &[], ChunkType::Proto),
            Err(CatalogError::ParentNotLast { .. })
        ));
        assert!(matches!(
            catalog.register("stranger", Some(ChunkStatus(7)), &[], ChunkType::Proto),
            Err(CatalogError::UnknownParent { .. })
        ));
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn catalog_is_limited_to_u8_indices() {
        let (mut catalog, statuses) = chain(256);
        assert!(matches!(
            catalog.register("overflow", statuses.last().copied(), &[], ChunkType::Level),
            Err(CatalogError::CatalogFull)
        ));
    }
}
