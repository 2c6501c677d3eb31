//! Allocation of fields within a struct's data and pointer sections.
//!
//! Data fields are packed with a hole-filling allocator: when a field smaller
//! than a word is allocated, the unused remainder of the word is remembered as
//! a set of power-of-two sized holes that later fields are placed into.
//!
//! Union members overlay each other. Every member is laid out in a scope of
//! its own that draws on the locations its union has already taken from the
//! enclosing scope, and only asks for new space when none of them fit. The
//! discriminant is allocated when the union's second member is first given
//! space.

/// Number of hole sizes tracked, from 1 bit up to 32 bits.
const HOLE_SIZES: usize = 6;

/// The largest allocation, a whole word.
const LG_WORD_BITS: u32 = 6;

/// Unused space at the end of partially filled words, indexed by the base-2
/// logarithm of the hole's size in bits. Offsets are in units of the hole's
/// size. Zero marks an absent hole, as a hole can never start at offset zero.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct HoleSet {
    holes: [u32; HOLE_SIZES],
}

impl HoleSet {
    fn try_allocate(&mut self, lg_size: u32) -> Option<u32> {
        let index = lg_size as usize;
        if index >= HOLE_SIZES {
            None
        } else if self.holes[index] != 0 {
            Some(std::mem::take(&mut self.holes[index]))
        } else {
            let next = self.try_allocate(lg_size + 1)?;
            let offset = next * 2;
            self.holes[index] = offset + 1;
            Some(offset)
        }
    }

    /// Record the holes left after an allocation of `lg_size` bits ends just
    /// before `offset`, for hole sizes below `limit`. `offset` is in units of
    /// `lg_size`.
    fn add_holes_at_end(&mut self, mut lg_size: u32, mut offset: u32, limit: u32) {
        while lg_size < limit && (lg_size as usize) < HOLE_SIZES {
            self.holes[lg_size as usize] = offset;
            lg_size += 1;
            offset = (offset + 1) / 2;
        }
    }

    /// The size of the smallest hole of at least `lg_size`.
    fn smallest_at_least(&self, lg_size: u32) -> Option<u32> {
        (lg_size..HOLE_SIZES as u32).find(|size| self.holes[*size as usize] != 0)
    }

    /// Grow the allocation at `offset` by merging it with the holes after it.
    fn try_expand(&mut self, lg_size: u32, offset: u32, factor: u32) -> bool {
        if factor == 0 {
            return true;
        }
        let index = lg_size as usize;
        if index >= HOLE_SIZES || self.holes[index] != offset + 1 {
            return false;
        }
        if self.try_expand(lg_size + 1, offset >> 1, factor - 1) {
            self.holes[index] = 0;
            true
        } else {
            false
        }
    }
}

/// Where fields are allocated from: the struct itself, or one member of a
/// union.
pub type ScopeId = usize;

pub type UnionId = usize;

/// A slice of the enclosing scope's data section owned by a union.
#[derive(Copy, Clone, Debug)]
struct DataLocation {
    lg_size: u32,
    /// In units of `lg_size`.
    offset: u32,
}

#[derive(Debug)]
struct Union {
    parent: ScopeId,
    members: u32,
    discriminant: Option<u32>,
    data: Vec<DataLocation>,
    pointers: Vec<u32>,
}

/// How much of one of its union's data locations a member uses.
#[derive(Clone, Debug, Default)]
struct Usage {
    /// Size of the used prefix, if any of the location is used.
    used: Option<u32>,
    /// Holes within the used prefix, with offsets relative to the location.
    holes: HoleSet,
}

impl Usage {
    fn smallest_hole_at_least(&self, location: DataLocation, lg_size: u32) -> Option<u32> {
        let used = match self.used {
            None => return (lg_size <= location.lg_size).then(|| location.lg_size),
            Some(used) => used,
        };
        if lg_size >= used {
            (lg_size < location.lg_size).then(|| lg_size)
        } else if let Some(hole) = self.holes.smallest_at_least(lg_size) {
            Some(hole)
        } else {
            (used < location.lg_size).then(|| used)
        }
    }

    /// Allocate from the hole found by `smallest_hole_at_least`.
    fn allocate(&mut self, location: DataLocation, lg_size: u32) -> u32 {
        let base = location.offset << (location.lg_size - lg_size);
        let used = match self.used {
            None => {
                self.used = Some(lg_size);
                return base;
            }
            Some(used) => used,
        };
        if lg_size >= used {
            self.holes.add_holes_at_end(used, 1, lg_size);
            self.used = Some(lg_size + 1);
            base + 1
        } else if let Some(hole) = self.holes.try_allocate(lg_size) {
            base + hole
        } else {
            let offset = 1 << (used - lg_size);
            self.holes.add_holes_at_end(lg_size, offset + 1, used);
            self.used = Some(used + 1);
            base + offset
        }
    }
}

#[derive(Debug)]
enum Scope {
    Top,
    Member {
        union: UnionId,
        usage: Vec<Usage>,
        pointers_used: usize,
        has_members: bool,
    },
}

/// The data words and pointer slots allocated so far for a struct, the
/// groups that share its region, and the unions within it.
#[derive(Debug)]
pub struct StructLayout {
    holes: HoleSet,
    data_words: u16,
    pointers: u16,
    scopes: Vec<Scope>,
    unions: Vec<Union>,
}

impl Default for StructLayout {
    fn default() -> StructLayout {
        StructLayout::new()
    }
}

impl StructLayout {
    /// The struct's own scope.
    pub const TOP: ScopeId = 0;

    pub fn new() -> StructLayout {
        StructLayout {
            holes: HoleSet::default(),
            data_words: 0,
            pointers: 0,
            scopes: vec![Scope::Top],
            unions: Vec::new(),
        }
    }

    /// A union whose locations are taken from `parent`.
    pub fn add_union(&mut self, parent: ScopeId) -> UnionId {
        self.unions.push(Union {
            parent,
            members: 0,
            discriminant: None,
            data: Vec::new(),
            pointers: Vec::new(),
        });
        self.unions.len() - 1
    }

    /// A member of `union`. Nothing is allocated until the member's first
    /// field is.
    pub fn add_member(&mut self, union: UnionId) -> ScopeId {
        self.scopes.push(Scope::Member {
            union,
            usage: Vec::new(),
            pointers_used: 0,
            has_members: false,
        });
        self.scopes.len() - 1
    }

    /// The discriminant's offset in 16-bit units, once two members have
    /// fields.
    pub fn discriminant(&self, union: UnionId) -> Option<u32> {
        self.unions[union].discriminant
    }

    /// Allocate `1 << lg_size` bits in the data section, returning the offset
    /// in units of the allocation's size.
    pub fn add_data(&mut self, scope: ScopeId, lg_size: u32) -> u32 {
        match self.scopes[scope] {
            Scope::Top => self.add_top_data(lg_size),
            Scope::Member { union, .. } => self.add_member_data(scope, union, lg_size),
        }
    }

    /// Allocate a pointer slot, returning its index.
    pub fn add_pointer(&mut self, scope: ScopeId) -> u32 {
        let (union, used) = match &mut self.scopes[scope] {
            Scope::Top => {
                let slot = self.pointers;
                self.pointers += 1;
                return u32::from(slot);
            }
            Scope::Member {
                union,
                pointers_used,
                ..
            } => {
                *pointers_used += 1;
                (*union, *pointers_used - 1)
            }
        };
        self.mark_used(scope);

        if let Some(slot) = self.unions[union].pointers.get(used) {
            return *slot;
        }
        let slot = self.add_pointer(self.unions[union].parent);
        self.unions[union].pointers.push(slot);
        slot
    }

    /// A field that takes no space still counts as a member of its union.
    pub fn add_void(&mut self, scope: ScopeId) {
        self.mark_used(scope);
    }

    pub fn data_words(&self) -> u16 {
        self.data_words
    }

    pub fn pointers(&self) -> u16 {
        self.pointers
    }

    fn add_top_data(&mut self, lg_size: u32) -> u32 {
        if let Some(offset) = self.holes.try_allocate(lg_size) {
            return offset;
        }
        let offset = u32::from(self.data_words) << (LG_WORD_BITS - lg_size);
        self.data_words += 1;
        self.holes.add_holes_at_end(lg_size, offset + 1, HOLE_SIZES as u32);
        offset
    }

    fn mark_used(&mut self, scope: ScopeId) {
        let union = match &mut self.scopes[scope] {
            Scope::Member {
                union,
                has_members: has_members @ false,
                ..
            } => {
                *has_members = true;
                *union
            }
            _ => return,
        };
        self.unions[union].members += 1;
        if self.unions[union].members == 2 && self.unions[union].discriminant.is_none() {
            let offset = self.add_data(self.unions[union].parent, 4);
            self.unions[union].discriminant = Some(offset);
        }
    }

    fn add_member_data(&mut self, scope: ScopeId, union: UnionId, lg_size: u32) -> u32 {
        self.mark_used(scope);

        let locations = self.unions[union].data.clone();
        let usage = self.usage_mut(scope, locations.len());

        let mut best: Option<(u32, usize)> = None;
        for (index, location) in locations.iter().enumerate() {
            if let Some(hole) = usage[index].smallest_hole_at_least(*location, lg_size) {
                if best.map_or(true, |(size, _)| hole < size) {
                    best = Some((hole, index));
                }
            }
        }
        if let Some((_, index)) = best {
            return usage[index].allocate(locations[index], lg_size);
        }

        // Grow a location into the space after it before taking new space.
        for index in 0..locations.len() {
            let wanted = match self.usage_mut(scope, locations.len())[index].used {
                None => lg_size,
                Some(used) => used.max(lg_size) + 1,
            };
            if wanted <= LG_WORD_BITS && self.expand_location(union, index, wanted) {
                let location = self.unions[union].data[index];
                return self.usage_mut(scope, locations.len())[index].allocate(location, lg_size);
            }
        }

        let offset = self.add_data(self.unions[union].parent, lg_size);
        self.unions[union].data.push(DataLocation { lg_size, offset });
        let usage = self.usage_mut(scope, locations.len() + 1);
        usage[locations.len()].used = Some(lg_size);
        offset
    }

    /// The member's usage of each of its union's locations.
    fn usage_mut(&mut self, scope: ScopeId, locations: usize) -> &mut Vec<Usage> {
        match &mut self.scopes[scope] {
            Scope::Member { usage, .. } => {
                if usage.len() < locations {
                    usage.resize(locations, Usage::default());
                }
                usage
            }
            Scope::Top => unreachable!("the top scope has no union locations"),
        }
    }

    fn expand_location(&mut self, union: UnionId, index: usize, lg_size: u32) -> bool {
        let location = self.unions[union].data[index];
        if lg_size <= location.lg_size {
            return true;
        }
        let factor = lg_size - location.lg_size;
        let parent = self.unions[union].parent;
        if !self.try_expand_data(parent, location.lg_size, location.offset, factor) {
            return false;
        }
        self.unions[union].data[index] = DataLocation {
            lg_size,
            offset: location.offset >> factor,
        };
        true
    }

    /// Grow an existing allocation of `scope` in place.
    fn try_expand_data(&mut self, scope: ScopeId, lg_size: u32, offset: u32, factor: u32) -> bool {
        let union = match &self.scopes[scope] {
            Scope::Top => return self.holes.try_expand(lg_size, offset, factor),
            Scope::Member { union, .. } => *union,
        };
        if lg_size + factor > LG_WORD_BITS {
            return false;
        }

        let locations = self.unions[union].data.clone();
        let found = locations.iter().enumerate().find(|(_, location)| {
            location.lg_size >= lg_size && offset >> (location.lg_size - lg_size) == location.offset
        });
        let (index, location) = match found {
            Some((index, location)) => (index, *location),
            None => return false,
        };
        let local = offset - (location.offset << (location.lg_size - lg_size));

        let usage = self.usage_mut(scope, locations.len());
        if local == 0 && usage[index].used == Some(lg_size) {
            let wanted = lg_size + factor;
            if !self.expand_location(union, index, wanted) {
                return false;
            }
            self.usage_mut(scope, locations.len())[index].used = Some(wanted);
            true
        } else {
            usage[index].holes.try_expand(lg_size, local, factor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOP: ScopeId = StructLayout::TOP;

    #[test]
    fn words_are_allocated_in_order() {
        let mut layout = StructLayout::new();
        assert_eq!(layout.add_data(TOP, 6), 0);
        assert_eq!(layout.add_data(TOP, 6), 1);
        assert_eq!(layout.data_words(), 2);
    }

    #[test]
    fn small_fields_fill_holes() {
        let mut layout = StructLayout::new();
        // A bool takes bit 0 of the first word.
        assert_eq!(layout.add_data(TOP, 0), 0);
        // A 16-bit value takes bits 16..32.
        assert_eq!(layout.add_data(TOP, 4), 1);
        // A byte fills the hole left in the first 16 bits.
        assert_eq!(layout.add_data(TOP, 3), 1);
        // A 32-bit value takes the upper half of the word.
        assert_eq!(layout.add_data(TOP, 5), 1);
        assert_eq!(layout.data_words(), 1);
        // Nothing is left in the first word.
        assert_eq!(layout.add_data(TOP, 5), 2);
        assert_eq!(layout.data_words(), 2);
    }

    #[test]
    fn bits_pack_together() {
        let mut layout = StructLayout::new();
        let bits = (0..10).map(|_| layout.add_data(TOP, 0)).collect::<Vec<_>>();
        assert_eq!(bits, (0..10).collect::<Vec<_>>());
        assert_eq!(layout.data_words(), 1);
    }

    #[test]
    fn pointers_count_up() {
        let mut layout = StructLayout::new();
        assert_eq!(layout.add_pointer(TOP), 0);
        assert_eq!(layout.add_pointer(TOP), 1);
        assert_eq!(layout.pointers(), 2);
    }

    #[test]
    fn union_members_overlap() {
        let mut layout = StructLayout::new();
        let union = layout.add_union(TOP);
        let a = layout.add_member(union);
        let b = layout.add_member(union);

        assert_eq!(layout.add_data(a, 6), 0);
        assert_eq!(layout.discriminant(union), None);
        assert_eq!(layout.add_data(b, 6), 0);
        // The second member brings the discriminant with it.
        assert_eq!(layout.discriminant(union), Some(4));
        assert_eq!(layout.data_words(), 2);
    }

    #[test]
    fn union_pointers_overlap() {
        let mut layout = StructLayout::new();
        let union = layout.add_union(TOP);
        let a = layout.add_member(union);
        let b = layout.add_member(union);

        assert_eq!(layout.add_pointer(a), 0);
        assert_eq!(layout.add_pointer(b), 0);
        assert_eq!(layout.add_pointer(b), 1);
        assert_eq!(layout.pointers(), 2);
    }

    #[test]
    fn union_location_grows_into_holes() {
        let mut layout = StructLayout::new();
        let union = layout.add_union(TOP);
        let a = layout.add_member(union);
        let b = layout.add_member(union);
        let c = layout.add_member(union);

        assert_eq!(layout.add_data(a, 0), 0);
        // The discriminant goes into bits 16..32.
        assert_eq!(layout.add_data(b, 0), 0);
        assert_eq!(layout.discriminant(union), Some(1));
        // A byte grows the one-bit location over the free bits after it.
        assert_eq!(layout.add_data(c, 3), 0);
        assert_eq!(layout.data_words(), 1);
    }

    #[test]
    fn member_packs_small_fields_in_a_location() {
        let mut layout = StructLayout::new();
        let union = layout.add_union(TOP);
        let a = layout.add_member(union);
        let b = layout.add_member(union);

        assert_eq!(layout.add_data(a, 6), 0);
        // Both fields of `b` share the word taken by `a`.
        assert_eq!(layout.add_data(b, 5), 0);
        assert_eq!(layout.add_data(b, 5), 1);
        assert_eq!(layout.data_words(), 2);
    }
}
