use glam::DVec3;

/// Stable handle to a particle slot in the [`ParticleArena`].
///
/// Slots are never deallocated; a particle that leaves the simulation volume
/// of a rank is returned to the free list and its slot recycled, so a
/// `ParticleId` held across list surgery stays valid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParticleId(u32);

/// One molecule. Spatial quantities are pre-scaled by powers of the timestep:
/// the velocity field stores `v * dt` and the acceleration field
/// `a * dt^2 / 2`, both in Angstrom, which removes `dt` from the inner loops.
///
/// The intrusive `prev`/`next` links make every particle a node of exactly
/// one [`ParticleList`] at any time.
#[derive(Clone, Debug, Default)]
pub struct Particle {
    pub(crate) next: Option<ParticleId>,
    pub(crate) prev: Option<ParticleId>,
    /// Index into the species table.
    pub kind: usize,
    /// Globally unique number assigned at initial-state ingest, stable for
    /// the lifetime of the simulation.
    pub serial: i32,
    /// Position [Angstrom].
    pub pos: DVec3,
    /// Velocity * dt [Angstrom].
    pub vel_dt: DVec3,
    /// Acceleration * dt^2 / 2 [Angstrom].
    pub acc_dt2_half: DVec3,
}

/// Backing store for all particles of a rank. Allocation only ever grows;
/// reuse goes through the owning process' free list.
#[derive(Default)]
pub struct ParticleArena {
    slots: Vec<Particle>,
}

impl ParticleArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, particle: Particle) -> ParticleId {
        let id = ParticleId(self.slots.len() as u32);
        self.slots.push(particle);
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn get(&self, id: ParticleId) -> &Particle {
        &self.slots[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ParticleId) -> &mut Particle {
        &mut self.slots[id.0 as usize]
    }

    pub fn next_of(&self, id: ParticleId) -> Option<ParticleId> {
        self.slots[id.0 as usize].next
    }
}

impl std::ops::Index<ParticleId> for ParticleArena {
    type Output = Particle;

    fn index(&self, id: ParticleId) -> &Particle {
        self.get(id)
    }
}

impl std::ops::IndexMut<ParticleId> for ParticleArena {
    fn index_mut(&mut self, id: ParticleId) -> &mut Particle {
        self.get_mut(id)
    }
}

/// A doubly-linked list of particles, threaded through the intrusive links in
/// the arena. All operations that reshape the list are O(1), including moving
/// the entire list into another one, which is what makes clearing the halo
/// and recycling through the free list cheap.
#[derive(Clone, Copy, Debug, Default)]
pub struct ParticleList {
    head: Option<ParticleId>,
    tail: Option<ParticleId>,
}

impl ParticleList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn head(&self) -> Option<ParticleId> {
        self.head
    }

    pub fn is_empty(&self) -> bool {
        debug_assert_eq!(self.head.is_none(), self.tail.is_none());
        self.head.is_none()
    }

    pub fn push_back(&mut self, arena: &mut ParticleArena, id: ParticleId) {
        let p = arena.get_mut(id);
        p.next = None;
        p.prev = self.tail;
        match self.tail {
            Some(tail) => arena.get_mut(tail).next = Some(id),
            None => {
                debug_assert!(self.head.is_none());
                self.head = Some(id);
            }
        }
        self.tail = Some(id);
    }

    pub fn remove(&mut self, arena: &mut ParticleArena, id: ParticleId) {
        let (prev, next) = {
            let p = arena.get(id);
            (p.prev, p.next)
        };
        match prev {
            Some(prev) => arena.get_mut(prev).next = next,
            None => {
                debug_assert_eq!(self.head, Some(id));
                self.head = next;
            }
        }
        match next {
            Some(next) => arena.get_mut(next).prev = prev,
            None => {
                debug_assert_eq!(self.tail, Some(id));
                self.tail = prev;
            }
        }
        let p = arena.get_mut(id);
        p.prev = None;
        p.next = None;
    }

    pub fn pop_back(&mut self, arena: &mut ParticleArena) -> Option<ParticleId> {
        let tail = self.tail?;
        self.remove(arena, tail);
        Some(tail)
    }

    /// Splices every node of this list onto the back of `other` in O(1),
    /// leaving this list empty.
    pub fn move_all_to(&mut self, arena: &mut ParticleArena, other: &mut ParticleList) {
        let (Some(head), Some(tail)) = (self.head, self.tail) else {
            debug_assert!(self.head.is_none() && self.tail.is_none());
            return;
        };
        match other.tail {
            Some(other_tail) => {
                arena.get_mut(other_tail).next = Some(head);
                arena.get_mut(head).prev = Some(other_tail);
            }
            None => other.head = Some(head),
        }
        other.tail = Some(tail);
        self.head = None;
        self.tail = None;
    }

    /// Walks the list. O(n); the step loop only ever needs it through the
    /// cursor pattern, this is for bookkeeping and tests.
    pub fn count(&self, arena: &ParticleArena) -> usize {
        let mut n = 0;
        let mut cur = self.head;
        while let Some(id) = cur {
            n += 1;
            cur = arena.next_of(id);
        }
        n
    }

    pub fn ids<'a>(&self, arena: &'a ParticleArena) -> ParticleIds<'a> {
        ParticleIds {
            arena,
            cur: self.head,
        }
    }
}

pub struct ParticleIds<'a> {
    arena: &'a ParticleArena,
    cur: Option<ParticleId>,
}

impl Iterator for ParticleIds<'_> {
    type Item = ParticleId;

    fn next(&mut self) -> Option<ParticleId> {
        let id = self.cur?;
        self.cur = self.arena.next_of(id);
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use glam::DVec3;

    use super::Particle;
    use super::ParticleArena;
    use super::ParticleList;

    fn particle(serial: i32) -> Particle {
        Particle {
            serial,
            pos: DVec3::splat(serial as f64),
            ..Particle::default()
        }
    }

    fn serials(list: &ParticleList, arena: &ParticleArena) -> Vec<i32> {
        list.ids(arena).map(|id| arena[id].serial).collect()
    }

    #[test]
    fn push_and_remove_keep_order() {
        let mut arena = ParticleArena::new();
        let mut list = ParticleList::new();
        let ids: Vec<_> = (0..4).map(|i| arena.push(particle(i))).collect();
        for id in &ids {
            list.push_back(&mut arena, *id);
        }
        assert_eq!(serials(&list, &arena), vec![0, 1, 2, 3]);

        list.remove(&mut arena, ids[1]);
        assert_eq!(serials(&list, &arena), vec![0, 2, 3]);
        list.remove(&mut arena, ids[0]);
        assert_eq!(serials(&list, &arena), vec![2, 3]);
        list.remove(&mut arena, ids[3]);
        assert_eq!(serials(&list, &arena), vec![2]);
        list.remove(&mut arena, ids[2]);
        assert!(list.is_empty());
        assert_eq!(list.count(&arena), 0);
    }

    #[test]
    fn pop_back_returns_the_tail() {
        let mut arena = ParticleArena::new();
        let mut list = ParticleList::new();
        for i in 0..3 {
            let id = arena.push(particle(i));
            list.push_back(&mut arena, id);
        }
        let id = list.pop_back(&mut arena).unwrap();
        assert_eq!(arena[id].serial, 2);
        assert_eq!(serials(&list, &arena), vec![0, 1]);
    }

    #[test]
    fn move_all_to_splices_in_order() {
        let mut arena = ParticleArena::new();
        let mut a = ParticleList::new();
        let mut b = ParticleList::new();
        for i in 0..2 {
            let id = arena.push(particle(i));
            a.push_back(&mut arena, id);
        }
        for i in 2..5 {
            let id = arena.push(particle(i));
            b.push_back(&mut arena, id);
        }
        b.move_all_to(&mut arena, &mut a);
        assert!(b.is_empty());
        assert_eq!(serials(&a, &arena), vec![0, 1, 2, 3, 4]);

        // Splicing into an empty list hands over the whole chain.
        let mut c = ParticleList::new();
        a.move_all_to(&mut arena, &mut c);
        assert!(a.is_empty());
        assert_eq!(c.count(&arena), 5);

        // Splicing an empty list is a no-op.
        a.move_all_to(&mut arena, &mut c);
        assert_eq!(c.count(&arena), 5);
    }
}
