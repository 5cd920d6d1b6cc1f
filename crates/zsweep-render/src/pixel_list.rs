//! Per-pixel fragment lists sorted by depth, backed by a pooled arena.
//!
//! Fragments live in a [`FragmentPool`]: a vector of nodes linked through
//! indices, with an intrusive free list. The pool grows by blocks that double
//! in size and is never shrunk, so after the first few renders the sweep
//! allocates nothing.

use zsweep_core::SweepDirection;

/// Depth tolerance of the insertion tie rule.
pub const DEPTH_TOLERANCE: f64 = 1.0e-8;

/// Size of the first block the pool allocates.
pub const POOL_BLOCK_SIZE: usize = 64;

const NIL: u32 = u32::MAX;

/// One rasterized sample of a face.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fragment {
    /// World position and scalar.
    pub values: [f64; 4],
    /// Normalized device depth.
    pub z: f64,
    /// Whether the ray leaves the mesh at this fragment.
    pub exit: bool,
}

#[derive(Debug, Clone, Copy)]
struct Node {
    fragment: Fragment,
    previous: u32,
    next: u32,
}

/// Arena of list nodes with a free list.
#[derive(Debug, Clone)]
pub struct FragmentPool {
    nodes: Vec<Node>,
    free: u32,
    free_count: usize,
    blocks: usize,
}

impl Default for FragmentPool {
    fn default() -> Self {
        Self::new()
    }
}

impl FragmentPool {
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            free: NIL,
            free_count: 0,
            blocks: 0,
        }
    }

    /// Total number of nodes, free or in use.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes currently holding a fragment.
    pub fn in_use(&self) -> usize {
        self.nodes.len() - self.free_count
    }

    /// Blocks allocated so far.
    pub fn blocks(&self) -> usize {
        self.blocks
    }

    fn grow(&mut self) {
        let block = self.nodes.len().max(POOL_BLOCK_SIZE);
        let start = self.nodes.len();
        self.nodes.reserve_exact(block);
        for i in start..start + block {
            let next = if i + 1 < start + block {
                #[allow(clippy::cast_possible_truncation)]
                let next = (i + 1) as u32;
                next
            } else {
                self.free
            };
            self.nodes.push(Node {
                fragment: Fragment::default(),
                previous: NIL,
                next,
            });
        }
        #[allow(clippy::cast_possible_truncation)]
        let head = start as u32;
        self.free = head;
        self.free_count += block;
        self.blocks += 1;
        log::trace!("fragment pool grew to {} entries", self.nodes.len());
    }

    fn allocate(&mut self, fragment: Fragment) -> u32 {
        if self.free == NIL {
            self.grow();
        }
        let index = self.free;
        let node = &mut self.nodes[index as usize];
        self.free = node.next;
        node.fragment = fragment;
        node.previous = NIL;
        node.next = NIL;
        self.free_count -= 1;
        index
    }

    fn release(&mut self, index: u32) {
        self.nodes[index as usize].next = self.free;
        self.free = index;
        self.free_count += 1;
    }

    /// Returns the linked run `first..=last` of `len` nodes in one splice.
    fn release_run(&mut self, first: u32, last: u32, len: usize) {
        self.nodes[last as usize].next = self.free;
        self.free = first;
        self.free_count += len;
    }
}

#[derive(Debug, Clone, Copy)]
struct PixelList {
    first: u32,
    last: u32,
    len: u32,
}

impl PixelList {
    const EMPTY: Self = Self {
        first: NIL,
        last: NIL,
        len: 0,
    };
}

/// Depth-sorted fragment lists for every pixel of the image in use.
#[derive(Debug, Clone)]
pub struct PixelListStore {
    pool: FragmentPool,
    lists: Vec<PixelList>,
    width: usize,
    height: usize,
    direction: SweepDirection,
    max_size: usize,
    max_size_reached: bool,
}

impl PixelListStore {
    /// Creates empty lists for a `width` x `height` image.
    pub fn new(width: usize, height: usize, direction: SweepDirection, max_size: usize) -> Self {
        Self {
            pool: FragmentPool::new(),
            lists: vec![PixelList::EMPTY; width * height],
            width,
            height,
            direction,
            max_size,
            max_size_reached: false,
        }
    }

    /// Empties every list and adopts a new size and direction; the pool is kept.
    pub fn reset(&mut self, width: usize, height: usize, direction: SweepDirection, max_size: usize) {
        self.clear_all();
        if width * height != self.lists.len() {
            self.lists = vec![PixelList::EMPTY; width * height];
        }
        self.width = width;
        self.height = height;
        self.direction = direction;
        self.max_size = max_size;
        self.max_size_reached = false;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pool(&self) -> &FragmentPool {
        &self.pool
    }

    /// Whether some list grew beyond the maximum size since the last reset
    /// of the flag.
    pub fn max_size_reached(&self) -> bool {
        self.max_size_reached
    }

    pub fn reset_max_size_reached(&mut self) {
        self.max_size_reached = false;
    }

    fn slot(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        y * self.width + x
    }

    /// Whether the list at an existing node must stay behind `fragment`.
    fn stays_behind(&self, existing: f64, fragment: &Fragment) -> bool {
        let (a, b) = match self.direction {
            SweepDirection::FrontToBack => (existing, fragment.z),
            SweepDirection::BackToFront => (-existing, -fragment.z),
        };
        if fragment.exit {
            a > b + DEPTH_TOLERANCE
        } else {
            a >= b - DEPTH_TOLERANCE
        }
    }

    /// Inserts `fragment` into the list of pixel `(x, y)` keeping it sorted
    /// in sweep order.
    ///
    /// Within [`DEPTH_TOLERANCE`], an exit fragment goes after the fragments
    /// already there and any other fragment before them.
    pub fn add_and_sort(&mut self, x: usize, y: usize, fragment: Fragment) {
        let slot = self.slot(x, y);
        let index = self.pool.allocate(fragment);

        let mut after = self.lists[slot].last;
        while after != NIL {
            let node = &self.pool.nodes[after as usize];
            if !self.stays_behind(node.fragment.z, &fragment) {
                break;
            }
            after = node.previous;
        }

        let list = &mut self.lists[slot];
        let before = if after == NIL {
            list.first
        } else {
            self.pool.nodes[after as usize].next
        };
        {
            let node = &mut self.pool.nodes[index as usize];
            node.previous = after;
            node.next = before;
        }
        if after == NIL {
            list.first = index;
        } else {
            self.pool.nodes[after as usize].next = index;
        }
        if before == NIL {
            list.last = index;
        } else {
            self.pool.nodes[before as usize].previous = index;
        }
        list.len += 1;
        if list.len as usize > self.max_size {
            self.max_size_reached = true;
        }
    }

    /// Number of fragments at `(x, y)`.
    pub fn len(&self, x: usize, y: usize) -> usize {
        self.lists[self.slot(x, y)].len as usize
    }

    /// True when no pixel holds a fragment.
    pub fn is_empty(&self) -> bool {
        self.pool.in_use() == 0
    }

    /// First fragment in sweep order.
    pub fn front(&self, x: usize, y: usize) -> Option<&Fragment> {
        let first = self.lists[self.slot(x, y)].first;
        (first != NIL).then(|| &self.pool.nodes[first as usize].fragment)
    }

    /// Fragment following the first one.
    pub fn second(&self, x: usize, y: usize) -> Option<&Fragment> {
        let first = self.lists[self.slot(x, y)].first;
        if first == NIL {
            return None;
        }
        let second = self.pool.nodes[first as usize].next;
        (second != NIL).then(|| &self.pool.nodes[second as usize].fragment)
    }

    /// Removes and returns the first fragment.
    pub fn pop_front(&mut self, x: usize, y: usize) -> Option<Fragment> {
        let slot = self.slot(x, y);
        let first = self.lists[slot].first;
        if first == NIL {
            return None;
        }
        let node = self.pool.nodes[first as usize];
        let list = &mut self.lists[slot];
        list.first = node.next;
        if node.next == NIL {
            list.last = NIL;
        } else {
            self.pool.nodes[node.next as usize].previous = NIL;
        }
        list.len -= 1;
        self.pool.release(first);
        Some(node.fragment)
    }

    /// Fragments at `(x, y)` in sweep order.
    pub fn iter(&self, x: usize, y: usize) -> impl Iterator<Item = &Fragment> + '_ {
        let mut current = self.lists[self.slot(x, y)].first;
        std::iter::from_fn(move || {
            if current == NIL {
                return None;
            }
            let node = &self.pool.nodes[current as usize];
            current = node.next;
            Some(&node.fragment)
        })
    }

    /// Returns every fragment to the pool.
    pub fn clear_all(&mut self) {
        for i in 0..self.lists.len() {
            let list = self.lists[i];
            if list.first != NIL {
                self.pool.release_run(list.first, list.last, list.len as usize);
                self.lists[i] = PixelList::EMPTY;
            }
        }
        self.max_size_reached = false;
    }
}
