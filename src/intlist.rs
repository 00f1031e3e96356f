use log::warn;
use std::ptr;

#[derive(Debug)]
struct IntCell {
    elem: usize,
    next: Option<Box<IntCell>>,
}

/// Ordered sequence of node/region ids.
///
/// Backs the seed queues and the per-region adjacency lists: O(1) insertion
/// at either end, O(index) anywhere else. The `tail` pointer stays valid
/// because cells are heap boxes that never move while linked.
#[derive(Debug)]
pub struct IntList {
    head: Option<Box<IntCell>>,
    tail: *mut IntCell,
    size: usize,
}

impl Default for IntList {
    fn default() -> Self {
        Self::new()
    }
}

impl IntList {
    pub fn new() -> Self {
        Self {
            head: None,
            tail: ptr::null_mut(),
            size: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn push_front(&mut self, elem: usize) {
        let mut cell = Box::new(IntCell {
            elem,
            next: self.head.take(),
        });
        let raw: *mut IntCell = &mut *cell;
        if self.tail.is_null() {
            self.tail = raw;
        }
        self.head = Some(cell);
        self.size += 1;
    }

    pub fn push_back(&mut self, elem: usize) {
        let mut cell = Box::new(IntCell { elem, next: None });
        let raw: *mut IntCell = &mut *cell;
        if self.tail.is_null() {
            self.head = Some(cell);
        } else {
            unsafe { (*self.tail).next = Some(cell) };
        }
        self.tail = raw;
        self.size += 1;
    }

    /// Inserts before position `index`; `index == len` appends. Returns
    /// false (advisory, not fatal) when the index is beyond the end.
    pub fn insert_at(&mut self, elem: usize, index: usize) -> bool {
        if index > self.size {
            warn!("insert_at: index {index} is out of bounds (len {})", self.size);
            return false;
        }
        if index == 0 {
            self.push_front(elem);
            return true;
        }
        if index == self.size {
            self.push_back(elem);
            return true;
        }
        let mut prev = self.head.as_deref_mut().unwrap();
        for _ in 1..index {
            prev = prev.next.as_deref_mut().unwrap();
        }
        let cell = Box::new(IntCell {
            elem,
            next: prev.next.take(),
        });
        prev.next = Some(cell);
        self.size += 1;
        true
    }

    /// Removes and returns the element at `index`. Warns and returns `None`
    /// on an empty list or out-of-bounds index.
    pub fn remove_at(&mut self, index: usize) -> Option<usize> {
        if self.is_empty() {
            warn!("remove_at: the list is empty");
            return None;
        }
        if index >= self.size {
            warn!("remove_at: index {index} is out of bounds (len {})", self.size);
            return None;
        }
        if index == 0 {
            return self.pop_front();
        }
        let mut prev = self.head.as_deref_mut().unwrap();
        for _ in 1..index {
            prev = prev.next.as_deref_mut().unwrap();
        }
        let mut removed = prev.next.take().unwrap();
        prev.next = removed.next.take();
        if index == self.size - 1 {
            self.tail = &mut *prev;
        }
        self.size -= 1;
        Some(removed.elem)
    }

    pub fn pop_front(&mut self) -> Option<usize> {
        match self.head.take() {
            None => {
                warn!("pop_front: the list is empty");
                None
            }
            Some(mut cell) => {
                self.head = cell.next.take();
                if self.head.is_none() {
                    self.tail = ptr::null_mut();
                }
                self.size -= 1;
                Some(cell.elem)
            }
        }
    }

    pub fn contains(&self, elem: usize) -> bool {
        self.iter().any(|e| e == elem)
    }

    pub fn iter(&self) -> IntListIter<'_> {
        IntListIter {
            next: self.head.as_deref(),
        }
    }
}

impl Drop for IntList {
    fn drop(&mut self) {
        // Unlink iteratively so long lists cannot overflow the stack.
        let mut cur = self.head.take();
        while let Some(mut cell) = cur {
            cur = cell.next.take();
        }
    }
}

impl FromIterator<usize> for IntList {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut list = IntList::new();
        for elem in iter {
            list.push_back(elem);
        }
        list
    }
}

pub struct IntListIter<'a> {
    next: Option<&'a IntCell>,
}

impl<'a> Iterator for IntListIter<'a> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        self.next.map(|cell| {
            self.next = cell.next.as_deref();
            cell.elem
        })
    }
}
