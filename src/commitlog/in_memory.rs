use crate::commitlog::{Entry, Index, Log};
use std::collections::VecDeque;
use std::io;
use std::marker::PhantomData;

// Nothing here is durable. The replicated log above this one treats persistence as somebody else's
// problem, so keeping entries in RAM is enough to model ordering, truncation and compaction.
pub(crate) struct InMemoryLog<E: Entry> {
    // We don't *need* to convert these to bytes. We could just hold the original entry in memory,
    // but we want to exercise the conversion logic.
    log: VecDeque<Vec<u8>>,
    // Index of `log[0]`.
    first_index: Index,
    _pd: PhantomData<E>,
}

impl<E: Entry> InMemoryLog<E> {
    pub(crate) fn create() -> Result<Self, io::Error> {
        Ok(InMemoryLog {
            log: VecDeque::new(),
            first_index: Index::start_index(),
            _pd: PhantomData::default(),
        })
    }

    fn vec_index(&self, index: Index) -> Option<usize> {
        if index < self.first_index {
            None
        } else {
            Some((index.as_u64() - self.first_index.as_u64()) as usize)
        }
    }
}

impl<E: Entry> Log<E> for InMemoryLog<E> {
    fn append(&mut self, entry: E) -> Result<Index, io::Error> {
        let index = self.next_index();
        self.log.push_back(entry.into());

        Ok(index)
    }

    fn read(&self, index: Index) -> Result<Option<E>, io::Error> {
        let opt_entry = self
            .vec_index(index)
            .and_then(|i| self.log.get(i))
            .cloned()
            .map(E::from);

        Ok(opt_entry)
    }

    fn truncate(&mut self, index: Index) {
        match self.vec_index(index) {
            Some(vec_index) => self.log.truncate(vec_index),
            None => self.log.clear(),
        }
    }

    fn compact(&mut self, index: Index) {
        while self.first_index <= index && !self.log.is_empty() {
            self.log.pop_front();
            self.first_index = self.first_index.plus(1);
        }
    }

    fn first_index(&self) -> Index {
        self.first_index
    }

    fn next_index(&self) -> Index {
        self.first_index.plus(self.log.len() as u64)
    }
}
