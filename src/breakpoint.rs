/// Code offsets at which execution halts, kept sorted by offset.
#[derive(Clone, Default, Debug)]
pub struct Breakpoints(Vec<Breakpoint>);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Breakpoint {
    pub offset: u32,
    /// Set for the breakpoint placed after the last instruction, which cannot
    /// be removed and is never stepped over.
    pub is_predefined: bool,
}

impl Breakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, offset: u32) -> Option<Breakpoint> {
        self.position(offset).ok().map(|idx| self.0[idx])
    }

    pub fn contains(&self, offset: u32) -> bool {
        self.position(offset).is_ok()
    }

    /// Returns `false` if a breakpoint already exists at that offset.
    pub fn insert(&mut self, breakpoint: Breakpoint) -> bool {
        match self.position(breakpoint.offset) {
            Ok(_) => false,
            Err(idx) => {
                self.0.insert(idx, breakpoint);
                true
            }
        }
    }

    /// Removes the user breakpoint at `offset`.
    ///
    /// Returns whether one was found. Predefined breakpoints stay.
    pub fn remove(&mut self, offset: u32) -> bool {
        match self.position(offset) {
            Ok(idx) if !self.0[idx].is_predefined => {
                self.0.remove(idx);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Breakpoint> {
        self.0.iter()
    }

    fn position(&self, offset: u32) -> Result<usize, usize> {
        self.0.binary_search_by_key(&offset, |bp| bp.offset)
    }
}

impl<'a> IntoIterator for &'a Breakpoints {
    type Item = &'a Breakpoint;
    type IntoIter = std::slice::Iter<'a, Breakpoint>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
