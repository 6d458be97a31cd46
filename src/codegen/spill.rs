use super::Emitter;

/// Ordered set of spill memory cells, each a `spillN` label with an active
/// flag. Acquisition reuses the first inactive cell before reserving a new
/// one, so a handful of cells serves arbitrarily many evictions.
#[derive(Debug, Default)]
pub struct SpillTable {
    slots: Vec<(String, bool)>,
}

impl SpillTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// First inactive label, or a fresh one from the emitter's label counter.
    pub fn acquire(&mut self, emitter: &mut Emitter) -> String {
        for (label, active) in &mut self.slots {
            if !*active {
                *active = true;
                return label.clone();
            }
        }
        let label = emitter.new_label("spill");
        self.slots.push((label.clone(), true));
        label
    }

    /// Mark a label inactive. Labels this table does not own are ignored, so
    /// releasing a memory operand that names a program variable is harmless.
    pub fn release(&mut self, label: &str) {
        for (slot_label, active) in &mut self.slots {
            if slot_label == label {
                *active = false;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Every label ever reserved, active or not. The program epilogue emits
    /// one data directive per label.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(label, _)| label.as_str())
    }

    pub fn all_inactive(&self) -> bool {
        self.slots.iter().all(|(_, active)| !active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_reuses_released_slots() {
        let mut emitter = Emitter::new();
        let mut spills = SpillTable::new();

        let first = spills.acquire(&mut emitter);
        let second = spills.acquire(&mut emitter);
        assert_eq!(first, "spill1");
        assert_eq!(second, "spill2");

        spills.release(&first);
        assert_eq!(spills.acquire(&mut emitter), "spill1");
        assert_eq!(spills.acquire(&mut emitter), "spill3");
    }

    #[test]
    fn release_of_unknown_label_is_ignored() {
        let mut emitter = Emitter::new();
        let mut spills = SpillTable::new();
        let label = spills.acquire(&mut emitter);

        spills.release("a");
        assert!(!spills.all_inactive());
        spills.release(&label);
        assert!(spills.all_inactive());
    }

    #[test]
    fn labels_survive_release() {
        let mut emitter = Emitter::new();
        let mut spills = SpillTable::new();
        let label = spills.acquire(&mut emitter);
        spills.release(&label);

        let labels: Vec<&str> = spills.labels().collect();
        assert_eq!(labels, vec!["spill1"]);
        assert!(!spills.is_empty());
    }
}
