#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ProgressPhase {
    Inventory,
    Marking,
    Sweeping,
}

#[derive(Clone, Debug)]
pub enum ProgressMessage {
    Started {
        phase: ProgressPhase,
        total: usize,
    },
    Progress {
        phase: ProgressPhase,
        current: usize,
        label: Option<String>,
    },
    Finished {
        phase: ProgressPhase,
    },
}
