//! Opaque identifiers replacing the source's pointer-based cross-references
//! (§9 "Cyclic references event <-> instrument <-> channel").

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SampleId(pub u32);
