mod slot_id;

pub use slot_id::SlotId;
