mod loader;
mod positions;
mod record;
pub mod sqlite;

pub use loader::{Batch, BatchLoader};
pub use positions::PositionSet;
pub use record::{BOARD_CELLS, PositionRecord, RecordErr, check_masks};
pub use sqlite::Schema;
