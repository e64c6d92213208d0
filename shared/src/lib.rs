pub mod leaderboard;
pub mod merge;
pub mod table;
pub mod view;

pub use leaderboard::*;
pub use merge::{alias_lookup, distinct_user_ids, merge_aliases};
pub use table::{COLUMN_HEADINGS, SERVER_ERROR_MESSAGE, TableRow, TableView};
pub use view::{ViewState, etag_for};
