use crate::view::ViewState;

pub const SERVER_ERROR_MESSAGE: &str =
    "We're sorry, but we can't display game statistics at this moment.";

pub const COLUMN_HEADINGS: [&str; 3] = ["User", "Score", "Badges"];

/// One rendered table line. `user` is already resolved to alias-or-id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub key: i64,
    pub user: String,
    pub score: i64,
    pub badges: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableView {
    Unavailable { message: &'static str },
    Rows(Vec<TableRow>),
}

impl TableView {
    pub fn from_view(view: &ViewState) -> Self {
        if view.server_error {
            return TableView::Unavailable {
                message: SERVER_ERROR_MESSAGE,
            };
        }

        TableView::Rows(
            view.rows
                .iter()
                .map(|row| TableRow {
                    key: row.user_id,
                    user: row.display_name(),
                    score: row.total_score,
                    badges: row.badges.clone(),
                })
                .collect(),
        )
    }
}
