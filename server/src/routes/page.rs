use std::fmt::Write as _;
use std::time::Duration;

use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use html_escape::encode_text;
use leaderboard_shared::{COLUMN_HEADINGS, TableView, ViewState};

use crate::state::AppState;

pub async fn leaderboard_page(State(state): State<AppState>) -> impl IntoResponse {
    let view = state.store.current().await.view;
    let body = render_page(&view, state.refresh_interval);
    ([(header::CACHE_CONTROL, "no-store")], Html(body))
}

fn render_page(view: &ViewState, refresh_every: Duration) -> String {
    let mut html = String::with_capacity(1024);
    let _ = write!(
        html,
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta http-equiv=\"refresh\" content=\"{}\">\n<title>Leaderboard</title>\n</head>\n<body>\n",
        refresh_every.as_secs().max(1)
    );
    html.push_str(&render_table(view));
    html.push_str("</body>\n</html>\n");
    html
}

/// Apology message while the scoring service is failing, otherwise the table.
fn render_table(view: &ViewState) -> String {
    let rows = match TableView::from_view(view) {
        TableView::Unavailable { message } => {
            return format!("<div>{}</div>\n", encode_text(message));
        }
        TableView::Rows(rows) => rows,
    };

    let mut html = String::from("<div>\n<h3>Leaderboard</h3>\n<table>\n<thead>\n<tr>");
    for heading in COLUMN_HEADINGS {
        let _ = write!(html, "<th>{heading}</th>");
    }
    html.push_str("</tr>\n</thead>\n<tbody>\n");

    for row in rows {
        let _ = write!(
            html,
            "<tr data-user-id=\"{}\"><td>{}</td><td>{}</td><td>",
            row.key,
            encode_text(&row.user),
            row.score
        );
        for badge in &row.badges {
            let _ = write!(html, "<span class=\"badge\">{}</span>", encode_text(badge));
        }
        html.push_str("</td></tr>\n");
    }

    html.push_str("</tbody>\n</table>\n</div>\n");
    html
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::Utc;
    use leaderboard_shared::{LeaderboardRow, SERVER_ERROR_MESSAGE, ViewState};

    use super::{render_page, render_table};

    #[test]
    fn renders_alias_or_raw_id_with_badge_markers() {
        let view = ViewState::fresh(
            vec![
                LeaderboardRow::new(1, 100, vec!["gold".to_string(), "First time".to_string()])
                    .with_alias(Some("alice".to_string())),
                LeaderboardRow::new(2, 50, Vec::new()),
            ],
            1,
            Utc::now(),
        );

        let html = render_table(&view);

        assert!(html.contains("<th>User</th><th>Score</th><th>Badges</th>"));
        assert!(html.contains("<td>alice</td><td>100</td>"));
        assert!(html.contains("<td>2</td><td>50</td><td></td>"));
        assert_eq!(html.matches("<span class=\"badge\">").count(), 2);
    }

    #[test]
    fn server_error_renders_only_the_apology() {
        let previous = ViewState::fresh(vec![LeaderboardRow::new(1, 100, Vec::new())], 1, Utc::now());
        let failed = ViewState::failed(&previous, 2, Utc::now());

        let html = render_table(&failed);

        assert!(!html.contains("<table>"));
        assert!(html.contains("We&#x27;re sorry") || html.contains(SERVER_ERROR_MESSAGE));
    }

    #[test]
    fn user_supplied_text_is_escaped() {
        let view = ViewState::fresh(
            vec![
                LeaderboardRow::new(1, 1, vec!["<b>".to_string()])
                    .with_alias(Some("<script>".to_string())),
            ],
            1,
            Utc::now(),
        );

        let html = render_table(&view);

        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&lt;b&gt;"));
    }

    #[test]
    fn page_refreshes_at_the_configured_cadence() {
        let html = render_page(&ViewState::default(), Duration::from_secs(5));
        assert!(html.contains("content=\"5\""));
        assert!(html.contains("<h3>Leaderboard</h3>"));
    }
}
