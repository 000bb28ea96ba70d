use crate::app::App;
use anyhow::{Result, bail};
use chrono::{DateTime, Local, Utc};
use colored::Colorize;
use slop_core::session::Session;

/// Formats a millisecond timestamp in local time.
pub fn format_timestamp(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Prints one line per session, marking the current one.
pub fn print_sessions(sessions: &[Session], current: Option<&str>) {
    if sessions.is_empty() {
        println!("{}", "No sessions yet.".bright_black());
        return;
    }

    for session in sessions {
        let marker = if current == Some(session.id.as_str()) { "*" } else { " " };
        let results = session.result_history.len();
        println!(
            "{} {}  {}  {}",
            marker.bright_green(),
            session.id.bright_cyan(),
            format_timestamp(session.updated).bright_black(),
            format!("{} ({} results)", session.name, results)
        );
    }
}

pub async fn list(app: &App) -> Result<()> {
    let sessions = app.sessions.list_all().await?;
    let current = app.sessions.current_id().await?;
    print_sessions(&sessions, current.as_deref());
    Ok(())
}

pub async fn switch(app: &App, id: &str) -> Result<()> {
    app.sessions.set_current_id(id).await?;
    println!("{}", format!("Switched to session {}", id).green());
    Ok(())
}

pub async fn delete(app: &App, id: &str) -> Result<()> {
    if app.sessions.get(id).await?.is_none() {
        bail!("Session '{}' not found", id);
    }
    app.sessions.delete(id).await?;
    println!("{}", format!("Deleted session {}", id).green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp_handles_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX), "-");
        assert_eq!(format_timestamp(0).len(), "1970-01-01 00:00".len());
    }
}
