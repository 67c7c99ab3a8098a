use std::{
    collections::BTreeMap,
    io::{self, IsTerminal, Write},
};

use anyhow::Result;
use chrono::{DateTime, Utc};
use prbar::{OutputMode, PullRequest, Snapshot, group_by_repository};

const REPOSITORY_INDENT: &str = "  ";
const PR_INDENT: &str = "    ";
const COLUMN_SEPARATOR: &str = "  ";
const TITLE_TRUNCATION_SUFFIX: &str = "...";
const MIN_TITLE_WIDTH_FOR_TRUNCATION: usize = 10;
const HIDDEN_SECTION_TITLE: &str = "Hidden PRs";

fn format_relative_time(time: DateTime<Utc>) -> String {
    use chrono_humanize::HumanTime;
    HumanTime::from(time).to_string()
}

fn get_terminal_width(truncate_titles: bool) -> usize {
    if !truncate_titles || !io::stdout().is_terminal() {
        return usize::MAX;
    }
    terminal_size::terminal_size()
        .map(|(w, _)| w.0 as usize)
        .unwrap_or(usize::MAX)
}

/// Shortens `title` to at most `max_width` characters, marking the cut.
fn truncate_title(title: &str, max_width: usize) -> String {
    if title.chars().count() <= max_width || max_width <= TITLE_TRUNCATION_SUFFIX.len() {
        return title.to_string();
    }
    let keep = max_width - TITLE_TRUNCATION_SUFFIX.len();
    let truncated: String = title.chars().take(keep).collect();
    format!("{}{}", truncated.trim_end(), TITLE_TRUNCATION_SUFFIX)
}

fn format_pr_line(pr: &PullRequest, terminal_width: usize) -> String {
    let draft = if pr.draft { " (draft)" } else { "" };
    let tail = format!(
        " [#{}]{}{}updated {}{}{}",
        pr.number,
        draft,
        COLUMN_SEPARATOR,
        format_relative_time(pr.updated_at),
        COLUMN_SEPARATOR,
        pr.url
    );

    let fixed_width = PR_INDENT.len() + tail.chars().count();
    let title = if terminal_width != usize::MAX && fixed_width < terminal_width {
        let available = terminal_width - fixed_width;
        if available >= MIN_TITLE_WIDTH_FOR_TRUNCATION {
            truncate_title(&pr.title, available)
        } else {
            pr.title.clone()
        }
    } else {
        pr.title.clone()
    };

    format!("{PR_INDENT}{title}{tail}")
}

/// Writes one section of categories, repositories and pull requests.
/// Returns the number of pull requests written.
fn display_categories<W: Write>(
    categories: &BTreeMap<String, Vec<PullRequest>>,
    terminal_width: usize,
    writer: &mut W,
) -> Result<usize> {
    let mut rendered = 0;

    for (category, prs) in categories {
        writeln!(writer, "{category}")?;
        if prs.is_empty() {
            writeln!(writer, "{REPOSITORY_INDENT}(none)")?;
        }
        for (repository, repo_prs) in group_by_repository(prs) {
            writeln!(writer, "{REPOSITORY_INDENT}{repository}")?;
            for pr in repo_prs {
                writeln!(writer, "{}", format_pr_line(pr, terminal_width))?;
                rendered += 1;
            }
        }
        writeln!(writer)?;
    }

    Ok(rendered)
}

fn display_status_line<W: Write>(
    snapshot: &Snapshot,
    shown: usize,
    render_hidden: bool,
    writer: &mut W,
) -> Result<()> {
    let hidden = snapshot.model.hidden_count();
    let noun = if shown == 1 { "PR" } else { "PRs" };
    if hidden > 0 && !render_hidden {
        writeln!(writer, "{shown} open {noun} ({hidden} hidden)")?;
    } else {
        writeln!(writer, "{shown} open {noun}")?;
    }

    if snapshot.stale {
        writeln!(
            writer,
            "! all queries failed; showing results from {}",
            format_relative_time(snapshot.refreshed_at)
        )?;
    } else if snapshot.has_errors() {
        let count = snapshot.errors.len();
        let noun = if count == 1 { "query" } else { "queries" };
        writeln!(writer, "! {count} {noun} failed")?;
    }

    Ok(())
}

fn display_menu_text<W: Write>(
    snapshot: &Snapshot,
    render_hidden: bool,
    terminal_width: usize,
    writer: &mut W,
) -> Result<()> {
    let shown = display_categories(&snapshot.model.shown, terminal_width, writer)?;

    if render_hidden {
        writeln!(writer, "{HIDDEN_SECTION_TITLE}")?;
        writeln!(writer, "{}", "-".repeat(HIDDEN_SECTION_TITLE.len()))?;
        display_categories(&snapshot.model.hidden, terminal_width, writer)?;
    }

    display_status_line(snapshot, shown, render_hidden, writer)
}

fn display_json<W: Write>(snapshot: &Snapshot, render_hidden: bool, writer: &mut W) -> Result<()> {
    let errors: Vec<String> = snapshot.errors.iter().map(ToString::to_string).collect();
    let mut document = serde_json::json!({
        "refreshed_at": snapshot.refreshed_at,
        "stale": snapshot.stale,
        "shown": snapshot.model.shown,
        "errors": errors,
    });
    if render_hidden {
        document["hidden"] = serde_json::to_value(&snapshot.model.hidden)?;
    }
    serde_json::to_writer(&mut *writer, &document)?;
    writeln!(writer)?;
    Ok(())
}

/// Renders one refresh result in the requested output mode.
pub fn display_snapshot<W: Write>(
    snapshot: &Snapshot,
    mode: &OutputMode,
    render_hidden: bool,
    writer: &mut W,
) -> Result<()> {
    match mode {
        OutputMode::Json => display_json(snapshot, render_hidden, writer),
        OutputMode::Text { truncate_titles } => display_menu_text(
            snapshot,
            render_hidden,
            get_terminal_width(*truncate_titles),
            writer,
        ),
    }
}
