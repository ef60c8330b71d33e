//! CLI front end: argument parsing, the `select` command, and a stdin/stdout REPL over an assessment session.

use std::num::NonZeroUsize;

use clap::{Args, Parser, Subcommand};
use futures::{Stream, StreamExt, stream};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::assess::{AssessmentSession, ConversationView, Phase, RepoIdentity};
use crate::delivery::DeliveryEvent;
use crate::error::{Result, SessionError, SubmitRejected};
use crate::gateway::{HttpGateway, RepositorySummary};
use crate::selection::SelectionStore;

/// Abbreviate large counts the way the results screen does: `1.2K`, `3.4M`.
pub fn format_count(n: u64) -> String {
    if n >= 1_000_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}K", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

/// Repository panel shown above the conversation.
pub fn render_header(view: &ConversationView) -> String {
    let mut lines = vec![format!("📦 {}", view.repo.identity.full_name())];
    if let Some(meta) = &view.repo.metadata {
        if let Some(desc) = meta.description.as_deref().filter(|d| !d.is_empty()) {
            lines.push(format!("   {desc}"));
        }
        lines.push(format!(
            "   {} · ★ {} · forks {} · issues {}",
            meta.language,
            format_count(meta.stars),
            format_count(meta.forks),
            format_count(meta.issues)
        ));
        if !meta.url.is_empty() {
            lines.push(format!("   {}", meta.url));
        }
    }
    lines.push(format!("   Your skills: {}", view.skills.as_slice().join(", ")));
    lines.join("\n")
}

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "prism-assess", version)]
#[command(about = "Guided repository-fit assessment for PRism")]
pub struct Cli {
    /// Without a subcommand, start an assessment for the saved selection.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search repositories by skill and remember a pick
    Select(SelectArgs),
}

#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SelectArgs {
    /// Comma-separated skills, e.g. `rust,wasm`
    pub skills: String,
    /// Number of the repository to keep, as listed
    pub pick: Option<NonZeroUsize>,
}

impl SelectArgs {
    /// Skills with blanks dropped and whitespace trimmed.
    pub fn skill_list(&self) -> Vec<String> {
        self.skills
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn render_summary(index: usize, hit: &RepositorySummary) -> String {
    let lang = hit.lang.as_deref().unwrap_or("Unknown");
    let desc = hit.description.as_deref().unwrap_or("");
    format!(
        "{:>3}. {}/{} ★ {} [{}] {}",
        index + 1,
        hit.owner,
        hit.repo,
        format_count(hit.stars),
        lang,
        desc
    )
}

/// Search repositories for the given skills. With a pick, persist the skills and that repository.
pub async fn run_select(
    gateway: &HttpGateway,
    store: &SelectionStore,
    args: SelectArgs,
) -> Result<Option<RepoIdentity>> {
    let skills = args.skill_list();
    if skills.is_empty() {
        return Err(SessionError::NoSkillsSelected.into());
    }
    let hits = gateway.search_repositories(&skills).await?;
    if hits.is_empty() {
        eprintln!("No repositories matched {}", skills.join(", "));
        return Ok(None);
    }
    for (i, hit) in hits.iter().enumerate() {
        println!("{}", render_summary(i, hit));
    }

    let Some(pick) = args.pick else {
        eprintln!("\nRe-run with a number to choose a repository.");
        return Ok(None);
    };
    let hit = hits
        .get(pick.get() - 1)
        .ok_or(SessionError::PickOutOfRange {
            pick: pick.get(),
            available: hits.len(),
        })?;
    let identity = hit.identity();
    store.save_skills(skills).await?;
    store.save_repo(identity.clone()).await?;
    eprintln!("\n✅ Selected {}", identity.full_name());
    Ok(Some(identity))
}

/// What the REPL should do with a line of input.
#[derive(Debug, PartialEq, Eq)]
enum Line {
    Quit,
    Skip,
    Submit(String),
}

fn classify(line: &str) -> Line {
    match line.trim() {
        "/quit" | "/exit" => Line::Quit,
        "" => Line::Skip,
        _ => Line::Submit(line.to_string()),
    }
}

fn stdin_lines() -> impl Stream<Item = String> {
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

    tokio::spawn(async move {
        let reader = BufReader::new(tokio::io::stdin());
        let mut lines = reader.lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    tracing::error!("Error reading stdin: {}", e);
                    break;
                }
            }
        }
    });

    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|line| (line, rx)) })
}

/// Print assistant messages as they commit and forward stdin lines as submissions.
pub async fn run_repl(session: AssessmentSession) -> Result<()> {
    let mut deliveries = session.subscribe_deliveries();
    let mut views = session.subscribe_view();
    let mut lines = Box::pin(stdin_lines());
    let mut header_shown = false;
    let mut error_shown = false;
    let mut input_enabled = false;

    eprintln!("   Type a message and press Enter. /quit to exit.\n");

    loop {
        tokio::select! {
            event = deliveries.recv() => match event {
                Ok(DeliveryEvent::Started { .. }) => eprint!("… "),
                Ok(DeliveryEvent::Committed { text, .. }) => println!("\n{}\n", text),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Missed delivery events");
                }
                Err(RecvError::Closed) => break,
            },
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                if !header_shown && view.repo.metadata.is_some() {
                    eprintln!("{}\n", render_header(&view));
                    header_shown = true;
                }
                if view.phase == Phase::Error && !error_shown {
                    if let Some(err) = &view.error {
                        eprintln!("❌ {}", err);
                    }
                    error_shown = true;
                }
                if view.input_enabled && !input_enabled {
                    eprint!("> ");
                }
                input_enabled = view.input_enabled;
            },
            line = lines.next() => {
                let Some(line) = line else { break };
                match classify(&line) {
                    Line::Quit => break,
                    Line::Skip => eprint!("> "),
                    Line::Submit(text) => match session.submit(text).await {
                        Ok(()) => {}
                        Err(SubmitRejected::Closed) => break,
                        Err(reason) => eprintln!("⚠️  Not sent: {}", reason),
                    },
                }
            },
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_count_abbreviates() {
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_200), "1.2K");
        assert_eq!(format_count(25_000), "25.0K");
        assert_eq!(format_count(3_400_000), "3.4M");
    }

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("prism-assess").chain(args.iter().copied()))
    }

    fn select(args: &[&str]) -> SelectArgs {
        match parse(args).unwrap().command {
            Some(Command::Select(select)) => select,
            other => panic!("Expected select, got {other:?}"),
        }
    }

    #[test]
    fn no_subcommand_starts_a_session() {
        assert!(parse(&[]).unwrap().command.is_none());
    }

    #[test]
    fn select_args_parse_skills_and_pick() {
        let args = select(&["select", "rust, go,,", "2"]);
        assert_eq!(args.skill_list(), ["rust", "go"]);
        assert_eq!(args.pick, NonZeroUsize::new(2));

        assert_eq!(select(&["select", "rust"]).pick, None);
    }

    #[test]
    fn select_args_reject_bad_input() {
        assert!(parse(&["select"]).is_err());
        assert!(parse(&["select", "rust", "0"]).is_err());
        assert!(parse(&["select", "rust", "two"]).is_err());
        assert!(parse(&["pick"]).is_err());
    }

    #[test]
    fn blank_skill_list_is_empty() {
        assert!(select(&["select", " , "]).skill_list().is_empty());
    }

    #[test]
    fn classify_lines() {
        assert_eq!(classify("/quit"), Line::Quit);
        assert_eq!(classify("   "), Line::Skip);
        assert_eq!(classify(" hi "), Line::Submit(" hi ".to_string()));
    }

    #[test]
    fn summary_line_shows_owner_and_stars() {
        let hit = RepositorySummary {
            repo: "flask".into(),
            owner: "pallets".into(),
            stars: 66_000,
            lang: None,
            url: String::new(),
            description: Some("web framework".into()),
            topics: vec![],
            issues: 0,
            is_fork: false,
        };
        assert_eq!(
            render_summary(0, &hit),
            "  1. pallets/flask ★ 66.0K [Unknown] web framework"
        );
    }
}
