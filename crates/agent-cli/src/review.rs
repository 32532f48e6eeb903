//! Interactive approval of a response's changes and commands.

use std::io::{self, Write};

use agent_tools::{ApprovalWorkflow, DiffTag, PendingChange, ShellSessions};
use colored::Colorize;

/// Shell session that confirmed commands are typed into.
pub const COMMAND_SESSION: &str = "main";

enum Decision {
    Apply,
    Skip,
    ApplyAll,
    Quit,
}

fn ask(question: &str) -> io::Result<String> {
    print!("{} ", question.yellow().bold());
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().to_ascii_lowercase())
}

fn ask_decision() -> io::Result<Decision> {
    loop {
        match ask("Apply this change? [y]es / [n]o / [a]ll / [q]uit:")?.as_str() {
            "y" | "yes" => return Ok(Decision::Apply),
            "n" | "no" => return Ok(Decision::Skip),
            "a" | "all" => return Ok(Decision::ApplyAll),
            "q" | "quit" => return Ok(Decision::Quit),
            _ => println!("{}", "Please answer y, n, a or q.".dimmed()),
        }
    }
}

pub fn print_diff(pending: &PendingChange) {
    let path = &pending.change.path;
    if pending.is_creation() {
        println!("{} {}", "New file:".green().bold(), path);
    } else {
        println!("{} {} ({:?})", "Change:".cyan().bold(), path, pending.change.action);
    }

    for line in pending.diff_lines() {
        let text = line.text.trim_end_matches('\n');
        match line.tag {
            DiffTag::Insert => println!("{}", format!("+{}", text).green()),
            DiffTag::Delete => println!("{}", format!("-{}", text).red()),
            DiffTag::Equal => println!("{}", format!(" {}", text).dimmed()),
        }
    }
}

/// Walk the human through every proposed change, then every command.
pub async fn review_response(
    workflow: &mut ApprovalWorkflow,
    sessions: &ShellSessions,
) -> anyhow::Result<()> {
    let mut index = 0;
    while index < workflow.changes().len() {
        match workflow.begin_review(index).await {
            Ok(pending) => print_diff(pending),
            Err(e) => {
                println!("{}", format!("❌ Cannot review change {}: {}", index + 1, e).red());
                index += 1;
                continue;
            }
        }

        match ask_decision()? {
            Decision::Apply => match workflow.confirm(index).await {
                Ok(path) => println!("{}", format!("✅ Wrote {}", path.display()).green()),
                Err(e) => println!("{}", format!("❌ {}", e).red()),
            },
            Decision::Skip => {
                workflow.reject(index)?;
                println!("{}", "Skipped.".dimmed());
            }
            Decision::ApplyAll => {
                let report = workflow.apply_all().await;
                for applied in &report.applied {
                    println!(
                        "{}",
                        format!("✅ [{}] {}", applied.index + 1, applied.path.display()).green()
                    );
                }
                for failed in &report.failed {
                    println!(
                        "{}",
                        format!("❌ [{}] {}: {}", failed.index + 1, failed.path, failed.error)
                            .red()
                    );
                }
                if !report.is_complete() {
                    println!(
                        "{}",
                        format!(
                            "Applied {} change(s), {} failed.",
                            report.applied.len(),
                            report.failed.len()
                        )
                        .yellow()
                    );
                }
                break;
            }
            Decision::Quit => {
                println!("{}", "Leaving remaining changes unapplied.".dimmed());
                break;
            }
        }
        index += 1;
    }

    review_commands(workflow, sessions).await
}

async fn review_commands(
    workflow: &mut ApprovalWorkflow,
    sessions: &ShellSessions,
) -> anyhow::Result<()> {
    for index in 0..workflow.commands().len() {
        let command = workflow.commands()[index].command.clone();
        println!("{} {}", "Suggested command:".cyan().bold(), command.command);
        if !command.description.is_empty() {
            println!("  {}", command.description.dimmed());
        }

        let answer = ask("Send to shell? [y/N]:")?;
        if answer != "y" && answer != "yes" {
            workflow.reject_command(index)?;
            continue;
        }

        sessions.start(COMMAND_SESSION, workflow.project_root())?;
        if let Err(e) = workflow
            .forward_command(index, sessions, COMMAND_SESSION)
            .await
        {
            println!("{}", format!("❌ {}", e).red());
        }
    }
    Ok(())
}
