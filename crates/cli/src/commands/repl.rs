//! `nanocode` with no prompt: the interactive session.

use std::io::Write;

use nanocode_core::message::Message;

use crate::runtime::Runtime;

/// What one line typed at the prompt asks for.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    Clear,
    Help,
    Prompt(&'a str),
}

impl<'a> Input<'a> {
    fn parse(line: &'a str) -> Self {
        let line = line.trim();
        match line.to_lowercase().as_str() {
            "" => Self::Empty,
            "exit" | "quit" => Self::Exit,
            "clear" => Self::Clear,
            "help" => Self::Help,
            _ => Self::Prompt(line),
        }
    }
}

pub async fn run(runtime: &Runtime) -> Result<(), Box<dyn std::error::Error>> {
    println!();
    println!("  nanocode: interactive mode");
    println!();
    println!("  Model:     {}", runtime.model);
    println!("  Tools:     {} available", runtime.tool_count);
    println!("  Rounds:    {} per request", runtime.max_rounds());
    println!(
        "  Approval:  {}",
        if runtime.auto_approve { "automatic" } else { "ask before side effects" }
    );
    println!("  Directory: {}", runtime.cwd.display());
    println!();
    println!("  Type 'help' for commands, 'exit' to quit.");
    println!();

    let mut conversation = runtime.conversation();
    let mut interrupted = false;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = runtime.input.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                if interrupted {
                    println!();
                    break;
                }
                interrupted = true;
                println!("\n(Press Ctrl-C again or type 'exit' to quit)");
                continue;
            }
        };
        // EOF
        let Some(line) = line else {
            println!();
            break;
        };
        interrupted = false;

        match Input::parse(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Clear => {
                conversation.clear_history();
                println!("History cleared.");
            }
            Input::Help => print_help(),
            Input::Prompt(text) => {
                conversation.push(Message::user(text));
                match runtime.run_turn(&mut conversation).await {
                    Ok(_) => {}
                    Err(e) if e.is_cancelled() => eprintln!("\nInterrupted."),
                    Err(e) => eprintln!("\n[Error] {e}"),
                }
                println!();
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  clear        Forget the conversation so far (keeps the system prompt)");
    println!("  help         Show this message");
    println!("  exit, quit   Leave the session");
    println!();
    println!("Anything else is sent to the agent. Ctrl-C interrupts a running request.");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_commands() {
        assert_eq!(Input::parse("exit"), Input::Exit);
        assert_eq!(Input::parse("  QUIT \n"), Input::Exit);
        assert_eq!(Input::parse("clear"), Input::Clear);
        assert_eq!(Input::parse("Help"), Input::Help);
        assert_eq!(Input::parse("   "), Input::Empty);
    }

    #[test]
    fn everything_else_is_a_prompt() {
        assert_eq!(Input::parse("  list the files\n"), Input::Prompt("list the files"));
        assert_eq!(Input::parse("exit the loop early"), Input::Prompt("exit the loop early"));
    }
}
