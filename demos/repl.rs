//! Interactive WAL reader shell.
//!
//! Reads one expression per line and prints the canonical AST. With a FILE argument the
//! whole file is read as a source unit instead and every top-level form is printed.
//!
//! ```bash
//! cargo run --example repl -- --history ~/.wal_history
//! cargo run --example repl -- --json program.wal
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing_subscriber::EnvFilter;
use wal_reader::completion::Completions;
use wal_reader::json::ast_to_json;
use wal_reader::{Node, read_sexpr, read_sexprs};

/// Read WAL expressions and print their AST
#[derive(Parser, Debug)]
#[command(name = "wal-repl", version, about, long_about = None)]
struct Args {
    /// Source file to read in batch mode; starts the interactive shell when omitted
    #[arg(value_name = "FILE")]
    file: Option<PathBuf>,

    /// History file, loaded on start and written on exit
    #[arg(long, value_name = "PATH")]
    history: Option<PathBuf>,

    /// Print ASTs as JSON
    #[arg(long)]
    json: bool,
}

/// Characters that end a completable word
fn is_word_boundary(c: char) -> bool {
    c.is_whitespace() || matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | '\'' | '~' | '#' | '@')
}

struct ReplHelper {
    completions: Completions,
}

impl Completer for ReplHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let start = line[..pos]
            .rfind(is_word_boundary)
            .map_or(0, |i| i + line[i..].chars().next().map_or(1, char::len_utf8));
        let candidates = self
            .completions
            .candidates(&line[start..pos])
            .into_iter()
            .map(|word| Pair {
                display: word.to_owned(),
                replacement: word.to_owned(),
            })
            .collect();
        Ok((start, candidates))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

fn render(node: &Node, json: bool) -> String {
    if json {
        // Fall back to the s-expression form if encoding fails
        ast_to_json(node).unwrap_or_else(|_| node.to_string())
    } else {
        node.to_string()
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wal_reader=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match &args.file {
        Some(path) => run_file(path, args.json),
        None => run_repl(&args),
    }
}

fn run_file(path: &Path, json: bool) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: cannot read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    match read_sexprs(&source) {
        Ok(forms) => {
            for form in &forms {
                println!("{}", render(form, json));
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run_repl(args: &Args) -> ExitCode {
    println!("WAL reader shell");
    println!("Enter expressions like: (+ sig@1 ~clk[0])");
    println!("Type :help for more commands, or Ctrl+D to exit.");
    println!();

    let mut rl: Editor<ReplHelper, DefaultHistory> = match Editor::new() {
        Ok(rl) => rl,
        Err(e) => {
            eprintln!("Could not initialize REPL: {e}");
            return ExitCode::FAILURE;
        }
    };
    rl.set_helper(Some(ReplHelper {
        completions: Completions::new(),
    }));
    if let Some(history) = &args.history
        && let Err(e) = rl.load_history(history)
    {
        tracing::info!(path = %history.display(), error = %e, "no history loaded");
    }

    let mut json_mode = args.json;

    loop {
        match rl.readline("wal> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                match line {
                    ":help" => {
                        print_help();
                        continue;
                    }
                    ":json" => {
                        json_mode = !json_mode;
                        println!("JSON output {}", if json_mode { "enabled" } else { "disabled" });
                        continue;
                    }
                    ":quit" | ":exit" => break,
                    _ => {}
                }

                match read_sexpr(line) {
                    Ok(node) => {
                        if let Some(helper) = rl.helper_mut() {
                            helper.completions.observe(&node);
                        }
                        println!("{}", render(&node, json_mode));
                    }
                    Err(e) => println!("{e}"),
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => break,
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    println!("Goodbye!");
    if let Some(history) = &args.history
        && let Err(e) = rl.save_history(history)
    {
        eprintln!("Could not save history to {}: {e}", history.display());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn print_help() {
    println!("WAL reader shell:");
    println!("  :help   - Show this help message");
    println!("  :json   - Toggle JSON output");
    println!("  :quit   - Exit the shell");
    println!("  :exit   - Exit the shell");
    println!("  Tab     - Complete operators and names from (defun ...) / (define ...)");
    println!();
    println!("Syntax:");
    println!("  Integers: 42, -3, 0b101010, 0x2A");
    println!("  Strings:  \"a\\nb\"    Booleans: #t #f");
    println!("  Quote:    'x       Scoped: ~sig   Group: #grp");
    println!("  Timing:   sig@3    sig@<1 2 3>");
    println!("  Slicing:  sig[3]   sig[7:0]");
    println!("  Comments: ; line   #; (skipped datum)");
    println!();
}
