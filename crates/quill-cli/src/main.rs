//! The Quill command line shell.
//!
//! With a script argument, parses and runs the file. Without one, enters
//! an interactive loop: each line is parsed and evaluated against a
//! session context whose scope stays open across commands, so `x := 1`
//! on one line is visible on the next. `:reset` closes and reopens that
//! scope, dropping all session bindings.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use quill_eval::{stdlib, Context, ScopeHandle};
use quill_parser::parse_source;
use quill_types::{ParseErrors, SourceFile};

#[derive(Parser)]
#[command(name = "quill")]
#[command(about = "Quill script shell")]
struct Cli {
    /// Script file to run; starts an interactive session when omitted.
    script: Option<PathBuf>,

    /// Suppress the banner and prompt.
    #[arg(short, long)]
    quiet: bool,

    /// Report parse errors as JSON on stderr.
    #[arg(long)]
    json_errors: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match &cli.script {
        Some(path) => run_script(path, &cli),
        None => run_shell(&cli),
    }
}

// ── Script files ──────────────────────────────────────────────────────────

fn run_script(path: &Path, cli: &Cli) -> ExitCode {
    let source = match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: can't read {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
    };
    let source_file = SourceFile::new(path.display().to_string(), source);
    let result = parse_source(&source_file);
    if result.errors.has_errors() {
        report_errors(&result.errors, cli.json_errors);
        return ExitCode::FAILURE;
    }
    let Some(expr) = result.expr else {
        return ExitCode::FAILURE;
    };

    let mut ctx = stdlib::standard_context();
    match ctx.eval(&expr, true) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

// ── Interactive session ───────────────────────────────────────────────────

struct Session {
    ctx: Context,
    scope: Option<ScopeHandle>,
}

impl Session {
    fn new() -> Self {
        let mut ctx = stdlib::standard_context();
        let scope = Some(ctx.open_scope());
        Self { ctx, scope }
    }

    /// Drop every session binding and start a fresh scope.
    fn reset(&mut self) {
        if let Some(scope) = self.scope.take() {
            self.ctx.close_scope(scope);
        }
        self.scope = Some(self.ctx.open_scope());
    }
}

fn run_shell(cli: &Cli) -> ExitCode {
    if !cli.quiet {
        println!("Quill script shell — type :help for commands");
    }
    let mut session = Session::new();
    let stdin = io::stdin();
    let mut running = true;
    while running {
        if !cli.quiet {
            print!("> ");
            let _ = io::stdout().flush();
        }
        let mut line = String::new();
        match stdin.lock().read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        running = handle_command(line.trim(), &mut session, cli);
    }
    ExitCode::SUCCESS
}

/// Handle one shell line. Returns `false` to quit.
fn handle_command(command: &str, session: &mut Session, cli: &Cli) -> bool {
    if command.is_empty() {
        return true;
    }
    if let Some(rest) = command.strip_prefix(':') {
        let (name, arg) = match rest.split_once(' ') {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        match name {
            "q" | "quit" => {
                if !cli.quiet {
                    println!("Goodbye");
                }
                return false;
            }
            "?" | "h" | "help" => show_usage(),
            "r" | "reset" => session.reset(),
            "p" | "pwd" => match std::env::current_dir() {
                Ok(dir) => println!("{}", dir.display()),
                Err(e) => eprintln!("error: {e}"),
            },
            "c" | "cd" => {
                if arg.is_empty() {
                    eprintln!("error: give a new working directory");
                } else if let Err(e) = std::env::set_current_dir(arg) {
                    eprintln!("error: can't change working directory to {arg}: {e}");
                }
            }
            _ => eprintln!("error: unknown command, type :help for help"),
        }
        return true;
    }
    if command == "exit" || command == "quit" {
        println!("Use :quit to quit");
        return true;
    }
    if command == "help" {
        println!("Use :help for help");
        return true;
    }

    // An expression: parse, evaluate against the session scope, echo the
    // result as script code.
    let source_file = SourceFile::new("<repl>", command);
    let result = parse_source(&source_file);
    if result.errors.has_errors() {
        report_errors(&result.errors, cli.json_errors);
        return true;
    }
    let Some(expr) = result.expr else {
        return true;
    };
    match session.ctx.eval(&expr, false) {
        Ok(value) => match value.to_code() {
            Ok(code) => println!("{code}"),
            Err(e) => eprintln!("error: {e}"),
        },
        Err(e) => eprintln!("error: {e}"),
    }
    true
}

fn show_usage() {
    println!(" Commands available from the prompt:");
    println!();
    println!("   <expression>     Evaluate a script expression, display the result");
    println!("   :help            Show this help page");
    println!("   :quit            Exit the shell");
    println!("   :reset           Clear all session variable definitions");
    println!("   :pwd             Print the current working directory");
    println!("   :cd <dir>        Change the working directory");
    println!();
    println!(" Commands can be abbreviated to their first letter.");
}

// ── Error reporting ───────────────────────────────────────────────────────

fn report_errors(errors: &ParseErrors, as_json: bool) {
    if as_json {
        match serde_json::to_string(&errors.errors) {
            Ok(json) => eprintln!("{json}"),
            Err(e) => eprintln!("error: {e}"),
        }
        return;
    }
    for error in &errors.errors {
        eprintln!("error: {error}");
        if !error.source_line.is_empty() {
            eprintln!("  | {}", error.source_line);
        }
    }
}
