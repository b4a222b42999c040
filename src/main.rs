mod repl;

use brick::{from_json, Config, ConsoleOutput, Interpreter};
use std::env;
use std::fs;
use std::io::{self, Read};
use std::process;
use tracing_subscriber::EnvFilter;

pub const VERSION: &str = "0.1.0";

fn print_help() {
    println!(
        r#"brick - The Brick block-program interpreter v{}

Runs algorithms assembled from visual code blocks. Programs are saved as a
JSON array of blocks; nested bodies are wrapped in begin/end blocks.

USAGE:
    brick                     Start the REPL (interactive mode)
    brick <program.json>      Run a saved program
    brick -e "expression"     Evaluate an expression or assignment
    brick -                   Read a program from stdin
    brick [OPTIONS]

OPTIONS:
    -h, --help          Print this help message
    -v, --version       Print version information
    -i, --repl          Start the REPL (interactive mode)
    -e <expression>     Evaluate an expression, e.g. "2 + 3 * 4"
    --budget <n>        Loop iterations and calls allowed per run
                        (default: {}, 0 = unlimited)

ENVIRONMENT:
    BRICK_LOG           Log filter, e.g. BRICK_LOG=debug (default: warn)

EXAMPLE:
    brick -e "(2 + 3) * 4"
    echo '[{{"block": "output", "id": 1, "value": "\"hi\"", "newline": true}}]' | brick -
"#,
        VERSION,
        brick::interpreter::DEFAULT_STEP_BUDGET
    );
}

/// Print a run's output to stdout and its errors to stderr.
pub fn report(output: &ConsoleOutput) {
    print!("{}", output.text);
    if !output.text.is_empty() && !output.text.ends_with('\n') {
        println!();
    }
    if let Some((kind, _)) = output.errors.first() {
        let blocks: Vec<String> = output.errors.iter().map(|(_, id)| id.to_string()).collect();
        eprintln!("Runtime error: {}", kind);
        eprintln!("  at block {}", blocks.join(" <- "));
    }
}

fn run_source(source: &str, config: Config) {
    let program = match from_json(source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("Build error: {}", e);
            process::exit(1);
        }
    };

    let mut interpreter = Interpreter::with_config(config);
    let output = interpreter.run(&program);
    report(&output);
    if !output.is_ok() {
        process::exit(1);
    }
}

fn run_file(filename: &str, config: Config) {
    let source = match fs::read_to_string(filename) {
        Ok(content) => content,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", filename, e);
            process::exit(1);
        }
    };

    run_source(&source, config);
}

fn run_stdin(config: Config) {
    let mut source = String::new();
    if let Err(e) = io::stdin().read_to_string(&mut source) {
        eprintln!("Error reading stdin: {}", e);
        process::exit(1);
    }
    run_source(&source, config);
}

fn run_expression(expression: &str, config: Config) {
    let mut interpreter = Interpreter::with_config(config);
    match interpreter.execute(expression) {
        Ok(Some(value)) => println!("{}", value),
        Ok(None) => {
            for (name, value) in interpreter.environment().bindings() {
                println!("{} = {}", name, value.literal());
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e.kind);
            process::exit(1);
        }
    }
}

fn parse_budget(value: Option<&String>) -> Option<u64> {
    match value.map(|v| v.parse::<u64>()) {
        Some(Ok(0)) => None,
        Some(Ok(n)) => Some(n),
        _ => {
            eprintln!("Error: --budget requires a whole number (0 = unlimited)");
            process::exit(1);
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("BRICK_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_logging();
    let args: Vec<String> = env::args().collect();

    // --budget can appear anywhere
    let mut config = Config::default();
    let mut rest = Vec::new();
    let mut i = 0;
    while i < args.len() {
        if args[i] == "--budget" {
            config.step_budget = parse_budget(args.get(i + 1));
            i += 2;
        } else {
            rest.push(args[i].clone());
            i += 1;
        }
    }
    let args = rest;

    if args.len() < 2 {
        repl::run_repl(config);
        return;
    }

    match args[1].as_str() {
        "-h" | "--help" => print_help(),
        "-v" | "--version" => println!("brick {}", VERSION),
        "-i" | "--repl" => repl::run_repl(config),
        "-e" => {
            let Some(expression) = args.get(2) else {
                eprintln!("Error: -e requires an expression");
                eprintln!("Usage: brick -e \"2 + 3 * 4\"");
                process::exit(1);
            };
            run_expression(expression, config);
        }
        "-" => run_stdin(config),
        filename => run_file(filename, config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_budget_means_unlimited() {
        assert_eq!(parse_budget(Some(&"0".to_string())), None);
        assert_eq!(parse_budget(Some(&"250".to_string())), Some(250));
    }
}
