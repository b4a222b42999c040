use crate::report;
use brick::{from_json, Config, Interpreter, Node, Value};
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::fs;

const BANNER: &str = r#"
  ____       _      _
 | __ ) _ __(_) ___| | __
 |  _ \| '__| |/ __| |/ /
 | |_) | |  | | (__|   <
 |____/|_|  |_|\___|_|\_\

"#;

struct Session {
    interpreter: Interpreter,
    program: Option<Node>,
}

pub fn run_repl(config: Config) {
    println!("{}", BANNER);
    println!("Brick REPL v{}", crate::VERSION);
    println!("Evaluate expressions, assign variables, load and run block programs.");
    println!("Type .help for commands, .exit to quit.\n");

    if let Err(e) = repl_loop(config) {
        eprintln!("REPL error: {}", e);
    }
}

fn repl_loop(config: Config) -> RlResult<()> {
    let mut rl = DefaultEditor::new()?;
    let mut session = Session {
        interpreter: Interpreter::with_config(Config {
            persist_functions: true,
            ..config
        }),
        program: None,
    };

    let history_path = dirs_history_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    loop {
        match rl.readline("brick> ") {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                rl.add_history_entry(trimmed)?;

                if trimmed.starts_with('.') {
                    if handle_command(trimmed, &mut session) {
                        break;
                    }
                    continue;
                }
                execute_line(&mut session.interpreter, trimmed);
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {:?}", err);
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        let _ = rl.save_history(path);
    }

    Ok(())
}

fn dirs_history_path() -> Option<String> {
    dirs::home_dir().map(|mut path| {
        path.push(".brick_history");
        path.to_string_lossy().to_string()
    })
}

/// Handle a REPL command. Returns true if the REPL should exit.
fn handle_command(cmd: &str, session: &mut Session) -> bool {
    let (command, arg) = match cmd.split_once(' ') {
        Some((command, arg)) => (command, Some(arg.trim()).filter(|a| !a.is_empty())),
        None => (cmd, None),
    };

    match command {
        ".exit" | ".quit" | ".q" => {
            println!("Goodbye!");
            return true;
        }
        ".help" | ".h" => print_repl_help(),
        ".clear" => {
            session.interpreter.reset();
            session.program = None;
            println!("State cleared.");
        }
        ".vars" => print_variables(&session.interpreter),
        ".budget" => match arg.map(str::parse::<u64>) {
            None => match session.interpreter.config().step_budget {
                Some(budget) => println!("Step budget: {}", budget),
                None => println!("Step budget: unlimited"),
            },
            Some(Ok(0)) => {
                session.interpreter.set_step_budget(None);
                println!("Step budget: unlimited");
            }
            Some(Ok(budget)) => {
                session.interpreter.set_step_budget(Some(budget));
                println!("Step budget: {}", budget);
            }
            Some(Err(_)) => eprintln!("Invalid budget. Use a whole number, 0 for unlimited."),
        },
        ".load" => match arg {
            Some(filename) => load_file(session, filename),
            None => eprintln!("Usage: .load <program.json>"),
        },
        ".run" => match &session.program {
            Some(program) => {
                let output = session.interpreter.run(program);
                report(&output);
            }
            None => eprintln!("No program loaded. Use .load <program.json> first."),
        },
        _ => {
            eprintln!("Unknown command: {}", command);
            eprintln!("Type .help for available commands.");
        }
    }

    false
}

fn load_file(session: &mut Session, filename: &str) {
    let source = match fs::read_to_string(filename) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error reading file '{}': {}", filename, e);
            return;
        }
    };
    match from_json(&source) {
        Ok(program) => {
            println!("Loaded {}.", filename);
            let output = session.interpreter.run(&program);
            report(&output);
            session.program = Some(program);
        }
        Err(e) => eprintln!("Build error: {}", e),
    }
}

fn execute_line(interpreter: &mut Interpreter, line: &str) {
    match interpreter.execute(line) {
        Ok(Some(Value::Void)) | Ok(None) => {}
        Ok(Some(value)) => println!("=> {}", value),
        Err(e) => eprintln!("Runtime error: {}", e.kind),
    }
}

fn print_repl_help() {
    println!(
        r#"
REPL Commands:
    .help, .h          Show this help message
    .exit, .quit, .q   Exit the REPL
    .clear             Clear all variables, functions and the loaded program
    .vars              Show all variables and functions
    .load <file>       Load a JSON block program and run it
    .run               Run the loaded program again
    .budget [n]        Show or set the step budget (0 = unlimited)

Navigation:
    Up/Down arrows     Navigate command history
    Ctrl-C             Cancel current input
    Ctrl-D             Exit REPL

Examples:
    (2 + 3) * 4        Evaluate an expression
    Int x = 5          Declare a variable
    x += 2             Update it
    Int[] xs = [1, x]  Declare an array
    xs[1] * 2          Index into it
    square(x)          Call a function from a loaded program

Tips:
    - Variables persist across inputs until .clear or .run
    - Functions from the last run stay callable
    - History is saved to ~/.brick_history
"#
    );
}

fn print_variables(interpreter: &Interpreter) {
    let bindings = interpreter.environment().bindings();
    let functions = interpreter.functions().names();

    if bindings.is_empty() && functions.is_empty() {
        println!("No variables or functions defined.");
        return;
    }

    if !bindings.is_empty() {
        println!("Variables:");
        for (name, value) in &bindings {
            println!("  {} = {} ({})", name, value.literal(), value.scalar_type());
        }
    }

    if !functions.is_empty() {
        if !bindings.is_empty() {
            println!();
        }
        println!("Functions:");
        for name in functions {
            if let Some(function) = interpreter.functions().get(&name) {
                let params: Vec<String> = function
                    .params
                    .iter()
                    .map(|p| format!("{}{}: {}", if p.by_ref { "&" } else { "" }, p.name, p.ty))
                    .collect();
                println!("  {}({}) -> {}", name, params.join(", "), function.return_type);
            }
        }
    }
}
