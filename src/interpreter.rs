//! Tree-walking driver for block programs.

use crate::array::ArrayStore;
use crate::ast::{Node, NodeKind};
use crate::environment::{Environment, Frame};
use crate::error::{AtNode, ErrorKind, RuntimeError};
use crate::evaluator::evaluate;
use crate::function::{reference_argument, FunctionRegistry};
use crate::normalizer::{desugar, is_identifier, split_top_level, Normalized, Normalizer, Scope};
use crate::value::{ScalarType, Value};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

pub const DEFAULT_STEP_BUDGET: u64 = 1_000_000;

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Loop iterations plus function calls allowed per run. `None` is unlimited.
    pub step_budget: Option<u64>,
    /// Keep declared functions from one run to the next.
    pub persist_functions: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            step_budget: Some(DEFAULT_STEP_BUDGET),
            persist_functions: false,
        }
    }
}

/// How a block finished.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlSignal {
    Normal,
    Break,
    Continue,
    Return(Value),
}

/// Everything a run produced. Output printed before a failure is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConsoleOutput {
    pub text: String,
    pub errors: Vec<(ErrorKind, usize)>,
}

impl ConsoleOutput {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// State of an if/elif/else chain while walking a block's children.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Chain {
    /// No chain in progress.
    Closed,
    /// Every condition so far was false.
    Open,
    /// A branch already ran.
    Taken,
}

/// Which binding rule an assignment statement follows.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Binding {
    /// Typed targets must be new, untyped ones must exist (for-loop init).
    Declare,
    /// The target must already exist (for-loop step).
    Update,
    /// Declare or update as needed.
    Any,
}

pub struct Interpreter {
    config: Config,
    functions: FunctionRegistry,
    env: Environment,
    output: String,
    steps: u64,
    loop_depth: usize,
    cancel: Arc<AtomicBool>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Interpreter {
            config,
            functions: FunctionRegistry::new(),
            env: Environment::new(),
            output: String::new(),
            steps: 0,
            loop_depth: 0,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn set_step_budget(&mut self, budget: Option<u64>) {
        self.config.step_budget = budget;
    }

    /// Bindings left by the last run or REPL line.
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    /// Flag that stops the current run at its next loop iteration or call.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Forget every binding and function.
    pub fn reset(&mut self) {
        self.env = Environment::new();
        self.functions.clear();
        self.output.clear();
        self.steps = 0;
        self.loop_depth = 0;
    }

    /// Run a tree from a clean context.
    pub fn run(&mut self, root: &Node) -> ConsoleOutput {
        self.env = Environment::new();
        self.output.clear();
        self.steps = 0;
        self.loop_depth = 0;
        self.cancel.store(false, Ordering::Relaxed);
        if self.config.persist_functions {
            self.functions.start_run();
        } else {
            self.functions.clear();
        }

        debug!(nodes = root.size(), budget = ?self.config.step_budget, "run started");
        let result = match root.kind {
            NodeKind::Root => self.exec_block(&root.children),
            kind => Err(ErrorKind::InvalidNode(format!("expected a root node, found {:?}", kind))).at_node(root.id),
        };
        let errors = match result {
            Ok(_) => Vec::new(),
            Err(e) => {
                debug!(error = %e.kind, origin = e.origin(), blocks = ?e.blocks, "run failed");
                e.pairs()
            }
        };
        debug!(steps = self.steps, output = self.output.len(), "run finished");

        ConsoleOutput {
            text: mem::take(&mut self.output),
            errors,
        }
    }

    /// Evaluate one console line against the current bindings. Assignments
    /// (`x = 3`, `Int[] xs = [1, 2]`, `x++`) update the bindings and yield `None`.
    pub fn execute(&mut self, line: &str) -> Result<Option<Value>, RuntimeError> {
        self.steps = 0;
        self.loop_depth = 0;
        match desugar(line).at_node(0)? {
            Some(assignment) => {
                self.assign_statement(&assignment.target, &assignment.value, 0, Binding::Any)?;
                Ok(None)
            }
            None => self.resolve(line, 0).map(Some),
        }
    }

    fn tick(&mut self, node_id: usize) -> Result<(), RuntimeError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(RuntimeError::new(ErrorKind::Cancelled, node_id));
        }
        self.steps += 1;
        match self.config.step_budget {
            Some(budget) if self.steps > budget => {
                Err(RuntimeError::new(ErrorKind::StepBudgetExhausted(budget), node_id))
            }
            _ => Ok(()),
        }
    }

    fn resolve(&mut self, expression: &str, node_id: usize) -> Result<Value, RuntimeError> {
        Normalizer::new(self, node_id).resolve(expression)
    }

    fn condition(&mut self, expression: &str, node_id: usize) -> Result<bool, RuntimeError> {
        if expression.trim().is_empty() {
            return Err(ErrorKind::Syntax("empty condition".to_string())).at_node(node_id);
        }
        self.resolve(expression, node_id)?.truthy().at_node(node_id)
    }

    /// Run a sequence of sibling nodes, stopping at the first non-normal signal.
    pub fn exec_block(&mut self, nodes: &[Node]) -> Result<ControlSignal, RuntimeError> {
        let mut chain = Chain::Closed;
        for node in nodes {
            let signal = match (node.kind, chain) {
                (NodeKind::If, _) | (NodeKind::Elif, Chain::Open) => self.exec_branch(node, &mut chain)?,
                (NodeKind::Elif, Chain::Taken) => ControlSignal::Normal,
                (NodeKind::Else, Chain::Open) => {
                    chain = Chain::Closed;
                    self.exec_body(node)?
                }
                (NodeKind::Else, Chain::Taken) => {
                    chain = Chain::Closed;
                    ControlSignal::Normal
                }
                (NodeKind::Elif | NodeKind::Else, Chain::Closed) => {
                    return Err(ErrorKind::InvalidNode(format!("{:?} without a preceding if", node.kind)))
                        .at_node(node.id);
                }
                _ => {
                    chain = Chain::Closed;
                    self.exec_node(node)?
                }
            };
            if signal != ControlSignal::Normal {
                return Ok(signal);
            }
        }
        Ok(ControlSignal::Normal)
    }

    fn exec_branch(&mut self, node: &Node, chain: &mut Chain) -> Result<ControlSignal, RuntimeError> {
        if self.condition(&node.text, node.id)? {
            *chain = Chain::Taken;
            self.exec_body(node)
        } else {
            *chain = Chain::Open;
            Ok(ControlSignal::Normal)
        }
    }

    /// Conditional bodies share the enclosing frame, so names they introduce
    /// stay visible after the chain.
    fn exec_body(&mut self, node: &Node) -> Result<ControlSignal, RuntimeError> {
        self.exec_block(&node.children).map_err(|e| e.at(node.id))
    }

    fn exec_node(&mut self, node: &Node) -> Result<ControlSignal, RuntimeError> {
        trace!(id = node.id, kind = ?node.kind, text = %node.text, "exec");
        match node.kind {
            NodeKind::Assign => {
                self.exec_assign(node)?;
                Ok(ControlSignal::Normal)
            }
            NodeKind::While | NodeKind::For => self.exec_loop(node),
            NodeKind::Print | NodeKind::Println => {
                self.exec_print(node)?;
                Ok(ControlSignal::Normal)
            }
            NodeKind::Append | NodeKind::Pop | NodeKind::Remove => {
                self.exec_array_method(node)?;
                Ok(ControlSignal::Normal)
            }
            NodeKind::FunctionDecl => {
                self.functions.declare(node)?;
                Ok(ControlSignal::Normal)
            }
            NodeKind::Return(ty) | NodeKind::Variable(ty) => {
                let value = if node.text.trim().is_empty() {
                    Value::Void
                } else {
                    let value = self.resolve(&node.text, node.id)?;
                    ty.admit(value).at_node(node.id)?
                };
                Ok(ControlSignal::Return(value))
            }
            NodeKind::Break | NodeKind::Continue if self.loop_depth == 0 => {
                Err(ErrorKind::InvalidNode(format!("{:?} outside a loop", node.kind))).at_node(node.id)
            }
            NodeKind::Break => Ok(ControlSignal::Break),
            NodeKind::Continue => Ok(ControlSignal::Continue),
            kind => Err(ErrorKind::InvalidNode(format!("unexpected {:?} node", kind))).at_node(node.id),
        }
    }

    fn exec_assign(&mut self, node: &Node) -> Result<(), RuntimeError> {
        let (declared, target, value) = match node.children.as_slice() {
            [target @ Node { kind: NodeKind::Variable(declared), .. }, value] => (*declared, target, value),
            _ => {
                return Err(ErrorKind::InvalidNode(
                    "assignment needs a target and a value".to_string(),
                ))
                .at_node(node.id)
            }
        };

        let name = target.text.trim();
        if !name.is_empty() {
            return self.assign(name, declared, &value.text, node.id);
        }

        // No target: an expression statement such as `sort(&xs)` or `n++`.
        match desugar(&value.text).at_node(node.id)? {
            Some(assignment) => self.assign_statement(&assignment.target, &assignment.value, node.id, Binding::Any),
            None => self.resolve(&value.text, node.id).map(drop),
        }
    }

    /// Assign from a `target = value` pair whose target may carry a type, as
    /// in `Int i` or `Double[] xs`.
    fn assign_statement(
        &mut self,
        target: &str,
        value: &str,
        node_id: usize,
        binding: Binding,
    ) -> Result<(), RuntimeError> {
        let (declared, target) = typed_target(target);
        let (name, _) = split_target(target).at_node(node_id)?;
        let exists = self.env.contains(name);
        match binding {
            Binding::Declare if declared != ScalarType::Void && exists => {
                return Err(ErrorKind::AlreadyDeclared(name.to_string())).at_node(node_id);
            }
            Binding::Declare | Binding::Update if declared == ScalarType::Void && !exists => {
                return Err(ErrorKind::UndeclaredVariable(name.to_string())).at_node(node_id);
            }
            _ => {}
        }
        self.assign(target, declared, value, node_id)
    }

    /// Write `expression` to `target` (`name` or `name[index]`).
    ///
    /// An existing binding keeps its type; a declared type must agree with
    /// it. Array types, and untyped targets given an array, go to the array
    /// side of the frame.
    pub fn assign(
        &mut self,
        target: &str,
        declared: ScalarType,
        expression: &str,
        node_id: usize,
    ) -> Result<(), RuntimeError> {
        let (name, index) = split_target(target).at_node(node_id)?;

        if let Some(index) = index {
            let index = Normalizer::new(self, node_id).index(index)?;
            let value = self.resolve(expression, node_id)?;
            return self
                .env
                .array_mut(name)
                .ok_or_else(|| ErrorKind::UndeclaredVariable(name.to_string()))
                .and_then(|store| store.set(index, value))
                .at_node(node_id);
        }

        let existing = match self.env.get(name) {
            Some(value) => Some(value.scalar_type()),
            None => self.env.array(name).map(ArrayStore::array_type),
        };
        let ty = match existing {
            None => declared,
            Some(current) if declared == ScalarType::Void || declared == current => current,
            Some(current) => {
                return Err(ErrorKind::TypeMismatch {
                    expected: current.to_string(),
                    found: declared.to_string(),
                })
                .at_node(node_id)
            }
        };

        let value = match Normalizer::new(self, node_id).normalize(expression)? {
            Normalized::Literal(value) => value,
            Normalized::Expression(text) => Value::Int(evaluate(&text).at_node(node_id)?),
            Normalized::ArrayLiteral(raw) => {
                let array_type = if ty.is_array() { ty } else { ScalarType::Void };
                Value::Array(ArrayStore::build(&raw, array_type, node_id, self)?)
            }
            Normalized::Assignment(_) => {
                return Err(ErrorKind::Syntax(format!("chained assignment in {}", expression.trim())))
                    .at_node(node_id)
            }
        };
        if value == Value::Void {
            return Err(ErrorKind::InvalidValue(format!("{} has no value", expression.trim()))).at_node(node_id);
        }

        match ty.admit(value).at_node(node_id)? {
            Value::Array(store) => self.env.set_array(name, store),
            scalar => self.env.set(name, scalar),
        }
        Ok(())
    }

    fn exec_loop(&mut self, node: &Node) -> Result<ControlSignal, RuntimeError> {
        self.env.push();
        self.loop_depth += 1;
        let result = self.iterate(node);
        self.loop_depth -= 1;
        self.env.pop();
        result.map_err(|e| e.at(node.id))
    }

    fn iterate(&mut self, node: &Node) -> Result<ControlSignal, RuntimeError> {
        let (condition, step) = match node.kind {
            NodeKind::For => {
                let (init, condition, step) = for_clauses(&node.text).at_node(node.id)?;
                if !init.is_empty() {
                    self.for_init(init, node.id)?;
                }
                (condition, Some(step).filter(|s| !s.is_empty()))
            }
            _ => (node.text.trim(), None),
        };

        let mut iterations = 0u64;
        loop {
            self.tick(node.id)?;
            if !self.condition(condition, node.id)? {
                break;
            }
            match self.exec_block(&node.children)? {
                ControlSignal::Break => break,
                ControlSignal::Return(value) => return Ok(ControlSignal::Return(value)),
                ControlSignal::Normal | ControlSignal::Continue => {}
            }
            if let Some(step) = step {
                match desugar(step).at_node(node.id)? {
                    Some(assignment) => {
                        self.assign_statement(&assignment.target, &assignment.value, node.id, Binding::Update)?
                    }
                    None => {
                        return Err(ErrorKind::Syntax(format!("loop step must update a variable: {}", step)))
                            .at_node(node.id)
                    }
                }
            }
            iterations += 1;
        }
        trace!(id = node.id, iterations, "loop finished");
        Ok(ControlSignal::Normal)
    }

    fn for_init(&mut self, init: &str, node_id: usize) -> Result<(), RuntimeError> {
        match desugar(init).at_node(node_id)? {
            Some(assignment) => self.assign_statement(&assignment.target, &assignment.value, node_id, Binding::Declare),
            None => Err(ErrorKind::Syntax(format!("loop initializer must assign a variable: {}", init)))
                .at_node(node_id),
        }
    }

    fn exec_print(&mut self, node: &Node) -> Result<(), RuntimeError> {
        let text = node.text.trim();
        let mut parts = Vec::new();
        if !text.is_empty() {
            for component in split_top_level(text, ',') {
                let value = self.resolve(component, node.id)?;
                if value == Value::Void {
                    return Err(ErrorKind::InvalidValue(format!("{} has no value", component.trim())))
                        .at_node(node.id);
                }
                parts.push(value.to_string());
            }
        }
        self.output.push_str(&parts.join(" "));
        if node.kind == NodeKind::Println {
            self.output.push('\n');
        }
        Ok(())
    }

    fn exec_array_method(&mut self, node: &Node) -> Result<(), RuntimeError> {
        let id = node.id;
        match node.kind {
            NodeKind::Append => {
                let (name, expression) = name_and_argument(&node.text).at_node(id)?;
                let value = self.resolve(expression, id)?;
                self.array_store(name, id)?.append(value).at_node(id)
            }
            NodeKind::Remove => {
                let (name, expression) = name_and_argument(&node.text).at_node(id)?;
                let index = Normalizer::new(self, id).index(expression)?;
                self.array_store(name, id)?.remove(index).map(drop).at_node(id)
            }
            _ => self.array_store(node.text.trim(), id)?.pop().map(drop).at_node(id),
        }
    }

    fn array_store(&mut self, name: &str, node_id: usize) -> Result<&mut ArrayStore, RuntimeError> {
        self.env
            .array_mut(name)
            .ok_or_else(|| ErrorKind::UndeclaredVariable(name.to_string()))
            .at_node(node_id)
    }
}

impl Scope for Interpreter {
    fn scalar(&self, name: &str) -> Option<Value> {
        self.env.get(name).cloned()
    }

    fn array(&self, name: &str) -> Option<&ArrayStore> {
        self.env.array(name)
    }

    /// Call a user function: arguments are evaluated in the caller, the body
    /// runs against a single fresh frame, and reference parameters are copied
    /// back into the caller's variables afterwards.
    fn call(&mut self, name: &str, args: &[&str], node_id: usize) -> Result<Value, RuntimeError> {
        let function = self
            .functions
            .get(name)
            .ok_or_else(|| ErrorKind::UndeclaredFunction(name.to_string()))
            .at_node(node_id)?;
        function.check_arity(args.len()).at_node(node_id)?;
        self.tick(node_id)?;

        let mut frame = Frame::new();
        let mut links = Vec::new();
        for (param, &arg) in function.params.iter().zip(args) {
            let marked = reference_argument(arg);
            let expression = marked.unwrap_or(arg);
            if param.by_ref || marked.is_some() {
                if !is_identifier(expression) {
                    return Err(ErrorKind::InvalidVariableName(expression.to_string())).at_node(node_id);
                }
                if !self.env.contains(expression) {
                    return Err(ErrorKind::UndeclaredVariable(expression.to_string())).at_node(node_id);
                }
                links.push((param.name.as_str(), expression));
            }
            let value = self.resolve(expression, node_id)?;
            match param.ty.admit(value).at_node(node_id)? {
                Value::Array(store) => {
                    frame.arrays.insert(param.name.clone(), store);
                }
                value => {
                    frame.vars.insert(param.name.clone(), value);
                }
            }
        }

        debug!(function = name, args = args.len(), "call");
        let caller = mem::replace(&mut self.env, Environment::with_frame(frame));
        let loop_depth = mem::replace(&mut self.loop_depth, 0);
        let outcome = self.exec_block(&function.body);
        let callee = mem::replace(&mut self.env, caller);
        self.loop_depth = loop_depth;

        let value = match outcome.map_err(|e| e.at(function.node_id).at(node_id))? {
            ControlSignal::Return(value) => value,
            ControlSignal::Normal => Value::Void,
            signal => {
                return Err(ErrorKind::InvalidNode(format!("{:?} escaped function {}", signal, name)))
                    .at_node(function.node_id)
            }
        };
        let value = function.check_return(value).at_node(node_id)?;

        for (param, caller_name) in links {
            if let Some(store) = callee.array(param) {
                let store = match self.env.array(caller_name) {
                    Some(current) => current.array_type().admit(Value::Array(store.clone())),
                    None => Ok(Value::Array(store.clone())),
                };
                if let Value::Array(store) = store.at_node(node_id)? {
                    self.env.set_array(caller_name, store);
                }
            } else if let Some(final_value) = callee.get(param) {
                let final_value = match self.env.get(caller_name) {
                    Some(current) => current.scalar_type().admit(final_value.clone()).at_node(node_id)?,
                    None => final_value.clone(),
                };
                self.env.set(caller_name, final_value);
            }
        }
        Ok(value)
    }
}

/// `Int i` -> (`Int`, `i`); anything not led by a type name is untyped.
fn typed_target(target: &str) -> (ScalarType, &str) {
    let target = target.trim();
    if let Some((first, rest)) = target.split_once(char::is_whitespace) {
        if let Ok(ty) = first.parse::<ScalarType>() {
            return (ty, rest.trim());
        }
    }
    (ScalarType::Void, target)
}

/// `xs[i + 1]` -> (`xs`, Some(`i + 1`)).
fn split_target(target: &str) -> Result<(&str, Option<&str>), ErrorKind> {
    let target = target.trim();
    let (name, index) = match target.find('[') {
        Some(open) => {
            let index = target[open..]
                .strip_prefix('[')
                .and_then(|rest| rest.strip_suffix(']'))
                .ok_or_else(|| ErrorKind::Syntax(format!("malformed index in {}", target)))?;
            (target[..open].trim(), Some(index))
        }
        None => (target, None),
    };
    if !is_identifier(name) {
        return Err(ErrorKind::InvalidVariableName(name.to_string()));
    }
    Ok((name, index))
}

fn for_clauses(header: &str) -> Result<(&str, &str, &str), ErrorKind> {
    match split_top_level(header, ';').as_slice() {
        [init, condition, step] => Ok((init.trim(), condition.trim(), step.trim())),
        _ => Err(ErrorKind::Syntax(format!("for header needs init; condition; step: {}", header.trim()))),
    }
}

/// `xs; value` as used by append and remove.
fn name_and_argument(text: &str) -> Result<(&str, &str), ErrorKind> {
    match split_top_level(text, ';').as_slice() {
        [name, argument] if !name.trim().is_empty() && !argument.trim().is_empty() => {
            Ok((name.trim(), argument.trim()))
        }
        _ => Err(ErrorKind::Syntax(format!("expected `array; value`, found {}", text.trim()))),
    }
}
