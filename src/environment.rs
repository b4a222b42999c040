use crate::array::ArrayStore;
use crate::value::Value;
use std::collections::{BTreeMap, HashMap};

/// One lexical block's bindings.
#[derive(Debug, Clone, Default)]
pub struct Frame {
    pub vars: HashMap<String, Value>,
    pub arrays: HashMap<String, ArrayStore>,
}

impl Frame {
    pub fn new() -> Self {
        Frame::default()
    }

    fn defines(&self, name: &str) -> bool {
        self.vars.contains_key(name) || self.arrays.contains_key(name)
    }
}

/// Stack of frames, innermost last.
///
/// Lookups walk outward and return the first match. A write to a name that
/// already exists lands in the frame that owns it; a new name lands in the
/// innermost frame and goes away when that frame is popped.
#[derive(Debug, Clone)]
pub struct Environment {
    frames: Vec<Frame>,
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            frames: vec![Frame::new()],
        }
    }

    /// A single frame seeded with the given bindings, used for function calls.
    pub fn with_frame(frame: Frame) -> Self {
        Environment { frames: vec![frame] }
    }

    pub fn push(&mut self) {
        self.frames.push(Frame::new());
    }

    /// Drop the innermost frame. The outermost frame is never popped.
    pub fn pop(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().any(|frame| frame.defines(name))
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames.iter().rev().find_map(|frame| frame.vars.get(name))
    }

    /// Update an existing scalar in its owning frame, or declare it in the innermost frame.
    pub fn set(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.frames.iter_mut().rev().find_map(|frame| frame.vars.get_mut(name)) {
            *slot = value;
            return;
        }
        self.innermost().vars.insert(name.to_string(), value);
    }

    pub fn array(&self, name: &str) -> Option<&ArrayStore> {
        self.frames.iter().rev().find_map(|frame| frame.arrays.get(name))
    }

    pub fn array_mut(&mut self, name: &str) -> Option<&mut ArrayStore> {
        self.frames.iter_mut().rev().find_map(|frame| frame.arrays.get_mut(name))
    }

    /// Replace an existing array in its owning frame, or declare it in the innermost frame.
    pub fn set_array(&mut self, name: &str, store: ArrayStore) {
        match self.array_mut(name) {
            Some(slot) => *slot = store,
            None => {
                self.innermost().arrays.insert(name.to_string(), store);
            }
        }
    }

    /// Every visible binding, innermost wins, sorted by name.
    pub fn bindings(&self) -> BTreeMap<String, Value> {
        let mut visible = BTreeMap::new();
        for frame in &self.frames {
            for (name, value) in &frame.vars {
                visible.insert(name.clone(), value.clone());
            }
            for (name, store) in &frame.arrays {
                visible.insert(name.clone(), Value::Array(store.clone()));
            }
        }
        visible
    }

    fn innermost(&mut self) -> &mut Frame {
        if self.frames.is_empty() {
            self.frames.push(Frame::new());
        }
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarType;

    #[test]
    fn writes_to_existing_names_reach_the_owning_frame() {
        let mut env = Environment::new();
        env.set("x", Value::Int(1));
        env.push();
        env.set("x", Value::Int(2));
        env.set("y", Value::Int(3));
        assert_eq!(env.get("y"), Some(&Value::Int(3)));
        env.pop();
        assert_eq!(env.get("x"), Some(&Value::Int(2)));
        assert_eq!(env.get("y"), None);
    }

    #[test]
    fn inner_lookup_sees_outer_arrays() {
        let mut env = Environment::new();
        let mut store = ArrayStore::new(ScalarType::ArrayInt).unwrap();
        store.append(Value::Int(4)).unwrap();
        env.set_array("a", store);
        env.push();
        env.array_mut("a").unwrap().append(Value::Int(5)).unwrap();
        env.pop();
        assert_eq!(env.array("a").unwrap().len(), 2);
        assert!(env.contains("a"));
    }

    #[test]
    fn the_outermost_frame_survives() {
        let mut env = Environment::new();
        env.pop();
        env.pop();
        assert_eq!(env.depth(), 1);
        env.set("z", Value::Bool(true));
        assert_eq!(env.bindings().len(), 1);
    }
}
