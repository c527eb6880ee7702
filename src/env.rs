use std::{cell::RefCell, ffi::OsStr};

use crate::memory::{DEFAULT_SIZE, MAX_SIZE};

#[derive(Clone, Copy, Debug)]
struct Env {
    memory_size: usize,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read configuration from the environment. Call once, before `memory_size`.
pub fn init() {
    let memory_size = match var_usize("ARMSIM_MEMORY") {
        Some(size) if size <= MAX_SIZE => size,
        Some(size) => {
            tracing::warn!("ARMSIM_MEMORY={size} is above the limit, using {MAX_SIZE}");
            MAX_SIZE
        }
        None => DEFAULT_SIZE,
    };
    set_env(Env { memory_size });
}

/// Size in bytes of the data memory given to programs.
pub fn memory_size() -> usize {
    with_env(|env| env.memory_size)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        if env.is_some() {
            tracing::debug!("environment initialized more than once");
        }
        *env = Some(value);
    });
}

fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        match env.as_ref() {
            Some(env) => callback(env),
            // Library use without `init` gets the defaults
            None => callback(&Env {
                memory_size: DEFAULT_SIZE,
            }),
        }
    })
}

fn var_usize(name: impl AsRef<OsStr>) -> Option<usize> {
    let value = std::env::var(name.as_ref()).ok()?;
    match value.trim().parse() {
        Ok(size) => Some(size),
        Err(_) => {
            tracing::warn!(
                "ignoring {}={value:?}: not a size in bytes",
                name.as_ref().to_string_lossy()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_init() {
        assert_eq!(memory_size(), DEFAULT_SIZE);
    }
}
