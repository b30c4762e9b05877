// This module holds the knobs of the backend. BackendConfig selects the physical register
// strategy, whether divisions are guarded against a zero divisor, whether the local optimizer
// runs during graph construction and whether the program-wide entry trampoline is emitted.
// Values come from Default, from the with_* builder methods, or from MINIC_* environment
// variables; malformed environment values are reported with a warning and ignored.

//! Backend configuration.

use crate::regalloc::RegisterStrategy;
use log::warn;

pub const ENV_REGISTER_STRATEGY: &str = "MINIC_REGISTER_STRATEGY";
pub const ENV_DIV_GUARD: &str = "MINIC_DIV_GUARD";
pub const ENV_OPTIMIZE: &str = "MINIC_OPTIMIZE";
pub const ENV_ENTRY_TRAMPOLINE: &str = "MINIC_ENTRY_TRAMPOLINE";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    pub register_strategy: RegisterStrategy,
    /// Check divisors against zero and exit with status 136 instead of trapping.
    pub guard_division: bool,
    /// Run the local optimizer on every node the SSA builder creates.
    pub optimize: bool,
    /// Emit a `main` entry point that exits with `_main`'s return value.
    pub entry_trampoline: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            register_strategy: RegisterStrategy::Dedicated,
            guard_division: true,
            optimize: true,
            entry_trampoline: true,
        }
    }
}

impl BackendConfig {
    pub fn with_register_strategy(mut self, strategy: RegisterStrategy) -> Self {
        self.register_strategy = strategy;
        self
    }

    pub fn with_division_guard(mut self, guard: bool) -> Self {
        self.guard_division = guard;
        self
    }

    pub fn with_optimizer(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_entry_trampoline(mut self, trampoline: bool) -> Self {
        self.entry_trampoline = trampoline;
        self
    }

    /// Defaults overridden by `MINIC_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for the `MINIC_*` keys.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_REGISTER_STRATEGY) {
            match value.parse() {
                Ok(strategy) => config.register_strategy = strategy,
                Err(err) => warn!("ignoring {ENV_REGISTER_STRATEGY}: {err}"),
            }
        }
        flag(&lookup, ENV_DIV_GUARD, &mut config.guard_division);
        flag(&lookup, ENV_OPTIMIZE, &mut config.optimize);
        flag(&lookup, ENV_ENTRY_TRAMPOLINE, &mut config.entry_trampoline);
        config
    }
}

fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut bool) {
    let Some(value) = lookup(key) else {
        return;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => *slot = true,
        "0" | "false" | "off" | "no" => *slot = false,
        other => warn!("ignoring {key}={other}: expected 0 or 1"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hashbrown::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = BackendConfig::default();
        assert_eq!(config.register_strategy, RegisterStrategy::Dedicated);
        assert!(config.guard_division);
        assert!(config.optimize);
        assert!(config.entry_trampoline);
    }

    #[test]
    fn environment_overrides() {
        let config = BackendConfig::from_lookup(lookup(&[
            (ENV_REGISTER_STRATEGY, "modulo"),
            (ENV_DIV_GUARD, "0"),
            (ENV_OPTIMIZE, "off"),
        ]));
        assert_eq!(config.register_strategy, RegisterStrategy::Modulo);
        assert!(!config.guard_division);
        assert!(!config.optimize);
        assert!(config.entry_trampoline);
    }

    #[test]
    fn malformed_values_are_ignored() {
        let config = BackendConfig::from_lookup(lookup(&[
            (ENV_REGISTER_STRATEGY, "graph-coloring"),
            (ENV_ENTRY_TRAMPOLINE, "maybe"),
        ]));
        assert_eq!(config, BackendConfig::default());
    }

    #[test]
    fn builder_methods() {
        let config = BackendConfig::default()
            .with_register_strategy(RegisterStrategy::Modulo)
            .with_division_guard(false)
            .with_optimizer(false)
            .with_entry_trampoline(false);
        assert_eq!(config.register_strategy, RegisterStrategy::Modulo);
        assert!(!config.guard_division && !config.optimize && !config.entry_trampoline);
    }
}
