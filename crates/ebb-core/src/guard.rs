//! Non-reentrant entry-point flag.

use crate::error::Reentered;

/// Flag set while a mutating entry point runs.
///
/// Owners call [`enter`](Self::enter) on entry and [`exit`](Self::exit) on
/// every return path, including error returns.
#[derive(Debug, Default, Clone)]
pub struct ReentrancyGuard {
    entered: bool,
}

impl ReentrancyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the entry point as running, or fail if it already is.
    pub fn enter(&mut self) -> Result<(), Reentered> {
        if self.entered {
            return Err(Reentered);
        }
        self.entered = true;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.entered = false;
    }

    pub fn is_entered(&self) -> bool {
        self.entered
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_enter_fails() {
        let mut g = ReentrancyGuard::new();
        g.enter().unwrap();
        assert_eq!(g.enter(), Err(Reentered));
        g.exit();
        assert!(g.enter().is_ok());
    }

    #[test]
    fn starts_released() {
        assert!(!ReentrancyGuard::new().is_entered());
    }
}
