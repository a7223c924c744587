use std::{cell::RefCell, rc::Rc};

use crate::library::command::Command;

/// Locale forced onto every command built through [`LocaleOverride::apply`].
///
/// Overrides are scoped: [`LocaleOverride::scoped`] hands out a guard that
/// puts the previous value back when dropped, on every exit path.
#[derive(Debug, Clone, Default)]
pub struct LocaleOverride {
    current: Rc<RefCell<Option<String>>>,
}

impl LocaleOverride {
    pub fn new() -> Self {
        LocaleOverride::default()
    }

    pub fn current(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    #[must_use = "the override ends when the guard is dropped"]
    pub fn scoped(&self, locale: &str) -> LocaleGuard {
        let previous = self.current.replace(Some(locale.to_string()));

        LocaleGuard {
            slot: Rc::clone(&self.current),
            previous,
        }
    }

    pub fn apply(&self, command: Command) -> Command {
        match self.current() {
            Some(locale) => command.env("LC_ALL", &locale).env("LANG", &locale),
            None => command,
        }
    }
}

#[derive(Debug)]
pub struct LocaleGuard {
    slot: Rc<RefCell<Option<String>>>,
    previous: Option<String>,
}

impl Drop for LocaleGuard {
    fn drop(&mut self) {
        *self.slot.borrow_mut() = self.previous.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_scopes_restore_in_order() {
        let locale = LocaleOverride::new();
        assert_eq!(locale.current(), None);

        {
            let _outer = locale.scoped("C");
            assert_eq!(locale.current().as_deref(), Some("C"));

            {
                let _inner = locale.scoped("ja_JP.UTF-8");
                assert_eq!(locale.current().as_deref(), Some("ja_JP.UTF-8"));
            }

            assert_eq!(locale.current().as_deref(), Some("C"));
        }

        assert_eq!(locale.current(), None);
    }

    #[test]
    fn early_return_restores_previous_locale() {
        fn query() -> Result<(), String> {
            Err("subsystem rejected the query".to_string())
        }

        fn fails_inside_scope(locale: &LocaleOverride) -> Result<(), String> {
            let _guard = locale.scoped("C");
            query()?;
            Ok(())
        }

        let locale = LocaleOverride::new();
        let _base = locale.scoped("de_DE.UTF-8");

        assert!(fails_inside_scope(&locale).is_err());
        assert_eq!(locale.current().as_deref(), Some("de_DE.UTF-8"));
    }

    #[test]
    fn apply_sets_locale_variables_only_while_scoped() {
        let locale = LocaleOverride::new();

        let plain = locale.apply(Command::new("zfs"));
        assert!(plain.env.is_empty());

        let guard = locale.scoped("C");
        let forced = locale.apply(Command::new("zfs"));
        assert_eq!(forced.env.get("LC_ALL").map(String::as_str), Some("C"));
        assert_eq!(forced.env.get("LANG").map(String::as_str), Some("C"));
        drop(guard);

        assert!(locale.apply(Command::new("zfs")).env.is_empty());
    }
}
