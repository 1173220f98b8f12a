use std::sync::OnceLock;

use crossterm::event::KeyEvent;
use regex::Regex;

use crate::input::TextInput;

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    SignIn,
    SignUp,
}

impl AuthMode {
    pub fn title(self) -> &'static str {
        match self {
            AuthMode::SignIn => "Sign in",
            AuthMode::SignUp => "Create account",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthField {
    #[default]
    Email,
    Password,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FieldErrors {
    pub email: Option<&'static str>,
    pub password: Option<&'static str>,
}

impl FieldErrors {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none()
    }
}

/// State of the sign-in and sign-up screens.
#[derive(Debug, Clone)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: TextInput,
    pub password: TextInput,
    pub field: AuthField,
    pub show_password: bool,
    pub errors: FieldErrors,
    pub loading: bool,
}

impl AuthForm {
    pub fn new(mode: AuthMode) -> Self {
        Self {
            mode,
            email: TextInput::default(),
            password: TextInput::default(),
            field: AuthField::default(),
            show_password: false,
            errors: FieldErrors::default(),
            loading: false,
        }
    }

    pub fn next_field(&mut self) {
        self.field = match self.field {
            AuthField::Email => AuthField::Password,
            AuthField::Password => AuthField::Email,
        };
    }

    pub fn toggle_password(&mut self) {
        self.show_password = !self.show_password;
    }

    /// Edits the focused field, clearing its error once it changes.
    pub fn edit(&mut self, key: &KeyEvent) {
        let changed = match self.field {
            AuthField::Email => self.email.handle_key(key),
            AuthField::Password => self.password.handle_key(key),
        };
        if changed {
            match self.field {
                AuthField::Email => self.errors.email = None,
                AuthField::Password => self.errors.password = None,
            }
        }
    }

    pub fn validate(&mut self) -> bool {
        let email = self.email.value().trim();
        let password = self.password.value();
        self.errors = FieldErrors {
            email: if email.is_empty() {
                Some("Email is required")
            } else if !email_pattern().is_match(email) {
                Some("Please enter a valid email address")
            } else {
                None
            },
            password: if password.is_empty() {
                Some("Password is required")
            } else if password.chars().count() < 8 {
                Some("Password must be at least 8 characters long")
            } else {
                None
            },
        };
        self.errors.is_empty()
    }

    /// Validates and, if the form is good and idle, marks it busy and hands back
    /// the credentials to send.
    pub fn submit(&mut self) -> Option<(String, String)> {
        if self.loading || !self.validate() {
            return None;
        }
        self.loading = true;
        Some((
            self.email.value().trim().to_string(),
            self.password.value().to_string(),
        ))
    }

    pub fn finish(&mut self, succeeded: bool) {
        self.loading = false;
        if succeeded {
            self.email.clear();
            self.password.clear();
            self.field = AuthField::Email;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyModifiers};

    fn typed(form: &mut AuthForm, text: &str) {
        for c in text.chars() {
            form.edit(&KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
        }
    }

    #[test]
    fn empty_form_reports_required_fields() {
        let mut form = AuthForm::new(AuthMode::SignUp);
        assert!(form.submit().is_none());
        assert_eq!(form.errors.email, Some("Email is required"));
        assert_eq!(form.errors.password, Some("Password is required"));
        assert!(!form.loading);
    }

    #[test]
    fn rejects_bad_email_and_short_password() {
        let mut form = AuthForm::new(AuthMode::SignUp);
        typed(&mut form, "not-an-email");
        form.next_field();
        typed(&mut form, "short");
        assert!(!form.validate());
        assert_eq!(form.errors.email, Some("Please enter a valid email address"));
        assert_eq!(
            form.errors.password,
            Some("Password must be at least 8 characters long")
        );

        // editing a field clears only that field's error
        typed(&mut form, "er!");
        assert_eq!(form.errors.password, None);
        assert!(form.errors.email.is_some());
    }

    #[test]
    fn valid_form_submits_once() {
        let mut form = AuthForm::new(AuthMode::SignIn);
        typed(&mut form, "a@b.co");
        form.next_field();
        typed(&mut form, "hunter22");
        assert_eq!(
            form.submit(),
            Some(("a@b.co".to_string(), "hunter22".to_string()))
        );
        assert!(form.loading);
        assert!(form.submit().is_none());

        form.finish(true);
        assert!(!form.loading);
        assert!(form.email.is_blank());
        assert_eq!(form.field, AuthField::Email);
    }

    #[test]
    fn email_pattern_matches_reference_cases() {
        for ok in ["a@b.co", "first.last@example.org"] {
            assert!(email_pattern().is_match(ok), "{ok}");
        }
        for bad in ["a@b", "a b@c.d", "@b.co", "a@@b.co"] {
            assert!(!email_pattern().is_match(bad), "{bad}");
        }
    }
}
