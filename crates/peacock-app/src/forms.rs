// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoginField {
    #[default]
    Email,
    Password,
}

impl LoginField {
    pub const fn next(self) -> Self {
        match self {
            Self::Email => Self::Password,
            Self::Password => Self::Email,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoginFormInput {
    pub email: String,
    pub password: String,
    pub focus: LoginField,
    pub error: Option<String>,
    pub submitting: bool,
}

impl LoginFormInput {
    pub fn validate(&self) -> Result<()> {
        let email = self.email.trim();
        if email.is_empty() {
            bail!("email is required -- enter the admin email and retry");
        }
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => bail!("email {email:?} is not an address -- use name@domain"),
        }
        if self.password.is_empty() {
            bail!("password is required -- enter the admin password and retry");
        }
        Ok(())
    }

    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            LoginField::Email => &mut self.email,
            LoginField::Password => &mut self.password,
        }
    }

    pub fn push_char(&mut self, ch: char) {
        self.focused_mut().push(ch);
    }

    pub fn pop_char(&mut self) {
        self.focused_mut().pop();
    }

    pub fn masked_password(&self) -> String {
        "*".repeat(self.password.chars().count())
    }

    /// Marks the form as in flight and returns the trimmed credentials, or
    /// records the validation error inline.
    pub fn begin_submit(&mut self) -> Option<(String, String)> {
        if self.submitting {
            return None;
        }
        if let Err(error) = self.validate() {
            self.error = Some(error.to_string());
            return None;
        }
        self.error = None;
        self.submitting = true;
        Some((self.email.trim().to_owned(), self.password.clone()))
    }

    pub fn finish_submit(&mut self, error: Option<String>) {
        self.submitting = false;
        match error {
            Some(error) => self.error = Some(error),
            None => {
                self.password.clear();
                self.error = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LoginField, LoginFormInput};

    fn form(email: &str, password: &str) -> LoginFormInput {
        LoginFormInput {
            email: email.to_owned(),
            password: password.to_owned(),
            ..LoginFormInput::default()
        }
    }

    #[test]
    fn validation_requires_email_and_password() {
        assert!(form("", "secret").validate().is_err());
        assert!(form("admin@example.com", "").validate().is_err());
        assert!(form("not-an-email", "secret").validate().is_err());
        assert!(form(" admin@example.com ", "secret").validate().is_ok());
    }

    #[test]
    fn begin_submit_records_inline_error() {
        let mut login = form("", "");
        assert!(login.begin_submit().is_none());
        assert!(login.error.as_deref().unwrap_or_default().contains("email is required"));
        assert!(!login.submitting);
    }

    #[test]
    fn submit_lifecycle_clears_password_on_success() {
        let mut login = form(" admin@example.com", "secret");
        let credentials = login.begin_submit();
        assert_eq!(
            credentials,
            Some(("admin@example.com".to_owned(), "secret".to_owned()))
        );
        assert!(login.begin_submit().is_none());

        login.finish_submit(None);
        assert!(!login.submitting);
        assert!(login.password.is_empty());
    }

    #[test]
    fn failed_submit_keeps_fields_and_sets_error() {
        let mut login = form("admin@example.com", "wrong");
        login.begin_submit();
        login.finish_submit(Some("invalid login credentials".to_owned()));
        assert_eq!(login.error.as_deref(), Some("invalid login credentials"));
        assert_eq!(login.password, "wrong");
    }

    #[test]
    fn typing_goes_to_focused_field() {
        let mut login = LoginFormInput::default();
        login.push_char('a');
        login.focus = login.focus.next();
        assert_eq!(login.focus, LoginField::Password);
        login.push_char('b');
        login.push_char('c');
        login.pop_char();
        assert_eq!(login.email, "a");
        assert_eq!(login.password, "b");
        assert_eq!(login.masked_password(), "*");
    }
}
