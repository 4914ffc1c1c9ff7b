use serde::{Deserialize, Serialize};

/// Identity record attached to a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct User {
    #[serde(default)]
    pub id: Option<i64>,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl User {
    pub fn from_username(username: impl Into<String>) -> Self {
        Self {
            id: None,
            username: username.into(),
            email: None,
            first_name: None,
            last_name: None,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(first), Some(last)) => format!("{} {}", first, last),
            (Some(first), None) => first.clone(),
            _ => self.username.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignupRequest {
    #[serde(rename = "first_name")]
    pub name: String,
    pub last_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

impl SignupRequest {
    /// Name of the first blank required field, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("name", &self.name),
            ("last_name", &self.last_name),
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
    }

    /// User record implied by a successful registration
    pub fn to_user(&self) -> User {
        User {
            id: None,
            username: self.username.clone(),
            email: Some(self.email.clone()),
            first_name: Some(self.name.clone()),
            last_name: Some(self.last_name.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogoutRequest<'a> {
    pub refresh_token: &'a str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signup() -> SignupRequest {
        SignupRequest {
            name: "Alice".into(),
            last_name: "Liddell".into(),
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "good".into(),
        }
    }

    #[test]
    fn test_signup_serializes_backend_field_names() {
        let value = serde_json::to_value(signup()).expect("serialize");
        assert_eq!(value["first_name"], "Alice");
        assert_eq!(value["last_name"], "Liddell");
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_signup_missing_field() {
        assert_eq!(signup().missing_field(), None);

        let mut req = signup();
        req.email = String::new();
        assert_eq!(req.missing_field(), Some("email"));

        let mut req = signup();
        req.name = "   ".into();
        assert_eq!(req.missing_field(), Some("name"));
    }

    #[test]
    fn test_display_name() {
        assert_eq!(signup().to_user().display_name(), "Alice Liddell");
        assert_eq!(User::from_username("bob").display_name(), "bob");
    }
}
